use serde::{Deserialize, Serialize};

/// One access point as reported by `GET /scan`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[serde(rename = "SSID", default)]
    pub ssid: String,
    #[serde(rename = "BSSID")]
    pub bssid: String,
    #[serde(rename = "Authentication", default)]
    pub authentication: String,
    #[serde(rename = "Signal", default)]
    pub signal: String,
    #[serde(rename = "RSSI")]
    pub rssi: f64,
    #[serde(rename = "Distance", default)]
    pub distance: f64,
    #[serde(rename = "Vendor", default)]
    pub vendor: String,
    #[serde(rename = "Encryption", default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(rename = "Radio", default, skip_serializing_if = "Option::is_none")]
    pub radio: Option<String>,
    #[serde(rename = "Channel", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
}

/// Formats a JSON number the way a browser would print it: `5.0` becomes `5`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_access_point() {
        let raw = r#"{
            "SSID": "CoffeeShop",
            "Authentication": "WPA2-Personal",
            "Encryption": "CCMP",
            "BSSID": "aa:bb:cc:dd:ee:ff",
            "Signal": "82%",
            "RSSI": -55.0,
            "Distance": 5.0,
            "Vendor": "Ubiquiti",
            "Radio": "802.11ax",
            "Channel": "6"
        }"#;
        let record: NetworkRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.bssid, "aa:bb:cc:dd:ee:ff");
        assert_eq!(record.rssi, -55.0);
        assert_eq!(record.channel.as_deref(), Some("6"));
    }

    #[test]
    fn threat_ignores_nested_access_point() {
        let raw = r#"{"type": "Evil Twin", "severity": "high", "message": "dup", "ap": {"SSID": "x"}}"#;
        let threat: ThreatRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(threat.kind, "Evil Twin");
        assert_eq!(threat.severity, "high");
    }

    #[test]
    fn numbers_print_like_js() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-55.0), "-55");
        assert_eq!(format_number(5.62), "5.62");
    }
}
