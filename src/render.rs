//! Network and threat lists as row view models.

use crate::model::{NetworkRecord, ThreatRecord, format_number};
use serde::Serialize;

pub const NO_NETWORKS: &str = "No networks found.";
pub const NO_THREATS: &str = "No active threats detected. System Green.";
pub const SCANNING: &str = "Scanning airwaves...";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Open,
    Unknown,
    Secure,
}

impl Status {
    pub fn of(authentication: &str) -> Self {
        match authentication {
            "Open" => Status::Open,
            "Unknown" => Status::Unknown,
            _ => Status::Secure,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Open => "OPEN",
            Status::Unknown => "UNKNOWN",
            Status::Secure => "SECURE",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Status::Open => "status-open",
            Status::Unknown => "status-warning",
            Status::Secure => "status-secure",
        }
    }
}

/// "WPA2-Personal" -> "WPA2"; open networks report "None".
pub fn security_type(authentication: &str) -> String {
    if authentication == "Open" {
        return "None".to_string();
    }
    authentication
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn distance_label(distance: f64) -> String {
    if distance > 0.0 {
        format!("{}m", format_number(distance))
    } else {
        "N/A".to_string()
    }
}

pub fn vendor_label(vendor: &str) -> String {
    if vendor.chars().count() > 20 {
        let head: String = vendor.chars().take(18).collect();
        format!("{head}...")
    } else {
        vendor.to_string()
    }
}

/// Bar width in px; the numeric part of "82%".
pub fn signal_width(signal: &str) -> u32 {
    signal
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .map(|v| v.clamp(0.0, 100.0).round() as u32)
        .unwrap_or(0)
}

/// What the track button sends back. Serialized as JSON so quotes in SSIDs
/// survive embedding in markup.
#[derive(Clone, Debug, PartialEq, Serialize, serde::Deserialize)]
pub struct TrackAction {
    pub bssid: String,
    pub ssid: String,
}

impl TrackAction {
    pub fn payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkRow {
    /// `None` for hidden networks.
    pub ssid: Option<String>,
    pub bssid: String,
    pub vendor: String,
    pub vendor_title: String,
    pub signal: String,
    pub signal_width: u32,
    pub distance: String,
    pub rssi: String,
    pub security: String,
    pub status: Status,
    pub track: TrackAction,
}

impl NetworkRow {
    pub fn from_record(net: &NetworkRecord) -> Self {
        Self {
            ssid: (!net.ssid.is_empty()).then(|| net.ssid.clone()),
            bssid: net.bssid.clone(),
            vendor: vendor_label(&net.vendor),
            vendor_title: net.vendor.clone(),
            signal: net.signal.clone(),
            signal_width: signal_width(&net.signal),
            distance: distance_label(net.distance),
            rssi: format_number(net.rssi),
            security: security_type(&net.authentication),
            status: Status::of(&net.authentication),
            track: TrackAction {
                bssid: net.bssid.clone(),
                ssid: net.ssid.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreatRow {
    pub kind: String,
    pub severity: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "kebab-case")]
pub enum NetworkPanel {
    #[default]
    Idle,
    Loading,
    Empty,
    Rows(Vec<NetworkRow>),
    Error(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "kebab-case")]
pub enum ThreatPanel {
    #[default]
    Idle,
    Empty,
    Rows(Vec<ThreatRow>),
}

pub fn network_panel(networks: &[NetworkRecord]) -> NetworkPanel {
    if networks.is_empty() {
        return NetworkPanel::Empty;
    }
    NetworkPanel::Rows(networks.iter().map(NetworkRow::from_record).collect())
}

pub fn threat_panel(threats: &[ThreatRecord]) -> ThreatPanel {
    if threats.is_empty() {
        return ThreatPanel::Empty;
    }
    ThreatPanel::Rows(
        threats
            .iter()
            .map(|t| ThreatRow {
                kind: t.kind.clone(),
                severity: t.severity.to_uppercase(),
                message: t.message.clone(),
            })
            .collect(),
    )
}
