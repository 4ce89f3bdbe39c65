use crate::model::{NetworkRecord, format_number};
use rand::Rng;
use serde::Serialize;

pub const RANGE_M: f64 = 50.0;
/// Radius of the range ring as a percentage of the display size.
pub const EDGE_PERCENT: f64 = 45.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Band {
    Near,
    Mid,
    Far,
}

impl Band {
    pub fn of(distance: f64) -> Self {
        if distance < 10.0 {
            Band::Near
        } else if distance < 25.0 {
            Band::Mid
        } else {
            Band::Far
        }
    }

    pub fn css_style(&self) -> &'static str {
        match self {
            Band::Near => {
                "background-color: var(--accent-red); box-shadow: 0 0 8px var(--accent-red); z-index: 10;"
            }
            Band::Mid => "background-color: orange; box-shadow: 0 0 5px orange;",
            Band::Far => {
                "background-color: var(--accent-cyan); box-shadow: 0 0 4px var(--accent-cyan);"
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RadarMarker {
    pub left: f64,
    pub top: f64,
    pub band: Band,
    pub tooltip: String,
}

/// Unknown (<= 0) and out-of-range distances sit on the edge.
pub fn clamp_distance(distance: f64) -> f64 {
    if distance <= 0.0 || distance > RANGE_M || distance.is_nan() {
        RANGE_M
    } else {
        distance
    }
}

pub fn radius_percent(distance: f64) -> f64 {
    clamp_distance(distance) / RANGE_M * EDGE_PERCENT
}

/// The bearing is not known; callers pass a random angle purely for layout.
pub fn place(net: &NetworkRecord, angle_deg: f64) -> RadarMarker {
    let dist = clamp_distance(net.distance);
    let radius = radius_percent(net.distance);
    let theta = angle_deg.to_radians();
    RadarMarker {
        left: 50.0 + radius * theta.cos(),
        top: 50.0 + radius * theta.sin(),
        band: Band::of(dist),
        tooltip: format!("{} ({}m) - {}", net.ssid, format_number(dist), net.vendor),
    }
}

pub fn markers(networks: &[NetworkRecord], rng: &mut impl Rng) -> Vec<RadarMarker> {
    networks
        .iter()
        .map(|net| place(net, rng.gen_range(0.0..360.0)))
        .collect()
}
