use crate::dashboard::{DashboardView, LogEntry, SettingsView, TriggerView};
use crate::radar::RadarMarker;
use crate::render::{self, NetworkPanel, NetworkRow, ThreatPanel};
use crate::tracker::{SignalReading, TrackingView};
use dioxus::core::NoOpMutations;
use dioxus::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Parts of the page that are re-rendered and pushed on every change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Trigger,
    Networks,
    Threats,
    Radar,
    Logs,
    Tracking,
    Settings,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Trigger,
        Region::Networks,
        Region::Threats,
        Region::Radar,
        Region::Logs,
        Region::Tracking,
        Region::Settings,
    ];

    /// The id of the element whose children the region replaces.
    pub fn container_id(&self) -> &'static str {
        match self {
            Region::Trigger => "scan-control",
            Region::Networks => "network-container",
            Region::Threats => "threat-container",
            Region::Radar => "radar-markers",
            Region::Logs => "system-logs",
            Region::Tracking => "tracking-region",
            Region::Settings => "settings-panel",
        }
    }
}

#[derive(Serialize)]
pub struct RegionUpdate {
    pub regions: BTreeMap<&'static str, String>,
}

impl RegionUpdate {
    /// Keeps only the regions whose markup differs from `pushed`, then records
    /// them there.
    pub fn changed_since(mut self, pushed: &mut BTreeMap<&'static str, String>) -> Self {
        self.regions.retain(|id, html| pushed.get(id) != Some(html));
        for (id, html) in &self.regions {
            pushed.insert(*id, html.clone());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(Props, Clone, PartialEq)]
pub struct AppProps {
    pub view: DashboardView,
}

#[derive(Props, Clone, PartialEq)]
pub struct RegionProps {
    pub view: DashboardView,
    pub region: Region,
}

pub fn render_html(view: &DashboardView) -> String {
    let mut app = VirtualDom::new_with_props(App, AppProps { view: view.clone() });
    // Build the tree before rendering to avoid SSR panics.
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    dioxus_ssr::render(&mut app)
}

pub fn render_region(view: &DashboardView, region: Region) -> String {
    let mut dom = VirtualDom::new_with_props(
        RegionView,
        RegionProps {
            view: view.clone(),
            region,
        },
    );
    let mut noop = NoOpMutations {};
    let _ = dom.rebuild(&mut noop);
    dioxus_ssr::render(&mut dom)
}

pub fn render_update(view: &DashboardView) -> RegionUpdate {
    RegionUpdate {
        regions: Region::ALL
            .iter()
            .map(|region| (region.container_id(), render_region(view, *region)))
            .collect(),
    }
}

#[component]
fn RegionView(props: RegionProps) -> Element {
    region_body(&props.view, props.region)
}

fn region_body(view: &DashboardView, region: Region) -> Element {
    match region {
        Region::Trigger => trigger_button(&view.trigger),
        Region::Networks => network_list(&view.networks),
        Region::Threats => threat_list(&view.threats),
        Region::Radar => radar_markers(&view.radar),
        Region::Logs => log_panel(&view.logs),
        Region::Tracking => tracking_overlay(view.tracking.as_ref()),
        Region::Settings => settings_panel(&view.settings),
    }
}

fn trigger_button(trigger: &TriggerView) -> Element {
    let label = trigger.label.clone();
    rsx! {
        button { id: "scan-btn", class: "primary", disabled: trigger.disabled, "{label}" }
    }
}

fn network_list(panel: &NetworkPanel) -> Element {
    let message = match panel {
        NetworkPanel::Rows(rows) => {
            return rsx! {
                for row in rows.iter() {
                    {network_row(row)}
                }
            };
        }
        NetworkPanel::Error(message) => {
            let message = message.clone();
            return rsx! {
                div { class: "loading-state error", "{message}" }
            };
        }
        NetworkPanel::Idle => "Press INITIATE SCAN to survey the airwaves.",
        NetworkPanel::Loading => render::SCANNING,
        NetworkPanel::Empty => render::NO_NETWORKS,
    };
    rsx! {
        div { class: "loading-state", "{message}" }
    }
}

fn network_row(row: &NetworkRow) -> Element {
    let ssid_title = row.ssid.clone().unwrap_or_default();
    let ssid = match &row.ssid {
        Some(name) => rsx! { "{name}" },
        None => rsx! {
            i { "Hidden SSID" }
        },
    };
    let bar = format!("width: {}px;", row.signal_width);
    let badge = format!("status-badge {}", row.status.css_class());
    let status = row.status.label();
    let payload = row.track.payload();
    rsx! {
        div { class: "network-item",
            span { title: "{ssid_title}", {ssid} }
            span { class: "dim", "{row.bssid}" }
            span { class: "dim", title: "{row.vendor_title}", "{row.vendor}" }
            div { class: "signal-cell",
                span { "{row.signal}" }
                div { class: "signal-bar", style: "{bar}" }
                span { class: "caption", "{row.distance} ({row.rssi} dBm)" }
            }
            span { "{row.security}" }
            span { class: "{badge}", "{status}" }
            button { class: "track-btn", title: "Track Signal", "data-track": "{payload}", "Track" }
        }
    }
}

fn threat_list(panel: &ThreatPanel) -> Element {
    match panel {
        ThreatPanel::Idle => rsx! {
            div { class: "caption", "Threat analysis runs after each scan." }
        },
        ThreatPanel::Empty => {
            let message = render::NO_THREATS;
            rsx! {
                div { class: "no-threats", "{message}" }
            }
        }
        ThreatPanel::Rows(rows) => rsx! {
            for threat in rows.iter() {
                div { class: "threat-item",
                    div { class: "threat-head",
                        span { "{threat.kind}" }
                        span { "{threat.severity}" }
                    }
                    div { "{threat.message}" }
                }
            }
        },
    }
}

fn radar_markers(markers: &[RadarMarker]) -> Element {
    rsx! {
        for marker in markers.iter() {
            {radar_marker(marker)}
        }
    }
}

fn radar_marker(marker: &RadarMarker) -> Element {
    let style = format!(
        "left: {:.2}%; top: {:.2}%; {}",
        marker.left,
        marker.top,
        marker.band.css_style()
    );
    rsx! {
        div { class: "dot-marker", style: "{style}", title: "{marker.tooltip}" }
    }
}

fn log_panel(logs: &VecDeque<LogEntry>) -> Element {
    let lines: Vec<String> = logs.iter().map(|entry| entry.to_string()).collect();
    rsx! {
        for line in lines {
            p { class: "log-entry", "{line}" }
        }
    }
}

fn tracking_overlay(tracking: Option<&TrackingView>) -> Element {
    let Some(tracking) = tracking else {
        return rsx! {
            div { id: "tracking-overlay", class: "modal hidden" }
        };
    };
    let (value, unit, fill) = match &tracking.signal {
        SignalReading::Live { rssi, percent, color } => (
            crate::model::format_number(*rssi),
            "dBm",
            format!("width: {percent:.1}%; background: {};", color.css()),
        ),
        SignalReading::Lost => ("LOST".to_string(), "", "width: 0%;".to_string()),
        SignalReading::Waiting => ("--".to_string(), "dBm", "width: 0%;".to_string()),
    };
    rsx! {
        div { id: "tracking-overlay", class: "modal",
            div { class: "modal-card tracking-card",
                h2 { class: "modal-title", "Tracking" }
                p { id: "track-ssid", class: "track-ssid", "{tracking.ssid_label}" }
                p { id: "track-bssid", class: "caption", "{tracking.bssid}" }
                div { id: "signal-value", class: "signal-value",
                    "{value} "
                    span { class: "unit", "{unit}" }
                }
                div { class: "signal-bar-track",
                    div { id: "signal-bar-fill", class: "signal-bar-fill", style: "{fill}" }
                }
                p { class: "caption",
                    "Next poll: "
                    span { id: "track-countdown", "{tracking.countdown}" }
                }
                label { class: "checkbox",
                    input { id: "track-sound", r#type: "checkbox", checked: tracking.sound }
                    span { "Geiger audio" }
                }
                div { class: "actions",
                    button { id: "stop-tracking", class: "danger", "Stop tracking" }
                }
            }
        }
    }
}

fn settings_panel(settings: &SettingsView) -> Element {
    rsx! {
        div { class: "sound-options",
            label { class: "checkbox",
                input { id: "setting-sound", r#type: "checkbox", checked: settings.sound_enabled }
                span { "Sound alerts" }
            }
            label { class: "checkbox",
                input { id: "settings-autoscan", r#type: "checkbox", checked: settings.auto_scan_enabled }
                span { "Auto-scan every 30 seconds" }
            }
        }
        button { id: "save-settings", class: "pill-btn", "Save configuration" }
    }
}

#[component]
fn App(props: AppProps) -> Element {
    let styles = r#"
:root {
    color-scheme: dark;
    --accent-red: #ff4f64;
    --accent-cyan: #22d3ee;
}
* { box-sizing: border-box; }
body, html {
    margin: 0;
    padding: 0;
    background: radial-gradient(circle at 20% 20%, #171a24, #0b0d13 40%), #0b0d13;
}
.page { min-height: 100vh; display: flex; justify-content: center; padding: 36px 18px; color: #e9ecf5; font-family: "Space Grotesk", "Inter", system-ui, -apple-system, sans-serif; }
.shell { width: min(980px, 100%); display: flex; flex-direction: column; gap: 12px; }
.header { display: flex; flex-direction: column; gap: 6px; }
.title { font-size: 26px; margin: 0; letter-spacing: 0.4px; }
.subtitle { margin: 0; color: #9aa4bc; font-size: 15px; }
.tag { display: inline-flex; align-items: center; gap: 8px; width: fit-content; padding: 8px 12px; border-radius: 999px; background: #10131c; border: 1px solid #1f2431; color: #c5cee3; font-size: 14px; }
.nav { display: flex; flex-wrap: wrap; gap: 10px; }
.nav-btn { padding: 10px 14px; border-radius: 12px; border: 1px solid #1f2230; background: #11131b; color: #c5cee3; font-weight: 700; cursor: pointer; }
.nav-btn.active { background: linear-gradient(135deg, #ff5f7a, #ff3c5a); color: #0a0c12; border-color: #ff90a3; }
.card { width: 100%; background: linear-gradient(145deg, #161a23, #0f1219); border: 1px solid #1f2230; border-radius: 16px; padding: 22px; box-shadow: 0 18px 44px rgba(0,0,0,0.35); }
.section { display: none; }
.section.active { display: block; }
.card-title { margin: 0 0 4px 0; font-size: 20px; }
.muted { color: #8f98ac; margin: 0 0 16px 0; font-size: 14px; }
.caption { margin: 6px 0 0 0; color: #7c859c; font-size: 13px; }
.dim { font-size: 0.8em; opacity: 0.8; }
.grid { display: grid; grid-template-columns: 260px 1fr; gap: 16px; align-items: start; }
.radar-circle { position: relative; width: 240px; height: 240px; border-radius: 50%; border: 2px solid #1f6f7a; background: radial-gradient(circle, #0f1a22 0%, #0b0d13 70%); overflow: hidden; }
.radar-ring { position: absolute; border: 1px dashed #1f4f5a; border-radius: 50%; }
.scanner-line { position: absolute; left: 50%; top: 50%; width: 50%; height: 2px; background: linear-gradient(90deg, #22d3ee, transparent); transform-origin: 0 50%; animation: sweep 4s linear infinite; }
@keyframes sweep { from { transform: rotate(0deg); } to { transform: rotate(360deg); } }
.dot-marker { position: absolute; width: 8px; height: 8px; margin: -4px 0 0 -4px; border-radius: 50%; }
.network-item { display: grid; grid-template-columns: 1.4fr 1.2fr 1fr 1fr 0.6fr 0.8fr auto; gap: 8px; align-items: center; padding: 10px; border-bottom: 1px solid #1f2230; font-size: 14px; }
.signal-bar { height: 4px; background: currentColor; border-radius: 2px; }
.status-badge { padding: 4px 8px; border-radius: 999px; font-size: 12px; font-weight: 800; text-align: center; }
.status-open { background: rgba(255,79,100,0.18); color: #ff90a3; }
.status-warning { background: rgba(234,179,8,0.18); color: #eab308; }
.status-secure { background: rgba(34,197,94,0.18); color: #22c55e; }
.loading-state { padding: 18px; color: #8f98ac; text-align: center; }
.loading-state.error { color: var(--accent-red); }
.threat-item { padding: 12px; border-radius: 12px; border: 1px solid #5a1f2a; background: #1a0f14; margin-bottom: 8px; }
.threat-head { display: flex; justify-content: space-between; font-weight: 800; margin-bottom: 4px; }
.no-threats { color: #22c55e; padding: 12px; }
.log-entry { margin: 0; padding: 5px 0; border-bottom: 1px solid #334155; font-family: ui-monospace, monospace; font-size: 13px; }
.sound-options { display: grid; grid-template-columns: repeat(auto-fit, minmax(240px, 1fr)); gap: 12px; margin-bottom: 12px; }
.checkbox { display: flex; align-items: center; gap: 10px; padding: 12px; background: #10141d; border: 1px solid #1f2230; border-radius: 12px; cursor: pointer; }
.checkbox input { width: 18px; height: 18px; }
.primary { width: 100%; padding: 14px 16px; border-radius: 12px; border: none; background: linear-gradient(135deg, #ff5f7a, #ff3c5a); color: #0b0d12; font-weight: 800; font-size: 16px; cursor: pointer; }
.primary:disabled { opacity: 0.6; cursor: progress; }
.pill-btn, .track-btn { padding: 8px 10px; border-radius: 10px; border: 1px solid #262b38; background: #0f1118; color: #dfe4f3; font-weight: 700; cursor: pointer; }
.modal { position: fixed; inset: 0; display: flex; align-items: center; justify-content: center; background: rgba(5,7,12,0.72); backdrop-filter: blur(6px); padding: 18px; }
.modal.hidden { display: none; }
.modal-card { width: min(420px, 100%); background: #0f121a; border: 1px solid #1f2230; border-radius: 14px; padding: 20px; }
.modal-title { margin: 0 0 10px 0; color: #f8f9fb; font-size: 18px; }
.track-ssid { margin: 0; font-size: 20px; font-weight: 800; }
.signal-value { font-size: 42px; font-weight: 800; margin: 12px 0; }
.signal-value .unit { font-size: 16px; color: #8f98ac; }
.signal-bar-track { height: 12px; border-radius: 6px; background: #1f2230; overflow: hidden; }
.signal-bar-fill { height: 100%; transition: width 300ms ease; }
.actions { display: flex; gap: 10px; margin-top: 12px; }
.danger { flex: 1; padding: 12px 14px; border-radius: 10px; font-weight: 700; background: #ff4f64; border: none; color: #0b0d12; cursor: pointer; }
@media (max-width: 640px) {
    .page { padding: 20px 14px; }
    .grid { grid-template-columns: 1fr; }
    .network-item { grid-template-columns: 1fr 1fr; }
}
"#;

    let script = r#"
(() => {
  const navButtons = document.querySelectorAll('[data-target]');
  const sections = document.querySelectorAll('[data-section]');
  let ws;

  function setSection(target) {
    sections.forEach((section) => {
      section.classList.toggle('active', section.dataset.section === target);
    });
    navButtons.forEach((btn) => {
      btn.classList.toggle('active', btn.dataset.target === target);
    });
  }

  navButtons.forEach((btn) => {
    btn.addEventListener('click', () => setSection(btn.dataset.target));
  });

  async function send(action) {
    try {
      const res = await fetch('/api/action', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(action),
      });
      if (!res.ok && res.status !== 409) console.error('action failed', res.status);
    } catch (err) {
      console.error('action error', err);
    }
  }

  function applyRegions(regions) {
    Object.entries(regions || {}).forEach(([id, html]) => {
      const el = document.getElementById(id);
      if (el) el.innerHTML = html;
    });
  }

  function connect() {
    const proto = location.protocol === 'https:' ? 'wss' : 'ws';
    ws = new WebSocket(`${proto}://${location.host}/ws/dashboard`);
    ws.onmessage = (evt) => {
      try {
        applyRegions(JSON.parse(evt.data).regions);
      } catch {
        console.error('bad dashboard update');
      }
    };
    ws.onerror = () => ws && ws.close();
    ws.onclose = () => setTimeout(connect, 2000);
  }

  document.addEventListener('click', (evt) => {
    const el = evt.target.closest('button');
    if (!el) return;
    if (el.id === 'scan-btn') {
      el.disabled = true;
      send({ action: 'scan' });
    } else if (el.classList.contains('track-btn')) {
      const target = JSON.parse(el.dataset.track);
      send({ action: 'track', bssid: target.bssid, ssid: target.ssid });
    } else if (el.id === 'stop-tracking') {
      send({ action: 'stop-tracking' });
    } else if (el.id === 'save-settings') {
      send({
        action: 'save-settings',
        sound: document.getElementById('setting-sound').checked,
        auto_scan: document.getElementById('settings-autoscan').checked,
      });
    }
  });

  document.addEventListener('change', (evt) => {
    if (evt.target.id === 'track-sound') {
      send({ action: 'track-sound', enabled: evt.target.checked });
    }
  });

  connect();
  setSection('dashboard');
})();
"#;

    let view = &props.view;
    rsx! {
        div { class: "page",
            div { class: "shell",
                div { class: "header",
                    h1 { class: "title", "RogueEye" }
                    p { class: "subtitle", "Wi-Fi survey and rogue access point console" }
                }
                div { class: "nav",
                    button { class: "nav-btn active", "data-target": "dashboard", "Dashboard" }
                    button { class: "nav-btn", "data-target": "networks", "Networks" }
                    button { class: "nav-btn", "data-target": "settings", "Settings" }
                    button { class: "nav-btn", "data-target": "logs", "Logs" }
                }
                div { id: "view-dashboard", class: "card section active", "data-section": "dashboard",
                    div { id: "scan-control", {trigger_button(&view.trigger)} }
                    div { class: "grid",
                        div { id: "radar", class: "radar-circle",
                            div { class: "radar-ring", style: "inset: 25%;" }
                            div { class: "radar-ring", style: "inset: 5%;" }
                            div { class: "scanner-line" }
                            div { id: "radar-markers", {radar_markers(&view.radar)} }
                        }
                        div {
                            h2 { class: "card-title", "Threats" }
                            div { id: "threat-container", {threat_list(&view.threats)} }
                        }
                    }
                }
                div { id: "view-networks", class: "card section", "data-section": "networks",
                    h2 { class: "card-title", "Nearby networks" }
                    p { class: "muted", "Distance is estimated from RSSI. Track a network to follow its signal live." }
                    div { id: "network-container", {network_list(&view.networks)} }
                }
                div { id: "view-settings", class: "card section", "data-section": "settings",
                    h2 { class: "card-title", "Settings" }
                    div { id: "settings-panel", {settings_panel(&view.settings)} }
                }
                div { id: "view-logs", class: "card section", "data-section": "logs",
                    h2 { class: "card-title", "System logs" }
                    div { id: "system-logs", {log_panel(&view.logs)} }
                }
            }
        }
        div { id: "tracking-region", {tracking_overlay(view.tracking.as_ref())} }
        style { dangerous_inner_html: "{styles}" }
        script { dangerous_inner_html: "{script}" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar;
    use crate::render::tests::network;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn view_with_networks() -> DashboardView {
        let mut named = network("WPA2-Personal", 5.0, -55.0);
        named.ssid = r#"Bob's "Guest""#.into();
        let mut hidden = network("Open", 0.0, -88.0);
        hidden.ssid.clear();
        let nets = vec![named, hidden];
        DashboardView {
            networks: render::network_panel(&nets),
            radar: radar::markers(&nets, &mut StdRng::seed_from_u64(1)),
            ..DashboardView::default()
        }
    }

    #[test]
    fn page_exposes_stable_ids() {
        let html = render_html(&DashboardView::default());
        for id in [
            "scan-btn",
            "network-container",
            "threat-container",
            "system-logs",
            "radar",
            "tracking-overlay",
            "setting-sound",
            "settings-autoscan",
        ] {
            assert!(html.contains(&format!("id=\"{id}\"")), "missing #{id}");
        }
        assert!(html.contains("INITIATE SCAN"));
    }

    #[test]
    fn network_rows_render_badges_and_hidden_ssid() {
        let html = render_region(&view_with_networks(), Region::Networks);
        assert!(html.contains("SECURE"));
        assert!(html.contains("OPEN"));
        assert!(html.contains("Hidden SSID"));
        assert!(html.contains("5m (-55 dBm)"));
        assert!(html.contains("N/A (-88 dBm)"));
        assert!(html.contains("data-track"));
        assert!(html.matches("class=\"track-btn\"").count() == 2);
    }

    #[test]
    fn radar_region_has_one_marker_per_network() {
        let html = render_region(&view_with_networks(), Region::Radar);
        assert_eq!(html.matches("dot-marker").count(), 2);
        assert!(!html.contains("scanner-line"));
    }

    #[test]
    fn empty_states() {
        let view = DashboardView {
            networks: NetworkPanel::Empty,
            threats: ThreatPanel::Empty,
            ..DashboardView::default()
        };
        assert!(render_region(&view, Region::Networks).contains("No networks found."));
        assert!(render_region(&view, Region::Threats).contains("No active threats detected."));
    }

    #[test]
    fn overlay_shows_lost_and_live() {
        let mut view = DashboardView {
            tracking: Some(TrackingView {
                ssid_label: "Alpha".into(),
                bssid: "aa:bb".into(),
                signal: SignalReading::Lost,
                countdown: "2.0".into(),
                sound: true,
            }),
            ..DashboardView::default()
        };
        let html = render_region(&view, Region::Tracking);
        assert!(html.contains("LOST"));
        assert!(html.contains("width: 0%"));

        if let Some(tracking) = view.tracking.as_mut() {
            tracking.signal = SignalReading::from_rssi(-30.0);
        }
        let html = render_region(&view, Region::Tracking);
        assert!(html.contains("width: 100.0%"));
        assert!(html.contains("#22c55e"));

        view.tracking = None;
        assert!(render_region(&view, Region::Tracking).contains("modal hidden"));
    }

    #[test]
    fn tracking_change_leaves_settings_untouched() {
        let mut view = DashboardView {
            tracking: Some(TrackingView {
                ssid_label: "Alpha".into(),
                bssid: "aa:bb".into(),
                signal: SignalReading::Waiting,
                countdown: "2.0".into(),
                sound: true,
            }),
            ..DashboardView::default()
        };
        let mut pushed = BTreeMap::new();
        let first = render_update(&view).changed_since(&mut pushed);
        assert_eq!(first.regions.len(), Region::ALL.len());
        assert!(render_update(&view).changed_since(&mut pushed).is_empty());

        if let Some(tracking) = view.tracking.as_mut() {
            tracking.countdown = "Scanning...".into();
        }
        let next = render_update(&view).changed_since(&mut pushed);
        assert_eq!(next.regions.keys().copied().collect::<Vec<_>>(), vec!["tracking-region"]);
        assert!(!next.regions.contains_key("settings-panel"));

        view.settings.auto_scan_enabled = true;
        let saved = render_update(&view).changed_since(&mut pushed);
        assert!(saved.regions.contains_key("settings-panel"));
    }

    #[test]
    fn update_covers_every_region() {
        let update = render_update(&DashboardView::default());
        assert_eq!(update.regions.len(), Region::ALL.len());
        assert!(update.regions["scan-control"].contains("scan-btn"));
    }
}
