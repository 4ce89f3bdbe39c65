use crate::radar::RadarMarker;
use crate::render::{NetworkPanel, ThreatPanel};
use crate::settings::Settings;
use crate::tracker::TrackingView;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

const MAX_LOG_ENTRIES: usize = 200;
pub const SCAN_IDLE_LABEL: &str = "INITIATE SCAN";
pub const SCAN_BUSY_LABEL: &str = "SCANNING...";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TriggerView {
    pub label: String,
    pub disabled: bool,
}

impl Default for TriggerView {
    fn default() -> Self {
        Self {
            label: SCAN_IDLE_LABEL.to_string(),
            disabled: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    pub time: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.time, self.message)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SettingsView {
    pub sound_enabled: bool,
    pub auto_scan_enabled: bool,
}

impl From<Settings> for SettingsView {
    fn from(settings: Settings) -> Self {
        Self {
            sound_enabled: settings.sound_enabled,
            auto_scan_enabled: settings.auto_scan_enabled,
        }
    }
}

/// Everything the page shows. Rendered by `ui`, served as JSON by `web`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DashboardView {
    pub trigger: TriggerView,
    pub networks: NetworkPanel,
    pub threats: ThreatPanel,
    pub radar: Vec<RadarMarker>,
    /// Newest first.
    pub logs: VecDeque<LogEntry>,
    pub tracking: Option<TrackingView>,
    pub settings: SettingsView,
}

#[derive(Clone)]
pub struct Dashboard {
    view: Arc<RwLock<DashboardView>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Dashboard {
    pub fn new(settings: Settings) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            view: Arc::new(RwLock::new(DashboardView {
                settings: settings.into(),
                ..DashboardView::default()
            })),
            changes: Arc::new(changes),
        }
    }

    pub fn snapshot(&self) -> DashboardView {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<R>(&self, apply: impl FnOnce(&mut DashboardView) -> R) -> R {
        let result = {
            let mut view = self.view.write().unwrap_or_else(PoisonError::into_inner);
            apply(&mut view)
        };
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
        result
    }

    /// Appends to the operator log panel and mirrors the line to tracing.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        let entry = LogEntry {
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
            message,
        };
        self.update(|view| {
            view.logs.push_front(entry);
            view.logs.truncate(MAX_LOG_ENTRIES);
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    #[cfg(test)]
    pub fn has_log(&self, needle: &str) -> bool {
        self.snapshot().logs.iter().any(|e| e.message.contains(needle))
    }
}
