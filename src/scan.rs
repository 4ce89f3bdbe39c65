use crate::api::ScanApi;
use crate::audio::AudioFeedback;
use crate::dashboard::{Dashboard, SCAN_BUSY_LABEL, SCAN_IDLE_LABEL};
use crate::radar;
use crate::render::{self, NetworkPanel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed { networks: usize, threats: usize },
    Failed,
    /// Another scan held the trigger.
    Busy,
}

pub struct ScanOrchestrator {
    api: Arc<dyn ScanApi>,
    dashboard: Dashboard,
    audio: AudioFeedback,
    busy: AtomicBool,
    auto_every: Duration,
    auto_scan: Mutex<Option<JoinHandle<()>>>,
}

/// Holds the trigger for the duration of a scan and restores it on drop,
/// including when the scan future is cancelled. A cancelled scan also puts
/// back whichever network panel was showing before the claim.
struct TriggerClaim<'a> {
    owner: &'a ScanOrchestrator,
    previous: Option<NetworkPanel>,
}

impl Drop for TriggerClaim<'_> {
    fn drop(&mut self) {
        let previous = self.previous.take().unwrap_or_default();
        self.owner.dashboard.update(|view| {
            view.trigger.label = SCAN_IDLE_LABEL.to_string();
            view.trigger.disabled = false;
            if view.networks == NetworkPanel::Loading {
                view.networks = previous;
            }
        });
        self.owner.busy.store(false, Ordering::Release);
    }
}

impl ScanOrchestrator {
    pub fn new(
        api: Arc<dyn ScanApi>,
        dashboard: Dashboard,
        audio: AudioFeedback,
        auto_every: Duration,
    ) -> Self {
        Self {
            api,
            dashboard,
            audio,
            busy: AtomicBool::new(false),
            auto_every,
            auto_scan: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn claim(&self) -> Option<TriggerClaim<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let previous = self.dashboard.update(|view| {
            view.trigger.label = SCAN_BUSY_LABEL.to_string();
            view.trigger.disabled = true;
            std::mem::replace(&mut view.networks, NetworkPanel::Loading)
        });
        Some(TriggerClaim {
            owner: self,
            previous: Some(previous),
        })
    }

    pub async fn run_scan(&self) -> ScanOutcome {
        let Some(_claim) = self.claim() else {
            tracing::debug!("Scan already in flight, skipping");
            return ScanOutcome::Busy;
        };
        self.dashboard.log("Initiating new scan...");

        let networks = match self.api.scan().await {
            Ok(networks) => networks,
            Err(err) => {
                tracing::error!("Scan error: {err}");
                let message = err.to_string();
                self.dashboard.update(|view| {
                    view.networks = NetworkPanel::Error(format!("Error: {message}"));
                });
                self.dashboard.log(format!("Error during scan: {message}"));
                return ScanOutcome::Failed;
            }
        };

        let markers = radar::markers(&networks, &mut rand::thread_rng());
        let panel = render::network_panel(&networks);
        self.dashboard.update(|view| {
            view.networks = panel;
            view.radar = markers;
        });
        self.dashboard
            .log(format!("Scan complete. Found {} networks.", networks.len()));

        let threats = match self.api.threats().await {
            Ok(threats) => threats,
            Err(err) => {
                tracing::debug!("Threat check skipped: {err}");
                return ScanOutcome::Completed {
                    networks: networks.len(),
                    threats: 0,
                };
            }
        };

        let panel = render::threat_panel(&threats);
        self.dashboard.update(|view| view.threats = panel);
        if threats.is_empty() {
            self.dashboard.log("Security analysis: No threats found.");
        } else {
            self.dashboard
                .log(format!("WARNING: {} threats detected!", threats.len()));
            self.audio.alert();
        }

        ScanOutcome::Completed {
            networks: networks.len(),
            threats: threats.len(),
        }
    }

    /// Installs the recurring scan timer unless one is already running.
    /// Returns true when a new timer was created.
    pub fn enable_auto_scan(self: &Arc<Self>) -> bool {
        let mut slot = self.auto_scan.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let every = self.auto_every;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(orchestrator) = weak.upgrade() else {
                    break;
                };
                if orchestrator.is_busy() {
                    tracing::debug!("Auto-scan tick skipped, scan in progress");
                    continue;
                }
                orchestrator.run_scan().await;
            }
        }));
        self.dashboard
            .log(format!("Auto-Scan enabled ({}s interval).", every.as_secs()));
        true
    }

    /// Returns true when a running timer was cleared.
    pub fn disable_auto_scan(&self) -> bool {
        let handle = self
            .auto_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => {
                handle.abort();
                self.dashboard.log("Auto-Scan disabled.");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn auto_scan_active(&self) -> bool {
        self.auto_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
