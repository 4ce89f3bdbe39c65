//! Single-target signal tracking.
//!
//! Idle -> `start_tracking` -> Tracking -> `stop_tracking` -> Idle. A session
//! owns its poll task and a [`SessionToken`]; the geiger loop holds a clone of
//! the token and stops rescheduling once it is cancelled.

use crate::api::ScanApi;
use crate::audio::{AudioFeedback, GeigerLoop};
use crate::dashboard::Dashboard;
use crate::model::NetworkRecord;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

const COUNTDOWN_IDLE: &str = "2.0";
const COUNTDOWN_BUSY: &str = "Scanning...";

#[derive(Clone, Debug)]
pub struct SessionToken {
    active: Arc<AtomicBool>,
    sound: Arc<AtomicBool>,
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionToken {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
            sound: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// The overlay's own sound toggle; the global setting is checked separately.
    pub fn sound_on(&self) -> bool {
        self.sound.load(Ordering::Relaxed)
    }

    pub fn set_sound(&self, enabled: bool) {
        self.sound.store(enabled, Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GaugeColor {
    Green,
    Yellow,
    Red,
}

impl GaugeColor {
    pub fn of(rssi: f64) -> Self {
        if rssi > -60.0 {
            GaugeColor::Green
        } else if rssi > -80.0 {
            GaugeColor::Yellow
        } else {
            GaugeColor::Red
        }
    }

    pub fn css(&self) -> &'static str {
        match self {
            GaugeColor::Green => "#22c55e",
            GaugeColor::Yellow => "#eab308",
            GaugeColor::Red => "#ef4444",
        }
    }
}

/// -100 dBm is an empty gauge, -30 dBm a full one.
pub fn gauge_percent(rssi: f64) -> f64 {
    ((rssi + 100.0) * (100.0 / 70.0)).clamp(0.0, 100.0)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SignalReading {
    Waiting,
    Live {
        rssi: f64,
        percent: f64,
        color: GaugeColor,
    },
    Lost,
}

impl SignalReading {
    pub fn from_rssi(rssi: f64) -> Self {
        SignalReading::Live {
            rssi,
            percent: gauge_percent(rssi),
            color: GaugeColor::of(rssi),
        }
    }

    pub fn percent(&self) -> f64 {
        match self {
            SignalReading::Live { percent, .. } => *percent,
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackingView {
    pub ssid_label: String,
    pub bssid: String,
    pub signal: SignalReading,
    pub countdown: String,
    pub sound: bool,
}

struct TrackingSession {
    bssid: String,
    token: SessionToken,
    poll: JoinHandle<()>,
}

impl TrackingSession {
    fn cancel(self) {
        self.token.cancel();
        self.poll.abort();
    }
}

pub struct TargetTracker {
    api: Arc<dyn ScanApi>,
    dashboard: Dashboard,
    geiger: Arc<GeigerLoop>,
    poll_every: Duration,
    session: Mutex<Option<TrackingSession>>,
}

impl TargetTracker {
    pub fn new(
        api: Arc<dyn ScanApi>,
        dashboard: Dashboard,
        audio: AudioFeedback,
        poll_every: Duration,
    ) -> Self {
        Self {
            api,
            dashboard,
            geiger: Arc::new(GeigerLoop::new(audio)),
            poll_every,
            session: Mutex::new(None),
        }
    }

    pub fn start_tracking(&self, bssid: &str, ssid: &str) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = session.take() {
            tracing::debug!("Replacing tracking session for {}", previous.bssid);
            previous.cancel();
        }

        let token = SessionToken::new();
        self.dashboard.update(|view| {
            view.tracking = Some(TrackingView {
                ssid_label: if ssid.is_empty() {
                    "Hidden Network".to_string()
                } else {
                    ssid.to_string()
                },
                bssid: bssid.to_string(),
                signal: SignalReading::Waiting,
                countdown: COUNTDOWN_IDLE.to_string(),
                sound: token.sound_on(),
            });
        });
        self.dashboard
            .log(format!("Started tracking target: {ssid} ({bssid})"));

        let poller = Poller {
            api: Arc::clone(&self.api),
            dashboard: self.dashboard.clone(),
            geiger: Arc::clone(&self.geiger),
            bssid: bssid.to_string(),
            token: token.clone(),
        };
        let every = self.poll_every;
        let poll = tokio::spawn(async move {
            // The first tick completes immediately.
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !poller.token.is_active() {
                    break;
                }
                poller.poll_once().await;
            }
        });

        *session = Some(TrackingSession {
            bssid: bssid.to_string(),
            token,
            poll,
        });
    }

    pub fn stop_tracking(&self) -> bool {
        let previous = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.dashboard.update(|view| view.tracking = None);
        match previous {
            Some(session) => {
                session.cancel();
                self.dashboard.log("Stopped tracking.");
                true
            }
            None => false,
        }
    }

    /// Flips the overlay's sound toggle. Returns false when nothing is tracked.
    pub fn set_session_sound(&self, enabled: bool) -> bool {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(session) = session.as_ref() else {
            return false;
        };
        session.token.set_sound(enabled);
        self.dashboard.update(|view| {
            if let Some(tracking) = view.tracking.as_mut() {
                tracking.sound = enabled;
            }
        });
        true
    }

    #[cfg(test)]
    pub fn tracked_bssid(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.bssid.clone())
    }

    #[cfg(test)]
    pub fn poll_timer_active(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.poll.is_finished())
    }

    #[cfg(test)]
    fn geiger_running(&self) -> bool {
        self.geiger.is_running()
    }
}

struct Poller {
    api: Arc<dyn ScanApi>,
    dashboard: Dashboard,
    geiger: Arc<GeigerLoop>,
    bssid: String,
    token: SessionToken,
}

impl Poller {
    async fn poll_once(&self) {
        self.set_countdown(COUNTDOWN_BUSY);
        match self.api.scan().await {
            Ok(networks) => self.apply(&networks),
            Err(err) => tracing::error!("Tracking error: {err}"),
        }
        self.set_countdown(COUNTDOWN_IDLE);
    }

    fn apply(&self, networks: &[NetworkRecord]) {
        let reading = networks
            .iter()
            .find(|n| n.bssid == self.bssid)
            .map(|target| target.rssi);
        let applied = self.update_view(|tracking| {
            tracking.signal = match reading {
                Some(rssi) => SignalReading::from_rssi(rssi),
                None => SignalReading::Lost,
            };
        });
        if let (true, Some(rssi)) = (applied, reading) {
            self.geiger.restart(rssi, self.token.clone());
        }
    }

    fn set_countdown(&self, label: &str) {
        self.update_view(|tracking| tracking.countdown = label.to_string());
    }

    /// Writes into the overlay only while this session still owns it.
    fn update_view(&self, apply: impl FnOnce(&mut TrackingView)) -> bool {
        self.dashboard.update(|view| match view.tracking.as_mut() {
            Some(tracking) if self.token.is_active() && tracking.bssid == self.bssid => {
                apply(tracking);
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::ScriptedApi;
    use crate::audio::Waveform;
    use crate::audio::tests::RecordingSink;
    use crate::render::tests::network;
    use crate::settings::{Settings, SoundSwitch};

    struct Rig {
        api: Arc<ScriptedApi>,
        sink: Arc<RecordingSink>,
        sound: SoundSwitch,
        dashboard: Dashboard,
        tracker: TargetTracker,
    }

    fn rig(networks: Vec<NetworkRecord>) -> Rig {
        let api = Arc::new(ScriptedApi::new(networks, vec![]));
        let sink = Arc::new(RecordingSink::default());
        let sound = SoundSwitch::new(true);
        let dashboard = Dashboard::new(Settings::default());
        let audio = AudioFeedback::new(sink.clone(), sound.clone());
        let tracker = TargetTracker::new(
            api.clone(),
            dashboard.clone(),
            audio,
            Duration::from_secs(2),
        );
        Rig {
            api,
            sink,
            sound,
            dashboard,
            tracker,
        }
    }

    fn ap(bssid: &str, rssi: f64) -> NetworkRecord {
        let mut net = network("WPA2-Personal", 5.0, rssi);
        net.bssid = bssid.to_string();
        net
    }

    fn signal(dashboard: &Dashboard) -> SignalReading {
        dashboard.snapshot().tracking.expect("overlay open").signal
    }

    #[test]
    fn gauge_endpoints_and_monotonic() {
        assert_eq!(gauge_percent(-100.0), 0.0);
        assert_eq!(gauge_percent(-30.0), 100.0);
        assert_eq!(gauge_percent(-120.0), 0.0);
        assert_eq!(gauge_percent(-10.0), 100.0);
        let mut previous = gauge_percent(-100.0);
        for rssi in -100..=-30 {
            let current = gauge_percent(rssi as f64);
            assert!(current >= previous, "gauge fell at {rssi} dBm");
            previous = current;
        }
    }

    #[test]
    fn gauge_colors() {
        assert_eq!(GaugeColor::of(-55.0), GaugeColor::Green);
        assert_eq!(GaugeColor::of(-60.0), GaugeColor::Yellow);
        assert_eq!(GaugeColor::of(-79.0), GaugeColor::Yellow);
        assert_eq!(GaugeColor::of(-80.0), GaugeColor::Red);
    }

    #[tokio::test(start_paused = true)]
    async fn retargeting_leaves_one_poll_timer() {
        let rig = rig(vec![ap("A", -50.0), ap("B", -70.0)]);

        rig.tracker.start_tracking("A", "Alpha");
        rig.tracker.start_tracking("B", "Bravo");
        time::sleep(Duration::from_secs(9)).await;

        // Polls at 0, 2, 4, 6 and 8 seconds, all for B.
        assert_eq!(rig.api.scan_calls(), 5);
        assert_eq!(rig.tracker.tracked_bssid().as_deref(), Some("B"));
        assert!(rig.tracker.poll_timer_active());
        let view = rig.dashboard.snapshot().tracking.unwrap();
        assert_eq!(view.ssid_label, "Bravo");
        assert_eq!(view.signal, SignalReading::from_rssi(-70.0));
    }

    #[tokio::test(start_paused = true)]
    async fn found_target_drives_gauge_and_clicks() {
        let rig = rig(vec![ap("A", -55.0)]);

        rig.tracker.start_tracking("A", "");
        time::sleep(Duration::from_millis(100)).await;

        let view = rig.dashboard.snapshot().tracking.unwrap();
        assert_eq!(view.ssid_label, "Hidden Network");
        assert_eq!(view.countdown, COUNTDOWN_IDLE);
        match view.signal {
            SignalReading::Live { percent, color, .. } => {
                assert!((percent - 45.0 * 100.0 / 70.0).abs() < 1e-9);
                assert_eq!(color, GaugeColor::Green);
            }
            other => panic!("unexpected reading {other:?}"),
        }
        assert!(rig.sink.count(Waveform::Square) >= 1);
        assert!(rig.dashboard.has_log("Started tracking target:  (A)"));
    }

    #[tokio::test(start_paused = true)]
    async fn lost_target_keeps_tracking() {
        let rig = rig(vec![ap("A", -55.0)]);
        rig.tracker.start_tracking("A", "Alpha");
        time::sleep(Duration::from_millis(100)).await;

        rig.api.set_networks(Some(vec![ap("Z", -40.0)]));
        time::sleep(Duration::from_secs(2)).await;

        assert_eq!(signal(&rig.dashboard), SignalReading::Lost);
        assert_eq!(signal(&rig.dashboard).percent(), 0.0);
        assert!(rig.tracker.poll_timer_active());

        rig.api.set_networks(Some(vec![ap("A", -85.0)]));
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(signal(&rig.dashboard), SignalReading::from_rssi(-85.0));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_leaves_gauge_alone() {
        let rig = rig(vec![ap("A", -65.0)]);
        rig.tracker.start_tracking("A", "Alpha");
        time::sleep(Duration::from_millis(100)).await;

        rig.api.set_networks(None);
        time::sleep(Duration::from_secs(4)).await;

        assert_eq!(signal(&rig.dashboard), SignalReading::from_rssi(-65.0));
        assert_eq!(rig.tracker.tracked_bssid().as_deref(), Some("A"));
        assert_eq!(rig.api.scan_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_session_and_silences_loop() {
        let rig = rig(vec![ap("A", -90.0)]);
        rig.tracker.start_tracking("A", "Alpha");
        time::sleep(Duration::from_millis(100)).await;
        assert!(rig.tracker.geiger_running());

        assert!(rig.tracker.stop_tracking());
        let clicks = rig.sink.count(Waveform::Square);
        let polls = rig.api.scan_calls();
        time::sleep(Duration::from_secs(10)).await;

        assert!(rig.dashboard.snapshot().tracking.is_none());
        assert_eq!(rig.tracker.tracked_bssid(), None);
        assert!(!rig.tracker.poll_timer_active());
        assert!(!rig.tracker.geiger_running());
        assert_eq!(rig.sink.count(Waveform::Square), clicks);
        assert_eq!(rig.api.scan_calls(), polls);
        assert!(rig.dashboard.has_log("Stopped tracking."));
        assert!(!rig.tracker.stop_tracking());
    }

    #[tokio::test(start_paused = true)]
    async fn muting_mid_session_stops_next_click() {
        let rig = rig(vec![ap("A", -30.0)]);
        rig.tracker.start_tracking("A", "Alpha");
        time::sleep(Duration::from_millis(250)).await;
        let clicks = rig.sink.count(Waveform::Square);
        assert!(clicks >= 2);

        rig.sound.set(false);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rig.sink.count(Waveform::Square), clicks);
        assert!(rig.tracker.poll_timer_active());
    }

    #[tokio::test(start_paused = true)]
    async fn session_toggle_mutes_only_this_session() {
        let rig = rig(vec![ap("A", -30.0)]);
        rig.tracker.start_tracking("A", "Alpha");
        time::sleep(Duration::from_millis(50)).await;

        assert!(rig.tracker.set_session_sound(false));
        let clicks = rig.sink.count(Waveform::Square);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rig.sink.count(Waveform::Square), clicks);
        assert!(!rig.dashboard.snapshot().tracking.unwrap().sound);

        rig.tracker.start_tracking("A", "Alpha");
        time::sleep(Duration::from_millis(50)).await;
        assert!(rig.sink.count(Waveform::Square) > clicks);
    }
}
