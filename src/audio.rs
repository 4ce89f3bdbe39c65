use crate::settings::SoundSwitch;
use crate::tracker::SessionToken;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

const ALERT_FREQ_HZ: f32 = 1200.0;
const ALERT_TONE_MS: u64 = 100;
const ALERT_GAP_MS: u64 = 150;
const CLICK_TONE_MS: u64 = 30;
const CLICK_MIN_MS: f64 = 50.0;
const CLICK_MAX_MS: f64 = 2000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

/// One oscillator burst: `gain_from` decays exponentially to `gain_to` over the tone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub waveform: Waveform,
    pub freq_hz: f32,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub gain_from: f32,
    pub gain_to: f32,
}

pub trait ToneSink: Send + Sync {
    fn play(&self, tones: &[Tone]);
}

pub fn alert_tones() -> [Tone; 2] {
    let beep = |start_ms| Tone {
        waveform: Waveform::Sine,
        freq_hz: ALERT_FREQ_HZ,
        start_ms,
        duration_ms: ALERT_TONE_MS,
        gain_from: 0.1,
        gain_to: 0.01,
    };
    [beep(0), beep(ALERT_GAP_MS)]
}

pub fn click_tone(rssi: f64) -> Tone {
    Tone {
        waveform: Waveform::Square,
        freq_hz: (800.0 + rssi * 2.0).max(20.0) as f32,
        start_ms: 0,
        duration_ms: CLICK_TONE_MS,
        gain_from: 0.05,
        gain_to: 0.001,
    }
}

/// -30 dBm clicks every 100 ms, -90 dBm every second.
pub fn click_interval(rssi: f64) -> Duration {
    let ms = (-15.0 * (rssi + 30.0) + 100.0).clamp(CLICK_MIN_MS, CLICK_MAX_MS);
    Duration::from_millis(ms.round() as u64)
}

pub fn render_tones(sample_rate: u32, tones: &[Tone]) -> Vec<f32> {
    let to_samples = |ms: u64| ((sample_rate as u64 * ms) / 1000) as usize;
    let total = tones
        .iter()
        .map(|t| to_samples(t.start_ms + t.duration_ms))
        .max()
        .unwrap_or(0);
    let mut data = vec![0.0f32; total];
    for tone in tones {
        let offset = to_samples(tone.start_ms);
        let samples = to_samples(tone.duration_ms).max(8);
        let ratio = tone.gain_to / tone.gain_from.max(f32::EPSILON);
        for i in 0..samples {
            let Some(slot) = data.get_mut(offset + i) else {
                break;
            };
            let t = i as f32 / sample_rate as f32;
            let progress = i as f32 / samples as f32;
            let env = tone.gain_from * ratio.powf(progress);
            let phase = (2.0 * PI * tone.freq_hz * t).sin();
            let osc = match tone.waveform {
                Waveform::Sine => phase,
                Waveform::Square => phase.signum(),
            };
            *slot += osc * env;
        }
    }
    data
}

/// Shared by the scan alert and the geiger loop; every tone passes the sound gate.
#[derive(Clone)]
pub struct AudioFeedback {
    sink: Arc<dyn ToneSink>,
    sound: SoundSwitch,
}

impl AudioFeedback {
    pub fn new(sink: Arc<dyn ToneSink>, sound: SoundSwitch) -> Self {
        Self { sink, sound }
    }

    pub fn alert(&self) -> bool {
        if !self.sound.is_on() {
            return false;
        }
        self.sink.play(&alert_tones());
        true
    }

    fn click(&self, rssi: f64) {
        self.sink.play(&[click_tone(rssi)]);
    }
}

/// The proportional click loop. At most one pending click task exists.
pub struct GeigerLoop {
    audio: AudioFeedback,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl GeigerLoop {
    pub fn new(audio: AudioFeedback) -> Self {
        Self {
            audio,
            pending: Mutex::new(None),
        }
    }

    /// Drops any scheduled click and restarts the cadence from a fresh sample.
    pub fn restart(&self, rssi: f64, token: SessionToken) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        // A cancelled session must not touch a newer session's pending click.
        if !token.is_active() {
            return;
        }
        if let Some(prev) = pending.take() {
            prev.abort();
        }
        if !token.sound_on() {
            return;
        }

        let audio = self.audio.clone();
        let interval = click_interval(rssi);
        *pending = Some(tokio::spawn(async move {
            loop {
                if !token.is_active() || !token.sound_on() || !audio.sound.is_on() {
                    tracing::trace!("Geiger loop stopped");
                    break;
                }
                audio.click(rssi);
                time::sleep(interval).await;
            }
        }));
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.pending
            .lock()
            .ok()
            .and_then(|p| p.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

/// Used when no output device exists; tones are dropped.
pub struct SilentSink;

impl ToneSink for SilentSink {
    fn play(&self, tones: &[Tone]) {
        tracing::trace!("Dropping {} tone(s), no audio output", tones.len());
    }
}

#[derive(Clone)]
pub struct AudioHandle {
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
    suspended: Arc<AtomicBool>,
}

pub struct AudioEngine {
    handle: AudioHandle,
    _stream: Stream,
}

impl AudioEngine {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default output device available")?;
        let config = device
            .default_output_config()
            .context("No default output config available")?;

        let sample_rate = config.sample_rate().0;
        let channels = usize::from(config.channels().max(1));
        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(4096)));
        // Output stays silent until the first tone resumes it.
        let suspended = Arc::new(AtomicBool::new(true));
        let handle = AudioHandle {
            queue: Arc::clone(&queue),
            sample_rate,
            suspended: Arc::clone(&suspended),
        };

        let stream_config: StreamConfig = config.clone().into();
        let err_fn = |err| tracing::error!("Audio stream error: {err}");

        let stream = match config.sample_format() {
            SampleFormat::F32 => {
                let queue = Arc::clone(&queue);
                let suspended = Arc::clone(&suspended);
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _| {
                        write_frames(data, channels, &queue, &suspended, |v| v)
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let queue = Arc::clone(&queue);
                let suspended = Arc::clone(&suspended);
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _| {
                        write_frames(data, channels, &queue, &suspended, |v| {
                            (v * i16::MAX as f32) as i16
                        })
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let queue = Arc::clone(&queue);
                let suspended = Arc::clone(&suspended);
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [u16], _| {
                        write_frames(data, channels, &queue, &suspended, |v| {
                            ((v + 1.0) * 0.5 * u16::MAX as f32) as u16
                        })
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow::anyhow!("Unsupported sample format: {:?}", other)),
        };

        stream.play()?;

        Ok(Self {
            handle,
            _stream: stream,
        })
    }

    pub fn handle(&self) -> AudioHandle {
        self.handle.clone()
    }
}

impl ToneSink for AudioHandle {
    fn play(&self, tones: &[Tone]) {
        if self.suspended.swap(false, Ordering::Relaxed) {
            tracing::debug!("Resuming audio output");
        }
        let samples = render_tones(self.sample_rate, tones);
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(samples);
        }
    }
}

fn write_frames<T: Copy>(
    data: &mut [T],
    channels: usize,
    queue: &Arc<Mutex<VecDeque<f32>>>,
    suspended: &AtomicBool,
    convert: impl Fn(f32) -> T,
) {
    let silent = suspended.load(Ordering::Relaxed);
    let mut guard = queue.lock().ok();
    for frame in data.chunks_mut(channels) {
        let v = if silent {
            0.0
        } else {
            guard
                .as_mut()
                .and_then(|q| q.pop_front())
                .unwrap_or(0.0)
                .clamp(-1.0, 1.0)
        };
        let out = convert(v);
        for sample in frame.iter_mut() {
            *sample = out;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        played: Mutex<Vec<Tone>>,
    }

    impl RecordingSink {
        pub(crate) fn tones(&self) -> Vec<Tone> {
            self.played.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, waveform: Waveform) -> usize {
            self.tones().iter().filter(|t| t.waveform == waveform).count()
        }
    }

    impl ToneSink for RecordingSink {
        fn play(&self, tones: &[Tone]) {
            self.played.lock().unwrap().extend_from_slice(tones);
        }
    }

    #[test]
    fn alert_is_two_spaced_sine_beeps() {
        let [first, second] = alert_tones();
        assert_eq!(first.freq_hz, 1200.0);
        assert_eq!(first.duration_ms, 100);
        assert_eq!(second.start_ms - first.start_ms, 150);
        assert_eq!((first.gain_from, first.gain_to), (0.1, 0.01));
        assert_eq!(second.waveform, Waveform::Sine);
    }

    #[test]
    fn click_interval_endpoints_and_clamps() {
        assert_eq!(click_interval(-30.0), Duration::from_millis(100));
        assert_eq!(click_interval(-90.0), Duration::from_millis(1000));
        assert_eq!(click_interval(0.0), Duration::from_millis(50));
        assert_eq!(click_interval(-200.0), Duration::from_millis(2000));
    }

    #[test]
    fn click_interval_never_grows_with_stronger_signal() {
        let mut previous = click_interval(-150.0);
        for rssi in -150..=10 {
            let current = click_interval(rssi as f64);
            assert!(current <= previous, "interval rose at {rssi} dBm");
            previous = current;
        }
    }

    #[test]
    fn click_pitch_follows_rssi() {
        let click = click_tone(-50.0);
        assert_eq!(click.freq_hz, 700.0);
        assert_eq!(click.duration_ms, 30);
        assert_eq!(click.waveform, Waveform::Square);
    }

    #[test]
    fn rendered_alert_has_silent_gap() {
        let samples = render_tones(1000, &alert_tones());
        assert_eq!(samples.len(), 250);
        assert!(samples[100..150].iter().all(|s| *s == 0.0));
        assert!(samples[..100].iter().any(|s| s.abs() > 0.0));
        assert!(samples.iter().all(|s| s.abs() <= 0.1 + f32::EPSILON));
    }

    #[test]
    fn alert_respects_sound_switch() {
        let sink = Arc::new(RecordingSink::default());
        let sound = SoundSwitch::new(false);
        let audio = AudioFeedback::new(sink.clone(), sound.clone());

        assert!(!audio.alert());
        assert!(sink.tones().is_empty());

        sound.set(true);
        assert!(audio.alert());
        assert_eq!(sink.count(Waveform::Sine), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn geiger_clicks_until_token_cancelled() {
        let sink = Arc::new(RecordingSink::default());
        let audio = AudioFeedback::new(sink.clone(), SoundSwitch::new(true));
        let geiger = GeigerLoop::new(audio);
        let token = SessionToken::new();

        // -55 dBm -> 475 ms between clicks.
        geiger.restart(-55.0, token.clone());
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(sink.count(Waveform::Square), 3);

        token.cancel();
        time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(sink.count(Waveform::Square), 3);
        assert!(!geiger.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_sample_replaces_pending_click() {
        let sink = Arc::new(RecordingSink::default());
        let audio = AudioFeedback::new(sink.clone(), SoundSwitch::new(true));
        let geiger = GeigerLoop::new(audio);
        let token = SessionToken::new();

        geiger.restart(-100.0, token.clone());
        time::sleep(Duration::from_millis(10)).await;
        geiger.restart(-30.0, token.clone());
        time::sleep(Duration::from_millis(250)).await;

        // One weak click, then strong clicks at 0, 100 and 200 ms.
        let pitches: Vec<f32> = sink.tones().iter().map(|t| t.freq_hz).collect();
        assert_eq!(pitches, vec![600.0, 740.0, 740.0, 740.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_session_cannot_replace_current_click() {
        let sink = Arc::new(RecordingSink::default());
        let audio = AudioFeedback::new(sink.clone(), SoundSwitch::new(true));
        let geiger = GeigerLoop::new(audio);
        let stale = SessionToken::new();
        let current = SessionToken::new();
        stale.cancel();

        geiger.restart(-30.0, current.clone());
        time::sleep(Duration::from_millis(10)).await;
        geiger.restart(-100.0, stale);
        time::sleep(Duration::from_millis(250)).await;

        assert!(geiger.is_running());
        let pitches: Vec<f32> = sink.tones().iter().map(|t| t.freq_hz).collect();
        assert_eq!(pitches, vec![740.0, 740.0, 740.0]);
    }
}
