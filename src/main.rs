mod api;
mod audio;
mod config;
mod dashboard;
mod model;
mod radar;
mod render;
mod scan;
mod settings;
mod tracker;
mod ui;
mod web;

use crate::api::HttpScanApi;
use crate::audio::{AudioEngine, AudioFeedback, SilentSink, ToneSink};
use crate::config::AppConfig;
use crate::dashboard::Dashboard;
use crate::scan::ScanOrchestrator;
use crate::settings::{FileStore, KeyValueStore, Settings, SoundSwitch};
use crate::tracker::TargetTracker;
use crate::web::AppState;
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::from_env());

    tracing::info!(
        "Starting RogueEye console on {} (backend: {})",
        config.http_bind,
        config.api_url
    );

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.settings_path.clone())?);
    let settings = Settings::load(store.as_ref());
    let dashboard = Dashboard::new(settings);
    let sound = SoundSwitch::new(settings.sound_enabled);

    // The engine owns the output stream and must outlive the server.
    let audio_engine = match AudioEngine::new() {
        Ok(engine) => Some(engine),
        Err(err) => {
            tracing::warn!("Audio output unavailable, alerts will be silent: {err:?}");
            None
        }
    };
    let sink: Arc<dyn ToneSink> = match &audio_engine {
        Some(engine) => Arc::new(engine.handle()),
        None => Arc::new(SilentSink),
    };
    let audio = AudioFeedback::new(sink, sound.clone());

    let api = Arc::new(HttpScanApi::new(&config.api_url, config.request_timeout)?);
    let scanner = Arc::new(ScanOrchestrator::new(
        api.clone(),
        dashboard.clone(),
        audio.clone(),
        config.auto_scan_every,
    ));
    let tracker = Arc::new(TargetTracker::new(
        api,
        dashboard.clone(),
        audio,
        config.track_poll_every,
    ));

    let state = AppState {
        config: config.clone(),
        dashboard,
        scanner: scanner.clone(),
        tracker: tracker.clone(),
        store,
        sound,
    };
    state.apply_settings(settings);

    web::serve(state).await?;

    tracker.stop_tracking();
    scanner.disable_auto_scan();
    drop(audio_engine);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}
