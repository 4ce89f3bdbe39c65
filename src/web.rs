use crate::config::AppConfig;
use crate::dashboard::{Dashboard, DashboardView};
use crate::scan::{ScanOrchestrator, ScanOutcome};
use crate::settings::{KeyValueStore, Settings, SoundSwitch};
use crate::tracker::TargetTracker;
use crate::ui;
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub dashboard: Dashboard,
    pub scanner: Arc<ScanOrchestrator>,
    pub tracker: Arc<TargetTracker>,
    pub store: Arc<dyn KeyValueStore>,
    pub sound: SoundSwitch,
}

/// Everything the page can ask for. Posted as `{"action": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum UiAction {
    Scan,
    Track { bssid: String, ssid: String },
    StopTracking,
    TrackSound { enabled: bool },
    SaveSettings { sound: bool, auto_scan: bool },
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub detail: String,
}

impl ActionResponse {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }
}

impl AppState {
    /// Pushes settings into the running components without persisting them.
    pub fn apply_settings(&self, settings: Settings) {
        self.sound.set(settings.sound_enabled);
        self.dashboard.update(|view| view.settings = settings.into());
        if settings.auto_scan_enabled {
            self.scanner.enable_auto_scan();
        } else {
            self.scanner.disable_auto_scan();
        }
    }

    pub fn save_settings(&self, settings: Settings) {
        match settings.save(self.store.as_ref()) {
            Ok(()) => self.dashboard.log("Configuration saved."),
            Err(err) => {
                tracing::warn!("Unable to persist settings: {err:?}");
                self.dashboard
                    .log(format!("Failed to save configuration: {err}"));
            }
        }
        self.apply_settings(settings);
    }

    pub async fn dispatch(
        &self,
        action: UiAction,
    ) -> Result<ActionResponse, (StatusCode, String)> {
        match action {
            UiAction::Scan => match self.scanner.run_scan().await {
                ScanOutcome::Busy => Err((StatusCode::CONFLICT, "Scan already in progress".into())),
                ScanOutcome::Failed => Ok(ActionResponse {
                    ok: false,
                    detail: "Scan failed".into(),
                }),
                ScanOutcome::Completed { networks, threats } => Ok(ActionResponse::ok(format!(
                    "{networks} networks, {threats} threats"
                ))),
            },
            UiAction::Track { bssid, ssid } => {
                if bssid.trim().is_empty() {
                    return Err((StatusCode::BAD_REQUEST, "BSSID required".into()));
                }
                self.tracker.start_tracking(&bssid, &ssid);
                Ok(ActionResponse::ok(bssid))
            }
            UiAction::StopTracking => {
                let stopped = self.tracker.stop_tracking();
                Ok(ActionResponse::ok(if stopped { "stopped" } else { "idle" }))
            }
            UiAction::TrackSound { enabled } => {
                if self.tracker.set_session_sound(enabled) {
                    Ok(ActionResponse::ok(if enabled { "on" } else { "off" }))
                } else {
                    Err((StatusCode::CONFLICT, "Not tracking".into()))
                }
            }
            UiAction::SaveSettings { sound, auto_scan } => {
                self.save_settings(Settings {
                    sound_enabled: sound,
                    auto_scan_enabled: auto_scan,
                });
                Ok(ActionResponse::ok("saved"))
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/dashboard", get(dashboard))
        .route("/api/action", post(action))
        .route("/ws/dashboard", get(ws_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = state.config.http_bind.parse()?;
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Dashboard listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(graceful_shutdown())
        .await?;

    Ok(())
}

async fn graceful_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down http server");
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Html(ui::render_html(&state.dashboard.snapshot()))
}

async fn dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.dashboard.snapshot())
}

async fn action(
    State(state): State<AppState>,
    Json(body): Json<UiAction>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::debug!("UI action {body:?}");
    state.dispatch(body).await.map(Json)
}

async fn ws_dashboard(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut changes = state.dashboard.subscribe();
    let mut pushed = BTreeMap::new();
    loop {
        changes.mark_unchanged();
        if let Err(err) = send_update(&mut socket, &state, &mut pushed).await {
            tracing::debug!("Dashboard socket send failed: {err}");
            break;
        }
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Dashboard socket closed");
}

/// Sends the regions that changed since the last push on this socket.
async fn send_update(
    socket: &mut WebSocket,
    state: &AppState,
    pushed: &mut BTreeMap<&'static str, String>,
) -> Result<(), axum::Error> {
    let update = ui::render_update(&state.dashboard.snapshot()).changed_since(pushed);
    if update.is_empty() {
        return Ok(());
    }
    let payload = serde_json::to_string(&update).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload)).await
}
