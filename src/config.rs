use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub struct AppConfig {
    pub api_url: String,
    pub http_bind: String,
    pub settings_path: PathBuf,
    pub auto_scan_every: Duration,
    pub track_poll_every: Duration,
    /// `None` leaves requests without a deadline.
    pub request_timeout: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let timeout_ms: u64 = env_var("REQUEST_TIMEOUT_MS", "0").parse().unwrap_or(0);
        Self {
            api_url: env_var("API_URL", "http://127.0.0.1:8000")
                .trim_end_matches('/')
                .to_string(),
            http_bind: env_var("HTTP_BIND", "127.0.0.1:8080"),
            settings_path: PathBuf::from(env_var("SETTINGS_PATH", "rogueeye-settings.json")),
            auto_scan_every: Duration::from_secs(
                env_var("AUTO_SCAN_SECS", "30").parse().unwrap_or(30).max(1),
            ),
            track_poll_every: Duration::from_millis(
                env_var("TRACK_POLL_MS", "2000").parse().unwrap_or(2000).max(100),
            ),
            request_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        }
    }
}

fn env_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
