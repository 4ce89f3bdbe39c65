use crate::model::{NetworkRecord, ThreatRecord};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("{endpoint} failed with status {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("invalid {endpoint} payload: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },
}

/// The scan/threat backend as seen by the dashboard.
#[async_trait]
pub trait ScanApi: Send + Sync {
    async fn scan(&self) -> Result<Vec<NetworkRecord>, ApiError>;

    async fn threats(&self) -> Result<Vec<ThreatRecord>, ApiError>;
}

pub struct HttpScanApi {
    client: Client,
    base_url: String,
}

impl HttpScanApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint, status });
        }

        response.json::<T>().await.map_err(|err| ApiError::Decode {
            endpoint,
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl ScanApi for HttpScanApi {
    async fn scan(&self) -> Result<Vec<NetworkRecord>, ApiError> {
        self.get_json("/scan").await
    }

    async fn threats(&self) -> Result<Vec<ThreatRecord>, ApiError> {
        self.get_json("/threats").await
    }
}
