use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(String),
}

/// Status and JSON body (when it parses) of a GET
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
    timeout: Duration,
}

impl Default for ReqwestProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::Transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = if response.status().is_success() {
            response.json::<Value>().await.ok()
        } else {
            None
        };

        Ok(ProbeResponse { status, body })
    }
}

/// Outcome of one endpoint probe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCheck {
    pub endpoint: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EndpointCheck {
    pub fn success(endpoint: &str, status: u16, latency_ms: u64) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ok: true,
            status: Some(status),
            latency_ms,
            error: None,
        }
    }

    pub fn failure(endpoint: &str, status: Option<u16>, latency_ms: u64, error: String) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ok: false,
            status,
            latency_ms,
            error: Some(error),
        }
    }
}
