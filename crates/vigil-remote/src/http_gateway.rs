//! HTTP binding of the remote data gateway.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Url;
use serde_json::json;
use vigil_dashboard::{AlertStatus, DashboardSnapshot, GatewayError, RemoteDataGateway};

const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGatewayConfig {
    pub api_base: String,
    pub request_timeout: Duration,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
/// `GET {api_base}/dashboard` for snapshots and
/// `PATCH {api_base}/alerts/{id}/status` for alert status changes.
pub struct HttpDashboardGateway {
    http: reqwest::Client,
    api_base: Url,
}

fn truncate_for_error(raw: &str) -> String {
    if raw.chars().count() <= ERROR_BODY_MAX_CHARS {
        return raw.to_string();
    }
    let truncated = raw.chars().take(ERROR_BODY_MAX_CHARS).collect::<String>();
    format!("{truncated}...")
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Unavailable(format!("request timed out: {error}"))
    } else {
        GatewayError::Unavailable(error.to_string())
    }
}

impl HttpDashboardGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        let api_base = Url::parse(config.api_base.trim())
            .with_context(|| format!("invalid dashboard api base `{}`", config.api_base))?;
        if api_base.cannot_be_a_base() {
            anyhow::bail!("dashboard api base `{}` cannot carry a path", config.api_base);
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("vigil-dashboard"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout.max(Duration::from_millis(1)))
            .build()
            .context("failed to create dashboard http client")?;

        Ok(Self { http, api_base })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Unavailable(format!("api base `{}` cannot carry a path", self.api_base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn failure_status(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GatewayError::HttpStatus {
            status,
            body: truncate_for_error(body.trim()),
        }
    }
}

#[async_trait]
impl RemoteDataGateway for HttpDashboardGateway {
    async fn fetch_snapshot(&self) -> Result<DashboardSnapshot, GatewayError> {
        let url = self.endpoint(&["dashboard"])?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(Self::failure_status(response).await);
        }
        let raw = response.text().await.map_err(transport_error)?;
        serde_json::from_str::<DashboardSnapshot>(&raw).map_err(|error| {
            GatewayError::InvalidResponse(format!("failed to decode dashboard snapshot: {error}"))
        })
    }

    async fn update_alert_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["alerts", alert_id, "status"])?;
        let response = self
            .http
            .patch(url)
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(Self::failure_status(response).await);
        }
        tracing::debug!(alert_id, status = status.as_str(), "alert status persisted");
        Ok(())
    }
}
