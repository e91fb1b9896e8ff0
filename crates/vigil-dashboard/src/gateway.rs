use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AlertStatus, DashboardSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Failure talking to the remote data gateway. Always recoverable.
pub enum GatewayError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Trait contract for the backend that supplies snapshots and persists alert
/// status changes.
pub trait RemoteDataGateway: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<DashboardSnapshot, GatewayError>;

    async fn update_alert_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<(), GatewayError>;
}
