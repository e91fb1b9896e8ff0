use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use vigil_dashboard::{
    is_synthetic_alert_id, AlertStatus, DashboardSnapshot, GatewayError, RemoteDataGateway,
};

use crate::scenario::demo_snapshot;

/// Gateway wrapper that serves the demo snapshot whenever the primary
/// gateway fails to produce one. The primary's error rides along in
/// [`DashboardSnapshot::fallback_error`] so the controller still reports
/// the backend as offline.
///
/// Status changes on synthetic alerts are applied to the local demo copy
/// and never reach the primary gateway, so demo-mode actions succeed.
pub struct FallbackGateway {
    primary: Arc<dyn RemoteDataGateway>,
    demo: Mutex<Option<DashboardSnapshot>>,
}

impl FallbackGateway {
    pub fn new(primary: Arc<dyn RemoteDataGateway>) -> Self {
        Self {
            primary,
            demo: Mutex::new(None),
        }
    }

    fn lock_demo(&self) -> MutexGuard<'_, Option<DashboardSnapshot>> {
        match self.demo.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn demo_copy(&self) -> DashboardSnapshot {
        self.lock_demo()
            .get_or_insert_with(|| demo_snapshot(Utc::now()))
            .clone()
    }
}

#[async_trait]
impl RemoteDataGateway for FallbackGateway {
    async fn fetch_snapshot(&self) -> Result<DashboardSnapshot, GatewayError> {
        match self.primary.fetch_snapshot().await {
            Ok(snapshot) => Ok(snapshot),
            Err(error) => {
                tracing::warn!(%error, "backend snapshot unavailable; serving demo snapshot");
                Ok(DashboardSnapshot {
                    fallback_error: Some(error),
                    ..self.demo_copy()
                })
            }
        }
    }

    async fn update_alert_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<(), GatewayError> {
        if !is_synthetic_alert_id(alert_id) {
            return self.primary.update_alert_status(alert_id, status).await;
        }
        let mut demo = self.lock_demo();
        if let Some(alert) = demo
            .as_mut()
            .and_then(|snapshot| snapshot.alerts.as_mut())
            .and_then(|alerts| alerts.iter_mut().find(|alert| alert.id == alert_id))
        {
            alert.status = status;
        }
        tracing::debug!(alert_id, status = status.as_str(), "demo alert status updated locally");
        Ok(())
    }
}
