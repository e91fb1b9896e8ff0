//! Dashboard controller: the single owner of dashboard state.
//!
//! Every state transition runs to completion inside one `&mut self` call.
//! Gateway round-trips are split into a `begin_*`/`request_*` half that
//! records intent and a `complete_*` half that applies the result, so the
//! runtime can await the gateway off its event loop. The `load_from` and
//! `perform_alert_action` helpers run both halves inline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::{GatewayError, RemoteDataGateway};
use crate::live_message::{CameraStatusUpdate, LiveConnectionStatus, LiveMessage, MessageSource};
use crate::notice::{NoticeKind, NotificationSurface};
use crate::types::{
    Alert, AlertAction, CameraFeed, CameraStatus, DashboardSnapshot, HistoryEvent, ThreatLevel,
    ALERT_HISTORY_LIMIT, HIGH_THREAT_LEVEL_THRESHOLD, MODAL_THREAT_SCORE_THRESHOLD,
};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
/// Alert modal state machine: closed, or open on exactly one alert.
pub enum AlertModal {
    #[default]
    Closed,
    Open { alert: Alert },
}

impl AlertModal {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Self::Open { alert } => Some(alert),
            Self::Closed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Identifies one started snapshot load.
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An alert action waiting on the gateway.
pub struct AlertActionRequest {
    pub alert_id: String,
    pub action: AlertAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A recognized message changed state.
    Applied,
    /// The message type is not handled; nothing changed.
    Ignored,
    /// The source is not authoritative right now; the message was dropped.
    Refused,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Read-only copy of controller state handed to presentation.
pub struct DashboardView {
    pub alerts: Vec<Alert>,
    pub camera_feeds: Vec<CameraFeed>,
    pub threat_level: ThreatLevel,
    pub history: Vec<HistoryEvent>,
    pub last_update: DateTime<Utc>,
    pub loading: bool,
    pub backend_connected: bool,
    pub load_error: Option<String>,
    pub live_connection: LiveConnectionStatus,
    pub simulation_enabled: bool,
    pub modal: AlertModal,
}

impl DashboardView {
    pub fn demo_mode(&self) -> bool {
        !self.backend_connected && !self.loading
    }
}

struct ActionNotices {
    success_kind: NoticeKind,
    success_title: &'static str,
    success_body: &'static str,
    failure_title: &'static str,
    failure_body: &'static str,
}

fn action_notices(action: AlertAction) -> ActionNotices {
    match action {
        AlertAction::Acknowledge => ActionNotices {
            success_kind: NoticeKind::Success,
            success_title: "Alert Acknowledged",
            success_body: "Alert has been marked as acknowledged",
            failure_title: "Update Failed",
            failure_body: "Failed to acknowledge alert. Please try again.",
        },
        AlertAction::Escalate => ActionNotices {
            success_kind: NoticeKind::Warning,
            success_title: "Alert Escalated",
            success_body: "Alert has been escalated to security team",
            failure_title: "Escalation Failed",
            failure_body: "Failed to escalate alert. Please try again.",
        },
        AlertAction::MarkFalsePositive => ActionNotices {
            success_kind: NoticeKind::Info,
            success_title: "Marked as False Positive",
            success_body: "Alert has been marked as false positive",
            failure_title: "Update Failed",
            failure_body: "Failed to mark alert as false positive. Please try again.",
        },
    }
}

pub struct DashboardController {
    notices: Arc<dyn NotificationSurface>,
    alerts: Vec<Alert>,
    camera_feeds: Vec<CameraFeed>,
    threat_level: ThreatLevel,
    history: Vec<HistoryEvent>,
    last_update: DateTime<Utc>,
    loading: bool,
    backend_connected: bool,
    load_error: Option<String>,
    live_status: LiveConnectionStatus,
    modal: AlertModal,
    load_generation: u64,
    applied_generation: u64,
}

impl DashboardController {
    /// Creates a controller in its pre-load state: loading, no data, demo.
    pub fn new(notices: Arc<dyn NotificationSurface>) -> Self {
        let now = Utc::now();
        Self {
            notices,
            alerts: Vec::new(),
            camera_feeds: Vec::new(),
            threat_level: ThreatLevel::loading(now),
            history: Vec::new(),
            last_update: now,
            loading: true,
            backend_connected: false,
            load_error: None,
            live_status: LiveConnectionStatus::default(),
            modal: AlertModal::Closed,
            load_generation: 0,
            applied_generation: 0,
        }
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn camera_feeds(&self) -> &[CameraFeed] {
        &self.camera_feeds
    }

    pub fn threat_level(&self) -> &ThreatLevel {
        &self.threat_level
    }

    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn backend_connected(&self) -> bool {
        self.backend_connected
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn live_status(&self) -> &LiveConnectionStatus {
        &self.live_status
    }

    pub fn modal(&self) -> &AlertModal {
        &self.modal
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            alerts: self.alerts.clone(),
            camera_feeds: self.camera_feeds.clone(),
            threat_level: self.threat_level.clone(),
            history: self.history.clone(),
            last_update: self.last_update,
            loading: self.loading,
            backend_connected: self.backend_connected,
            load_error: self.load_error.clone(),
            live_connection: self.live_status.clone(),
            simulation_enabled: self.simulation_enabled(),
            modal: self.modal.clone(),
        }
    }

    /// Marks a snapshot load as started: sets loading and clears the error.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_generation = self.load_generation.saturating_add(1);
        self.loading = true;
        self.load_error = None;
        tracing::debug!(generation = self.load_generation, "dashboard snapshot load started");
        LoadTicket {
            generation: self.load_generation,
        }
    }

    /// Applies a snapshot load result. Returns false when a newer load has
    /// already been applied and this result was discarded.
    ///
    /// A result from an older ticket still applies while nothing newer has
    /// landed; loading clears once the most recently started load settles.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<DashboardSnapshot, GatewayError>,
    ) -> bool {
        if ticket.generation <= self.applied_generation {
            tracing::debug!(
                generation = ticket.generation,
                applied = self.applied_generation,
                "discarding superseded dashboard snapshot"
            );
            return false;
        }
        self.applied_generation = ticket.generation;

        match result {
            Ok(mut snapshot) => match snapshot.fallback_error.take() {
                Some(error) => {
                    self.apply_snapshot_data(snapshot);
                    self.record_load_failure(&error);
                }
                None => self.apply_snapshot(snapshot),
            },
            Err(error) => self.record_load_failure(&error),
        }
        if ticket.generation == self.load_generation {
            self.loading = false;
        }
        true
    }

    fn record_load_failure(&mut self, error: &GatewayError) {
        tracing::warn!(%error, "dashboard snapshot load failed; running on simulated data");
        self.backend_connected = false;
        self.load_error = Some(error.to_string());
        self.notices.raise(
            NoticeKind::Warning,
            "Backend Offline",
            "Running in demo mode with simulated data",
        );
    }

    fn apply_snapshot(&mut self, snapshot: DashboardSnapshot) {
        self.apply_snapshot_data(snapshot);
        self.load_error = None;
        if self.backend_connected {
            self.notices.raise(
                NoticeKind::Success,
                "Backend Connected",
                "Successfully connected to the surveillance backend",
            );
        } else {
            self.notices.raise(
                NoticeKind::Info,
                "Demo Mode Active",
                "Using simulated data - backend not available",
            );
        }
    }

    fn apply_snapshot_data(&mut self, snapshot: DashboardSnapshot) {
        let now = Utc::now();
        let backend_connected = snapshot.is_backend_data();
        let mut alerts = snapshot.alerts.unwrap_or_default();
        alerts.truncate(ALERT_HISTORY_LIMIT);
        self.alerts = alerts;
        self.camera_feeds = snapshot.camera_feeds.unwrap_or_default();
        self.threat_level = snapshot
            .threat_level
            .unwrap_or_else(|| ThreatLevel::all_clear(now));
        self.history = snapshot.history.unwrap_or_default();
        self.last_update = now;
        self.backend_connected = backend_connected;

        tracing::info!(
            alerts = self.alerts.len(),
            camera_feeds = self.camera_feeds.len(),
            history = self.history.len(),
            backend_connected,
            "dashboard snapshot applied"
        );
    }

    /// Runs a complete load against `gateway` without yielding to other events.
    pub async fn load_from(&mut self, gateway: &dyn RemoteDataGateway) {
        let ticket = self.begin_load();
        let result = gateway.fetch_snapshot().await;
        self.complete_load(ticket, result);
    }

    pub fn set_live_status(&mut self, status: LiveConnectionStatus) {
        if status.connected != self.live_status.connected {
            tracing::info!(
                connected = status.connected,
                attempts = status.attempts,
                "live connection status changed"
            );
        }
        self.live_status = status;
    }

    /// True while the simulated feed may run: live connection down, no load
    /// in flight, and the last snapshot was not real backend data.
    pub fn simulation_enabled(&self) -> bool {
        !self.live_status.connected && !self.loading && !self.backend_connected
    }

    /// Returns true when messages from `source` are currently authoritative.
    pub fn accepts(&self, source: MessageSource) -> bool {
        match source {
            MessageSource::Live => true,
            MessageSource::Simulated => self.simulation_enabled(),
        }
    }

    /// Routes one push message into state, honouring source precedence.
    pub fn dispatch(&mut self, source: MessageSource, message: LiveMessage) -> DispatchOutcome {
        if !self.accepts(source) {
            tracing::debug!(
                source = source.as_str(),
                kind = message.kind(),
                "dropping message from non-authoritative source"
            );
            return DispatchOutcome::Refused;
        }
        tracing::debug!(source = source.as_str(), kind = message.kind(), "dispatching message");

        match message {
            LiveMessage::NewAlert(alert) => self.apply_new_alert(alert),
            LiveMessage::ThreatUpdate(level) => self.apply_threat_update(level),
            LiveMessage::CameraStatus(update) => self.apply_camera_status(update),
            LiveMessage::Unrecognized { .. } => return DispatchOutcome::Ignored,
        }
        self.last_update = Utc::now();
        DispatchOutcome::Applied
    }

    fn apply_new_alert(&mut self, alert: Alert) {
        let body = format!("{} detected on {}", alert.threat_type, alert.camera_id);
        if alert.threat_score > MODAL_THREAT_SCORE_THRESHOLD {
            self.modal = AlertModal::Open {
                alert: alert.clone(),
            };
        }
        self.alerts.insert(0, alert);
        self.alerts.truncate(ALERT_HISTORY_LIMIT);
        self.notices
            .raise(NoticeKind::Warning, "New Threat Detected", body.as_str());
    }

    fn apply_threat_update(&mut self, level: ThreatLevel) {
        let score = level.score;
        self.threat_level = level;
        if score > HIGH_THREAT_LEVEL_THRESHOLD {
            self.notices.raise(
                NoticeKind::Warning,
                "High Threat Level",
                format!("Threat level increased to {score}").as_str(),
            );
        }
    }

    fn apply_camera_status(&mut self, update: CameraStatusUpdate) {
        if let Some(feed) = self
            .camera_feeds
            .iter_mut()
            .find(|feed| feed.id == update.camera_id)
        {
            feed.status = update.status;
            if update.last_activity.is_some() {
                feed.last_activity = update.last_activity;
            }
        } else {
            tracing::debug!(camera_id = %update.camera_id, "camera status for unknown camera dropped");
        }
        if update.status == CameraStatus::Inactive {
            self.notices.raise(
                NoticeKind::Warning,
                "Camera Offline",
                format!("Camera {} has gone offline", update.camera_id).as_str(),
            );
        }
    }

    pub fn dismiss_modal(&mut self) {
        self.modal = AlertModal::Closed;
    }

    /// Records an operator action on `alert_id`. State is untouched until
    /// the gateway result is applied with [`Self::complete_alert_action`].
    pub fn request_alert_action(
        &self,
        alert_id: impl Into<String>,
        action: AlertAction,
    ) -> AlertActionRequest {
        AlertActionRequest {
            alert_id: alert_id.into(),
            action,
        }
    }

    /// Same as [`Self::request_alert_action`] on the modal's current alert.
    pub fn request_modal_action(&self, action: AlertAction) -> Option<AlertActionRequest> {
        self.modal
            .alert()
            .map(|alert| self.request_alert_action(alert.id.clone(), action))
    }

    /// Applies a gateway result for an alert action. On success only the
    /// target alert's status changes; on failure nothing changes.
    pub fn complete_alert_action(
        &mut self,
        request: &AlertActionRequest,
        result: Result<(), GatewayError>,
    ) {
        let notices = action_notices(request.action);
        match result {
            Ok(()) => {
                let status = request.action.target_status();
                if let Some(alert) = self
                    .alerts
                    .iter_mut()
                    .find(|alert| alert.id == request.alert_id)
                {
                    alert.status = status;
                }
                if let AlertModal::Open { alert } = &mut self.modal {
                    if alert.id == request.alert_id {
                        alert.status = status;
                    }
                }
                tracing::info!(
                    alert_id = %request.alert_id,
                    status = status.as_str(),
                    "alert status updated"
                );
                self.notices.raise(
                    notices.success_kind,
                    notices.success_title,
                    notices.success_body,
                );
            }
            Err(error) => {
                tracing::warn!(
                    alert_id = %request.alert_id,
                    action = request.action.as_str(),
                    %error,
                    "alert status update failed"
                );
                self.notices.raise(
                    NoticeKind::Error,
                    notices.failure_title,
                    notices.failure_body,
                );
            }
        }
    }

    /// Runs an alert action against `gateway` without yielding to other events.
    pub async fn perform_alert_action(
        &mut self,
        gateway: &dyn RemoteDataGateway,
        alert_id: &str,
        action: AlertAction,
    ) {
        let request = self.request_alert_action(alert_id, action);
        let result = gateway
            .update_alert_status(&request.alert_id, action.target_status())
            .await;
        self.complete_alert_action(&request, result);
    }
}
