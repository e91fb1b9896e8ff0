//! Domain records exchanged with the backend and rendered by the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::gateway::GatewayError;

/// Maximum number of alerts retained in memory, newest first.
pub const ALERT_HISTORY_LIMIT: usize = 50;
/// A `new_alert` with a threat score strictly above this opens the alert modal.
pub const MODAL_THREAT_SCORE_THRESHOLD: f64 = 75.0;
/// A `threat_update` with a score strictly above this raises a high-threat notice.
pub const HIGH_THREAT_LEVEL_THRESHOLD: f64 = 80.0;
/// Identifier prefix used by demo and simulated alerts.
pub const SYNTHETIC_ALERT_ID_PREFIX: &str = "ALT-";

/// Returns true when `alert_id` follows the synthetic-data naming convention.
pub fn is_synthetic_alert_id(alert_id: &str) -> bool {
    alert_id.starts_with(SYNTHETIC_ALERT_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
/// Operator-facing lifecycle of an alert.
pub enum AlertStatus {
    #[default]
    New,
    Acknowledged,
    Escalated,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Acknowledged => "acknowledged",
            Self::Escalated => "escalated",
            Self::FalsePositive => "false_positive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Operator actions that mutate an alert's status through the gateway.
pub enum AlertAction {
    Acknowledge,
    Escalate,
    MarkFalsePositive,
}

impl AlertAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acknowledge => "acknowledge",
            Self::Escalate => "escalate",
            Self::MarkFalsePositive => "false-positive",
        }
    }

    /// Parses the action segment used by the HTTP intent endpoints.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "acknowledge" => Some(Self::Acknowledge),
            "escalate" => Some(Self::Escalate),
            "false-positive" | "false_positive" => Some(Self::MarkFalsePositive),
            _ => None,
        }
    }

    /// Status written to the backend when this action succeeds.
    pub fn target_status(self) -> AlertStatus {
        match self {
            Self::Acknowledge => AlertStatus::Acknowledged,
            Self::Escalate => AlertStatus::Escalated,
            Self::MarkFalsePositive => AlertStatus::FalsePositive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// A detected threat on one camera.
pub struct Alert {
    pub id: String,
    pub camera_id: String,
    #[serde(rename = "type")]
    pub threat_type: String,
    pub threat_score: f64,
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    Active,
    Inactive,
    Maintenance,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CameraStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Maintenance => "maintenance",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// One camera tile. Display metadata (name, location, stream URL, and any
/// backend-specific extras) is kept verbatim in `display`.
pub struct CameraFeed {
    pub id: String,
    #[serde(default)]
    pub status: CameraStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl CameraFeed {
    /// Returns a string display field such as `name` or `location`.
    pub fn display_str(&self, key: &str) -> Option<&str> {
        self.display.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreatTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Aggregate threat indicator. Always replaced wholesale.
pub struct ThreatLevel {
    pub score: f64,
    pub label: String,
    pub level: ThreatTier,
    pub last_updated: DateTime<Utc>,
}

impl ThreatLevel {
    /// Neutral value used when a snapshot carries no threat level.
    pub fn all_clear(now: DateTime<Utc>) -> Self {
        Self {
            score: 0.0,
            label: "All Clear".to_string(),
            level: ThreatTier::Low,
            last_updated: now,
        }
    }

    /// Placeholder shown before the first snapshot arrives.
    pub fn loading(now: DateTime<Utc>) -> Self {
        Self {
            score: 0.0,
            label: "Loading...".to_string(),
            level: ThreatTier::Low,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Immutable record of a past occurrence, loaded from the snapshot.
pub struct HistoryEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Explicit provenance marker a backend may attach to its snapshot.
pub enum SnapshotSource {
    Backend,
    Simulated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// One-shot bulk load returned by the remote data gateway. Every field may be
/// absent and is then treated as empty or neutral.
pub struct DashboardSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<Alert>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_feeds: Option<Vec<CameraFeed>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<ThreatLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SnapshotSource>,
    /// Set when this snapshot stands in for a failed backend fetch; the
    /// controller reports the failure and still shows the data.
    #[serde(skip)]
    pub fallback_error: Option<GatewayError>,
}

impl DashboardSnapshot {
    /// Returns true when this snapshot came from a real backend.
    ///
    /// An explicit `source` wins. Without one, the snapshot counts as real
    /// data iff it has at least one alert and the first alert's id is not
    /// synthetic.
    pub fn is_backend_data(&self) -> bool {
        if let Some(source) = self.source {
            return source == SnapshotSource::Backend;
        }
        self.alerts
            .as_ref()
            .and_then(|alerts| alerts.first())
            .is_some_and(|alert| !is_synthetic_alert_id(&alert.id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn alert_json(id: &str) -> Value {
        json!({
            "id": id,
            "cameraId": "CAM-01",
            "type": "intrusion",
            "threatScore": 64.5,
            "status": "new",
            "createdAt": "2025-03-01T12:00:00Z"
        })
    }

    #[test]
    fn unit_alert_deserializes_camel_case_wire_shape() {
        let alert: Alert = serde_json::from_value(alert_json("A-1")).expect("alert");
        assert_eq!(alert.camera_id, "CAM-01");
        assert_eq!(alert.threat_type, "intrusion");
        assert_eq!(alert.status, AlertStatus::New);
        assert!(alert.location.is_none());
    }

    #[test]
    fn unit_alert_accepts_timestamp_alias_and_missing_status() {
        let alert: Alert = serde_json::from_value(json!({
            "id": "A-2",
            "cameraId": "CAM-02",
            "type": "loitering",
            "threatScore": 10,
            "timestamp": "2025-03-01T12:00:00Z"
        }))
        .expect("alert");
        assert_eq!(alert.status, AlertStatus::New);
        assert_eq!(alert.threat_score, 10.0);
    }

    #[test]
    fn unit_false_positive_status_uses_snake_case_wire_value() {
        let value = serde_json::to_value(AlertStatus::FalsePositive).expect("serialize");
        assert_eq!(value, json!("false_positive"));
        assert_eq!(AlertStatus::FalsePositive.as_str(), "false_positive");
    }

    #[test]
    fn unit_alert_action_parse_accepts_path_segments() {
        assert_eq!(AlertAction::parse("acknowledge"), Some(AlertAction::Acknowledge));
        assert_eq!(AlertAction::parse("escalate"), Some(AlertAction::Escalate));
        assert_eq!(
            AlertAction::parse("false-positive"),
            Some(AlertAction::MarkFalsePositive)
        );
        assert_eq!(AlertAction::parse("delete"), None);
        assert_eq!(
            AlertAction::MarkFalsePositive.target_status(),
            AlertStatus::FalsePositive
        );
    }

    #[test]
    fn unit_camera_feed_preserves_display_metadata() {
        let feed: CameraFeed = serde_json::from_value(json!({
            "id": "CAM-07",
            "name": "Loading Dock",
            "location": "Building B",
            "status": "active",
            "lastActivity": "2025-03-01T12:00:00Z",
            "streamUrl": "rtsp://cam-07/live"
        }))
        .expect("feed");
        assert_eq!(feed.status, CameraStatus::Active);
        assert_eq!(feed.display_str("name"), Some("Loading Dock"));
        assert_eq!(feed.display_str("streamUrl"), Some("rtsp://cam-07/live"));
        assert!(!feed.display.contains_key("status"));
    }

    #[test]
    fn unit_camera_status_unknown_values_fall_back() {
        let status: CameraStatus = serde_json::from_value(json!("rebooting")).expect("status");
        assert_eq!(status, CameraStatus::Unknown);
    }

    #[test]
    fn unit_snapshot_missing_fields_default_to_none() {
        let snapshot: DashboardSnapshot = serde_json::from_value(json!({})).expect("snapshot");
        assert_eq!(snapshot, DashboardSnapshot::default());
        assert!(!snapshot.is_backend_data());
    }

    #[test]
    fn functional_backend_heuristic_checks_first_alert_id() {
        let real: DashboardSnapshot = serde_json::from_value(json!({
            "alerts": [alert_json("a91f"), alert_json("ALT-0001")]
        }))
        .expect("snapshot");
        assert!(real.is_backend_data());

        let demo: DashboardSnapshot = serde_json::from_value(json!({
            "alerts": [alert_json("ALT-0001"), alert_json("a91f")]
        }))
        .expect("snapshot");
        assert!(!demo.is_backend_data());

        let empty: DashboardSnapshot =
            serde_json::from_value(json!({ "alerts": [] })).expect("snapshot");
        assert!(!empty.is_backend_data());
    }

    #[test]
    fn functional_explicit_source_overrides_heuristic() {
        let tagged_demo: DashboardSnapshot = serde_json::from_value(json!({
            "alerts": [alert_json("a91f")],
            "source": "simulated"
        }))
        .expect("snapshot");
        assert!(!tagged_demo.is_backend_data());

        let tagged_backend: DashboardSnapshot = serde_json::from_value(json!({
            "alerts": [],
            "source": "backend"
        }))
        .expect("snapshot");
        assert!(tagged_backend.is_backend_data());
    }
}
