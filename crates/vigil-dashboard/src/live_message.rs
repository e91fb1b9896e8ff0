//! Push message model shared by the live connection and the simulated feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::types::{Alert, CameraStatus, ThreatLevel};

pub const LIVE_MESSAGE_NEW_ALERT: &str = "new_alert";
pub const LIVE_MESSAGE_THREAT_UPDATE: &str = "threat_update";
pub const LIVE_MESSAGE_CAMERA_STATUS: &str = "camera_status";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Payload of a `camera_status` push message.
pub struct CameraStatusUpdate {
    pub camera_id: String,
    pub status: CameraStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
/// One asynchronously delivered dashboard update.
pub enum LiveMessage {
    NewAlert(Alert),
    ThreatUpdate(ThreatLevel),
    CameraStatus(CameraStatusUpdate),
    /// A well-formed frame whose `type` this dashboard does not handle.
    Unrecognized { kind: String },
}

impl LiveMessage {
    pub fn kind(&self) -> &str {
        match self {
            Self::NewAlert(_) => LIVE_MESSAGE_NEW_ALERT,
            Self::ThreatUpdate(_) => LIVE_MESSAGE_THREAT_UPDATE,
            Self::CameraStatus(_) => LIVE_MESSAGE_CAMERA_STATUS,
            Self::Unrecognized { kind } => kind.as_str(),
        }
    }

    /// Encodes the message as a `{"type": ..., "payload": ...}` frame.
    pub fn to_frame(&self) -> Result<String, LiveMessageError> {
        let payload = match self {
            Self::NewAlert(alert) => serde_json::to_value(alert),
            Self::ThreatUpdate(level) => serde_json::to_value(level),
            Self::CameraStatus(update) => serde_json::to_value(update),
            Self::Unrecognized { .. } => Ok(Value::Null),
        }
        .map_err(|source| LiveMessageError::InvalidPayload {
            kind: self.kind().to_string(),
            source,
        })?;
        Ok(json!({ "type": self.kind(), "payload": payload }).to_string())
    }
}

#[derive(Debug, Error)]
pub enum LiveMessageError {
    #[error("live frame is not a JSON object with a string `type`: {0}")]
    InvalidFrame(#[source] serde_json::Error),
    #[error("live frame `{kind}` has a malformed payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawLiveFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Parses one text frame from a push source.
///
/// Unknown `type` values parse successfully to [`LiveMessage::Unrecognized`].
pub fn parse_live_message(raw: &str) -> Result<LiveMessage, LiveMessageError> {
    let frame =
        serde_json::from_str::<RawLiveFrame>(raw).map_err(LiveMessageError::InvalidFrame)?;
    let invalid_payload = |source| LiveMessageError::InvalidPayload {
        kind: frame.kind.clone(),
        source,
    };
    match frame.kind.as_str() {
        LIVE_MESSAGE_NEW_ALERT => serde_json::from_value(frame.payload.clone())
            .map(LiveMessage::NewAlert)
            .map_err(invalid_payload),
        LIVE_MESSAGE_THREAT_UPDATE => serde_json::from_value(frame.payload.clone())
            .map(LiveMessage::ThreatUpdate)
            .map_err(invalid_payload),
        LIVE_MESSAGE_CAMERA_STATUS => serde_json::from_value(frame.payload.clone())
            .map(LiveMessage::CameraStatus)
            .map_err(invalid_payload),
        _ => Ok(LiveMessage::Unrecognized {
            kind: frame.kind.clone(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Which push source delivered a message.
pub enum MessageSource {
    Live,
    Simulated,
}

impl MessageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Simulated => "simulated",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Status published by the live connection provider.
pub struct LiveConnectionStatus {
    pub connected: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
