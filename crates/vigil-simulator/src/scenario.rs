use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map};
use vigil_dashboard::{
    Alert, AlertStatus, CameraFeed, CameraStatus, CameraStatusUpdate, DashboardSnapshot,
    HistoryEvent, LiveMessage, SnapshotSource, ThreatLevel, ThreatTier,
    SYNTHETIC_ALERT_ID_PREFIX,
};

struct DemoCamera {
    id: &'static str,
    name: &'static str,
    location: &'static str,
}

const DEMO_CAMERAS: [DemoCamera; 6] = [
    DemoCamera {
        id: "CAM-001",
        name: "Main Entrance",
        location: "Building A - Lobby",
    },
    DemoCamera {
        id: "CAM-002",
        name: "Parking Lot North",
        location: "Exterior - North",
    },
    DemoCamera {
        id: "CAM-003",
        name: "Loading Dock",
        location: "Building B - Rear",
    },
    DemoCamera {
        id: "CAM-004",
        name: "Server Room",
        location: "Building A - Floor 2",
    },
    DemoCamera {
        id: "CAM-005",
        name: "Perimeter Fence East",
        location: "Exterior - East",
    },
    DemoCamera {
        id: "CAM-006",
        name: "Stairwell C",
        location: "Building C - Core",
    },
];

const THREAT_TYPES: [&str; 6] = [
    "Unauthorized Access",
    "Suspicious Behavior",
    "Loitering",
    "Weapon Detected",
    "Abandoned Object",
    "Crowd Formation",
];

const CAMERA_STATUS_CYCLE: [CameraStatus; 4] = [
    CameraStatus::Active,
    CameraStatus::Maintenance,
    CameraStatus::Active,
    CameraStatus::Inactive,
];

/// Offset keeping generated alert ids clear of the demo snapshot's ids.
const GENERATED_ALERT_ID_BASE: u64 = 1_000;

fn synthetic_alert_id(sequence: u64) -> String {
    format!("{SYNTHETIC_ALERT_ID_PREFIX}{sequence:04}")
}

/// Maps a threat score onto the tier and label shown by the indicator.
pub fn threat_tier_for_score(score: f64) -> (ThreatTier, &'static str) {
    if score >= 80.0 {
        (ThreatTier::Critical, "Critical")
    } else if score >= 60.0 {
        (ThreatTier::High, "Elevated")
    } else if score >= 30.0 {
        (ThreatTier::Medium, "Moderate")
    } else {
        (ThreatTier::Low, "Low")
    }
}

fn threat_level(score: f64, now: DateTime<Utc>) -> ThreatLevel {
    let (level, label) = threat_tier_for_score(score);
    ThreatLevel {
        score,
        label: label.to_string(),
        level,
        last_updated: now,
    }
}

fn demo_alert(
    sequence: u64,
    camera: &DemoCamera,
    threat_type: &str,
    score: f64,
    created_at: DateTime<Utc>,
) -> Alert {
    Alert {
        id: synthetic_alert_id(sequence),
        camera_id: camera.id.to_string(),
        threat_type: threat_type.to_string(),
        threat_score: score,
        status: AlertStatus::New,
        created_at,
        confidence: Some((score / 100.0 + 0.05).min(0.99)),
        location: Some(camera.location.to_string()),
        description: Some(format!("{threat_type} near {}", camera.name)),
        thumbnail_url: None,
    }
}

pub fn demo_camera_feeds(now: DateTime<Utc>) -> Vec<CameraFeed> {
    DEMO_CAMERAS
        .iter()
        .enumerate()
        .map(|(index, camera)| {
            let mut display = Map::new();
            display.insert("name".to_string(), json!(camera.name));
            display.insert("location".to_string(), json!(camera.location));
            display.insert(
                "streamUrl".to_string(),
                json!(format!("rtsp://demo.local/{}", camera.id.to_lowercase())),
            );
            let status = if index == 4 {
                CameraStatus::Maintenance
            } else {
                CameraStatus::Active
            };
            CameraFeed {
                id: camera.id.to_string(),
                status,
                last_activity: Some(now - Duration::seconds(15 * index as i64)),
                display,
            }
        })
        .collect()
}

/// Builds the snapshot served in demo mode. Every alert id carries the
/// synthetic prefix and the snapshot is tagged as simulated.
pub fn demo_snapshot(now: DateTime<Utc>) -> DashboardSnapshot {
    let alerts = [
        (0, 0, 58.0, 2),
        (3, 1, 42.0, 9),
        (2, 2, 35.0, 17),
        (1, 4, 66.0, 31),
        (5, 3, 22.0, 48),
        (0, 5, 47.0, 75),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (camera, threat, score, minutes_ago))| {
        demo_alert(
            index as u64 + 1,
            &DEMO_CAMERAS[camera],
            THREAT_TYPES[threat],
            score,
            now - Duration::minutes(minutes_ago),
        )
    })
    .collect::<Vec<_>>();

    let history = alerts
        .iter()
        .map(|alert| HistoryEvent {
            id: format!("HIST-{}", alert.id),
            event_type: "alert".to_string(),
            description: format!("{} on {}", alert.threat_type, alert.camera_id),
            camera_id: Some(alert.camera_id.clone()),
            threat_score: Some(alert.threat_score),
            timestamp: alert.created_at,
        })
        .chain(std::iter::once(HistoryEvent {
            id: "HIST-SYS-0001".to_string(),
            event_type: "system".to_string(),
            description: "Camera CAM-005 entered maintenance".to_string(),
            camera_id: Some("CAM-005".to_string()),
            threat_score: None,
            timestamp: now - Duration::hours(2),
        }))
        .collect();

    DashboardSnapshot {
        alerts: Some(alerts),
        camera_feeds: Some(demo_camera_feeds(now)),
        threat_level: Some(threat_level(38.0, now)),
        history: Some(history),
        source: Some(SnapshotSource::Simulated),
        fallback_error: None,
    }
}

#[derive(Debug, Clone, Default)]
/// Deterministic source of synthetic push messages.
///
/// Rotates through `new_alert`, `threat_update` and `camera_status` so every
/// message kind appears within three ticks. Scores sweep the 39..=99 range,
/// which regularly crosses the modal and high-threat thresholds.
pub struct SimulatedMessageGenerator {
    sequence: u64,
}

impl SimulatedMessageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn score(&self) -> f64 {
        (self.sequence.wrapping_mul(37).wrapping_add(11) % 61 + 39) as f64
    }

    pub fn next_message(&mut self, now: DateTime<Utc>) -> LiveMessage {
        self.sequence = self.sequence.wrapping_add(1);
        let camera = &DEMO_CAMERAS[(self.sequence % DEMO_CAMERAS.len() as u64) as usize];
        let score = self.score();
        match self.sequence % 3 {
            1 => {
                let threat_type = THREAT_TYPES[(self.sequence / 3) as usize % THREAT_TYPES.len()];
                LiveMessage::NewAlert(demo_alert(
                    GENERATED_ALERT_ID_BASE + self.sequence,
                    camera,
                    threat_type,
                    score,
                    now,
                ))
            }
            2 => LiveMessage::ThreatUpdate(threat_level(score, now)),
            _ => {
                let status =
                    CAMERA_STATUS_CYCLE[(self.sequence / 3) as usize % CAMERA_STATUS_CYCLE.len()];
                LiveMessage::CameraStatus(CameraStatusUpdate {
                    camera_id: camera.id.to_string(),
                    status,
                    last_activity: Some(now),
                })
            }
        }
    }
}
