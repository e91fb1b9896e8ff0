use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use vigil_dashboard::{
    parse_live_message, start_dashboard_runtime, AlertAction, AlertStatus, DashboardRuntimeConfig,
    DashboardRuntimeHandle, DashboardRuntimeSources, DashboardSnapshot, DashboardView,
    GatewayError, LiveConnectionStatus, LiveMessage, OperatorIntent, RemoteDataGateway,
    ToastQueue, ToastQueueConfig,
};
use vigil_server::{serve_dashboard, DashboardServerState};
use vigil_simulator::{start_simulated_feed, FallbackGateway, SimulatedFeedConfig};

const WAIT: Duration = Duration::from_secs(5);

struct ScriptedGateway {
    snapshots: AsyncMutex<VecDeque<Result<DashboardSnapshot, GatewayError>>>,
    updates: AsyncMutex<Vec<(String, AlertStatus)>>,
}

impl ScriptedGateway {
    fn new(snapshots: Vec<Result<DashboardSnapshot, GatewayError>>) -> Self {
        Self {
            snapshots: AsyncMutex::new(VecDeque::from(snapshots)),
            updates: AsyncMutex::new(Vec::new()),
        }
    }

    fn offline() -> Self {
        Self::new(Vec::new())
    }

    async fn updates(&self) -> Vec<(String, AlertStatus)> {
        self.updates.lock().await.clone()
    }
}

#[async_trait]
impl RemoteDataGateway for ScriptedGateway {
    async fn fetch_snapshot(&self) -> Result<DashboardSnapshot, GatewayError> {
        self.snapshots
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Unavailable("connection refused".to_string())))
    }

    async fn update_alert_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<(), GatewayError> {
        self.updates
            .lock()
            .await
            .push((alert_id.to_string(), status));
        Ok(())
    }
}

struct Harness {
    runtime: DashboardRuntimeHandle,
    notices: Arc<ToastQueue>,
    live_status: watch::Sender<LiveConnectionStatus>,
    live_messages: mpsc::Sender<LiveMessage>,
    simulated_messages: mpsc::Sender<LiveMessage>,
}

fn start_harness(gateway: Arc<dyn RemoteDataGateway>) -> Harness {
    let notices = Arc::new(ToastQueue::new(ToastQueueConfig {
        ttl: Duration::from_secs(3_600),
        max_visible: 50,
    }));
    let (live_status, live_status_rx) = watch::channel(LiveConnectionStatus::default());
    let (live_messages, live_rx) = mpsc::channel(16);
    let (simulated_messages, simulated_rx) = mpsc::channel(16);
    let runtime = start_dashboard_runtime(
        DashboardRuntimeConfig::default(),
        gateway,
        notices.clone(),
        DashboardRuntimeSources {
            live_status: live_status_rx,
            live_messages: live_rx,
            simulated_messages: simulated_rx,
        },
    )
    .expect("start runtime");
    Harness {
        runtime,
        notices,
        live_status,
        live_messages,
        simulated_messages,
    }
}

async fn wait_for_view(
    runtime: &DashboardRuntimeHandle,
    predicate: impl FnMut(&DashboardView) -> bool,
) -> DashboardView {
    let mut views = runtime.subscribe_view();
    let view = tokio::time::timeout(WAIT, views.wait_for(predicate))
        .await
        .expect("view within timeout")
        .expect("view channel open")
        .clone();
    view
}

fn notice_titles(notices: &ToastQueue) -> Vec<String> {
    notices
        .snapshot()
        .into_iter()
        .map(|notice| notice.title)
        .collect()
}

fn backend_snapshot() -> DashboardSnapshot {
    serde_json::from_value(json!({
        "alerts": [{
            "id": "evt-1",
            "cameraId": "CAM-01",
            "type": "loitering",
            "threatScore": 35,
            "status": "new",
            "createdAt": Utc::now().to_rfc3339()
        }],
        "cameraFeeds": [
            {"id": "CAM-01", "name": "Lobby", "status": "active"},
            {"id": "CAM-02", "name": "Dock", "status": "active"}
        ],
        "threatLevel": {
            "score": 22,
            "label": "Low",
            "level": "low",
            "lastUpdated": Utc::now().to_rfc3339()
        }
    }))
    .expect("snapshot")
}

fn live_frame(raw: serde_json::Value) -> LiveMessage {
    parse_live_message(&raw.to_string()).expect("live frame")
}

#[tokio::test]
async fn integration_live_alert_opens_modal_and_modal_action_persists() {
    let gateway = Arc::new(ScriptedGateway::new(vec![Ok(backend_snapshot())]));
    let mut harness = start_harness(gateway.clone());

    let loaded = wait_for_view(&harness.runtime, |view| !view.loading).await;
    assert!(loaded.backend_connected);
    assert!(!loaded.simulation_enabled);

    harness.live_status.send_replace(LiveConnectionStatus {
        connected: true,
        attempts: 0,
        last_error: None,
    });
    harness
        .live_messages
        .send(live_frame(json!({
            "type": "new_alert",
            "payload": {
                "id": "evt-9",
                "cameraId": "CAM-02",
                "type": "weapon",
                "threatScore": 92,
                "createdAt": Utc::now().to_rfc3339()
            }
        })))
        .await
        .expect("send live alert");

    let with_modal = wait_for_view(&harness.runtime, |view| view.modal.is_open()).await;
    assert_eq!(with_modal.alerts[0].id, "evt-9");
    assert_eq!(with_modal.alerts.len(), 2);

    harness
        .runtime
        .intents()
        .send(OperatorIntent::ModalAction(AlertAction::Acknowledge))
        .await
        .expect("send modal intent");
    let acknowledged = wait_for_view(&harness.runtime, |view| {
        view.alerts[0].status == AlertStatus::Acknowledged
    })
    .await;
    assert_eq!(
        acknowledged.modal.alert().map(|alert| alert.status),
        Some(AlertStatus::Acknowledged)
    );
    assert_eq!(acknowledged.alerts[1].status, AlertStatus::New);
    assert_eq!(
        gateway.updates().await,
        vec![("evt-9".to_string(), AlertStatus::Acknowledged)]
    );

    harness
        .runtime
        .intents()
        .send(OperatorIntent::DismissModal)
        .await
        .expect("send dismiss");
    wait_for_view(&harness.runtime, |view| !view.modal.is_open()).await;

    let titles = notice_titles(&harness.notices);
    assert!(titles.contains(&"Backend Connected".to_string()));
    assert!(titles.contains(&"New Threat Detected".to_string()));
    assert!(titles.contains(&"Alert Acknowledged".to_string()));

    harness.runtime.shutdown().await;
}

#[tokio::test]
async fn integration_offline_backend_runs_simulated_feed_until_live_connects() {
    let gateway = Arc::new(ScriptedGateway::offline());
    let mut harness = start_harness(gateway);
    let mut simulator = start_simulated_feed(
        SimulatedFeedConfig {
            interval: Duration::from_millis(20),
        },
        harness.runtime.simulation_enabled(),
        harness.simulated_messages.clone(),
    )
    .expect("start simulator");

    let offline = wait_for_view(&harness.runtime, |view| !view.loading).await;
    assert!(!offline.backend_connected);
    assert!(offline.load_error.is_some());
    assert!(notice_titles(&harness.notices).contains(&"Backend Offline".to_string()));

    let simulated = wait_for_view(&harness.runtime, |view| !view.alerts.is_empty()).await;
    assert!(simulated.simulation_enabled);
    assert!(simulated.alerts[0].id.starts_with("ALT-"));

    harness.live_status.send_replace(LiveConnectionStatus {
        connected: true,
        attempts: 0,
        last_error: None,
    });
    let live = wait_for_view(&harness.runtime, |view| !view.simulation_enabled).await;
    assert!(live.live_connection.connected);

    let mut simulation = harness.runtime.simulation_enabled();
    tokio::time::timeout(WAIT, simulation.wait_for(|enabled| !*enabled))
        .await
        .expect("flag within timeout")
        .expect("flag channel open");

    simulator.shutdown().await;
    harness.runtime.shutdown().await;
}

#[tokio::test]
async fn integration_fallback_gateway_serves_demo_data_and_local_actions() {
    let gateway = Arc::new(FallbackGateway::new(Arc::new(ScriptedGateway::offline())));
    let mut harness = start_harness(gateway);

    let demo = wait_for_view(&harness.runtime, |view| !view.loading).await;
    assert!(!demo.backend_connected);
    assert!(demo.demo_mode());
    assert_eq!(demo.alerts.len(), 6);
    assert!(demo.load_error.is_some());
    let titles = notice_titles(&harness.notices);
    assert!(titles.contains(&"Backend Offline".to_string()));
    assert!(!titles.contains(&"Demo Mode Active".to_string()));

    let target = demo.alerts[0].id.clone();
    harness
        .runtime
        .intents()
        .send(OperatorIntent::AlertAction {
            alert_id: target.clone(),
            action: AlertAction::Escalate,
        })
        .await
        .expect("send intent");
    let escalated = wait_for_view(&harness.runtime, |view| {
        view.alerts
            .iter()
            .any(|alert| alert.id == target && alert.status == AlertStatus::Escalated)
    })
    .await;
    assert_eq!(
        escalated
            .alerts
            .iter()
            .filter(|alert| alert.status == AlertStatus::Escalated)
            .count(),
        1
    );
    assert!(notice_titles(&harness.notices).contains(&"Alert Escalated".to_string()));

    harness.runtime.shutdown().await;
}

#[tokio::test]
async fn integration_http_intent_reaches_runtime_and_view_endpoint() {
    let gateway = Arc::new(ScriptedGateway::new(vec![Ok(backend_snapshot())]));
    let mut harness = start_harness(gateway.clone());
    wait_for_view(&harness.runtime, |view| !view.loading).await;

    let state = DashboardServerState::new(
        harness.runtime.subscribe_view(),
        harness.runtime.intents(),
        harness.notices.clone(),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("resolve listener addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_dashboard(listener, state, async {
        let _ = stop_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/api/alerts/evt-1/false-positive"))
        .send()
        .await
        .expect("send intent");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    wait_for_view(&harness.runtime, |view| {
        view.alerts[0].status == AlertStatus::FalsePositive
    })
    .await;
    let body = client
        .get(format!("http://{addr}/api/view"))
        .send()
        .await
        .expect("fetch view")
        .json::<serde_json::Value>()
        .await
        .expect("view json");
    assert_eq!(body["alerts"][0]["status"], "false_positive");
    assert_eq!(body["backendConnected"], serde_json::Value::Bool(true));
    assert_eq!(
        gateway.updates().await,
        vec![("evt-1".to_string(), AlertStatus::FalsePositive)]
    );

    let _ = stop_tx.send(());
    tokio::time::timeout(WAIT, server)
        .await
        .expect("server stops within timeout")
        .expect("server task joins")
        .expect("server exits cleanly");
    harness.runtime.shutdown().await;
}
