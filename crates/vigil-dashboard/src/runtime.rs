//! Dashboard runtime: the single task that owns the controller.
//!
//! The loop processes one event at a time: refresh ticks, live connection
//! status changes, live and simulated push messages, operator intents, and
//! completions of gateway calls running in a `JoinSet`. After each event it
//! publishes a fresh [`DashboardView`] and the simulation-enabled flag over
//! `watch` channels.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::controller::{AlertActionRequest, DashboardController, DashboardView, LoadTicket};
use crate::gateway::{GatewayError, RemoteDataGateway};
use crate::live_message::{LiveConnectionStatus, LiveMessage, MessageSource};
use crate::notice::NotificationSurface;
use crate::types::{AlertAction, DashboardSnapshot};

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_INTENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRuntimeConfig {
    pub refresh_interval: Duration,
    pub intent_capacity: usize,
}

impl Default for DashboardRuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            intent_capacity: DEFAULT_INTENT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Operator request submitted by presentation.
pub enum OperatorIntent {
    AlertAction {
        alert_id: String,
        action: AlertAction,
    },
    /// Action on whichever alert the modal currently shows.
    ModalAction(AlertAction),
    DismissModal,
}

/// Push sources consumed by the runtime.
pub struct DashboardRuntimeSources {
    pub live_status: watch::Receiver<LiveConnectionStatus>,
    pub live_messages: mpsc::Receiver<LiveMessage>,
    pub simulated_messages: mpsc::Receiver<LiveMessage>,
}

#[derive(Debug, Error)]
pub enum DashboardRuntimeError {
    #[error("dashboard refresh interval must be greater than zero")]
    ZeroRefreshInterval,
    #[error("dashboard runtime requires an active Tokio runtime: {0}")]
    NoTokioRuntime(#[source] tokio::runtime::TryCurrentError),
}

pub struct DashboardRuntimeHandle {
    view_rx: watch::Receiver<DashboardView>,
    simulation_rx: watch::Receiver<bool>,
    intent_tx: mpsc::Sender<OperatorIntent>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DashboardRuntimeHandle {
    /// Returns a copy of the most recently published view.
    pub fn view(&self) -> DashboardView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<DashboardView> {
        self.view_rx.clone()
    }

    /// Receiver for the flag that gates the simulated feed.
    pub fn simulation_enabled(&self) -> watch::Receiver<bool> {
        self.simulation_rx.clone()
    }

    pub fn intents(&self) -> mpsc::Sender<OperatorIntent> {
        self.intent_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

enum RuntimeCompletion {
    Load {
        ticket: LoadTicket,
        result: Result<DashboardSnapshot, GatewayError>,
    },
    AlertAction {
        request: AlertActionRequest,
        result: Result<(), GatewayError>,
    },
}

pub fn start_dashboard_runtime(
    config: DashboardRuntimeConfig,
    gateway: Arc<dyn RemoteDataGateway>,
    notices: Arc<dyn NotificationSurface>,
    sources: DashboardRuntimeSources,
) -> Result<DashboardRuntimeHandle, DashboardRuntimeError> {
    if config.refresh_interval.is_zero() {
        return Err(DashboardRuntimeError::ZeroRefreshInterval);
    }
    let handle =
        tokio::runtime::Handle::try_current().map_err(DashboardRuntimeError::NoTokioRuntime)?;

    let controller = DashboardController::new(notices);
    let (view_tx, view_rx) = watch::channel(controller.view());
    let (simulation_tx, simulation_rx) = watch::channel(controller.simulation_enabled());
    let (intent_tx, intent_rx) = mpsc::channel(config.intent_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tracing::info!(
        refresh_interval_ms = u64::try_from(config.refresh_interval.as_millis()).unwrap_or(u64::MAX),
        "dashboard runtime starting"
    );
    let task = handle.spawn(
        DashboardRuntimeLoop {
            controller,
            gateway,
            in_flight: JoinSet::new(),
            load_in_flight: false,
            view_tx,
            simulation_tx,
        }
        .run(config, sources, intent_rx, shutdown_rx),
    );

    Ok(DashboardRuntimeHandle {
        view_rx,
        simulation_rx,
        intent_tx,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

struct DashboardRuntimeLoop {
    controller: DashboardController,
    gateway: Arc<dyn RemoteDataGateway>,
    in_flight: JoinSet<RuntimeCompletion>,
    load_in_flight: bool,
    view_tx: watch::Sender<DashboardView>,
    simulation_tx: watch::Sender<bool>,
}

impl DashboardRuntimeLoop {
    async fn run(
        mut self,
        config: DashboardRuntimeConfig,
        mut sources: DashboardRuntimeSources,
        mut intent_rx: mpsc::Receiver<OperatorIntent>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let mut refresh = tokio::time::interval(config.refresh_interval);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut live_status_open = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    break;
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok(completion) => self.apply_completion(completion),
                        Err(error) => {
                            tracing::warn!(%error, "dashboard gateway task failed");
                            self.load_in_flight = false;
                        }
                    }
                }
                changed = sources.live_status.changed(), if live_status_open => {
                    if changed.is_ok() {
                        let status = sources.live_status.borrow_and_update().clone();
                        self.controller.set_live_status(status);
                    } else {
                        live_status_open = false;
                        self.controller.set_live_status(LiveConnectionStatus::default());
                    }
                }
                Some(message) = sources.live_messages.recv() => {
                    self.controller.dispatch(MessageSource::Live, message);
                }
                Some(intent) = intent_rx.recv() => {
                    self.apply_intent(intent);
                }
                Some(message) = sources.simulated_messages.recv() => {
                    self.controller.dispatch(MessageSource::Simulated, message);
                }
                _ = refresh.tick() => {
                    self.start_load();
                }
            }
            self.publish();
        }

        self.in_flight.abort_all();
        tracing::info!("dashboard runtime stopped");
    }

    fn start_load(&mut self) {
        if self.load_in_flight {
            tracing::debug!("refresh skipped; previous snapshot load still in flight");
            return;
        }
        self.load_in_flight = true;
        let ticket = self.controller.begin_load();
        let gateway = Arc::clone(&self.gateway);
        self.in_flight.spawn(async move {
            let result = gateway.fetch_snapshot().await;
            RuntimeCompletion::Load { ticket, result }
        });
    }

    fn start_alert_action(&mut self, request: AlertActionRequest) {
        let gateway = Arc::clone(&self.gateway);
        self.in_flight.spawn(async move {
            let result = gateway
                .update_alert_status(&request.alert_id, request.action.target_status())
                .await;
            RuntimeCompletion::AlertAction { request, result }
        });
    }

    fn apply_completion(&mut self, completion: RuntimeCompletion) {
        match completion {
            RuntimeCompletion::Load { ticket, result } => {
                self.load_in_flight = false;
                self.controller.complete_load(ticket, result);
            }
            RuntimeCompletion::AlertAction { request, result } => {
                self.controller.complete_alert_action(&request, result);
            }
        }
    }

    fn apply_intent(&mut self, intent: OperatorIntent) {
        tracing::debug!(?intent, "operator intent received");
        match intent {
            OperatorIntent::AlertAction { alert_id, action } => {
                let request = self.controller.request_alert_action(alert_id, action);
                self.start_alert_action(request);
            }
            OperatorIntent::ModalAction(action) => {
                match self.controller.request_modal_action(action) {
                    Some(request) => self.start_alert_action(request),
                    None => tracing::debug!(
                        action = action.as_str(),
                        "modal action ignored; modal is closed"
                    ),
                }
            }
            OperatorIntent::DismissModal => self.controller.dismiss_modal(),
        }
    }

    fn publish(&self) {
        let next = self.controller.view();
        self.view_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        let simulation_enabled = self.controller.simulation_enabled();
        self.simulation_tx.send_if_modified(|current| {
            if *current == simulation_enabled {
                return false;
            }
            *current = simulation_enabled;
            true
        });
    }
}
