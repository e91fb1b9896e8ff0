//! HTTP presentation surface for the Vigil dashboard.
//!
//! Serves the server-rendered page, a JSON view, a server-sent event stream
//! of view changes, and the intent endpoints that feed operator actions
//! into the dashboard runtime.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Notify};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use vigil_core::current_unix_timestamp_ms;
use vigil_dashboard::{AlertAction, DashboardView, OperatorIntent, ToastQueue};
use vigil_dashboard_ui::{render_dashboard_document, DashboardPageContext};

pub const DASHBOARD_PAGE_ENDPOINT: &str = "/";
pub const VIEW_ENDPOINT: &str = "/api/view";
pub const VIEW_STREAM_ENDPOINT: &str = "/api/view/stream";
pub const ALERT_ACTION_ENDPOINT: &str = "/api/alerts/{alert_id}/{action}";
pub const MODAL_DISMISS_ENDPOINT: &str = "/api/modal/dismiss";
pub const MODAL_ACTION_ENDPOINT: &str = "/api/modal/{action}";
pub const LIVE_RECONNECT_ENDPOINT: &str = "/api/live/reconnect";
pub const NOTICES_ENDPOINT: &str = "/api/notices";
pub const NOTICE_ENDPOINT: &str = "/api/notices/{notice_id}";
pub const HEALTH_ENDPOINT: &str = "/healthz";

const VIEW_EVENT: &str = "view";

#[derive(Clone)]
/// Shared handler state: read side of the runtime plus the intent sender.
pub struct DashboardServerState {
    view: watch::Receiver<DashboardView>,
    intents: mpsc::Sender<OperatorIntent>,
    notices: Arc<ToastQueue>,
    reconnect: Option<Arc<Notify>>,
}

impl DashboardServerState {
    pub fn new(
        view: watch::Receiver<DashboardView>,
        intents: mpsc::Sender<OperatorIntent>,
        notices: Arc<ToastQueue>,
    ) -> Self {
        Self {
            view,
            intents,
            notices,
            reconnect: None,
        }
    }

    /// Enables `POST /api/live/reconnect`.
    pub fn with_reconnect_trigger(mut self, reconnect: Arc<Notify>) -> Self {
        self.reconnect = Some(reconnect);
        self
    }

    fn current_view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    async fn submit(&self, intent: OperatorIntent) -> Result<(), DashboardApiError> {
        tracing::debug!(?intent, "operator intent submitted");
        self.intents
            .send(intent)
            .await
            .map_err(|_| DashboardApiError::runtime_unavailable())
    }
}

#[derive(Debug)]
struct DashboardApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl DashboardApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unknown_action(raw: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unknown_action",
            format!("unsupported alert action '{raw}'"),
        )
    }

    fn runtime_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "runtime_unavailable",
            "dashboard runtime is not running",
        )
    }
}

impl IntoResponse for DashboardApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

fn accepted(intent: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": true, "intent": intent })),
    )
        .into_response()
}

fn parse_action(raw: &str) -> Result<AlertAction, DashboardApiError> {
    AlertAction::parse(raw).ok_or_else(|| DashboardApiError::unknown_action(raw))
}

pub fn build_dashboard_router(state: DashboardServerState) -> Router {
    Router::new()
        .route(DASHBOARD_PAGE_ENDPOINT, get(handle_dashboard_page))
        .route(VIEW_ENDPOINT, get(handle_view))
        .route(VIEW_STREAM_ENDPOINT, get(handle_view_stream))
        .route(ALERT_ACTION_ENDPOINT, post(handle_alert_action))
        .route(MODAL_DISMISS_ENDPOINT, post(handle_modal_dismiss))
        .route(MODAL_ACTION_ENDPOINT, post(handle_modal_action))
        .route(LIVE_RECONNECT_ENDPOINT, post(handle_live_reconnect))
        .route(NOTICES_ENDPOINT, get(handle_notices))
        .route(NOTICE_ENDPOINT, delete(handle_notice_close))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

pub async fn bind_dashboard_listener(bind: &str) -> Result<TcpListener> {
    let bind_addr = bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid dashboard bind address '{bind}'"))?;
    TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard server on {bind_addr}"))
}

/// Serves the dashboard until `shutdown` resolves.
pub async fn serve_dashboard<F>(
    listener: TcpListener,
    state: DashboardServerState,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound dashboard server address")?;
    tracing::info!(addr = %local_addr, "dashboard server listening");

    axum::serve(listener, build_dashboard_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("dashboard server exited unexpectedly")?;
    tracing::info!("dashboard server stopped");
    Ok(())
}

async fn handle_dashboard_page(State(state): State<DashboardServerState>) -> Html<String> {
    let context = DashboardPageContext {
        view: state.current_view(),
        notices: state.notices.active(current_unix_timestamp_ms()),
        now: Utc::now(),
    };
    Html(render_dashboard_document(context))
}

async fn handle_view(State(state): State<DashboardServerState>) -> Json<DashboardView> {
    Json(state.current_view())
}

fn view_event(view: &DashboardView) -> Event {
    match serde_json::to_string(view) {
        Ok(payload) => Event::default().event(VIEW_EVENT).data(payload),
        Err(error) => {
            tracing::warn!(%error, "failed to encode dashboard view");
            Event::default().event(VIEW_EVENT).data("{}")
        }
    }
}

async fn handle_view_stream(State(state): State<DashboardServerState>) -> Response {
    let stream = WatchStream::new(state.view.clone())
        .map(|view| Ok::<Event, Infallible>(view_event(&view)));
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_alert_action(
    State(state): State<DashboardServerState>,
    Path((alert_id, action)): Path<(String, String)>,
) -> Response {
    let action = match parse_action(&action) {
        Ok(action) => action,
        Err(error) => return error.into_response(),
    };
    match state
        .submit(OperatorIntent::AlertAction { alert_id, action })
        .await
    {
        Ok(()) => accepted(action.as_str()),
        Err(error) => error.into_response(),
    }
}

async fn handle_modal_action(
    State(state): State<DashboardServerState>,
    Path(action): Path<String>,
) -> Response {
    let action = match parse_action(&action) {
        Ok(action) => action,
        Err(error) => return error.into_response(),
    };
    match state.submit(OperatorIntent::ModalAction(action)).await {
        Ok(()) => accepted(action.as_str()),
        Err(error) => error.into_response(),
    }
}

async fn handle_modal_dismiss(State(state): State<DashboardServerState>) -> Response {
    match state.submit(OperatorIntent::DismissModal).await {
        Ok(()) => accepted("dismiss"),
        Err(error) => error.into_response(),
    }
}

async fn handle_live_reconnect(State(state): State<DashboardServerState>) -> Response {
    match &state.reconnect {
        Some(reconnect) => {
            tracing::info!("manual live feed reconnect requested");
            reconnect.notify_one();
            accepted("reconnect")
        }
        None => DashboardApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "live_feed_disabled",
            "live feed connection is not configured",
        )
        .into_response(),
    }
}

async fn handle_notices(State(state): State<DashboardServerState>) -> Response {
    let notices = state.notices.active(current_unix_timestamp_ms());
    (StatusCode::OK, Json(json!({ "notices": notices }))).into_response()
}

async fn handle_notice_close(
    State(state): State<DashboardServerState>,
    Path(notice_id): Path<u64>,
) -> Response {
    if state.notices.remove(notice_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        DashboardApiError::new(
            StatusCode::NOT_FOUND,
            "notice_not_found",
            format!("notice {notice_id} is not visible"),
        )
        .into_response()
    }
}

async fn handle_health(State(state): State<DashboardServerState>) -> Response {
    let runtime_running = !state.intents.is_closed();
    let status = if runtime_running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if runtime_running { "ok" } else { "degraded" },
            "runtime_running": runtime_running,
            "live_connected": state.view.borrow().live_connection.connected,
        })),
    )
        .into_response()
}
