//! Dashboard controller and runtime for the Vigil surveillance console.
//!
//! Owns the dashboard state (alerts, camera feeds, threat level, history),
//! dispatches live and simulated push messages into it, executes operator
//! alert actions through the remote data gateway, and publishes read-only
//! views for the presentation layer.

pub mod controller;
pub mod gateway;
pub mod live_message;
pub mod notice;
pub mod runtime;
pub mod types;


pub use controller::{
    AlertActionRequest, AlertModal, DashboardController, DashboardView, DispatchOutcome,
    LoadTicket,
};
pub use gateway::{GatewayError, RemoteDataGateway};
pub use live_message::{
    parse_live_message, CameraStatusUpdate, LiveConnectionStatus, LiveMessage, LiveMessageError,
    MessageSource,
};
pub use notice::{Notice, NoticeKind, NotificationSurface, ToastQueue, ToastQueueConfig};
pub use runtime::{
    start_dashboard_runtime, DashboardRuntimeConfig, DashboardRuntimeError,
    DashboardRuntimeHandle, DashboardRuntimeSources, OperatorIntent,
};
pub use types::*;
