//! Network transports for the Vigil dashboard: the HTTP remote data gateway
//! and the WebSocket live connection.

pub mod http_gateway;
pub mod live_connection;

pub use http_gateway::{HttpDashboardGateway, HttpGatewayConfig};
pub use live_connection::{start_live_connection, LiveConnectionConfig, LiveConnectionHandle};
