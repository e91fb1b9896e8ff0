use std::time::Duration;

use clap::{ArgAction, Parser};
use vigil_dashboard::DashboardRuntimeConfig;
use vigil_remote::{HttpGatewayConfig, LiveConnectionConfig};
use vigil_simulator::SimulatedFeedConfig;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "vigil",
    about = "Surveillance dashboard controller with live and simulated feeds",
    version
)]
pub struct Cli {
    #[arg(
        long = "ws-url",
        env = "VIGIL_WS_URL",
        default_value = "ws://localhost:8000/ws/live-feed/",
        help = "WebSocket endpoint of the live surveillance feed"
    )]
    pub ws_url: String,

    #[arg(
        long = "api-base",
        env = "VIGIL_API_BASE",
        default_value = "http://localhost:8000/api",
        help = "Base URL of the dashboard REST API"
    )]
    pub api_base: String,

    #[arg(
        long,
        env = "VIGIL_BIND",
        default_value = "127.0.0.1:3000",
        help = "Socket address the dashboard HTTP server binds to"
    )]
    pub bind: String,

    #[arg(
        long = "refresh-interval-seconds",
        env = "VIGIL_REFRESH_INTERVAL_SECONDS",
        default_value_t = 30,
        value_parser = parse_positive_u64,
        help = "Seconds between periodic dashboard snapshot reloads"
    )]
    pub refresh_interval_seconds: u64,

    #[arg(
        long = "simulation-interval-ms",
        env = "VIGIL_SIMULATION_INTERVAL_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Milliseconds between simulated feed messages while demo mode is active"
    )]
    pub simulation_interval_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "VIGIL_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each dashboard API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "VIGIL_RECONNECT_DELAY_MS",
        default_value_t = 3_000,
        value_parser = parse_positive_u64,
        help = "Base live feed reconnect delay; grows with each consecutive failure"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "max-reconnect-delay-ms",
        env = "VIGIL_MAX_RECONNECT_DELAY_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Upper bound on the live feed reconnect delay"
    )]
    pub max_reconnect_delay_ms: u64,

    #[arg(
        long = "max-reconnect-attempts",
        env = "VIGIL_MAX_RECONNECT_ATTEMPTS",
        default_value_t = 10,
        value_parser = parse_positive_u32,
        help = "Consecutive live feed failures before waiting for a manual reconnect"
    )]
    pub max_reconnect_attempts: u32,

    #[arg(
        long = "live-connect-timeout-ms",
        env = "VIGIL_LIVE_CONNECT_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each live feed WebSocket handshake"
    )]
    pub live_connect_timeout_ms: u64,

    #[arg(
        long = "demo-fallback",
        env = "VIGIL_DEMO_FALLBACK",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Serve the built-in demo snapshot when the dashboard API is unreachable"
    )]
    pub demo_fallback: bool,

    #[arg(
        long = "log-json",
        env = "VIGIL_LOG_JSON",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Emit structured JSON logs instead of compact text"
    )]
    pub log_json: bool,
}

impl Cli {
    pub fn runtime_config(&self) -> DashboardRuntimeConfig {
        DashboardRuntimeConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_seconds),
            ..DashboardRuntimeConfig::default()
        }
    }

    pub fn http_gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            api_base: self.api_base.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn live_connection_config(&self) -> LiveConnectionConfig {
        LiveConnectionConfig {
            url: self.ws_url.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(
                self.max_reconnect_delay_ms.max(self.reconnect_delay_ms),
            ),
            max_attempts: self.max_reconnect_attempts,
            connect_timeout: Duration::from_millis(self.live_connect_timeout_ms),
        }
    }

    pub fn simulated_feed_config(&self) -> SimulatedFeedConfig {
        SimulatedFeedConfig {
            interval: Duration::from_millis(self.simulation_interval_ms),
        }
    }
}
