use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vigil_dashboard::{
    start_dashboard_runtime, DashboardRuntimeSources, RemoteDataGateway, ToastQueue,
    ToastQueueConfig,
};
use vigil_remote::{start_live_connection, HttpDashboardGateway};
use vigil_server::{bind_dashboard_listener, serve_dashboard, DashboardServerState};
use vigil_simulator::{start_simulated_feed, FallbackGateway};

use crate::Cli;

const LIVE_MESSAGE_CAPACITY: usize = 256;
const SIMULATED_MESSAGE_CAPACITY: usize = 16;

pub fn init_tracing(log_json: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if log_json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

fn build_gateway(cli: &Cli) -> Result<Arc<dyn RemoteDataGateway>> {
    let http = HttpDashboardGateway::new(cli.http_gateway_config())?;
    tracing::info!(api_base = %http.api_base(), demo_fallback = cli.demo_fallback, "dashboard gateway ready");
    if cli.demo_fallback {
        Ok(Arc::new(FallbackGateway::new(Arc::new(http))))
    } else {
        Ok(Arc::new(http))
    }
}

/// Wires the gateway, live connection, runtime, simulated feed, and HTTP
/// server, then serves until ctrl-c.
pub async fn run_dashboard(cli: Cli) -> Result<()> {
    let notices = Arc::new(ToastQueue::new(ToastQueueConfig::default()));
    let gateway = build_gateway(&cli)?;

    let (live_tx, live_rx) = mpsc::channel(LIVE_MESSAGE_CAPACITY);
    let mut live = start_live_connection(cli.live_connection_config(), live_tx)
        .context("failed to start live feed connection")?;

    let (simulated_tx, simulated_rx) = mpsc::channel(SIMULATED_MESSAGE_CAPACITY);
    let mut runtime = start_dashboard_runtime(
        cli.runtime_config(),
        gateway,
        notices.clone(),
        DashboardRuntimeSources {
            live_status: live.subscribe_status(),
            live_messages: live_rx,
            simulated_messages: simulated_rx,
        },
    )
    .context("failed to start dashboard runtime")?;

    let mut simulator = start_simulated_feed(
        cli.simulated_feed_config(),
        runtime.simulation_enabled(),
        simulated_tx,
    )
    .context("failed to start simulated feed")?;

    let state = DashboardServerState::new(runtime.subscribe_view(), runtime.intents(), notices)
        .with_reconnect_trigger(live.reconnect_trigger());
    let served = match bind_dashboard_listener(&cli.bind).await {
        Ok(listener) => {
            serve_dashboard(listener, state, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
        }
        Err(error) => Err(error),
    };

    simulator.shutdown().await;
    live.shutdown().await;
    runtime.shutdown().await;
    tracing::info!("vigil dashboard stopped");
    served
}
