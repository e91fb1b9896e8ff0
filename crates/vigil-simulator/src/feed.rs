use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use vigil_dashboard::LiveMessage;

use crate::scenario::SimulatedMessageGenerator;

const DEFAULT_SIMULATION_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedFeedConfig {
    pub interval: Duration,
}

impl Default for SimulatedFeedConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SIMULATION_INTERVAL,
        }
    }
}

pub struct SimulatedFeedHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedFeedHandle {
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

/// Starts the simulated feed. One message is emitted per interval while
/// `enabled` reads true; nothing is emitted or buffered while it is false.
pub fn start_simulated_feed(
    config: SimulatedFeedConfig,
    enabled: watch::Receiver<bool>,
    messages: mpsc::Sender<LiveMessage>,
) -> Result<SimulatedFeedHandle> {
    if config.interval.is_zero() {
        anyhow::bail!("simulated feed interval must be greater than zero");
    }
    let handle = tokio::runtime::Handle::try_current()
        .context("simulated feed requires an active Tokio runtime")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = handle.spawn(async move {
        run_simulated_feed(config, enabled, messages, shutdown_rx).await;
    });
    Ok(SimulatedFeedHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn run_simulated_feed(
    config: SimulatedFeedConfig,
    mut enabled: watch::Receiver<bool>,
    messages: mpsc::Sender<LiveMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut generator = SimulatedMessageGenerator::new();
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; consume it so emission starts one
    // full interval after the feed is enabled.
    interval.tick().await;
    let mut active = *enabled.borrow_and_update();
    let mut enabled_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            changed = enabled.changed(), if enabled_open => {
                if changed.is_err() {
                    enabled_open = false;
                    active = false;
                    continue;
                }
                let now_active = *enabled.borrow_and_update();
                if now_active != active {
                    tracing::info!(enabled = now_active, "simulated feed toggled");
                    if now_active {
                        interval.reset();
                    }
                    active = now_active;
                }
            }
            _ = interval.tick() => {
                if !active {
                    continue;
                }
                let message = generator.next_message(Utc::now());
                tracing::debug!(kind = message.kind(), sequence = generator.sequence(), "simulated message emitted");
                if messages.send(message).await.is_err() {
                    tracing::debug!("simulated feed receiver closed");
                    break;
                }
            }
        }
    }
}
