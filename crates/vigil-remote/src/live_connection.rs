//! WebSocket live connection with attempt counting and bounded reconnects.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use vigil_dashboard::{parse_live_message, LiveConnectionStatus, LiveMessage};

const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws/live-feed/";
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConnectionConfig {
    pub url: String,
    /// Base delay; the n-th consecutive failure waits `n * reconnect_delay`.
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// Consecutive failures after which only an explicit reconnect retries.
    pub max_attempts: u32,
    /// Bound on each WebSocket handshake; expiry counts as a failed attempt.
    pub connect_timeout: Duration,
}

impl Default for LiveConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl LiveConnectionConfig {
    fn delay_for_attempt(&self, failures: u32) -> Duration {
        self.reconnect_delay
            .saturating_mul(failures.max(1))
            .min(self.max_reconnect_delay)
    }
}

pub struct LiveConnectionHandle {
    status_rx: watch::Receiver<LiveConnectionStatus>,
    reconnect: Arc<Notify>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LiveConnectionHandle {
    pub fn status(&self) -> LiveConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LiveConnectionStatus> {
        self.status_rx.clone()
    }

    /// Drops the current session (if any), resets the attempt counter, and
    /// connects again without waiting for the backoff delay.
    pub fn reconnect(&self) {
        self.reconnect.notify_one();
    }

    /// Shared trigger equivalent to [`Self::reconnect`], for callers that
    /// outlive a borrow of the handle.
    pub fn reconnect_trigger(&self) -> Arc<Notify> {
        Arc::clone(&self.reconnect)
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

/// Starts the connection task. Parsed messages are forwarded to `messages`;
/// status changes are published on the handle's watch channel.
pub fn start_live_connection(
    config: LiveConnectionConfig,
    messages: mpsc::Sender<LiveMessage>,
) -> Result<LiveConnectionHandle> {
    if config.url.trim().is_empty() {
        anyhow::bail!("live connection url must not be empty");
    }
    if config.reconnect_delay.is_zero() {
        anyhow::bail!("live connection reconnect delay must be greater than zero");
    }
    if config.connect_timeout.is_zero() {
        anyhow::bail!("live connection connect timeout must be greater than zero");
    }
    let handle = tokio::runtime::Handle::try_current()
        .context("live connection requires an active Tokio runtime")?;

    let (status_tx, status_rx) = watch::channel(LiveConnectionStatus::default());
    let reconnect = Arc::new(Notify::new());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = handle.spawn(run_live_connection_loop(
        config,
        messages,
        status_tx,
        Arc::clone(&reconnect),
        shutdown_rx,
    ));

    Ok(LiveConnectionHandle {
        status_rx,
        reconnect,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

enum SessionEnd {
    Shutdown,
    ReceiverClosed,
    ReconnectRequested,
    Disconnected(String),
}

async fn run_live_connection_loop(
    config: LiveConnectionConfig,
    messages: mpsc::Sender<LiveMessage>,
    status_tx: watch::Sender<LiveConnectionStatus>,
    reconnect: Arc<Notify>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut failures = 0_u32;
    let mut last_error: Option<String> = None;

    loop {
        let connected = tokio::select! {
            _ = &mut shutdown_rx => break,
            connected = connect_with_timeout(&config) => connected,
        };

        match connected {
            Ok(stream) => {
                failures = 0;
                last_error = None;
                tracing::info!(url = %config.url, "live connection established");
                status_tx.send_replace(LiveConnectionStatus {
                    connected: true,
                    attempts: 0,
                    last_error: None,
                });

                match run_session(stream, &messages, &reconnect, &mut shutdown_rx).await {
                    SessionEnd::Shutdown | SessionEnd::ReceiverClosed => break,
                    SessionEnd::ReconnectRequested => {
                        tracing::info!("live connection reconnect requested");
                        continue;
                    }
                    SessionEnd::Disconnected(reason) => {
                        tracing::warn!(%reason, "live connection dropped");
                        last_error = Some(reason);
                    }
                }
            }
            Err(error) => {
                failures = failures.saturating_add(1);
                tracing::warn!(url = %config.url, attempt = failures, %error, "live connection attempt failed");
                last_error = Some(error);
            }
        }

        status_tx.send_replace(LiveConnectionStatus {
            connected: false,
            attempts: failures,
            last_error: last_error.clone(),
        });

        if failures >= config.max_attempts {
            tracing::warn!(
                attempts = failures,
                "live connection attempts exhausted; waiting for manual reconnect"
            );
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = reconnect.notified() => {}
            }
            failures = 0;
            continue;
        }

        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = tokio::time::sleep(config.delay_for_attempt(failures)) => {}
            _ = reconnect.notified() => {
                failures = 0;
            }
        }
    }

    status_tx.send_replace(LiveConnectionStatus {
        connected: false,
        attempts: failures,
        last_error,
    });
    tracing::info!("live connection stopped");
}

async fn connect_with_timeout(
    config: &LiveConnectionConfig,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, String> {
    match tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(error)) => Err(error.to_string()),
        Err(_) => Err(format!(
            "connection handshake timed out after {}ms",
            config.connect_timeout.as_millis()
        )),
    }
}

async fn run_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    messages: &mpsc::Sender<LiveMessage>,
    reconnect: &Notify,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = &mut *shutdown_rx => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            _ = reconnect.notified() => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return SessionEnd::ReconnectRequested;
            }
            frame = source.next() => {
                let text = match frame {
                    None => return SessionEnd::Disconnected("connection closed".to_string()),
                    Some(Err(error)) => return SessionEnd::Disconnected(error.to_string()),
                    Some(Ok(WsMessage::Text(text))) => text.as_str().to_string(),
                    Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => text.to_string(),
                        Err(error) => {
                            tracing::warn!(%error, "dropping non-utf8 live frame");
                            continue;
                        }
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = frame
                            .map(|frame| {
                                format!(
                                    "closed by server: {} {}",
                                    u16::from(frame.code),
                                    frame.reason.as_str()
                                )
                            })
                            .unwrap_or_else(|| "closed by server".to_string());
                        return SessionEnd::Disconnected(reason);
                    }
                    // Pings are answered by the protocol layer.
                    Some(Ok(_)) => continue,
                };
                match parse_live_message(&text) {
                    Ok(message) => {
                        tracing::debug!(kind = message.kind(), "live message received");
                        if messages.send(message).await.is_err() {
                            return SessionEnd::ReceiverClosed;
                        }
                    }
                    Err(error) => tracing::warn!(%error, "dropping malformed live frame"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::ws::{Message as ServerMessage, WebSocket, WebSocketUpgrade};
    use axum::extract::State;
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Clone, Default)]
    struct ScriptedFrames {
        frames: Arc<Vec<String>>,
        close_first_connection: bool,
        connections: Arc<AtomicUsize>,
    }

    async fn handle_upgrade(
        State(script): State<ScriptedFrames>,
        websocket: WebSocketUpgrade,
    ) -> Response {
        websocket.on_upgrade(move |socket| serve_frames(socket, script))
    }

    async fn serve_frames(mut socket: WebSocket, script: ScriptedFrames) {
        let connection = script.connections.fetch_add(1, Ordering::SeqCst);
        if script.close_first_connection && connection == 0 {
            let _ = socket.send(ServerMessage::Close(None)).await;
            return;
        }
        for frame in script.frames.iter() {
            if socket
                .send(ServerMessage::Text(frame.clone().into()))
                .await
                .is_err()
            {
                return;
            }
        }
        while let Some(Ok(message)) = socket.recv().await {
            if matches!(message, ServerMessage::Close(_)) {
                return;
            }
        }
    }

    async fn spawn_ws_server(script: ScriptedFrames) -> (SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener addr");
        let app = Router::new()
            .route("/ws/live-feed/", get(handle_upgrade))
            .with_state(script);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        (addr, handle)
    }

    fn config_for(url: String) -> LiveConnectionConfig {
        LiveConnectionConfig {
            url,
            reconnect_delay: Duration::from_millis(20),
            max_reconnect_delay: Duration::from_millis(50),
            max_attempts: 3,
            connect_timeout: Duration::from_secs(2),
        }
    }

    async fn wait_for_status(
        handle: &LiveConnectionHandle,
        predicate: impl FnMut(&LiveConnectionStatus) -> bool,
    ) -> LiveConnectionStatus {
        let mut status = handle.subscribe_status();
        let current = tokio::time::timeout(WAIT, status.wait_for(predicate))
            .await
            .expect("status within timeout")
            .expect("status channel open")
            .clone();
        current
    }

    #[test]
    fn unit_delay_grows_linearly_and_caps() {
        let config = LiveConnectionConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(12));
        assert_eq!(config.delay_for_attempt(25), Duration::from_secs(30));
    }

    #[test]
    fn unit_start_rejects_empty_url() {
        let (tx, _rx) = mpsc::channel(1);
        let error = start_live_connection(config_for("  ".to_string()), tx)
            .err()
            .expect("empty url rejected");
        assert!(error.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn functional_connection_forwards_parsed_frames_and_skips_bad_ones() {
        let (addr, server) = spawn_ws_server(ScriptedFrames {
            frames: Arc::new(vec![
                "not json".to_string(),
                r#"{"type":"camera_status","payload":{"cameraId":"CAM-01","status":"inactive"}}"#
                    .to_string(),
                r#"{"type":"system_health","payload":{}}"#.to_string(),
            ]),
            ..ScriptedFrames::default()
        })
        .await;
        let (tx, mut rx) = mpsc::channel(8);
        let mut handle =
            start_live_connection(config_for(format!("ws://{addr}/ws/live-feed/")), tx)
                .expect("start");

        let status = wait_for_status(&handle, |status| status.connected).await;
        assert_eq!(status.attempts, 0);

        let first = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("first message")
            .expect("channel open");
        assert_eq!(first.kind(), "camera_status");
        let second = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("second message")
            .expect("channel open");
        assert_eq!(
            second,
            LiveMessage::Unrecognized {
                kind: "system_health".to_string()
            }
        );

        handle.shutdown().await;
        assert!(!handle.is_running());
        server.abort();
    }

    #[tokio::test]
    async fn functional_failed_attempts_are_counted_and_stop_at_max() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (tx, _rx) = mpsc::channel(1);
        let mut handle =
            start_live_connection(config_for(format!("ws://{addr}/ws/live-feed/")), tx)
                .expect("start");

        let status = wait_for_status(&handle, |status| status.attempts >= 3).await;
        assert!(!status.connected);
        assert!(status.last_error.is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.status().attempts, 3);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn functional_manual_reconnect_resumes_after_exhaustion() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (tx, _rx) = mpsc::channel(1);
        let mut handle =
            start_live_connection(config_for(format!("ws://{addr}/ws/live-feed/")), tx)
                .expect("start");
        wait_for_status(&handle, |status| status.attempts >= 3).await;

        let listener = TcpListener::bind(addr).await.expect("rebind");
        let app = Router::new()
            .route("/ws/live-feed/", get(handle_upgrade))
            .with_state(ScriptedFrames::default());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        handle.reconnect_trigger().notify_one();
        let status = wait_for_status(&handle, |status| status.connected).await;
        assert_eq!(status.attempts, 0);
        assert!(status.last_error.is_none());

        handle.shutdown().await;
        server.abort();
    }

    #[tokio::test]
    async fn regression_stalled_handshake_times_out_and_counts_as_failure() {
        // Accepts TCP connections and never answers the upgrade request.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (tx, _rx) = mpsc::channel(1);
        let mut handle = start_live_connection(
            LiveConnectionConfig {
                connect_timeout: Duration::from_millis(50),
                ..config_for(format!("ws://{addr}/ws/live-feed/"))
            },
            tx,
        )
        .expect("start");

        let status = wait_for_status(&handle, |status| status.attempts >= 2).await;
        assert!(!status.connected);
        assert!(status
            .last_error
            .as_deref()
            .is_some_and(|error| error.contains("timed out")));

        handle.shutdown().await;
        server.abort();
    }

    #[test]
    fn unit_start_rejects_zero_connect_timeout() {
        let (tx, _rx) = mpsc::channel(1);
        let error = start_live_connection(
            LiveConnectionConfig {
                connect_timeout: Duration::ZERO,
                ..config_for("ws://127.0.0.1:1/ws/live-feed/".to_string())
            },
            tx,
        )
        .err()
        .expect("zero timeout rejected");
        assert!(error.to_string().contains("connect timeout"));
    }

    #[tokio::test]
    async fn regression_server_close_triggers_reconnect() {
        let script = ScriptedFrames {
            close_first_connection: true,
            ..ScriptedFrames::default()
        };
        let connections = Arc::clone(&script.connections);
        let (addr, server) = spawn_ws_server(script).await;
        let (tx, _rx) = mpsc::channel(1);
        let mut handle =
            start_live_connection(config_for(format!("ws://{addr}/ws/live-feed/")), tx)
                .expect("start");

        tokio::time::timeout(WAIT, async {
            while connections.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client reconnected after server close");
        let status = wait_for_status(&handle, |status| status.connected).await;
        assert_eq!(status.attempts, 0);

        handle.shutdown().await;
        assert!(!handle.status().connected);
        server.abort();
    }
}
