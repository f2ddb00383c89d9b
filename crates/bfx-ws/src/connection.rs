//! WebSocket connection manager.
//!
//! Handles connection lifecycle, the receive loop, and automatic
//! reconnection on a fixed delay with subscription replay.

use crate::error::{WsError, WsResult};
use crate::subscription::SubscriptionRegistry;
use crate::ws_write_handle::WsWriteHandle;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Delay between reconnection attempts. Fixed, retries are infinite.
    pub reconnect_delay_ms: u64,
    /// Capacity of the outbound and event channels.
    pub channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "wss://api-pub.bitfinex.com/ws/2".to_string(),
            reconnect_delay_ms: 5000,
            channel_capacity: 100,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Events forwarded from the receive loop to the feed layer.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Socket (re)established. Channel ids from before are void.
    Connected,
    /// One decoded wire frame.
    Frame(serde_json::Value),
    /// Socket lost, reconnection in progress.
    Disconnected,
}

/// WebSocket connection manager.
///
/// At most one manager runs per process. The manager is one-shot: after
/// `close()` it cannot be reconnected, construct a new one instead.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    registry: Arc<SubscriptionRegistry>,
    message_tx: mpsc::Sender<WsEvent>,
    /// Outbound text sender (for WsWriteHandle).
    outbound_tx: mpsc::Sender<String>,
    /// Outbound text receiver (consumed by the receive loop).
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<String>>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    ///
    /// Decoded frames and connection transitions arrive on `message_tx`.
    pub fn new(config: ConnectionConfig, message_tx: mpsc::Sender<WsEvent>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.channel_capacity);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let handle = WsWriteHandle::new(outbound_tx.clone(), state.clone());
        Self {
            config,
            state,
            registry: Arc::new(SubscriptionRegistry::new(handle)),
            message_tx,
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Get the subscription registry.
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Get a write handle for sending frames.
    ///
    /// The handle can be cloned and shared across tasks.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle::new(self.outbound_tx.clone(), self.state.clone())
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and spawn the receive loop.
    ///
    /// Idempotent: returns immediately when already open or a connect is in
    /// flight. The first handshake failure surfaces to the caller; once the
    /// loop is running, later failures feed the autonomous retry cycle.
    pub async fn connect(self: &Arc<Self>) -> WsResult<()> {
        if self.is_shutdown() {
            return Err(WsError::Connection("manager shut down".to_string()));
        }

        {
            let mut state = self.state.write();
            match *state {
                ConnectionState::Open
                | ConnectionState::Connecting
                | ConnectionState::Reconnecting => {
                    debug!(state = %*state, "connect() is a no-op in this state");
                    return Ok(());
                }
                ConnectionState::Closing => {
                    return Err(WsError::Connection("connection is closing".to_string()));
                }
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
        }

        info!(url = %self.config.url, "Connecting to WebSocket");
        let stream = match Self::dial(&self.config.url).await {
            Ok(stream) => stream,
            Err(e) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        *self.state.write() = ConnectionState::Open;
        info!("WebSocket connected");
        self.emit(WsEvent::Connected).await;

        let manager = Arc::clone(self);
        tokio::spawn(manager.run(stream));
        Ok(())
    }

    /// Serialize a frame and queue it for sending.
    ///
    /// Only legal while the connection is Open.
    pub async fn send<T: Serialize>(&self, frame: &T) -> WsResult<()> {
        if self.state() != ConnectionState::Open {
            return Err(WsError::NotConnected);
        }
        let text = serde_json::to_string(frame)?;
        self.outbound_tx
            .send(text)
            .await
            .map_err(|_| WsError::NotConnected)
    }

    /// Request a graceful close.
    ///
    /// Idempotent. The receive loop sends the close frame, unwinds, and
    /// leaves the state Disconnected.
    pub fn close(&self) {
        if self.shutdown_token.is_cancelled() {
            return;
        }
        info!("Close requested");
        {
            let mut state = self.state.write();
            if *state != ConnectionState::Disconnected {
                *state = ConnectionState::Closing;
            }
        }
        self.shutdown_token.cancel();
    }

    async fn dial(url: &str) -> WsResult<WsStream> {
        let (stream, _response) = connect_async_tls_with_config(url, None, true, None)
            .await
            .map_err(|e| WsError::Connection(e.to_string()))?;
        Ok(stream)
    }

    async fn emit(&self, event: WsEvent) {
        if self.message_tx.send(event).await.is_err() {
            warn!("Event receiver dropped");
        }
    }

    /// Outer loop: run the socket until it drops, then reconnect forever.
    async fn run(self: Arc<Self>, stream: WsStream) {
        let mut stream = stream;
        loop {
            match self.run_stream(stream).await {
                Ok(()) => info!("WebSocket connection closed"),
                Err(e) => error!(error = %e, "WebSocket connection error"),
            }

            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return;
            }

            *self.state.write() = ConnectionState::Reconnecting;
            self.emit(WsEvent::Disconnected).await;

            stream = match self.reconnect().await {
                Some(stream) => stream,
                None => return,
            };
        }
    }

    /// Retry the handshake on a fixed delay until it succeeds or shutdown.
    async fn reconnect(&self) -> Option<WsStream> {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        loop {
            warn!(delay_ms = self.config.reconnect_delay_ms, "Reconnecting after delay");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect delay");
                    *self.state.write() = ConnectionState::Disconnected;
                    return None;
                }
            }

            *self.state.write() = ConnectionState::Connecting;
            match Self::dial(&self.config.url).await {
                Ok(stream) => {
                    *self.state.write() = ConnectionState::Open;
                    info!("WebSocket reconnected");
                    self.emit(WsEvent::Connected).await;

                    // Replay drains through the outbound channel while the
                    // receive loop resumes, so it runs on its own task.
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        if let Err(e) = registry.replay_all().await {
                            warn!(error = %e, "Subscription replay failed");
                        }
                    });

                    return Some(stream);
                }
                Err(e) => {
                    error!(error = %e, "Reconnect attempt failed");
                    *self.state.write() = ConnectionState::Reconnecting;
                }
            }
        }
    }

    /// Receive loop for one socket lifetime.
    async fn run_stream(&self, stream: WsStream) -> WsResult<()> {
        let (mut write, mut read) = stream.split();

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                // Shutdown signal, highest priority.
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in receive loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                // Incoming message.
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_frame(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                // Outbound frame.
                outbound = outbound_recv => {
                    if let Some(text) = outbound {
                        write.send(Message::Text(text)).await?;
                    }
                }
            }
        }
    }

    /// Decode one text frame and forward it.
    ///
    /// Malformed input is logged and dropped; the loop never dies on it.
    async fn handle_text_frame(&self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };
        self.emit(WsEvent::Frame(value)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> (Arc<ConnectionManager>, mpsc::Receiver<WsEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let manager = Arc::new(ConnectionManager::new(ConnectionConfig::default(), tx));
        (manager, rx)
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.url, "wss://api-pub.bitfinex.com/ws/2");
        assert_eq!(config.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }

    #[tokio::test]
    async fn test_send_fails_when_not_open() {
        let (manager, _rx) = test_manager();

        let result = manager.send(&serde_json::json!({"event": "ping"})).await;
        assert!(matches!(result, Err(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (manager, _rx) = test_manager();

        manager.close();
        manager.close();
        assert!(manager.is_shutdown());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_after_close_fails() {
        let (manager, _rx) = test_manager();

        manager.close();
        let result = manager.connect().await;
        assert!(matches!(result, Err(WsError::Connection(_))));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let (manager, mut rx) = test_manager();

        manager.handle_text_frame("{not json").await;
        manager.handle_text_frame("[1, \"hb\"]").await;

        match rx.recv().await.unwrap() {
            WsEvent::Frame(value) => assert!(value.is_array()),
            other => panic!("expected frame, got {other:?}"),
        }
    }
}
