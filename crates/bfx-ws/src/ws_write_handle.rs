//! WebSocket write handle for sending frames.
//!
//! Provides a channel-based sending API that is reconnect-safe and avoids
//! lifetime issues with direct socket access. The receive loop drains the
//! channel and performs the actual socket writes.

use crate::connection::ConnectionState;
use crate::error::{WsError, WsResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Write handle for sending text frames to the WebSocket.
///
/// The handle can be cloned and shared across tasks. Sends are only legal
/// while the connection is Open; anything else fails `WsError::NotConnected`.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<String>,
    state: Arc<RwLock<ConnectionState>>,
}

impl WsWriteHandle {
    /// Create a new write handle.
    pub fn new(tx: mpsc::Sender<String>, state: Arc<RwLock<ConnectionState>>) -> Self {
        Self { tx, state }
    }

    /// Queue a text frame for sending.
    pub async fn send_text(&self, text: String) -> WsResult<()> {
        if !self.is_connected() {
            return Err(WsError::NotConnected);
        }
        self.tx.send(text).await.map_err(|_| WsError::NotConnected)
    }

    /// Check if the connection is open and the outbound channel is alive.
    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Open && !self.tx.is_closed()
    }

    /// Get current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle(
        state: ConnectionState,
    ) -> (WsWriteHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = WsWriteHandle::new(tx, Arc::new(RwLock::new(state)));
        (handle, rx)
    }

    #[tokio::test]
    async fn test_send_text_when_open() {
        let (handle, mut rx) = create_test_handle(ConnectionState::Open);

        handle.send_text("frame".to_string()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "frame");
    }

    #[tokio::test]
    async fn test_send_text_fails_when_disconnected() {
        let (handle, _rx) = create_test_handle(ConnectionState::Disconnected);

        let result = handle.send_text("frame".to_string()).await;
        assert!(matches!(result, Err(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_send_text_fails_while_reconnecting() {
        let (handle, _rx) = create_test_handle(ConnectionState::Reconnecting);

        let result = handle.send_text("frame".to_string()).await;
        assert!(matches!(result, Err(WsError::NotConnected)));
    }
}
