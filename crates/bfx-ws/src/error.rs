//! Error types for bfx-ws.

use thiserror::Error;

/// WebSocket error types.
#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Not connected")]
    NotConnected,

    #[error("WebSocket protocol error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for WebSocket operations.
pub type WsResult<T> = std::result::Result<T, WsError>;
