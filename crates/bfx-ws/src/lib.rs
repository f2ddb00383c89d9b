//! WebSocket client for the Bitfinex public feed.
//!
//! Provides robust WebSocket connectivity with:
//! - Connection lifecycle management (connect/send/close)
//! - Automatic reconnection on a fixed delay
//! - Subscription bookkeeping with replay after reconnect
//! - Channel-based message forwarding to the feed layer

pub mod connection;
pub mod error;
pub mod subscription;
pub mod wire;
pub mod ws_write_handle;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, WsEvent};
pub use error::{WsError, WsResult};
pub use subscription::SubscriptionRegistry;
pub use wire::WsRequest;
pub use ws_write_handle::WsWriteHandle;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
