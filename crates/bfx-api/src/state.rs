//! Shared handler state.

use bfx_feed::SnapshotCache;
use bfx_rest::RestClient;
use bfx_ws::{SubscriptionRegistry, WsWriteHandle};
use std::sync::Arc;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) cache: Arc<SnapshotCache>,
    pub(crate) rest: Arc<RestClient>,
    pub(crate) registry: Arc<SubscriptionRegistry>,
    pub(crate) connection: WsWriteHandle,
}

impl ApiState {
    pub fn new(
        cache: Arc<SnapshotCache>,
        rest: Arc<RestClient>,
        registry: Arc<SubscriptionRegistry>,
        connection: WsWriteHandle,
    ) -> Self {
        Self {
            cache,
            rest,
            registry,
            connection,
        }
    }
}
