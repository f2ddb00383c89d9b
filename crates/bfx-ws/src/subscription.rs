//! Subscription registry.
//!
//! Records the set of live subscription tuples and drives the subscribe,
//! unsubscribe, and replay frames. A tuple is unique per
//! (channel, symbol, timeframe) and survives until explicitly removed.

use crate::error::WsResult;
use crate::wire::WsRequest;
use crate::ws_write_handle::WsWriteHandle;
use bfx_core::Subscription;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Registry of live subscriptions with their acknowledged channel ids.
///
/// The channel id is None until the subscribe ack arrives. Channel ids are
/// void after a reconnect; `replay_all` clears them before re-sending.
pub struct SubscriptionRegistry {
    handle: WsWriteHandle,
    entries: RwLock<HashMap<Subscription, Option<u64>>>,
}

impl SubscriptionRegistry {
    /// Create a new registry sending frames through the given handle.
    pub fn new(handle: WsWriteHandle) -> Self {
        Self {
            handle,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a stream.
    ///
    /// Records the tuple and sends the subscribe frame. A duplicate tuple is
    /// a no-op: the frame is not re-sent, since the exchange would open a
    /// second channel id for the same stream. Returns whether the tuple was
    /// newly recorded. Fails `NotConnected` when the connection is not open.
    pub async fn subscribe(&self, sub: Subscription) -> WsResult<bool> {
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&sub) {
                debug!(subscription = %sub, "Already subscribed, frame not re-sent");
                return Ok(false);
            }
            entries.insert(sub.clone(), None);
        }

        let frame = WsRequest::subscribe(&sub).to_text()?;
        if let Err(e) = self.handle.send_text(frame).await {
            self.entries.write().remove(&sub);
            return Err(e);
        }

        info!(subscription = %sub, "Subscribed");
        Ok(true)
    }

    /// Unsubscribe from a stream.
    ///
    /// Removes the record. When the connection is open and the subscribe ack
    /// has arrived, also sends the unsubscribe frame for the channel id. A
    /// tuple removed before its ack sends no frame; the late ack is then
    /// dropped downstream as unmapped. Returns whether a record was removed.
    pub async fn unsubscribe(&self, sub: &Subscription) -> WsResult<bool> {
        let chan_id = match self.entries.write().remove(sub) {
            Some(chan_id) => chan_id,
            None => {
                debug!(subscription = %sub, "Unsubscribe for unknown tuple ignored");
                return Ok(false);
            }
        };

        match chan_id {
            Some(chan_id) if self.handle.is_connected() => {
                let frame = WsRequest::unsubscribe(chan_id).to_text()?;
                self.handle.send_text(frame).await?;
                info!(subscription = %sub, chan_id, "Unsubscribed");
            }
            Some(_) => {
                debug!(subscription = %sub, "Not connected, record removed without frame");
            }
            None => {
                debug!(subscription = %sub, "Unsubscribed before ack, no frame sent");
            }
        }

        Ok(true)
    }

    /// Re-send the subscribe frame for every recorded tuple exactly once.
    ///
    /// Stale channel ids are cleared first; fresh acks will repopulate them.
    /// Invoked after a successful reconnect.
    pub async fn replay_all(&self) -> WsResult<usize> {
        let subs: Vec<Subscription> = {
            let mut entries = self.entries.write();
            for chan_id in entries.values_mut() {
                *chan_id = None;
            }
            entries.keys().cloned().collect()
        };

        for sub in &subs {
            let frame = WsRequest::subscribe(sub).to_text()?;
            self.handle.send_text(frame).await?;
        }

        info!(count = subs.len(), "Replayed subscriptions");
        Ok(subs.len())
    }

    /// Record the channel id from a subscribe ack.
    ///
    /// Returns false when the tuple is no longer recorded (late ack after
    /// unsubscribe).
    pub fn record_ack(&self, sub: &Subscription, chan_id: u64) -> bool {
        match self.entries.write().get_mut(sub) {
            Some(entry) => {
                *entry = Some(chan_id);
                debug!(subscription = %sub, chan_id, "Subscribe ack recorded");
                true
            }
            None => false,
        }
    }

    /// Look up the acknowledged channel id for a tuple.
    pub fn chan_id(&self, sub: &Subscription) -> Option<u64> {
        self.entries.read().get(sub).copied().flatten()
    }

    /// Check if a tuple is recorded.
    pub fn contains(&self, sub: &Subscription) -> bool {
        self.entries.read().contains_key(sub)
    }

    /// Snapshot of all recorded tuples.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of recorded tuples.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no tuples are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use parking_lot::RwLock;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn create_registry(
        state: ConnectionState,
    ) -> (SubscriptionRegistry, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = WsWriteHandle::new(tx, Arc::new(RwLock::new(state)));
        (SubscriptionRegistry::new(handle), rx)
    }

    #[tokio::test]
    async fn test_subscribe_records_and_sends_frame() {
        let (registry, mut rx) = create_registry(ConnectionState::Open);
        let sub = Subscription::ticker("BTCUSD");

        assert!(registry.subscribe(sub.clone()).await.unwrap());
        assert!(registry.contains(&sub));

        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["event"], "subscribe");
        assert_eq!(frame["channel"], "ticker");
        assert_eq!(frame["symbol"], "tBTCUSD");
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_does_not_resend() {
        let (registry, mut rx) = create_registry(ConnectionState::Open);
        let sub = Subscription::trades("BTCUSD");

        assert!(registry.subscribe(sub.clone()).await.unwrap());
        assert!(!registry.subscribe(sub.clone()).await.unwrap());
        assert_eq!(registry.len(), 1);

        // Exactly one frame went out.
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_fails_when_not_connected() {
        let (registry, _rx) = create_registry(ConnectionState::Disconnected);
        let sub = Subscription::ticker("BTCUSD");

        let result = registry.subscribe(sub.clone()).await;
        assert!(matches!(result, Err(crate::WsError::NotConnected)));
        // Failed subscribe leaves no record behind.
        assert!(!registry.contains(&sub));
    }

    #[tokio::test]
    async fn test_unsubscribe_after_ack_sends_frame() {
        let (registry, mut rx) = create_registry(ConnectionState::Open);
        let sub = Subscription::candles("BTCUSD", "1m");

        registry.subscribe(sub.clone()).await.unwrap();
        rx.recv().await.unwrap();
        registry.record_ack(&sub, 77);

        assert!(registry.unsubscribe(&sub).await.unwrap());
        assert!(!registry.contains(&sub));

        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["event"], "unsubscribe");
        assert_eq!(frame["chanId"], 77);
    }

    #[tokio::test]
    async fn test_unsubscribe_before_ack_sends_no_frame() {
        let (registry, mut rx) = create_registry(ConnectionState::Open);
        let sub = Subscription::ticker("ETHUSD");

        registry.subscribe(sub.clone()).await.unwrap();
        rx.recv().await.unwrap();

        assert!(registry.unsubscribe(&sub).await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_tuple() {
        let (registry, _rx) = create_registry(ConnectionState::Open);
        let sub = Subscription::ticker("ETHUSD");

        assert!(!registry.unsubscribe(&sub).await.unwrap());
    }

    #[tokio::test]
    async fn test_replay_all_resends_each_tuple_once() {
        let (registry, mut rx) = create_registry(ConnectionState::Open);

        registry.subscribe(Subscription::ticker("BTCUSD")).await.unwrap();
        registry.subscribe(Subscription::trades("BTCUSD")).await.unwrap();
        registry
            .subscribe(Subscription::candles("ETHUSD", "5m"))
            .await
            .unwrap();
        for _ in 0..3 {
            rx.recv().await.unwrap();
        }

        let replayed = registry.replay_all().await.unwrap();
        assert_eq!(replayed, 3);

        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.push(rx.recv().await.unwrap());
        }
        assert!(rx.try_recv().is_err());
        assert!(frames.iter().all(|f| f.contains("subscribe")));
    }

    #[tokio::test]
    async fn test_replay_all_clears_stale_chan_ids() {
        let (registry, mut rx) = create_registry(ConnectionState::Open);
        let sub = Subscription::ticker("BTCUSD");

        registry.subscribe(sub.clone()).await.unwrap();
        rx.recv().await.unwrap();
        registry.record_ack(&sub, 5);
        assert_eq!(registry.chan_id(&sub), Some(5));

        registry.replay_all().await.unwrap();
        assert_eq!(registry.chan_id(&sub), None);
    }

    #[test]
    fn test_record_ack_for_removed_tuple() {
        let (tx, _rx) = mpsc::channel(16);
        let handle = WsWriteHandle::new(tx, Arc::new(RwLock::new(ConnectionState::Open)));
        let registry = SubscriptionRegistry::new(handle);

        assert!(!registry.record_ack(&Subscription::ticker("BTCUSD"), 9));
    }
}
