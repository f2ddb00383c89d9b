//! Application wiring and run loop.
//!
//! Builds the connection manager, dispatcher, snapshot cache, REST client
//! and API server from configuration, connects, subscribes the configured
//! streams, and runs until Ctrl-C.

use crate::config::AppConfig;
use crate::error::AppResult;
use bfx_api::{run_server, ApiState};
use bfx_feed::{Dispatcher, SnapshotCache};
use bfx_rest::RestClient;
use bfx_ws::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Create the application from configuration.
    ///
    /// Startup subscriptions are validated here so a bad config fails
    /// before anything connects.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        for sub in &config.subscriptions {
            sub.to_subscription()?;
        }
        Ok(Self { config })
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let (event_tx, event_rx) = mpsc::channel(self.config.websocket.channel_capacity);
        let manager = Arc::new(ConnectionManager::new(
            self.config.websocket.clone().into(),
            event_tx,
        ));
        let registry = manager.registry();

        let cache = Arc::new(SnapshotCache::with_ttl(Duration::from_secs(
            self.config.cache.ttl_secs,
        )));
        let rest = Arc::new(RestClient::with_base_url(&self.config.rest.base_url)?);

        let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
        Self::register_handlers(&dispatcher, &cache);
        let dispatcher_handle = tokio::spawn(Arc::clone(&dispatcher).run(event_rx));

        manager.connect().await?;

        for sub_config in &self.config.subscriptions {
            let subscription = sub_config.to_subscription()?;
            if let Err(e) = registry.subscribe(subscription.clone()).await {
                warn!(%subscription, error = %e, "Startup subscription failed");
            }
        }

        let api_state = ApiState::new(
            Arc::clone(&cache),
            Arc::clone(&rest),
            Arc::clone(&registry),
            manager.write_handle(),
        );
        let api_port = self.config.api.port;
        let api_handle = tokio::spawn(async move {
            if let Err(e) = run_server(api_state, api_port).await {
                error!(error = %e, "API server failed");
            }
        });

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");

        manager.close();
        api_handle.abort();
        dispatcher_handle.abort();

        info!("Shutdown complete");
        Ok(())
    }

    /// Wire the feed handlers: cache writes for tickers, logging for the
    /// trade and candle streams.
    fn register_handlers(dispatcher: &Dispatcher, cache: &Arc<SnapshotCache>) {
        let ticker_cache = Arc::clone(cache);
        dispatcher.on_ticker(Arc::new(move |ticker| {
            ticker_cache.put(ticker.clone());
            Ok(())
        }));

        dispatcher.on_trade(Arc::new(|trade| {
            info!(
                symbol = %trade.symbol,
                id = trade.id,
                side = %trade.side(),
                price = %trade.price,
                amount = %trade.amount,
                "Trade"
            );
            Ok(())
        }));

        dispatcher.on_candle(Arc::new(|candle| {
            debug!(
                symbol = %candle.symbol,
                timeframe = %candle.timeframe,
                open = %candle.open,
                close = %candle.close,
                volume = %candle.volume,
                "Candle"
            );
            Ok(())
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubscriptionConfig;
    use crate::error::AppError;
    use bfx_core::Channel;
    use bfx_ws::{ConnectionState, SubscriptionRegistry, WsEvent, WsWriteHandle};
    use parking_lot::RwLock;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn test_dispatcher() -> (Arc<Dispatcher>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = WsWriteHandle::new(tx, Arc::new(RwLock::new(ConnectionState::Open)));
        let registry = Arc::new(SubscriptionRegistry::new(handle));
        (Arc::new(Dispatcher::new(registry)), rx)
    }

    #[test]
    fn test_new_accepts_default_config() {
        assert!(Application::new(AppConfig::default()).is_ok());
    }

    #[test]
    fn test_new_rejects_invalid_subscription() {
        let mut config = AppConfig::default();
        config.subscriptions.push(SubscriptionConfig {
            channel: Channel::Candles,
            symbol: "BTCUSD".to_string(),
            timeframe: None,
        });

        assert!(matches!(
            Application::new(config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_ticker_handler_writes_cache() {
        let (dispatcher, _rx) = test_dispatcher();
        let cache = Arc::new(SnapshotCache::new());
        Application::register_handlers(&dispatcher, &cache);

        dispatcher.handle_event(WsEvent::Frame(json!({
            "event": "subscribed",
            "channel": "ticker",
            "chanId": 2,
            "symbol": "tBTCUSD",
            "pair": "BTCUSD"
        })));
        dispatcher.handle_event(WsEvent::Frame(json!([
            2,
            [7254.7, 47.0, 7254.8, 43.5, 120.1, 0.0168, 7254.7, 3500.2, 7373.5, 7100.0]
        ])));

        let cached = cache.get("BTCUSD").expect("ticker should be cached");
        assert_eq!(cached.last_price, dec!(7254.7));
        assert_eq!(cached.high, dec!(7373.5));
    }

    #[test]
    fn test_cache_overwritten_on_fresh_ticker() {
        let (dispatcher, _rx) = test_dispatcher();
        let cache = Arc::new(SnapshotCache::new());
        Application::register_handlers(&dispatcher, &cache);

        dispatcher.handle_event(WsEvent::Frame(json!({
            "event": "subscribed",
            "channel": "ticker",
            "chanId": 2,
            "symbol": "tBTCUSD",
            "pair": "BTCUSD"
        })));
        for last in [7254.7, 7255.1] {
            dispatcher.handle_event(WsEvent::Frame(json!([
                2,
                [last, 47.0, 7254.8, 43.5, 120.1, 0.0168, last, 3500.2, 7373.5, 7100.0]
            ])));
        }

        let cached = cache.get("BTCUSD").expect("ticker should be cached");
        assert_eq!(cached.last_price, dec!(7255.1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_trade_and_candle_handlers_accept_updates() {
        let (dispatcher, _rx) = test_dispatcher();
        let cache = Arc::new(SnapshotCache::new());
        Application::register_handlers(&dispatcher, &cache);

        dispatcher.handle_event(WsEvent::Frame(json!({
            "event": "subscribed",
            "channel": "trades",
            "chanId": 17,
            "symbol": "tBTCUSD",
            "pair": "BTCUSD"
        })));
        dispatcher.handle_event(WsEvent::Frame(json!([
            17,
            "te",
            [401597395, 1574694478808i64, -0.25, 7245.3]
        ])));

        dispatcher.handle_event(WsEvent::Frame(json!({
            "event": "subscribed",
            "channel": "candles",
            "chanId": 15,
            "key": "trade:1m:tBTCUSD"
        })));
        dispatcher.handle_event(WsEvent::Frame(json!([
            15,
            [1700000000000i64, 101, 103, 105, 99, 42.5]
        ])));

        // Logging handlers must not disturb the ticker cache.
        assert!(cache.is_empty());
    }
}
