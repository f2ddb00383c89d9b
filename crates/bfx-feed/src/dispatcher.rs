//! Channel attribution and handler fan-out.
//!
//! The dispatcher consumes connection events, classifies data frames,
//! resolves the numeric channel id to the subscription it was granted
//! for, and delivers fully attributed records to registered handlers.
//! Channel ids are connection-scoped: a reconnect voids the map and
//! fresh acks rebuild it.

use crate::classifier::{classify, ControlEvent, DataUpdate, WireMessage};
use bfx_core::{Candle, Channel, Subscription, Ticker, Trade};
use bfx_ws::{SubscriptionRegistry, WsEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback invoked for each attributed ticker snapshot.
pub type TickerHandler = Arc<dyn Fn(&Ticker) -> HandlerResult + Send + Sync>;

/// Callback invoked for each attributed trade.
pub type TradeHandler = Arc<dyn Fn(&Trade) -> HandlerResult + Send + Sync>;

/// Callback invoked for each attributed candle.
pub type CandleHandler = Arc<dyn Fn(&Candle) -> HandlerResult + Send + Sync>;

/// Routes classified wire messages to typed handlers.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    channels: RwLock<HashMap<u64, Subscription>>,
    ticker_handlers: RwLock<Vec<TickerHandler>>,
    trade_handlers: RwLock<Vec<TradeHandler>>,
    candle_handlers: RwLock<Vec<CandleHandler>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            channels: RwLock::new(HashMap::new()),
            ticker_handlers: RwLock::new(Vec::new()),
            trade_handlers: RwLock::new(Vec::new()),
            candle_handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler for ticker snapshots.
    pub fn on_ticker(&self, handler: TickerHandler) {
        self.ticker_handlers.write().push(handler);
    }

    /// Register a handler for trades.
    pub fn on_trade(&self, handler: TradeHandler) {
        self.trade_handlers.write().push(handler);
    }

    /// Register a handler for candles.
    pub fn on_candle(&self, handler: CandleHandler) {
        self.candle_handlers.write().push(handler);
    }

    /// Look up the subscription a channel id currently maps to.
    pub fn subscription_for(&self, chan_id: u64) -> Option<Subscription> {
        self.channels.read().get(&chan_id).cloned()
    }

    /// Number of channel ids currently mapped.
    pub fn mapped_channels(&self) -> usize {
        self.channels.read().len()
    }

    /// Consume connection events until the sender side closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<WsEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        debug!("Event channel closed, dispatcher stopping");
    }

    /// Process one connection event.
    pub fn handle_event(&self, event: WsEvent) {
        match event {
            WsEvent::Connected => {
                // Channel ids from the previous connection are void.
                let stale = {
                    let mut channels = self.channels.write();
                    let n = channels.len();
                    channels.clear();
                    n
                };
                if stale > 0 {
                    debug!(stale, "Cleared channel map after reconnect");
                }
            }
            WsEvent::Disconnected => {
                debug!("Connection lost, awaiting fresh channel acks");
            }
            WsEvent::Frame(value) => match classify(&value) {
                Ok(Some(message)) => self.process(message),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Dropping unclassifiable frame"),
            },
        }
    }

    fn process(&self, message: WireMessage) {
        match message {
            WireMessage::Control(event) => self.process_control(event),
            WireMessage::Heartbeat { chan_id } => {
                debug!(chan_id, "Heartbeat");
            }
            WireMessage::Data { chan_id, updates } => {
                let Some(subscription) = self.subscription_for(chan_id) else {
                    debug!(chan_id, "Data for unmapped channel, dropping");
                    return;
                };
                for update in updates {
                    self.dispatch(&subscription, update);
                }
            }
        }
    }

    fn process_control(&self, event: ControlEvent) {
        match event {
            ControlEvent::Subscribed {
                chan_id,
                subscription,
            } => {
                info!(chan_id, %subscription, "Channel subscribed");
                self.channels.write().insert(chan_id, subscription.clone());
                if !self.registry.record_ack(&subscription, chan_id) {
                    debug!(%subscription, "Ack for subscription not in registry");
                }
            }
            ControlEvent::Unsubscribed { chan_id } => {
                let removed = self.channels.write().remove(&chan_id);
                match removed {
                    Some(subscription) => {
                        info!(chan_id, %subscription, "Channel unsubscribed")
                    }
                    None => debug!(chan_id, "Unsubscribe ack for unmapped channel"),
                }
            }
            ControlEvent::Info { event } => {
                debug!(event = %event, "Control event");
            }
            ControlEvent::Error { code, msg } => {
                warn!(?code, msg = %msg, "Server reported an error");
            }
        }
    }

    fn dispatch(&self, subscription: &Subscription, update: DataUpdate) {
        match (subscription.channel, update) {
            (
                Channel::Trades,
                DataUpdate::Trade {
                    id,
                    timestamp,
                    amount,
                    price,
                },
            ) => {
                let trade = Trade {
                    id,
                    symbol: subscription.symbol.clone(),
                    executed_at: timestamp,
                    amount,
                    price,
                };
                let handlers = self.trade_handlers.read().clone();
                for handler in &handlers {
                    if let Err(e) = handler(&trade) {
                        warn!(error = %e, symbol = %trade.symbol, "Trade handler failed");
                    }
                }
            }
            (
                Channel::Candles,
                DataUpdate::Candle {
                    timestamp,
                    open,
                    close,
                    high,
                    low,
                    volume,
                },
            ) => {
                let Some(timeframe) = subscription.timeframe.clone() else {
                    warn!(%subscription, "Candle subscription without timeframe, dropping");
                    return;
                };
                let candle = Candle {
                    symbol: subscription.symbol.clone(),
                    timeframe,
                    opened_at: timestamp,
                    open,
                    close,
                    high,
                    low,
                    volume,
                };
                let handlers = self.candle_handlers.read().clone();
                for handler in &handlers {
                    if let Err(e) = handler(&candle) {
                        warn!(error = %e, symbol = %candle.symbol, "Candle handler failed");
                    }
                }
            }
            (
                Channel::Ticker,
                DataUpdate::Ticker {
                    daily_change,
                    daily_change_percent,
                    last_price,
                    volume,
                    high,
                    low,
                },
            ) => {
                let ticker = Ticker::new(
                    &subscription.symbol,
                    last_price,
                    daily_change,
                    daily_change_percent,
                    volume,
                    high,
                    low,
                );
                let handlers = self.ticker_handlers.read().clone();
                for handler in &handlers {
                    if let Err(e) = handler(&ticker) {
                        warn!(error = %e, symbol = %ticker.symbol, "Ticker handler failed");
                    }
                }
            }
            (channel, update) => {
                debug!(
                    ?channel,
                    ?update,
                    "Update kind does not match channel, dropping"
                );
            }
        }
    }
}
