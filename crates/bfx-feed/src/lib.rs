//! Market data feed layer for the Bitfinex connector.
//!
//! Classifies decoded wire frames into typed updates, attributes them to
//! their originating subscription, fans them out to registered handlers,
//! and maintains a short-TTL ticker snapshot cache.

pub mod cache;
pub mod classifier;
pub mod dispatcher;
pub mod error;

pub use cache::SnapshotCache;
pub use classifier::{classify, ControlEvent, DataUpdate, WireMessage};
pub use dispatcher::{CandleHandler, Dispatcher, HandlerResult, TickerHandler, TradeHandler};
pub use error::{FeedError, FeedResult};
