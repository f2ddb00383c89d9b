//! Core domain types for the Bitfinex market-data connector.
//!
//! This crate provides fundamental types used throughout the connector:
//! - `Ticker`, `Trade`, `Candle`: market data records
//! - `Channel`, `Subscription`: stream identity
//! - Symbol normalization between display and wire forms

pub mod error;
pub mod symbol;
pub mod types;

pub use error::{CoreError, Result};
pub use symbol::{normalize_symbol, validate_timeframe, wire_symbol, TIMEFRAMES};
pub use types::{timestamp_from_millis, Candle, Channel, Subscription, Ticker, Trade, TradeSide};
