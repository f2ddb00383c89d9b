//! Historical REST access for the Bitfinex connector.
//!
//! Complements the streaming feed with on-demand fetches of trade,
//! candle, and ticker history, plus portfolio valuation on top of the
//! ticker rates.

pub mod client;
pub mod error;
pub mod portfolio;

pub use client::RestClient;
pub use error::{RestError, RestResult};
pub use portfolio::{PortfolioCalculator, TickerSource, PORTFOLIO_PAIRS};
