//! Request and response bodies.

use bfx_core::{Channel, Subscription};
use bfx_ws::ConnectionState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default row count for history fetches.
pub const DEFAULT_LIMIT: u32 = 50;

pub(crate) fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Body of subscribe and unsubscribe requests.
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub channel: Channel,
    pub symbol: String,
    #[serde(default)]
    pub timeframe: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub subscription: Subscription,
    /// False when the stream was already subscribed.
    pub subscribed: bool,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub subscription: Subscription,
    /// False when no such stream was subscribed.
    pub unsubscribed: bool,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    pub timeframe: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Balances to value, one query parameter per currency.
#[derive(Debug, Default, Deserialize)]
pub struct PortfolioQuery {
    pub usdt: Option<Decimal>,
    pub btc: Option<Decimal>,
    pub xrp: Option<Decimal>,
    pub xmr: Option<Decimal>,
    pub dash: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connection: ConnectionState,
}
