//! Market data records and stream identity types.
//!
//! Contains `Ticker`, `Trade`, and `Candle` records plus the `Channel` and
//! `Subscription` types that identify a stream.

use crate::error::CoreError;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Convert exchange epoch milliseconds to a UTC timestamp.
///
/// Returns None for values outside the representable range.
pub fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Public channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ticker,
    Trades,
    Candles,
}

impl Channel {
    /// Wire name used in subscribe events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Trades => "trades",
            Self::Candles => "candles",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticker" => Ok(Self::Ticker),
            "trades" => Ok(Self::Trades),
            "candles" => Ok(Self::Candles),
            other => Err(CoreError::InvalidChannel(other.to_string())),
        }
    }
}

/// Identity of one stream subscription.
///
/// Unique per (channel, symbol, timeframe) tuple. The timeframe is present
/// only for the candles channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub channel: Channel,
    /// Normalized pair symbol (`BTCUSD`).
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

impl Subscription {
    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self {
            channel: Channel::Ticker,
            symbol: symbol.into(),
            timeframe: None,
        }
    }

    pub fn trades(symbol: impl Into<String>) -> Self {
        Self {
            channel: Channel::Trades,
            symbol: symbol.into(),
            timeframe: None,
        }
    }

    pub fn candles(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            channel: Channel::Candles,
            symbol: symbol.into(),
            timeframe: Some(timeframe.into()),
        }
    }

    /// Candles subscription key, `trade:1m:tBTCUSD`.
    ///
    /// Returns None for channels that subscribe by plain symbol.
    pub fn candle_key(&self) -> Option<String> {
        match (&self.channel, &self.timeframe) {
            (Channel::Candles, Some(tf)) => {
                Some(format!("trade:{}:{}", tf, crate::wire_symbol(&self.symbol)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.timeframe {
            Some(tf) => write!(f, "{}:{}:{}", self.channel, self.symbol, tf),
            None => write!(f, "{}:{}", self.channel, self.symbol),
        }
    }
}

/// Trade aggressor side, carried by the sign of the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Ticker snapshot for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Normalized pair symbol, attached from the originating subscription.
    pub symbol: String,
    pub last_price: Decimal,
    pub daily_change: Decimal,
    pub daily_change_percent: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Timestamp when this ticker was received.
    pub received_at: DateTime<Utc>,
}

impl Ticker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        last_price: Decimal,
        daily_change: Decimal,
        daily_change_percent: Decimal,
        volume: Decimal,
        high: Decimal,
        low: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            daily_change,
            daily_change_percent,
            volume,
            high,
            low,
            received_at: Utc::now(),
        }
    }
}

/// One executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    /// Normalized pair symbol, attached from the originating subscription.
    pub symbol: String,
    /// Execution time from the exchange epoch millis.
    pub executed_at: DateTime<Utc>,
    /// Signed amount, positive for buys and negative for sells.
    pub amount: Decimal,
    pub price: Decimal,
}

impl Trade {
    pub fn new(
        id: i64,
        symbol: impl Into<String>,
        executed_at: DateTime<Utc>,
        amount: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            executed_at,
            amount,
            price,
        }
    }

    /// Side carried by the amount sign. Zero amounts count as buys.
    pub fn side(&self) -> TradeSide {
        if self.amount.is_sign_negative() {
            TradeSide::Sell
        } else {
            TradeSide::Buy
        }
    }
}

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Normalized pair symbol, attached from the originating subscription.
    pub symbol: String,
    /// Timeframe of the series this candle belongs to.
    pub timeframe: String,
    pub opened_at: DateTime<Utc>,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        opened_at: DateTime<Utc>,
        open: Decimal,
        close: Decimal,
        high: Decimal,
        low: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            opened_at,
            open,
            close,
            high,
            low,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_channel_wire_names() {
        assert_eq!(Channel::Ticker.as_str(), "ticker");
        assert_eq!(Channel::Trades.as_str(), "trades");
        assert_eq!(Channel::Candles.as_str(), "candles");
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("trades".parse::<Channel>().unwrap(), Channel::Trades);
        assert!("book".parse::<Channel>().is_err());
    }

    #[test]
    fn test_subscription_candle_key() {
        let sub = Subscription::candles("BTCUSD", "1m");
        assert_eq!(sub.candle_key().unwrap(), "trade:1m:tBTCUSD");

        let sub = Subscription::ticker("BTCUSD");
        assert!(sub.candle_key().is_none());
    }

    #[test]
    fn test_subscription_display() {
        assert_eq!(Subscription::trades("ETHUSD").to_string(), "trades:ETHUSD");
        assert_eq!(
            Subscription::candles("BTCUSD", "5m").to_string(),
            "candles:BTCUSD:5m"
        );
    }

    #[test]
    fn test_trade_side_from_amount_sign() {
        let now = Utc::now();
        let buy = Trade::new(1, "BTCUSD", now, dec!(0.5), dec!(50000));
        let sell = Trade::new(2, "BTCUSD", now, dec!(-0.5), dec!(50000));

        assert_eq!(buy.side(), TradeSide::Buy);
        assert_eq!(sell.side(), TradeSide::Sell);
    }

    #[test]
    fn test_timestamp_from_millis() {
        let ts = timestamp_from_millis(1_700_000_000_000).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_subscription_tuple_equality() {
        let a = Subscription::candles("BTCUSD", "1m");
        let b = Subscription::candles("BTCUSD", "1m");
        let c = Subscription::candles("BTCUSD", "5m");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
