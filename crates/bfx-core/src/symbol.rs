//! Symbol normalization between display and wire forms.
//!
//! Bitfinex quotes Tether pairs against `USD` (wire symbol `tBTCUSD`), so
//! the common `USDT` quote spelling is folded into `USD` before validation.

use crate::error::{CoreError, Result};

/// Timeframes accepted by the candles channel.
pub const TIMEFRAMES: &[&str] = &[
    "1m", "5m", "15m", "30m", "1h", "3h", "6h", "12h", "1D", "1W", "14D", "1M",
];

/// Normalize a user-facing pair symbol.
///
/// Trims, uppercases, and maps a `USDT` quote to `USD`. The result must be
/// a six-character alphanumeric pair like `BTCUSD`.
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let mut symbol = raw.trim().to_uppercase();
    if let Some(base) = symbol.strip_suffix("USDT") {
        symbol = format!("{base}USD");
    }
    if symbol.len() != 6 || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::InvalidSymbol(raw.to_string()));
    }
    Ok(symbol)
}

/// Render the wire form of a normalized symbol (`BTCUSD` -> `tBTCUSD`).
pub fn wire_symbol(normalized: &str) -> String {
    format!("t{normalized}")
}

/// Validate a candle timeframe against the supported set.
///
/// Timeframes are case-sensitive: `1m` is one minute, `1M` one month.
pub fn validate_timeframe(tf: &str) -> Result<&str> {
    if TIMEFRAMES.contains(&tf) {
        Ok(tf)
    } else {
        Err(CoreError::InvalidTimeframe(tf.to_string()))
    }
}
