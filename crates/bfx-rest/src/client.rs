//! HTTP client for the Bitfinex public REST API.
//!
//! Fetches historical trades, candles, and ticker snapshots from the
//! public v2 endpoints. Responses arrive as positional JSON arrays in
//! the same layouts the streaming feed uses.

use crate::error::{RestError, RestResult};
use bfx_core::{
    normalize_symbol, timestamp_from_millis, validate_timeframe, wire_symbol, Candle, Ticker,
    Trade,
};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the public market-data endpoints.
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Public API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api-pub.bitfinex.com/v2/";

    /// Create a client against the public API.
    pub fn new() -> RestResult<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> RestResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RestError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch recent trades for a pair, newest first.
    ///
    /// An unknown pair (HTTP 404) yields an empty list.
    pub async fn get_trades(&self, symbol: &str, limit: u32) -> RestResult<Vec<Trade>> {
        let symbol = normalize_symbol(symbol)?;
        let url = format!(
            "{}/trades/{}/hist?limit={limit}",
            self.base_url,
            wire_symbol(&symbol)
        );
        debug!(%symbol, limit, "Fetching trade history");

        let rows: Vec<Vec<Value>> = match self.get_json(&url).await? {
            Some(rows) => rows,
            None => {
                warn!(%symbol, "Trading pair not found");
                return Ok(Vec::new());
            }
        };

        rows.iter()
            .map(|row| {
                Ok(Trade::new(
                    i64_at(row, 0)?,
                    &symbol,
                    timestamp_at(row, 1)?,
                    decimal_at(row, 2)?,
                    decimal_at(row, 3)?,
                ))
            })
            .collect()
    }

    /// Fetch recent candles for a pair and timeframe, newest first.
    ///
    /// An unknown pair (HTTP 404) yields an empty list.
    pub async fn get_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> RestResult<Vec<Candle>> {
        let symbol = normalize_symbol(symbol)?;
        let timeframe = validate_timeframe(timeframe)?;
        let url = format!(
            "{}/candles/trade:{timeframe}:{}/hist?limit={limit}",
            self.base_url,
            wire_symbol(&symbol)
        );
        debug!(%symbol, timeframe, limit, "Fetching candle history");

        let rows: Vec<Vec<Value>> = match self.get_json(&url).await? {
            Some(rows) => rows,
            None => {
                warn!(%symbol, timeframe, "Candle data not found");
                return Ok(Vec::new());
            }
        };

        rows.iter()
            .map(|row| {
                Ok(Candle::new(
                    &symbol,
                    timeframe,
                    timestamp_at(row, 0)?,
                    decimal_at(row, 1)?,
                    decimal_at(row, 2)?,
                    decimal_at(row, 3)?,
                    decimal_at(row, 4)?,
                    decimal_at(row, 5)?,
                ))
            })
            .collect()
    }

    /// Fetch the current ticker for a pair.
    ///
    /// An unknown pair (HTTP 404) yields None.
    pub async fn get_ticker(&self, symbol: &str) -> RestResult<Option<Ticker>> {
        let symbol = normalize_symbol(symbol)?;
        let url = format!("{}/ticker/{}", self.base_url, wire_symbol(&symbol));
        debug!(%symbol, "Fetching ticker");

        let row: Vec<Value> = match self.get_json(&url).await? {
            Some(row) => row,
            None => {
                warn!(%symbol, "Ticker not found");
                return Ok(None);
            }
        };

        if row.len() < 10 {
            return Err(RestError::Decode(format!(
                "Ticker row too short: {} fields",
                row.len()
            )));
        }

        Ok(Some(Ticker::new(
            &symbol,
            decimal_at(&row, 6)?,
            decimal_at(&row, 4)?,
            decimal_at(&row, 5)?,
            decimal_at(&row, 7)?,
            decimal_at(&row, 8)?,
            decimal_at(&row, 9)?,
        )))
    }

    /// GET a JSON body, mapping HTTP 404 to None.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> RestResult<Option<T>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RestError::Http(format!("HTTP request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Http(format!("HTTP {status}: {body}")));
        }

        let parsed = response
            .json()
            .await
            .map_err(|e| RestError::Decode(format!("Failed to parse response: {e}")))?;
        Ok(Some(parsed))
    }
}

fn i64_at(row: &[Value], idx: usize) -> RestResult<i64> {
    row.get(idx)
        .and_then(Value::as_i64)
        .ok_or_else(|| RestError::Decode(format!("Expected integer at offset {idx}")))
}

fn timestamp_at(row: &[Value], idx: usize) -> RestResult<DateTime<Utc>> {
    let ms = i64_at(row, idx)?;
    timestamp_from_millis(ms)
        .ok_or_else(|| RestError::Decode(format!("Timestamp out of range: {ms}")))
}

fn decimal_at(row: &[Value], idx: usize) -> RestResult<Decimal> {
    let value = row
        .get(idx)
        .ok_or_else(|| RestError::Decode(format!("Missing field at offset {idx}")))?;
    match value {
        Value::Number(n) => n
            .to_string()
            .parse()
            .map_err(|e| RestError::Decode(format!("Bad decimal at offset {idx}: {e}"))),
        Value::String(s) => s
            .parse()
            .map_err(|e| RestError::Decode(format!("Bad decimal at offset {idx}: {e}"))),
        other => Err(RestError::Decode(format!(
            "Expected number at offset {idx}, got {other}"
        ))),
    }
}
