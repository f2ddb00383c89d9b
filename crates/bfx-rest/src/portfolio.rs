//! Portfolio valuation across supported currencies.
//!
//! Balances are converted to a USDT total through the USD tickers of
//! each currency, then the total is re-expressed in every supported
//! currency. The USD and USDT rates are treated as par.

use crate::client::RestClient;
use crate::error::RestResult;
use bfx_core::Ticker;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Supported portfolio currencies and the pair quoting each against USD.
/// Dash trades under the exchange code `DSH`.
pub const PORTFOLIO_PAIRS: &[(&str, &str)] = &[
    ("BTC", "BTCUSD"),
    ("XRP", "XRPUSD"),
    ("XMR", "XMRUSD"),
    ("DASH", "DSHUSD"),
];

/// Source of ticker snapshots for rate lookups.
pub trait TickerSource {
    fn get_ticker(
        &self,
        symbol: &str,
    ) -> impl std::future::Future<Output = RestResult<Option<Ticker>>> + Send;
}

impl TickerSource for RestClient {
    async fn get_ticker(&self, symbol: &str) -> RestResult<Option<Ticker>> {
        RestClient::get_ticker(self, symbol).await
    }
}

impl TickerSource for std::sync::Arc<RestClient> {
    async fn get_ticker(&self, symbol: &str) -> RestResult<Option<Ticker>> {
        RestClient::get_ticker(self, symbol).await
    }
}

/// Values balances through live USD rates.
pub struct PortfolioCalculator<S> {
    source: S,
}

impl<S: TickerSource> PortfolioCalculator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Value a set of balances.
    ///
    /// Returns a map of USDT plus every supported currency to the total
    /// portfolio value expressed in that currency. A USDT balance counts
    /// at par; a currency with a zero or missing rate contributes nothing
    /// and values to zero.
    pub async fn value_portfolio(
        &self,
        balances: &HashMap<String, Decimal>,
    ) -> RestResult<HashMap<String, Decimal>> {
        let mut rates: Vec<(&str, Decimal)> = Vec::with_capacity(PORTFOLIO_PAIRS.len());
        for &(currency, pair) in PORTFOLIO_PAIRS {
            let rate = match self.source.get_ticker(pair).await? {
                Some(ticker) => ticker.last_price,
                None => {
                    warn!(currency, pair, "No ticker for currency, rate treated as zero");
                    Decimal::ZERO
                }
            };
            rates.push((currency, rate));
        }

        let mut total = balances.get("USDT").copied().unwrap_or(Decimal::ZERO);
        for (currency, rate) in &rates {
            if let Some(balance) = balances.get(*currency) {
                total += balance * rate;
            }
        }
        debug!(%total, "Portfolio valued in USDT");

        let mut result = HashMap::with_capacity(rates.len() + 1);
        result.insert("USDT".to_string(), total);
        for (currency, rate) in rates {
            let converted = if rate.is_zero() {
                Decimal::ZERO
            } else {
                total / rate
            };
            result.insert(currency.to_string(), converted);
        }
        Ok(result)
    }
}
