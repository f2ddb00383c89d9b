//! Application configuration.

use crate::error::{AppError, AppResult};
use bfx_core::{normalize_symbol, validate_timeframe, Channel, Subscription};
use bfx_rest::RestClient;
use bfx_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// WebSocket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// WebSocket endpoint URL.
    #[serde(default = "default_ws_url")]
    pub url: String,
    /// Delay between reconnection attempts (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Capacity of the outbound and event channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_ws_url() -> String {
    "wss://api-pub.bitfinex.com/ws/2".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl From<WsConfig> for ConnectionConfig {
    fn from(config: WsConfig) -> Self {
        Self {
            url: config.url,
            reconnect_delay_ms: config.reconnect_delay_ms,
            channel_capacity: config.channel_capacity,
        }
    }
}

/// REST client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// REST API base URL.
    #[serde(default = "default_rest_base_url")]
    pub base_url: String,
}

fn default_rest_base_url() -> String {
    RestClient::DEFAULT_BASE_URL.to_string()
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_rest_base_url(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port the API server listens on.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// Ticker snapshot cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime (seconds).
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// One stream to subscribe at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub channel: Channel,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

impl SubscriptionConfig {
    /// Validate and convert into a subscription tuple.
    pub fn to_subscription(&self) -> AppResult<Subscription> {
        let symbol = normalize_symbol(&self.symbol)?;
        match self.channel {
            Channel::Candles => {
                let timeframe = self.timeframe.as_deref().ok_or_else(|| {
                    AppError::Config(format!("Candle subscription {symbol} needs a timeframe"))
                })?;
                let timeframe = validate_timeframe(timeframe)?;
                Ok(Subscription::candles(symbol, timeframe))
            }
            Channel::Ticker => Ok(Subscription::ticker(symbol)),
            Channel::Trades => Ok(Subscription::trades(symbol)),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// WebSocket configuration.
    #[serde(default)]
    pub websocket: WsConfig,
    /// REST client configuration.
    #[serde(default)]
    pub rest: RestConfig,
    /// HTTP API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Snapshot cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Streams subscribed at startup.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl AppConfig {
    /// Load configuration, resolving the path as CLI arg > `BFX_CONFIG`
    /// env var > default. A missing file falls back to defaults.
    pub fn load(cli_path: Option<String>) -> AppResult<Self> {
        let config_path = cli_path
            .or_else(|| std::env::var("BFX_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            tracing::info!(path = %config_path, "Loading configuration");
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.websocket.url, "wss://api-pub.bitfinex.com/ws/2");
        assert_eq!(config.websocket.reconnect_delay_ms, 5000);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.cache.ttl_secs, 30);
        assert!(config.subscriptions.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            port = 9090

            [[subscriptions]]
            channel = "ticker"
            symbol = "BTCUSDT"

            [[subscriptions]]
            channel = "candles"
            symbol = "ETHUSD"
            timeframe = "5m"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.port, 9090);
        assert_eq!(config.websocket.reconnect_delay_ms, 5000);
        assert_eq!(config.subscriptions.len(), 2);

        let first = config.subscriptions[0].to_subscription().unwrap();
        assert_eq!(first, Subscription::ticker("BTCUSD"));

        let second = config.subscriptions[1].to_subscription().unwrap();
        assert_eq!(second, Subscription::candles("ETHUSD", "5m"));
    }

    #[test]
    fn test_candle_subscription_needs_timeframe() {
        let config = SubscriptionConfig {
            channel: Channel::Candles,
            symbol: "BTCUSD".to_string(),
            timeframe: None,
        };
        assert!(matches!(
            config.to_subscription(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_ws_config_into_connection_config() {
        let ws = WsConfig {
            url: "wss://example.test/ws".to_string(),
            reconnect_delay_ms: 1000,
            channel_capacity: 16,
        };
        let conn: ConnectionConfig = ws.into();
        assert_eq!(conn.url, "wss://example.test/ws");
        assert_eq!(conn.reconnect_delay_ms, 1000);
        assert_eq!(conn.channel_capacity, 16);
    }
}
