//! Outbound wire request model.
//!
//! Bitfinex control traffic is JSON objects carrying an `event` field.
//! Ticker and trades channels subscribe by wire symbol; candles subscribe
//! by a `trade:<timeframe>:<wire symbol>` key.

use bfx_core::{wire_symbol, Channel, Subscription};
use serde::Serialize;

/// Outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsRequest {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "chanId", skip_serializing_if = "Option::is_none")]
    pub chan_id: Option<u64>,
}

impl WsRequest {
    /// Build the subscribe frame for a subscription tuple.
    pub fn subscribe(sub: &Subscription) -> Self {
        match sub.channel {
            Channel::Candles => Self {
                event: "subscribe",
                channel: Some(Channel::Candles.as_str()),
                symbol: None,
                key: sub.candle_key(),
                chan_id: None,
            },
            channel => Self {
                event: "subscribe",
                channel: Some(channel.as_str()),
                symbol: Some(wire_symbol(&sub.symbol)),
                key: None,
                chan_id: None,
            },
        }
    }

    /// Build the unsubscribe frame for an acknowledged channel id.
    pub fn unsubscribe(chan_id: u64) -> Self {
        Self {
            event: "unsubscribe",
            channel: None,
            symbol: None,
            key: None,
            chan_id: Some(chan_id),
        }
    }

    /// Serialize to the JSON text form sent on the socket.
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
