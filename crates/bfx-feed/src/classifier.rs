//! Wire frame classification.
//!
//! Bitfinex multiplexes every stream over one socket. Control traffic is
//! JSON objects carrying an `event` field; data frames are arrays of the
//! form `[chanId, payload]` where the payload shape, not any tag, decides
//! what the update is:
//!
//! - length 4: trade `[id, tsMillis, amount, price]`
//! - length 6: candle `[tsMillis, open, close, high, low, volume]`
//! - length >= 10: ticker, offsets 4..=9 carry dailyChange,
//!   dailyChangePercent, lastPrice, volume, high, low
//!
//! A snapshot arrives as an array of such arrays and is classified
//! element-wise. Anything else is dropped, never an error that could kill
//! the receive loop.

use crate::error::{FeedError, FeedResult};
use bfx_core::{timestamp_from_millis, Channel, Subscription};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

/// One classified inbound frame.
#[derive(Debug, Clone)]
pub enum WireMessage {
    /// Control event from an object frame.
    Control(ControlEvent),
    /// Data frame with its classified updates.
    Data { chan_id: u64, updates: Vec<DataUpdate> },
    /// Heartbeat `[chanId, "hb"]`.
    Heartbeat { chan_id: u64 },
}

/// Control events recognized from object frames.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// Subscribe ack binding a channel id to its stream.
    Subscribed { chan_id: u64, subscription: Subscription },
    /// Unsubscribe ack.
    Unsubscribed { chan_id: u64 },
    /// Platform events (`info`, `conf`), recognized but carrying no state.
    Info { event: String },
    /// Error event from the exchange.
    Error { code: Option<i64>, msg: String },
}

/// One classified update array, not yet attributed to a symbol.
#[derive(Debug, Clone)]
pub enum DataUpdate {
    Trade {
        id: i64,
        timestamp: DateTime<Utc>,
        amount: Decimal,
        price: Decimal,
    },
    Candle {
        timestamp: DateTime<Utc>,
        open: Decimal,
        close: Decimal,
        high: Decimal,
        low: Decimal,
        volume: Decimal,
    },
    Ticker {
        daily_change: Decimal,
        daily_change_percent: Decimal,
        last_price: Decimal,
        volume: Decimal,
        high: Decimal,
        low: Decimal,
    },
}

/// Classify one decoded frame.
///
/// Returns Ok(None) for frames that are recognized but carry nothing to
/// act on. Wrong-typed payload fields surface `FeedError::Decode`, which
/// the dispatcher logs and drops.
pub fn classify(value: &Value) -> FeedResult<Option<WireMessage>> {
    if let Some(obj) = value.as_object() {
        return classify_control(obj);
    }
    if let Some(arr) = value.as_array() {
        return classify_data(arr);
    }
    debug!("Frame is neither object nor array, dropped");
    Ok(None)
}

fn classify_control(
    obj: &serde_json::Map<String, Value>,
) -> FeedResult<Option<WireMessage>> {
    let event = match obj.get("event").and_then(Value::as_str) {
        Some(event) => event,
        None => {
            debug!("Object frame without event field, dropped");
            return Ok(None);
        }
    };

    let control = match event {
        "subscribed" => {
            let chan_id = u64_field(obj, "chanId")?;
            let subscription = parse_subscribed(obj)?;
            ControlEvent::Subscribed {
                chan_id,
                subscription,
            }
        }
        "unsubscribed" => ControlEvent::Unsubscribed {
            chan_id: u64_field(obj, "chanId")?,
        },
        "info" | "conf" | "pong" => ControlEvent::Info {
            event: event.to_string(),
        },
        "error" => ControlEvent::Error {
            code: obj.get("code").and_then(Value::as_i64),
            msg: obj
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        },
        other => {
            debug!(event = other, "Unrecognized control event, dropped");
            return Ok(None);
        }
    };

    Ok(Some(WireMessage::Control(control)))
}

/// Resolve a subscribe ack into the subscription tuple it acknowledges.
///
/// Ticker and trades acks carry a wire `symbol`; candles acks carry the
/// `trade:<timeframe>:<wire symbol>` key.
fn parse_subscribed(obj: &serde_json::Map<String, Value>) -> FeedResult<Subscription> {
    let channel: Channel = obj
        .get("channel")
        .and_then(Value::as_str)
        .ok_or_else(|| FeedError::Decode("subscribed ack without channel".to_string()))?
        .parse()
        .map_err(|e| FeedError::Decode(format!("subscribed ack: {e}")))?;

    match channel {
        Channel::Candles => {
            let key = obj
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| FeedError::Decode("candles ack without key".to_string()))?;
            let mut parts = key.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("trade"), Some(tf), Some(wire)) => Ok(Subscription::candles(
                    wire.strip_prefix('t').unwrap_or(wire),
                    tf,
                )),
                _ => Err(FeedError::Decode(format!("malformed candles key: {key}"))),
            }
        }
        channel => {
            let wire = obj
                .get("symbol")
                .and_then(Value::as_str)
                .ok_or_else(|| FeedError::Decode("subscribed ack without symbol".to_string()))?;
            let symbol = wire.strip_prefix('t').unwrap_or(wire);
            Ok(Subscription {
                channel,
                symbol: symbol.to_string(),
                timeframe: None,
            })
        }
    }
}

fn classify_data(arr: &[Value]) -> FeedResult<Option<WireMessage>> {
    let chan_id = match arr.first().and_then(Value::as_u64) {
        Some(chan_id) => chan_id,
        None => {
            debug!("Array frame without numeric channel id, dropped");
            return Ok(None);
        }
    };

    // Trade frames may carry a type tag ("te"/"tu") before the payload;
    // heartbeats reuse the same slot.
    let payload = match arr.get(1) {
        Some(Value::String(tag)) if tag == "hb" => {
            return Ok(Some(WireMessage::Heartbeat { chan_id }));
        }
        Some(Value::String(_)) => match arr.get(2) {
            Some(payload) => payload,
            None => {
                debug!(chan_id, "Tagged frame without payload, dropped");
                return Ok(None);
            }
        },
        Some(payload) => payload,
        None => {
            debug!(chan_id, "Data frame without payload, dropped");
            return Ok(None);
        }
    };

    let rows = match payload.as_array() {
        Some(rows) => rows,
        None => {
            debug!(chan_id, "Payload is not an array, dropped");
            return Ok(None);
        }
    };

    let mut updates = Vec::new();
    classify_payload(rows, &mut updates)?;
    Ok(Some(WireMessage::Data { chan_id, updates }))
}

/// Classify a payload, unwrapping snapshot-of-arrays element-wise.
fn classify_payload(rows: &[Value], out: &mut Vec<DataUpdate>) -> FeedResult<()> {
    if rows.first().map(Value::is_array).unwrap_or(false) {
        for row in rows {
            match row.as_array() {
                Some(inner) => {
                    // A bad element drops alone, the rest of the snapshot survives.
                    if let Err(e) = classify_payload(inner, out) {
                        debug!(error = %e, "Snapshot element dropped");
                    }
                }
                None => debug!("Mixed snapshot element, dropped"),
            }
        }
        return Ok(());
    }

    if let Some(update) = classify_update(rows)? {
        out.push(update);
    }
    Ok(())
}

/// Classify one flat update array by length.
fn classify_update(row: &[Value]) -> FeedResult<Option<DataUpdate>> {
    match row.len() {
        4 => Ok(Some(DataUpdate::Trade {
            id: i64_at(row, 0)?,
            timestamp: timestamp_at(row, 1)?,
            amount: decimal_at(row, 2)?,
            price: decimal_at(row, 3)?,
        })),
        6 => Ok(Some(DataUpdate::Candle {
            timestamp: timestamp_at(row, 0)?,
            open: decimal_at(row, 1)?,
            close: decimal_at(row, 2)?,
            high: decimal_at(row, 3)?,
            low: decimal_at(row, 4)?,
            volume: decimal_at(row, 5)?,
        })),
        len if len >= 10 => Ok(Some(DataUpdate::Ticker {
            daily_change: decimal_at(row, 4)?,
            daily_change_percent: decimal_at(row, 5)?,
            last_price: decimal_at(row, 6)?,
            volume: decimal_at(row, 7)?,
            high: decimal_at(row, 8)?,
            low: decimal_at(row, 9)?,
        })),
        len => {
            debug!(len, "Unrecognized payload length, dropped");
            Ok(None)
        }
    }
}

fn u64_field(obj: &serde_json::Map<String, Value>, field: &str) -> FeedResult<u64> {
    obj.get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| FeedError::Decode(format!("expected unsigned integer field {field}")))
}

fn i64_at(row: &[Value], idx: usize) -> FeedResult<i64> {
    row.get(idx)
        .and_then(Value::as_i64)
        .ok_or_else(|| FeedError::Decode(format!("expected integer at index {idx}")))
}

fn timestamp_at(row: &[Value], idx: usize) -> FeedResult<DateTime<Utc>> {
    let millis = i64_at(row, idx)?;
    timestamp_from_millis(millis)
        .ok_or_else(|| FeedError::Decode(format!("timestamp out of range: {millis}")))
}

fn decimal_at(row: &[Value], idx: usize) -> FeedResult<Decimal> {
    let value = row
        .get(idx)
        .ok_or_else(|| FeedError::Decode(format!("missing field at index {idx}")))?;
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(FeedError::Decode(format!(
                "non-numeric value at index {idx}: {other}"
            )))
        }
    };
    text.parse()
        .map_err(|_| FeedError::Decode(format!("unparsable number at index {idx}: {text}")))
}
