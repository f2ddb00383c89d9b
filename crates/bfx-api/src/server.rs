//! HTTP server implementation using axum.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use bfx_core::{normalize_symbol, validate_timeframe, Candle, Channel, Subscription, Ticker, Trade};
use bfx_rest::{PortfolioCalculator, RestError};
use bfx_ws::WsError;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::ApiState;
use crate::types::{
    CandlesQuery, HealthResponse, PortfolioQuery, StreamRequest, SubscribeResponse, TradesQuery,
    UnsubscribeResponse,
};

/// Create the axum router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/ticker/{symbol}", get(get_ticker))
        .route("/trades/{symbol}", get(get_trades))
        .route("/candles/{symbol}", get(get_candles))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/portfolio", get(get_portfolio).post(post_portfolio))
        .route("/health", get(get_health))
        .with_state(state)
}

/// Current ticker for a pair, served from the snapshot cache when fresh.
async fn get_ticker(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<Ticker>, ApiError> {
    let symbol = normalize_symbol(&symbol).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if let Some(ticker) = state.cache.get(&symbol) {
        return Ok(Json(ticker));
    }

    match state.rest.get_ticker(&symbol).await {
        Ok(Some(ticker)) => {
            state.cache.put(ticker.clone());
            Ok(Json(ticker))
        }
        Ok(None) => Err(ApiError::NotFound(format!("No ticker for {symbol}"))),
        Err(e @ (RestError::InvalidSymbol(_) | RestError::InvalidTimeframe(_))) => Err(e.into()),
        Err(e) => {
            warn!(%symbol, error = %e, "Ticker fetch failed");
            Err(ApiError::NotFound(format!("No ticker for {symbol}")))
        }
    }
}

/// Recent trades for a pair. Upstream failures degrade to an empty list.
async fn get_trades(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<Vec<Trade>>, ApiError> {
    match state.rest.get_trades(&symbol, query.limit).await {
        Ok(trades) => Ok(Json(trades)),
        Err(e @ (RestError::InvalidSymbol(_) | RestError::InvalidTimeframe(_))) => Err(e.into()),
        Err(e) => {
            warn!(%symbol, error = %e, "Trade history fetch failed, returning empty list");
            Ok(Json(Vec::new()))
        }
    }
}

/// Recent candles for a pair and timeframe. Upstream failures degrade to
/// an empty list.
async fn get_candles(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    Query(query): Query<CandlesQuery>,
) -> Result<Json<Vec<Candle>>, ApiError> {
    match state
        .rest
        .get_candles(&symbol, &query.timeframe, query.limit)
        .await
    {
        Ok(candles) => Ok(Json(candles)),
        Err(e @ (RestError::InvalidSymbol(_) | RestError::InvalidTimeframe(_))) => Err(e.into()),
        Err(e) => {
            warn!(%symbol, error = %e, "Candle history fetch failed, returning empty list");
            Ok(Json(Vec::new()))
        }
    }
}

/// Subscribe to a stream.
async fn subscribe(
    State(state): State<ApiState>,
    Json(request): Json<StreamRequest>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let subscription = subscription_from(&request)?;
    match state.registry.subscribe(subscription.clone()).await {
        Ok(subscribed) => {
            info!(%subscription, subscribed, "Subscribe request handled");
            Ok(Json(SubscribeResponse {
                subscription,
                subscribed,
            }))
        }
        Err(WsError::NotConnected) => Err(ApiError::NotConnected),
        Err(e) => Err(ApiError::Upstream(e.to_string())),
    }
}

/// Unsubscribe from a stream.
async fn unsubscribe(
    State(state): State<ApiState>,
    Json(request): Json<StreamRequest>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let subscription = subscription_from(&request)?;
    match state.registry.unsubscribe(&subscription).await {
        Ok(unsubscribed) => {
            info!(%subscription, unsubscribed, "Unsubscribe request handled");
            Ok(Json(UnsubscribeResponse {
                subscription,
                unsubscribed,
            }))
        }
        Err(WsError::NotConnected) => Err(ApiError::NotConnected),
        Err(e) => Err(ApiError::Upstream(e.to_string())),
    }
}

/// Portfolio valuation from per-currency query parameters.
async fn get_portfolio(
    State(state): State<ApiState>,
    Query(query): Query<PortfolioQuery>,
) -> Result<Json<HashMap<String, Decimal>>, ApiError> {
    value_balances(&state, balances_from(&query)).await
}

/// Portfolio valuation from a JSON body of currency balances.
async fn post_portfolio(
    State(state): State<ApiState>,
    Json(balances): Json<HashMap<String, Decimal>>,
) -> Result<Json<HashMap<String, Decimal>>, ApiError> {
    let balances = balances
        .into_iter()
        .map(|(currency, amount)| (currency.to_uppercase(), amount))
        .collect();
    value_balances(&state, balances).await
}

async fn value_balances(
    state: &ApiState,
    balances: HashMap<String, Decimal>,
) -> Result<Json<HashMap<String, Decimal>>, ApiError> {
    let calculator = PortfolioCalculator::new(state.rest.clone());
    let valued = calculator.value_portfolio(&balances).await?;
    Ok(Json(valued))
}

/// Liveness plus the current connection state.
async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connection: state.connection.connection_state(),
    })
}

fn subscription_from(request: &StreamRequest) -> Result<Subscription, ApiError> {
    let symbol = normalize_symbol(&request.symbol).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    match request.channel {
        Channel::Candles => {
            let timeframe = request
                .timeframe
                .as_deref()
                .ok_or_else(|| ApiError::BadRequest("timeframe is required for candles".into()))?;
            let timeframe =
                validate_timeframe(timeframe).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            Ok(Subscription::candles(symbol, timeframe))
        }
        Channel::Ticker => Ok(Subscription::ticker(symbol)),
        Channel::Trades => Ok(Subscription::trades(symbol)),
    }
}

fn balances_from(query: &PortfolioQuery) -> HashMap<String, Decimal> {
    let mut balances = HashMap::new();
    for (currency, amount) in [
        ("USDT", query.usdt),
        ("BTC", query.btc),
        ("XRP", query.xrp),
        ("XMR", query.xmr),
        ("DASH", query.dash),
    ] {
        if let Some(amount) = amount {
            balances.insert(currency.to_string(), amount);
        }
    }
    balances
}

/// Run the API HTTP server.
pub async fn run_server(
    state: ApiState,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfx_feed::SnapshotCache;
    use bfx_rest::RestClient;
    use bfx_ws::{ConnectionState, SubscriptionRegistry, WsWriteHandle};
    use parking_lot::RwLock;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn test_state(connection_state: ConnectionState) -> (ApiState, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = WsWriteHandle::new(tx, Arc::new(RwLock::new(connection_state)));
        let state = ApiState::new(
            Arc::new(SnapshotCache::new()),
            // Unroutable base URL; tests never reach the network.
            Arc::new(RestClient::with_base_url("http://127.0.0.1:1").unwrap()),
            Arc::new(SubscriptionRegistry::new(handle.clone())),
            handle,
        );
        (state, rx)
    }

    #[tokio::test]
    async fn test_ticker_served_from_cache() {
        let (state, _rx) = test_state(ConnectionState::Open);
        state.cache.put(Ticker::new(
            "BTCUSD",
            dec!(50000),
            dec!(120),
            dec!(0.0024),
            dec!(310.5),
            dec!(50500),
            dec!(49100),
        ));

        let Json(ticker) = get_ticker(State(state), Path("btcusdt".to_string()))
            .await
            .unwrap();
        assert_eq!(ticker.symbol, "BTCUSD");
        assert_eq!(ticker.last_price, dec!(50000));
    }

    #[tokio::test]
    async fn test_ticker_rejects_bad_symbol() {
        let (state, _rx) = test_state(ConnectionState::Open);
        let result = get_ticker(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_subscribe_conflicts_when_disconnected() {
        let (state, _rx) = test_state(ConnectionState::Disconnected);
        let request = StreamRequest {
            channel: Channel::Ticker,
            symbol: "BTCUSD".to_string(),
            timeframe: None,
        };

        let result = subscribe(State(state), Json(request)).await;
        assert!(matches!(result, Err(ApiError::NotConnected)));
    }

    #[tokio::test]
    async fn test_subscribe_records_stream() {
        let (state, _rx) = test_state(ConnectionState::Open);
        let request = StreamRequest {
            channel: Channel::Candles,
            symbol: "btcusdt".to_string(),
            timeframe: Some("1m".to_string()),
        };

        let Json(response) = subscribe(State(state.clone()), Json(request)).await.unwrap();
        assert!(response.subscribed);
        assert!(state.registry.contains(&Subscription::candles("BTCUSD", "1m")));
    }

    #[test]
    fn test_candles_require_timeframe() {
        let request = StreamRequest {
            channel: Channel::Candles,
            symbol: "BTCUSD".to_string(),
            timeframe: None,
        };
        assert!(matches!(
            subscription_from(&request),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_balances_from_query() {
        let query = PortfolioQuery {
            btc: Some(dec!(1)),
            usdt: Some(dec!(1000)),
            ..Default::default()
        };

        let balances = balances_from(&query);
        assert_eq!(balances.len(), 2);
        assert_eq!(balances["BTC"], dec!(1));
        assert_eq!(balances["USDT"], dec!(1000));
    }

    #[tokio::test]
    async fn test_health_reports_connection_state() {
        let (state, _rx) = test_state(ConnectionState::Reconnecting);
        let Json(health) = get_health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.connection, ConnectionState::Reconnecting);
    }
}
