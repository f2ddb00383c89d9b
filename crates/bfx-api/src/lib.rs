//! HTTP API for the Bitfinex connector.
//!
//! Exposes the cached and historical market data plus subscription
//! control over a small axum JSON surface.

pub mod error;
pub mod server;
pub mod state;
pub mod types;

pub use error::ApiError;
pub use server::{create_router, run_server};
pub use state::ApiState;
pub use types::{
    CandlesQuery, HealthResponse, PortfolioQuery, StreamRequest, SubscribeResponse, TradesQuery,
    UnsubscribeResponse, DEFAULT_LIMIT,
};
