//! Bitfinex market-data connector binary crate.
//!
//! Wires the WebSocket feed, dispatcher, snapshot cache, REST client and
//! HTTP API into one process driven by TOML configuration.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use logging::init_logging;
