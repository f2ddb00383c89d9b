//! REST error types.

use bfx_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),
}

impl From<CoreError> for RestError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSymbol(s) => Self::InvalidSymbol(s),
            CoreError::InvalidTimeframe(tf) => Self::InvalidTimeframe(tf),
            other => Self::Decode(other.to_string()),
        }
    }
}

pub type RestResult<T> = Result<T, RestError>;
