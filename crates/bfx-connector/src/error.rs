//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] bfx_ws::WsError),

    #[error("REST error: {0}")]
    Rest(#[from] bfx_rest::RestError),

    #[error(transparent)]
    Core(#[from] bfx_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
