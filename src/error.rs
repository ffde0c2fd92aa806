//! Typed causes carried inside a [`Status`](crate::status::Status).

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error("database client is not available: startup has not run or shutdown has cleared it")]
    ClientUnavailable,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("backend: {0}")]
    Backend(String),
    #[error("rate limited: controller '{0}' has no token available")]
    RateLimited(String),
    #[error("deadline exceeded after {0:?}")]
    Timeout(Duration),
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("operation cancelled")]
    Cancelled,
    #[error("decode: {0}")]
    Decode(String),
    #[error("config: {0}")]
    Config(String),
    #[error("client already started")]
    AlreadyStarted,
}

impl SqlError {
    /// Convenience for stand-in backends reporting a plain message.
    pub fn backend(msg: impl Into<String>) -> Self {
        SqlError::Backend(msg.into())
    }
}
