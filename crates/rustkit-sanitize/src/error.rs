//! Policy construction errors.

use thiserror::Error;

/// Errors raised while building or loading a [`Policy`](crate::Policy).
///
/// Sanitizing itself never fails; only policy construction can.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Policy document error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
