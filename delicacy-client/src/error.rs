//! Client error types

use shared::order::TransitionError;
use shared::{AppError, ErrorCode};
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Order is not on this view's board; no request was made
    #[error("Order {0} not found")]
    OrderNotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event channel or session is gone
    #[error("Channel error: {0}")]
    Channel(String),

    /// Rejected locally, no request was made
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Bad configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Worth retrying on the next tick (network trouble or 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::Channel(_) => true,
            ClientError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transition(e) => e.into(),
            ClientError::Http(e) if e.is_timeout() => {
                AppError::with_message(ErrorCode::TimeoutError, e.to_string())
            }
            ClientError::Http(e) => AppError::network(e.to_string()),
            ClientError::Api { status, message } => {
                AppError::with_message(ErrorCode::InternalError, message).with_detail("status", status)
            }
            ClientError::NotFound(what) => AppError::not_found(what),
            ClientError::OrderNotFound(id) => AppError::order_not_found(id),
            ClientError::Validation(msg) => AppError::validation(msg),
            ClientError::InvalidResponse(msg) => AppError::with_message(ErrorCode::InvalidFormat, msg),
            ClientError::Serialization(e) => AppError::with_message(ErrorCode::InvalidFormat, e.to_string()),
            ClientError::Channel(msg) => AppError::with_message(ErrorCode::ChannelClosed, msg),
            ClientError::Config(msg) => AppError::config(msg),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
