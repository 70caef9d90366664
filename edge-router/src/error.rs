//! Error types for edge-router

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Router error types
#[derive(Error, Debug)]
pub enum RouterError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The rewritten upstream URL could not be built
    #[error("Invalid upstream URI: {0}")]
    InvalidUri(String),

    /// Network failure while contacting an upstream
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),
}

impl RouterError {
    /// HTTP status reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouterError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
            RouterError::Config(_) | RouterError::InvalidUri(_) | RouterError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

impl From<config::ConfigError> for RouterError {
    fn from(e: config::ConfigError) -> Self {
        RouterError::Config(e.to_string())
    }
}
