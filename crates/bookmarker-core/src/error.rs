//! Error types for bookmarker-core

use thiserror::Error;

/// Result type alias using bookmarker-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bookmarker-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bookmark store rejected a request
    #[error("Store API error: {0}")]
    Api(String),

    /// Change feed (websocket) error
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Bookmark not found
    #[error("Bookmark not found: {0}")]
    NotFound(String),

    /// Row belongs to another user
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
