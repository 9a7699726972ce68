//! Error types for the feed polling system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for feedpoll operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a fetched feed body could not be decoded
///
/// Both variants are contained within a single poll tick: they are logged
/// and the tick ends with no notifications and an unchanged watermark.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not well-formed markup
    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    /// The markup parsed but has no `channel` container under the root
    #[error("invalid feed structure: missing channel element")]
    InvalidFeedStructure,
}

/// Core error type for the feed polling system
#[derive(Error, Debug)]
pub enum Error {
    /// Feed body decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Network collaborator errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Fetch did not complete within the configured timeout
    #[error("Fetch timed out after {0}s")]
    Timeout(u64),

    /// Watermark store errors
    #[error("Watermark store error: {0}")]
    StateStore(String),

    /// Notification sink errors
    #[error("Notification sink error: {0}")]
    Sink(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a watermark store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a notification sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
