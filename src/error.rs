//! Error types for the dorking library.

use thiserror::Error;

/// Result type alias for dorking operations.
pub type Result<T> = std::result::Result<T, DorkError>;

/// Errors that can occur while collecting, storing or downloading links.
#[derive(Error, Debug)]
pub enum DorkError {
    /// Browser session failed (launch, navigation, script evaluation).
    #[error("Browser error: {0}")]
    Browser(String),

    /// Failed to parse page content or a selector.
    #[error("Failed to parse: {0}")]
    Parse(String),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Engine name is not in the registry.
    #[error("Unknown search engine: {0}")]
    UnknownEngine(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Operation exceeded its time budget.
    #[error("Timeout exceeded: {0}")]
    Timeout(String),
}
