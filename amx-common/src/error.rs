//! Common error types for the AutoMix engine

use thiserror::Error;

/// Common result type for AutoMix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared across the AutoMix crates
#[derive(Error, Debug)]
pub enum Error {
    /// Audio analysis error (decode failure, insufficient signal)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Media preload error (fetch failure, bad status)
    #[error("Preload error: {0}")]
    Preload(String),

    /// Transition setup or execution error
    #[error("Transition error: {0}")]
    Transition(String),

    /// Audio graph wiring error
    #[error("Audio graph error: {0}")]
    Graph(String),

    /// Invalid state for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP transfer error (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
