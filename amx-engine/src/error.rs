//! Error types for amx-engine
//!
//! Module-specific error type using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the AutoMix engine
#[derive(Error, Debug)]
pub enum Error {
    /// Audio analysis errors (decode failure, insufficient onsets)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Media preload errors (fetch error, bad status)
    #[error("Preload error: {0}")]
    Preload(String),

    /// Transition setup or execution errors
    #[error("Transition error: {0}")]
    Transition(String),

    /// Media element errors (playability timeout, play rejection)
    #[error("Media error: {0}")]
    Media(String),

    /// Audio graph wiring errors
    #[error("Audio graph error: {0}")]
    Graph(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// HTTP transfer errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from amx-common
    #[error(transparent)]
    Common(#[from] amx_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
