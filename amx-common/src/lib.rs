//! # AutoMix Common Library
//!
//! Shared code for the AutoMix engine crates including:
//! - Core data model (tracks, analysis records, queue fingerprints)
//! - Event types (AmxEvent enum)
//! - Transition volume curve definitions and calculations
//! - Tunable parameter set (defaults + TOML loading)
//! - Error types

pub mod curves;
pub mod error;
pub mod events;
pub mod model;
pub mod params;

pub use curves::TransitionCurve;
pub use error::{Error, Result};
pub use model::{AnalysisRecord, BandLevels, KeySignature, QueueSnapshot, SpectralProfile, Track};
pub use params::Tuning;
