//! Audio analysis: live spectral levels, tempo estimation, key handling
//!
//! Offline analysis (BPM from decoded audio) is best-effort and fails
//! closed to the metadata heuristic; live analysis (band levels, beat and
//! genre hints) is purely informational and never blocks playback.

pub mod bpm;
pub mod cache;
pub mod key;
pub mod loader;
pub mod spectral;

pub use cache::AnalysisCache;
pub use spectral::{SpectralAnalyzer, SpectrumSource};
