//! Dynamic EQ: adaptive frequency reshaping from live spectral feedback
//!
//! The controller owns a bank of parametric filters (platform-side
//! biquads behind the [`crate::graph::FilterBank`] trait). Mode
//! processors are pure functions from measured band levels to gain
//! adjustments; the controller applies intensity scaling, distortion
//! limiting, smoothing, and manual-vs-adaptive arbitration on top.

pub mod bands;
pub mod controller;
pub mod distortion;
pub mod limiter;
pub mod modes;

pub use bands::{GainVector, BAND_COUNT, CENTER_FREQUENCIES};
pub use controller::EqController;
pub use distortion::DistortionWatchdog;
pub use modes::Preset;

/// Adaptive intensity setting
///
/// Scales all adjustment magnitudes and transition smoothing: slower and
/// gentler for chill, faster and stronger for aggressive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    Chill,
    Normal,
    Aggressive,
}

impl Intensity {
    /// Multiplier on mode-processor output magnitudes
    pub fn magnitude_scale(&self) -> f32 {
        match self {
            Intensity::Chill => 0.6,
            Intensity::Normal => 1.0,
            Intensity::Aggressive => 1.5,
        }
    }

    /// Exponential smoothing factor per tick (higher = faster)
    pub fn smoothing_alpha(&self) -> f32 {
        match self {
            Intensity::Chill => 0.08,
            Intensity::Normal => 0.15,
            Intensity::Aggressive => 0.3,
        }
    }

    /// Multiplier on the distortion-limiter ceiling
    pub fn ceiling_scale(&self) -> f32 {
        match self {
            Intensity::Chill => 0.8,
            Intensity::Normal => 1.0,
            Intensity::Aggressive => 1.15,
        }
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Intensity::Normal
    }
}
