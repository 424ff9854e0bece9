//! Volume curve implementations for stepped crossfades
//!
//! Provides the curve family used by the transition runner. Curves map a
//! normalized transition position to a volume multiplier; fade-in and
//! fade-out are exact mirrors so the pair sums to a perceptually smooth
//! crossfade at every step.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Volume curve types for transitions
///
/// Each curve type provides a different perceptual quality:
/// - Linear: constant rate of change (precise, predictable)
/// - EqualPower: constant perceived loudness during the crossfade
/// - Smoothstep: quintic S-curve, gentle at the edges and quick in the
///   middle (seamless and beatmatch modes)
/// - DjSweep: near-silent start, slow ramp, steep middle, asymptotic
///   finish - front-loads the perceptual "drop" later in the transition
///   (dj mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCurve {
    /// v(t) = t
    Linear,

    /// v(t) = sin(t × π/2)
    EqualPower,

    /// Quintic smoothstep: v(t) = 6t⁵ - 15t⁴ + 10t³
    Smoothstep,

    /// Rational bias: v(t) = t³ / (t³ + (1-t)³)
    DjSweep,
}

impl TransitionCurve {
    /// Fade-in multiplier at the given normalized position
    ///
    /// `position` runs 0.0 (start of fade) to 1.0 (end of fade); the
    /// result is a volume multiplier in [0,1].
    pub fn fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            TransitionCurve::Linear => t,
            TransitionCurve::EqualPower => (t * FRAC_PI_2).sin(),
            TransitionCurve::Smoothstep => t * t * t * (t * (t * 6.0 - 15.0) + 10.0),
            TransitionCurve::DjSweep => {
                let a = t * t * t;
                let inv = 1.0 - t;
                let b = inv * inv * inv;
                // a + b > 0 for all t in [0,1]
                a / (a + b)
            }
        }
    }

    /// Fade-out multiplier at the given normalized position
    ///
    /// Mirror of [`fade_in`](Self::fade_in): 1.0 at position 0.0, falling
    /// to 0.0 at position 1.0.
    pub fn fade_out(&self, position: f32) -> f32 {
        self.fade_in(1.0 - position.clamp(0.0, 1.0))
    }

    /// Parse curve from a settings string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(TransitionCurve::Linear),
            "equal_power" | "equalpower" => Some(TransitionCurve::EqualPower),
            "smoothstep" | "s_curve" | "s-curve" | "scurve" => Some(TransitionCurve::Smoothstep),
            "dj_sweep" | "djsweep" | "dj" => Some(TransitionCurve::DjSweep),
            _ => None,
        }
    }

    /// Canonical settings string (lowercase, underscored)
    pub fn to_settings_string(&self) -> &'static str {
        match self {
            TransitionCurve::Linear => "linear",
            TransitionCurve::EqualPower => "equal_power",
            TransitionCurve::Smoothstep => "smoothstep",
            TransitionCurve::DjSweep => "dj_sweep",
        }
    }

    /// All available curve variants
    pub fn all_variants() -> &'static [TransitionCurve] {
        &[
            TransitionCurve::Linear,
            TransitionCurve::EqualPower,
            TransitionCurve::Smoothstep,
            TransitionCurve::DjSweep,
        ]
    }
}

impl Default for TransitionCurve {
    /// Default curve is the quintic smoothstep used by seamless mode
    fn default() -> Self {
        TransitionCurve::Smoothstep
    }
}

impl std::fmt::Display for TransitionCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_settings_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_in_bounds() {
        for curve in TransitionCurve::all_variants() {
            let start = curve.fade_in(0.0);
            let end = curve.fade_in(1.0);
            assert!(
                start.abs() < 0.01,
                "{:?} fade-in at 0.0 should be ~0.0, got {}",
                curve,
                start
            );
            assert!(
                (end - 1.0).abs() < 0.01,
                "{:?} fade-in at 1.0 should be ~1.0, got {}",
                curve,
                end
            );
        }
    }

    #[test]
    fn fade_out_mirrors_fade_in() {
        for curve in TransitionCurve::all_variants() {
            for i in 0..=10 {
                let t = i as f32 / 10.0;
                let diff = (curve.fade_out(t) - curve.fade_in(1.0 - t)).abs();
                assert!(diff < 1e-6, "{:?} mirror broken at t={}", curve, t);
            }
        }
    }

    #[test]
    fn fade_in_monotonic() {
        for curve in TransitionCurve::all_variants() {
            let mut prev = curve.fade_in(0.0);
            for i in 1..=100 {
                let v = curve.fade_in(i as f32 / 100.0);
                assert!(v >= prev - 1e-6, "{:?} not monotonic at step {}", curve, i);
                prev = v;
            }
        }
    }

    #[test]
    fn dj_sweep_is_backloaded() {
        // At 30% through, the dj curve should still be quieter than
        // linear; at 70% it should already be louder.
        let dj = TransitionCurve::DjSweep;
        assert!(dj.fade_in(0.3) < 0.3);
        assert!(dj.fade_in(0.7) > 0.7);
        // Near-silent start
        assert!(dj.fade_in(0.1) < 0.01);
    }

    #[test]
    fn smoothstep_midpoint() {
        let v = TransitionCurve::Smoothstep.fade_in(0.5);
        assert!((v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn settings_round_trip() {
        for curve in TransitionCurve::all_variants() {
            let s = curve.to_settings_string();
            assert_eq!(TransitionCurve::from_str(s), Some(*curve));
        }
        assert_eq!(TransitionCurve::from_str("dj"), Some(TransitionCurve::DjSweep));
        assert_eq!(TransitionCurve::from_str("bogus"), None);
    }
}
