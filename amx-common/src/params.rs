//! Tunable engine parameters
//!
//! Every empirically tuned constant in the transition engine and the EQ
//! control loop lives here as an explicit field with a documented default.
//! The numbers are hand-tuned listening values, not derived quantities, so
//! they are exposed as configuration rather than hard-coded.
//!
//! `Tuning` is constructed once (defaults, or loaded from a TOML file) and
//! injected into whichever components need it. There is deliberately no
//! global singleton.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tuning parameters
///
/// Read-frequently, written only at construction. All durations are
/// wall-clock; all gains are decibels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // ------------------------------------------------------------------
    // Transition engine
    // ------------------------------------------------------------------
    /// Seconds of remaining playback time at which a ready transition fires
    ///
    /// Valid range: [5, 60]. Default: 18.
    pub transition_lead_secs: f64,

    /// Total crossfade duration in seconds
    ///
    /// Valid range: [2, 30]. Default: 12.
    pub crossfade_secs: f64,

    /// Number of discrete steps in a stepped crossfade
    ///
    /// Valid range: [50, 400]. Default: 180 (≈67ms per step at the
    /// default duration).
    pub crossfade_steps: u32,

    /// BPM tolerance for beatmatching
    ///
    /// The tempo ramp activates when |bpm_out - bpm_in| ≤ 2 × tolerance.
    /// Default: 8.
    pub bpm_tolerance: f32,

    /// Maximum playback-rate shift when the BPM difference is within
    /// tolerance (±6% default)
    pub rate_shift_in_tolerance: f32,

    /// Maximum playback-rate shift when the BPM difference is between
    /// tolerance and 2× tolerance (±3% default)
    pub rate_shift_out_tolerance: f32,

    /// Fraction of the transition over which the tempo ramp is held
    /// before easing back to 1.0× (default 0.8)
    pub ramp_hold_fraction: f32,

    /// Seconds to wait for the incoming media element to become playable
    ///
    /// A timeout is a hard failure routed to the fallback path. Default: 5.
    pub playable_timeout_secs: u64,

    /// Duration of the secondary micro-crossfade that masks the
    /// temp-to-primary handoff, in milliseconds. Default: 80.
    pub micro_fade_ms: u64,

    /// Cooldown before the next prepare cycle is scheduled after a
    /// completed transition, in seconds. Default: 3.
    pub prepare_cooldown_secs: u64,

    /// DJ-mode filter sweep intensity scalar
    ///
    /// Valid range: [0.1, 1.0]. Default: 0.6.
    pub filter_sweep_intensity: f32,

    /// Poll interval while a transition is suspended by a user pause, in
    /// milliseconds. Default: 200.
    pub pause_poll_ms: u64,

    // ------------------------------------------------------------------
    // EQ controller
    // ------------------------------------------------------------------
    /// Hard clamp on any single band gain, in dB (applied symmetrically)
    ///
    /// Guards against runaway positive feedback between adaptive control
    /// and distortion limiting. Default: 12.
    pub gain_limit_db: f32,

    /// Nominal ceiling on the sum of positive gains requested by a mode
    /// processor, in dB, before intensity scaling. Default: 18.
    pub limiter_ceiling_db: f32,

    /// Adaptive EQ evaluation period in milliseconds. Default: 250.
    pub eq_tick_ms: u64,

    /// Per-tick cap on chill-mode band movement, in dB. Default: 0.7.
    pub chill_step_cap_db: f32,

    /// Cap on bass-mode low-band boost, in dB. Default: 6.0.
    pub bass_boost_cap_db: f32,

    /// Cap on vocal-mode presence boost, in dB. Default: 4.0.
    pub vocal_boost_cap_db: f32,

    /// Cap on adaptive-mode corrections, in dB. Default: 5.0.
    pub adaptive_cap_db: f32,

    // ------------------------------------------------------------------
    // Distortion watchdog
    // ------------------------------------------------------------------
    /// Distortion detector evaluation period in milliseconds. Default: 500.
    pub distortion_tick_ms: u64,

    /// Composite score above which distortion is flagged (orange).
    /// Default: 0.3.
    pub distortion_warn_threshold: f32,

    /// Composite score above which distortion is severe (red).
    /// Default: 0.6.
    pub distortion_severe_threshold: f32,

    /// Per-tick gain reduction while distortion persists, in dB.
    /// Default: 0.15.
    pub distortion_reduce_step_db: f32,

    /// Per-tick gain restoration once distortion clears, in dB.
    /// Default: 0.1.
    pub distortion_restore_step_db: f32,

    /// Maximum total reduction below baseline per band group, in dB.
    /// Default: 2.5.
    pub distortion_max_reduction_db: f32,

    // ------------------------------------------------------------------
    // Spectral analysis
    // ------------------------------------------------------------------
    /// Rolling history length for band-level smoothing. Default: 200.
    pub history_len: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            transition_lead_secs: 18.0,
            crossfade_secs: 12.0,
            crossfade_steps: 180,
            bpm_tolerance: 8.0,
            rate_shift_in_tolerance: 0.06,
            rate_shift_out_tolerance: 0.03,
            ramp_hold_fraction: 0.8,
            playable_timeout_secs: 5,
            micro_fade_ms: 80,
            prepare_cooldown_secs: 3,
            filter_sweep_intensity: 0.6,
            pause_poll_ms: 200,
            gain_limit_db: 12.0,
            limiter_ceiling_db: 18.0,
            eq_tick_ms: 250,
            chill_step_cap_db: 0.7,
            bass_boost_cap_db: 6.0,
            vocal_boost_cap_db: 4.0,
            adaptive_cap_db: 5.0,
            distortion_tick_ms: 500,
            distortion_warn_threshold: 0.3,
            distortion_severe_threshold: 0.6,
            distortion_reduce_step_db: 0.15,
            distortion_restore_step_db: 0.1,
            distortion_max_reduction_db: 2.5,
            history_len: 200,
        }
    }
}

impl Tuning {
    /// Load tuning from a TOML file, falling back to defaults for any
    /// missing fields
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let tuning: Tuning =
            toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Validate parameter ranges
    ///
    /// Out-of-range values are configuration errors, not silently clamped,
    /// so a typo in a config file is surfaced at startup.
    pub fn validate(&self) -> Result<()> {
        if !(5.0..=60.0).contains(&self.transition_lead_secs) {
            return Err(Error::Config(format!(
                "transition_lead_secs out of range [5,60]: {}",
                self.transition_lead_secs
            )));
        }
        if !(2.0..=30.0).contains(&self.crossfade_secs) {
            return Err(Error::Config(format!(
                "crossfade_secs out of range [2,30]: {}",
                self.crossfade_secs
            )));
        }
        if !(50..=400).contains(&self.crossfade_steps) {
            return Err(Error::Config(format!(
                "crossfade_steps out of range [50,400]: {}",
                self.crossfade_steps
            )));
        }
        if !(0.1..=1.0).contains(&self.filter_sweep_intensity) {
            return Err(Error::Config(format!(
                "filter_sweep_intensity out of range [0.1,1.0]: {}",
                self.filter_sweep_intensity
            )));
        }
        if self.gain_limit_db <= 0.0 || self.limiter_ceiling_db <= 0.0 {
            return Err(Error::Config("gain limits must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.ramp_hold_fraction) {
            return Err(Error::Config(format!(
                "ramp_hold_fraction out of range [0,1): {}",
                self.ramp_hold_fraction
            )));
        }
        Ok(())
    }

    /// Duration of one crossfade step
    pub fn step_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.crossfade_secs / self.crossfade_steps as f64)
    }
}
