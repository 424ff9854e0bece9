//! EQ mode processors
//!
//! Pure functions from measured band levels (plus the controller's rolling
//! history, passed in as the smoothed levels) to a target gain vector.
//! Decisions are level-relative - driven by energy ratios between bands,
//! not fixed per-preset targets - so a quiet track and a loud track in the
//! same genre receive different corrections.
//!
//! The numeric slopes and caps are empirically tuned listening values
//! surfaced through [`Tuning`]; they are configuration defaults, not
//! derived constants.

use super::bands::GainVector;
use amx_common::model::BandLevels;
use amx_common::Tuning;
use serde::{Deserialize, Serialize};

/// Adaptive EQ preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Soften harshness, relax the top end
    Chill,
    /// Reinforce low end relative to the mids
    Bass,
    /// Lift vocal presence out of the mix
    Vocals,
    /// Rebalance whichever band group drifts from the mix average
    Adaptive,
}

impl Preset {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chill" => Some(Preset::Chill),
            "bass" => Some(Preset::Bass),
            "vocals" | "vocal" => Some(Preset::Vocals),
            "adaptive" => Some(Preset::Adaptive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Chill => "chill",
            Preset::Bass => "bass",
            Preset::Vocals => "vocals",
            Preset::Adaptive => "adaptive",
        }
    }
}

/// Run the processor for a preset
///
/// `levels` is the instantaneous sample; `smoothed` is the rolling-history
/// mean maintained by the analyzer. Returns target gains in dB, before
/// intensity scaling, limiting, and smoothing.
pub fn process(
    preset: Preset,
    levels: BandLevels,
    smoothed: BandLevels,
    tuning: &Tuning,
) -> GainVector {
    match preset {
        Preset::Chill => chill(levels, smoothed, tuning),
        Preset::Bass => bass(levels, tuning),
        Preset::Vocals => vocals(levels, tuning),
        Preset::Adaptive => adaptive(smoothed, tuning),
    }
}

/// Guarded ratio: avoids blowing up on silent denominators
fn ratio(num: f32, den: f32) -> f32 {
    if den < 1.0 {
        1.0
    } else {
        num / den
    }
}

/// Chill: tame harsh treble and sibilance, add gentle warmth
///
/// Every move is capped at `chill_step_cap_db` (0.7 dB default) - this
/// preset is deliberately timid.
fn chill(levels: BandLevels, smoothed: BandLevels, tuning: &Tuning) -> GainVector {
    let cap = tuning.chill_step_cap_db;
    let mut gains = GainVector::flat();

    let overall = levels.overall();
    let treble_ratio = ratio(levels.treble, overall);
    if treble_ratio > 1.1 {
        let cut = ((treble_ratio - 1.1) * 2.0).min(cap);
        gains[8] = -cut;
        gains[9] = -cut;
    }

    // Sibilance shows up as presence running hot against the smoothed mix
    let presence_ratio = ratio(levels.vocal, smoothed.mid.max(levels.mid));
    if presence_ratio > 1.3 {
        gains[7] = -((presence_ratio - 1.3).min(cap));
    }

    let bass_ratio = ratio(levels.bass, overall);
    if bass_ratio < 0.8 {
        let warmth = ((0.8 - bass_ratio) * 1.5).min(cap);
        gains[1] = warmth;
        gains[2] = warmth;
    }

    gains
}

/// Bass: reinforce the low end when it sits under the mids
///
/// Boost activates when bass/mid drops below 0.9 and is capped at
/// `bass_boost_cap_db` (6 dB default); an over-heavy low end (> 1.6×)
/// gets a modest cut instead.
fn bass(levels: BandLevels, tuning: &Tuning) -> GainVector {
    let mut gains = GainVector::flat();
    let bass_to_mid = ratio(levels.bass, levels.mid);

    if bass_to_mid < 0.9 {
        let boost = ((0.9 - bass_to_mid) * 12.0).min(tuning.bass_boost_cap_db);
        gains[0] = boost;
        gains[1] = boost;
        gains[2] = boost * 0.5;
    } else if bass_to_mid > 1.6 {
        let cut = ((bass_to_mid - 1.6) * 4.0).min(3.0);
        gains[0] = -cut;
        gains[1] = -cut;
    }

    gains
}

/// Vocals: lift presence when vocals sit low, clear mud when mids swamp
fn vocals(levels: BandLevels, tuning: &Tuning) -> GainVector {
    let mut gains = GainVector::flat();
    let overall = levels.overall();

    let vocal_ratio = ratio(levels.vocal, overall);
    if vocal_ratio < 0.9 {
        let boost = ((0.9 - vocal_ratio) * 8.0).min(tuning.vocal_boost_cap_db);
        gains[6] = boost;
        gains[7] = boost;
        gains[5] = boost * 0.25;
    }

    let mid_ratio = ratio(levels.mid, overall);
    if mid_ratio > 1.3 {
        // Low-mid mud competes directly with the vocal fundamentals
        gains[3] = -((mid_ratio - 1.3) * 3.0).min(2.0);
    }

    gains
}

/// Adaptive: pull whichever band group drifts from the mix average back
/// toward balance
///
/// Works on the smoothed history so one loud snare does not yank the EQ.
fn adaptive(smoothed: BandLevels, tuning: &Tuning) -> GainVector {
    let cap = tuning.adaptive_cap_db;
    let mut gains = GainVector::flat();
    let overall = smoothed.overall();
    if overall < 1.0 {
        return gains;
    }

    let corrections = [
        (0..3, ratio(smoothed.bass, overall)),
        (3..7, ratio(smoothed.mid, overall)),
        (7..10, ratio(smoothed.treble, overall)),
    ];

    for (range, group_ratio) in corrections {
        let adjust = if group_ratio < 0.75 {
            ((0.75 - group_ratio) * 8.0).min(cap)
        } else if group_ratio > 1.35 {
            -((group_ratio - 1.35) * 8.0).min(cap)
        } else {
            0.0
        };
        for i in range {
            gains[i] = adjust;
        }
    }

    gains
}
