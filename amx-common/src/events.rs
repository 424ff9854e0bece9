//! Event types for the AutoMix event system
//!
//! Events are broadcast over a `tokio::sync::broadcast` channel owned by
//! the engine's shared state; observers (UI layers, logging sinks) can
//! subscribe without coupling to engine internals.

use crate::model::BandLevels;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transition mode selected for a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Pure volume crossfade, no tempo change
    Seamless,
    /// Volume crossfade plus bounded playback-rate ramp
    Beatmatch,
    /// Beatmatch plus dual filter sweep and DJ volume curve
    Dj,
}

impl TransitionMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "seamless" => Some(TransitionMode::Seamless),
            "beatmatch" => Some(TransitionMode::Beatmatch),
            "dj" => Some(TransitionMode::Dj),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransitionMode::Seamless => "seamless",
            TransitionMode::Beatmatch => "beatmatch",
            TransitionMode::Dj => "dj",
        };
        write!(f, "{}", s)
    }
}

/// Band group implicated by the distortion detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandGroup {
    Bass,
    Mid,
    Treble,
}

impl BandGroup {
    pub fn all() -> &'static [BandGroup] {
        &[BandGroup::Bass, BandGroup::Mid, BandGroup::Treble]
    }
}

/// Distortion severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionSeverity {
    /// Composite score crossed the warning threshold
    Warning,
    /// Composite score crossed the severe threshold, or clipping detected
    Severe,
}

/// AutoMix event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AmxEvent {
    /// The playback session switched songs
    SongChanged {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Lookahead preparation started for a candidate track
    PrepareStarted {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Candidate analyzed and preloaded; transition may fire
    CandidateReady {
        track_id: Uuid,
        bpm: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Preparation failed; state cleared, retried on next natural trigger
    PrepareFailed {
        track_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A transition began
    TransitionStarted {
        from_id: Uuid,
        to_id: Uuid,
        mode: TransitionMode,

        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A transition completed and playback handed off
    TransitionCompleted {
        to_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A transition failed and the hard-cut fallback ran
    TransitionFallback {
        to_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A running transition suspended because the user paused
    TransitionPaused {
        progress: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A suspended transition resumed
    TransitionResumed {
        progress: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Adaptive EQ mode or preset changed
    EqModeChanged {
        adaptive: bool,
        preset: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Distortion detected on a band group
    DistortionDetected {
        band_group: BandGroup,
        score: f32,
        severity: DistortionSeverity,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Distortion cleared; gradual restoration finished for a band group
    DistortionCleared {
        band_group: BandGroup,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Live band levels sampled (periodic, informational)
    LevelsSampled {
        levels: BandLevels,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User volume restored after a transition
    VolumeRestored {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}
