//! Core data model shared by the AutoMix crates
//!
//! Tracks are immutable once created; analysis records are created lazily
//! and cached for the session; queue snapshots are cheap fingerprints used
//! to detect concurrent queue mutation between prepare and fire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A playable track
///
/// Identity is `id`; `src` equality is used as a secondary integrity check
/// when swapping playback sources. `duration` is filled in asynchronously
/// once media metadata loads, so it starts out `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Stable track identity
    pub id: Uuid,

    /// Track title
    pub name: String,

    /// Primary artist
    pub artist: String,

    /// Featured artists, if any
    pub featuring: Option<String>,

    /// Genre tag, if known (feeds the metadata BPM prior)
    pub genre: Option<String>,

    /// Album name, if known
    pub album: Option<String>,

    /// Cover art URL, if any
    pub cover: Option<String>,

    /// Media source URL
    pub src: String,

    /// Duration in seconds, once metadata has loaded
    pub duration: Option<f64>,
}

impl Track {
    /// Concatenated searchable text (title, artist, genre, album)
    ///
    /// Used by the metadata BPM estimator for token scanning.
    pub fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.name, self.artist);
        if let Some(ft) = &self.featuring {
            text.push(' ');
            text.push_str(ft);
        }
        if let Some(genre) = &self.genre {
            text.push(' ');
            text.push_str(genre);
        }
        if let Some(album) = &self.album {
            text.push(' ');
            text.push_str(album);
        }
        text.to_lowercase()
    }
}

/// Detected (or guessed) musical key for a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Key name, e.g. "A minor", or "unknown"
    pub name: String,

    /// Camelot wheel position, e.g. "8A", when known
    pub camelot: Option<String>,

    /// Detector confidence in [0,1]; 0 for heuristic fallbacks
    pub confidence: f32,
}

impl KeySignature {
    /// The "don't know" key
    pub fn unknown() -> Self {
        Self {
            name: "unknown".to_string(),
            camelot: None,
            confidence: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.name != "unknown"
    }
}

/// Broad spectral character of a track, normalized to [0,1] per axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralProfile {
    /// High-frequency content relative to total energy
    pub brightness: f32,
    /// Low-mid body
    pub warmth: f32,
    /// Sub/bass weight
    pub bassiness: f32,
    /// Ratio of presence band to mud band
    pub clarity: f32,
}

impl SpectralProfile {
    /// Neutral profile used when analysis fails
    pub fn neutral() -> Self {
        Self {
            brightness: 0.5,
            warmth: 0.5,
            bassiness: 0.5,
            clarity: 0.5,
        }
    }
}

/// Cached per-track analysis results
///
/// Created lazily on first need, keyed by track id, never mutated except
/// by explicit manual override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Estimated tempo in BPM (always in [60,200] after clamping)
    pub bpm: f32,

    /// Overall energy in [0,1]
    pub energy: f32,

    /// Musical key (may be `unknown`)
    pub key: KeySignature,

    /// Broad spectral character
    pub spectral: SpectralProfile,
}

/// Cheap fingerprint of the external playback queue
///
/// Captured when a transition candidate is prepared and compared again at
/// fire time. A mismatch means the queue was mutated concurrently and the
/// prepared candidate must be discarded and re-derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queue length
    pub length: usize,

    /// Current queue index
    pub index: usize,

    /// Id of the first queued track, if any
    pub first_id: Option<Uuid>,

    /// Id of the track after the current index, if any
    pub next_id: Option<Uuid>,
}

impl QueueSnapshot {
    /// Fingerprint a queue at the given index
    pub fn of(queue: &[Track], index: usize) -> Self {
        Self {
            length: queue.len(),
            index,
            first_id: queue.first().map(|t| t.id),
            next_id: queue.get(index + 1).map(|t| t.id),
        }
    }
}

/// Per-band energy levels sampled from the live spectrum
///
/// Values share the analyser's magnitude scale (0..=255 for byte-style
/// frequency data); only ratios between bands are meaningful to the EQ
/// mode processors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub vocal: f32,
}

impl BandLevels {
    /// Mean of all four band levels
    pub fn overall(&self) -> f32 {
        (self.bass + self.mid + self.treble + self.vocal) / 4.0
    }
}
