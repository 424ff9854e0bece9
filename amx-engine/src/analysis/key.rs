//! Musical key handling
//!
//! Key detection proper is delegated to an injected external service. The
//! engine only carries the fallbacks: a title-token regex when the service
//! is missing or unsure, and a fixed Camelot-wheel table for harmonic
//! compatibility (exact and relative major/minor matches only).

use crate::error::Result;
use amx_common::model::{KeySignature, Track};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Detector confidence at or below which the result is discarded
const MIN_CONFIDENCE: f32 = 0.3;

/// Optional external key detection service
pub trait KeyDetection: Send + Sync {
    /// Detect the key of a media source
    fn detect_key<'a>(&'a self, src: &'a str) -> BoxFuture<'a, Result<KeySignature>>;

    /// Harmonic compatibility between two keys
    fn keys_compatible(&self, a: &KeySignature, b: &KeySignature) -> bool;
}

/// Explicit "<note> major/minor" token in a title
static KEY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-G][#b♯♭]?)\s*(major|minor|maj|min)\b").expect("static regex")
});

/// Resolve a track's key, preferring the external detector
///
/// Detector results with confidence ≤ 0.3 are treated as unknown and the
/// title-token fallback runs instead; when that finds nothing the key is
/// `unknown`.
pub async fn resolve_key(track: &Track, detector: Option<&dyn KeyDetection>) -> KeySignature {
    if let Some(detector) = detector {
        match detector.detect_key(&track.src).await {
            Ok(key) if key.confidence > MIN_CONFIDENCE => return key,
            Ok(key) => {
                debug!(track = %track.name, confidence = key.confidence, "low-confidence key discarded");
            }
            Err(e) => {
                debug!(track = %track.name, error = %e, "key detection failed");
            }
        }
    }

    if let Some(caps) = KEY_TOKEN.captures(&track.name) {
        let note = normalize_note(&caps[1]);
        let minor = caps[2].to_lowercase().starts_with("min");
        let name = format!("{} {}", note, if minor { "minor" } else { "major" });
        return KeySignature {
            camelot: camelot_for(&note, minor),
            name,
            confidence: 0.2,
        };
    }

    KeySignature::unknown()
}

/// Harmonic compatibility between two keys
///
/// Delegates to the detector when present; otherwise falls back to the
/// fixed Camelot table: exact match or relative major/minor (same wheel
/// number, other letter). Unknown keys are never called compatible.
pub fn keys_compatible(
    a: &KeySignature,
    b: &KeySignature,
    detector: Option<&dyn KeyDetection>,
) -> bool {
    if !a.is_known() || !b.is_known() {
        return false;
    }
    if let Some(detector) = detector {
        return detector.keys_compatible(a, b);
    }

    let (ca, cb) = match (camelot_code(a), camelot_code(b)) {
        (Some(ca), Some(cb)) => (ca, cb),
        _ => return false,
    };
    // Exact slot, or relative major/minor sharing the wheel number
    ca.0 == cb.0
}

/// Parsed Camelot code: wheel number (1-12) and letter ('A' minor /
/// 'B' major)
fn camelot_code(key: &KeySignature) -> Option<(u8, char)> {
    let code = match &key.camelot {
        Some(code) => code.clone(),
        None => {
            // Derive from the key name when the detector did not supply one
            let mut parts = key.name.split_whitespace();
            let note = normalize_note(parts.next()?);
            let minor = parts.next()?.to_lowercase().starts_with("min");
            camelot_for(&note, minor)?
        }
    };
    let letter = code.chars().last()?.to_ascii_uppercase();
    let number: u8 = code[..code.len() - 1].parse().ok()?;
    if (1..=12).contains(&number) && (letter == 'A' || letter == 'B') {
        Some((number, letter))
    } else {
        None
    }
}

/// Canonical sharp-based note spelling
fn normalize_note(raw: &str) -> String {
    let cleaned = raw.replace('♯', "#").replace('♭', "b");
    let mut chars = cleaned.chars();
    let letter = chars.next().unwrap_or('C').to_ascii_uppercase();
    let accidental = chars.next();

    let note = match accidental {
        Some('b') => match letter {
            'A' => "G#",
            'B' => "A#",
            'C' => "B",
            'D' => "C#",
            'E' => "D#",
            'F' => "E",
            'G' => "F#",
            _ => "C",
        }
        .to_string(),
        Some('#') => format!("{}#", letter),
        _ => letter.to_string(),
    };
    note
}

/// Fixed Camelot wheel positions
fn camelot_for(note: &str, minor: bool) -> Option<String> {
    let majors: &[(&str, u8)] = &[
        ("B", 1),
        ("F#", 2),
        ("C#", 3),
        ("G#", 4),
        ("D#", 5),
        ("A#", 6),
        ("F", 7),
        ("C", 8),
        ("G", 9),
        ("D", 10),
        ("A", 11),
        ("E", 12),
    ];
    let minors: &[(&str, u8)] = &[
        ("G#", 1),
        ("D#", 2),
        ("A#", 3),
        ("F", 4),
        ("C", 5),
        ("G", 6),
        ("D", 7),
        ("A", 8),
        ("E", 9),
        ("B", 10),
        ("F#", 11),
        ("C#", 12),
    ];

    let table = if minor { minors } else { majors };
    let letter = if minor { 'A' } else { 'B' };
    table
        .iter()
        .find(|(n, _)| *n == note)
        .map(|(_, num)| format!("{}{}", num, letter))
}
