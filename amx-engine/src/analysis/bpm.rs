//! Tempo estimation
//!
//! Two estimators with very different contracts:
//!
//! - [`estimate_metadata_bpm`]: pure text heuristic over track metadata.
//!   A best-effort prior with a documented genre table - never treated as
//!   ground truth, never blocks playback.
//! - [`estimate_audio_bpm`]: offline fetch + decode + onset detection +
//!   inter-onset-interval histogram. Fails closed: resolves to 0.0 on any
//!   failure or when fewer than 4 onsets are found, signaling the caller
//!   to fall back to the metadata prior.

use crate::analysis::loader::AudioLoader;
use crate::error::Result;
use amx_common::model::Track;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tracing::{debug, warn};

/// BPM clamp applied to every estimate
const BPM_MIN: f32 = 60.0;
const BPM_MAX: f32 = 200.0;

/// Onset analysis frame/hop sizes, in samples
const FRAME_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;

/// Minimum onsets required before the audio estimate is trusted
const MIN_ONSETS: usize = 4;

/// Explicit "NN bpm" token in metadata text
static BPM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2,3})\s*bpm").expect("static regex"));

/// Genre keyword families and their hand-tuned BPM ranges
///
/// Order matters: more specific names come before substrings they contain
/// (dubstep before dub, trap before rap-adjacent hits). These are listening
/// priors, not measurements.
const GENRE_TABLE: &[(&[&str], (f32, f32))] = &[
    (
        &["drum and bass", "drum & bass", "dnb", "d&b", "jungle"],
        (170.0, 180.0),
    ),
    (&["dubstep"], (138.0, 142.0)),
    (&["hardstyle", "gabber"], (150.0, 180.0)),
    (&["trance", "psytrance"], (132.0, 140.0)),
    (&["techno"], (125.0, 135.0)),
    (&["house", "garage"], (124.0, 130.0)),
    (&["trap"], (135.0, 155.0)),
    (&["hip hop", "hip-hop", "hiphop", "rap"], (80.0, 100.0)),
    (&["r&b", "rnb", "soul"], (70.0, 100.0)),
    (&["reggaeton"], (88.0, 98.0)),
    (&["reggae", "ska"], (60.0, 90.0)),
    (&["disco", "funk"], (110.0, 125.0)),
    (&["salsa", "latin", "samba"], (90.0, 105.0)),
    (&["ambient", "chillout", "downtempo", "lofi", "lo-fi"], (60.0, 90.0)),
    (&["classical", "orchestra", "symphony", "piano"], (60.0, 120.0)),
    (&["jazz", "swing", "bebop"], (80.0, 140.0)),
    (&["blues"], (60.0, 100.0)),
    (&["metal", "thrash"], (120.0, 160.0)),
    (&["punk", "hardcore"], (140.0, 180.0)),
    (&["rock", "indie", "grunge"], (100.0, 140.0)),
    (&["country", "folk", "acoustic"], (80.0, 120.0)),
    (&["pop", "dance", "edm"], (100.0, 130.0)),
];

/// Fallback range when no genre keyword matches
const DEFAULT_RANGE: (f32, f32) = (90.0, 130.0);

/// Documented BPM range for a track's metadata text, before jitter and
/// tempo modifiers
pub fn genre_range(text: &str) -> (f32, f32) {
    for (keywords, range) in GENRE_TABLE {
        if keywords.iter().any(|k| text.contains(k)) {
            return *range;
        }
    }
    DEFAULT_RANGE
}

/// Best-effort BPM prior from track metadata
///
/// Scans concatenated name/artist/genre/album text for an explicit
/// "NN bpm" token (accepted only inside [60,200]); otherwise samples the
/// matched genre family's range, applies tempo modifiers
/// (slow ×0.75, fast ×1.25, remix ×1.05) and small jitter, and clamps to
/// [60,200]. Repeated calls on the same track may vary but always stay in
/// range.
pub fn estimate_metadata_bpm(track: &Track) -> f32 {
    let text = track.search_text();

    if let Some(caps) = BPM_TOKEN.captures(&text) {
        if let Ok(explicit) = caps[1].parse::<f32>() {
            if (BPM_MIN..=BPM_MAX).contains(&explicit) {
                debug!(track = %track.name, bpm = explicit, "explicit bpm token");
                return explicit;
            }
        }
    }

    let (lo, hi) = genre_range(&text);
    let mut rng = rand::thread_rng();
    let mut bpm = rng.gen_range(lo..=hi);

    if text.contains("slow") || text.contains("ballad") {
        bpm *= 0.75;
    } else if text.contains("fast") || text.contains("uptempo") || text.contains("speed") {
        bpm *= 1.25;
    }
    if text.contains("remix") {
        bpm *= 1.05;
    }

    bpm += rng.gen_range(-2.0..=2.0);
    bpm.clamp(BPM_MIN, BPM_MAX)
}

/// Offline tempo estimate from the audio itself
///
/// Fails closed: any fetch/decode error, or fewer than 4 detected onsets,
/// resolves to `Ok(0.0)` so the caller falls back to the metadata prior.
pub async fn estimate_audio_bpm(loader: &dyn AudioLoader, src: &str) -> Result<f32> {
    match loader.load(src).await {
        Ok(audio) => Ok(bpm_from_samples(&audio.samples, audio.sample_rate)),
        Err(e) => {
            warn!(src, error = %e, "audio bpm analysis unavailable");
            Ok(0.0)
        }
    }
}

/// Three-stage tempo pipeline over mono samples
///
/// 1. Single-pole high-pass (~100 Hz) to suppress sub-bass smear
/// 2. Framed RMS onset detection with an adaptive threshold
///    (mean + 0.5 × median of frame energies)
/// 3. Inter-onset-interval histogram (10 ms buckets) converted to BPM,
///    strongest candidate inside [80,180], half/double-time correction
///    when nothing lands in range
///
/// Returns 0.0 when the signal yields fewer than [`MIN_ONSETS`] onsets.
pub fn bpm_from_samples(samples: &[f32], sample_rate: u32) -> f32 {
    if samples.len() < FRAME_SIZE * MIN_ONSETS || sample_rate == 0 {
        return 0.0;
    }

    let filtered = high_pass(samples, sample_rate, 100.0);
    let energies = frame_energies(&filtered);
    if energies.is_empty() {
        return 0.0;
    }

    let onsets = pick_onsets(&energies, sample_rate);
    if onsets.len() < MIN_ONSETS {
        debug!(onsets = onsets.len(), "too few onsets for tempo estimate");
        return 0.0;
    }

    interval_histogram_bpm(&onsets)
}

/// Single-pole high-pass filter
fn high_pass(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> Vec<f32> {
    let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    let alpha = rc / (rc + dt);

    let mut out = Vec::with_capacity(samples.len());
    let mut prev_in = 0.0f32;
    let mut prev_out = 0.0f32;
    for &x in samples {
        let y = alpha * (prev_out + x - prev_in);
        out.push(y);
        prev_in = x;
        prev_out = y;
    }
    out
}

/// RMS energy per analysis frame
fn frame_energies(samples: &[f32]) -> Vec<f32> {
    if samples.len() < FRAME_SIZE {
        return Vec::new();
    }
    let mut energies = Vec::with_capacity((samples.len() - FRAME_SIZE) / HOP_SIZE + 1);
    let mut start = 0;
    while start + FRAME_SIZE <= samples.len() {
        let frame = &samples[start..start + FRAME_SIZE];
        let rms = (frame.iter().map(|s| s * s).sum::<f32>() / FRAME_SIZE as f32).sqrt();
        energies.push(rms);
        start += HOP_SIZE;
    }
    energies
}

/// Adaptive-threshold local-maximum peak picking over frame energies
///
/// Returns onset times in seconds. A 250 ms refractory window keeps one
/// drum hit from counting twice.
fn pick_onsets(energies: &[f32], sample_rate: u32) -> Vec<f32> {
    let mean = energies.iter().sum::<f32>() / energies.len() as f32;
    let mut sorted: Vec<f32> = energies.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = sorted[sorted.len() / 2];
    let threshold = mean + 0.5 * median;

    let frame_secs = HOP_SIZE as f32 / sample_rate as f32;
    let refractory_frames = (0.25 / frame_secs).ceil() as usize;

    let mut onsets = Vec::new();
    let mut last_onset_frame: Option<usize> = None;

    for i in 1..energies.len().saturating_sub(1) {
        let e = energies[i];
        if e <= threshold || e <= energies[i - 1] || e < energies[i + 1] {
            continue;
        }
        if let Some(last) = last_onset_frame {
            if i - last < refractory_frames {
                continue;
            }
        }
        last_onset_frame = Some(i);
        onsets.push(i as f32 * frame_secs);
    }
    onsets
}

/// Histogram inter-onset intervals in 10 ms buckets and convert the best
/// supported candidate to BPM
fn interval_histogram_bpm(onsets: &[f32]) -> f32 {
    // 10ms buckets covering intervals up to 2s
    let mut histogram = [0u32; 200];
    for pair in onsets.windows(2) {
        let interval = pair[1] - pair[0];
        if (0.25..2.0).contains(&interval) {
            let idx = ((interval * 100.0) as usize).min(199);
            histogram[idx] += 1;
        }
    }

    // Candidates sorted by support, strongest first
    let mut candidates: Vec<(usize, u32)> = histogram
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(idx, &count)| (idx, count))
        .collect();
    if candidates.is_empty() {
        return 0.0;
    }
    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    // Prefer the strongest candidate already inside [80,180]
    for &(idx, _) in &candidates {
        let bpm = 60.0 / (idx as f32 / 100.0 + 0.005);
        if (80.0..=180.0).contains(&bpm) {
            return bpm;
        }
    }

    // Nothing in range: apply half/double-time correction to the overall
    // strongest candidate
    let (idx, _) = candidates[0];
    let mut bpm = 60.0 / (idx as f32 / 100.0 + 0.005);
    while bpm < 80.0 {
        bpm *= 2.0;
    }
    while bpm > 180.0 {
        bpm /= 2.0;
    }
    bpm
}
