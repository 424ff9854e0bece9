//! Live spectral analysis
//!
//! Wraps the platform's frequency/time-domain analysis tap. Computes band
//! energy levels (bass/mid/treble/vocal), keeps a bounded rolling history
//! for smoothing, and derives secondary best-effort signals: beat/tempo
//! hints, a genre guess, and per-band distortion statistics for the
//! watchdog. None of the secondary signals ever gate EQ decisions.

use amx_common::events::BandGroup;
use amx_common::model::BandLevels;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Fixed band partitions, in Hz
const BASS_RANGE: (f32, f32) = (20.0, 250.0);
const MID_RANGE: (f32, f32) = (250.0, 2000.0);
const TREBLE_RANGE: (f32, f32) = (2000.0, 20_000.0);

/// Vocal band is a weighted blend: fundamentals, presence, harmonics
const VOCAL_FUNDAMENTAL: (f32, f32) = (85.0, 255.0);
const VOCAL_PRESENCE: (f32, f32) = (2000.0, 4000.0);
const VOCAL_HARMONICS: (f32, f32) = (4000.0, 8000.0);

/// Magnitude value treated as near-clipping on the 0..=255 analyser scale
const CLIP_LEVEL: f32 = 250.0;

/// Platform analysis tap
///
/// `frequency_bins` returns the current magnitude snapshot on a 0..=255
/// scale (byte-style frequency data); `time_domain` returns the current
/// waveform frame in [-1,1].
pub trait SpectrumSource: Send + Sync {
    fn frequency_bins(&self) -> Vec<f32>;
    fn time_domain(&self) -> Vec<f32>;
    fn sample_rate(&self) -> u32;
}

/// Per-band distortion statistics for one snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
    /// Fraction of bins more than 2 standard deviations above the band
    /// mean
    pub spikiness: f32,
    /// Variance of bin magnitudes within the band, normalized to the
    /// magnitude scale
    pub variance: f32,
    /// Any bin at or above the clip level
    pub clipping: bool,
}

impl BandStats {
    /// Composite distortion score in [0,1]
    ///
    /// Near-clipping bins flag immediately regardless of the statistics.
    pub fn score(&self) -> f32 {
        if self.clipping {
            return 1.0;
        }
        let variance_term = (self.variance / 4000.0).min(1.0);
        (self.spikiness * 0.7 + variance_term * 0.3).min(1.0)
    }
}

/// Beat tracking state for the live BPM hint
struct BeatState {
    /// Decaying adaptive energy threshold
    threshold: f32,
    /// Seconds of audio processed so far
    clock: f64,
    /// Recent beat timestamps, bounded
    beats: VecDeque<f64>,
}

/// Live spectral analyzer over a platform tap
pub struct SpectralAnalyzer {
    source: Arc<dyn SpectrumSource>,
    history: Mutex<VecDeque<BandLevels>>,
    history_len: usize,
    beat: Mutex<BeatState>,
}

impl SpectralAnalyzer {
    pub fn new(source: Arc<dyn SpectrumSource>, history_len: usize) -> Self {
        Self {
            source,
            history: Mutex::new(VecDeque::with_capacity(history_len)),
            history_len,
            beat: Mutex::new(BeatState {
                threshold: 0.0,
                clock: 0.0,
                beats: VecDeque::new(),
            }),
        }
    }

    /// Read the current spectrum and compute per-band mean magnitudes
    ///
    /// Each call appends to the rolling history (bounded at the
    /// configured length).
    pub fn sample_levels(&self) -> BandLevels {
        let bins = self.source.frequency_bins();
        let rate = self.source.sample_rate();

        let levels = BandLevels {
            bass: band_mean(&bins, rate, BASS_RANGE),
            mid: band_mean(&bins, rate, MID_RANGE),
            treble: band_mean(&bins, rate, TREBLE_RANGE),
            vocal: band_mean(&bins, rate, VOCAL_FUNDAMENTAL) * 0.2
                + band_mean(&bins, rate, VOCAL_PRESENCE) * 0.5
                + band_mean(&bins, rate, VOCAL_HARMONICS) * 0.3,
        };

        let mut history = self.history.lock().unwrap();
        history.push_back(levels);
        while history.len() > self.history_len {
            history.pop_front();
        }

        levels
    }

    /// Mean of the rolling history (smoothed band levels)
    pub fn smoothed_levels(&self) -> BandLevels {
        let history = self.history.lock().unwrap();
        if history.is_empty() {
            return BandLevels::default();
        }
        let n = history.len() as f32;
        let mut sum = BandLevels::default();
        for levels in history.iter() {
            sum.bass += levels.bass;
            sum.mid += levels.mid;
            sum.treble += levels.treble;
            sum.vocal += levels.vocal;
        }
        BandLevels {
            bass: sum.bass / n,
            mid: sum.mid / n,
            treble: sum.treble / n,
            vocal: sum.vocal / n,
        }
    }

    /// Snapshot of the rolling history, oldest first
    pub fn history(&self) -> Vec<BandLevels> {
        self.history.lock().unwrap().iter().copied().collect()
    }

    /// Distortion statistics for one band group from the current spectrum
    pub fn band_stats(&self, group: BandGroup) -> BandStats {
        let bins = self.source.frequency_bins();
        let rate = self.source.sample_rate();
        let range = match group {
            BandGroup::Bass => BASS_RANGE,
            BandGroup::Mid => MID_RANGE,
            BandGroup::Treble => TREBLE_RANGE,
        };

        let slice = band_slice(&bins, rate, range);
        if slice.is_empty() {
            return BandStats {
                spikiness: 0.0,
                variance: 0.0,
                clipping: false,
            };
        }

        let n = slice.len() as f32;
        let mean = slice.iter().sum::<f32>() / n;
        let variance = slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let std_dev = variance.sqrt();

        let spike_cutoff = mean + 2.0 * std_dev;
        let spiky = slice.iter().filter(|&&v| v > spike_cutoff).count() as f32 / n;
        let clipping = slice.iter().any(|&v| v >= CLIP_LEVEL);

        BandStats {
            spikiness: spiky,
            variance,
            clipping,
        }
    }

    /// Feed a time-domain frame into the beat tracker
    ///
    /// Uses a decaying adaptive energy threshold: a frame whose energy
    /// clears the decayed threshold by a margin counts as a beat.
    pub fn process_beat_frame(&self) {
        let frame = self.source.time_domain();
        if frame.is_empty() {
            return;
        }
        let rate = self.source.sample_rate() as f64;
        let energy =
            (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();

        let mut beat = self.beat.lock().unwrap();
        beat.clock += frame.len() as f64 / rate;
        beat.threshold *= 0.98;

        if energy > beat.threshold * 1.3 && energy > 0.02 {
            let since_last = beat
                .beats
                .back()
                .map(|&t| beat.clock - t)
                .unwrap_or(f64::MAX);
            // 250ms refractory keeps a single kick from double-counting
            if since_last > 0.25 {
                let now = beat.clock;
                beat.beats.push_back(now);
                while beat.beats.len() > 64 {
                    beat.beats.pop_front();
                }
            }
        }
        if energy > beat.threshold {
            beat.threshold = energy;
        }
    }

    /// Best-effort live tempo estimate from recent beat spacing
    ///
    /// Informational only. Returns `None` until enough beats accumulate.
    pub fn estimate_live_bpm(&self) -> Option<f32> {
        let beat = self.beat.lock().unwrap();
        if beat.beats.len() < 8 {
            return None;
        }
        let times: Vec<f64> = beat.beats.iter().copied().collect();
        let intervals: Vec<f64> = times
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&i| (0.25..=2.0).contains(&i))
            .collect();
        if intervals.is_empty() {
            return None;
        }
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let mut bpm = 60.0 / mean;
        while bpm < 70.0 {
            bpm *= 2.0;
        }
        while bpm > 180.0 {
            bpm /= 2.0;
        }
        Some(bpm as f32)
    }

    /// Best-effort genre guess from smoothed band balance and live tempo
    ///
    /// Informational; feeds log lines, never EQ decisions.
    pub fn guess_genre(&self) -> &'static str {
        let levels = self.smoothed_levels();
        let overall = levels.overall().max(1.0);
        let bass_ratio = levels.bass / overall;
        let treble_ratio = levels.treble / overall;
        let bpm = self.estimate_live_bpm();

        match bpm {
            Some(bpm) if bpm >= 160.0 && bass_ratio > 1.1 => "drum-and-bass",
            Some(bpm) if (118.0..=135.0).contains(&bpm) && bass_ratio > 1.0 => "house",
            Some(bpm) if bpm <= 100.0 && bass_ratio > 1.2 => "hip-hop",
            _ if treble_ratio > 1.2 && bass_ratio < 0.8 => "acoustic",
            _ if bass_ratio > 1.3 => "electronic",
            _ => "unknown",
        }
    }
}

/// Mean magnitude of the bins covering a Hz range
fn band_mean(bins: &[f32], sample_rate: u32, range: (f32, f32)) -> f32 {
    let slice = band_slice(bins, sample_rate, range);
    if slice.is_empty() {
        0.0
    } else {
        slice.iter().sum::<f32>() / slice.len() as f32
    }
}

/// Slice of bins covering a Hz range
///
/// Bin width is nyquist / bin count; at least one bin is always included
/// for a non-empty in-range request so narrow bands on coarse FFTs do not
/// vanish.
fn band_slice(bins: &[f32], sample_rate: u32, (lo_hz, hi_hz): (f32, f32)) -> &[f32] {
    if bins.is_empty() {
        return bins;
    }
    let nyquist = sample_rate as f32 / 2.0;
    let hz_per_bin = nyquist / bins.len() as f32;
    let lo = ((lo_hz / hz_per_bin) as usize).min(bins.len() - 1);
    let hi = ((hi_hz / hz_per_bin).ceil() as usize).clamp(lo + 1, bins.len());
    &bins[lo..hi]
}
