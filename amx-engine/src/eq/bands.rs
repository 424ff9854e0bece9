//! Band layout and gain vectors
//!
//! Ten parametric bands at fixed center frequencies, mapped monotonically
//! low to high. Gains are decibels, clamped to a bounded range so the
//! adaptive loop and the distortion limiter can never chase each other
//! into runaway positive feedback.

use amx_common::events::BandGroup;
use std::ops::Range;

/// Number of parametric bands
pub const BAND_COUNT: usize = 10;

/// Fixed band center frequencies, in Hz
pub const CENTER_FREQUENCIES: [f32; BAND_COUNT] = [
    31.0, 62.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Band indices covered by a band group
pub fn group_bands(group: BandGroup) -> Range<usize> {
    match group {
        BandGroup::Bass => 0..3,
        BandGroup::Mid => 3..7,
        BandGroup::Treble => 7..10,
    }
}

/// Band group a band index belongs to
pub fn group_of(band: usize) -> BandGroup {
    match band {
        0..=2 => BandGroup::Bass,
        3..=6 => BandGroup::Mid,
        _ => BandGroup::Treble,
    }
}

/// Ordered per-band gains in dB, low to high frequency
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GainVector(pub [f32; BAND_COUNT]);

impl GainVector {
    /// All-zero (flat) gains
    pub fn flat() -> Self {
        Self::default()
    }

    /// Clamp every band into ±limit dB
    pub fn clamped(mut self, limit_db: f32) -> Self {
        for gain in self.0.iter_mut() {
            *gain = gain.clamp(-limit_db, limit_db);
        }
        self
    }

    /// Scale every band by a factor
    pub fn scaled(mut self, factor: f32) -> Self {
        for gain in self.0.iter_mut() {
            *gain *= factor;
        }
        self
    }

    /// Sum of positive gains only (limiter input)
    pub fn positive_sum(&self) -> f32 {
        self.0.iter().filter(|&&g| g > 0.0).sum()
    }

    /// Largest absolute band difference from another vector
    pub fn max_delta(&self, other: &GainVector) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

impl std::ops::Index<usize> for GainVector {
    type Output = f32;
    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

impl std::ops::IndexMut<usize> for GainVector {
    fn index_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_are_monotonic() {
        for pair in CENTER_FREQUENCIES.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn groups_cover_all_bands_exactly_once() {
        let mut covered = vec![0usize; BAND_COUNT];
        for group in BandGroup::all() {
            for i in group_bands(*group) {
                covered[i] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn group_of_inverts_group_bands() {
        for group in BandGroup::all() {
            for i in group_bands(*group) {
                assert_eq!(group_of(i), *group);
            }
        }
    }

    #[test]
    fn clamp_bounds_both_signs() {
        let mut v = GainVector::flat();
        v[0] = 40.0;
        v[9] = -40.0;
        let clamped = v.clamped(12.0);
        assert_eq!(clamped[0], 12.0);
        assert_eq!(clamped[9], -12.0);
    }

    #[test]
    fn positive_sum_ignores_cuts() {
        let mut v = GainVector::flat();
        v[0] = 3.0;
        v[1] = -5.0;
        v[2] = 2.0;
        assert_eq!(v.positive_sum(), 5.0);
    }
}
