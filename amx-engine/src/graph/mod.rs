//! Shared audio graph collaborator boundary
//!
//! The engine never constructs the platform's root audio context; it taps
//! into a shared graph keyed by media handle, exposed as a small set of
//! named ports plus connect/disconnect primitives. All routing decisions
//! are made by the [`topology`] module's single authoritative apply
//! function rather than ad hoc incremental patching.

pub mod topology;

use crate::error::Result;
use crate::media::MediaElement;
use std::sync::Arc;

pub use topology::{apply_topology, GraphTopology};

/// Named ports in the shared audio graph
///
/// Ports are stable identities; what node sits behind each port is the
/// provider's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// Media source output
    Source,
    /// Input of the parametric filter chain
    EqInput,
    /// Output of the parametric filter chain
    EqOutput,
    /// Non-destructive analysis tap (never affects playback routing)
    AnalyserTap,
    /// Transition-time routing chain (sweep filters, temp element mix)
    TransitionChain,
    /// Master output bus
    Master,
}

/// Connect/disconnect primitives over the shared graph
///
/// `connections` reports the current edge set so the topology apply
/// function can compute a minimal diff.
pub trait AudioRouter: Send + Sync {
    fn connect(&self, from: Port, to: Port) -> Result<()>;
    fn disconnect(&self, from: Port, to: Port) -> Result<()>;
    fn connections(&self) -> Vec<(Port, Port)>;
}

/// Platform-owned bank of parametric peaking filters
///
/// One filter per fixed center frequency; the EQ controller writes gains,
/// the platform applies them to its biquads.
pub trait FilterBank: Send + Sync {
    /// Number of bands in the bank
    fn band_count(&self) -> usize;

    /// Set the gain of one band, in dB
    fn set_gain(&self, band: usize, db: f32);

    /// Current gain of one band, in dB
    fn gain(&self, band: usize) -> f32;
}

/// Dual low-pass/high-pass sweep filter inserted per transition side
///
/// DJ mode drives both cutoffs per step to muffle the outgoing track and
/// open up the incoming one.
pub trait SweepFilter: Send + Sync {
    /// Set the low-pass cutoff in Hz
    fn set_lowpass(&self, hz: f32);

    /// Set the high-pass cutoff in Hz
    fn set_highpass(&self, hz: f32);
}

/// Provider abstracting the platform's audio routing
pub trait AudioGraphProvider: Send + Sync {
    /// Router over the shared graph for the primary playback chain
    fn router(&self) -> Arc<dyn AudioRouter>;

    /// The parametric filter bank behind `EqInput`/`EqOutput`
    fn filter_bank(&self) -> Arc<dyn FilterBank>;

    /// Insert (or fetch the already-inserted) sweep filter for a media
    /// element's output path
    fn sweep_for(&self, media: &Arc<dyn MediaElement>) -> Result<Arc<dyn SweepFilter>>;

    /// Remove the sweep filter from a media element's output path
    ///
    /// Must be idempotent: releasing a sweep that is not installed is a
    /// no-op, so the restore path can never double-unwind.
    fn release_sweep(&self, media: &Arc<dyn MediaElement>) -> Result<()>;
}
