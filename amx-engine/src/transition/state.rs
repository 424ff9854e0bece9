//! Transition engine state types and queue lookahead

use crate::session::RepeatMode;
use amx_common::model::{AnalysisRecord, QueueSnapshot, Track};

/// Transition engine phase
///
/// `Idle → Preparing → Ready → Transitioning → Idle`, with `Preparing`
/// re-entered whenever queue-change invalidation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No lookahead cached; entered at startup and after each completed
    /// or failed transition
    Idle,

    /// Candidate determination, analysis, and preload in progress
    Preparing,

    /// Validated candidate with warmed cache held alongside a queue
    /// fingerprint
    Ready,

    /// Stepped transition running; at most one at a time
    Transitioning,
}

/// A prepared transition candidate
#[derive(Debug, Clone)]
pub struct PreparedNext {
    /// The candidate track
    pub track: Track,

    /// Queue index the candidate will occupy once current
    pub queue_index: usize,

    /// Analysis results, completed before the candidate became Ready
    pub analysis: AnalysisRecord,

    /// Queue fingerprint captured when preparation finished
    pub snapshot: QueueSnapshot,

    /// Candidate came from a random/autoplay pick; fire-time lookahead
    /// validation is skipped for these by design
    pub from_random: bool,
}

/// Deterministic queue lookahead
///
/// Returns the next track and its queue index: current index + 1, or wrap
/// to 0 under repeat-all. Repeat-one loops the current track on the
/// session side, so no transition candidate exists. `None` means the
/// queue is exhausted (autoplay fallback is the caller's decision).
pub fn lookahead(queue: &[Track], index: usize, repeat: RepeatMode) -> Option<(Track, usize)> {
    if queue.is_empty() || repeat == RepeatMode::One {
        return None;
    }
    if index + 1 < queue.len() {
        return Some((queue[index + 1].clone(), index + 1));
    }
    if repeat == RepeatMode::All {
        return Some((queue[0].clone(), 0));
    }
    None
}
