//! Playback session collaborator boundary
//!
//! The playback session (queue, history, shuffle/repeat, transport) lives
//! outside the core. The engine consumes "what plays next" queries and
//! transport events from it, and pushes track-pointer / queue-index
//! updates back when a transition completes.
//!
//! User volume is an explicit API on the session rather than an
//! intercepted property write: volume changes the engine makes during a
//! transition are engine-internal and must never leak into the user's
//! stored preference.

use crate::media::MediaElement;
use amx_common::model::Track;
use std::sync::Arc;

/// Repeat mode reported by the playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Off,
    All,
    One,
}

/// Transport / queue events the engine consumes from the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The current song changed (skip, natural advance, user pick)
    SongChanged,

    /// Periodic playback position update, in seconds
    TimeUpdate(f64),

    /// The queue contents or order changed
    QueueUpdated,

    /// The user paused the transport
    TransportPaused,

    /// The user resumed the transport
    TransportResumed,
}

/// External playback session collaborator
///
/// Implementations must be cheap to query: the engine calls these on every
/// time-update tick. All methods take `&self`; interior mutability is the
/// implementer's concern.
pub trait PlaybackSession: Send + Sync {
    /// Currently playing track, if any
    fn current_track(&self) -> Option<Track>;

    /// Ordered queue contents
    fn queue(&self) -> Vec<Track>;

    /// Index of the current track within the queue
    fn queue_index(&self) -> usize;

    /// Active repeat mode
    fn repeat_mode(&self) -> RepeatMode;

    /// Whether autoplay may pick a random track once the queue is exhausted
    fn autoplay_enabled(&self) -> bool;

    /// Random/autoplay pick when the queue is exhausted
    fn random_track(&self) -> Option<Track>;

    /// Primary media element the session is playing through
    fn primary_media(&self) -> Arc<dyn MediaElement>;

    /// Point the primary element at a new source (does not autostart)
    fn set_primary_source(&self, src: &str);

    /// Advance the session's notion of current track + queue position
    ///
    /// Called by the engine after a completed (or fallback) transition.
    fn set_current(&self, track: &Track, queue_index: usize);

    /// Emit the session's own song-changed notification to its observers
    fn notify_song_changed(&self);

    /// Ask the session's UI layer to refresh its display
    fn request_display_refresh(&self);

    /// The user's stored volume preference, in [0,1]
    fn user_volume(&self) -> f32;

    /// Update the user's stored volume preference
    ///
    /// The engine only calls this for genuine user intent, never for
    /// crossfade-internal volume moves.
    fn set_user_volume(&self, volume: f32);
}
