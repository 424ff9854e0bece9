//! Media element collaborator boundary
//!
//! Abstracts the platform's playable media handle (an HTML media element,
//! a GStreamer pipeline, a test fake). The transition runner drives two of
//! these at once during a crossfade; the engine never owns a real decoder
//! or output device itself.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// A playable media source
///
/// Synchronous accessors reflect the element's current observable state;
/// `play` and `wait_until_playable` return futures so implementations can
/// suspend on the platform's readiness signals. Both return boxed futures
/// to keep the trait object-safe for `Arc<dyn MediaElement>` use across
/// spawned tasks.
pub trait MediaElement: Send + Sync {
    /// Begin (or resume) playback
    ///
    /// A rejected play is a hard failure for the caller to handle.
    fn play(&self) -> BoxFuture<'_, Result<()>>;

    /// Pause playback
    fn pause(&self);

    /// Seek to a position in seconds
    fn seek(&self, secs: f64);

    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Media duration in seconds, once known
    fn duration(&self) -> Option<f64>;

    /// Current volume in [0,1]
    fn volume(&self) -> f32;

    /// Set volume in [0,1]
    fn set_volume(&self, volume: f32);

    /// Current playback rate (1.0 = normal speed)
    fn rate(&self) -> f32;

    /// Set playback rate
    fn set_rate(&self, rate: f32);

    /// Whether the element is currently paused
    fn is_paused(&self) -> bool;

    /// Source URL the element is bound to
    fn src(&self) -> String;

    /// Resolves once the element has buffered enough to play through
    ///
    /// The caller bounds the wait with a timeout and treats expiry as a
    /// hard failure.
    fn wait_until_playable(&self) -> BoxFuture<'_, ()>;
}

/// Factory for temporary media elements
///
/// The transition runner creates a second element for the incoming track
/// and drops it after the handoff micro-crossfade.
pub trait MediaFactory: Send + Sync {
    /// Create a new element bound to the given source, initially paused
    fn create(&self, src: &str) -> Arc<dyn MediaElement>;
}

/// Wait for an element to become playable, bounded by a timeout
///
/// A timeout is a hard failure, not a silent continue: the transition
/// must route to its fallback path rather than fade into silence.
pub async fn await_playable(element: &dyn MediaElement, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, element.wait_until_playable())
        .await
        .map_err(|_| {
            Error::Media(format!(
                "media not playable within {:.1}s: {}",
                timeout.as_secs_f64(),
                element.src()
            ))
        })
}
