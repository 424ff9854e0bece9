//! Shared engine state and injected context
//!
//! The engine has no global singletons: `EngineContext` is constructed
//! once by the host and passed by reference to whichever components need
//! it. `SharedState` carries the broadcast event channel and a small
//! amount of cross-component observable state.

use crate::analysis::key::KeyDetection;
use crate::graph::AudioGraphProvider;
use crate::media::MediaFactory;
use crate::session::PlaybackSession;
use crate::store::{MemoryStore, SettingsStore};
use amx_common::events::AmxEvent;
use amx_common::Tuning;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared state accessible by all engine components
pub struct SharedState {
    /// Event broadcaster for engine observers
    pub event_tx: broadcast::Sender<AmxEvent>,
}

impl SharedState {
    /// Create new shared state
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self { event_tx }
    }

    /// Broadcast an event to all listeners
    ///
    /// Send errors (no receivers) are ignored.
    pub fn broadcast_event(&self, event: AmxEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the engine event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<AmxEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the engine needs, bundled for injection
///
/// Constructed once at startup; components hold `Arc` clones of the
/// pieces they use. Key detection is optional - when absent, key handling
/// falls back to title-token matching and the fixed Camelot table.
pub struct EngineContext {
    /// Tunable parameters
    pub tuning: Tuning,

    /// Shared observable state + event channel
    pub state: Arc<SharedState>,

    /// External playback session (queue, transport, user volume)
    pub session: Arc<dyn PlaybackSession>,

    /// Shared audio graph provider
    pub graph: Arc<dyn AudioGraphProvider>,

    /// Factory for temporary media elements
    pub media_factory: Arc<dyn MediaFactory>,

    /// Optional key detection service
    pub key_detection: Option<Arc<dyn KeyDetection>>,

    /// Settings persistence (BPM overrides, preferences)
    pub settings: Arc<dyn SettingsStore>,
}

impl EngineContext {
    /// Build a context with default tuning and an in-memory settings store
    pub fn new(
        session: Arc<dyn PlaybackSession>,
        graph: Arc<dyn AudioGraphProvider>,
        media_factory: Arc<dyn MediaFactory>,
    ) -> Self {
        Self {
            tuning: Tuning::default(),
            state: Arc::new(SharedState::new()),
            session,
            graph,
            media_factory,
            key_detection: None,
            settings: Arc::new(MemoryStore::new()),
        }
    }

    /// Replace the tuning parameters
    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Attach a key detection service
    pub fn with_key_detection(mut self, detection: Arc<dyn KeyDetection>) -> Self {
        self.key_detection = Some(detection);
        self
    }

    /// Attach a persistent settings store
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = settings;
        self
    }
}
