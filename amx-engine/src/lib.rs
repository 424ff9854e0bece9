//! # AutoMix Engine (amx-engine)
//!
//! DJ-style automatic transitions between tracks plus an adaptive
//! "dynamic EQ" that reshapes frequency response from live spectral
//! feedback.
//!
//! **Purpose:** watch the playback session's queue, prepare and analyze the
//! next track ahead of time, and run time-scheduled crossfade / beatmatch /
//! filter-sweep transitions between two audio sources; independently, poll
//! the spectral analyzer on a fixed tick and continuously reshape the
//! currently-playing signal through a parametric filter bank.
//!
//! **Architecture:** single tokio runtime, cooperative tasks, explicit
//! boolean in-flight guards. All platform audio surfaces (media elements,
//! the shared audio graph, key detection, settings persistence) are
//! injected collaborator traits, so the engine never touches a real device
//! and is fully testable with in-memory fakes.

pub mod analysis;
pub mod eq;
pub mod error;
pub mod graph;
pub mod media;
pub mod session;
pub mod state;
pub mod store;
pub mod transition;

pub use error::{Error, Result};
pub use state::{EngineContext, SharedState};
