//! AutoMix transition engine
//!
//! State machine governing queue lookahead, preloading, and the
//! time-scheduled crossfade/beatmatch/filter-sweep transition between two
//! audio sources, including pause/resume and failure fallback.

pub mod engine;
pub mod runner;
pub mod state;

pub use engine::AutoMixEngine;
pub use runner::{StepProgress, TransitionRunner};
pub use state::{lookahead, Phase, PreparedNext};
