//! Distortion limiting of requested gains
//!
//! The total positive gain a mode processor asks for is compared against a
//! mode-and-intensity-dependent ceiling; when exceeded, every positive
//! gain is scaled down by the same ratio so the requested shape is
//! preserved while the sum comes in under the ceiling. Cuts are never
//! touched.

use super::bands::GainVector;
use tracing::debug;

/// Scale positive gains so their sum stays under the ceiling
///
/// Returns the applied scale factor (1.0 when no limiting was needed).
pub fn limit_positive(gains: &mut GainVector, ceiling_db: f32) -> f32 {
    let positive_sum = gains.positive_sum();
    if positive_sum <= ceiling_db || positive_sum <= 0.0 {
        return 1.0;
    }

    let scale = ceiling_db / positive_sum;
    for gain in gains.0.iter_mut() {
        if *gain > 0.0 {
            *gain *= scale;
        }
    }
    debug!(positive_sum, ceiling_db, scale, "positive gains limited");
    scale
}
