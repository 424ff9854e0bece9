//! Distortion detection and gradual correction
//!
//! Runs on its own fixed tick, independent of the adaptive EQ loop.
//! Per-band-group statistical spikiness and variance are folded into a
//! composite score; crossing the warning threshold starts a stepped
//! pull-down of the implicated group, and clearing it starts a stepped
//! restoration. Neither direction ever jumps.
//!
//! The watchdog never writes the filter bank. It only maintains
//! per-group reduction state; the [`EqController`] is the bank's single
//! writer and subtracts the reduction from whatever gains the active
//! authority (manual or adaptive) requests.

use super::controller::EqController;
use crate::analysis::SpectralAnalyzer;
use crate::state::SharedState;
use amx_common::events::{AmxEvent, BandGroup, DistortionSeverity};
use amx_common::Tuning;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Correction state for one band group
#[derive(Debug, Default)]
struct GroupState {
    /// A correction (reduction or restoration) is in progress
    active: bool,

    /// Current reduction below the authority's requested gains, in dB
    /// (always ≥ 0)
    reduction_db: f32,
}

/// Distortion watchdog over the three band groups
pub struct DistortionWatchdog {
    tuning: Tuning,
    state: Arc<SharedState>,
    groups: Mutex<[GroupState; 3]>,
}

impl DistortionWatchdog {
    pub fn new(tuning: Tuning, state: Arc<SharedState>) -> Self {
        Self {
            tuning,
            state,
            groups: Mutex::new(Default::default()),
        }
    }

    /// Evaluate one tick: score each band group and step its reduction
    ///
    /// Pure state update; the controller picks the reductions up on its
    /// next bank write.
    pub fn tick(&self, analyzer: &SpectralAnalyzer) {
        self.state.broadcast_event(AmxEvent::LevelsSampled {
            levels: analyzer.sample_levels(),
            timestamp: chrono::Utc::now(),
        });

        for (slot, group) in BandGroup::all().iter().enumerate() {
            let stats = analyzer.band_stats(*group);
            let score = stats.score();
            let mut groups = self.groups.lock().unwrap();
            let st = &mut groups[slot];

            if score >= self.tuning.distortion_warn_threshold {
                if !st.active {
                    st.active = true;
                    let severity = if score >= self.tuning.distortion_severe_threshold {
                        DistortionSeverity::Severe
                    } else {
                        DistortionSeverity::Warning
                    };
                    info!(?group, score, ?severity, "distortion detected");
                    self.state.broadcast_event(AmxEvent::DistortionDetected {
                        band_group: *group,
                        score,
                        severity,
                        timestamp: chrono::Utc::now(),
                    });
                }

                if st.reduction_db < self.tuning.distortion_max_reduction_db {
                    st.reduction_db = (st.reduction_db + self.tuning.distortion_reduce_step_db)
                        .min(self.tuning.distortion_max_reduction_db);
                }
            } else if st.active {
                // Condition cleared: step back toward zero, strictly
                // decreasing every tick
                st.reduction_db -= self.tuning.distortion_restore_step_db;
                if st.reduction_db <= 0.0 {
                    st.reduction_db = 0.0;
                    st.active = false;
                    debug!(?group, "distortion correction fully restored");
                    self.state.broadcast_event(AmxEvent::DistortionCleared {
                        band_group: *group,
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        }
    }

    /// Current reduction below the authority's gains for a group, in dB
    pub fn reduction_db(&self, group: BandGroup) -> f32 {
        let slot = match group {
            BandGroup::Bass => 0,
            BandGroup::Mid => 1,
            BandGroup::Treble => 2,
        };
        self.groups.lock().unwrap()[slot].reduction_db
    }

    /// Watchdog loop on the configured tick
    ///
    /// Each tick updates reduction state, then asks the controller to
    /// re-apply the active authority's gains so reduction changes reach
    /// the bank even when the adaptive loop is off.
    pub async fn run(
        self: Arc<Self>,
        analyzer: Arc<SpectralAnalyzer>,
        controller: Arc<EqController>,
        running: Arc<RwLock<bool>>,
    ) {
        let mut tick = interval(Duration::from_millis(self.tuning.distortion_tick_ms));
        loop {
            tick.tick().await;
            if !*running.read().await {
                break;
            }
            self.tick(&analyzer);
            controller.refresh();
        }
    }
}
