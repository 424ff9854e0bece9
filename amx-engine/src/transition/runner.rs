//! Stepped transition executor
//!
//! Runs one transition at a time: creates the temporary media element for
//! the incoming track, drives the per-step volume/rate/sweep schedule, and
//! performs the handoff back to the primary element. Progress is explicit
//! state advanced step by step, so a user pause suspends the loop in place
//! and resumes exactly where it stopped instead of replaying wall-clock
//! time.
//!
//! The runner reports failures upward; the engine owns the hard-cut
//! fallback policy.

use crate::graph::{apply_topology, AudioGraphProvider, GraphTopology, Port, SweepFilter};
use crate::media::{await_playable, MediaElement, MediaFactory};
use crate::session::PlaybackSession;
use crate::state::SharedState;
use amx_common::events::{AmxEvent, TransitionMode};
use amx_common::model::{AnalysisRecord, Track};
use amx_common::{TransitionCurve, Tuning};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Explicit step progress carried across pause/resume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepProgress {
    pub step: u32,
    pub total: u32,
    pub paused: bool,
}

impl StepProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.step as f32 / self.total as f32
        }
    }
}

/// Sweep cutoffs for both transition sides at one step
///
/// Outgoing: low-pass closes from full range toward 200 Hz, then the
/// high-pass hollows the lows over the back half. Incoming: starts
/// muffled and narrow-band, opens to full range. `intensity` in [0.1,1]
/// scales how far each sweep travels.
pub(crate) fn dj_sweep_cutoffs(t: f32, intensity: f32) -> (f32, f32, f32, f32) {
    let depth = intensity.clamp(0.1, 1.0);
    let t = t.clamp(0.0, 1.0);

    let out_lp = 20_000.0 * (200.0f32 / 20_000.0).powf(t * depth);
    let out_hp = if t > 0.5 {
        20.0 + 480.0 * depth * ((t - 0.5) / 0.5)
    } else {
        20.0
    };

    let in_lp = 300.0 * (20_000.0f32 / 300.0).powf(1.0 - (1.0 - t) * depth);
    let in_hp = 20.0 + 600.0 * depth * (1.0 - t);

    (out_lp, out_hp, in_lp, in_hp)
}

/// Playback rate for one side at step fraction `t`
///
/// Ramps quickly to `target` at the start, holds through the first
/// `hold` fraction of steps, then eases back to 1.0 over the remainder.
pub(crate) fn ramp_rate(t: f32, hold: f32, target: f32) -> f32 {
    const RAMP_IN: f32 = 0.1;
    let t = t.clamp(0.0, 1.0);
    if t <= RAMP_IN {
        1.0 + (target - 1.0) * (t / RAMP_IN)
    } else if t <= hold {
        target
    } else {
        let s = ((t - hold) / (1.0 - hold)).clamp(0.0, 1.0);
        let eased = s * s * (3.0 - 2.0 * s);
        target + (1.0 - target) * eased
    }
}

/// Bounded rate targets for beatmatching, or `None` when the tempo gap is
/// too wide to ramp
///
/// Within tolerance the outgoing side may shift up to
/// `rate_shift_in_tolerance` (6%), within twice tolerance up to
/// `rate_shift_out_tolerance` (3%); the incoming side moves reciprocally.
pub(crate) fn rate_targets(bpm_out: f32, bpm_in: f32, tuning: &Tuning) -> Option<(f32, f32)> {
    if bpm_out <= 0.0 || bpm_in <= 0.0 {
        return None;
    }
    let diff = (bpm_out - bpm_in).abs();
    let max_shift = if diff <= tuning.bpm_tolerance {
        tuning.rate_shift_in_tolerance
    } else if diff <= 2.0 * tuning.bpm_tolerance {
        tuning.rate_shift_out_tolerance
    } else {
        return None;
    };
    let out_target = (bpm_in / bpm_out).clamp(1.0 - max_shift, 1.0 + max_shift);
    let in_target = (1.0 / out_target).clamp(1.0 - max_shift, 1.0 + max_shift);
    Some((out_target, in_target))
}

/// Stepped transition executor
///
/// Holds the user-pause watch channel and the internal-operation counter
/// shared with the engine: transport pauses the runner itself causes
/// during handoff must not be mistaken for user intent.
pub struct TransitionRunner {
    tuning: Tuning,
    state: Arc<SharedState>,
    session: Arc<dyn PlaybackSession>,
    graph: Arc<dyn AudioGraphProvider>,
    media_factory: Arc<dyn MediaFactory>,
    paused: watch::Receiver<bool>,
    internal_ops: Arc<AtomicUsize>,
    progress: Mutex<Option<StepProgress>>,
}

struct SweepPair {
    outgoing: Arc<dyn SweepFilter>,
    incoming: Arc<dyn SweepFilter>,
}

impl TransitionRunner {
    pub fn new(
        tuning: Tuning,
        state: Arc<SharedState>,
        session: Arc<dyn PlaybackSession>,
        graph: Arc<dyn AudioGraphProvider>,
        media_factory: Arc<dyn MediaFactory>,
        paused: watch::Receiver<bool>,
        internal_ops: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            tuning,
            state,
            session,
            graph,
            media_factory,
            paused,
            internal_ops,
            progress: Mutex::new(None),
        }
    }

    /// Current step progress, while a transition is running
    pub fn progress(&self) -> Option<StepProgress> {
        *self.progress.lock().unwrap()
    }

    /// Execute a full transition to `incoming_track`
    ///
    /// On `Err` the temporary element and any sweep filters have already
    /// been torn down and the user's volume restored on whatever element
    /// is audible; the caller decides whether to hard-cut.
    pub async fn run(
        &self,
        mode: TransitionMode,
        incoming_track: &Track,
        from_analysis: &AnalysisRecord,
        to_analysis: &AnalysisRecord,
    ) -> Result<()> {
        let outgoing = self.session.primary_media();
        let user_volume = self.session.user_volume();

        let temp = self.media_factory.create(&incoming_track.src);
        temp.set_volume(0.0);

        let restore_topology = self.entry_topology();
        let result = self
            .execute(mode, incoming_track, from_analysis, to_analysis, &outgoing, &temp, user_volume)
            .await;

        // Unwind runs on both paths and is idempotent throughout
        self.restore(&outgoing, &temp, restore_topology, user_volume);
        *self.progress.lock().unwrap() = None;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        mode: TransitionMode,
        incoming_track: &Track,
        from_analysis: &AnalysisRecord,
        to_analysis: &AnalysisRecord,
        outgoing: &Arc<dyn MediaElement>,
        temp: &Arc<dyn MediaElement>,
        user_volume: f32,
    ) -> Result<()> {
        let timeout = Duration::from_secs(self.tuning.playable_timeout_secs);
        await_playable(temp.as_ref(), timeout).await?;
        temp.play().await?;

        let curve = match mode {
            TransitionMode::Dj => TransitionCurve::DjSweep,
            _ => TransitionCurve::Smoothstep,
        };

        let targets = if mode == TransitionMode::Seamless {
            None
        } else {
            let t = rate_targets(from_analysis.bpm, to_analysis.bpm, &self.tuning);
            match &t {
                Some((out_t, in_t)) => info!(
                    bpm_out = from_analysis.bpm,
                    bpm_in = to_analysis.bpm,
                    out_rate = out_t,
                    in_rate = in_t,
                    "tempo ramp active"
                ),
                None => debug!(
                    bpm_out = from_analysis.bpm,
                    bpm_in = to_analysis.bpm,
                    "tempo gap too wide, volume-only crossfade"
                ),
            }
            t
        };

        let sweeps = if mode == TransitionMode::Dj {
            self.install_sweeps(outgoing, temp)?
        } else {
            None
        };

        self.step_loop(curve, targets, sweeps.as_ref(), outgoing, temp, user_volume)
            .await;

        self.handoff(incoming_track, temp, user_volume).await
    }

    /// Topology to restore after the transition, derived from whether the
    /// EQ chain is currently in the playback path
    fn entry_topology(&self) -> GraphTopology {
        let eq_active = self
            .graph
            .router()
            .connections()
            .contains(&(Port::EqOutput, Port::Master));
        if eq_active {
            GraphTopology::EqOnly
        } else {
            GraphTopology::Bypass
        }
    }

    fn install_sweeps(
        &self,
        outgoing: &Arc<dyn MediaElement>,
        temp: &Arc<dyn MediaElement>,
    ) -> Result<Option<SweepPair>> {
        let router = self.graph.router();
        let topology = match self.entry_topology() {
            GraphTopology::EqOnly => GraphTopology::EqWithTransition,
            _ => GraphTopology::TransitionOnly,
        };
        apply_topology(router.as_ref(), topology)?;
        let pair = SweepPair {
            outgoing: self.graph.sweep_for(outgoing)?,
            incoming: self.graph.sweep_for(temp)?,
        };
        Ok(Some(pair))
    }

    async fn step_loop(
        &self,
        curve: TransitionCurve,
        targets: Option<(f32, f32)>,
        sweeps: Option<&SweepPair>,
        outgoing: &Arc<dyn MediaElement>,
        temp: &Arc<dyn MediaElement>,
        user_volume: f32,
    ) {
        let total = self.tuning.crossfade_steps;
        let step_duration = self.tuning.step_duration();
        let hold = self.tuning.ramp_hold_fraction;
        let intensity = self.tuning.filter_sweep_intensity;

        for step in 0..total {
            self.wait_while_paused(step, total).await;

            let t = (step + 1) as f32 / total as f32;

            outgoing.set_volume(curve.fade_out(t) * user_volume);
            temp.set_volume(curve.fade_in(t) * user_volume);

            if let Some((out_target, in_target)) = targets {
                outgoing.set_rate(ramp_rate(t, hold, out_target));
                temp.set_rate(ramp_rate(t, hold, in_target));
            }

            if let Some(pair) = sweeps {
                let (out_lp, out_hp, in_lp, in_hp) = dj_sweep_cutoffs(t, intensity);
                pair.outgoing.set_lowpass(out_lp);
                pair.outgoing.set_highpass(out_hp);
                pair.incoming.set_lowpass(in_lp);
                pair.incoming.set_highpass(in_hp);
            }

            *self.progress.lock().unwrap() = Some(StepProgress {
                step: step + 1,
                total,
                paused: false,
            });

            tokio::time::sleep(step_duration).await;
        }
    }

    /// Suspend at the current step while the user transport is paused
    ///
    /// Polling (rather than awaiting the watch change) keeps this a plain
    /// fixed-interval spin and leaves progress untouched.
    async fn wait_while_paused(&self, step: u32, total: u32) {
        if !*self.paused.borrow() {
            return;
        }
        let fraction = step as f32 / total as f32;
        *self.progress.lock().unwrap() = Some(StepProgress {
            step,
            total,
            paused: true,
        });
        self.state.broadcast_event(AmxEvent::TransitionPaused {
            progress: fraction,
            timestamp: chrono::Utc::now(),
        });
        info!(progress = fraction, "transition suspended by user pause");

        let poll = Duration::from_millis(self.tuning.pause_poll_ms);
        while *self.paused.borrow() {
            tokio::time::sleep(poll).await;
        }

        self.state.broadcast_event(AmxEvent::TransitionResumed {
            progress: fraction,
            timestamp: chrono::Utc::now(),
        });
        info!(progress = fraction, "transition resumed");
    }

    /// Hand playback from the temporary element back to the primary
    ///
    /// The primary is pointed at the incoming source, seeked to where the
    /// temporary element actually got to (its reported position plus the
    /// micro-fade lead at its effective rate), then masked in with a short
    /// secondary crossfade.
    async fn handoff(
        &self,
        incoming_track: &Track,
        temp: &Arc<dyn MediaElement>,
        user_volume: f32,
    ) -> Result<()> {
        self.internal_ops.fetch_add(1, Ordering::SeqCst);
        let result = self.handoff_inner(incoming_track, temp, user_volume).await;
        self.internal_ops.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn handoff_inner(
        &self,
        incoming_track: &Track,
        temp: &Arc<dyn MediaElement>,
        user_volume: f32,
    ) -> Result<()> {
        let micro_fade = Duration::from_millis(self.tuning.micro_fade_ms);
        let target_position =
            temp.position() + micro_fade.as_secs_f64() * f64::from(temp.rate());

        self.session.set_primary_source(&incoming_track.src);
        let primary = self.session.primary_media();
        primary.set_volume(0.0);
        primary.set_rate(1.0);

        let timeout = Duration::from_secs(self.tuning.playable_timeout_secs);
        await_playable(primary.as_ref(), timeout).await?;
        primary.seek(target_position);
        primary.play().await?;

        // Micro-crossfade masks the element swap
        const MICRO_STEPS: u32 = 8;
        let micro_step = micro_fade / MICRO_STEPS;
        for i in 1..=MICRO_STEPS {
            let t = i as f32 / MICRO_STEPS as f32;
            temp.set_volume((1.0 - t) * user_volume);
            primary.set_volume(t * user_volume);
            tokio::time::sleep(micro_step).await;
        }

        temp.pause();
        primary.set_volume(user_volume);
        self.state.broadcast_event(AmxEvent::VolumeRestored {
            volume: user_volume,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Unconditional unwind after a transition attempt
    ///
    /// Safe to run after success or failure: sweep release is idempotent
    /// on the provider side and the topology apply is a diff, so nothing
    /// here can double-restore.
    fn restore(
        &self,
        outgoing: &Arc<dyn MediaElement>,
        temp: &Arc<dyn MediaElement>,
        topology: GraphTopology,
        user_volume: f32,
    ) {
        temp.pause();
        temp.set_rate(1.0);
        outgoing.set_rate(1.0);

        if let Err(e) = self.graph.release_sweep(outgoing) {
            warn!(error = %e, "outgoing sweep release failed");
        }
        if let Err(e) = self.graph.release_sweep(temp) {
            warn!(error = %e, "incoming sweep release failed");
        }
        if let Err(e) = apply_topology(self.graph.router().as_ref(), topology) {
            warn!(error = %e, ?topology, "topology restore failed");
        }

        self.session.primary_media().set_volume(user_volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> Tuning {
        Tuning::default()
    }

    #[test]
    fn rate_targets_within_tolerance_allows_six_percent() {
        // diff 1 <= tolerance 8
        let (out_t, in_t) = rate_targets(120.0, 121.0, &tuning()).unwrap();
        assert!((out_t - 121.0 / 120.0).abs() < 1e-6);
        assert!((in_t - 120.0 / 121.0).abs() < 1e-4);
    }

    #[test]
    fn rate_targets_outside_double_tolerance_is_none() {
        // diff 30 > 16
        assert!(rate_targets(120.0, 150.0, &tuning()).is_none());
    }

    #[test]
    fn rate_targets_between_tolerances_bounded_at_three_percent() {
        // diff 12, between 8 and 16, full correction would be 10%
        let (out_t, _) = rate_targets(120.0, 132.0, &tuning()).unwrap();
        assert!((out_t - 1.03).abs() < 1e-6);
    }

    #[test]
    fn rate_targets_unknown_bpm_is_none() {
        assert!(rate_targets(0.0, 128.0, &tuning()).is_none());
    }

    #[test]
    fn ramp_holds_then_eases_back() {
        let target = 1.05;
        assert_eq!(ramp_rate(0.0, 0.8, target), 1.0);
        assert!((ramp_rate(0.5, 0.8, target) - target).abs() < 1e-6);
        assert!((ramp_rate(0.8, 0.8, target) - target).abs() < 1e-6);
        let near_end = ramp_rate(0.95, 0.8, target);
        assert!(near_end < target && near_end > 1.0);
        assert!((ramp_rate(1.0, 0.8, target) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dj_sweep_closes_outgoing_and_opens_incoming() {
        let (out_lp_start, _, in_lp_start, in_hp_start) = dj_sweep_cutoffs(0.0, 1.0);
        let (out_lp_end, out_hp_end, in_lp_end, in_hp_end) = dj_sweep_cutoffs(1.0, 1.0);

        assert!(out_lp_start > 19_000.0);
        assert!((out_lp_end - 200.0).abs() < 1.0);
        assert!(out_hp_end > 400.0);

        assert!((in_lp_start - 300.0).abs() < 1.0);
        assert!(in_lp_end > 19_000.0);
        assert!(in_hp_start > in_hp_end);
        assert!((in_hp_end - 20.0).abs() < 1.0);
    }

    #[test]
    fn sweep_intensity_scales_travel() {
        let (deep_lp, _, _, _) = dj_sweep_cutoffs(0.5, 1.0);
        let (shallow_lp, _, _, _) = dj_sweep_cutoffs(0.5, 0.2);
        assert!(shallow_lp > deep_lp);
    }

    #[test]
    fn step_progress_fraction() {
        let p = StepProgress {
            step: 90,
            total: 180,
            paused: false,
        };
        assert!((p.fraction() - 0.5).abs() < 1e-6);
    }
}
