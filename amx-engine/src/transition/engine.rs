//! AutoMix engine state machine
//!
//! Idle → Preparing → Ready → Transitioning → Idle. Preparation runs on
//! song-change and queue-change events; the trigger fires on playback
//! time updates once remaining time drops under the lead window. Fresh
//! queue state is re-validated immediately before the first audible step,
//! never at preparation time.
//!
//! Guards are plain booleans, not locks: execution is cooperative and the
//! guards exist to drop re-entrant triggers, matching the single-runtime
//! model.

use crate::analysis::cache::AnalysisCache;
use crate::analysis::key::{keys_compatible, KeyDetection};
use crate::analysis::loader::AudioLoader;
use crate::session::{PlaybackSession, SessionEvent};
use crate::state::{EngineContext, SharedState};
use crate::store::SettingsStore;
use crate::transition::runner::{StepProgress, TransitionRunner};
use crate::transition::state::{lookahead, Phase, PreparedNext};
use amx_common::events::{AmxEvent, TransitionMode};
use amx_common::model::{AnalysisRecord, QueueSnapshot, Track};
use amx_common::Tuning;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const MODE_SETTING: &str = "automix.mode";

/// AutoMix transition engine
///
/// Constructed once from the injected context; hosts hold it in an `Arc`
/// and feed it [`SessionEvent`]s. All long-running work is spawned onto
/// the runtime, so `handle_event` never blocks the caller.
pub struct AutoMixEngine {
    tuning: Tuning,
    state: Arc<SharedState>,
    session: Arc<dyn PlaybackSession>,
    cache: Arc<AnalysisCache>,
    key_detection: Option<Arc<dyn KeyDetection>>,
    settings: Arc<dyn SettingsStore>,
    http: reqwest::Client,
    runner: TransitionRunner,

    enabled: AtomicBool,
    preparing: AtomicBool,
    transition_active: AtomicBool,
    phase: Mutex<Phase>,
    mode: Mutex<TransitionMode>,
    prepared: Mutex<Option<PreparedNext>>,

    paused_tx: watch::Sender<bool>,
    /// Nonzero while the engine itself is driving the transport; session
    /// pause/song-change notifications are suppressed during that window
    internal_ops: Arc<AtomicUsize>,
}

impl AutoMixEngine {
    pub fn new(ctx: &EngineContext, loader: Arc<dyn AudioLoader>) -> Arc<Self> {
        let cache = Arc::new(AnalysisCache::new(
            loader,
            ctx.key_detection.clone(),
            ctx.settings.clone(),
        ));
        let (paused_tx, paused_rx) = watch::channel(false);
        let internal_ops = Arc::new(AtomicUsize::new(0));

        let runner = TransitionRunner::new(
            ctx.tuning.clone(),
            ctx.state.clone(),
            ctx.session.clone(),
            ctx.graph.clone(),
            ctx.media_factory.clone(),
            paused_rx,
            internal_ops.clone(),
        );

        let mode = ctx
            .settings
            .get(MODE_SETTING)
            .and_then(|s| TransitionMode::from_str(&s))
            .unwrap_or(TransitionMode::Seamless);

        Arc::new(Self {
            tuning: ctx.tuning.clone(),
            state: ctx.state.clone(),
            session: ctx.session.clone(),
            cache,
            key_detection: ctx.key_detection.clone(),
            settings: ctx.settings.clone(),
            http: reqwest::Client::new(),
            runner,
            enabled: AtomicBool::new(false),
            preparing: AtomicBool::new(false),
            transition_active: AtomicBool::new(false),
            phase: Mutex::new(Phase::Idle),
            mode: Mutex::new(mode),
            prepared: Mutex::new(None),
            paused_tx,
            internal_ops,
        })
    }

    /// Shared analysis cache (BPM overrides go through here)
    pub fn analysis(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable automatic transitions
    ///
    /// Disabling clears any prepared candidate; a transition already in
    /// flight runs to completion. Enabling does not prepare by itself -
    /// the next song-change or queue event does.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was == enabled {
            return;
        }
        info!(enabled, "automix toggled");
        if !enabled {
            *self.prepared.lock().unwrap() = None;
            *self.phase.lock().unwrap() = Phase::Idle;
        }
    }

    pub fn mode(&self) -> TransitionMode {
        *self.mode.lock().unwrap()
    }

    /// Select the transition mode, persisted across sessions
    pub fn set_mode(&self, mode: TransitionMode) {
        *self.mode.lock().unwrap() = mode;
        self.settings.set(MODE_SETTING, &mode.to_string());
        info!(%mode, "transition mode set");
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap()
    }

    /// Step progress of the running transition, if any
    pub fn transition_progress(&self) -> Option<StepProgress> {
        self.runner.progress()
    }

    /// Feed one session event into the state machine
    pub fn handle_event(self: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::SongChanged => {
                if self.internal_ops.load(Ordering::SeqCst) > 0 {
                    // Engine-driven handoff; bookkeeping already done
                    return;
                }
                if let Some(track) = self.session.current_track() {
                    self.state.broadcast_event(AmxEvent::SongChanged {
                        track_id: track.id,
                        timestamp: chrono::Utc::now(),
                    });
                }
                self.invalidate_if_stale();
                self.spawn_prepare();
            }
            SessionEvent::QueueUpdated => {
                self.invalidate_if_stale();
                self.spawn_prepare();
            }
            SessionEvent::TimeUpdate(position) => self.maybe_trigger(position),
            SessionEvent::TransportPaused => {
                if self.internal_ops.load(Ordering::SeqCst) == 0 {
                    let _ = self.paused_tx.send(true);
                }
            }
            SessionEvent::TransportResumed => {
                if self.internal_ops.load(Ordering::SeqCst) == 0 {
                    let _ = self.paused_tx.send(false);
                }
            }
        }
    }

    /// Drop the prepared candidate when the live queue no longer matches
    /// its fingerprint
    fn invalidate_if_stale(&self) {
        let mut prepared = self.prepared.lock().unwrap();
        let Some(p) = prepared.as_ref() else { return };
        let snapshot = QueueSnapshot::of(&self.session.queue(), self.session.queue_index());
        if snapshot != p.snapshot {
            debug!(track = %p.track.name, "prepared candidate invalidated by queue change");
            *prepared = None;
            *self.phase.lock().unwrap() = Phase::Idle;
        }
    }

    fn spawn_prepare(self: &Arc<Self>) {
        if !self.is_enabled() {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            engine.prepare().await;
        });
    }

    /// Determine, analyze, and preload the next candidate
    ///
    /// Re-entrant calls are dropped; redundant calls for an already-ready
    /// candidate skip the preload. Any preload failure clears state back
    /// to Idle rather than holding a half-warmed candidate.
    pub async fn prepare(self: &Arc<Self>) {
        if !self.is_enabled() {
            return;
        }
        if self
            .preparing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("preparation already in flight, dropped");
            return;
        }
        self.prepare_inner().await;
        self.preparing.store(false, Ordering::SeqCst);
    }

    async fn prepare_inner(self: &Arc<Self>) {
        let queue = self.session.queue();
        let index = self.session.queue_index();
        let repeat = self.session.repeat_mode();

        let (candidate, candidate_index, from_random) =
            match lookahead(&queue, index, repeat) {
                Some((track, i)) => (track, i, false),
                None => {
                    if self.session.autoplay_enabled() {
                        match self.session.random_track() {
                            Some(track) => (track, index, true),
                            None => {
                                self.clear_to_idle();
                                return;
                            }
                        }
                    } else {
                        debug!("queue exhausted, no autoplay; nothing to prepare");
                        self.clear_to_idle();
                        return;
                    }
                }
            };

        // Redundant call for the candidate already held
        {
            let prepared = self.prepared.lock().unwrap();
            if let Some(p) = prepared.as_ref() {
                if p.track.id == candidate.id {
                    debug!(track = %candidate.name, "candidate unchanged, preload skipped");
                    return;
                }
            }
        }

        *self.phase.lock().unwrap() = Phase::Preparing;
        self.state.broadcast_event(AmxEvent::PrepareStarted {
            track_id: candidate.id,
            timestamp: chrono::Utc::now(),
        });

        // Warm the outgoing side too so fire time has both BPMs cached
        if let Some(current) = self.session.current_track() {
            self.cache.analyze(&current).await;
        }
        let analysis = self.cache.analyze(&candidate).await;

        if let Err(e) = self.prefetch(&candidate.src).await {
            warn!(track = %candidate.name, error = %e, "media prefetch failed");
            self.state.broadcast_event(AmxEvent::PrepareFailed {
                track_id: candidate.id,
                reason: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
            self.clear_to_idle();
            return;
        }

        // Fingerprint taken after the awaits so it reflects current state
        let snapshot = QueueSnapshot::of(&self.session.queue(), self.session.queue_index());
        info!(track = %candidate.name, bpm = analysis.bpm, "candidate ready");
        self.state.broadcast_event(AmxEvent::CandidateReady {
            track_id: candidate.id,
            bpm: analysis.bpm,
            timestamp: chrono::Utc::now(),
        });

        *self.prepared.lock().unwrap() = Some(PreparedNext {
            track: candidate,
            queue_index: candidate_index,
            analysis,
            snapshot,
            from_random,
        });
        *self.phase.lock().unwrap() = Phase::Ready;
    }

    /// HTTP warm-up fetch for the candidate's media
    ///
    /// Only http(s) sources are fetched; other schemes (local, test) are
    /// assumed present. A non-success status fails the preparation.
    async fn prefetch(&self, src: &str) -> crate::error::Result<()> {
        if !src.starts_with("http://") && !src.starts_with("https://") {
            return Ok(());
        }
        self.http.get(src).send().await?.error_for_status()?;
        Ok(())
    }

    fn clear_to_idle(&self) {
        *self.prepared.lock().unwrap() = None;
        *self.phase.lock().unwrap() = Phase::Idle;
    }

    /// Fire when remaining time enters the lead window and a candidate is
    /// ready
    fn maybe_trigger(self: &Arc<Self>, position: f64) {
        if !self.is_enabled() || self.phase() != Phase::Ready {
            return;
        }
        let Some(duration) = self.session.primary_media().duration() else {
            return;
        };
        let remaining = duration - position;
        if remaining > self.tuning.transition_lead_secs || remaining <= 0.0 {
            return;
        }
        // Single transition in flight; late triggers are no-ops
        if self
            .transition_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_transition().await;
            engine.transition_active.store(false, Ordering::SeqCst);
        });
    }

    async fn run_transition(self: &Arc<Self>) {
        let Some(prepared) = self.prepared.lock().unwrap().clone() else {
            return;
        };
        let Some(current) = self.session.current_track() else {
            return;
        };

        if !self.validate_at_fire(&prepared) {
            info!(track = %prepared.track.name, "fire-time validation failed, re-preparing");
            self.clear_to_idle();
            *self.phase.lock().unwrap() = Phase::Preparing;
            self.spawn_prepare();
            return;
        }

        let mode = self.mode();
        let from_analysis = self.cache.analyze(&current).await;
        if mode != TransitionMode::Seamless {
            self.log_key_compatibility(&from_analysis, &prepared.analysis);
        }

        *self.phase.lock().unwrap() = Phase::Transitioning;
        self.state.broadcast_event(AmxEvent::TransitionStarted {
            from_id: current.id,
            to_id: prepared.track.id,
            mode,
            timestamp: chrono::Utc::now(),
        });
        info!(from = %current.name, to = %prepared.track.name, %mode, "transition started");

        let result = self
            .runner
            .run(mode, &prepared.track, &from_analysis, &prepared.analysis)
            .await;

        match result {
            Ok(()) => {
                self.finish_bookkeeping(&prepared.track, prepared.queue_index);
                self.state.broadcast_event(AmxEvent::TransitionCompleted {
                    to_id: prepared.track.id,
                    timestamp: chrono::Utc::now(),
                });
                info!(track = %prepared.track.name, "transition completed");
            }
            Err(e) => {
                warn!(error = %e, track = %prepared.track.name, "transition failed, hard cut");
                self.fallback_cut(&prepared).await;
                self.state.broadcast_event(AmxEvent::TransitionFallback {
                    to_id: prepared.track.id,
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        self.clear_to_idle();
        self.schedule_cooldown_prepare();
    }

    /// Fresh-state validation immediately before the first audible step
    fn validate_at_fire(&self, prepared: &PreparedNext) -> bool {
        let queue = self.session.queue();
        let index = self.session.queue_index();

        if QueueSnapshot::of(&queue, index) != prepared.snapshot {
            return false;
        }
        if prepared.from_random {
            // Non-deterministic pick; lookahead comparison does not apply
            return true;
        }
        match lookahead(&queue, index, self.session.repeat_mode()) {
            Some((track, i)) => track.id == prepared.track.id && i == prepared.queue_index,
            None => false,
        }
    }

    fn log_key_compatibility(&self, from: &AnalysisRecord, to: &AnalysisRecord) {
        let compatible = keys_compatible(&from.key, &to.key, self.key_detection.as_deref());
        info!(
            from_key = %from.key.name,
            to_key = %to.key.name,
            compatible,
            "harmonic compatibility"
        );
    }

    fn finish_bookkeeping(&self, track: &Track, queue_index: usize) {
        self.internal_ops.fetch_add(1, Ordering::SeqCst);
        self.session.set_current(track, queue_index);
        self.session.notify_song_changed();
        self.session.request_display_refresh();
        self.internal_ops.fetch_sub(1, Ordering::SeqCst);
    }

    /// Hard cut to the prepared track when a transition fails
    ///
    /// Audio must never simply stop: swap the primary source directly,
    /// keep the user's volume, and do the same queue bookkeeping a clean
    /// completion would.
    async fn fallback_cut(&self, prepared: &PreparedNext) {
        self.internal_ops.fetch_add(1, Ordering::SeqCst);

        let user_volume = self.session.user_volume();
        self.session.set_primary_source(&prepared.track.src);
        let primary = self.session.primary_media();
        primary.set_rate(1.0);
        primary.set_volume(user_volume);
        if let Err(e) = primary.play().await {
            warn!(error = %e, "fallback play rejected");
        }
        self.session.set_current(&prepared.track, prepared.queue_index);
        self.session.notify_song_changed();
        self.session.request_display_refresh();

        self.internal_ops.fetch_sub(1, Ordering::SeqCst);
    }

    fn schedule_cooldown_prepare(self: &Arc<Self>) {
        let engine = self.clone();
        let cooldown = Duration::from_secs(self.tuning.prepare_cooldown_secs);
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            engine.prepare().await;
        });
    }
}
