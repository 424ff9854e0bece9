//! In-memory fakes for the engine's collaborator traits

#![allow(dead_code)]

use amx_common::model::Track;
use amx_common::Tuning;
use amx_engine::analysis::loader::{AudioLoader, DecodedAudio};
use amx_engine::error::{Error, Result};
use amx_engine::graph::{AudioGraphProvider, AudioRouter, FilterBank, Port, SweepFilter};
use amx_engine::media::{MediaElement, MediaFactory};
use amx_engine::session::{PlaybackSession, RepeatMode};
use amx_engine::state::EngineContext;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn track(id: u128, name: &str) -> Track {
    Track {
        id: Uuid::from_u128(id),
        name: name.to_string(),
        artist: "Artist".to_string(),
        featuring: None,
        genre: None,
        album: None,
        cover: None,
        // Non-http scheme: the engine skips the network prefetch
        src: format!("test://{}.mp3", id),
        duration: Some(180.0),
    }
}

/// Fast tuning for tests: 100 steps x 5ms, 8ms micro-fade
pub fn fast_tuning() -> Tuning {
    let mut tuning = Tuning::default();
    tuning.crossfade_secs = 0.5;
    tuning.crossfade_steps = 100;
    tuning.micro_fade_ms = 8;
    tuning.playable_timeout_secs = 1;
    tuning.prepare_cooldown_secs = 0;
    tuning.pause_poll_ms = 10;
    tuning
}

// ---------------------------------------------------------------------
// Media

pub struct FakeMedia {
    src: String,
    playable: bool,
    play_ok: bool,
    pub position: Mutex<f64>,
    pub duration: Mutex<Option<f64>>,
    pub volume: Mutex<f32>,
    pub rate: Mutex<f32>,
    pub paused: Mutex<bool>,
    pub rates_seen: Mutex<Vec<f32>>,
}

impl FakeMedia {
    pub fn new(src: &str) -> Arc<Self> {
        Self::with_flags(src, true, true)
    }

    pub fn with_flags(src: &str, playable: bool, play_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            src: src.to_string(),
            playable,
            play_ok,
            position: Mutex::new(0.0),
            duration: Mutex::new(Some(180.0)),
            volume: Mutex::new(1.0),
            rate: Mutex::new(1.0),
            paused: Mutex::new(true),
            rates_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn max_rate_seen(&self) -> f32 {
        self.rates_seen
            .lock()
            .unwrap()
            .iter()
            .copied()
            .fold(1.0, f32::max)
    }

    pub fn min_rate_seen(&self) -> f32 {
        self.rates_seen
            .lock()
            .unwrap()
            .iter()
            .copied()
            .fold(1.0, f32::min)
    }
}

impl MediaElement for FakeMedia {
    fn play(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.play_ok {
                *self.paused.lock().unwrap() = false;
                Ok(())
            } else {
                Err(Error::Media(format!("play rejected: {}", self.src)))
            }
        })
    }

    fn pause(&self) {
        *self.paused.lock().unwrap() = true;
    }

    fn seek(&self, secs: f64) {
        *self.position.lock().unwrap() = secs;
    }

    fn position(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn duration(&self) -> Option<f64> {
        *self.duration.lock().unwrap()
    }

    fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock().unwrap() = volume;
    }

    fn rate(&self) -> f32 {
        *self.rate.lock().unwrap()
    }

    fn set_rate(&self, rate: f32) {
        *self.rate.lock().unwrap() = rate;
        self.rates_seen.lock().unwrap().push(rate);
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap()
    }

    fn src(&self) -> String {
        self.src.clone()
    }

    fn wait_until_playable(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if !self.playable {
                futures::future::pending::<()>().await;
            }
        })
    }
}

pub struct FakeFactory {
    pub created: Mutex<Vec<Arc<FakeMedia>>>,
    pub playable: AtomicBool,
    pub play_ok: AtomicBool,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            playable: AtomicBool::new(true),
            play_ok: AtomicBool::new(true),
        })
    }

    pub fn last_created(&self) -> Option<Arc<FakeMedia>> {
        self.created.lock().unwrap().last().cloned()
    }
}

impl MediaFactory for FakeFactory {
    fn create(&self, src: &str) -> Arc<dyn MediaElement> {
        let media = FakeMedia::with_flags(
            src,
            self.playable.load(Ordering::SeqCst),
            self.play_ok.load(Ordering::SeqCst),
        );
        self.created.lock().unwrap().push(media.clone());
        media
    }
}

// ---------------------------------------------------------------------
// Session

pub struct FakeSession {
    pub queue: Mutex<Vec<Track>>,
    pub index: Mutex<usize>,
    pub repeat: Mutex<RepeatMode>,
    pub autoplay: AtomicBool,
    pub random: Mutex<Option<Track>>,
    pub current: Mutex<Option<Track>>,
    pub primary: Mutex<Arc<FakeMedia>>,
    pub user_volume: Mutex<f32>,
    pub set_current_calls: Mutex<Vec<(Uuid, usize)>>,
    pub set_user_volume_calls: Mutex<Vec<f32>>,
    pub song_changed_notifications: AtomicUsize,
    pub display_refreshes: AtomicUsize,
}

impl FakeSession {
    /// Session playing `queue[0]` with the rest pending
    pub fn playing(queue: Vec<Track>) -> Arc<Self> {
        let current = queue.first().cloned();
        let primary = FakeMedia::new(current.as_ref().map(|t| t.src.as_str()).unwrap_or(""));
        Arc::new(Self {
            queue: Mutex::new(queue),
            index: Mutex::new(0),
            repeat: Mutex::new(RepeatMode::Off),
            autoplay: AtomicBool::new(false),
            random: Mutex::new(None),
            current: Mutex::new(current),
            primary: Mutex::new(primary),
            user_volume: Mutex::new(1.0),
            set_current_calls: Mutex::new(Vec::new()),
            set_user_volume_calls: Mutex::new(Vec::new()),
            song_changed_notifications: AtomicUsize::new(0),
            display_refreshes: AtomicUsize::new(0),
        })
    }

    pub fn primary_fake(&self) -> Arc<FakeMedia> {
        self.primary.lock().unwrap().clone()
    }

    pub fn replace_queue(&self, queue: Vec<Track>) {
        *self.queue.lock().unwrap() = queue;
    }
}

impl PlaybackSession for FakeSession {
    fn current_track(&self) -> Option<Track> {
        self.current.lock().unwrap().clone()
    }

    fn queue(&self) -> Vec<Track> {
        self.queue.lock().unwrap().clone()
    }

    fn queue_index(&self) -> usize {
        *self.index.lock().unwrap()
    }

    fn repeat_mode(&self) -> RepeatMode {
        *self.repeat.lock().unwrap()
    }

    fn autoplay_enabled(&self) -> bool {
        self.autoplay.load(Ordering::SeqCst)
    }

    fn random_track(&self) -> Option<Track> {
        self.random.lock().unwrap().clone()
    }

    fn primary_media(&self) -> Arc<dyn MediaElement> {
        self.primary.lock().unwrap().clone()
    }

    fn set_primary_source(&self, src: &str) {
        *self.primary.lock().unwrap() = FakeMedia::new(src);
    }

    fn set_current(&self, track: &Track, queue_index: usize) {
        *self.current.lock().unwrap() = Some(track.clone());
        *self.index.lock().unwrap() = queue_index;
        self.set_current_calls
            .lock()
            .unwrap()
            .push((track.id, queue_index));
    }

    fn notify_song_changed(&self) {
        self.song_changed_notifications.fetch_add(1, Ordering::SeqCst);
    }

    fn request_display_refresh(&self) {
        self.display_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn user_volume(&self) -> f32 {
        *self.user_volume.lock().unwrap()
    }

    fn set_user_volume(&self, volume: f32) {
        *self.user_volume.lock().unwrap() = volume;
        self.set_user_volume_calls.lock().unwrap().push(volume);
    }
}

// ---------------------------------------------------------------------
// Audio graph

pub struct FakeRouter {
    pub edges: Mutex<Vec<(Port, Port)>>,
}

impl FakeRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            edges: Mutex::new(Vec::new()),
        })
    }
}

impl AudioRouter for FakeRouter {
    fn connect(&self, from: Port, to: Port) -> Result<()> {
        let mut edges = self.edges.lock().unwrap();
        if !edges.contains(&(from, to)) {
            edges.push((from, to));
        }
        Ok(())
    }

    fn disconnect(&self, from: Port, to: Port) -> Result<()> {
        self.edges.lock().unwrap().retain(|e| *e != (from, to));
        Ok(())
    }

    fn connections(&self) -> Vec<(Port, Port)> {
        self.edges.lock().unwrap().clone()
    }
}

pub struct FakeBank {
    pub gains: Mutex<Vec<f32>>,
}

impl FakeBank {
    pub fn new(bands: usize) -> Arc<Self> {
        Arc::new(Self {
            gains: Mutex::new(vec![0.0; bands]),
        })
    }
}

impl FilterBank for FakeBank {
    fn band_count(&self) -> usize {
        self.gains.lock().unwrap().len()
    }

    fn set_gain(&self, band: usize, db: f32) {
        self.gains.lock().unwrap()[band] = db;
    }

    fn gain(&self, band: usize) -> f32 {
        self.gains.lock().unwrap()[band]
    }
}

#[derive(Default)]
pub struct FakeSweep {
    pub lowpass: Mutex<f32>,
    pub highpass: Mutex<f32>,
}

impl SweepFilter for FakeSweep {
    fn set_lowpass(&self, hz: f32) {
        *self.lowpass.lock().unwrap() = hz;
    }

    fn set_highpass(&self, hz: f32) {
        *self.highpass.lock().unwrap() = hz;
    }
}

pub struct FakeGraph {
    pub router: Arc<FakeRouter>,
    pub bank: Arc<FakeBank>,
    pub sweeps: Mutex<HashMap<String, Arc<FakeSweep>>>,
    pub releases: Mutex<Vec<String>>,
}

impl FakeGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            router: FakeRouter::new(),
            bank: FakeBank::new(10),
            sweeps: Mutex::new(HashMap::new()),
            releases: Mutex::new(Vec::new()),
        })
    }

    pub fn installed_sweeps(&self) -> usize {
        self.sweeps.lock().unwrap().len()
    }
}

impl AudioGraphProvider for FakeGraph {
    fn router(&self) -> Arc<dyn AudioRouter> {
        self.router.clone()
    }

    fn filter_bank(&self) -> Arc<dyn FilterBank> {
        self.bank.clone()
    }

    fn sweep_for(&self, media: &Arc<dyn MediaElement>) -> Result<Arc<dyn SweepFilter>> {
        let mut sweeps = self.sweeps.lock().unwrap();
        let sweep = sweeps
            .entry(media.src())
            .or_insert_with(|| Arc::new(FakeSweep::default()))
            .clone();
        Ok(sweep)
    }

    fn release_sweep(&self, media: &Arc<dyn MediaElement>) -> Result<()> {
        // Idempotent: releasing twice is a recorded no-op the second time
        if self.sweeps.lock().unwrap().remove(&media.src()).is_some() {
            self.releases.lock().unwrap().push(media.src());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Loader

/// Loader that never has audio; analysis falls back to metadata priors
pub struct NoAudioLoader;

impl AudioLoader for NoAudioLoader {
    fn load<'a>(&'a self, _src: &'a str) -> BoxFuture<'a, Result<DecodedAudio>> {
        Box::pin(async { Err(Error::Analysis("no audio in tests".to_string())) })
    }
}

// ---------------------------------------------------------------------
// Wiring

pub struct TestEnv {
    pub session: Arc<FakeSession>,
    pub graph: Arc<FakeGraph>,
    pub factory: Arc<FakeFactory>,
    pub ctx: EngineContext,
}

impl TestEnv {
    pub fn new(queue: Vec<Track>) -> Self {
        // RUST_LOG=debug shows engine tracing during test runs
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let session = FakeSession::playing(queue);
        let graph = FakeGraph::new();
        let factory = FakeFactory::new();
        let ctx = EngineContext::new(session.clone(), graph.clone(), factory.clone())
            .with_tuning(fast_tuning());
        Self {
            session,
            graph,
            factory,
            ctx,
        }
    }
}
