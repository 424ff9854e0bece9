//! EQ controller
//!
//! Owns the filter bank wiring and the adaptive control loop. Exactly one
//! authority writes gains at a time: the manual profile or the adaptive
//! adjustment. Switching authorities restores the other's last-known
//! values instead of resetting to flat.

use super::bands::{group_of, GainVector};
use super::distortion::DistortionWatchdog;
use super::limiter::limit_positive;
use super::modes::{self, Preset};
use super::Intensity;
use crate::analysis::SpectralAnalyzer;
use crate::error::Result;
use crate::graph::{apply_topology, AudioRouter, FilterBank, GraphTopology};
use crate::state::SharedState;
use amx_common::events::AmxEvent;
use amx_common::model::BandLevels;
use amx_common::Tuning;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Mutable controller state behind one lock
struct ControllerState {
    /// Filter chain wired into the playback graph
    enabled: bool,

    /// Adaptive loop active (vs manual authority)
    adaptive: bool,

    /// Active adaptive preset
    preset: Preset,

    /// Adaptive intensity
    intensity: Intensity,

    /// Last manual profile, always remembered
    manual: GainVector,

    /// Gains currently applied by the adaptive authority (smoothed)
    applied: GainVector,

    /// Last levels seen by the adaptive preset, kept for change logging
    /// only
    last_levels: Option<BandLevels>,
}

/// Parametric EQ controller
pub struct EqController {
    tuning: Tuning,
    state: Arc<SharedState>,
    router: Arc<dyn AudioRouter>,
    bank: Arc<dyn FilterBank>,
    analyzer: Arc<SpectralAnalyzer>,
    /// Distortion reductions folded into every bank write; the controller
    /// is the bank's only writer
    watchdog: Option<Arc<DistortionWatchdog>>,
    inner: Mutex<ControllerState>,
}

impl EqController {
    pub fn new(
        tuning: Tuning,
        state: Arc<SharedState>,
        router: Arc<dyn AudioRouter>,
        bank: Arc<dyn FilterBank>,
        analyzer: Arc<SpectralAnalyzer>,
    ) -> Self {
        Self {
            tuning,
            state,
            router,
            bank,
            analyzer,
            watchdog: None,
            inner: Mutex::new(ControllerState {
                enabled: false,
                adaptive: false,
                preset: Preset::Adaptive,
                intensity: Intensity::default(),
                manual: GainVector::flat(),
                applied: GainVector::flat(),
                last_levels: None,
            }),
        }
    }

    /// Attach the distortion watchdog whose reductions are subtracted
    /// from every bank write
    pub fn with_watchdog(mut self, watchdog: Arc<DistortionWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Wire the filter chain into the playback graph
    ///
    /// Idempotent: calling twice leaves the graph exactly as one call
    /// does. The parallel analysis tap is preserved by the topology.
    pub fn enable(&self) -> Result<()> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.enabled {
                debug!("eq already enabled");
                return Ok(());
            }
        }
        apply_topology(self.router.as_ref(), GraphTopology::EqOnly)?;

        let mut inner = self.inner.lock().unwrap();
        inner.enabled = true;
        // Whichever authority was last active resumes its gains
        let gains = if inner.adaptive {
            inner.applied
        } else {
            inner.manual
        };
        self.write_bank(&gains);
        info!("eq enabled");
        Ok(())
    }

    /// Unwire the filter chain (direct passthrough)
    ///
    /// Idempotent like [`enable`](Self::enable).
    pub fn disable(&self) -> Result<()> {
        {
            let inner = self.inner.lock().unwrap();
            if !inner.enabled {
                return Ok(());
            }
        }
        apply_topology(self.router.as_ref(), GraphTopology::Bypass)?;
        self.inner.lock().unwrap().enabled = false;
        info!("eq disabled");
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().enabled
    }

    /// Switch between adaptive and manual authority
    ///
    /// Turning adaptive off restores the last manual profile to the
    /// filters; turning it on resumes from the adaptive authority's last
    /// applied gains so there is no jump.
    pub fn set_adaptive_mode(&self, enabled: bool, preset: Preset) {
        let restore = {
            let mut inner = self.inner.lock().unwrap();
            inner.preset = preset;
            let was = inner.adaptive;
            inner.adaptive = enabled;
            if was && !enabled {
                Some(inner.manual)
            } else if !was && enabled {
                Some(inner.applied)
            } else {
                None
            }
        };
        if let Some(gains) = restore {
            self.write_bank(&gains);
        }

        info!(adaptive = enabled, preset = preset.as_str(), "eq mode changed");
        self.state.broadcast_event(AmxEvent::EqModeChanged {
            adaptive: enabled,
            preset: Some(preset.as_str().to_string()),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Set the adaptive intensity
    pub fn set_intensity(&self, intensity: Intensity) {
        self.inner.lock().unwrap().intensity = intensity;
        debug!(?intensity, "eq intensity changed");
    }

    /// Set the manual gain profile
    ///
    /// Always remembered; written to the filters only while the manual
    /// authority is active.
    pub fn set_manual_gains(&self, gains: GainVector) {
        let clamped = gains.clamped(self.tuning.gain_limit_db);
        let write = {
            let mut inner = self.inner.lock().unwrap();
            inner.manual = clamped;
            !inner.adaptive
        };
        if write {
            self.write_bank(&clamped);
        }
    }

    /// Last manual profile
    pub fn manual_gains(&self) -> GainVector {
        self.inner.lock().unwrap().manual
    }

    /// Gains most recently applied by the adaptive authority
    pub fn applied_gains(&self) -> GainVector {
        self.inner.lock().unwrap().applied
    }

    /// One adaptive evaluation: sample, process, limit, smooth, apply
    pub fn adaptive_tick(&self) {
        let (preset, intensity, prev_applied, active) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.preset,
                inner.intensity,
                inner.applied,
                inner.enabled && inner.adaptive,
            )
        };
        if !active {
            return;
        }

        let levels = self.analyzer.sample_levels();
        let smoothed = self.analyzer.smoothed_levels();

        let mut target = modes::process(preset, levels, smoothed, &self.tuning)
            .scaled(intensity.magnitude_scale());
        limit_positive(
            &mut target,
            self.tuning.limiter_ceiling_db * intensity.ceiling_scale(),
        );
        let target = target.clamped(self.tuning.gain_limit_db);

        // Smooth toward the target so corrections glide rather than step
        let alpha = intensity.smoothing_alpha();
        let mut next = prev_applied;
        for i in 0..next.0.len() {
            next[i] += (target[i] - next[i]) * alpha;
        }
        let next = next.clamped(self.tuning.gain_limit_db);

        {
            let mut inner = self.inner.lock().unwrap();
            inner.applied = next;

            // Change logging for the adaptive preset only
            if preset == Preset::Adaptive {
                if let Some(last) = inner.last_levels {
                    let delta = (levels.overall() - last.overall()).abs();
                    if delta > 10.0 {
                        debug!(
                            from = last.overall(),
                            to = levels.overall(),
                            "adaptive: material level shift"
                        );
                    }
                }
                inner.last_levels = Some(levels);
            }
        }
        self.write_bank(&next);
    }

    /// Adaptive loop on the configured tick
    pub async fn run(self: Arc<Self>, running: Arc<RwLock<bool>>) {
        let mut tick = interval(Duration::from_millis(self.tuning.eq_tick_ms));
        loop {
            tick.tick().await;
            if !*running.read().await {
                break;
            }
            self.adaptive_tick();
        }
    }

    /// Re-apply the active authority's gains
    ///
    /// The watchdog calls this after each of its ticks so reduction
    /// changes reach the filters even while the adaptive loop is off.
    /// No-op while the chain is unwired.
    pub fn refresh(&self) {
        let gains = {
            let inner = self.inner.lock().unwrap();
            if !inner.enabled {
                return;
            }
            if inner.adaptive {
                inner.applied
            } else {
                inner.manual
            }
        };
        self.write_bank(&gains);
    }

    fn write_bank(&self, gains: &GainVector) {
        let bands = self.bank.band_count().min(gains.0.len());
        if bands < gains.0.len() {
            warn!(bands, "filter bank smaller than gain vector");
        }
        for (i, gain) in gains.0.iter().take(bands).enumerate() {
            let reduction = self
                .watchdog
                .as_ref()
                .map_or(0.0, |w| w.reduction_db(group_of(i)));
            self.bank.set_gain(i, *gain - reduction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SpectrumSource;
    use crate::graph::Port;
    use std::sync::Mutex as StdMutex;

    struct TestRouter {
        edges: StdMutex<Vec<(Port, Port)>>,
        mutations: StdMutex<usize>,
    }

    impl TestRouter {
        fn new() -> Self {
            Self {
                edges: StdMutex::new(Vec::new()),
                mutations: StdMutex::new(0),
            }
        }
    }

    impl AudioRouter for TestRouter {
        fn connect(&self, from: Port, to: Port) -> Result<()> {
            self.edges.lock().unwrap().push((from, to));
            *self.mutations.lock().unwrap() += 1;
            Ok(())
        }
        fn disconnect(&self, from: Port, to: Port) -> Result<()> {
            self.edges.lock().unwrap().retain(|e| *e != (from, to));
            *self.mutations.lock().unwrap() += 1;
            Ok(())
        }
        fn connections(&self) -> Vec<(Port, Port)> {
            self.edges.lock().unwrap().clone()
        }
    }

    struct TestBank {
        gains: StdMutex<Vec<f32>>,
    }

    impl FilterBank for TestBank {
        fn band_count(&self) -> usize {
            10
        }
        fn set_gain(&self, band: usize, db: f32) {
            self.gains.lock().unwrap()[band] = db;
        }
        fn gain(&self, band: usize) -> f32 {
            self.gains.lock().unwrap()[band]
        }
    }

    /// Bass-light spectrum so the bass preset always wants a boost
    struct BassLightSource;

    impl SpectrumSource for BassLightSource {
        fn frequency_bins(&self) -> Vec<f32> {
            let mut bins = vec![120.0; 1024];
            for bin in bins.iter_mut().take(12) {
                *bin = 10.0;
            }
            bins
        }
        fn time_domain(&self) -> Vec<f32> {
            vec![0.0; 512]
        }
        fn sample_rate(&self) -> u32 {
            44_100
        }
    }

    fn controller() -> (Arc<EqController>, Arc<TestRouter>, Arc<TestBank>) {
        let router = Arc::new(TestRouter::new());
        let bank = Arc::new(TestBank {
            gains: StdMutex::new(vec![0.0; 10]),
        });
        let analyzer = Arc::new(SpectralAnalyzer::new(Arc::new(BassLightSource), 200));
        let controller = Arc::new(EqController::new(
            Tuning::default(),
            Arc::new(SharedState::new()),
            router.clone(),
            bank.clone(),
            analyzer,
        ));
        (controller, router, bank)
    }

    #[test]
    fn enable_is_idempotent() {
        let (eq, router, _bank) = controller();
        eq.enable().unwrap();
        let after_one = *router.mutations.lock().unwrap();
        let edges_one = router.connections();

        eq.enable().unwrap();
        assert_eq!(*router.mutations.lock().unwrap(), after_one);
        assert_eq!(router.connections(), edges_one);
    }

    #[test]
    fn disable_restores_passthrough() {
        let (eq, router, _bank) = controller();
        eq.enable().unwrap();
        eq.disable().unwrap();
        assert!(router.connections().contains(&(Port::Source, Port::Master)));
        assert!(!router
            .connections()
            .contains(&(Port::Source, Port::EqInput)));
        // Second disable is a no-op
        eq.disable().unwrap();
    }

    #[test]
    fn manual_gains_ignored_while_adaptive() {
        let (eq, _router, bank) = controller();
        eq.enable().unwrap();
        eq.set_adaptive_mode(true, Preset::Bass);

        let mut manual = GainVector::flat();
        manual[0] = 9.0;
        eq.set_manual_gains(manual);
        // Not written to the filters while adaptive holds authority
        assert_eq!(bank.gain(0), 0.0);
        // But remembered
        assert_eq!(eq.manual_gains()[0], 9.0);
    }

    #[test]
    fn toggling_adaptive_off_restores_manual_profile() {
        let (eq, _router, bank) = controller();
        eq.enable().unwrap();

        let mut manual = GainVector::flat();
        manual[2] = 4.0;
        eq.set_manual_gains(manual);
        assert_eq!(bank.gain(2), 4.0);

        eq.set_adaptive_mode(true, Preset::Bass);
        for _ in 0..20 {
            eq.adaptive_tick();
        }
        assert_ne!(bank.gain(0), 0.0);

        // Back to manual: last profile restored, not flat
        eq.set_adaptive_mode(false, Preset::Bass);
        assert_eq!(bank.gain(2), 4.0);
        assert_eq!(bank.gain(0), 0.0);
    }

    #[test]
    fn adaptive_tick_moves_toward_boost_smoothly() {
        let (eq, _router, bank) = controller();
        eq.enable().unwrap();
        eq.set_adaptive_mode(true, Preset::Bass);

        eq.adaptive_tick();
        let after_one = bank.gain(0);
        assert!(after_one > 0.0);
        // One tick moves only a fraction of the way to the target
        assert!(after_one < Tuning::default().bass_boost_cap_db);

        for _ in 0..100 {
            eq.adaptive_tick();
        }
        let settled = bank.gain(0);
        assert!(settled > after_one);
        assert!(settled <= Tuning::default().gain_limit_db);
    }

    #[test]
    fn adaptive_tick_inactive_without_enable() {
        let (eq, _router, bank) = controller();
        eq.set_adaptive_mode(true, Preset::Bass);
        eq.adaptive_tick();
        assert_eq!(bank.gain(0), 0.0);
    }

    #[test]
    fn manual_gains_clamped_to_limit() {
        let (eq, _router, bank) = controller();
        eq.enable().unwrap();
        let mut manual = GainVector::flat();
        manual[0] = 99.0;
        eq.set_manual_gains(manual);
        assert_eq!(bank.gain(0), Tuning::default().gain_limit_db);
    }
}
