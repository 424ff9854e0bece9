//! Per-session analysis cache
//!
//! Analysis records are created lazily on first need and cached for the
//! session, keyed by track id. BPM overrides are persisted through the
//! settings store and consulted before any analysis runs. Records are
//! never mutated except by explicit manual override.

use crate::analysis::bpm::{bpm_from_samples, estimate_metadata_bpm};
use crate::analysis::key::{resolve_key, KeyDetection};
use crate::analysis::loader::AudioLoader;
use crate::store::SettingsStore;
use amx_common::model::{AnalysisRecord, SpectralProfile, Track};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Lazily-filled per-track analysis cache
pub struct AnalysisCache {
    records: RwLock<HashMap<Uuid, AnalysisRecord>>,
    loader: Arc<dyn AudioLoader>,
    key_detection: Option<Arc<dyn KeyDetection>>,
    settings: Arc<dyn SettingsStore>,
}

impl AnalysisCache {
    pub fn new(
        loader: Arc<dyn AudioLoader>,
        key_detection: Option<Arc<dyn KeyDetection>>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            loader,
            key_detection,
            settings,
        }
    }

    /// Cached record for a track, if analysis has already run
    pub async fn get(&self, id: Uuid) -> Option<AnalysisRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// Analyze a track, or return the cached record
    ///
    /// Never fails: every stage falls back (audio BPM → metadata prior,
    /// spectral profile → neutral, key → unknown) so preparation is never
    /// blocked by analysis trouble.
    pub async fn analyze(&self, track: &Track) -> AnalysisRecord {
        if let Some(record) = self.get(track.id).await {
            return record;
        }

        // Persisted manual override beats any estimator
        let override_key = format!("bpm.{}", track.id);
        let override_bpm = self
            .settings
            .get(&override_key)
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|bpm| (60.0..=200.0).contains(bpm));

        let (audio_bpm, energy, spectral) = match self.loader.load(&track.src).await {
            Ok(audio) => {
                let bpm = bpm_from_samples(&audio.samples, audio.sample_rate);
                let (energy, spectral) = profile_from_samples(&audio.samples, audio.sample_rate);
                (bpm, energy, spectral)
            }
            Err(e) => {
                debug!(track = %track.name, error = %e, "audio analysis unavailable");
                (0.0, 0.5, SpectralProfile::neutral())
            }
        };

        let bpm = override_bpm.unwrap_or(if audio_bpm > 0.0 {
            audio_bpm
        } else {
            estimate_metadata_bpm(track)
        });

        let key = resolve_key(track, self.key_detection.as_deref()).await;

        let record = AnalysisRecord {
            bpm,
            energy,
            key,
            spectral,
        };
        info!(
            track = %track.name,
            bpm = record.bpm,
            energy = record.energy,
            key = %record.key.name,
            "track analyzed"
        );

        self.records.write().await.insert(track.id, record.clone());
        record
    }

    /// Explicit manual BPM override
    ///
    /// Updates the cached record (when present) and persists the value so
    /// future sessions skip estimation.
    pub async fn set_bpm_override(&self, id: Uuid, bpm: f32) {
        let bpm = bpm.clamp(60.0, 200.0);
        self.settings.set(&format!("bpm.{}", id), &bpm.to_string());
        if let Some(record) = self.records.write().await.get_mut(&id) {
            record.bpm = bpm;
        }
    }
}

/// Energy and broad spectral character from mono samples
///
/// Uses one-pole low/high-pass splits - coarse by design, this feeds
/// logging and transition heuristics, not audible processing.
pub fn profile_from_samples(samples: &[f32], sample_rate: u32) -> (f32, SpectralProfile) {
    if samples.is_empty() || sample_rate == 0 {
        return (0.5, SpectralProfile::neutral());
    }

    let total: f32 = samples.iter().map(|s| s * s).sum();
    if total <= f32::EPSILON {
        return (0.0, SpectralProfile::neutral());
    }

    let low = lowpass_energy(samples, sample_rate, 250.0);
    let low_mid = lowpass_energy(samples, sample_rate, 2000.0);
    let presence = total - lowpass_energy(samples, sample_rate, 2000.0);
    let high = total - lowpass_energy(samples, sample_rate, 4000.0);

    let rms = (total / samples.len() as f32).sqrt();
    let energy = (rms * 3.0).clamp(0.0, 1.0);

    let bassiness = (low / total * 2.0).clamp(0.0, 1.0);
    let warmth = ((low_mid - low).max(0.0) / total * 2.0).clamp(0.0, 1.0);
    let brightness = (high / total * 4.0).clamp(0.0, 1.0);
    let clarity = (presence.max(0.0) / (low_mid.max(1e-6)) * 2.0).clamp(0.0, 1.0);

    (
        energy,
        SpectralProfile {
            brightness,
            warmth,
            bassiness,
            clarity,
        },
    )
}

/// Energy below a cutoff via a one-pole low-pass
fn lowpass_energy(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> f32 {
    let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    let alpha = dt / (rc + dt);

    let mut y = 0.0f32;
    let mut energy = 0.0f32;
    for &x in samples {
        y += alpha * (x - y);
        energy += y * y;
    }
    energy
}
