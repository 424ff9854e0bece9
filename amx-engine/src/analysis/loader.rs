//! Audio fetch + decode for offline analysis
//!
//! Fetches a media URL and decodes up to the analysis window into mono
//! f32 samples. Decode runs on the blocking pool; the caller treats any
//! failure as "analysis unavailable" and falls back to the metadata
//! heuristic.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Seconds of audio decoded for offline analysis
const ANALYSIS_WINDOW_SECS: usize = 60;

/// Decoded mono audio
pub struct DecodedAudio {
    /// Mono samples in [-1,1]
    pub samples: Vec<f32>,
    /// Source sample rate in Hz
    pub sample_rate: u32,
}

/// Source of decodable audio for analysis
///
/// Object-safe so tests can substitute an in-memory loader.
pub trait AudioLoader: Send + Sync {
    /// Fetch and decode up to the analysis window of the given source
    fn load<'a>(&'a self, src: &'a str) -> BoxFuture<'a, Result<DecodedAudio>>;
}

/// HTTP-backed loader: reqwest fetch, symphonia decode
pub struct HttpAudioLoader {
    client: reqwest::Client,
}

impl HttpAudioLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpAudioLoader {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl AudioLoader for HttpAudioLoader {
    fn load<'a>(&'a self, src: &'a str) -> BoxFuture<'a, Result<DecodedAudio>> {
        Box::pin(async move {
            let response = self.client.get(src).send().await?;
            if !response.status().is_success() {
                return Err(Error::Analysis(format!(
                    "fetch returned {} for {}",
                    response.status(),
                    src
                )));
            }
            let bytes = response.bytes().await?.to_vec();
            debug!(src, bytes = bytes.len(), "fetched audio for analysis");

            tokio::task::spawn_blocking(move || decode_mono(bytes))
                .await
                .map_err(|e| Error::Internal(format!("decode task panicked: {}", e)))?
        })
    }
}

/// Decode a byte buffer into mono samples, bounded by the analysis window
pub fn decode_mono(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let cursor = std::io::Cursor::new(bytes);
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Analysis(format!("probe failed: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Analysis("no decodable track".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Analysis("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Analysis(format!("decoder init failed: {}", e)))?;

    let max_samples = sample_rate as usize * ANALYSIS_WINDOW_SECS;
    let mut mono: Vec<f32> = Vec::with_capacity(max_samples.min(1 << 22));
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 1usize;

    while mono.len() < max_samples {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream or a transient read error: analyze what we have
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip corrupt packets rather than aborting the whole window
            Err(_) => continue,
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count().max(1);
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let buf = sample_buf.as_mut().unwrap();
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(channels) {
            mono.push(frame.iter().sum::<f32>() / channels as f32);
            if mono.len() >= max_samples {
                break;
            }
        }
    }

    if mono.is_empty() {
        return Err(Error::Analysis("decoded zero samples".to_string()));
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}
