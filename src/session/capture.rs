//! Capture collaborator
//!
//! The session never talks to an audio device directly. A `CaptureBackend`
//! starts a stream, hands back the finished blob, and decodes blobs into
//! buffers. `WavFileBackend` plays a WAV file back as if it were being
//! recorded live, which is what the CLI and the tests use.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::engine::{decode_wav, AudioBuffer};
use crate::error::{Result, VoxError};

// ============================================================================
// Constraints and formats
// ============================================================================

/// Capture settings requested from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }
}

/// Container format of an encoded blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlobFormat {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

impl BlobFormat {
    /// Compressed capture container produced by browser-style recorders
    pub const WEBM_OPUS: BlobFormat = BlobFormat {
        mime_type: "audio/webm;codecs=opus",
        extension: "webm",
    };

    pub const WAV: BlobFormat = BlobFormat {
        mime_type: "audio/wav",
        extension: "wav",
    };
}

// ============================================================================
// Traits
// ============================================================================

/// Read access to the most recent captured samples, for metering
pub trait LevelTap: Send + Sync {
    /// Fill `out` with the latest mono samples, oldest first
    ///
    /// Returns how many samples were written; the rest of `out` is untouched.
    fn read_recent(&self, out: &mut [f32]) -> usize;
}

/// A running capture
pub trait CaptureStream: Send {
    fn level_tap(&self) -> Arc<dyn LevelTap>;

    /// Finalize the capture and return the encoded blob
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Device-side collaborator of a recording session
pub trait CaptureBackend: Send + Sync + 'static {
    /// Start capturing
    ///
    /// # Errors
    /// * `CaptureDevice` - permission denied or device unavailable
    fn start_capture(&self, constraints: &CaptureConstraints) -> Result<Box<dyn CaptureStream>>;

    /// Stop a capture and release the device
    fn stop_capture(&self, stream: Box<dyn CaptureStream>) -> Result<Vec<u8>> {
        stream.finish()
    }

    /// Decode a finished blob
    ///
    /// # Errors
    /// * `Decode` - malformed or unsupported blob
    fn decode(&self, blob: &[u8]) -> Result<AudioBuffer>;

    /// Container of the blobs this backend produces
    fn blob_format(&self) -> BlobFormat {
        BlobFormat::WEBM_OPUS
    }
}

// ============================================================================
// WAV file backend
// ============================================================================

/// Where a `WavFileBackend` reads its take from
#[derive(Debug, Clone)]
enum WavSource {
    File(PathBuf),
    Bytes(Arc<Vec<u8>>),
}

/// Capture backend that replays a WAV file in real time
#[derive(Debug, Clone)]
pub struct WavFileBackend {
    source: WavSource,
}

impl WavFileBackend {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: WavSource::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            source: WavSource::Bytes(Arc::new(bytes)),
        }
    }

    fn read_blob(&self) -> Result<Arc<Vec<u8>>> {
        match &self.source {
            WavSource::File(path) => std::fs::read(path).map(Arc::new).map_err(|e| {
                VoxError::CaptureDevice {
                    reason: format!("cannot open {}: {}", path.display(), e),
                }
            }),
            WavSource::Bytes(bytes) => Ok(Arc::clone(bytes)),
        }
    }
}

impl CaptureBackend for WavFileBackend {
    fn start_capture(&self, constraints: &CaptureConstraints) -> Result<Box<dyn CaptureStream>> {
        let blob = self.read_blob()?;
        // A blob the decoder rejects still "records"; the failure surfaces on stop
        let (mono, sample_rate) = match decode_wav(&blob) {
            Ok(buffer) => (mix_to_mono(&buffer), buffer.sample_rate()),
            Err(_) => (Vec::new(), constraints.sample_rate),
        };
        debug!(
            frames = mono.len(),
            sample_rate,
            requested_rate = constraints.sample_rate,
            "wav capture started"
        );
        Ok(Box::new(WavCaptureStream {
            blob,
            tap: Arc::new(ReplayTap {
                samples: mono,
                sample_rate,
                started: Instant::now(),
            }),
        }))
    }

    fn decode(&self, blob: &[u8]) -> Result<AudioBuffer> {
        decode_wav(blob)
    }

    fn blob_format(&self) -> BlobFormat {
        BlobFormat::WAV
    }
}

struct WavCaptureStream {
    blob: Arc<Vec<u8>>,
    tap: Arc<ReplayTap>,
}

impl CaptureStream for WavCaptureStream {
    fn level_tap(&self) -> Arc<dyn LevelTap> {
        self.tap.clone()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        Ok(Arc::try_unwrap(self.blob).unwrap_or_else(|shared| (*shared).clone()))
    }
}

/// Serves the samples a live recorder would have seen by now
struct ReplayTap {
    samples: Vec<f32>,
    sample_rate: u32,
    started: Instant,
}

impl LevelTap for ReplayTap {
    fn read_recent(&self, out: &mut [f32]) -> usize {
        let played = (self.started.elapsed().as_secs_f64() * self.sample_rate as f64) as usize;
        let end = played.min(self.samples.len());
        let start = end.saturating_sub(out.len());
        let recent = &self.samples[start..end];
        out[..recent.len()].copy_from_slice(recent);
        recent.len()
    }
}

fn mix_to_mono(buffer: &AudioBuffer) -> Vec<f32> {
    let channels = buffer.channels();
    if channels == 0 {
        return Vec::new();
    }
    let scale = 1.0 / channels as f32;
    (0..buffer.len())
        .map(|i| buffer.iter_channels().map(|ch| ch[i]).sum::<f32>() * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encode_wav;

    fn take(seconds: f64) -> Vec<u8> {
        let buffer = AudioBuffer::sine(440.0, 0.5, (44100.0 * seconds) as usize, 44100);
        encode_wav(&buffer).unwrap()
    }

    #[test]
    fn test_default_constraints() {
        let c = CaptureConstraints::default();
        assert_eq!(c.sample_rate, 44100);
        assert!(!c.echo_cancellation && !c.noise_suppression && !c.auto_gain_control);
    }

    #[test]
    fn test_wav_backend_returns_blob() {
        let bytes = take(0.1);
        let backend = WavFileBackend::from_bytes(bytes.clone());
        let stream = backend.start_capture(&CaptureConstraints::default()).unwrap();
        let blob = backend.stop_capture(stream).unwrap();
        assert_eq!(blob, bytes);
        assert_eq!(backend.decode(&blob).unwrap().len(), 4410);
    }

    #[test]
    fn test_missing_file_is_device_error() {
        let backend = WavFileBackend::from_path("/nonexistent/take.wav");
        let result = backend.start_capture(&CaptureConstraints::default());
        assert!(matches!(result, Err(VoxError::CaptureDevice { .. })));
    }

    #[test]
    fn test_replay_tap_starts_empty() {
        let tap = ReplayTap {
            samples: vec![0.5; 1000],
            sample_rate: 1,
            started: Instant::now(),
        };
        let mut out = [0.0f32; 16];
        assert_eq!(tap.read_recent(&mut out), 0);
    }

    #[test]
    fn test_replay_tap_reads_tail() {
        let tap = ReplayTap {
            samples: (0..100).map(|i| i as f32).collect(),
            sample_rate: 1_000_000,
            started: Instant::now() - std::time::Duration::from_secs(1),
        };
        let mut out = [0.0f32; 4];
        assert_eq!(tap.read_recent(&mut out), 4);
        assert_eq!(out, [96.0, 97.0, 98.0, 99.0]);
    }

    #[test]
    fn test_mix_to_mono() {
        let buffer = AudioBuffer::from_channels(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 8000).unwrap();
        assert_eq!(mix_to_mono(&buffer), vec![0.5, 0.5]);
    }
}
