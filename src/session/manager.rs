//! Recording Session Manager
//!
//! Owns one take at a time and drives it through capture, decode, render
//! and export. The handle is cheap to clone; all clones share one session.
//! The inner mutex is only held for short state updates, never across an
//! `.await` and never while rendering.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::capture::{CaptureBackend, CaptureStream};
use super::meter::{spawn_meter, LevelFrame, MeterHandle};
use super::payload::{EncodedAudioPayload, ExportArtifact, PayloadKind};
use super::state::SessionState;
use crate::config::VoxConfig;
use crate::dsp::{render_cancellable, CancelToken, RenderOptions};
use crate::effects::EffectDefinition;
use crate::engine::{encode_wav, AudioBuffer};
use crate::error::{Result, VoxError};

/// A capture in progress
struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
    meter: MeterHandle,
    started: Instant,
}

/// A finished, decoded take
struct Recording {
    id: Uuid,
    source: Arc<AudioBuffer>,
    original: Arc<EncodedAudioPayload>,
    duration: Duration,
    created_at: DateTime<Utc>,
}

struct Inner {
    state: SessionState,
    capture: Option<ActiveCapture>,
    recording: Option<Recording>,
    rendered: Option<Arc<AudioBuffer>>,
    processed: Option<Arc<EncodedAudioPayload>>,
    current_effect: Option<String>,
    levels: watch::Receiver<LevelFrame>,
    /// Meters that were cancelled without being awaited
    retired_meters: Vec<MeterHandle>,
    /// Bumped on every reset so in-flight work can tell it is stale
    generation: u64,
}

/// Receiver that only ever yields a silent frame
fn idle_levels(bins: usize) -> watch::Receiver<LevelFrame> {
    let (_, rx) = watch::channel(LevelFrame::silent(bins));
    rx
}

/// Handle on a recording session
#[derive(Clone)]
pub struct RecordingSession {
    inner: Arc<Mutex<Inner>>,
    backend: Arc<dyn CaptureBackend>,
    config: Arc<VoxConfig>,
}

impl RecordingSession {
    /// Create an idle session
    ///
    /// # Errors
    /// * `InvalidParameter` - the configuration does not validate
    pub fn new(backend: impl CaptureBackend, config: VoxConfig) -> Result<Self> {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Create an idle session around a shared backend
    pub fn with_backend(backend: Arc<dyn CaptureBackend>, config: VoxConfig) -> Result<Self> {
        config.validate()?;
        let inner = Inner {
            state: SessionState::Idle,
            capture: None,
            recording: None,
            rendered: None,
            processed: None,
            current_effect: None,
            levels: idle_levels(config.session.meter_bins),
            retired_meters: Vec::new(),
            generation: 0,
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            backend,
            config: Arc::new(config),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn has_recording(&self) -> bool {
        self.lock().recording.is_some()
    }

    /// Id of the last successfully applied effect
    pub fn current_effect(&self) -> Option<String> {
        self.lock().current_effect.clone()
    }

    /// Live duration while capturing, final duration afterwards
    pub fn recording_duration(&self) -> Duration {
        let inner = self.lock();
        if let Some(capture) = &inner.capture {
            return capture.started.elapsed();
        }
        inner
            .recording
            .as_ref()
            .map_or(Duration::ZERO, |r| r.duration)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.lock().recording.as_ref().map(|r| r.created_at)
    }

    pub fn recording_id(&self) -> Option<Uuid> {
        self.lock().recording.as_ref().map(|r| r.id)
    }

    /// Decoded source of the current take
    pub fn source(&self) -> Option<Arc<AudioBuffer>> {
        self.lock().recording.as_ref().map(|r| Arc::clone(&r.source))
    }

    /// Last rendered buffer
    pub fn rendered(&self) -> Option<Arc<AudioBuffer>> {
        self.lock().rendered.clone()
    }

    /// Subscribe to level frames of the current (or next-published) capture
    pub fn levels(&self) -> watch::Receiver<LevelFrame> {
        self.lock().levels.clone()
    }

    pub fn config(&self) -> &VoxConfig {
        &self.config
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Start capturing (Idle -> Capturing)
    ///
    /// # Errors
    /// * `InvalidState` - the session is not idle
    /// * `CaptureDevice` - the backend could not start; the session stays idle
    pub async fn start_recording(&self) -> Result<()> {
        self.expect_state("start recording", |s| s == SessionState::Idle)?;

        let stream = self
            .backend
            .start_capture(&self.config.capture)
            .map_err(|e| {
                warn!(error = %e, "capture failed to start");
                e
            })?;

        let (tx, rx) = watch::channel(LevelFrame::silent(self.config.session.meter_bins));
        let started = Instant::now();
        let meter = spawn_meter(stream.level_tap(), &self.config.session, tx, started);

        let mut inner = self.lock();
        if inner.state != SessionState::Idle {
            // Lost a race with another start
            let state = inner.state;
            drop(inner);
            meter.cancel();
            self.release_stream(stream);
            return Err(VoxError::InvalidState {
                operation: "start recording",
                state: state.to_string(),
            });
        }
        inner.levels = rx;
        inner.capture = Some(ActiveCapture {
            stream,
            meter,
            started,
        });
        inner.state = SessionState::Capturing;
        info!("recording started");
        Ok(())
    }

    /// Stop capturing and decode the take (Capturing -> Captured)
    ///
    /// The device is released before the first await. If the future is
    /// dropped while decoding, the session goes back to Idle.
    ///
    /// # Errors
    /// * `InvalidState` - nothing is being captured
    /// * `CaptureDevice` - the backend failed to finalize; the session goes idle
    /// * `Decode` - the blob could not be decoded; the session goes idle
    pub async fn stop_recording(&self) -> Result<()> {
        let (capture, generation) = {
            let mut inner = self.lock();
            match inner.capture.take() {
                Some(capture) if inner.state == SessionState::Capturing => {
                    (capture, inner.generation)
                }
                other => {
                    inner.capture = other;
                    return Err(VoxError::InvalidState {
                        operation: "stop recording",
                        state: inner.state.to_string(),
                    });
                }
            }
        };

        // Release the device before awaiting anything
        let duration = capture.started.elapsed();
        let ActiveCapture { stream, meter, .. } = capture;
        meter.cancel();
        let released = self.backend.stop_capture(stream);
        let mut guard = StateGuard {
            session: self.clone(),
            during: SessionState::Capturing,
            restore: SessionState::Idle,
            generation,
            armed: true,
        };

        meter.stop().await;

        let decoded = match released {
            Ok(blob) => {
                let blob = Arc::new(blob);
                let backend = Arc::clone(&self.backend);
                let shared = Arc::clone(&blob);
                tokio::task::spawn_blocking(move || backend.decode(&shared))
                    .await
                    .unwrap_or_else(|e| {
                        Err(VoxError::Decode {
                            reason: format!("decode task failed: {}", e),
                            source: None,
                        })
                    })
                    .map(|buffer| (blob, buffer))
            }
            Err(e) => Err(e),
        };

        guard.armed = false;
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("discarding capture finished after reset");
            return Err(VoxError::InvalidState {
                operation: "stop recording",
                state: inner.state.to_string(),
            });
        }

        match decoded {
            Ok((blob, buffer)) => {
                let blob = Arc::try_unwrap(blob).unwrap_or_else(|shared| (*shared).clone());
                let original = EncodedAudioPayload::new(
                    PayloadKind::Original,
                    self.backend.blob_format(),
                    blob,
                );
                let recording = Recording {
                    id: Uuid::new_v4(),
                    source: Arc::new(buffer),
                    original: Arc::new(original),
                    duration,
                    created_at: Utc::now(),
                };
                info!(
                    id = %recording.id,
                    frames = recording.source.len(),
                    channels = recording.source.channels(),
                    duration_secs = duration.as_secs_f64(),
                    "recording captured"
                );
                inner.recording = Some(recording);
                inner.state = SessionState::Captured;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "capture could not be decoded");
                inner.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the current take with the configured render options
    pub async fn apply_effect(&self, effect: &EffectDefinition) -> Result<Arc<AudioBuffer>> {
        let options = self.config.render.clone();
        self.apply_effect_with(effect, &options, CancelToken::new())
            .await
    }

    /// Render the current take (Captured | Rendered -> Processing -> Rendered)
    ///
    /// On failure or cancellation the session returns to the state it was in
    /// and keeps any previously rendered buffer.
    ///
    /// # Errors
    /// * `Busy` - another render is in flight
    /// * `InvalidState` - no recording to render
    /// * `Cancelled` - `cancel` fired, or the session was reset meanwhile
    /// * `Render` - a stage failed
    pub async fn apply_effect_with(
        &self,
        effect: &EffectDefinition,
        options: &RenderOptions,
        cancel: CancelToken,
    ) -> Result<Arc<AudioBuffer>> {
        let (source, mut guard) = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Processing => {
                    warn!(effect = effect.id(), "render rejected, session busy");
                    return Err(VoxError::Busy);
                }
                state if state.can_apply_effect() => {}
                state => {
                    return Err(VoxError::InvalidState {
                        operation: "apply effect",
                        state: state.to_string(),
                    })
                }
            }
            let source = match &inner.recording {
                Some(recording) => Arc::clone(&recording.source),
                None => {
                    return Err(VoxError::InvalidState {
                        operation: "apply effect",
                        state: inner.state.to_string(),
                    })
                }
            };
            let guard = StateGuard {
                session: self.clone(),
                during: SessionState::Processing,
                restore: inner.state,
                generation: inner.generation,
                armed: true,
            };
            inner.state = SessionState::Processing;
            (source, guard)
        };

        info!(effect = effect.id(), "applying effect");
        let effect_owned = effect.clone();
        let options = options.clone();
        let result = tokio::task::spawn_blocking(move || {
            render_cancellable(&source, &effect_owned, &options, &cancel)
        })
        .await
        .unwrap_or_else(|e| {
            Err(VoxError::Render {
                reason: format!("render task failed: {}", e),
            })
        });

        guard.armed = false;
        let mut inner = self.lock();
        if inner.generation != guard.generation {
            debug!(effect = effect.id(), "discarding render finished after reset");
            return Err(VoxError::Cancelled);
        }

        match result {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                inner.rendered = Some(Arc::clone(&buffer));
                inner.processed = None;
                inner.current_effect = Some(effect.id().to_string());
                inner.state = SessionState::Rendered;
                info!(effect = effect.id(), frames = buffer.len(), "effect applied");
                Ok(buffer)
            }
            Err(e) => {
                warn!(effect = effect.id(), error = %e, "effect failed");
                inner.state = guard.restore;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Payloads
    // ========================================================================

    /// The raw capture blob
    pub fn original_payload(&self) -> Option<Arc<EncodedAudioPayload>> {
        self.lock()
            .recording
            .as_ref()
            .map(|r| Arc::clone(&r.original))
    }

    /// The rendered buffer encoded as WAV, cached until the next render or reset
    pub fn processed_payload(&self) -> Result<Option<Arc<EncodedAudioPayload>>> {
        let rendered = {
            let inner = self.lock();
            if let Some(cached) = &inner.processed {
                return Ok(Some(Arc::clone(cached)));
            }
            match &inner.rendered {
                Some(rendered) => Arc::clone(rendered),
                None => return Ok(None),
            }
        };

        let payload = Arc::new(EncodedAudioPayload::processed(encode_wav(&rendered)?));

        let mut inner = self.lock();
        // Only cache if no newer render replaced the buffer meanwhile
        if inner
            .rendered
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &rendered))
        {
            inner.processed = Some(Arc::clone(&payload));
        }
        Ok(Some(payload))
    }

    /// Payload plus suggested filename
    ///
    /// # Errors
    /// * `InvalidState` - the requested payload does not exist yet
    pub fn export(&self, kind: PayloadKind) -> Result<ExportArtifact> {
        let payload = match kind {
            PayloadKind::Original => self.original_payload(),
            PayloadKind::Processed => self.processed_payload()?,
        };
        match payload {
            Some(payload) => Ok(ExportArtifact::new(payload, Utc::now())),
            None => Err(VoxError::InvalidState {
                operation: match kind {
                    PayloadKind::Original => "export original",
                    PayloadKind::Processed => "export processed",
                },
                state: self.state().to_string(),
            }),
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Drop every buffer and payload and return to Idle
    ///
    /// A capture in progress is stopped and its blob discarded. A render in
    /// flight keeps running but its result is thrown away.
    pub fn reset(&self) {
        let capture = {
            let mut inner = self.lock();
            inner.generation += 1;
            let capture = inner.capture.take();
            inner.recording = None;
            inner.rendered = None;
            inner.processed = None;
            inner.current_effect = None;
            inner.levels = idle_levels(self.config.session.meter_bins);
            inner.retired_meters.retain(|m| !m.is_finished());
            let previous = inner.state;
            inner.state = SessionState::Idle;
            info!(from = %previous, "session reset");
            capture
        };

        if let Some(capture) = capture {
            capture.meter.cancel();
            self.release_stream(capture.stream);
            self.lock().retired_meters.push(capture.meter);
        }
    }

    /// Reset and wait for every meter task to exit
    pub async fn dispose(&self) {
        self.reset();
        let meters = std::mem::take(&mut self.lock().retired_meters);
        for meter in meters {
            meter.stop().await;
        }
        debug!("session disposed");
    }

    fn release_stream(&self, stream: Box<dyn CaptureStream>) {
        if let Err(e) = self.backend.stop_capture(stream) {
            warn!(error = %e, "failed to release capture stream");
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(SessionState) -> bool,
    ) -> Result<()> {
        let state = self.state();
        if allowed(state) {
            Ok(())
        } else {
            Err(VoxError::InvalidState {
                operation,
                state: state.to_string(),
            })
        }
    }
}

/// Leaves a transient state if the future driving it is dropped
///
/// Covers `Capturing` while a stop decodes (back to Idle) and `Processing`
/// while a render runs (back to the prior state). A reset in between wins.
struct StateGuard {
    session: RecordingSession,
    during: SessionState,
    restore: SessionState,
    generation: u64,
    armed: bool,
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.session.lock();
        if inner.generation == self.generation && inner.state == self.during {
            debug!(from = %self.during, to = %self.restore, "operation abandoned, restoring state");
            inner.state = self.restore;
        }
    }
}
