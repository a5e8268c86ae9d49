//! Level meter
//!
//! While capturing, a tokio task polls the capture's level tap on a fixed
//! interval and publishes a spectrum snapshot through a `watch` channel.
//! The analysis follows the usual browser analyser node:
//! - Blackman window over the most recent `fft_size` samples
//! - FFT magnitude scaled by `1 / fft_size`
//! - exponential smoothing against the previous frame
//! - dB mapped linearly from `[min_decibels, max_decibels]` to `[0, 1]`

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::capture::LevelTap;
use crate::config::SessionConfig;

/// One published meter snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelFrame {
    /// Normalized bin levels in [0, 1], lowest frequency first
    pub bins: Vec<f32>,
    /// Seconds since capture start
    pub elapsed_secs: f64,
}

impl LevelFrame {
    /// All-zero frame
    pub fn silent(bins: usize) -> Self {
        Self {
            bins: vec![0.0; bins],
            elapsed_secs: 0.0,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&b| b == 0.0)
    }
}

// ============================================================================
// Spectrum analysis
// ============================================================================

/// Smoothed, windowed magnitude spectrum
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumAnalyzer {
    pub fn new(config: &SessionConfig) -> Self {
        let n = config.fft_size;
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(n),
            window: blackman(n),
            smoothed: vec![0.0; n / 2],
            scratch: vec![Complex::new(0.0, 0.0); n],
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Analyze `fft_size` time-domain samples into `fft_size / 2` levels
    pub fn analyze(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = self.window.len();
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let s = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let range = self.max_decibels - self.min_decibels;
        let mut levels = Vec::with_capacity(n / 2);
        for (k, prev) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / n as f32;
            *prev = self.smoothing * *prev + (1.0 - self.smoothing) * magnitude;
            let db = 20.0 * prev.max(1e-12).log10();
            levels.push(((db - self.min_decibels) / range).clamp(0.0, 1.0));
        }
        levels
    }
}

fn blackman(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

// ============================================================================
// Meter task
// ============================================================================

/// Handle on a running meter task
pub struct MeterHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MeterHandle {
    /// Ask the task to publish a final silent frame and exit
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    /// Cancel and wait for the task to finish
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "meter task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the periodic meter task
///
/// The task owns `levels`; when it exits the channel closes, which is how
/// subscribers learn that metering has stopped. Must be called from within a
/// tokio runtime.
pub fn spawn_meter(
    tap: Arc<dyn LevelTap>,
    config: &SessionConfig,
    levels: watch::Sender<LevelFrame>,
    started: Instant,
) -> MeterHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let period = Duration::from_millis(config.meter_interval_ms);
    let bins = config.meter_bins;
    let mut analyzer = SpectrumAnalyzer::new(config);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut samples = vec![0.0f32; analyzer.fft_size()];

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    samples.fill(0.0);
                    let read = tap.read_recent(&mut samples);
                    let mut spectrum = analyzer.analyze(&samples);
                    spectrum.truncate(bins);
                    let frame = LevelFrame {
                        bins: spectrum,
                        elapsed_secs: started.elapsed().as_secs_f64(),
                    };
                    trace!(read, elapsed = frame.elapsed_secs, "level frame");
                    levels.send_replace(frame);
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        levels.send_replace(LevelFrame::silent(bins));
        debug!("meter stopped");
    });

    MeterHandle { shutdown, task }
}
