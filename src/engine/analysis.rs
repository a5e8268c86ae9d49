//! Objective audio measurements
//!
//! Used by the CLI `inspect` command and by tests that need to compare
//! spectra instead of exact samples (reverb output is randomized).

use rustfft::{num_complex::Complex, FftPlanner};

use crate::engine::buffer::linear_to_db;
use crate::engine::AudioBuffer;

/// Summary measurements of a buffer
#[derive(Debug, Clone)]
pub struct AudioAnalysis {
    pub rms_db: f32,
    pub peak_db: f32,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: usize,
}

impl AudioAnalysis {
    /// Analyze an audio buffer
    pub fn analyze(buffer: &AudioBuffer) -> Self {
        Self {
            rms_db: linear_to_db(buffer.rms()),
            peak_db: linear_to_db(buffer.peak()),
            duration_secs: buffer.duration_secs(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels(),
        }
    }

    /// Generate a summary string for display
    pub fn summary(&self) -> String {
        format!(
            "Duration: {:.2}s | {} ch @ {} Hz\nRMS: {:.1} dBFS | Peak: {:.1} dBFS",
            self.duration_secs, self.channels, self.sample_rate, self.rms_db, self.peak_db
        )
    }
}

/// Mean energy per sample of `samples` inside `[low_hz, high_hz)`
///
/// Computed with a single FFT over the whole signal (zero-padded to a power
/// of two), so it is exact up to spectral leakage. Returns 0.0 for empty input.
pub fn band_energy(samples: &[f32], sample_rate: u32, low_hz: f32, high_hz: f32) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len().next_power_of_two();
    let mut spectrum: Vec<Complex<f32>> = samples
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(n)
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let bin_hz = sample_rate as f32 / n as f32;
    // Parseval: sum |x|^2 = (1/n) sum |X|^2; fold negative frequencies in.
    let energy: f64 = spectrum
        .iter()
        .take(n / 2 + 1)
        .enumerate()
        .filter(|(k, _)| {
            let f = *k as f32 * bin_hz;
            f >= low_hz && f < high_hz
        })
        .map(|(k, c)| {
            let weight = if k == 0 || k == n / 2 { 1.0 } else { 2.0 };
            weight * c.norm_sqr() as f64
        })
        .sum();

    energy / (n as f64 * samples.len() as f64)
}
