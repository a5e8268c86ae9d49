//! Pitch stage
//!
//! Playback-rate resampling: output sample `i` reads input sample
//! `round(i * ratio)`, and the output holds `floor(len / ratio)` samples.
//! There is no interpolation or anti-alias filtering, so raising the pitch
//! folds content above the new Nyquist back into the audible band.

use super::stage::Stage;
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxError};

/// Guard against representation error when `len / ratio` is integral in
/// decimal (44100 / 0.6 must give 73500, not 73499).
const LENGTH_EPSILON: f64 = 1e-9;

/// Number of output samples for `input_len` samples at `ratio`
pub fn output_len(input_len: usize, ratio: f64) -> usize {
    (input_len as f64 / ratio + LENGTH_EPSILON).floor() as usize
}

/// Largest render the 16-bit WAV encoder can hold (one channel)
pub const MAX_OUTPUT_FRAMES: usize = (u32::MAX as usize - 36) / 2;

/// `output_len`, rejecting ratios whose output could never be allocated
/// or encoded
///
/// # Errors
/// * `Render` - the output would exceed `MAX_OUTPUT_FRAMES`
pub fn checked_output_len(input_len: usize, ratio: f64) -> Result<usize> {
    let frames = input_len as f64 / ratio + LENGTH_EPSILON;
    if !frames.is_finite() || frames > MAX_OUTPUT_FRAMES as f64 {
        return Err(VoxError::Render {
            reason: format!(
                "pitch {} stretches {} frames past the {} frame limit",
                ratio, input_len, MAX_OUTPUT_FRAMES
            ),
        });
    }
    Ok(frames.floor() as usize)
}

/// Nearest-neighbour playback-rate stage
#[derive(Debug, Clone, Copy)]
pub struct PitchShift {
    ratio: f64,
}

impl PitchShift {
    /// # Arguments
    /// * `ratio` - playback-rate ratio, must be > 0 (validated by the definition)
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    fn resample(&self, input: &[f32]) -> Result<Vec<f32>> {
        let len = checked_output_len(input.len(), self.ratio)?;
        Ok((0..len)
            .map(|i| {
                let src = (i as f64 * self.ratio).round() as usize;
                input.get(src).copied().unwrap_or(0.0)
            })
            .collect())
    }
}

impl Stage for PitchShift {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn process(&self, input: AudioBuffer) -> Result<AudioBuffer> {
        let sample_rate = input.sample_rate();
        let channels: Vec<Vec<f32>> = input
            .iter_channels()
            .map(|ch| self.resample(ch))
            .collect::<Result<_>>()?;
        AudioBuffer::from_channels(channels, sample_rate)
    }
}
