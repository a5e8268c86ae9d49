//! Audio Buffer
//!
//! The single buffer type used for decoded captures and rendered results.
//! Samples are stored non-interleaved as 32-bit floats, one `Vec<f32>` per
//! channel, all channels the same length.

use crate::error::{Result, VoxError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Multi-channel floating-point audio
///
/// A buffer with zero channels or zero frames is valid and called "empty";
/// the render path passes empty buffers through untouched.
///
/// # Example
/// ```
/// use voxshift::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::silence(2, 44100, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from per-channel sample vectors
    ///
    /// # Errors
    /// * `Render` - if channels differ in length or the sample rate is zero
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VoxError::Render {
                reason: "sample rate must be positive".to_string(),
            });
        }
        if let Some(first) = samples.first() {
            let expected = first.len();
            if let Some((ch, bad)) = samples
                .iter()
                .enumerate()
                .find(|(_, c)| c.len() != expected)
            {
                return Err(VoxError::Render {
                    reason: format!(
                        "channel {} has {} samples, expected {}",
                        ch,
                        bad.len(),
                        expected
                    ),
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a silent buffer
    pub fn silence(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Create an empty buffer with the given channel count and rate
    pub fn empty(num_channels: usize, sample_rate: u32) -> Self {
        Self::silence(num_channels, 0, sample_rate)
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `num_channels` - Channel count (must be at least 1)
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(VoxError::Render {
                reason: "channel count must be at least 1".to_string(),
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(VoxError::Render {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_channels(samples, sample_rate)
    }

    /// Generate a mono sine tone
    pub fn sine(frequency: f32, amplitude: f32, num_samples: usize, sample_rate: u32) -> Self {
        let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
        let channel = (0..num_samples)
            .map(|i| amplitude * (angular_freq * i as f64).sin() as f32)
            .collect();
        Self {
            samples: vec![channel],
            sample_rate,
        }
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();

        if num_channels == 0 || num_samples == 0 {
            return Vec::new();
        }

        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// True when there are no channels or no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Iterate over channels
    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(|ch| ch.as_slice())
    }

    /// Iterate mutably over channels
    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.samples.iter_mut().map(|ch| ch.as_mut_slice())
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Peak absolute sample value over all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// RMS over all channels (linear)
    pub fn rms(&self) -> f32 {
        let total = self.channels() * self.len();
        if total == 0 {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_squares / total as f64).sqrt() as f32
    }

    /// Check if buffers are approximately equal within tolerance
    pub fn is_approx_equal(&self, other: &AudioBuffer, tolerance: f32) -> bool {
        if self.channels() != other.channels()
            || self.sample_rate != other.sample_rate
            || self.len() != other.len()
        {
            return false;
        }
        self.samples
            .iter()
            .zip(other.samples.iter())
            .all(|(a, b)| a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_to_db() {
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((linear_to_db(0.001) + 60.0).abs() < 1e-3);
        assert!(linear_to_db(0.0).is_infinite());
    }

    #[test]
    fn test_ragged_channels_rejected() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 8000);
        assert!(matches!(result, Err(VoxError::Render { .. })));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4]], 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_interleave_round_trip() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 44100).unwrap();

        assert_eq!(buffer.channel(0), &[1.0, 3.0, 5.0]);
        assert_eq!(buffer.channel(1), &[2.0, 4.0, 6.0]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_sine_rms() {
        // Sine wave with amplitude 1.0 has RMS of 1/sqrt(2)
        let buffer = AudioBuffer::sine(1000.0, 1.0, 44100, 44100);
        assert!((buffer.rms() - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
        assert!((buffer.peak() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = AudioBuffer::empty(2, 48000);
        assert!(buffer.is_empty());
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.rms(), 0.0);
        assert!(buffer.to_interleaved().is_empty());

        let no_channels = AudioBuffer::from_channels(Vec::new(), 48000).unwrap();
        assert!(no_channels.is_empty());
        assert_eq!(no_channels.channels(), 0);
    }
}
