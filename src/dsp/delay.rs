//! Delay stage
//!
//! Feedback echo with a circular buffer per channel:
//!
//! ```text
//! delayed = line[n - D]
//! line[n] = x[n] + FEEDBACK * delayed
//! y[n]    = DRY * x[n] + WET * delayed
//! ```
//!
//! The echo tail is cut at the end of the buffer; output length equals input.

use super::stage::Stage;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Feedback gain of the delay loop
pub const DELAY_FEEDBACK: f32 = 0.4;
/// Gain of the delayed signal in the output
pub const DELAY_WET: f32 = 0.5;
/// Gain of the direct signal in the output
pub const DELAY_DRY: f32 = 0.7;

const SAMPLES_EPSILON: f64 = 1e-9;

/// Delay length in samples: `ceil(seconds * sample_rate)`, at least one
pub fn delay_samples(seconds: f64, sample_rate: u32) -> usize {
    ((seconds * sample_rate as f64 - SAMPLES_EPSILON).ceil() as usize).max(1)
}

/// Feedback delay line
#[derive(Debug, Clone, Copy)]
pub struct FeedbackDelay {
    delay_secs: f64,
}

impl FeedbackDelay {
    /// # Arguments
    /// * `delay_secs` - delay time in seconds (>= 0)
    pub fn new(delay_secs: f64) -> Self {
        Self { delay_secs }
    }

    pub fn delay_secs(&self) -> f64 {
        self.delay_secs
    }

    fn process_channel(channel: &mut [f32], delay: usize) {
        let mut line = vec![0.0f32; delay];
        let mut pos = 0;
        for sample in channel.iter_mut() {
            let dry = *sample;
            let delayed = line[pos];
            line[pos] = dry + DELAY_FEEDBACK * delayed;
            *sample = DELAY_DRY * dry + DELAY_WET * delayed;
            pos = (pos + 1) % delay;
        }
    }
}

impl Stage for FeedbackDelay {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn process(&self, mut input: AudioBuffer) -> Result<AudioBuffer> {
        let delay = delay_samples(self.delay_secs, input.sample_rate());
        for channel in input.iter_channels_mut() {
            Self::process_channel(channel, delay);
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(0.3, 44100, 13230 ; "echo")]
    #[test_case(0.1, 44100, 4410 ; "alien")]
    #[test_case(0.0, 44100, 1 ; "zero delay")]
    #[test_case(0.00001, 8000, 1 ; "sub sample")]
    fn test_delay_samples(seconds: f64, sample_rate: u32, expected: usize) {
        assert_eq!(delay_samples(seconds, sample_rate), expected);
    }

    #[test]
    fn test_impulse_response() {
        let mut impulse = vec![0.0; 10];
        impulse[0] = 1.0;
        let input = AudioBuffer::from_channels(vec![impulse], 10).unwrap();
        // 0.3 s at 10 Hz is 3 samples
        let out = FeedbackDelay::new(0.3).process(input).unwrap();
        let y = out.channel(0);

        assert_relative_eq!(y[0], DELAY_DRY);
        assert_relative_eq!(y[3], DELAY_WET);
        assert_relative_eq!(y[6], DELAY_WET * DELAY_FEEDBACK, epsilon = 1e-6);
        assert_relative_eq!(y[9], DELAY_WET * DELAY_FEEDBACK * DELAY_FEEDBACK, epsilon = 1e-6);
        for i in [1, 2, 4, 5, 7, 8] {
            assert_eq!(y[i], 0.0);
        }
    }

    #[test]
    fn test_delay_preserves_length() {
        let input = AudioBuffer::silence(2, 500, 44100);
        let out = FeedbackDelay::new(0.3).process(input).unwrap();
        assert_eq!(out.len(), 500);
        assert_eq!(out.channels(), 2);
    }

    #[test]
    fn test_delay_zero_is_one_sample() {
        let input = AudioBuffer::from_channels(vec![vec![1.0, 0.0, 0.0]], 8000).unwrap();
        let out = FeedbackDelay::new(0.0).process(input).unwrap();
        assert_relative_eq!(out.channel(0)[0], DELAY_DRY);
        assert_relative_eq!(out.channel(0)[1], DELAY_WET);
        assert_relative_eq!(out.channel(0)[2], DELAY_WET * DELAY_FEEDBACK, epsilon = 1e-6);
    }
}
