//! Filter stage
//!
//! A single second-order (biquad) section per channel using the Audio EQ
//! Cookbook formulas. Lowpass and highpass read Q in decibels, so the gain
//! at the cutoff is `10^(Q/20)`; bandpass reads Q linearly and is the
//! constant 0 dB peak gain variant.

use std::f64::consts::PI;

use super::stage::Stage;
use crate::effects::{FilterKind, FilterSettings};
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Resonance given in dB to a linear Q
fn db_to_q(q_db: f64) -> f64 {
    10f64.powf(q_db / 20.0)
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Calculate coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn calculate(kind: FilterKind, sample_rate: f64, frequency: f64, q: f64) -> Self {
        // Keep w0 strictly inside (0, pi)
        let nyquist = sample_rate / 2.0;
        let freq = frequency.min(nyquist * 0.999).max(f64::MIN_POSITIVE);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = match kind {
            FilterKind::Lowpass | FilterKind::Highpass => sin_w0 / (2.0 * db_to_q(q)),
            FilterKind::Bandpass => sin_w0 / (2.0 * q),
        };

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::Lowpass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Highpass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Bandpass => (
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64, // x[n-1]
    x2: f64, // x[n-2]
    y1: f64, // y[n-1]
    y2: f64, // y[n-2]
}

impl BiquadState {
    /// Direct Form I
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Single biquad section applied to every channel
#[derive(Debug, Clone, Copy)]
pub struct BiquadFilter {
    settings: FilterSettings,
}

impl BiquadFilter {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }
}

impl Stage for BiquadFilter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn process(&self, mut input: AudioBuffer) -> Result<AudioBuffer> {
        let coeffs = BiquadCoeffs::calculate(
            self.settings.kind,
            input.sample_rate() as f64,
            self.settings.frequency,
            self.settings.q,
        );
        for channel in input.iter_channels_mut() {
            let mut state = BiquadState::default();
            for sample in channel.iter_mut() {
                *sample = state.process(*sample as f64, &coeffs) as f32;
            }
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 44100.0;

    #[test]
    fn test_lowpass_response() {
        let c = BiquadCoeffs::calculate(FilterKind::Lowpass, SR, 2000.0, 1.0);
        assert_relative_eq!(c.magnitude_at(0.0, SR), 1.0, epsilon = 1e-9);
        // At cutoff the gain is the resonance read in dB
        assert_relative_eq!(c.magnitude_at(2000.0, SR), 10f64.powf(1.0 / 20.0), epsilon = 1e-6);
        assert!(c.magnitude_at(8000.0, SR) < 0.1);
    }

    #[test]
    fn test_highpass_response() {
        let c = BiquadCoeffs::calculate(FilterKind::Highpass, SR, 800.0, 5.0);
        assert!(c.magnitude_at(50.0, SR) < 0.01);
        assert_relative_eq!(c.magnitude_at(800.0, SR), 10f64.powf(5.0 / 20.0), epsilon = 1e-6);
        assert_relative_eq!(c.magnitude_at(SR / 2.0, SR), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_db_resonance_is_unity_at_cutoff() {
        // Q of 0 dB is a linear Q of 1: unity gain at the cutoff
        let c = BiquadCoeffs::calculate(FilterKind::Lowpass, SR, 1000.0, 0.0);
        assert_relative_eq!(c.magnitude_at(1000.0, SR), 1.0, epsilon = 1e-6);
        let c = BiquadCoeffs::calculate(FilterKind::Highpass, SR, 1000.0, -6.0);
        assert_relative_eq!(c.magnitude_at(1000.0, SR), 10f64.powf(-6.0 / 20.0), epsilon = 1e-6);
    }

    #[test]
    fn test_bandpass_peak_is_unity() {
        let c = BiquadCoeffs::calculate(FilterKind::Bandpass, SR, 1000.0, 10.0);
        assert_relative_eq!(c.magnitude_at(1000.0, SR), 1.0, epsilon = 1e-6);
        assert!(c.magnitude_at(100.0, SR) < 0.02);
        assert!(c.magnitude_at(10000.0, SR) < 0.02);
    }

    #[test]
    fn test_frequency_above_nyquist_is_clamped() {
        let c = BiquadCoeffs::calculate(FilterKind::Lowpass, 8000.0, 20000.0, 0.7);
        for v in [c.b0, c.b1, c.b2, c.a1, c.a2] {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_filter_stage_keeps_shape_and_dc() {
        let input = AudioBuffer::from_channels(vec![vec![0.5; 4000], vec![0.25; 4000]], 44100)
            .unwrap();
        let filter = BiquadFilter::new(FilterSettings::new(FilterKind::Lowpass, 2000.0, 1.0));
        let out = filter.process(input).unwrap();

        assert_eq!(out.channels(), 2);
        assert_eq!(out.len(), 4000);
        // DC passes a lowpass once the transient settles
        assert_relative_eq!(out.channel(0)[3999], 0.5, epsilon = 1e-4);
        assert_relative_eq!(out.channel(1)[3999], 0.25, epsilon = 1e-4);
    }
}
