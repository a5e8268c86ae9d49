//! Reverb stage
//!
//! Convolution reverb with a synthetic impulse response:
//! - 2 s of uniform noise per channel, shaped by a squared linear decay
//!   `(1 - i/len)^2` and scaled by the wet mix
//! - normalized across channels the way a browser convolver normalizes its
//!   buffer: RMS per sample of `0.00125 * 44100 / sample_rate` (-58 dB at
//!   44.1 kHz). The mix factor cancels out here.
//! - convolved by FFT and truncated to the input length (the tail past the
//!   end of the take is dropped)
//!
//! Output is `(1 - mix) * dry + mix * wet`. The impulse noise comes from a
//! fresh OS-seeded RNG on every render unless a seed is supplied.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::trace;

use super::stage::Stage;
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxError};

// ============================================================================
// Constants
// ============================================================================

/// Impulse response length in seconds
pub const REVERB_IMPULSE_SECS: f64 = 2.0;

/// Target impulse RMS per sample at the calibration rate (-58 dB)
pub const IMPULSE_GAIN_CALIBRATION: f64 = 0.00125;

/// Sample rate at which `IMPULSE_GAIN_CALIBRATION` applies unscaled
pub const CALIBRATION_SAMPLE_RATE: f64 = 44100.0;

/// Floor on the measured impulse RMS; keeps the scale finite for silence
const MIN_POWER: f64 = 0.000125;

/// Impulse length in samples at `sample_rate`
pub fn impulse_len(sample_rate: u32) -> usize {
    (REVERB_IMPULSE_SECS * sample_rate as f64) as usize
}

// ============================================================================
// Impulse Response
// ============================================================================

/// Generate one channel of decaying noise scaled by the wet mix
///
/// The result is raw; see `normalize_impulses`.
pub fn generate_impulse<R: Rng>(rng: &mut R, len: usize, mix: f64) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let decay = 1.0 - i as f64 / len as f64;
            let noise: f64 = rng.random_range(-1.0..1.0);
            (noise * decay * decay * mix) as f32
        })
        .collect()
}

/// Scale a multichannel impulse to the calibrated RMS for `sample_rate`
///
/// RMS is measured over every sample of every channel together. Returns the
/// applied scale.
pub fn normalize_impulses(impulses: &mut [Vec<f32>], sample_rate: u32) -> f64 {
    let count: usize = impulses.iter().map(Vec::len).sum();
    if count == 0 {
        return 1.0;
    }
    let sum_sq: f64 = impulses
        .iter()
        .flat_map(|ch| ch.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let mut power = (sum_sq / count as f64).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    let scale = IMPULSE_GAIN_CALIBRATION * (CALIBRATION_SAMPLE_RATE / sample_rate as f64) / power;

    for s in impulses.iter_mut().flat_map(|ch| ch.iter_mut()) {
        *s = (*s as f64 * scale) as f32;
    }
    scale
}

// ============================================================================
// Convolution
// ============================================================================

/// Linear convolution of `signal` with `kernel`, keeping the first
/// `signal.len()` samples
pub fn convolve_truncated(planner: &mut FftPlanner<f32>, signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let len = signal.len();
    if len == 0 || kernel.is_empty() {
        return vec![0.0; len];
    }
    // Taps past the output length never contribute
    let kernel = &kernel[..kernel.len().min(len)];
    let n = (len + kernel.len() - 1).next_power_of_two();

    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let pad = |data: &[f32]| -> Vec<Complex<f32>> {
        let mut out: Vec<Complex<f32>> = data.iter().map(|&s| Complex::new(s, 0.0)).collect();
        out.resize(n, Complex::new(0.0, 0.0));
        out
    };

    let mut x = pad(signal);
    let mut h = pad(kernel);
    fft.process(&mut x);
    fft.process(&mut h);

    for (xi, hi) in x.iter_mut().zip(h.iter()) {
        *xi *= *hi;
    }
    ifft.process(&mut x);

    let scale = 1.0 / n as f32;
    x.iter().take(len).map(|c| c.re * scale).collect()
}

// ============================================================================
// Stage
// ============================================================================

/// Noise-impulse convolution reverb
#[derive(Debug, Clone, Copy)]
pub struct ConvolutionReverb {
    mix: f64,
    seed: Option<u64>,
}

impl ConvolutionReverb {
    /// # Arguments
    /// * `mix` - wet mix in [0, 1]
    /// * `seed` - fixed impulse seed, or `None` for per-render entropy
    pub fn new(mix: f64, seed: Option<u64>) -> Self {
        Self { mix, seed }
    }

    pub fn mix(&self) -> f64 {
        self.mix
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        }
    }
}

impl Stage for ConvolutionReverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn process(&self, mut input: AudioBuffer) -> Result<AudioBuffer> {
        let ir_len = impulse_len(input.sample_rate());
        if ir_len == 0 {
            return Err(VoxError::Render {
                reason: format!("sample rate {} too low for reverb", input.sample_rate()),
            });
        }

        let mut rng = self.rng();
        let mut planner = FftPlanner::new();
        let dry_gain = (1.0 - self.mix) as f32;
        let wet_gain = self.mix as f32;

        let mut impulses: Vec<Vec<f32>> = (0..input.channels())
            .map(|_| generate_impulse(&mut rng, ir_len, self.mix))
            .collect();
        let scale = normalize_impulses(&mut impulses, input.sample_rate());
        trace!(scale, "normalized impulse");

        for (ch, (channel, impulse)) in input.iter_channels_mut().zip(&impulses).enumerate() {
            let wet = convolve_truncated(&mut planner, channel, impulse);
            for (sample, w) in channel.iter_mut().zip(wet) {
                *sample = dry_gain * *sample + wet_gain * w;
            }
            trace!(channel = ch, ir_len, "convolved channel");
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rms(impulses: &[Vec<f32>]) -> f64 {
        let count: usize = impulses.iter().map(Vec::len).sum();
        let sum_sq: f64 = impulses
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| (s as f64).powi(2))
            .sum();
        (sum_sq / count as f64).sqrt()
    }

    #[test]
    fn test_normalized_impulse_is_minus_58_db() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let len = impulse_len(44100);
        let mut irs = vec![
            generate_impulse(&mut rng, len, 0.7),
            generate_impulse(&mut rng, len, 0.7),
        ];
        normalize_impulses(&mut irs, 44100);
        assert_relative_eq!(rms(&irs), 0.00125, max_relative = 1e-4);

        // Two seconds at 44.1 kHz carry about 0.14 of energy per channel
        let energy: f64 = irs[0].iter().map(|&s| (s as f64).powi(2)).sum();
        assert!((0.12..0.16).contains(&energy), "energy {}", energy);
    }

    #[test]
    fn test_normalization_scales_with_sample_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut irs = vec![generate_impulse(&mut rng, impulse_len(22050), 1.0)];
        normalize_impulses(&mut irs, 22050);
        assert_relative_eq!(rms(&irs), 0.0025, max_relative = 1e-4);
    }

    #[test]
    fn test_mix_cancels_under_normalization() {
        let mut quiet = vec![generate_impulse(&mut ChaCha8Rng::seed_from_u64(6), 4000, 0.2)];
        let mut loud = vec![generate_impulse(&mut ChaCha8Rng::seed_from_u64(6), 4000, 0.9)];
        normalize_impulses(&mut quiet, 44100);
        normalize_impulses(&mut loud, 44100);
        for (a, b) in quiet[0].iter().zip(loud[0].iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_impulse_decays() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let ir = generate_impulse(&mut rng, 10000, 1.0);
        let head: f32 = ir[..1000].iter().map(|s| s.abs()).sum();
        let tail: f32 = ir[9000..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 20.0);
    }

    #[test]
    fn test_zero_mix_impulse_is_silent() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut irs = vec![generate_impulse(&mut rng, 100, 0.0)];
        let scale = normalize_impulses(&mut irs, 44100);
        assert!(scale.is_finite());
        assert!(irs[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_convolve_matches_direct() {
        let signal = [1.0, 2.0, 3.0, 4.0, 5.0];
        let kernel = [0.5, -1.0, 0.25];
        let mut planner = FftPlanner::new();
        let out = convolve_truncated(&mut planner, &signal, &kernel);

        let expected: Vec<f32> = (0..signal.len())
            .map(|n| {
                (0..kernel.len())
                    .filter(|&k| k <= n)
                    .map(|k| signal[n - k] * kernel[k])
                    .sum()
            })
            .collect();
        assert_eq!(out.len(), signal.len());
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_convolve_long_kernel_is_truncated() {
        let signal = [1.0, 0.0, 0.0];
        let kernel = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut planner = FftPlanner::new();
        let out = convolve_truncated(&mut planner, &signal, &kernel);
        assert_eq!(out.len(), 3);
        assert_relative_eq!(out[2], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_seeded_reverb_is_reproducible() {
        let input = AudioBuffer::sine(440.0, 0.5, 4410, 4410);
        let reverb = ConvolutionReverb::new(0.7, Some(42));
        let a = reverb.process(input.clone()).unwrap();
        let b = reverb.process(input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseeded_reverb_varies() {
        let input = AudioBuffer::sine(440.0, 0.5, 4410, 4410);
        let reverb = ConvolutionReverb::new(0.7, None);
        let a = reverb.process(input.clone()).unwrap();
        let b = reverb.process(input).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_mix_is_dry() {
        let input = AudioBuffer::sine(440.0, 0.5, 2000, 8000);
        let out = ConvolutionReverb::new(0.0, Some(9)).process(input.clone()).unwrap();
        assert!(out.is_approx_equal(&input, 1e-6));
    }
}
