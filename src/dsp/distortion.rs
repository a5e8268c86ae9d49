//! Distortion stage
//!
//! Memoryless waveshaper driven by a fixed-resolution transfer curve:
//!
//! ```text
//! k = amount * 50
//! curve(x) = ((3 + k) * x * 20deg) / (pi + k * |x|)
//! ```
//!
//! The curve is sampled at `CURVE_RESOLUTION` points over [-1, 1) and looked
//! up with the nearest index. Inputs are clamped to [-1, 1] first. No
//! oversampling is applied, so high drive aliases.

use std::f64::consts::PI;

use super::stage::Stage;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Number of points in the transfer curve
pub const CURVE_RESOLUTION: usize = 44100;

/// Drive multiplier applied to the distortion amount
const DRIVE_SCALE: f64 = 50.0;

/// 20 degrees in radians
const SHAPE_ANGLE: f64 = 20.0 * PI / 180.0;

/// Evaluate the continuous shaping function
pub fn shape(amount: f64, x: f64) -> f64 {
    let k = amount * DRIVE_SCALE;
    ((3.0 + k) * x * SHAPE_ANGLE) / (PI + k * x.abs())
}

/// Table-driven waveshaper
#[derive(Debug, Clone)]
pub struct WaveShaper {
    amount: f64,
    curve: Vec<f32>,
}

impl WaveShaper {
    /// # Arguments
    /// * `amount` - drive in [0, 1]; 0 is a mild linear gain, not a bypass
    pub fn new(amount: f64) -> Self {
        let n = CURVE_RESOLUTION as f64;
        let curve = (0..CURVE_RESOLUTION)
            .map(|i| {
                let x = (i as f64 * 2.0) / n - 1.0;
                shape(amount, x) as f32
            })
            .collect();
        Self { amount, curve }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn curve(&self) -> &[f32] {
        &self.curve
    }

    /// Map one sample through the curve
    ///
    /// Index `i` holds `x = 2i/n - 1`, so 0.0 lands exactly on the zero point.
    #[inline]
    pub fn apply(&self, sample: f32) -> f32 {
        let x = (sample as f64).clamp(-1.0, 1.0);
        let index = ((x + 1.0) * CURVE_RESOLUTION as f64 / 2.0).round() as usize;
        self.curve[index.min(CURVE_RESOLUTION - 1)]
    }
}

impl Stage for WaveShaper {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn process(&self, mut input: AudioBuffer) -> Result<AudioBuffer> {
        for channel in input.iter_channels_mut() {
            for sample in channel.iter_mut() {
                *sample = self.apply(*sample);
            }
        }
        Ok(input)
    }
}
