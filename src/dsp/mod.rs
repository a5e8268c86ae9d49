//! Signal Chain Builder
//!
//! Offline rendering of a whole take through the stages an effect enables.
//! Every stage implements the `Stage` trait; `SignalChain` orders them.

mod chain;
mod delay;
mod distortion;
mod filter;
mod pitch;
mod reverb;
mod stage;

pub use chain::{render, render_cancellable, SignalChain};
pub use delay::{delay_samples, FeedbackDelay};
pub use distortion::{shape, WaveShaper};
pub use filter::{BiquadCoeffs, BiquadFilter};
pub use pitch::{checked_output_len, output_len, PitchShift, MAX_OUTPUT_FRAMES};
pub use reverb::{
    convolve_truncated, generate_impulse, impulse_len, normalize_impulses, ConvolutionReverb,
};
pub use stage::{CancelToken, RenderOptions, Stage};

/// Fixed constants of the effect model
pub mod constants {
    pub use super::delay::{DELAY_DRY, DELAY_FEEDBACK, DELAY_WET};
    pub use super::distortion::CURVE_RESOLUTION;
    pub use super::reverb::{IMPULSE_GAIN_CALIBRATION, REVERB_IMPULSE_SECS};
}
