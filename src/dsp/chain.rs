//! Signal chain
//!
//! Stages run in a fixed order, each one present only when its parameter is:
//! 1. Pitch (ratio present and != 1)
//! 2. Filter
//! 3. Distortion (amount > 0)
//! 4. Delay (time > 0)
//! 5. Reverb (mix > 0)
//!
//! A chain is built fresh for every render and dropped afterwards.

use std::time::Instant;

use tracing::{debug, warn};

use super::delay::FeedbackDelay;
use super::distortion::WaveShaper;
use super::filter::BiquadFilter;
use super::pitch::{checked_output_len, output_len, PitchShift};
use super::reverb::ConvolutionReverb;
use super::stage::{CancelToken, RenderOptions, Stage};
use crate::effects::{EffectDefinition, EffectSettings};
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxError};

/// Ordered list of stages for one render
pub struct SignalChain {
    stages: Vec<Box<dyn Stage>>,
    /// Pitch ratio when the pitch stage is active, for output sizing
    pitch: Option<f64>,
}

impl SignalChain {
    /// Build the chain for `settings`, skipping every disabled stage
    pub fn build(settings: &EffectSettings, options: &RenderOptions) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = Vec::new();

        let pitch = settings.pitch.filter(|&p| p != 1.0);
        if let Some(ratio) = pitch {
            stages.push(Box::new(PitchShift::new(ratio)));
        }
        if let Some(filter) = settings.filter {
            stages.push(Box::new(BiquadFilter::new(filter)));
        }
        if let Some(amount) = settings.distortion.filter(|&d| d > 0.0) {
            stages.push(Box::new(WaveShaper::new(amount)));
        }
        if let Some(seconds) = settings.delay.filter(|&d| d > 0.0) {
            stages.push(Box::new(FeedbackDelay::new(seconds)));
        }
        if let Some(mix) = settings.reverb.filter(|&r| r > 0.0) {
            stages.push(Box::new(ConvolutionReverb::new(mix, options.reverb_seed)));
        }

        Self { stages, pitch }
    }

    /// Stage names in processing order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Output length for a source of `source_len` samples
    pub fn output_len(&self, source_len: usize) -> usize {
        match self.pitch {
            Some(ratio) => output_len(source_len, ratio),
            None => source_len,
        }
    }

    /// Run every stage over a copy of `source`
    ///
    /// # Errors
    /// * `Cancelled` - the token was set before a stage started
    /// * `Render` - the output would be too long to hold, a stage failed or
    ///   changed the shape unexpectedly, or a sample is non-finite
    pub fn run(&self, source: &AudioBuffer, cancel: Option<&CancelToken>) -> Result<AudioBuffer> {
        let expected_len = match self.pitch {
            Some(ratio) => checked_output_len(source.len(), ratio)?,
            None => source.len(),
        };
        if source.channels() == 0 || source.is_empty() {
            return Ok(AudioBuffer::empty(source.channels(), source.sample_rate()));
        }

        let mut buffer = source.clone();
        for stage in &self.stages {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                debug!(stage = stage.name(), "render cancelled");
                return Err(VoxError::Cancelled);
            }
            let started = Instant::now();
            buffer = stage.process(buffer)?;
            debug!(
                stage = stage.name(),
                frames = buffer.len(),
                channels = buffer.channels(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "stage complete"
            );
        }

        if buffer.len() != expected_len || buffer.channels() != source.channels() {
            return Err(VoxError::Render {
                reason: format!(
                    "output shape {}x{} does not match expected {}x{}",
                    buffer.channels(),
                    buffer.len(),
                    source.channels(),
                    expected_len
                ),
            });
        }
        if !buffer.is_finite() {
            warn!("render produced non-finite samples");
            return Err(VoxError::Render {
                reason: "non-finite sample in output".to_string(),
            });
        }
        Ok(buffer)
    }
}

/// Render `source` through `effect`
///
/// # Example
/// ```
/// use voxshift::dsp::{render, RenderOptions};
/// use voxshift::effects::EffectCatalog;
/// use voxshift::engine::AudioBuffer;
///
/// let source = AudioBuffer::sine(440.0, 0.5, 44100, 44100);
/// let catalog = EffectCatalog::builtin();
/// let chipmunk = catalog.require("chipmunk").unwrap();
/// let out = render(&source, chipmunk, &RenderOptions::default()).unwrap();
/// assert_eq!(out.len(), 24500);
/// ```
pub fn render(
    source: &AudioBuffer,
    effect: &EffectDefinition,
    options: &RenderOptions,
) -> Result<AudioBuffer> {
    let chain = SignalChain::build(effect.settings(), options);
    debug!(effect = effect.id(), stages = ?chain.stage_names(), "rendering");
    chain.run(source, None)
}

/// Render with a cancellation token checked before each stage
pub fn render_cancellable(
    source: &AudioBuffer,
    effect: &EffectDefinition,
    options: &RenderOptions,
    cancel: &CancelToken,
) -> Result<AudioBuffer> {
    let chain = SignalChain::build(effect.settings(), options);
    debug!(effect = effect.id(), stages = ?chain.stage_names(), "rendering");
    chain.run(source, Some(cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectCatalog, FilterKind};
    use test_case::test_case;

    fn chain_for(id: &str) -> SignalChain {
        let catalog = EffectCatalog::builtin();
        SignalChain::build(catalog.require(id).unwrap().settings(), &RenderOptions::default())
    }

    #[test_case("robot", &["pitch", "filter", "distortion"] ; "robot")]
    #[test_case("chipmunk", &["pitch"] ; "chipmunk")]
    #[test_case("deep", &["pitch", "filter"] ; "deep voice")]
    #[test_case("alien", &["pitch", "filter", "distortion", "delay"] ; "alien")]
    #[test_case("echo", &["delay", "reverb"] ; "echo")]
    #[test_case("phone", &["filter", "distortion"] ; "phone")]
    #[test_case("monster", &["pitch", "filter", "distortion"] ; "monster")]
    #[test_case("helium", &["pitch"] ; "helium")]
    fn test_builtin_stage_order(id: &str, expected: &[&str]) {
        assert_eq!(chain_for(id).stage_names(), expected);
    }

    #[test]
    fn test_neutral_values_skip_stages() {
        let settings = EffectSettings::default()
            .with_pitch(1.0)
            .with_distortion(0.0)
            .with_delay(0.0)
            .with_reverb(0.0)
            .with_formant(2.0);
        let chain = SignalChain::build(&settings, &RenderOptions::default());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_identity_render_is_exact() {
        let source = AudioBuffer::sine(330.0, 0.8, 1000, 8000);
        let out = render(&source, &EffectDefinition::identity(), &RenderOptions::default())
            .unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_empty_source_returns_empty() {
        let catalog = EffectCatalog::builtin();
        let source = AudioBuffer::empty(2, 44100);
        let out = render(&source, catalog.require("monster").unwrap(), &RenderOptions::default())
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.channels(), 2);
        assert_eq!(out.sample_rate(), 44100);
    }

    #[test]
    fn test_cancelled_before_first_stage() {
        let catalog = EffectCatalog::builtin();
        let source = AudioBuffer::sine(440.0, 0.5, 4410, 44100);
        let token = CancelToken::new();
        token.cancel();
        let result = render_cancellable(
            &source,
            catalog.require("robot").unwrap(),
            &RenderOptions::default(),
            &token,
        );
        assert!(matches!(result, Err(VoxError::Cancelled)));
    }

    #[test]
    fn test_non_finite_output_rejected() {
        let source =
            AudioBuffer::from_channels(vec![vec![0.1, f32::NAN, 0.2]], 8000).unwrap();
        let effect = EffectDefinition::new(
            "lp",
            "Lowpass",
            EffectSettings::default().with_filter(FilterKind::Lowpass, 1000.0, 0.7),
        )
        .unwrap();
        let result = render(&source, &effect, &RenderOptions::default());
        assert!(matches!(result, Err(VoxError::Render { .. })));
    }

    #[test]
    fn test_output_len_follows_pitch() {
        let chain = chain_for("helium");
        assert_eq!(chain.output_len(44100), 20045);
        assert_eq!(chain_for("echo").output_len(44100), 44100);
    }
}
