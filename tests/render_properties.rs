//! Render Property Tests
//!
//! End-to-end checks of the signal chain through the public API.

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use test_case::test_case;

use voxshift::dsp::output_len;
use voxshift::engine::band_energy;
use voxshift::{
    render, AudioBuffer, EffectCatalog, EffectDefinition, EffectSettings, FilterKind,
    RenderOptions, VoxError,
};

const SR: u32 = 44100;

fn one_second_sine(frequency: f32) -> AudioBuffer {
    AudioBuffer::sine(frequency, 0.5, SR as usize, SR)
}

/// Seeded white noise, one channel per entry of `seeds`
fn noise(seeds: &[u64], frames: usize) -> AudioBuffer {
    let channels: Vec<Vec<f32>> = seeds
        .iter()
        .map(|&seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..frames).map(|_| rng.random_range(-0.3f32..0.3)).collect()
        })
        .collect();
    AudioBuffer::from_channels(channels, SR).unwrap()
}

fn custom(settings: EffectSettings) -> EffectDefinition {
    EffectDefinition::new("custom", "Custom", settings).unwrap()
}

fn energy(buffer: &AudioBuffer) -> f64 {
    buffer
        .iter_channels()
        .flat_map(|ch| ch.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum()
}

// === Output length ===

#[test_case("robot", 55125 ; "robot")]
#[test_case("chipmunk", 24500 ; "chipmunk")]
#[test_case("deep", 73500 ; "deep")]
#[test_case("alien", 36750 ; "alien")]
#[test_case("echo", 44100 ; "echo")]
#[test_case("phone", 44100 ; "phone")]
#[test_case("monster", 110250 ; "monster")]
#[test_case("helium", 20045 ; "helium")]
fn test_builtin_output_length(id: &str, expected: usize) {
    let catalog = EffectCatalog::builtin();
    let effect = catalog.require(id).unwrap();
    let rendered = render(&one_second_sine(440.0), effect, &RenderOptions::seeded(1)).unwrap();

    assert_eq!(rendered.len(), expected);
    assert_eq!(rendered.channels(), 1);
    assert_eq!(rendered.sample_rate(), SR);
    assert!(rendered.is_finite());
}

#[test]
fn test_length_without_pitch_is_unchanged() {
    let source = noise(&[3], 10_007);
    let settings = EffectSettings::default()
        .with_filter(FilterKind::Highpass, 300.0, 0.7)
        .with_distortion(0.5)
        .with_delay(0.05)
        .with_reverb(0.4);
    let rendered = render(&source, &custom(settings), &RenderOptions::seeded(9)).unwrap();
    assert_eq!(rendered.len(), source.len());
}

#[test]
fn test_length_follows_floor_of_ratio() {
    let source = noise(&[5], 9_999);
    for ratio in [0.47, 0.73, 1.3, 1.95, 3.0] {
        let rendered = render(
            &source,
            &custom(EffectSettings::default().with_pitch(ratio)),
            &RenderOptions::default(),
        )
        .unwrap();
        let expected = (9_999.0 / ratio).floor() as usize;
        assert_eq!(rendered.len(), expected, "ratio {}", ratio);
        assert_eq!(rendered.len(), output_len(9_999, ratio));
    }
}

#[test]
fn test_extreme_pitch_fails_instead_of_allocating() {
    // Valid as a parameter (> 0), but the output would not fit any WAV
    let effect = custom(EffectSettings::default().with_pitch(1e-300));
    let err = render(&one_second_sine(440.0), &effect, &RenderOptions::default()).unwrap_err();
    assert!(matches!(err, VoxError::Render { .. }), "got {:?}", err);
}

#[test]
fn test_stereo_builtins_keep_channels() {
    let source = noise(&[1, 2], 4_410);
    let catalog = EffectCatalog::builtin();
    for effect in catalog.list() {
        let rendered = render(&source, effect, &RenderOptions::seeded(4)).unwrap();
        assert_eq!(rendered.channels(), 2, "{}", effect.id());
        assert!(rendered.is_finite(), "{}", effect.id());
    }
}

// === Stage behavior ===

#[test]
fn test_identity_is_bit_exact() {
    let source = noise(&[7, 8], 2_048);
    let rendered = render(&source, &EffectDefinition::identity(), &RenderOptions::default()).unwrap();
    assert_eq!(rendered, source);
}

#[test]
fn test_zero_distortion_is_skipped() {
    let source = one_second_sine(220.0);
    let rendered = render(
        &source,
        &custom(EffectSettings::default().with_distortion(0.0)),
        &RenderOptions::default(),
    )
    .unwrap();
    assert_eq!(rendered, source);
}

#[test]
fn test_full_distortion_stays_in_range() {
    let source = AudioBuffer::sine(220.0, 1.0, 8_820, SR);
    let rendered = render(
        &source,
        &custom(EffectSettings::default().with_distortion(1.0)),
        &RenderOptions::default(),
    )
    .unwrap();
    assert!(rendered.peak() <= 1.0);
    // Heavy drive flattens the sine towards a square wave
    let crest = rendered.rms() / rendered.peak();
    assert!(crest > 0.85, "rms/peak {} should approach 1", crest);
    assert!(source.rms() / source.peak() < 0.75);
}

#[test]
fn test_chipmunk_on_one_second_sine() {
    let catalog = EffectCatalog::builtin();
    let rendered = render(
        &one_second_sine(440.0),
        catalog.require("chipmunk").unwrap(),
        &RenderOptions::default(),
    )
    .unwrap();
    assert_eq!(rendered.len(), 24500);
    // Pitch only resamples, it never exceeds the source peak
    assert!(rendered.peak() <= 0.5 + 1e-6);
}

#[test]
fn test_deep_voice_attenuates_high_band() {
    let source = one_second_sine(5000.0);
    let catalog = EffectCatalog::builtin();
    let rendered = render(&source, catalog.require("deep").unwrap(), &RenderOptions::default()).unwrap();
    assert_eq!(rendered.len(), 73500);

    let before = band_energy(source.channel(0), SR, 2000.0, 22050.0);
    let after = band_energy(rendered.channel(0), SR, 2000.0, 22050.0);
    assert!(
        after < before * 0.5,
        "high band energy {} should be below half of {}",
        after,
        before
    );
}

#[test]
fn test_phone_rejects_low_rumble() {
    let source = AudioBuffer::sine(60.0, 0.5, SR as usize, SR);
    let catalog = EffectCatalog::builtin();
    let rendered = render(&source, catalog.require("phone").unwrap(), &RenderOptions::default()).unwrap();
    assert!(rendered.rms() < source.rms() * 0.25);
}

// === Reverb randomness ===

#[test]
fn test_seeded_reverb_is_reproducible() {
    let source = noise(&[11], 22_050);
    let catalog = EffectCatalog::builtin();
    let echo = catalog.require("echo").unwrap();

    let a = render(&source, echo, &RenderOptions::seeded(42)).unwrap();
    let b = render(&source, echo, &RenderOptions::seeded(42)).unwrap();
    assert_eq!(a, b);

    let c = render(&source, echo, &RenderOptions::seeded(43)).unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_unseeded_reverb_varies_with_comparable_energy() {
    let source = noise(&[12], SR as usize);
    let catalog = EffectCatalog::builtin();
    let echo = catalog.require("echo").unwrap();

    let a = render(&source, echo, &RenderOptions::default()).unwrap();
    let b = render(&source, echo, &RenderOptions::default()).unwrap();
    assert_ne!(a, b);
    assert_eq!(a.len(), b.len());

    let ratio = energy(&a) / energy(&b);
    assert_relative_eq!(ratio, 1.0, max_relative = 0.15);
}
