//! Effect definitions
//!
//! An effect is a declarative bundle of optional numeric parameters. A missing
//! parameter disables its stage; it never means "zero". Values are checked
//! once, when the definition is built, so the renderer can trust them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxError};

/// Biquad response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Lowpass => "lowpass",
            FilterKind::Highpass => "highpass",
            FilterKind::Bandpass => "bandpass",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter stage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(rename = "type", alias = "kind")]
    pub kind: FilterKind,
    /// Cutoff (lowpass/highpass) or centre (bandpass) frequency in Hz
    pub frequency: f64,
    /// Resonance: dB for lowpass/highpass, linear Q for bandpass
    #[serde(rename = "q", alias = "Q")]
    pub q: f64,
}

impl FilterSettings {
    pub fn new(kind: FilterKind, frequency: f64, q: f64) -> Self {
        Self { kind, frequency, q }
    }
}

/// The parameter set of an effect
///
/// Every field is optional; `None` means the matching stage is skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    /// Playback-rate ratio, > 0. 2.0 is an octave up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    /// Formant ratio, > 0. Declarative only; the renderer ignores it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formant: Option<f64>,
    /// Waveshaper drive in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distortion: Option<f64>,
    /// Echo delay time in seconds, >= 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    /// Reverb wet mix in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSettings>,
}

impl EffectSettings {
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_formant(mut self, formant: f64) -> Self {
        self.formant = Some(formant);
        self
    }

    pub fn with_distortion(mut self, amount: f64) -> Self {
        self.distortion = Some(amount);
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = Some(seconds);
        self
    }

    pub fn with_reverb(mut self, mix: f64) -> Self {
        self.reverb = Some(mix);
        self
    }

    pub fn with_filter(mut self, kind: FilterKind, frequency: f64, q: f64) -> Self {
        self.filter = Some(FilterSettings::new(kind, frequency, q));
        self
    }

    /// True when every stage is disabled
    pub fn is_identity(&self) -> bool {
        self.pitch.map_or(true, |p| p == 1.0)
            && self.distortion.map_or(true, |d| d == 0.0)
            && self.delay.map_or(true, |d| d == 0.0)
            && self.reverb.map_or(true, |r| r == 0.0)
            && self.filter.is_none()
    }

    /// Check every present parameter against its domain
    pub fn validate(&self) -> Result<()> {
        if let Some(pitch) = self.pitch {
            check_positive("pitch", pitch)?;
        }
        if let Some(formant) = self.formant {
            check_positive("formant", formant)?;
        }
        if let Some(amount) = self.distortion {
            check_unit("distortion", amount)?;
        }
        if let Some(delay) = self.delay {
            if !delay.is_finite() || delay < 0.0 {
                return Err(VoxError::invalid_param("delay", delay, ">= 0 seconds"));
            }
        }
        if let Some(mix) = self.reverb {
            check_unit("reverb", mix)?;
        }
        if let Some(filter) = &self.filter {
            check_positive("filter.frequency", filter.frequency)?;
            match filter.kind {
                FilterKind::Bandpass => check_positive("filter.q", filter.q)?,
                FilterKind::Lowpass | FilterKind::Highpass if !filter.q.is_finite() => {
                    return Err(VoxError::invalid_param("filter.q", filter.q, "finite dB"));
                }
                FilterKind::Lowpass | FilterKind::Highpass => {}
            }
        }
        Ok(())
    }
}

fn check_positive(param: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(VoxError::invalid_param(param, value, "> 0"));
    }
    Ok(())
}

fn check_unit(param: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(VoxError::invalid_param(param, value, "0.0 to 1.0"));
    }
    Ok(())
}

/// Wire form of a definition, validated on the way in
#[derive(Debug, Clone, Deserialize)]
struct RawEffectDefinition {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    settings: EffectSettings,
}

impl TryFrom<RawEffectDefinition> for EffectDefinition {
    type Error = VoxError;

    fn try_from(raw: RawEffectDefinition) -> Result<Self> {
        Ok(EffectDefinition::new(raw.id, raw.name, raw.settings)?
            .with_description(raw.description)
            .with_icon(raw.icon)
            .with_color(raw.color))
    }
}

/// A named, validated effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEffectDefinition")]
pub struct EffectDefinition {
    id: String,
    name: String,
    description: String,
    /// Presentation tag (icon name)
    icon: String,
    /// Presentation tag (colour gradient)
    color: String,
    settings: EffectSettings,
}

impl EffectDefinition {
    /// Create a definition, rejecting invalid parameters
    ///
    /// # Errors
    /// * `InvalidParameter` - empty id or any out-of-domain setting
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        settings: EffectSettings,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(VoxError::invalid_param("id", "\"\"", "a non-empty identifier"));
        }
        settings.validate()?;
        Ok(Self::unchecked(id, name.into(), settings))
    }

    /// Pass-through definition with every stage disabled
    pub fn identity() -> Self {
        Self::unchecked(
            "original".to_string(),
            "Original".to_string(),
            EffectSettings::default(),
        )
        .with_description("Your voice, untouched")
    }

    /// Built-in definitions are checked by the catalog tests instead
    pub(crate) fn unchecked(id: String, name: String, settings: EffectSettings) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            icon: String::new(),
            color: String::new(),
            settings,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }
}
