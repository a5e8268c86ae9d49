//! Effect Catalog
//!
//! Ordered registry of effect definitions. The built-in set is fixed; the
//! only way to grow it is to register a definition under a new id.

use serde::Serialize;
use tracing::debug;

use super::definition::{EffectDefinition, EffectSettings, FilterKind};
use crate::error::{Result, VoxError};

/// Ordered, id-unique collection of effects
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct EffectCatalog {
    effects: Vec<EffectDefinition>,
}

impl EffectCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The eight reference effects, in display order
    pub fn builtin() -> Self {
        Self {
            effects: builtin_effects(),
        }
    }

    /// Parse a JSON array of definitions into a new catalog
    pub fn from_json(json: &str) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.extend_from_json(json)?;
        Ok(catalog)
    }

    /// Register every definition of a JSON array, in order
    ///
    /// Nothing is registered if any entry is invalid or collides.
    pub fn extend_from_json(&mut self, json: &str) -> Result<()> {
        let incoming: Vec<EffectDefinition> = serde_json::from_str(json)?;
        let mut staged = self.clone();
        for def in incoming {
            staged.register(def)?;
        }
        *self = staged;
        Ok(())
    }

    /// Append a definition
    ///
    /// # Errors
    /// * `DuplicateEffect` - if the id is already registered
    pub fn register(&mut self, effect: EffectDefinition) -> Result<()> {
        if self.get(effect.id()).is_some() {
            return Err(VoxError::DuplicateEffect {
                id: effect.id().to_string(),
            });
        }
        debug!(id = effect.id(), "registered effect");
        self.effects.push(effect);
        Ok(())
    }

    /// All definitions in insertion order
    pub fn list(&self) -> &[EffectDefinition] {
        &self.effects
    }

    /// Look up a definition by id
    pub fn get(&self, id: &str) -> Option<&EffectDefinition> {
        self.effects.iter().find(|e| e.id() == id)
    }

    /// Look up a definition by id, failing with `UnknownEffect`
    pub fn require(&self, id: &str) -> Result<&EffectDefinition> {
        self.get(id).ok_or_else(|| VoxError::UnknownEffect { id: id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect ids in order
    pub fn ids(&self) -> Vec<&str> {
        self.effects.iter().map(|e| e.id()).collect()
    }
}

/// The built-in effect list
pub fn list_effects() -> Vec<EffectDefinition> {
    builtin_effects()
}

fn effect(
    id: &str,
    name: &str,
    icon: &str,
    description: &str,
    color: &str,
    settings: EffectSettings,
) -> EffectDefinition {
    EffectDefinition::unchecked(id.to_string(), name.to_string(), settings)
        .with_icon(icon)
        .with_description(description)
        .with_color(color)
}

fn builtin_effects() -> Vec<EffectDefinition> {
    vec![
        effect(
            "robot",
            "Robot",
            "Bot",
            "Mechanical robotic voice with digital distortion",
            "from-cyan-400 to-blue-600",
            EffectSettings::default()
                .with_pitch(0.8)
                .with_distortion(0.6)
                .with_filter(FilterKind::Bandpass, 1000.0, 10.0),
        ),
        effect(
            "chipmunk",
            "Chipmunk",
            "Smile",
            "High-pitched squeaky voice effect",
            "from-yellow-400 to-orange-500",
            EffectSettings::default().with_pitch(1.8).with_formant(1.4),
        ),
        effect(
            "deep",
            "Deep Voice",
            "Volume2",
            "Lower pitch for a deeper, more dramatic voice",
            "from-red-500 to-pink-600",
            EffectSettings::default()
                .with_pitch(0.6)
                .with_formant(0.8)
                .with_filter(FilterKind::Lowpass, 2000.0, 1.0),
        ),
        effect(
            "alien",
            "Alien",
            "Zap",
            "Otherworldly voice with modulation effects",
            "from-green-400 to-emerald-600",
            EffectSettings::default()
                .with_pitch(1.2)
                .with_distortion(0.4)
                .with_delay(0.1)
                .with_filter(FilterKind::Highpass, 800.0, 5.0),
        ),
        effect(
            "echo",
            "Echo",
            "Radio",
            "Spacious echo effect with natural reverb",
            "from-purple-400 to-indigo-600",
            EffectSettings::default().with_delay(0.3).with_reverb(0.7),
        ),
        effect(
            "phone",
            "Phone Call",
            "Phone",
            "Vintage telephone call simulation",
            "from-gray-400 to-slate-600",
            EffectSettings::default()
                .with_filter(FilterKind::Bandpass, 1500.0, 2.0)
                .with_distortion(0.2),
        ),
        effect(
            "monster",
            "Monster",
            "Skull",
            "Scary monster voice with heavy distortion",
            "from-red-600 to-black",
            EffectSettings::default()
                .with_pitch(0.4)
                .with_distortion(0.8)
                .with_filter(FilterKind::Lowpass, 800.0, 3.0),
        ),
        effect(
            "helium",
            "Helium",
            "Wind",
            "Light and airy helium balloon effect",
            "from-pink-300 to-rose-400",
            EffectSettings::default().with_pitch(2.2).with_formant(1.6),
        ),
    ]
}
