//! Configuration
//!
//! All knobs live in one serde struct that loads from JSON. Every section has
//! defaults, so an empty object `{}` is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::dsp::RenderOptions;
use crate::error::{Result, VoxError};
use crate::session::CaptureConstraints;

/// Level meter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Meter polling period in milliseconds
    pub meter_interval_ms: u64,
    /// Number of bins published per level frame
    pub meter_bins: usize,
    /// Analysis window length (power of two)
    pub fft_size: usize,
    /// Weight of the previous frame, in [0, 1)
    pub smoothing: f32,
    /// Level mapped to 0.0
    pub min_decibels: f32,
    /// Level mapped to 1.0
    pub max_decibels: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            meter_interval_ms: 100,
            meter_bins: 64,
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.meter_interval_ms == 0 {
            return Err(VoxError::invalid_param(
                "session.meter_interval_ms",
                self.meter_interval_ms,
                "> 0",
            ));
        }
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(VoxError::invalid_param(
                "session.fft_size",
                self.fft_size,
                "a power of two >= 32",
            ));
        }
        if self.meter_bins == 0 || self.meter_bins > self.fft_size / 2 {
            return Err(VoxError::invalid_param(
                "session.meter_bins",
                self.meter_bins,
                format!("1 to {}", self.fft_size / 2),
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(VoxError::invalid_param(
                "session.smoothing",
                self.smoothing,
                "0.0 <= smoothing < 1.0",
            ));
        }
        if self.min_decibels.is_nan()
            || self.max_decibels.is_nan()
            || self.min_decibels >= self.max_decibels
        {
            return Err(VoxError::invalid_param(
                "session.min_decibels",
                self.min_decibels,
                format!("less than max_decibels ({})", self.max_decibels),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxConfig {
    pub session: SessionConfig,
    pub capture: CaptureConstraints,
    pub render: RenderOptions,
}

impl VoxConfig {
    /// Load and validate a JSON configuration file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: VoxConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        if self.capture.sample_rate == 0 {
            return Err(VoxError::invalid_param("capture.sample_rate", 0, "> 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = VoxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.meter_bins, 64);
        assert_eq!(config.capture.sample_rate, 44100);
        assert!(config.render.reverb_seed.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: VoxConfig =
            serde_json::from_str(r#"{ "session": { "meter_interval_ms": 20 } }"#).unwrap();
        assert_eq!(config.session.meter_interval_ms, 20);
        assert_eq!(config.session.fft_size, 256);
    }

    #[test]
    fn test_rejects_too_many_bins() {
        let mut config = VoxConfig::default();
        config.session.meter_bins = 200;
        assert!(matches!(
            config.validate(),
            Err(VoxError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_decibel_range() {
        let mut config = VoxConfig::default();
        config.session.min_decibels = -20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voxshift.json");
        let mut config = VoxConfig::default();
        config.render.reverb_seed = Some(11);
        config.save(&path).unwrap();

        let loaded = VoxConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
