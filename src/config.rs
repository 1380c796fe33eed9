//! Configuration management for MidiMix-Seq
//!
//! Handles loading, validating and saving the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::sequencer::{SeqSettings, DEFAULT_LANE_LENGTH, MAX_LANES, MAX_OFFSET, STEPS_PER_LANE};
use crate::transport::DRIVER_NAMES;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// MIDI driver and port selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MidiConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Substring of the input port name to bind at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    /// Substring of the output port name to bind at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
    #[serde(default)]
    pub note_offset: i16,
    #[serde(default)]
    pub cc_offset: i16,
}

/// Lane layout
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SequencerConfig {
    #[serde(default = "default_lanes")]
    pub lanes: usize,
    #[serde(default = "default_lengths")]
    pub lengths: Vec<usize>,
}

/// Software host timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Internal clock frequency (Hz)
    #[serde(default = "default_clock_hz")]
    pub clock_hz: f32,
    /// Fraction of each clock period spent high
    #[serde(default = "default_clock_pulse_width")]
    pub clock_pulse_width: f32,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            input_port: None,
            output_port: None,
            note_offset: 0,
            cc_offset: 0,
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
            lengths: default_lengths(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            clock_hz: default_clock_hz(),
            clock_pulse_width: default_clock_pulse_width(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let driver = self.midi.driver.to_lowercase();
        if !DRIVER_NAMES.contains(&driver.as_str()) {
            anyhow::bail!(
                "Unknown MIDI driver '{}' (expected one of: {})",
                self.midi.driver,
                DRIVER_NAMES.join(", ")
            );
        }

        for (field, port) in [
            ("input_port", &self.midi.input_port),
            ("output_port", &self.midi.output_port),
        ] {
            if port.as_deref().is_some_and(|p| p.trim().is_empty()) {
                anyhow::bail!("MIDI {} cannot be empty (omit it instead)", field);
            }
        }

        for (field, offset) in [
            ("note_offset", self.midi.note_offset),
            ("cc_offset", self.midi.cc_offset),
        ] {
            if !(-MAX_OFFSET..=MAX_OFFSET).contains(&offset) {
                anyhow::bail!("MIDI {} {} out of range (must be -127..=127)", field, offset);
            }
        }

        let lanes = self.sequencer.lanes;
        if lanes == 0 || lanes > MAX_LANES {
            anyhow::bail!("Sequencer lanes {} out of range (must be 1-{})", lanes, MAX_LANES);
        }
        if self.sequencer.lengths.len() < lanes {
            anyhow::bail!(
                "Sequencer needs {} lane lengths, got {}",
                lanes,
                self.sequencer.lengths.len()
            );
        }
        if self.sequencer.lengths.len() > MAX_LANES {
            anyhow::bail!("At most {} lane lengths can be given", MAX_LANES);
        }
        for (lane, &length) in self.sequencer.lengths.iter().enumerate() {
            if length > STEPS_PER_LANE {
                anyhow::bail!(
                    "Lane {} length {} exceeds {} steps",
                    lane + 1,
                    length,
                    STEPS_PER_LANE
                );
            }
        }

        if self.host.sample_rate == 0 {
            anyhow::bail!("Host sample_rate must be positive");
        }
        if self.host.block_size == 0 {
            anyhow::bail!("Host block_size must be positive");
        }
        if !(self.host.clock_hz.is_finite() && self.host.clock_hz > 0.0) {
            anyhow::bail!("Host clock_hz must be positive");
        }
        if !(self.host.clock_pulse_width > 0.0 && self.host.clock_pulse_width < 1.0) {
            anyhow::bail!("Host clock_pulse_width must be between 0 and 1");
        }

        Ok(())
    }

    /// Module settings for [`crate::sequencer::MidiMixSeq::new`]
    pub fn seq_settings(&self) -> SeqSettings {
        let mut lengths = [DEFAULT_LANE_LENGTH; MAX_LANES];
        for (slot, &length) in lengths.iter_mut().zip(&self.sequencer.lengths) {
            *slot = length;
        }
        SeqSettings {
            lanes: self.sequencer.lanes,
            lengths,
            note_offset: self.midi.note_offset,
            cc_offset: self.midi.cc_offset,
        }
    }
}

// Default value functions
fn default_driver() -> String { "midir".to_string() }
fn default_lanes() -> usize { MAX_LANES }
fn default_lengths() -> Vec<usize> { vec![DEFAULT_LANE_LENGTH; MAX_LANES] }
fn default_sample_rate() -> u32 { 48_000 }
fn default_block_size() -> usize { 64 }
fn default_clock_hz() -> f32 { 8.0 }
fn default_clock_pulse_width() -> f32 { 0.5 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.seq_settings(), SeqSettings::default());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
midi:
  input_port: "MIDI Mix"
  cc_offset: 16
sequencer:
  lanes: 2
  lengths: [4, 0]
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.midi.driver, "midir");
        assert_eq!(config.midi.input_port.as_deref(), Some("MIDI Mix"));
        assert_eq!(config.midi.output_port, None);
        assert_eq!(config.host, HostConfig::default());

        let settings = config.seq_settings();
        assert_eq!(settings.lanes, 2);
        assert_eq!(settings.lengths, [4, 0, DEFAULT_LANE_LENGTH]);
        assert_eq!(settings.cc_offset, 16);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.sequencer.lanes = 4;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sequencer.lengths = vec![8, 9, 8];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sequencer.lanes = 3;
        config.sequencer.lengths = vec![8, 8];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.midi.driver = "jack".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.midi.output_port = Some("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.host.clock_pulse_width = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_driver_name_is_case_insensitive() {
        let mut config = AppConfig::default();
        config.midi.driver = "Loopback".to_string();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = AppConfig::default();
        config.midi.driver = "loopback".to_string();
        config.midi.output_port = Some("Loopback".to_string());
        config.sequencer.lengths = vec![8, 6, 3];
        config.save(&path).await.unwrap();

        let loaded = AppConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        assert!(AppConfig::load(&path).await.is_err());
        let config = AppConfig::load_or_default(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_load_invalid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        tokio::fs::write(&path, "midi: [unclosed").await.unwrap();

        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
