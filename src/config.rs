//! Configuration management for the tone engine
//!
//! This module provides runtime configuration loading from JSON files,
//! so stream options, parameter smoothing, and meter ballistics can be
//! adjusted without recompilation. Every section falls back to its
//! defaults, so a config file only needs the keys it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{AudioError, ErrorCode};

/// Environment variable naming an alternative config file on desktop.
pub const CONFIG_PATH_ENV: &str = "TONE_ENGINE_CONFIG";

/// Default config location on desktop platforms.
pub const DEFAULT_CONFIG_PATH: &str = "assets/engine_config.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: EngineOptions,
    pub synth: SynthConfig,
    pub metering: MeteringConfig,
}

/// Requested stream options.
///
/// These are requests: the backend reports the format it actually opened
/// as a [`crate::audio::StreamFormat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Number of input channels; 0 disables the input stream
    pub input_channels: u16,
    /// Number of output channels
    pub output_channels: u16,
    /// Preferred callback size in frames
    pub buffer_size_in_frames: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            input_channels: 1,
            output_channels: 2,
            buffer_size_in_frames: 512,
        }
    }
}

/// Tone generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// One-pole time constant applied to frequency and amplitude changes
    pub parameter_smoothing_ms: f32,
    /// Upper frequency bound; the Nyquist frequency also applies
    pub max_frequency_hz: f32,
    /// Frequency target before the first write
    pub initial_frequency_hz: f32,
    /// Amplitude target before the first write
    pub initial_amplitude: f32,
    /// Slots in the UI -> audio control FIFO
    pub control_fifo_capacity: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            parameter_smoothing_ms: 20.0,
            max_frequency_hz: 20_000.0,
            initial_frequency_hz: 440.0,
            initial_amplitude: 0.0,
            control_fifo_capacity: 64,
        }
    }
}

/// Level meter ballistics and polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Per-buffer smoothing coefficient while the level rises
    pub attack: f32,
    /// Per-buffer smoothing coefficient while the level falls
    pub release: f32,
    /// Slots in each audio -> UI meter FIFO
    pub meter_fifo_capacity: usize,
    /// Poll interval for `update()`; two frames at 60 Hz
    pub update_interval_ms: u64,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            attack: 0.8,
            release: 0.1,
            meter_fifo_capacity: 32,
            update_interval_ms: 33,
        }
    }
}

impl EngineOptions {
    /// Check that the requested options can be handed to a backend.
    pub fn validate(&self) -> Result<(), AudioError> {
        if !self.sample_rate.is_finite() || !(8_000.0..=384_000.0).contains(&self.sample_rate) {
            return Err(invalid(format!(
                "sample_rate must be within 8000-384000 Hz (got {})",
                self.sample_rate
            )));
        }
        if self.output_channels == 0 || self.output_channels > 8 {
            return Err(invalid(format!(
                "output_channels must be within 1-8 (got {})",
                self.output_channels
            )));
        }
        if self.input_channels > 8 {
            return Err(invalid(format!(
                "input_channels must be within 0-8 (got {})",
                self.input_channels
            )));
        }
        if self.buffer_size_in_frames == 0 || self.buffer_size_in_frames > 16_384 {
            return Err(invalid(format!(
                "buffer_size_in_frames must be within 1-16384 (got {})",
                self.buffer_size_in_frames
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), AudioError> {
        self.audio.validate()?;

        let synth = &self.synth;
        if !synth.parameter_smoothing_ms.is_finite() || synth.parameter_smoothing_ms < 0.0 {
            return Err(invalid(format!(
                "parameter_smoothing_ms must be >= 0 (got {})",
                synth.parameter_smoothing_ms
            )));
        }
        if !synth.max_frequency_hz.is_finite() || synth.max_frequency_hz <= 0.0 {
            return Err(invalid(format!(
                "max_frequency_hz must be > 0 (got {})",
                synth.max_frequency_hz
            )));
        }
        if !synth.initial_frequency_hz.is_finite() || !synth.initial_amplitude.is_finite() {
            return Err(invalid("initial tone parameters must be finite".to_string()));
        }
        if synth.control_fifo_capacity == 0 {
            return Err(invalid("control_fifo_capacity must be > 0".to_string()));
        }

        let metering = &self.metering;
        for (name, value) in [("attack", metering.attack), ("release", metering.release)] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(invalid(format!(
                    "meter {} must be within (0, 1] (got {})",
                    name, value
                )));
            }
        }
        if metering.meter_fifo_capacity == 0 {
            return Err(invalid("meter_fifo_capacity must be > 0".to_string()));
        }
        if metering.update_interval_ms == 0 {
            return Err(invalid("update_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults when the file is missing,
    /// unparsable, or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(err) => {
                        log::warn!(
                            "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                            path.as_ref(),
                            err.message()
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration on Android.
    ///
    /// Bundled assets are only reachable through the AssetManager, which the
    /// engine does not hold, so the defaults are used.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from_file(path)
    }

    /// Load configuration for the current platform.
    pub fn load_platform() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::load_android()
        }

        #[cfg(not(target_os = "android"))]
        {
            Self::load()
        }
    }
}

fn invalid(reason: String) -> AudioError {
    AudioError::InvalidOptions { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.audio.sample_rate, 44_100.0);
        assert_eq!(config.audio.output_channels, 2);
        assert_eq!(config.synth.control_fifo_capacity, 64);
        assert_eq!(config.metering.update_interval_ms, 33);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "audio": { "sample_rate": 48000.0 } }"#).unwrap();
        assert_eq!(parsed.audio.sample_rate, 48_000.0);
        assert_eq!(parsed.audio.buffer_size_in_frames, 512);
        assert_eq!(parsed.synth, SynthConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let mut options = EngineOptions::default();
        options.output_channels = 0;
        assert!(matches!(
            options.validate(),
            Err(AudioError::InvalidOptions { .. })
        ));

        let mut options = EngineOptions::default();
        options.sample_rate = f32::NAN;
        assert!(options.validate().is_err());

        let mut options = EngineOptions::default();
        options.buffer_size_in_frames = 0;
        assert!(options.validate().is_err());

        let mut options = EngineOptions::default();
        options.input_channels = 0;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_meter_ballistics() {
        let mut config = AppConfig::default();
        config.metering.release = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.metering.attack = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "synth": {{ "parameter_smoothing_ms": 5.0 }}, "metering": {{ "update_interval_ms": 16 }} }}"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path());
        assert_eq!(config.synth.parameter_smoothing_ms, 5.0);
        assert_eq!(config.metering.update_interval_ms, 16);
    }

    #[test]
    fn test_load_from_missing_or_invalid_file_falls_back() {
        let config = AppConfig::load_from_file("/nonexistent/engine_config.json");
        assert_eq!(config, AppConfig::default());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "audio": {{ "output_channels": 0 }} }}"#).unwrap();
        assert_eq!(AppConfig::load_from_file(file.path()), AppConfig::default());
    }
}
