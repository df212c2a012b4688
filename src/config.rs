//! Configuration loading and management.
//!
//! Configuration is loaded with the following precedence:
//! 1. Environment variables (`STEPREEL_*`)
//! 2. Config file (`~/.stepreel/config.toml`)
//! 3. Defaults

use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Step segmentation configuration.
    pub recording: RecordingConfig,

    /// Payload and field bounds.
    pub limits: LimitsConfig,

    /// Screenshot capture configuration.
    pub capture: CaptureConfig,

    /// Slideshow export configuration.
    pub export: ExportConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted step record.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_home(),
        }
    }
}

/// Step segmentation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Gap between events, in milliseconds, after which a new step opens.
    pub step_gap_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self { step_gap_ms: 3000 }
    }
}

/// Payload and field bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum serialized size of a step sequence.
    pub max_payload_bytes: usize,

    /// Maximum characters kept for `tagName`, `className`, `id` and `value`.
    pub max_field_chars: usize,

    /// Maximum characters kept for `textContent`.
    pub max_text_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 5_242_880,
            max_field_chars: 1000,
            max_text_chars: 100,
        }
    }
}

/// Screenshot capture configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// JPEG quality, 0-100.
    pub quality: u8,

    /// Deadline for a single capture.
    pub timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            timeout_ms: 2000,
        }
    }
}

/// Slideshow export configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Document title.
    pub title: String,

    /// Default output file name.
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "Tutorial Slideshow".to_string(),
            file_name: "tutorial.html".to_string(),
        }
    }
}

/// Get the default stepreel home directory.
///
/// Uses `STEPREEL_HOME` if set, otherwise `~/.stepreel`.
#[must_use]
pub fn default_home() -> PathBuf {
    if let Ok(home) = env::var("STEPREEL_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir().map_or_else(|| PathBuf::from(".stepreel"), |h| h.join(".stepreel"))
}

/// Load configuration with precedence: env vars → file → defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    let config_path = get_config_path();
    if config_path.exists() {
        let contents = fs::read_to_string(&config_path).map_err(Error::Storage)?;
        config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the path to the config file.
fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("STEPREEL_CONFIG") {
        return PathBuf::from(path);
    }

    default_home().join("config.toml")
}

/// Parse an environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Apply environment variable overrides to config.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = env::var("STEPREEL_STORAGE_PATH") {
        config.storage.path = PathBuf::from(path);
    } else if let Ok(home) = env::var("STEPREEL_HOME") {
        config.storage.path = PathBuf::from(home);
    }

    if let Some(gap) = env_parse("STEPREEL_STEP_GAP_MS") {
        config.recording.step_gap_ms = gap;
    }

    if let Some(max) = env_parse("STEPREEL_MAX_PAYLOAD_BYTES") {
        config.limits.max_payload_bytes = max;
    }

    if let Some(quality) = env_parse::<u8>("STEPREEL_CAPTURE_QUALITY") {
        config.capture.quality = quality.min(100);
    }

    if let Some(ms) = env_parse("STEPREEL_CAPTURE_TIMEOUT_MS") {
        config.capture.timeout_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.recording.step_gap_ms, 3000);
        assert_eq!(config.limits.max_payload_bytes, 5_242_880);
        assert_eq!(config.limits.max_field_chars, 1000);
        assert_eq!(config.limits.max_text_chars, 100);
        assert_eq!(config.capture.quality, 80);
        assert_eq!(config.export.file_name, "tutorial.html");
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
            [recording]
            step_gap_ms = 5000

            [limits]
            max_payload_bytes = 1024

            [capture]
            quality = 60
            timeout_ms = 500

            [export]
            title = "Onboarding"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.recording.step_gap_ms, 5000);
        assert_eq!(config.limits.max_payload_bytes, 1024);
        assert_eq!(config.capture.quality, 60);
        assert_eq!(config.capture.timeout_ms, 500);
        assert_eq!(config.export.title, "Onboarding");
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml = r"
            [limits]
            max_text_chars = 40
        ";

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.limits.max_text_chars, 40);
        assert_eq!(config.limits.max_field_chars, 1000); // Default
        assert_eq!(config.recording.step_gap_ms, 3000); // Default
        assert_eq!(config.export.file_name, "tutorial.html"); // Default
    }
}
