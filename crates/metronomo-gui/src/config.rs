//! Application config persistence

use std::path::PathBuf;
use std::time::Duration;

use metronomo_core::Configuration;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub(crate) struct AppConfig {
    /// Configuration the metronome starts with
    #[serde(default)]
    pub metronome: Configuration,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct DisplayConfig {
    /// Width of one measure cell in points
    #[serde(default = "DisplayConfig::default_cell_width")]
    pub cell_width: f32,
    #[serde(default = "DisplayConfig::default_pulse_ms")]
    pub pulse_ms: u64,
}

impl DisplayConfig {
    fn default_cell_width() -> f32 {
        metronomo_core::visual::DEFAULT_CELL_WIDTH
    }

    fn default_pulse_ms() -> u64 {
        metronomo_core::visual::PULSE_DURATION.as_millis() as u64
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cell_width: Self::default_cell_width(),
            pulse_ms: Self::default_pulse_ms(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct AudioConfig {
    #[serde(default = "AudioConfig::default_enabled")]
    pub enabled: bool,
}

impl AudioConfig {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: Self::default_enabled() }
    }
}

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("metronomo")
        .join("config.toml")
}

pub(crate) fn parse_config(s: &str) -> AppConfig {
    match toml::from_str(s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring invalid config file: {}", e);
            AppConfig::default()
        }
    }
}

pub(crate) fn load_config() -> AppConfig {
    let path = config_path();
    std::fs::read_to_string(&path)
        .ok()
        .map(|s| parse_config(&s))
        .unwrap_or_default()
}

pub(crate) fn save_config(config: &AppConfig) {
    let path = config_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(s) = toml::to_string_pretty(config) else { return };
    if let Err(e) = std::fs::write(&path, s) {
        tracing::warn!("Failed to save config to {}: {}", path.display(), e);
    }
}
