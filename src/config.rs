//! Configuration management (`<config dir>/config.toml`)
//!
//! Settings are stored in TOML in the platform-specific config directory.
//! Every section falls back to its defaults, so a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Tempo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Tempo before any scaling (default: 120)
    #[serde(default = "default_bpm")]
    pub base_bpm: f32,
    /// Factor applied by Tempo Up (default: 1.03)
    #[serde(default = "default_tempo_up")]
    pub tempo_up: f32,
    /// Factor applied by Tempo Down (default: 0.97)
    #[serde(default = "default_tempo_down")]
    pub tempo_down: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MidiConfig {
    /// Output port to connect to on startup
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Play the built-in preview voice when no MIDI port is connected
    #[serde(default = "default_true")]
    pub preview: bool,
}

fn default_bpm() -> f32 {
    crate::sequencer::transport::DEFAULT_BPM
}
fn default_tempo_up() -> f32 {
    1.03
}
fn default_tempo_down() -> f32 {
    0.97
}
fn default_true() -> bool {
    true
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_bpm: default_bpm(),
            tempo_up: default_tempo_up(),
            tempo_down: default_tempo_down(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            preview: default_true(),
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "beatbox").map(|dirs| dirs.config_dir().to_path_buf())
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Format(e.to_string()))
    }

    /// Load from the config directory, falling back to defaults.
    pub fn load() -> Self {
        let Some(dir) = config_dir() else {
            tracing::warn!("No config directory available, using defaults");
            return Self::default();
        };
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self) -> Result<()> {
        let dir = config_dir()
            .ok_or_else(|| Error::Io(std::io::Error::other("no config directory available")))?;
        self.save_to(&dir.join(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Format(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.playback.base_bpm, 120.0);
        assert_eq!(config.playback.tempo_up, 1.03);
        assert_eq!(config.playback.tempo_down, 0.97);
        assert_eq!(config.midi.port, None);
        assert!(config.audio.preview);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [playback]
            base_bpm = 96.0

            [midi]
            port = "IAC Driver Bus 1"
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.base_bpm, 96.0);
        assert_eq!(config.playback.tempo_up, 1.03);
        assert_eq!(config.midi.port.as_deref(), Some("IAC Driver Bus 1"));
        assert!(config.audio.preview);
    }

    #[test]
    fn test_invalid_file_is_format_error() {
        assert!(matches!(
            Config::from_toml_str("playback = 3"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.audio.preview = false;
        config.midi.port = Some("Synth".into());
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
