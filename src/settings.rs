//! Persisted recording settings
//!
//! Stored as JSON in the user config directory. Missing or corrupt
//! files fall back to defaults with a warning; a recording must never
//! be blocked by a bad settings file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::AudioMode;

/// Framerate choices offered to the user, in frames per second.
pub const FRAMERATES: [u32; 4] = [15, 24, 30, 60];

/// Downsize ratio choices offered to the user.
pub const DOWNSIZE_RATIOS: [f64; 4] = [1.00, 0.75, 0.50, 0.33];

/// Recording settings consulted when a capture request is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSettings {
    /// Recording framerate
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Downsize ratio; 1.0 records at native size
    #[serde(default = "default_downsize_ratio")]
    pub downsize_ratio: f64,
    /// Audio sources mixed into the recording
    #[serde(default)]
    pub audio: AudioMode,
    /// Channel count pinned on the audio sources
    #[serde(default = "default_audio_channels")]
    pub audio_channels: u32,
    /// Whether the cursor is drawn into the recording
    #[serde(default = "default_draw_cursor")]
    pub draw_cursor: bool,
}

fn default_framerate() -> u32 {
    30
}

fn default_downsize_ratio() -> f64 {
    1.0
}

fn default_audio_channels() -> u32 {
    2
}

fn default_draw_cursor() -> bool {
    true
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            framerate: default_framerate(),
            downsize_ratio: default_downsize_ratio(),
            audio: AudioMode::None,
            audio_channels: default_audio_channels(),
            draw_cursor: default_draw_cursor(),
        }
    }
}

impl RecordSettings {
    /// Get the path of the settings file
    fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("no user config directory")?;
        Ok(config_dir.join("pipevine").join("settings.json"))
    }

    /// Load settings from disk, or return defaults if unavailable
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(err) => {
                log::warn!("Error loading settings, using defaults: {err:?}");
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Option<Self>> {
        let path = Self::settings_path()?;
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;
        Ok(())
    }
}
