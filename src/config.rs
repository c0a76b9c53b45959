// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{BitratePreset, recording};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::EncodingQuality;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "viewfinder";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where photos are written
    pub photos_dir: PathBuf,
    /// Where recordings are written
    pub videos_dir: PathBuf,
    /// Recording framerate
    pub framerate: u32,
    /// Still image quality
    pub jpeg_quality: EncodingQuality,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
    /// V4L2 device index (`/dev/video<N>`)
    pub camera_index: usize,
    /// Requested capture width
    pub capture_width: u32,
    /// Requested capture height
    pub capture_height: u32,
    /// Zoom applied when the viewfinder starts
    pub initial_zoom: f32,
    /// Stabilization state when the viewfinder starts
    pub stabilization_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            photos_dir: storage::default_photos_dir(),
            videos_dir: storage::default_videos_dir(),
            framerate: recording::FRAMERATE,
            jpeg_quality: EncodingQuality::default(),
            bitrate_preset: BitratePreset::default(), // Default to Medium
            camera_index: 0,
            capture_width: 1280,
            capture_height: 720,
            initial_zoom: 1.0,
            stabilization_enabled: false,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Read a config file; missing fields take their defaults
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            debug!("No config directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            storage::ensure_dir(parent)
                .map_err(|e| AppError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }
}
