// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/qr-scanner/config.json`. A missing
//! file yields defaults; a malformed one is reported and replaced by
//! defaults in memory (the file itself is left untouched).

use crate::constants::{APP_ID, analysis, capture};
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera device node; `None` picks the first capture device
    pub camera_path: Option<String>,
    /// Requested capture width
    pub capture_width: u32,
    /// Requested capture height
    pub capture_height: u32,
    /// Long-edge limit for frames handed to the decoder
    pub analysis_max_dimension: u32,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_path: None,
            capture_width: capture::DEFAULT_WIDTH,
            capture_height: capture::DEFAULT_HEIGHT,
            analysis_max_dimension: analysis::MAX_DIMENSION,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join("config.json"))
    }

    /// Load the config from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                warn!("No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Load from `path`, reporting I/O and parse errors
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config.sanitized())
    }

    /// Write the config as pretty-printed JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Clamp values that would make the pipeline useless
    fn sanitized(mut self) -> Self {
        if self.analysis_max_dimension < analysis::MIN_DIMENSION {
            warn!(
                value = self.analysis_max_dimension,
                min = analysis::MIN_DIMENSION,
                "analysis_max_dimension too small, clamping"
            );
            self.analysis_max_dimension = analysis::MIN_DIMENSION;
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            self.capture_width = capture::DEFAULT_WIDTH;
            self.capture_height = capture::DEFAULT_HEIGHT;
        }
        self
    }
}
