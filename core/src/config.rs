//! Capture and durability configuration.
//!
//! Every field has a default, so an empty or partial JSON document is a
//! valid config. Unknown keys are ignored.

use crate::error::{LocationError, LocationResult};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub const DEFAULT_SAVE_PERIOD_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LocationConfig {
    /// Master switch for tick capture.
    pub track_player_location: bool,
    pub save_mount:            bool,
    pub save_time:             bool,
    pub save_bgm:              bool,
    /// Scene membership capture. Also gates periodic flushing.
    pub save_layout:           bool,
    pub save_festivals:        bool,
    pub save_vfx:              bool,
    pub periodic_saving:       bool,
    pub save_period_secs:      u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            track_player_location: true,
            save_mount:            true,
            save_time:             true,
            save_bgm:              true,
            save_layout:           true,
            save_festivals:        true,
            save_vfx:              true,
            periodic_saving:       true,
            save_period_secs:      DEFAULT_SAVE_PERIOD_SECS,
        }
    }
}

impl LocationConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> LocationResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| LocationError::Config {
            path:    path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save_period(&self) -> Duration {
        Duration::from_secs(self.save_period_secs)
    }

    /// Periodic flushes only run when layout capture is on as well.
    pub fn periodic_flush_enabled(&self) -> bool {
        self.periodic_saving && self.save_layout
    }
}
