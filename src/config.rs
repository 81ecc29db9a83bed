//! User settings, read once at startup from
//! `$XDG_CONFIG_HOME/zestbay/canvas.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arrange::CanvasConstraints;
use crate::error::SceneError;
use crate::filter::FilterSettings;
use crate::graph::StereoPatterns;
use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::naming::NamingPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub naming: NamingPolicy,

    /// Keep a2j / Midi-Bridge hardware ports in one bridge group
    #[serde(default = "Settings::default_group_bridged_hardware")]
    pub group_bridged_hardware: bool,

    /// Delay before an emptied group is destroyed
    #[serde(default = "Settings::default_grace_window_ms")]
    pub grace_window_ms: u64,

    #[serde(default = "Settings::default_history_depth")]
    pub history_depth: usize,

    #[serde(default)]
    pub canvas: CanvasConstraints,

    #[serde(default)]
    pub stereo: StereoPatterns,

    #[serde(default)]
    pub filter: FilterSettings,
}

impl Settings {
    fn default_group_bridged_hardware() -> bool {
        false
    }
    fn default_grace_window_ms() -> u64 {
        200
    }
    fn default_history_depth() -> usize {
        DEFAULT_HISTORY_DEPTH
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("zestbay").join("canvas.json"))
    }

    /// Settings from the user config file, or defaults if it is missing or
    /// unreadable.
    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("No config directory, using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => {
                log::info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
        };
        match Self::from_json(&text) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SceneError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            naming: NamingPolicy::default(),
            group_bridged_hardware: Self::default_group_bridged_hardware(),
            grace_window_ms: Self::default_grace_window_ms(),
            history_depth: Self::default_history_depth(),
            canvas: CanvasConstraints::default(),
            stereo: StereoPatterns::default(),
            filter: FilterSettings::default(),
        }
    }
}
