//! Configuration for build profiles and machine-level settings.
//!
//! Two layers with different lifetimes:
//!
//! - `BuildProfile` (per project, `bitflow.json` next to the sources):
//!   top module, stage parallelism, source extension allow-list, board.
//! - [`Settings`] (per machine, `~/.config/bitflow/settings.json`):
//!   Vivado location and the fallback parallelism.
//!
//! # Module Structure
//!
//! - `loader`: profile file reading, writing, and path validation
//! - `validator`: profile parameter validation
//!
//! Precedence when a build starts: CLI flags, then the project profile,
//! then settings, then built-in defaults.

pub mod loader;
pub mod validator;

use log::warn;
use std::fs;
use std::path::PathBuf;

use crate::error::ProfileError;
use crate::models::DEFAULT_JOBS;

/// Machine-level tool settings, distinct from per-project build profiles.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Explicit Vivado executable path; `None` searches PATH
    pub vivado_path: Option<PathBuf>,
    /// Stage parallelism when neither the CLI nor the profile sets one
    pub default_jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            vivado_path: None,
            default_jobs: DEFAULT_JOBS,
        }
    }
}

/// Load global settings, degrading to defaults on any problem.
///
/// A missing file is the common case on first run and is not logged; an
/// unreadable or malformed file is warned about and ignored so a stale
/// settings file can never block a build.
pub fn load_settings() -> Settings {
    let path = match loader::get_global_settings_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("Cannot resolve settings path: {}", e);
            return Settings::default();
        }
    };
    if !path.exists() {
        return Settings::default();
    }
    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings file {}: {}", path.display(), e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Cannot read settings file {}: {}", path.display(), e);
            Settings::default()
        }
    }
}

/// Persist global settings to the standard location.
pub fn save_settings(settings: &Settings) -> Result<(), ProfileError> {
    loader::ensure_settings_dir_exists()?;
    let path = loader::get_global_settings_path()?;
    let json = serde_json::to_string_pretty(settings).map_err(ProfileError::InvalidJson)?;
    fs::write(&path, json).map_err(ProfileError::IoError)?;
    Ok(())
}
