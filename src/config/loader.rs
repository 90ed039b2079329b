//! Profile file loader and serialization.

use crate::error::ProfileError;
use crate::models::BuildProfile;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-project profile file name, written by `bitflow new` and read by
/// `bitflow build --profile`.
pub const PROFILE_FILE_NAME: &str = "bitflow.json";

/// Get the global settings path: ~/.config/bitflow/settings.json
pub fn get_global_settings_path() -> Result<PathBuf, ProfileError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ProfileError::ValidationFailed("Cannot determine home directory".to_string())
    })?;

    let config_dir = home.join(".config/bitflow");
    Ok(config_dir.join("settings.json"))
}

/// Ensure the global settings directory exists
pub fn ensure_settings_dir_exists() -> Result<(), ProfileError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ProfileError::ValidationFailed("Cannot determine home directory".to_string())
    })?;

    let config_dir = home.join(".config/bitflow");
    fs::create_dir_all(&config_dir).map_err(ProfileError::IoError)?;
    Ok(())
}

/// Load a build profile from a JSON file.
pub fn load_profile_from_file(path: &Path) -> Result<BuildProfile, ProfileError> {
    validate_profile_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProfileError::FileNotFound(format!("Profile file not found at: {}", path.display()))
        } else {
            ProfileError::IoError(e)
        }
    })?;

    let profile: BuildProfile = serde_json::from_str(&content).map_err(ProfileError::InvalidJson)?;

    Ok(profile)
}

/// Save a build profile to a JSON file.
pub fn save_profile_to_file(profile: &BuildProfile, path: &Path) -> Result<(), ProfileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(ProfileError::IoError)?;
        }
    }

    let json_content = serde_json::to_string_pretty(profile).map_err(ProfileError::InvalidJson)?;

    fs::write(path, json_content).map_err(ProfileError::IoError)?;

    Ok(())
}

/// Default profile: top module "top", four jobs, `.v`/`.sv` sources.
pub fn create_default_profile() -> BuildProfile {
    BuildProfile::default()
}

/// Validate profile path (.json extension required).
pub fn validate_profile_path(path: &Path) -> Result<(), ProfileError> {
    if path.as_os_str().is_empty() {
        return Err(ProfileError::ValidationFailed(
            "Profile path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => {}
        Some(ext) => {
            return Err(ProfileError::ValidationFailed(format!(
                "Profile file must have .json extension, got .{}",
                ext.to_string_lossy()
            )))
        }
        None => {
            return Err(ProfileError::ValidationFailed(
                "Profile file must have .json extension".to_string(),
            ))
        }
    }

    if path.to_str().is_none() {
        return Err(ProfileError::ValidationFailed(
            "Profile path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}
