//! Build profile validation.

use crate::boards;
use crate::error::ProfileError;
use crate::models::BuildProfile;

/// Upper bound on stage parallelism. Vivado refuses larger values anyway.
const MAX_JOBS: usize = 256;

/// Validate the top module name (HDL identifier rules).
///
/// Whether the module actually exists in the sources is only discovered at
/// synthesis; this check catches names that can never be valid.
pub fn validate_top_module(top: &str) -> Result<(), ProfileError> {
    if top.is_empty() {
        return Err(ProfileError::ValidationFailed(
            "Top module name cannot be empty".to_string(),
        ));
    }

    let first = top.chars().next().unwrap_or('_');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(ProfileError::ValidationFailed(format!(
            "Top module name must start with a letter or underscore, got: {}",
            top
        )));
    }

    if !top
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(ProfileError::ValidationFailed(format!(
            "Top module name '{}' contains invalid characters. \
             Names must be alphanumeric with underscores or dollar signs",
            top
        )));
    }

    Ok(())
}

/// Validate the source extension allow-list.
///
/// Extensions are stored without the leading dot; matching at collection
/// time is case-insensitive.
pub fn validate_source_extensions(extensions: &[String]) -> Result<(), ProfileError> {
    if extensions.is_empty() {
        return Err(ProfileError::ValidationFailed(
            "At least one source extension is required".to_string(),
        ));
    }

    for ext in extensions {
        if ext.is_empty() {
            return Err(ProfileError::ValidationFailed(
                "Source extension cannot be empty".to_string(),
            ));
        }

        if ext.starts_with('.') {
            return Err(ProfileError::ValidationFailed(format!(
                "Source extension '{}' must be given without the leading dot",
                ext
            )));
        }

        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProfileError::ValidationFailed(format!(
                "Source extension '{}' contains invalid characters",
                ext
            )));
        }
    }

    Ok(())
}

/// Validate stage parallelism (0 means all CPUs, resolved at build time).
pub fn validate_jobs(jobs: usize) -> Result<(), ProfileError> {
    if jobs > MAX_JOBS {
        return Err(ProfileError::ValidationFailed(format!(
            "Stage parallelism {} exceeds the maximum of {}",
            jobs, MAX_JOBS
        )));
    }
    Ok(())
}

/// Validate the board reference against the built-in catalog.
pub fn validate_board(board: &str) -> Result<(), ProfileError> {
    if boards::get_board(board).is_none() {
        return Err(ProfileError::ValidationFailed(format!(
            "Unknown board '{}'. Available boards: {}",
            board,
            boards::board_names().join(", ")
        )));
    }
    Ok(())
}

/// Comprehensive validation of all profile params.
pub fn validate_profile(profile: &BuildProfile) -> Result<(), ProfileError> {
    validate_top_module(&profile.top_module)?;
    validate_source_extensions(&profile.source_extensions)?;
    validate_jobs(profile.jobs)?;
    if let Some(board) = &profile.board {
        validate_board(board)?;
    }
    Ok(())
}
