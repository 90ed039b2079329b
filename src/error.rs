//! Unified error type hierarchy for bitflow
//!
//! Provides structured error handling with BuildError for the pipeline
//! taxonomy and ProfileError for configuration files.

use std::io;
use thiserror::Error;

use crate::models::StageKind;

/// Build pipeline errors, one variant per failure class.
///
/// Every variant is fatal to the pipeline: the orchestrator never retries
/// and never continues past a failed step.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("workspace initialization failed: {0}")]
    Workspace(String),

    #[error("top module '{0}' not found in any registered source")]
    TopModuleNotFound(String),

    #[error("{stage} stage failed: {diagnostic}")]
    StageFailed { stage: StageKind, diagnostic: String },

    #[error("artifact emission failed: {0}")]
    Artifact(String),

    #[error("IO error during build: {0}")]
    Io(#[from] io::Error),
}

impl BuildError {
    /// Get a user-facing error message suitable for console display.
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Usage(msg) => format!("Bad invocation: {}", msg),
            BuildError::InvalidPath(msg) => format!("Required path missing: {}", msg),
            BuildError::Workspace(msg) => format!("Could not set up the project workspace: {}", msg),
            BuildError::TopModuleNotFound(module) => format!(
                "The toolchain could not find top module '{}' in the registered sources",
                module
            ),
            BuildError::StageFailed { stage, diagnostic } => {
                format!("The {} stage failed:\n{}", stage, diagnostic)
            }
            BuildError::Artifact(msg) => format!("Could not produce the final artifact: {}", msg),
            BuildError::Io(e) => format!("File operation failed: {}", e),
        }
    }

    /// Name of the pipeline step this error belongs to, for exit messages.
    pub fn step_name(&self) -> &'static str {
        match self {
            BuildError::Usage(_) => "argument validation",
            BuildError::InvalidPath(_) => "input validation",
            BuildError::Workspace(_) => "workspace initialization",
            BuildError::TopModuleNotFound(_) => "synthesis",
            BuildError::StageFailed { .. } => "stage execution",
            BuildError::Artifact(_) => "artifact emission",
            BuildError::Io(_) => "io",
        }
    }
}

/// Project profile and settings file errors.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in profile: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Profile validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during profile operations: {0}")]
    IoError(#[from] io::Error),
}

// Profile problems surface at the CLI boundary as bad input.
impl From<ProfileError> for BuildError {
    fn from(e: ProfileError) -> Self {
        BuildError::Usage(e.to_string())
    }
}

/// Top-level result type for operations that may fail.
/// Use this as the return type for coarse call sites and `main`.
/// Example: `fn risky_operation() -> Result<String>`
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
