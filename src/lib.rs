//! bitflow FPGA Build Orchestrator
//!
//! This crate drives a Vivado-class FPGA toolchain through the fixed bitstream
//! pipeline: validate the request, create the project workspace, collect RTL
//! sources, attach constraints, bind the top module, then run synthesis and
//! implementation before emitting the bitstream artifact. It exposes a Rust
//! API consumed by the `bitflow` command-line frontend.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Core data structures and types
//! - **boards**: Built-in development board catalog
//! - **sources**: Recursive RTL source collection
//! - **config**: Build profile and settings management
//! - **scaffold**: New-project skeleton generation
//! - **log_collector**: Session and per-stage log capture
//! - **toolchain**: Toolchain abstraction plus the Vivado and stub bindings
//! - **orchestrator**: Async pipeline coordination and state management

// Core foundational modules
pub mod error;
pub mod models;

// Development board catalog (part numbers, clock pins)
pub mod boards;

// Recursive RTL source discovery
pub mod sources;

// Build profile and per-machine settings management
pub mod config;

// New-project skeleton generation
pub mod scaffold;

// Robust, decoupled logging system
pub mod log_collector;

// Toolchain abstraction and concrete bindings
pub mod toolchain;

// Pipeline coordination and async state management
pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

// Re-export log collector for use throughout the system
pub use log_collector::{BuildLog, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

// Re-export error types for easy access
pub use error::{BuildError, ProfileError, Result};

// Re-export model types for easy access
pub use models::{
    Artifact,
    BuildProfile,
    // Build structs
    BuildRequest,
    SourceSet,
    // Enums
    StageKind,
    StageOutcome,
};

// Re-export the board catalog entry type
pub use boards::BoardProfile;

// Re-export toolchain abstraction and bindings
pub use toolchain::{ProjectHandle, StageJob, StageReport, StubToolchain, Toolchain, VivadoToolchain};

// Re-export orchestrator and state management
pub use orchestrator::{BuildOrchestrator, PipelineState, StageState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
