//! External synthesis/implementation toolchain abstraction.
//!
//! The orchestrator drives any engine through the [`Toolchain`] trait:
//! create a project, register files, launch a stage, wait for its terminal
//! outcome, emit the artifact. Project state travels in an explicit
//! [`ProjectHandle`]; no binding keeps an ambient "current project" behind
//! the caller's back.

pub mod stub;
pub mod vivado;

pub use stub::StubToolchain;
pub use vivado::VivadoToolchain;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use crate::error::BuildError;
use crate::models::{StageKind, StageOutcome};

/// Project state threaded through every toolchain call.
///
/// Owns the two filesets. Design sources and constraints are never mixed:
/// downstream tools dispatch on fileset kind.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    name: String,
    part: String,
    dir: PathBuf,
    sources: Vec<PathBuf>,
    constraints: Vec<PathBuf>,
    top_module: Option<String>,
}

impl ProjectHandle {
    pub(crate) fn new(name: &str, part: &str, dir: &Path) -> Self {
        ProjectHandle {
            name: name.to_string(),
            part: part.to_string(),
            dir: dir.to_path_buf(),
            sources: Vec::new(),
            constraints: Vec::new(),
            top_module: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Registered design sources, in registration order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Registered constraints files, in registration order.
    pub fn constraints(&self) -> &[PathBuf] {
        &self.constraints
    }

    pub fn top_module(&self) -> Option<&str> {
        self.top_module.as_deref()
    }

    pub(crate) fn add_source(&mut self, file: &Path) {
        self.sources.push(file.to_path_buf());
    }

    pub(crate) fn add_constraints(&mut self, file: &Path) {
        self.constraints.push(file.to_path_buf());
    }

    pub(crate) fn set_top(&mut self, top: &str) {
        self.top_module = Some(top.to_string());
    }
}

/// Terminal report for one stage job.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: StageKind,
    pub outcome: StageOutcome,
    /// Toolchain error output retained for failure surfacing
    pub diagnostics: Vec<String>,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == StageOutcome::Succeeded
    }
}

/// In-flight stage job: created by `run_stage`, consumed by `wait`.
///
/// Wraps the spawned task's join handle. There is no cancellation path -
/// dropping the job does not stop the underlying toolchain process.
pub struct StageJob {
    stage: StageKind,
    handle: JoinHandle<Result<StageReport, BuildError>>,
}

impl StageJob {
    pub(crate) fn new(stage: StageKind, handle: JoinHandle<Result<StageReport, BuildError>>) -> Self {
        StageJob { stage, handle }
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub(crate) async fn join(self) -> Result<StageReport, BuildError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(BuildError::StageFailed {
                stage: self.stage,
                diagnostic: format!("stage task failed to complete: {}", e),
            }),
        }
    }
}

/// Capability set every concrete synthesis/implementation engine exposes.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Binding name for logs.
    fn name(&self) -> &str;

    /// Initialize an empty project bound to a name and target part.
    ///
    /// Fails with [`BuildError::Workspace`] when the part identifier is
    /// rejected or the project directory cannot be set up.
    fn create_project(
        &self,
        name: &str,
        part: &str,
        dir: &Path,
    ) -> Result<ProjectHandle, BuildError>;

    /// Register one design source with the project's design fileset.
    fn register_source(
        &self,
        project: &mut ProjectHandle,
        file: &Path,
    ) -> Result<(), BuildError>;

    /// Register a constraints file with the separately-tagged constraints
    /// fileset.
    fn register_constraints(
        &self,
        project: &mut ProjectHandle,
        file: &Path,
    ) -> Result<(), BuildError>;

    /// Bind the design's top-level entry point.
    ///
    /// Whether the module exists is only discovered at synthesis time; this
    /// call records the binding without inspecting sources.
    fn set_top_module(&self, project: &mut ProjectHandle, top: &str) -> Result<(), BuildError>;

    /// Launch a stage as an asynchronous job with the given parallelism
    /// degree. Returns immediately with a handle for [`Toolchain::wait`].
    fn run_stage(
        &self,
        project: &ProjectHandle,
        stage: StageKind,
        jobs: usize,
    ) -> Result<StageJob, BuildError>;

    /// Block until the stage job reaches a terminal outcome.
    async fn wait(&self, job: StageJob) -> Result<StageReport, BuildError> {
        job.join().await
    }

    /// Produce the final artifact at `<project dir>/<project name>.<ext>`,
    /// overwriting any pre-existing file when `force` is set.
    async fn emit_artifact(
        &self,
        project: &ProjectHandle,
        force: bool,
    ) -> Result<PathBuf, BuildError>;

    /// Extension of the artifact this binding emits.
    fn artifact_extension(&self) -> &'static str {
        "bit"
    }
}
