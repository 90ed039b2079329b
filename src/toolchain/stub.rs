//! In-process binding that fabricates stage outcomes.
//!
//! Backs `--dry-run` and the pipeline tests. Every trait call is recorded
//! for later inspection, stage jobs complete without launching an external
//! process, and the emitted artifact is a placeholder file that honors the
//! real path and overwrite contract.

use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::BuildError;
use crate::models::{StageKind, StageOutcome};

use super::{ProjectHandle, StageJob, StageReport, Toolchain};

#[derive(Debug, Clone)]
struct ScriptedOutcome {
    outcome: StageOutcome,
    diagnostics: Vec<String>,
}

/// Toolchain double with scriptable per-stage outcomes.
pub struct StubToolchain {
    calls: Mutex<Vec<String>>,
    outcomes: Mutex<HashMap<StageKind, ScriptedOutcome>>,
}

impl StubToolchain {
    /// A stub where every stage succeeds.
    pub fn new() -> Self {
        StubToolchain {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    /// Script `stage` to fail with the given diagnostic lines.
    pub fn failing(self, stage: StageKind, diagnostics: &[&str]) -> Self {
        self.outcomes.lock().unwrap().insert(
            stage,
            ScriptedOutcome {
                outcome: StageOutcome::Failed,
                diagnostics: diagnostics.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    /// Every trait call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted(&self, stage: StageKind) -> ScriptedOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .get(&stage)
            .cloned()
            .unwrap_or(ScriptedOutcome {
                outcome: StageOutcome::Succeeded,
                diagnostics: Vec::new(),
            })
    }
}

impl Default for StubToolchain {
    fn default() -> Self {
        StubToolchain::new()
    }
}

#[async_trait]
impl Toolchain for StubToolchain {
    fn name(&self) -> &str {
        "stub"
    }

    fn create_project(
        &self,
        name: &str,
        part: &str,
        dir: &Path,
    ) -> Result<ProjectHandle, BuildError> {
        self.record(format!("create_project {} {}", name, part));
        Ok(ProjectHandle::new(name, part, dir))
    }

    fn register_source(&self, project: &mut ProjectHandle, file: &Path) -> Result<(), BuildError> {
        self.record(format!("register_source {}", file.display()));
        project.add_source(file);
        Ok(())
    }

    fn register_constraints(
        &self,
        project: &mut ProjectHandle,
        file: &Path,
    ) -> Result<(), BuildError> {
        self.record(format!("register_constraints {}", file.display()));
        project.add_constraints(file);
        Ok(())
    }

    fn set_top_module(&self, project: &mut ProjectHandle, top: &str) -> Result<(), BuildError> {
        self.record(format!("set_top_module {}", top));
        project.set_top(top);
        Ok(())
    }

    fn run_stage(
        &self,
        project: &ProjectHandle,
        stage: StageKind,
        jobs: usize,
    ) -> Result<StageJob, BuildError> {
        self.record(format!("run_stage {} jobs={}", stage, jobs));
        info!(
            "Simulated {} run for project '{}' ({} jobs)",
            stage,
            project.name(),
            jobs
        );
        let scripted = self.scripted(stage);
        let handle = tokio::spawn(async move {
            Ok(StageReport {
                stage,
                outcome: scripted.outcome,
                diagnostics: scripted.diagnostics,
            })
        });
        Ok(StageJob::new(stage, handle))
    }

    async fn emit_artifact(
        &self,
        project: &ProjectHandle,
        force: bool,
    ) -> Result<PathBuf, BuildError> {
        self.record(format!("emit_artifact force={}", force));
        let artifact = project.dir().join(format!(
            "{}.{}",
            project.name(),
            self.artifact_extension()
        ));
        if artifact.exists() && !force {
            return Err(BuildError::Artifact(format!(
                "Artifact already exists: {} (overwrite disabled)",
                artifact.display()
            )));
        }
        let placeholder = format!("bitflow placeholder bitstream for {}\n", project.name());
        fs::write(&artifact, placeholder).map_err(|e| {
            BuildError::Artifact(format!("Failed to write {}: {}", artifact.display(), e))
        })?;
        Ok(artifact)
    }
}
