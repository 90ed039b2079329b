//! Vivado batch-mode binding.
//!
//! Every stage is a fresh `vivado -mode batch -source <script>.tcl`
//! invocation. Generated scripts live under `<project dir>/scripts/`,
//! verbatim tool output under `<project dir>/logs/`. Stage scripts `error`
//! out when the run's PROGRESS property is short of 100%, so a failed run
//! always exits non-zero even though batch mode itself would not.

use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use crate::error::BuildError;
use crate::log_collector::{stage_log_path, BuildLog};
use crate::models::{StageKind, StageOutcome};
use crate::orchestrator::executor::run_tool_process;

use super::{ProjectHandle, StageJob, StageReport, Toolchain};

/// Executable resolved through `PATH` unless overridden.
const VIVADO_EXECUTABLE: &str = "vivado";

const SYNTH_RUN: &str = "synth_1";
const IMPL_RUN: &str = "impl_1";

// Shape check only; the tool validates the part against its device database.
static PART_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+(-[a-zA-Z0-9]+)*$").expect("part pattern is valid"));

/// Drives AMD/Xilinx Vivado through generated batch scripts.
pub struct VivadoToolchain {
    executable: PathBuf,              // binary name or an absolute path
    collector: Option<Arc<BuildLog>>, // session log sink
}

impl VivadoToolchain {
    pub fn new() -> Self {
        VivadoToolchain {
            executable: PathBuf::from(VIVADO_EXECUTABLE),
            collector: None,
        }
    }

    /// Use a specific Vivado binary instead of searching `PATH`.
    pub fn with_executable(path: &Path) -> Self {
        VivadoToolchain {
            executable: path.to_path_buf(),
            collector: None,
        }
    }

    pub fn with_collector(mut self, collector: Arc<BuildLog>) -> Self {
        self.collector = Some(collector);
        self
    }

    fn executable_available(&self) -> bool {
        if self.executable.components().count() > 1 {
            return self.executable.is_file();
        }
        match std::env::var_os("PATH") {
            Some(paths) => {
                std::env::split_paths(&paths).any(|dir| dir.join(&self.executable).is_file())
            }
            None => false,
        }
    }

    fn write_stage_script(
        &self,
        project: &ProjectHandle,
        file_name: &str,
        content: &str,
    ) -> Result<PathBuf, BuildError> {
        let scripts_dir = project.dir().join("scripts");
        fs::create_dir_all(&scripts_dir).map_err(|e| {
            BuildError::Workspace(format!(
                "Failed to create script directory {}: {}",
                scripts_dir.display(),
                e
            ))
        })?;
        let path = scripts_dir.join(file_name);
        fs::write(&path, content).map_err(|e| {
            BuildError::Workspace(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    fn batch_command(&self, project: &ProjectHandle, script: &Path) -> Command {
        let mut command = Command::new(&self.executable);
        command.current_dir(project.dir());
        command.args(["-mode", "batch", "-source"]);
        command.arg(script);
        command
    }
}

impl Default for VivadoToolchain {
    fn default() -> Self {
        VivadoToolchain::new()
    }
}

fn project_file(project: &ProjectHandle) -> PathBuf {
    project.dir().join(format!("{}.xpr", project.name()))
}

/// Script for the synthesis stage. Creates the on-disk project from the
/// handle's filesets, then launches and gates on `synth_1`.
fn synthesis_script(project: &ProjectHandle, jobs: usize) -> String {
    let mut tcl = String::new();
    tcl.push_str(&format!(
        "# bitflow synthesis script for project {}\n\n",
        project.name()
    ));
    tcl.push_str(&format!(
        "create_project -force {{{}}} {{{}}} -part {{{}}}\n\n",
        project.name(),
        project.dir().display(),
        project.part()
    ));

    tcl.push_str("# Design sources\n");
    for source in project.sources() {
        tcl.push_str(&format!("add_files {{{}}}\n", source.display()));
    }
    for constraints in project.constraints() {
        tcl.push_str(&format!(
            "add_files -fileset constrs_1 {{{}}}\n",
            constraints.display()
        ));
    }
    tcl.push('\n');

    tcl.push_str("update_compile_order -fileset sources_1\n");
    if let Some(top) = project.top_module() {
        tcl.push_str(&format!("set_property top {} [current_fileset]\n", top));
    }
    tcl.push('\n');

    tcl.push_str(&format!("launch_runs {} -jobs {}\n", SYNTH_RUN, jobs));
    tcl.push_str(&format!("wait_on_run {}\n", SYNTH_RUN));
    tcl.push_str(&format!(
        "if {{[get_property PROGRESS [get_runs {run}]] != \"100%\"}} {{\n    error \"Run {run} did not complete\"\n}}\n",
        run = SYNTH_RUN
    ));
    tcl
}

/// Script for the implementation stage. Reopens the project written by the
/// synthesis invocation.
fn implementation_script(project: &ProjectHandle, jobs: usize) -> String {
    let mut tcl = String::new();
    tcl.push_str(&format!(
        "# bitflow implementation script for project {}\n\n",
        project.name()
    ));
    tcl.push_str(&format!(
        "open_project {{{}}}\n\n",
        project_file(project).display()
    ));
    tcl.push_str(&format!("launch_runs {} -jobs {}\n", IMPL_RUN, jobs));
    tcl.push_str(&format!("wait_on_run {}\n", IMPL_RUN));
    tcl.push_str(&format!(
        "if {{[get_property PROGRESS [get_runs {run}]] != \"100%\"}} {{\n    error \"Run {run} did not complete\"\n}}\n",
        run = IMPL_RUN
    ));
    tcl
}

/// Script that writes the bitstream for a routed design.
fn bitstream_script(project: &ProjectHandle, artifact: &Path) -> String {
    let mut tcl = String::new();
    tcl.push_str(&format!(
        "# bitflow bitstream script for project {}\n\n",
        project.name()
    ));
    tcl.push_str(&format!(
        "open_project {{{}}}\n",
        project_file(project).display()
    ));
    tcl.push_str(&format!("open_run {}\n", IMPL_RUN));
    tcl.push_str(&format!(
        "write_bitstream -force {{{}}}\n",
        artifact.display()
    ));
    tcl
}

#[async_trait]
impl Toolchain for VivadoToolchain {
    fn name(&self) -> &str {
        "vivado"
    }

    fn create_project(
        &self,
        name: &str,
        part: &str,
        dir: &Path,
    ) -> Result<ProjectHandle, BuildError> {
        if !PART_PATTERN.is_match(part) {
            return Err(BuildError::Workspace(format!(
                "Target part '{}' is not a valid Vivado part identifier",
                part
            )));
        }
        if !self.executable_available() {
            return Err(BuildError::Workspace(format!(
                "Vivado executable '{}' not found; install Vivado or point --vivado at it",
                self.executable.display()
            )));
        }
        for sub in ["scripts", "logs"] {
            let path = dir.join(sub);
            fs::create_dir_all(&path).map_err(|e| {
                BuildError::Workspace(format!("Failed to create {}: {}", path.display(), e))
            })?;
        }
        info!("Created Vivado project '{}' targeting part {}", name, part);
        Ok(ProjectHandle::new(name, part, dir))
    }

    fn register_source(&self, project: &mut ProjectHandle, file: &Path) -> Result<(), BuildError> {
        debug!("Registering design source {}", file.display());
        project.add_source(file);
        Ok(())
    }

    fn register_constraints(
        &self,
        project: &mut ProjectHandle,
        file: &Path,
    ) -> Result<(), BuildError> {
        debug!("Registering constraints file {}", file.display());
        project.add_constraints(file);
        Ok(())
    }

    fn set_top_module(&self, project: &mut ProjectHandle, top: &str) -> Result<(), BuildError> {
        // Existence of the module is only discovered when synthesis elaborates
        // the design.
        project.set_top(top);
        Ok(())
    }

    fn run_stage(
        &self,
        project: &ProjectHandle,
        stage: StageKind,
        jobs: usize,
    ) -> Result<StageJob, BuildError> {
        let script = match stage {
            StageKind::Synthesis => synthesis_script(project, jobs),
            StageKind::Implementation => implementation_script(project, jobs),
        };
        let script_path =
            self.write_stage_script(project, &format!("{}.tcl", stage.as_str()), &script)?;
        let stage_log = stage_log_path(project.dir(), stage.as_str());
        let command = self.batch_command(project, &script_path);
        let collector = self.collector.clone();

        info!("Launching Vivado {} run with {} jobs", stage, jobs);
        let handle = tokio::spawn(async move {
            let report = run_tool_process(command, stage.as_str(), &stage_log, collector)
                .await
                .map_err(|message| BuildError::StageFailed {
                    stage,
                    diagnostic: message,
                })?;
            let outcome = if report.failed() {
                StageOutcome::Failed
            } else {
                StageOutcome::Succeeded
            };
            Ok(StageReport {
                stage,
                outcome,
                diagnostics: report.diagnostics,
            })
        });
        Ok(StageJob::new(stage, handle))
    }

    async fn emit_artifact(
        &self,
        project: &ProjectHandle,
        force: bool,
    ) -> Result<PathBuf, BuildError> {
        let artifact = project.dir().join(format!(
            "{}.{}",
            project.name(),
            self.artifact_extension()
        ));
        if artifact.exists() {
            if !force {
                return Err(BuildError::Artifact(format!(
                    "Artifact already exists: {} (overwrite disabled)",
                    artifact.display()
                )));
            }
            info!("Overwriting existing artifact {}", artifact.display());
        }

        let script = bitstream_script(project, &artifact);
        let script_path = self.write_stage_script(project, "bitstream.tcl", &script)?;
        let stage_log = stage_log_path(project.dir(), "bitstream");
        let command = self.batch_command(project, &script_path);

        let report = run_tool_process(command, "bitstream", &stage_log, self.collector.clone())
            .await
            .map_err(BuildError::Artifact)?;
        if report.failed() {
            let diagnostic = if report.diagnostics.is_empty() {
                "no diagnostic output captured".to_string()
            } else {
                report.diagnostics.join("\n")
            };
            return Err(BuildError::Artifact(format!(
                "Bitstream write failed: {}",
                diagnostic
            )));
        }
        if !artifact.is_file() {
            return Err(BuildError::Artifact(format!(
                "Toolchain reported success but artifact is missing: {}",
                artifact.display()
            )));
        }
        info!("Artifact written to {}", artifact.display());
        Ok(artifact)
    }
}
