//! Pipeline step execution: request validation, workspace preparation,
//! toolchain process driving, output streaming.
//!
//! Integrates with the logging pipeline via BuildLog for:
//! - Verbatim persistence of toolchain output per stage
//! - Milestone extraction (run launches, phase completions)
//! - Bounded diagnostic tails feeding stage failures

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::BuildError;
use crate::log_collector::BuildLog;
use crate::models::{BuildRequest, StageKind};

/// Maximum number of diagnostic lines retained for a failed stage.
const DIAGNOSTIC_TAIL: usize = 25;

static ERROR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ERROR:\s").expect("error-line pattern is valid"));

static CRITICAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CRITICAL WARNING:\s").expect("critical-line pattern is valid"));

static TOP_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)top(?:\s+module|\s+design)?\s+'?([A-Za-z0-9_$]+)'?\s+(?:was\s+)?not\s+found")
        .expect("top-not-found pattern is valid")
});

// A well-formed part unknown to the device database is only rejected when
// the stage script runs create_project, so it shows up in stage diagnostics.
static PART_REJECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[coretcl 2-1173\]|invalid option value\s+'[^']*'\s+specified for 'part'")
        .expect("part-rejected pattern is valid")
});

static PERCENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(\d+)%\]").expect("percent pattern is valid"));

/// Verifies the request's required paths.
///
/// The RTL directory must exist and be a directory. The optional constraints
/// path is deliberately not checked here; see [`resolve_constraints`].
pub fn validate_request(request: &BuildRequest) -> Result<(), BuildError> {
    if !request.rtl_dir.exists() {
        return Err(BuildError::InvalidPath(format!(
            "RTL directory not found: {}",
            request.rtl_dir.display()
        )));
    }
    if !request.rtl_dir.is_dir() {
        return Err(BuildError::InvalidPath(format!(
            "RTL path exists but is not a directory: {}",
            request.rtl_dir.display()
        )));
    }
    Ok(())
}

/// Resolve the optional constraints file.
///
/// A missing or non-file constraints path degrades to "no constraints" with
/// a warning. This leniency is intentional and distinct from the hard
/// RTL-directory check.
pub fn resolve_constraints(request: &BuildRequest) -> Option<PathBuf> {
    let path = request.constraints.as_ref()?;
    if path.is_file() {
        Some(path.clone())
    } else {
        warn!(
            "Constraints file '{}' not found, building without constraints",
            path.display()
        );
        None
    }
}

/// Create the output directory tree for the build.
///
/// Reused if already present. A collision with a non-directory file or a
/// permission failure is a fatal workspace error.
pub fn prepare_workspace(request: &BuildRequest) -> Result<(), BuildError> {
    if request.out_dir.exists() && !request.out_dir.is_dir() {
        return Err(BuildError::Workspace(format!(
            "Output path exists but is not a directory: {}",
            request.out_dir.display()
        )));
    }
    std::fs::create_dir_all(&request.out_dir).map_err(|e| {
        BuildError::Workspace(format!(
            "Failed to create output directory {}: {}",
            request.out_dir.display(),
            e
        ))
    })?;
    Ok(())
}

/// Resolve the effective stage parallelism.
///
/// `0` means all logical CPUs. The value is passed through to the toolchain;
/// over-subscription is allowed but warned about.
pub fn resolve_jobs(jobs: usize) -> usize {
    let cpus = num_cpus::get();
    let resolved = if jobs == 0 { cpus } else { jobs };
    if resolved > cpus {
        warn!(
            "Requested {} stage jobs but only {} logical CPUs are available",
            resolved, cpus
        );
    }
    resolved
}

/// Map a failed stage's diagnostics to the most specific error.
///
/// A missing top module is only detectable from the toolchain's own output
/// at synthesis time, so it is classified here rather than caught earlier.
/// The same deferral applies to a well-formed but unknown part: the shape
/// check at project creation cannot consult the device database, so the
/// tool's own rejection is mapped back to a workspace error here. A part
/// rejection aborts project creation before elaboration, which makes it
/// the root cause wherever it sits in the tail.
pub fn classify_stage_failure(stage: StageKind, diagnostics: &[String]) -> BuildError {
    for line in diagnostics {
        if PART_REJECTED.is_match(line) {
            return BuildError::Workspace(format!("Toolchain rejected the target part: {}", line));
        }
    }
    for line in diagnostics {
        if let Some(caps) = TOP_NOT_FOUND.captures(line) {
            return BuildError::TopModuleNotFound(caps[1].to_string());
        }
    }
    let diagnostic = if diagnostics.is_empty() {
        "no diagnostic output captured".to_string()
    } else {
        diagnostics.join("\n")
    };
    BuildError::StageFailed { stage, diagnostic }
}

/// Parses coarse progress markers from toolchain output.
///
/// Returns progress based on:
/// 1. Known stage milestones (elaboration, report writing, routing)
/// 2. [%] percentage patterns
fn parse_stage_progress(line: &str) -> Option<u32> {
    if line.contains("Starting synth_design") {
        return Some(10);
    }
    if line.contains("Finished RTL Elaboration") {
        return Some(40);
    }
    if line.contains("Finished Writing Synthesis Report") {
        return Some(95);
    }
    if line.contains("Starting Routing Task") {
        return Some(60);
    }
    if line.contains("Routing Is Done") {
        return Some(90);
    }
    if line.contains("Writing bitstream") {
        return Some(95);
    }

    if let Some(caps) = PERCENT_MARKER.captures(line) {
        if let Ok(progress) = caps[1].parse::<u32>() {
            return Some(progress.min(100));
        }
    }

    None
}

/// Result of one toolchain process invocation.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    /// Process exited with status zero
    pub success: bool,
    /// Exit code if the process was not killed by a signal
    pub exit_code: Option<i32>,
    /// An `ERROR:` marker was seen in the output
    pub fatal_marker: bool,
    /// Bounded tail of ERROR/CRITICAL WARNING lines
    pub diagnostics: Vec<String>,
}

impl ProcessReport {
    /// Whether the invocation counts as a failed stage.
    pub fn failed(&self) -> bool {
        !self.success || self.fatal_marker
    }
}

/// Run one toolchain process to completion, streaming its output.
///
/// Spawns the command with piped stdout/stderr and pumps both streams
/// line-by-line: every line is echoed to the console and persisted to the
/// stage log; diagnostic lines are retained in a bounded tail. There is no
/// cancellation path - once launched, the process runs to exit.
///
/// # Arguments
/// * `command` - fully configured command (program, args, cwd)
/// * `label` - name for console echoes, e.g. "synthesis" or "bitstream"
/// * `stage_log` - file receiving the verbatim output
/// * `collector` - optional logging pipeline for persistence
///
/// # Returns
/// * `Ok(ProcessReport)` once the process exited, success or not
/// * `Err(message)` only if it could not be spawned or waited on; callers
///   wrap the message into the step-appropriate error
pub async fn run_tool_process(
    mut command: Command,
    label: &str,
    stage_log: &Path,
    collector: Option<Arc<BuildLog>>,
) -> Result<ProcessReport, String> {
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| format!("Failed to spawn toolchain process: {}", e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "Failed to capture stdout".to_string())?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| "Failed to capture stderr".to_string())?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let mut diagnostics: VecDeque<String> = VecDeque::new();
    let mut fatal_marker = false;
    let mut stdout_closed = false;
    let mut stderr_closed = false;
    let mut exited: Option<std::process::ExitStatus> = None;

    let absorb = |line: &str,
                  diagnostics: &mut VecDeque<String>,
                  fatal_marker: &mut bool| {
        eprintln!("[{}] {}", label, line);
        if let Some(ref collector) = collector {
            collector.tool_line(stage_log, line);
            if let Some(progress) = parse_stage_progress(line) {
                collector.log_str(format!("[{}] progress {}%: {}", label, progress, line));
            }
        }
        if ERROR_LINE.is_match(line) {
            *fatal_marker = true;
        }
        if ERROR_LINE.is_match(line) || CRITICAL_LINE.is_match(line) {
            if diagnostics.len() == DIAGNOSTIC_TAIL {
                diagnostics.pop_front();
            }
            diagnostics.push_back(line.to_string());
        }
    };

    loop {
        if stdout_closed && stderr_closed {
            break;
        }

        tokio::select! {
            line_result = stdout_lines.next_line(), if !stdout_closed => {
                match line_result {
                    Ok(Some(line)) => absorb(&line, &mut diagnostics, &mut fatal_marker),
                    Ok(None) => stdout_closed = true,
                    Err(e) => {
                        eprintln!("[{}] stdout read error: {}", label, e);
                        stdout_closed = true;
                    }
                }
            }
            line_result = stderr_lines.next_line(), if !stderr_closed => {
                match line_result {
                    Ok(Some(line)) => absorb(&line, &mut diagnostics, &mut fatal_marker),
                    Ok(None) => stderr_closed = true,
                    Err(e) => {
                        eprintln!("[{}] stderr read error: {}", label, e);
                        stderr_closed = true;
                    }
                }
            }
        }

        // The process can exit while a grandchild still holds the pipes open.
        match child.try_wait() {
            Ok(Some(status)) => {
                exited = Some(status);
                if stdout_closed && stderr_closed {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                return Err(format!("Failed to check process status: {}", e));
            }
        }
    }

    let status = match exited {
        Some(status) => status,
        None => child
            .wait()
            .await
            .map_err(|e| format!("Failed to wait for process: {}", e))?,
    };

    if !status.success() && diagnostics.is_empty() {
        let exit_msg = match status.code() {
            Some(code) => format!("toolchain exited with code {}", code),
            None => "toolchain terminated by signal".to_string(),
        };
        diagnostics.push_back(exit_msg);
    }

    Ok(ProcessReport {
        success: status.success(),
        exit_code: status.code(),
        fatal_marker,
        diagnostics: diagnostics.into_iter().collect(),
    })
}
