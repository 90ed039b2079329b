//! Core data types for bitflow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::BuildError;

/// Default stage parallelism. Passed through to the toolchain, never used
/// to schedule anything in-process.
pub const DEFAULT_JOBS: usize = 4;

/// Default top module for projects without a profile.
pub const DEFAULT_TOP_MODULE: &str = "top";

/// Recognized RTL suffixes when no profile overrides them (no leading dot).
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["v", "sv"];

/// Positional argument order for the `build` command. Quoted verbatim in
/// usage errors so a bad invocation always shows the expected order.
pub const BUILD_USAGE: &str =
    "build <project_name> <target_part> <rtl_dir> <xdc_file|\"\"> <proj_dir>";

/// Build stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Synthesis,
    Implementation,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Synthesis => "synthesis",
            StageKind::Implementation => "implementation",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "synthesis" => Ok(StageKind::Synthesis),
            "implementation" => Ok(StageKind::Implementation),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// Terminal result reported by the toolchain for one stage job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Succeeded,
    Failed,
}

/// One build invocation, constructed once from CLI-style arguments and
/// immutable afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub project_name: String,         // Project id and artifact stem
    pub part: String,                 // Target device, e.g. xc7a35tcpg236-1
    pub rtl_dir: PathBuf,             // Source root, traversed recursively
    pub constraints: Option<PathBuf>, // Pin/timing constraints, None = none
    pub out_dir: PathBuf,             // Workspace and artifact directory
}

impl BuildRequest {
    /// Build a request from positional arguments in the documented order.
    ///
    /// Arity and non-emptiness of name/part are checked here, before any
    /// filesystem access; path existence is the orchestrator's job. An empty
    /// constraints argument maps to `None` ("build without constraints").
    ///
    /// # Arguments
    /// * `args` - positional arguments, program and subcommand name excluded
    pub fn from_args(args: &[String]) -> Result<Self, BuildError> {
        if args.len() < 5 {
            return Err(BuildError::Usage(format!(
                "expected 5 arguments, got {}. Usage: {}",
                args.len(),
                BUILD_USAGE
            )));
        }
        if args[0].is_empty() {
            return Err(BuildError::Usage(format!(
                "project name must not be empty. Usage: {}",
                BUILD_USAGE
            )));
        }
        if args[1].is_empty() {
            return Err(BuildError::Usage(format!(
                "target part must not be empty. Usage: {}",
                BUILD_USAGE
            )));
        }
        let constraints = if args[3].is_empty() {
            None
        } else {
            Some(PathBuf::from(&args[3]))
        };
        Ok(BuildRequest {
            project_name: args[0].clone(),
            part: args[1].clone(),
            rtl_dir: PathBuf::from(&args[2]),
            constraints,
            out_dir: PathBuf::from(&args[4]),
        })
    }

    /// Deterministic artifact path: `<out_dir>/<project_name>.<extension>`.
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.out_dir
            .join(format!("{}.{}", self.project_name, extension))
    }
}

/// Discovered design files: deduplicated, sorted for stable registration
/// order, read-only after collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSet {
    files: Vec<PathBuf>,
}

impl SourceSet {
    /// Build a set from collected paths. Sorts and drops exact duplicates;
    /// callers are expected to pass canonicalized paths.
    pub fn new(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        SourceSet { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path)
    }
}

/// Final output file plus its observed state after the pipeline completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf, // Emitted bitstream
}

impl Artifact {
    pub fn new(path: PathBuf) -> Self {
        Artifact { path }
    }

    /// Whether the emitted file is actually present on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Per-project build profile (`bitflow.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildProfile {
    pub top_module: String,             // Root of the compiled hierarchy
    pub jobs: usize,                    // Stage parallelism, 0 = logical CPUs
    pub source_extensions: Vec<String>, // RTL suffix allow-list, no dots
    pub board: Option<String>,          // Board catalog key
}

impl Default for BuildProfile {
    fn default() -> Self {
        BuildProfile {
            top_module: DEFAULT_TOP_MODULE.to_string(),
            jobs: DEFAULT_JOBS,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            board: None,
        }
    }
}

impl BuildProfile {
    /// Resolve the effective job count. `0` means all logical CPUs.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_args_too_few_enumerates_order() {
        let err = BuildRequest::from_args(&args(&["add3", "xc7a35tcpg236-1"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("<project_name>"));
        assert!(msg.contains("<target_part>"));
        assert!(msg.contains("<rtl_dir>"));
        assert!(msg.contains("<proj_dir>"));
    }

    #[test]
    fn test_from_args_empty_constraints_is_none() {
        let req =
            BuildRequest::from_args(&args(&["add3", "partX", "rtl", "", "build"])).unwrap();
        assert!(req.constraints.is_none());
    }

    #[test]
    fn test_from_args_constraints_preserved() {
        let req = BuildRequest::from_args(&args(&[
            "add3",
            "partX",
            "rtl",
            "constraints/basys3.xdc",
            "build",
        ]))
        .unwrap();
        assert_eq!(
            req.constraints.as_deref(),
            Some(Path::new("constraints/basys3.xdc"))
        );
    }

    #[test]
    fn test_from_args_empty_name_rejected() {
        let err = BuildRequest::from_args(&args(&["", "partX", "rtl", "", "build"])).unwrap_err();
        assert!(matches!(err, BuildError::Usage(_)));
    }

    #[test]
    fn test_artifact_path_is_deterministic() {
        let req =
            BuildRequest::from_args(&args(&["add3", "partX", "rtl", "", "/proj/out"])).unwrap();
        assert_eq!(req.artifact_path("bit"), PathBuf::from("/proj/out/add3.bit"));
    }

    #[test]
    fn test_source_set_sorts_and_dedups() {
        let set = SourceSet::new(vec![
            PathBuf::from("/rtl/b.v"),
            PathBuf::from("/rtl/a.sv"),
            PathBuf::from("/rtl/b.v"),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.files()[0], PathBuf::from("/rtl/a.sv"));
        assert!(set.contains(Path::new("/rtl/b.v")));
    }

    #[test]
    fn test_stage_kind_round_trip() {
        assert_eq!(StageKind::Synthesis.to_string(), "synthesis");
        assert_eq!(
            "implementation".parse::<StageKind>().unwrap(),
            StageKind::Implementation
        );
        assert!("routing".parse::<StageKind>().is_err());
    }

    #[test]
    fn test_effective_jobs_zero_means_cpus() {
        let profile = BuildProfile {
            jobs: 0,
            ..Default::default()
        };
        assert!(profile.effective_jobs() >= 1);
        let fixed = BuildProfile::default();
        assert_eq!(fixed.effective_jobs(), DEFAULT_JOBS);
    }
}
