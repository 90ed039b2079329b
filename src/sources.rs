//! Recursive RTL source discovery.
//!
//! Walks the source root with an explicit work-list and a visited set keyed
//! by canonical path, so symlink cycles terminate and unreadable directories
//! degrade to a warning instead of aborting the build.

use log::warn;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::models::SourceSet;

/// Collect design files under `root` whose extension case-insensitively
/// matches one of `extensions` (no leading dots).
///
/// Matching is by entry name; registered paths are canonical, so two links
/// to the same file collapse to one entry. Zero matches is not an error at
/// this stage — synthesis fails downstream if nothing was registered.
///
/// # Arguments
/// * `root` - directory to traverse; must exist and be a directory
/// * `extensions` - suffix allow-list, e.g. `["v", "sv"]`
pub fn collect_sources(root: &Path, extensions: &[String]) -> Result<SourceSet, BuildError> {
    if !root.is_dir() {
        return Err(BuildError::InvalidPath(format!(
            "RTL directory '{}' does not exist or is not a directory",
            root.display()
        )));
    }

    let canonical_root = root.canonicalize().map_err(|e| {
        BuildError::InvalidPath(format!(
            "cannot resolve RTL directory '{}': {}",
            root.display(),
            e
        ))
    })?;

    let mut pending: VecDeque<PathBuf> = VecDeque::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut found: Vec<PathBuf> = Vec::new();
    pending.push_back(canonical_root);

    while let Some(dir) = pending.pop_front() {
        // Second sighting of a canonical dir means a link cycle.
        if !visited.insert(dir.clone()) {
            continue;
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping unreadable directory '{}': {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under '{}': {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let canonical = match path.canonicalize() {
                Ok(canonical) => canonical,
                Err(e) => {
                    // Dangling symlink or a racing delete.
                    warn!("Skipping '{}': {}", path.display(), e);
                    continue;
                }
            };
            if canonical.is_dir() {
                pending.push_back(canonical);
            } else if matches_extension(&path, extensions) {
                found.push(canonical);
            }
        }
    }

    Ok(SourceSet::new(found))
}

/// Case-insensitive extension match against the allow-list.
fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext,
        None => return false,
    };
    extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_collects_nested_matches_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sv"), "module a; endmodule").unwrap();
        fs::write(dir.path().join("b.v"), "module b; endmodule").unwrap();
        fs::write(dir.path().join("c.txt"), "notes").unwrap();
        fs::create_dir(dir.path().join("ip")).unwrap();
        fs::write(dir.path().join("ip").join("d.sv"), "module d; endmodule").unwrap();
        fs::write(dir.path().join("ip").join("readme.md"), "docs").unwrap();

        let set = collect_sources(dir.path(), &exts(&["v", "sv"])).unwrap();
        assert_eq!(set.len(), 3);
        let names: Vec<String> = set
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"a.sv".to_string()));
        assert!(names.contains(&"b.v".to_string()));
        assert!(names.contains(&"d.sv".to_string()));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("TOP.SV"), "module top; endmodule").unwrap();
        fs::write(dir.path().join("alu.V"), "module alu; endmodule").unwrap();

        let set = collect_sources(dir.path(), &exts(&["v", "sv"])).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_files_without_extension_excluded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Makefile"), "all:").unwrap();

        let set = collect_sources(dir.path(), &exts(&["v", "sv"])).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "empty project").unwrap();

        let set = collect_sources(dir.path(), &exts(&["v", "sv"])).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_root_is_invalid_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does_not_exist");
        let err = collect_sources(&missing, &exts(&["v"])).unwrap_err();
        assert!(matches!(err, BuildError::InvalidPath(_)));
    }

    #[test]
    fn test_file_root_is_invalid_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("top.sv");
        fs::write(&file, "module top; endmodule").unwrap();
        let err = collect_sources(&file, &exts(&["v", "sv"])).unwrap_err();
        assert!(matches!(err, BuildError::InvalidPath(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("core");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("core.sv"), "module core; endmodule").unwrap();
        std::os::unix::fs::symlink(dir.path(), sub.join("loop")).unwrap();

        let set = collect_sources(dir.path(), &exts(&["sv"])).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_link_and_target_collapse_to_one() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real.sv");
        fs::write(&real, "module real_m; endmodule").unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("alias.sv")).unwrap();

        let set = collect_sources(dir.path(), &exts(&["sv"])).unwrap();
        assert_eq!(set.len(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            // Any casing of an allow-listed suffix matches.
            #[test]
            fn prop_allowlisted_suffix_matches_any_case(ext in "[sS][vV]") {
                let dir = TempDir::new().unwrap();
                fs::write(
                    dir.path().join(format!("core.{}", ext)),
                    "module core; endmodule",
                )
                .unwrap();
                let set = collect_sources(dir.path(), &exts(&["sv"])).unwrap();
                prop_assert_eq!(set.len(), 1);
            }

            // A suffix outside the allow-list is never collected.
            #[test]
            fn prop_unlisted_suffix_never_collected(ext in "[a-z]{1,4}") {
                prop_assume!(!ext.eq_ignore_ascii_case("v") && !ext.eq_ignore_ascii_case("sv"));
                let dir = TempDir::new().unwrap();
                fs::write(dir.path().join(format!("core.{}", ext)), "text").unwrap();
                let set = collect_sources(dir.path(), &exts(&["v", "sv"])).unwrap();
                prop_assert!(set.is_empty());
            }
        }
    }
}
