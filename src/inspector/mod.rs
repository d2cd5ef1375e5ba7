//! Test target selection.
//!
//! The inspector turns raw change notifications into the smallest set of
//! targets worth handing to the test runner:
//!
//! - duplicates and blank entries are dropped
//! - only existing `*.m` test files under a test root, or directories at or
//!   under a root, survive
//! - anything in the exclusion set is dropped
//! - paths nested two or more levels under another surviving path collapse
//!   into that path
//!
//! Targets are opaque strings throughout; nothing is canonicalized.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use walkdir::WalkDir;

/// Extension of OCUnit test sources.
const TEST_FILE_EXTENSION: &str = "m";

pub struct Inspector {
    test_paths: Vec<String>,
    excluded: HashSet<String>,
    folder_pattern: Option<Regex>,
}

impl Inspector {
    /// Create an inspector for the given test roots.
    ///
    /// `exclude` is a glob expanded once, right here; files created later are
    /// not excluded. Fails only when the glob itself is malformed.
    pub fn new(test_paths: Vec<String>, exclude: Option<&str>) -> Result<Self> {
        let mut inspector = Self {
            test_paths: Vec::new(),
            excluded: HashSet::new(),
            folder_pattern: None,
        };
        inspector.set_test_paths(test_paths);
        inspector.set_excluded(exclude)?;
        Ok(inspector)
    }

    pub fn test_paths(&self) -> &[String] {
        &self.test_paths
    }

    /// Excluded files, sorted for stable display.
    pub fn excluded(&self) -> Vec<String> {
        let mut excluded: Vec<String> = self.excluded.iter().cloned().collect();
        excluded.sort();
        excluded
    }

    pub fn set_test_paths(&mut self, test_paths: Vec<String>) {
        self.folder_pattern = folder_pattern(&test_paths);
        self.test_paths = test_paths;
    }

    /// Replace the exclusion set with the files matching `pattern`.
    pub fn set_excluded(&mut self, pattern: Option<&str>) -> Result<()> {
        self.excluded = match pattern {
            Some(pattern) if !pattern.is_empty() => expand_glob(pattern)?,
            _ => HashSet::new(),
        };
        Ok(())
    }

    /// Reduce `paths` to valid, non-redundant test targets.
    ///
    /// Order follows the first occurrence of each path in the input. The
    /// on-disk test file list is built at most once per call and dropped
    /// when the call returns.
    pub fn clean<S: AsRef<str>>(&self, paths: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        let candidates: Vec<&str> = paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty() && seen.insert(*p))
            .collect();

        let mut test_files: Option<HashSet<String>> = None;
        let valid: Vec<&str> = candidates
            .into_iter()
            .filter(|path| self.should_run(path, &mut test_files))
            .collect();

        let cleaned: Vec<String> = valid
            .iter()
            .filter(|path| !included_in_other_path(path, &valid))
            .map(|path| path.to_string())
            .collect();

        tracing::debug!(input = paths.len(), output = cleaned.len(), "cleaned paths");
        cleaned
    }

    fn should_run(&self, path: &str, test_files: &mut Option<HashSet<String>>) -> bool {
        if self.excluded.contains(path) {
            return false;
        }
        let files = test_files.get_or_insert_with(|| self.discover_test_files());
        files.contains(path) || self.is_test_folder(path)
    }

    fn is_test_folder(&self, path: &str) -> bool {
        self.folder_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(path))
    }

    /// Every `*.m` file currently under any test root, symlinks followed.
    fn discover_test_files(&self) -> HashSet<String> {
        self.test_paths
            .iter()
            .flat_map(|root| {
                WalkDir::new(root)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .filter(|entry| {
                        entry.path().extension().and_then(|e| e.to_str())
                            == Some(TEST_FILE_EXTENSION)
                    })
                    .map(|entry| entry.path().to_string_lossy().into_owned())
            })
            .collect()
    }
}

/// `^(root1|root2)[^.]*$`: a root itself or anything below it without a dot.
fn folder_pattern(test_paths: &[String]) -> Option<Regex> {
    if test_paths.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = test_paths.iter().map(|p| regex::escape(p)).collect();
    Regex::new(&format!(r"^({})[^.]*$", alternatives.join("|"))).ok()
}

fn expand_glob(pattern: &str) -> Result<HashSet<String>> {
    let entries = glob::glob(pattern)
        .with_context(|| format!("Invalid exclude pattern: {}", pattern))?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|path| path.to_string_lossy().into_owned())
        .collect())
}

/// True when another path is a prefix of `path` and the rest still holds a
/// separator. `Tests` swallows `Tests/A.m`; `Tests/` does not.
fn included_in_other_path(path: &str, paths: &[&str]) -> bool {
    paths.iter().any(|other| {
        *other != path
            && path
                .strip_prefix(other)
                .is_some_and(|remainder| remainder.contains('/'))
    })
}
