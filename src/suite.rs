// src/suite.rs

//! Exercise suite files.
//!
//! A suite is the test input for one exercise:
//!
//! ```yaml
//! id: variables_basic
//! title: Working with Variables
//! solution: solution.py        # optional, relative to this file
//! timeout_seconds: 3           # optional
//! tests:
//!   - test: "assert isinstance(name, str)"
//!     expected: ""
//!   - test: "print(greet('Ada'))"
//!     expected: "Hello, Ada!"
//! ```
//!
//! JSON files with the same shape are accepted too.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::grading::TestCase;
use crate::util::{read_to_string, resolve_relative_to};

/// File name picked up by suite discovery.
pub const SUITE_FILE_NAME: &str = "exercise.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Suite {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Reference or learner solution, relative to the suite file.
    #[serde(default)]
    pub solution: Option<String>,

    /// Overrides the sandbox default for this exercise.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    #[serde(default)]
    pub tests: Vec<TestCase>,

    /// Where this suite was loaded from.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Suite {
    /// Load and parse a suite file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_to_string(path)?;

        // YAML is a superset of JSON, so one parser covers both.
        let mut suite: Suite = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse suite file {:?}", path))?;

        if suite.id.trim().is_empty() {
            bail!("Suite {:?} has an empty id", path);
        }
        if suite.timeout_seconds == Some(0) {
            bail!("Suite {:?}: timeout_seconds must be greater than zero", path);
        }

        suite.path = path.to_path_buf();
        Ok(suite)
    }

    /// Display name: the title if set, else the id.
    pub fn name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Path of the solution file, if the suite names one.
    pub fn solution_path(&self) -> Option<PathBuf> {
        self.solution
            .as_deref()
            .map(|rel| resolve_relative_to(&self.path, rel))
    }

    /// Read the solution source named by the suite.
    pub fn load_solution(&self) -> Result<String> {
        let path = self.solution_path().with_context(|| {
            format!(
                "Suite {:?} names no solution; pass --code to grade a file",
                self.path
            )
        })?;

        read_to_string(&path)
    }
}

/// Find every suite file below `root`, sorted for stable output.
pub fn discover_suites(root: &Path) -> Result<Vec<PathBuf>> {
    let mut suites = Vec::new();

    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == SUITE_FILE_NAME {
            suites.push(entry.path().to_path_buf());
        }
    }

    if suites.is_empty() {
        bail!("No {} files found under {:?}", SUITE_FILE_NAME, root);
    }

    suites.sort();
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Expectation;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_yaml_suite_and_resolves_solution() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "loops/solution.py", "for i in range(3):\n    print(i)\n");
        let path = write(
            dir.path(),
            "loops/exercise.yaml",
            r#"
id: loops
title: Counting
solution: solution.py
tests:
  - test: ""
    expected: "0\n1\n2"
  - test: "assert i == 2"
    expected: ""
"#,
        );

        let suite = Suite::load(&path).unwrap();
        assert_eq!(suite.name(), "Counting");
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(suite.tests[1].expectation(), Expectation::Assertion);
        assert!(suite.load_solution().unwrap().contains("range(3)"));
    }

    #[test]
    fn loads_json_suite() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "hello.json",
            r#"{"id": "hello", "tests": [{"test": "", "expected": "Hello, World!"}]}"#,
        );

        let suite = Suite::load(&path).unwrap();
        assert_eq!(suite.name(), "hello");
        assert!(suite.solution_path().is_none());
        assert!(suite.load_solution().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "exercise.yaml", "id: x\ntimeout_seconds: 0\n");
        assert!(Suite::load(&path).is_err());
    }

    #[test]
    fn discovery_is_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b/exercise.yaml", "id: b\n");
        write(dir.path(), "a/nested/exercise.yaml", "id: a\n");
        write(dir.path(), "a/notes.yaml", "id: ignored\n");

        let found = discover_suites(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a/nested/exercise.yaml"));
        assert!(found[1].ends_with("b/exercise.yaml"));
    }

    #[test]
    fn discovery_without_suites_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_suites(dir.path()).is_err());
    }
}
