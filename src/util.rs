// src/util.rs

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Resolve a path relative to the directory containing `anchor_file`.
///
/// Absolute paths are returned unchanged.
///
/// Example:
/// anchor_file = `/course/loops/exercise.yaml`
/// rel = "solution.py"
/// → `/course/loops/solution.py`
pub fn resolve_relative_to(anchor_file: &Path, rel: &str) -> PathBuf {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() {
        return rel_path.to_path_buf();
    }

    match anchor_file.parent() {
        Some(base) => base.join(rel_path),
        None => rel_path.to_path_buf(),
    }
}

/// Read a UTF-8 file into a String with a clear error message.
///
/// This is mainly used for:
/// - submission source files
/// - exercise suite files
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Ensure a directory exists (create it if missing).
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {:?}", path))
}

/// Short SHA-256 fingerprint of a submission, for logs.
///
/// Logs carry this instead of the (untrusted, possibly large) source.
pub fn source_digest(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_next_to_anchor() {
        let anchor = Path::new("course/loops/exercise.yaml");
        assert_eq!(
            resolve_relative_to(anchor, "solution.py"),
            PathBuf::from("course/loops/solution.py")
        );
    }

    #[cfg(unix)]
    #[test]
    fn absolute_paths_are_kept() {
        let anchor = Path::new("course/exercise.yaml");
        assert_eq!(
            resolve_relative_to(anchor, "/tmp/solution.py"),
            PathBuf::from("/tmp/solution.py")
        );
    }

    #[test]
    fn digest_is_stable_and_short() {
        let a = source_digest("print(1)");
        assert_eq!(a.len(), 16);
        assert_eq!(a, source_digest("print(1)"));
        assert_ne!(a, source_digest("print(2)"));
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
