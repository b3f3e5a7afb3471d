// src/safety.rs

//! Advisory static scan of submissions.
//!
//! Flags source text that reaches for things the sandbox denies anyway
//! (imports of system modules, file access, dynamic evaluation, namespace
//! introspection). The scan is case-insensitive and purely textual, so it can
//! produce false positives inside strings and comments. Execution never
//! depends on it; front ends use it to warn learners before running.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Outcome of a safety scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    /// False when at least one blocking pattern matched.
    pub is_safe: bool,
    pub warnings: Vec<String>,
}

struct Pattern {
    label: &'static str,
    regex: Regex,
    blocking: bool,
}

/// (label, regex, blocking)
const PATTERN_TABLE: &[(&str, &str, bool)] = &[
    ("import os", r"\bimport\s+os\b", false),
    ("import sys", r"\bimport\s+sys\b", false),
    ("import subprocess", r"\bimport\s+subprocess\b", false),
    ("import socket", r"\bimport\s+socket\b", false),
    ("import urllib", r"\bimport\s+urllib\b", false),
    ("import requests", r"\bimport\s+requests\b", false),
    ("import http", r"\bimport\s+http\b", false),
    ("open(", r"\bopen\s*\(", true),
    ("file(", r"\bfile\s*\(", true),
    ("exec(", r"\bexec\s*\(", true),
    ("eval(", r"\beval\s*\(", true),
    ("__import__", r"__import__", true),
    ("globals()", r"\bglobals\s*\(\s*\)", false),
    ("locals()", r"\blocals\s*\(\s*\)", false),
    ("vars()", r"\bvars\s*\(\s*\)", false),
    ("dir()", r"\bdir\s*\(\s*\)", false),
    ("getattr(", r"\bgetattr\s*\(", false),
    ("setattr(", r"\bsetattr\s*\(", false),
    ("delattr(", r"\bdelattr\s*\(", false),
    ("hasattr(", r"\bhasattr\s*\(", false),
];

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PATTERN_TABLE
            .iter()
            .map(|(label, re, blocking)| Pattern {
                label: *label,
                regex: Regex::new(&format!("(?i){}", re)).expect("safety pattern is valid"),
                blocking: *blocking,
            })
            .collect()
    })
}

/// Scan `code` for risky patterns.
pub fn validate_code_safety(code: &str) -> SafetyReport {
    let mut warnings = Vec::new();
    let mut is_safe = true;

    for pattern in patterns() {
        if pattern.regex.is_match(code) {
            warnings.push(format!(
                "Potentially unsafe pattern detected: {}",
                pattern.label
            ));
            if pattern.blocking {
                is_safe = false;
            }
        }
    }

    SafetyReport { is_safe, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_exercise_code_is_clean() {
        let report = validate_code_safety("total = sum(range(10))\nprint(total)\n");
        assert!(report.is_safe);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn file_access_is_blocking() {
        let report = validate_code_safety("data = open('secrets.txt').read()");
        assert!(!report.is_safe);
        assert_eq!(
            report.warnings,
            vec!["Potentially unsafe pattern detected: open(".to_string()]
        );
    }

    #[test]
    fn imports_only_warn() {
        let report = validate_code_safety("import os\nprint(os.getcwd())");
        assert!(report.is_safe);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].ends_with("import os"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let report = validate_code_safety("EVAL('1+1')");
        assert!(!report.is_safe);
    }

    #[test]
    fn identifiers_containing_keywords_do_not_match() {
        // `reopen(` and `import osmosis` are not the risky calls.
        let report = validate_code_safety("reopen(1)\nimport osmosis\nmy_eval = 3");
        assert!(report.is_safe);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn spacing_does_not_hide_a_call() {
        let report = validate_code_safety("f = open ('x')\nimport  os");
        assert!(!report.is_safe);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn every_match_is_reported() {
        let report = validate_code_safety("hasattr(x, 'a') and getattr(x, 'a')\n__import__('os')");
        assert!(!report.is_safe);
        assert_eq!(report.warnings.len(), 3);
    }
}
