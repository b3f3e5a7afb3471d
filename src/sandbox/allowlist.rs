// src/sandbox/allowlist.rs

//! The set of builtin names reachable from sandboxed code.
//!
//! Everything the worker injects into the submission's `__builtins__` comes
//! from here. The worker looks each name up in Python's `builtins` module and
//! silently skips names that do not exist, so the list is the single source of
//! truth for what learner code can call.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::sandbox::SandboxError;

/// Builtins exposed to every submission.
pub const DEFAULT_BUILTINS: &[&str] = &[
    // output
    "print",
    // iteration helpers
    "len",
    "range",
    "enumerate",
    "zip",
    "map",
    "filter",
    "sorted",
    "any",
    "all",
    // arithmetic
    "sum",
    "min",
    "max",
    "abs",
    "round",
    "pow",
    "divmod",
    // constructors
    "int",
    "float",
    "str",
    "bool",
    "list",
    "dict",
    "tuple",
    "set",
    // inspection
    "type",
    "isinstance",
    "hasattr",
    "getattr",
    "setattr",
    "dir",
    "repr",
    "ord",
    "chr",
    // error kinds
    "Exception",
    "ValueError",
    "TypeError",
    "IndexError",
    "KeyError",
    "AttributeError",
    "ZeroDivisionError",
];

/// Names that may never be added through configuration.
///
/// These reach the filesystem, the import system, the compiler, the
/// interpreter's namespaces, or block on stdin.
pub const FORBIDDEN_BUILTINS: &[&str] = &[
    "__import__",
    "__loader__",
    "__spec__",
    "breakpoint",
    "compile",
    "eval",
    "exec",
    "exit",
    "globals",
    "help",
    "input",
    "locals",
    "memoryview",
    "open",
    "quit",
    "vars",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// Returns true if `name` is a syntactically valid Python identifier (ASCII).
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Returns true if `name` is on the deny-list.
pub fn is_forbidden(name: &str) -> bool {
    FORBIDDEN_BUILTINS.contains(&name)
}

/// An ordered, de-duplicated allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    names: BTreeSet<String>,
}

impl AllowList {
    /// The default restrictive list.
    pub fn standard() -> Self {
        Self {
            names: DEFAULT_BUILTINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The default list plus integrator-approved extras.
    ///
    /// Fails on the first extra that is not an identifier or is forbidden.
    pub fn with_extras<I, S>(extras: I) -> Result<Self, SandboxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::standard();

        for extra in extras {
            let name = extra.as_ref().trim();

            if !is_identifier(name) {
                return Err(SandboxError::InvalidBuiltin(name.to_string()));
            }
            if is_forbidden(name) {
                return Err(SandboxError::ForbiddenBuiltin(name.to_string()));
            }

            list.names.insert(name.to_string());
        }

        Ok(list)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in sorted order, as sent to the worker.
    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::standard()
    }
}
