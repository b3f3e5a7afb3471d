// src/sandbox/classify.rs

//! Failure taxonomy and learner-facing messages.
//!
//! The worker reports an exception as its class name plus the names of every
//! class in its MRO. Classification walks that list from the most specific
//! class outward and stops at the first one with a dedicated kind. Anything
//! left over is a generic runtime error that carries the full traceback.

use serde::{Deserialize, Serialize};

use crate::sandbox::report::WorkerException;

/// Category of a trapped failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SyntaxError,
    TimedOut,
    NameError,
    ZeroDivisionError,
    IndexError,
    KeyError,
    TypeError,
    ValueError,
    AssertionError,
    /// Any other runtime fault.
    Runtime,
    /// The run finished cleanly but wrote to stderr.
    StderrOutput,
    /// The worker could not be launched or produced no usable report.
    Internal,
}

impl FailureKind {
    /// Exception classes with a dedicated kind.
    ///
    /// Order does not matter here: precedence comes from the MRO.
    const BY_CLASS: &'static [(&'static str, FailureKind)] = &[
        ("SyntaxError", FailureKind::SyntaxError),
        ("NameError", FailureKind::NameError),
        ("ZeroDivisionError", FailureKind::ZeroDivisionError),
        ("IndexError", FailureKind::IndexError),
        ("KeyError", FailureKind::KeyError),
        ("TypeError", FailureKind::TypeError),
        ("ValueError", FailureKind::ValueError),
        ("AssertionError", FailureKind::AssertionError),
    ];

    /// Kind for a single exception class name, if it has one.
    pub fn for_class(name: &str) -> Option<Self> {
        Self::BY_CLASS
            .iter()
            .find(|(class, _)| *class == name)
            .map(|(_, kind)| *kind)
    }

    /// Most specific kind for an MRO (most derived class first).
    pub fn from_mro<S: AsRef<str>>(mro: &[S]) -> Self {
        mro.iter()
            .find_map(|name| Self::for_class(name.as_ref()))
            .unwrap_or(FailureKind::Runtime)
    }

    /// Stable short label, used by the CLI and logs.
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::SyntaxError => "syntax_error",
            FailureKind::TimedOut => "timed_out",
            FailureKind::NameError => "name_error",
            FailureKind::ZeroDivisionError => "zero_division_error",
            FailureKind::IndexError => "index_error",
            FailureKind::KeyError => "key_error",
            FailureKind::TypeError => "type_error",
            FailureKind::ValueError => "value_error",
            FailureKind::AssertionError => "assertion_error",
            FailureKind::Runtime => "runtime",
            FailureKind::StderrOutput => "stderr_output",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a reported exception and render its message.
pub fn classify(exc: &WorkerException) -> (FailureKind, String) {
    let kind = if exc.mro.is_empty() {
        FailureKind::from_mro(std::slice::from_ref(&exc.kind))
    } else {
        FailureKind::from_mro(&exc.mro)
    };

    let message = match kind {
        FailureKind::SyntaxError => syntax_message(exc),
        FailureKind::NameError => format!(
            "Name Error: {}\nMake sure all variables and functions are defined.",
            exc.message
        ),
        FailureKind::ZeroDivisionError => format!(
            "Division by Zero Error: {}\nYou cannot divide by zero.",
            exc.message
        ),
        FailureKind::IndexError => format!(
            "Index Error: {}\nYou're trying to access an index that doesn't exist.",
            exc.message
        ),
        FailureKind::KeyError => format!(
            "Key Error: {}\nThe dictionary key you're looking for doesn't exist.",
            exc.message
        ),
        FailureKind::TypeError => format!(
            "Type Error: {}\nCheck the data types you're working with.",
            exc.message
        ),
        FailureKind::ValueError => format!(
            "Value Error: {}\nThe value provided is not appropriate for the operation.",
            exc.message
        ),
        FailureKind::AssertionError => {
            let detail = if exc.message.trim().is_empty() {
                "assertion failed"
            } else {
                exc.message.as_str()
            };
            format!("Assertion Error: {detail}\nAn assertion in the code did not hold.")
        }
        _ => runtime_message(exc),
    };

    (kind, message)
}

fn syntax_message(exc: &WorkerException) -> String {
    let line = exc
        .lineno
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());
    let text = exc
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("N/A");

    format!("Syntax Error: {}\nLine {}: {}", exc.message, line, text)
}

fn runtime_message(exc: &WorkerException) -> String {
    let head = if exc.message.is_empty() {
        exc.kind.clone()
    } else {
        exc.message.clone()
    };

    format!(
        "Runtime Error: {}\n\nFull traceback:\n{}",
        head,
        exc.traceback.trim_end()
    )
}

/// Message for an execution stopped by the deadline.
pub fn timeout_message(timeout_seconds: u64) -> String {
    format!(
        "Code execution timed out after {} second(s). Make sure your code doesn't have infinite loops.",
        timeout_seconds
    )
}

/// Message for a sandbox malfunction.
pub fn internal_message(detail: &str) -> String {
    format!("Sandbox Error: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exception(kind: &str, mro: &[&str], message: &str) -> WorkerException {
        WorkerException {
            kind: kind.to_string(),
            mro: mro.iter().map(|s| s.to_string()).collect(),
            message: message.to_string(),
            traceback: format!("Traceback (most recent call last):\n{kind}: {message}\n"),
            lineno: None,
            text: None,
        }
    }

    #[test]
    fn zero_division_mentions_divide_by_zero() {
        let exc = exception(
            "ZeroDivisionError",
            &["ZeroDivisionError", "ArithmeticError", "Exception", "BaseException", "object"],
            "division by zero",
        );
        let (kind, message) = classify(&exc);
        assert_eq!(kind, FailureKind::ZeroDivisionError);
        assert!(message.contains("divide by zero"));
    }

    #[test]
    fn most_specific_class_wins() {
        let exc = exception(
            "UnboundLocalError",
            &["UnboundLocalError", "NameError", "Exception", "BaseException", "object"],
            "cannot access local variable 'x'",
        );
        assert_eq!(classify(&exc).0, FailureKind::NameError);

        // UnicodeDecodeError is a ValueError.
        let kind = FailureKind::from_mro(&[
            "UnicodeDecodeError",
            "UnicodeError",
            "ValueError",
            "Exception",
        ]);
        assert_eq!(kind, FailureKind::ValueError);
    }

    #[test]
    fn indentation_error_is_a_syntax_error() {
        let mut exc = exception(
            "IndentationError",
            &["IndentationError", "SyntaxError", "Exception", "BaseException", "object"],
            "expected an indented block",
        );
        exc.lineno = Some(2);
        exc.text = Some("pass\n".to_string());

        let (kind, message) = classify(&exc);
        assert_eq!(kind, FailureKind::SyntaxError);
        assert!(message.starts_with("Syntax Error: expected an indented block"));
        assert!(message.ends_with("Line 2: pass"));
    }

    #[test]
    fn syntax_error_without_text_says_not_available() {
        let exc = exception("SyntaxError", &["SyntaxError"], "invalid syntax");
        let (_, message) = classify(&exc);
        assert!(message.ends_with("Line ?: N/A"));
    }

    #[test]
    fn unclassified_fault_carries_traceback() {
        let exc = exception(
            "RecursionError",
            &["RecursionError", "RuntimeError", "Exception", "BaseException", "object"],
            "maximum recursion depth exceeded",
        );
        let (kind, message) = classify(&exc);
        assert_eq!(kind, FailureKind::Runtime);
        assert!(message.starts_with("Runtime Error: maximum recursion depth exceeded"));
        assert!(message.contains("Full traceback:\nTraceback (most recent call last):"));
    }

    #[test]
    fn empty_assertion_message_gets_default_text() {
        let exc = exception("AssertionError", &["AssertionError", "Exception"], "");
        let (kind, message) = classify(&exc);
        assert_eq!(kind, FailureKind::AssertionError);
        assert!(message.starts_with("Assertion Error: assertion failed"));
    }

    #[test]
    fn missing_mro_falls_back_to_class_name() {
        let exc = exception("KeyError", &[], "'missing'");
        assert_eq!(classify(&exc).0, FailureKind::KeyError);
    }

    #[test]
    fn timeout_message_names_the_limit() {
        let message = timeout_message(3);
        assert!(message.contains("3 second(s)"));
        assert!(message.contains("infinite loops"));
    }
}
