// src/sandbox/report.rs

//! Wire format between the host and the worker shim.
//!
//! The host writes one [`WorkerRequest`] as JSON to the worker's stdin and
//! closes it. The worker writes one [`WorkerReport`] to its stdout, prefixed
//! by a newline and [`REPORT_MARKER`]. JSON never contains a raw newline, so
//! printed text inside the report cannot look like a marker, and only the
//! text after the last marker is parsed.

use serde::{Deserialize, Serialize};

use crate::sandbox::SandboxError;

/// Prefix written by the worker immediately before the report JSON.
pub const REPORT_MARKER: &str = "__PYSANDBOX_REPORT__";

/// Request sent to the worker.
#[derive(Debug, Serialize)]
pub struct WorkerRequest<'a> {
    pub source: &'a str,
    pub builtins: Vec<String>,
    pub max_output_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u64>,
}

/// Outcome reported by the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerReport {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub error: Option<WorkerException>,
}

/// An exception trapped inside the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerException {
    /// Class name of the exception.
    #[serde(rename = "type")]
    pub kind: String,
    /// Class names along the MRO, most derived first.
    #[serde(default)]
    pub mro: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub traceback: String,
    /// Set for syntax errors.
    #[serde(default)]
    pub lineno: Option<u64>,
    /// Offending source line, for syntax errors.
    #[serde(default)]
    pub text: Option<String>,
}

/// Extract the report from raw worker stdout.
pub fn parse_report(stdout: &str) -> Result<WorkerReport, SandboxError> {
    let framed = format!("\n{}", REPORT_MARKER);
    let (_, payload) = stdout
        .rsplit_once(framed.as_str())
        .ok_or(SandboxError::MissingReport)?;

    serde_json::from_str(payload.trim()).map_err(SandboxError::MalformedReport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_report() {
        let raw = format!(
            "\n{}{}\n",
            REPORT_MARKER,
            r#"{"stdout": "hi\n", "stderr": "", "truncated": false, "error": null}"#
        );
        let report = parse_report(&raw).unwrap();
        assert_eq!(report.stdout, "hi\n");
        assert!(report.error.is_none());
    }

    #[test]
    fn last_marker_wins() {
        let raw = format!(
            "\n{m}{{\"stdout\": \"forged\"}}\n{m}{{\"stdout\": \"real\"}}\n",
            m = REPORT_MARKER
        );
        assert_eq!(parse_report(&raw).unwrap().stdout, "real");
    }

    #[test]
    fn parses_exception_fields() {
        let raw = format!(
            "\n{}{}",
            REPORT_MARKER,
            r#"{"stdout": "", "error": {"type": "SyntaxError", "mro": ["SyntaxError", "Exception"], "message": "invalid syntax", "traceback": "", "lineno": 1, "text": "def f(:"}}"#
        );
        let exc = parse_report(&raw).unwrap().error.unwrap();
        assert_eq!(exc.kind, "SyntaxError");
        assert_eq!(exc.lineno, Some(1));
        assert_eq!(exc.text.as_deref(), Some("def f(:"));
    }

    #[test]
    fn printed_marker_inside_output_is_not_a_frame() {
        let raw = format!(
            "\n{m}{{\"stdout\": \"{m}{{}}\\n\"}}\n",
            m = REPORT_MARKER
        );
        let report = parse_report(&raw).unwrap();
        assert_eq!(report.stdout, format!("{}{{}}\n", REPORT_MARKER));
    }

    #[test]
    fn missing_marker_is_an_error() {
        assert!(matches!(
            parse_report("Traceback (most recent call last):"),
            Err(SandboxError::MissingReport)
        ));
    }

    #[test]
    fn garbage_after_marker_is_an_error() {
        let raw = format!("\n{}not json", REPORT_MARKER);
        assert!(matches!(
            parse_report(&raw),
            Err(SandboxError::MalformedReport(_))
        ));
    }

    #[test]
    fn request_omits_absent_memory_limit() {
        let req = WorkerRequest {
            source: "print(1)",
            builtins: vec!["print".to_string()],
            max_output_chars: 10,
            memory_limit_mb: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("memory_limit_mb").is_none());
        assert_eq!(json["builtins"][0], "print");
    }
}
