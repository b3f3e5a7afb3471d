// src/render.rs

//! Terminal rendering of execution and grading results.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::IsTerminal;

use crate::config::OutputMode;
use crate::grading::{CaseOutcome, TestSuiteResult};
use crate::sandbox::ExecutionResult;

/// Render any serialisable value in a JSON mode.
pub fn render_json<T: Serialize>(value: &T, mode: OutputMode) -> Result<String> {
    match mode {
        OutputMode::Pretty => {
            serde_json::to_string_pretty(value).context("Failed to format output as pretty JSON")
        }
        _ => serde_json::to_string(value).context("Failed to format output as JSON"),
    }
}

pub fn render_execution(
    result: &ExecutionResult,
    mode: OutputMode,
    use_color: bool,
) -> Result<String> {
    match mode {
        OutputMode::Simple => Ok(format_execution(result, use_color)),
        _ => render_json(result, mode),
    }
}

pub fn render_suite(
    name: &str,
    suite: &TestSuiteResult,
    mode: OutputMode,
    use_color: bool,
) -> Result<String> {
    match mode {
        OutputMode::Simple => Ok(format_suite(name, suite, use_color)),
        _ => render_json(suite, mode),
    }
}

fn format_execution(result: &ExecutionResult, use_color: bool) -> String {
    let ok = result.is_success();
    let status = if ok { "OK" } else { "FAIL" };
    let status = paint(status, if ok { "32" } else { "31" }, use_color);

    let mut out = String::new();
    match result.failure() {
        Some(kind) => out.push_str(&format!("{} ({})\n", status, kind)),
        None => out.push_str(&format!("{}\n", status)),
    }
    out.push_str(&format!("time: {}ms\n", result.duration_ms()));

    let mem = result
        .max_rss_kb()
        .map(|v| format!("{}kb", v))
        .unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!("memory: {}\n", mem));

    if !result.output().is_empty() {
        out.push_str("output:\n");
        out.push_str(result.output().trim_end());
        out.push('\n');
        if result.output_truncated() {
            out.push_str("[output truncated]\n");
        }
    }

    if !result.error().is_empty() {
        out.push_str("error:\n");
        out.push_str(result.error().trim_end());
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn format_suite(name: &str, suite: &TestSuiteResult, use_color: bool) -> String {
    let ok = suite.all_passed();
    let status = paint(
        if ok { "PASS" } else { "FAIL" },
        if ok { "32" } else { "31" },
        use_color,
    );

    let mut out = format!(
        "{} {} ({}/{} passed)\n",
        status, name, suite.passed_count, suite.total_count
    );

    for case in &suite.cases {
        let mark = if case.passed {
            paint("✔", "32", use_color)
        } else {
            paint("✖", "31", use_color)
        };

        match case.outcome {
            CaseOutcome::Passed => {
                out.push_str(&format!("  {} test {}\n", mark, case.index));
            }
            CaseOutcome::OutputMismatch => {
                out.push_str(&format!("  {} test {}: output mismatch\n", mark, case.index));
                out.push_str(&format!("      expected: {:?}\n", case.expected));
                out.push_str(&format!("      got:      {:?}\n", case.actual));
            }
            CaseOutcome::AssertionFailed => {
                out.push_str(&format!("  {} test {}: assertion failed\n", mark, case.index));
                push_indented(&mut out, &case.error);
            }
            CaseOutcome::TimedOut => {
                out.push_str(&format!("  {} test {}: timed out\n", mark, case.index));
            }
            CaseOutcome::Error => {
                out.push_str(&format!("  {} test {}: error\n", mark, case.index));
                push_indented(&mut out, &case.error);
            }
        }
    }

    out.trim_end().to_string()
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str("      ");
        out.push_str(line);
        out.push('\n');
    }
}

pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{}m{}\x1b[0m", color, text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{judge, TestCase};
    use crate::metrics::InvocationMetrics;
    use crate::sandbox::FailureKind;

    fn metrics() -> InvocationMetrics {
        InvocationMetrics {
            duration_ms: 31,
            max_rss_kb: None,
        }
    }

    #[test]
    fn simple_success_shows_output() {
        let result = ExecutionResult::completed("Hello\n".to_string(), false, metrics());
        let text = render_execution(&result, OutputMode::Simple, false).unwrap();
        assert_eq!(text, "OK\ntime: 31ms\nmemory: n/a\noutput:\nHello");
    }

    #[test]
    fn simple_failure_shows_kind_and_error() {
        let result = ExecutionResult::failed(
            FailureKind::NameError,
            "Name Error: name 'x' is not defined".to_string(),
            String::new(),
            false,
            metrics(),
        );
        let text = render_execution(&result, OutputMode::Simple, false).unwrap();
        assert!(text.starts_with("FAIL (name_error)\n"));
        assert!(text.ends_with("error:\nName Error: name 'x' is not defined"));
    }

    #[test]
    fn json_mode_serialises_the_result() {
        let result = ExecutionResult::completed("4\n".to_string(), false, metrics());
        let text = render_execution(&result, OutputMode::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["output"], "4\n");
        assert_eq!(value["error"], "");
        assert!(value.get("failure").is_none());
    }

    #[test]
    fn suite_lists_each_case() {
        let mut suite = TestSuiteResult::default();
        let ok = ExecutionResult::completed("4\n".to_string(), false, metrics());
        suite.cases.push(judge(1, &TestCase::new("", "4"), &ok));
        suite.cases.push(judge(2, &TestCase::new("", "5"), &ok));
        suite.passed_count = 1;
        suite.total_count = 2;

        let text = render_suite("sums", &suite, OutputMode::Simple, false).unwrap();
        assert!(text.starts_with("FAIL sums (1/2 passed)"));
        assert!(text.contains("✔ test 1"));
        assert!(text.contains("✖ test 2: output mismatch"));
        assert!(text.contains("expected: \"5\""));
    }

    #[test]
    fn paint_is_a_no_op_without_color() {
        assert_eq!(paint("OK", "32", false), "OK");
        assert_eq!(paint("OK", "32", true), "\x1b[32mOK\x1b[0m");
    }
}
