// src/grading.rs

//! Test-case grading on top of the sandbox.
//!
//! A test case is a snippet appended to the learner's code. Two styles exist:
//! - output tests: `expected` holds the text the combined program must print
//! - assertion tests: `expected` is a placeholder (`""`, `none`,
//!   `no output`) and the test passes when the combined program runs without
//!   a trapped failure
//!
//! A rejected assertion is reported as `assertion_failed`, separately from
//! other runtime errors, because it is the normal shape of a failing test
//! rather than a problem with the engine.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sandbox::{ExecutionResult, FailureKind, Sandbox};

/// Expected values that mark an assertion-style test.
const PLACEHOLDERS: &[&str] = &["", "none", "no output"];

/// One test case of an exercise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Source appended after the submission.
    #[serde(default)]
    pub test: String,

    /// Expected captured output, or a placeholder.
    #[serde(default)]
    pub expected: String,
}

/// How a test case decides pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation<'a> {
    /// A clean run passes.
    Assertion,
    /// Trimmed output must equal this text.
    Output(&'a str),
}

impl TestCase {
    pub fn new(test: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            expected: expected.into(),
        }
    }

    pub fn expectation(&self) -> Expectation<'_> {
        let trimmed = self.expected.trim();
        if PLACEHOLDERS
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
        {
            Expectation::Assertion
        } else {
            Expectation::Output(self.expected.trim_end())
        }
    }

    /// The program actually executed for this case.
    pub fn compose(&self, source: &str) -> String {
        format!("{}\n{}", source, self.test)
    }
}

/// Why a case passed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    OutputMismatch,
    AssertionFailed,
    TimedOut,
    Error,
}

/// Verdict for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseResult {
    /// 1-based position in the suite.
    pub index: usize,
    pub passed: bool,
    pub outcome: CaseOutcome,
    pub expected: String,
    /// Captured output with trailing whitespace removed.
    pub actual: String,
    pub error: String,
}

/// Verdict for a whole suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestSuiteResult {
    pub passed_count: usize,
    pub total_count: usize,
    pub cases: Vec<TestCaseResult>,
}

impl TestSuiteResult {
    pub fn all_passed(&self) -> bool {
        self.passed_count == self.total_count
    }

    fn push(&mut self, case: TestCaseResult) {
        if case.passed {
            self.passed_count += 1;
        }
        self.total_count += 1;
        self.cases.push(case);
    }
}

/// Judge one executed test case.
pub fn judge(index: usize, case: &TestCase, result: &ExecutionResult) -> TestCaseResult {
    let actual = result.output().trim_end().to_string();

    let outcome = if result.is_success() {
        match case.expectation() {
            Expectation::Assertion => CaseOutcome::Passed,
            Expectation::Output(expected) if actual == expected => CaseOutcome::Passed,
            Expectation::Output(_) => CaseOutcome::OutputMismatch,
        }
    } else {
        match result.failure() {
            Some(FailureKind::AssertionError) => CaseOutcome::AssertionFailed,
            Some(FailureKind::TimedOut) => CaseOutcome::TimedOut,
            _ => CaseOutcome::Error,
        }
    };

    TestCaseResult {
        index,
        passed: outcome == CaseOutcome::Passed,
        outcome,
        expected: case.expected.clone(),
        actual,
        error: result.error().to_string(),
    }
}

/// Run every case against `source`, in order, one execution per case.
pub async fn run_tests(sandbox: &Sandbox, source: &str, cases: &[TestCase]) -> TestSuiteResult {
    let mut suite = TestSuiteResult::default();

    for (i, case) in cases.iter().enumerate() {
        let result = sandbox.execute_source(&case.compose(source)).await;
        let verdict = judge(i + 1, case, &result);

        debug!(
            case = verdict.index,
            outcome = ?verdict.outcome,
            "test case judged"
        );

        suite.push(verdict);
    }

    info!(
        passed = suite.passed_count,
        total = suite.total_count,
        "test suite finished"
    );

    suite
}

/* ---------------- submission ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Nothing but whitespace was submitted.
    Empty,
    /// The submission failed when run on its own.
    ExecutionFailed,
    /// At least one test case failed.
    TestsFailed,
    Passed,
}

/// Result of submitting a solution to an exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<TestSuiteResult>,
    /// True when the caller should record the exercise as completed.
    pub completed: bool,
}

/// Run the submission on its own, then its test cases.
///
/// An exercise without test cases is passed by any submission that runs
/// cleanly.
pub async fn submit(sandbox: &Sandbox, source: &str, cases: &[TestCase]) -> Submission {
    if source.trim().is_empty() {
        return Submission {
            status: SubmissionStatus::Empty,
            execution: None,
            suite: None,
            completed: false,
        };
    }

    let execution = sandbox.execute_source(source).await;
    if !execution.is_success() {
        return Submission {
            status: SubmissionStatus::ExecutionFailed,
            execution: Some(execution),
            suite: None,
            completed: false,
        };
    }

    if cases.is_empty() {
        return Submission {
            status: SubmissionStatus::Passed,
            execution: Some(execution),
            suite: None,
            completed: true,
        };
    }

    let suite = run_tests(sandbox, source, cases).await;
    let status = if suite.all_passed() {
        SubmissionStatus::Passed
    } else {
        SubmissionStatus::TestsFailed
    };

    Submission {
        status,
        execution: Some(execution),
        suite: Some(suite),
        completed: status == SubmissionStatus::Passed,
    }
}
