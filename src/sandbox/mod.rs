// src/sandbox/mod.rs

//! Sandboxed execution of learner submissions.
//!
//! Every call to [`Sandbox::execute`] runs the submission in its own
//! short-lived Python worker:
//! - the worker gets a fresh temp directory, an empty environment and an
//!   empty stdin
//! - the host sends the source and the allow-list over stdin
//! - the worker captures the submission's output privately and reports back
//!   over stdout
//! - the host enforces the deadline and kills the worker when it expires
//!
//! The host process never redirects its own standard streams and never
//! installs signal handlers, so nothing process-wide needs restoring after a
//! call, whatever the outcome.
//!
//! The allow-list is a cooperative restriction. It keeps honest mistakes
//! away from the filesystem and network, but it is not a security boundary
//! against a determined attacker; deployments facing adversarial input need
//! OS-level isolation around the worker as well.

pub mod allowlist;
pub mod classify;
pub mod error;
pub mod report;
pub mod shim;

pub use allowlist::AllowList;
pub use classify::FailureKind;
pub use error::SandboxError;

use serde::Serialize;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::SandboxConfig;
use crate::metrics::{InvocationMetrics, MemoryTracker};
use crate::util::source_digest;
use report::{parse_report, WorkerReport, WorkerRequest};
use shim::{python_shim, SHIM_FILE_NAME};

/// Exit code the shim uses when it cannot read its request.
const WORKER_USAGE_EXIT: i32 = 2;

/// Worker memory sampling interval.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/* ---------------- request / result ---------------- */

/// One execution of untrusted source.
///
/// Only built through [`ExecutionRequest::new`] and
/// [`ExecutionRequest::with_timeout`], so the timeout is never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    source: String,
    timeout_seconds: u64,
}

impl ExecutionRequest {
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Set the wall-clock limit. Zero is raised to one second.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds.max(1);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

/// Outcome of one execution.
///
/// Built only through the constructors below, which keep the invariant:
/// a successful result has an empty `error` and no `failure`; a failed one
/// has a non-empty `error` and a `failure` kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    success: bool,
    output: String,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    output_truncated: bool,
    duration_ms: u64,
    max_rss_kb: Option<u64>,
}

impl ExecutionResult {
    /// The submission ran to completion.
    pub fn completed(output: String, output_truncated: bool, metrics: InvocationMetrics) -> Self {
        Self {
            success: true,
            output,
            error: String::new(),
            failure: None,
            output_truncated,
            duration_ms: metrics.duration_ms,
            max_rss_kb: metrics.max_rss_kb,
        }
    }

    /// The submission hit a trapped condition.
    pub fn failed(
        kind: FailureKind,
        error: String,
        output: String,
        output_truncated: bool,
        metrics: InvocationMetrics,
    ) -> Self {
        let error = if error.trim().is_empty() {
            format!("{} (no further detail)", kind)
        } else {
            error
        };

        Self {
            success: false,
            output,
            error,
            failure: Some(kind),
            output_truncated,
            duration_ms: metrics.duration_ms,
            max_rss_kb: metrics.max_rss_kb,
        }
    }

    /// The deadline expired.
    pub fn timed_out(timeout_seconds: u64, metrics: InvocationMetrics) -> Self {
        Self::failed(
            FailureKind::TimedOut,
            classify::timeout_message(timeout_seconds),
            String::new(),
            false,
            metrics,
        )
    }

    /// The sandbox itself failed.
    pub fn internal(detail: &str, metrics: InvocationMetrics) -> Self {
        Self::failed(
            FailureKind::Internal,
            classify::internal_message(detail),
            String::new(),
            false,
            metrics,
        )
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Everything the submission wrote to stdout.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Classified diagnostic; empty on success.
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn output_truncated(&self) -> bool {
        self.output_truncated
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn max_rss_kb(&self) -> Option<u64> {
        self.max_rss_kb
    }
}

/* ---------------- sandbox ---------------- */

/// Executes submissions in isolated workers.
///
/// Cheap to clone; clones share the concurrency limit.
#[derive(Debug, Clone)]
pub struct Sandbox {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: SandboxConfig,
    allowlist: AllowList,
    permits: Semaphore,
}

enum WorkerOutcome {
    Reported(WorkerReport),
    TimedOut,
    Crashed { status: ExitStatus, stderr: String },
}

impl Sandbox {
    /// Build a sandbox, rejecting unusable configuration up front.
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        if config.python.trim().is_empty() {
            return Err(SandboxError::InvalidConfig(
                "python interpreter is not configured".to_string(),
            ));
        }
        if config.timeout_seconds == 0 {
            return Err(SandboxError::InvalidConfig(
                "timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if config.max_timeout_seconds < config.timeout_seconds {
            return Err(SandboxError::InvalidConfig(
                "max_timeout_seconds must be at least timeout_seconds".to_string(),
            ));
        }
        if config.max_output_chars == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_output_chars must be greater than zero".to_string(),
            ));
        }
        if config.max_concurrency == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if config.memory_limit_mb == Some(0) {
            return Err(SandboxError::InvalidConfig(
                "memory_limit_mb must be greater than zero".to_string(),
            ));
        }

        let allowlist = AllowList::with_extras(&config.extra_builtins)?;
        let permits = Semaphore::new(config.max_concurrency);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                allowlist,
                permits,
            }),
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.inner.config
    }

    pub fn allowlist(&self) -> &AllowList {
        &self.inner.allowlist
    }

    /// A request for `source` using the configured default timeout.
    pub fn request(&self, source: impl Into<String>) -> ExecutionRequest {
        ExecutionRequest::new(source).with_timeout(self.inner.config.timeout_seconds)
    }

    /// Run `source` with the configured default timeout.
    pub async fn execute_source(&self, source: &str) -> ExecutionResult {
        self.execute(self.request(source)).await
    }

    /// Clamp the request's timeout to `max_timeout_seconds`.
    fn bounded(&self, mut request: ExecutionRequest) -> ExecutionRequest {
        let ceiling = self.inner.config.max_timeout_seconds.max(1);
        if request.timeout_seconds > ceiling {
            debug!(requested = request.timeout_seconds, ceiling, "timeout clamped");
            request.timeout_seconds = ceiling;
        }
        request
    }

    /// Run one submission.
    ///
    /// Never fails: launch problems and worker malfunctions come back as an
    /// `internal` result. Timeouts above `max_timeout_seconds` are clamped.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let request = self.bounded(request);
        let span = info_span!(
            "execute",
            source_sha256 = %source_digest(request.source()),
            timeout_s = request.timeout_seconds(),
        );

        async {
            let _permit = match self.inner.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return ExecutionResult::internal(
                        "sandbox is shut down",
                        InvocationMetrics::default(),
                    )
                }
            };

            let started = Instant::now();
            let result = match self.run_worker(&request).await {
                Ok((outcome, metrics)) => outcome.into_result(metrics, request.timeout_seconds()),
                Err(e) => {
                    warn!(error = %e, "sandbox worker failed");
                    ExecutionResult::internal(
                        &e.to_string(),
                        InvocationMetrics::new(started.elapsed(), None),
                    )
                }
            };

            info!(
                success = result.is_success(),
                failure = result.failure().map(FailureKind::label).unwrap_or("none"),
                duration_ms = result.duration_ms(),
                "execution finished"
            );

            result
        }
        .instrument(span)
        .await
    }

    async fn run_worker(
        &self,
        request: &ExecutionRequest,
    ) -> Result<(WorkerOutcome, InvocationMetrics), SandboxError> {
        let cfg = &self.inner.config;

        // Dropped (and deleted) when this function returns.
        let workdir = tempfile::tempdir()?;
        let shim_path = workdir.path().join(SHIM_FILE_NAME);
        std::fs::write(&shim_path, python_shim())?;

        let payload = serde_json::to_vec(&WorkerRequest {
            source: request.source(),
            builtins: self.inner.allowlist.names(),
            max_output_chars: cfg.max_output_chars,
            memory_limit_mb: cfg.memory_limit_mb,
        })
        .map_err(SandboxError::Encode)?;

        let mut cmd = Command::new(&cfg.python);
        cmd.arg("-I")
            .arg("-S")
            .arg("-B")
            .arg(&shim_path)
            .current_dir(workdir.path())
            .env_clear()
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        if let Some(root) = std::env::var_os("SYSTEMROOT") {
            cmd.env("SYSTEMROOT", root);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            program: cfg.python.clone(),
            source,
        })?;

        let tracker = child
            .id()
            .map(|pid| MemoryTracker::start(pid, SAMPLE_INTERVAL));

        debug!(pid = child.id(), "worker spawned");

        let mut stdin = child.stdin.take().ok_or(SandboxError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SandboxError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SandboxError::MissingPipe("stderr"))?;

        let cap = read_cap(cfg.max_output_chars);
        let deadline = Duration::from_secs(request.timeout_seconds());

        let interaction = async {
            let feed = async move {
                // A worker that dies early closes its end; its exit status
                // explains why, so a failed write is not an error here.
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "could not deliver request to worker");
                }
                drop(stdin);
            };

            let ((), out, err) = tokio::join!(
                feed,
                read_capped(stdout, cap),
                read_capped(stderr, cap)
            );
            let status = child.wait().await?;

            Ok::<_, std::io::Error>((status, out?, err?))
        };

        let waited = tokio::time::timeout(deadline, interaction).await;

        let outcome = match waited {
            Ok(Ok((status, out, err))) => {
                let stdout = String::from_utf8_lossy(&out);
                let stderr = String::from_utf8_lossy(&err).into_owned();

                match parse_report(&stdout) {
                    Ok(report) => WorkerOutcome::Reported(report),
                    Err(_) if status.code() == Some(WORKER_USAGE_EXIT) => {
                        return Err(SandboxError::WorkerRejected(stderr.trim().to_string()));
                    }
                    Err(_) if !status.success() => WorkerOutcome::Crashed { status, stderr },
                    Err(e) => return Err(e),
                }
            }
            Ok(Err(e)) => return Err(SandboxError::Io(e)),
            Err(_) => {
                debug!("deadline expired, killing worker");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out worker");
                }
                WorkerOutcome::TimedOut
            }
        };

        let max_rss_kb = tracker.and_then(MemoryTracker::stop_and_take);
        let metrics = InvocationMetrics::new(start.elapsed(), max_rss_kb);

        Ok((outcome, metrics))
    }
}

impl WorkerOutcome {
    fn into_result(self, metrics: InvocationMetrics, timeout_seconds: u64) -> ExecutionResult {
        match self {
            WorkerOutcome::TimedOut => ExecutionResult::timed_out(timeout_seconds, metrics),

            WorkerOutcome::Crashed { status, stderr } => {
                let detail = if stderr.trim().is_empty() {
                    "no diagnostic output"
                } else {
                    stderr.trim_end()
                };
                ExecutionResult::failed(
                    FailureKind::Runtime,
                    format!(
                        "Runtime Error: the program stopped unexpectedly ({})\n\nFull traceback:\n{}",
                        status, detail
                    ),
                    String::new(),
                    false,
                    metrics,
                )
            }

            WorkerOutcome::Reported(report) => match report.error {
                Some(exc) => {
                    let (kind, message) = classify::classify(&exc);
                    ExecutionResult::failed(
                        kind,
                        message,
                        report.stdout,
                        report.truncated,
                        metrics,
                    )
                }
                // Warnings and other stderr writes fail an otherwise clean run.
                None if !report.stderr.is_empty() => ExecutionResult::failed(
                    FailureKind::StderrOutput,
                    report.stderr,
                    report.stdout,
                    report.truncated,
                    metrics,
                ),
                None => ExecutionResult::completed(report.stdout, report.truncated, metrics),
            },
        }
    }
}

/// Upper bound on bytes read from a worker pipe.
///
/// The report carries up to four fields of `max_output_chars` characters,
/// each of which may expand to six bytes once JSON-escaped.
fn read_cap(max_output_chars: usize) -> u64 {
    (max_output_chars as u64)
        .saturating_mul(4 * 6)
        .saturating_add(64 * 1024)
}

/// Read up to `cap` bytes, then drain and discard the rest.
///
/// The pipe stays open until the worker closes it, so an oversized report
/// never surfaces in the worker as a broken pipe.
async fn read_capped<R>(mut reader: R, cap: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut reader).take(cap).read_to_end(&mut buf).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(buf)
}
