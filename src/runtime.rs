// src/runtime.rs

//! HTTP runtime exposing the sandbox and the test runner.

use crate::{
    auth::api_key_auth,
    execution_id::ExecutionId,
    grading::{self, Submission, TestCase, TestSuiteResult},
    safety::{validate_code_safety, SafetyReport},
    sandbox::{ExecutionResult, Sandbox},
};

use axum::debug_handler;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Span};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sandbox: Sandbox,
    /// Bearer key for protected routes; `None` refuses them all.
    pub api_key: Option<String>,
}

/* ---------------- server ---------------- */

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/execute", post(execute))
        .route("/run-tests", post(run_tests))
        .route("/submit", post(submit))
        .route("/check", post(check))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "request completed"
                    );
                }),
        )
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    if state.api_key.is_none() {
        tracing::warn!("no API key configured; protected routes will refuse every request");
    }

    let builtins = state.sandbox.allowlist().len();
    let timeout_s = state.sandbox.config().timeout_seconds;
    let max_concurrency = state.sandbox.config().max_concurrency;

    let app = router(state);

    let socket: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(socket).await?;

    tracing::info!(
        builtins,
        timeout_s,
        max_concurrency,
        "pysandbox runtime listening on http://{}",
        socket
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/* ---------------- request models ---------------- */

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    source: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    execution_id: ExecutionId,
    started_at: DateTime<Utc>,
    result: ExecutionResult,
}

#[derive(Debug, Deserialize)]
struct TestsRequest {
    source: String,
    #[serde(default)]
    test_cases: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    source: String,
}

/* ---------------- endpoints ---------------- */

async fn health() -> &'static str {
    "ok"
}

#[debug_handler]
async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Json<ExecuteResponse> {
    let execution_id = ExecutionId::new();
    let started_at = Utc::now();

    let mut request = state.sandbox.request(req.source);
    if let Some(secs) = req.timeout_seconds {
        request = request.with_timeout(secs);
    }

    let span = tracing::info_span!("execution", id = %execution_id);
    let result = state.sandbox.execute(request).instrument(span).await;

    Json(ExecuteResponse {
        execution_id,
        started_at,
        result,
    })
}

#[debug_handler]
async fn run_tests(
    State(state): State<AppState>,
    Json(req): Json<TestsRequest>,
) -> Json<TestSuiteResult> {
    Json(grading::run_tests(&state.sandbox, &req.source, &req.test_cases).await)
}

#[debug_handler]
async fn submit(
    State(state): State<AppState>,
    Json(req): Json<TestsRequest>,
) -> Json<Submission> {
    Json(grading::submit(&state.sandbox, &req.source, &req.test_cases).await)
}

async fn check(Json(req): Json<CheckRequest>) -> Json<SafetyReport> {
    Json(validate_code_safety(&req.source))
}
