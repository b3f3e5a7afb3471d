//! pysandbox
//!
//! Runs untrusted learner Python code in a short-lived, restricted worker
//! process and grades it against test cases.
//!
//! The library is split so the CLI and the HTTP runtime share one engine:
//! - `sandbox` executes a submission and classifies its failure
//! - `grading` runs test cases and whole submissions on top of it
//! - `safety` is an advisory static scan
//! - `runtime` exposes all of it over HTTP

pub mod auth;
pub mod cli;
pub mod config;
pub mod execution_id;
pub mod grading;
pub mod metrics;
pub mod render;
pub mod runner;
pub mod runtime;
pub mod safety;
pub mod sandbox;
pub mod suite;
pub mod util;
pub mod validate;
