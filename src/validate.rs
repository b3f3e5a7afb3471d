// src/validate.rs

//! Configuration validation with stable error codes.
//!
//! Unlike [`crate::sandbox::Sandbox::new`], which stops at the first problem,
//! this collects every problem so `pysandbox validate` can report them all.

use serde::Serialize;
use std::net::SocketAddr;

use crate::config::{Config, SandboxConfig, ServerConfig};
use crate::sandbox::allowlist::{is_forbidden, is_identifier};

#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, code: &'static str, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            code,
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }

    /// Error codes in report order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

pub fn validate_config(cfg: &Config) -> ValidationResult {
    let mut result = ValidationResult::ok();

    validate_sandbox(&cfg.sandbox, &mut result);
    validate_builtins(&cfg.sandbox, &mut result);
    validate_server(&cfg.server, &mut result);

    result
}

/* ---------------- sandbox ---------------- */

fn validate_sandbox(cfg: &SandboxConfig, result: &mut ValidationResult) {
    if cfg.python.trim().is_empty() {
        result.push_error("PYTHON_MISSING", "Python interpreter is not configured");
    }

    if cfg.timeout_seconds == 0 {
        result.push_error(
            "TIMEOUT_INVALID",
            "timeout_seconds must be greater than zero",
        );
    }

    if cfg.max_timeout_seconds < cfg.timeout_seconds {
        result.push_error(
            "TIMEOUT_INVALID",
            format!(
                "max_timeout_seconds ({}) must be at least timeout_seconds ({})",
                cfg.max_timeout_seconds, cfg.timeout_seconds
            ),
        );
    }

    if cfg.max_output_chars == 0 {
        result.push_error(
            "OUTPUT_LIMIT_INVALID",
            "max_output_chars must be greater than zero",
        );
    }

    if cfg.memory_limit_mb == Some(0) {
        result.push_error(
            "MEMORY_LIMIT_INVALID",
            "memory_limit_mb must be greater than zero (use null to disable)",
        );
    }

    if cfg.max_concurrency == 0 {
        result.push_error(
            "CONCURRENCY_INVALID",
            "max_concurrency must be greater than zero",
        );
    }
}

/* ---------------- builtins ---------------- */

fn validate_builtins(cfg: &SandboxConfig, result: &mut ValidationResult) {
    for name in &cfg.extra_builtins {
        let name = name.trim();

        if !is_identifier(name) {
            result.push_error(
                "BUILTIN_INVALID_NAME",
                format!("extra_builtins entry is not an identifier: {:?}", name),
            );
        } else if is_forbidden(name) {
            result.push_error(
                "BUILTIN_FORBIDDEN",
                format!("{} cannot be exposed to submissions", name),
            );
        }
    }
}

/* ---------------- server ---------------- */

fn validate_server(cfg: &ServerConfig, result: &mut ValidationResult) {
    if cfg.addr.parse::<SocketAddr>().is_err() {
        result.push_error(
            "SERVER_ADDR_INVALID",
            format!("server.addr is not a socket address: {}", cfg.addr),
        );
    }

    if cfg.api_key_env.trim().is_empty() {
        result.push_error(
            "SERVER_API_KEY_ENV_MISSING",
            "server.api_key_env must name an environment variable",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_valid());
    }

    #[test]
    fn collects_every_problem() {
        let mut cfg = Config::default();
        cfg.sandbox.python = " ".to_string();
        cfg.sandbox.timeout_seconds = 0;
        cfg.sandbox.memory_limit_mb = Some(0);
        cfg.sandbox.extra_builtins = vec!["object".into(), "eval".into(), "a.b".into()];
        cfg.server.addr = "localhost".to_string();

        let result = validate_config(&cfg);
        assert!(!result.is_valid());
        assert_eq!(
            result.codes(),
            vec![
                "PYTHON_MISSING",
                "TIMEOUT_INVALID",
                "MEMORY_LIMIT_INVALID",
                "BUILTIN_FORBIDDEN",
                "BUILTIN_INVALID_NAME",
                "SERVER_ADDR_INVALID",
            ]
        );
    }

    #[test]
    fn timeout_ceiling_below_default_is_rejected() {
        let mut cfg = Config::default();
        cfg.sandbox.timeout_seconds = 10;
        cfg.sandbox.max_timeout_seconds = 5;
        assert_eq!(validate_config(&cfg).codes(), vec!["TIMEOUT_INVALID"]);
    }

    #[test]
    fn disabled_memory_limit_is_fine() {
        let mut cfg = Config::default();
        cfg.sandbox.memory_limit_mb = None;
        assert!(validate_config(&cfg).is_valid());
    }
}
