// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Default config file looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "pysandbox.yaml";

/// Root configuration loaded from `pysandbox.yaml`.
///
/// This file controls:
/// - Which Python interpreter runs submissions, and under which limits
/// - Which extra builtins (if any) submissions may use
/// - Where the HTTP runtime listens and how it authenticates
/// - How the CLI renders results
///
/// Every section is optional. CLI flags only override config values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Sandbox section.
///
/// Example:
///
/// sandbox:
///   python: python3
///   timeout_seconds: 5
///   max_timeout_seconds: 30
///   max_output_chars: 65536
///   memory_limit_mb: 256
///   max_concurrency: 4
///   extra_builtins: []
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    /// Interpreter binary used for workers.
    #[serde(default = "default_python")]
    pub python: String,

    /// Default wall-clock limit per execution.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Ceiling for per-request timeouts; longer requests are clamped to it.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,

    /// Cap on captured stdout (and, separately, stderr), in characters.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,

    /// Address-space cap applied inside the worker. `null` disables it.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: Option<u64>,

    /// Maximum number of workers running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Builtins added to the default allow-list.
    ///
    /// Treat additions as a policy change: each one widens what learner
    /// code can reach.
    #[serde(default)]
    pub extra_builtins: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            timeout_seconds: default_timeout_seconds(),
            max_timeout_seconds: default_max_timeout_seconds(),
            max_output_chars: default_max_output_chars(),
            memory_limit_mb: default_memory_limit_mb(),
            max_concurrency: default_max_concurrency(),
            extra_builtins: Vec::new(),
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_max_timeout_seconds() -> u64 {
    30
}

fn default_max_output_chars() -> usize {
    64 * 1024
}

fn default_memory_limit_mb() -> Option<u64> {
    Some(256)
}

fn default_max_concurrency() -> usize {
    4
}

/// HTTP runtime section.
///
/// Example:
///
/// server:
///   addr: 127.0.0.1:8080
///   api_key_env: PYSANDBOX_API_KEY
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Name of the environment variable holding the bearer key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_api_key_env() -> String {
    "PYSANDBOX_API_KEY".to_string()
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_mode")]
    pub mode: OutputMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: default_output_mode(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human-readable, colored when attached to a terminal.
    Simple,
    /// Indented JSON.
    Pretty,
    /// One compact JSON line.
    Json,
}

fn default_output_mode() -> OutputMode {
    OutputMode::Simple
}

impl Config {
    /// Load and parse a config file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_yaml(&raw)
    }

    /// Parse a config from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty file is a valid "all defaults" config.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let cfg: Config = serde_yaml::from_str(raw).context("Failed to parse YAML config")?;

        Ok(cfg)
    }

    /// Load `path`, falling back to defaults when it is the default config
    /// file and does not exist.
    ///
    /// A missing file that was named explicitly is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path == Path::new(DEFAULT_CONFIG_FILE) && !path.exists() {
            tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }

        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = Config::from_yaml("").unwrap();
        assert_eq!(cfg.sandbox.python, "python3");
        assert_eq!(cfg.sandbox.timeout_seconds, 5);
        assert_eq!(cfg.sandbox.max_timeout_seconds, 30);
        assert_eq!(cfg.sandbox.memory_limit_mb, Some(256));
        assert_eq!(cfg.output.mode, OutputMode::Simple);
        assert_eq!(cfg.server.api_key_env, "PYSANDBOX_API_KEY");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = Config::from_yaml(
            r#"
sandbox:
  timeout_seconds: 2
  memory_limit_mb: null
  extra_builtins: [object]
output:
  mode: json
"#,
        )
        .unwrap();

        assert_eq!(cfg.sandbox.timeout_seconds, 2);
        assert_eq!(cfg.sandbox.memory_limit_mb, None);
        assert_eq!(cfg.sandbox.max_concurrency, 4);
        assert_eq!(cfg.sandbox.extra_builtins, vec!["object".to_string()]);
        assert_eq!(cfg.output.mode, OutputMode::Json);
        assert_eq!(cfg.server.addr, "127.0.0.1:8080");
    }

    #[test]
    fn unknown_output_mode_is_rejected() {
        assert!(Config::from_yaml("output:\n  mode: fancy\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(Config::load_or_default(&missing).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pysandbox.yaml");
        std::fs::write(&path, "sandbox:\n  python: /usr/bin/python3\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.sandbox.python, "/usr/bin/python3");
    }
}
