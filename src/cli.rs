// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{OutputMode, DEFAULT_CONFIG_FILE};

/// Sandboxed runner and grader for learner Python code.
///
/// `pysandbox.yaml` is the primary source of truth.
/// CLI flags only override config values.
#[derive(Parser, Debug)]
#[command(name = "pysandbox", version, disable_help_subcommand = true)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a submission in the sandbox and print the result.
    ///
    /// Exits non-zero when the submission fails.
    Run {
        /// Source file to execute
        #[arg(required_unless_present = "code", conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Inline source instead of a file
        #[arg(long)]
        code: Option<String>,

        /// Override the timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Override the output format
        #[arg(long, value_enum)]
        format: Option<OutputMode>,

        /// Re-run whenever the file changes
        #[arg(long, requires = "file")]
        watch: bool,
    },

    /// Grade solutions against exercise suites.
    ///
    /// Without a path, every `exercise.yaml` below the current directory
    /// is graded.
    Test {
        /// Suite file (YAML or JSON)
        suite: Option<PathBuf>,

        /// Grade this file instead of the suite's own solution
        #[arg(long)]
        code: Option<PathBuf>,

        /// Override the output format
        #[arg(long, value_enum)]
        format: Option<OutputMode>,
    },

    /// Scan a file for risky patterns without running it.
    Check {
        /// Source file to scan
        file: PathBuf,
    },

    /// Validate the configuration and report every problem.
    Validate,

    /// Start the HTTP runtime.
    Serve {
        /// Override the listen address
        #[arg(long)]
        addr: Option<String>,
    },

    /// Initialise a project scaffold.
    ///
    /// Creates:
    /// - pysandbox.yaml
    /// - exercises/hello/exercise.yaml
    /// - exercises/hello/solution.py
    Init,
}
