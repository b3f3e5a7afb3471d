// src/main.rs

//! pysandbox
//!
//! Entry point for the pysandbox CLI.
//!
//! Responsibilities of this file:
//! - Load `.env` and set up logging
//! - Parse CLI arguments
//! - Hand off execution to the runner

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pysandbox::{cli, runner};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only results.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    runner::run(cli).await
}
