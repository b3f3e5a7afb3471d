//! Shared helpers for the integration tests.

#![allow(dead_code)]

use pysandbox::config::SandboxConfig;
use pysandbox::sandbox::Sandbox;

/// A sandbox on the default config, or `None` when no `python3` is installed.
pub fn sandbox() -> Option<Sandbox> {
    sandbox_with(SandboxConfig::default())
}

pub fn sandbox_with(config: SandboxConfig) -> Option<Sandbox> {
    let available = std::process::Command::new(&config.python)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);

    if !available {
        eprintln!("{} not available, skipping", config.python);
        return None;
    }

    Some(Sandbox::new(config).expect("default sandbox config is valid"))
}
