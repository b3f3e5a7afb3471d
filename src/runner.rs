// src/runner.rs

use crate::cli::{Cli, Command};
use crate::config::{Config, OutputMode};
use crate::grading;
use crate::render::{render_execution, render_json, render_suite, should_use_color};
use crate::runtime::{self, AppState};
use crate::safety::validate_code_safety;
use crate::sandbox::Sandbox;
use crate::suite::{discover_suites, Suite, SUITE_FILE_NAME};
use crate::util::{ensure_dir, read_to_string};
use crate::validate::validate_config;

use anyhow::{bail, Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init_scaffold(),

        Command::Validate => run_validate(&cli.config),

        Command::Check { file } => run_check(&file),

        Command::Serve { addr } => {
            let mut cfg = Config::load_or_default(&cli.config)?;
            if let Some(addr) = addr {
                cfg.server.addr = addr;
            }
            serve(cfg).await
        }

        Command::Test {
            suite,
            code,
            format,
        } => {
            let mut cfg = Config::load_or_default(&cli.config)?;
            if let Some(mode) = format {
                cfg.output.mode = mode;
            }
            run_test_mode(cfg, suite, code).await
        }

        Command::Run {
            file,
            code,
            timeout,
            format,
            watch,
        } => {
            let mut cfg = Config::load_or_default(&cli.config)?;

            // CLI overrides; an explicit timeout also lifts the ceiling
            if let Some(secs) = timeout {
                let secs = secs.max(1);
                cfg.sandbox.timeout_seconds = secs;
                cfg.sandbox.max_timeout_seconds = cfg.sandbox.max_timeout_seconds.max(secs);
            }
            if let Some(mode) = format {
                cfg.output.mode = mode;
            }

            let sandbox = Sandbox::new(cfg.sandbox.clone()).context("Invalid sandbox config")?;

            match (file, code) {
                (Some(file), _) if watch => execute_with_watch(&sandbox, &file, cfg.output.mode).await,
                (Some(file), _) => {
                    let source = read_to_string(&file)?;
                    execute_once(&sandbox, &source, cfg.output.mode).await
                }
                (None, Some(code)) => execute_once(&sandbox, &code, cfg.output.mode).await,
                (None, None) => bail!("Nothing to run: pass a file or --code"),
            }
        }
    }
}

/* ---------------- run ---------------- */

async fn execute_once(sandbox: &Sandbox, source: &str, mode: OutputMode) -> Result<()> {
    let ok = execute_and_print(sandbox, source, mode).await?;
    if !ok {
        bail!("Run failed");
    }
    Ok(())
}

async fn execute_and_print(sandbox: &Sandbox, source: &str, mode: OutputMode) -> Result<bool> {
    let result = sandbox.execute_source(source).await;
    println!("{}", render_execution(&result, mode, should_use_color())?);
    Ok(result.is_success())
}

/* ---------------- watch mode ---------------- */

async fn execute_with_watch(sandbox: &Sandbox, file: &Path, mode: OutputMode) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .context("Failed to initialise file watcher")?;

    watcher
        .watch(file, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {:?}", file))?;

    loop {
        clear_screen();

        // Re-read each round so the latest edit is what runs
        match read_to_string(file) {
            Ok(source) => {
                if let Err(e) = execute_and_print(sandbox, &source, mode).await {
                    eprintln!("Error: {e}");
                }
            }
            Err(e) => eprintln!("Error: {e}"),
        }

        // Block until the file actually changes
        loop {
            match rx.recv().await {
                Some(Ok(event)) if matches!(event.kind, EventKind::Access(_)) => continue,
                Some(Ok(_)) => break,
                Some(Err(e)) => {
                    eprintln!("Watch error: {e}");
                    continue;
                }
                None => return Ok(()),
            }
        }

        // Editors often write in bursts; coalesce them into one re-run
        tokio::time::sleep(Duration::from_millis(100)).await;
        while rx.try_recv().is_ok() {}
    }
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = std::io::stdout().flush();
}

/* ---------------- test mode (CI-first) ---------------- */

async fn run_test_mode(cfg: Config, suite: Option<PathBuf>, code: Option<PathBuf>) -> Result<()> {
    let suites = match suite {
        Some(path) => vec![path],
        None => discover_suites(Path::new("."))?,
    };

    // An override only makes sense against a single exercise
    if code.is_some() && suites.len() > 1 {
        bail!("--code needs an explicit suite path");
    }

    let mode = cfg.output.mode;
    let use_color = should_use_color();
    let mut any_fail = false;
    let mut results: Vec<Value> = Vec::new();

    for suite_path in suites {
        let suite = Suite::load(&suite_path)?;

        let source = match &code {
            Some(path) => read_to_string(path)?,
            None => suite.load_solution()?,
        };

        let mut sandbox_cfg = cfg.sandbox.clone();
        if let Some(secs) = suite.timeout_seconds {
            sandbox_cfg.timeout_seconds = secs;
            sandbox_cfg.max_timeout_seconds = sandbox_cfg.max_timeout_seconds.max(secs);
        }
        let sandbox = Sandbox::new(sandbox_cfg)
            .with_context(|| format!("Invalid sandbox config for {:?}", suite_path))?;

        let outcome = grading::run_tests(&sandbox, &source, &suite.tests).await;
        if !outcome.all_passed() {
            any_fail = true;
        }

        match mode {
            OutputMode::Simple => {
                println!("{}", render_suite(suite.name(), &outcome, mode, use_color)?);
            }
            _ => results.push(serde_json::json!({
                "suite": suite_path.to_string_lossy(),
                "id": suite.id,
                "ok": outcome.all_passed(),
                "passed_count": outcome.passed_count,
                "total_count": outcome.total_count,
                "cases": outcome.cases,
            })),
        }
    }

    // CI JSON emitter: one stable blob for the whole run.
    if mode != OutputMode::Simple {
        let out = serde_json::json!({
            "ok": !any_fail,
            "results": results
        });
        println!("{}", render_json(&out, mode)?);
    }

    if any_fail {
        bail!("One or more suites failed");
    }

    Ok(())
}

/* ---------------- check / validate ---------------- */

fn run_check(file: &Path) -> Result<()> {
    let source = read_to_string(file)?;
    let report = validate_code_safety(&source);

    if report.warnings.is_empty() {
        eprintln!("No risky patterns found");
    } else {
        for w in &report.warnings {
            eprintln!("⚠ {}", w);
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_safe {
        bail!("Unsafe patterns found in {:?}", file);
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<()> {
    let cfg = Config::load_or_default(config_path)?;
    let result = validate_config(&cfg);

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_valid() {
        bail!("Config is invalid");
    }
    Ok(())
}

/* ---------------- serve ---------------- */

async fn serve(cfg: Config) -> Result<()> {
    let validation = validate_config(&cfg);
    if !validation.is_valid() {
        for e in &validation.errors {
            eprintln!("✖ {}: {}", e.code, e.message);
        }
        bail!("Refusing to start with an invalid config");
    }

    let api_key = std::env::var(&cfg.server.api_key_env)
        .ok()
        .filter(|v| !v.trim().is_empty());

    let sandbox = Sandbox::new(cfg.sandbox.clone()).context("Invalid sandbox config")?;

    runtime::serve(&cfg.server.addr, AppState { sandbox, api_key }).await
}

/* ---------------- init ---------------- */

fn init_scaffold() -> Result<()> {
    write_if_missing(Path::new("pysandbox.yaml"), default_config_yaml())?;

    let exercise_dir = Path::new("exercises/hello");
    ensure_dir(exercise_dir)?;

    write_if_missing(&exercise_dir.join(SUITE_FILE_NAME), default_exercise_yaml())?;
    write_if_missing(&exercise_dir.join("solution.py"), default_solution_py())?;

    Ok(())
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        eprintln!("{} already exists (skipping)", path.display());
        return Ok(());
    }

    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))?;
    eprintln!("Created {}", path.display());
    Ok(())
}

fn default_config_yaml() -> &'static str {
    r#"sandbox:
  python: python3
  timeout_seconds: 5
  max_timeout_seconds: 30 # ceiling for per-request timeouts
  max_output_chars: 65536
  memory_limit_mb: 256 # null disables the cap
  max_concurrency: 4
  extra_builtins: []

server:
  addr: 127.0.0.1:8080
  api_key_env: PYSANDBOX_API_KEY

output:
  mode: simple # simple | pretty | json
"#
}

fn default_exercise_yaml() -> &'static str {
    r#"id: hello
title: Hello, functions
solution: solution.py
tests:
  # Output check: the program's output must match `expected`
  - test: print(greet("World"))
    expected: Hello, World!

  # Assertion check: an empty expectation only requires a clean run
  - test: assert greet("Ada") == "Hello, Ada!"
    expected: ""
"#
}

fn default_solution_py() -> &'static str {
    r#"def greet(name):
    return "Hello, " + name + "!"
"#
}
