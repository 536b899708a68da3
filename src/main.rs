use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use why_is_this_slow::analysis::Analyzer;
use why_is_this_slow::cli::{Cli, Command};
use why_is_this_slow::config::Settings;
use why_is_this_slow::executor::{ExecOptions, Executor};
use why_is_this_slow::platform::PlatformProfile;
use why_is_this_slow::store::{self, RunStore};
use why_is_this_slow::{cancel, json_output, text_output};

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// `--state-dir` beats the config file, which beats the platform default
fn state_dir(flag: Option<PathBuf>, settings: &Settings) -> Result<PathBuf> {
    match flag.or_else(|| settings.state_dir.clone()) {
        Some(dir) => Ok(dir),
        None => Ok(store::default_base()?),
    }
}

/// Measure, analyze and persist; returns the target's exit code
fn run_command(
    store: &RunStore,
    analyzer: &Analyzer,
    command: Vec<String>,
    repeat: usize,
    json: bool,
) -> Result<i32> {
    if command.is_empty() {
        anyhow::bail!("missing command to run; provide it after --");
    }
    if repeat < 1 {
        anyhow::bail!("Invalid value for --repeat: {} (must be >= 1)", repeat);
    }

    let cancel = cancel::interrupt_token()?;
    let executor = Executor::new(analyzer.platform().clone());
    let opts = ExecOptions::new(command).with_repeat(repeat);
    let mut run = executor
        .execute(&opts, &cancel)
        .context("Measurement failed")?;

    let analysis = analyzer.analyze_run(&run);
    let path = store.save(&run, &analysis)?;
    run.storage_path = Some(path);

    let mut out = io::stdout().lock();
    if json {
        json_output::write_json(&mut out, &run, &analysis)?;
    } else {
        text_output::print_run_summary(&mut out, &run, &analysis)?;
    }
    out.flush()?;
    Ok(run.exit_code)
}

fn explain(store: &RunStore, id: &str, json: bool) -> Result<()> {
    let (run, analysis) = store.load(id)?;
    let mut out = io::stdout().lock();
    if json {
        json_output::write_json(&mut out, &run, &analysis)?;
    } else {
        text_output::print_run_summary(&mut out, &run, &analysis)?;
    }
    Ok(())
}

fn compare(store: &RunStore, analyzer: &Analyzer, a: &str, b: &str, json: bool) -> Result<()> {
    let (run_a, _) = store.load(a)?;
    let (run_b, _) = store.load(b)?;
    let analysis = analyzer.compare(&run_a, &run_b);

    let mut out = io::stdout().lock();
    if json {
        json_output::write_compare_json(&mut out, &run_a, &run_b, &analysis)?;
    } else {
        text_output::print_compare_summary(&mut out, &run_a, &run_b, &analysis)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let settings = Settings::load(args.config.as_deref())?;
    let base = state_dir(args.state_dir, &settings)?;
    let store = RunStore::open(&base)
        .with_context(|| format!("Failed to initialize storage at {}", base.display()))?;
    let analyzer = Analyzer::new(settings.analysis, PlatformProfile::detect());
    tracing::debug!(?analyzer, state_dir = %base.display(), "starting");

    match args.command {
        Command::Run {
            json,
            repeat,
            command,
        } => {
            let code = run_command(&store, &analyzer, command, repeat, json)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::Explain { json, id } => explain(&store, &id, json)?,
        Command::Compare { json, a, b } => compare(&store, &analyzer, &a, &b, json)?,
    }
    Ok(())
}
