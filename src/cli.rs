//! CLI argument parsing for why-is-this-slow

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "why-is-this-slow")]
#[command(version)]
#[command(about = "Measure a command's wall time, CPU time and peak memory, and explain why it was slow", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// TOML file with state directory and analysis thresholds
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding stored runs (overrides config and platform default)
    #[arg(long = "state-dir", value_name = "DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a command and record timings
    Run {
        /// Print the record as JSON
        #[arg(long)]
        json: bool,

        /// Repeat N times and aggregate (median/p90)
        #[arg(long, value_name = "N", default_value = "1")]
        repeat: usize,

        /// Command to measure (everything after --)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Show a stored run and its analysis
    Explain {
        /// Print the record as JSON
        #[arg(long)]
        json: bool,

        /// Run identifier printed by `run`
        id: String,
    },

    /// Explain how run B differs from baseline run A
    Compare {
        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,

        /// Baseline run identifier
        a: String,

        /// Candidate run identifier
        b: String,
    },
}
