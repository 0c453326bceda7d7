//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "swarmlab")]
#[command(about = "swarmlab - A/B test landing pages with simulated visitors", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Settings file to use instead of .swarmlab/config.yaml
    #[arg(short, long, global = true, env = "SWARMLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an experiment and report the results
    Run(RunArgs),

    /// Check an experiment definition without running it
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Experiment definition (YAML or JSON)
    pub experiment: PathBuf,

    /// Use synthesized sessions instead of the live decision oracle
    #[arg(long)]
    pub dry_run: bool,

    /// Conversion probability for synthesized sessions
    #[arg(long, default_value = "0.3")]
    pub mock_conversion_rate: f64,

    /// Sessions in flight per batch
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Sessions per variant
    #[arg(long)]
    pub sessions: Option<usize>,

    /// Seed for the session queue shuffle
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Experiment definition (YAML or JSON)
    pub experiment: PathBuf,
}
