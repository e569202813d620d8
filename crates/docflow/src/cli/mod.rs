//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

use docflow_core::config::{load_config, load_config_or_default};
use docflow_core::SchedulerConfig;

use commands::{EstimateCommand, InitCommand, PlanCommand, RunCommand};

/// Docflow - Dependency-aware parallel documentation pipeline
#[derive(Debug, Parser)]
#[command(name = "docflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Configuration file (default: search upwards for docflow.toml / docflow.yaml)
    #[arg(short, long, global = true, env = "DOCFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a default docflow configuration
    Init(InitCommand),

    /// Show the execution levels for a module manifest
    Plan(PlanCommand),

    /// Estimate the parallel speedup for a module manifest
    Estimate(EstimateCommand),

    /// Run a command once per module, in dependency order
    Run(RunCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Plan(ref cmd) => cmd.execute(&self),
            Commands::Estimate(ref cmd) => cmd.execute(&self),
            Commands::Run(ref cmd) => cmd.execute(&self),
        }
    }

    /// Load the scheduler configuration: the `--config` file if given,
    /// otherwise the nearest config file, otherwise defaults.
    ///
    /// A config file that exists but fails to parse or validate is an error.
    pub fn load_config(&self) -> anyhow::Result<SchedulerConfig> {
        let cwd = std::env::current_dir()?;
        resolve_config(self.config.as_deref(), &cwd)
    }

    /// Whether human-readable output should be printed
    pub fn is_text(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}

fn resolve_config(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<SchedulerConfig> {
    let (config, path) = match explicit {
        Some(path) => (load_config(path)?, Some(path.to_path_buf())),
        None => load_config_or_default(dir)?,
    };
    if let Some(path) = path {
        debug!(path = %path.display(), "using config file");
    }
    Ok(config)
}
