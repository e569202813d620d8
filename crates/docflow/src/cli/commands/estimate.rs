//! Estimate command

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use docflow_tasks::{estimate_parallelism, load_manifest, ModuleDependencyAnalyzer};

use crate::cli::{output, Cli, OutputFormat};

/// Estimate the parallel speedup for a module manifest
#[derive(Debug, Args)]
pub struct EstimateCommand {
    /// Module manifest (JSON or YAML)
    pub manifest: PathBuf,

    /// Worker count to estimate for (default: configured workers)
    #[arg(long)]
    pub workers: Option<usize>,
}

impl EstimateCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(manifest = %self.manifest.display(), "executing estimate command");
        let config = cli.load_config()?;
        let modules = load_manifest(&self.manifest)?;
        let workers = self
            .workers
            .unwrap_or_else(|| config.effective_max_workers());

        let mut analyzer = ModuleDependencyAnalyzer::from_config(&config);
        let Some(estimate) = estimate_parallelism(&modules, &mut analyzer, workers) else {
            anyhow::bail!("No modules found in {}", self.manifest.display());
        };

        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&estimate)?);
            return Ok(());
        }
        if cli.quiet {
            return Ok(());
        }

        println!("{}", output::header("Parallelism estimate"));
        println!("{}", output::key_value("Modules", &estimate.total_modules.to_string()));
        println!(
            "{}",
            output::key_value("Independent", &estimate.independent_modules.to_string())
        );
        println!(
            "{}",
            output::key_value(
                "With dependencies",
                &format!(
                    "{} ({:.0}%)",
                    estimate.modules_with_dependencies,
                    estimate.dependency_ratio * 100.0
                )
            )
        );
        println!("{}", output::key_value("Workers", &estimate.max_workers.to_string()));
        println!(
            "{}",
            output::key_value(
                "Sequential",
                &format!("{:.1}s", estimate.estimated_sequential_secs)
            )
        );
        println!(
            "{}",
            output::key_value("Parallel", &format!("{:.1}s", estimate.estimated_parallel_secs))
        );
        println!(
            "{}",
            output::key_value("Speedup", &format!("{:.1}x", estimate.estimated_speedup))
        );
        println!("{}", output::key_value("Potential", estimate.potential.as_str()));

        if !estimate.recommendations.is_empty() {
            println!();
            for recommendation in &estimate.recommendations {
                output::info(recommendation);
            }
        }
        Ok(())
    }
}
