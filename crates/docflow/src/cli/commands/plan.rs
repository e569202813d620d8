//! Plan command: show execution levels without running anything

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use docflow_tasks::{
    load_manifest, register_modules, ModuleDependencyAnalyzer, ModuleInfo, ParallelProcessor,
};

use crate::cli::{output, Cli, OutputFormat};

/// Show the execution levels for a module manifest
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Module manifest (JSON or YAML)
    pub manifest: PathBuf,
}

impl PlanCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(manifest = %self.manifest.display(), "executing plan command");
        let config = cli.load_config()?;
        let modules = load_manifest(&self.manifest)?;

        let mut analyzer = ModuleDependencyAnalyzer::from_config(&config);
        let mut processor: ParallelProcessor<ModuleInfo, ()> =
            ParallelProcessor::from_config(&config);
        let graph = register_modules(&mut processor, &mut analyzer, &modules, |_| Ok(()))?;
        let plan = processor.plan()?;

        if cli.format == OutputFormat::Json {
            let json = serde_json::json!({
                "levels": plan.levels(),
                "dependencies": graph,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(());
        }
        if cli.quiet {
            return Ok(());
        }

        println!(
            "{}",
            output::header(&format!(
                "{} in {}",
                output::plural(plan.task_count(), "module"),
                output::plural(plan.len(), "level")
            ))
        );
        println!();

        if cli.verbose {
            print!("{}", processor.describe_plan()?);
            return Ok(());
        }

        for (i, level) in plan.levels().iter().enumerate() {
            println!(
                "  {} {}",
                style(format!("Level {}:", i)).dim(),
                level
                    .iter()
                    .map(|id| output::task_style().apply_to(id).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(())
    }
}
