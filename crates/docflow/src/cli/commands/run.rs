//! Run command: execute a shell command per module, in dependency order

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, ValueEnum};
use console::style;
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{info, warn};

use docflow_core::config::validate_config;
use docflow_core::{FailurePolicy, SchedulerConfig, WorkerKind};
use docflow_tasks::{
    load_manifest, register_modules, ModuleDependencyAnalyzer, ModuleInfo, ParallelProcessor,
    TaskEvent, TaskReporter, TaskReporterRegistry, TaskResult,
};

use crate::cli::{output, Cli, OutputFormat};

/// Placeholder replaced with the module name in `--command`
const MODULE_PLACEHOLDER: &str = "{module}";

/// Worker substrate selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Shared blocking pool
    Shared,
    /// One dedicated thread per task
    Isolated,
}

impl From<StrategyArg> for WorkerKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Shared => WorkerKind::Shared,
            StrategyArg::Isolated => WorkerKind::Isolated,
        }
    }
}

/// Run a command once per module, in dependency order
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Module manifest (JSON or YAML)
    pub manifest: PathBuf,

    /// Shell command to run per module; `{module}` is replaced with the module name
    #[arg(long)]
    pub command: String,

    /// Maximum concurrent tasks
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-task timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Worker substrate
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Do not run modules whose dependencies failed
    #[arg(long)]
    pub skip_dependents: bool,

    /// Show execution plan without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Captured output of one module's command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        let result = runtime.block_on(self.execute_async(cli));
        // Jobs abandoned after a timeout must not keep the process alive.
        runtime.shutdown_background();
        result
    }

    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, mut config: SchedulerConfig) -> anyhow::Result<SchedulerConfig> {
        if let Some(workers) = self.workers {
            config.max_workers = Some(workers);
        }
        if let Some(timeout) = self.timeout {
            config.task_timeout_secs = timeout;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if self.skip_dependents {
            config.failure_policy = FailurePolicy::SkipDependents;
        }
        validate_config(&config)?;
        Ok(config)
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = self.apply_overrides(cli.load_config()?)?;
        let modules = load_manifest(&self.manifest)?;
        let cwd = std::env::current_dir()?;

        info!(
            manifest = %self.manifest.display(),
            modules = modules.len(),
            workers = config.effective_max_workers(),
            strategy = %config.strategy,
            "executing run command"
        );

        if modules.is_empty() {
            if cli.is_text() {
                output::warning("No modules to process.");
            }
            return Ok(());
        }

        let bar = output::task_progress(modules.len() as u64, cli.is_text() && !self.dry_run)?;
        let mut reporters = TaskReporterRegistry::new();
        reporters.register(ConsoleReporter::new(bar.clone(), cli.verbose));

        let mut analyzer = ModuleDependencyAnalyzer::from_config(&config);
        let mut processor: ParallelProcessor<ModuleInfo, CommandOutput> =
            ParallelProcessor::from_config(&config).with_reporter(Arc::new(reporters));

        let process = shell_processor(self.command.clone(), cwd, config.task_timeout());
        register_modules(&mut processor, &mut analyzer, &modules, process)?;

        if self.dry_run {
            let plan = processor.plan()?;
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else if !cli.quiet {
                print!("{}", processor.describe_plan()?);
                println!();
                println!("{}", style("[DRY RUN - no commands will be executed]").yellow().bold());
            }
            return Ok(());
        }

        let on_progress = |label: &str, _fraction: f64| bar.set_message(label.to_string());
        let results = processor.process_all(Some(&on_progress)).await?;
        bar.finish_and_clear();

        let stats = processor.get_processing_statistics();
        let mut ordered: Vec<&TaskResult<CommandOutput>> = results.values().collect();
        ordered.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        let failed: Vec<_> = ordered.iter().filter(|r| !r.is_success()).collect();

        if cli.format == OutputFormat::Json {
            let summary = serde_json::json!({
                "statistics": stats,
                "tasks": ordered.iter().map(|r| {
                    serde_json::json!({
                        "id": r.task_id,
                        "success": r.is_success(),
                        "duration_ms": r.duration.as_millis() as u64,
                        "worker": r.worker,
                        "stdout": r.value().map(|o| o.stdout.as_str()),
                        "error": r.error().map(|e| e.to_string()),
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else if !cli.quiet {
            if let Some(stats) = &stats {
                println!();
                if failed.is_empty() {
                    output::success(&stats.summary());
                } else {
                    output::warning(&stats.summary());
                }
            }
            for r in &failed {
                if let Some(err) = r.error() {
                    println!("    {} {}: {}", style("✗").red(), r.task_id, err);
                }
            }
        }

        if !failed.is_empty() {
            anyhow::bail!("{} failed", output::plural(failed.len(), "task"));
        }
        Ok(())
    }
}

/// Processing closure running the template for each module on the current
/// runtime. Worker threads block on the command; the command itself is
/// killed once it outlives `timeout`.
fn shell_processor(
    template: String,
    dir: PathBuf,
    timeout: Duration,
) -> impl Fn(&ModuleInfo) -> anyhow::Result<CommandOutput> + Send + Sync + 'static {
    let handle = Handle::current();
    move |module: &ModuleInfo| {
        handle.block_on(run_shell_command(&template, &module.name, &dir, timeout))
    }
}

/// Run the command template for one module through `sh -c`
async fn run_shell_command(
    template: &str,
    module: &str,
    dir: &Path,
    timeout: Duration,
) -> anyhow::Result<CommandOutput> {
    let command = template.replace(MODULE_PLACEHOLDER, module);
    let child = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`", command))?;

    // Dropping the pending wait drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.with_context(|| format!("Failed to wait for `{}`", command))?,
        Err(_) => {
            warn!(module, command = %command, "command timed out, killing it");
            anyhow::bail!(
                "Command killed after {:.2}s: {}",
                timeout.as_secs_f64(),
                command
            );
        }
    };

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command exited with code {}: {}", code, stderr.trim());
    }

    Ok(CommandOutput {
        command,
        stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
    })
}

/// Console reporter that prints through the progress bar
struct ConsoleReporter {
    bar: ProgressBar,
    verbose: bool,
}

impl ConsoleReporter {
    fn new(bar: ProgressBar, verbose: bool) -> Self {
        Self { bar, verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::LevelStarted {
                level,
                level_count,
                task_count,
            } => {
                if self.verbose {
                    self.bar.println(format!(
                        "  {} Level {}/{} ({})",
                        style("─").dim(),
                        level + 1,
                        level_count,
                        output::plural(*task_count, "task")
                    ));
                }
            }
            TaskEvent::Started { task_id } => {
                if self.verbose {
                    self.bar
                        .println(format!("  {} {}", style("▸").dim(), style(task_id).bold()));
                }
            }
            TaskEvent::Completed { task_id, duration } => {
                self.bar.inc(1);
                if self.verbose {
                    self.bar.println(format!(
                        "  {} {} {}",
                        style("✓").green(),
                        style(task_id).green(),
                        style(format!("{:.1}s", duration.as_secs_f64())).dim()
                    ));
                }
            }
            TaskEvent::Failed {
                task_id,
                duration,
                error,
            } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(task_id).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                ));
            }
            TaskEvent::TimedOut { task_id, timeout } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "  {} {} {}",
                    style("⏱").yellow(),
                    style(task_id).yellow(),
                    style(format!("timed out after {:.1}s", timeout.as_secs_f64())).dim()
                ));
            }
            TaskEvent::Skipped { task_id, reason } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(task_id).yellow(),
                    style(format!("({})", reason)).dim()
                ));
            }
            TaskEvent::AllCompleted { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_command(args: &[&str]) -> RunCommand {
        use clap::Parser;
        let mut argv = vec!["docflow", "run", "modules.yaml"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            crate::cli::Commands::Run(cmd) => cmd,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_shell_command_substitutes_module() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell_command("echo building {module}", "pkg.core", dir.path(), TEST_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.command, "echo building pkg.core");
        assert_eq!(out.stdout, "building pkg.core");
    }

    #[tokio::test]
    async fn test_shell_command_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_shell_command("echo broken >&2; exit 3", "m", dir.path(), TEST_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command exited with code 3: broken");
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let cmd = run_command(&[
            "--command",
            "true",
            "--workers",
            "2",
            "--timeout",
            "1.5",
            "--strategy",
            "isolated",
            "--skip-dependents",
        ]);
        let config = cmd.apply_overrides(SchedulerConfig::default()).unwrap();
        assert_eq!(config.max_workers, Some(2));
        assert_eq!(config.task_timeout_secs, 1.5);
        assert_eq!(config.strategy, WorkerKind::Isolated);
        assert_eq!(config.failure_policy, FailurePolicy::SkipDependents);

        let cmd = run_command(&["--command", "true", "--workers", "0"]);
        assert!(cmd.apply_overrides(SchedulerConfig::default()).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_modules_run_in_dependency_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("order.log");
        let template = format!("echo {{module}} >> {}", log.display());

        let modules = vec![
            ModuleInfo::new("app").with_import("lib"),
            ModuleInfo::new("lib").with_import("core"),
            ModuleInfo::new("core"),
        ];
        let mut analyzer = ModuleDependencyAnalyzer::new();
        let mut processor: ParallelProcessor<ModuleInfo, CommandOutput> =
            ParallelProcessor::from_config(&SchedulerConfig::default());
        let process = shell_processor(template, dir.path().to_path_buf(), TEST_TIMEOUT);
        register_modules(&mut processor, &mut analyzer, &modules, process).unwrap();

        let results = processor.process_all(None).await.unwrap();
        assert!(results.values().all(|r| r.is_success()));
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "core\nlib\napp\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shell_command_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let template = format!("sleep 1; touch {}", marker.display());

        let err = run_shell_command(&template, "m", dir.path(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Command killed after 0.10s"));

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!marker.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_module_command_does_not_finish() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let template = format!("sleep 1; touch {}", marker.display());
        let config = SchedulerConfig {
            task_timeout_secs: 0.1,
            ..Default::default()
        };

        let mut analyzer = ModuleDependencyAnalyzer::from_config(&config);
        let mut processor: ParallelProcessor<ModuleInfo, CommandOutput> =
            ParallelProcessor::from_config(&config);
        let process = shell_processor(template, dir.path().to_path_buf(), config.task_timeout());
        register_modules(&mut processor, &mut analyzer, &[ModuleInfo::new("slow")], process)
            .unwrap();

        let results = processor.process_all(None).await.unwrap();
        assert!(results["slow"].error().is_some());

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!marker.exists());
    }
}
