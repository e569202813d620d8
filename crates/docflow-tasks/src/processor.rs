//! Parallel processor: executes an execution plan level by level over a
//! bounded worker pool

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use docflow_core::{DuplicatePolicy, FailurePolicy, SchedulerConfig};

use crate::reporter::{TaskEvent, TaskReporter, TracingReporter};
use crate::resolver::{DependencyResolver, ExecutionPlan, GraphError};
use crate::stats::{ProcessingStatistics, TaskRecord, WorkerConfiguration};
use crate::strategy::{self, Completion, SharedWorkers, WorkerStrategy};
use crate::task::{Task, TaskError, TaskResult};

/// Progress callback: a label and the fraction of tasks finished so far
pub type ProgressCallback<'a> = &'a (dyn Fn(&str, f64) + Sync);

/// Options for the parallel processor
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Maximum tasks running at once
    pub max_workers: usize,
    /// Limit for a single task's execution
    pub task_timeout: Duration,
    /// Whether dependents of failed tasks still run
    pub failure_policy: FailurePolicy,
    /// How repeated task ids are handled
    pub duplicate_policy: DuplicatePolicy,
}

impl ProcessorOptions {
    /// Build options from scheduler configuration
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_workers: config.effective_max_workers(),
            task_timeout: config.task_timeout(),
            failure_policy: config.failure_policy,
            duplicate_policy: config.duplicate_policy,
        }
    }
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Errors that abort a whole run
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The task graph cannot be scheduled
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// `process_all` was already called on this processor
    #[error("This processor has already run; create a new one for another run")]
    AlreadyProcessed,
}

/// Runs registered tasks in dependency order with bounded concurrency.
///
/// One instance covers exactly one run: register tasks, call
/// [`process_all`](Self::process_all) once, then read statistics.
pub struct ParallelProcessor<P, R> {
    options: ProcessorOptions,
    strategy: Arc<dyn WorkerStrategy>,
    reporter: Arc<dyn TaskReporter>,
    resolver: DependencyResolver<P, R>,
    records: Vec<TaskRecord>,
    processed: bool,
}

impl<P, R> ParallelProcessor<P, R>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Create a processor running on [`SharedWorkers`]
    pub fn new(options: ProcessorOptions) -> Self {
        Self::with_strategy(options, Arc::new(SharedWorkers))
    }

    /// Create a processor running on the given strategy
    pub fn with_strategy(options: ProcessorOptions, strategy: Arc<dyn WorkerStrategy>) -> Self {
        let options = ProcessorOptions {
            max_workers: options.max_workers.max(1),
            ..options
        };
        info!(
            max_workers = options.max_workers,
            strategy = %strategy.kind(),
            timeout_secs = options.task_timeout.as_secs_f64(),
            "parallel processor initialized"
        );
        Self {
            resolver: DependencyResolver::new(options.duplicate_policy),
            options,
            strategy,
            reporter: Arc::new(TracingReporter),
            records: Vec::new(),
            processed: false,
        }
    }

    /// Create a processor from scheduler configuration
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::with_strategy(
            ProcessorOptions::from_config(config),
            Arc::from(strategy::strategy_for(config.strategy)),
        )
    }

    /// Replace the event reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn TaskReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Get the options in effect
    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Register a task for this run
    pub fn add_task(&mut self, task: Task<P, R>) -> Result<(), GraphError> {
        self.resolver.add_task(task)
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        self.resolver.len()
    }

    /// Resolve the execution plan without running anything
    pub fn plan(&self) -> Result<ExecutionPlan, GraphError> {
        self.resolver.resolve()
    }

    /// Human-readable rendering of the execution plan
    pub fn describe_plan(&self) -> Result<String, GraphError> {
        let plan = self.resolver.resolve()?;
        Ok(self.resolver.describe(&plan))
    }

    /// Run every registered task, level by level.
    ///
    /// A graph error aborts before anything runs. Task failures, panics and
    /// timeouts are captured in that task's result and never abort the run.
    /// Level `n + 1` starts only after every task of level `n` has a result.
    #[instrument(skip_all, fields(task_count = self.resolver.len()))]
    pub async fn process_all(
        &mut self,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<HashMap<String, TaskResult<R>>, SchedulerError> {
        if self.processed {
            return Err(SchedulerError::AlreadyProcessed);
        }

        let plan = self.resolver.resolve()?;
        self.processed = true;

        let total_tasks = plan.task_count();
        let mut results: HashMap<String, TaskResult<R>> = HashMap::with_capacity(total_tasks);
        if total_tasks == 0 {
            warn!("no tasks to process");
            return Ok(results);
        }

        info!(
            total_tasks,
            levels = plan.len(),
            "starting parallel processing"
        );
        let run_started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.max_workers));
        let level_count = plan.len();
        let mut completed = 0usize;

        for (level_idx, level) in plan.levels().iter().enumerate() {
            self.reporter.report(&TaskEvent::LevelStarted {
                level: level_idx,
                level_count,
                task_count: level.len(),
            });

            self.process_level(level, &semaphore, &mut results).await;

            let failed: Vec<&str> = level
                .iter()
                .filter(|id| results.get(*id).is_some_and(|r| !r.is_success()))
                .map(String::as_str)
                .collect();
            if !failed.is_empty() {
                error!(level = level_idx + 1, failed = ?failed, "tasks failed in level");
            }

            completed += level.len();
            notify_progress(
                progress,
                &format!("Completed level {}/{}", level_idx + 1, level_count),
                completed as f64 / total_tasks as f64,
            );
        }

        notify_progress(progress, "Processing complete", 1.0);

        self.records = results.values().map(TaskRecord::from).collect();
        let succeeded = self.records.iter().filter(|r| r.success).count();
        self.reporter.report(&TaskEvent::AllCompleted {
            total: self.records.len(),
            succeeded,
            failed: self.records.len() - succeeded,
            duration: run_started.elapsed(),
        });

        Ok(results)
    }

    async fn process_level(
        &self,
        level: &[String],
        semaphore: &Arc<Semaphore>,
        results: &mut HashMap<String, TaskResult<R>>,
    ) {
        let mut in_flight: JoinSet<TaskResult<R>> = JoinSet::new();

        // Submission follows the level's priority order; permits are handed
        // out first come first served, so with one worker tasks start in order.
        for task_id in level {
            let Some(task) = self.resolver.get(task_id) else {
                continue;
            };

            if let Some(reason) = self.skip_reason(task, results) {
                self.reporter.report(&TaskEvent::Skipped {
                    task_id: task_id.clone(),
                    reason: reason.to_string(),
                });
                results.insert(task_id.clone(), TaskResult::not_run(task_id, reason));
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let error = TaskError::WorkerLost(format!("worker pool closed: {}", e));
                    results.insert(task_id.clone(), TaskResult::not_run(task_id, error));
                    continue;
                }
            };

            self.reporter.report(&TaskEvent::Started {
                task_id: task_id.clone(),
            });

            let id = task_id.clone();
            let payload = Arc::clone(&task.payload);
            let processor = Arc::clone(&task.processor);
            let workers = Arc::clone(&self.strategy);
            let timeout = self.options.task_timeout;

            in_flight.spawn(async move {
                let started_at = Utc::now();
                let start = Instant::now();
                let handle = strategy::submit(workers.as_ref(), &id, move || {
                    processor(payload.as_ref())
                });

                let completion = match tokio::time::timeout(timeout, handle).await {
                    Ok(completion) => completion,
                    Err(_) => Completion {
                        outcome: Err(TaskError::TimedOut(timeout)),
                        worker: None,
                    },
                };
                let duration = start.elapsed();
                let finished_at = Utc::now().max(started_at);
                drop(permit);

                TaskResult {
                    task_id: id,
                    outcome: completion.outcome,
                    started_at,
                    finished_at,
                    duration,
                    worker: completion.worker,
                }
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(result) => {
                    self.report_outcome(&result);
                    results.insert(result.task_id.clone(), result);
                }
                Err(e) => error!(error = %e, "task supervisor ended abnormally"),
            }
        }

        // Every task of the level gets a result before the next level starts.
        for task_id in level {
            if !results.contains_key(task_id) {
                let error = TaskError::WorkerLost("task supervisor ended abnormally".to_string());
                results.insert(task_id.clone(), TaskResult::not_run(task_id, error));
            }
        }
    }

    fn skip_reason(
        &self,
        task: &Task<P, R>,
        results: &HashMap<String, TaskResult<R>>,
    ) -> Option<TaskError> {
        if self.options.failure_policy != FailurePolicy::SkipDependents {
            return None;
        }
        task.dependencies
            .iter()
            .find(|dep| results.get(*dep).is_some_and(|r| !r.is_success()))
            .map(|dep| TaskError::Skipped {
                dependency: dep.clone(),
            })
    }

    fn report_outcome(&self, result: &TaskResult<R>) {
        let task_id = result.task_id.clone();
        let event = match &result.outcome {
            Ok(_) => TaskEvent::Completed {
                task_id,
                duration: result.duration,
            },
            Err(TaskError::TimedOut(timeout)) => TaskEvent::TimedOut {
                task_id,
                timeout: *timeout,
            },
            Err(e) => TaskEvent::Failed {
                task_id,
                duration: result.duration,
                error: e.to_string(),
            },
        };
        self.reporter.report(&event);
    }

    /// Statistics over the last run; `None` before `process_all` has produced results
    pub fn get_processing_statistics(&self) -> Option<ProcessingStatistics> {
        ProcessingStatistics::from_records(
            &self.records,
            WorkerConfiguration {
                max_workers: self.options.max_workers,
                strategy: self.strategy.kind(),
                task_timeout_secs: self.options.task_timeout.as_secs_f64(),
            },
        )
    }
}

fn notify_progress(progress: Option<ProgressCallback<'_>>, label: &str, fraction: f64) {
    let Some(callback) = progress else { return };
    if catch_unwind(AssertUnwindSafe(|| callback(label, fraction))).is_err() {
        warn!(label, "progress callback panicked; continuing");
    }
}
