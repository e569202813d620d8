//! Task execution reporting

use std::sync::Arc;
use std::time::Duration;

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A level is about to be submitted
    LevelStarted {
        level: usize,
        level_count: usize,
        task_count: usize,
    },
    /// A task acquired a worker slot and was submitted
    Started { task_id: String },
    /// A task produced a value
    Completed { task_id: String, duration: Duration },
    /// A task's processor returned an error or panicked
    Failed {
        task_id: String,
        duration: Duration,
        error: String,
    },
    /// A task exceeded the per-task timeout and was abandoned
    TimedOut { task_id: String, timeout: Duration },
    /// A task was not run
    Skipped { task_id: String, reason: String },
    /// Every level has finished
    AllCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::LevelStarted {
                level,
                level_count,
                task_count,
            } => {
                tracing::info!(
                    "Processing level {}/{}: {} tasks",
                    level + 1,
                    level_count,
                    task_count
                );
            }
            TaskEvent::Started { task_id } => {
                tracing::debug!(task_id = %task_id, "task started");
            }
            TaskEvent::Completed { task_id, duration } => {
                tracing::debug!("{} completed in {:.2}s", task_id, duration.as_secs_f64());
            }
            TaskEvent::Failed {
                task_id,
                duration,
                error,
            } => {
                tracing::error!(
                    "{} failed after {:.2}s: {}",
                    task_id,
                    duration.as_secs_f64(),
                    error
                );
            }
            TaskEvent::TimedOut { task_id, timeout } => {
                tracing::error!("{} timed out after {:.2}s", task_id, timeout.as_secs_f64());
            }
            TaskEvent::Skipped { task_id, reason } => {
                tracing::warn!("{} skipped: {}", task_id, reason);
            }
            TaskEvent::AllCompleted {
                total,
                succeeded,
                failed,
                duration,
            } => {
                tracing::info!(
                    "Parallel processing complete: {}/{} successful, {} failed ({:.2}s)",
                    succeeded,
                    total,
                    failed,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Registry of task reporters
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: TaskReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    pub fn register_shared(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn TaskReporter>] {
        &self.reporters
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskReporter for TaskReporterRegistry {
    /// Broadcast an event to all registered reporters
    fn report(&self, event: &TaskEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}
