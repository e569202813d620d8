//! Task and result records

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Processing closure shared between a task and the worker that runs it
pub type Processor<P, R> = Arc<dyn Fn(&P) -> anyhow::Result<R> + Send + Sync>;

/// A named unit of work: a payload, the closure that processes it, and its
/// scheduling metadata
pub struct Task<P, R> {
    /// Unique key within one scheduling run
    pub id: String,
    /// Input handed to the processor
    pub payload: Arc<P>,
    /// Closure producing the task's value
    pub processor: Processor<P, R>,
    /// Ids of tasks that must finish before this one starts
    pub dependencies: BTreeSet<String>,
    /// Higher runs earlier within its level
    pub priority: i32,
    /// Informational only; never used for ordering
    pub duration_estimate: f64,
}

impl<P, R> Task<P, R> {
    /// Create a task with no dependencies, priority 0 and a duration estimate of 1.0
    pub fn new<F>(id: impl Into<String>, payload: P, processor: F) -> Self
    where
        F: Fn(&P) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            payload: Arc::new(payload),
            processor: Arc::new(processor),
            dependencies: BTreeSet::new(),
            priority: 0,
            duration_estimate: 1.0,
        }
    }

    /// Add a single dependency
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Add several dependencies
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the informational duration estimate (seconds)
    pub fn with_duration_estimate(mut self, estimate: f64) -> Self {
        self.duration_estimate = estimate;
        self
    }
}

impl<P, R> fmt::Debug for Task<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("duration_estimate", &self.duration_estimate)
            .finish_non_exhaustive()
    }
}

/// Why a task did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The processor returned an error
    #[error("Task failed: {0}")]
    Failed(String),

    /// The processor panicked
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The processor did not finish within the per-task timeout
    #[error("Task timed out after {:.2}s", .0.as_secs_f64())]
    TimedOut(Duration),

    /// Not run because a dependency did not succeed
    #[error("Task skipped: dependency '{dependency}' did not succeed")]
    Skipped { dependency: String },

    /// The worker went away without reporting an outcome
    #[error("Worker lost: {0}")]
    WorkerLost(String),
}

/// Discriminant of [`TaskError`] for matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskErrorKind {
    Failed,
    Panicked,
    TimedOut,
    Skipped,
    WorkerLost,
}

impl TaskError {
    /// Build a failure from a processor error, keeping the full context chain
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self::Failed(format!("{:#}", err))
    }

    /// Get the kind of this error
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            Self::Failed(_) => TaskErrorKind::Failed,
            Self::Panicked(_) => TaskErrorKind::Panicked,
            Self::TimedOut(_) => TaskErrorKind::TimedOut,
            Self::Skipped { .. } => TaskErrorKind::Skipped,
            Self::WorkerLost(_) => TaskErrorKind::WorkerLost,
        }
    }

    /// Check whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Outcome of one task in one run
#[derive(Debug, Clone)]
pub struct TaskResult<R> {
    /// Task that produced this result
    pub task_id: String,
    /// The value on success, the error otherwise
    pub outcome: Result<R, TaskError>,
    /// When the task started (or was skipped)
    pub started_at: DateTime<Utc>,
    /// When the outcome was recorded
    pub finished_at: DateTime<Utc>,
    /// Elapsed time between start and finish
    pub duration: Duration,
    /// Name of the worker thread that ran the task, when known
    pub worker: Option<String>,
}

impl<R> TaskResult<R> {
    /// Check if the task produced a value
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The value, if the task succeeded
    pub fn value(&self) -> Option<&R> {
        self.outcome.as_ref().ok()
    }

    /// The error, if the task failed
    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }

    /// Consume the result, returning the value if there is one
    pub fn into_value(self) -> Option<R> {
        self.outcome.ok()
    }

    /// Result for a task that never ran
    pub(crate) fn not_run(task_id: impl Into<String>, error: TaskError) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            outcome: Err(error),
            started_at: now,
            finished_at: now,
            duration: Duration::ZERO,
            worker: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task: Task<i32, i32> = Task::new("render", 21, |x| Ok(x * 2))
            .with_dependency("parse")
            .with_dependencies(["index", "parse"])
            .with_priority(5)
            .with_duration_estimate(2.5);

        assert_eq!(task.id, "render");
        assert_eq!(*task.payload, 21);
        assert_eq!(task.dependencies.len(), 2);
        assert!(task.dependencies.contains("index"));
        assert_eq!(task.priority, 5);
        assert_eq!(task.duration_estimate, 2.5);
        assert_eq!((task.processor)(task.payload.as_ref()).unwrap(), 42);
    }

    #[test]
    fn test_task_defaults() {
        let task: Task<(), ()> = Task::new("noop", (), |_| Ok(()));
        assert!(task.dependencies.is_empty());
        assert_eq!(task.priority, 0);
        assert_eq!(task.duration_estimate, 1.0);
    }

    #[test]
    fn test_task_debug_omits_processor() {
        let task: Task<(), ()> = Task::new("noop", (), |_| Ok(()));
        let rendered = format!("{:?}", task);
        assert!(rendered.contains("noop"));
        assert!(!rendered.contains("processor"));
    }

    #[test]
    fn test_result_success() {
        let result = TaskResult {
            task_id: "a".to_string(),
            outcome: Ok("done"),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration: Duration::from_millis(5),
            worker: None,
        };
        assert!(result.is_success());
        assert_eq!(result.value(), Some(&"done"));
        assert!(result.error().is_none());
        assert_eq!(result.into_value(), Some("done"));
    }

    #[test]
    fn test_result_failure() {
        let result: TaskResult<()> =
            TaskResult::not_run("b", TaskError::TimedOut(Duration::from_millis(10)));
        assert!(!result.is_success());
        assert!(result.value().is_none());
        assert_eq!(result.error().unwrap().kind(), TaskErrorKind::TimedOut);
        assert!(result.finished_at >= result.started_at);
    }

    #[test]
    fn test_error_from_anyhow_keeps_context() {
        let err = anyhow::anyhow!("disk full").context("writing index.md");
        let task_err = TaskError::from_anyhow(&err);
        assert_eq!(task_err.to_string(), "Task failed: writing index.md: disk full");
        assert_eq!(task_err.kind(), TaskErrorKind::Failed);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TaskError::TimedOut(Duration::from_millis(1500)).to_string(),
            "Task timed out after 1.50s"
        );
        assert_eq!(
            TaskError::Skipped {
                dependency: "core".to_string()
            }
            .to_string(),
            "Task skipped: dependency 'core' did not succeed"
        );
        assert!(TaskError::TimedOut(Duration::ZERO).is_timeout());
    }
}
