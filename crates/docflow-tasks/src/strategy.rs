//! Worker strategies: where processing closures actually run.
//!
//! Both strategies run closures in-process on OS threads. Rust has no global
//! interpreter lock, so either one gives real CPU parallelism up to the
//! worker limit. Neither can stop a closure once it has started: safe Rust
//! offers no way to kill a thread. When a task times out the scheduler
//! records the timeout and abandons the job; the closure keeps running until
//! it returns and its value is dropped. [`WorkerStrategy::can_terminate`]
//! reports this so callers never assume otherwise.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use docflow_core::WorkerKind;

use crate::task::TaskError;

/// Type-erased unit of work handed to a strategy
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// What a worker reports back for one job
#[derive(Debug)]
pub struct Completion<R> {
    /// Value or captured error
    pub outcome: Result<R, TaskError>,
    /// Name of the thread that ran the job
    pub worker: Option<String>,
}

/// Future resolving once the submitted closure has finished
pub type WorkerHandle<R> = Pin<Box<dyn Future<Output = Completion<R>> + Send>>;

/// Substrate that runs jobs off the orchestrating task
pub trait WorkerStrategy: Send + Sync + fmt::Debug {
    /// Which substrate this is
    fn kind(&self) -> WorkerKind;

    /// Whether a running job can be forcibly stopped on timeout
    fn can_terminate(&self) -> bool {
        false
    }

    /// Start `job` on a worker. `label` names the job for thread names and logs.
    fn dispatch(&self, label: &str, job: Job) -> std::io::Result<()>;
}

/// Run `work` on `strategy` and get a future for its outcome.
///
/// Errors returned by `work` become [`TaskError::Failed`], panics become
/// [`TaskError::Panicked`], and a worker that disappears without reporting
/// yields [`TaskError::WorkerLost`].
pub fn submit<S, R, F>(strategy: &S, label: &str, work: F) -> WorkerHandle<R>
where
    S: WorkerStrategy + ?Sized,
    R: Send + 'static,
    F: FnOnce() -> anyhow::Result<R> + Send + 'static,
{
    let (tx, rx) = oneshot::channel::<Completion<R>>();

    let job: Job = Box::new(move || {
        let worker = std::thread::current().name().map(str::to_string);
        let outcome = match catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskError::from_anyhow(&err)),
            Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
        };
        // The receiver is gone when the task already timed out.
        let _ = tx.send(Completion { outcome, worker });
    });

    if let Err(e) = strategy.dispatch(label, job) {
        warn!(task_id = label, strategy = %strategy.kind(), error = %e, "failed to dispatch job");
        let reason = format!("could not start worker: {}", e);
        return Box::pin(async move {
            Completion {
                outcome: Err(TaskError::WorkerLost(reason)),
                worker: None,
            }
        });
    }

    let label = label.to_string();
    Box::pin(async move {
        rx.await.unwrap_or_else(|_| {
            debug!(task_id = %label, "worker dropped job without reporting");
            Completion {
                outcome: Err(TaskError::WorkerLost(format!(
                    "worker for '{}' exited without a result",
                    label
                ))),
                worker: None,
            }
        })
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Jobs run on tokio's blocking thread pool; threads are reused across tasks.
///
/// Requires a tokio runtime on the dispatching thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedWorkers;

impl WorkerStrategy for SharedWorkers {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Shared
    }

    fn dispatch(&self, _label: &str, job: Job) -> std::io::Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        // Detached: completion is observed through the job's channel.
        drop(handle.spawn_blocking(job));
        Ok(())
    }
}

/// Each job runs on its own freshly spawned thread named `docflow-worker-<label>`.
///
/// Nothing is reused between tasks, so thread-local state never leaks from
/// one task into another.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsolatedWorkers;

impl WorkerStrategy for IsolatedWorkers {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Isolated
    }

    fn dispatch(&self, label: &str, job: Job) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name(format!("docflow-worker-{}", label))
            .spawn(job)
            .map(drop)
    }
}

/// Build the strategy selected in configuration
pub fn strategy_for(kind: WorkerKind) -> Box<dyn WorkerStrategy> {
    match kind {
        WorkerKind::Shared => Box::new(SharedWorkers),
        WorkerKind::Isolated => Box::new(IsolatedWorkers),
    }
}
