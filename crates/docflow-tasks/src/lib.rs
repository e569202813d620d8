//! Docflow Tasks - dependency-aware parallel task scheduling
//!
//! This crate resolves task dependencies into execution levels, runs each
//! level over a bounded worker pool, and derives scheduling hints from a
//! module dependency analysis.

pub mod analyzer;
pub mod estimate;
pub mod pipeline;
pub mod processor;
pub mod reporter;
pub mod resolver;
pub mod stats;
pub mod strategy;
pub mod task;

pub use analyzer::{
    inverse_complexity_priority, load_manifest, reduce_transitive, ClassInfo, DependencyGraph,
    ModuleDependencyAnalyzer, ModuleHint, ModuleInfo, PriorityFn,
};
pub use estimate::{estimate_parallelism, ParallelismEstimate, Potential};
pub use pipeline::register_modules;
pub use processor::{ParallelProcessor, ProcessorOptions, ProgressCallback, SchedulerError};
pub use reporter::{
    CollectingReporter, TaskEvent, TaskReporter, TaskReporterRegistry, TracingReporter,
};
pub use resolver::{BlockedTask, DependencyResolver, ExecutionPlan, GraphError};
pub use stats::{ProcessingStatistics, TaskRecord, WorkerConfiguration};
pub use strategy::{strategy_for, IsolatedWorkers, SharedWorkers, WorkerStrategy};
pub use task::{Processor, Task, TaskError, TaskErrorKind, TaskResult};
