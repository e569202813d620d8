//! Docflow Core - Shared configuration for the documentation scheduler
//!
//! This crate provides the error types, scheduler configuration, and the
//! config file loading/validation used by the task engine and the CLI.

pub mod config;
pub mod error;

pub use config::{
    ComplexityWeights, DuplicatePolicy, FailurePolicy, PrioritySettings, SchedulerConfig,
    WorkerKind,
};
pub use error::{ConfigError, DocflowError, Result};
