//! Configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::default_max_workers;

/// Main configuration for the docflow scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrent workers (defaults to `min(32, cores + 4)`)
    pub max_workers: Option<usize>,

    /// Which worker substrate runs the processing closures
    pub strategy: WorkerKind,

    /// Per-task timeout in seconds
    pub task_timeout_secs: f64,

    /// What happens to dependents of a failed task
    pub failure_policy: FailurePolicy,

    /// What happens when a task id is registered twice
    pub duplicate_policy: DuplicatePolicy,

    /// Weights used when estimating module complexity
    pub complexity: ComplexityWeights,

    /// How complexity is turned into a scheduling priority
    pub priority: PrioritySettings,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            strategy: WorkerKind::default(),
            task_timeout_secs: 300.0,
            failure_policy: FailurePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            complexity: ComplexityWeights::default(),
            priority: PrioritySettings::default(),
        }
    }
}

impl SchedulerConfig {
    /// Worker count to use, falling back to the hardware-derived default
    pub fn effective_max_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(default_max_workers)
    }

    /// Per-task timeout as a duration; values too large for a `Duration`
    /// saturate and anything else unrepresentable yields zero
    pub fn task_timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.task_timeout_secs) {
            Ok(timeout) => timeout,
            Err(_) if self.task_timeout_secs > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }
}

/// Worker substrate selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Pooled threads shared between tasks
    #[default]
    Shared,
    /// A dedicated thread per task
    Isolated,
}

impl WorkerKind {
    /// Name used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Isolated => "isolated",
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavior for tasks whose dependency failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Dependents still run after a dependency failed
    #[default]
    RunDependents,
    /// Dependents of a failed (or skipped) task are recorded as skipped
    SkipDependents,
}

/// Behavior when the same task id is registered more than once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The later registration replaces the earlier one in place
    #[default]
    Replace,
    /// The later registration is rejected with an error
    Reject,
}

/// Weights for the structural complexity estimate of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityWeights {
    /// Score every module starts with
    pub base: f64,
    /// Per top-level function
    pub function: f64,
    /// Per class
    pub class: f64,
    /// Per method of each class
    pub method: f64,
    /// Per property of each class
    pub property: f64,
    /// Per import
    pub import: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            base: 1.0,
            function: 0.1,
            class: 0.2,
            method: 0.05,
            property: 0.03,
            import: 0.02,
        }
    }
}

/// Parameters of the default complexity-to-priority mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritySettings {
    /// Priority given to a module of zero complexity
    pub ceiling: i32,
    /// Priority lost per unit of complexity
    pub scale: f64,
}

impl Default for PrioritySettings {
    fn default() -> Self {
        Self {
            ceiling: 100,
            scale: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert!(config.max_workers.is_none());
        assert_eq!(config.strategy, WorkerKind::Shared);
        assert_eq!(config.task_timeout(), Duration::from_secs(300));
        assert_eq!(config.failure_policy, FailurePolicy::RunDependents);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
    }

    #[test]
    fn test_effective_max_workers() {
        let mut config = SchedulerConfig::default();
        assert!(config.effective_max_workers() >= 5);
        assert!(config.effective_max_workers() <= 32);

        config.max_workers = Some(3);
        assert_eq!(config.effective_max_workers(), 3);
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let yaml = "strategy: isolated\nfailure_policy: skip_dependents\ncomplexity:\n  class: 0.5\n";
        let config: SchedulerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.strategy, WorkerKind::Isolated);
        assert_eq!(config.failure_policy, FailurePolicy::SkipDependents);
        assert_eq!(config.complexity.class, 0.5);
        assert_eq!(config.complexity.base, 1.0);
        assert_eq!(config.task_timeout_secs, 300.0);
    }

    #[test]
    fn test_task_timeout_saturates() {
        let mut config = SchedulerConfig {
            task_timeout_secs: 1e20,
            ..Default::default()
        };
        assert_eq!(config.task_timeout(), Duration::MAX);

        config.task_timeout_secs = f64::INFINITY;
        assert_eq!(config.task_timeout(), Duration::MAX);

        config.task_timeout_secs = f64::NAN;
        assert_eq!(config.task_timeout(), Duration::ZERO);

        config.task_timeout_secs = 0.25;
        assert_eq!(config.task_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_worker_kind_display() {
        assert_eq!(WorkerKind::Shared.to_string(), "shared");
        assert_eq!(WorkerKind::Isolated.to_string(), "isolated");
    }
}
