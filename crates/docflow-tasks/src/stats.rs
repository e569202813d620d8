//! Aggregate statistics derived from collected results

use std::time::Duration;

use serde::Serialize;

use docflow_core::WorkerKind;

use crate::task::{TaskErrorKind, TaskResult};

/// What the statistics keep from each result
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub task_id: String,
    pub success: bool,
    pub timed_out: bool,
    pub duration: Duration,
}

impl<R> From<&TaskResult<R>> for TaskRecord {
    fn from(result: &TaskResult<R>) -> Self {
        Self {
            task_id: result.task_id.clone(),
            success: result.is_success(),
            timed_out: result
                .error()
                .is_some_and(|e| e.kind() == TaskErrorKind::TimedOut),
            duration: result.duration,
        }
    }
}

/// Worker settings the statistics were gathered under
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerConfiguration {
    pub max_workers: usize,
    pub strategy: WorkerKind,
    pub task_timeout_secs: f64,
}

/// Processing statistics for one run. Times are in seconds; average, min and
/// max cover successful tasks only and are 0 when none succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStatistics {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub success_rate: f64,
    pub total_processing_time: f64,
    pub successful_processing_time: f64,
    pub average_task_time: f64,
    pub min_task_time: f64,
    pub max_task_time: f64,
    pub failed_task_ids: Vec<String>,
    pub timed_out_task_ids: Vec<String>,
    pub worker_configuration: WorkerConfiguration,
}

impl ProcessingStatistics {
    /// Compute statistics; `None` when there are no records
    pub fn from_records(records: &[TaskRecord], workers: WorkerConfiguration) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let successful: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.duration.as_secs_f64())
            .collect();

        let mut failed_task_ids: Vec<String> = records
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.task_id.clone())
            .collect();
        failed_task_ids.sort();

        let mut timed_out_task_ids: Vec<String> = records
            .iter()
            .filter(|r| r.timed_out)
            .map(|r| r.task_id.clone())
            .collect();
        timed_out_task_ids.sort();

        let total_processing_time = records.iter().map(|r| r.duration.as_secs_f64()).sum();
        let successful_processing_time: f64 = successful.iter().sum();
        let average_task_time = if successful.is_empty() {
            0.0
        } else {
            successful_processing_time / successful.len() as f64
        };

        Some(Self {
            total_tasks: records.len(),
            successful_tasks: successful.len(),
            failed_tasks: failed_task_ids.len(),
            success_rate: successful.len() as f64 / records.len() as f64,
            total_processing_time,
            successful_processing_time,
            average_task_time,
            min_task_time: successful.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_task_time: successful.iter().copied().reduce(f64::max).unwrap_or(0.0),
            failed_task_ids,
            timed_out_task_ids,
            worker_configuration: workers,
        })
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{}/{} tasks successful ({:.1}%), total time {:.2}s, avg {:.2}s",
            self.successful_tasks,
            self.total_tasks,
            self.success_rate * 100.0,
            self.total_processing_time,
            self.average_task_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers() -> WorkerConfiguration {
        WorkerConfiguration {
            max_workers: 4,
            strategy: WorkerKind::Shared,
            task_timeout_secs: 300.0,
        }
    }

    fn record(id: &str, success: bool, millis: u64) -> TaskRecord {
        TaskRecord {
            task_id: id.to_string(),
            success,
            timed_out: false,
            duration: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_no_records() {
        assert!(ProcessingStatistics::from_records(&[], workers()).is_none());
    }

    #[test]
    fn test_mixed_records() {
        let mut timed_out = record("slow", false, 10);
        timed_out.timed_out = true;
        let records = vec![
            record("b", true, 1000),
            record("a", true, 3000),
            record("zeta", false, 500),
            timed_out,
        ];

        let stats = ProcessingStatistics::from_records(&records, workers()).unwrap();
        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.successful_tasks, 2);
        assert_eq!(stats.failed_tasks, 2);
        assert_eq!(stats.success_rate, 0.5);
        assert!((stats.total_processing_time - 4.51).abs() < 1e-9);
        assert!((stats.successful_processing_time - 4.0).abs() < 1e-9);
        assert!((stats.average_task_time - 2.0).abs() < 1e-9);
        assert!((stats.min_task_time - 1.0).abs() < 1e-9);
        assert!((stats.max_task_time - 3.0).abs() < 1e-9);
        assert_eq!(stats.failed_task_ids, vec!["slow", "zeta"]);
        assert_eq!(stats.timed_out_task_ids, vec!["slow"]);
    }

    #[test]
    fn test_all_failed() {
        let stats =
            ProcessingStatistics::from_records(&[record("x", false, 20)], workers()).unwrap();
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_task_time, 0.0);
        assert_eq!(stats.min_task_time, 0.0);
        assert_eq!(stats.max_task_time, 0.0);
    }

    #[test]
    fn test_serializes_to_json() {
        let stats =
            ProcessingStatistics::from_records(&[record("x", true, 20)], workers()).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_tasks"], 1);
        assert_eq!(json["worker_configuration"]["strategy"], "shared");
        assert!(stats.summary().starts_with("1/1 tasks successful (100.0%)"));
    }
}
