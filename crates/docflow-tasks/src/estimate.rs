//! Rough parallelism estimate for a set of modules

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::analyzer::{ModuleDependencyAnalyzer, ModuleInfo};

/// Seconds of processing assumed per complexity unit
pub const SECONDS_PER_COMPLEXITY_UNIT: f64 = 2.0;

/// How much a project stands to gain from parallel processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Potential {
    High,
    Moderate,
    Low,
}

impl Potential {
    /// Classify by the share of modules with no internal dependencies
    pub fn from_independent_share(share: f64) -> Self {
        if share > 0.7 {
            Self::High
        } else if share > 0.4 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated gain from processing a module set in parallel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelismEstimate {
    pub total_modules: usize,
    pub independent_modules: usize,
    pub modules_with_dependencies: usize,
    pub dependency_ratio: f64,
    pub estimated_sequential_secs: f64,
    pub estimated_parallel_secs: f64,
    pub estimated_speedup: f64,
    pub max_workers: usize,
    pub potential: Potential,
    pub recommendations: Vec<String>,
}

/// Analyze `modules` and estimate the speedup of running them on
/// `max_workers` workers. `None` when there are no modules.
pub fn estimate_parallelism(
    modules: &[ModuleInfo],
    analyzer: &mut ModuleDependencyAnalyzer,
    max_workers: usize,
) -> Option<ParallelismEstimate> {
    if modules.is_empty() {
        return None;
    }

    let max_workers = max_workers.max(1);
    let graph = analyzer.analyze(modules);

    // A repeated name is one module; the last definition wins, as it does
    // when the modules are registered as tasks.
    let distinct: BTreeMap<&str, &ModuleInfo> =
        modules.iter().map(|m| (m.name.as_str(), m)).collect();

    let total_modules = graph.len();
    let independent_modules = analyzer.independent_items().len();
    let modules_with_dependencies = graph.iter().filter(|(_, deps)| !deps.is_empty()).count();

    let total_complexity: f64 = distinct
        .values()
        .map(|m| analyzer.estimate_complexity(m))
        .sum();
    let estimated_sequential_secs = total_complexity * SECONDS_PER_COMPLEXITY_UNIT;
    let estimated_parallel_secs =
        total_complexity / max_workers as f64 * SECONDS_PER_COMPLEXITY_UNIT;
    let estimated_speedup = if estimated_parallel_secs > 0.0 {
        estimated_sequential_secs / estimated_parallel_secs
    } else {
        1.0
    };

    let independent_share = independent_modules as f64 / total_modules as f64;
    let recommendations = recommendations(total_modules, independent_share, estimated_speedup);

    debug!(
        total_modules,
        independent_modules, estimated_speedup, "estimated parallelism"
    );

    Some(ParallelismEstimate {
        total_modules,
        independent_modules,
        modules_with_dependencies,
        dependency_ratio: modules_with_dependencies as f64 / total_modules as f64,
        estimated_sequential_secs,
        estimated_parallel_secs,
        estimated_speedup,
        max_workers,
        potential: Potential::from_independent_share(independent_share),
        recommendations,
    })
}

fn recommendations(total_modules: usize, independent_share: f64, speedup: f64) -> Vec<String> {
    let mut out = Vec::new();

    if independent_share < 0.3 {
        out.push(
            "High dependency coupling detected; consider refactoring to reduce \
             inter-module dependencies"
                .to_string(),
        );
    }
    if speedup < 2.0 {
        out.push(
            "Limited parallel speedup expected; consider incremental builds instead".to_string(),
        );
    }
    if total_modules < 10 {
        out.push("Small project; parallel processing overhead may exceed benefits".to_string());
    }
    if speedup > 5.0 {
        out.push(
            "Excellent parallelization potential; parallel processing highly recommended"
                .to_string(),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn independent(count: usize) -> Vec<ModuleInfo> {
        (0..count).map(|i| ModuleInfo::new(format!("pkg.m{i}"))).collect()
    }

    #[test]
    fn test_empty_modules() {
        let mut analyzer = ModuleDependencyAnalyzer::new();
        assert!(estimate_parallelism(&[], &mut analyzer, 4).is_none());
    }

    #[test]
    fn test_independent_project() {
        let mut analyzer = ModuleDependencyAnalyzer::new();
        let estimate = estimate_parallelism(&independent(12), &mut analyzer, 8).unwrap();

        assert_eq!(estimate.total_modules, 12);
        assert_eq!(estimate.independent_modules, 12);
        assert_eq!(estimate.modules_with_dependencies, 0);
        assert_eq!(estimate.dependency_ratio, 0.0);
        assert!((estimate.estimated_sequential_secs - 24.0).abs() < 1e-9);
        assert!((estimate.estimated_parallel_secs - 3.0).abs() < 1e-9);
        assert!((estimate.estimated_speedup - 8.0).abs() < 1e-9);
        assert_eq!(estimate.potential, Potential::High);
        assert_eq!(estimate.recommendations.len(), 1);
        assert!(estimate.recommendations[0].starts_with("Excellent"));
    }

    #[test]
    fn test_coupled_small_project() {
        let modules = vec![
            ModuleInfo::new("a"),
            ModuleInfo::new("b").with_import("a"),
            ModuleInfo::new("c").with_import("b"),
            ModuleInfo::new("d").with_import("c"),
        ];
        let mut analyzer = ModuleDependencyAnalyzer::new();
        let estimate = estimate_parallelism(&modules, &mut analyzer, 1).unwrap();

        assert_eq!(estimate.independent_modules, 1);
        assert_eq!(estimate.modules_with_dependencies, 3);
        assert_eq!(estimate.dependency_ratio, 0.75);
        assert_eq!(estimate.potential, Potential::Low);
        assert_eq!(estimate.estimated_speedup, 1.0);

        let joined = estimate.recommendations.join("\n");
        assert!(joined.contains("High dependency coupling"));
        assert!(joined.contains("Limited parallel speedup"));
        assert!(joined.contains("Small project"));
        assert!(!joined.contains("Excellent"));
    }

    #[test]
    fn test_repeated_names_count_once() {
        let modules = vec![
            ModuleInfo::new("a"),
            ModuleInfo::new("b").with_import("a"),
            ModuleInfo::new("b").with_import("a").with_function("render"),
            ModuleInfo::new("c"),
        ];
        let mut analyzer = ModuleDependencyAnalyzer::new();
        let estimate = estimate_parallelism(&modules, &mut analyzer, 1).unwrap();

        assert_eq!(estimate.total_modules, 3);
        assert_eq!(estimate.independent_modules, 2);
        assert_eq!(estimate.modules_with_dependencies, 1);
        assert!((estimate.dependency_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(estimate.potential, Potential::Moderate);
        // a = 1.0, b = 1.0 + 0.1 + 0.02 (last definition), c = 1.0
        assert!((estimate.estimated_sequential_secs - 2.0 * 3.12).abs() < 1e-9);
    }

    #[test]
    fn test_zero_workers_treated_as_one() {
        let mut analyzer = ModuleDependencyAnalyzer::new();
        let estimate = estimate_parallelism(&independent(2), &mut analyzer, 0).unwrap();
        assert_eq!(estimate.max_workers, 1);
        assert_eq!(estimate.estimated_speedup, 1.0);
    }

    #[test]
    fn test_potential_thresholds() {
        assert_eq!(Potential::from_independent_share(0.71), Potential::High);
        assert_eq!(Potential::from_independent_share(0.7), Potential::Moderate);
        assert_eq!(Potential::from_independent_share(0.41), Potential::Moderate);
        assert_eq!(Potential::from_independent_share(0.4), Potential::Low);
        assert_eq!(Potential::High.to_string(), "high");
    }
}
