//! Registering analyzed modules as processor tasks

use std::sync::Arc;

use tracing::info;

use crate::analyzer::{DependencyGraph, ModuleDependencyAnalyzer, ModuleInfo};
use crate::processor::ParallelProcessor;
use crate::resolver::GraphError;
use crate::task::Task;

/// Analyze `modules` and register one task per module on `processor`.
///
/// Each task carries its module as payload, the reduced dependency set, the
/// analyzer's priority, and the complexity score as duration estimate.
/// Returns the dependency graph used.
pub fn register_modules<R, F>(
    processor: &mut ParallelProcessor<ModuleInfo, R>,
    analyzer: &mut ModuleDependencyAnalyzer,
    modules: &[ModuleInfo],
    process: F,
) -> Result<DependencyGraph, GraphError>
where
    R: Send + 'static,
    F: Fn(&ModuleInfo) -> anyhow::Result<R> + Send + Sync + 'static,
{
    let graph = analyzer.analyze(modules);
    let process = Arc::new(process);

    for (module, hint) in modules.iter().zip(analyzer.schedule_hints(modules)) {
        let process = Arc::clone(&process);
        let task = Task::new(hint.name, module.clone(), move |m: &ModuleInfo| process(m))
            .with_dependencies(hint.dependencies)
            .with_priority(hint.priority)
            .with_duration_estimate(hint.complexity);
        processor.add_task(task)?;
    }

    info!(
        modules = modules.len(),
        dependencies = graph.edge_count(),
        "registered module tasks"
    );
    Ok(graph)
}
