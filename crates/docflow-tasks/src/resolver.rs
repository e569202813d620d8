//! Dependency resolution into execution levels

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use docflow_core::DuplicatePolicy;

use crate::task::Task;

/// Ordered groups of task ids; every dependency of a task sits in an earlier level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    levels: Vec<Vec<String>>,
}

impl ExecutionPlan {
    /// Get the levels, first to run first
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Number of levels
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the plan has no levels
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Total number of tasks across all levels
    pub fn task_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Index of the level containing `task_id`
    pub fn level_of(&self, task_id: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|id| id == task_id))
    }
}

/// A task that could not be placed in any level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
    /// The blocked task
    pub task_id: String,
    /// Dependencies that were never registered
    pub missing: Vec<String>,
    /// Registered dependencies that could not be placed either
    pub waiting_on: Vec<String>,
}

impl fmt::Display for BlockedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.task_id)?;
        if !self.missing.is_empty() {
            write!(f, " -> missing [{}]", self.missing.join(", "))?;
        }
        if !self.waiting_on.is_empty() {
            write!(f, " -> waiting on [{}]", self.waiting_on.join(", "))?;
        }
        Ok(())
    }
}

/// Errors that make a task graph unschedulable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A task id was registered twice under [`DuplicatePolicy::Reject`]
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    /// Remaining tasks can never become ready (cycle or unregistered dependency)
    #[error("Circular dependency or missing tasks detected: {}", render_blocked(.blocked))]
    Unresolvable { blocked: Vec<BlockedTask> },
}

fn render_blocked(blocked: &[BlockedTask]) -> String {
    blocked
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl GraphError {
    /// Tasks that could not be placed (empty for duplicate registrations)
    pub fn blocked(&self) -> &[BlockedTask] {
        match self {
            Self::Unresolvable { blocked } => blocked,
            Self::DuplicateTask(_) => &[],
        }
    }

    /// Dependency ids that were referenced but never registered
    pub fn missing_dependencies(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .blocked()
            .iter()
            .flat_map(|b| b.missing.iter().cloned())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Blocked tasks that lie on a dependency cycle
    pub fn cycle_members(&self) -> Vec<String> {
        let edges: HashMap<&str, &[String]> = self
            .blocked()
            .iter()
            .map(|b| (b.task_id.as_str(), b.waiting_on.as_slice()))
            .collect();

        let mut members: Vec<String> = edges
            .keys()
            .filter(|start| reaches_itself(start, &edges))
            .map(|id| id.to_string())
            .collect();
        members.sort();
        members
    }
}

fn reaches_itself(start: &str, edges: &HashMap<&str, &[String]>) -> bool {
    let mut stack: Vec<&str> = edges
        .get(start)
        .map(|deps| deps.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut seen: HashSet<&str> = HashSet::new();

    while let Some(node) = stack.pop() {
        if node == start {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(deps) = edges.get(node) {
            stack.extend(deps.iter().map(String::as_str));
        }
    }
    false
}

/// Holds the tasks of one run and partitions them into levels
pub struct DependencyResolver<P, R> {
    tasks: Vec<Task<P, R>>,
    index: HashMap<String, usize>,
    duplicate_policy: DuplicatePolicy,
}

impl<P, R> DependencyResolver<P, R> {
    /// Create an empty resolver
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
            duplicate_policy,
        }
    }

    /// Register a task.
    ///
    /// Under [`DuplicatePolicy::Replace`] a repeated id replaces the earlier
    /// task but keeps its registration position; under
    /// [`DuplicatePolicy::Reject`] it fails.
    pub fn add_task(&mut self, task: Task<P, R>) -> Result<(), GraphError> {
        debug!(
            task_id = %task.id,
            dependencies = ?task.dependencies,
            priority = task.priority,
            "adding task"
        );

        match self.index.get(&task.id) {
            Some(&position) => match self.duplicate_policy {
                DuplicatePolicy::Replace => {
                    warn!(task_id = %task.id, "task id registered twice, replacing");
                    self.tasks[position] = task;
                }
                DuplicatePolicy::Reject => return Err(GraphError::DuplicateTask(task.id)),
            },
            None => {
                self.index.insert(task.id.clone(), self.tasks.len());
                self.tasks.push(task);
            }
        }
        Ok(())
    }

    /// Get a registered task
    pub fn get(&self, task_id: &str) -> Option<&Task<P, R>> {
        self.index.get(task_id).map(|&i| &self.tasks[i])
    }

    /// Registered tasks in registration order
    pub fn tasks(&self) -> &[Task<P, R>] {
        &self.tasks
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if no task is registered
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Partition the registered tasks into levels.
    ///
    /// Each level holds every not-yet-placed task whose dependencies all sit
    /// in earlier levels, sorted by descending priority with ties kept in
    /// registration order.
    #[instrument(skip_all, fields(task_count = self.tasks.len()))]
    pub fn resolve(&self) -> Result<ExecutionPlan, GraphError> {
        let mut placed: HashSet<&str> = HashSet::with_capacity(self.tasks.len());
        let mut remaining: Vec<&Task<P, R>> = self.tasks.iter().collect();
        let mut levels: Vec<Vec<String>> = Vec::new();

        while !remaining.is_empty() {
            let (mut ready, blocked): (Vec<&Task<P, R>>, Vec<&Task<P, R>>) =
                remaining.into_iter().partition(|task| {
                    task.dependencies
                        .iter()
                        .all(|dep| placed.contains(dep.as_str()))
                });

            if ready.is_empty() {
                return Err(self.unresolvable(&blocked));
            }

            ready.sort_by(|a, b| b.priority.cmp(&a.priority));
            placed.extend(ready.iter().map(|task| task.id.as_str()));
            levels.push(ready.iter().map(|task| task.id.clone()).collect());
            remaining = blocked;
        }

        info!(
            task_count = self.tasks.len(),
            level_count = levels.len(),
            "resolved tasks into execution levels"
        );
        Ok(ExecutionPlan { levels })
    }

    fn unresolvable(&self, blocked: &[&Task<P, R>]) -> GraphError {
        let blocked = blocked
            .iter()
            .map(|task| {
                let (missing, waiting_on): (Vec<String>, Vec<String>) = task
                    .dependencies
                    .iter()
                    .cloned()
                    .partition(|dep| !self.index.contains_key(dep));
                BlockedTask {
                    task_id: task.id.clone(),
                    missing,
                    waiting_on,
                }
            })
            .collect();
        GraphError::Unresolvable { blocked }
    }

    /// Human-readable rendering of a plan produced by this resolver
    pub fn describe(&self, plan: &ExecutionPlan) -> String {
        let mut out = String::new();
        for (i, level) in plan.levels().iter().enumerate() {
            out.push_str(&format!("Level {} ({} tasks):\n", i, level.len()));
            for id in level {
                let Some(task) = self.get(id) else { continue };
                if task.dependencies.is_empty() {
                    out.push_str(&format!("  {} (priority {})\n", id, task.priority));
                } else {
                    let deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
                    out.push_str(&format!(
                        "  {} (priority {}, after: {})\n",
                        id,
                        task.priority,
                        deps.join(", ")
                    ));
                }
            }
        }
        out
    }
}

impl<P, R> Default for DependencyResolver<P, R> {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn task(id: &str) -> Task<(), ()> {
        Task::new(id, (), |_| Ok(()))
    }

    fn resolver_with(tasks: Vec<Task<(), ()>>) -> DependencyResolver<(), ()> {
        let mut resolver = DependencyResolver::default();
        for t in tasks {
            resolver.add_task(t).unwrap();
        }
        resolver
    }

    #[test]
    fn test_independent_tasks_single_level() {
        let resolver = resolver_with(vec![task("task1"), task("task2")]);
        let plan = resolver.resolve().unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.levels()[0], vec!["task1", "task2"]);
    }

    #[test]
    fn test_dependencies_split_levels() {
        let resolver = resolver_with(vec![
            task("A"),
            task("B").with_dependency("A"),
            task("C"),
        ]);
        let plan = resolver.resolve().unwrap();

        assert_eq!(plan.levels(), &[vec!["A", "C"], vec!["B"]]);
        assert_eq!(plan.level_of("B"), Some(1));
        assert_eq!(plan.task_count(), 3);
    }

    #[test]
    fn test_priority_ordering_within_level() {
        let resolver = resolver_with(vec![
            task("task1").with_priority(1),
            task("task2").with_priority(5),
            task("task3").with_priority(3),
        ]);
        let plan = resolver.resolve().unwrap();

        assert_eq!(plan.levels()[0], vec!["task2", "task3", "task1"]);
    }

    #[test]
    fn test_priority_ties_keep_registration_order() {
        let resolver = resolver_with(vec![
            task("c").with_priority(1),
            task("a").with_priority(1),
            task("b").with_priority(2),
        ]);
        let plan = resolver.resolve().unwrap();

        assert_eq!(plan.levels()[0], vec!["b", "c", "a"]);
    }

    #[test]
    fn test_empty_resolver_yields_empty_plan() {
        let resolver: DependencyResolver<(), ()> = DependencyResolver::default();
        let plan = resolver.resolve().unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_mutual_cycle_is_error() {
        let resolver = resolver_with(vec![
            task("X").with_dependency("Y"),
            task("Y").with_dependency("X"),
        ]);
        let err = resolver.resolve().unwrap_err();

        assert_eq!(err.cycle_members(), vec!["X", "Y"]);
        assert!(err.missing_dependencies().is_empty());
        assert!(err.to_string().contains("X -> waiting on [Y]"));
    }

    #[test]
    fn test_self_dependency_is_error() {
        let resolver = resolver_with(vec![task("solo").with_dependency("solo"), task("free")]);
        let err = resolver.resolve().unwrap_err();

        assert_eq!(err.blocked().len(), 1);
        assert_eq!(err.cycle_members(), vec!["solo"]);
    }

    #[test]
    fn test_missing_dependency_is_error() {
        let resolver = resolver_with(vec![task("docs").with_dependency("ghost")]);
        let err = resolver.resolve().unwrap_err();

        assert_eq!(err.missing_dependencies(), vec!["ghost"]);
        assert!(err.cycle_members().is_empty());
        assert!(err.to_string().contains("docs -> missing [ghost]"));
    }

    #[test]
    fn test_downstream_of_cycle_is_not_a_cycle_member() {
        let resolver = resolver_with(vec![
            task("a").with_dependency("b"),
            task("b").with_dependency("a"),
            task("c").with_dependency("a"),
        ]);
        let err = resolver.resolve().unwrap_err();

        assert_eq!(err.blocked().len(), 3);
        assert_eq!(err.cycle_members(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_replace_keeps_position() {
        let resolver = resolver_with(vec![
            task("first"),
            task("second"),
            task("first").with_dependency("second"),
        ]);

        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.tasks()[0].id, "first");
        let plan = resolver.resolve().unwrap();
        assert_eq!(plan.levels(), &[vec!["second"], vec!["first"]]);
    }

    #[test]
    fn test_duplicate_reject() {
        let mut resolver: DependencyResolver<(), ()> =
            DependencyResolver::new(DuplicatePolicy::Reject);
        resolver.add_task(task("only")).unwrap();

        let err = resolver.add_task(task("only")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateTask("only".to_string()));
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_describe_plan() {
        let resolver = resolver_with(vec![task("core"), task("utils").with_dependency("core")]);
        let plan = resolver.resolve().unwrap();
        let text = resolver.describe(&plan);

        assert!(text.contains("Level 0 (1 tasks)"));
        assert!(text.contains("utils (priority 0, after: core)"));
    }

    fn acyclic_tasks() -> impl Strategy<Value = Vec<(i32, Vec<usize>)>> {
        // Task i may only depend on tasks with a smaller index, so the graph is acyclic
        (1usize..24).prop_flat_map(|n| {
            (0..n)
                .map(|i| {
                    let deps = if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        proptest::collection::vec(0..i, 0..4).boxed()
                    };
                    (-5i32..5, deps)
                })
                .collect::<Vec<_>>()
        })
    }

    proptest! {
        #[test]
        fn prop_dependencies_precede_dependents(specs in acyclic_tasks()) {
            let tasks: Vec<Task<(), ()>> = specs
                .iter()
                .enumerate()
                .map(|(i, (priority, deps))| {
                    task(&format!("t{i}"))
                        .with_priority(*priority)
                        .with_dependencies(deps.iter().map(|d| format!("t{d}")))
                })
                .collect();
            let resolver = resolver_with(tasks);
            let plan = resolver.resolve().unwrap();

            prop_assert_eq!(plan.task_count(), specs.len());
            for (i, (_, deps)) in specs.iter().enumerate() {
                let level = plan.level_of(&format!("t{i}")).unwrap();
                for d in deps {
                    let dep_level = plan.level_of(&format!("t{}", d)).unwrap();
                    prop_assert!(dep_level < level, "t{} runs before its dependency t{}", i, d);
                }
            }
            for level in plan.levels() {
                let priorities: Vec<i32> = level
                    .iter()
                    .map(|id| resolver.get(id).unwrap().priority)
                    .collect();
                prop_assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
            }

            prop_assert_eq!(resolver.resolve().unwrap(), plan);
        }
    }
}
