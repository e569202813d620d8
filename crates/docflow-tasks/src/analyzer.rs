//! Module dependency analysis: internal dependency map, transitive
//! reduction, and complexity-based scheduling hints

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use docflow_core::{ComplexityWeights, PrioritySettings, SchedulerConfig};

/// A class inside a module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassInfo {
    pub name: String,
    pub methods: Vec<String>,
    pub properties: Vec<String>,
}

/// A documentable module and the names it references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleInfo {
    /// Dotted module name, e.g. `pkg.core.parser`
    pub name: String,
    /// Names this module imports; only those naming a known module count
    pub imports: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<ClassInfo>,
}

impl ModuleInfo {
    /// Create a module with no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an import
    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.imports.push(import.into());
        self
    }

    /// Add a top-level function
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.functions.push(function.into());
        self
    }

    /// Add a class
    pub fn with_class(mut self, class: ClassInfo) -> Self {
        self.classes.push(class);
        self
    }
}

/// Load a list of modules from a JSON or YAML manifest
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<ModuleInfo>> {
    let content = std::fs::read_to_string(path)?;
    let modules = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(modules)
}

/// Adjacency map from a node to the nodes it directly depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph(BTreeMap<String, BTreeSet<String>>);

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `node` exists, with no edges added
    pub fn insert_node(&mut self, node: impl Into<String>) {
        self.0.entry(node.into()).or_default();
    }

    /// Record that `from` depends on `to`; both become nodes
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let to = to.into();
        self.insert_node(to.clone());
        self.0.entry(from.into()).or_default().insert(to);
    }

    /// Remove a single edge, returning whether it existed
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        self.0.get_mut(from).is_some_and(|deps| deps.remove(to))
    }

    /// Direct dependencies of `node`
    pub fn dependencies_of(&self, node: &str) -> Option<&BTreeSet<String>> {
        self.0.get(node)
    }

    /// All nodes in sorted order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate nodes with their direct dependencies
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    /// Whether a path of one or more edges leads from `from` to `to`
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        self.reaches_avoiding(from, to, None)
    }

    fn reaches_avoiding(&self, from: &str, to: &str, skip: Option<(&str, &str)>) -> bool {
        let mut stack = vec![from];
        let mut seen: HashSet<&str> = HashSet::new();

        while let Some(node) = stack.pop() {
            let Some(deps) = self.0.get(node) else {
                continue;
            };
            for dep in deps {
                if skip == Some((node, dep.as_str())) {
                    continue;
                }
                if dep == to {
                    return true;
                }
                if seen.insert(dep.as_str()) {
                    stack.push(dep.as_str());
                }
            }
        }
        false
    }
}

impl From<BTreeMap<String, BTreeSet<String>>> for DependencyGraph {
    fn from(map: BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut graph = Self(map);
        let targets: Vec<String> = graph.0.values().flatten().cloned().collect();
        for target in targets {
            graph.insert_node(target);
        }
        graph
    }
}

/// Remove every edge A→C for which C stays reachable from A through other
/// edges. Returns the number of edges removed.
///
/// Edges are examined one at a time in sorted order and each removal is
/// checked against the current graph, so reachability between every pair of
/// nodes is unchanged even when the graph has cycles.
pub fn reduce_transitive(graph: &mut DependencyGraph) -> usize {
    let edges: Vec<(String, String)> = graph
        .iter()
        .flat_map(|(from, deps)| deps.iter().map(move |to| (from.clone(), to.clone())))
        .collect();

    let mut removed = 0;
    for (from, to) in edges {
        if graph.reaches_avoiding(&from, &to, Some((from.as_str(), to.as_str()))) {
            graph.remove_edge(&from, &to);
            debug!(from = %from, to = %to, "removed transitive dependency");
            removed += 1;
        }
    }
    removed
}

/// Maps a complexity score to a scheduling priority
pub type PriorityFn = Arc<dyn Fn(f64) -> i32 + Send + Sync>;

/// `max(0, ceiling - trunc(complexity * scale))`: simpler modules run first
pub fn inverse_complexity_priority(settings: &PrioritySettings) -> PriorityFn {
    let ceiling = settings.ceiling;
    let scale = settings.scale;
    Arc::new(move |complexity: f64| {
        let penalty = (complexity * scale) as i32;
        ceiling.saturating_sub(penalty).max(0)
    })
}

/// Scheduling hints for one module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleHint {
    pub name: String,
    pub dependencies: BTreeSet<String>,
    pub complexity: f64,
    pub priority: i32,
}

/// Derives an internal dependency graph and priority hints from modules
pub struct ModuleDependencyAnalyzer {
    weights: ComplexityWeights,
    priority_fn: PriorityFn,
    graph: DependencyGraph,
}

impl ModuleDependencyAnalyzer {
    /// Analyzer with default weights and the default priority mapping
    pub fn new() -> Self {
        Self {
            weights: ComplexityWeights::default(),
            priority_fn: inverse_complexity_priority(&PrioritySettings::default()),
            graph: DependencyGraph::new(),
        }
    }

    /// Analyzer using the weights and priority settings from configuration
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new()
            .with_weights(config.complexity.clone())
            .with_priority_fn(inverse_complexity_priority(&config.priority))
    }

    pub fn with_weights(mut self, weights: ComplexityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the complexity-to-priority mapping
    pub fn with_priority_fn(mut self, priority_fn: PriorityFn) -> Self {
        self.priority_fn = priority_fn;
        self
    }

    /// Build the internal dependency map of `modules`.
    ///
    /// Imports that name no known module are ignored and self-references are
    /// dropped. The graph is transitively reduced before it is returned and
    /// kept for [`independent_items`](Self::independent_items).
    #[instrument(skip_all, fields(modules = modules.len()))]
    pub fn analyze(&mut self, modules: &[ModuleInfo]) -> DependencyGraph {
        let names: BTreeSet<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        let mut graph = DependencyGraph::new();

        for module in modules {
            graph.insert_node(module.name.clone());
            for import in &module.imports {
                if let Some(target) = resolve_reference(import, &names) {
                    if target != module.name {
                        graph.add_edge(module.name.clone(), target);
                    }
                }
            }
        }

        let direct = graph.edge_count();
        let removed = reduce_transitive(&mut graph);
        info!(
            modules = modules.len(),
            edges = direct - removed,
            removed,
            "analyzed module dependencies"
        );

        self.graph = graph.clone();
        graph
    }

    /// The graph from the last [`analyze`](Self::analyze) call
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Modules with no dependencies after reduction
    pub fn independent_items(&self) -> BTreeSet<String> {
        self.graph
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Positive score that never decreases as any structural feature grows
    pub fn estimate_complexity(&self, module: &ModuleInfo) -> f64 {
        let w = &self.weights;
        let mut complexity = w.base;
        complexity += module.functions.len() as f64 * w.function;
        complexity += module.classes.len() as f64 * w.class;
        for class in &module.classes {
            complexity += class.methods.len() as f64 * w.method;
            complexity += class.properties.len() as f64 * w.property;
        }
        complexity += module.imports.len() as f64 * w.import;
        complexity
    }

    /// Priority for a module under the configured mapping
    pub fn priority_for(&self, module: &ModuleInfo) -> i32 {
        (self.priority_fn)(self.estimate_complexity(module))
    }

    /// Per-module dependencies (from the last analysis), complexity and priority
    pub fn schedule_hints(&self, modules: &[ModuleInfo]) -> Vec<ModuleHint> {
        modules
            .iter()
            .map(|module| {
                let complexity = self.estimate_complexity(module);
                ModuleHint {
                    name: module.name.clone(),
                    dependencies: self
                        .graph
                        .dependencies_of(&module.name)
                        .cloned()
                        .unwrap_or_default(),
                    complexity,
                    priority: (self.priority_fn)(complexity),
                }
            })
            .collect()
    }
}

impl Default for ModuleDependencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleDependencyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDependencyAnalyzer")
            .field("weights", &self.weights)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

/// The longest known module name that `reference` is, or is nested under
fn resolve_reference<'a>(reference: &str, names: &BTreeSet<&'a str>) -> Option<&'a str> {
    names
        .iter()
        .copied()
        .filter(|name| {
            reference == *name
                || reference
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
        .max_by_key(|name| name.len())
}
