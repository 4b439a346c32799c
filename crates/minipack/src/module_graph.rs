//! Module arena and the chunk handed to the code generator
//!
//! Modules are keyed by canonical id and kept in registration order, which is
//! also the order their factories are emitted in.

use std::path::PathBuf;

use indexmap::IndexMap;
use petgraph::{algo::tarjan_scc, graph::DiGraph};
use rustc_hash::FxHashMap;

use crate::{ast_transformer::ImportRecord, types::ModuleId};

/// A registered module
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Resolved location on disk
    pub path: PathBuf,
    /// Source after loaders and the `require` rewrite
    pub source: String,
    /// One record per rewritten call site
    pub imports: Vec<ImportRecord>,
    /// Distinct dependency ids in first-seen order
    pub dependencies: Vec<ModuleId>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: IndexMap<ModuleId, Module>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. Each id is registered at most once per build.
    pub fn register(&mut self, module: Module) {
        debug_assert!(
            !self.modules.contains_key(&module.id),
            "module `{}` registered twice",
            module.id
        );
        self.modules.insert(module.id.clone(), module);
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    /// Groups of modules that require each other, directly or transitively.
    ///
    /// Members of a group and the groups themselves are listed in
    /// registration order. A module requiring itself forms a group of one.
    pub fn circular_groups(&self) -> Vec<Vec<ModuleId>> {
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.modules.len(), 0);
        let nodes: FxHashMap<&str, _> = self
            .modules
            .keys()
            .enumerate()
            .map(|(index, id)| (id.as_str(), graph.add_node(index)))
            .collect();

        for module in self.modules.values() {
            let from = nodes[module.id.as_str()];
            for dependency in &module.dependencies {
                if let Some(&to) = nodes.get(dependency.as_str()) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut members: Vec<usize> =
                    component.into_iter().map(|node| graph[node]).collect();
                members.sort_unstable();
                members
            })
            .collect();
        groups.sort_unstable();

        groups
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .filter_map(|index| self.modules.get_index(index))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .collect()
    }
}

/// The unit handed to the code generator: a name, an entry and the modules
/// reachable from it
#[derive(Debug, Clone)]
pub struct Chunk {
    pub name: String,
    pub entry: ModuleId,
    pub graph: ModuleGraph,
}

impl Chunk {
    pub fn entry_module(&self) -> Option<&Module> {
        self.graph.get(self.entry.as_str())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn module(id: &str, dependencies: &[&str]) -> Module {
        Module {
            id: ModuleId::from(id),
            path: PathBuf::from(id),
            source: String::new(),
            imports: Vec::new(),
            dependencies: dependencies.iter().copied().map(ModuleId::from).collect(),
        }
    }

    fn graph(modules: Vec<Module>) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        for module in modules {
            graph.register(module);
        }
        graph
    }

    fn ids(groups: &[Vec<ModuleId>]) -> Vec<Vec<&str>> {
        groups
            .iter()
            .map(|group| group.iter().map(ModuleId::as_str).collect())
            .collect()
    }

    #[test]
    fn test_registration_order_is_kept() {
        let graph = graph(vec![
            module("entry.js", &["b.js", "a.js"]),
            module("b.js", &[]),
            module("a.js", &[]),
        ]);

        assert_eq!(
            graph.ids().map(ModuleId::as_str).collect::<Vec<_>>(),
            vec!["entry.js", "b.js", "a.js"]
        );
        assert!(graph.contains("a.js"));
        assert_eq!(graph.get("b.js").map(|m| m.id.as_str()), Some("b.js"));
    }

    #[test]
    fn test_acyclic_graph_has_no_groups() {
        let graph = graph(vec![
            module("entry.js", &["a.js", "b.js"]),
            module("a.js", &["b.js"]),
            module("b.js", &[]),
        ]);
        assert!(graph.circular_groups().is_empty());
    }

    #[test]
    fn test_circular_groups() {
        let graph = graph(vec![
            module("entry.js", &["a.js", "self.js", "x.js"]),
            module("a.js", &["b.js"]),
            module("b.js", &["entry.js"]),
            module("self.js", &["self.js"]),
            module("x.js", &["y.js"]),
            module("y.js", &["x.js"]),
        ]);

        assert_eq!(
            ids(&graph.circular_groups()),
            vec![
                vec!["entry.js", "a.js", "b.js"],
                vec!["self.js"],
                vec!["x.js", "y.js"],
            ]
        );
    }

    #[test]
    fn test_chunk_entry_module() {
        let chunk = Chunk {
            name: "main".to_owned(),
            entry: ModuleId::from("entry.js"),
            graph: graph(vec![module("entry.js", &[])]),
        };
        assert!(chunk.entry_module().is_some());
    }
}
