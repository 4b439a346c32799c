//! Dependency discovery
//!
//! Walks the `require` graph depth-first from the entry, using an explicit
//! work stack and a per-module state map rather than recursion. Every module
//! is loaded, transformed and registered exactly once, however many times
//! and through however many cycles it is reached.

use std::fs;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{
    ast_transformer::TransformEngine,
    error::BuildError,
    loader::LoaderPipeline,
    module_graph::{Module, ModuleGraph},
    resolver::ModuleResolver,
    types::ModuleId,
};

/// Build state of a discovered module. Modules not yet reached have no
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Being read and run through the loaders
    Loading,
    /// Rewritten, not yet in the graph
    Transformed,
    /// In the graph; terminal
    Registered,
    /// Aborted the build; terminal
    Failed,
}

pub struct GraphBuilder<'a> {
    resolver: &'a ModuleResolver,
    pipeline: &'a LoaderPipeline,
    states: FxHashMap<ModuleId, ModuleState>,
    graph: ModuleGraph,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: &'a ModuleResolver, pipeline: &'a LoaderPipeline) -> Self {
        Self {
            resolver,
            pipeline,
            states: FxHashMap::default(),
            graph: ModuleGraph::new(),
        }
    }

    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.states.get(id).copied()
    }

    /// Discover everything reachable from `entry`. The first failure in
    /// depth-first order stops the walk and is returned.
    pub fn build(&mut self, entry: &ModuleId) -> Result<(), BuildError> {
        let mut stack = vec![entry.clone()];

        while let Some(id) = stack.pop() {
            match self.state(id.as_str()) {
                Some(ModuleState::Registered | ModuleState::Loading | ModuleState::Transformed) => {
                    trace!("Skipping `{id}`, already visited");
                    continue;
                }
                Some(ModuleState::Failed) | None => {}
            }

            let dependencies = match self.process(&id) {
                Ok(dependencies) => dependencies,
                Err(err) => {
                    self.states.insert(id, ModuleState::Failed);
                    return Err(err);
                }
            };

            // Reversed so the first dependency discovered is the next one
            // processed
            stack.extend(
                dependencies
                    .into_iter()
                    .rev()
                    .filter(|dependency| !self.graph.contains(dependency.as_str())),
            );
        }

        Ok(())
    }

    /// Load, transform and register one module, returning its dependencies
    fn process(&mut self, id: &ModuleId) -> Result<Vec<ModuleId>, BuildError> {
        self.states.insert(id.clone(), ModuleState::Loading);
        debug!("Loading `{id}`");

        let path = self.resolver.module_path(id);
        let raw = fs::read_to_string(&path).map_err(|source| BuildError::NotFound {
            module: id.clone(),
            path: path.clone(),
            source,
        })?;
        let loaded = self.pipeline.apply(id, &path, raw)?;

        let output = TransformEngine::new(self.resolver).transform(id, &loaded)?;
        self.states.insert(id.clone(), ModuleState::Transformed);

        let dependencies = output.dependencies();
        self.graph.register(Module {
            id: id.clone(),
            path,
            source: output.code,
            imports: output.imports,
            dependencies: dependencies.clone(),
        });
        self.states.insert(id.clone(), ModuleState::Registered);
        trace!("Registered `{id}` with {} dependencies", dependencies.len());

        Ok(dependencies)
    }

    pub fn finish(self) -> ModuleGraph {
        self.graph
    }
}

/// Discover the graph reachable from `entry` in one go
pub fn build_graph(
    resolver: &ModuleResolver,
    pipeline: &LoaderPipeline,
    entry: &ModuleId,
) -> Result<ModuleGraph, BuildError> {
    let mut builder = GraphBuilder::new(resolver, pipeline);
    builder.build(entry)?;
    Ok(builder.finish())
}
