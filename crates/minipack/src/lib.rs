//! minipack: a CommonJS module bundler
//!
//! Starting from an entry file, every statically reachable `require` is
//! resolved to a canonical module id, run through the configured loaders,
//! rewritten to call the bundle runtime, and emitted into a single
//! self-contained script.

pub mod ast_builder;
pub mod ast_transformer;
pub mod code_generator;
pub mod config;
pub mod dirs;
pub mod error;
pub mod graph_builder;
pub mod loader;
pub mod module_graph;
pub mod orchestrator;
pub mod resolver;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::BuildError;
pub use orchestrator::{BuildStats, Bundler};
pub use types::{ModuleId, SourceLocation};
