//! Shared type definitions for the minipack crate
//!
//! This module contains the identity types used across the resolver, the
//! graph builder and the code generator.

use std::{borrow::Borrow, fmt, sync::Arc};

/// Canonical identifier of a module: its normalized, `/`-separated path
/// relative to the project root (e.g. `src/utils/math.js`).
///
/// Two specifiers that reach the same file through different relative paths
/// always produce the same `ModuleId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the id, without a trailing separator.
    /// Modules at the project root have an empty directory.
    pub fn dir(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// 1-based line/column position inside a module's source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_dir() {
        assert_eq!(ModuleId::from("src/lib/math.js").dir(), "src/lib");
        assert_eq!(ModuleId::from("index.js").dir(), "");
    }

    #[test]
    fn test_module_id_borrows_as_str() {
        let mut map = indexmap::IndexMap::new();
        map.insert(ModuleId::from("a.js"), 1);
        assert_eq!(map.get("a.js"), Some(&1));
    }
}
