//! Build error taxonomy
//!
//! Every variant is terminal for the build that produced it. Module-scoped
//! variants carry the canonical id of the offending module and, where the
//! failure points at a call site, its source location.

use std::{io, path::PathBuf};

use crate::types::{ModuleId, SourceLocation};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A module's source file could not be read.
    #[error("cannot read module `{module}` ({}): {source}", .path.display())]
    NotFound {
        module: ModuleId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A specifier could not be turned into an existing module.
    #[error("cannot resolve `{specifier}` from `{module}`{}: {reason}", at(.location))]
    Resolution {
        module: ModuleId,
        specifier: String,
        location: Option<SourceLocation>,
        reason: String,
    },

    /// A configured loader failed.
    #[error("loader #{index} `{loader}` failed on `{module}`: {message}")]
    Loader {
        module: ModuleId,
        /// Position of the loader in its rule's declared list
        index: usize,
        loader: String,
        message: String,
    },

    /// The module's (loaded) source could not be parsed.
    #[error("syntax error in `{module}` at {location}: {message}")]
    Syntax {
        module: ModuleId,
        location: SourceLocation,
        message: String,
    },

    /// An import that cannot be statically bundled.
    #[error("unsupported import in `{module}` at {location}: {reason}")]
    UnsupportedImport {
        module: ModuleId,
        location: SourceLocation,
        reason: String,
    },

    /// The rewritten syntax tree could not be printed back to text.
    #[error("cannot print `{module}`: {message}")]
    Emit { module: ModuleId, message: String },

    /// The bundle could not be written.
    #[error("cannot write bundle to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn at(location: &Option<SourceLocation>) -> String {
    location.map_or_else(String::new, |location| format!(" at {location}"))
}

impl BuildError {
    /// The module the error belongs to, if it is module-scoped.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            Self::NotFound { module, .. }
            | Self::Resolution { module, .. }
            | Self::Loader { module, .. }
            | Self::Syntax { module, .. }
            | Self::UnsupportedImport { module, .. }
            | Self::Emit { module, .. } => Some(module),
            Self::Write { .. } | Self::Config(_) => None,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Resolution { location, .. } => *location,
            Self::Syntax { location, .. } | Self::UnsupportedImport { location, .. } => {
                Some(*location)
            }
            _ => None,
        }
    }

    /// Short, stable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFoundError",
            Self::Resolution { .. } => "ResolutionError",
            Self::Loader { .. } => "LoaderError",
            Self::Syntax { .. } => "SyntaxError",
            Self::UnsupportedImport { .. } => "UnsupportedImportError",
            Self::Emit { .. } => "EmitError",
            Self::Write { .. } => "WriteError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Attach a call-site location to a resolution error that has none yet.
    #[must_use]
    pub fn with_location(self, at: SourceLocation) -> Self {
        match self {
            Self::Resolution {
                module,
                specifier,
                location: None,
                reason,
            } => Self::Resolution {
                module,
                specifier,
                location: Some(at),
                reason,
            },
            other => other,
        }
    }
}
