use std::{
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    config::ResolveConfig,
    error::BuildError,
    types::ModuleId,
    util::{join_normalized, normalize_path, path_to_id},
};

/// Outcome of resolving a `require` specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A module inside the project, bundled under this id
    Module(ModuleId),
    /// A bare specifier listed in `resolve.externals`; the call is left as a
    /// plain `require` for the host environment to satisfy
    External,
}

/// Turns specifiers into canonical module ids.
///
/// Ids are `/`-separated paths relative to the project root, normalized
/// lexically so that `./a/../b.js` and `./b.js` name the same module.
/// Symlinks are not followed.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Absolute, normalized project root
    root: PathBuf,
    /// Suffixes tried in order when the exact path is not a file
    extensions: Vec<String>,
    /// Bare specifiers left to the runtime
    externals: IndexSet<String>,
}

impl ModuleResolver {
    pub fn new(root: &Path, config: &ResolveConfig) -> io::Result<Self> {
        let absolute = std::path::absolute(root)?;
        let root = normalize_path(&absolute).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot normalize project root {}", root.display()),
            )
        })?;
        debug!("Project root: {}", root.display());

        Ok(Self {
            root,
            extensions: config.extensions.clone(),
            externals: config.externals.iter().cloned().collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a module
    pub fn module_path(&self, id: &ModuleId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Resolve the user-supplied entry path, absolute or relative to the
    /// project root.
    pub fn resolve_entry(&self, entry: &Path) -> Result<ModuleId, BuildError> {
        let display = entry.display().to_string();
        let joined = if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            self.root.join(entry)
        };

        let candidate = self.relativize(&joined).ok_or_else(|| BuildError::Resolution {
            module: ModuleId::from(display.clone()),
            specifier: display.clone(),
            location: None,
            reason: format!("entry is outside the project root {}", self.root.display()),
        })?;

        self.find_file(&candidate).ok_or_else(|| BuildError::NotFound {
            path: self.root.join(&candidate),
            module: ModuleId::from(candidate),
            source: io::Error::new(io::ErrorKind::NotFound, "entry file does not exist"),
        })
    }

    /// Resolve `specifier` as written inside module `from`.
    pub fn resolve(&self, from: &ModuleId, specifier: &str) -> Result<Resolution, BuildError> {
        let fail = |reason: String| BuildError::Resolution {
            module: from.clone(),
            specifier: specifier.to_owned(),
            location: None,
            reason,
        };

        if specifier.is_empty() {
            return Err(fail("empty module specifier".to_owned()));
        }

        let candidate = if is_relative(specifier) {
            join_normalized(from.dir(), specifier)
                .ok_or_else(|| fail("specifier climbs above the project root".to_owned()))?
        } else if specifier.starts_with('/') {
            self.relativize(Path::new(specifier)).ok_or_else(|| {
                fail(format!(
                    "absolute path is outside the project root {}",
                    self.root.display()
                ))
            })?
        } else if self.externals.contains(specifier) {
            trace!("`{specifier}` in `{from}` is external");
            return Ok(Resolution::External);
        } else {
            return Err(fail(
                "bare specifiers must be listed in resolve.externals".to_owned(),
            ));
        };

        match self.find_file(&candidate) {
            Some(id) => {
                trace!("Resolved `{specifier}` from `{from}` to `{id}`");
                Ok(Resolution::Module(id))
            }
            None => Err(fail(self.not_found_reason(&candidate))),
        }
    }

    /// Root-relative id string for an absolute or root-joined path
    fn relativize(&self, path: &Path) -> Option<String> {
        let normalized = normalize_path(path)?;
        let relative = normalized.strip_prefix(&self.root).ok()?;
        Some(path_to_id(relative))
    }

    /// Exact path first, then each configured extension in order
    fn find_file(&self, candidate: &str) -> Option<ModuleId> {
        if candidate.is_empty() {
            return None;
        }
        if self.root.join(candidate).is_file() {
            return Some(ModuleId::from(candidate));
        }

        self.extensions
            .iter()
            .map(|extension| format!("{candidate}{extension}"))
            .find(|with_extension| self.root.join(with_extension).is_file())
            .map(ModuleId::from)
    }

    fn not_found_reason(&self, candidate: &str) -> String {
        if self.extensions.is_empty() {
            format!("no file at `{candidate}`")
        } else {
            format!(
                "no file at `{candidate}` (also tried extensions {})",
                self.extensions.join(", ")
            )
        }
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}
