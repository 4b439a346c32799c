//! Build orchestration
//!
//! Ties the pieces together: resolve the entry, discover the module graph,
//! generate the bundle text, and write it once to the output directory.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{Duration, Instant},
};

use cow_utils::CowUtils;
use log::{info, warn};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::{
    code_generator,
    config::Config,
    error::BuildError,
    graph_builder::build_graph,
    loader::LoaderPipeline,
    module_graph::Chunk,
    resolver::ModuleResolver,
    types::ModuleId,
};

/// Length of `[hash]` when no explicit length is given
pub const DEFAULT_HASH_LENGTH: usize = 20;

static HASH_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[hash(?::(\d+))?\]").expect("hash placeholder pattern is valid")
});

/// Summary of a successful build
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub chunk_name: String,
    pub entry: ModuleId,
    pub module_count: usize,
    /// Bundled module ids in registration order
    pub modules: Vec<ModuleId>,
    pub circular_groups: Vec<Vec<ModuleId>>,
    pub bundle_bytes: usize,
    pub output_path: PathBuf,
    /// Hex SHA-256 of the bundle text
    pub hash: String,
    pub elapsed: Duration,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk `{}` (entry `{}`): {} module{}, {} bytes -> {} in {:.2?}",
            self.chunk_name,
            self.entry,
            self.module_count,
            if self.module_count == 1 { "" } else { "s" },
            self.bundle_bytes,
            self.output_path.display(),
            self.elapsed
        )?;
        for group in &self.circular_groups {
            let members: Vec<&str> = group.iter().map(ModuleId::as_str).collect();
            write!(f, "\n  circular: {}", members.join(" -> "))?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Bundler {
    resolver: ModuleResolver,
    pipeline: LoaderPipeline,
    chunk_name: String,
}

impl Bundler {
    pub fn new(resolver: ModuleResolver, pipeline: LoaderPipeline) -> Self {
        Self {
            resolver,
            pipeline,
            chunk_name: "main".to_owned(),
        }
    }

    #[must_use]
    pub fn with_chunk_name(mut self, name: impl Into<String>) -> Self {
        self.chunk_name = name.into();
        self
    }

    /// Bundler for the project described by `config`
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let resolver = ModuleResolver::new(&config.context, &config.resolve).map_err(|err| {
            BuildError::Config(format!(
                "cannot use {} as the project root: {err}",
                config.context.display()
            ))
        })?;
        let pipeline = config.loader_pipeline()?;
        Ok(Self::new(resolver, pipeline).with_chunk_name(config.name.clone()))
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Discover everything reachable from `entry`
    pub fn compile(&self, entry: &Path) -> Result<Chunk, BuildError> {
        let entry = self.resolver.resolve_entry(entry)?;
        info!("Bundling from entry `{entry}`");

        let graph = build_graph(&self.resolver, &self.pipeline, &entry)?;
        for group in graph.circular_groups() {
            let members: Vec<&str> = group.iter().map(ModuleId::as_str).collect();
            warn!("Circular dependency: {}", members.join(" -> "));
        }

        Ok(Chunk {
            name: self.chunk_name.clone(),
            entry,
            graph,
        })
    }

    /// Compile and render, without touching the output directory
    pub fn bundle(&self, entry: &Path) -> Result<(Chunk, String), BuildError> {
        let chunk = self.compile(entry)?;
        let code = code_generator::generate(&chunk);
        Ok((chunk, code))
    }

    /// Build the bundle for `entry` and write it to
    /// `output_dir/<rendered filename_template>`.
    ///
    /// Nothing is written unless every module bundles successfully.
    pub fn build(
        &self,
        entry: &Path,
        output_dir: &Path,
        filename_template: &str,
    ) -> Result<BuildStats, BuildError> {
        let started = Instant::now();
        let (chunk, code) = self.bundle(entry)?;

        let hash = content_hash(&code);
        let output_path = output_dir.join(render_filename(filename_template, &chunk.name, &hash));
        write_output(&output_path, &code)?;

        let stats = BuildStats {
            chunk_name: chunk.name.clone(),
            entry: chunk.entry.clone(),
            module_count: chunk.graph.len(),
            modules: chunk.graph.ids().cloned().collect(),
            circular_groups: chunk.graph.circular_groups(),
            bundle_bytes: code.len(),
            output_path,
            hash,
            elapsed: started.elapsed(),
        };
        info!("{stats}");
        Ok(stats)
    }
}

/// Hex SHA-256 of the bundle text
pub fn content_hash(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.as_bytes()))
}

/// Substitute `[name]`, `[hash]` and `[hash:N]` in a filename template
pub fn render_filename(template: &str, name: &str, hash: &str) -> String {
    let named = template.cow_replace("[name]", name);
    HASH_PLACEHOLDER
        .replace_all(&named, |caps: &Captures<'_>| {
            let len = caps
                .get(1)
                .and_then(|len| len.as_str().parse::<usize>().ok())
                .unwrap_or(DEFAULT_HASH_LENGTH)
                .min(hash.len());
            hash[..len].to_owned()
        })
        .into_owned()
}

fn write_output(path: &Path, code: &str) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, code).map_err(write_error)
}
