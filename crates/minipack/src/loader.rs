//! Loader pipeline
//!
//! A loader is a source-to-source transform applied to a module before it is
//! parsed (compiling JSON to a CommonJS module, inlining text files, ...).
//! Loaders are grouped into match rules; for each module only the last
//! declared matching rule applies, and its loaders compose right to left:
//! for `use = [f, g]` the module body becomes `f(g(source))`.

pub mod builtin;

use std::{fmt, path::Path};

use log::{debug, trace};
use regex::Regex;

use crate::{error::BuildError, types::ModuleId};

/// What a loader knows about the module it is transforming
#[derive(Debug, Clone, Copy)]
pub struct LoaderContext<'a> {
    pub module: &'a ModuleId,
    /// Location of the module on disk
    pub path: &'a Path,
}

/// Source-to-source transform capability
pub trait Loader {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    fn load(&self, source: &str, cx: &LoaderContext<'_>) -> anyhow::Result<String>;
}

/// Adapter turning a closure into a named [`Loader`]
pub struct FnLoader<F> {
    name: String,
    f: F,
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").field("name", &self.name).finish()
    }
}

impl<F> Loader for FnLoader<F>
where
    F: Fn(&str, &LoaderContext<'_>) -> anyhow::Result<String>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, source: &str, cx: &LoaderContext<'_>) -> anyhow::Result<String> {
        (self.f)(source, cx)
    }
}

/// Wrap a closure as a loader
pub fn loader_fn<F>(name: impl Into<String>, f: F) -> FnLoader<F>
where
    F: Fn(&str, &LoaderContext<'_>) -> anyhow::Result<String>,
{
    FnLoader {
        name: name.into(),
        f,
    }
}

/// Predicate deciding whether a rule applies to a module id
pub enum RuleTest {
    Regex(Regex),
    Fn(Box<dyn Fn(&str) -> bool>),
}

impl RuleTest {
    pub fn matches(&self, module_id: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(module_id),
            Self::Fn(predicate) => predicate(module_id),
        }
    }
}

impl fmt::Debug for RuleTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

/// A predicate paired with the loaders it enables
pub struct MatchRule {
    test: RuleTest,
    loaders: Vec<Box<dyn Loader>>,
}

impl MatchRule {
    pub fn new(test: RuleTest) -> Self {
        Self {
            test,
            loaders: Vec::new(),
        }
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(RuleTest::Regex(Regex::new(pattern)?)))
    }

    pub fn predicate(predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self::new(RuleTest::Fn(Box::new(predicate)))
    }

    /// Append a loader; it runs before every loader already in the list
    #[must_use]
    pub fn with_loader(self, loader: impl Loader + 'static) -> Self {
        self.with_boxed_loader(Box::new(loader))
    }

    #[must_use]
    pub fn with_boxed_loader(mut self, loader: Box<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub fn matches(&self, module_id: &str) -> bool {
        self.test.matches(module_id)
    }
}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchRule")
            .field("test", &self.test)
            .field(
                "loaders",
                &self.loaders.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Ordered set of match rules, read-only once built
#[derive(Debug, Default)]
pub struct LoaderPipeline {
    rules: Vec<MatchRule>,
}

impl LoaderPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: MatchRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the loaders of the last declared rule matching `module` over
    /// `source`. Without a matching rule the source is returned unchanged.
    pub fn apply(
        &self,
        module: &ModuleId,
        path: &Path,
        source: String,
    ) -> Result<String, BuildError> {
        let Some(rule) = self.rules.iter().rev().find(|rule| rule.matches(module.as_str())) else {
            trace!("No loader rule matches `{module}`");
            return Ok(source);
        };

        debug!("Applying {:?} to `{module}`", rule);
        let cx = LoaderContext { module, path };

        rule.loaders
            .iter()
            .enumerate()
            .rev()
            .try_fold(source, |source, (index, loader)| {
                trace!("Running loader #{index} `{}` on `{module}`", loader.name());
                loader
                    .load(&source, &cx)
                    .map_err(|err| BuildError::Loader {
                        module: module.clone(),
                        index,
                        loader: loader.name().to_owned(),
                        message: format!("{err:#}"),
                    })
            })
    }
}
