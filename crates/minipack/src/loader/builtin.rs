//! Loaders that can be referenced by name from `minipack.toml`

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use serde::de::IgnoredAny;

use super::{Loader, LoaderContext};

/// Names accepted in `module.rules[].use`
pub const BUILTIN_LOADERS: &[&str] = &["banner", "json", "raw", "replace"];

/// Instantiate a built-in loader from its configured name and options
pub fn create(name: &str, options: &toml::Table) -> Result<Box<dyn Loader>> {
    match name {
        "json" => Ok(Box::new(JsonLoader)),
        "raw" => Ok(Box::new(RawLoader)),
        "banner" => Ok(Box::new(BannerLoader {
            text: string_option(name, options, "text")?,
        })),
        "replace" => {
            let search = string_option(name, options, "search")?;
            let search = Regex::new(&search)
                .with_context(|| format!("loader `replace`: invalid search pattern `{search}`"))?;
            Ok(Box::new(ReplaceLoader {
                search,
                replace: string_option(name, options, "replace")?,
            }))
        }
        other => Err(anyhow!(
            "unknown loader `{other}` (available: {})",
            BUILTIN_LOADERS.join(", ")
        )),
    }
}

fn string_option(loader: &str, options: &toml::Table, key: &str) -> Result<String> {
    match options.get(key) {
        Some(toml::Value::String(value)) => Ok(value.clone()),
        Some(other) => bail!(
            "loader `{loader}`: option `{key}` must be a string, found {}",
            other.type_str()
        ),
        None => bail!("loader `{loader}`: missing option `{key}`"),
    }
}

/// Turns a JSON document into a module exporting it
#[derive(Debug, Clone, Copy)]
pub struct JsonLoader;

impl Loader for JsonLoader {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self, source: &str, cx: &LoaderContext<'_>) -> Result<String> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        serde_json::from_str::<IgnoredAny>(source)
            .with_context(|| format!("{} is not valid JSON", cx.module))?;
        // Re-parsed at runtime so keys such as `__proto__` stay plain data
        // properties instead of going through object literal semantics
        Ok(format!(
            "module.exports = JSON.parse({});\n",
            serde_json::to_string(source.trim())?
        ))
    }
}

/// Exports the source text itself as a string
#[derive(Debug, Clone, Copy)]
pub struct RawLoader;

impl Loader for RawLoader {
    fn name(&self) -> &str {
        "raw"
    }

    fn load(&self, source: &str, _cx: &LoaderContext<'_>) -> Result<String> {
        Ok(format!("module.exports = {};\n", serde_json::to_string(source)?))
    }
}

/// Prepends a fixed line of text
#[derive(Debug, Clone)]
pub struct BannerLoader {
    pub text: String,
}

impl Loader for BannerLoader {
    fn name(&self) -> &str {
        "banner"
    }

    fn load(&self, source: &str, _cx: &LoaderContext<'_>) -> Result<String> {
        Ok(format!("{}\n{source}", self.text))
    }
}

/// Regex search and replace over the source; `$1`-style group references
/// are expanded in the replacement
#[derive(Debug, Clone)]
pub struct ReplaceLoader {
    pub search: Regex,
    pub replace: String,
}

impl Loader for ReplaceLoader {
    fn name(&self) -> &str {
        "replace"
    }

    fn load(&self, source: &str, _cx: &LoaderContext<'_>) -> Result<String> {
        Ok(self
            .search
            .replace_all(source, self.replace.as_str())
            .into_owned())
    }
}
