//! Bundle emission
//!
//! A bundle is a single IIFE that receives the module-factory map, the entry
//! id and the entry factory. The runtime it defines keeps one cache record
//! per module id and creates that record before the factory runs, so a
//! module reached again through a cycle observes the partially populated
//! `exports` instead of being evaluated twice.

use std::fmt::Write;

use log::debug;

use crate::{ast_transformer::RUNTIME_REQUIRE, module_graph::Chunk};

/// Runtime prelude, up to the opening of the argument list
const RUNTIME_PRELUDE: &str = r#"(function (modules, entryId, entry) {
  var installedModules = Object.create(null);

  function __webpack_require__(moduleId) {
    if (Object.prototype.hasOwnProperty.call(installedModules, moduleId)) {
      return installedModules[moduleId].exports;
    }
    if (!Object.prototype.hasOwnProperty.call(modules, moduleId)) {
      throw new Error("Cannot find module '" + moduleId + "'");
    }
    var module = installedModules[moduleId] = {
      id: moduleId,
      loaded: false,
      exports: {}
    };
    modules[moduleId].call(module.exports, module, module.exports, __webpack_require__);
    module.loaded = true;
    return module.exports;
  }

  var entryModule = installedModules[entryId] = {
    id: entryId,
    loaded: false,
    exports: {}
  };
  entry.call(entryModule.exports, entryModule, entryModule.exports, __webpack_require__);
  entryModule.loaded = true;
})("#;

/// Render `chunk` as a self-contained script.
///
/// Non-entry modules become factories keyed by id, in registration order.
/// The entry is passed separately and invoked exactly once.
pub fn generate(chunk: &Chunk) -> String {
    let mut out = String::from(RUNTIME_PRELUDE);

    let factories: Vec<_> = chunk
        .graph
        .iter()
        .filter(|module| module.id != chunk.entry)
        .collect();

    if factories.is_empty() {
        out.push_str("{}");
    } else {
        out.push_str("{\n");
        for (index, module) in factories.iter().enumerate() {
            if index > 0 {
                out.push_str(",\n");
            }
            let _ = write!(out, "{}: ", string_literal(module.id.as_str()));
            push_factory(&mut out, &module.source);
        }
        out.push_str("\n}");
    }

    let entry_source = chunk
        .entry_module()
        .map_or("", |module| module.source.as_str());
    let _ = write!(out, ", {}, ", string_literal(chunk.entry.as_str()));
    push_factory(&mut out, entry_source);
    out.push_str(");\n");

    debug!(
        "Generated chunk `{}`: {} factories, {} bytes",
        chunk.name,
        factories.len(),
        out.len()
    );
    out
}

fn push_factory(out: &mut String, source: &str) {
    let _ = writeln!(
        out,
        "function (module, exports, {RUNTIME_REQUIRE}) {{"
    );
    out.push_str(source);
    if !source.is_empty() && !source.ends_with('\n') {
        out.push('\n');
    }
    out.push('}');
}

/// JSON string literal, which is also a valid JavaScript string literal
fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}
