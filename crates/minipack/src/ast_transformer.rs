//! Transform engine: rewrites `require` calls to the bundle runtime
//!
//! Each module is parsed with swc, every `require("<literal>")` call is
//! replaced by `__webpack_require__("<canonical id>")`, and the tree is
//! printed back to source. The specifiers encountered along the way become
//! the module's outgoing dependency edges.

use std::io;

use indexmap::IndexSet;
use log::{debug, trace};
use swc_core::{
    common::{
        FileName, SourceFile, SourceMap, Span, Spanned, comments::SingleThreadedComments,
        sync::Lrc,
    },
    ecma::{
        ast::{CallExpr, Callee, EsVersion, Expr, ExprOrSpread, Lit, ModuleDecl, Program},
        codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter},
        parser::{
            EsConfig, Parser, StringInput, Syntax, error::Error as ParseError, lexer::Lexer,
        },
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::{
    ast_builder,
    error::BuildError,
    resolver::{ModuleResolver, Resolution},
    types::{ModuleId, SourceLocation},
};

/// Name of the runtime loader function emitted by the code generator
pub const RUNTIME_REQUIRE: &str = "__webpack_require__";

/// The synchronous module-import primitive recognized in sources
const REQUIRE: &str = "require";

/// One rewritten `require` call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// Specifier as written in the source
    pub specifier: String,
    /// Canonical id it resolved to
    pub module: ModuleId,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Rewritten module source
    pub code: String,
    /// Every rewritten call site, in source order
    pub imports: Vec<ImportRecord>,
}

impl TransformOutput {
    /// Distinct dependency ids in first-seen order
    pub fn dependencies(&self) -> Vec<ModuleId> {
        self.imports
            .iter()
            .map(|import| import.module.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformEngine<'a> {
    resolver: &'a ModuleResolver,
}

impl<'a> TransformEngine<'a> {
    pub fn new(resolver: &'a ModuleResolver) -> Self {
        Self { resolver }
    }

    pub fn transform(&self, module: &ModuleId, source: &str) -> Result<TransformOutput, BuildError> {
        let cm: Lrc<SourceMap> = Lrc::default();
        let fm = cm.new_source_file(FileName::Custom(module.to_string()), source.to_owned());
        let comments = SingleThreadedComments::default();

        let mut program = parse(&cm, &fm, &comments, module)?;

        let mut rewriter = RequireRewriter {
            module,
            resolver: self.resolver,
            cm: &cm,
            imports: Vec::new(),
            error: None,
        };
        program.visit_mut_with(&mut rewriter);
        if let Some(err) = rewriter.error {
            return Err(err);
        }
        let imports = rewriter.imports;

        // A `#!` line is only legal at the very start of a file, never inside
        // the factory function the module body ends up in
        strip_shebang(&mut program);

        let code = print(&cm, &comments, &program).map_err(|err| BuildError::Emit {
            module: module.clone(),
            message: err.to_string(),
        })?;

        debug!("Transformed `{module}`: {} require call(s)", imports.len());
        Ok(TransformOutput { code, imports })
    }
}

fn parse(
    cm: &SourceMap,
    fm: &SourceFile,
    comments: &SingleThreadedComments,
    module: &ModuleId,
) -> Result<Program, BuildError> {
    // Module bodies run inside a function, so a top-level `return` is valid
    let syntax = Syntax::Es(EsConfig {
        allow_return_outside_function: true,
        ..Default::default()
    });
    let lexer = Lexer::new(
        syntax,
        EsVersion::Es2022,
        StringInput::from(fm),
        Some(comments),
    );
    let mut parser = Parser::new_from(lexer);

    let parsed = parser.parse_program();
    let recovered = parser.take_errors();

    let program = parsed.map_err(|err| syntax_error(cm, module, &err))?;
    if let Some(err) = recovered.first() {
        return Err(syntax_error(cm, module, err));
    }
    Ok(program)
}

fn strip_shebang(program: &mut Program) {
    let shebang = match program {
        Program::Module(module) => module.shebang.take(),
        Program::Script(script) => script.shebang.take(),
    };
    if let Some(shebang) = shebang {
        trace!("Dropping `#!{shebang}` line");
    }
}

fn syntax_error(cm: &SourceMap, module: &ModuleId, err: &ParseError) -> BuildError {
    BuildError::Syntax {
        module: module.clone(),
        location: location(cm, err.span()),
        message: err.kind().msg().into_owned(),
    }
}

fn location(cm: &SourceMap, span: Span) -> SourceLocation {
    let loc = cm.lookup_char_pos(span.lo);
    SourceLocation::new(loc.line, loc.col.0 + 1)
}

fn print(
    cm: &Lrc<SourceMap>,
    comments: &SingleThreadedComments,
    program: &Program,
) -> io::Result<String> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default(),
            cm: cm.clone(),
            comments: Some(comments),
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        match program {
            Program::Module(module) => emitter.emit_module(module)?,
            Program::Script(script) => emitter.emit_script(script)?,
        }
    }
    String::from_utf8(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Build the replacement for a `require(...)` call: same span, callee
/// renamed to the runtime loader, single argument the canonical id.
/// Returns `None` if the callee is not a plain identifier.
pub fn rewrite_require_call(call: &CallExpr, target: &ModuleId) -> Option<CallExpr> {
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Ident(ident) = &**callee else {
        return None;
    };
    let arg_span = call.args.first().map_or(call.span, |arg| arg.expr.span());

    Some(CallExpr {
        callee: ast_builder::ident_callee(ast_builder::renamed_ident(ident, RUNTIME_REQUIRE)),
        args: vec![ast_builder::argument(ast_builder::string_literal(
            arg_span,
            target.as_str(),
        ))],
        ..call.clone()
    })
}

fn is_require(callee: &Expr) -> bool {
    matches!(callee, Expr::Ident(ident) if &*ident.sym == REQUIRE)
}

/// The first argument, if it is statically known
fn static_specifier(call: &CallExpr) -> Option<String> {
    match call.args.first()? {
        ExprOrSpread { spread: None, expr } => match &**expr {
            Expr::Lit(Lit::Str(literal)) => Some(literal.value.to_string()),
            // `require(`./a.js`)` without substitutions is as static as a string
            Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
                .quasis
                .first()
                .and_then(|quasi| quasi.cooked.as_ref())
                .map(ToString::to_string),
            _ => None,
        },
        ExprOrSpread { spread: Some(_), .. } => None,
    }
}

struct RequireRewriter<'a> {
    module: &'a ModuleId,
    resolver: &'a ModuleResolver,
    cm: &'a SourceMap,
    imports: Vec<ImportRecord>,
    /// First failure in traversal order; later call sites are left alone
    error: Option<BuildError>,
}

impl RequireRewriter<'_> {
    fn unsupported(&mut self, span: Span, reason: &str) {
        if self.error.is_none() {
            self.error = Some(BuildError::UnsupportedImport {
                module: self.module.clone(),
                location: location(self.cm, span),
                reason: reason.to_owned(),
            });
        }
    }

    fn rewrite(&mut self, call: &mut CallExpr) {
        let location = location(self.cm, call.span);
        let Some(specifier) = static_specifier(call) else {
            self.unsupported(
                call.span,
                "require() needs a string literal specifier to be bundled",
            );
            return;
        };

        match self.resolver.resolve(self.module, &specifier) {
            Ok(Resolution::Module(target)) => {
                trace!(
                    "{}:{location}: require(`{specifier}`) -> `{target}`",
                    self.module
                );
                if let Some(rewritten) = rewrite_require_call(call, &target) {
                    *call = rewritten;
                }
                self.imports.push(ImportRecord {
                    specifier,
                    module: target,
                    location,
                });
            }
            Ok(Resolution::External) => {
                debug!("Leaving external require(`{specifier}`) in `{}`", self.module);
            }
            Err(err) => self.error = Some(err.with_location(location)),
        }
    }
}

impl VisitMut for RequireRewriter<'_> {
    fn visit_mut_module_decl(&mut self, decl: &mut ModuleDecl) {
        self.unsupported(
            decl.span(),
            "ES module declarations are not supported, use require()",
        );
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if self.error.is_some() {
            return;
        }
        call.visit_mut_children_with(self);
        if self.error.is_some() {
            return;
        }

        if matches!(call.callee, Callee::Import(_)) {
            self.unsupported(call.span, "dynamic import() is not supported");
        } else if matches!(&call.callee, Callee::Expr(callee) if is_require(callee)) {
            self.rewrite(call);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::config::ResolveConfig;

    fn fixture(files: &[&str]) -> (TempDir, ModuleResolver) {
        fixture_with(files, &ResolveConfig::default())
    }

    fn fixture_with(files: &[&str], config: &ResolveConfig) -> (TempDir, ModuleResolver) {
        let temp_dir = TempDir::new().unwrap();
        for file in files {
            let path = temp_dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        let resolver = ModuleResolver::new(temp_dir.path(), config).unwrap();
        (temp_dir, resolver)
    }

    fn transform(
        resolver: &ModuleResolver,
        id: &str,
        source: &str,
    ) -> Result<TransformOutput, BuildError> {
        TransformEngine::new(resolver).transform(&ModuleId::from(id), source)
    }

    #[test]
    fn test_rewrites_require_to_runtime_loader() {
        let (_dir, resolver) = fixture(&["src/index.js", "src/lib/b.js"]);
        let output = transform(
            &resolver,
            "src/index.js",
            "const b = require('./lib/b.js');\nmodule.exports = b + 1;\n",
        )
        .unwrap();

        assert!(
            output
                .code
                .contains(r#"__webpack_require__("src/lib/b.js")"#),
            "unexpected output:\n{}",
            output.code
        );
        assert!(!output.code.contains("require('./lib/b.js')"));
        assert_eq!(
            output.imports,
            vec![ImportRecord {
                specifier: "./lib/b.js".to_owned(),
                module: ModuleId::from("src/lib/b.js"),
                location: SourceLocation::new(1, 11),
            }]
        );
    }

    #[test]
    fn test_duplicate_requires_share_one_edge() {
        let (_dir, resolver) = fixture(&["index.js", "b.js", "c.js"]);
        let output = transform(
            &resolver,
            "index.js",
            "require('./b.js');\nrequire('./c.js');\nrequire('./lib/../b.js');\n",
        )
        .unwrap();

        assert_eq!(output.imports.len(), 3);
        assert_eq!(
            output.dependencies(),
            vec![ModuleId::from("b.js"), ModuleId::from("c.js")]
        );
        assert_eq!(output.code.matches(r#"__webpack_require__("b.js")"#).count(), 2);
    }

    #[test]
    fn test_nested_requires_are_rewritten() {
        let (_dir, resolver) = fixture(&["index.js", "lazy.js", "cond.js"]);
        let output = transform(
            &resolver,
            "index.js",
            "function load() {\n  return require('./lazy.js');\n}\nif (process.env.X) {\n  require('./cond.js').run();\n}\n",
        )
        .unwrap();

        assert_eq!(
            output.dependencies(),
            vec![ModuleId::from("lazy.js"), ModuleId::from("cond.js")]
        );
        assert!(!output.code.contains("require('"));
    }

    #[test]
    fn test_non_literal_specifier_is_unsupported() {
        let (_dir, resolver) = fixture(&["index.js"]);
        let err = transform(
            &resolver,
            "index.js",
            "const name = './a.js';\nconst a = require(name);\n",
        )
        .unwrap_err();

        assert_eq!(err.kind(), "UnsupportedImportError");
        assert_eq!(err.location(), Some(SourceLocation::new(2, 11)));
    }

    #[test]
    fn test_template_literals() {
        let (_dir, resolver) = fixture(&["index.js", "a.js"]);
        let output = transform(&resolver, "index.js", "require(`./a.js`);\n").unwrap();
        assert_eq!(output.dependencies(), vec![ModuleId::from("a.js")]);

        let err = transform(&resolver, "index.js", "const x = 'a';\nrequire(`./${x}.js`);\n")
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedImportError");
    }

    #[test]
    fn test_require_without_arguments_is_unsupported() {
        let (_dir, resolver) = fixture(&["index.js"]);
        let err = transform(&resolver, "index.js", "require();\n").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedImportError");
    }

    #[test]
    fn test_es_module_syntax_is_rejected() {
        let (_dir, resolver) = fixture(&["index.js", "a.js"]);

        let err = transform(&resolver, "index.js", "import a from './a.js';\n").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedImportError");
        assert!(err.to_string().contains("ES module declarations"));

        let err = transform(&resolver, "index.js", "import('./a.js').then(() => {});\n")
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedImportError");
        assert!(err.to_string().contains("dynamic import()"));
    }

    #[test]
    fn test_syntax_error_has_location() {
        let (_dir, resolver) = fixture(&["index.js"]);
        let err = transform(&resolver, "index.js", "const ok = 1;\nconst = ;\n").unwrap_err();

        assert_eq!(err.kind(), "SyntaxError");
        assert_eq!(err.location().map(|location| location.line), Some(2));
        assert_eq!(err.module().map(ModuleId::as_str), Some("index.js"));
    }

    #[test]
    fn test_unresolvable_require_reports_call_site() {
        let (_dir, resolver) = fixture(&["src/index.js"]);
        let err = transform(
            &resolver,
            "src/index.js",
            "// entry\nconst x = require('./missing.js');\n",
        )
        .unwrap_err();

        match err {
            BuildError::Resolution {
                module,
                specifier,
                location,
                ..
            } => {
                assert_eq!(module.as_str(), "src/index.js");
                assert_eq!(specifier, "./missing.js");
                assert_eq!(location, Some(SourceLocation::new(2, 11)));
            }
            other => panic!("expected a resolution error, got {other:?}"),
        }
    }

    #[test]
    fn test_externals_are_left_alone() {
        let config = ResolveConfig {
            externals: vec!["fs".to_owned()],
            ..ResolveConfig::default()
        };
        let (_dir, resolver) = fixture_with(&["index.js"], &config);
        let output = transform(&resolver, "index.js", "const fs = require('fs');\n").unwrap();

        assert!(output.imports.is_empty());
        assert!(output.code.contains("require('fs')"), "{}", output.code);
        assert!(!output.code.contains(RUNTIME_REQUIRE));
    }

    #[test]
    fn test_other_calls_and_comments_survive() {
        let (_dir, resolver) = fixture(&["index.js", "a.js"]);
        let output = transform(
            &resolver,
            "index.js",
            "// keep me\nconsole.log(require('./a.js'), myrequire('./a.js'));\n",
        )
        .unwrap();

        assert!(output.code.contains("// keep me"));
        assert!(output.code.contains("myrequire('./a.js')"));
        assert_eq!(output.imports.len(), 1);
    }

    #[test]
    fn test_shebang_line_is_dropped() {
        let (_dir, resolver) = fixture(&["cli.js", "a.js"]);
        let output = transform(
            &resolver,
            "cli.js",
            "#!/usr/bin/env node\nconsole.log(require('./a.js'));\n",
        )
        .unwrap();

        assert!(!output.code.contains("#!"), "{}", output.code);
        assert!(output.code.contains(r#"__webpack_require__("a.js")"#));
    }

    #[test]
    fn test_top_level_return_is_accepted() {
        let (_dir, resolver) = fixture(&["index.js", "a.js"]);
        let output = transform(
            &resolver,
            "index.js",
            "if (process.env.SKIP) {\n  return;\n}\nmodule.exports = require('./a.js');\n",
        )
        .unwrap();

        assert!(output.code.contains("return;"));
        assert_eq!(output.dependencies(), vec![ModuleId::from("a.js")]);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let (_dir, resolver) = fixture(&["index.js", "a.js"]);
        let source = "var a = require('./a.js');\nexports.value = a.value * 2;\n";

        let first = transform(&resolver, "index.js", source).unwrap();
        let second = transform(&resolver, "index.js", source).unwrap();
        assert_eq!(first.code, second.code);
    }

    #[test]
    fn test_rewrite_require_call_builds_replacement() {
        let cm: Lrc<SourceMap> = Lrc::default();
        let fm = cm.new_source_file(
            FileName::Custom("snippet.js".to_owned()),
            "require('./b.js')".to_owned(),
        );
        let lexer = Lexer::new(
            Syntax::Es(Default::default()),
            EsVersion::Es2022,
            StringInput::from(&*fm),
            None,
        );
        let expr = Parser::new_from(lexer).parse_expr().unwrap();
        let Expr::Call(call) = *expr else {
            panic!("expected a call expression");
        };

        let rewritten = rewrite_require_call(&call, &ModuleId::from("src/b.js")).unwrap();

        let Callee::Expr(callee) = &rewritten.callee else {
            panic!("expected an expression callee");
        };
        assert!(matches!(&**callee, Expr::Ident(ident) if &*ident.sym == RUNTIME_REQUIRE));
        assert_eq!(rewritten.args.len(), 1);
        assert!(matches!(
            &*rewritten.args[0].expr,
            Expr::Lit(Lit::Str(literal)) if &*literal.value == "src/b.js"
        ));
        assert_eq!(rewritten.span, call.span);
        // The original node is untouched
        assert!(matches!(
            &*call.args[0].expr,
            Expr::Lit(Lit::Str(literal)) if &*literal.value == "./b.js"
        ));
    }
}
