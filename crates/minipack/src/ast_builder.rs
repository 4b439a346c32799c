//! Factory functions for synthetic AST nodes
//!
//! Replacement nodes keep the span of the node they replace so that
//! diagnostics and printed output stay anchored to the original source.

use swc_core::{
    common::Span,
    ecma::ast::{Callee, Expr, ExprOrSpread, Ident, Lit, Str},
};

/// Copy of `template` carrying a different name
pub fn renamed_ident(template: &Ident, sym: &str) -> Ident {
    Ident {
        sym: sym.into(),
        ..template.clone()
    }
}

/// Callee referring to an identifier
pub fn ident_callee(ident: Ident) -> Callee {
    Callee::Expr(Box::new(Expr::Ident(ident)))
}

/// String literal expression: `"value"`
pub fn string_literal(span: Span, value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span,
        value: value.into(),
        raw: None,
    }))
}

/// Non-spread call argument
pub fn argument(expr: Expr) -> ExprOrSpread {
    ExprOrSpread {
        spread: None,
        expr: Box::new(expr),
    }
}
