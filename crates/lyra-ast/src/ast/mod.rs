//! AST node definitions
//!
//! The node types are grouped the way the grammar groups them:
//! expressions, statements, binding patterns, and type annotations.

mod expression;
mod pattern;
mod statement;
mod types;

pub use expression::*;
pub use pattern::*;
pub use statement::*;
pub use types::*;

use crate::span::Span;

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
