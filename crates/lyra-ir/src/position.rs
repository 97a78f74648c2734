//! Source-origin bookkeeping
//!
//! Every statement is annotated with the source text and span of the node
//! that triggered it, exactly once: the first annotation wins, later ones
//! are ignored. The tracker keys on statement ids, so re-annotating a
//! statement that inner lowering already claimed is a no-op.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use lyra_ast::Span;

use crate::stmt::Stmt;

/// Original source text and span of the node a statement was lowered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmtOrigin {
    pub text: String,
    pub span: Span,
}

impl StmtOrigin {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

/// Seen-set over statement ids; assigns each statement its origin at most
/// once.
#[derive(Debug, Default)]
pub struct OriginTracker {
    seen: FxHashSet<u32>,
}

impl OriginTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotate every not-yet-seen statement in `stmts` with `origin`.
    /// Statements already annotated keep their original mapping.
    pub fn attach(&mut self, stmts: &mut [Stmt], origin: &StmtOrigin) {
        for stmt in stmts {
            if self.seen.insert(stmt.id) {
                stmt.origin = Some(origin.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::{MarkerTag, StmtKind};

    #[test]
    fn test_attach_is_idempotent() {
        let mut tracker = OriginTracker::new();
        let mut stmts = vec![Stmt::new(
            0,
            StmtKind::Marker(MarkerTag::LoopStart),
            Vec::new(),
        )];

        let first = StmtOrigin::new("while (x)", Span::on_line(1, 0, 9));
        tracker.attach(&mut stmts, &first);
        assert_eq!(stmts[0].origin.as_ref().unwrap().text, "while (x)");

        let second = StmtOrigin::new("something else", Span::on_line(2, 0, 14));
        tracker.attach(&mut stmts, &second);
        assert_eq!(stmts[0].origin.as_ref().unwrap().text, "while (x)");
        assert_eq!(stmts[0].origin.as_ref().unwrap().span, Span::on_line(1, 0, 9));
    }

    #[test]
    fn test_attach_only_claims_new_statements() {
        let mut tracker = OriginTracker::new();
        let mut inner = vec![Stmt::new(
            0,
            StmtKind::Marker(MarkerTag::TernaryTrue(0)),
            Vec::new(),
        )];
        tracker.attach(&mut inner, &StmtOrigin::new("a ? b : c", Span::on_line(1, 4, 13)));

        let mut outer = vec![
            inner.pop().unwrap(),
            Stmt::new(1, StmtKind::ReturnVoid, Vec::new()),
        ];
        tracker.attach(&mut outer, &StmtOrigin::new("return", Span::on_line(1, 0, 6)));

        assert_eq!(outer[0].origin.as_ref().unwrap().text, "a ? b : c");
        assert_eq!(outer[1].origin.as_ref().unwrap().text, "return");
    }
}
