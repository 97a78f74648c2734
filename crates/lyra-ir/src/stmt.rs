//! IR statements
//!
//! The flat statement stream the lowering engine emits. Structure (loop
//! back-edges, ternary diamonds) is not encoded as jumps here; marker
//! statements delimit the regions and the downstream CFG builder wires the
//! real edges.

use serde::{Deserialize, Serialize};

use lyra_ast::Span;

use crate::position::StmtOrigin;
use crate::types::AliasTy;
use crate::value::Value;

/// Discriminant tag of a dummy marker statement. Markers carry no
/// operands; consumers preserve their relative order but never read them
/// as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerTag {
    /// Start of a loop's condition region
    LoopStart,
    /// Start of the true region of ternary diamond `n`
    TernaryTrue(u32),
    /// Start of the false region of ternary diamond `n`
    TernaryFalse(u32),
    /// End of ternary diamond `n`
    TernaryEnd(u32),
}

impl std::fmt::Display for MarkerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerTag::LoopStart => write!(f, "loopstart"),
            MarkerTag::TernaryTrue(n) => write!(f, "iftrue#{}", n),
            MarkerTag::TernaryFalse(n) => write!(f, "iffalse#{}", n),
            MarkerTag::TernaryEnd(n) => write!(f, "ifend#{}", n),
        }
    }
}

/// Statement payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// lhs = rhs
    Assign { lhs: Value, rhs: Value },

    /// Conditional branch; carries only the branch condition. The branch
    /// targets are the CFG builder's concern.
    If { condition: Value },

    /// An invoke evaluated for its side effects
    Invoke { invoke: Value },

    /// return value
    Return { value: Value },

    /// return
    ReturnVoid,

    /// throw value
    Throw { value: Value },

    /// Method-scoped alias-type definition
    AliasType { alias: AliasTy, expr: Value },

    /// Inert structural delimiter
    Marker(MarkerTag),
}

impl StmtKind {
    /// The operands of this statement, in position order. The operand
    /// position list of the owning [`Stmt`] parallels this sequence.
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            StmtKind::Assign { lhs, rhs } => vec![lhs, rhs],
            StmtKind::If { condition } => vec![condition],
            StmtKind::Invoke { invoke } => vec![invoke],
            StmtKind::Return { value } => vec![value],
            StmtKind::Throw { value } => vec![value],
            StmtKind::AliasType { expr, .. } => vec![expr],
            StmtKind::ReturnVoid | StmtKind::Marker(_) => Vec::new(),
        }
    }
}

/// One IR statement: payload, operand positions, and the source origin
/// assigned once by the statement lowering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Per-method monotonic id
    pub id: u32,
    pub kind: StmtKind,
    /// Source spans parallel to `kind.operands()`
    pub positions: Vec<Span>,
    /// Original source text/position of the triggering node
    pub origin: Option<StmtOrigin>,
}

impl Stmt {
    pub fn new(id: u32, kind: StmtKind, positions: Vec<Span>) -> Self {
        Self {
            id,
            kind,
            positions,
            origin: None,
        }
    }

    /// Check if this is a dummy marker statement
    pub fn is_marker(&self) -> bool {
        matches!(self.kind, StmtKind::Marker(_))
    }
}

impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StmtKind::Assign { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            StmtKind::If { condition } => write!(f, "if {}", condition),
            StmtKind::Invoke { invoke } => write!(f, "{}", invoke),
            StmtKind::Return { value } => write!(f, "return {}", value),
            StmtKind::ReturnVoid => write!(f, "return"),
            StmtKind::Throw { value } => write!(f, "throw {}", value),
            StmtKind::AliasType { alias, expr } => {
                write!(f, "type {} = {}", alias.name, expr)
            }
            StmtKind::Marker(tag) => write!(f, "nop {}", tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Constant, Local};

    #[test]
    fn test_marker_has_no_operands() {
        let stmt = Stmt::new(0, StmtKind::Marker(MarkerTag::LoopStart), Vec::new());
        assert!(stmt.is_marker());
        assert!(stmt.kind.operands().is_empty());
        assert!(stmt.positions.is_empty());
    }

    #[test]
    fn test_operand_order() {
        let lhs = Value::Local(Local::new("x", crate::types::Ty::Number));
        let rhs = Value::Constant(Constant::Number(1.0));
        let stmt = Stmt::new(
            1,
            StmtKind::Assign {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            vec![Span::UNKNOWN, Span::UNKNOWN],
        );
        let ops = stmt.kind.operands();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], &lhs);
        assert_eq!(ops[1], &rhs);
        assert_eq!(stmt.positions.len(), ops.len());
    }

    #[test]
    fn test_display() {
        let stmt = Stmt::new(
            0,
            StmtKind::Assign {
                lhs: Value::Local(Local::new("x", crate::types::Ty::Number)),
                rhs: Value::Constant(Constant::Number(2.0)),
            },
            vec![Span::UNKNOWN, Span::UNKNOWN],
        );
        assert_eq!(format!("{}", stmt), "x = 2");
        let marker = Stmt::new(1, StmtKind::Marker(MarkerTag::TernaryTrue(0)), Vec::new());
        assert_eq!(format!("{}", marker), "nop iftrue#0");
    }

    #[test]
    fn test_serde_round_trip() {
        let stmt = Stmt::new(
            3,
            StmtKind::Assign {
                lhs: Value::Local(Local::new("x", crate::types::Ty::Number)),
                rhs: Value::Constant(Constant::Str("hi".into())),
            },
            vec![Span::on_line(1, 0, 6), Span::on_line(1, 4, 6)],
        );
        let json = serde_json::to_string(&stmt).unwrap();
        let back: Stmt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stmt);
    }
}
