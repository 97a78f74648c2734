//! Lyra IR
//!
//! Three-address intermediate representation produced by the lowering
//! engine and consumed by the control-flow-graph builder and the
//! whole-program analyzer. Values and statements are closed sum types;
//! consumers match exhaustively so new variants are compiler-enforced
//! everywhere they matter.

pub mod position;
pub mod pretty;
pub mod stmt;
pub mod types;
pub mod value;

pub use position::{OriginTracker, StmtOrigin};
pub use pretty::PrettyPrint;
pub use stmt::{MarkerTag, Stmt, StmtKind};
pub use types::{AliasTy, ClassSignature, FieldSignature, MethodSignature, Ty};
pub use value::{BinaryOp, Constant, Local, UnaryOp, Value};
