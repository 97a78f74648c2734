//! IR values
//!
//! The right-hand vocabulary of the IR. A value is *atomic* when it is a
//! [`Value::Local`] or [`Value::Constant`]; everything else carries one
//! computed operation and must be assigned to a temporary before it can be
//! used in a position that requires an atomic operand.

use serde::{Deserialize, Serialize};

use crate::types::{ClassSignature, FieldSignature, MethodSignature, Ty};

/// A named, typed, per-method virtual register. Covers user variables and
/// compiler-generated temporaries alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    pub name: String,
    pub ty: Ty,
    pub is_const: bool,
}

impl Local {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            is_const: false,
        }
    }

    pub fn constant(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            is_const: true,
        }
    }

    /// Check if this is a compiler-generated temporary
    pub fn is_temp(&self) -> bool {
        self.name.starts_with('%')
    }
}

impl std::fmt::Display for Local {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Constant values in the IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    /// Source text of a regex literal, flags included
    Regex(String),
    /// Digits of a bigint literal, kept verbatim
    BigInt(String),
}

impl Constant {
    /// The static type of this constant
    pub fn ty(&self) -> Ty {
        match self {
            Constant::Number(_) => Ty::Number,
            Constant::Str(_) => Ty::String,
            Constant::Bool(_) => Ty::Boolean,
            Constant::Null => Ty::Null,
            Constant::Undefined => Ty::Undefined,
            Constant::Regex(_) => Ty::Regex,
            Constant::BigInt(_) => Ty::BigInt,
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Number(v) => write!(f, "{}", v),
            Constant::Str(s) => write!(f, "\"{}\"", s.escape_default()),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Null => write!(f, "null"),
            Constant::Undefined => write!(f, "undefined"),
            Constant::Regex(src) => write!(f, "{}", src),
            Constant::BigInt(digits) => write!(f, "{}n", digits),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,

    // Comparison
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,

    // Relational keyword
    In,
}

impl BinaryOp {
    /// Check if this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::StrictEq
                | BinaryOp::StrictNotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    /// The comparison with the opposite outcome; panics on
    /// non-comparison operators, which never reach condition positions.
    pub fn negate(&self) -> BinaryOp {
        match self {
            BinaryOp::Eq => BinaryOp::NotEq,
            BinaryOp::NotEq => BinaryOp::Eq,
            BinaryOp::StrictEq => BinaryOp::StrictNotEq,
            BinaryOp::StrictNotEq => BinaryOp::StrictEq,
            BinaryOp::Lt => BinaryOp::GtEq,
            BinaryOp::LtEq => BinaryOp::Gt,
            BinaryOp::Gt => BinaryOp::LtEq,
            BinaryOp::GtEq => BinaryOp::Lt,
            other => panic!("not a comparison operator: {:?}", other),
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::In => "in",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        };
        write!(f, "{}", s)
    }
}

/// IR value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A local variable or temporary
    Local(Local),

    /// A constant
    Constant(Constant),

    /// Instance field read/write target: base.field
    InstanceFieldRef { base: Local, field: FieldSignature },

    /// Static field read/write target: Class.field
    StaticFieldRef { field: FieldSignature },

    /// Array element read/write target: base[index]
    ArrayRef { base: Local, index: Box<Value> },

    /// The i-th incoming parameter of the enclosing method
    ParamRef { index: usize, ty: Ty },

    /// The receiver of the enclosing method
    This { ty: Ty },

    /// The in-flight exception inside a catch clause
    CaughtException { ty: Ty },

    /// A free variable bound lazily by name
    Global { name: String },

    /// Binary operation: lhs op rhs
    Binary {
        op: BinaryOp,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },

    /// Unary operation: op operand
    Unary { op: UnaryOp, operand: Box<Value> },

    /// A comparison in branch position; the only value an `If` statement
    /// carries
    Condition {
        op: BinaryOp,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },

    /// Explicit cast: <ty>operand
    Cast { operand: Box<Value>, ty: Ty },

    /// operand instanceof check
    InstanceOf { operand: Box<Value>, check: Ty },

    /// typeof operand
    TypeOf { operand: Box<Value> },

    /// await operand
    Await { operand: Box<Value> },

    /// yield operand
    Yield { operand: Box<Value> },

    /// delete target (a field reference)
    Delete { target: Box<Value> },

    /// Allocation without construction: new Class
    New { class: ClassSignature },

    /// Array allocation: new elem_ty[size]
    NewArray { elem_ty: Ty, size: Box<Value> },

    /// Static (or best-effort by-name) call
    StaticInvoke {
        method: MethodSignature,
        args: Vec<Value>,
    },

    /// Instance call through a receiver local
    InstanceInvoke {
        base: Local,
        method: MethodSignature,
        args: Vec<Value>,
    },

    /// Indirect call through a function-typed local
    PtrInvoke { callee: Local, args: Vec<Value> },

    /// Right-hand side of an alias-type definition
    AliasTypeExpr { original: Ty },
}

impl Value {
    /// Check whether this value is safe to use directly as an operand.
    /// Only locals and constants are; every other variant carries a
    /// computed operation or a memory reference.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Value::Local(_) | Value::Constant(_))
    }

    /// Check whether this value is an invoke of any kind
    pub fn is_invoke(&self) -> bool {
        matches!(
            self,
            Value::StaticInvoke { .. } | Value::InstanceInvoke { .. } | Value::PtrInvoke { .. }
        )
    }

    /// The static type of this value, as far as lowering knows it
    pub fn ty(&self) -> Ty {
        match self {
            Value::Local(local) => local.ty.clone(),
            Value::Constant(c) => c.ty(),
            Value::InstanceFieldRef { field, .. } | Value::StaticFieldRef { field } => {
                field.ty.clone()
            }
            Value::ArrayRef { base, .. } => base.ty.element_type().unwrap_or(Ty::Unknown),
            Value::ParamRef { ty, .. }
            | Value::This { ty }
            | Value::CaughtException { ty } => ty.clone(),
            Value::Global { .. } => Ty::Unknown,
            Value::Binary { op, lhs, .. } => {
                if op.is_comparison() || matches!(op, BinaryOp::In) {
                    Ty::Boolean
                } else if matches!(op, BinaryOp::Add) {
                    // + on a string is concatenation
                    if lhs.ty() == Ty::String {
                        Ty::String
                    } else {
                        Ty::Number
                    }
                } else {
                    Ty::Number
                }
            }
            Value::Unary { op, .. } => match op {
                UnaryOp::Not => Ty::Boolean,
                _ => Ty::Number,
            },
            Value::Condition { .. } => Ty::Boolean,
            Value::Cast { ty, .. } => ty.clone(),
            Value::InstanceOf { .. } => Ty::Boolean,
            Value::TypeOf { .. } => Ty::String,
            Value::Await { .. } | Value::Yield { .. } => Ty::Unknown,
            Value::Delete { .. } => Ty::Boolean,
            Value::New { class } => Ty::Class(class.clone()),
            Value::NewArray { elem_ty, .. } => Ty::Array(Box::new(elem_ty.clone())),
            Value::StaticInvoke { .. } | Value::InstanceInvoke { .. } | Value::PtrInvoke { .. } => {
                Ty::Unknown
            }
            Value::AliasTypeExpr { original } => original.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Local(local) => write!(f, "{}", local),
            Value::Constant(c) => write!(f, "{}", c),
            Value::InstanceFieldRef { base, field } => write!(f, "{}.<{}>", base, field.name),
            Value::StaticFieldRef { field } => write!(f, "{}", field),
            Value::ArrayRef { base, index } => write!(f, "{}[{}]", base, index),
            Value::ParamRef { index, .. } => write!(f, "parameter{}", index),
            Value::This { .. } => write!(f, "this"),
            Value::CaughtException { .. } => write!(f, "caughtexception"),
            Value::Global { name } => write!(f, "@{}", name),
            Value::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Value::Unary { op, operand } => write!(f, "{}{}", op, operand),
            Value::Condition { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Value::Cast { operand, ty } => write!(f, "<{}>{}", ty, operand),
            Value::InstanceOf { operand, check } => write!(f, "{} instanceof {}", operand, check),
            Value::TypeOf { operand } => write!(f, "typeof {}", operand),
            Value::Await { operand } => write!(f, "await {}", operand),
            Value::Yield { operand } => write!(f, "yield {}", operand),
            Value::Delete { target } => write!(f, "delete {}", target),
            Value::New { class } => write!(f, "new {}", class),
            Value::NewArray { elem_ty, size } => write!(f, "newarray {}[{}]", elem_ty, size),
            Value::StaticInvoke { method, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "staticinvoke {}({})", method, parts.join(", "))
            }
            Value::InstanceInvoke { base, method, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(
                    f,
                    "instanceinvoke {}.{}({})",
                    base,
                    method.name,
                    parts.join(", ")
                )
            }
            Value::PtrInvoke { callee, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "ptrinvoke {}({})", callee, parts.join(", "))
            }
            Value::AliasTypeExpr { original } => write!(f, "typeof<{}>", original),
        }
    }
}
