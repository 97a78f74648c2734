//! IR type algebra
//!
//! Types attached to IR values. Unresolved references stay in the tree as
//! [`Ty::UnclearRef`] placeholders for the whole-program resolution pass;
//! nothing in the lowering engine ever fails on an unknown type.

use serde::{Deserialize, Serialize};

/// IR type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ty {
    Any,
    Unknown,
    Number,
    String,
    Boolean,
    BigInt,
    Null,
    Undefined,
    Void,
    Never,
    Regex,

    /// Array type: T[]
    Array(Box<Ty>),

    /// Tuple type: [number, string]
    Tuple(Vec<Ty>),

    /// Union type: A | B
    Union(Vec<Ty>),

    /// Function type, standing in for a callable value
    Function(Box<MethodSignature>),

    /// A resolved class reference
    Class(ClassSignature),

    /// An unresolved type reference, kept for later whole-program
    /// resolution
    UnclearRef {
        name: String,
        type_args: Vec<Ty>,
    },

    /// A method-scoped type alias
    Alias(Box<AliasTy>),

    /// String literal type: "foo"
    StringLiteral(String),

    /// Number literal type: 42
    NumberLiteral(f64),

    /// Boolean literal type: true
    BooleanLiteral(bool),

    /// Template literal type; chunks and types alternate
    TemplateLiteral {
        chunks: Vec<String>,
        types: Vec<Ty>,
    },
}

impl Ty {
    /// Check if this type is an array or tuple type
    pub fn is_array_like(&self) -> bool {
        matches!(self, Ty::Array(_) | Ty::Tuple(_))
    }

    /// Check if this type is a function type
    pub fn is_function(&self) -> bool {
        matches!(self, Ty::Function(_))
    }

    /// Element type of an array/tuple, if statically known
    pub fn element_type(&self) -> Option<Ty> {
        match self {
            Ty::Array(elem) => Some((**elem).clone()),
            Ty::Tuple(elems) => elems.first().cloned(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Any => write!(f, "any"),
            Ty::Unknown => write!(f, "unknown"),
            Ty::Number => write!(f, "number"),
            Ty::String => write!(f, "string"),
            Ty::Boolean => write!(f, "boolean"),
            Ty::BigInt => write!(f, "bigint"),
            Ty::Null => write!(f, "null"),
            Ty::Undefined => write!(f, "undefined"),
            Ty::Void => write!(f, "void"),
            Ty::Never => write!(f, "never"),
            Ty::Regex => write!(f, "RegExp"),
            Ty::Array(elem) => write!(f, "{}[]", elem),
            Ty::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|t| t.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Ty::Union(members) => {
                let parts: Vec<String> = members.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
            Ty::Function(sig) => write!(f, "fn {}", sig),
            Ty::Class(sig) => write!(f, "{}", sig.name),
            Ty::UnclearRef { name, type_args } => {
                if type_args.is_empty() {
                    write!(f, "{}", name)
                } else {
                    let parts: Vec<String> = type_args.iter().map(|t| t.to_string()).collect();
                    write!(f, "{}<{}>", name, parts.join(", "))
                }
            }
            Ty::Alias(alias) => write!(f, "{}", alias.name),
            Ty::StringLiteral(s) => write!(f, "\"{}\"", s),
            Ty::NumberLiteral(n) => write!(f, "{}", n),
            Ty::BooleanLiteral(b) => write!(f, "{}", b),
            Ty::TemplateLiteral { chunks, types } => {
                write!(f, "`")?;
                let mut types = types.iter();
                for (i, chunk) in chunks.iter().enumerate() {
                    write!(f, "{}", chunk)?;
                    if i + 1 < chunks.len() {
                        if let Some(ty) = types.next() {
                            write!(f, "${{{}}}", ty)?;
                        }
                    }
                }
                write!(f, "`")
            }
        }
    }
}

/// A class reference in the IR
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSignature {
    pub name: String,
}

impl ClassSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A method reference in the IR; `class` is `None` for free functions and
/// for best-effort by-name invokes whose declaring scope is not yet known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    pub class: Option<String>,
    pub name: String,
}

impl MethodSignature {
    pub fn new(class: Option<String>, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    /// A method on a known class
    pub fn on_class(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            name: name.into(),
        }
    }

    /// A free function or an unresolved by-name target
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            class: None,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.class {
            Some(class) => write!(f, "{}.{}", class, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A field reference in the IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSignature {
    pub class: Option<String>,
    pub name: String,
    pub ty: Ty,
}

impl FieldSignature {
    pub fn new(class: Option<String>, name: impl Into<String>, ty: Ty) -> Self {
        Self {
            class,
            name: name.into(),
            ty,
        }
    }
}

impl std::fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.class {
            Some(class) => write!(f, "{}.{}", class, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A method-scoped type alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasTy {
    pub name: String,
    pub original: Ty,
}

impl AliasTy {
    pub fn new(name: impl Into<String>, original: Ty) -> Self {
        Self {
            name: name.into(),
            original,
        }
    }
}
