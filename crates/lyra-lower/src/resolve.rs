//! Shared type resolver
//!
//! Recursive descent from type-annotation syntax into the IR type
//! algebra. Resolution never fails: unknown references become
//! [`Ty::UnclearRef`] placeholders for the whole-program pass, and
//! builder failures degrade to `Ty::Unknown` with a warning.

use tracing::warn;

use lyra_ast::ast::{PrimitiveType, Type, TypeAnnotation};
use lyra_ir::Ty;

use crate::builder::{ClassLikeDecl, DeclarationBuilder};
use crate::Lowerer;

impl<'a, B: DeclarationBuilder> Lowerer<'a, B> {
    /// Map a syntactic type annotation to an IR type
    pub fn resolve_type(&mut self, ann: &TypeAnnotation) -> Ty {
        match &ann.ty {
            Type::Primitive(p) => resolve_primitive(*p),

            Type::Reference(r) => {
                // method-scoped aliases shadow everything else
                if let Some(alias) = self.ctx.alias(&r.name.name) {
                    return Ty::Alias(Box::new(alias));
                }
                let type_args = r
                    .type_args
                    .iter()
                    .map(|arg| self.resolve_type(arg))
                    .collect();
                Ty::UnclearRef {
                    name: r.name.name.clone(),
                    type_args,
                }
            }

            Type::Union(u) => {
                let members = u.types.iter().map(|t| self.resolve_type(t)).collect();
                Ty::Union(members)
            }

            Type::Array(a) => Ty::Array(Box::new(self.resolve_type(&a.element_type))),

            Type::Tuple(t) => {
                let elems = t
                    .element_types
                    .iter()
                    .map(|e| self.resolve_type(e))
                    .collect();
                Ty::Tuple(elems)
            }

            Type::Function(f) => match self.builder.method_for_function_type(f) {
                Ok(sig) => Ty::Function(Box::new(sig)),
                Err(err) => {
                    warn!(error = %err, "cannot model function type, falling back to unknown");
                    Ty::Unknown
                }
            },

            Type::Object(o) => match self.builder.build_class(ClassLikeDecl::TypeLiteral(o)) {
                Ok(class) => Ty::Class(class),
                Err(err) => {
                    warn!(error = %err, "cannot model type literal, falling back to unknown");
                    Ty::Unknown
                }
            },

            Type::StringLiteral(s) => Ty::StringLiteral(s.clone()),
            Type::NumberLiteral(n) => Ty::NumberLiteral(*n),
            Type::BooleanLiteral(b) => Ty::BooleanLiteral(*b),

            Type::TemplateLiteral(t) => Ty::TemplateLiteral {
                chunks: t.chunks.clone(),
                types: t.types.iter().map(|ty| self.resolve_type(ty)).collect(),
            },

            Type::Parenthesized(inner) => self.resolve_type(inner),
        }
    }
}

fn resolve_primitive(p: PrimitiveType) -> Ty {
    match p {
        PrimitiveType::Number => Ty::Number,
        PrimitiveType::String => Ty::String,
        PrimitiveType::Boolean => Ty::Boolean,
        PrimitiveType::BigInt => Ty::BigInt,
        PrimitiveType::Null => Ty::Null,
        PrimitiveType::Undefined => Ty::Undefined,
        PrimitiveType::Void => Ty::Void,
        PrimitiveType::Any => Ty::Any,
        PrimitiveType::Unknown => Ty::Unknown,
        PrimitiveType::Never => Ty::Never,
    }
}
