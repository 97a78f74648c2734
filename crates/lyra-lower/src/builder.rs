//! Declaration-model builder seam
//!
//! Inline class/function/object literals and type literals are owned by
//! the declaration-model builder, not by the lowering engine. The engine
//! talks to it through this trait so it can be unit-tested against a stub.

use rustc_hash::FxHashSet;

use lyra_ast::ast::{
    ArrowFunction, ClassDecl, ClassExpression, FunctionDecl, FunctionExpression, FunctionType,
    ObjectExpression, ObjectType,
};
use lyra_ir::{ClassSignature, MethodSignature};

use crate::error::LowerResult;

/// A callable node the builder can turn into a (possibly anonymous) method
#[derive(Debug)]
pub enum CallableDecl<'a> {
    Arrow(&'a ArrowFunction),
    Function(&'a FunctionExpression),
    Declaration(&'a FunctionDecl),
}

/// A class-like node the builder can turn into a (possibly anonymous)
/// class
#[derive(Debug)]
pub enum ClassLikeDecl<'a> {
    Object(&'a ObjectExpression),
    ClassExpr(&'a ClassExpression),
    Declaration(&'a ClassDecl),
    TypeLiteral(&'a ObjectType),
}

/// Callback interface into the declaration-model builder
pub trait DeclarationBuilder {
    /// Synthesize a method for a callable node and return its signature
    fn build_method(&mut self, node: CallableDecl<'_>) -> LowerResult<MethodSignature>;

    /// Synthesize a class for a class-like node and return its signature
    fn build_class(&mut self, node: ClassLikeDecl<'_>) -> LowerResult<ClassSignature>;

    /// Synthesize a stand-in method whose signature represents a function
    /// type annotation
    fn method_for_function_type(&mut self, node: &FunctionType) -> LowerResult<MethodSignature>;

    /// Resolve a name to a known class, if the enclosing scope has one
    fn lookup_class(&self, name: &str) -> Option<ClassSignature>;

    /// Check if a callee names a declarative-UI component
    fn is_component(&self, name: &str) -> bool;

    /// Check if a callee names a repeating ("for-each") UI helper
    fn is_foreach_component(&self, name: &str) -> bool;
}

/// In-memory builder for tests and standalone lowering. Mints sequential
/// anonymous names and resolves only the classes and components it was
/// seeded with.
#[derive(Debug, Default)]
pub struct StubBuilder {
    next_method: u32,
    next_class: u32,
    classes: FxHashSet<String>,
    components: FxHashSet<String>,
    foreach_components: FxHashSet<String>,
}

impl StubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resolvable class name
    pub fn with_class(mut self, name: impl Into<String>) -> Self {
        self.classes.insert(name.into());
        self
    }

    /// Seed a declarative-UI component name
    pub fn with_component(mut self, name: impl Into<String>) -> Self {
        self.components.insert(name.into());
        self
    }

    /// Seed a repeating UI helper name
    pub fn with_foreach_component(mut self, name: impl Into<String>) -> Self {
        self.foreach_components.insert(name.into());
        self
    }

    fn fresh_method_name(&mut self) -> String {
        let name = format!("%AM{}", self.next_method);
        self.next_method += 1;
        name
    }

    fn fresh_class_name(&mut self) -> String {
        let name = format!("%AC{}", self.next_class);
        self.next_class += 1;
        name
    }
}

impl DeclarationBuilder for StubBuilder {
    fn build_method(&mut self, node: CallableDecl<'_>) -> LowerResult<MethodSignature> {
        let name = match node {
            CallableDecl::Declaration(decl) => decl.name.name.clone(),
            CallableDecl::Function(f) => f
                .name
                .as_ref()
                .map(|n| n.name.clone())
                .unwrap_or_else(|| self.fresh_method_name()),
            CallableDecl::Arrow(_) => self.fresh_method_name(),
        };
        Ok(MethodSignature::unresolved(name))
    }

    fn build_class(&mut self, node: ClassLikeDecl<'_>) -> LowerResult<ClassSignature> {
        let name = match node {
            ClassLikeDecl::Declaration(decl) => decl.name.name.clone(),
            ClassLikeDecl::ClassExpr(c) => c
                .name
                .as_ref()
                .map(|n| n.name.clone())
                .unwrap_or_else(|| self.fresh_class_name()),
            ClassLikeDecl::Object(_) | ClassLikeDecl::TypeLiteral(_) => self.fresh_class_name(),
        };
        self.classes.insert(name.clone());
        Ok(ClassSignature::new(name))
    }

    fn method_for_function_type(&mut self, _node: &FunctionType) -> LowerResult<MethodSignature> {
        Ok(MethodSignature::unresolved(self.fresh_method_name()))
    }

    fn lookup_class(&self, name: &str) -> Option<ClassSignature> {
        self.classes.contains(name).then(|| ClassSignature::new(name))
    }

    fn is_component(&self, name: &str) -> bool {
        self.components.contains(name)
    }

    fn is_foreach_component(&self, name: &str) -> bool {
        self.foreach_components.contains(name)
    }
}
