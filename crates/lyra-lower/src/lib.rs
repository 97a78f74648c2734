//! Lyra AST to IR Lowering
//!
//! Turns one method body at a time into a linear, three-address statement
//! stream. Nested expressions are decomposed into temporaries so that no
//! operand position holds more than one computed operation, source
//! evaluation order is preserved statement-for-statement, and structural
//! constructs (loops, ternaries, the declarative-UI dialect) are emitted
//! as flat fragments delimited by inert marker statements for the
//! downstream control-flow-graph builder.
//!
//! The two engines — value lowering in `expr`, statement lowering in
//! `stmt` — are mutually recursive impl blocks on one [`Lowerer`], which
//! owns the per-method [`MethodContext`] and talks to the external
//! declaration-model builder through the [`DeclarationBuilder`] trait.

mod builder;
mod context;
mod error;
mod expr;
mod resolve;
mod stmt;

pub use builder::{CallableDecl, ClassLikeDecl, DeclarationBuilder, StubBuilder};
pub use context::MethodContext;
pub use error::{LowerError, LowerResult};

use rustc_hash::FxHashMap;
use tracing::debug;

use lyra_ast::ast::{BlockStatement, Parameter};
use lyra_ast::Span;
use lyra_ir::{AliasTy, ClassSignature, Local, Stmt, Value};

/// The result of lowering one expression: the produced value, the source
/// spans annotating it (first entry covers the whole value, later entries
/// its operands), and the statements that must execute first.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub value: Value,
    pub positions: Vec<Span>,
    pub stmts: Vec<Stmt>,
}

impl Lowered {
    /// A value that required no statements
    pub fn leaf(value: Value, span: Span) -> Self {
        Self {
            value,
            positions: vec![span],
            stmts: Vec::new(),
        }
    }

    /// The span of the whole value
    pub fn span(&self) -> Span {
        self.positions.first().copied().unwrap_or(Span::UNKNOWN)
    }
}

/// Flattened switch discriminant/case values, recorded for the CFG
/// builder; case bodies are walked by the caller, wiring is not this
/// crate's concern.
#[derive(Debug, Clone)]
pub struct SwitchBundle {
    pub discriminant: Value,
    pub discriminant_positions: Vec<Span>,
    pub cases: Vec<SwitchCaseBundle>,
}

/// One case clause; `test` is `None` for the default clause
#[derive(Debug, Clone)]
pub struct SwitchCaseBundle {
    pub test: Option<Value>,
    pub positions: Vec<Span>,
}

/// The lowered update clause of a `for` loop. It belongs at the back edge,
/// which only the CFG builder can place, so it travels beside the main
/// statement stream rather than inside it.
#[derive(Debug, Clone)]
pub struct LoopIncrement {
    pub stmts: Vec<Stmt>,
}

/// Everything the declaration-model builder needs to assemble a method
/// body from one lowering run.
#[derive(Debug)]
pub struct MethodBody {
    pub stmts: Vec<Stmt>,
    pub locals: FxHashMap<String, Local>,
    pub globals: Option<FxHashMap<String, Value>>,
    pub alias_types: FxHashMap<String, (AliasTy, u32)>,
    pub switch_bundles: Vec<SwitchBundle>,
    pub loop_increments: Vec<LoopIncrement>,
}

/// One lowering engine instance; create one per method body.
pub struct Lowerer<'a, B: DeclarationBuilder> {
    source_lines: Vec<&'a str>,
    builder: &'a mut B,
    ctx: MethodContext,
    in_builder_method: bool,
    enclosing_class: Option<ClassSignature>,
    switch_bundles: Vec<SwitchBundle>,
    loop_increments: Vec<LoopIncrement>,
}

impl<'a, B: DeclarationBuilder> Lowerer<'a, B> {
    /// Create a lowering engine over the enclosing source text
    pub fn new(source: &'a str, builder: &'a mut B) -> Self {
        Self {
            source_lines: source.lines().collect(),
            builder,
            ctx: MethodContext::new(),
            in_builder_method: false,
            enclosing_class: None,
            switch_bundles: Vec::new(),
            loop_increments: Vec::new(),
        }
    }

    /// Mark the method being lowered as a declarative-UI builder; `if`
    /// statements expand to component macros instead of branches.
    pub fn ui_builder_method(mut self) -> Self {
        self.in_builder_method = true;
        self
    }

    /// Set the class whose method is being lowered; gives `this` a type
    /// and a prologue binding.
    pub fn with_enclosing_class(mut self, class: ClassSignature) -> Self {
        self.enclosing_class = Some(class);
        self
    }

    /// Lower one whole method body: prologue bindings for `this` and the
    /// parameters, then every statement in order. Consumes the engine and
    /// surrenders the per-method tables.
    pub fn lower_method_body(mut self, params: &[Parameter], body: &BlockStatement) -> MethodBody {
        let mut stmts = self.lower_prologue(params);
        for stmt in &body.statements {
            stmts.extend(self.lower_stmt(stmt));
        }
        debug!(
            statements = stmts.len(),
            temporaries = self.ctx.temp_count(),
            "lowered method body"
        );
        let (locals, globals, alias_types) = self.ctx.into_tables();
        MethodBody {
            stmts,
            locals,
            globals,
            alias_types,
            switch_bundles: self.switch_bundles,
            loop_increments: self.loop_increments,
        }
    }

    /// The source text covered by `span`, for statement origins
    pub(crate) fn snippet(&self, span: Span) -> String {
        if span.is_unknown() {
            return String::new();
        }
        let first = span.start_line as usize - 1;
        let last = span.end_line as usize - 1;
        if first >= self.source_lines.len() {
            return String::new();
        }
        if first == last {
            let line = self.source_lines[first];
            let start = (span.start_col as usize).min(line.len());
            let end = (span.end_col as usize).min(line.len());
            return line.get(start..end).unwrap_or(line).to_string();
        }
        let last = last.max(first).min(self.source_lines.len() - 1);
        let mut parts = Vec::new();
        for (i, &line) in self.source_lines[first..=last].iter().enumerate() {
            let text = if i == 0 {
                line.get((span.start_col as usize).min(line.len())..)
                    .unwrap_or(line)
            } else if first + i == last {
                line.get(..(span.end_col as usize).min(line.len()))
                    .unwrap_or(line)
            } else {
                line
            };
            parts.push(text);
        }
        parts.join("\n")
    }
}
