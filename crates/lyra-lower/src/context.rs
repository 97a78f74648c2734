//! Per-method lowering state
//!
//! One context per method body, created fresh when lowering starts and
//! surrendered to the declaration-model builder when it completes. Local
//! scoping is flat: re-declaring a name overwrites the previous mapping.

use rustc_hash::FxHashMap;

use lyra_ast::Span;
use lyra_ir::{AliasTy, Local, OriginTracker, Stmt, StmtKind, StmtOrigin, Ty, Value};

/// Mutable per-method tables and counters
#[derive(Debug, Default)]
pub struct MethodContext {
    locals: FxHashMap<String, Local>,
    /// Free variables referenced by this method, registered lazily on
    /// first use
    globals: Option<FxHashMap<String, Value>>,
    temp_count: u32,
    marker_count: u32,
    stmt_count: u32,
    alias_types: FxHashMap<String, (AliasTy, u32)>,
    origins: OriginTracker,
}

impl MethodContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a local, overwriting any previous binding of the name
    pub fn declare_local(&mut self, name: impl Into<String>, ty: Ty, is_const: bool) -> Local {
        let name = name.into();
        let local = Local {
            name: name.clone(),
            ty,
            is_const,
        };
        self.locals.insert(name, local.clone());
        local
    }

    /// Look up a local by name
    pub fn local(&self, name: &str) -> Option<Local> {
        self.locals.get(name).cloned()
    }

    /// The free-variable reference for `name`, registered on first use
    pub fn global_ref(&mut self, name: &str) -> Value {
        let globals = self.globals.get_or_insert_with(FxHashMap::default);
        globals
            .entry(name.to_string())
            .or_insert_with(|| Value::Global {
                name: name.to_string(),
            })
            .clone()
    }

    /// A fresh compiler-generated temporary; temps live in the locals
    /// table like any other virtual register
    pub fn fresh_temp(&mut self, ty: Ty) -> Local {
        let name = format!("%{}", self.temp_count);
        self.temp_count += 1;
        self.declare_local(name, ty, false)
    }

    /// The next ternary-diamond index; never reused within one method
    pub fn next_marker(&mut self) -> u32 {
        let n = self.marker_count;
        self.marker_count += 1;
        n
    }

    /// Allocate a statement with a fresh per-method id
    pub fn stmt(&mut self, kind: StmtKind, positions: Vec<Span>) -> Stmt {
        let id = self.stmt_count;
        self.stmt_count += 1;
        Stmt::new(id, kind, positions)
    }

    /// Record a method-scoped type alias and its defining statement
    pub fn record_alias(&mut self, alias: AliasTy, stmt_id: u32) {
        self.alias_types
            .insert(alias.name.clone(), (alias, stmt_id));
    }

    /// Look up a type alias by name
    pub fn alias(&self, name: &str) -> Option<AliasTy> {
        self.alias_types.get(name).map(|(alias, _)| alias.clone())
    }

    /// Annotate statements with their source origin; first mapping wins
    pub fn attach_origin(&mut self, stmts: &mut [Stmt], origin: &StmtOrigin) {
        self.origins.attach(stmts, origin);
    }

    /// Number of temporaries allocated so far
    pub fn temp_count(&self) -> u32 {
        self.temp_count
    }

    /// Surrender the tables when lowering completes
    pub fn into_tables(
        self,
    ) -> (
        FxHashMap<String, Local>,
        Option<FxHashMap<String, Value>>,
        FxHashMap<String, (AliasTy, u32)>,
    ) {
        (self.locals, self.globals, self.alias_types)
    }
}
