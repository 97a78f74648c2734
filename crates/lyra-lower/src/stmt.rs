//! Statement Lowering Engine
//!
//! Statement -> ordered statement list. Dispatches by statement kind and
//! delegates all expression work to the value engine. Loop and switch
//! bodies are deliberately not lowered here: the engine emits flat header
//! fragments with marker statements, and the CFG builder places the
//! bodies and wires the edges.

use tracing::warn;

use lyra_ast::ast::{self, Expression, Statement};
use lyra_ast::Span;
use lyra_ir::{
    AliasTy, Constant, FieldSignature, MarkerTag, MethodSignature, Stmt, StmtKind, StmtOrigin, Ty,
    Value,
};

use crate::builder::{CallableDecl, ClassLikeDecl, DeclarationBuilder};
use crate::expr::{ITERATOR_DONE, ITERATOR_METHOD, ITERATOR_NEXT, ITERATOR_VALUE};
use crate::{LoopIncrement, Lowerer, SwitchBundle, SwitchCaseBundle};

impl<'a, B: DeclarationBuilder> Lowerer<'a, B> {
    /// Lower one statement; the returned list is annotated once with the
    /// triggering node's source text and position.
    pub fn lower_stmt(&mut self, stmt: &Statement) -> Vec<Stmt> {
        let mut stmts = match stmt {
            Statement::VariableDecl(d) => self.lower_var_decl(d),
            Statement::FunctionDecl(f) => self.lower_function_decl(f),
            Statement::ClassDecl(c) => self.lower_class_decl(c),
            Statement::TypeAliasDecl(t) => self.lower_type_alias(t),
            Statement::Expression(e) => self.lower_expr_for_effect(&e.expression),
            Statement::If(i) => self.lower_if(i),
            Statement::Switch(s) => self.lower_switch(s),
            Statement::While(w) => self.lower_loop_header(&w.condition),
            Statement::DoWhile(d) => self.lower_loop_header(&d.condition),
            Statement::For(f) => self.lower_for(f),
            Statement::ForIn(f) => self.lower_for_each(&f.left, &f.right, f.span),
            Statement::ForOf(f) => self.lower_for_each(&f.left, &f.right, f.span),
            // target resolution belongs entirely to the CFG builder
            Statement::Break(_) | Statement::Continue(_) => Vec::new(),
            Statement::Return(r) => self.lower_return(r),
            Statement::Throw(t) => self.lower_throw(t),
            Statement::Try(t) => self.lower_try(t),
            Statement::Block(b) => {
                let mut stmts = Vec::new();
                for inner in &b.statements {
                    stmts.extend(self.lower_stmt(inner));
                }
                stmts
            }
            Statement::ExportAssignment(e) => self.lower_export(e),
            Statement::Empty(_) => Vec::new(),
        };
        let span = stmt.span();
        let origin = StmtOrigin::new(self.snippet(span), span);
        self.ctx.attach_origin(&mut stmts, &origin);
        stmts
    }

    /// Prologue bindings: `this` and one assignment per parameter
    pub(crate) fn lower_prologue(&mut self, params: &[ast::Parameter]) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        if let Some(class) = self.enclosing_class.clone() {
            let ty = Ty::Class(class);
            let this = self.ctx.declare_local("this", ty.clone(), true);
            let bind = self.ctx.stmt(
                StmtKind::Assign {
                    lhs: Value::Local(this),
                    rhs: Value::This { ty },
                },
                vec![Span::UNKNOWN, Span::UNKNOWN],
            );
            stmts.push(bind);
        }
        for (index, param) in params.iter().enumerate() {
            let ty = param
                .type_annotation
                .as_ref()
                .map(|t| self.resolve_type(t))
                .unwrap_or(Ty::Unknown);
            match &param.pattern {
                ast::Pattern::Identifier(id) => {
                    let local = self.ctx.declare_local(id.name.clone(), ty.clone(), false);
                    let bind = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: Value::Local(local),
                            rhs: Value::ParamRef { index, ty },
                        },
                        vec![id.span, param.span],
                    );
                    stmts.push(bind);
                }
                pattern @ (ast::Pattern::Array(_) | ast::Pattern::Object(_)) => {
                    let tmp = self.ctx.fresh_temp(ty.clone());
                    let bind = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: Value::Local(tmp.clone()),
                            rhs: Value::ParamRef { index, ty },
                        },
                        vec![param.span, param.span],
                    );
                    stmts.push(bind);
                    self.lower_destructuring_pattern(pattern, &tmp, false, param.span, &mut stmts);
                }
                ast::Pattern::Rest(rest) => {
                    warn!(span = %rest.span, "unsupported parameter shape, dropped");
                }
            }
        }
        stmts
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    pub(crate) fn lower_var_decl(&mut self, d: &ast::VariableDecl) -> Vec<Stmt> {
        let is_const = matches!(d.kind, ast::VariableKind::Const);
        match &d.pattern {
            ast::Pattern::Identifier(id) => {
                let annotated = d.type_annotation.as_ref().map(|t| self.resolve_type(t));
                match &d.initializer {
                    Some(init) => {
                        let lowered = self.lower_expr(init);
                        let init_span = lowered.span();
                        let ty = annotated.unwrap_or_else(|| lowered.value.ty());
                        let local = self.ctx.declare_local(id.name.clone(), ty, is_const);
                        let mut stmts = lowered.stmts;
                        let assign = self.ctx.stmt(
                            StmtKind::Assign {
                                lhs: Value::Local(local),
                                rhs: lowered.value,
                            },
                            vec![id.span, init_span],
                        );
                        stmts.push(assign);
                        stmts
                    }
                    None => {
                        let ty = annotated.unwrap_or(Ty::Unknown);
                        let local = self.ctx.declare_local(id.name.clone(), ty, is_const);
                        let assign = self.ctx.stmt(
                            StmtKind::Assign {
                                lhs: Value::Local(local),
                                rhs: Value::Constant(Constant::Undefined),
                            },
                            vec![id.span, d.span],
                        );
                        vec![assign]
                    }
                }
            }
            pattern => {
                let Some(init) = &d.initializer else {
                    warn!(span = %d.span, "destructuring declaration without initializer, dropped");
                    return Vec::new();
                };
                let src = self.lower_expr(init);
                let src = self.flatten_to_local(src);
                let mut stmts = src.stmts;
                let src_local = Self::expect_local(&src.value);
                self.lower_destructuring_pattern(pattern, &src_local, is_const, d.span, &mut stmts);
                stmts
            }
        }
    }

    fn lower_function_decl(&mut self, f: &ast::FunctionDecl) -> Vec<Stmt> {
        match self.builder.build_method(CallableDecl::Declaration(f)) {
            Ok(sig) => {
                self.ctx
                    .declare_local(f.name.name.clone(), Ty::Function(Box::new(sig)), false);
            }
            Err(err) => {
                warn!(error = %err, "cannot build nested function declaration");
            }
        }
        Vec::new()
    }

    fn lower_class_decl(&mut self, c: &ast::ClassDecl) -> Vec<Stmt> {
        if let Err(err) = self.builder.build_class(ClassLikeDecl::Declaration(c)) {
            warn!(error = %err, "cannot build nested class declaration");
        }
        Vec::new()
    }

    fn lower_type_alias(&mut self, t: &ast::TypeAliasDecl) -> Vec<Stmt> {
        let ty = self.resolve_type(&t.type_annotation);
        let alias = AliasTy::new(t.name.name.clone(), ty.clone());
        let stmt = self.ctx.stmt(
            StmtKind::AliasType {
                alias: alias.clone(),
                expr: Value::AliasTypeExpr { original: ty },
            },
            vec![t.span],
        );
        self.ctx.record_alias(alias, stmt.id);
        vec![stmt]
    }

    // ------------------------------------------------------------------
    // Conditionals
    // ------------------------------------------------------------------

    fn lower_if(&mut self, i: &ast::IfStatement) -> Vec<Stmt> {
        if self.in_builder_method {
            return self.lower_builder_if(i);
        }
        let test = self.lower_expr(&i.condition);
        let (condition, cond_span, mut stmts) = self.negated_condition(test);
        let branch = self.ctx.stmt(StmtKind::If { condition }, vec![cond_span]);
        stmts.push(branch);
        stmts.extend(self.lower_stmt(&i.then_branch));
        if let Some(else_branch) = &i.else_branch {
            stmts.extend(self.lower_stmt(else_branch));
        }
        stmts
    }

    /// Inside a declarative-UI builder method, `if` expands to the
    /// component macro: create(cond) / branch(0) / then / branch(1) /
    /// else / pop().
    fn lower_builder_if(&mut self, i: &ast::IfStatement) -> Vec<Stmt> {
        let span = i.span;
        let test = self.lower_expr(&i.condition);
        let test = self.flatten(test);
        let mut stmts = test.stmts;
        let create = self.ctx.stmt(
            StmtKind::Invoke {
                invoke: Value::StaticInvoke {
                    method: MethodSignature::on_class("If", "create"),
                    args: vec![test.value],
                },
            },
            vec![span],
        );
        stmts.push(create);
        let branch0 = self.ctx.stmt(
            StmtKind::Invoke {
                invoke: Value::StaticInvoke {
                    method: MethodSignature::on_class("If", "branch"),
                    args: vec![Value::Constant(Constant::Number(0.0))],
                },
            },
            vec![span],
        );
        stmts.push(branch0);
        stmts.extend(self.lower_stmt(&i.then_branch));
        if let Some(else_branch) = &i.else_branch {
            let branch1 = self.ctx.stmt(
                StmtKind::Invoke {
                    invoke: Value::StaticInvoke {
                        method: MethodSignature::on_class("If", "branch"),
                        args: vec![Value::Constant(Constant::Number(1.0))],
                    },
                },
                vec![span],
            );
            stmts.push(branch1);
            stmts.extend(self.lower_stmt(else_branch));
        }
        let pop = self.ctx.stmt(
            StmtKind::Invoke {
                invoke: Value::StaticInvoke {
                    method: MethodSignature::on_class("If", "pop"),
                    args: Vec::new(),
                },
            },
            vec![span],
        );
        stmts.push(pop);
        stmts
    }

    /// Flatten the discriminant and every case test into value bundles
    /// for the CFG builder; case bodies are walked by the caller.
    fn lower_switch(&mut self, s: &ast::SwitchStatement) -> Vec<Stmt> {
        let discriminant = self.lower_expr(&s.discriminant);
        let discriminant = self.flatten(discriminant);
        let mut stmts = discriminant.stmts;
        let mut cases = Vec::with_capacity(s.cases.len());
        for case in &s.cases {
            match &case.test {
                Some(test) => {
                    let lowered = self.lower_expr(test);
                    let lowered = self.flatten(lowered);
                    stmts.extend(lowered.stmts);
                    cases.push(SwitchCaseBundle {
                        test: Some(lowered.value),
                        positions: lowered.positions,
                    });
                }
                None => cases.push(SwitchCaseBundle {
                    test: None,
                    positions: Vec::new(),
                }),
            }
        }
        self.switch_bundles.push(SwitchBundle {
            discriminant: discriminant.value,
            discriminant_positions: discriminant.positions,
            cases,
        });
        stmts
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    /// Common loop skeleton: loop-start marker, condition statements,
    /// conditional branch. The body is spliced in by the caller.
    fn lower_loop_header(&mut self, condition: &Expression) -> Vec<Stmt> {
        let mut stmts = vec![self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::LoopStart), Vec::new())];
        let lowered = self.lower_expr(condition);
        let (cond, cond_span, cond_stmts) = self.negated_condition(lowered);
        stmts.extend(cond_stmts);
        let branch = self.ctx.stmt(StmtKind::If { condition: cond }, vec![cond_span]);
        stmts.push(branch);
        stmts
    }

    fn lower_for(&mut self, f: &ast::ForStatement) -> Vec<Stmt> {
        let mut stmts = match &f.init {
            Some(ast::ForInit::VariableDecl(d)) => self.lower_var_decl(d),
            Some(ast::ForInit::Expression(e)) => self.lower_expr_for_effect(e),
            None => Vec::new(),
        };
        stmts.push(self.ctx.stmt(StmtKind::Marker(MarkerTag::LoopStart), Vec::new()));
        if let Some(test) = &f.test {
            let lowered = self.lower_expr(test);
            let (cond, cond_span, cond_stmts) = self.negated_condition(lowered);
            stmts.extend(cond_stmts);
            let branch = self.ctx.stmt(StmtKind::If { condition: cond }, vec![cond_span]);
            stmts.push(branch);
        }
        if let Some(update) = &f.update {
            // the update clause belongs at the back edge; it travels
            // beside the main stream for the CFG builder to place
            let mut increment = self.lower_expr_for_effect(update);
            let origin = StmtOrigin::new(self.snippet(update.span()), update.span());
            self.ctx.attach_origin(&mut increment, &origin);
            self.loop_increments.push(LoopIncrement { stmts: increment });
        }
        stmts
    }

    /// for-of and for-in share the iterator-protocol desugaring:
    /// materialize, iterator(), next(), read done, branch on done, read
    /// value, cast-assign into the loop target.
    fn lower_for_each(
        &mut self,
        left: &ast::ForHeadLeft,
        right: &Expression,
        span: Span,
    ) -> Vec<Stmt> {
        let iterable = self.lower_expr(right);
        let iterable = self.flatten_to_local(iterable);
        let iterable_span = iterable.span();
        let mut stmts = iterable.stmts;
        let base = Self::expect_local(&iterable.value);

        let iter = self.ctx.fresh_temp(Ty::Unknown);
        let materialize = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(iter.clone()),
                rhs: Value::InstanceInvoke {
                    base: base.clone(),
                    method: MethodSignature::unresolved(ITERATOR_METHOD),
                    args: Vec::new(),
                },
            },
            vec![span, iterable_span],
        );
        stmts.push(materialize);

        stmts.push(self.ctx.stmt(StmtKind::Marker(MarkerTag::LoopStart), Vec::new()));

        let step = self.ctx.fresh_temp(Ty::Unknown);
        let advance = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(step.clone()),
                rhs: Value::InstanceInvoke {
                    base: iter,
                    method: MethodSignature::unresolved(ITERATOR_NEXT),
                    args: Vec::new(),
                },
            },
            vec![span, span],
        );
        stmts.push(advance);

        let done = self.ctx.fresh_temp(Ty::Boolean);
        let read_done = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(done.clone()),
                rhs: Value::InstanceFieldRef {
                    base: step.clone(),
                    field: FieldSignature::new(None, ITERATOR_DONE, Ty::Boolean),
                },
            },
            vec![span, span],
        );
        stmts.push(read_done);

        let branch = self.ctx.stmt(
            StmtKind::If {
                condition: Value::Condition {
                    op: lyra_ir::BinaryOp::Eq,
                    lhs: Box::new(Value::Local(done)),
                    rhs: Box::new(Value::Constant(Constant::Bool(true))),
                },
            },
            vec![span],
        );
        stmts.push(branch);

        let current = self.ctx.fresh_temp(Ty::Unknown);
        let read_value = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(current.clone()),
                rhs: Value::InstanceFieldRef {
                    base: step,
                    field: FieldSignature::new(None, ITERATOR_VALUE, Ty::Unknown),
                },
            },
            vec![span, span],
        );
        stmts.push(read_value);

        let elem_ty = base.ty.element_type().unwrap_or(Ty::Unknown);
        match left {
            ast::ForHeadLeft::VariableDecl(decl) => {
                let is_const = matches!(decl.kind, ast::VariableKind::Const);
                let cast_ty = decl
                    .type_annotation
                    .as_ref()
                    .map(|t| self.resolve_type(t))
                    .unwrap_or(elem_ty);
                self.lower_for_each_binding(&decl.pattern, current, cast_ty, is_const, span, &mut stmts);
            }
            ast::ForHeadLeft::Pattern(pattern) => {
                self.lower_for_each_binding(pattern, current, elem_ty, false, span, &mut stmts);
            }
        }
        stmts
    }

    fn lower_for_each_binding(
        &mut self,
        pattern: &ast::Pattern,
        current: lyra_ir::Local,
        cast_ty: Ty,
        is_const: bool,
        span: Span,
        stmts: &mut Vec<Stmt>,
    ) {
        let cast = Value::Cast {
            operand: Box::new(Value::Local(current)),
            ty: cast_ty.clone(),
        };
        match pattern {
            ast::Pattern::Identifier(id) => {
                let target = self
                    .ctx
                    .declare_local(id.name.clone(), cast_ty, is_const);
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(target),
                        rhs: cast,
                    },
                    vec![id.span, span],
                );
                stmts.push(assign);
            }
            pattern => {
                let tmp = self.ctx.fresh_temp(cast_ty);
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(tmp.clone()),
                        rhs: cast,
                    },
                    vec![span, span],
                );
                stmts.push(assign);
                self.lower_destructuring_pattern(pattern, &tmp, is_const, span, stmts);
            }
        }
    }

    // ------------------------------------------------------------------
    // Exits and exceptions
    // ------------------------------------------------------------------

    fn lower_return(&mut self, r: &ast::ReturnStatement) -> Vec<Stmt> {
        match &r.value {
            Some(expr) => {
                let lowered = self.lower_expr(expr);
                let value_span = lowered.span();
                let mut stmts = lowered.stmts;
                let ret = self.ctx.stmt(
                    StmtKind::Return {
                        value: lowered.value,
                    },
                    vec![value_span],
                );
                stmts.push(ret);
                stmts
            }
            None => {
                let ret = self.ctx.stmt(StmtKind::ReturnVoid, Vec::new());
                vec![ret]
            }
        }
    }

    fn lower_throw(&mut self, t: &ast::ThrowStatement) -> Vec<Stmt> {
        let lowered = self.lower_expr(&t.value);
        let value_span = lowered.span();
        let mut stmts = lowered.stmts;
        let throw = self.ctx.stmt(
            StmtKind::Throw {
                value: lowered.value,
            },
            vec![value_span],
        );
        stmts.push(throw);
        stmts
    }

    fn lower_try(&mut self, t: &ast::TryStatement) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for inner in &t.body.statements {
            stmts.extend(self.lower_stmt(inner));
        }
        if let Some(catch) = &t.catch_clause {
            if let Some(param) = &catch.param {
                match param {
                    ast::Pattern::Identifier(id) => {
                        let local = self.ctx.declare_local(id.name.clone(), Ty::Unknown, false);
                        let bind = self.ctx.stmt(
                            StmtKind::Assign {
                                lhs: Value::Local(local),
                                rhs: Value::CaughtException { ty: Ty::Unknown },
                            },
                            vec![id.span, catch.span],
                        );
                        stmts.push(bind);
                    }
                    other => {
                        warn!(span = %other.span(), "unsupported catch binding, dropped");
                    }
                }
            }
            for inner in &catch.body.statements {
                stmts.extend(self.lower_stmt(inner));
            }
        }
        if let Some(finally) = &t.finally_clause {
            for inner in &finally.statements {
                stmts.extend(self.lower_stmt(inner));
            }
        }
        stmts
    }

    fn lower_export(&mut self, e: &ast::ExportAssignment) -> Vec<Stmt> {
        let lowered = self.lower_expr(&e.expression);
        let lowered = if lowered.value.is_atomic() {
            lowered
        } else {
            self.flatten(lowered)
        };
        let value_span = lowered.span();
        let name = e
            .name
            .as_ref()
            .map(|n| n.name.clone())
            .unwrap_or_else(|| "default".to_string());
        let target = self.ctx.global_ref(&name);
        let mut stmts = lowered.stmts;
        let assign = self.ctx.stmt(
            StmtKind::Assign {
                lhs: target,
                rhs: lowered.value,
            },
            vec![e.span, value_span],
        );
        stmts.push(assign);
        stmts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StubBuilder;
    use lyra_ast::ast::Identifier;

    fn sp() -> Span {
        Span::on_line(1, 0, 1)
    }

    fn ident(name: &str) -> Expression {
        Expression::Identifier(Identifier::new(name, sp()))
    }

    fn num(v: f64) -> Expression {
        Expression::NumberLiteral(ast::NumberLiteral { value: v, span: sp() })
    }

    fn expr_stmt(e: Expression) -> Statement {
        Statement::Expression(ast::ExpressionStatement {
            expression: e,
            span: sp(),
        })
    }

    fn call(callee: Expression, args: Vec<Expression>) -> Expression {
        Expression::Call(ast::CallExpression {
            callee: Box::new(callee),
            args,
            span: sp(),
        })
    }

    fn block(statements: Vec<Statement>) -> ast::BlockStatement {
        ast::BlockStatement {
            statements,
            span: sp(),
        }
    }

    fn data_kinds(stmts: &[Stmt]) -> Vec<&StmtKind> {
        stmts
            .iter()
            .filter(|s| !s.is_marker())
            .map(|s| &s.kind)
            .collect()
    }

    #[test]
    fn test_for_of_desugars_to_iterator_protocol() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        lowerer
            .ctx
            .declare_local("items", Ty::Array(Box::new(Ty::Number)), false);
        let stmt = Statement::ForOf(ast::ForOfStatement {
            left: ast::ForHeadLeft::VariableDecl(ast::VariableDecl {
                kind: ast::VariableKind::Const,
                pattern: ast::Pattern::Identifier(Identifier::new("x", sp())),
                type_annotation: None,
                initializer: None,
                span: sp(),
            }),
            right: ident("items"),
            body: Box::new(Statement::Empty(sp())),
            span: sp(),
        });
        let stmts = lowerer.lower_stmt(&stmt);

        let kinds = data_kinds(&stmts);
        assert_eq!(kinds.len(), 6, "six data statements before the body");
        // 1: iterator materialize
        assert!(matches!(
            kinds[0],
            StmtKind::Assign {
                rhs: Value::InstanceInvoke { method, .. },
                ..
            } if method.name == ITERATOR_METHOD
        ));
        // 2: next()
        assert!(matches!(
            kinds[1],
            StmtKind::Assign {
                rhs: Value::InstanceInvoke { method, .. },
                ..
            } if method.name == ITERATOR_NEXT
        ));
        // 3: done read
        assert!(matches!(
            kinds[2],
            StmtKind::Assign {
                rhs: Value::InstanceFieldRef { field, .. },
                ..
            } if field.name == ITERATOR_DONE
        ));
        // 4: branch on done == true
        assert!(matches!(
            kinds[3],
            StmtKind::If {
                condition: Value::Condition {
                    op: lyra_ir::BinaryOp::Eq,
                    ..
                }
            }
        ));
        // 5: value read
        assert!(matches!(
            kinds[4],
            StmtKind::Assign {
                rhs: Value::InstanceFieldRef { field, .. },
                ..
            } if field.name == ITERATOR_VALUE
        ));
        // 6: cast-assign into the loop variable
        match kinds[5] {
            StmtKind::Assign {
                lhs: Value::Local(target),
                rhs: Value::Cast { ty, .. },
            } => {
                assert_eq!(target.name, "x");
                assert_eq!(*ty, Ty::Number);
            }
            other => panic!("expected a cast-assign, found {:?}", other),
        }
        // the loop-start marker sits between materialize and next()
        assert!(matches!(
            stmts[1].kind,
            StmtKind::Marker(MarkerTag::LoopStart)
        ));
    }

    #[test]
    fn test_break_and_continue_lower_to_nothing() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        let brk = Statement::Break(ast::BreakStatement {
            label: None,
            span: sp(),
        });
        let cont = Statement::Continue(ast::ContinueStatement {
            label: None,
            span: sp(),
        });
        assert!(lowerer.lower_stmt(&brk).is_empty());
        assert!(lowerer.lower_stmt(&cont).is_empty());
    }

    #[test]
    fn test_while_header_shape() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        lowerer.ctx.declare_local("x", Ty::Number, false);
        lowerer.ctx.declare_local("n", Ty::Number, false);
        let stmt = Statement::While(ast::WhileStatement {
            condition: Expression::Binary(ast::BinaryExpression {
                op: ast::BinaryOperator::Lt,
                left: Box::new(ident("x")),
                right: Box::new(ident("n")),
                span: sp(),
            }),
            body: Box::new(Statement::Empty(sp())),
            span: sp(),
        });
        let stmts = lowerer.lower_stmt(&stmt);
        assert_eq!(stmts.len(), 2);
        assert!(matches!(
            stmts[0].kind,
            StmtKind::Marker(MarkerTag::LoopStart)
        ));
        // the branch condition is the negated source comparison
        match &stmts[1].kind {
            StmtKind::If {
                condition: Value::Condition { op, .. },
            } => assert_eq!(*op, lyra_ir::BinaryOp::GtEq),
            other => panic!("expected a branch, found {:?}", other),
        }
    }

    #[test]
    fn test_normal_if_recurses_into_branches() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        lowerer.ctx.declare_local("flag", Ty::Boolean, false);
        let stmt = Statement::If(ast::IfStatement {
            condition: ident("flag"),
            then_branch: Box::new(expr_stmt(call(ident("onTrue"), vec![]))),
            else_branch: Some(Box::new(expr_stmt(call(ident("onFalse"), vec![])))),
            span: sp(),
        });
        let stmts = lowerer.lower_stmt(&stmt);
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::If { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::Invoke { .. }));
        assert!(matches!(stmts[2].kind, StmtKind::Invoke { .. }));
    }

    #[test]
    fn test_builder_if_expands_to_component_macro() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder).ui_builder_method();
        lowerer.ctx.declare_local("flag", Ty::Boolean, false);
        let stmt = Statement::If(ast::IfStatement {
            condition: ident("flag"),
            then_branch: Box::new(expr_stmt(call(ident("onTrue"), vec![]))),
            else_branch: Some(Box::new(expr_stmt(call(ident("onFalse"), vec![])))),
            span: sp(),
        });
        let stmts = lowerer.lower_stmt(&stmt);
        let invoked: Vec<String> = stmts
            .iter()
            .filter_map(|s| match &s.kind {
                StmtKind::Invoke {
                    invoke: Value::StaticInvoke { method, .. },
                } => Some(format!("{}", method)),
                _ => None,
            })
            .collect();
        assert_eq!(
            invoked,
            vec![
                "If.create",
                "If.branch",
                "onTrue",
                "If.branch",
                "onFalse",
                "If.pop"
            ]
        );
    }

    #[test]
    fn test_switch_records_bundles_for_the_cfg_builder() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        lowerer.ctx.declare_local("x", Ty::Number, false);
        let stmt = Statement::Switch(ast::SwitchStatement {
            discriminant: ident("x"),
            cases: vec![
                ast::SwitchCase {
                    test: Some(num(1.0)),
                    consequent: vec![],
                    span: sp(),
                },
                ast::SwitchCase {
                    test: None,
                    consequent: vec![],
                    span: sp(),
                },
            ],
            span: sp(),
        });
        lowerer.lower_stmt(&stmt);
        assert_eq!(lowerer.switch_bundles.len(), 1);
        let bundle = &lowerer.switch_bundles[0];
        assert_eq!(bundle.cases.len(), 2);
        assert!(bundle.cases[0].test.is_some());
        assert!(bundle.cases[1].test.is_none());
    }

    #[test]
    fn test_catch_binds_the_caught_exception() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        let stmt = Statement::Try(ast::TryStatement {
            body: block(vec![]),
            catch_clause: Some(ast::CatchClause {
                param: Some(ast::Pattern::Identifier(Identifier::new("err", sp()))),
                body: block(vec![]),
                span: sp(),
            }),
            finally_clause: None,
            span: sp(),
        });
        let stmts = lowerer.lower_stmt(&stmt);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(
            stmts[0].kind,
            StmtKind::Assign {
                rhs: Value::CaughtException { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_statement_origin_is_attached_once() {
        let source = "f();";
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new(source, &mut builder);
        let stmt = Statement::Expression(ast::ExpressionStatement {
            expression: call(
                Expression::Identifier(Identifier::new("f", Span::on_line(1, 0, 1))),
                vec![],
            ),
            span: Span::on_line(1, 0, 4),
        });
        let stmts = lowerer.lower_stmt(&stmt);
        assert_eq!(stmts.len(), 1);
        let origin = stmts[0].origin.as_ref().unwrap();
        assert_eq!(origin.text, "f();");
        assert_eq!(origin.span, Span::on_line(1, 0, 4));
    }

    #[test]
    fn test_for_loop_update_travels_beside_the_stream() {
        let mut builder = StubBuilder::new();
        let mut lowerer = Lowerer::new("", &mut builder);
        let stmt = Statement::For(ast::ForStatement {
            init: Some(ast::ForInit::VariableDecl(ast::VariableDecl {
                kind: ast::VariableKind::Let,
                pattern: ast::Pattern::Identifier(Identifier::new("i", sp())),
                type_annotation: None,
                initializer: Some(num(0.0)),
                span: sp(),
            })),
            test: Some(Expression::Binary(ast::BinaryExpression {
                op: ast::BinaryOperator::Lt,
                left: Box::new(ident("i")),
                right: Box::new(num(10.0)),
                span: sp(),
            })),
            update: Some(Expression::Update(ast::UpdateExpression {
                op: ast::UpdateOperator::Increment,
                prefix: false,
                target: Box::new(ident("i")),
                span: sp(),
            })),
            body: Box::new(Statement::Empty(sp())),
            span: sp(),
        });
        let stmts = lowerer.lower_stmt(&stmt);
        // init assign, marker, branch
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::Assign { .. }));
        assert!(matches!(
            stmts[1].kind,
            StmtKind::Marker(MarkerTag::LoopStart)
        ));
        assert!(matches!(stmts[2].kind, StmtKind::If { .. }));
        assert_eq!(lowerer.loop_increments.len(), 1);
        assert!(!lowerer.loop_increments[0].stmts.is_empty());
    }
}
