//! Value Lowering Engine
//!
//! Expression -> (value, positions, statements), recursive, left operand
//! before right operand, callee before arguments. Positions that require
//! an atomic operand flatten non-atomic sub-values into fresh temporaries;
//! the temporaries' defining assignments keep the source evaluation order
//! replayable from the flat statement list alone.

use tracing::warn;

use lyra_ast::ast::{self, Expression};
use lyra_ast::Span;
use lyra_ir::{
    BinaryOp, ClassSignature, Constant, FieldSignature, Local, MarkerTag, MethodSignature,
    StmtKind, Ty, UnaryOp, Value,
};

use crate::builder::{CallableDecl, ClassLikeDecl, DeclarationBuilder};
use crate::{Lowered, Lowerer};

/// Method name invoked to obtain an iterator from an iterable
pub(crate) const ITERATOR_METHOD: &str = "Symbol.iterator";
/// Method name advancing an iterator
pub(crate) const ITERATOR_NEXT: &str = "next";
/// Field holding an iterator result's completion flag
pub(crate) const ITERATOR_DONE: &str = "done";
/// Field holding an iterator result's current value
pub(crate) const ITERATOR_VALUE: &str = "value";

impl<'a, B: DeclarationBuilder> Lowerer<'a, B> {
    /// Lower one expression
    pub fn lower_expr(&mut self, expr: &Expression) -> Lowered {
        match expr {
            Expression::NumberLiteral(_)
            | Expression::StringLiteral(_)
            | Expression::BooleanLiteral(_)
            | Expression::NullLiteral(_)
            | Expression::RegexLiteral(_)
            | Expression::BigIntLiteral(_)
            | Expression::Invalid(_) => self.lower_literal(expr).unwrap_or_else(|| {
                // the caller of a missing literal gets the undefined
                // constant as the substitute default
                Lowered::leaf(Value::Constant(Constant::Undefined), expr.span())
            }),
            Expression::TemplateLiteral(t) => self.lower_template_literal(t),
            Expression::Identifier(id) => self.lower_identifier(id),
            Expression::Binary(b) => self.lower_binary(b),
            Expression::Logical(l) => self.lower_logical(l),
            Expression::Unary(u) => self.lower_unary(u),
            Expression::Update(u) => self.lower_update(u),
            Expression::Call(c) => self.lower_call(c),
            Expression::New(n) => self.lower_new(n),
            Expression::Member(m) => self.lower_member(m),
            Expression::Index(ix) => self.lower_index(ix),
            Expression::Array(arr) => self.lower_array_literal(arr),
            Expression::Object(o) => {
                let span = o.span;
                self.lower_class_like(ClassLikeDecl::Object(o), span)
            }
            Expression::Assignment(a) => self.lower_assignment(a),
            Expression::Conditional(c) => self.lower_conditional(c),
            Expression::Arrow(f) => self.lower_callable(CallableDecl::Arrow(f), f.span),
            Expression::Function(f) => self.lower_callable(CallableDecl::Function(f), f.span),
            Expression::Class(c) => {
                let span = c.span;
                self.lower_class_like(ClassLikeDecl::ClassExpr(c), span)
            }
            Expression::TypeCast(c) => self.lower_type_cast(c),
            Expression::NonNull(n) => self.lower_expr(&n.expression),
            Expression::Parenthesized(p) => self.lower_expr(&p.expression),
            Expression::Typeof(t) => self.lower_typeof(t),
            Expression::Void(v) => self.lower_void(v),
            Expression::Delete(d) => self.lower_delete(d),
            Expression::Await(a) => self.lower_await(a),
            Expression::Yield(y) => self.lower_yield(y),
            Expression::This(span) => self.lower_this(*span),
        }
    }

    /// Lower an expression evaluated only for its side effects, as in an
    /// expression statement or a `void` operand.
    pub(crate) fn lower_expr_for_effect(&mut self, expr: &Expression) -> Vec<lyra_ir::Stmt> {
        let lowered = self.lower_expr(expr);
        let span = lowered.span();
        let mut stmts = lowered.stmts;
        if lowered.value.is_invoke() {
            let stmt = self.ctx.stmt(
                StmtKind::Invoke {
                    invoke: lowered.value,
                },
                vec![span],
            );
            stmts.push(stmt);
        } else if matches!(
            lowered.value,
            Value::Await { .. }
                | Value::Yield { .. }
                | Value::Delete { .. }
                | Value::New { .. }
                | Value::NewArray { .. }
        ) {
            // effectful non-invoke values survive as a temporary assign
            let flat = self.assign_to_temp(Lowered {
                value: lowered.value,
                positions: vec![span],
                stmts: Vec::new(),
            });
            stmts.extend(flat.stmts);
        }
        stmts
    }

    // ------------------------------------------------------------------
    // Flattening
    // ------------------------------------------------------------------

    /// Make a value safe for an atomic operand position: locals and
    /// constants pass through, everything else is assigned to a fresh
    /// temporary first.
    pub(crate) fn flatten(&mut self, lowered: Lowered) -> Lowered {
        if lowered.value.is_atomic() {
            lowered
        } else {
            self.assign_to_temp(lowered)
        }
    }

    /// Like [`Self::flatten`], but the result is always a local; constants
    /// are materialized too. Used where the IR shape demands a base local
    /// (field/array refs, invoke receivers, iterables).
    pub(crate) fn flatten_to_local(&mut self, lowered: Lowered) -> Lowered {
        match lowered.value {
            Value::Local(_) => lowered,
            _ => self.assign_to_temp(lowered),
        }
    }

    fn assign_to_temp(&mut self, lowered: Lowered) -> Lowered {
        let span = lowered.span();
        let temp = self.ctx.fresh_temp(lowered.value.ty());
        let mut stmts = lowered.stmts;
        let stmt = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(temp.clone()),
                rhs: lowered.value,
            },
            vec![span, span],
        );
        stmts.push(stmt);
        Lowered {
            value: Value::Local(temp),
            positions: vec![span],
            stmts,
        }
    }

    pub(crate) fn expect_local(value: &Value) -> Local {
        match value {
            Value::Local(local) => local.clone(),
            other => panic!("expected a flattened local, found {}", other),
        }
    }

    /// Negate a lowered condition for a conditional-branch statement: the
    /// branch is taken (to the false side) when the emitted comparison
    /// holds. Comparisons flip their operator; everything else is
    /// flattened and compared against `false`.
    pub(crate) fn negated_condition(
        &mut self,
        lowered: Lowered,
    ) -> (Value, Span, Vec<lyra_ir::Stmt>) {
        let span = lowered.span();
        match lowered.value {
            Value::Binary { op, lhs, rhs } if op.is_comparison() => (
                Value::Condition {
                    op: op.negate(),
                    lhs,
                    rhs,
                },
                span,
                lowered.stmts,
            ),
            other => {
                let flat = self.flatten(Lowered {
                    value: other,
                    positions: lowered.positions,
                    stmts: lowered.stmts,
                });
                let value = Value::Condition {
                    op: BinaryOp::Eq,
                    lhs: Box::new(flat.value),
                    rhs: Box::new(Value::Constant(Constant::Bool(false))),
                };
                (value, span, flat.stmts)
            }
        }
    }

    // ------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------

    /// Literals map directly to constants; an unrecognized node yields no
    /// value and the caller substitutes a default.
    fn lower_literal(&mut self, expr: &Expression) -> Option<Lowered> {
        let constant = match expr {
            Expression::NumberLiteral(lit) => Constant::Number(lit.value),
            Expression::StringLiteral(lit) => Constant::Str(lit.value.clone()),
            Expression::BooleanLiteral(lit) => Constant::Bool(lit.value),
            Expression::NullLiteral(_) => Constant::Null,
            Expression::RegexLiteral(lit) => {
                Constant::Regex(format!("/{}/{}", lit.pattern, lit.flags))
            }
            Expression::BigIntLiteral(lit) => Constant::BigInt(lit.value.clone()),
            other => {
                warn!(span = %other.span(), "unrecognized literal, no value produced");
                return None;
            }
        };
        Some(Lowered::leaf(Value::Constant(constant), expr.span()))
    }

    /// A use-position identifier: an existing local, or a lazily
    /// registered global reference. `undefined` is the undefined constant.
    fn lower_identifier(&mut self, ident: &ast::Identifier) -> Lowered {
        if ident.name == "undefined" {
            return Lowered::leaf(Value::Constant(Constant::Undefined), ident.span);
        }
        if let Some(local) = self.ctx.local(&ident.name) {
            return Lowered::leaf(Value::Local(local), ident.span);
        }
        let global = self.ctx.global_ref(&ident.name);
        Lowered::leaf(global, ident.span)
    }

    fn lower_this(&mut self, span: Span) -> Lowered {
        if let Some(local) = self.ctx.local("this") {
            return Lowered::leaf(Value::Local(local), span);
        }
        let ty = self
            .enclosing_class
            .as_ref()
            .map(|c| Ty::Class(c.clone()))
            .unwrap_or(Ty::Unknown);
        Lowered::leaf(Value::This { ty }, span)
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn lower_binary(&mut self, b: &ast::BinaryExpression) -> Lowered {
        if matches!(b.op, ast::BinaryOperator::InstanceOf) {
            return self.lower_instanceof(b);
        }
        let left = self.lower_expr(&b.left);
        let left = self.flatten(left);
        let left_span = left.span();
        let mut stmts = left.stmts;
        let right = self.lower_expr(&b.right);
        let right = self.flatten(right);
        let right_span = right.span();
        stmts.extend(right.stmts);
        Lowered {
            value: Value::Binary {
                op: binary_op(b.op),
                lhs: Box::new(left.value),
                rhs: Box::new(right.value),
            },
            positions: vec![b.span, left_span, right_span],
            stmts,
        }
    }

    fn lower_instanceof(&mut self, b: &ast::BinaryExpression) -> Lowered {
        let left = self.lower_expr(&b.left);
        let left = self.flatten(left);
        let mut stmts = left.stmts;
        let check = match &*b.right {
            Expression::Identifier(id) => self
                .builder
                .lookup_class(&id.name)
                .map(Ty::Class)
                .unwrap_or(Ty::UnclearRef {
                    name: id.name.clone(),
                    type_args: Vec::new(),
                }),
            other => {
                warn!(span = %other.span(), "instanceof right-hand side is not a type name");
                stmts.extend(self.lower_expr_for_effect(other));
                Ty::Unknown
            }
        };
        Lowered {
            value: Value::InstanceOf {
                operand: Box::new(left.value),
                check,
            },
            positions: vec![b.span],
            stmts,
        }
    }

    fn lower_unary(&mut self, u: &ast::UnaryExpression) -> Lowered {
        let operand = self.lower_expr(&u.operand);
        let operand = self.flatten(operand);
        let operand_span = operand.span();
        let op = match u.op {
            ast::UnaryOperator::Neg => UnaryOp::Neg,
            ast::UnaryOperator::Pos => UnaryOp::Pos,
            ast::UnaryOperator::Not => UnaryOp::Not,
            ast::UnaryOperator::BitNot => UnaryOp::BitNot,
        };
        Lowered {
            value: Value::Unary {
                op,
                operand: Box::new(operand.value),
            },
            positions: vec![u.span, operand_span],
            stmts: operand.stmts,
        }
    }

    /// `x++` and friends: lowered like a compound assignment with the
    /// constant 1; postfix snapshots the old value first, which becomes
    /// the expression's value.
    fn lower_update(&mut self, u: &ast::UpdateExpression) -> Lowered {
        let op = match u.op {
            ast::UpdateOperator::Increment => BinaryOp::Add,
            ast::UpdateOperator::Decrement => BinaryOp::Sub,
        };
        let one = Value::Constant(Constant::Number(1.0));
        let target = self.lower_expr(&u.target);
        let target_span = target.span();
        let mut stmts = target.stmts;
        match target.value {
            Value::Local(local) => {
                if u.prefix {
                    let stmt = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: Value::Local(local.clone()),
                            rhs: Value::Binary {
                                op,
                                lhs: Box::new(Value::Local(local.clone())),
                                rhs: Box::new(one),
                            },
                        },
                        vec![target_span, u.span],
                    );
                    stmts.push(stmt);
                    Lowered {
                        value: Value::Local(local),
                        positions: vec![u.span],
                        stmts,
                    }
                } else {
                    let old = self.ctx.fresh_temp(local.ty.clone());
                    let snapshot = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: Value::Local(old.clone()),
                            rhs: Value::Local(local.clone()),
                        },
                        vec![u.span, target_span],
                    );
                    stmts.push(snapshot);
                    let bump = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: Value::Local(local.clone()),
                            rhs: Value::Binary {
                                op,
                                lhs: Box::new(Value::Local(local)),
                                rhs: Box::new(one),
                            },
                        },
                        vec![target_span, u.span],
                    );
                    stmts.push(bump);
                    Lowered {
                        value: Value::Local(old),
                        positions: vec![u.span],
                        stmts,
                    }
                }
            }
            target_ref @ (Value::InstanceFieldRef { .. }
            | Value::StaticFieldRef { .. }
            | Value::ArrayRef { .. }) => {
                let old = self.ctx.fresh_temp(target_ref.ty());
                let read = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(old.clone()),
                        rhs: target_ref.clone(),
                    },
                    vec![u.span, target_span],
                );
                stmts.push(read);
                let bumped = self.ctx.fresh_temp(old.ty.clone());
                let bump = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(bumped.clone()),
                        rhs: Value::Binary {
                            op,
                            lhs: Box::new(Value::Local(old.clone())),
                            rhs: Box::new(one),
                        },
                    },
                    vec![u.span, u.span],
                );
                stmts.push(bump);
                let write = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: target_ref,
                        rhs: Value::Local(bumped.clone()),
                    },
                    vec![target_span, u.span],
                );
                stmts.push(write);
                let result = if u.prefix { bumped } else { old };
                Lowered {
                    value: Value::Local(result),
                    positions: vec![u.span],
                    stmts,
                }
            }
            other => {
                warn!(span = %u.span, "unsupported update target");
                Lowered {
                    value: other,
                    positions: vec![u.span],
                    stmts,
                }
            }
        }
    }

    /// Short-circuiting operators reuse the ternary diamond so the right
    /// operand's statements only sit in the region the CFG builder guards.
    fn lower_logical(&mut self, l: &ast::LogicalExpression) -> Lowered {
        let n = self.ctx.next_marker();
        let left = self.lower_expr(&l.left);
        let left = self.flatten(left);
        let left_span = left.span();
        let mut stmts = left.stmts;
        let result = self.ctx.fresh_temp(Ty::Unknown);

        let condition = match l.op {
            ast::LogicalOperator::And | ast::LogicalOperator::Or => Value::Condition {
                op: BinaryOp::Eq,
                lhs: Box::new(left.value.clone()),
                rhs: Box::new(Value::Constant(Constant::Bool(false))),
            },
            ast::LogicalOperator::Coalesce => Value::Condition {
                op: BinaryOp::NotEq,
                lhs: Box::new(left.value.clone()),
                rhs: Box::new(Value::Constant(Constant::Null)),
            },
        };
        let branch = self.ctx.stmt(StmtKind::If { condition }, vec![left_span]);
        stmts.push(branch);

        let open = self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::TernaryTrue(n)), Vec::new());
        stmts.push(open);
        match l.op {
            ast::LogicalOperator::And | ast::LogicalOperator::Coalesce => {
                let right = self.lower_expr(&l.right);
                let right_span = right.span();
                stmts.extend(right.stmts);
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(result.clone()),
                        rhs: right.value,
                    },
                    vec![l.span, right_span],
                );
                stmts.push(assign);
            }
            ast::LogicalOperator::Or => {
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(result.clone()),
                        rhs: left.value.clone(),
                    },
                    vec![l.span, left_span],
                );
                stmts.push(assign);
            }
        }

        let split = self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::TernaryFalse(n)), Vec::new());
        stmts.push(split);
        match l.op {
            ast::LogicalOperator::And | ast::LogicalOperator::Coalesce => {
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(result.clone()),
                        rhs: left.value,
                    },
                    vec![l.span, left_span],
                );
                stmts.push(assign);
            }
            ast::LogicalOperator::Or => {
                let right = self.lower_expr(&l.right);
                let right_span = right.span();
                stmts.extend(right.stmts);
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(result.clone()),
                        rhs: right.value,
                    },
                    vec![l.span, right_span],
                );
                stmts.push(assign);
            }
        }

        let close = self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::TernaryEnd(n)), Vec::new());
        stmts.push(close);
        Lowered {
            value: Value::Local(result),
            positions: vec![l.span],
            stmts,
        }
    }

    /// Ternary: an if/else diamond into one shared result temporary,
    /// delimited by a uniquely numbered marker triple.
    fn lower_conditional(&mut self, c: &ast::ConditionalExpression) -> Lowered {
        let n = self.ctx.next_marker();
        let test = self.lower_expr(&c.test);
        let (condition, cond_span, mut stmts) = self.negated_condition(test);
        let result = self.ctx.fresh_temp(Ty::Unknown);
        let branch = self.ctx.stmt(StmtKind::If { condition }, vec![cond_span]);
        stmts.push(branch);

        let open = self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::TernaryTrue(n)), Vec::new());
        stmts.push(open);
        let then = self.lower_expr(&c.consequent);
        let then_span = then.span();
        stmts.extend(then.stmts);
        let assign_then = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(result.clone()),
                rhs: then.value,
            },
            vec![c.span, then_span],
        );
        stmts.push(assign_then);

        let split = self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::TernaryFalse(n)), Vec::new());
        stmts.push(split);
        let alt = self.lower_expr(&c.alternate);
        let alt_span = alt.span();
        stmts.extend(alt.stmts);
        let assign_alt = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(result.clone()),
                rhs: alt.value,
            },
            vec![c.span, alt_span],
        );
        stmts.push(assign_alt);

        let close = self
            .ctx
            .stmt(StmtKind::Marker(MarkerTag::TernaryEnd(n)), Vec::new());
        stmts.push(close);
        Lowered {
            value: Value::Local(result),
            positions: vec![c.span],
            stmts,
        }
    }

    // ------------------------------------------------------------------
    // Access paths
    // ------------------------------------------------------------------

    fn lower_member(&mut self, m: &ast::MemberExpression) -> Lowered {
        // a bare identifier naming a known class (and not shadowed by a
        // local) is a static field access
        if let Expression::Identifier(obj) = &*m.object {
            if self.ctx.local(&obj.name).is_none() {
                if let Some(class) = self.builder.lookup_class(&obj.name) {
                    let field =
                        FieldSignature::new(Some(class.name), m.property.name.clone(), Ty::Unknown);
                    return Lowered {
                        value: Value::StaticFieldRef { field },
                        positions: vec![m.span, obj.span],
                        stmts: Vec::new(),
                    };
                }
            }
        }
        let base = self.lower_expr(&m.object);
        let base = self.flatten_to_local(base);
        let base_span = base.span();
        let base_local = Self::expect_local(&base.value);
        let class = match &base_local.ty {
            Ty::Class(sig) => Some(sig.name.clone()),
            _ => None,
        };
        let field = FieldSignature::new(class, m.property.name.clone(), Ty::Unknown);
        Lowered {
            value: Value::InstanceFieldRef {
                base: base_local,
                field,
            },
            positions: vec![m.span, base_span],
            stmts: base.stmts,
        }
    }

    fn lower_index(&mut self, ix: &ast::IndexExpression) -> Lowered {
        let base = self.lower_expr(&ix.object);
        let base = self.flatten_to_local(base);
        let mut stmts = base.stmts;
        let base_local = Self::expect_local(&base.value);
        let idx = self.lower_expr(&ix.index);
        let idx = self.flatten(idx);
        let idx_span = idx.span();
        stmts.extend(idx.stmts);
        if base_local.ty.is_array_like() {
            return Lowered {
                value: Value::ArrayRef {
                    base: base_local,
                    index: Box::new(idx.value),
                },
                positions: vec![ix.span, idx_span],
                stmts,
            };
        }
        // dynamic property access approximated as a field keyed by the
        // stringified index value
        let class = match &base_local.ty {
            Ty::Class(sig) => Some(sig.name.clone()),
            _ => None,
        };
        let field = FieldSignature::new(class, stringify_index(&idx.value), Ty::Unknown);
        Lowered {
            value: Value::InstanceFieldRef {
                base: base_local,
                field,
            },
            positions: vec![ix.span, idx_span],
            stmts,
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Lower every argument in order, flattened for atomic positions
    pub(crate) fn lower_args(
        &mut self,
        args: &[Expression],
    ) -> (Vec<Value>, Vec<Span>, Vec<lyra_ir::Stmt>) {
        let mut values = Vec::with_capacity(args.len());
        let mut positions = Vec::with_capacity(args.len());
        let mut stmts = Vec::new();
        for arg in args {
            let lowered = self.lower_expr(arg);
            let lowered = self.flatten(lowered);
            positions.push(lowered.span());
            stmts.extend(lowered.stmts);
            values.push(lowered.value);
        }
        (values, positions, stmts)
    }

    fn lower_call(&mut self, call: &ast::CallExpression) -> Lowered {
        // declarative-UI callees expand to create/body/pop
        if let Expression::Identifier(name) = &*call.callee {
            if self.builder.is_component(&name.name) || self.builder.is_foreach_component(&name.name)
            {
                return self.lower_component_call(name, call);
            }
        }
        match &*call.callee {
            Expression::Member(m) => {
                // receiver shape selects the invoke kind
                let static_class = match &*m.object {
                    Expression::Identifier(obj) if self.ctx.local(&obj.name).is_none() => {
                        self.builder.lookup_class(&obj.name)
                    }
                    _ => None,
                };
                if let Some(class) = static_class {
                    let (args, arg_positions, stmts) = self.lower_args(&call.args);
                    let method = MethodSignature::on_class(class.name, m.property.name.clone());
                    let mut positions = vec![call.span];
                    positions.extend(arg_positions);
                    return Lowered {
                        value: Value::StaticInvoke { method, args },
                        positions,
                        stmts,
                    };
                }
                let base = self.lower_expr(&m.object);
                let base = self.flatten_to_local(base);
                let mut stmts = base.stmts;
                let base_local = Self::expect_local(&base.value);
                let (args, arg_positions, arg_stmts) = self.lower_args(&call.args);
                stmts.extend(arg_stmts);
                let class = match &base_local.ty {
                    Ty::Class(sig) => Some(sig.name.clone()),
                    _ => None,
                };
                let method = MethodSignature::new(class, m.property.name.clone());
                let mut positions = vec![call.span];
                positions.extend(arg_positions);
                Lowered {
                    value: Value::InstanceInvoke {
                        base: base_local,
                        method,
                        args,
                    },
                    positions,
                    stmts,
                }
            }
            Expression::Identifier(id) => {
                if let Some(local) = self.ctx.local(&id.name) {
                    if local.ty.is_function() {
                        let (args, arg_positions, stmts) = self.lower_args(&call.args);
                        let mut positions = vec![call.span];
                        positions.extend(arg_positions);
                        return Lowered {
                            value: Value::PtrInvoke {
                                callee: local,
                                args,
                            },
                            positions,
                            stmts,
                        };
                    }
                }
                // best-effort static invoke by name
                let (args, arg_positions, stmts) = self.lower_args(&call.args);
                let mut positions = vec![call.span];
                positions.extend(arg_positions);
                Lowered {
                    value: Value::StaticInvoke {
                        method: MethodSignature::unresolved(id.name.clone()),
                        args,
                    },
                    positions,
                    stmts,
                }
            }
            other => {
                // any other callee shape is flattened, then invoked by the
                // temporary's name
                let callee = self.lower_expr(other);
                let callee = self.flatten_to_local(callee);
                let mut stmts = callee.stmts;
                let callee_local = Self::expect_local(&callee.value);
                let (args, arg_positions, arg_stmts) = self.lower_args(&call.args);
                stmts.extend(arg_stmts);
                let mut positions = vec![call.span];
                positions.extend(arg_positions);
                Lowered {
                    value: Value::StaticInvoke {
                        method: MethodSignature::unresolved(callee_local.name),
                        args,
                    },
                    positions,
                    stmts,
                }
            }
        }
    }

    /// A component callee rewrites to `create(args)` / body / `pop()`; a
    /// trailing closure argument becomes the body.
    fn lower_component_call(&mut self, name: &ast::Identifier, call: &ast::CallExpression) -> Lowered {
        let component = name.name.clone();
        let (value_args, trailing): (&[Expression], Option<&ast::ArrowFunction>) =
            match call.args.split_last() {
                Some((Expression::Arrow(arrow), rest)) => (rest, Some(arrow)),
                _ => (call.args.as_slice(), None),
            };

        let (args, _arg_positions, mut stmts) = self.lower_args(value_args);
        let create = self.ctx.stmt(
            StmtKind::Invoke {
                invoke: Value::StaticInvoke {
                    method: MethodSignature::on_class(component.clone(), "create"),
                    args,
                },
            },
            vec![call.span],
        );
        stmts.push(create);

        if let Some(arrow) = trailing {
            for param in &arrow.params {
                match &param.pattern {
                    ast::Pattern::Identifier(id) => {
                        let ty = param
                            .type_annotation
                            .as_ref()
                            .map(|t| self.resolve_type(t))
                            .unwrap_or(Ty::Unknown);
                        self.ctx.declare_local(id.name.clone(), ty, false);
                    }
                    other => {
                        warn!(span = %other.span(), "unsupported closure parameter, binding dropped");
                    }
                }
            }
            match &arrow.body {
                ast::ArrowBody::Block(block) => {
                    for inner in &block.statements {
                        let lowered = self.lower_stmt(inner);
                        stmts.extend(lowered);
                    }
                }
                ast::ArrowBody::Expr(expr) => {
                    stmts.extend(self.lower_expr_for_effect(expr));
                }
            }
        }

        let pop = self.ctx.stmt(
            StmtKind::Invoke {
                invoke: Value::StaticInvoke {
                    method: MethodSignature::on_class(component, "pop"),
                    args: Vec::new(),
                },
            },
            vec![call.span],
        );
        stmts.push(pop);
        Lowered {
            value: Value::Constant(Constant::Undefined),
            positions: vec![call.span],
            stmts,
        }
    }

    fn lower_new(&mut self, n: &ast::NewExpression) -> Lowered {
        if n.callee.name == "Array" {
            return self.lower_new_array(n);
        }
        let class = self
            .builder
            .lookup_class(&n.callee.name)
            .unwrap_or_else(|| ClassSignature::new(n.callee.name.clone()));
        let (args, _arg_positions, mut stmts) = self.lower_args(&n.args);
        let temp = self.ctx.fresh_temp(Ty::Class(class.clone()));
        let alloc = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(temp.clone()),
                rhs: Value::New {
                    class: class.clone(),
                },
            },
            vec![n.span, n.span],
        );
        stmts.push(alloc);
        let construct = self.ctx.stmt(
            StmtKind::Invoke {
                invoke: Value::InstanceInvoke {
                    base: temp.clone(),
                    method: MethodSignature::on_class(class.name, "constructor"),
                    args,
                },
            },
            vec![n.span],
        );
        stmts.push(construct);
        Lowered {
            value: Value::Local(temp),
            positions: vec![n.span],
            stmts,
        }
    }

    /// `new Array(n)` with one numeric argument is a length-only
    /// allocation; any other argument list initializes per element.
    fn lower_new_array(&mut self, n: &ast::NewExpression) -> Lowered {
        let mut stmts = Vec::new();
        let mut elems = Vec::with_capacity(n.args.len());
        for arg in &n.args {
            let lowered = self.lower_expr(arg);
            let lowered = self.flatten(lowered);
            stmts.extend(lowered.stmts);
            elems.push(lowered.value);
        }

        if elems.len() == 1 && elems[0].ty() == Ty::Number {
            let size = elems.pop().expect("one element checked above");
            let temp = self.ctx.fresh_temp(Ty::Array(Box::new(Ty::Unknown)));
            let alloc = self.ctx.stmt(
                StmtKind::Assign {
                    lhs: Value::Local(temp.clone()),
                    rhs: Value::NewArray {
                        elem_ty: Ty::Unknown,
                        size: Box::new(size),
                    },
                },
                vec![n.span, n.span],
            );
            stmts.push(alloc);
            return Lowered {
                value: Value::Local(temp),
                positions: vec![n.span],
                stmts,
            };
        }

        let elem_ty = elems.first().map(|v| v.ty()).unwrap_or(Ty::Unknown);
        let temp = self
            .ctx
            .fresh_temp(Ty::Array(Box::new(elem_ty.clone())));
        let alloc = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(temp.clone()),
                rhs: Value::NewArray {
                    elem_ty,
                    size: Box::new(Value::Constant(Constant::Number(elems.len() as f64))),
                },
            },
            vec![n.span, n.span],
        );
        stmts.push(alloc);
        for (i, elem) in elems.into_iter().enumerate() {
            let store = self.ctx.stmt(
                StmtKind::Assign {
                    lhs: Value::ArrayRef {
                        base: temp.clone(),
                        index: Box::new(Value::Constant(Constant::Number(i as f64))),
                    },
                    rhs: elem,
                },
                vec![n.span, n.span],
            );
            stmts.push(store);
        }
        Lowered {
            value: Value::Local(temp),
            positions: vec![n.span],
            stmts,
        }
    }

    // ------------------------------------------------------------------
    // Structured literals
    // ------------------------------------------------------------------

    fn lower_array_literal(&mut self, arr: &ast::ArrayExpression) -> Lowered {
        let mut stmts = Vec::new();
        let mut elems = Vec::with_capacity(arr.elements.len());
        // element expressions evaluate in source order, before the array
        // exists
        for elem in &arr.elements {
            let lowered = self.lower_expr(elem);
            let lowered = self.flatten(lowered);
            stmts.extend(lowered.stmts);
            elems.push(lowered.value);
        }
        let elem_ty = elems.first().map(|v| v.ty()).unwrap_or(Ty::Unknown);
        let temp = self
            .ctx
            .fresh_temp(Ty::Array(Box::new(elem_ty.clone())));
        let alloc = self.ctx.stmt(
            StmtKind::Assign {
                lhs: Value::Local(temp.clone()),
                rhs: Value::NewArray {
                    elem_ty,
                    size: Box::new(Value::Constant(Constant::Number(elems.len() as f64))),
                },
            },
            vec![arr.span, arr.span],
        );
        stmts.push(alloc);
        for (i, elem) in elems.into_iter().enumerate() {
            let store = self.ctx.stmt(
                StmtKind::Assign {
                    lhs: Value::ArrayRef {
                        base: temp.clone(),
                        index: Box::new(Value::Constant(Constant::Number(i as f64))),
                    },
                    rhs: elem,
                },
                vec![arr.span, arr.span],
            );
            stmts.push(store);
        }
        Lowered {
            value: Value::Local(temp),
            positions: vec![arr.span],
            stmts,
        }
    }

    /// Object/class literals belong to the declaration-model builder; the
    /// engine gets a class back and emits allocation plus constructor
    /// invoke.
    fn lower_class_like(&mut self, node: ClassLikeDecl<'_>, span: Span) -> Lowered {
        match self.builder.build_class(node) {
            Ok(class) => {
                let temp = self.ctx.fresh_temp(Ty::Class(class.clone()));
                let alloc = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(temp.clone()),
                        rhs: Value::New {
                            class: class.clone(),
                        },
                    },
                    vec![span, span],
                );
                let construct = self.ctx.stmt(
                    StmtKind::Invoke {
                        invoke: Value::InstanceInvoke {
                            base: temp.clone(),
                            method: MethodSignature::on_class(class.name, "constructor"),
                            args: Vec::new(),
                        },
                    },
                    vec![span],
                );
                Lowered {
                    value: Value::Local(temp),
                    positions: vec![span],
                    stmts: vec![alloc, construct],
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot build class for literal, substituting undefined");
                Lowered::leaf(Value::Constant(Constant::Undefined), span)
            }
        }
    }

    /// Arrow/function literals become a function-typed local naming the
    /// synthesized method.
    fn lower_callable(&mut self, node: CallableDecl<'_>, span: Span) -> Lowered {
        match self.builder.build_method(node) {
            Ok(sig) => {
                let local =
                    self.ctx
                        .declare_local(sig.name.clone(), Ty::Function(Box::new(sig)), false);
                Lowered::leaf(Value::Local(local), span)
            }
            Err(err) => {
                warn!(error = %err, "cannot build method for callable, substituting undefined");
                Lowered::leaf(Value::Constant(Constant::Undefined), span)
            }
        }
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    fn lower_assignment(&mut self, a: &ast::AssignmentExpression) -> Lowered {
        if matches!(a.operator, ast::AssignmentOperator::Assign)
            && matches!(&*a.left, Expression::Array(_) | Expression::Object(_))
        {
            return self.lower_destructuring_assignment(&a.left, &a.right, a.span);
        }

        let target = self.lower_assign_target(&a.left);
        let target_span = target.span();
        let mut stmts = target.stmts;
        let rhs = self.lower_expr(&a.right);

        match compound_op(a.operator) {
            None => {
                // a reference target takes only atomic right-hand sides
                let rhs = if target.value.is_atomic() {
                    rhs
                } else {
                    self.flatten(rhs)
                };
                let rhs_span = rhs.span();
                let rhs_value = rhs.value;
                stmts.extend(rhs.stmts);
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: target.value.clone(),
                        rhs: rhs_value.clone(),
                    },
                    vec![target_span, rhs_span],
                );
                stmts.push(assign);
                let result = if matches!(target.value, Value::Local(_)) {
                    target.value
                } else {
                    rhs_value
                };
                Lowered {
                    value: result,
                    positions: vec![a.span],
                    stmts,
                }
            }
            Some(op) => {
                // the right side is flattened only when both sides are
                // non-atomic; the mutation target itself never is
                let rhs = if !target.value.is_atomic() && !rhs.value.is_atomic() {
                    self.flatten(rhs)
                } else {
                    rhs
                };
                stmts.extend(rhs.stmts);
                let combined = Value::Binary {
                    op,
                    lhs: Box::new(target.value.clone()),
                    rhs: Box::new(rhs.value),
                };
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: target.value.clone(),
                        rhs: combined,
                    },
                    vec![target_span, a.span],
                );
                stmts.push(assign);
                Lowered {
                    value: target.value,
                    positions: vec![a.span],
                    stmts,
                }
            }
        }
    }

    /// An assignment target: a (possibly newly declared) local, or a
    /// field/array reference.
    fn lower_assign_target(&mut self, expr: &Expression) -> Lowered {
        match expr {
            Expression::Identifier(id) => {
                if let Some(local) = self.ctx.local(&id.name) {
                    Lowered::leaf(Value::Local(local), id.span)
                } else {
                    let local = self.ctx.declare_local(id.name.clone(), Ty::Unknown, false);
                    Lowered::leaf(Value::Local(local), id.span)
                }
            }
            Expression::Member(m) => self.lower_member(m),
            Expression::Index(ix) => self.lower_index(ix),
            other => {
                warn!(span = %other.span(), "unsupported assignment target, evaluating for effect");
                let lowered = self.lower_expr(other);
                self.flatten(lowered)
            }
        }
    }

    /// Destructuring assignment: the source flattens to one temporary,
    /// then each target gets an indexed/field read in source order.
    fn lower_destructuring_assignment(
        &mut self,
        left: &Expression,
        right: &Expression,
        span: Span,
    ) -> Lowered {
        let src = self.lower_expr(right);
        let src = self.flatten_to_local(src);
        let mut stmts = src.stmts;
        let src_local = Self::expect_local(&src.value);

        match left {
            Expression::Array(arr) => {
                for (i, elem) in arr.elements.iter().enumerate() {
                    match elem {
                        Expression::Identifier(id) => {
                            let target = self.lower_assign_target(elem);
                            let rhs = Value::ArrayRef {
                                base: src_local.clone(),
                                index: Box::new(Value::Constant(Constant::Number(i as f64))),
                            };
                            let assign = self.ctx.stmt(
                                StmtKind::Assign {
                                    lhs: target.value,
                                    rhs,
                                },
                                vec![id.span, span],
                            );
                            stmts.push(assign);
                        }
                        other => {
                            warn!(span = %other.span(), "unsupported destructuring element, dropped");
                        }
                    }
                }
            }
            Expression::Object(obj) => {
                for prop in &obj.properties {
                    let binding = if prop.shorthand {
                        &prop.key
                    } else {
                        match &prop.value {
                            Expression::Identifier(id) => id,
                            other => {
                                warn!(span = %other.span(), "unsupported destructuring element, dropped");
                                continue;
                            }
                        }
                    };
                    let target =
                        self.lower_assign_target(&Expression::Identifier(binding.clone()));
                    let rhs = Value::InstanceFieldRef {
                        base: src_local.clone(),
                        field: FieldSignature::new(None, prop.key.name.clone(), Ty::Unknown),
                    };
                    let assign = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: target.value,
                            rhs,
                        },
                        vec![binding.span, span],
                    );
                    stmts.push(assign);
                }
            }
            other => {
                warn!(span = %other.span(), "unsupported destructuring target");
            }
        }
        Lowered {
            value: Value::Local(src_local),
            positions: vec![span],
            stmts,
        }
    }

    /// Destructuring in declaration position; targets are freshly
    /// declared locals.
    pub(crate) fn lower_destructuring_pattern(
        &mut self,
        pattern: &ast::Pattern,
        src: &Local,
        is_const: bool,
        span: Span,
        stmts: &mut Vec<lyra_ir::Stmt>,
    ) {
        match pattern {
            ast::Pattern::Identifier(id) => {
                let local = self
                    .ctx
                    .declare_local(id.name.clone(), src.ty.clone(), is_const);
                let assign = self.ctx.stmt(
                    StmtKind::Assign {
                        lhs: Value::Local(local),
                        rhs: Value::Local(src.clone()),
                    },
                    vec![id.span, span],
                );
                stmts.push(assign);
            }
            ast::Pattern::Array(arr) => {
                for (i, elem) in arr.elements.iter().enumerate() {
                    let Some(elem) = elem else { continue };
                    match elem {
                        ast::Pattern::Identifier(id) => {
                            let ty = src.ty.element_type().unwrap_or(Ty::Unknown);
                            let local = self.ctx.declare_local(id.name.clone(), ty, is_const);
                            let assign = self.ctx.stmt(
                                StmtKind::Assign {
                                    lhs: Value::Local(local),
                                    rhs: Value::ArrayRef {
                                        base: src.clone(),
                                        index: Box::new(Value::Constant(Constant::Number(
                                            i as f64,
                                        ))),
                                    },
                                },
                                vec![id.span, span],
                            );
                            stmts.push(assign);
                        }
                        other => {
                            warn!(span = %other.span(), "unsupported destructuring element, binding dropped");
                        }
                    }
                }
            }
            ast::Pattern::Object(obj) => {
                for prop in &obj.properties {
                    let binding = match &prop.value {
                        None => &prop.key,
                        Some(ast::Pattern::Identifier(id)) => id,
                        Some(other) => {
                            warn!(span = %other.span(), "unsupported destructuring element, binding dropped");
                            continue;
                        }
                    };
                    let local = self
                        .ctx
                        .declare_local(binding.name.clone(), Ty::Unknown, is_const);
                    let assign = self.ctx.stmt(
                        StmtKind::Assign {
                            lhs: Value::Local(local),
                            rhs: Value::InstanceFieldRef {
                                base: src.clone(),
                                field: FieldSignature::new(
                                    None,
                                    prop.key.name.clone(),
                                    Ty::Unknown,
                                ),
                            },
                        },
                        vec![binding.span, span],
                    );
                    stmts.push(assign);
                }
            }
            ast::Pattern::Rest(rest) => {
                warn!(span = %rest.span, "unsupported rest binding, dropped");
            }
        }
    }

    // ------------------------------------------------------------------
    // Strings, casts, wrappers
    // ------------------------------------------------------------------

    /// Left-fold of alternating chunks and expressions into nested
    /// concatenations; every intermediate is flattened so evaluation
    /// order survives the fold.
    fn lower_template_literal(&mut self, t: &ast::TemplateLiteral) -> Lowered {
        let mut stmts = Vec::new();
        let mut acc: Option<Value> = None;
        for part in &t.parts {
            let piece = match part {
                ast::TemplatePart::Chunk(chunk) => {
                    if chunk.value.is_empty() {
                        continue;
                    }
                    Value::Constant(Constant::Str(chunk.value.clone()))
                }
                ast::TemplatePart::Expr(expr) => {
                    let lowered = self.lower_expr(expr);
                    let lowered = self.flatten(lowered);
                    stmts.extend(lowered.stmts);
                    lowered.value
                }
            };
            acc = Some(match acc {
                None => piece,
                Some(prev) => {
                    let concat = Lowered {
                        value: Value::Binary {
                            op: BinaryOp::Add,
                            lhs: Box::new(prev),
                            rhs: Box::new(piece),
                        },
                        positions: vec![t.span],
                        stmts: Vec::new(),
                    };
                    let flat = self.assign_to_temp(concat);
                    stmts.extend(flat.stmts);
                    flat.value
                }
            });
        }
        let value = acc.unwrap_or(Value::Constant(Constant::Str(String::new())));
        Lowered {
            value,
            positions: vec![t.span],
            stmts,
        }
    }

    fn lower_type_cast(&mut self, c: &ast::TypeCastExpression) -> Lowered {
        let operand = self.lower_expr(&c.expression);
        let operand = self.flatten(operand);
        let operand_span = operand.span();
        let ty = self.resolve_type(&c.ty);
        Lowered {
            value: Value::Cast {
                operand: Box::new(operand.value),
                ty,
            },
            positions: vec![c.span, operand_span],
            stmts: operand.stmts,
        }
    }

    fn lower_typeof(&mut self, t: &ast::TypeofExpression) -> Lowered {
        let operand = self.lower_expr(&t.operand);
        let operand = self.flatten(operand);
        let operand_span = operand.span();
        Lowered {
            value: Value::TypeOf {
                operand: Box::new(operand.value),
            },
            positions: vec![t.span, operand_span],
            stmts: operand.stmts,
        }
    }

    /// `void expr` discards the value but keeps the operand's statements
    fn lower_void(&mut self, v: &ast::VoidExpression) -> Lowered {
        let stmts = self.lower_expr_for_effect(&v.operand);
        Lowered {
            value: Value::Constant(Constant::Undefined),
            positions: vec![v.span],
            stmts,
        }
    }

    fn lower_delete(&mut self, d: &ast::DeleteExpression) -> Lowered {
        let lowered = self.lower_expr(&d.operand);
        match &lowered.value {
            Value::InstanceFieldRef { .. } | Value::StaticFieldRef { .. } | Value::ArrayRef { .. } => {
                Lowered {
                    value: Value::Delete {
                        target: Box::new(lowered.value),
                    },
                    positions: vec![d.span],
                    stmts: lowered.stmts,
                }
            }
            _ => {
                warn!(span = %d.span, "delete target is not a property reference");
                Lowered {
                    value: Value::Constant(Constant::Bool(true)),
                    positions: vec![d.span],
                    stmts: lowered.stmts,
                }
            }
        }
    }

    fn lower_await(&mut self, a: &ast::AwaitExpression) -> Lowered {
        let operand = self.lower_expr(&a.operand);
        let operand = self.flatten(operand);
        let operand_span = operand.span();
        Lowered {
            value: Value::Await {
                operand: Box::new(operand.value),
            },
            positions: vec![a.span, operand_span],
            stmts: operand.stmts,
        }
    }

    fn lower_yield(&mut self, y: &ast::YieldExpression) -> Lowered {
        let (operand, stmts, operand_span) = match &y.operand {
            Some(expr) => {
                let lowered = self.lower_expr(expr);
                let lowered = self.flatten(lowered);
                let span = lowered.span();
                (lowered.value, lowered.stmts, span)
            }
            None => (Value::Constant(Constant::Undefined), Vec::new(), y.span),
        };
        Lowered {
            value: Value::Yield {
                operand: Box::new(operand),
            },
            positions: vec![y.span, operand_span],
            stmts,
        }
    }
}

fn binary_op(op: ast::BinaryOperator) -> BinaryOp {
    match op {
        ast::BinaryOperator::Add => BinaryOp::Add,
        ast::BinaryOperator::Sub => BinaryOp::Sub,
        ast::BinaryOperator::Mul => BinaryOp::Mul,
        ast::BinaryOperator::Div => BinaryOp::Div,
        ast::BinaryOperator::Mod => BinaryOp::Mod,
        ast::BinaryOperator::Exp => BinaryOp::Exp,
        ast::BinaryOperator::Eq => BinaryOp::Eq,
        ast::BinaryOperator::NotEq => BinaryOp::NotEq,
        ast::BinaryOperator::StrictEq => BinaryOp::StrictEq,
        ast::BinaryOperator::StrictNotEq => BinaryOp::StrictNotEq,
        ast::BinaryOperator::Lt => BinaryOp::Lt,
        ast::BinaryOperator::LtEq => BinaryOp::LtEq,
        ast::BinaryOperator::Gt => BinaryOp::Gt,
        ast::BinaryOperator::GtEq => BinaryOp::GtEq,
        ast::BinaryOperator::BitAnd => BinaryOp::BitAnd,
        ast::BinaryOperator::BitOr => BinaryOp::BitOr,
        ast::BinaryOperator::BitXor => BinaryOp::BitXor,
        ast::BinaryOperator::Shl => BinaryOp::Shl,
        ast::BinaryOperator::Shr => BinaryOp::Shr,
        ast::BinaryOperator::UShr => BinaryOp::UShr,
        ast::BinaryOperator::In => BinaryOp::In,
        ast::BinaryOperator::InstanceOf => unreachable!("instanceof is lowered separately"),
    }
}

fn compound_op(op: ast::AssignmentOperator) -> Option<BinaryOp> {
    match op {
        ast::AssignmentOperator::Assign => None,
        ast::AssignmentOperator::AddAssign => Some(BinaryOp::Add),
        ast::AssignmentOperator::SubAssign => Some(BinaryOp::Sub),
        ast::AssignmentOperator::MulAssign => Some(BinaryOp::Mul),
        ast::AssignmentOperator::DivAssign => Some(BinaryOp::Div),
        ast::AssignmentOperator::ModAssign => Some(BinaryOp::Mod),
        ast::AssignmentOperator::ExpAssign => Some(BinaryOp::Exp),
        ast::AssignmentOperator::BitAndAssign => Some(BinaryOp::BitAnd),
        ast::AssignmentOperator::BitOrAssign => Some(BinaryOp::BitOr),
        ast::AssignmentOperator::BitXorAssign => Some(BinaryOp::BitXor),
        ast::AssignmentOperator::ShlAssign => Some(BinaryOp::Shl),
        ast::AssignmentOperator::ShrAssign => Some(BinaryOp::Shr),
        ast::AssignmentOperator::UShrAssign => Some(BinaryOp::UShr),
    }
}

/// Dynamic property keys degrade to the stringified index value
fn stringify_index(value: &Value) -> String {
    match value {
        Value::Constant(Constant::Number(n)) if n.fract() == 0.0 && n.is_finite() => {
            format!("{}", *n as i64)
        }
        Value::Constant(Constant::Str(s)) => s.clone(),
        Value::Constant(c) => c.to_string(),
        Value::Local(local) => local.name.clone(),
        other => other.to_string(),
    }
}
