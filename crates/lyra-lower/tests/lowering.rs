//! End-to-end lowering over whole method bodies

use lyra_ast::ast::{
    self, ArrowBody, ArrowFunction, BlockStatement, Expression, Identifier, Parameter, Pattern,
    PrimitiveType, Statement, Type, TypeAnnotation,
};
use lyra_ast::Span;
use lyra_ir::{BinaryOp, Constant, MarkerTag, Stmt, StmtKind, Ty, Value};
use lyra_lower::{Lowerer, MethodBody, StubBuilder};

fn sp() -> Span {
    Span::on_line(1, 0, 1)
}

fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name, sp()))
}

fn num(v: f64) -> Expression {
    Expression::NumberLiteral(ast::NumberLiteral { value: v, span: sp() })
}

fn bin(op: ast::BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(ast::BinaryExpression {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span: sp(),
    })
}

fn assign(left: Expression, right: Expression) -> Statement {
    Statement::Expression(ast::ExpressionStatement {
        expression: Expression::Assignment(ast::AssignmentExpression {
            operator: ast::AssignmentOperator::Assign,
            left: Box::new(left),
            right: Box::new(right),
            span: sp(),
        }),
        span: sp(),
    })
}

fn index(object: Expression, idx: Expression) -> Expression {
    Expression::Index(ast::IndexExpression {
        object: Box::new(object),
        index: Box::new(idx),
        span: sp(),
    })
}

fn call_stmt(callee: Expression, args: Vec<Expression>) -> Statement {
    Statement::Expression(ast::ExpressionStatement {
        expression: Expression::Call(ast::CallExpression {
            callee: Box::new(callee),
            args,
            span: sp(),
        }),
        span: sp(),
    })
}

fn number_param(name: &str) -> Parameter {
    param(name, Type::Primitive(PrimitiveType::Number))
}

fn array_param(name: &str) -> Parameter {
    param(
        name,
        Type::Array(ast::ArrayType {
            element_type: Box::new(TypeAnnotation {
                ty: Type::Primitive(PrimitiveType::Number),
                span: sp(),
            }),
        }),
    )
}

fn param(name: &str, ty: Type) -> Parameter {
    Parameter {
        pattern: Pattern::Identifier(Identifier::new(name, sp())),
        type_annotation: Some(TypeAnnotation { ty, span: sp() }),
        default_value: None,
        span: sp(),
    }
}

fn block(statements: Vec<Statement>) -> BlockStatement {
    BlockStatement {
        statements,
        span: sp(),
    }
}

fn lower(params: &[Parameter], body: BlockStatement) -> MethodBody {
    let mut builder = StubBuilder::new();
    let lowerer = Lowerer::new("", &mut builder);
    lowerer.lower_method_body(params, &body)
}

/// Statements remaining after the parameter prologue
fn after_prologue<'m>(body: &'m MethodBody, params: usize) -> &'m [Stmt] {
    &body.stmts[params..]
}

#[test]
fn test_nested_product_defines_one_temporary() {
    // let x = a + b * c: exactly one defining assignment precedes the sum
    let params = [number_param("a"), number_param("b"), number_param("c")];
    let body = block(vec![Statement::VariableDecl(ast::VariableDecl {
        kind: ast::VariableKind::Let,
        pattern: Pattern::Identifier(Identifier::new("x", sp())),
        type_annotation: None,
        initializer: Some(bin(
            ast::BinaryOperator::Add,
            ident("a"),
            bin(ast::BinaryOperator::Mul, ident("b"), ident("c")),
        )),
        span: sp(),
    })]);
    let lowered = lower(&params, body);

    let stmts = after_prologue(&lowered, 3);
    assert_eq!(stmts.len(), 2);
    match &stmts[0].kind {
        StmtKind::Assign { lhs, rhs } => {
            assert!(matches!(lhs, Value::Local(l) if l.is_temp()));
            assert!(matches!(rhs, Value::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("expected the product's defining assign, found {:?}", other),
    }
    match &stmts[1].kind {
        StmtKind::Assign { rhs, .. } => match rhs {
            Value::Binary { op, lhs, rhs } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(&**lhs, Value::Local(l) if l.name == "a"));
                assert!(matches!(&**rhs, Value::Local(l) if l.is_temp()));
            }
            other => panic!("expected the sum, found {}", other),
        },
        other => panic!("expected the declaration assign, found {:?}", other),
    }
}

#[test]
fn test_for_of_prefix_is_the_iterator_protocol() {
    // the fixed six-statement sequence, destructuring or not
    let params = [array_param("items")];
    let body = block(vec![Statement::ForOf(ast::ForOfStatement {
        left: ast::ForHeadLeft::VariableDecl(ast::VariableDecl {
            kind: ast::VariableKind::Const,
            pattern: Pattern::Identifier(Identifier::new("x", sp())),
            type_annotation: None,
            initializer: None,
            span: sp(),
        }),
        right: ident("items"),
        body: Box::new(Statement::Empty(sp())),
        span: sp(),
    })]);
    let lowered = lower(&params, body);

    let data: Vec<&StmtKind> = after_prologue(&lowered, 1)
        .iter()
        .filter(|s| !s.is_marker())
        .map(|s| &s.kind)
        .collect();
    assert_eq!(data.len(), 6);
    assert!(matches!(data[0], StmtKind::Assign { rhs: Value::InstanceInvoke { .. }, .. }));
    assert!(matches!(data[1], StmtKind::Assign { rhs: Value::InstanceInvoke { .. }, .. }));
    assert!(
        matches!(data[2], StmtKind::Assign { rhs: Value::InstanceFieldRef { field, .. }, .. } if field.name == "done")
    );
    match data[3] {
        StmtKind::If {
            condition: Value::Condition { op, rhs, .. },
        } => {
            assert_eq!(*op, BinaryOp::Eq);
            assert_eq!(**rhs, Value::Constant(Constant::Bool(true)));
        }
        other => panic!("expected the done branch, found {:?}", other),
    }
    assert!(
        matches!(data[4], StmtKind::Assign { rhs: Value::InstanceFieldRef { field, .. }, .. } if field.name == "value")
    );
    assert!(matches!(data[5], StmtKind::Assign { rhs: Value::Cast { .. }, .. }));
}

#[test]
fn test_sibling_ternaries_get_distinct_marker_indices() {
    let params = [number_param("c")];
    let ternary = |a: f64, b: f64| {
        Expression::Conditional(ast::ConditionalExpression {
            test: Box::new(ident("c")),
            consequent: Box::new(num(a)),
            alternate: Box::new(num(b)),
            span: sp(),
        })
    };
    let body = block(vec![
        assign(ident("r"), ternary(1.0, 2.0)),
        assign(ident("s"), ternary(3.0, 4.0)),
    ]);
    let lowered = lower(&params, body);

    let markers: Vec<MarkerTag> = lowered
        .stmts
        .iter()
        .filter_map(|s| match s.kind {
            StmtKind::Marker(tag) => Some(tag),
            _ => None,
        })
        .collect();
    assert_eq!(
        markers,
        vec![
            MarkerTag::TernaryTrue(0),
            MarkerTag::TernaryFalse(0),
            MarkerTag::TernaryEnd(0),
            MarkerTag::TernaryTrue(1),
            MarkerTag::TernaryFalse(1),
            MarkerTag::TernaryEnd(1),
        ]
    );
}

#[test]
fn test_store_into_array_element_needs_no_flattening() {
    // arr[0] = 5: a single assignment, both operand positions atomic
    let params = [array_param("arr")];
    let body = block(vec![assign(index(ident("arr"), num(0.0)), num(5.0))]);
    let lowered = lower(&params, body);

    let stmts = after_prologue(&lowered, 1);
    assert_eq!(stmts.len(), 1);
    match &stmts[0].kind {
        StmtKind::Assign { lhs, rhs } => {
            assert!(matches!(lhs, Value::ArrayRef { .. }));
            assert_eq!(rhs, &Value::Constant(Constant::Number(5.0)));
        }
        other => panic!("expected one array store, found {:?}", other),
    }
}

#[test]
fn test_temporaries_are_unique_across_a_method() {
    let params = [number_param("a"), number_param("b")];
    let product = |l: Expression, r: Expression| bin(ast::BinaryOperator::Mul, l, r);
    let body = block(vec![
        assign(
            ident("x"),
            bin(
                ast::BinaryOperator::Add,
                product(ident("a"), ident("b")),
                product(ident("b"), ident("a")),
            ),
        ),
        assign(
            ident("y"),
            bin(
                ast::BinaryOperator::Sub,
                product(ident("a"), ident("a")),
                product(ident("b"), ident("b")),
            ),
        ),
    ]);
    let lowered = lower(&params, body);

    let mut defined_temps = Vec::new();
    for stmt in &lowered.stmts {
        if let StmtKind::Assign {
            lhs: Value::Local(local),
            ..
        } = &stmt.kind
        {
            if local.is_temp() {
                defined_temps.push(local.name.clone());
            }
        }
    }
    assert_eq!(defined_temps.len(), 4);
    let mut deduped = defined_temps.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), defined_temps.len(), "temps never reuse a name");
}

#[test]
fn test_statement_ids_and_origins_are_stable() {
    let params = [number_param("a")];
    let body = block(vec![assign(ident("x"), ident("a"))]);
    let lowered = lower(&params, body);

    let mut ids: Vec<u32> = lowered.stmts.iter().map(|s| s.id).collect();
    let before = ids.clone();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before.len(), "statement ids are unique");
    // non-prologue statements carry an origin
    for stmt in after_prologue(&lowered, 1) {
        assert!(stmt.origin.is_some());
    }
}

#[test]
fn test_component_call_expands_to_create_body_pop() {
    let mut builder = StubBuilder::new()
        .with_component("Column")
        .with_component("Text");
    let lowerer = Lowerer::new("", &mut builder);

    // Column(() => { Text(title); })
    let closure = ArrowFunction {
        params: Vec::new(),
        return_type: None,
        body: ArrowBody::Block(block(vec![call_stmt(ident("Text"), vec![ident("title")])])),
        is_async: false,
        span: sp(),
    };
    let body = block(vec![call_stmt(
        ident("Column"),
        vec![Expression::Arrow(closure)],
    )]);
    let lowered = lowerer.lower_method_body(&[], &body);

    let invoked: Vec<String> = lowered
        .stmts
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
        vec!["Column.create", "Text.create", "Text.pop", "Column.pop"]
    );
}

#[test]
fn test_method_body_surrenders_tables() {
    let params = [number_param("a")];
    let body = block(vec![
        Statement::TypeAliasDecl(ast::TypeAliasDecl {
            name: Identifier::new("Meters", sp()),
            type_annotation: TypeAnnotation {
                ty: Type::Primitive(PrimitiveType::Number),
                span: sp(),
            },
            span: sp(),
        }),
        call_stmt(ident("report"), vec![ident("a")]),
    ]);
    let lowered = lower(&params, body);

    assert!(lowered.locals.contains_key("a"));
    let (alias, defining_id) = &lowered.alias_types["Meters"];
    assert_eq!(alias.original, Ty::Number);
    assert!(lowered
        .stmts
        .iter()
        .any(|s| s.id == *defining_id && matches!(s.kind, StmtKind::AliasType { .. })));
    // `report` is unresolved, so it is not registered as a global: call
    // targets resolve by name downstream. Globals appear for value uses.
    let body2 = block(vec![assign(ident("x"), ident("console"))]);
    let lowered2 = lower(&[], body2);
    let globals = lowered2.globals.expect("console registers a global");
    assert!(globals.contains_key("console"));
}

#[test]
fn test_logical_and_short_circuits_through_a_diamond() {
    // a && f(): the call's statements sit between the true/false markers
    let params = [number_param("a")];
    let body = block(vec![assign(
        ident("x"),
        Expression::Logical(ast::LogicalExpression {
            op: ast::LogicalOperator::And,
            left: Box::new(ident("a")),
            right: Box::new(Expression::Call(ast::CallExpression {
                callee: Box::new(ident("f")),
                args: vec![],
                span: sp(),
            })),
            span: sp(),
        }),
    )]);
    let lowered = lower(&params, body);

    let stmts = after_prologue(&lowered, 1);
    let open = stmts
        .iter()
        .position(|s| matches!(s.kind, StmtKind::Marker(MarkerTag::TernaryTrue(_))))
        .unwrap();
    let split = stmts
        .iter()
        .position(|s| matches!(s.kind, StmtKind::Marker(MarkerTag::TernaryFalse(_))))
        .unwrap();
    let call_at = stmts
        .iter()
        .position(|s| {
            matches!(
                &s.kind,
                StmtKind::Assign {
                    rhs: Value::StaticInvoke { method, .. },
                    ..
                } if method.name == "f"
            )
        })
        .unwrap();
    assert!(open < call_at && call_at < split, "the right operand only evaluates in the guarded region");
}

#[test]
fn test_enclosing_class_binds_this_in_the_prologue() {
    let mut builder = StubBuilder::new();
    let lowerer = Lowerer::new("", &mut builder)
        .with_enclosing_class(lyra_ir::ClassSignature::new("Widget"));

    // this.count = 1;
    let body = block(vec![assign(
        Expression::Member(ast::MemberExpression {
            object: Box::new(Expression::This(sp())),
            property: Identifier::new("count", sp()),
            optional: false,
            span: sp(),
        }),
        num(1.0),
    )]);
    let lowered = lowerer.lower_method_body(&[], &body);

    // prologue: this := this-ref, typed by the enclosing class
    match &lowered.stmts[0].kind {
        StmtKind::Assign {
            lhs: Value::Local(local),
            rhs: Value::This { ty },
        } => {
            assert_eq!(local.name, "this");
            assert_eq!(*ty, Ty::Class(lyra_ir::ClassSignature::new("Widget")));
        }
        other => panic!("expected the this binding, found {:?}", other),
    }
    // the store resolves the field against the receiver's class
    match &lowered.stmts[1].kind {
        StmtKind::Assign {
            lhs: Value::InstanceFieldRef { base, field },
            ..
        } => {
            assert_eq!(base.name, "this");
            assert_eq!(field.class.as_deref(), Some("Widget"));
            assert_eq!(field.name, "count");
        }
        other => panic!("expected a field store, found {:?}", other),
    }
}

#[test]
fn test_type_alias_resolves_in_later_annotations() {
    let body = block(vec![
        Statement::TypeAliasDecl(ast::TypeAliasDecl {
            name: Identifier::new("Meters", sp()),
            type_annotation: TypeAnnotation {
                ty: Type::Primitive(PrimitiveType::Number),
                span: sp(),
            },
            span: sp(),
        }),
        Statement::VariableDecl(ast::VariableDecl {
            kind: ast::VariableKind::Let,
            pattern: Pattern::Identifier(Identifier::new("d", sp())),
            type_annotation: Some(TypeAnnotation {
                ty: Type::Reference(ast::TypeReference::simple(Identifier::new("Meters", sp()))),
                span: sp(),
            }),
            initializer: Some(num(5.0)),
            span: sp(),
        }),
    ]);
    let lowered = lower(&[], body);

    match &lowered.locals["d"].ty {
        Ty::Alias(alias) => {
            assert_eq!(alias.name, "Meters");
            assert_eq!(alias.original, Ty::Number);
        }
        other => panic!("expected the alias type, found {}", other),
    }
}

#[test]
fn test_lowered_stream_serializes() {
    let params = [number_param("a")];
    let body = block(vec![assign(ident("x"), ident("a"))]);
    let lowered = lower(&params, body);
    let json = serde_json::to_string(&lowered.stmts).unwrap();
    let back: Vec<Stmt> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, lowered.stmts);
}
