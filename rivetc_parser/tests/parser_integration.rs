//! End-to-end parser coverage: source text in, `ast::Program` out.
//! Complements the grammar-level unit tests in `src/parser/`.

use rivetc_parser::ast::{Expr, Param, PrimOp, Stmt, TypeAnnotation};
use rivetc_parser::{parse, ParseError};

#[test]
fn parses_arithmetic_precedence() {
    let program = parse("print(1 + 2 * 3);").unwrap();
    match &program.stmts[..] {
        [Stmt::Print(Expr::Prim(PrimOp::Add, args))] => {
            assert!(matches!(&args[0], Expr::ConstInt(1)));
            assert!(matches!(&args[1], Expr::Prim(PrimOp::Mult, _)));
        }
        other => panic!("expected a single print of an addition, got {other:?}"),
    }
}

#[test]
fn parses_comparison_and_boolean_ops() {
    // `not` binds tighter than comparison, so this reads as
    // `(1 < 2) and ((not 3) > 4)`.
    let program = parse("print(1 < 2 and not 3 > 4);").unwrap();
    match &program.stmts[..] {
        [Stmt::Print(Expr::Prim(PrimOp::And, args))] => {
            assert!(matches!(&args[0], Expr::Prim(PrimOp::Lt, _)));
            match &args[1] {
                Expr::Prim(PrimOp::Gt, gt_args) => {
                    assert!(matches!(&gt_args[0], Expr::Prim(PrimOp::Not, _)));
                }
                other => panic!("expected a `>` comparison, got {other:?}"),
            }
        }
        other => panic!("expected an `and` of two comparisons, got {other:?}"),
    }
}

#[test]
fn parses_class_def_with_multiple_fields() {
    let program = parse("class Point { x: int; y: int; }").unwrap();
    assert_eq!(
        program.stmts,
        vec![Stmt::ClassDef {
            name: "Point".to_string(),
            fields: vec![
                ("x".to_string(), TypeAnnotation::Int),
                ("y".to_string(), TypeAnnotation::Int),
            ],
        }]
    );
}

#[test]
fn parses_function_def_with_record_param_and_field_ref() {
    let src = "def sum(p: Point) -> int { return p.x + p.y; }";
    let program = parse(src).unwrap();
    assert_eq!(
        program.stmts,
        vec![Stmt::FunctionDef {
            name: "sum".to_string(),
            params: vec![Param {
                name: "p".to_string(),
                ty: TypeAnnotation::Named("Point".to_string()),
            }],
            body: vec![Stmt::Return(Expr::Prim(
                PrimOp::Add,
                vec![
                    Expr::FieldRef(Box::new(Expr::Var("p".to_string())), "x".to_string()),
                    Expr::FieldRef(Box::new(Expr::Var("p".to_string())), "y".to_string()),
                ]
            ))],
            ret: TypeAnnotation::Int,
        }]
    );
}

#[test]
fn parses_nested_calls_and_constructor() {
    let program = parse("p = Point(1, 2); print(dist(p, Point(0, 0)));").unwrap();
    assert_eq!(program.stmts.len(), 2);
    match &program.stmts[0] {
        Stmt::Assign(name, Expr::Call(callee, args)) => {
            assert_eq!(name, "p");
            assert!(matches!(&**callee, Expr::Var(n) if n == "Point"));
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected an assignment of a constructor call, got {other:?}"),
    }
}

#[test]
fn parses_while_with_mutation() {
    let program = parse("i = 0; while i < 5 { i = i + 1; }").unwrap();
    match &program.stmts[..] {
        [Stmt::Assign(..), Stmt::While(cond, body)] => {
            assert!(matches!(cond, Expr::Prim(PrimOp::Lt, _)));
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected an assign followed by a while, got {other:?}"),
    }
}

#[test]
fn parses_a_program_with_several_top_level_statements() {
    let src = "class Rect { len: int; width: int; } \
               def area(r: Rect) -> int { return r.len * r.width; } \
               r = Rect(3, 4); \
               print(area(r));";
    let program = parse(src).unwrap();
    assert_eq!(program.stmts.len(), 4);
}

#[test]
fn rejects_a_missing_semicolon() {
    let err = parse("x = 1").unwrap_err();
    assert!(matches!(
        err,
        ParseError::UnexpectedEof { .. } | ParseError::UnexpectedToken { .. }
    ));
}

#[test]
fn rejects_an_unclosed_block() {
    let err = parse("while x { print(1);").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEof { .. }));
}

#[test]
fn rejects_a_param_without_a_type_annotation() {
    let err = parse("def f(n) -> int { return n; }").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedToken { .. }));
}
