use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::api::EngineOptions;
use crate::ast::{BinOp, Command, Expr};
use crate::host::registry::Registry;
use crate::host::value::{Ty, Value};
use crate::host::{Param, Signature};
use crate::lexer;
use crate::resolver::ResolveError;
use crate::symbols::{SymbolTable, SymbolTableBuilder};

use super::{parse, ParseError, ParseErrorKind};

fn parse_with(src: &str, table: &SymbolTable, host: &Registry) -> Result<Command, ParseError> {
    let toks = lexer::lex(src).expect("source lexes");
    parse(src, toks, table, host, &EngineOptions::default())
}

fn parse_plain(src: &str) -> Result<Command, ParseError> {
    let table = SymbolTableBuilder::new().build();
    let reg = Registry::new();
    parse_with(src, &table, &reg)
}

/// Type of the whole program, i.e. of its last statement.
fn ty_of(src: &str) -> Ty {
    parse_plain(src).expect("source parses").root.ty()
}

fn semantic_err(result: Result<Command, ParseError>) -> ResolveError {
    match result.expect_err("parse should fail").kind {
        ParseErrorKind::Semantic(err) => err,
        other => panic!("expected a semantic error, got {other:?}"),
    }
}

fn statements(cmd: &Command) -> &[Expr] {
    match &cmd.root {
        Expr::Block { body } => body,
        other => panic!("program root should be a block, got {other:?}"),
    }
}

#[test]
fn literal_arithmetic_promotes_to_common_type() {
    assert_eq!(ty_of("1 + 2"), Ty::I32);
    assert_eq!(ty_of("1 + 2.5"), Ty::F64);
    assert_eq!(ty_of("1 + 2.5f"), Ty::F32);
    assert_eq!(ty_of("1u + 1L"), Ty::I64);
    assert_eq!(ty_of("(byte) 1 + (byte) 2"), Ty::I32);
}

#[test]
fn mixed_sign_64_bit_operands_are_rejected() {
    let err = semantic_err(parse_plain("1L + 1UL"));
    assert_eq!(err, ResolveError::MixedSign { op: "+" });
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let cmd = parse_plain("1 + 2 * 3").unwrap();
    match &statements(&cmd)[0] {
        Expr::Binary { op: BinOp::Add, rhs, .. } => {
            assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
        }
        other => panic!("unexpected tree: {other:?}"),
    }
}

#[test]
fn comparison_yields_bool() {
    assert_eq!(ty_of("1 < 2.0"), Ty::Bool);
    assert_eq!(ty_of("1 == 1u"), Ty::Bool);
}

#[test]
fn shift_keeps_the_left_operand_type() {
    assert_eq!(ty_of("1L << 2"), Ty::I64);
    assert_eq!(ty_of("1u >> 3"), Ty::U32);
}

#[test]
fn bitwise_operators_reject_floats() {
    let err = semantic_err(parse_plain("1.0 & 2.0"));
    assert_eq!(
        err,
        ResolveError::InvalidOperands { op: "&", lhs: Ty::F64, rhs: Ty::F64 }
    );
}

#[test]
fn string_concatenation_accepts_any_operand() {
    let cmd = parse_plain("\"n = \" + 42").unwrap();
    assert!(matches!(statements(&cmd)[0], Expr::StrConcat { .. }));
    assert_eq!(ty_of("1 + \"!\""), Ty::Str);
}

#[test]
fn assignment_and_conditional_associate_to_the_right() {
    let cmd = parse_plain("int a = 0; int b = 0; a = b = 5").unwrap();
    match statements(&cmd).last().unwrap() {
        Expr::Assign { value, .. } => {
            assert!(matches!(**value, Expr::Assign { .. }));
        }
        other => panic!("unexpected tree: {other:?}"),
    }

    let cmd = parse_plain("false ? 1 : true ? 2 : 3").unwrap();
    match &statements(&cmd)[0] {
        Expr::Conditional { else_branch, .. } => {
            assert!(matches!(**else_branch, Expr::Conditional { .. }));
        }
        other => panic!("unexpected tree: {other:?}"),
    }
}

#[test]
fn conditional_unifies_branch_types() {
    assert_eq!(ty_of("true ? 1 : 2.0"), Ty::F64);
    let err = semantic_err(parse_plain("true ? 1 : \"a\""));
    assert!(matches!(err, ResolveError::InvalidConversion { .. }));
}

#[test]
fn declaration_converts_the_initializer() {
    let cmd = parse_plain("double d = 1").unwrap();
    match &statements(&cmd)[0] {
        Expr::VarDecl { name, ty, init } => {
            assert_eq!(name, "d");
            assert_eq!(*ty, Ty::F64);
            assert_eq!(init.as_ref().unwrap().ty(), Ty::F64);
        }
        other => panic!("unexpected tree: {other:?}"),
    }
}

#[test]
fn undeclared_identifier_is_reported() {
    let err = semantic_err(parse_plain("x = 1"));
    assert_eq!(err, ResolveError::UnknownIdentifier { name: "x".into() });
}

#[test]
fn locals_do_not_escape_their_block() {
    let err = semantic_err(parse_plain("{ int y = 1; } y"));
    assert_eq!(err, ResolveError::UnknownIdentifier { name: "y".into() });
}

#[test]
fn redeclaration_in_the_same_scope_is_rejected() {
    let err = semantic_err(parse_plain("int x = 1; double x = 2.0"));
    assert_eq!(err, ResolveError::Redeclared { name: "x".into() });

    // Shadowing in a nested block is fine.
    parse_plain("int x = 1; { double x = 2.0; x; } x").unwrap();
}

#[test]
fn explicit_casts_narrow_and_widen() {
    assert_eq!(ty_of("(long) 1"), Ty::I64);
    assert_eq!(ty_of("(int) 2.5"), Ty::I32);
    let err = semantic_err(parse_plain("(string) 1"));
    assert_eq!(err, ResolveError::InvalidConversion { from: Ty::I32, to: Ty::Str });
}

#[test]
fn break_and_continue_require_a_loop() {
    assert_eq!(semantic_err(parse_plain("break")), ResolveError::BreakOutsideLoop);
    assert_eq!(
        semantic_err(parse_plain("continue")),
        ResolveError::ContinueOutsideLoop
    );
    parse_plain("while (true) { break; }").unwrap();
}

#[test]
fn loop_statements_parse() {
    parse_plain("for (int i = 0; i < 3; i = i + 1) { i; }").unwrap();
    parse_plain("int[] a = new int[2]; foreach (int v in a) v;").unwrap();
    parse_plain("foreach (char c in \"hi\") c;").unwrap();
}

#[test]
fn foreach_variable_is_scoped_to_the_loop() {
    let err = semantic_err(parse_plain("foreach (char c in \"hi\") c; c"));
    assert_eq!(err, ResolveError::UnknownIdentifier { name: "c".into() });
}

#[test]
fn array_literal_length_must_match() {
    parse_plain("int[] a = new int[] { 1, 2, 3 };").unwrap();
    parse_plain("int[] a = new int[3] { 1, 2, 3 };").unwrap();
    let err = semantic_err(parse_plain("new int[2] { 1, 2, 3 }"));
    assert_eq!(err, ResolveError::ArrayInitCount { expected: 2, got: 3 });
}

#[test]
fn condition_must_be_bool() {
    let err = semantic_err(parse_plain("if (1) { }"));
    assert_eq!(err, ResolveError::InvalidConversion { from: Ty::I32, to: Ty::Bool });
}

fn game_fixture() -> (SymbolTable, Registry) {
    let mut reg = Registry::new();
    let player = reg.add_class("Player", None);
    reg.add_field(player, "Health", Ty::I32);
    reg.add_property(
        player,
        "Score",
        Ty::I32,
        Some(Arc::new(|_, _| Ok(Value::I32(7)))),
        None,
    );
    reg.add_method(
        player,
        "Heal",
        Signature::new(vec![Param::required("amount", Ty::I32)], Ty::Void),
        Arc::new(|_, _| Ok(Value::Null)),
    );

    let math = reg.add_class("Math", None);
    reg.add_static_method(
        math,
        "Pick",
        Signature::new(vec![Param::required("x", Ty::I32)], Ty::I32),
        Arc::new(|_, args| Ok(args[0].clone())),
    );
    reg.add_static_method(
        math,
        "Pick",
        Signature::new(vec![Param::required("x", Ty::F64)], Ty::F64),
        Arc::new(|_, args| Ok(args[0].clone())),
    );
    reg.add_static_method(
        math,
        "Mix",
        Signature::new(
            vec![Param::required("a", Ty::I32), Param::required("b", Ty::F64)],
            Ty::Void,
        ),
        Arc::new(|_, _| Ok(Value::Null)),
    );
    reg.add_static_method(
        math,
        "Mix",
        Signature::new(
            vec![Param::required("a", Ty::F64), Param::required("b", Ty::I32)],
            Ty::Void,
        ),
        Arc::new(|_, _| Ok(Value::Null)),
    );

    let table = SymbolTableBuilder::new()
        .add_type("Player", player)
        .add_type("Math", math)
        .build();
    (table, reg)
}

#[test]
fn member_chains_resolve_against_the_host() {
    let (table, reg) = game_fixture();
    let cmd = parse_with(
        "Player p = new Player(); p.Health = 5; p.Health + p.Score",
        &table,
        &reg,
    )
    .unwrap();
    assert_eq!(cmd.root.ty(), Ty::I32);
    assert!(matches!(statements(&cmd)[2], Expr::Binary { .. }));
}

#[test]
fn unknown_member_names_the_type() {
    let (table, reg) = game_fixture();
    let err = semantic_err(parse_with("Player p = new Player(); p.Mana", &table, &reg));
    assert_eq!(
        err,
        ResolveError::UnknownMember { type_name: "Player".to_string(), name: "Mana".into() }
    );
}

#[test]
fn getter_only_property_rejects_assignment() {
    let (table, reg) = game_fixture();
    let err = semantic_err(parse_with("Player p = new Player(); p.Score = 1", &table, &reg));
    assert_eq!(err, ResolveError::NotAssignable);
}

#[test]
fn overload_selection_prefers_the_exact_match() {
    let (table, reg) = game_fixture();
    let picked_int = parse_with("Math.Pick(1)", &table, &reg).unwrap();
    assert_eq!(picked_int.root.ty(), Ty::I32);
    let picked_double = parse_with("Math.Pick(1.5)", &table, &reg).unwrap();
    assert_eq!(picked_double.root.ty(), Ty::F64);
}

#[test]
fn equally_distant_overloads_are_ambiguous() {
    let (table, reg) = game_fixture();
    let err = semantic_err(parse_with("Math.Mix(1, 2)", &table, &reg));
    assert_eq!(err, ResolveError::AmbiguousOverload { name: "Mix".into() });
}

#[test]
fn void_call_cannot_be_used_as_a_value() {
    let (table, reg) = game_fixture();
    let err = semantic_err(parse_with(
        "Player p = new Player(); int x = p.Heal(1)",
        &table,
        &reg,
    ));
    assert_eq!(err, ResolveError::VoidValue);
}

#[test]
fn method_group_without_a_call_is_not_a_value() {
    let (table, reg) = game_fixture();
    let err = semantic_err(parse_with("Player p = new Player(); p.Heal + 1", &table, &reg));
    assert!(matches!(err, ResolveError::NotAValue { .. }));
}

#[test]
fn generic_type_arguments_bind_registered_instances() {
    let mut reg = Registry::new();
    let list = reg.add_generic_class("List", 1);
    let list_int = reg.add_class("List`int", None);
    reg.register_generic_instance(list, &[Ty::I32], list_int);
    let list_list_int = reg.add_class("List`List`int", None);
    reg.register_generic_instance(list, &[Ty::Object(list_int)], list_list_int);
    let table = SymbolTableBuilder::new().add_type("List", list).build();

    let cmd = parse_with("List<int> l = new List<int>();", &table, &reg).unwrap();
    match &statements(&cmd)[0] {
        Expr::VarDecl { ty, .. } => assert_eq!(*ty, Ty::Object(list_int)),
        other => panic!("unexpected tree: {other:?}"),
    }

    // The `>>` of a nested argument list splits into two closing angles.
    let nested = parse_with("List<List<int>> l = new List<List<int>>();", &table, &reg).unwrap();
    match &statements(&nested)[0] {
        Expr::VarDecl { ty, .. } => assert_eq!(*ty, Ty::Object(list_list_int)),
        other => panic!("unexpected tree: {other:?}"),
    }
}

#[test]
fn generic_arity_mismatch_is_reported() {
    let mut reg = Registry::new();
    let list = reg.add_generic_class("List", 1);
    let table = SymbolTableBuilder::new().add_type("List", list).build();
    let err = semantic_err(parse_with("List<int, int> l;", &table, &reg));
    assert_eq!(
        err,
        ResolveError::GenericArity { name: "List".into(), expected: 1, got: 2 }
    );
}

#[test]
fn missing_semicolon_between_statements_is_reported() {
    let err = parse_plain("int x = 1 int y = 2").expect_err("should fail");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
}

#[test]
fn unterminated_string_is_reported_with_its_span() {
    let err = parse_plain("\"oops").expect_err("should fail");
    assert_eq!(err.kind, ParseErrorKind::Unterminated { what: "string" });
}
