use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::api::EngineOptions;
use crate::host::registry::Registry;
use crate::host::value::{Ty, Value};
use crate::host::{Param, Signature};
use crate::lexer;
use crate::parser;
use crate::symbols::{SymbolTable, SymbolTableBuilder};

use super::{execute, ExecError};

fn run_with(
    src: &str,
    table: &SymbolTable,
    reg: &Registry,
    opts: &EngineOptions,
) -> Result<Value, ExecError> {
    let toks = lexer::lex(src).expect("source lexes");
    let cmd = parser::parse(src, toks, table, reg, opts).expect("source parses");
    execute(&cmd, reg, opts)
}

fn run(src: &str) -> Value {
    let table = SymbolTableBuilder::new().build();
    let reg = Registry::new();
    run_with(src, &table, &reg, &EngineOptions::default()).expect("execution succeeds")
}

fn run_err(src: &str) -> ExecError {
    let table = SymbolTableBuilder::new().build();
    let reg = Registry::new();
    run_with(src, &table, &reg, &EngineOptions::default()).expect_err("execution should fail")
}

fn as_i(v: Value) -> i64 {
    v.as_i64().expect("integer result")
}

fn as_s(v: Value) -> String {
    v.as_str().expect("string result").to_string()
}

#[test]
fn arithmetic_runs_in_the_promoted_type() {
    assert_eq!(as_i(run("1 + 2 * 3")), 7);
    assert_eq!(run("1 + 2.5").as_f64(), Some(3.5));
    assert_eq!(as_i(run("7 / 2")), 3);
    assert_eq!(run("7 / 2.0").as_f64(), Some(3.5));
    assert_eq!(as_i(run("7 % 3")), 1);
    assert_eq!(run("1u + 2u").runtime_ty(), Ty::U32);
    // A signed operand next to uint widens both sides to long.
    assert_eq!(run("1 + 2u").runtime_ty(), Ty::I64);
}

#[test]
fn integer_overflow_wraps() {
    assert_eq!(as_i(run("2147483647 + 1")), i32::MIN as i64);
    assert_eq!(as_i(run("-2147483648 - 1")), i32::MAX as i64);
}

#[test]
fn integer_division_by_zero_is_an_error() {
    assert!(matches!(run_err("1 / 0"), ExecError::DivisionByZero));
    assert!(matches!(run_err("1 % 0"), ExecError::DivisionByZero));
    // Floats follow IEEE instead.
    assert_eq!(run("1.0 / 0.0").as_f64(), Some(f64::INFINITY));
}

#[test]
fn shift_count_wraps_modulo_the_width() {
    assert_eq!(as_i(run("1 << 3")), 8);
    assert_eq!(as_i(run("1 << 33")), 2);
    assert_eq!(as_i(run("1L << 33")), 1_i64 << 33);
}

#[test]
fn declarations_echo_their_initial_value() {
    assert_eq!(as_i(run("int x = 5")), 5);
    assert_eq!(as_i(run("int x = 5; x + 1")), 6);
}

#[test]
fn compound_assignment_narrows_back_to_the_target() {
    assert_eq!(as_i(run("int x = 5; x += 3; x")), 8);

    let v = run("byte b = 250; b += 10; b");
    assert_eq!(v.runtime_ty(), Ty::U8);
    assert_eq!(as_i(v), 4);

    let c = run("char c = 'a'; c += 1; c");
    assert_eq!(c.as_char(), Some('b'));
}

#[test]
fn compound_index_runs_its_subscript_once() {
    // The subscript's side effect must fire once, not once per read
    // and once per write.
    assert_eq!(as_i(run("int i = 0; int[] a = new int[5]; a[i++] += 1; i")), 1);
    assert_eq!(as_i(run("int i = 0; int[] a = new int[5]; a[i++] += 1; a[0]")), 1);
}

#[test]
fn increment_returns_old_or_new_value_by_position() {
    assert_eq!(as_i(run("int i = 5; i++")), 5);
    assert_eq!(as_i(run("int i = 5; ++i")), 6);
    assert_eq!(as_i(run("int i = 5; i++; i")), 6);
}

#[test]
fn string_concatenation_formats_operands() {
    assert_eq!(as_s(run("\"n=\" + 42")), "n=42");
    assert_eq!(as_s(run("1 + \"!\"")), "1!");
    // Null renders as nothing.
    assert_eq!(as_s(run("\"x\" + null")), "x");
}

#[test]
fn string_indexing_yields_chars() {
    assert_eq!(run("\"hi\"[1]").as_char(), Some('i'));
    assert_eq!(as_i(run("\"hi\".Length")), 2);
    assert!(matches!(
        run_err("\"hi\"[5]"),
        ExecError::IndexOutOfBounds { index: 5, .. }
    ));
}

#[test]
fn arrays_read_and_write_elements() {
    assert_eq!(as_i(run("int[] a = new int[3]; a[0] = 7; a[0] + a.Length")), 10);
    assert_eq!(as_i(run("int[] a = new int[] { 1, 2, 3 }; a[2]")), 3);
    assert!(matches!(
        run_err("int[] a = new int[2]; a[2]"),
        ExecError::IndexOutOfBounds { index: 2, len: 2 }
    ));
    assert!(matches!(
        run_err("new int[0 - 1]"),
        ExecError::NegativeArraySize { len: -1 }
    ));
}

#[test]
fn array_elements_default_to_the_element_type() {
    assert_eq!(as_i(run("int[] a = new int[2]; a[1]")), 0);
    assert_eq!(run("bool[] b = new bool[1]; b[0]").as_bool(), Some(false));
    assert_eq!(run("double[] d = new double[1]; d[0]").as_f64(), Some(0.0));
}

#[test]
fn jagged_arrays_nest() {
    let total = run(
        "int[][] m = new int[][] { new int[] { 1, 2 }, new int[] { 3 } };\n\
         m[0][1] + m[1][0]",
    );
    assert_eq!(as_i(total), 5);
}

#[test]
fn while_loops_accumulate() {
    let src = "int s = 0; int i = 0; while (i < 5) { s += i; i++; } s";
    assert_eq!(as_i(run(src)), 10);
}

#[test]
fn break_and_continue_steer_the_loop() {
    let src = "int s = 0;\n\
               for (int i = 0; i < 10; i++) {\n\
                   if (i == 3) continue;\n\
                   if (i > 5) break;\n\
                   s += i;\n\
               }\n\
               s";
    assert_eq!(as_i(run(src)), 12);
}

#[test]
fn foreach_visits_every_element() {
    assert_eq!(as_i(run("int s = 0; foreach (int v in new int[] { 1, 2, 3 }) s += v; s")), 6);
    assert_eq!(as_s(run("string t = \"\"; foreach (char c in \"ab\") t += c; t")), "ab");
    // The loop variable converts per element.
    assert_eq!(
        run("double s = 0; foreach (double v in new int[] { 1, 2 }) s += v; s").as_f64(),
        Some(3.0)
    );
}

#[test]
fn runaway_loops_hit_the_iteration_budget() {
    let table = SymbolTableBuilder::new().build();
    let reg = Registry::new();
    let mut opts = EngineOptions::default();
    opts.max_loop_iterations = 10;

    let err = run_with("while (true) { }", &table, &reg, &opts).expect_err("must trip");
    assert!(matches!(err, ExecError::LoopBudgetExceeded { limit: 10 }));

    // A loop that finishes within the budget is untouched.
    let ok = run_with("int s = 0; for (int i = 0; i < 10; i++) s += 1; s", &table, &reg, &opts);
    assert_eq!(as_i(ok.unwrap()), 10);
}

#[test]
fn each_loop_gets_its_own_budget() {
    let table = SymbolTableBuilder::new().build();
    let reg = Registry::new();
    let mut opts = EngineOptions::default();
    opts.max_loop_iterations = 5;

    let src = "int s = 0;\n\
               for (int i = 0; i < 5; i++) s += 1;\n\
               for (int i = 0; i < 5; i++) s += 1;\n\
               s";
    assert_eq!(as_i(run_with(src, &table, &reg, &opts).unwrap()), 10);
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(run("true || 1 / 0 == 0").as_bool(), Some(true));
    assert_eq!(run("false && 1 / 0 == 0").as_bool(), Some(false));
    assert_eq!(run("false || true").as_bool(), Some(true));
}

#[test]
fn conditional_picks_one_branch() {
    assert_eq!(as_i(run("true ? 1 : 1 / 0")), 1);
    assert_eq!(as_i(run("1 < 2 ? 10 : 20")), 10);
}

#[test]
fn casts_truncate_and_wrap() {
    assert_eq!(as_i(run("(int) 2.9")), 2);
    assert_eq!(as_i(run("(int) (0.0 - 2.9)")), -2);
    assert_eq!(as_i(run("(byte) 300")), 44);
    assert_eq!(run("(char) 98").as_char(), Some('b'));
}

fn game_fixture() -> (SymbolTable, Registry) {
    let mut reg = Registry::new();
    let player = reg.add_class("Player", None);
    reg.add_field(player, "Health", Ty::I32);

    let point = reg.add_struct("Point");
    reg.add_field(point, "X", Ty::I32);
    let holder = reg.add_class("Holder", None);
    reg.add_field(holder, "Pos", Ty::Object(point));

    let math = reg.add_class("Math", None);
    reg.add_static_method(
        math,
        "Double",
        Signature::new(vec![Param::required("x", Ty::I32)], Ty::I32),
        Arc::new(|_, args| {
            let x = args[0].as_i64().expect("typed argument");
            Ok(Value::I32((x * 2) as i32))
        }),
    );
    reg.add_static_method(
        math,
        "Triple",
        Signature::new(vec![Param::required("x", Ty::I32)], Ty::I32),
        Arc::new(|_, args| {
            let x = args[0].as_i64().expect("typed argument");
            Ok(Value::I32((x * 3) as i32))
        }),
    );
    let int_fn = reg.add_delegate_type(
        "IntFn",
        Signature::new(vec![Param::required("x", Ty::I32)], Ty::I32),
    );
    let button = reg.add_class("Button", None);
    reg.add_event(button, "OnFire", int_fn);

    let table = SymbolTableBuilder::new()
        .add_type("Player", player)
        .add_type("Point", point)
        .add_type("Holder", holder)
        .add_type("Math", math)
        .add_type("IntFn", int_fn)
        .add_type("Button", button)
        .build();
    (table, reg)
}

#[test]
fn host_fields_read_and_write() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let v = run_with(
        "Player p = new Player(); p.Health = 80; p.Health - 30",
        &table,
        &reg,
        &opts,
    )
    .unwrap();
    assert_eq!(as_i(v), 50);
}

#[test]
fn value_type_members_write_back_through_the_chain() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let v = run_with(
        "Holder h = new Holder(); h.Pos.X = 9; h.Pos.X",
        &table,
        &reg,
        &opts,
    )
    .unwrap();
    assert_eq!(as_i(v), 9);
}

#[test]
fn compound_assignment_reaches_host_members() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let v = run_with(
        "Player p = new Player(); p.Health = 10; p.Health += 5; p.Health++; p.Health",
        &table,
        &reg,
        &opts,
    )
    .unwrap();
    assert_eq!(as_i(v), 16);
}

#[test]
fn compound_member_target_runs_its_receiver_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let mut reg = Registry::new();
    let player = reg.add_class("Player", None);
    reg.add_field(player, "Health", Ty::I32);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    reg.add_method(
        player,
        "Itself",
        Signature::new(vec![], Ty::Object(player)),
        Arc::new(move |recv, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(recv.cloned().unwrap_or(Value::Null))
        }),
    );
    let table = SymbolTableBuilder::new().add_type("Player", player).build();
    let opts = EngineOptions::default();

    let v = run_with(
        "Player p = new Player(); p.Health = 10; p.Itself().Health += 5; p.Health",
        &table,
        &reg,
        &opts,
    )
    .unwrap();
    assert_eq!(as_i(v), 15);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn null_member_access_is_a_runtime_error() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let err = run_with("Player p = null; p.Health", &table, &reg, &opts)
        .expect_err("must fail");
    assert!(matches!(err, ExecError::NullDeref));
}

#[test]
fn delegates_capture_and_invoke_methods() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let v = run_with("IntFn f = Math.Double; f(21)", &table, &reg, &opts).unwrap();
    assert_eq!(as_i(v), 42);
}

#[test]
fn multicast_delegates_return_the_last_result() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let src = "IntFn f = Math.Double;\n\
               f += Math.Triple;\n\
               f(10)";
    assert_eq!(as_i(run_with(src, &table, &reg, &opts).unwrap()), 30);

    let removed = "IntFn f = Math.Double;\n\
                   f += Math.Triple;\n\
                   f -= Math.Triple;\n\
                   f(10)";
    assert_eq!(as_i(run_with(removed, &table, &reg, &opts).unwrap()), 20);
}

#[test]
fn events_subscribe_and_fire_through_the_host() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let src = "Button b = new Button();\n\
               b.OnFire += Math.Double;\n\
               b.OnFire(5)";
    assert_eq!(as_i(run_with(src, &table, &reg, &opts).unwrap()), 10);

    let unsubscribed = "Button b = new Button();\n\
                        b.OnFire += Math.Double;\n\
                        b.OnFire -= Math.Double;\n\
                        b.OnFire == null";
    assert_eq!(
        run_with(unsubscribed, &table, &reg, &opts).unwrap().as_bool(),
        Some(true)
    );
}

#[test]
fn invoking_a_null_delegate_fails() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    let err = run_with("IntFn f = null; f(1)", &table, &reg, &opts).expect_err("must fail");
    assert!(matches!(err, ExecError::NullDeref));
}

#[test]
fn reference_identity_compares_arrays_by_pointer() {
    assert_eq!(
        run("int[] a = new int[1]; int[] b = a; a == b").as_bool(),
        Some(true)
    );
    assert_eq!(
        run("int[] a = new int[1]; int[] b = new int[1]; a == b").as_bool(),
        Some(false)
    );
    // Strings compare by contents.
    assert_eq!(run("\"a\" + \"b\" == \"ab\"").as_bool(), Some(true));
}

#[test]
fn is_and_as_follow_the_runtime_type() {
    let (table, reg) = game_fixture();
    let opts = EngineOptions::default();
    assert_eq!(
        run_with("Player p = new Player(); p is Player", &table, &reg, &opts)
            .unwrap()
            .as_bool(),
        Some(true)
    );
    assert_eq!(
        run_with("Player p = null; p is Player", &table, &reg, &opts)
            .unwrap()
            .as_bool(),
        Some(false)
    );
    assert!(matches!(
        run_with("Player p = null; p as Player", &table, &reg, &opts).unwrap(),
        Value::Null
    ));
}

#[test]
fn live_array_mutation_is_visible_to_foreach() {
    let src = "int[] a = new int[] { 1, 2, 3 };\n\
               int s = 0;\n\
               foreach (int v in a) { a[2] = 10; s += v; }\n\
               s";
    assert_eq!(as_i(run(src)), 13);
}
