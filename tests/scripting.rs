//! End-to-end scripting scenarios through the public engine API.

use std::sync::Arc;

use indoc::indoc;
use pretty_assertions::assert_eq;

use conscript::host::registry::Registry;
use conscript::host::{Param, Signature};
use conscript::symbols::SymbolTableBuilder;
use conscript::{Engine, EngineOptions, Ty, Value};

/// A small game-flavored host: an entity hierarchy, a struct-valued
/// field, a couple of static helpers and a delegate type.
fn game_engine() -> Engine {
    let mut reg = Registry::new();

    let entity = reg.add_class("Entity", None);
    reg.add_field(entity, "Id", Ty::I32);
    let player = reg.add_class("Player", Some(entity));
    reg.add_field(player, "Health", Ty::I32);
    reg.add_field(player, "Name", Ty::Str);

    let vec2 = reg.add_struct("Vec2");
    reg.add_field(vec2, "X", Ty::F32);
    reg.add_field(vec2, "Y", Ty::F32);
    reg.add_field(player, "Position", Ty::Object(vec2));

    reg.add_method(
        player,
        "Damage",
        Signature::new(vec![Param::required("amount", Ty::I32)], Ty::Void),
        Arc::new(|recv, args| {
            let recv = recv.expect("instance method");
            let health = Registry::read_slot(recv, 1)?.as_i64().unwrap_or(0);
            let amount = args[0].as_i64().unwrap_or(0);
            Registry::write_slot(recv, 1, Value::I32((health - amount) as i32))?;
            Ok(Value::Null)
        }),
    );

    let math = reg.add_class("Math", None);
    reg.add_static_method(
        math,
        "Max",
        Signature::new(
            vec![Param::required("a", Ty::I32), Param::required("b", Ty::I32)],
            Ty::I32,
        ),
        Arc::new(|_, args| {
            let a = args[0].as_i64().unwrap_or(0);
            let b = args[1].as_i64().unwrap_or(0);
            Ok(Value::I32(a.max(b) as i32))
        }),
    );
    reg.add_static_method(
        math,
        "Max",
        Signature::new(
            vec![Param::required("a", Ty::F64), Param::required("b", Ty::F64)],
            Ty::F64,
        ),
        Arc::new(|_, args| {
            let a = args[0].as_f64().unwrap_or(0.0);
            let b = args[1].as_f64().unwrap_or(0.0);
            Ok(Value::F64(a.max(b)))
        }),
    );

    let table = SymbolTableBuilder::new()
        .add_type("Entity", entity)
        .add_type("Player", player)
        .add_type("Vec2", vec2)
        .add_type("Math", math)
        .build();
    Engine::new(Arc::new(table), Arc::new(reg), EngineOptions::default())
}

#[test]
fn scripts_drive_host_objects() {
    let engine = game_engine();
    let src = indoc! {"
        Player p = new Player();
        p.Health = 100;
        p.Damage(30);
        p.Health
    "};
    assert_eq!(engine.eval(src).unwrap().as_i64(), Some(70));
}

#[test]
fn struct_fields_write_back_through_the_owner() {
    let engine = game_engine();
    let src = indoc! {"
        Player p = new Player();
        p.Position.X = 3.5f;
        p.Position.Y = p.Position.X + 1;
        p.Position.Y
    "};
    let out = engine.eval(src).unwrap();
    assert_eq!(out.as_f64(), Some(4.5));
}

#[test]
fn overloads_pick_by_argument_distance() {
    let engine = game_engine();
    assert_eq!(engine.eval("Math.Max(3, 7)").unwrap().as_i64(), Some(7));
    assert_eq!(engine.eval("Math.Max(3.0, 7)").unwrap().as_f64(), Some(7.0));
    // A byte argument widens to int rather than double.
    assert_eq!(
        engine.eval("byte b = 3; Math.Max(b, 7)").unwrap().runtime_ty(),
        Ty::I32
    );
}

#[test]
fn derived_instances_satisfy_base_typed_tests() {
    let engine = game_engine();
    let src = indoc! {"
        Player p = new Player();
        p is Entity
    "};
    assert_eq!(engine.eval(src).unwrap().as_bool(), Some(true));
}

#[test]
fn loops_and_collections_compose() {
    let engine = game_engine();
    let src = indoc! {"
        int[] costs = new int[] { 3, 8, 2, 5 };
        int best = 0;
        foreach (int c in costs) {
            best = Math.Max(best, c);
        }
        best
    "};
    assert_eq!(engine.eval(src).unwrap().as_i64(), Some(8));
}

#[test]
fn string_building_across_a_loop() {
    let engine = game_engine();
    let src = indoc! {"
        string s = \"\";
        for (int i = 0; i < 3; i++) {
            s += i + \",\";
        }
        s
    "};
    assert_eq!(
        engine.eval(src).unwrap().as_str().map(|s| s.as_str()),
        Some("0,1,2,")
    );
}

#[test]
fn suggestions_reflect_the_live_host() {
    let engine = game_engine();
    let src = "Player p = new Player(); p.";
    let out = engine.suggest(src, src.len());
    let names: Vec<&str> = out.items.iter().map(|s| s.text.as_str()).collect();
    // Inherited members surface next to the type's own.
    assert!(names.contains(&"Health"));
    assert!(names.contains(&"Id"));
    assert!(names.contains(&"Damage"));
}

#[test]
fn runaway_scripts_are_contained() {
    let mut opts = EngineOptions::default();
    opts.max_loop_iterations = 1_000;
    let mut reg = Registry::new();
    let _ = &mut reg;
    let table = SymbolTableBuilder::new().build();
    let engine = Engine::new(Arc::new(table), Arc::new(reg), opts);

    let err = engine.eval("while (true) { }").expect_err("budget must trip");
    assert!(matches!(err, conscript::Error::Runtime(_)));
}
