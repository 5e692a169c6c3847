use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::host::registry::Registry;
use crate::host::value::{Ty, Value};
use crate::host::{Param, Signature};
use crate::symbols::SymbolTableBuilder;

use super::{Engine, EngineOptions, Error};

fn game_engine() -> Engine {
    let mut reg = Registry::new();
    let player = reg.add_class("Player", None);
    reg.add_field(player, "Health", Ty::I32);
    reg.add_static_method(
        player,
        "Starting",
        Signature::new(vec![], Ty::I32),
        Arc::new(|_, _| Ok(Value::I32(100))),
    );
    let table = SymbolTableBuilder::new().add_type("Player", player).build();
    Engine::new(Arc::new(table), Arc::new(reg), EngineOptions::default())
}

#[test]
fn eval_parses_and_runs_in_one_call() {
    let engine = game_engine();
    assert_eq!(engine.eval("int x = 40; x + 2").unwrap().as_i64(), Some(42));
    assert_eq!(engine.eval("Player.Starting()").unwrap().as_i64(), Some(100));
}

#[test]
fn a_parsed_command_can_run_repeatedly() {
    let engine = game_engine();
    let cmd = engine.parse("int x = 0; x + 1").unwrap();
    // Each run gets a fresh variable stack.
    assert_eq!(engine.execute(&cmd).unwrap().as_i64(), Some(1));
    assert_eq!(engine.execute(&cmd).unwrap().as_i64(), Some(1));
}

#[test]
fn commands_keep_host_state_between_runs() {
    let engine = game_engine();
    let setup = engine.eval("Player p = new Player(); p.Health = 1; p.Health");
    assert_eq!(setup.unwrap().as_i64(), Some(1));
}

#[test]
fn errors_carry_their_stage() {
    let engine = game_engine();
    assert!(matches!(engine.eval("int x = $"), Err(Error::Lex(_))));
    assert!(matches!(engine.eval("unknown + 1"), Err(Error::Parse(_))));
    assert!(matches!(engine.eval("1 / 0"), Err(Error::Runtime(_))));
}

#[test]
fn suggestions_come_straight_from_the_engine() {
    let engine = game_engine();
    let out = engine.suggest("Pla", 3);
    assert!(out.items.iter().any(|s| s.text == "Player"));
}

#[test]
fn the_background_worker_delivers_a_table() {
    let engine = game_engine();
    let worker = engine.suggest_worker();
    assert!(worker.request("Pla".to_string(), 3));

    let mut delivered = None;
    for _ in 0..200 {
        if let Some(table) = worker.poll() {
            delivered = Some(table);
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    let table = delivered.expect("the worker should finish well within a second");
    assert!(table.items.iter().any(|s| s.text == "Player"));
    assert!(!worker.is_busy());
}
