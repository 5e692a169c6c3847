use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::api::EngineOptions;
use crate::host::registry::Registry;
use crate::host::value::Ty;
use crate::host::{Param, Signature};
use crate::lexer::token::Span;
use crate::symbols::{SymbolTable, SymbolTableBuilder};

use super::{build, Style, Suggestion, SuggestionKind, SuggestionTable};

fn fixture() -> (SymbolTable, Registry) {
    let mut reg = Registry::new();
    let player = reg.add_class("Player", None);
    reg.add_field(player, "Health", Ty::I32);
    reg.add_field(player, "Mana", Ty::I32);
    reg.add_private_field(player, "Secret", Ty::I32);
    reg.add_method(
        player,
        "Heal",
        Signature::new(vec![Param::required("amount", Ty::I32)], Ty::Void),
        Arc::new(|_, _| Ok(crate::host::value::Value::Null)),
    );
    reg.add_method(
        player,
        "Heal",
        Signature::new(
            vec![Param::required("amount", Ty::I32), Param::required("critical", Ty::Bool)],
            Ty::Void,
        ),
        Arc::new(|_, _| Ok(crate::host::value::Value::Null)),
    );
    reg.add_method(
        player,
        "Tag",
        Signature::new(vec![Param::required("id", Ty::I32)], Ty::Void),
        Arc::new(|_, _| Ok(crate::host::value::Value::Null)),
    );
    reg.add_method(
        player,
        "Tag",
        Signature::new(
            vec![Param::required("label", Ty::Str), Param::required("id", Ty::I32)],
            Ty::Void,
        ),
        Arc::new(|_, _| Ok(crate::host::value::Value::Null)),
    );
    let table = SymbolTableBuilder::new().add_type("Player", player).build();
    (table, reg)
}

fn suggest(src: &str, cursor: usize) -> SuggestionTable {
    let (table, reg) = fixture();
    build(src, cursor, &table, &reg, &EngineOptions::default(), || false)
}

fn texts(items: &[Suggestion]) -> Vec<&str> {
    items.iter().map(|s| s.text.as_str()).collect()
}

#[test]
fn members_complete_after_a_dot() {
    let src = "Player p = new Player(); p.";
    let out = suggest(src, src.len());
    assert_eq!(out.query, "");
    assert_eq!(out.replacement, Span::new(src.len(), src.len()));
    assert_eq!(texts(&out.items), vec!["Heal", "Health", "Mana", "Tag"]);
    assert!(out.items.iter().all(|s| s.kind == SuggestionKind::Member));
}

#[test]
fn member_prefix_filters_case_insensitively() {
    let src = "Player p = new Player(); p.hea";
    let out = suggest(src, src.len());
    assert_eq!(out.query, "hea");
    // The replacement covers the typed prefix.
    assert_eq!(out.replacement, Span::new(src.len() - 3, src.len()));
    assert_eq!(texts(&out.items), vec!["Heal", "Health"]);
}

#[test]
fn safe_mode_hides_private_members_from_completion() {
    let src = "Player p = new Player(); p.Sec";
    let out = suggest(src, src.len());
    assert!(out.items.is_empty());
}

#[test]
fn identifiers_offer_locals_symbols_and_keywords() {
    let src = "int score = 1; sco";
    let out = suggest(src, src.len());
    assert_eq!(out.query, "sco");
    assert_eq!(texts(&out.items), vec!["score"]);
    assert_eq!(out.items[0].kind, SuggestionKind::Local);

    let src = "Pla";
    let out = suggest(src, src.len());
    assert_eq!(texts(&out.items), vec!["Player"]);
    assert_eq!(out.items[0].kind, SuggestionKind::Symbol);

    let src = "whi";
    let out = suggest(src, src.len());
    assert_eq!(texts(&out.items), vec!["while"]);
    assert_eq!(out.items[0].kind, SuggestionKind::Keyword);
}

#[test]
fn locals_rank_ahead_of_keywords() {
    let src = "int forward = 1; fo";
    let out = suggest(src, src.len());
    let names = texts(&out.items);
    assert_eq!(names, vec!["forward", "for", "foreach"]);
}

#[test]
fn empty_input_falls_back_to_the_statement_context() {
    let out = suggest("", 0);
    assert_eq!(out.query, "");
    assert!(out.items.iter().any(|s| s.text == "Player"));
    assert!(out.items.iter().any(|s| s.text == "while"));

    // Same after a finished statement.
    let src = "int x = 1; ";
    let out = suggest(src, src.len());
    assert!(out.items.iter().any(|s| s.text == "int"));
}

#[test]
fn call_parens_show_overload_signatures() {
    let src = "Player p = new Player(); p.Heal(";
    let out = suggest(src, src.len());
    assert_eq!(out.items.len(), 2);
    assert!(out.items.iter().all(|s| s.kind == SuggestionKind::Overload));
    // Fewest remaining parameters first.
    assert_eq!(out.items[0].text, "Heal(int amount)");
    assert_eq!(out.items[1].text, "Heal(int amount, bool critical)");
}

#[test]
fn typed_arguments_filter_the_overload_list() {
    let src = "Player p = new Player(); p.Tag(\"boss\",";
    let out = suggest(src, src.len());
    // A string first argument rules out Tag(int id).
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].text, "Tag(string label, int id)");
}

#[test]
fn cursor_in_the_middle_of_input_still_probes() {
    // Cursor right after the dot, with more text following.
    let src = "Player p = new Player(); p. ; int x = 1;";
    let cursor = src.find(". ").unwrap() + 1;
    let out = suggest(src, cursor);
    assert!(out.items.iter().any(|s| s.text == "Health"));
}

#[test]
fn tokens_are_styled_for_highlighting() {
    let out = suggest("int x = \"hi\" + 2;", 0);
    let styles: Vec<Style> = out.tokens.iter().map(|t| t.style).collect();
    assert_eq!(
        styles,
        vec![
            Style::TypeKeyword,
            Style::Ident,
            Style::Operator,
            Style::Str,
            Style::Operator,
            Style::Number,
            Style::Punct,
        ]
    );
    // Spans cover the original text.
    assert_eq!(out.tokens[0].span, Span::new(0, 3));
    assert_eq!(out.tokens[3].span, Span::new(8, 12));
}

#[test]
fn styling_survives_broken_source() {
    let out = suggest("int x = $ nonsense", 0);
    // Tokens up to the bad character still classify.
    assert_eq!(out.tokens.len(), 3);
    assert_eq!(out.tokens[0].style, Style::TypeKeyword);
}

#[test]
fn the_worker_refuses_overlapping_requests() {
    use std::sync::mpsc;
    use std::time::Duration;

    let (table, reg) = fixture();
    let worker = super::SuggestWorker::new(
        Arc::new(table),
        Arc::new(reg),
        EngineOptions::default(),
    );

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    assert!(worker.request_with("Pla".to_string(), 3, move |t| {
        started_tx.send(t.items.len()).unwrap();
        release_rx.recv().unwrap();
    }));

    // The callback is running, so the worker is still busy.
    let n = started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(n >= 1);
    assert!(worker.is_busy());
    assert!(!worker.request("int x".to_string(), 5));

    release_tx.send(()).unwrap();
    let mut table = None;
    for _ in 0..200 {
        if let Some(t) = worker.poll() {
            table = Some(t);
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(table.expect("table delivered").items.iter().any(|s| s.text == "Player"));
}

#[test]
fn cancelled_requests_return_quietly() {
    let (table, reg) = fixture();
    let out = build("Pla", 3, &table, &reg, &EngineOptions::default(), || true);
    // Cancellation only stops the symbol sweep; the call still returns
    // a table rather than panicking.
    assert!(out.items.len() <= 1);
}
