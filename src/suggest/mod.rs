//! Autocomplete suggestions.
//!
//! The engine reuses the ordinary lexer and parser: the source is lexed
//! lossily, then parsed with a probe cursor attached. While parsing, the
//! parser records the innermost completion context whose token touches
//! the cursor; parse errors after that point are expected and ignored.
//! The recorded context is then completed into a ranked suggestion list.

use ecow::EcoString;
use tracing::debug;

use crate::api::EngineOptions;
use crate::host::value::Ty;
use crate::host::{HostModel, Signature};
use crate::lexer::lex_lossy;
use crate::lexer::token::Span;
use crate::parser;
use crate::symbols::SymbolTable;

pub mod style;
pub mod worker;

#[cfg(test)]
mod suggest_test;

pub use style::{style_tokens, Style, StyledSpan};
pub use worker::SuggestWorker;

/// Cursor state threaded through a probe parse.
pub(crate) struct ProbeState {
    /// Byte offset of the cursor in the source text.
    pub cursor: usize,
    /// The innermost completion context recorded at the cursor.
    pub context: Option<SuggestContext>,
}

/// What the parser found at the cursor.
pub(crate) enum SuggestContext {
    /// Completing a bare identifier: a local, type, namespace, or keyword.
    Identifiers {
        prefix: EcoString,
        span: Span,
        locals: Vec<EcoString>,
    },
    /// Completing a member name after `.`.
    Members {
        prefix: EcoString,
        span: Span,
        names: Vec<EcoString>,
    },
    /// Inside an argument list: show the callable's signatures.
    Overloads {
        name: EcoString,
        span: Span,
        signatures: Vec<Signature>,
        arg_tys: Vec<Ty>,
    },
    /// Inside a generic argument list.
    GenericArgs {
        type_name: EcoString,
        arity: usize,
        index: usize,
        span: Span,
    },
}

/// What a suggestion entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SuggestionKind {
    /// A local variable in scope at the cursor.
    Local,
    /// A member of the receiver before the dot.
    Member,
    /// A top-level type or namespace.
    Symbol,
    /// A language keyword.
    Keyword,
    /// A rendered callable signature (argument-list help).
    Overload,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub text: EcoString,
    pub kind: SuggestionKind,
}

/// The complete response for one cursor position: the ranked items, the
/// span they would replace, and styling for the source text.
#[derive(Debug, Clone, Default)]
pub struct SuggestionTable {
    /// The prefix being completed (possibly empty).
    pub query: EcoString,
    /// Byte span an accepted suggestion replaces.
    pub replacement: Span,
    pub items: Vec<Suggestion>,
    /// Style classification of every token in the source.
    pub tokens: Vec<StyledSpan>,
}

/// Primitive type keywords offered alongside symbol names.
const TYPE_KEYWORDS: &[&str] = &[
    "bool", "byte", "char", "double", "float", "int", "long", "object", "sbyte", "short",
    "string", "uint", "ulong", "ushort",
];

/// Statement-position keywords offered when completing identifiers.
const STATEMENT_KEYWORDS: &[&str] = &[
    "break", "continue", "else", "false", "for", "foreach", "if", "in", "new", "null", "true",
    "while",
];

/// Build the suggestion table for `source` with the cursor at byte
/// offset `cursor`. `cancel` is polled during symbol scans so a stale
/// background request can bail out early.
pub fn build(
    source: &str,
    cursor: usize,
    table: &SymbolTable,
    host: &dyn HostModel,
    opts: &EngineOptions,
    cancel: impl Fn() -> bool,
) -> SuggestionTable {
    let tokens = lex_lossy(source);
    let styled = style_tokens(&tokens);

    let mut probe = ProbeState { cursor, context: None };
    // The parse very often fails at the cursor; the probe context
    // recorded on the way there is what matters.
    let _ = parser::parse_probe(source, tokens, table, host, opts, &mut probe);

    let mut out = SuggestionTable {
        tokens: styled,
        replacement: Span::new(cursor, cursor),
        ..SuggestionTable::default()
    };

    let context = probe.context.or_else(|| fallback_context(source, cursor));
    let Some(context) = context else {
        return out;
    };

    match context {
        SuggestContext::Identifiers { prefix, span, locals } => {
            out.query = prefix.clone();
            out.replacement = span;
            let mut items = Vec::new();
            for name in locals {
                items.push(Suggestion { text: name, kind: SuggestionKind::Local });
            }
            for name in table.visible_names(&opts.using_namespaces, &cancel) {
                items.push(Suggestion { text: name, kind: SuggestionKind::Symbol });
            }
            for kw in TYPE_KEYWORDS.iter().chain(STATEMENT_KEYWORDS) {
                items.push(Suggestion { text: (*kw).into(), kind: SuggestionKind::Keyword });
            }
            out.items = rank(items, &prefix);
        }
        SuggestContext::Members { prefix, span, names } => {
            out.query = prefix.clone();
            out.replacement = span;
            let items = names
                .into_iter()
                .map(|text| Suggestion { text, kind: SuggestionKind::Member })
                .collect();
            out.items = rank(items, &prefix);
        }
        SuggestContext::Overloads { name, span, signatures, arg_tys } => {
            out.replacement = span;
            let mut fits: Vec<&Signature> = signatures
                .iter()
                .filter(|sig| accepts_prefix(host, sig, &arg_tys))
                .collect();
            // Fewest remaining parameters first.
            fits.sort_by_key(|sig| sig.params.len().saturating_sub(arg_tys.len()));
            out.items = fits
                .iter()
                .map(|sig| Suggestion {
                    text: render_signature(&name, sig).into(),
                    kind: SuggestionKind::Overload,
                })
                .collect();
            debug!(name = %name, supplied = arg_tys.len(), shown = out.items.len(), "argument help");
        }
        SuggestContext::GenericArgs { type_name, arity, index, span } => {
            out.replacement = span;
            let mut items: Vec<Suggestion> = TYPE_KEYWORDS
                .iter()
                .map(|kw| Suggestion { text: (*kw).into(), kind: SuggestionKind::Keyword })
                .collect();
            for name in table.visible_names(&opts.using_namespaces, &cancel) {
                items.push(Suggestion { text: name, kind: SuggestionKind::Symbol });
            }
            out.items = rank(items, "");
            debug!(ty = %type_name, arity, index, "generic argument position");
        }
    }
    out
}

/// When the parse recorded nothing (cursor in fresh statement space),
/// offer a bare identifier context with an empty prefix.
fn fallback_context(source: &str, cursor: usize) -> Option<SuggestContext> {
    let before = source.get(..cursor)?.trim_end();
    let fresh = before.is_empty()
        || before.ends_with(';')
        || before.ends_with('{')
        || before.ends_with('(');
    if !fresh {
        return None;
    }
    Some(SuggestContext::Identifiers {
        prefix: EcoString::new(),
        span: Span::new(cursor, cursor),
        locals: Vec::new(),
    })
}

/// Filter to case-insensitive prefix matches and sort: kind groups first
/// (locals, members, symbols, keywords), alphabetically inside a group.
fn rank(items: Vec<Suggestion>, prefix: &str) -> Vec<Suggestion> {
    let prefix = prefix.to_ascii_lowercase();
    let mut out: Vec<Suggestion> = items
        .into_iter()
        .filter(|s| s.text.to_ascii_lowercase().starts_with(&prefix))
        .collect();
    out.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.text.to_ascii_lowercase().cmp(&b.text.to_ascii_lowercase()))
    });
    out.dedup_by(|a, b| a.text == b.text && a.kind == b.kind);
    out
}

/// Whether the arguments typed so far could still belong to `sig`.
/// A method-group argument carries no type yet and matches any
/// reference-typed parameter.
fn accepts_prefix(host: &dyn HostModel, sig: &Signature, arg_tys: &[Ty]) -> bool {
    let variadic = sig.is_variadic();
    if !variadic && arg_tys.len() > sig.params.len() {
        return false;
    }
    let fixed = if variadic { sig.params.len() - 1 } else { sig.params.len() };
    arg_tys.iter().enumerate().all(|(i, arg)| {
        let target = if i < fixed { &sig.params[i].ty } else { &sig.params[fixed].ty };
        (matches!(arg, Ty::Null) && target.is_reference())
            || crate::resolver::implicit_convertible(host, arg, target)
    })
}

fn render_signature(name: &str, sig: &Signature) -> String {
    let mut out = String::new();
    out.push_str(name);
    out.push('(');
    for (i, p) in sig.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if p.variadic {
            out.push_str("params ");
        }
        out.push_str(&format!("{} {}", p.ty, p.name));
        if p.optional {
            out.push('?');
        }
    }
    out.push(')');
    if sig.ret != Ty::Void {
        out.push_str(&format!(" -> {}", sig.ret));
    }
    out
}
