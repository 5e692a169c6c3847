//! Token style classification for input-field highlighting.

use crate::lexer::token::{Span, Token, TokenKind};

/// Display class of a source token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Keyword,
    TypeKeyword,
    Ident,
    Number,
    Str,
    Operator,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyledSpan {
    pub span: Span,
    pub style: Style,
}

/// Classify every token except the end sentinel.
pub fn style_tokens(tokens: &[Token]) -> Vec<StyledSpan> {
    tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Eoi))
        .map(|t| StyledSpan { span: t.span, style: classify(&t.kind) })
        .collect()
}

fn classify(kind: &TokenKind) -> Style {
    use TokenKind::*;
    match kind {
        Ident(_) => Style::Ident,
        Int { .. } | Float { .. } => Style::Number,
        Str { .. } | CharLit { .. } => Style::Str,
        Kw(kw) => {
            if kw.primitive_ty().is_some() {
                Style::TypeKeyword
            } else {
                Style::Keyword
            }
        }
        LParen | RParen | LBrace | RBrace | LBracket | RBracket | Comma | Semi | Colon | Dot => {
            Style::Punct
        }
        _ => Style::Operator,
    }
}
