use thiserror::Error;

use crate::lexer::token::Span;
use crate::resolver::ResolveError;

/// A syntactic or semantic parse failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("unexpected end of input")]
    UnexpectedEoi,
    #[error("unterminated {what} literal")]
    Unterminated { what: &'static str },
    #[error(transparent)]
    Semantic(#[from] ResolveError),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte span of the offending source region.
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}
