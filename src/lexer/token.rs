//! Token kinds, source spans, and the keyword table.

use std::fmt;

use ecow::EcoString;
use once_cell::sync::Lazy;

use crate::host::value::Ty;

/// Byte-offset span within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A single token. Immutable once produced; equality follows the kind (and
/// payload, for identifiers and literals), not the span.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-based source line the token starts on.
    pub line: u32,
}

/// Result type forced by an integer literal suffix, or picked as the
/// smallest fitting type for unsuffixed literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    I32,
    U32,
    I64,
    U64,
}

impl IntKind {
    pub fn ty(self) -> Ty {
        match self {
            IntKind::I32 => Ty::I32,
            IntKind::U32 => Ty::U32,
            IntKind::I64 => Ty::I64,
            IntKind::U64 => Ty::U64,
        }
    }
}

/// Reserved words. Identifiers are re-tagged as keywords after the keyword
/// table lookup, preserving their original span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    If,
    Else,
    For,
    While,
    Foreach,
    In,
    Break,
    Continue,
    New,
    True,
    False,
    Null,
    Is,
    As,
    Bool,
    Byte,
    Sbyte,
    Short,
    Ushort,
    Int,
    Uint,
    Long,
    Ulong,
    Float,
    Double,
    Char,
    String,
    Object,
    Void,
}

impl Kw {
    /// The primitive type a type keyword names, if it is one.
    pub fn primitive_ty(self) -> Option<Ty> {
        match self {
            Kw::Bool => Some(Ty::Bool),
            Kw::Byte => Some(Ty::U8),
            Kw::Sbyte => Some(Ty::I8),
            Kw::Short => Some(Ty::I16),
            Kw::Ushort => Some(Ty::U16),
            Kw::Int => Some(Ty::I32),
            Kw::Uint => Some(Ty::U32),
            Kw::Long => Some(Ty::I64),
            Kw::Ulong => Some(Ty::U64),
            Kw::Float => Some(Ty::F32),
            Kw::Double => Some(Ty::F64),
            Kw::Char => Some(Ty::Char),
            Kw::String => Some(Ty::Str),
            Kw::Object => Some(Ty::Any),
            Kw::Void => Some(Ty::Void),
            _ => None,
        }
    }
}

/// Keyword table, bucketed by first letter so lookup touches only the
/// handful of candidates sharing the identifier's initial.
static KEYWORDS: Lazy<[&'static [(&'static str, Kw)]; 26]> = Lazy::new(|| {
    const fn bucket(entries: &'static [(&'static str, Kw)]) -> &'static [(&'static str, Kw)] {
        entries
    }
    let mut table: [&'static [(&'static str, Kw)]; 26] = [&[]; 26];
    table[0] = bucket(&[("as", Kw::As)]);
    table[1] = bucket(&[("bool", Kw::Bool), ("break", Kw::Break), ("byte", Kw::Byte)]);
    table[2] = bucket(&[("char", Kw::Char), ("continue", Kw::Continue)]);
    table[3] = bucket(&[("double", Kw::Double)]);
    table[4] = bucket(&[("else", Kw::Else)]);
    table[5] = bucket(&[
        ("false", Kw::False),
        ("float", Kw::Float),
        ("for", Kw::For),
        ("foreach", Kw::Foreach),
    ]);
    table[8] = bucket(&[("if", Kw::If), ("in", Kw::In), ("int", Kw::Int), ("is", Kw::Is)]);
    table[11] = bucket(&[("long", Kw::Long)]);
    table[13] = bucket(&[("new", Kw::New), ("null", Kw::Null)]);
    table[14] = bucket(&[("object", Kw::Object)]);
    table[18] = bucket(&[
        ("sbyte", Kw::Sbyte),
        ("short", Kw::Short),
        ("string", Kw::String),
    ]);
    table[19] = bucket(&[("true", Kw::True)]);
    table[20] = bucket(&[("uint", Kw::Uint), ("ulong", Kw::Ulong), ("ushort", Kw::Ushort)]);
    table[21] = bucket(&[("void", Kw::Void)]);
    table[22] = bucket(&[("while", Kw::While)]);
    table
});

/// Look an identifier up in the keyword table.
pub fn keyword(text: &str) -> Option<Kw> {
    let first = text.bytes().next()?;
    if !first.is_ascii_lowercase() {
        return None;
    }
    let bucket = KEYWORDS[(first - b'a') as usize];
    bucket
        .iter()
        .find(|(word, _)| *word == text)
        .map(|(_, kw)| *kw)
}

/// The kind of a token, with literal payloads already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(EcoString),
    Int { value: u64, kind: IntKind },
    Float { value: f64, single: bool },
    Str { value: EcoString, terminated: bool },
    CharLit { value: char, terminated: bool },
    Kw(Kw),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Question,
    Dot,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Bang,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    BangEq,
    Shl,
    Shr,

    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    PlusPlus,
    MinusMinus,

    /// End-of-input sentinel; every token stream ends with exactly one.
    Eoi,
}

impl TokenKind {
    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Int { .. } | TokenKind::Float { .. } => "numeric literal".to_string(),
            TokenKind::Str { .. } => "string literal".to_string(),
            TokenKind::CharLit { .. } => "character literal".to_string(),
            TokenKind::Kw(kw) => format!("'{}'", kw_text(*kw)),
            TokenKind::Eoi => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::Dot => ".",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::AmpAmp => "&&",
            TokenKind::Pipe => "|",
            TokenKind::PipePipe => "||",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::ShlEq => "<<=",
            TokenKind::ShrEq => ">>=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            _ => "?",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

pub(crate) fn kw_text(kw: Kw) -> &'static str {
    match kw {
        Kw::If => "if",
        Kw::Else => "else",
        Kw::For => "for",
        Kw::While => "while",
        Kw::Foreach => "foreach",
        Kw::In => "in",
        Kw::Break => "break",
        Kw::Continue => "continue",
        Kw::New => "new",
        Kw::True => "true",
        Kw::False => "false",
        Kw::Null => "null",
        Kw::Is => "is",
        Kw::As => "as",
        Kw::Bool => "bool",
        Kw::Byte => "byte",
        Kw::Sbyte => "sbyte",
        Kw::Short => "short",
        Kw::Ushort => "ushort",
        Kw::Int => "int",
        Kw::Uint => "uint",
        Kw::Long => "long",
        Kw::Ulong => "ulong",
        Kw::Float => "float",
        Kw::Double => "double",
        Kw::Char => "char",
        Kw::String => "string",
        Kw::Object => "object",
        Kw::Void => "void",
    }
}

/// All keywords, for suggestion lists.
pub fn all_keywords() -> impl Iterator<Item = &'static str> {
    KEYWORDS.iter().flat_map(|bucket| bucket.iter().map(|(word, _)| *word))
}
