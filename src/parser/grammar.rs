//! Precedence and dispatch table for the expression parser.
//!
//! Every token kind maps to at most one prefix handler and one infix
//! handler plus a binding precedence. The parser climbs precedence
//! levels by consulting this table instead of hard-coding a grammar
//! function per level.

use crate::lexer::token::{Kw, TokenKind};

/// Binding precedences, weakest to tightest.
pub mod prec {
    pub const NONE: u8 = 0;
    pub const ASSIGN: u8 = 1;
    pub const CONDITIONAL: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const BIT_OR: u8 = 5;
    pub const BIT_XOR: u8 = 6;
    pub const BIT_AND: u8 = 7;
    pub const EQUALITY: u8 = 8;
    pub const RELATIONAL: u8 = 9;
    pub const SHIFT: u8 = 10;
    pub const ADDITIVE: u8 = 11;
    pub const MULTIPLICATIVE: u8 = 12;
    pub const UNARY: u8 = 13;
    pub const POSTFIX: u8 = 14;
}

/// How a token starts an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// Integer, float, string, or char literal token.
    Literal,
    /// `true`, `false`, `null`.
    LiteralKw,
    /// Identifier lookup (local, namespace, or type).
    Ident,
    /// Primitive type keyword such as `int` or `string`.
    TypeKw,
    /// `(` starting a parenthesized expression or a cast.
    Group,
    /// `+ - ! ~`.
    Unary,
    /// Prefix `++` / `--`.
    IncDec,
    /// `new`.
    New,
}

/// How a token continues an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infix {
    /// Arithmetic, bitwise, shift, and comparison operators.
    Binary,
    /// Short-circuit `&&` / `||`.
    Logical,
    /// `? :`.
    Conditional,
    /// `=`.
    Assign,
    /// `+= -= *= /= %= &= |= ^= <<= >>=`.
    CompoundAssign,
    /// `.`.
    Member,
    /// `(` argument list.
    Call,
    /// `[` index or array-type suffix.
    Index,
    /// Postfix `++` / `--`.
    IncDec,
    /// `is` / `as` type tests.
    TypeTest,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub prefix: Option<Prefix>,
    pub infix: Option<Infix>,
    pub precedence: u8,
    pub right_assoc: bool,
}

impl Rule {
    /// Minimum binding level for the operand to the right of this
    /// operator. Right-associative operators admit an equal operator
    /// on the right, so they bind one level lower.
    pub fn rhs_precedence(&self) -> u8 {
        if self.right_assoc {
            self.precedence - 1
        } else {
            self.precedence
        }
    }
}

const fn none() -> Rule {
    Rule { prefix: None, infix: None, precedence: prec::NONE, right_assoc: false }
}

const fn pre(prefix: Prefix) -> Rule {
    Rule { prefix: Some(prefix), infix: None, precedence: prec::NONE, right_assoc: false }
}

const fn inf(infix: Infix, precedence: u8) -> Rule {
    Rule { prefix: None, infix: Some(infix), precedence, right_assoc: false }
}

const fn inf_right(infix: Infix, precedence: u8) -> Rule {
    Rule { prefix: None, infix: Some(infix), precedence, right_assoc: true }
}

const fn both(prefix: Prefix, infix: Infix, precedence: u8) -> Rule {
    Rule { prefix: Some(prefix), infix: Some(infix), precedence, right_assoc: false }
}

/// Look up the rule for a token kind.
pub fn rule_for(kind: &TokenKind) -> Rule {
    use TokenKind::*;
    match kind {
        Int { .. } | Float { .. } | Str { .. } | CharLit { .. } => pre(Prefix::Literal),
        Ident(_) => pre(Prefix::Ident),
        Kw(kw) => rule_for_kw(*kw),

        LParen => both(Prefix::Group, Infix::Call, prec::POSTFIX),
        LBracket => inf(Infix::Index, prec::POSTFIX),
        Dot => inf(Infix::Member, prec::POSTFIX),
        PlusPlus | MinusMinus => {
            Rule {
                prefix: Some(Prefix::IncDec),
                infix: Some(Infix::IncDec),
                precedence: prec::POSTFIX,
                right_assoc: false,
            }
        }

        Plus | Minus => both(Prefix::Unary, Infix::Binary, prec::ADDITIVE),
        Bang | Tilde => pre(Prefix::Unary),
        Star | Slash | Percent => inf(Infix::Binary, prec::MULTIPLICATIVE),
        Shl | Shr => inf(Infix::Binary, prec::SHIFT),
        Lt | Gt | Le | Ge => inf(Infix::Binary, prec::RELATIONAL),
        EqEq | BangEq => inf(Infix::Binary, prec::EQUALITY),
        Amp => inf(Infix::Binary, prec::BIT_AND),
        Caret => inf(Infix::Binary, prec::BIT_XOR),
        Pipe => inf(Infix::Binary, prec::BIT_OR),
        AmpAmp => inf(Infix::Logical, prec::AND),
        PipePipe => inf(Infix::Logical, prec::OR),

        Question => inf_right(Infix::Conditional, prec::CONDITIONAL),
        Eq => inf_right(Infix::Assign, prec::ASSIGN),
        PlusEq | MinusEq | StarEq | SlashEq | PercentEq | AmpEq | PipeEq | CaretEq | ShlEq
        | ShrEq => inf_right(Infix::CompoundAssign, prec::ASSIGN),

        _ => none(),
    }
}

fn rule_for_kw(kw: Kw) -> Rule {
    use Kw::*;
    match kw {
        True | False | Null => pre(Prefix::LiteralKw),
        New => pre(Prefix::New),
        Is | As => inf(Infix::TypeTest, prec::RELATIONAL),
        Bool | Byte | Sbyte | Short | Ushort | Int | Uint | Long | Ulong | Float | Double
        | Char | String | Object | Void => pre(Prefix::TypeKw),
        _ => none(),
    }
}
