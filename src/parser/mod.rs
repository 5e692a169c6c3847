//! Single-pass semantic parser.
//!
//! Precedence climbing over the grammar table in [`grammar`], with
//! name resolution, member lookup, overload selection, and numeric
//! conversion insertion happening while the tree is built. The output
//! is a typed [`Command`] that executes without any further lookup.
//!
//! The token cursor is an explicit index plus a one-token pushback
//! slot; the pushback exists so `>>` can split into two `>` tokens
//! when it closes nested generic argument lists.

use ecow::EcoString;
use tracing::debug;

use crate::api::EngineOptions;
use crate::ast::{Command, Expr, MemberRoot};
use crate::host::value::{Ty, TypeRef};
use crate::host::{HostModel, MemberRef};
use crate::lexer::token::{Kw, Span, Token, TokenKind};
use crate::resolver::ResolveError;
use crate::suggest::ProbeState;
use crate::symbols::{SymbolNode, SymbolTable};

pub mod grammar;

mod error;
mod expr;

#[cfg(test)]
mod parser_test;

pub use error::{ParseError, ParseErrorKind};

/// Parse a token stream into an executable command.
pub fn parse(
    source: &str,
    tokens: Vec<Token>,
    table: &SymbolTable,
    host: &dyn HostModel,
    opts: &EngineOptions,
) -> Result<Command, ParseError> {
    let mut parser = Parser::new(source, tokens, table, host, opts, None);
    let root = parser.parse_program()?;
    debug!(len = source.len(), "parsed command");
    Ok(Command { root, source: source.into() })
}

/// Probe parse for suggestions: identical to [`parse`] except that a
/// cursor context is recorded along the way. Errors at or after the
/// cursor are expected; the caller keeps whatever context was recorded.
pub(crate) fn parse_probe(
    source: &str,
    tokens: Vec<Token>,
    table: &SymbolTable,
    host: &dyn HostModel,
    opts: &EngineOptions,
    probe: &mut ProbeState,
) -> Result<Command, ParseError> {
    let mut parser = Parser::new(source, tokens, table, host, opts, Some(probe));
    let root = parser.parse_program()?;
    Ok(Command { root, source: source.into() })
}

/// An unresolved method set; it becomes a call, a delegate value, or an
/// error once the surrounding context is known.
pub(crate) struct MethodGroup {
    pub receiver: Option<Expr>,
    pub name: EcoString,
    pub candidates: Vec<MemberRef>,
    pub span: Span,
}

/// What a subexpression denotes. Only `Value` survives to the tree;
/// the other cases exist mid-parse so that `System.ConsoleColor.Red`
/// can thread a namespace and a type through the same member syntax.
pub(crate) enum Operand<'t> {
    Value(Expr),
    Type(Ty),
    Namespace(&'t SymbolNode),
    Group(MethodGroup),
}

impl Operand<'_> {
    /// Description used in "cannot be used as a value" diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Operand::Value(_) => "expression".to_string(),
            Operand::Type(ty) => format!("type `{ty}`"),
            Operand::Namespace(node) => format!("namespace `{}`", node.name()),
            Operand::Group(g) => format!("method group `{}`", g.name),
        }
    }
}

pub(crate) struct Parser<'a> {
    #[allow(dead_code)]
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
    pushback: Option<Token>,
    table: &'a SymbolTable,
    host: &'a dyn HostModel,
    opts: &'a EngineOptions,
    /// Lexical scopes; each block pushes one and pops it on exit.
    scopes: Vec<Vec<(EcoString, Ty)>>,
    loop_depth: u32,
    probe: Option<&'a mut ProbeState>,
}

impl<'a> Parser<'a> {
    fn new(
        src: &'a str,
        toks: Vec<Token>,
        table: &'a SymbolTable,
        host: &'a dyn HostModel,
        opts: &'a EngineOptions,
        probe: Option<&'a mut ProbeState>,
    ) -> Self {
        debug_assert!(matches!(toks.last().map(|t| &t.kind), Some(TokenKind::Eoi)));
        Self {
            src,
            toks,
            pos: 0,
            pushback: None,
            table,
            host,
            opts,
            scopes: Vec::new(),
            loop_depth: 0,
            probe,
        }
    }

    // ---- token cursor ----

    pub(crate) fn peek(&self) -> &Token {
        self.pushback.as_ref().unwrap_or(&self.toks[self.pos])
    }

    /// One token past [`peek`](Self::peek); saturates at end of input.
    pub(crate) fn peek2(&self) -> &Token {
        if self.pushback.is_some() {
            return &self.toks[self.pos];
        }
        let idx = (self.pos + 1).min(self.toks.len() - 1);
        &self.toks[idx]
    }

    pub(crate) fn at_eoi(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eoi)
    }

    pub(crate) fn advance(&mut self) -> Token {
        if let Some(tok) = self.pushback.take() {
            return tok;
        }
        let tok = self.toks[self.pos].clone();
        if !matches!(tok.kind, TokenKind::Eoi) {
            self.pos += 1;
        }
        tok
    }

    /// Return a synthesized token to the stream; at most one may be
    /// pending, which is all the `>>` split ever needs.
    pub(crate) fn push_back(&mut self, tok: Token) {
        debug_assert!(self.pushback.is_none());
        self.pushback = Some(tok);
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            return Ok(self.advance());
        }
        Err(self.unexpected(&kind.describe()))
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(EcoString, Span), ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let tok = self.advance();
            return Ok((name, tok.span));
        }
        Err(self.unexpected("an identifier"))
    }

    /// Consume the token if it matches.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            return true;
        }
        false
    }

    // ---- errors ----

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        let kind = if matches!(tok.kind, TokenKind::Eoi) {
            ParseErrorKind::UnexpectedEoi
        } else {
            ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: tok.kind.describe(),
            }
        };
        ParseError::new(kind, tok.span)
    }

    pub(crate) fn sem(&self, err: ResolveError, span: Span) -> ParseError {
        ParseError::new(ParseErrorKind::Semantic(err), span)
    }

    // ---- probe ----

    pub(crate) fn probe_cursor(&self) -> Option<usize> {
        self.probe.as_ref().map(|p| p.cursor)
    }

    /// A token "touches" the cursor when it ends exactly there; that
    /// is the token the user is in the middle of typing.
    pub(crate) fn touches_cursor(&self, span: Span) -> bool {
        self.probe_cursor() == Some(span.end)
    }

    pub(crate) fn record_probe(&mut self, context: crate::suggest::SuggestContext) {
        if let Some(probe) = self.probe.as_deref_mut() {
            // Last writer wins; the innermost context along the parse
            // path is the one recorded closest to the cursor.
            probe.context = Some(context);
        }
    }

    // ---- scopes ----

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn declare(&mut self, name: EcoString, ty: Ty, span: Span) -> Result<(), ParseError> {
        let current = self.scopes.last_mut().expect("no active scope");
        if current.iter().any(|(n, _)| *n == name) {
            return Err(self.sem(ResolveError::Redeclared { name }, span));
        }
        current.push((name, ty));
        Ok(())
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<&Ty> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().find(|(n, _)| n == name).map(|(_, ty)| ty))
    }

    /// Every variable name currently in scope, innermost last.
    pub(crate) fn visible_locals(&self) -> Vec<EcoString> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.iter().map(|(n, _)| n.clone()))
            .collect()
    }

    pub(crate) fn safe_mode(&self) -> bool {
        self.opts.safe_mode
    }

    // ---- statements ----

    fn parse_program(&mut self) -> Result<Expr, ParseError> {
        self.push_scope();
        let mut body = Vec::new();
        while !self.at_eoi() {
            body.push(self.parse_statement()?);
        }
        self.pop_scope();
        Ok(Expr::Block { body })
    }

    fn parse_statement(&mut self) -> Result<Expr, ParseError> {
        match &self.peek().kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Semi => {
                self.advance();
                Ok(Expr::Block { body: Vec::new() })
            }
            TokenKind::Kw(Kw::If) => self.parse_if(),
            TokenKind::Kw(Kw::While) => self.parse_while(),
            TokenKind::Kw(Kw::For) => self.parse_for(),
            TokenKind::Kw(Kw::Foreach) => self.parse_foreach(),
            TokenKind::Kw(Kw::Break) => {
                let tok = self.advance();
                if self.loop_depth == 0 {
                    return Err(self.sem(ResolveError::BreakOutsideLoop, tok.span));
                }
                self.finish_statement()?;
                Ok(Expr::Break)
            }
            TokenKind::Kw(Kw::Continue) => {
                let tok = self.advance();
                if self.loop_depth == 0 {
                    return Err(self.sem(ResolveError::ContinueOutsideLoop, tok.span));
                }
                self.finish_statement()?;
                Ok(Expr::Continue)
            }
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.finish_statement()?;
                Ok(stmt)
            }
        }
    }

    /// A declaration or expression statement, without the terminator.
    /// Also used for the init clause of `for`.
    fn parse_simple_statement(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek().span;
        let operand = self.parse_operand(grammar::prec::NONE)?;
        match operand {
            Operand::Type(ty) if matches!(self.peek().kind, TokenKind::Ident(_)) => {
                self.parse_declaration(ty, span)
            }
            Operand::Value(expr) => Ok(expr),
            other => Err(self.sem(
                ResolveError::NotAValue { what: other.describe() },
                span,
            )),
        }
    }

    fn parse_declaration(&mut self, ty: Ty, ty_span: Span) -> Result<Expr, ParseError> {
        if matches!(ty, Ty::Void) {
            return Err(self.sem(ResolveError::VoidValue, ty_span));
        }
        let (name, name_span) = self.expect_ident()?;
        let init = if self.eat(TokenKind::Eq) {
            let value_span = self.peek().span;
            let operand = self.parse_operand(grammar::prec::NONE)?;
            Some(Box::new(self.coerce_assign(operand, &ty, value_span)?))
        } else {
            None
        };
        self.declare(name.clone(), ty.clone(), name_span)?;
        Ok(Expr::VarDecl { name, ty, init })
    }

    /// Statement terminator: a semicolon, or the end of the enclosing
    /// block/input so the last statement may omit it.
    fn finish_statement(&mut self) -> Result<(), ParseError> {
        if self.eat(TokenKind::Semi) {
            return Ok(());
        }
        match self.peek().kind {
            TokenKind::RBrace | TokenKind::Eoi => Ok(()),
            _ => Err(self.unexpected("';'")),
        }
    }

    fn parse_block(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBrace)?;
        self.push_scope();
        let mut body = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RBrace | TokenKind::Eoi) {
            body.push(self.parse_statement()?);
        }
        self.pop_scope();
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::Block { body })
    }

    /// Loop/branch body: a braced block, or a single statement that
    /// still gets its own scope.
    fn parse_embedded_body(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek().kind, TokenKind::LBrace) {
            return self.parse_block();
        }
        self.push_scope();
        let stmt = self.parse_statement();
        self.pop_scope();
        Ok(Expr::Block { body: vec![stmt?] })
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek().span;
        let cond = self.parse_value(grammar::prec::NONE)?;
        if cond.ty() != Ty::Bool {
            return Err(self.sem(
                ResolveError::InvalidConversion { from: cond.ty(), to: Ty::Bool },
                span,
            ));
        }
        Ok(cond)
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::Kw(Kw::If))?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_condition()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.parse_embedded_body()?;
        let else_branch = if self.eat(TokenKind::Kw(Kw::Else)) {
            if matches!(self.peek().kind, TokenKind::Kw(Kw::If)) {
                // else-if chains nest to the right.
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(self.parse_embedded_body()?))
            }
        } else {
            None
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::Kw(Kw::While))?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_condition()?;
        self.expect(TokenKind::RParen)?;
        self.loop_depth += 1;
        let body = self.parse_embedded_body();
        self.loop_depth -= 1;
        Ok(Expr::While { cond: Box::new(cond), body: Box::new(body?) })
    }

    fn parse_for(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::Kw(Kw::For))?;
        self.expect(TokenKind::LParen)?;
        // The init clause's declarations live until the loop ends.
        self.push_scope();
        let result = self.parse_for_inner();
        self.pop_scope();
        result
    }

    fn parse_for_inner(&mut self) -> Result<Expr, ParseError> {
        let init = if matches!(self.peek().kind, TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.expect(TokenKind::Semi)?;
        let cond = if matches!(self.peek().kind, TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_condition()?))
        };
        self.expect(TokenKind::Semi)?;
        let advance = if matches!(self.peek().kind, TokenKind::RParen) {
            None
        } else {
            let span = self.peek().span;
            let operand = self.parse_operand(grammar::prec::NONE)?;
            match operand {
                Operand::Value(e) => Some(Box::new(e)),
                other => {
                    return Err(self.sem(
                        ResolveError::NotAValue { what: other.describe() },
                        span,
                    ))
                }
            }
        };
        self.expect(TokenKind::RParen)?;
        self.loop_depth += 1;
        let body = self.parse_embedded_body();
        self.loop_depth -= 1;
        Ok(Expr::For { init, cond, advance, body: Box::new(body?) })
    }

    fn parse_foreach(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::Kw(Kw::Foreach))?;
        self.expect(TokenKind::LParen)?;
        self.push_scope();
        let result = self.parse_foreach_inner();
        self.pop_scope();
        result
    }

    fn parse_foreach_inner(&mut self) -> Result<Expr, ParseError> {
        let ty_span = self.peek().span;
        let var_ty = self.parse_type_operand()?;
        if matches!(var_ty, Ty::Void) {
            return Err(self.sem(ResolveError::VoidValue, ty_span));
        }
        let (name, name_span) = self.expect_ident()?;
        self.expect(TokenKind::Kw(Kw::In))?;
        let coll_span = self.peek().span;
        let collection = self.parse_value(grammar::prec::NONE)?;

        let (kind, elem) = self.enumeration_of(&collection.ty(), coll_span)?;
        // The element must land in the loop variable; numeric steps are
        // converted per iteration, reference elements are checked.
        if crate::resolver::classify_cast(self.host, &elem, &var_ty).is_none() {
            return Err(self.sem(
                ResolveError::InvalidConversion { from: elem, to: var_ty },
                name_span,
            ));
        }
        self.expect(TokenKind::RParen)?;
        self.declare(name.clone(), var_ty.clone(), name_span)?;
        self.loop_depth += 1;
        let body = self.parse_embedded_body();
        self.loop_depth -= 1;
        Ok(Expr::Foreach {
            var: name,
            var_ty,
            collection: Box::new(collection),
            body: Box::new(body?),
            kind,
        })
    }

    fn enumeration_of(
        &self,
        ty: &Ty,
        span: Span,
    ) -> Result<(crate::ast::IterKind, Ty), ParseError> {
        use crate::ast::IterKind;
        match ty {
            Ty::Array(elem) => Ok((IterKind::Array, (**elem).clone())),
            Ty::Str => Ok((IterKind::Str, Ty::Char)),
            Ty::Object(tref) => match self.host.element_ty(*tref) {
                Some(elem) => Ok((IterKind::Host, elem)),
                None => Err(self.sem(
                    ResolveError::NotEnumerable {
                        type_name: self.host.type_name(*tref).to_string(),
                    },
                    span,
                )),
            },
            other => Err(self.sem(
                ResolveError::NotEnumerable { type_name: other.to_string() },
                span,
            )),
        }
    }

    // ---- shared member-chain helpers ----

    /// Whether a type's values copy on member reads.
    pub(crate) fn copies_out(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Object(t) if self.host.is_value_type(*t))
    }

    /// Split a member chain into the receiver of its last link plus
    /// that link's member; used by event accessors.
    pub(crate) fn chain_receiver(
        root: &MemberRoot,
        links: &[crate::ast::MemberLink],
    ) -> (Option<Expr>, MemberRef) {
        let last = links.last().expect("member chain cannot be empty");
        let receiver = if links.len() == 1 {
            match root {
                MemberRoot::Static(_) => None,
                MemberRoot::Value(e) => Some((**e).clone()),
            }
        } else {
            Some(Expr::MemberChain {
                root: root.clone(),
                links: links[..links.len() - 1].to_vec(),
                assignable: false,
            })
        };
        (receiver, last.member)
    }

    /// The delegate type behind a value, if it has one.
    pub(crate) fn delegate_tref(&self, ty: &Ty) -> Option<TypeRef> {
        match ty {
            Ty::Object(t) if self.host.delegate_signature(*t).is_some() => Some(*t),
            _ => None,
        }
    }
}
