//! Operand parsing and semantic resolution for expressions.

use ecow::EcoString;
use tracing::debug;

use crate::ast::{BinOp, Expr, LogicOp, MemberLink, MemberRoot, UnaryOp};
use crate::host::value::{Ty, TypeRef, Value};
use crate::host::{MemberKind, MemberRef, Signature};
use crate::lexer::token::{IntKind, Kw, Span, Token, TokenKind};
use crate::resolver::overload::{pick_overload, Candidate, OverloadFailure};
use crate::resolver::{self, promote, CastKind, ResolveError};
use crate::suggest::SuggestContext;

use super::grammar::{self, prec, Infix, Prefix};
use super::{MethodGroup, Operand, ParseError, ParseErrorKind, Parser};

impl<'a> Parser<'a> {
    /// Parse an operand and require a non-void value.
    pub(crate) fn parse_value(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let span = self.peek().span;
        let operand = self.parse_operand(min_prec)?;
        let expr = self.value_of(operand, span)?;
        self.non_void(expr, span)
    }

    pub(crate) fn value_of(&self, operand: Operand<'a>, span: Span) -> Result<Expr, ParseError> {
        match operand {
            Operand::Value(e) => Ok(e),
            other => Err(self.sem(ResolveError::NotAValue { what: other.describe() }, span)),
        }
    }

    pub(crate) fn non_void(&self, expr: Expr, span: Span) -> Result<Expr, ParseError> {
        if matches!(expr.ty(), Ty::Void) {
            return Err(self.sem(ResolveError::VoidValue, span));
        }
        Ok(expr)
    }

    /// Precedence climbing: parse a prefix operand, then fold in every
    /// infix whose rule binds tighter than `min_prec`.
    pub(crate) fn parse_operand(&mut self, min_prec: u8) -> Result<Operand<'a>, ParseError> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let rule = grammar::rule_for(&self.peek().kind);
            let Some(infix) = rule.infix else { break };
            if rule.precedence <= min_prec {
                break;
            }
            lhs = self.parse_infix(infix, rule.rhs_precedence(), lhs)?;
        }
        Ok(lhs)
    }

    // ---- prefix positions ----

    fn parse_prefix(&mut self) -> Result<Operand<'a>, ParseError> {
        let rule = grammar::rule_for(&self.peek().kind);
        let Some(prefix) = rule.prefix else {
            return Err(self.unexpected("an expression"));
        };
        match prefix {
            Prefix::Literal => self.parse_literal(),
            Prefix::LiteralKw => self.parse_literal_kw(),
            Prefix::Ident => self.parse_identifier(),
            Prefix::TypeKw => {
                let tok = self.advance();
                let TokenKind::Kw(kw) = tok.kind else { unreachable!() };
                Ok(Operand::Type(kw.primitive_ty().expect("type keyword")))
            }
            Prefix::Group => self.parse_group(),
            Prefix::Unary => self.parse_unary(),
            Prefix::IncDec => {
                let tok = self.advance();
                let inc = matches!(tok.kind, TokenKind::PlusPlus);
                let span = self.peek().span;
                let operand = self.parse_operand(prec::UNARY)?;
                let target = self.value_of(operand, span)?;
                Ok(Operand::Value(self.build_incdec(target, inc, false, tok.span)?))
            }
            Prefix::New => self.parse_new(),
        }
    }

    fn parse_literal(&mut self) -> Result<Operand<'a>, ParseError> {
        let tok = self.advance();
        let (value, ty) = match tok.kind {
            TokenKind::Int { value, kind } => match kind {
                IntKind::I32 => (Value::I32(value as i32), Ty::I32),
                IntKind::U32 => (Value::U32(value as u32), Ty::U32),
                IntKind::I64 => (Value::I64(value as i64), Ty::I64),
                IntKind::U64 => (Value::U64(value), Ty::U64),
            },
            TokenKind::Float { value, single } => {
                if single {
                    (Value::F32(value as f32), Ty::F32)
                } else {
                    (Value::F64(value), Ty::F64)
                }
            }
            TokenKind::Str { value, terminated } => {
                if !terminated {
                    return Err(ParseError::new(
                        ParseErrorKind::Unterminated { what: "string" },
                        tok.span,
                    ));
                }
                (Value::Str(value), Ty::Str)
            }
            TokenKind::CharLit { value, terminated } => {
                if !terminated {
                    return Err(ParseError::new(
                        ParseErrorKind::Unterminated { what: "character" },
                        tok.span,
                    ));
                }
                (Value::Char(value), Ty::Char)
            }
            _ => unreachable!("literal rule on non-literal token"),
        };
        Ok(Operand::Value(Expr::Literal { value, ty }))
    }

    fn parse_literal_kw(&mut self) -> Result<Operand<'a>, ParseError> {
        let tok = self.advance();
        let (value, ty) = match tok.kind {
            TokenKind::Kw(Kw::True) => (Value::Bool(true), Ty::Bool),
            TokenKind::Kw(Kw::False) => (Value::Bool(false), Ty::Bool),
            TokenKind::Kw(Kw::Null) => (Value::Null, Ty::Null),
            _ => unreachable!("literal keyword rule"),
        };
        Ok(Operand::Value(Expr::Literal { value, ty }))
    }

    fn parse_identifier(&mut self) -> Result<Operand<'a>, ParseError> {
        let (name, span) = self.expect_ident()?;
        if self.touches_cursor(span) {
            let locals = self.visible_locals();
            self.record_probe(SuggestContext::Identifiers { prefix: name.clone(), span, locals });
        }
        if let Some(ty) = self.lookup_local(&name) {
            return Ok(Operand::Value(Expr::LocalRead { name, ty: ty.clone() }));
        }
        let table = self.table;
        match table.resolve(&name, &self.opts.using_namespaces) {
            Some(node) => self.node_operand(node, name, span),
            None => Err(self.sem(ResolveError::UnknownIdentifier { name }, span)),
        }
    }

    /// Turn a symbol-table node into a type or namespace operand,
    /// consuming a generic argument list when one applies.
    fn node_operand(
        &mut self,
        node: &'a crate::symbols::SymbolNode,
        name: EcoString,
        span: Span,
    ) -> Result<Operand<'a>, ParseError> {
        let generics: Vec<TypeRef> = node
            .types()
            .iter()
            .copied()
            .filter(|t| self.host.generic_arity(*t) > 0)
            .collect();
        if matches!(self.peek().kind, TokenKind::Lt) && !generics.is_empty() {
            let arity = self.host.generic_arity(generics[0]);
            let args = self.parse_generic_args(&name, arity)?;
            let def = generics
                .iter()
                .copied()
                .find(|t| self.host.generic_arity(*t) == args.len())
                .ok_or_else(|| {
                    self.sem(
                        ResolveError::GenericArity {
                            name: name.clone(),
                            expected: arity,
                            got: args.len(),
                        },
                        span,
                    )
                })?;
            let bound = self
                .host
                .bind_generic(def, &args)
                .map_err(|_| self.sem(ResolveError::UnknownType { name: name.clone() }, span))?;
            return Ok(Operand::Type(Ty::Object(bound)));
        }
        if let Some(t) = node
            .types()
            .iter()
            .copied()
            .find(|t| self.host.generic_arity(*t) == 0)
        {
            return Ok(Operand::Type(Ty::Object(t)));
        }
        if node.is_namespace() {
            return Ok(Operand::Namespace(node));
        }
        let expected = node
            .types()
            .first()
            .map(|t| self.host.generic_arity(*t))
            .unwrap_or(0);
        Err(self.sem(ResolveError::GenericArity { name, expected, got: 0 }, span))
    }

    fn parse_generic_args(
        &mut self,
        type_name: &EcoString,
        arity: usize,
    ) -> Result<Vec<Ty>, ParseError> {
        let lt = self.expect(TokenKind::Lt)?;
        if self.touches_cursor(lt.span) {
            let at = lt.span.end;
            self.record_probe(SuggestContext::GenericArgs {
                type_name: type_name.clone(),
                arity,
                index: 0,
                span: Span::new(at, at),
            });
        }
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type_operand()?);
            match self.peek().kind {
                TokenKind::Comma => {
                    let comma = self.advance();
                    if self.touches_cursor(comma.span) {
                        let at = comma.span.end;
                        self.record_probe(SuggestContext::GenericArgs {
                            type_name: type_name.clone(),
                            arity,
                            index: args.len(),
                            span: Span::new(at, at),
                        });
                    }
                }
                TokenKind::Gt => {
                    self.advance();
                    break;
                }
                TokenKind::Shr => {
                    // `>>` closes two nested lists: consume one `>` and
                    // push the other back for the enclosing list.
                    let tok = self.advance();
                    self.push_back(Token {
                        kind: TokenKind::Gt,
                        span: Span::new(tok.span.start + 1, tok.span.end),
                        line: tok.line,
                    });
                    break;
                }
                _ => return Err(self.unexpected("',' or '>'")),
            }
        }
        Ok(args)
    }

    /// Parse an operand that must denote a type.
    pub(crate) fn parse_type_operand(&mut self) -> Result<Ty, ParseError> {
        let span = self.peek().span;
        let operand = self.parse_operand(prec::UNARY)?;
        match operand {
            Operand::Type(ty) => Ok(ty),
            other => Err(ParseError::new(
                ParseErrorKind::UnexpectedToken {
                    expected: "a type name".to_string(),
                    found: other.describe(),
                },
                span,
            )),
        }
    }

    /// `( ... )`: a parenthesized expression, or a cast when the inside
    /// denotes a type.
    fn parse_group(&mut self) -> Result<Operand<'a>, ParseError> {
        let lparen = self.advance();
        let inner = self.parse_operand(prec::NONE)?;
        self.expect(TokenKind::RParen)?;
        match inner {
            Operand::Type(to) => {
                let span = self.peek().span;
                let operand = self.parse_operand(prec::UNARY)?;
                let value = self.value_of(operand, span)?;
                let value = self.non_void(value, span)?;
                Ok(Operand::Value(self.apply_cast(to, value, lparen.span)?))
            }
            other => Ok(other),
        }
    }

    fn apply_cast(&self, to: Ty, value: Expr, span: Span) -> Result<Expr, ParseError> {
        let from = value.ty();
        match resolver::classify_cast(self.host, &from, &to) {
            None => Err(self.sem(ResolveError::InvalidConversion { from, to }, span)),
            Some(CastKind::Identity) => Ok(value),
            Some(CastKind::Numeric) => Ok(Expr::Convert { value: Box::new(value), to }),
            Some(CastKind::Up) => Ok(Expr::UpCast { value: Box::new(value), to }),
            Some(CastKind::Down) => Ok(Expr::DownCast { value: Box::new(value), to }),
        }
    }

    fn parse_unary(&mut self) -> Result<Operand<'a>, ParseError> {
        let tok = self.advance();
        let op = match tok.kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => unreachable!("unary rule on non-unary token"),
        };
        let span = self.peek().span;
        let operand = self.parse_operand(prec::UNARY)?;
        let value = self.value_of(operand, span)?;
        let value = self.non_void(value, span)?;
        Ok(Operand::Value(self.resolve_unary(op, value, tok.span)?))
    }

    fn resolve_unary(&mut self, op: UnaryOp, operand: Expr, span: Span) -> Result<Expr, ParseError> {
        let ty = operand.ty();
        if matches!(op, UnaryOp::Not) && ty == Ty::Bool {
            return Ok(Expr::Unary { op, operand: Box::new(operand), ty: Ty::Bool });
        }
        if matches!(op, UnaryOp::Neg) {
            if let Expr::Literal { value, .. } = &operand {
                if let Some(folded) = fold_negate(value) {
                    return Ok(folded);
                }
            }
        }
        if matches!(ty, Ty::Object(_)) {
            let name = resolver::unary_op_method(op);
            let candidates = self.operator_candidates(name, &[&ty]);
            if !candidates.is_empty() {
                let choice = pick_overload(self.host, &candidates, std::slice::from_ref(&ty))
                    .map_err(|f| self.overload_err(f, name.into(), span))?;
                let arg = self.convert_to(operand, &choice.param_tys[0]);
                return Ok(Expr::OperatorCall {
                    member: choice.member,
                    args: vec![arg],
                    ret: choice.ret,
                });
            }
        }
        let promoted = promote::promote_unary(op, &ty).map_err(|e| self.sem(e, span))?;
        let operand = self.convert_to(operand, &promoted);
        Ok(Expr::Unary { op, operand: Box::new(operand), ty: promoted })
    }

    // ---- infix positions ----

    fn parse_infix(
        &mut self,
        infix: Infix,
        rhs_prec: u8,
        lhs: Operand<'a>,
    ) -> Result<Operand<'a>, ParseError> {
        match infix {
            Infix::Member => self.parse_member(lhs),
            Infix::Call => self.finish_call(lhs),
            Infix::Index => self.finish_index(lhs),
            Infix::IncDec => {
                let tok = self.advance();
                let inc = matches!(tok.kind, TokenKind::PlusPlus);
                let target = self.value_of(lhs, tok.span)?;
                Ok(Operand::Value(self.build_incdec(target, inc, true, tok.span)?))
            }
            Infix::Binary => {
                let tok = self.advance();
                let op = bin_op_for(&tok.kind);
                let lhs_expr = self.value_of(lhs, tok.span)?;
                let lhs_expr = self.non_void(lhs_expr, tok.span)?;
                let rhs_span = self.peek().span;
                let rhs = self.parse_operand(rhs_prec)?;
                let rhs = self.value_of(rhs, rhs_span)?;
                let rhs = self.non_void(rhs, rhs_span)?;
                Ok(Operand::Value(self.resolve_binary(op, lhs_expr, rhs, tok.span)?))
            }
            Infix::Logical => {
                let tok = self.advance();
                let op = if matches!(tok.kind, TokenKind::AmpAmp) {
                    LogicOp::And
                } else {
                    LogicOp::Or
                };
                let lhs_expr = self.value_of(lhs, tok.span)?;
                let lhs_expr = self.non_void(lhs_expr, tok.span)?;
                let rhs_span = self.peek().span;
                let rhs = self.parse_value(rhs_prec)?;
                if lhs_expr.ty() != Ty::Bool || rhs.ty() != Ty::Bool {
                    let sym = if matches!(op, LogicOp::And) { "&&" } else { "||" };
                    return Err(self.sem(
                        ResolveError::InvalidOperands {
                            op: sym,
                            lhs: lhs_expr.ty(),
                            rhs: rhs.ty(),
                        },
                        tok.span,
                    ));
                }
                let _ = rhs_span;
                Ok(Operand::Value(Expr::Logical {
                    op,
                    lhs: Box::new(lhs_expr),
                    rhs: Box::new(rhs),
                }))
            }
            Infix::Conditional => self.parse_conditional(lhs, rhs_prec),
            Infix::Assign => {
                let tok = self.advance();
                let target = self.value_of(lhs, tok.span)?;
                let rhs_span = self.peek().span;
                let value = self.parse_operand(rhs_prec)?;
                Ok(Operand::Value(self.build_assign(target, value, rhs_span, tok.span)?))
            }
            Infix::CompoundAssign => {
                let tok = self.advance();
                let op = compound_op_for(&tok.kind);
                let target = self.value_of(lhs, tok.span)?;
                let rhs_span = self.peek().span;
                let value = self.parse_operand(rhs_prec)?;
                Ok(Operand::Value(
                    self.build_compound(target, op, value, rhs_span, tok.span)?,
                ))
            }
            Infix::TypeTest => {
                let tok = self.advance();
                let value = self.value_of(lhs, tok.span)?;
                let value = self.non_void(value, tok.span)?;
                let ty = self.parse_type_operand()?;
                self.build_type_test(tok, value, ty)
            }
        }
    }

    fn parse_conditional(
        &mut self,
        lhs: Operand<'a>,
        rhs_prec: u8,
    ) -> Result<Operand<'a>, ParseError> {
        let q = self.advance();
        let cond = self.value_of(lhs, q.span)?;
        if cond.ty() != Ty::Bool {
            return Err(self.sem(
                ResolveError::InvalidConversion { from: cond.ty(), to: Ty::Bool },
                q.span,
            ));
        }
        let then_e = self.parse_value(prec::NONE)?;
        self.expect(TokenKind::Colon)?;
        let else_span = self.peek().span;
        let else_e = self.parse_value(rhs_prec)?;

        let tt = then_e.ty();
        let et = else_e.ty();
        let (then_e, else_e, ty) = if tt == et {
            (then_e, else_e, tt)
        } else if resolver::implicit_convertible(self.host, &et, &tt) {
            let else_e = self.convert_to(else_e, &tt);
            (then_e, else_e, tt)
        } else if resolver::implicit_convertible(self.host, &tt, &et) {
            let then_e = self.convert_to(then_e, &et);
            (then_e, else_e, et)
        } else {
            return Err(self.sem(ResolveError::InvalidConversion { from: et, to: tt }, else_span));
        };
        Ok(Operand::Value(Expr::Conditional {
            cond: Box::new(cond),
            then_branch: Box::new(then_e),
            else_branch: Box::new(else_e),
            ty,
        }))
    }

    // ---- member access ----

    fn member_options(&self, operand: &Operand<'a>) -> Vec<EcoString> {
        match operand {
            Operand::Namespace(node) => node.child_names(),
            Operand::Type(Ty::Object(t)) => self.host.member_names(*t, true, self.safe_mode()),
            Operand::Value(e) => match e.ty() {
                Ty::Object(t) => self.host.member_names(t, false, self.safe_mode()),
                Ty::Array(_) | Ty::Str => vec!["Length".into()],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn parse_member(&mut self, lhs: Operand<'a>) -> Result<Operand<'a>, ParseError> {
        let dot = self.advance();
        if self.touches_cursor(dot.span) {
            let names = self.member_options(&lhs);
            let at = dot.span.end;
            self.record_probe(SuggestContext::Members {
                prefix: EcoString::new(),
                span: Span::new(at, at),
                names,
            });
        }
        let (name, span) = self.expect_ident()?;
        if self.touches_cursor(span) {
            let names = self.member_options(&lhs);
            self.record_probe(SuggestContext::Members { prefix: name.clone(), span, names });
        }
        match lhs {
            Operand::Namespace(node) => match node.child(&name) {
                Some(child) => self.node_operand(child, name, span),
                None => Err(self.sem(
                    ResolveError::UnknownMember {
                        type_name: node.name().to_string(),
                        name,
                    },
                    span,
                )),
            },
            Operand::Type(Ty::Object(tref)) => self.resolve_static_member(tref, name, span),
            Operand::Type(ty) => Err(self.sem(
                ResolveError::UnknownMember { type_name: ty.to_string(), name },
                span,
            )),
            Operand::Value(recv) => self.resolve_value_member(recv, name, span),
            Operand::Group(g) => Err(self.sem(
                ResolveError::NotAValue { what: format!("method group `{}`", g.name) },
                span,
            )),
        }
    }

    fn resolve_static_member(
        &mut self,
        tref: TypeRef,
        name: EcoString,
        span: Span,
    ) -> Result<Operand<'a>, ParseError> {
        let members = self.host.find_members(tref, &name, true, self.safe_mode());
        let Some(&first) = members.first() else {
            return Err(self.sem(
                ResolveError::UnknownMember {
                    type_name: self.host.type_name(tref).to_string(),
                    name,
                },
                span,
            ));
        };
        match self.host.member_kind(first) {
            MemberKind::Method => Ok(Operand::Group(MethodGroup {
                receiver: None,
                name,
                candidates: members,
                span,
            })),
            MemberKind::NestedType => Ok(Operand::Type(self.host.member_ty(first))),
            MemberKind::Field | MemberKind::Property | MemberKind::Event => {
                Ok(Operand::Value(self.chain_from(MemberRoot::Static(tref), None, first)))
            }
            MemberKind::Constructor => Err(self.sem(
                ResolveError::UnknownMember {
                    type_name: self.host.type_name(tref).to_string(),
                    name,
                },
                span,
            )),
        }
    }

    fn resolve_value_member(
        &mut self,
        recv: Expr,
        name: EcoString,
        span: Span,
    ) -> Result<Operand<'a>, ParseError> {
        let rty = recv.ty();
        match &rty {
            Ty::Array(_) if name == "Length" => {
                Ok(Operand::Value(Expr::ArrayLength { target: Box::new(recv) }))
            }
            Ty::Str if name == "Length" => {
                Ok(Operand::Value(Expr::StrLength { target: Box::new(recv) }))
            }
            Ty::Object(tref) => {
                let members = self.host.find_members(*tref, &name, false, self.safe_mode());
                let Some(&first) = members.first() else {
                    return Err(self.sem(
                        ResolveError::UnknownMember {
                            type_name: self.host.type_name(*tref).to_string(),
                            name,
                        },
                        span,
                    ));
                };
                match self.host.member_kind(first) {
                    MemberKind::Method => Ok(Operand::Group(MethodGroup {
                        receiver: Some(recv),
                        name,
                        candidates: members,
                        span,
                    })),
                    MemberKind::Field | MemberKind::Property | MemberKind::Event => {
                        // Extend an existing chain so that writes through
                        // value-type links can be stored back.
                        let chain = match recv {
                            Expr::MemberChain { root, links, .. } => {
                                self.chain_from(root, Some(links), first)
                            }
                            other => self
                                .chain_from(MemberRoot::Value(Box::new(other)), None, first),
                        };
                        Ok(Operand::Value(chain))
                    }
                    _ => Err(self.sem(
                        ResolveError::UnknownMember {
                            type_name: self.host.type_name(*tref).to_string(),
                            name,
                        },
                        span,
                    )),
                }
            }
            other => Err(self.sem(
                ResolveError::UnknownMember { type_name: other.to_string(), name },
                span,
            )),
        }
    }

    fn chain_from(
        &self,
        root: MemberRoot,
        links: Option<Vec<MemberLink>>,
        member: MemberRef,
    ) -> Expr {
        let ty = self.host.member_ty(member);
        let copy_out = self.copies_out(&ty);
        let kind = self.host.member_kind(member);
        let assignable = matches!(kind, MemberKind::Field | MemberKind::Property)
            && self.host.can_write(member);
        let mut links = links.unwrap_or_default();
        links.push(MemberLink { member, ty, copy_out });
        Expr::MemberChain { root, links, assignable }
    }

    // ---- calls ----

    fn finish_call(&mut self, lhs: Operand<'a>) -> Result<Operand<'a>, ParseError> {
        match lhs {
            Operand::Group(group) => self.call_group(group),
            Operand::Value(target) => {
                if let Some(tref) = self.delegate_tref(&target.ty()) {
                    return self.call_delegate(target, tref);
                }
                let ty = target.ty();
                Err(self.sem(ResolveError::NotInvokable { ty }, self.peek().span))
            }
            Operand::Type(ty) => Err(self.sem(ResolveError::NotInvokable { ty }, self.peek().span)),
            Operand::Namespace(node) => Err(self.sem(
                ResolveError::NotAValue { what: format!("namespace `{}`", node.name()) },
                self.peek().span,
            )),
        }
    }

    fn call_group(&mut self, group: MethodGroup) -> Result<Operand<'a>, ParseError> {
        let candidates: Vec<Candidate> = group
            .candidates
            .iter()
            .filter_map(|&m| self.host.signature(m).map(|sig| Candidate { member: m, sig }))
            .collect();
        let sigs: Vec<Signature> = candidates.iter().map(|c| c.sig.clone()).collect();
        let (args, spans) = self.parse_call_args(Some((&group.name, &sigs)))?;
        let arg_tys = self.argument_tys(&args, &spans)?;
        let choice = pick_overload(self.host, &candidates, &arg_tys)
            .map_err(|f| self.overload_err(f, group.name.clone(), group.span))?;
        debug!(method = %group.name, picked = choice.index, "overload selected");
        let args = self.coerce_args(args, &choice.param_tys, &spans)?;
        Ok(Operand::Value(Expr::MethodCall {
            receiver: group.receiver.map(Box::new),
            member: choice.member,
            args,
            ret: choice.ret,
        }))
    }

    fn call_delegate(&mut self, target: Expr, tref: TypeRef) -> Result<Operand<'a>, ParseError> {
        let sig = self.host.delegate_signature(tref).expect("delegate type");
        let name = self.host.type_name(tref);
        let call_span = self.peek().span;
        let sigs = vec![sig.clone()];
        let (args, spans) = self.parse_call_args(Some((&name, &sigs)))?;
        let arg_tys = self.argument_tys(&args, &spans)?;
        // A one-element candidate list reuses the overload machinery for
        // arity and conversion checking; the member ref is never used.
        let candidates = vec![Candidate { member: MemberRef(u64::MAX), sig }];
        let choice = pick_overload(self.host, &candidates, &arg_tys)
            .map_err(|f| self.overload_err(f, name, call_span))?;
        let args = self.coerce_args(args, &choice.param_tys, &spans)?;
        Ok(Operand::Value(Expr::DelegateInvoke {
            target: Box::new(target),
            args,
            ret: choice.ret,
        }))
    }

    fn coerce_args(
        &mut self,
        args: Vec<Operand<'a>>,
        targets: &[Ty],
        spans: &[Span],
    ) -> Result<Vec<Expr>, ParseError> {
        let mut out = Vec::with_capacity(args.len());
        for ((arg, target), span) in args.into_iter().zip(targets).zip(spans) {
            out.push(self.coerce_assign(arg, target, *span)?);
        }
        Ok(out)
    }

    fn argument_tys(&self, args: &[Operand<'a>], spans: &[Span]) -> Result<Vec<Ty>, ParseError> {
        args.iter()
            .zip(spans)
            .map(|(op, span)| match op {
                Operand::Value(e) => {
                    let ty = e.ty();
                    if matches!(ty, Ty::Void) {
                        Err(self.sem(ResolveError::VoidValue, *span))
                    } else {
                        Ok(ty)
                    }
                }
                // A method group argument matches parameters the way a
                // null literal does and is bound precisely during
                // conversion.
                Operand::Group(_) => Ok(Ty::Null),
                other => Err(self.sem(ResolveError::NotAValue { what: other.describe() }, *span)),
            })
            .collect()
    }

    fn parse_call_args(
        &mut self,
        probe_info: Option<(&EcoString, &[Signature])>,
    ) -> Result<(Vec<Operand<'a>>, Vec<Span>), ParseError> {
        let lparen = self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut spans = Vec::new();
        self.probe_call_site(&lparen, &probe_info, &args);
        if !matches!(self.peek().kind, TokenKind::RParen) {
            loop {
                spans.push(self.peek().span);
                args.push(self.parse_operand(prec::NONE)?);
                match self.peek().kind {
                    TokenKind::Comma => {
                        let comma = self.advance();
                        self.probe_call_site(&comma, &probe_info, &args);
                    }
                    TokenKind::RParen => break,
                    _ => return Err(self.unexpected("',' or ')'")),
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok((args, spans))
    }

    fn probe_call_site(
        &mut self,
        consumed: &Token,
        probe_info: &Option<(&EcoString, &[Signature])>,
        args: &[Operand<'a>],
    ) {
        let Some((name, sigs)) = probe_info else { return };
        if !self.touches_cursor(consumed.span) {
            return;
        }
        let arg_tys = args
            .iter()
            .map(|op| match op {
                Operand::Value(e) => e.ty(),
                _ => Ty::Null,
            })
            .collect();
        let at = consumed.span.end;
        self.record_probe(SuggestContext::Overloads {
            name: (*name).clone(),
            span: Span::new(at, at),
            signatures: sigs.to_vec(),
            arg_tys,
        });
    }

    // ---- indexing ----

    fn finish_index(&mut self, lhs: Operand<'a>) -> Result<Operand<'a>, ParseError> {
        let lbracket = self.advance();
        if let Operand::Type(ty) = &lhs {
            if matches!(self.peek().kind, TokenKind::RBracket) {
                self.advance();
                return Ok(Operand::Type(Ty::Array(Box::new(ty.clone()))));
            }
        }
        let mut indexes = Vec::new();
        let mut spans = Vec::new();
        loop {
            spans.push(self.peek().span);
            indexes.push(self.parse_value(prec::NONE)?);
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBracket => break,
                _ => return Err(self.unexpected("',' or ']'")),
            }
        }
        self.expect(TokenKind::RBracket)?;
        match lhs {
            Operand::Value(target) => self.resolve_index(target, indexes, &spans, lbracket.span),
            Operand::Type(ty) => Err(self.sem(ResolveError::NotIndexable { ty }, lbracket.span)),
            other => Err(self.sem(
                ResolveError::NotAValue { what: other.describe() },
                lbracket.span,
            )),
        }
    }

    fn resolve_index(
        &mut self,
        target: Expr,
        mut indexes: Vec<Expr>,
        spans: &[Span],
        span: Span,
    ) -> Result<Operand<'a>, ParseError> {
        let tty = target.ty();
        match &tty {
            Ty::Array(elem) => {
                if indexes.len() != 1 {
                    return Err(self.sem(ResolveError::NotIndexable { ty: tty.clone() }, span));
                }
                let index = self.int_index(indexes.pop().expect("one index"), spans[0])?;
                Ok(Operand::Value(Expr::ArrayIndex {
                    target: Box::new(target),
                    index: Box::new(index),
                    elem: (**elem).clone(),
                }))
            }
            Ty::Str => {
                if indexes.len() != 1 {
                    return Err(self.sem(ResolveError::NotIndexable { ty: tty.clone() }, span));
                }
                let index = self.int_index(indexes.pop().expect("one index"), spans[0])?;
                Ok(Operand::Value(Expr::StringIndex {
                    target: Box::new(target),
                    index: Box::new(index),
                }))
            }
            Ty::Object(tref) => {
                let candidates: Vec<Candidate> = self
                    .host
                    .indexers(*tref, self.safe_mode())
                    .into_iter()
                    .filter_map(|m| self.host.signature(m).map(|sig| Candidate { member: m, sig }))
                    .collect();
                if candidates.is_empty() {
                    return Err(self.sem(ResolveError::NotIndexable { ty: tty.clone() }, span));
                }
                let arg_tys: Vec<Ty> = indexes.iter().map(Expr::ty).collect();
                let name: EcoString = self.host.type_name(*tref);
                let choice = pick_overload(self.host, &candidates, &arg_tys)
                    .map_err(|f| self.overload_err(f, name, span))?;
                let mut args = Vec::with_capacity(indexes.len());
                for ((e, target_ty), s) in indexes.into_iter().zip(&choice.param_tys).zip(spans) {
                    let from = e.ty();
                    if from == *target_ty {
                        args.push(e);
                    } else if resolver::implicit_convertible(self.host, &from, target_ty) {
                        args.push(self.convert_to(e, target_ty));
                    } else {
                        return Err(self.sem(
                            ResolveError::InvalidConversion { from, to: target_ty.clone() },
                            *s,
                        ));
                    }
                }
                Ok(Operand::Value(Expr::IndexerGet {
                    receiver: Box::new(target),
                    member: choice.member,
                    args,
                    ret: choice.ret,
                }))
            }
            other => Err(self.sem(ResolveError::NotIndexable { ty: other.clone() }, span)),
        }
    }

    fn int_index(&self, index: Expr, span: Span) -> Result<Expr, ParseError> {
        let ty = index.ty();
        if ty == Ty::I32 {
            return Ok(index);
        }
        if resolver::implicit_convertible(self.host, &ty, &Ty::I32) {
            return Ok(self.convert_to(index, &Ty::I32));
        }
        Err(self.sem(ResolveError::InvalidConversion { from: ty, to: Ty::I32 }, span))
    }

    // ---- assignment ----

    fn check_assignable(&self, target: &Expr, span: Span) -> Result<(), ParseError> {
        if let Expr::IndexerGet { member, .. } = target {
            if !self.host.can_write(*member) {
                return Err(self.sem(ResolveError::ReadOnlyMember, span));
            }
            return Ok(());
        }
        if target.is_assignable() {
            Ok(())
        } else {
            Err(self.sem(ResolveError::NotAssignable, span))
        }
    }

    fn build_assign(
        &mut self,
        target: Expr,
        value: Operand<'a>,
        value_span: Span,
        op_span: Span,
    ) -> Result<Expr, ParseError> {
        self.check_assignable(&target, op_span)?;
        let value = self.coerce_assign(value, &target.ty(), value_span)?;
        Ok(Expr::Assign { target: Box::new(target), value: Box::new(value) })
    }

    /// Convert an operand for storage into a slot of type `to`.
    /// Method groups become delegate values when `to` is a delegate type.
    pub(crate) fn coerce_assign(
        &mut self,
        value: Operand<'a>,
        to: &Ty,
        span: Span,
    ) -> Result<Expr, ParseError> {
        match value {
            Operand::Group(group) => self.group_to_delegate(group, to, span),
            Operand::Value(e) => {
                let from = e.ty();
                if matches!(from, Ty::Void) {
                    return Err(self.sem(ResolveError::VoidValue, span));
                }
                if from == *to {
                    return Ok(e);
                }
                if resolver::implicit_convertible(self.host, &from, to) {
                    return Ok(self.convert_to(e, to));
                }
                Err(self.sem(ResolveError::InvalidConversion { from, to: to.clone() }, span))
            }
            other => Err(self.sem(ResolveError::NotAValue { what: other.describe() }, span)),
        }
    }

    fn group_to_delegate(
        &mut self,
        group: MethodGroup,
        to: &Ty,
        span: Span,
    ) -> Result<Expr, ParseError> {
        let Some(tref) = self.delegate_tref(to) else {
            return Err(self.sem(
                ResolveError::NotAValue { what: format!("method group `{}`", group.name) },
                span,
            ));
        };
        let sig = self.host.delegate_signature(tref).expect("delegate type");
        let chosen = group.candidates.iter().copied().find(|&m| {
            self.host.signature(m).is_some_and(|s| {
                s.ret == sig.ret
                    && s.params.len() == sig.params.len()
                    && s.params.iter().zip(&sig.params).all(|(a, b)| a.ty == b.ty)
            })
        });
        match chosen {
            Some(member) => Ok(Expr::DelegateNew {
                receiver: group.receiver.map(Box::new),
                member,
                ty: tref,
            }),
            None => Err(self.sem(ResolveError::NoOverload { name: group.name }, span)),
        }
    }

    fn build_compound(
        &mut self,
        target: Expr,
        op: BinOp,
        value: Operand<'a>,
        value_span: Span,
        op_span: Span,
    ) -> Result<Expr, ParseError> {
        // Events route `+=`/`-=` through their accessors.
        if let Expr::MemberChain { root, links, .. } = &target {
            let last = links.last().expect("member chain cannot be empty");
            if matches!(self.host.member_kind(last.member), MemberKind::Event) {
                let (receiver, member) = Self::chain_receiver(root, links);
                let handler_ty = last.ty.clone();
                let handler = self.coerce_assign(value, &handler_ty, value_span)?;
                return match op {
                    BinOp::Add => Ok(Expr::EventAdd {
                        receiver: receiver.map(Box::new),
                        member,
                        handler: Box::new(handler),
                    }),
                    BinOp::Sub => Ok(Expr::EventRemove {
                        receiver: receiver.map(Box::new),
                        member,
                        handler: Box::new(handler),
                    }),
                    _ => Err(self.sem(
                        ResolveError::InvalidOperands {
                            op: op.symbol(),
                            lhs: handler_ty,
                            rhs: Ty::Null,
                        },
                        op_span,
                    )),
                };
            }
        }
        self.check_assignable(&target, op_span)?;
        let tty = target.ty();

        // Delegate lists combine and split through assignment.
        if self.delegate_tref(&tty).is_some() && matches!(op, BinOp::Add | BinOp::Sub) {
            let handler = self.coerce_assign(value, &tty, value_span)?;
            let combined = if matches!(op, BinOp::Add) {
                Expr::DelegateCombine {
                    lhs: Box::new(target.clone()),
                    rhs: Box::new(handler),
                    ty: tty,
                }
            } else {
                Expr::DelegateRemove {
                    lhs: Box::new(target.clone()),
                    rhs: Box::new(handler),
                    ty: tty,
                }
            };
            return Ok(Expr::Assign { target: Box::new(target), value: Box::new(combined) });
        }

        if matches!(tty, Ty::Str) && matches!(op, BinOp::Add) {
            let rhs = self.value_of(value, value_span)?;
            let rhs = self.non_void(rhs, value_span)?;
            let concat = Expr::StrConcat { lhs: Box::new(target.clone()), rhs: Box::new(rhs) };
            return Ok(Expr::Assign { target: Box::new(target), value: Box::new(concat) });
        }

        let rhs = self.value_of(value, value_span)?;
        let rhs = self.non_void(rhs, value_span)?;
        let (op_ty, rhs) = self.compound_operand(op, &tty, rhs, op_span)?;
        Ok(Expr::CompoundAssign {
            target: Box::new(target),
            op,
            value: Box::new(rhs),
            op_ty,
            return_previous: false,
        })
    }

    fn compound_operand(
        &mut self,
        op: BinOp,
        target_ty: &Ty,
        rhs: Expr,
        span: Span,
    ) -> Result<(Ty, Expr), ParseError> {
        if matches!(target_ty, Ty::Bool)
            && matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor)
            && rhs.ty() == Ty::Bool
        {
            return Ok((Ty::Bool, rhs));
        }
        if matches!(op, BinOp::Shl | BinOp::Shr) {
            let op_ty =
                promote::promote_shift(op.symbol(), target_ty).map_err(|e| self.sem(e, span))?;
            let rhs = self.int_index(rhs, span)?;
            return Ok((op_ty, rhs));
        }
        let op_ty = promote::promote_binary(op.symbol(), target_ty, &rhs.ty())
            .map_err(|e| self.sem(e, span))?;
        let rhs = self.convert_to(rhs, &op_ty);
        Ok((op_ty, rhs))
    }

    fn build_incdec(
        &mut self,
        target: Expr,
        inc: bool,
        postfix: bool,
        span: Span,
    ) -> Result<Expr, ParseError> {
        self.check_assignable(&target, span)?;
        let ty = target.ty();
        if !ty.is_numeric() {
            return Err(self.sem(
                ResolveError::InvalidUnary { op: if inc { "++" } else { "--" }, ty },
                span,
            ));
        }
        let op_ty = match ty {
            Ty::I8 | Ty::U8 | Ty::I16 | Ty::U16 => Ty::I32,
            other => other,
        };
        Ok(Expr::CompoundAssign {
            target: Box::new(target),
            op: if inc { BinOp::Add } else { BinOp::Sub },
            value: Box::new(one_literal(&op_ty)),
            op_ty,
            return_previous: postfix,
        })
    }

    fn build_type_test(
        &mut self,
        tok: Token,
        value: Expr,
        ty: Ty,
    ) -> Result<Operand<'a>, ParseError> {
        if matches!(tok.kind, TokenKind::Kw(Kw::Is)) {
            return Ok(Operand::Value(Expr::IsTest { value: Box::new(value), of: ty }));
        }
        // `as` needs a reference target so that failure can yield null.
        if !ty.is_reference() {
            return Err(self.sem(
                ResolveError::InvalidConversion { from: value.ty(), to: ty },
                tok.span,
            ));
        }
        Ok(Operand::Value(Expr::AsCast { value: Box::new(value), to: ty }))
    }

    // ---- binary operators ----

    fn resolve_binary(
        &mut self,
        op: BinOp,
        lhs: Expr,
        rhs: Expr,
        span: Span,
    ) -> Result<Expr, ParseError> {
        let lt = lhs.ty();
        let rt = rhs.ty();

        // String concatenation displays the non-string side.
        if matches!(op, BinOp::Add) && (lt == Ty::Str || rt == Ty::Str) {
            return Ok(Expr::StrConcat { lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }

        if lt == Ty::Bool && rt == Ty::Bool {
            if matches!(
                op,
                BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Eq | BinOp::Ne
            ) {
                return Ok(Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    operand_ty: Ty::Bool,
                    ty: Ty::Bool,
                });
            }
            return Err(self.sem(
                ResolveError::InvalidOperands { op: op.symbol(), lhs: lt, rhs: rt },
                span,
            ));
        }

        // Strings compare by contents.
        if lt == Ty::Str && rt == Ty::Str && matches!(op, BinOp::Eq | BinOp::Ne) {
            return Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                operand_ty: Ty::Str,
                ty: Ty::Bool,
            });
        }

        // User-defined operators on host types.
        if matches!(lt, Ty::Object(_)) || matches!(rt, Ty::Object(_)) {
            let name = resolver::binary_op_method(op);
            let candidates = self.operator_candidates(name, &[&lt, &rt]);
            if !candidates.is_empty() {
                let choice =
                    pick_overload(self.host, &candidates, &[lt.clone(), rt.clone()])
                        .map_err(|f| self.overload_err(f, name.into(), span))?;
                let lhs = self.convert_to(lhs, &choice.param_tys[0]);
                let rhs = self.convert_to(rhs, &choice.param_tys[1]);
                return Ok(Expr::OperatorCall {
                    member: choice.member,
                    args: vec![lhs, rhs],
                    ret: choice.ret,
                });
            }
            if let (Some(a), Some(b)) = (self.delegate_tref(&lt), self.delegate_tref(&rt)) {
                if a == b && matches!(op, BinOp::Add | BinOp::Sub) {
                    let node = if matches!(op, BinOp::Add) {
                        Expr::DelegateCombine { lhs: Box::new(lhs), rhs: Box::new(rhs), ty: lt }
                    } else {
                        Expr::DelegateRemove { lhs: Box::new(lhs), rhs: Box::new(rhs), ty: lt }
                    };
                    return Ok(node);
                }
            }
        }

        // Reference identity for `==`/`!=` on compatible reference types.
        if matches!(op, BinOp::Eq | BinOp::Ne)
            && lt.is_reference()
            && rt.is_reference()
            && (resolver::implicit_convertible(self.host, &lt, &rt)
                || resolver::implicit_convertible(self.host, &rt, &lt))
        {
            return Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                operand_ty: Ty::Any,
                ty: Ty::Bool,
            });
        }

        // Shifts promote the left operand only; the count is an int.
        if matches!(op, BinOp::Shl | BinOp::Shr) {
            let op_ty = promote::promote_shift(op.symbol(), &lt).map_err(|e| self.sem(e, span))?;
            let lhs = self.convert_to(lhs, &op_ty);
            let rhs = self.int_index(rhs, span)?;
            return Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                operand_ty: op_ty.clone(),
                ty: op_ty,
            });
        }

        let op_ty = promote::promote_binary(op.symbol(), &lt, &rt).map_err(|e| self.sem(e, span))?;
        if op_ty.is_float() && matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor) {
            return Err(self.sem(
                ResolveError::InvalidOperands { op: op.symbol(), lhs: lt, rhs: rt },
                span,
            ));
        }
        let lhs = self.convert_to(lhs, &op_ty);
        let rhs = self.convert_to(rhs, &op_ty);
        let ty = if op.is_comparison() { Ty::Bool } else { op_ty.clone() };
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            operand_ty: op_ty,
            ty,
        })
    }

    // ---- object construction ----

    fn parse_new(&mut self) -> Result<Operand<'a>, ParseError> {
        self.expect(TokenKind::Kw(Kw::New))?;
        let ty_span = self.peek().span;
        let ty = self.parse_new_type()?;
        match self.peek().kind {
            TokenKind::LParen => self.parse_ctor_call(ty, ty_span),
            TokenKind::LBracket => self.parse_array_new(ty),
            _ => Err(self.unexpected("'(' or '['")),
        }
    }

    /// The type after `new`: a primitive keyword or dotted type path
    /// with optional generic arguments, but no array suffix (the array
    /// form owns its brackets).
    fn parse_new_type(&mut self) -> Result<Ty, ParseError> {
        if let TokenKind::Kw(kw) = self.peek().kind {
            if let Some(ty) = kw.primitive_ty() {
                let tok = self.advance();
                if matches!(ty, Ty::Void) {
                    return Err(self.sem(ResolveError::VoidValue, tok.span));
                }
                return Ok(ty);
            }
        }
        let (name, span) = self.expect_ident()?;
        if self.touches_cursor(span) {
            let locals = self.visible_locals();
            self.record_probe(SuggestContext::Identifiers { prefix: name.clone(), span, locals });
        }
        let table = self.table;
        let mut node = table
            .resolve(&name, &self.opts.using_namespaces)
            .ok_or_else(|| self.sem(ResolveError::UnknownType { name: name.clone() }, span))?;
        let mut last_name = name;
        let mut last_span = span;
        while matches!(self.peek().kind, TokenKind::Dot) {
            let dot = self.advance();
            if self.touches_cursor(dot.span) {
                let names = node.child_names();
                let at = dot.span.end;
                self.record_probe(SuggestContext::Members {
                    prefix: EcoString::new(),
                    span: Span::new(at, at),
                    names,
                });
            }
            let (child_name, child_span) = self.expect_ident()?;
            if self.touches_cursor(child_span) {
                let names = node.child_names();
                self.record_probe(SuggestContext::Members {
                    prefix: child_name.clone(),
                    span: child_span,
                    names,
                });
            }
            node = node.child(&child_name).ok_or_else(|| {
                self.sem(
                    ResolveError::UnknownMember {
                        type_name: node.name().to_string(),
                        name: child_name.clone(),
                    },
                    child_span,
                )
            })?;
            last_name = child_name;
            last_span = child_span;
        }
        match self.node_operand(node, last_name.clone(), last_span)? {
            Operand::Type(ty) => Ok(ty),
            _ => Err(self.sem(ResolveError::UnknownType { name: last_name }, last_span)),
        }
    }

    fn parse_ctor_call(&mut self, ty: Ty, ty_span: Span) -> Result<Operand<'a>, ParseError> {
        let Ty::Object(tref) = ty else {
            return Err(self.sem(ResolveError::NotInvokable { ty }, ty_span));
        };
        let type_name = self.host.type_name(tref);
        let ctors: Vec<Candidate> = self
            .host
            .constructors(tref, self.safe_mode())
            .into_iter()
            .filter_map(|m| self.host.signature(m).map(|sig| Candidate { member: m, sig }))
            .collect();
        let sigs: Vec<Signature> = ctors.iter().map(|c| c.sig.clone()).collect();
        let (args, spans) = self.parse_call_args(Some((&type_name, &sigs)))?;

        // `new Handler(obj.Method)` captures a method group directly.
        if self.host.delegate_signature(tref).is_some()
            && args.len() == 1
            && matches!(args[0], Operand::Group(_))
        {
            let Some(Operand::Group(group)) = args.into_iter().next() else { unreachable!() };
            let delegate = self.group_to_delegate(group, &Ty::Object(tref), spans[0])?;
            return Ok(Operand::Value(delegate));
        }

        if ctors.is_empty() && args.is_empty() {
            return Ok(Operand::Value(Expr::DefaultConstruct { tref }));
        }
        let arg_tys = self.argument_tys(&args, &spans)?;
        let choice = pick_overload(self.host, &ctors, &arg_tys)
            .map_err(|f| self.overload_err(f, type_name.clone(), ty_span))?;
        let args = self.coerce_args(args, &choice.param_tys, &spans)?;
        Ok(Operand::Value(Expr::Construct { ctor: choice.member, args, ty: Ty::Object(tref) }))
    }

    fn parse_array_new(&mut self, mut elem: Ty) -> Result<Operand<'a>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let len = if matches!(self.peek().kind, TokenKind::RBracket) {
            None
        } else {
            let span = self.peek().span;
            let e = self.parse_value(prec::NONE)?;
            Some(Box::new(self.int_index(e, span)?))
        };
        let close = self.expect(TokenKind::RBracket)?;
        // Jagged suffixes nest the element type: `new int[2][]`.
        while matches!(self.peek().kind, TokenKind::LBracket)
            && matches!(self.peek2().kind, TokenKind::RBracket)
        {
            self.advance();
            self.advance();
            elem = Ty::Array(Box::new(elem));
        }
        let init = if matches!(self.peek().kind, TokenKind::LBrace) {
            Some(self.parse_array_init(&elem)?)
        } else {
            None
        };
        if len.is_none() && init.is_none() {
            return Err(self.unexpected("an array length or initializer"));
        }
        if let (Some(len_e), Some(items)) = (&len, &init) {
            if let Expr::Literal { value: Value::I32(n), .. } = &**len_e {
                if *n < 0 || *n as usize != items.len() {
                    return Err(self.sem(
                        ResolveError::ArrayInitCount {
                            expected: (*n).max(0) as usize,
                            got: items.len(),
                        },
                        close.span,
                    ));
                }
            }
        }
        Ok(Operand::Value(Expr::ArrayNew { elem, len, init }))
    }

    fn parse_array_init(&mut self, elem: &Ty) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        if !matches!(self.peek().kind, TokenKind::RBrace) {
            loop {
                let item = if matches!(self.peek().kind, TokenKind::LBrace) {
                    match elem {
                        Ty::Array(inner) => {
                            let init = self.parse_array_init(inner)?;
                            Expr::ArrayNew {
                                elem: (**inner).clone(),
                                len: None,
                                init: Some(init),
                            }
                        }
                        _ => return Err(self.unexpected("an expression")),
                    }
                } else {
                    let span = self.peek().span;
                    let operand = self.parse_operand(prec::NONE)?;
                    self.coerce_assign(operand, elem, span)?
                };
                items.push(item);
                match self.peek().kind {
                    TokenKind::Comma => {
                        self.advance();
                        if matches!(self.peek().kind, TokenKind::RBrace) {
                            break;
                        }
                    }
                    TokenKind::RBrace => break,
                    _ => return Err(self.unexpected("',' or '}'")),
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(items)
    }

    // ---- shared resolution helpers ----

    fn operator_candidates(&self, name: &str, tys: &[&Ty]) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = Vec::new();
        for ty in tys {
            if let Ty::Object(t) = ty {
                for m in self.host.find_members(*t, name, true, self.safe_mode()) {
                    if out.iter().any(|c| c.member == m) {
                        continue;
                    }
                    if let Some(sig) = self.host.signature(m) {
                        out.push(Candidate { member: m, sig });
                    }
                }
            }
        }
        out
    }

    fn overload_err(&self, failure: OverloadFailure, name: EcoString, span: Span) -> ParseError {
        let err = match failure {
            OverloadFailure::NoMatch => ResolveError::NoOverload { name },
            OverloadFailure::Ambiguous => ResolveError::AmbiguousOverload { name },
        };
        self.sem(err, span)
    }

    /// Insert a numeric conversion node when the representation changes;
    /// identity and reference-widening conversions need no node.
    fn convert_to(&self, value: Expr, to: &Ty) -> Expr {
        let from = value.ty();
        if from == *to || !(from.is_numeric() || from == Ty::Char) || !to.is_numeric() {
            return value;
        }
        Expr::Convert { value: Box::new(value), to: to.clone() }
    }
}

fn bin_op_for(kind: &TokenKind) -> BinOp {
    match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Rem,
        TokenKind::Amp => BinOp::BitAnd,
        TokenKind::Pipe => BinOp::BitOr,
        TokenKind::Caret => BinOp::BitXor,
        TokenKind::Shl => BinOp::Shl,
        TokenKind::Shr => BinOp::Shr,
        TokenKind::EqEq => BinOp::Eq,
        TokenKind::BangEq => BinOp::Ne,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Le => BinOp::Le,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Ge => BinOp::Ge,
        other => unreachable!("not a binary operator: {other:?}"),
    }
}

fn compound_op_for(kind: &TokenKind) -> BinOp {
    match kind {
        TokenKind::PlusEq => BinOp::Add,
        TokenKind::MinusEq => BinOp::Sub,
        TokenKind::StarEq => BinOp::Mul,
        TokenKind::SlashEq => BinOp::Div,
        TokenKind::PercentEq => BinOp::Rem,
        TokenKind::AmpEq => BinOp::BitAnd,
        TokenKind::PipeEq => BinOp::BitOr,
        TokenKind::CaretEq => BinOp::BitXor,
        TokenKind::ShlEq => BinOp::Shl,
        TokenKind::ShrEq => BinOp::Shr,
        other => unreachable!("not a compound assignment: {other:?}"),
    }
}

fn one_literal(ty: &Ty) -> Expr {
    let value = match ty {
        Ty::I32 => Value::I32(1),
        Ty::U32 => Value::U32(1),
        Ty::I64 => Value::I64(1),
        Ty::U64 => Value::U64(1),
        Ty::F32 => Value::F32(1.0),
        Ty::F64 => Value::F64(1.0),
        other => unreachable!("step literal for {other}"),
    };
    Expr::Literal { value, ty: ty.clone() }
}

/// Fold negation of a numeric literal so that `-2147483648` types as
/// `int` and `-9223372036854775808` as `long`, matching the usual
/// most-negative-literal special case.
fn fold_negate(value: &Value) -> Option<Expr> {
    let lit = |value: Value, ty: Ty| Some(Expr::Literal { value, ty });
    match value {
        Value::I32(v) => v.checked_neg().and_then(|n| lit(Value::I32(n), Ty::I32)),
        Value::I64(v) => v.checked_neg().and_then(|n| lit(Value::I64(n), Ty::I64)),
        Value::U32(v) if *v == 1 << 31 => lit(Value::I32(i32::MIN), Ty::I32),
        Value::U64(v) if *v == 1 << 63 => lit(Value::I64(i64::MIN), Ty::I64),
        Value::F32(v) => lit(Value::F32(-*v), Ty::F32),
        Value::F64(v) => lit(Value::F64(-*v), Ty::F64),
        _ => None,
    }
}
