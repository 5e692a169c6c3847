//! Typed abstract syntax tree.
//!
//! The parser resolves names, member references, overloads, and numeric
//! conversions while it parses, so every node here already knows its
//! static type. Execution never re-inspects source text or performs
//! name lookup.

use ecow::EcoString;

use crate::host::value::{Ty, TypeRef, Value};
use crate::host::MemberRef;


/// A parsed program ready for repeated execution.
#[derive(Debug, Clone)]
pub struct Command {
    /// Top-level statement block.
    pub root: Expr,
    /// Original source text, kept for diagnostics.
    pub source: EcoString,
}

/// Arithmetic and comparison operators after overload resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// Comparison operators yield `bool` regardless of operand type.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Where a field/property chain starts.
#[derive(Debug, Clone)]
pub enum MemberRoot {
    /// Static member chain on a host type.
    Static(TypeRef),
    /// Instance member chain on an evaluated receiver.
    Value(Box<Expr>),
}

/// One field or property hop in a member chain.
#[derive(Debug, Clone)]
pub struct MemberLink {
    pub member: MemberRef,
    /// Static type of the value this link produces.
    pub ty: Ty,
    /// The produced value is a host value type; reads hand out copies,
    /// so writes through a longer chain must store this link back into
    /// its receiver afterwards.
    pub copy_out: bool,
}

/// How a `foreach` walks its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKind {
    /// Index over a core array value.
    Array,
    /// Iterate the chars of a string.
    Str,
    /// Ask the host model for an enumerator.
    Host,
}

/// An expression or statement node.
///
/// Statements are expressions here; a statement's value is what the
/// interactive caller sees echoed back, with `Void` for constructs
/// that produce nothing.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        value: Value,
        ty: Ty,
    },
    /// Read of a declared local variable.
    LocalRead {
        name: EcoString,
        ty: Ty,
    },
    /// `int x = 5;` The initializer is already converted to `ty`.
    VarDecl {
        name: EcoString,
        ty: Ty,
        init: Option<Box<Expr>>,
    },
    /// Field/property/event read chain, e.g. `a.b.c` or `T.Static.x`.
    MemberChain {
        root: MemberRoot,
        links: Vec<MemberLink>,
        /// Whether the last link accepts writes.
        assignable: bool,
    },
    /// Resolved method call.
    MethodCall {
        receiver: Option<Box<Expr>>,
        member: MemberRef,
        args: Vec<Expr>,
        ret: Ty,
    },
    /// Call through a delegate-typed value.
    DelegateInvoke {
        target: Box<Expr>,
        args: Vec<Expr>,
        ret: Ty,
    },
    /// Capture of a method group into a delegate value.
    DelegateNew {
        receiver: Option<Box<Expr>>,
        member: MemberRef,
        ty: TypeRef,
    },
    /// `a + b` on delegate values.
    DelegateCombine {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Ty,
    },
    DelegateRemove {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Ty,
    },
    /// `obj.Event += handler`.
    EventAdd {
        receiver: Option<Box<Expr>>,
        member: MemberRef,
        handler: Box<Expr>,
    },
    EventRemove {
        receiver: Option<Box<Expr>>,
        member: MemberRef,
        handler: Box<Expr>,
    },
    /// `new T(args)` through a resolved constructor.
    Construct {
        ctor: MemberRef,
        args: Vec<Expr>,
        ty: Ty,
    },
    /// `new T()` with no declared constructor match needed.
    DefaultConstruct {
        tref: TypeRef,
    },
    /// `new T[len]` or `new T[] { ... }`; initializers are already
    /// converted to the element type, nested arrays recurse.
    ArrayNew {
        elem: Ty,
        len: Option<Box<Expr>>,
        init: Option<Vec<Expr>>,
    },
    /// Core array element read; the index is already `int`-typed.
    ArrayIndex {
        target: Box<Expr>,
        index: Box<Expr>,
        elem: Ty,
    },
    /// `s[i]` on a string; yields `char`, never writable.
    StringIndex {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// Host indexer read; writes go through the same member.
    IndexerGet {
        receiver: Box<Expr>,
        member: MemberRef,
        args: Vec<Expr>,
        ret: Ty,
    },
    /// `arr.Length`.
    ArrayLength {
        target: Box<Expr>,
    },
    /// `s.Length`.
    StrLength {
        target: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: Ty,
    },
    /// Numeric/bool/char binary operation; both operands are already
    /// converted to `operand_ty`.
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        operand_ty: Ty,
        ty: Ty,
    },
    /// String `+` with display coercion of the non-string side.
    StrConcat {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Short-circuit `&&` / `||`.
    Logical {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        ty: Ty,
    },
    /// User-defined operator resolved to a static host method.
    OperatorCall {
        member: MemberRef,
        args: Vec<Expr>,
        ret: Ty,
    },
    /// Checked numeric representation change.
    Convert {
        value: Box<Expr>,
        to: Ty,
    },
    /// Static retyping towards a base type; no runtime effect.
    UpCast {
        value: Box<Expr>,
        to: Ty,
    },
    /// Runtime-checked cast towards a derived or concrete type.
    DownCast {
        value: Box<Expr>,
        to: Ty,
    },
    /// `x is T`.
    IsTest {
        value: Box<Expr>,
        of: Ty,
    },
    /// `x as T`; yields null instead of failing.
    AsCast {
        value: Box<Expr>,
        to: Ty,
    },
    /// `target = value`; the value is already converted.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `target op= value`, and `++`/`--` with a literal 1 operand.
    /// `op_ty` is the promoted type the operation runs in before the
    /// result is narrowed back to the target's type.
    CompoundAssign {
        target: Box<Expr>,
        op: BinOp,
        value: Box<Expr>,
        op_ty: Ty,
        /// Postfix forms yield the value before the update.
        return_previous: bool,
    },
    /// `{ ... }`; declarations inside vanish at the closing brace.
    Block {
        body: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    For {
        init: Option<Box<Expr>>,
        cond: Option<Box<Expr>>,
        advance: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
    },
    Foreach {
        var: EcoString,
        var_ty: Ty,
        collection: Box<Expr>,
        body: Box<Expr>,
        kind: IterKind,
    },
    Break,
    Continue,
}

impl Expr {
    /// Static type of the value this node produces.
    pub fn ty(&self) -> Ty {
        match self {
            Expr::Literal { ty, .. } => ty.clone(),
            Expr::LocalRead { ty, .. } => ty.clone(),
            Expr::VarDecl { ty, .. } => ty.clone(),
            Expr::MemberChain { links, .. } => {
                links.last().map(|l| l.ty.clone()).unwrap_or(Ty::Void)
            }
            Expr::MethodCall { ret, .. } => ret.clone(),
            Expr::DelegateInvoke { ret, .. } => ret.clone(),
            Expr::DelegateNew { ty, .. } => Ty::Object(*ty),
            Expr::DelegateCombine { ty, .. } => ty.clone(),
            Expr::DelegateRemove { ty, .. } => ty.clone(),
            Expr::EventAdd { .. } | Expr::EventRemove { .. } => Ty::Void,
            Expr::Construct { ty, .. } => ty.clone(),
            Expr::DefaultConstruct { tref } => Ty::Object(*tref),
            Expr::ArrayNew { elem, .. } => Ty::Array(Box::new(elem.clone())),
            Expr::ArrayIndex { elem, .. } => elem.clone(),
            Expr::StringIndex { .. } => Ty::Char,
            Expr::IndexerGet { ret, .. } => ret.clone(),
            Expr::ArrayLength { .. } | Expr::StrLength { .. } => Ty::I32,
            Expr::Unary { ty, .. } => ty.clone(),
            Expr::Binary { ty, .. } => ty.clone(),
            Expr::StrConcat { .. } => Ty::Str,
            Expr::Logical { .. } => Ty::Bool,
            Expr::Conditional { ty, .. } => ty.clone(),
            Expr::OperatorCall { ret, .. } => ret.clone(),
            Expr::Convert { to, .. } => to.clone(),
            Expr::UpCast { to, .. } => to.clone(),
            Expr::DownCast { to, .. } => to.clone(),
            Expr::IsTest { .. } => Ty::Bool,
            Expr::AsCast { to, .. } => to.clone(),
            Expr::Assign { target, .. } => target.ty(),
            Expr::CompoundAssign { target, .. } => target.ty(),
            Expr::Block { body } => body.last().map(Expr::ty).unwrap_or(Ty::Void),
            Expr::If { .. }
            | Expr::For { .. }
            | Expr::While { .. }
            | Expr::Foreach { .. }
            | Expr::Break
            | Expr::Continue => Ty::Void,
        }
    }

    /// Whether assignment through this node is possible.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::LocalRead { .. } | Expr::ArrayIndex { .. } => true,
            Expr::MemberChain { assignable, .. } => *assignable,
            Expr::IndexerGet { .. } => true,
            _ => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Literal { .. })
    }
}
