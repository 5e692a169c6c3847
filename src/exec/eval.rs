//! The recursive evaluator.

use std::sync::Arc;

use ecow::EcoString;

use crate::ast::{BinOp, Expr, IterKind, LogicOp, MemberLink, MemberRoot, UnaryOp};
use crate::host::registry::{combine_delegates, remove_delegates};
use crate::host::value::{ArrayRef, BoundMember, DelegateVal, Ty, Value};
use crate::host::{is_subtype_of, MemberRef};

use super::{ExecError, ExecutionContext, Flow};

/// A resolved assignment target. Holding one lets a compound
/// assignment read and write the same location without re-running
/// the subexpressions that named it.
enum Place<'e> {
    Local(usize),
    Chain {
        receivers: Vec<Option<Value>>,
        links: &'e [MemberLink],
    },
    Array {
        arr: ArrayRef,
        index: i32,
    },
    Indexer {
        recv: Value,
        member: MemberRef,
        args: Vec<Value>,
    },
}

macro_rules! int_binary_fn {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name(op: BinOp, a: $ty, b: $ty) -> Result<Value, ExecError> {
            Ok(match op {
                BinOp::Add => Value::$variant(a.wrapping_add(b)),
                BinOp::Sub => Value::$variant(a.wrapping_sub(b)),
                BinOp::Mul => Value::$variant(a.wrapping_mul(b)),
                BinOp::Div => {
                    if b == 0 {
                        return Err(ExecError::DivisionByZero);
                    }
                    Value::$variant(a.wrapping_div(b))
                }
                BinOp::Rem => {
                    if b == 0 {
                        return Err(ExecError::DivisionByZero);
                    }
                    Value::$variant(a.wrapping_rem(b))
                }
                BinOp::BitAnd => Value::$variant(a & b),
                BinOp::BitOr => Value::$variant(a | b),
                BinOp::BitXor => Value::$variant(a ^ b),
                BinOp::Eq => Value::Bool(a == b),
                BinOp::Ne => Value::Bool(a != b),
                BinOp::Lt => Value::Bool(a < b),
                BinOp::Le => Value::Bool(a <= b),
                BinOp::Gt => Value::Bool(a > b),
                BinOp::Ge => Value::Bool(a >= b),
                BinOp::Shl | BinOp::Shr => unreachable!("shifts dispatch separately"),
            })
        }
    };
}

int_binary_fn!(i32_binary, i32, I32);
int_binary_fn!(u32_binary, u32, U32);
int_binary_fn!(i64_binary, i64, I64);
int_binary_fn!(u64_binary, u64, U64);

macro_rules! float_binary_fn {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name(op: BinOp, a: $ty, b: $ty) -> Value {
            match op {
                BinOp::Add => Value::$variant(a + b),
                BinOp::Sub => Value::$variant(a - b),
                BinOp::Mul => Value::$variant(a * b),
                // IEEE semantics: division by zero is an infinity.
                BinOp::Div => Value::$variant(a / b),
                BinOp::Rem => Value::$variant(a % b),
                BinOp::Eq => Value::Bool(a == b),
                BinOp::Ne => Value::Bool(a != b),
                BinOp::Lt => Value::Bool(a < b),
                BinOp::Le => Value::Bool(a <= b),
                BinOp::Gt => Value::Bool(a > b),
                BinOp::Ge => Value::Bool(a >= b),
                _ => unreachable!("bitwise on floats rejected at parse time"),
            }
        }
    };
}

float_binary_fn!(f32_binary, f32, F32);
float_binary_fn!(f64_binary, f64, F64);

fn expect_bool(v: &Value) -> bool {
    v.as_bool().expect("operand typed at parse time")
}

fn expect_i32(v: &Value) -> i32 {
    match v {
        Value::I32(x) => *x,
        other => panic!("expected int operand, got {other:?}"),
    }
}

/// Render a value as concatenation text: strings and chars appear bare,
/// null vanishes, everything else uses its display form.
fn concat_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Str(s) => s.to_string(),
        Value::Char(c) => c.to_string(),
        other => other.to_string(),
    }
}

impl ExecutionContext<'_> {
    pub(crate) fn eval(&mut self, e: &Expr) -> Result<Value, ExecError> {
        match e {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::LocalRead { name, .. } => {
                let idx = self.var_index(name);
                Ok(self.vars[idx].value.clone())
            }
            Expr::VarDecl { name, ty, init } => {
                let value = match init {
                    Some(e) => self.eval(e)?,
                    None => ty.default_value(),
                };
                self.push_var(name.clone(), ty.clone(), value.clone());
                Ok(value)
            }
            Expr::MemberChain { root, links, .. } => self.eval_chain(root, links),
            Expr::MethodCall { receiver, member, args, .. } => {
                let recv = self.eval_receiver(receiver)?;
                let argv = self.eval_args(args)?;
                Ok(self.host.invoke(recv.as_ref(), *member, &argv)?)
            }
            Expr::DelegateInvoke { target, args, .. } => {
                let target = self.eval(target)?;
                let argv = self.eval_args(args)?;
                self.invoke_delegate(&target, &argv)
            }
            Expr::DelegateNew { receiver, member, ty } => {
                let target = self.eval_receiver(receiver)?;
                Ok(Value::Delegate(Arc::new(DelegateVal {
                    ty: *ty,
                    list: vec![BoundMember { target, member: *member }],
                })))
            }
            Expr::DelegateCombine { lhs, rhs, .. } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                Ok(combine_delegates(&l, &r)?)
            }
            Expr::DelegateRemove { lhs, rhs, .. } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                Ok(remove_delegates(&l, &r)?)
            }
            Expr::EventAdd { receiver, member, handler } => {
                let recv = self.eval_receiver(receiver)?;
                let handler = self.eval(handler)?;
                self.host.event_add(recv.as_ref(), *member, handler)?;
                Ok(Value::Null)
            }
            Expr::EventRemove { receiver, member, handler } => {
                let recv = self.eval_receiver(receiver)?;
                let handler = self.eval(handler)?;
                self.host.event_remove(recv.as_ref(), *member, handler)?;
                Ok(Value::Null)
            }
            Expr::Construct { ctor, args, .. } => {
                let argv = self.eval_args(args)?;
                Ok(self.host.construct(*ctor, &argv)?)
            }
            Expr::DefaultConstruct { tref } => Ok(self.host.default_construct(*tref)?),
            Expr::ArrayNew { elem, len, init } => self.eval_array_new(elem, len, init),
            Expr::ArrayIndex { target, index, .. } => {
                let arr = self.eval(target)?;
                let arr = arr.as_array().ok_or(ExecError::NullDeref)?;
                let i = expect_i32(&self.eval(index)?);
                let items = arr.data.lock().expect("array lock poisoned");
                items
                    .get(usize::try_from(i).unwrap_or(usize::MAX))
                    .cloned()
                    .ok_or(ExecError::IndexOutOfBounds { index: i64::from(i), len: items.len() })
            }
            Expr::StringIndex { target, index } => {
                let s = self.eval(target)?;
                let s = s.as_str().ok_or(ExecError::NullDeref)?.clone();
                let i = expect_i32(&self.eval(index)?);
                usize::try_from(i)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(Value::Char)
                    .ok_or(ExecError::IndexOutOfBounds {
                        index: i64::from(i),
                        len: s.chars().count(),
                    })
            }
            Expr::IndexerGet { receiver, member, args, .. } => {
                let recv = self.eval(receiver)?;
                if recv.is_null() {
                    return Err(ExecError::NullDeref);
                }
                let argv = self.eval_args(args)?;
                Ok(self.host.invoke(Some(&recv), *member, &argv)?)
            }
            Expr::ArrayLength { target } => {
                let arr = self.eval(target)?;
                let arr = arr.as_array().ok_or(ExecError::NullDeref)?;
                Ok(Value::I32(arr.len() as i32))
            }
            Expr::StrLength { target } => {
                let s = self.eval(target)?;
                let s = s.as_str().ok_or(ExecError::NullDeref)?;
                Ok(Value::I32(s.chars().count() as i32))
            }
            Expr::Unary { op, operand, .. } => {
                let v = self.eval(operand)?;
                Ok(unary_value(*op, &v))
            }
            Expr::Binary { op, lhs, rhs, operand_ty, .. } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary_value(*op, &l, &r, operand_ty)
            }
            Expr::StrConcat { lhs, rhs } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                let mut out = EcoString::from(concat_text(&l));
                out.push_str(&concat_text(&r));
                Ok(Value::Str(out))
            }
            Expr::Logical { op, lhs, rhs } => {
                let l = expect_bool(&self.eval(lhs)?);
                let short = match op {
                    LogicOp::And => !l,
                    LogicOp::Or => l,
                };
                if short {
                    return Ok(Value::Bool(l));
                }
                Ok(Value::Bool(expect_bool(&self.eval(rhs)?)))
            }
            Expr::Conditional { cond, then_branch, else_branch, .. } => {
                if expect_bool(&self.eval(cond)?) {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::OperatorCall { member, args, .. } => {
                let argv = self.eval_args(args)?;
                Ok(self.host.invoke(None, *member, &argv)?)
            }
            Expr::Convert { value, to } => {
                let v = self.eval(value)?;
                v.convert_numeric(to)
                    .ok_or_else(|| ExecError::InvalidCast { to: to.clone() })
            }
            Expr::UpCast { value, .. } => self.eval(value),
            Expr::DownCast { value, to } => {
                let v = self.eval(value)?;
                if v.is_null() && to.is_reference() {
                    return Ok(Value::Null);
                }
                if self.runtime_is(&v, to) {
                    return Ok(v);
                }
                // Unboxing a mistyped numeric never converts.
                Err(ExecError::InvalidCast { to: to.clone() })
            }
            Expr::IsTest { value, of } => {
                let v = self.eval(value)?;
                Ok(Value::Bool(!v.is_null() && self.runtime_is(&v, of)))
            }
            Expr::AsCast { value, to } => {
                let v = self.eval(value)?;
                if !v.is_null() && self.runtime_is(&v, to) {
                    Ok(v)
                } else {
                    Ok(Value::Null)
                }
            }
            Expr::Assign { target, value } => {
                let v = self.eval(value)?;
                self.assign_to(target, v.clone())?;
                Ok(v)
            }
            Expr::CompoundAssign { target, op, value, op_ty, return_previous } => {
                self.eval_compound(target, *op, value, op_ty, *return_previous)
            }
            Expr::Block { body } => self.eval_block(body),
            Expr::If { cond, then_branch, else_branch } => {
                if expect_bool(&self.eval(cond)?) {
                    self.eval(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.eval(else_branch)?;
                }
                Ok(Value::Null)
            }
            Expr::While { cond, body } => {
                let mut iterations = 0u64;
                loop {
                    if !expect_bool(&self.eval(cond)?) {
                        break;
                    }
                    self.charge_iteration(&mut iterations)?;
                    self.eval(body)?;
                    if self.take_loop_flow() {
                        break;
                    }
                }
                Ok(Value::Null)
            }
            Expr::For { init, cond, advance, body } => {
                let mark = self.vars.len();
                let result = self.eval_for(init, cond, advance, body);
                self.vars.truncate(mark);
                result
            }
            Expr::Foreach { var, var_ty, collection, body, kind } => {
                let mark = self.vars.len();
                let result = self.eval_foreach(var, var_ty, collection, body, *kind);
                self.vars.truncate(mark);
                result
            }
            Expr::Break => {
                self.flow = Flow::Break;
                Ok(Value::Null)
            }
            Expr::Continue => {
                self.flow = Flow::Continue;
                Ok(Value::Null)
            }
        }
    }

    fn eval_block(&mut self, body: &[Expr]) -> Result<Value, ExecError> {
        let mark = self.vars.len();
        let mut last = Value::Null;
        for stmt in body {
            last = self.eval(stmt)?;
            if self.flow != Flow::Normal {
                break;
            }
        }
        self.vars.truncate(mark);
        Ok(last)
    }

    /// Consume a `break`/`continue` raised by a loop body. Returns true
    /// when the loop should stop.
    fn take_loop_flow(&mut self) -> bool {
        match self.flow {
            Flow::Normal => false,
            Flow::Break => {
                self.flow = Flow::Normal;
                true
            }
            Flow::Continue => {
                self.flow = Flow::Normal;
                false
            }
        }
    }

    fn eval_for(
        &mut self,
        init: &Option<Box<Expr>>,
        cond: &Option<Box<Expr>>,
        advance: &Option<Box<Expr>>,
        body: &Expr,
    ) -> Result<Value, ExecError> {
        if let Some(init) = init {
            self.eval(init)?;
        }
        let mut iterations = 0u64;
        loop {
            if let Some(cond) = cond {
                if !expect_bool(&self.eval(cond)?) {
                    break;
                }
            }
            self.charge_iteration(&mut iterations)?;
            self.eval(body)?;
            if self.take_loop_flow() {
                break;
            }
            if let Some(advance) = advance {
                self.eval(advance)?;
            }
        }
        Ok(Value::Null)
    }

    fn eval_foreach(
        &mut self,
        var: &EcoString,
        var_ty: &Ty,
        collection: &Expr,
        body: &Expr,
        kind: IterKind,
    ) -> Result<Value, ExecError> {
        let coll = self.eval(collection)?;
        if coll.is_null() {
            return Err(ExecError::NullDeref);
        }
        self.push_var(var.clone(), var_ty.clone(), var_ty.default_value());
        let slot = self.vars.len() - 1;
        let mut iterations = 0u64;

        match kind {
            IterKind::Array => {
                let arr = coll.as_array().expect("array-typed collection").clone();
                let mut i = 0usize;
                loop {
                    // Lock per element: the body may observe the live array.
                    let item = {
                        let items = arr.data.lock().expect("array lock poisoned");
                        match items.get(i) {
                            Some(v) => v.clone(),
                            None => break,
                        }
                    };
                    self.charge_iteration(&mut iterations)?;
                    self.store_loop_var(slot, var_ty, item)?;
                    self.eval(body)?;
                    if self.take_loop_flow() {
                        break;
                    }
                    i += 1;
                }
            }
            IterKind::Str => {
                let s = coll.as_str().expect("string-typed collection").clone();
                for c in s.chars() {
                    self.charge_iteration(&mut iterations)?;
                    self.store_loop_var(slot, var_ty, Value::Char(c))?;
                    self.eval(body)?;
                    if self.take_loop_flow() {
                        break;
                    }
                }
            }
            IterKind::Host => {
                let mut e = self.host.enumerate(&coll)?;
                while e.move_next()? {
                    self.charge_iteration(&mut iterations)?;
                    let item = e.current()?;
                    self.store_loop_var(slot, var_ty, item)?;
                    self.eval(body)?;
                    if self.take_loop_flow() {
                        break;
                    }
                }
            }
        }
        Ok(Value::Null)
    }

    /// Adapt one element to the loop variable's type and store it.
    fn store_loop_var(&mut self, slot: usize, var_ty: &Ty, item: Value) -> Result<(), ExecError> {
        let value = if item.is_null() {
            Value::Null
        } else if var_ty.is_numeric() || *var_ty == Ty::Char {
            item.convert_numeric(var_ty)
                .ok_or_else(|| ExecError::InvalidCast { to: var_ty.clone() })?
        } else if self.runtime_is(&item, var_ty) {
            item
        } else {
            return Err(ExecError::InvalidCast { to: var_ty.clone() });
        };
        self.vars[slot].value = value;
        Ok(())
    }

    fn eval_receiver(&mut self, receiver: &Option<Box<Expr>>) -> Result<Option<Value>, ExecError> {
        match receiver {
            None => Ok(None),
            Some(e) => {
                let v = self.eval(e)?;
                if v.is_null() {
                    return Err(ExecError::NullDeref);
                }
                Ok(Some(v))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, ExecError> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn eval_chain(&mut self, root: &MemberRoot, links: &[MemberLink]) -> Result<Value, ExecError> {
        let mut cur = match root {
            MemberRoot::Static(_) => None,
            MemberRoot::Value(e) => Some(self.eval(e)?),
        };
        for link in links {
            if let Some(v) = &cur {
                if v.is_null() {
                    return Err(ExecError::NullDeref);
                }
            }
            cur = Some(self.host.get(cur.as_ref(), link.member)?);
        }
        Ok(cur.expect("member chain cannot be empty"))
    }

    /// Pin down an assignment target: every receiver, index, and
    /// argument subexpression is evaluated exactly once, then reads
    /// and writes go through the resolved location. `a[i++] += 1`
    /// bumps `i` once.
    fn resolve_place<'e>(&mut self, target: &'e Expr) -> Result<Place<'e>, ExecError> {
        match target {
            Expr::LocalRead { name, .. } => Ok(Place::Local(self.var_index(name))),
            Expr::MemberChain { root, links, .. } => {
                let mut receivers: Vec<Option<Value>> = Vec::with_capacity(links.len());
                let mut cur = match root {
                    MemberRoot::Static(_) => None,
                    MemberRoot::Value(e) => Some(self.eval(e)?),
                };
                for link in &links[..links.len() - 1] {
                    if let Some(v) = &cur {
                        if v.is_null() {
                            return Err(ExecError::NullDeref);
                        }
                    }
                    receivers.push(cur.clone());
                    cur = Some(self.host.get(cur.as_ref(), link.member)?);
                }
                if let Some(v) = &cur {
                    if v.is_null() {
                        return Err(ExecError::NullDeref);
                    }
                }
                receivers.push(cur);
                Ok(Place::Chain { receivers, links })
            }
            Expr::ArrayIndex { target, index, .. } => {
                let arr = self.eval(target)?;
                let arr = arr.as_array().ok_or(ExecError::NullDeref)?.clone();
                let index = expect_i32(&self.eval(index)?);
                Ok(Place::Array { arr, index })
            }
            Expr::IndexerGet { receiver, member, args, .. } => {
                let recv = self.eval(receiver)?;
                if recv.is_null() {
                    return Err(ExecError::NullDeref);
                }
                let args = self.eval_args(args)?;
                Ok(Place::Indexer { recv, member: *member, args })
            }
            other => unreachable!("assignability checked at parse time: {other:?}"),
        }
    }

    fn read_place(&mut self, place: &Place<'_>) -> Result<Value, ExecError> {
        match place {
            Place::Local(idx) => Ok(self.vars[*idx].value.clone()),
            Place::Chain { receivers, links } => {
                let leaf = links.last().expect("member chain cannot be empty");
                Ok(self.host.get(receivers[links.len() - 1].as_ref(), leaf.member)?)
            }
            Place::Array { arr, index } => {
                let items = arr.data.lock().expect("array lock poisoned");
                let len = items.len();
                usize::try_from(*index)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or(ExecError::IndexOutOfBounds { index: i64::from(*index), len })
            }
            Place::Indexer { recv, member, args } => {
                Ok(self.host.invoke(Some(recv), *member, args)?)
            }
        }
    }

    /// Write through a resolved place. Reads of value-type chain links
    /// hand out copies, so after writing the leaf every copied link is
    /// stored back into its receiver, innermost first.
    fn write_place(&mut self, place: &Place<'_>, value: Value) -> Result<(), ExecError> {
        match place {
            Place::Local(idx) => {
                self.vars[*idx].value = value;
                Ok(())
            }
            Place::Chain { receivers, links } => {
                let leaf = links.last().expect("member chain cannot be empty");
                self.host.set(receivers[links.len() - 1].as_ref(), leaf.member, value)?;
                for i in (1..links.len()).rev() {
                    if links[i - 1].copy_out {
                        let copied = receivers[i].clone().expect("copied link has a value");
                        self.host.set(receivers[i - 1].as_ref(), links[i - 1].member, copied)?;
                    }
                }
                Ok(())
            }
            Place::Array { arr, index } => {
                let mut items = arr.data.lock().expect("array lock poisoned");
                let len = items.len();
                match usize::try_from(*index).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(ExecError::IndexOutOfBounds { index: i64::from(*index), len }),
                }
            }
            Place::Indexer { recv, member, args } => {
                Ok(self.host.set_index(Some(recv), *member, args, value)?)
            }
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> Result<(), ExecError> {
        let place = self.resolve_place(target)?;
        self.write_place(&place, value)
    }

    fn eval_compound(
        &mut self,
        target: &Expr,
        op: BinOp,
        value: &Expr,
        op_ty: &Ty,
        return_previous: bool,
    ) -> Result<Value, ExecError> {
        let place = self.resolve_place(target)?;
        let previous = self.read_place(&place)?;
        let widened = if op_ty.is_numeric() && previous.runtime_ty() != *op_ty {
            previous
                .convert_numeric(op_ty)
                .ok_or_else(|| ExecError::InvalidCast { to: op_ty.clone() })?
        } else {
            previous.clone()
        };
        let rhs = self.eval(value)?;
        let result = binary_value(op, &widened, &rhs, op_ty)?;
        let target_ty = target.ty();
        let narrows = target_ty.is_numeric() || target_ty == Ty::Char;
        let stored = if narrows && result.runtime_ty() != target_ty {
            result
                .convert_numeric(&target_ty)
                .ok_or(ExecError::InvalidCast { to: target_ty })?
        } else {
            result
        };
        self.write_place(&place, stored.clone())?;
        Ok(if return_previous { previous } else { stored })
    }

    fn eval_array_new(
        &mut self,
        elem: &Ty,
        len: &Option<Box<Expr>>,
        init: &Option<Vec<Expr>>,
    ) -> Result<Value, ExecError> {
        let declared = match len {
            Some(e) => Some(i64::from(expect_i32(&self.eval(e)?))),
            None => None,
        };
        let items = match init {
            Some(exprs) => {
                let items = self.eval_args(exprs)?;
                if let Some(declared) = declared {
                    if declared != items.len() as i64 {
                        return Err(ExecError::ArrayLengthMismatch {
                            declared,
                            got: items.len(),
                        });
                    }
                }
                items
            }
            None => {
                let declared = declared.expect("length or initializer present");
                let n = usize::try_from(declared)
                    .map_err(|_| ExecError::NegativeArraySize { len: declared })?;
                vec![elem.default_value(); n]
            }
        };
        Ok(Value::Array(ArrayRef::new(elem.clone(), items)))
    }

    fn invoke_delegate(&mut self, target: &Value, args: &[Value]) -> Result<Value, ExecError> {
        let Value::Delegate(delegate) = target else {
            return Err(ExecError::NullDeref);
        };
        let mut last = Value::Null;
        // Multicast: every bound member runs; the last result wins.
        for BoundMember { target, member } in &delegate.list {
            last = self.host.invoke(target.as_ref(), *member, args)?;
        }
        Ok(last)
    }

    /// Runtime type test against a static target type.
    fn runtime_is(&self, v: &Value, to: &Ty) -> bool {
        match to {
            Ty::Any => true,
            Ty::Object(t) => match v {
                Value::Obj(o) => is_subtype_of(self.host, o.ty, *t),
                Value::Delegate(d) => is_subtype_of(self.host, d.ty, *t),
                _ => false,
            },
            other => v.runtime_ty() == *other,
        }
    }
}

fn unary_value(op: UnaryOp, v: &Value) -> Value {
    match (op, v) {
        (UnaryOp::Plus, other) => other.clone(),
        (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
        (UnaryOp::Neg, Value::I32(x)) => Value::I32(x.wrapping_neg()),
        (UnaryOp::Neg, Value::I64(x)) => Value::I64(x.wrapping_neg()),
        (UnaryOp::Neg, Value::F32(x)) => Value::F32(-x),
        (UnaryOp::Neg, Value::F64(x)) => Value::F64(-x),
        (UnaryOp::BitNot, Value::I32(x)) => Value::I32(!x),
        (UnaryOp::BitNot, Value::U32(x)) => Value::U32(!x),
        (UnaryOp::BitNot, Value::I64(x)) => Value::I64(!x),
        (UnaryOp::BitNot, Value::U64(x)) => Value::U64(!x),
        (op, other) => unreachable!("unary {} on {other:?}", op.symbol()),
    }
}

fn binary_value(op: BinOp, lhs: &Value, rhs: &Value, operand_ty: &Ty) -> Result<Value, ExecError> {
    // The shift count is int-typed regardless of the operand type, and
    // wraps modulo the operand width.
    if matches!(op, BinOp::Shl | BinOp::Shr) {
        let n = expect_i32(rhs) as u32;
        let shl = matches!(op, BinOp::Shl);
        return Ok(match (operand_ty, lhs) {
            (Ty::I32, Value::I32(a)) => {
                Value::I32(if shl { a.wrapping_shl(n) } else { a.wrapping_shr(n) })
            }
            (Ty::U32, Value::U32(a)) => {
                Value::U32(if shl { a.wrapping_shl(n) } else { a.wrapping_shr(n) })
            }
            (Ty::I64, Value::I64(a)) => {
                Value::I64(if shl { a.wrapping_shl(n) } else { a.wrapping_shr(n) })
            }
            (Ty::U64, Value::U64(a)) => {
                Value::U64(if shl { a.wrapping_shl(n) } else { a.wrapping_shr(n) })
            }
            (ty, lhs) => unreachable!("shift over {ty} on {lhs:?}"),
        });
    }
    match operand_ty {
        Ty::Bool => {
            let a = expect_bool(lhs);
            let b = expect_bool(rhs);
            Ok(match op {
                BinOp::BitAnd => Value::Bool(a & b),
                BinOp::BitOr => Value::Bool(a | b),
                BinOp::BitXor => Value::Bool(a ^ b),
                BinOp::Eq => Value::Bool(a == b),
                BinOp::Ne => Value::Bool(a != b),
                other => unreachable!("{} on bool", other.symbol()),
            })
        }
        Ty::Str | Ty::Any => {
            let same = lhs.same_reference(rhs);
            Ok(match op {
                BinOp::Eq => Value::Bool(same),
                BinOp::Ne => Value::Bool(!same),
                other => unreachable!("{} on references", other.symbol()),
            })
        }
        Ty::I32 => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => i32_binary(op, *a, *b),
            _ => unreachable!("operands typed at parse time"),
        },
        Ty::U32 => match (lhs, rhs) {
            (Value::U32(a), Value::U32(b)) => u32_binary(op, *a, *b),
            _ => unreachable!("operands typed at parse time"),
        },
        Ty::I64 => match (lhs, rhs) {
            (Value::I64(a), Value::I64(b)) => i64_binary(op, *a, *b),
            _ => unreachable!("operands typed at parse time"),
        },
        Ty::U64 => match (lhs, rhs) {
            (Value::U64(a), Value::U64(b)) => u64_binary(op, *a, *b),
            _ => unreachable!("operands typed at parse time"),
        },
        Ty::F32 => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Ok(f32_binary(op, *a, *b)),
            _ => unreachable!("operands typed at parse time"),
        },
        Ty::F64 => match (lhs, rhs) {
            (Value::F64(a), Value::F64(b)) => Ok(f64_binary(op, *a, *b)),
            _ => unreachable!("operands typed at parse time"),
        },
        other => unreachable!("binary over {other}"),
    }
}
