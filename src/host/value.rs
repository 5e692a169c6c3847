//! Runtime values and the static type lattice.
//!
//! Values are a closed tagged union over the small set of representable
//! shapes: the primitives, strings, arrays, delegates, and an opaque host
//! instance handle. The executor's type dispatch is an exhaustive match
//! over this enum rather than a dynamically-typed blob.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use ecow::EcoString;

use super::MemberRef;

/// Opaque identifier for a host type, issued by the host type model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub u32);

/// Static type of an expression or value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// No value; only valid as a method return type or statement result.
    Void,
    /// Type of the bare `null` literal before it is converted to a
    /// reference type.
    Null,
    /// The universal `object` type; any value is assignable to it and
    /// member access requires a downcast first.
    Any,
    Bool,
    Char,
    Str,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Single-dimensional array with the given element type.
    Array(Box<Ty>),
    /// A host-defined class, struct, or delegate type.
    Object(TypeRef),
}

impl Ty {
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_float()
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Ty::I8 | Ty::U8 | Ty::I16 | Ty::U16 | Ty::I32 | Ty::U32 | Ty::I64 | Ty::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::F32 | Ty::F64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Ty::I8 | Ty::I16 | Ty::I32 | Ty::I64 | Ty::F32 | Ty::F64)
    }

    /// Bit width of an integral type.
    pub fn bits(&self) -> Option<u32> {
        match self {
            Ty::I8 | Ty::U8 => Some(8),
            Ty::I16 | Ty::U16 => Some(16),
            Ty::I32 | Ty::U32 => Some(32),
            Ty::I64 | Ty::U64 => Some(64),
            _ => None,
        }
    }

    /// Reference types admit `null` and compare by identity when no other
    /// equality rule applies.
    pub fn is_reference(&self) -> bool {
        matches!(self, Ty::Null | Ty::Any | Ty::Str | Ty::Array(_) | Ty::Object(_))
    }

    /// The zero/empty value used for uninitialized variables and fields.
    pub fn default_value(&self) -> Value {
        match self {
            Ty::Void | Ty::Null | Ty::Any | Ty::Str | Ty::Array(_) | Ty::Object(_) => Value::Null,
            Ty::Bool => Value::Bool(false),
            Ty::Char => Value::Char('\0'),
            Ty::I8 => Value::I8(0),
            Ty::U8 => Value::U8(0),
            Ty::I16 => Value::I16(0),
            Ty::U16 => Value::U16(0),
            Ty::I32 => Value::I32(0),
            Ty::U32 => Value::U32(0),
            Ty::I64 => Value::I64(0),
            Ty::U64 => Value::U64(0),
            Ty::F32 => Value::F32(0.0),
            Ty::F64 => Value::F64(0.0),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Null => write!(f, "null"),
            Ty::Any => write!(f, "object"),
            Ty::Bool => write!(f, "bool"),
            Ty::Char => write!(f, "char"),
            Ty::Str => write!(f, "string"),
            Ty::I8 => write!(f, "sbyte"),
            Ty::U8 => write!(f, "byte"),
            Ty::I16 => write!(f, "short"),
            Ty::U16 => write!(f, "ushort"),
            Ty::I32 => write!(f, "int"),
            Ty::U32 => write!(f, "uint"),
            Ty::I64 => write!(f, "long"),
            Ty::U64 => write!(f, "ulong"),
            Ty::F32 => write!(f, "float"),
            Ty::F64 => write!(f, "double"),
            Ty::Array(elem) => write!(f, "{}[]", elem),
            Ty::Object(tref) => write!(f, "#{}", tref.0),
        }
    }
}

/// Shared, element-typed array storage.
///
/// Cloning an `ArrayRef` shares the underlying buffer; arrays have
/// reference semantics like every other collection the host hands out.
#[derive(Clone)]
pub struct ArrayRef {
    pub elem: Ty,
    pub data: Arc<Mutex<Vec<Value>>>,
}

impl ArrayRef {
    pub fn new(elem: Ty, values: Vec<Value>) -> Self {
        Self {
            elem,
            data: Arc::new(Mutex::new(values)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().expect("array lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().expect("array lock poisoned").is_empty()
    }
}

/// A single entry in a delegate's invocation list.
#[derive(Clone)]
pub struct BoundMember {
    /// Receiver instance, or `None` for a static method.
    pub target: Option<Value>,
    pub member: MemberRef,
}

/// Immutable delegate value: a host delegate type plus an invocation list.
///
/// Combine/remove produce new delegate values; the lists are never mutated
/// in place, matching the value semantics of the source model.
#[derive(Clone)]
pub struct DelegateVal {
    pub ty: TypeRef,
    pub list: Vec<BoundMember>,
}

/// Opaque handle to a live host object.
///
/// The interpreter never looks inside `data`; only the host type model that
/// issued the handle knows its layout.
#[derive(Clone)]
pub struct HostInstance {
    pub ty: TypeRef,
    pub data: Arc<dyn Any + Send + Sync>,
}

impl HostInstance {
    /// Identity comparison: same underlying allocation.
    pub fn same_instance(&self, other: &HostInstance) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// A boxed runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Str(EcoString),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Array(ArrayRef),
    Delegate(Arc<DelegateVal>),
    Obj(HostInstance),
}

impl Value {
    /// The runtime type of this value.
    pub fn runtime_ty(&self) -> Ty {
        match self {
            Value::Null => Ty::Null,
            Value::Bool(_) => Ty::Bool,
            Value::Char(_) => Ty::Char,
            Value::Str(_) => Ty::Str,
            Value::I8(_) => Ty::I8,
            Value::U8(_) => Ty::U8,
            Value::I16(_) => Ty::I16,
            Value::U16(_) => Ty::U16,
            Value::I32(_) => Ty::I32,
            Value::U32(_) => Ty::U32,
            Value::I64(_) => Ty::I64,
            Value::U64(_) => Ty::U64,
            Value::F32(_) => Ty::F32,
            Value::F64(_) => Ty::F64,
            Value::Array(a) => Ty::Array(Box::new(a.elem.clone())),
            Value::Delegate(d) => Ty::Object(d.ty),
            Value::Obj(o) => Ty::Object(o.ty),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&EcoString> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&HostInstance> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    /// Widen any signed-representable integral (or char) to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(i64::from(*v)),
            Value::U8(v) => Some(i64::from(*v)),
            Value::I16(v) => Some(i64::from(*v)),
            Value::U16(v) => Some(i64::from(*v)),
            Value::I32(v) => Some(i64::from(*v)),
            Value::U32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// Widen any unsigned-representable integral to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::I8(v) => u64::try_from(*v).ok(),
            Value::U8(v) => Some(u64::from(*v)),
            Value::I16(v) => u64::try_from(*v).ok(),
            Value::U16(v) => Some(u64::from(*v)),
            Value::I32(v) => u64::try_from(*v).ok(),
            Value::U32(v) => Some(u64::from(*v)),
            Value::I64(v) => u64::try_from(*v).ok(),
            Value::U64(v) => Some(*v),
            Value::Char(c) => Some(*c as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64).or_else(|| {
                other.as_u64().map(|v| v as f64)
            }),
        }
    }

    /// Identity comparison used as the equality fallback for two reference
    /// values with no numeric or operator rule.
    pub fn same_reference(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(&a.data, &b.data),
            (Value::Obj(a), Value::Obj(b)) => a.same_instance(b),
            (Value::Delegate(a), Value::Delegate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert a numeric (or char) value to another numeric type.
    ///
    /// Follows C-family explicit conversion semantics: float to int
    /// truncates, narrowing integral conversions wrap.
    pub fn convert_numeric(&self, to: &Ty) -> Option<Value> {
        if matches!(to, Ty::F32 | Ty::F64) {
            let f = self.as_f64()?;
            return Some(match to {
                Ty::F32 => Value::F32(f as f32),
                _ => Value::F64(f),
            });
        }
        // Integral (or char/bool-excluded) target: go through i128 so that
        // u64 values and negative values both survive the trip.
        let wide: i128 = match self {
            Value::I8(v) => i128::from(*v),
            Value::U8(v) => i128::from(*v),
            Value::I16(v) => i128::from(*v),
            Value::U16(v) => i128::from(*v),
            Value::I32(v) => i128::from(*v),
            Value::U32(v) => i128::from(*v),
            Value::I64(v) => i128::from(*v),
            Value::U64(v) => i128::from(*v),
            Value::Char(c) => i128::from(*c as u32),
            Value::F32(v) => *v as i128,
            Value::F64(v) => *v as i128,
            _ => return None,
        };
        Some(match to {
            Ty::I8 => Value::I8(wide as i8),
            Ty::U8 => Value::U8(wide as u8),
            Ty::I16 => Value::I16(wide as i16),
            Ty::U16 => Value::U16(wide as u16),
            Ty::I32 => Value::I32(wide as i32),
            Ty::U32 => Value::U32(wide as u32),
            Ty::I64 => Value::I64(wide as i64),
            Ty::U64 => Value::U64(wide as u64),
            Ty::Char => Value::Char(char::from_u32(wide as u32).unwrap_or('\u{fffd}')),
            _ => return None,
        })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>({})", self.runtime_ty(), self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => format_float(f, f64::from(*v)),
            Value::F64(v) => format_float(f, *v),
            Value::Array(a) => {
                write!(f, "[")?;
                let items = a.data.lock().expect("array lock poisoned");
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Delegate(d) => write!(f, "delegate({} bound)", d.list.len()),
            Value::Obj(o) => write!(f, "object#{}", o.ty.0),
        }
    }
}

/// Print floats so that whole numbers keep a trailing `.0`.
fn format_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.fract() == 0.0 && value.is_finite() {
        write!(f, "{:.1}", value)
    } else {
        write!(f, "{}", value)
    }
}
