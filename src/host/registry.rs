//! Hand-written host model backend.
//!
//! `Registry` is the reference implementation of [`HostModel`]: hosts (and
//! this crate's tests) describe their types, fields, properties, methods,
//! constructors, and events up front, backed by closures and slot-indexed
//! instance storage. Runtimes with real reflection can ignore this module
//! entirely and implement the trait directly.

use std::sync::{Arc, Mutex};

use ecow::EcoString;
use hashbrown::HashMap;

use super::value::{DelegateVal, HostInstance, Ty, TypeRef, Value};
use super::{Enumerator, HostError, HostModel, MemberKind, MemberRef, Param, Signature};

/// A bound accessor or invoker supplied by the host.
///
/// Receives the instance (`None` for statics/constructors) and the argument
/// values; property getters receive no arguments, setters receive exactly
/// one.
pub type HostFn =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Snapshot producer for enumerable host types.
pub type EnumerateFn = Arc<dyn Fn(&Value) -> Result<Vec<Value>, HostError> + Send + Sync>;

struct TypeData {
    name: EcoString,
    base: Option<TypeRef>,
    value_type: bool,
    generic_arity: usize,
    element: Option<Ty>,
    enumerate: Option<EnumerateFn>,
    delegate_sig: Option<Signature>,
    members: Vec<MemberRef>,
    /// Instance field slot count, including inherited slots.
    slots: usize,
}

enum MemberBody {
    /// Instance field stored at a slot index.
    Slot(usize),
    /// Static field stored in the registry.
    StaticSlot(usize),
    /// Property accessors.
    Accessors { get: Option<HostFn>, set: Option<HostFn> },
    /// Method or constructor body.
    Invoke(HostFn),
    /// Event backed by an instance slot holding null-or-delegate.
    Event(usize),
    /// Nested type reference.
    Nested(TypeRef),
}

struct MemberData {
    owner: TypeRef,
    name: EcoString,
    kind: MemberKind,
    is_static: bool,
    public: bool,
    ty: Ty,
    sig: Option<Signature>,
    body: MemberBody,
}

/// Closure-backed host type model.
pub struct Registry {
    types: Vec<TypeData>,
    members: Vec<MemberData>,
    statics: Vec<Mutex<Value>>,
    /// Pre-registered generic instantiations: (definition, args) -> bound type.
    generic_instances: HashMap<(TypeRef, Vec<Ty>), TypeRef>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            members: Vec::new(),
            statics: Vec::new(),
            generic_instances: HashMap::new(),
        }
    }

    // ── Type registration ──────────────────────────────────────────────

    /// Register a reference type. Base types must be registered first so
    /// their field slots are known.
    pub fn add_class(&mut self, name: &str, base: Option<TypeRef>) -> TypeRef {
        self.add_type(name, base, false, 0)
    }

    /// Register a value type (copied on read, written back after mutation).
    pub fn add_struct(&mut self, name: &str) -> TypeRef {
        self.add_type(name, None, true, 0)
    }

    /// Register a generic type definition with the given arity.
    pub fn add_generic_class(&mut self, name: &str, arity: usize) -> TypeRef {
        self.add_type(name, None, false, arity)
    }

    /// Register a delegate type with the signature of its `Invoke`.
    pub fn add_delegate_type(&mut self, name: &str, sig: Signature) -> TypeRef {
        let tref = self.add_type(name, None, false, 0);
        self.types[tref.0 as usize].delegate_sig = Some(sig);
        tref
    }

    fn add_type(
        &mut self,
        name: &str,
        base: Option<TypeRef>,
        value_type: bool,
        generic_arity: usize,
    ) -> TypeRef {
        let slots = base.map_or(0, |b| self.types[b.0 as usize].slots);
        let tref = TypeRef(self.types.len() as u32);
        self.types.push(TypeData {
            name: name.into(),
            base,
            value_type,
            generic_arity,
            element: None,
            enumerate: None,
            delegate_sig: None,
            members: Vec::new(),
            slots,
        });
        tref
    }

    /// Mark a type as enumerable, yielding `element`-typed values through
    /// the supplied snapshot closure.
    pub fn set_enumerable(&mut self, ty: TypeRef, element: Ty, f: EnumerateFn) {
        let data = &mut self.types[ty.0 as usize];
        data.element = Some(element);
        data.enumerate = Some(f);
    }

    /// Declare that binding `definition` with `args` produces `bound`.
    pub fn register_generic_instance(&mut self, definition: TypeRef, args: &[Ty], bound: TypeRef) {
        self.generic_instances
            .insert((definition, args.to_vec()), bound);
    }

    // ── Member registration ────────────────────────────────────────────

    pub fn add_field(&mut self, ty: TypeRef, name: &str, field_ty: Ty) -> MemberRef {
        self.field_impl(ty, name, field_ty, true)
    }

    /// Non-public field; hidden when safe mode is on.
    pub fn add_private_field(&mut self, ty: TypeRef, name: &str, field_ty: Ty) -> MemberRef {
        self.field_impl(ty, name, field_ty, false)
    }

    fn field_impl(&mut self, ty: TypeRef, name: &str, field_ty: Ty, public: bool) -> MemberRef {
        let slot = self.types[ty.0 as usize].slots;
        self.types[ty.0 as usize].slots += 1;
        self.push_member(MemberData {
            owner: ty,
            name: name.into(),
            kind: MemberKind::Field,
            is_static: false,
            public,
            ty: field_ty,
            sig: None,
            body: MemberBody::Slot(slot),
        })
    }

    pub fn add_static_field(
        &mut self,
        ty: TypeRef,
        name: &str,
        field_ty: Ty,
        initial: Value,
    ) -> MemberRef {
        let idx = self.statics.len();
        self.statics.push(Mutex::new(initial));
        self.push_member(MemberData {
            owner: ty,
            name: name.into(),
            kind: MemberKind::Field,
            is_static: true,
            public: true,
            ty: field_ty,
            sig: None,
            body: MemberBody::StaticSlot(idx),
        })
    }

    pub fn add_property(
        &mut self,
        ty: TypeRef,
        name: &str,
        prop_ty: Ty,
        get: Option<HostFn>,
        set: Option<HostFn>,
    ) -> MemberRef {
        self.push_member(MemberData {
            owner: ty,
            name: name.into(),
            kind: MemberKind::Property,
            is_static: false,
            public: true,
            ty: prop_ty,
            sig: None,
            body: MemberBody::Accessors { get, set },
        })
    }

    /// Indexer property (`this[...]`). The getter receives the index
    /// arguments; the setter receives them followed by the value.
    pub fn add_indexer(
        &mut self,
        ty: TypeRef,
        sig: Signature,
        get: Option<HostFn>,
        set: Option<HostFn>,
    ) -> MemberRef {
        let prop_ty = sig.ret.clone();
        self.push_member(MemberData {
            owner: ty,
            name: INDEXER_NAME.into(),
            kind: MemberKind::Property,
            is_static: false,
            public: true,
            ty: prop_ty,
            sig: Some(sig),
            body: MemberBody::Accessors { get, set },
        })
    }

    pub fn add_method(
        &mut self,
        ty: TypeRef,
        name: &str,
        sig: Signature,
        f: HostFn,
    ) -> MemberRef {
        self.method_impl(ty, name, sig, f, false, true)
    }

    pub fn add_static_method(
        &mut self,
        ty: TypeRef,
        name: &str,
        sig: Signature,
        f: HostFn,
    ) -> MemberRef {
        self.method_impl(ty, name, sig, f, true, true)
    }

    /// Non-public method; hidden when safe mode is on.
    pub fn add_private_method(
        &mut self,
        ty: TypeRef,
        name: &str,
        sig: Signature,
        f: HostFn,
    ) -> MemberRef {
        self.method_impl(ty, name, sig, f, false, false)
    }

    fn method_impl(
        &mut self,
        ty: TypeRef,
        name: &str,
        sig: Signature,
        f: HostFn,
        is_static: bool,
        public: bool,
    ) -> MemberRef {
        self.push_member(MemberData {
            owner: ty,
            name: name.into(),
            kind: MemberKind::Method,
            is_static,
            public,
            ty: sig.ret.clone(),
            sig: Some(sig),
            body: MemberBody::Invoke(f),
        })
    }

    /// Register a constructor. The closure receives the argument values and
    /// returns the new instance (see [`Registry::blank_instance`]).
    pub fn add_ctor(&mut self, ty: TypeRef, params: Vec<Param>, f: HostFn) -> MemberRef {
        let sig = Signature::new(params, Ty::Object(ty));
        self.push_member(MemberData {
            owner: ty,
            name: ".ctor".into(),
            kind: MemberKind::Constructor,
            is_static: true,
            public: true,
            ty: Ty::Object(ty),
            sig: Some(sig),
            body: MemberBody::Invoke(f),
        })
    }

    pub fn add_event(&mut self, ty: TypeRef, name: &str, delegate_ty: TypeRef) -> MemberRef {
        let slot = self.types[ty.0 as usize].slots;
        self.types[ty.0 as usize].slots += 1;
        self.push_member(MemberData {
            owner: ty,
            name: name.into(),
            kind: MemberKind::Event,
            is_static: false,
            public: true,
            ty: Ty::Object(delegate_ty),
            sig: None,
            body: MemberBody::Event(slot),
        })
    }

    pub fn add_nested_type(&mut self, ty: TypeRef, name: &str, nested: TypeRef) -> MemberRef {
        self.push_member(MemberData {
            owner: ty,
            name: name.into(),
            kind: MemberKind::NestedType,
            is_static: true,
            public: true,
            ty: Ty::Object(nested),
            sig: None,
            body: MemberBody::Nested(nested),
        })
    }

    fn push_member(&mut self, data: MemberData) -> MemberRef {
        let mref = MemberRef(self.members.len() as u64);
        self.types[data.owner.0 as usize].members.push(mref);
        self.members.push(data);
        mref
    }

    // ── Instance plumbing ──────────────────────────────────────────────

    /// A zero-initialized instance of `ty`, field slots defaulted from
    /// their declared types. Constructor closures start from this.
    pub fn blank_instance(&self, ty: TypeRef) -> Value {
        let mut fields = vec![Value::Null; self.types[ty.0 as usize].slots];
        let mut current = Some(ty);
        while let Some(t) = current {
            for &mref in &self.types[t.0 as usize].members {
                let m = &self.members[mref.0 as usize];
                if let MemberBody::Slot(slot) = m.body {
                    fields[slot] = m.ty.default_value();
                }
            }
            current = self.types[t.0 as usize].base;
        }
        Value::Obj(HostInstance {
            ty,
            data: Arc::new(Mutex::new(fields)),
        })
    }

    /// Write a field slot directly; for use inside constructor closures.
    pub fn write_slot(instance: &Value, slot: usize, value: Value) -> Result<(), HostError> {
        let fields = instance_fields(instance)?;
        let mut guard = fields.lock().expect("instance lock poisoned");
        if slot >= guard.len() {
            return Err(HostError::new(format!("field slot {slot} out of range")));
        }
        guard[slot] = value;
        Ok(())
    }

    /// Read a field slot directly; for use inside host closures.
    pub fn read_slot(instance: &Value, slot: usize) -> Result<Value, HostError> {
        let fields = instance_fields(instance)?;
        let guard = fields.lock().expect("instance lock poisoned");
        guard
            .get(slot)
            .cloned()
            .ok_or_else(|| HostError::new(format!("field slot {slot} out of range")))
    }

    fn member(&self, member: MemberRef) -> &MemberData {
        &self.members[member.0 as usize]
    }

    fn type_data(&self, ty: TypeRef) -> &TypeData {
        &self.types[ty.0 as usize]
    }

    /// Value types are copied when read out of a field so that later
    /// mutation of the copy cannot alias the original storage.
    fn copy_value_semantics(&self, value: &Value) -> Value {
        if let Value::Obj(inst) = value {
            if self.type_data(inst.ty).value_type {
                if let Ok(fields) = instance_fields(value) {
                    let copied: Vec<Value> = fields
                        .lock()
                        .expect("instance lock poisoned")
                        .iter()
                        .map(|v| self.copy_value_semantics(v))
                        .collect();
                    return Value::Obj(HostInstance {
                        ty: inst.ty,
                        data: Arc::new(Mutex::new(copied)),
                    });
                }
            }
        }
        value.clone()
    }
}

/// Member name used for indexer properties.
pub const INDEXER_NAME: &str = "this[]";

fn instance_fields(instance: &Value) -> Result<&Mutex<Vec<Value>>, HostError> {
    let obj = instance
        .as_obj()
        .ok_or_else(|| HostError::new("receiver is not a host object"))?;
    obj.data
        .downcast_ref::<Mutex<Vec<Value>>>()
        .ok_or_else(|| HostError::new("foreign host instance"))
}

struct VecEnumerator {
    items: std::vec::IntoIter<Value>,
    current: Option<Value>,
}

impl Enumerator for VecEnumerator {
    fn move_next(&mut self) -> Result<bool, HostError> {
        self.current = self.items.next();
        Ok(self.current.is_some())
    }

    fn current(&self) -> Result<Value, HostError> {
        self.current
            .clone()
            .ok_or_else(|| HostError::new("enumerator has no current element"))
    }
}

impl HostModel for Registry {
    fn type_name(&self, ty: TypeRef) -> EcoString {
        self.type_data(ty).name.clone()
    }

    fn base_of(&self, ty: TypeRef) -> Option<TypeRef> {
        self.type_data(ty).base
    }

    fn is_value_type(&self, ty: TypeRef) -> bool {
        self.type_data(ty).value_type
    }

    fn find_members(
        &self,
        ty: TypeRef,
        name: &str,
        wants_static: bool,
        safe_mode: bool,
    ) -> Vec<MemberRef> {
        let mut out = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            for &mref in &self.type_data(t).members {
                let m = self.member(mref);
                if m.kind == MemberKind::Constructor {
                    continue;
                }
                if m.name != name || m.is_static != wants_static {
                    continue;
                }
                if safe_mode && !m.public {
                    continue;
                }
                out.push(mref);
            }
            current = self.type_data(t).base;
        }
        out
    }

    fn member_names(&self, ty: TypeRef, wants_static: bool, safe_mode: bool) -> Vec<EcoString> {
        let mut seen = HashMap::new();
        let mut out = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            for &mref in &self.type_data(t).members {
                let m = self.member(mref);
                if m.kind == MemberKind::Constructor || m.name == INDEXER_NAME {
                    continue;
                }
                if m.is_static != wants_static || (safe_mode && !m.public) {
                    continue;
                }
                if seen.insert(m.name.clone(), ()).is_none() {
                    out.push(m.name.clone());
                }
            }
            current = self.type_data(t).base;
        }
        out
    }

    fn member_kind(&self, member: MemberRef) -> MemberKind {
        self.member(member).kind
    }

    fn member_name(&self, member: MemberRef) -> EcoString {
        self.member(member).name.clone()
    }

    fn member_ty(&self, member: MemberRef) -> Ty {
        self.member(member).ty.clone()
    }

    fn signature(&self, member: MemberRef) -> Option<Signature> {
        self.member(member).sig.clone()
    }

    fn constructors(&self, ty: TypeRef, safe_mode: bool) -> Vec<MemberRef> {
        self.type_data(ty)
            .members
            .iter()
            .copied()
            .filter(|&mref| {
                let m = self.member(mref);
                m.kind == MemberKind::Constructor && (!safe_mode || m.public)
            })
            .collect()
    }

    fn indexers(&self, ty: TypeRef, safe_mode: bool) -> Vec<MemberRef> {
        let mut out = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            for &mref in &self.type_data(t).members {
                let m = self.member(mref);
                if m.name == INDEXER_NAME && (!safe_mode || m.public) {
                    out.push(mref);
                }
            }
            current = self.type_data(t).base;
        }
        out
    }

    fn get(&self, instance: Option<&Value>, member: MemberRef) -> Result<Value, HostError> {
        let m = self.member(member);
        match &m.body {
            MemberBody::Slot(slot) => {
                let instance =
                    instance.ok_or_else(|| HostError::new("instance required for field read"))?;
                let value = Registry::read_slot(instance, *slot)?;
                Ok(self.copy_value_semantics(&value))
            }
            MemberBody::StaticSlot(idx) => {
                let value = self.statics[*idx]
                    .lock()
                    .expect("static field lock poisoned")
                    .clone();
                Ok(self.copy_value_semantics(&value))
            }
            MemberBody::Accessors { get, .. } => match get {
                Some(f) => f(instance, &[]),
                None => Err(HostError::new(format!("property {} has no getter", m.name))),
            },
            MemberBody::Event(slot) => {
                let instance =
                    instance.ok_or_else(|| HostError::new("instance required for event read"))?;
                Registry::read_slot(instance, *slot)
            }
            MemberBody::Invoke(_) | MemberBody::Nested(_) => {
                Err(HostError::new(format!("{} is not a readable member", m.name)))
            }
        }
    }

    fn set(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        value: Value,
    ) -> Result<(), HostError> {
        let m = self.member(member);
        let value = self.copy_value_semantics(&value);
        match &m.body {
            MemberBody::Slot(slot) => {
                let instance =
                    instance.ok_or_else(|| HostError::new("instance required for field write"))?;
                Registry::write_slot(instance, *slot, value)
            }
            MemberBody::StaticSlot(idx) => {
                *self.statics[*idx]
                    .lock()
                    .expect("static field lock poisoned") = value;
                Ok(())
            }
            MemberBody::Accessors { set, .. } => match set {
                Some(f) => f(instance, std::slice::from_ref(&value)).map(|_| ()),
                None => Err(HostError::new(format!("property {} has no setter", m.name))),
            },
            MemberBody::Event(slot) => {
                let instance =
                    instance.ok_or_else(|| HostError::new("instance required for event write"))?;
                Registry::write_slot(instance, *slot, value)
            }
            MemberBody::Invoke(_) | MemberBody::Nested(_) => {
                Err(HostError::new(format!("{} is not a writable member", m.name)))
            }
        }
    }

    fn can_write(&self, member: MemberRef) -> bool {
        match &self.member(member).body {
            MemberBody::Slot(_) | MemberBody::StaticSlot(_) | MemberBody::Event(_) => true,
            MemberBody::Accessors { set, .. } => set.is_some(),
            MemberBody::Invoke(_) | MemberBody::Nested(_) => false,
        }
    }

    fn set_index(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        args: &[Value],
        value: Value,
    ) -> Result<(), HostError> {
        let m = self.member(member);
        match &m.body {
            MemberBody::Accessors { set, .. } => match set {
                Some(f) => {
                    let mut full = args.to_vec();
                    full.push(self.copy_value_semantics(&value));
                    f(instance, &full).map(|_| ())
                }
                None => Err(HostError::new(format!("indexer {} has no setter", m.name))),
            },
            _ => Err(HostError::new(format!("{} is not an indexer", m.name))),
        }
    }

    fn invoke(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let m = self.member(member);
        match &m.body {
            MemberBody::Invoke(f) => f(instance, args),
            MemberBody::Accessors { get, .. } => match get {
                // Indexer reads arrive here with the index arguments.
                Some(f) => f(instance, args),
                None => Err(HostError::new(format!("property {} has no getter", m.name))),
            },
            _ => Err(HostError::new(format!("{} is not invokable", m.name))),
        }
    }

    fn construct(&self, member: MemberRef, args: &[Value]) -> Result<Value, HostError> {
        let m = self.member(member);
        match &m.body {
            MemberBody::Invoke(f) if m.kind == MemberKind::Constructor => f(None, args),
            _ => Err(HostError::new(format!("{} is not a constructor", m.name))),
        }
    }

    fn default_construct(&self, ty: TypeRef) -> Result<Value, HostError> {
        // Prefer an explicit zero-arity constructor when one exists.
        for mref in self.constructors(ty, false) {
            let m = self.member(mref);
            if m.sig.as_ref().is_some_and(|s| s.required_arity() == 0) {
                return self.construct(mref, &[]);
            }
        }
        Ok(self.blank_instance(ty))
    }

    fn event_add(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        handler: Value,
    ) -> Result<(), HostError> {
        let current = self.get(instance, member)?;
        let combined = combine_delegates(&current, &handler)?;
        self.set(instance, member, combined)
    }

    fn event_remove(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        handler: Value,
    ) -> Result<(), HostError> {
        let current = self.get(instance, member)?;
        let remaining = remove_delegates(&current, &handler)?;
        self.set(instance, member, remaining)
    }

    fn delegate_signature(&self, ty: TypeRef) -> Option<Signature> {
        self.type_data(ty).delegate_sig.clone()
    }

    fn generic_arity(&self, ty: TypeRef) -> usize {
        self.type_data(ty).generic_arity
    }

    fn bind_generic(&self, ty: TypeRef, args: &[Ty]) -> Result<TypeRef, HostError> {
        self.generic_instances
            .get(&(ty, args.to_vec()))
            .copied()
            .ok_or_else(|| {
                HostError::new(format!(
                    "no instantiation of {} registered for the given type arguments",
                    self.type_data(ty).name
                ))
            })
    }

    fn element_ty(&self, ty: TypeRef) -> Option<Ty> {
        self.type_data(ty).element.clone()
    }

    fn enumerate(&self, collection: &Value) -> Result<Box<dyn Enumerator>, HostError> {
        let obj = collection
            .as_obj()
            .ok_or_else(|| HostError::new("collection is not a host object"))?;
        let f = self
            .type_data(obj.ty)
            .enumerate
            .as_ref()
            .ok_or_else(|| {
                HostError::new(format!(
                    "{} does not expose an enumerator",
                    self.type_data(obj.ty).name
                ))
            })?;
        let items = f(collection)?;
        Ok(Box::new(VecEnumerator {
            items: items.into_iter(),
            current: None,
        }))
    }
}

/// Combine two delegate values into one invocation list.
pub fn combine_delegates(lhs: &Value, rhs: &Value) -> Result<Value, HostError> {
    match (lhs, rhs) {
        (Value::Null, other) | (other, Value::Null) => Ok(other.clone()),
        (Value::Delegate(a), Value::Delegate(b)) => {
            let mut list = a.list.clone();
            list.extend(b.list.iter().cloned());
            Ok(Value::Delegate(Arc::new(DelegateVal { ty: a.ty, list })))
        }
        _ => Err(HostError::new("operands are not delegates")),
    }
}

/// Remove the entries of `rhs` from `lhs`, last occurrence first.
pub fn remove_delegates(lhs: &Value, rhs: &Value) -> Result<Value, HostError> {
    match (lhs, rhs) {
        (other, Value::Null) => Ok(other.clone()),
        (Value::Null, _) => Ok(Value::Null),
        (Value::Delegate(a), Value::Delegate(b)) => {
            let mut list = a.list.clone();
            for entry in &b.list {
                if let Some(pos) = list.iter().rposition(|e| {
                    e.member == entry.member
                        && match (&e.target, &entry.target) {
                            (None, None) => true,
                            (Some(x), Some(y)) => x.same_reference(y),
                            _ => false,
                        }
                }) {
                    list.remove(pos);
                }
            }
            if list.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Delegate(Arc::new(DelegateVal { ty: a.ty, list })))
            }
        }
        _ => Err(HostError::new("operands are not delegates")),
    }
}
