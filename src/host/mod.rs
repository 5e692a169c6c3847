//! The host type model: the external capability the interpreter consumes to
//! discover and invoke members on live application objects.
//!
//! The core never assumes a specific reflection mechanism. Any object model
//! that implements [`HostModel`] is sufficient: a reflection bridge, a
//! generated registry of bound accessors, or the hand-written
//! [`registry::Registry`] adapter shipped with this crate.

pub mod registry;
pub mod value;

#[cfg(test)]
mod registry_test;

use ecow::EcoString;
use thiserror::Error;

use value::{Ty, TypeRef, Value};

/// Opaque identifier for a member (field, property, method, constructor,
/// event, or nested type), issued by the host type model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef(pub u64);

/// What kind of member a [`MemberRef`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Constructor,
    Event,
    NestedType,
}

/// A declared parameter of a method, constructor, or indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: EcoString,
    pub ty: Ty,
    /// Trailing optional parameter; may be omitted at the call site.
    pub optional: bool,
    /// Trailing variadic parameter; absorbs any number of extra arguments.
    pub variadic: bool,
}

impl Param {
    pub fn required(name: &str, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            variadic: false,
        }
    }

    pub fn optional(name: &str, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: true,
            variadic: false,
        }
    }

    pub fn variadic(name: &str, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            variadic: true,
        }
    }
}

/// Declared signature of an invokable member.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub ret: Ty,
}

impl Signature {
    pub fn new(params: Vec<Param>, ret: Ty) -> Self {
        Self { params, ret }
    }

    /// Number of parameters that must be supplied at every call site.
    pub fn required_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.optional && !p.variadic)
            .count()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }
}

/// Failure raised by a host model operation.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Enumerator capability consumed by `foreach` over host collections.
///
/// Mirrors the enumerator shape the resolver checks for at parse time: a
/// boolean "advance" operation plus a "current" accessor.
pub trait Enumerator {
    fn move_next(&mut self) -> Result<bool, HostError>;
    fn current(&self) -> Result<Value, HostError>;
}

/// The host type model contract.
///
/// `safe_mode` filters out non-public members wherever it appears; the
/// interpreter threads the flag through from [`EngineOptions`]
/// (`crate::api::EngineOptions`) unchanged.
pub trait HostModel: Send + Sync {
    /// Short display name of a type (`"Player"`, not the namespace path).
    fn type_name(&self, ty: TypeRef) -> EcoString;

    /// Direct base type, or `None` for a root type.
    fn base_of(&self, ty: TypeRef) -> Option<TypeRef>;

    /// Value types are copied on read and need write-back after mutation
    /// through a member chain.
    fn is_value_type(&self, ty: TypeRef) -> bool;

    /// All members of `ty` (including inherited ones) with the given name
    /// and staticness. Method groups come back as multiple entries.
    fn find_members(
        &self,
        ty: TypeRef,
        name: &str,
        wants_static: bool,
        safe_mode: bool,
    ) -> Vec<MemberRef>;

    /// Every member name visible on `ty`, for suggestion lists.
    fn member_names(&self, ty: TypeRef, wants_static: bool, safe_mode: bool) -> Vec<EcoString>;

    fn member_kind(&self, member: MemberRef) -> MemberKind;

    fn member_name(&self, member: MemberRef) -> EcoString;

    /// Declared type of a field/property/event, or the return type of a
    /// method/constructor.
    fn member_ty(&self, member: MemberRef) -> Ty;

    /// Signature of a method, constructor, or indexer; `None` for data
    /// members.
    fn signature(&self, member: MemberRef) -> Option<Signature>;

    /// Whether a field/property/event member accepts writes.
    fn can_write(&self, member: MemberRef) -> bool;

    /// Declared constructors of `ty`.
    fn constructors(&self, ty: TypeRef, safe_mode: bool) -> Vec<MemberRef>;

    /// Indexer properties of `ty` (`this[...]` accessors).
    fn indexers(&self, ty: TypeRef, safe_mode: bool) -> Vec<MemberRef>;

    /// Read a field or property. `instance` is `None` for static members.
    fn get(&self, instance: Option<&Value>, member: MemberRef) -> Result<Value, HostError>;

    /// Write a field or property. For value-type receivers the mutation
    /// lands in the copy the caller holds; the caller performs write-back.
    fn set(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        value: Value,
    ) -> Result<(), HostError>;

    /// Write through an indexer property: index arguments plus the value.
    fn set_index(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        args: &[Value],
        value: Value,
    ) -> Result<(), HostError>;

    /// Invoke a method.
    fn invoke(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        args: &[Value],
    ) -> Result<Value, HostError>;

    /// Invoke a constructor.
    fn construct(&self, member: MemberRef, args: &[Value]) -> Result<Value, HostError>;

    /// Construct with no arguments and all fields zero-initialized.
    fn default_construct(&self, ty: TypeRef) -> Result<Value, HostError>;

    fn event_add(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        handler: Value,
    ) -> Result<(), HostError>;

    fn event_remove(
        &self,
        instance: Option<&Value>,
        member: MemberRef,
        handler: Value,
    ) -> Result<(), HostError>;

    /// Signature of a delegate type's `Invoke`, or `None` if `ty` is not a
    /// delegate type.
    fn delegate_signature(&self, ty: TypeRef) -> Option<Signature>;

    /// Number of generic parameters a type definition declares (0 for a
    /// non-generic type).
    fn generic_arity(&self, ty: TypeRef) -> usize;

    /// Bind a generic type definition with concrete arguments.
    fn bind_generic(&self, ty: TypeRef, args: &[Ty]) -> Result<TypeRef, HostError>;

    /// Element type yielded by enumerating `ty`, or `None` when the type
    /// does not expose the enumerator shape. Absence is a resolution-time
    /// failure for `foreach`.
    fn element_ty(&self, ty: TypeRef) -> Option<Ty>;

    /// Produce the enumerator for a collection value.
    fn enumerate(&self, collection: &Value) -> Result<Box<dyn Enumerator>, HostError>;
}

/// Whether `ty` is `of` or derives from it.
pub fn is_subtype_of(host: &dyn HostModel, ty: TypeRef, of: TypeRef) -> bool {
    inheritance_distance(host, ty, of).is_some()
}

/// Number of base-class hops from `ty` up to `of`; `None` when `of` is not
/// an ancestor. Exact type is distance 0.
pub fn inheritance_distance(host: &dyn HostModel, ty: TypeRef, of: TypeRef) -> Option<u32> {
    let mut current = ty;
    let mut hops = 0;
    loop {
        if current == of {
            return Some(hops);
        }
        current = host.base_of(current)?;
        hops += 1;
    }
}
