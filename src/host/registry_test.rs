use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::registry::Registry;
use super::value::{Ty, Value};
use super::{HostModel, MemberKind, Param, Signature};

fn respond(value: Value) -> super::registry::HostFn {
    Arc::new(move |_, _| Ok(value.clone()))
}

#[test]
fn fields_round_trip() {
    let mut reg = Registry::new();
    let player = reg.add_class("Player", None);
    let health = reg.add_field(player, "Health", Ty::I32);

    let instance = reg.blank_instance(player);
    assert_eq!(reg.get(Some(&instance), health).unwrap().as_i64(), Some(0));

    reg.set(Some(&instance), health, Value::I32(75)).unwrap();
    assert_eq!(reg.get(Some(&instance), health).unwrap().as_i64(), Some(75));
}

#[test]
fn inherited_members_are_found() {
    let mut reg = Registry::new();
    let base = reg.add_class("Entity", None);
    reg.add_field(base, "Id", Ty::I32);
    let derived = reg.add_class("Player", Some(base));
    reg.add_field(derived, "Health", Ty::I32);

    let found = reg.find_members(derived, "Id", false, true);
    assert_eq!(found.len(), 1);
    assert_eq!(reg.member_kind(found[0]), MemberKind::Field);

    // Derived instances carry base field slots too.
    let instance = reg.blank_instance(derived);
    assert_eq!(reg.get(Some(&instance), found[0]).unwrap().as_i64(), Some(0));
}

#[test]
fn safe_mode_hides_private_members() {
    let mut reg = Registry::new();
    let ty = reg.add_class("Secrets", None);
    reg.add_private_field(ty, "Hidden", Ty::I32);
    reg.add_field(ty, "Visible", Ty::I32);

    assert!(reg.find_members(ty, "Hidden", false, true).is_empty());
    assert_eq!(reg.find_members(ty, "Hidden", false, false).len(), 1);

    let names = reg.member_names(ty, false, true);
    assert_eq!(names, vec!["Visible"]);
}

#[test]
fn value_type_fields_copy_on_read() {
    let mut reg = Registry::new();
    let point = reg.add_struct("Point");
    let x = reg.add_field(point, "X", Ty::I32);
    let holder = reg.add_class("Holder", None);
    let pos = reg.add_field(holder, "Pos", Ty::Object(point));

    let h = reg.blank_instance(holder);
    reg.set(Some(&h), pos, reg.blank_instance(point)).unwrap();

    // Mutating the copy must not touch the stored struct.
    let copy = reg.get(Some(&h), pos).unwrap();
    reg.set(Some(&copy), x, Value::I32(9)).unwrap();
    let fresh = reg.get(Some(&h), pos).unwrap();
    assert_eq!(reg.get(Some(&fresh), x).unwrap().as_i64(), Some(0));
}

#[test]
fn static_fields_live_in_registry() {
    let mut reg = Registry::new();
    let ty = reg.add_class("Counter", None);
    let total = reg.add_static_field(ty, "Total", Ty::I32, Value::I32(10));

    assert_eq!(reg.get(None, total).unwrap().as_i64(), Some(10));
    reg.set(None, total, Value::I32(11)).unwrap();
    assert_eq!(reg.get(None, total).unwrap().as_i64(), Some(11));
}

#[test]
fn methods_invoke_through_closures() {
    let mut reg = Registry::new();
    let ty = reg.add_class("Math", None);
    let double = reg.add_static_method(
        ty,
        "Double",
        Signature::new(vec![Param::required("x", Ty::I32)], Ty::I32),
        Arc::new(|_, args| {
            let x = args[0].as_i64().expect("typed argument");
            Ok(Value::I64(x * 2).convert_numeric(&Ty::I32).expect("fits"))
        }),
    );

    let out = reg.invoke(None, double, &[Value::I32(21)]).unwrap();
    assert_eq!(out.as_i64(), Some(42));
}

#[test]
fn default_construct_prefers_declared_ctor() {
    let mut reg = Registry::new();
    let ty = reg.add_class("Widget", None);
    reg.add_field(ty, "Tag", Ty::I32);
    reg.add_ctor(
        ty,
        vec![],
        respond(Value::Str("sentinel".into())),
    );

    // The sentinel proves the explicit ctor ran instead of blank_instance.
    let out = reg.default_construct(ty).unwrap();
    assert_eq!(out.as_str().map(|s| s.as_str()), Some("sentinel"));
}

#[test]
fn enumerable_snapshot() {
    let mut reg = Registry::new();
    let ty = reg.add_class("Bag", None);
    reg.set_enumerable(
        ty,
        Ty::I32,
        Arc::new(|_| Ok(vec![Value::I32(1), Value::I32(2), Value::I32(3)])),
    );

    let instance = reg.blank_instance(ty);
    let mut e = reg.enumerate(&instance).unwrap();
    let mut seen = Vec::new();
    while e.move_next().unwrap() {
        seen.push(e.current().unwrap().as_i64().unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn events_combine_and_remove() {
    use super::value::{BoundMember, DelegateVal};

    let mut reg = Registry::new();
    let action = reg.add_delegate_type("Action", Signature::new(vec![], Ty::Void));
    let ty = reg.add_class("Button", None);
    let handler_owner = reg.add_class("Handlers", None);
    let on_click = reg.add_method(
        handler_owner,
        "OnClick",
        Signature::new(vec![], Ty::Void),
        respond(Value::Null),
    );
    let clicked = reg.add_event(ty, "Clicked", action);

    let button = reg.blank_instance(ty);
    let handler = Value::Delegate(Arc::new(DelegateVal {
        ty: action,
        list: vec![BoundMember {
            target: None,
            member: on_click,
        }],
    }));

    reg.event_add(Some(&button), clicked, handler.clone()).unwrap();
    let stored = reg.get(Some(&button), clicked).unwrap();
    assert!(matches!(stored, Value::Delegate(ref d) if d.list.len() == 1));

    reg.event_remove(Some(&button), clicked, handler).unwrap();
    assert!(reg.get(Some(&button), clicked).unwrap().is_null());
}
