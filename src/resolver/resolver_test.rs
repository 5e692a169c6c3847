use pretty_assertions::assert_eq;

use crate::ast::UnaryOp;
use crate::host::registry::Registry;
use crate::host::value::Ty;
use crate::host::{MemberRef, Param, Signature};

use super::overload::{pick_overload, Candidate, OverloadFailure};
use super::promote::{promote_binary, promote_shift, promote_unary};
use super::*;

#[test]
fn binary_promotion_ladder() {
    assert_eq!(promote_binary("+", &Ty::I32, &Ty::I32).unwrap(), Ty::I32);
    assert_eq!(promote_binary("+", &Ty::I8, &Ty::U8).unwrap(), Ty::I32);
    assert_eq!(promote_binary("+", &Ty::Char, &Ty::Char).unwrap(), Ty::I32);
    assert_eq!(promote_binary("+", &Ty::U32, &Ty::U32).unwrap(), Ty::U32);
    assert_eq!(promote_binary("+", &Ty::U32, &Ty::I32).unwrap(), Ty::I64);
    assert_eq!(promote_binary("+", &Ty::U32, &Ty::I64).unwrap(), Ty::I64);
    assert_eq!(promote_binary("+", &Ty::U64, &Ty::U8).unwrap(), Ty::U64);
    assert_eq!(promote_binary("+", &Ty::I32, &Ty::F32).unwrap(), Ty::F32);
    assert_eq!(promote_binary("+", &Ty::F32, &Ty::F64).unwrap(), Ty::F64);
}

#[test]
fn mixed_sign_64_bit_is_rejected() {
    assert_eq!(
        promote_binary("+", &Ty::U64, &Ty::I64),
        Err(ResolveError::MixedSign { op: "+" })
    );
    assert_eq!(
        promote_binary("*", &Ty::I32, &Ty::U64),
        Err(ResolveError::MixedSign { op: "*" })
    );
}

#[test]
fn promotion_is_symmetric() {
    let tys = [Ty::I8, Ty::U16, Ty::I32, Ty::U32, Ty::I64, Ty::F32, Ty::F64];
    for a in &tys {
        for b in &tys {
            assert_eq!(promote_binary("+", a, b), promote_binary("+", b, a));
        }
    }
}

#[test]
fn unary_promotion() {
    assert_eq!(promote_unary(UnaryOp::Neg, &Ty::I16).unwrap(), Ty::I32);
    assert_eq!(promote_unary(UnaryOp::Neg, &Ty::U32).unwrap(), Ty::I64);
    assert!(promote_unary(UnaryOp::Neg, &Ty::U64).is_err());
    assert_eq!(promote_unary(UnaryOp::BitNot, &Ty::U8).unwrap(), Ty::I32);
    assert!(promote_unary(UnaryOp::BitNot, &Ty::F64).is_err());
    assert_eq!(promote_shift("<<", &Ty::I16).unwrap(), Ty::I32);
    assert_eq!(promote_shift("<<", &Ty::U64).unwrap(), Ty::U64);
}

#[test]
fn implicit_conversions() {
    let reg = Registry::new();
    assert!(implicit_convertible(&reg, &Ty::I32, &Ty::I64));
    assert!(implicit_convertible(&reg, &Ty::U32, &Ty::I64));
    assert!(!implicit_convertible(&reg, &Ty::I64, &Ty::I32));
    assert!(!implicit_convertible(&reg, &Ty::U32, &Ty::I32));
    assert!(implicit_convertible(&reg, &Ty::Null, &Ty::Str));
    assert!(!implicit_convertible(&reg, &Ty::Null, &Ty::I32));
    assert!(implicit_convertible(&reg, &Ty::Str, &Ty::Any));
    assert!(implicit_convertible(&reg, &Ty::Char, &Ty::I32));
    assert!(!implicit_convertible(&reg, &Ty::I32, &Ty::Char));
}

#[test]
fn subtype_conversion_follows_base_chain() {
    let mut reg = Registry::new();
    let base = reg.add_class("Base", None);
    let mid = reg.add_class("Mid", Some(base));
    let leaf = reg.add_class("Leaf", Some(mid));
    assert!(implicit_convertible(&reg, &Ty::Object(leaf), &Ty::Object(base)));
    assert!(!implicit_convertible(&reg, &Ty::Object(base), &Ty::Object(leaf)));
    assert_eq!(
        classify_cast(&reg, &Ty::Object(leaf), &Ty::Object(base)),
        Some(CastKind::Up)
    );
    assert_eq!(
        classify_cast(&reg, &Ty::Object(base), &Ty::Object(leaf)),
        Some(CastKind::Down)
    );
}

#[test]
fn cast_classification() {
    let reg = Registry::new();
    assert_eq!(classify_cast(&reg, &Ty::I32, &Ty::I32), Some(CastKind::Identity));
    assert_eq!(classify_cast(&reg, &Ty::F64, &Ty::U8), Some(CastKind::Numeric));
    assert_eq!(classify_cast(&reg, &Ty::Char, &Ty::I32), Some(CastKind::Numeric));
    assert_eq!(classify_cast(&reg, &Ty::Any, &Ty::Str), Some(CastKind::Down));
    assert_eq!(classify_cast(&reg, &Ty::Str, &Ty::I32), None);
}

fn cand(n: u64, params: Vec<Param>) -> Candidate {
    Candidate {
        member: MemberRef(n),
        sig: Signature::new(params, Ty::Void),
    }
}

#[test]
fn overload_exact_match_beats_widening() {
    let reg = Registry::new();
    let cs = [
        cand(0, vec![Param::required("x", Ty::I64)]),
        cand(1, vec![Param::required("x", Ty::I32)]),
    ];
    let chosen = pick_overload(&reg, &cs, &[Ty::I32]).unwrap();
    assert_eq!(chosen.member, MemberRef(1));

    // The same set in the opposite declaration order picks the same one.
    let flipped = [cs[1].clone(), cs[0].clone()];
    let chosen = pick_overload(&reg, &flipped, &[Ty::I32]).unwrap();
    assert_eq!(chosen.member, MemberRef(1));
}

#[test]
fn overload_prefers_nearer_base_class() {
    let mut reg = Registry::new();
    let base = reg.add_class("Base", None);
    let mid = reg.add_class("Mid", Some(base));
    let leaf = reg.add_class("Leaf", Some(mid));
    let cs = [
        cand(0, vec![Param::required("x", Ty::Object(base))]),
        cand(1, vec![Param::required("x", Ty::Object(mid))]),
    ];
    let chosen = pick_overload(&reg, &cs, &[Ty::Object(leaf)]).unwrap();
    assert_eq!(chosen.member, MemberRef(1));
}

#[test]
fn overload_no_match_and_ambiguity() {
    let reg = Registry::new();
    let cs = [cand(0, vec![Param::required("x", Ty::Str)])];
    assert_eq!(
        pick_overload(&reg, &cs, &[Ty::I32]).unwrap_err(),
        OverloadFailure::NoMatch
    );

    // Two widening conversions express no preference either way.
    let cs = [
        cand(0, vec![Param::required("x", Ty::I64)]),
        cand(1, vec![Param::required("x", Ty::F64)]),
    ];
    assert_eq!(
        pick_overload(&reg, &cs, &[Ty::I32]).unwrap_err(),
        OverloadFailure::Ambiguous
    );
}

#[test]
fn overload_optionals_and_variadics() {
    let reg = Registry::new();
    let cs = [
        cand(0, vec![Param::required("x", Ty::I32), Param::optional("y", Ty::I32)]),
        cand(1, vec![Param::required("x", Ty::I32)]),
    ];
    // Fewer defaulted optionals wins when only one argument is given.
    let chosen = pick_overload(&reg, &cs, &[Ty::I32]).unwrap();
    assert_eq!(chosen.member, MemberRef(1));
    // Two arguments only fit the optional form.
    let chosen = pick_overload(&reg, &cs, &[Ty::I32, Ty::I32]).unwrap();
    assert_eq!(chosen.member, MemberRef(0));

    let cs = [
        cand(0, vec![Param::variadic("xs", Ty::I32)]),
        cand(1, vec![Param::required("x", Ty::I32)]),
    ];
    // Non-variadic beats variadic on a tie.
    let chosen = pick_overload(&reg, &cs, &[Ty::I32]).unwrap();
    assert_eq!(chosen.member, MemberRef(1));
    // Extra arguments flow into the variadic tail.
    let chosen = pick_overload(&reg, &cs, &[Ty::I32, Ty::I32, Ty::I32]).unwrap();
    assert_eq!(chosen.member, MemberRef(0));
    assert_eq!(chosen.param_tys, vec![Ty::I32, Ty::I32, Ty::I32]);
}
