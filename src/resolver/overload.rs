//! Overload selection.
//!
//! Candidates are filtered by arity and implicit convertibility of
//! every argument, then compared pairwise: fewer defaulted optional
//! parameters wins, then per-parameter inheritance distance (an exact
//! type match is distance zero, each base-class hop adds one, any
//! other implicit conversion carries no preference), then a
//! non-variadic candidate beats a variadic one. A single unbeaten
//! candidate wins; none or several is an error. The outcome never
//! depends on declaration order.

use smallvec::SmallVec;

use crate::host::value::Ty;
use crate::host::{inheritance_distance, HostModel, MemberRef, Signature};

/// An implicit conversion that is allowed but expresses no preference.
const FAR: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub member: MemberRef,
    pub sig: Signature,
}

#[derive(Debug, Clone)]
pub struct OverloadChoice {
    /// Index into the candidate slice.
    pub index: usize,
    pub member: MemberRef,
    /// Target type for each supplied argument, for conversion insertion.
    pub param_tys: Vec<Ty>,
    pub ret: Ty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadFailure {
    /// No candidate accepts the argument list.
    NoMatch,
    /// More than one candidate remains after comparison.
    Ambiguous,
}

struct Fit {
    index: usize,
    defaulted: usize,
    distances: SmallVec<[u32; 4]>,
    variadic: bool,
    param_tys: Vec<Ty>,
    ret: Ty,
}

/// Pick the unique best candidate for the given argument types.
pub fn pick_overload(
    host: &dyn HostModel,
    candidates: &[Candidate],
    args: &[Ty],
) -> Result<OverloadChoice, OverloadFailure> {
    let fits: Vec<Fit> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, c)| fit(host, index, &c.sig, args))
        .collect();
    if fits.is_empty() {
        return Err(OverloadFailure::NoMatch);
    }

    let unbeaten: Vec<&Fit> = fits
        .iter()
        .filter(|a| !fits.iter().any(|b| beats(b, a)))
        .collect();
    match unbeaten.as_slice() {
        [only] => Ok(OverloadChoice {
            index: only.index,
            member: candidates[only.index].member,
            param_tys: only.param_tys.clone(),
            ret: only.ret.clone(),
        }),
        _ => Err(OverloadFailure::Ambiguous),
    }
}

/// Check one signature against the argument list.
fn fit(host: &dyn HostModel, index: usize, sig: &Signature, args: &[Ty]) -> Option<Fit> {
    let variadic = sig.is_variadic();
    let fixed = if variadic { sig.params.len() - 1 } else { sig.params.len() };

    let required = sig
        .params
        .iter()
        .take(fixed)
        .filter(|p| !p.optional)
        .count();
    if args.len() < required {
        return None;
    }
    if !variadic && args.len() > sig.params.len() {
        return None;
    }

    let mut distances = SmallVec::new();
    let mut param_tys = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let target = if i < fixed {
            &sig.params[i].ty
        } else {
            // Extra arguments slot into the variadic tail.
            &sig.params[fixed].ty
        };
        distances.push(distance(host, arg, target)?);
        param_tys.push(target.clone());
    }

    Some(Fit {
        index,
        defaulted: fixed.saturating_sub(args.len()),
        distances,
        variadic: variadic && args.len() >= fixed,
        param_tys,
        ret: sig.ret.clone(),
    })
}

/// Per-parameter preference distance, or `None` when not convertible.
fn distance(host: &dyn HostModel, arg: &Ty, target: &Ty) -> Option<u32> {
    if arg == target {
        return (!matches!(arg, Ty::Void)).then_some(0);
    }
    match (arg, target) {
        (Ty::Null, t) if t.is_reference() => Some(FAR),
        (Ty::Object(a), Ty::Object(b)) => inheritance_distance(host, *a, *b),
        (_, Ty::Any) if !matches!(arg, Ty::Void) => Some(FAR),
        _ => super::numeric_widens(arg, target).then_some(FAR),
    }
}

/// Strict betterness; returns false for equal or incomparable fits.
fn beats(a: &Fit, b: &Fit) -> bool {
    if a.defaulted != b.defaulted {
        return a.defaulted < b.defaulted;
    }
    let mut better = false;
    let mut worse = false;
    for (da, db) in a.distances.iter().zip(&b.distances) {
        if da < db {
            better = true;
        } else if da > db {
            worse = true;
        }
    }
    if better && !worse {
        return true;
    }
    if worse {
        return false;
    }
    // Distances tied everywhere; prefer the non-variadic form.
    !a.variadic && b.variadic
}
