//! Floating-point rewriting front-end for the solver façade (spec §4.7).
//!
//! The back-end behind [`crate::solver::SolverBackend`] understands
//! bit-vectors only, never IEEE-754 semantics. Before a query leaves
//! [`crate::constraints::ConstraintManager`] every floating-point
//! sub-formula is rewritten into a conservative integer *sufficient*
//! condition: if the rewritten formula is true, the original floating-point
//! relation is guaranteed to hold. The rewriter must never strengthen a
//! query — when it cannot do better it falls back to the boolean constant
//! implied by polarity, never to an approximation that could reject a
//! satisfiable query.

use alloc::vec::Vec;

use crate::error::SimpleResult;
use crate::expr::{
    Builder,
    Expr,
    ExprRef,
    Interner,
};

/// Whether `r` is the result of a floating-point-producing operator (as
/// opposed to a boolean comparison or a plain integer). Casts *to* a float
/// semantics count; casts *from* float to integer do not, since their
/// result is plain integer-typed.
fn produces_float(i: &Interner, r: ExprRef) -> bool {
    matches!(
        i.get(r),
        Expr::FloatConstant(_)
            | Expr::FAdd(..)
            | Expr::FSub(..)
            | Expr::FMul(..)
            | Expr::FDiv(..)
            | Expr::FRem(..)
            | Expr::FSqrt(..)
            | Expr::FSin(..)
            | Expr::FCos(..)
            | Expr::FpExt(..)
            | Expr::FpTrunc(..)
            | Expr::UIntToFp(..)
            | Expr::SIntToFp(..)
    )
}

/// Recognises a single-level `Select(p<q, then, else)` as floating-point
/// `min`/`max` (§4.7: "a `Select` of the form `p<q ? p : q` ... is
/// recognised as floating-point *min*; the analogous pattern for *max*").
/// Returns `(is_min, p, q)` with `p`/`q` in the order they appeared in the
/// comparison, so two recognised trees can be compared as unordered pairs
/// by the caller.
fn recognize_min_max(i: &Interner, r: ExprRef) -> Option<(bool, ExprRef, ExprRef)> {
    let Expr::Select(cond, then, otherwise) = i.get(r) else {
        return None;
    };
    let (cond, then, otherwise) = (*cond, *then, *otherwise);
    match i.get(cond) {
        Expr::FOlt(p, q) | Expr::FUlt(p, q) => {
            let (p, q) = (*p, *q);
            if then == p && otherwise == q {
                Some((true, p, q))
            } else if then == q && otherwise == p {
                Some((false, p, q))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn unordered_pair_eq(a: (ExprRef, ExprRef), b: (ExprRef, ExprRef)) -> bool {
    (a.0 == b.0 && a.1 == b.1) || (a.0 == b.1 && a.1 == b.0)
}

/// Builds a sufficient condition for `a == b` recursively per §4.7,
/// covering `FAdd`/`FSub`/`FMul`/`FDiv`/`FRem` (both operand orderings for
/// the commutative pair), `FpExt`/`FpTrunc` (matching target semantics),
/// `UIntToFp`/`SIntToFp` (matching target semantics, extending the
/// narrower integer operand before an integer `Eq`), and the min/max
/// `Select` pattern. Anything else falls back to bitwise equality over the
/// operands' own width, which is exact except for the `+0.0`/`-0.0` and
/// NaN cases the conservative category bitset (§3.1) is meant to let
/// later stages skip.
pub fn sufficient_equality(i: &mut Interner, a: ExprRef, b: ExprRef) -> SimpleResult<ExprRef> {
    if let (Some(min_max_a), Some(min_max_b)) = (recognize_min_max(i, a), recognize_min_max(i, b)) {
        if min_max_a.0 == min_max_b.0 && unordered_pair_eq((min_max_a.1, min_max_a.2), (min_max_b.1, min_max_b.2)) {
            return Ok(i.const_bool(true));
        }
    }

    match (i.get(a).clone(), i.get(b).clone()) {
        (Expr::FAdd(a1, a2), Expr::FAdd(b1, b2)) => commutative_pair(i, a1, a2, b1, b2),
        (Expr::FMul(a1, a2), Expr::FMul(b1, b2)) => commutative_pair(i, a1, a2, b1, b2),
        (Expr::FSub(a1, a2), Expr::FSub(b1, b2)) => ordered_pair(i, a1, a2, b1, b2),
        (Expr::FDiv(a1, a2), Expr::FDiv(b1, b2)) => ordered_pair(i, a1, a2, b1, b2),
        (Expr::FRem(a1, a2), Expr::FRem(b1, b2)) => ordered_pair(i, a1, a2, b1, b2),
        (Expr::FSqrt(x), Expr::FSqrt(y)) => sufficient_equality(i, x, y),
        (Expr::FpExt(x, sx), Expr::FpExt(y, sy)) if sx == sy => sufficient_equality(i, x, y),
        (Expr::FpTrunc(x, sx), Expr::FpTrunc(y, sy)) if sx == sy => sufficient_equality(i, x, y),
        (Expr::UIntToFp(x, sx), Expr::UIntToFp(y, sy)) if sx == sy => int_equality_extending(i, x, y, false),
        (Expr::SIntToFp(x, sx), Expr::SIntToFp(y, sy)) if sx == sy => int_equality_extending(i, x, y, true),
        _ => bitcast_equality(i, a, b),
    }
}

fn commutative_pair(i: &mut Interner, a1: ExprRef, a2: ExprRef, b1: ExprRef, b2: ExprRef) -> SimpleResult<ExprRef> {
    let direct_l = sufficient_equality(i, a1, b1)?;
    let direct_r = sufficient_equality(i, a2, b2)?;
    let direct = i.create(Builder::And(direct_l, direct_r))?;
    let swapped_l = sufficient_equality(i, a1, b2)?;
    let swapped_r = sufficient_equality(i, a2, b1)?;
    let swapped = i.create(Builder::And(swapped_l, swapped_r))?;
    i.create(Builder::Or(direct, swapped))
}

fn ordered_pair(i: &mut Interner, a1: ExprRef, a2: ExprRef, b1: ExprRef, b2: ExprRef) -> SimpleResult<ExprRef> {
    let l = sufficient_equality(i, a1, b1)?;
    let r = sufficient_equality(i, a2, b2)?;
    i.create(Builder::And(l, r))
}

/// Integer equality with the narrower operand zero/sign-extended to the
/// wider operand's width first (the `UIntToFp`/`SIntToFp` case of §4.7).
fn int_equality_extending(i: &mut Interner, x: ExprRef, y: ExprRef, signed: bool) -> SimpleResult<ExprRef> {
    let (wx, wy) = (i.width_of(x), i.width_of(y));
    let (x, y) = match wx.cmp(&wy) {
        core::cmp::Ordering::Less => (extend(i, x, wy, signed)?, y),
        core::cmp::Ordering::Greater => (x, extend(i, y, wx, signed)?),
        core::cmp::Ordering::Equal => (x, y),
    };
    i.create(Builder::Eq(x, y))
}

fn extend(i: &mut Interner, x: ExprRef, width: u32, signed: bool) -> SimpleResult<ExprRef> {
    if signed { i.create(Builder::SExt(x, width)) } else { i.create(Builder::ZExt(x, width)) }
}

/// Base case: treat both operands' bit patterns as plain integers of
/// their declared width and compare for exact equality. Exact except at
/// the `+0.0 == -0.0` and `NaN`-comparison edges, which is why this is
/// documented as the fallback rather than the primary rule.
fn bitcast_equality(i: &mut Interner, a: ExprRef, b: ExprRef) -> SimpleResult<ExprRef> {
    i.create(Builder::Eq(a, b))
}

/// Rewrites one boolean (width-1) constraint expression, tracking negation
/// polarity through `Not`/`Eq(0, ·)`/`And`/`Or` as §4.7 requires. `Eq`/`FUeq`
/// become the sufficient equality condition; `FOne` becomes its negation;
/// any other residual floating-point comparison collapses to the boolean
/// constant implied by `polarity` (conservative: never strengthens).
pub fn rewrite_constraint(i: &mut Interner, expr: ExprRef, polarity: bool) -> SimpleResult<ExprRef> {
    match i.get(expr).clone() {
        Expr::And(a, b) => {
            let a = rewrite_constraint(i, a, polarity)?;
            let b = rewrite_constraint(i, b, polarity)?;
            i.create(Builder::And(a, b))
        }
        Expr::Or(a, b) => {
            let a = rewrite_constraint(i, a, polarity)?;
            let b = rewrite_constraint(i, b, polarity)?;
            i.create(Builder::Or(a, b))
        }
        Expr::Not(x) => {
            let x = rewrite_constraint(i, x, !polarity)?;
            i.create(Builder::Not(x))
        }
        Expr::Eq(a, b) if i.int_constant(a).is_some_and(|c| c.is_zero()) && i.width_of(a) == 1 => {
            let b = rewrite_constraint(i, b, !polarity)?;
            i.create(Builder::Not(b))
        }
        Expr::Eq(a, b) if produces_float(i, a) || produces_float(i, b) => sufficient_equality(i, a, b),
        Expr::FUeq(a, b) => sufficient_equality(i, a, b),
        Expr::FOne(a, b) => {
            let suff = sufficient_equality(i, a, b)?;
            i.create(Builder::Not(suff))
        }
        Expr::FOeq(..)
        | Expr::FOlt(..)
        | Expr::FOle(..)
        | Expr::FOgt(..)
        | Expr::FOge(..)
        | Expr::FOrd(..)
        | Expr::FUno(..)
        | Expr::FUlt(..)
        | Expr::FUle(..)
        | Expr::FUgt(..)
        | Expr::FUge(..)
        | Expr::FUne(..)
        | Expr::FOrd1(..) => Ok(i.const_bool(polarity)),
        _ => Ok(expr),
    }
}

/// Fuses every ordered pair of already-rewritten constraints by appending
/// `¬rewrite(¬c_i ∧ c_j)`: this rules out assignments where the
/// per-constraint approximation of `c_i` and `c_j` would otherwise admit a
/// model the original (un-rewritten) pair could not have produced
/// together. Quadratic in the constraint count; acceptable since
/// constraint sets are append-only and this runs once per solver call, not
/// per `add`.
pub fn fuse_constraints(i: &mut Interner, rewritten: &[ExprRef]) -> SimpleResult<Vec<ExprRef>> {
    let mut fused = Vec::with_capacity(rewritten.len());
    for (idx_i, &ci) in rewritten.iter().enumerate() {
        for (idx_j, &cj) in rewritten.iter().enumerate() {
            if idx_i == idx_j {
                continue;
            }
            let not_ci = i.create(Builder::Not(ci))?;
            let combined = i.create(Builder::And(not_ci, cj))?;
            let rewritten_combined = rewrite_constraint(i, combined, true)?;
            let fused_clause = i.create(Builder::Not(rewritten_combined))?;
            fused.push(fused_clause);
        }
    }
    Ok(fused)
}

/// Full FP-rewrite pass over a constraint set: rewrites every constraint
/// (positive polarity, since constraint-set members are asserted true) and
/// appends the fused cross-terms.
pub fn rewrite_constraint_set(i: &mut Interner, constraints: &[ExprRef]) -> SimpleResult<Vec<ExprRef>> {
    let mut rewritten = Vec::with_capacity(constraints.len());
    for &c in constraints {
        rewritten.push(rewrite_constraint(i, c, true)?);
    }
    let fused = fuse_constraints(i, &rewritten)?;
    rewritten.extend(fused);
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commutative_fadd_equality_tries_both_orderings() {
        let mut i = Interner::new();
        let a = i.test_symbol(32);
        let b = i.test_symbol(32);
        let fadd_ab = i.alloc_for_test(Expr::FAdd(a, b), 32);
        let fadd_ba = i.alloc_for_test(Expr::FAdd(b, a), 32);
        let cond = sufficient_equality(&mut i, fadd_ab, fadd_ba).unwrap();
        assert_eq!(i.int_constant(cond).map(|c| !c.is_zero()), Some(true));
    }

    #[test]
    fn fone_is_negated_sufficient_equality() {
        let mut i = Interner::new();
        let a = i.test_symbol(32);
        let b = i.test_symbol(32);
        let fone = i.alloc_for_test(Expr::FOne(a, b), 1);
        let rewritten = rewrite_constraint(&mut i, fone, true).unwrap();
        assert!(matches!(i.get(rewritten), Expr::Not(_)));
    }

    #[test]
    fn residual_comparison_collapses_to_polarity() {
        let mut i = Interner::new();
        let a = i.test_symbol(32);
        let b = i.test_symbol(32);
        let folt = i.alloc_for_test(Expr::FOlt(a, b), 1);
        let positive = rewrite_constraint(&mut i, folt, true).unwrap();
        let negative = rewrite_constraint(&mut i, folt, false).unwrap();
        assert_eq!(i.int_constant(positive).map(|c| !c.is_zero()), Some(true));
        assert_eq!(i.int_constant(negative).map(|c| !c.is_zero()), Some(false));
    }
}
