//! Constraint manager and solver-facing query plumbing (spec component C7).
//!
//! An append-only multiset of width-1 expressions, implicitly conjoined.
//! `mustBeTrue`/`mayBeTrue`/`getValue`/`getInitialValues` all go through
//! [`crate::solver::SolverBackend`] after the floating-point rewriter
//! (§4.7, [`crate::fp_rewrite`]) has cleared the query of FP sub-formulas.
//! Results are cached by `(constraint-set length, expression)` — valid
//! because the set is append-only, so a cache entry recorded at length `n`
//! remains correct for every subsequent query against the same prefix.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::{
    array::{
        Array,
        UpdateList,
        UpdateNode,
    },
    error::{
        CoreResult,
        SolverFailure,
    },
    expr::{
        Builder,
        Expr,
        ExprRef,
        Interner,
    },
    fp_rewrite,
    solver::{
        ArrayAssignment,
        Query,
        QueryResult,
        SolverBackend,
        Validity,
    },
};

/// Append-only set of width-1 expressions, implicitly conjoined.
#[derive(Clone)]
pub struct ConstraintManager<S> {
    constraints: Vec<ExprRef>,
    /// Shallow `var -> constant` facts learned from top-level
    /// `Eq(IntConstant, var)`/`Eq(var, IntConstant)` constraints, applied
    /// to every subsequently added constraint (§4.6 `add`).
    known_equalities: HashMap<ExprRef, ExprRef>,
    cache: HashMap<(usize, ExprRef), Validity>,
    solver: S,
}

impl<S: SolverBackend> ConstraintManager<S> {
    /// A fresh, empty constraint set over `solver`.
    pub fn new(solver: S) -> Self {
        Self { constraints: Vec::new(), known_equalities: HashMap::new(), cache: HashMap::new(), solver }
    }

    /// The constraints accumulated so far, oldest first.
    pub fn constraints(&self) -> &[ExprRef] {
        &self.constraints
    }

    /// The solver backing this manager, for callers (e.g.
    /// [`crate::state::ExecutionState::merge`]) that need to build a fresh
    /// manager over the same backend.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Append `e`, after substituting any `var -> constant` facts already
    /// known into it, and (if `e` itself is such an equality) recording the
    /// new fact for future `add`s.
    pub fn add(&mut self, interner: &mut Interner, e: ExprRef) -> CoreResult<()> {
        let simplified = substitute_known(interner, e, &self.known_equalities);
        if let Some((var, constant)) = equality_fact(interner, simplified) {
            self.known_equalities.insert(var, constant);
        }
        self.constraints.push(simplified);
        self.cache.clear();
        Ok(())
    }

    fn rewritten_query<'a>(&self, interner: &mut Interner, scratch: &'a mut Vec<ExprRef>) -> &'a [ExprRef] {
        *scratch = fp_rewrite::rewrite_constraint_set(interner, &self.constraints)
            .unwrap_or_else(|_| self.constraints.clone());
        scratch
    }

    fn validity(&mut self, interner: &mut Interner, e: ExprRef) -> Result<Validity, SolverFailure> {
        let key = (self.constraints.len(), e);
        if let Some(v) = self.cache.get(&key) {
            return Ok(*v);
        }
        let rewritten_e = fp_rewrite::rewrite_constraint(interner, e, true).unwrap_or(e);
        let mut scratch = Vec::new();
        let constraints = self.rewritten_query(interner, &mut scratch);
        let query = Query::new(constraints, rewritten_e);
        let v = self.solver.compute_validity(query)?;
        self.cache.insert(key, v);
        Ok(v)
    }

    /// `constraints ⊨ e`.
    pub fn must_be_true(&mut self, interner: &mut Interner, e: ExprRef) -> Result<bool, SolverFailure> {
        Ok(self.validity(interner, e)? == Validity::True)
    }

    /// `constraints ⊨ ¬e`.
    pub fn must_be_false(&mut self, interner: &mut Interner, e: ExprRef) -> Result<bool, SolverFailure> {
        Ok(self.validity(interner, e)? == Validity::False)
    }

    /// `¬(constraints ⊨ ¬e)`: some model of the constraints satisfies `e`.
    pub fn may_be_true(&mut self, interner: &mut Interner, e: ExprRef) -> Result<bool, SolverFailure> {
        Ok(self.validity(interner, e)? != Validity::False)
    }

    /// `¬(constraints ⊨ e)`: some model of the constraints falsifies `e`.
    pub fn may_be_false(&mut self, interner: &mut Interner, e: ExprRef) -> Result<bool, SolverFailure> {
        Ok(self.validity(interner, e)? != Validity::True)
    }

    /// A concrete value for `e` satisfying the constraints; the value is
    /// additionally asserted (`add`ed) so subsequent queries are consistent
    /// with it, per §4.6.
    pub fn get_value(&mut self, interner: &mut Interner, e: ExprRef) -> Result<ExprRef, SolverFailure> {
        let rewritten_e = fp_rewrite::rewrite_constraint(interner, e, true).unwrap_or(e);
        let mut scratch = Vec::new();
        let constraints = self.rewritten_query(interner, &mut scratch);
        let value = self.solver.compute_value(Query::new(constraints, rewritten_e))?;
        let eq = interner.create(Builder::Eq(e, value)).map_err(|_| SolverFailure::Incomplete)?;
        let _ = self.add(interner, eq);
        Ok(value)
    }

    /// A model assigning each of `arrays`.
    pub fn get_initial_values(
        &mut self,
        interner: &mut Interner,
        arrays: &[&Array],
    ) -> Result<Vec<ArrayAssignment>, SolverFailure> {
        let true_expr = interner.const_bool(true);
        let mut scratch = Vec::new();
        let constraints = self.rewritten_query(interner, &mut scratch);
        match self.solver.compute_initial_values(Query::new(constraints, true_expr), arrays)? {
            QueryResult::Model(assignments) => Ok(assignments),
            QueryResult::Unsatisfiable => Err(SolverFailure::Incomplete),
        }
    }
}

/// If `e` is a top-level `Eq(IntConstant, var)` (after canonicalisation the
/// constant operand is always on the left, per §3.1 rule 3), returns
/// `(var, constant)`.
fn equality_fact(interner: &Interner, e: ExprRef) -> Option<(ExprRef, ExprRef)> {
    let Expr::Eq(a, b) = interner.get(e) else {
        return None;
    };
    let (a, b) = (*a, *b);
    match (interner.int_constant(a).is_some(), interner.int_constant(b).is_some()) {
        (true, false) => Some((b, a)),
        (false, true) => Some((a, b)),
        _ => None,
    }
}

/// Recursively substitutes every occurrence of a known variable with its
/// constant, memoising by source [`ExprRef`] so the DAG's sharing is
/// preserved (each sub-expression is only rebuilt once regardless of how
/// many parents reference it).
fn substitute_known(interner: &mut Interner, e: ExprRef, known: &HashMap<ExprRef, ExprRef>) -> ExprRef {
    if known.is_empty() {
        return e;
    }
    let mut memo = HashMap::new();
    substitute_rec(interner, e, known, &mut memo)
}

fn substitute_rec(
    interner: &mut Interner,
    e: ExprRef,
    known: &HashMap<ExprRef, ExprRef>,
    memo: &mut HashMap<ExprRef, ExprRef>,
) -> ExprRef {
    if let Some(&constant) = known.get(&e) {
        return constant;
    }
    if let Some(&cached) = memo.get(&e) {
        return cached;
    }
    let rebuilt = rebuild(interner, e, known, memo);
    memo.insert(e, rebuilt);
    rebuilt
}

fn sub1(i: &mut Interner, x: ExprRef, known: &HashMap<ExprRef, ExprRef>, memo: &mut HashMap<ExprRef, ExprRef>) -> ExprRef {
    substitute_rec(i, x, known, memo)
}

fn rebuild(
    i: &mut Interner,
    e: ExprRef,
    known: &HashMap<ExprRef, ExprRef>,
    memo: &mut HashMap<ExprRef, ExprRef>,
) -> ExprRef {
    let node = i.get(e).clone();
    let fallback = e;
    let built = match node {
        Expr::IntConstant(_) | Expr::FloatConstant(_) => return fallback,
        Expr::Read(list, idx) => {
            let idx = sub1(i, idx, known, memo);
            let list = substitute_update_list(i, &list, known, memo);
            i.read(list, idx)
        }
        Expr::ZExt(x, w) => {
            let x = sub1(i, x, known, memo);
            i.create(Builder::ZExt(x, w))
        }
        Expr::SExt(x, w) => {
            let x = sub1(i, x, known, memo);
            i.create(Builder::SExt(x, w))
        }
        Expr::Extract(x, off, w) => {
            let x = sub1(i, x, known, memo);
            i.create(Builder::Extract(x, off, w))
        }
        Expr::Not(x) => {
            let x = sub1(i, x, known, memo);
            i.create(Builder::Not(x))
        }
        Expr::And(a, b) => binop(i, a, b, known, memo, Builder::And),
        Expr::Or(a, b) => binop(i, a, b, known, memo, Builder::Or),
        Expr::Xor(a, b) => binop(i, a, b, known, memo, Builder::Xor),
        Expr::Add(a, b) => binop(i, a, b, known, memo, Builder::Add),
        Expr::Sub(a, b) => binop(i, a, b, known, memo, Builder::Sub),
        Expr::Mul(a, b) => binop(i, a, b, known, memo, Builder::Mul),
        Expr::UDiv(a, b) => binop(i, a, b, known, memo, Builder::UDiv),
        Expr::SDiv(a, b) => binop(i, a, b, known, memo, Builder::SDiv),
        Expr::URem(a, b) => binop(i, a, b, known, memo, Builder::URem),
        Expr::SRem(a, b) => binop(i, a, b, known, memo, Builder::SRem),
        Expr::Shl(a, b) => binop(i, a, b, known, memo, Builder::Shl),
        Expr::LShr(a, b) => binop(i, a, b, known, memo, Builder::LShr),
        Expr::AShr(a, b) => binop(i, a, b, known, memo, Builder::AShr),
        Expr::Eq(a, b) => binop(i, a, b, known, memo, Builder::Eq),
        Expr::Ne(a, b) => binop(i, a, b, known, memo, Builder::Ne),
        Expr::Ult(a, b) => binop(i, a, b, known, memo, Builder::Ult),
        Expr::Ule(a, b) => binop(i, a, b, known, memo, Builder::Ule),
        Expr::Ugt(a, b) => binop(i, a, b, known, memo, Builder::Ugt),
        Expr::Uge(a, b) => binop(i, a, b, known, memo, Builder::Uge),
        Expr::Slt(a, b) => binop(i, a, b, known, memo, Builder::Slt),
        Expr::Sle(a, b) => binop(i, a, b, known, memo, Builder::Sle),
        Expr::Sgt(a, b) => binop(i, a, b, known, memo, Builder::Sgt),
        Expr::Sge(a, b) => binop(i, a, b, known, memo, Builder::Sge),
        Expr::FAdd(a, b) => binop(i, a, b, known, memo, Builder::FAdd),
        Expr::FSub(a, b) => binop(i, a, b, known, memo, Builder::FSub),
        Expr::FMul(a, b) => binop(i, a, b, known, memo, Builder::FMul),
        Expr::FDiv(a, b) => binop(i, a, b, known, memo, Builder::FDiv),
        Expr::FRem(a, b) => binop(i, a, b, known, memo, Builder::FRem),
        Expr::Select(c, t, f) => {
            let c = sub1(i, c, known, memo);
            let t = sub1(i, t, known, memo);
            let f = sub1(i, f, known, memo);
            i.create(Builder::Select(c, t, f))
        }
        Expr::Concat(hi, lo) => {
            let hi = sub1(i, hi, known, memo);
            let lo = sub1(i, lo, known, memo);
            i.create(Builder::Concat(hi, lo))
        }
        Expr::NotOptimized(x) => {
            let x = sub1(i, x, known, memo);
            i.create(Builder::NotOptimized(x))
        }
        // FP casts/unary ops and the fourteen FP comparisons have no
        // variables to substitute through in practice (their operands are
        // bit-vectors converted via explicit casts); left unchanged.
        _ => return fallback,
    };
    built.unwrap_or(fallback)
}

fn binop(
    i: &mut Interner,
    a: ExprRef,
    b: ExprRef,
    known: &HashMap<ExprRef, ExprRef>,
    memo: &mut HashMap<ExprRef, ExprRef>,
    ctor: fn(ExprRef, ExprRef) -> Builder,
) -> crate::error::SimpleResult<ExprRef> {
    let a = sub1(i, a, known, memo);
    let b = sub1(i, b, known, memo);
    i.create(ctor(a, b))
}

/// Substitutes through an [`UpdateList`]'s write history. Rebuilds the
/// chain only if a substitution actually changed something, so the common
/// case (no known equalities touch this array) is a cheap pointer clone.
fn substitute_update_list(
    i: &mut Interner,
    list: &UpdateList,
    known: &HashMap<ExprRef, ExprRef>,
    memo: &mut HashMap<ExprRef, ExprRef>,
) -> UpdateList {
    let Some(head) = &list.head else {
        return list.clone();
    };
    let nodes = collect_chain(head);
    let mut rebuilt: Option<alloc::sync::Arc<UpdateNode>> = None;
    for node in nodes.into_iter().rev() {
        let index = sub1(i, node.index, known, memo);
        let value = sub1(i, node.value, known, memo);
        rebuilt = Some(alloc::sync::Arc::new(UpdateNode { index, value, next: rebuilt }));
    }
    UpdateList { array: list.array.clone(), head: rebuilt }
}

fn collect_chain(head: &alloc::sync::Arc<UpdateNode>) -> Vec<alloc::sync::Arc<UpdateNode>> {
    let mut nodes = Vec::new();
    let mut cur = Some(head.clone());
    while let Some(node) = cur {
        cur = node.next.clone();
        nodes.push(node);
    }
    nodes.reverse();
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Validity;

    struct StubSolver {
        answer: Validity,
    }

    impl SolverBackend for StubSolver {
        fn compute_validity(&self, _query: Query<'_>) -> Result<Validity, SolverFailure> {
            Ok(self.answer)
        }

        fn compute_value(&self, query: Query<'_>) -> Result<ExprRef, SolverFailure> {
            Ok(query.expression)
        }

        fn compute_initial_values(
            &self,
            _query: Query<'_>,
            _arrays: &[&Array],
        ) -> Result<QueryResult, SolverFailure> {
            Ok(QueryResult::Model(Vec::new()))
        }
    }

    #[test]
    fn may_be_true_reflects_unknown_as_not_false() {
        let mut i = Interner::new();
        let mut mgr = ConstraintManager::new(StubSolver { answer: Validity::Unknown });
        let e = i.const_bool(true);
        assert!(mgr.may_be_true(&mut i, e).unwrap());
        assert!(mgr.may_be_false(&mut i, e).unwrap());
    }

    #[test]
    fn adding_equality_substitutes_into_later_constraints() {
        let mut i = Interner::new();
        let mut mgr = ConstraintManager::new(StubSolver { answer: Validity::True });
        let x = i.test_symbol(32);
        let five = i.const_u128(5, 32);
        let eq = i.create(Builder::Eq(five, x)).unwrap();
        mgr.add(&mut i, eq).unwrap();

        let y = i.test_symbol(32);
        let sum = i.create(Builder::Add(x, y)).unwrap();
        mgr.add(&mut i, sum).unwrap();

        // `x` should have been substituted by `5` in the stored constraint.
        let stored = mgr.constraints()[1];
        assert!(matches!(i.get(stored), Expr::Add(a, _) if i.int_constant(*a).is_some()));
    }

    #[test]
    fn cache_is_invalidated_on_add() {
        let mut i = Interner::new();
        let mut mgr = ConstraintManager::new(StubSolver { answer: Validity::True });
        let e = i.const_bool(true);
        assert!(mgr.must_be_true(&mut i, e).unwrap());
        assert_eq!(mgr.cache.len(), 1);
        mgr.add(&mut i, e).unwrap();
        assert!(mgr.cache.is_empty());
    }
}
