//! External solver façade boundary (spec §6).
//!
//! The core treats the SMT back-end as an opaque collaborator: this module
//! defines the four operations [`crate::constraints::ConstraintManager`]
//! needs and the `Query`/`QueryResult` shapes they exchange, but ships no
//! concrete implementation — exactly as the specification requires ("the
//! core defines this as the `SolverBackend` trait; C7 is generic over it
//! and ships no concrete solver implementation").

use alloc::vec::Vec;

use crate::{
    array::Array,
    error::SolverFailure,
    expr::ExprRef,
};

/// `constraints ⊨ expression`: a constraint set (as a flat slice of
/// width-1 expressions, implicitly conjoined) together with the
/// expression being asked about.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    /// The path's accumulated constraints.
    pub constraints: &'a [ExprRef],
    /// The expression under query.
    pub expression: ExprRef,
}

impl<'a> Query<'a> {
    /// Construct a query from its parts.
    pub const fn new(constraints: &'a [ExprRef], expression: ExprRef) -> Self {
        Self { constraints, expression }
    }
}

/// A concrete assignment to the [`Array`]s named in a
/// [`SolverBackend::compute_initial_values`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayAssignment {
    /// Name of the array this assignment is for (matches [`Array::name`]).
    pub array_name: alloc::string::String,
    /// Concrete bytes, one per array index.
    pub bytes: Vec<u8>,
}

/// Outcome of [`SolverBackend::compute_initial_values`]: either a
/// satisfying model, or a witness that the constraint set is
/// unsatisfiable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// A model was found.
    Model(Vec<ArrayAssignment>),
    /// The constraint set (plus the queried expression's negation, where
    /// relevant) has no satisfying assignment.
    Unsatisfiable,
}

/// Three-valued outcome of [`SolverBackend::compute_validity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// The expression is entailed by the constraints.
    True,
    /// The negation of the expression is entailed.
    False,
    /// Neither could be established (timeout, incompleteness, ...).
    Unknown,
}

/// The opaque SMT back-end boundary (spec §6). The core never implements
/// this trait; it only consumes it through [`crate::constraints::ConstraintManager`].
/// Implementations must be pure with respect to caller state: the same
/// `Query` must always produce the same answer.
pub trait SolverBackend {
    /// `constraints ⊨ expression`, three-valued.
    fn compute_validity(&self, query: Query<'_>) -> Result<Validity, SolverFailure>;

    /// Whether `constraints ⊨ expression` holds exactly (`true`/`false`,
    /// never `unknown`); a convenience built from [`Self::compute_validity`]
    /// by callers that cannot tolerate `Unknown`.
    fn compute_truth(&self, query: Query<'_>) -> Result<bool, SolverFailure> {
        match self.compute_validity(query)? {
            Validity::True => Ok(true),
            Validity::False => Ok(false),
            Validity::Unknown => Err(SolverFailure::Incomplete),
        }
    }

    /// A concrete value for `query.expression` consistent with
    /// `query.constraints`.
    fn compute_value(&self, query: Query<'_>) -> Result<ExprRef, SolverFailure>;

    /// A full model for the named arrays, consistent with `query`'s
    /// constraints (`query.expression` is conventionally the boolean
    /// constant `true` for a plain "any satisfying model" request).
    fn compute_initial_values(&self, query: Query<'_>, arrays: &[&Array]) -> Result<QueryResult, SolverFailure>;
}
