use thiserror::Error;
use twine_solvers::equation::bisection;

use crate::support::constraint::ConstraintError;

use super::super::{equation::ConvergenceError, input::InvalidRatingsError};

/// Errors that can occur while generating single-diode parameters.
#[derive(Debug, Error)]
pub enum ParameterGenerationError {
    /// The input ratings violate their physical ordering.
    #[error("invalid ratings")]
    InvalidRatings(#[from] InvalidRatingsError),

    /// A derived quantity violated its constraint.
    #[error("derived quantity violates its constraint")]
    Constraint(#[from] ConstraintError),

    /// The boundary conditions admit no physical parameter set.
    #[error("boundary conditions admit no physical parameters: {context}")]
    NonPhysical {
        /// Which derivation step became non-physical.
        context: String,
    },

    /// The bisection solver encountered an error.
    #[error("bisection solver error")]
    Bisection(#[from] bisection::Error),

    /// An inner current or power solve failed.
    #[error("inner solve failed")]
    Convergence(#[from] ConvergenceError),

    /// A solve reached its iteration limit without converging.
    #[error("{stage} solve hit iteration limit: residual={residual}")]
    MaxIters {
        /// Which solve stage exhausted its budget.
        stage: &'static str,

        /// Best residual achieved, in the stage's own units.
        residual: f64,

        /// Iteration count performed by the solver.
        iters: usize,
    },
}
