// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Errors returned by univariate solvers and their backends.

use smtlib::proc::SolverError;
use thiserror::Error;

/// An error from a univariate solver.
///
/// Apart from [`UnivariateError::Solver`] and [`UnivariateError::Eval`], these
/// are violations of the calling protocol; the solver state is left exactly as
/// it was before the offending call.
#[derive(Error, Debug)]
pub enum UnivariateError {
    /// The backend solver failed (I/O or an error response)
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// A term could not be evaluated by the exhaustive backend
    #[error("could not evaluate term: {0}")]
    Eval(String),
    /// `pop` was asked to discard more scopes than are open
    #[error("cannot pop {requested} scopes at scope level {level}")]
    PopTooDeep {
        /// number of scopes requested
        requested: usize,
        /// current scope level
        level: usize,
    },
    /// `model` was called without a satisfiable check on the current assertions
    #[error("no model available: the last check was not sat or assertions changed since")]
    NoModel,
    /// `unsat_core` was called without an unsatisfiable check on the current assertions
    #[error("no unsat core available: the last check was not unsat or assertions changed since")]
    NoUnsatCore,
    /// A bit index beyond the width of the unknown
    #[error("bit index {idx} is out of range for bit-width {width}")]
    BitOutOfRange {
        /// the requested bit
        idx: u32,
        /// bit-width of the unknown
        width: u32,
    },
    /// A solver was requested for an unknown with no bits
    #[error("bit-width must be positive")]
    ZeroWidth,
}

pub(crate) type Result<T> = std::result::Result<T, UnivariateError>;
