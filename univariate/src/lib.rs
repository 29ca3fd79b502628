// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Solving constraints over a single bit-vector unknown.
//!
//! A [`UnivariateSolver`] accumulates constraints over an unknown `x` of a
//! fixed bit-width: polynomial inequalities, multiplication overflow,
//! shift and bitwise relations, constant bounds, and single-bit tests. Each
//! constraint is tagged with a dependency identifier. The solver supports
//! nested scopes, reports models and unsat cores over those identifiers, and
//! can search for the least or greatest satisfying value.
//!
//! Solving is delegated to a [`Backend`]: an SMT-LIB solver process
//! ([`SmtBackend`]) or exhaustive enumeration ([`ExhaustiveBackend`]).
//! [`SolverConf`] launches either.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::too_many_arguments)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod bv;
pub mod conf;
pub mod error;
pub mod exhaustive;
pub mod poly;
mod search;
pub mod solver;

pub use backend::{Backend, SmtBackend};
pub use conf::{SolverConf, SolverType, UnivariateFactory};
pub use error::UnivariateError;
pub use exhaustive::ExhaustiveBackend;
pub use smtlib::proc::SatResp;
pub use solver::{Dep, UnivariateSolver};
