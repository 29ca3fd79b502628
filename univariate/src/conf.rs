// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Holds the configuration needed to launch univariate solvers.

use std::path::{Path, PathBuf};

use smtlib::{
    conf::{CvcConf, SolverCmd, Z3Conf},
    path::solver_path,
};

use crate::{
    backend::{Backend, SmtBackend},
    error::Result,
    exhaustive::ExhaustiveBackend,
    solver::UnivariateSolver,
};

/// The type of solver being used
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SolverType {
    Z3,
    Cvc5,
    /// Enumerates all values of the unknown; no external process.
    Exhaustive,
}

#[derive(Debug, Clone, Default)]
struct GenericOptions {
    timeout_ms: Option<usize>,
    seed: usize,
    max_width: Option<u32>,
    check_limit: Option<usize>,
}

/// Creates univariate solvers on demand.
pub trait UnivariateFactory {
    /// The backend of the created solvers.
    type Backend: Backend;

    /// A fresh solver for an unknown of `bit_width` bits.
    fn solver(&self, bit_width: u32) -> Result<UnivariateSolver<Self::Backend>>;
}

/// Configuration for launching univariate solvers: which solver, where its
/// binary lives, and some options.
#[derive(Debug, Clone)]
pub struct SolverConf {
    solver_type: SolverType,
    bin: String,
    opts: GenericOptions,
    /// The optional directory to tee the SMT input of unknown queries to.
    ///
    /// With a tee set, every command sent to the solver is kept in memory for
    /// the life of the solver, including those of popped scopes and of
    /// `find_min`/`find_max` searches. Meant for debugging only.
    pub tee: Option<PathBuf>,
}

impl SolverConf {
    /// Configuration for a given type of solver, with a path to the solver
    /// binary (ignored for [`SolverType::Exhaustive`]).
    pub fn new(solver_type: SolverType, bin: &str) -> Self {
        Self {
            solver_type,
            bin: bin.to_string(),
            opts: Default::default(),
            tee: None,
        }
    }

    /// Z3, found with [`solver_path`].
    pub fn z3() -> Self {
        Self::new(SolverType::Z3, &solver_path("z3"))
    }

    /// cvc5, found with [`solver_path`].
    pub fn cvc5() -> Self {
        Self::new(SolverType::Cvc5, &solver_path("cvc5"))
    }

    /// The in-process exhaustive solver.
    pub fn exhaustive() -> Self {
        Self::new(SolverType::Exhaustive, "")
    }

    /// Set the solver timeout. None disables the timeout.
    pub fn timeout_ms(&mut self, timeout_ms: Option<usize>) -> &mut Self {
        self.opts.timeout_ms = timeout_ms;
        self
    }

    /// Set the solver's random seed.
    pub fn seed(&mut self, seed: usize) -> &mut Self {
        self.opts.seed = seed;
        self
    }

    /// Set the widest unknown the exhaustive solver enumerates.
    pub fn max_width(&mut self, max_width: u32) -> &mut Self {
        self.opts.max_width = Some(max_width);
        self
    }

    /// Set the number of checks after which the exhaustive solver answers
    /// unknown.
    pub fn check_limit(&mut self, check_limit: Option<usize>) -> &mut Self {
        self.opts.check_limit = check_limit;
        self
    }

    /// Set the directory to tee SMT input to. See [`SolverConf::tee`] for the
    /// memory cost.
    pub fn tee(&mut self, dir: Option<&Path>) -> &mut Self {
        self.tee = dir.map(Path::to_path_buf);
        self
    }

    /// Get the solver type.
    pub fn get_solver_type(&self) -> SolverType {
        self.solver_type
    }

    /// Get the solver timeout.
    pub fn get_timeout_ms(&self) -> Option<usize> {
        self.opts.timeout_ms
    }

    fn get_cmd(&self) -> Option<SolverCmd> {
        let mut cmd = match self.solver_type {
            SolverType::Z3 => {
                let mut conf = Z3Conf::new(&self.bin);
                conf.timeout_ms(self.opts.timeout_ms);
                if self.opts.seed != 0 {
                    conf.seed(self.opts.seed);
                }
                conf.done()
            }
            SolverType::Cvc5 => {
                let mut conf = CvcConf::new_cvc5(&self.bin);
                conf.timeout_ms(self.opts.timeout_ms);
                if self.opts.seed != 0 {
                    conf.seed(self.opts.seed);
                }
                conf.done()
            }
            SolverType::Exhaustive => return None,
        };
        cmd.logic("QF_BV");
        Some(cmd)
    }

    /// Launch a backend with this configuration.
    pub fn backend(&self) -> Result<Box<dyn Backend + Send>> {
        match self.get_cmd() {
            Some(cmd) => Ok(Box::new(SmtBackend::new(cmd, self.tee.as_deref())?)),
            None => {
                let default = ExhaustiveBackend::default();
                Ok(Box::new(ExhaustiveBackend::new(
                    self.opts.max_width.unwrap_or(default.max_width()),
                    self.opts.check_limit,
                )))
            }
        }
    }
}

impl UnivariateFactory for SolverConf {
    type Backend = Box<dyn Backend + Send>;

    fn solver(&self, bit_width: u32) -> Result<UnivariateSolver<Self::Backend>> {
        UnivariateSolver::new(self.backend()?, bit_width)
    }
}
