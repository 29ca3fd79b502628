// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The incremental solver capability a [`UnivariateSolver`] is built on, and
//! its implementation on top of an SMT-LIB solver process.
//!
//! [`UnivariateSolver`]: crate::solver::UnivariateSolver

use std::{collections::HashSet, path::Path};

use itertools::Itertools;
use smtlib::{
    conf::SolverCmd,
    proc::{SatResp, SmtProc},
    sexp::{app, atom_s, Sexp},
};

use crate::{bv, error::Result};

/// An incremental solver that supports named assertions, nested scopes, a
/// three-valued check, model values for declared constants, and unsat cores
/// expressed over the names of asserted formulas.
pub trait Backend {
    /// Declare a bit-vector constant.
    fn declare_bv(&mut self, name: &str, width: u32) -> Result<()>;

    /// Assert `term`, tracked under `name` for unsat cores. Several assertions
    /// may share a name.
    fn assert_named(&mut self, term: &Sexp, name: &str) -> Result<()>;

    /// Open a new assertion scope.
    fn push(&mut self) -> Result<()>;

    /// Discard the `n` innermost scopes and everything asserted in them.
    fn pop(&mut self, n: usize) -> Result<()>;

    /// Check the assertions in all open scopes.
    fn check_sat(&mut self) -> Result<SatResp>;

    /// After a sat check, the value of a declared constant.
    fn get_value(&mut self, name: &str) -> Result<Sexp>;

    /// After an unsat check, names of assertions that are jointly
    /// unsatisfiable.
    fn get_unsat_core(&mut self) -> Result<Vec<String>>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn declare_bv(&mut self, name: &str, width: u32) -> Result<()> {
        (**self).declare_bv(name, width)
    }

    fn assert_named(&mut self, term: &Sexp, name: &str) -> Result<()> {
        (**self).assert_named(term, name)
    }

    fn push(&mut self) -> Result<()> {
        (**self).push()
    }

    fn pop(&mut self, n: usize) -> Result<()> {
        (**self).pop(n)
    }

    fn check_sat(&mut self) -> Result<SatResp> {
        (**self).check_sat()
    }

    fn get_value(&mut self, name: &str) -> Result<Sexp> {
        (**self).get_value(name)
    }

    fn get_unsat_core(&mut self) -> Result<Vec<String>> {
        (**self).get_unsat_core()
    }
}

/// A [`Backend`] driving an SMT-LIB solver process.
///
/// Each assertion name becomes a Boolean indicator constant `n`; the term is
/// asserted as `(=> n term)` and every check assumes all indicators of the
/// open scopes, so the unsat core can be read with `get-unsat-assumptions`.
#[derive(Debug)]
pub struct SmtBackend {
    proc: SmtProc,
    declared: HashSet<String>,
    // indicators used in each open scope, outermost first
    scopes: Vec<Vec<String>>,
}

impl SmtBackend {
    /// Launch a solver process.
    ///
    /// The optional `tee` directory receives the SMT2 input of queries that
    /// come back unknown.
    pub fn new(cmd: SolverCmd, tee: Option<&Path>) -> Result<Self> {
        let proc = SmtProc::new(cmd, tee)?;
        Ok(Self {
            proc,
            declared: HashSet::new(),
            scopes: vec![vec![]],
        })
    }

    fn assumptions(&self) -> Vec<Sexp> {
        self.scopes
            .iter()
            .flatten()
            .unique()
            .map(atom_s)
            .collect()
    }
}

impl Backend for SmtBackend {
    fn declare_bv(&mut self, name: &str, width: u32) -> Result<()> {
        self.proc
            .send(&app("declare-const", [atom_s(name), bv::sort(width)]))?;
        Ok(())
    }

    fn assert_named(&mut self, term: &Sexp, name: &str) -> Result<()> {
        // declarations are global, so an indicator is only ever declared once
        if self.declared.insert(name.to_string()) {
            self.proc
                .send(&app("declare-const", [atom_s(name), atom_s("Bool")]))?;
        }
        self.proc
            .send(&app("assert", [bv::implies(atom_s(name), term.clone())]))?;
        self.scopes
            .last_mut()
            .expect("backend always has a scope")
            .push(name.to_string());
        Ok(())
    }

    fn push(&mut self) -> Result<()> {
        self.proc.push(1)?;
        self.scopes.push(vec![]);
        Ok(())
    }

    fn pop(&mut self, n: usize) -> Result<()> {
        assert!(n < self.scopes.len(), "cannot pop the base scope");
        self.proc.pop(n)?;
        self.scopes.truncate(self.scopes.len() - n);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResp> {
        let assumptions = self.assumptions();
        let start = std::time::Instant::now();
        let resp = self.proc.check_sat_assuming(&assumptions)?;
        log::debug!(
            "check-sat returned {resp:?} after {}ms ({} assumptions)",
            start.elapsed().as_millis(),
            assumptions.len()
        );
        Ok(resp)
    }

    fn get_value(&mut self, name: &str) -> Result<Sexp> {
        let mut values = self.proc.get_value(&[atom_s(name)])?;
        assert_eq!(values.len(), 1, "expected exactly one value for {name}");
        let (_, value) = values.remove(0);
        Ok(value)
    }

    fn get_unsat_core(&mut self) -> Result<Vec<String>> {
        let core = self.proc.get_unsat_assumptions()?;
        Ok(core
            .into_iter()
            .filter(|t| !matches!(t, Sexp::Comment(_)))
            .map(|t| match t.atom_s() {
                Some(name) => name.to_string(),
                // all assumptions are positive indicators
                None => panic!("unexpected unsat assumption {t} in solver response"),
            })
            .collect())
    }
}
