// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Finding the least and greatest satisfying values of the unknown.

use num_bigint::BigUint;
use smtlib::proc::SatResp;

use crate::{
    backend::Backend,
    error::Result,
    solver::{Dep, UnivariateSolver},
};

/// Dependency identifier of the bit constraints asserted during the search.
const SEARCH_DEP: Dep = 0;

impl<B: Backend> UnivariateSolver<B> {
    /// The least satisfying value of `x`, in unsigned order.
    ///
    /// Must be called after a sat check. Returns `Ok(None)` if the backend
    /// answers unknown along the way. The scope level and cached model are
    /// unchanged afterward.
    pub fn find_min(&mut self) -> Result<Option<BigUint>> {
        self.find_extremal(false)
    }

    /// The greatest satisfying value of `x`, in unsigned order. See
    /// [`UnivariateSolver::find_min`].
    pub fn find_max(&mut self) -> Result<Option<BigUint>> {
        self.find_extremal(true)
    }

    // On an error the scopes opened by the search are closed again before the
    // error is returned.
    fn find_extremal(&mut self, maximize: bool) -> Result<Option<BigUint>> {
        let start = self.scope_level();
        let result = self.fix_bits(maximize);
        let level = self.scope_level();
        if result.is_err() && level > start {
            self.pop(level - start)?;
        }
        result
    }

    // Fixes bits from the most significant down, each to the preferred value
    // (0 when minimizing, 1 when maximizing) if that stays satisfiable. A
    // trial check is only needed when the current model disagrees with the
    // preference.
    fn fix_bits(&mut self, maximize: bool) -> Result<Option<BigUint>> {
        let mut val = self.model()?;
        self.push()?;
        for k in (0..self.bit_width()).rev() {
            if val.bit(u64::from(k)) == maximize {
                self.add_bit(k, !maximize, SEARCH_DEP)?;
                continue;
            }
            self.push()?;
            self.add_bit(k, !maximize, SEARCH_DEP)?;
            match self.check()? {
                SatResp::Sat => {
                    let next = self.model()?;
                    debug_assert!(if maximize { next > val } else { next < val });
                    log::debug!("bit {k}: improved {val} to {next}");
                    val = next;
                    self.pop(1)?;
                    self.add_bit(k, !maximize, SEARCH_DEP)?;
                }
                SatResp::Unsat => {
                    self.pop(1)?;
                    self.add_bit(k, maximize, SEARCH_DEP)?;
                }
                SatResp::Unknown(reason) => {
                    log::debug!("giving up search at bit {k}: {reason}");
                    self.pop(2)?;
                    return Ok(None);
                }
            }
        }
        self.pop(1)?;
        Ok(Some(val))
    }
}
