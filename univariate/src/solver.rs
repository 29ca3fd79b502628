// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! An incremental store of constraints over a single bit-vector unknown.

use std::fmt;

use itertools::Itertools;
use num_bigint::{BigInt, BigUint};
use smtlib::{
    proc::SatResp,
    sexp::{app, atom_s, Sexp},
};

use crate::{
    backend::Backend,
    bv,
    error::{Result, UnivariateError},
    poly::PolyEncoder,
};

/// A dependency identifier: an opaque tag chosen by the caller for each
/// constraint, reported back in unsat cores.
pub type Dep = u32;

/// The name of the unknown in the backend.
const VAR: &str = "x";

const DEP_PREFIX: &str = "__dep@";

fn dep_name(dep: Dep) -> String {
    format!("{DEP_PREFIX}{dep}")
}

fn parse_dep_name(name: &str) -> Option<Dep> {
    name.strip_prefix(DEP_PREFIX)?.parse().ok()
}

/// Everything that belongs to one scope: the model cached for it (None when
/// stale) and the assertions made in it.
#[derive(Debug, Clone, Default)]
struct Frame {
    model: Option<BigUint>,
    assertions: Vec<(Sexp, Dep)>,
}

/// A UnivariateSolver decides constraints over a single unknown `x` of a fixed
/// bit-width, using a [`Backend`] for the actual solving.
///
/// Constraints are added with the `add_*` methods. Each takes a `sign`, which
/// negates the constraint, and a dependency identifier `dep`, which is what
/// [`UnivariateSolver::unsat_core`] reports. Polynomials are given as
/// coefficient lists, lowest degree first (see [`PolyEncoder`]).
pub struct UnivariateSolver<B> {
    backend: B,
    bit_width: u32,
    enc: PolyEncoder,
    // never empty; frames[0] is scope level 0
    frames: Vec<Frame>,
    last_check: Option<SatResp>,
}

impl<B: Backend> UnivariateSolver<B> {
    /// Create a solver for an unknown of `bit_width` bits on top of `backend`.
    pub fn new(mut backend: B, bit_width: u32) -> Result<Self> {
        if bit_width == 0 {
            return Err(UnivariateError::ZeroWidth);
        }
        backend.declare_bv(VAR, bit_width)?;
        Ok(Self {
            backend,
            bit_width,
            enc: PolyEncoder::new(atom_s(VAR), bit_width),
            frames: vec![Frame::default()],
            last_check: None,
        })
    }

    /// The bit-width of the unknown.
    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// The number of open scopes.
    pub fn scope_level(&self) -> usize {
        self.frames.len() - 1
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn top(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frames are never empty")
    }

    fn add(&mut self, e: Sexp, sign: bool, dep: Dep) -> Result<()> {
        self.top().model = None;
        self.last_check = None;
        let e = if sign { bv::not(e) } else { e };
        let name = dep_name(dep);
        log::trace!("(assert (! {e} :named {name}))");
        self.backend.assert_named(&e, &name)?;
        self.top().assertions.push((e, dep));
        Ok(())
    }

    fn poly(&self, p: &[BigInt]) -> Sexp {
        self.enc.encode(p)
    }

    /// `lhs <= rhs` (unsigned).
    pub fn add_ule(&mut self, lhs: &[BigInt], rhs: &[BigInt], sign: bool, dep: Dep) -> Result<()> {
        let e = bv::bvule(self.poly(lhs), self.poly(rhs));
        self.add(e, sign, dep)
    }

    /// The unsigned product `lhs * rhs` overflows.
    pub fn add_umul_ovfl(
        &mut self,
        lhs: &[BigInt],
        rhs: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        let e = bv::umul_no_ovfl(self.poly(lhs), self.poly(rhs), self.bit_width);
        // the predicate states the absence of overflow
        self.add(e, !sign, dep)
    }

    /// The signed product `lhs * rhs` overflows (exceeds the largest signed
    /// value).
    pub fn add_smul_ovfl(
        &mut self,
        lhs: &[BigInt],
        rhs: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        let e = bv::smul_no_ovfl(self.poly(lhs), self.poly(rhs), self.bit_width);
        self.add(e, !sign, dep)
    }

    /// The signed product `lhs * rhs` underflows (is below the smallest signed
    /// value).
    pub fn add_smul_udfl(
        &mut self,
        lhs: &[BigInt],
        rhs: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        let e = bv::smul_no_udfl(self.poly(lhs), self.poly(rhs), self.bit_width);
        self.add(e, !sign, dep)
    }

    fn add_op(
        &mut self,
        op: fn(Sexp, Sexp) -> Sexp,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        let e = bv::eq(op(self.poly(in1), self.poly(in2)), self.poly(out));
        self.add(e, sign, dep)
    }

    /// `in1 >> in2 = out` (logical shift).
    pub fn add_lshr(
        &mut self,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        self.add_op(bv::bvlshr, in1, in2, out, sign, dep)
    }

    /// `in1 >> in2 = out` (arithmetic shift).
    pub fn add_ashr(
        &mut self,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        self.add_op(bv::bvashr, in1, in2, out, sign, dep)
    }

    /// `in1 << in2 = out`.
    pub fn add_shl(
        &mut self,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        self.add_op(bv::bvshl, in1, in2, out, sign, dep)
    }

    /// `in1 & in2 = out`.
    pub fn add_and(
        &mut self,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        self.add_op(bv::bvand, in1, in2, out, sign, dep)
    }

    /// `in1 | in2 = out`.
    pub fn add_or(
        &mut self,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        self.add_op(bv::bvor, in1, in2, out, sign, dep)
    }

    /// `in1 ^ in2 = out`.
    pub fn add_xor(
        &mut self,
        in1: &[BigInt],
        in2: &[BigInt],
        out: &[BigInt],
        sign: bool,
        dep: Dep,
    ) -> Result<()> {
        self.add_op(bv::bvxor, in1, in2, out, sign, dep)
    }

    /// `~input = out`.
    pub fn add_not(&mut self, input: &[BigInt], out: &[BigInt], sign: bool, dep: Dep) -> Result<()> {
        let e = bv::eq(bv::bvnot(self.poly(input)), self.poly(out));
        self.add(e, sign, dep)
    }

    /// `x <= val` (unsigned); `val` is taken modulo 2^bit_width.
    pub fn add_ule_const(&mut self, val: &BigUint, sign: bool, dep: Dep) -> Result<()> {
        let e = bv::bvule(atom_s(VAR), bv::num(val, self.bit_width));
        self.add(e, sign, dep)
    }

    /// `val <= x` (unsigned); `val` is taken modulo 2^bit_width.
    pub fn add_uge_const(&mut self, val: &BigUint, sign: bool, dep: Dep) -> Result<()> {
        let e = bv::bvule(bv::num(val, self.bit_width), atom_s(VAR));
        self.add(e, sign, dep)
    }

    /// Bit `idx` of `x` is 1.
    pub fn add_bit(&mut self, idx: u32, sign: bool, dep: Dep) -> Result<()> {
        if idx >= self.bit_width {
            return Err(UnivariateError::BitOutOfRange {
                idx,
                width: self.bit_width,
            });
        }
        self.add(bv::bit(atom_s(VAR), idx), sign, dep)
    }

    /// Open a new scope. The cached model carries over into it.
    pub fn push(&mut self) -> Result<()> {
        self.backend.push()?;
        let model = self.top().model.clone();
        self.frames.push(Frame {
            model,
            assertions: vec![],
        });
        self.last_check = None;
        Ok(())
    }

    /// Close the `n` innermost scopes, dropping the constraints added in them
    /// and restoring the model cached before they were opened.
    pub fn pop(&mut self, n: usize) -> Result<()> {
        let level = self.scope_level();
        if n > level {
            return Err(UnivariateError::PopTooDeep {
                requested: n,
                level,
            });
        }
        if n == 0 {
            return Ok(());
        }
        self.backend.pop(n)?;
        self.frames.truncate(self.frames.len() - n);
        self.last_check = None;
        Ok(())
    }

    /// Check whether the constraints in all open scopes are satisfiable.
    pub fn check(&mut self) -> Result<SatResp> {
        let resp = self.backend.check_sat()?;
        log::debug!(
            "check at scope level {} returned {resp:?}",
            self.scope_level()
        );
        self.last_check = Some(resp.clone());
        Ok(resp)
    }

    /// The value of `x` in a satisfying assignment.
    ///
    /// The value is fetched from the backend at most once per scope, after a
    /// sat check, and cached until the scope changes.
    pub fn model(&mut self) -> Result<BigUint> {
        if let Some(v) = &self.top().model {
            return Ok(v.clone());
        }
        if self.last_check != Some(SatResp::Sat) {
            return Err(UnivariateError::NoModel);
        }
        let value = self.backend.get_value(VAR)?;
        let (v, width) = bv::parse_value(&value)
            .unwrap_or_else(|| panic!("value {value} of {VAR} is not a bit-vector numeral"));
        assert_eq!(
            width, self.bit_width,
            "value {value} of {VAR} has the wrong width"
        );
        self.top().model = Some(v.clone());
        Ok(v)
    }

    /// The dependency identifiers of a set of constraints that are jointly
    /// unsatisfiable, after an unsat check. Sorted and without duplicates.
    pub fn unsat_core(&mut self) -> Result<Vec<Dep>> {
        if self.last_check != Some(SatResp::Unsat) {
            return Err(UnivariateError::NoUnsatCore);
        }
        let deps: Vec<Dep> = self
            .backend
            .get_unsat_core()?
            .iter()
            .map(|name| {
                parse_dep_name(name)
                    .unwrap_or_else(|| panic!("unexpected name {name} in unsat core"))
            })
            .sorted()
            .dedup()
            .collect();
        assert!(!deps.is_empty(), "empty unsat core");
        Ok(deps)
    }
}

impl<B> fmt::Display for UnivariateSolver<B> {
    /// Prints the constraints in scope as an SMT-LIB script.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}",
            app("declare-const", [atom_s(VAR), bv::sort(self.bit_width)])
        )?;
        for (level, frame) in self.frames.iter().enumerate() {
            if level > 0 {
                writeln!(f, "{}", app("push", [smtlib::sexp::atom_i(1)]))?;
            }
            for (e, dep) in &frame.assertions {
                let named = app("!", [e.clone(), atom_s(":named"), atom_s(dep_name(*dep))]);
                writeln!(f, "{}", app("assert", [named]))?;
            }
        }
        Ok(())
    }
}
