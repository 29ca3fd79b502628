// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A reference [`Backend`] that decides satisfiability by evaluating the
//! asserted terms on every value of the unknown.
//!
//! This is only practical for small bit-widths, but it needs no external
//! solver and its answers are easy to trust, which makes it useful for
//! testing and for cross-checking the SMT encoding.

use std::collections::BTreeSet;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use smtlib::{
    proc::SatResp,
    sexp::{Atom, Sexp},
};

use crate::{
    backend::Backend,
    bv,
    error::{Result, UnivariateError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Bool(bool),
    Bv(BigUint, u32),
}

fn eval_error<T>(msg: String) -> Result<T> {
    Err(UnivariateError::Eval(msg))
}

/// An assignment of a value to the (at most one) bit-vector constant.
struct Env<'a> {
    var: Option<(&'a str, u32)>,
    value: &'a BigUint,
}

impl Env<'_> {
    fn eval_bool(&self, e: &Sexp) -> Result<bool> {
        match self.eval(e)? {
            Value::Bool(b) => Ok(b),
            Value::Bv(..) => eval_error(format!("expected a Boolean: {e}")),
        }
    }

    fn eval_bv(&self, e: &Sexp) -> Result<(BigUint, u32)> {
        match self.eval(e)? {
            Value::Bv(v, w) => Ok((v, w)),
            Value::Bool(_) => eval_error(format!("expected a bit-vector: {e}")),
        }
    }

    /// Evaluate both arguments of a binary bit-vector operator, which must
    /// have the same width.
    fn eval_bv2(&self, head: &str, args: &[Sexp]) -> Result<(BigUint, BigUint, u32)> {
        let [a, b] = args else {
            return eval_error(format!("{head} expects 2 arguments, got {}", args.len()));
        };
        let (a, wa) = self.eval_bv(a)?;
        let (b, wb) = self.eval_bv(b)?;
        if wa != wb {
            return eval_error(format!("{head} applied to widths {wa} and {wb}"));
        }
        Ok((a, b, wa))
    }

    fn eval(&self, e: &Sexp) -> Result<Value> {
        match e {
            Sexp::Atom(Atom::S(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => match self.var {
                    Some((name, width)) if name == s.as_str() => {
                        Ok(Value::Bv(self.value.clone(), width))
                    }
                    _ => match bv::parse_value(e) {
                        Some((v, w)) => Ok(Value::Bv(v, w)),
                        None => eval_error(format!("unknown symbol {s}")),
                    },
                },
            },
            Sexp::Atom(Atom::I(i)) => eval_error(format!("unexpected integer {i}")),
            Sexp::Comment(_) => eval_error("comment".to_string()),
            Sexp::List(ss) => {
                if let Some((v, w)) = bv::parse_value(e) {
                    return Ok(Value::Bv(v, w));
                }
                let ss = ss
                    .iter()
                    .filter(|s| !matches!(s, Sexp::Comment(_)))
                    .cloned()
                    .collect::<Vec<_>>();
                let Some((head, args)) = ss.split_first() else {
                    return eval_error("empty list".to_string());
                };
                if let Some((name, indices)) = head.indexed() {
                    return self.eval_indexed(name, &indices, args);
                }
                match head.atom_s() {
                    Some(head) => self.eval_app(head, args),
                    None => eval_error(format!("unexpected function {head} (non-atom)")),
                }
            }
        }
    }

    fn eval_indexed(&self, name: &str, indices: &[usize], args: &[Sexp]) -> Result<Value> {
        let [arg] = args else {
            return eval_error(format!("{name} expects 1 argument, got {}", args.len()));
        };
        let (a, w) = self.eval_bv(arg)?;
        match (name, indices) {
            ("extract", &[hi, lo]) => {
                let (hi, lo) = (hi as u32, lo as u32);
                if lo > hi || hi >= w {
                    return eval_error(format!("cannot extract {hi}..{lo} of {w} bits"));
                }
                let width = hi - lo + 1;
                Ok(Value::Bv((a >> lo) & bv::mask(width), width))
            }
            ("zero_extend", &[k]) => Ok(Value::Bv(a, w + k as u32)),
            ("sign_extend", &[k]) => {
                let k = k as u32;
                if w > 0 && a.bit(u64::from(w) - 1) {
                    Ok(Value::Bv(a | (bv::mask(k) << w), w + k))
                } else {
                    Ok(Value::Bv(a, w + k))
                }
            }
            _ => eval_error(format!("unsupported indexed operator {name} {indices:?}")),
        }
    }

    fn eval_app(&self, head: &str, args: &[Sexp]) -> Result<Value> {
        let bools = || {
            args.iter()
                .map(|a| self.eval_bool(a))
                .collect::<Result<Vec<_>>>()
        };
        let bits = |v: BigUint, w: u32| -> Result<Value> { Ok(Value::Bv(v & bv::mask(w), w)) };
        match head {
            "not" => match bools()?.as_slice() {
                [b] => Ok(Value::Bool(!b)),
                _ => eval_error("not expects 1 argument".to_string()),
            },
            "and" => Ok(Value::Bool(bools()?.into_iter().all(|b| b))),
            "or" => Ok(Value::Bool(bools()?.into_iter().any(|b| b))),
            "=>" => match bools()?.as_slice() {
                [a, b] => Ok(Value::Bool(!a || *b)),
                _ => eval_error("=> expects 2 arguments".to_string()),
            },
            "=" | "distinct" => {
                let vals = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>>>()?;
                let all_eq = vals.windows(2).all(|w| w[0] == w[1]);
                let pairwise_distinct = vals
                    .iter()
                    .enumerate()
                    .all(|(i, v)| vals[i + 1..].iter().all(|u| u != v));
                Ok(Value::Bool(if head == "=" {
                    all_eq
                } else {
                    pairwise_distinct
                }))
            }
            "ite" => {
                let [c, t, e] = args else {
                    return eval_error("ite expects 3 arguments".to_string());
                };
                if self.eval_bool(c)? {
                    self.eval(t)
                } else {
                    self.eval(e)
                }
            }
            "bvnot" | "bvneg" => {
                let [a] = args else {
                    return eval_error(format!("{head} expects 1 argument"));
                };
                let (a, w) = self.eval_bv(a)?;
                if head == "bvnot" {
                    bits(a ^ bv::mask(w), w)
                } else {
                    bits(bv::modulus(w) - a, w)
                }
            }
            _ => {
                let (a, b, w) = self.eval_bv2(head, args)?;
                // shift amounts of at least the width shift everything out
                let shift = b.to_u32().filter(|&s| s < w);
                match head {
                    "bvadd" => bits(a + b, w),
                    "bvsub" => bits(a + bv::modulus(w) - b, w),
                    "bvmul" => bits(a * b, w),
                    "bvand" => bits(a & b, w),
                    "bvor" => bits(a | b, w),
                    "bvxor" => bits(a ^ b, w),
                    "bvshl" => match shift {
                        Some(s) => bits(a << s, w),
                        None => bits(BigUint::zero(), w),
                    },
                    "bvlshr" => match shift {
                        Some(s) => bits(a >> s, w),
                        None => bits(BigUint::zero(), w),
                    },
                    "bvashr" => {
                        let negative = a.bit(u64::from(w) - 1);
                        match (shift, negative) {
                            (Some(s), true) => {
                                bits((a >> s) | (bv::mask(w) - bv::mask(w - s)), w)
                            }
                            (Some(s), false) => bits(a >> s, w),
                            (None, true) => bits(bv::mask(w), w),
                            (None, false) => bits(BigUint::zero(), w),
                        }
                    }
                    "bvule" => Ok(Value::Bool(a <= b)),
                    "bvult" => Ok(Value::Bool(a < b)),
                    "bvuge" => Ok(Value::Bool(a >= b)),
                    "bvugt" => Ok(Value::Bool(a > b)),
                    "bvsle" | "bvslt" | "bvsge" | "bvsgt" => {
                        let (a, b) = (bv::to_signed(&a, w), bv::to_signed(&b, w));
                        Ok(Value::Bool(match head {
                            "bvsle" => a <= b,
                            "bvslt" => a < b,
                            "bvsge" => a >= b,
                            _ => a > b,
                        }))
                    }
                    _ => eval_error(format!("unsupported function {head}")),
                }
            }
        }
    }
}

/// The result of the last check.
#[derive(Debug, Clone)]
enum Outcome {
    Model(BigUint),
    Core(Vec<String>),
}

/// A [`Backend`] that enumerates all values of its single bit-vector constant,
/// in increasing order unless set to descending.
///
/// The model found by a check is therefore the least (or greatest) satisfying
/// value. After an unsat check the core holds, for every value, the name of
/// the first assertion it falsifies.
#[derive(Debug, Clone)]
pub struct ExhaustiveBackend {
    max_width: u32,
    check_limit: Option<usize>,
    descending: bool,
    checks: usize,
    var: Option<(String, u32)>,
    scopes: Vec<Vec<(Sexp, String)>>,
    outcome: Option<Outcome>,
}

impl ExhaustiveBackend {
    /// A backend that answers unknown for constants wider than `max_width`
    /// bits, and once it has performed `check_limit` checks (if given).
    pub fn new(max_width: u32, check_limit: Option<usize>) -> Self {
        Self {
            max_width,
            check_limit,
            descending: false,
            checks: 0,
            var: None,
            scopes: vec![vec![]],
            outcome: None,
        }
    }

    /// Enumerate values from the greatest down, so that checks find the
    /// greatest satisfying value.
    pub fn descending(&mut self, descending: bool) -> &mut Self {
        self.descending = descending;
        self
    }

    /// The widest constant this backend enumerates.
    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// The number of checks performed so far.
    pub fn checks(&self) -> usize {
        self.checks
    }

    /// The name of the first assertion falsified when the constant has value
    /// `value`, or None if all of them hold.
    fn first_falsified(&self, value: &BigUint) -> Result<Option<&str>> {
        let env = Env {
            var: self.var.as_ref().map(|(name, w)| (name.as_str(), *w)),
            value,
        };
        for (term, name) in self.scopes.iter().flatten() {
            if !env.eval_bool(term)? {
                return Ok(Some(name.as_str()));
            }
        }
        Ok(None)
    }
}

impl Default for ExhaustiveBackend {
    fn default() -> Self {
        Self::new(16, None)
    }
}

impl Backend for ExhaustiveBackend {
    fn declare_bv(&mut self, name: &str, width: u32) -> Result<()> {
        if let Some((var, _)) = &self.var {
            return eval_error(format!("cannot declare {name}: {var} is already declared"));
        }
        self.var = Some((name.to_string(), width));
        Ok(())
    }

    fn assert_named(&mut self, term: &Sexp, name: &str) -> Result<()> {
        self.outcome = None;
        self.scopes
            .last_mut()
            .expect("backend always has a scope")
            .push((term.clone(), name.to_string()));
        Ok(())
    }

    fn push(&mut self) -> Result<()> {
        self.outcome = None;
        self.scopes.push(vec![]);
        Ok(())
    }

    fn pop(&mut self, n: usize) -> Result<()> {
        assert!(n < self.scopes.len(), "cannot pop the base scope");
        self.outcome = None;
        self.scopes.truncate(self.scopes.len() - n);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResp> {
        self.outcome = None;
        if self.check_limit.is_some_and(|limit| self.checks >= limit) {
            return Ok(SatResp::Unknown("check limit reached".to_string()));
        }
        let width = self.var.as_ref().map_or(0, |(_, w)| *w);
        if width > self.max_width {
            return Ok(SatResp::Unknown(format!(
                "{width} bits exceed the exhaustive limit of {}",
                self.max_width
            )));
        }
        self.checks += 1;
        let mut core = BTreeSet::new();
        let last = bv::mask(width);
        let mut value = if self.descending {
            last.clone()
        } else {
            BigUint::zero()
        };
        loop {
            match self.first_falsified(&value)? {
                None => {
                    self.outcome = Some(Outcome::Model(value));
                    return Ok(SatResp::Sat);
                }
                Some(name) => {
                    core.insert(name.to_string());
                }
            }
            if self.descending {
                if value.is_zero() {
                    break;
                }
                value -= 1u32;
            } else {
                if value == last {
                    break;
                }
                value += 1u32;
            }
        }
        self.outcome = Some(Outcome::Core(core.into_iter().collect()));
        Ok(SatResp::Unsat)
    }

    fn get_value(&mut self, name: &str) -> Result<Sexp> {
        match (&self.outcome, &self.var) {
            (Some(Outcome::Model(value)), Some((var, width))) if var == name => {
                Ok(bv::num(value, *width))
            }
            (Some(Outcome::Model(_)), _) => eval_error(format!("unknown constant {name}")),
            _ => Err(UnivariateError::NoModel),
        }
    }

    fn get_unsat_core(&mut self) -> Result<Vec<String>> {
        match &self.outcome {
            Some(Outcome::Core(core)) => Ok(core.clone()),
            _ => Err(UnivariateError::NoUnsatCore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use smtlib::sexp::{atom_s, parse};

    fn eval_closed(e: &str) -> Result<Value> {
        let zero = BigUint::zero();
        let env = Env {
            var: None,
            value: &zero,
        };
        env.eval(&parse(e).unwrap())
    }

    fn eval_num(e: &str) -> u32 {
        match eval_closed(e).unwrap() {
            Value::Bv(v, _) => v.to_u32().unwrap(),
            v => panic!("{e} evaluated to {v:?}"),
        }
    }

    #[test]
    fn test_eval_arith() {
        assert_eq!(eval_num("(bvadd (_ bv9 4) (_ bv9 4))"), 2);
        assert_eq!(eval_num("(bvsub (_ bv1 4) (_ bv2 4))"), 15);
        assert_eq!(eval_num("(bvmul #b0101 #b0100)"), 4);
        assert_eq!(eval_num("(bvneg (_ bv1 4))"), 15);
        assert_eq!(eval_num("(bvneg (_ bv0 4))"), 0);
        assert_eq!(eval_num("(bvnot #x0f)"), 0xf0);
    }

    #[test]
    fn test_eval_shifts() {
        assert_eq!(eval_num("(bvshl (_ bv3 4) (_ bv2 4))"), 12);
        assert_eq!(eval_num("(bvshl (_ bv3 4) (_ bv4 4))"), 0);
        assert_eq!(eval_num("(bvlshr (_ bv12 4) (_ bv2 4))"), 3);
        assert_eq!(eval_num("(bvlshr (_ bv12 4) (_ bv9 4))"), 0);
        // 1100 >>a 2 = 1111
        assert_eq!(eval_num("(bvashr (_ bv12 4) (_ bv2 4))"), 15);
        assert_eq!(eval_num("(bvashr (_ bv12 4) (_ bv1 4))"), 14);
        assert_eq!(eval_num("(bvashr (_ bv12 4) (_ bv15 4))"), 15);
        assert_eq!(eval_num("(bvashr (_ bv4 4) (_ bv1 4))"), 2);
    }

    #[test]
    fn test_eval_indexed() {
        assert_eq!(eval_num("((_ extract 2 1) (_ bv6 4))"), 3);
        assert_eq!(eval_num("((_ zero_extend 4) (_ bv9 4))"), 9);
        assert_eq!(eval_num("((_ sign_extend 4) (_ bv9 4))"), 0xf9);
        assert!(eval_closed("((_ extract 4 0) (_ bv9 4))").is_err());
    }

    #[test]
    fn test_eval_bool() {
        let t = |e: &str| eval_closed(e).unwrap() == Value::Bool(true);
        assert!(t("(bvslt (_ bv15 4) (_ bv0 4))"));
        assert!(!t("(bvult (_ bv15 4) (_ bv0 4))"));
        assert!(t("(distinct (_ bv1 4) (_ bv2 4) (_ bv3 4))"));
        assert!(!t("(distinct (_ bv1 4) (_ bv2 4) (_ bv1 4))"));
        assert!(t("(=> false (= (_ bv1 4) (_ bv2 4)))"));
        assert!(t("(ite (and true (not false)) (or false true) false)"));
    }

    #[test]
    fn test_eval_errors() {
        assert!(matches!(
            eval_closed("(bvudiv (_ bv1 4) (_ bv1 4))"),
            Err(UnivariateError::Eval(_))
        ));
        assert!(eval_closed("(bvadd (_ bv1 4) (_ bv1 8))").is_err());
        assert!(eval_closed("(not (_ bv1 4))").is_err());
        assert!(eval_closed("y").is_err());
    }

    #[test]
    fn test_overflow_predicates() {
        let w = 4;
        for a in 0u32..16 {
            for b in 0u32..16 {
                let (ta, tb) = (bv::num(&a.into(), w), bv::num(&b.into(), w));
                let holds = |e: Sexp| eval_closed(&e.to_string()).unwrap() == Value::Bool(true);
                let signed = |v: u32| bv::to_signed(&v.into(), w);
                let prod = signed(a) * signed(b);
                assert_eq!(
                    holds(bv::umul_no_ovfl(ta.clone(), tb.clone(), w)),
                    a * b < 16,
                    "umul {a} {b}"
                );
                assert_eq!(
                    holds(bv::smul_no_ovfl(ta.clone(), tb.clone(), w)),
                    prod <= BigInt::from(7),
                    "smul ovfl {a} {b}"
                );
                assert_eq!(
                    holds(bv::smul_no_udfl(ta, tb, w)),
                    prod >= BigInt::from(-8),
                    "smul udfl {a} {b}"
                );
            }
        }
    }

    #[test]
    fn test_check_and_core() {
        let mut b = ExhaustiveBackend::default();
        b.declare_bv("x", 4).unwrap();
        let x = atom_s("x");
        b.assert_named(&bv::bvule(x.clone(), bv::num(&2u32.into(), 4)), "a")
            .unwrap();
        assert_eq!(b.check_sat().unwrap(), SatResp::Sat);
        assert_eq!(b.get_value("x").unwrap(), bv::num(&0u32.into(), 4));
        b.push().unwrap();
        b.assert_named(&bv::bvule(bv::num(&5u32.into(), 4), x.clone()), "b")
            .unwrap();
        b.assert_named(&bv::bvule(x.clone(), x), "c").unwrap();
        assert_eq!(b.check_sat().unwrap(), SatResp::Unsat);
        assert_eq!(b.get_unsat_core().unwrap(), vec!["a", "b"]);
        assert!(matches!(b.get_value("x"), Err(UnivariateError::NoModel)));
        b.pop(1).unwrap();
        assert_eq!(b.check_sat().unwrap(), SatResp::Sat);
        assert_eq!(b.checks(), 3);
    }

    #[test]
    fn test_descending() {
        let mut b = ExhaustiveBackend::default();
        b.descending(true);
        b.declare_bv("x", 4).unwrap();
        let x = atom_s("x");
        b.assert_named(&bv::bvule(x.clone(), bv::num(&10u32.into(), 4)), "a")
            .unwrap();
        assert_eq!(b.check_sat().unwrap(), SatResp::Sat);
        assert_eq!(b.get_value("x").unwrap(), bv::num(&10u32.into(), 4));
        b.assert_named(&bv::bvule(bv::num(&12u32.into(), 4), x), "b")
            .unwrap();
        assert_eq!(b.check_sat().unwrap(), SatResp::Unsat);
        assert_eq!(b.get_unsat_core().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_limits() {
        let mut b = ExhaustiveBackend::new(8, Some(1));
        b.declare_bv("x", 4).unwrap();
        assert_eq!(b.check_sat().unwrap(), SatResp::Sat);
        assert!(matches!(b.check_sat().unwrap(), SatResp::Unknown(_)));

        let mut b = ExhaustiveBackend::new(8, None);
        b.declare_bv("x", 9).unwrap();
        assert!(matches!(b.check_sat().unwrap(), SatResp::Unknown(_)));
        assert!(b.declare_bv("y", 4).is_err());
    }
}
