// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed scenarios, run against the exhaustive backend and, when it can be
//! launched, against Z3.

use num_bigint::{BigInt, BigUint};
use univariate::{SatResp, SolverConf, UnivariateError, UnivariateFactory};

fn c(v: u32) -> BigUint {
    BigUint::from(v)
}

fn p(coeffs: &[i64]) -> Vec<BigInt> {
    coeffs.iter().map(|&c| BigInt::from(c)).collect()
}

fn range_and_parity<F: UnivariateFactory>(f: &F) {
    let mut s = f.solver(4).unwrap();
    s.add_ule_const(&c(10), false, 1).unwrap();
    s.add_uge_const(&c(3), false, 2).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Sat);
    let m = s.model().unwrap();
    assert!(c(3) <= m && m <= c(10), "model {m} out of range");
    assert_eq!(s.find_min().unwrap(), Some(c(3)));
    assert_eq!(s.find_max().unwrap(), Some(c(10)));

    s.add_bit(0, false, 3).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Sat);
    assert_eq!(s.find_min().unwrap(), Some(c(3)));
    assert_eq!(s.find_max().unwrap(), Some(c(9)));
    assert_eq!(s.scope_level(), 0);
}

fn conflict<F: UnivariateFactory>(f: &F) {
    let mut s = f.solver(4).unwrap();
    s.add_ule_const(&c(2), false, 1).unwrap();
    s.add_uge_const(&c(5), false, 2).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Unsat);
    assert_eq!(s.unsat_core().unwrap(), vec![1, 2]);
}

fn push_pop<F: UnivariateFactory>(f: &F) {
    let mut s = f.solver(4).unwrap();
    s.add_ule_const(&c(2), false, 1).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Sat);
    let m = s.model().unwrap();

    s.push().unwrap();
    s.add_uge_const(&c(5), false, 2).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Unsat);
    assert_eq!(s.unsat_core().unwrap(), vec![1, 2]);
    s.pop(1).unwrap();

    assert_eq!(s.model().unwrap(), m);
    assert_eq!(s.check().unwrap(), SatResp::Sat);
    assert!(s.model().unwrap() <= c(2));

    // a dependency may tag several constraints, and scopes may be popped
    // several at a time
    s.push().unwrap();
    s.add_bit(3, false, 7).unwrap();
    s.push().unwrap();
    s.add_bit(2, false, 7).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Unsat);
    let core = s.unsat_core().unwrap();
    assert!(core.contains(&1) && core.contains(&7) && core.len() == 2);
    s.pop(2).unwrap();
    assert_eq!(s.scope_level(), 0);
    assert_eq!(s.check().unwrap(), SatResp::Sat);
}

fn polynomials<F: UnivariateFactory>(f: &F) {
    // x^2 + 1 <= 1 means x^2 = 0 mod 16, so x is a multiple of 4
    let mut s = f.solver(4).unwrap();
    s.add_ule(&p(&[1, 0, 1]), &p(&[1]), false, 1).unwrap();
    s.add_uge_const(&c(1), false, 2).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Sat);
    assert_eq!(s.find_min().unwrap(), Some(c(4)));
    assert_eq!(s.find_max().unwrap(), Some(c(12)));

    // 3x + 2 = 8 has the single solution 2; -14 stands for 2
    let mut s = f.solver(4).unwrap();
    s.add_ule(&p(&[2, 3]), &p(&[8]), false, 1).unwrap();
    s.add_ule(&p(&[8]), &p(&[-14, 3]), false, 2).unwrap();
    assert_eq!(s.check().unwrap(), SatResp::Sat);
    assert_eq!(s.model().unwrap(), c(2));
}

fn preconditions<F: UnivariateFactory>(f: &F) {
    assert!(matches!(f.solver(0), Err(UnivariateError::ZeroWidth)));
    let mut s = f.solver(4).unwrap();
    assert!(matches!(s.pop(1), Err(UnivariateError::PopTooDeep { .. })));
    assert!(matches!(s.model(), Err(UnivariateError::NoModel)));
    assert!(matches!(s.unsat_core(), Err(UnivariateError::NoUnsatCore)));
    assert!(matches!(
        s.add_bit(4, false, 1),
        Err(UnivariateError::BitOutOfRange { idx: 4, width: 4 })
    ));
    assert!(matches!(s.find_min(), Err(UnivariateError::NoModel)));
}

fn all<F: UnivariateFactory>(f: &F) {
    range_and_parity(f);
    conflict(f);
    push_pop(f);
    polynomials(f);
    preconditions(f);
}

#[test]
fn test_exhaustive() {
    let _ = pretty_env_logger::try_init();
    all(&SolverConf::exhaustive());
}

#[test]
fn test_z3() {
    let _ = pretty_env_logger::try_init();
    let conf = SolverConf::z3();
    if conf.solver(4).is_err() {
        eprintln!("skipping: could not launch z3");
        return;
    }
    all(&conf);
}
