// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Construction of SMT-LIB bit-vector terms, and parsing of the bit-vector
//! values solvers print in models.
//!
//! All arithmetic follows SMT-LIB fixed-width semantics: results wrap around
//! modulo 2^width.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use smtlib::sexp::{app, atom_i, atom_s, indexed, Sexp};

/// The sort `(_ BitVec width)`.
pub fn sort(width: u32) -> Sexp {
    indexed("BitVec", [width as usize])
}

/// 2^width
pub fn modulus(width: u32) -> BigUint {
    BigUint::one() << width
}

/// The value with the low `width` bits set.
pub fn mask(width: u32) -> BigUint {
    modulus(width) - 1u32
}

/// Reduce an arbitrary integer into `[0, 2^width)`.
pub fn reduce(v: &BigInt, width: u32) -> BigUint {
    let m = BigInt::from(modulus(width));
    let r = ((v % &m) + &m) % &m;
    r.to_biguint().expect("reduced value is non-negative")
}

/// The numeral `(_ bvN width)`, with `value` taken modulo 2^width.
pub fn num(value: &BigUint, width: u32) -> Sexp {
    let value = value % modulus(width);
    app("_", [atom_s(format!("bv{value}")), atom_i(width as usize)])
}

macro_rules! binary_ops {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(a: Sexp, b: Sexp) -> Sexp {
                app(stringify!($name), [a, b])
            }
        )*
    };
}

binary_ops! {
    /// Wrapping addition.
    bvadd,
    /// Wrapping multiplication.
    bvmul,
    /// Left shift; shifting by the width or more gives zero.
    bvshl,
    /// Logical right shift.
    bvlshr,
    /// Arithmetic right shift.
    bvashr,
    bvand,
    bvor,
    bvxor,
    /// Unsigned less-or-equal.
    bvule,
    /// Signed less-or-equal.
    bvsle,
}

/// Bitwise negation.
pub fn bvnot(a: Sexp) -> Sexp {
    app("bvnot", [a])
}

/// Equality (on bit-vectors or Booleans).
pub fn eq(a: Sexp, b: Sexp) -> Sexp {
    app("=", [a, b])
}

/// Boolean negation.
pub fn not(a: Sexp) -> Sexp {
    app("not", [a])
}

/// Boolean implication.
pub fn implies(a: Sexp, b: Sexp) -> Sexp {
    app("=>", [a, b])
}

/// Bits `hi` down to `lo` of `a`.
pub fn extract(hi: u32, lo: u32, a: Sexp) -> Sexp {
    Sexp::List(vec![indexed("extract", [hi as usize, lo as usize]), a])
}

/// Widen `a` by `k` zero bits.
pub fn zero_extend(k: u32, a: Sexp) -> Sexp {
    Sexp::List(vec![indexed("zero_extend", [k as usize]), a])
}

/// Widen `a` by `k` copies of its sign bit.
pub fn sign_extend(k: u32, a: Sexp) -> Sexp {
    Sexp::List(vec![indexed("sign_extend", [k as usize]), a])
}

/// Bit `idx` of `a` is set.
pub fn bit(a: Sexp, idx: u32) -> Sexp {
    eq(extract(idx, idx, a), num(&BigUint::one(), 1))
}

/// The unsigned product of `a` and `b` (of `width` bits) fits in `width` bits.
pub fn umul_no_ovfl(a: Sexp, b: Sexp, width: u32) -> Sexp {
    let prod = bvmul(zero_extend(width, a), zero_extend(width, b));
    eq(
        extract(2 * width - 1, width, prod),
        num(&BigUint::zero(), width),
    )
}

fn smul_wide(a: Sexp, b: Sexp, width: u32) -> Sexp {
    bvmul(sign_extend(width, a), sign_extend(width, b))
}

/// The signed product of `a` and `b` is at most the largest signed value of
/// `width` bits.
pub fn smul_no_ovfl(a: Sexp, b: Sexp, width: u32) -> Sexp {
    let max = modulus(width - 1) - 1u32;
    bvsle(smul_wide(a, b, width), num(&max, 2 * width))
}

/// The signed product of `a` and `b` is at least the smallest signed value
/// of `width` bits.
pub fn smul_no_udfl(a: Sexp, b: Sexp, width: u32) -> Sexp {
    // -2^(width-1) in 2*width bits
    let min = modulus(2 * width) - modulus(width - 1);
    bvsle(num(&min, 2 * width), smul_wide(a, b, width))
}

/// Parse a bit-vector value as printed by a solver: `#b0101`, `#x1f` or
/// `(_ bv5 4)`. Returns the value and its width.
pub fn parse_value(s: &Sexp) -> Option<(BigUint, u32)> {
    if let Some(lit) = s.atom_s() {
        if let Some(bits) = lit.strip_prefix("#b") {
            let value = BigUint::parse_bytes(bits.as_bytes(), 2)?;
            return Some((value, bits.len() as u32));
        }
        if let Some(hex) = lit.strip_prefix("#x") {
            let value = BigUint::parse_bytes(hex.as_bytes(), 16)?;
            return Some((value, 4 * hex.len() as u32));
        }
        return None;
    }
    match s.app()? {
        ("_", [name, width]) => {
            let digits = name.atom_s()?.strip_prefix("bv")?;
            let value = BigUint::parse_bytes(digits.as_bytes(), 10)?;
            Some((value, width.atom_i()? as u32))
        }
        _ => None,
    }
}

/// Interpret the low `width` bits of `v` as a two's complement integer.
pub fn to_signed(v: &BigUint, width: u32) -> BigInt {
    if v.bit(u64::from(width) - 1) {
        BigInt::from_biguint(Sign::Plus, v.clone()) - BigInt::from(modulus(width))
    } else {
        BigInt::from_biguint(Sign::Plus, v.clone())
    }
}
