// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Encoding of univariate polynomials as bit-vector terms.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use smtlib::sexp::Sexp;

use crate::bv;

/// Encodes polynomials in a single unknown as terms of a fixed bit-width.
///
/// A polynomial is given by its coefficients, lowest degree first: `[d, c, b,
/// a]` stands for `d + c*x + b*x^2 + a*x^3`.
#[derive(Debug, Clone)]
pub struct PolyEncoder {
    width: u32,
    x: Sexp,
}

impl PolyEncoder {
    /// An encoder for polynomials in `x` of `width` bits.
    pub fn new(x: Sexp, width: u32) -> Self {
        Self { width, x }
    }

    /// The numeral for `v` modulo 2^width.
    pub fn numeral(&self, v: &BigInt) -> Sexp {
        bv::num(&bv::reduce(v, self.width), self.width)
    }

    /// `coeff * xpow`, as a shift when the coefficient is a power of two.
    fn term(&self, coeff: &BigUint, xpow: &Sexp) -> Sexp {
        if coeff.count_ones() == 1 {
            let k = coeff.trailing_zeros().expect("coefficient is non-zero");
            bv::bvshl(xpow.clone(), bv::num(&BigUint::from(k), self.width))
        } else {
            bv::bvmul(bv::num(coeff, self.width), xpow.clone())
        }
    }

    /// Encode the polynomial with coefficients `p`.
    ///
    /// `[d, c, b, a]` becomes `d + c*x + b*(x*x) + a*(x*x*x)`, where a term
    /// `2^k*x^i` becomes `x^i << k` and zero coefficients are dropped.
    pub fn encode(&self, p: &[BigInt]) -> Sexp {
        let Some((constant, rest)) = p.split_first() else {
            return self.numeral(&BigInt::zero());
        };
        let mut e = self.numeral(constant);
        let mut xpow = self.x.clone();
        for (i, coeff) in rest.iter().enumerate() {
            let coeff = bv::reduce(coeff, self.width);
            if !coeff.is_zero() {
                e = bv::bvadd(e, self.term(&coeff, &xpow));
            }
            if i + 1 < rest.len() {
                xpow = bv::bvmul(xpow, self.x.clone());
            }
        }
        e
    }
}

#[cfg(test)]
mod tests {
    use super::PolyEncoder;
    use num_bigint::BigInt;
    use smtlib::sexp::atom_s;

    fn poly(coeffs: &[i64]) -> Vec<BigInt> {
        coeffs.iter().map(|&c| BigInt::from(c)).collect()
    }

    #[test]
    fn test_encode_shapes() {
        let enc = PolyEncoder::new(atom_s("x"), 8);
        insta::assert_snapshot!(enc.encode(&[]), @"(_ bv0 8)");
        insta::assert_snapshot!(enc.encode(&poly(&[7])), @"(_ bv7 8)");
        insta::assert_snapshot!(enc.encode(&poly(&[0, 1])), @"(bvadd (_ bv0 8) (bvshl x (_ bv0 8)))");
        insta::assert_snapshot!(
            enc.encode(&poly(&[3, 0, 4])),
            @"(bvadd (_ bv3 8) (bvshl (bvmul x x) (_ bv2 8)))"
        );
        insta::assert_snapshot!(
            enc.encode(&poly(&[1, 3, 0, 5])),
            @"(bvadd (bvadd (_ bv1 8) (bvmul (_ bv3 8) x)) (bvmul (_ bv5 8) (bvmul (bvmul x x) x)))"
        );
    }

    #[test]
    fn test_encode_reduces_coefficients() {
        let enc = PolyEncoder::new(atom_s("x"), 4);
        // -1 is 15 and 18 is 2 = 2^1 modulo 16; 16 vanishes
        insta::assert_snapshot!(
            enc.encode(&poly(&[-1, 18, 16])),
            @"(bvadd (_ bv15 4) (bvshl x (_ bv1 4)))"
        );
    }
}
