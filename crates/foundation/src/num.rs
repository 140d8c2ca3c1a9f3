//! Arbitrary-precision decimals and wide integers.
//!
//! Positions are decimals with enough digits to stay exact far past IEEE-754
//! (`BigDec`), tile indices are unbounded non-negative integers. Every path
//! that ends in a tile-coordinate conversion must stay in `BigDec` until the
//! final integer floor.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{FromPrimitive, One, ToPrimitive, Zero};

use crate::precision::PrecisionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumError {
    BadCoordinate(String),
    IndexTooLarge,
    DivisionByZero,
}

impl fmt::Display for NumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumError::BadCoordinate(raw) => write!(f, "ill-formed decimal coordinate: {raw:?}"),
            NumError::IndexTooLarge => write!(f, "tile index does not fit in 64 bits"),
            NumError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for NumError {}

/// Arbitrary-precision decimal.
///
/// Addition, subtraction and multiplication are exact; division rounds to the
/// context's digit count plus two guard digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BigDec(BigDecimal);

impl BigDec {
    pub fn zero() -> Self {
        Self(BigDecimal::zero())
    }

    pub fn one() -> Self {
        Self(BigDecimal::one())
    }

    pub fn from_int(v: i64) -> Self {
        Self(BigDecimal::from(v))
    }

    pub fn from_bigint(v: BigInt) -> Self {
        Self(BigDecimal::from(v))
    }

    /// Parse a decimal string exactly, keeping every digit.
    pub fn parse(raw: &str) -> Result<Self, NumError> {
        BigDecimal::from_str(raw.trim())
            .map(Self)
            .map_err(|_| NumError::BadCoordinate(raw.to_string()))
    }

    pub fn from_f64(v: f64) -> Result<Self, NumError> {
        BigDecimal::from_f64(v)
            .map(Self)
            .ok_or_else(|| NumError::BadCoordinate(v.to_string()))
    }

    /// Lossy f64 import: non-finite values collapse to zero.
    ///
    /// Callers validate finiteness at their own boundary; this keeps interior
    /// arithmetic free of impossible error paths.
    pub fn from_lossy(v: f64) -> Self {
        BigDecimal::from_f64(v).map(Self).unwrap_or_else(Self::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn neg(&self) -> Self {
        Self(-&self.0)
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Exact product with a finite f64 factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self(&self.0 * Self::from_lossy(factor).0)
    }

    pub fn div(&self, rhs: &Self, ctx: &PrecisionContext) -> Result<Self, NumError> {
        if rhs.0.is_zero() {
            return Err(NumError::DivisionByZero);
        }
        // Long division on the unscaled integers, with two guard digits.
        let (an, ae) = self.0.as_bigint_and_exponent();
        let (bn, be) = rhs.0.as_bigint_and_exponent();
        let shift = ctx.digits() + 2;
        let scaled = an * BigInt::from(10u8).pow(shift as u32);
        let q = scaled / bn;
        Ok(Self(BigDecimal::new(q, shift as i64 + ae - be)))
    }

    /// `2^exp` for finite `exp`: exact big-integer power for the integer part,
    /// a native `exp2` factor (always in [1, 2)) for the fraction. Stable at
    /// any depth, unlike a raw `exp2(exp)` which under/overflows past ~1074.
    pub fn pow2(exp: f64, ctx: &PrecisionContext) -> Self {
        if !exp.is_finite() {
            return Self::one();
        }
        let int = exp.floor();
        let frac = exp - int;
        let base = Self::pow2_int(int as i64);
        if frac == 0.0 {
            return base;
        }
        let scaled = base.scaled(frac.exp2());
        Self(scaled.0.with_prec(ctx.digits() + 2))
    }

    /// Exact `2^k` for integer exponents. Negative exponents use the identity
    /// `2^-k = 5^k · 10^-k`, which stays a finite decimal.
    pub fn pow2_int(k: i64) -> Self {
        if k >= 0 {
            Self(BigDecimal::from(BigInt::one() << k as usize))
        } else {
            let k = k.unsigned_abs();
            Self(BigDecimal::new(BigInt::from(5u8).pow(k as u32), k as i64))
        }
    }

    /// Native-double fast path for `2^exp`; `None` once the result's exponent
    /// leaves the comfortable double range.
    pub fn pow2_f64(exp: f64) -> Option<f64> {
        if exp.is_finite() && exp.abs() < 1000.0 {
            Some(exp.exp2())
        } else {
            None
        }
    }

    /// Largest integer `<= self`.
    pub fn floor_int(&self) -> BigInt {
        let (digits, scale) = self.0.as_bigint_and_exponent();
        if scale <= 0 {
            return digits * BigInt::from(10u8).pow(scale.unsigned_abs() as u32);
        }
        let p = BigInt::from(10u8).pow(scale as u32);
        let q = &digits / &p;
        let r = &digits % &p;
        if r.sign() == Sign::Minus { q - 1 } else { q }
    }

    /// Split into the integer floor and the fractional remainder in [0, 1).
    ///
    /// The fraction converts to f64 without underflow because it is already
    /// in unit range.
    pub fn split_int_frac(&self) -> (BigInt, f64) {
        let int = self.floor_int();
        let frac = &self.0 - &BigDecimal::from(int.clone());
        (int, frac.to_f64().unwrap_or(0.0))
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    /// Plain decimal string, no exponent notation, trailing zeros stripped.
    pub fn to_plain_string(&self) -> String {
        self.0.normalized().to_string()
    }
}

impl fmt::Display for BigDec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

impl std::ops::Add for &BigDec {
    type Output = BigDec;
    fn add(self, rhs: &BigDec) -> BigDec {
        BigDec(&self.0 + &rhs.0)
    }
}

impl std::ops::Sub for &BigDec {
    type Output = BigDec;
    fn sub(self, rhs: &BigDec) -> BigDec {
        BigDec(&self.0 - &rhs.0)
    }
}

impl std::ops::Mul for &BigDec {
    type Output = BigDec;
    fn mul(self, rhs: &BigDec) -> BigDec {
        BigDec(&self.0 * &rhs.0)
    }
}

/// Narrow a wide index to u64, failing loudly instead of wrapping.
pub fn index_to_u64(index: &BigUint) -> Result<u64, NumError> {
    index.to_u64().ok_or(NumError::IndexTooLarge)
}

#[cfg(test)]
mod tests {
    use super::{BigDec, NumError, index_to_u64};
    use crate::precision::PrecisionContext;
    use num_bigint::{BigInt, BigUint};
    use num_traits::One;

    #[test]
    fn parse_keeps_deep_digits() {
        let x = BigDec::parse("0.500000000000000000000000000000000000000000000000000001").unwrap();
        let half = BigDec::parse("0.5").unwrap();
        let delta = &x - &half;
        assert!(!delta.is_zero());
        assert_eq!(
            delta.to_plain_string(),
            "0.000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            BigDec::parse("0.5.1"),
            Err(NumError::BadCoordinate(_))
        ));
        assert!(matches!(BigDec::parse(""), Err(NumError::BadCoordinate(_))));
    }

    #[test]
    fn pow2_integer_is_exact() {
        assert_eq!(BigDec::pow2_int(10).to_plain_string(), "1024");
        assert_eq!(BigDec::pow2_int(-3).to_plain_string(), "0.125");
        // 2^-10 = 0.0009765625 exactly.
        assert_eq!(BigDec::pow2_int(-10).to_plain_string(), "0.0009765625");
    }

    #[test]
    fn pow2_fractional_matches_native() {
        let ctx = PrecisionContext::new();
        let v = BigDec::pow2(10.5, &ctx).to_f64();
        assert!((v - 10.5f64.exp2()).abs() < 1e-9);
    }

    #[test]
    fn pow2_fast_path_cuts_off() {
        assert!(BigDec::pow2_f64(999.0).is_some());
        assert!(BigDec::pow2_f64(-999.0).is_some());
        assert!(BigDec::pow2_f64(1000.0).is_none());
        assert!(BigDec::pow2_f64(f64::NAN).is_none());
    }

    #[test]
    fn pow2_survives_deep_exponents() {
        let ctx = PrecisionContext::for_max_level(2000.0);
        let w = BigDec::pow2(-2000.0, &ctx);
        assert!(!w.is_zero());
        let back = &w * &BigDec::pow2(2000.0, &ctx);
        assert_eq!(back.to_plain_string(), "1");
    }

    #[test]
    fn floor_and_split() {
        let v = BigDec::parse("3.75").unwrap();
        let (int, frac) = v.split_int_frac();
        assert_eq!(int, BigInt::from(3));
        assert!((frac - 0.75).abs() < 1e-15);

        let neg = BigDec::parse("-0.25").unwrap();
        let (int, frac) = neg.split_int_frac();
        assert_eq!(int, BigInt::from(-1));
        assert!((frac - 0.75).abs() < 1e-15);
    }

    #[test]
    fn deep_tile_conversion_preserves_offset() {
        // A 1e-61 nudge at level 200 still moves the tile-space position.
        let base = BigDec::parse("0.5").unwrap();
        let nudged = &base + &BigDec::parse("1e-61").unwrap();
        let scale = BigDec::pow2_int(200);
        let a = (&base * &scale).floor_int();
        let b = (&nudged * &scale).floor_int();
        // 0.5 * 2^200 == 2^199 exactly; the nudge lands in the same tile but
        // the fractional parts must differ.
        assert_eq!(a, b);
        let (_, fa) = (&base * &scale).split_int_frac();
        let (_, fb) = (&nudged * &scale).split_int_frac();
        assert!(fa == 0.0);
        assert!(fb > 0.0);
        assert!(b > BigInt::one() << 198usize);
    }

    #[test]
    fn division_respects_context() {
        let ctx = PrecisionContext::new();
        let third = BigDec::one().div(&BigDec::from_int(3), &ctx).unwrap();
        assert!((third.to_f64() - 1.0 / 3.0).abs() < 1e-15);
        assert!(matches!(
            BigDec::one().div(&BigDec::zero(), &ctx),
            Err(NumError::DivisionByZero)
        ));
    }

    #[test]
    fn index_narrowing_fails_loudly() {
        let wide = BigUint::one() << 200usize;
        assert!(matches!(index_to_u64(&wide), Err(NumError::IndexTooLarge)));
        assert_eq!(index_to_u64(&BigUint::from(7u8)).unwrap(), 7);
    }
}
