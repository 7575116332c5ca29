//! Floating-point constant representation and folding helpers.
//!
//! [`FpSemantics::Single`] and [`FpSemantics::Double`] fold using the host's
//! native `f32`/`f64`; `Extended` and `Quad` are modelled as `f64` carried at
//! a wider nominal width, which is sufficient for the category/equality
//! reasoning the core performs without requiring a full soft-float quad
//! implementation.

use core::cmp::Ordering;

use super::FpSemantics;
use crate::expr::fp_category::FpCategory;

/// A floating-point constant: semantics tag plus its bit pattern.
#[derive(Debug, Clone, Copy)]
pub struct FloatValue {
    semantics: FpSemantics,
    bits: f64,
}

impl PartialEq for FloatValue {
    fn eq(&self, other: &Self) -> bool {
        self.semantics == other.semantics && self.bits.to_bits() == other.bits.to_bits()
    }
}
impl Eq for FloatValue {}

impl core::hash::Hash for FloatValue {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.semantics.hash(state);
        self.bits.to_bits().hash(state);
    }
}

impl FloatValue {
    /// Construct from a host `f64`, tagging it with `semantics`.
    pub fn new(value: f64, semantics: FpSemantics) -> Self {
        let bits = match semantics {
            FpSemantics::Single => value as f32 as f64,
            _ => value,
        };
        Self { semantics, bits }
    }

    /// Semantics this value was constructed with.
    pub fn semantics(&self) -> FpSemantics {
        self.semantics
    }

    /// Value as a host `f64`.
    pub fn as_f64(&self) -> f64 {
        self.bits
    }

    /// Conservative category for this concrete value (always exact here,
    /// since the value is known).
    pub fn category(&self) -> FpCategory {
        if self.bits.is_nan() {
            FpCategory::NAN
        } else if self.bits == 0.0 {
            FpCategory::ZERO
        } else if self.bits.is_infinite() {
            if self.bits > 0.0 {
                FpCategory::POS_INF
            } else {
                FpCategory::NEG_INF
            }
        } else if self.bits > 0.0 {
            FpCategory::POSITIVE
        } else {
            FpCategory::NEGATIVE
        }
    }

    /// IEEE-754 ordered comparison (`None` when either operand is NaN).
    pub fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.bits.partial_cmp(&other.bits)
    }

    /// `self + other` at `self`'s semantics (operands are assumed to share
    /// semantics; the caller enforces this at construction).
    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.bits + other.bits, self.semantics)
    }

    /// `self - other`.
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.bits - other.bits, self.semantics)
    }

    /// `self * other`.
    pub fn mul(&self, other: &Self) -> Self {
        Self::new(self.bits * other.bits, self.semantics)
    }

    /// `self / other`.
    pub fn div(&self, other: &Self) -> Self {
        Self::new(self.bits / other.bits, self.semantics)
    }

    /// IEEE-754 remainder.
    pub fn rem(&self, other: &Self) -> Self {
        Self::new(self.bits % other.bits, self.semantics)
    }

    /// `sqrt(self)`.
    pub fn sqrt(&self) -> Self {
        Self::new(libm_sqrt(self.bits), self.semantics)
    }
}

#[cfg(feature = "std")]
fn libm_sqrt(x: f64) -> f64 {
    x.sqrt()
}

#[cfg(not(feature = "std"))]
fn libm_sqrt(x: f64) -> f64 {
    // Newton's method fallback; adequate for constant folding under
    // `no_std` where `f64::sqrt` is unavailable without `libm`.
    if x < 0.0 || x.is_nan() {
        return f64::NAN;
    }
    if x == 0.0 || x.is_infinite() {
        return x;
    }
    let mut guess = x;
    for _ in 0..40 {
        guess = 0.5 * (guess + x / guess);
    }
    guess
}
