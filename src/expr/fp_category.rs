//! Conservative floating-point category tracking (spec §3.1, §4.1).
//!
//! Every floating-point expression carries a bitset over-approximating its
//! runtime shape, propagated through a transfer function per Kahan's rules
//! for the arithmetic operators. Consumers (notably [`crate::fp_rewrite`])
//! use the bitset to skip NaN-only cases rather than reason about exact
//! values.

use bitflags::bitflags;

bitflags! {
    /// Conservative over-approximation of a floating-point value's shape.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FpCategory: u8 {
        /// May be exactly zero (either sign).
        const ZERO = 0b0000_0001;
        /// May be a positive, finite, non-zero normal/subnormal value.
        const POSITIVE = 0b0000_0010;
        /// May be a negative, finite, non-zero normal/subnormal value.
        const NEGATIVE = 0b0000_0100;
        /// May be positive infinity.
        const POS_INF = 0b0000_1000;
        /// May be negative infinity.
        const NEG_INF = 0b0001_0000;
        /// May be NaN.
        const NAN = 0b0010_0000;
    }
}

impl FpCategory {
    /// The full, maximally conservative bitset: "could be anything".
    pub fn unknown() -> Self {
        Self::all()
    }

    /// Category of a constant known to be exactly this classification.
    pub fn exact_zero() -> Self {
        Self::ZERO
    }

    /// Whether this category excludes NaN entirely (useful to skip the FP
    /// rewriter's NaN-handling branch).
    pub fn excludes_nan(self) -> bool {
        !self.contains(Self::NAN)
    }

    /// Transfer function for `FAdd(self, other)`: Kahan's rules — `+inf` and
    /// `-inf` combine to `NaN`; any other pairing unions the non-infinite
    /// possibilities and carries through whichever infinities survive.
    pub fn transfer_add(self, other: Self) -> Self {
        let mut out = FpCategory::empty();
        if self.intersects(Self::ZERO | Self::POSITIVE | Self::NEGATIVE)
            && other.intersects(Self::ZERO | Self::POSITIVE | Self::NEGATIVE)
        {
            out |= Self::ZERO | Self::POSITIVE | Self::NEGATIVE;
        }
        if self.contains(Self::POS_INF) || other.contains(Self::POS_INF) {
            out |= Self::POS_INF;
        }
        if self.contains(Self::NEG_INF) || other.contains(Self::NEG_INF) {
            out |= Self::NEG_INF;
        }
        if (self.contains(Self::POS_INF) && other.contains(Self::NEG_INF))
            || (self.contains(Self::NEG_INF) && other.contains(Self::POS_INF))
            || self.contains(Self::NAN)
            || other.contains(Self::NAN)
        {
            out |= Self::NAN;
        }
        if out.is_empty() {
            out = Self::unknown();
        }
        out
    }

    /// Transfer function for `FMul(self, other)`: `0 * inf = NaN`.
    pub fn transfer_mul(self, other: Self) -> Self {
        let mut out = FpCategory::empty();
        let finite_a = self.intersects(Self::ZERO | Self::POSITIVE | Self::NEGATIVE);
        let finite_b = other.intersects(Self::ZERO | Self::POSITIVE | Self::NEGATIVE);
        let inf_a = self.intersects(Self::POS_INF | Self::NEG_INF);
        let inf_b = other.intersects(Self::POS_INF | Self::NEG_INF);
        if finite_a && finite_b {
            out |= Self::ZERO | Self::POSITIVE | Self::NEGATIVE;
        }
        if inf_a || inf_b {
            out |= Self::POS_INF | Self::NEG_INF;
        }
        if (self.contains(Self::ZERO) && inf_b) || (other.contains(Self::ZERO) && inf_a) {
            out |= Self::NAN;
        }
        if self.contains(Self::NAN) || other.contains(Self::NAN) {
            out |= Self::NAN;
        }
        if out.is_empty() {
            out = Self::unknown();
        }
        out
    }

    /// Transfer function for `FDiv(self, other)`: `inf/inf` and `0/0` are
    /// `NaN`.
    pub fn transfer_div(self, other: Self) -> Self {
        let mut out = FpCategory::empty();
        let finite_a = self.intersects(Self::ZERO | Self::POSITIVE | Self::NEGATIVE);
        let inf_a = self.intersects(Self::POS_INF | Self::NEG_INF);
        let zero_b = other.contains(Self::ZERO);
        let finite_nonzero_b = other.intersects(Self::POSITIVE | Self::NEGATIVE);
        let inf_b = other.intersects(Self::POS_INF | Self::NEG_INF);
        if finite_a && finite_nonzero_b {
            out |= Self::ZERO | Self::POSITIVE | Self::NEGATIVE;
        }
        if inf_a && finite_nonzero_b {
            out |= Self::POS_INF | Self::NEG_INF;
        }
        if finite_a && inf_b {
            out |= Self::ZERO;
        }
        if (zero_b && self.contains(Self::ZERO)) || (inf_a && inf_b) {
            out |= Self::NAN;
        }
        if self.contains(Self::NAN) || other.contains(Self::NAN) {
            out |= Self::NAN;
        }
        if out.is_empty() {
            out = Self::unknown();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_inf_plus_neg_inf_is_nan() {
        let cat = FpCategory::POS_INF.transfer_add(FpCategory::NEG_INF);
        assert!(cat.contains(FpCategory::NAN));
    }

    #[test]
    fn zero_times_inf_is_nan() {
        let cat = FpCategory::ZERO.transfer_mul(FpCategory::POS_INF);
        assert!(cat.contains(FpCategory::NAN));
    }

    #[test]
    fn finite_arithmetic_excludes_nan() {
        let cat = FpCategory::POSITIVE.transfer_add(FpCategory::NEGATIVE);
        assert!(cat.excludes_nan());
    }
}
