//! SIMD / intrinsic lowering (spec component C10).
//!
//! The front-end's IR has no vector types: a packed SSE/NEON-style register
//! is just a wide bit-vector expression. Before execution, every
//! vectorised load, store, shift, saturating-arithmetic and shuffle
//! intrinsic is lowered here into a tree built exclusively from [`Builder`]
//! constructors (`Extract`/`Concat`/`Select` and the scalar arithmetic and
//! comparison kinds), so the lowered form folds and canonicalises exactly
//! like any other expression and never has to consult the solver façade
//! (§4.11). A lane vector is represented the same way the rest of the core
//! represents everything wide: one [`ExprRef`] of the vector's total width,
//! decomposed into per-lane [`ExprRef`]s with `Extract` and reassembled
//! with `Concat`, low lane first (matching the update-list byte order
//! [`crate::memory::object_state`] already uses).

use alloc::vec::Vec;

use crate::{
    error::{
        PanicReason,
        SimpleResult,
    },
    expr::{
        Builder,
        ExprRef,
        FpSemantics,
        Interner,
        Width,
    },
};

/// Which intrinsic a lowering site corresponds to. Carried only for
/// diagnostics; it plays no role in the lowering itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Intrinsic {
    /// Unaligned vector load.
    Loadu,
    /// Unaligned vector store.
    Storeu,
    /// Signed-saturating pack (`packsswb`/`packssdw`).
    PackSignedSaturate,
    /// Unsigned-saturating pack (`packuswb`/`packusdw`).
    PackUnsignedSaturate,
    /// Packed unsigned minimum.
    MinUnsigned,
    /// Packed unsigned maximum.
    MaxUnsigned,
    /// Packed signed minimum.
    MinSigned,
    /// Packed signed maximum.
    MaxSigned,
    /// Packed unsigned-saturating subtract.
    SubUnsignedSaturate,
    /// Packed unsigned-saturating add.
    AddUnsignedSaturate,
    /// Packed signed-saturating add.
    AddSignedSaturate,
    /// Packed signed greater-than compare (`pcmpgt*`).
    CompareGreaterThan,
    /// Packed arithmetic shift right by an immediate (`psrai*`).
    ShiftRightArithmeticImm,
    /// Packed signed multiply, high half (`pmulh*`).
    MulHighSigned,
    /// Sum of absolute differences (`psadbw`).
    SumOfAbsoluteDifferences,
    /// Packed multiply-and-add pairs (`pmaddwd`).
    MultiplyAddPairs,
    /// Whole-vector left byte shift (`pslldq`).
    ShiftLeftBytes,
    /// Whole-vector right byte shift (`psrldq`).
    ShiftRightBytes,
    /// Packed `int32` → `float32` conversion (`cvtdq2ps`).
    ConvertIntToFloat,
    /// Packed `float32` → `int32` conversion (`cvtps2dq`).
    ConvertFloatToInt,
    /// Scalar `double` → signed integer conversion (`cvtsd2si`).
    ConvertScalarFloatToInt,
}

/// Observer notified once per lowered intrinsic site, for diagnostics.
/// Mirrors the pull-based shape of [`crate::diagnostics::DiagnosticsReceiver`]
/// without pulling the `dyn-clone` dependency into a hot code path that runs
/// once per vector instruction.
pub trait LoweringObserver {
    /// Called after `site` has been rewritten into `lanes` scalar IR
    /// operations of `lane_width` bits each.
    fn on_lowered(&mut self, site: Intrinsic, lanes: u32, lane_width: Width);
}

/// An observer that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl LoweringObserver for NullObserver {
    fn on_lowered(&mut self, _site: Intrinsic, _lanes: u32, _lane_width: Width) {}
}

fn notify(obs: &mut impl LoweringObserver, site: Intrinsic, lanes: u32, lane_width: Width) {
    obs.on_lowered(site, lanes, lane_width);
}

/// Splits a vector-width expression into `lanes` lanes of `lane_width` bits
/// each, low lane (least-significant bits) first.
fn split_lanes(i: &mut Interner, vector: ExprRef, lane_width: Width, lanes: u32) -> SimpleResult<Vec<ExprRef>> {
    let total = i.width_of(vector);
    if total != lane_width * lanes {
        return Err(PanicReason::WidthMismatch { expected: lane_width * lanes, got: total });
    }
    let mut out = Vec::with_capacity(lanes as usize);
    for lane in 0..lanes {
        out.push(i.create(Builder::Extract(vector, lane * lane_width, lane_width))?);
    }
    Ok(out)
}

/// Concatenates lanes (low lane first) into one vector-width expression.
fn concat_lanes(i: &mut Interner, lanes: &[ExprRef]) -> SimpleResult<ExprRef> {
    let mut iter = lanes.iter().rev().copied();
    let mut acc = iter.next().expect("at least one lane");
    for lane in iter {
        acc = i.create(Builder::Concat(acc, lane))?;
    }
    Ok(acc)
}

/// Unaligned vector load: reassembles `bytes` (low address first, each
/// width 8) into one vector-width value. Grounded on the little-endian
/// byte order [`crate::memory::object_state::ObjectState::read`] already
/// composes with `Concat`; this is the same composition lifted to whole
/// vector registers so later lane operations see one `ExprRef`.
pub fn loadu(i: &mut Interner, bytes: &[ExprRef], obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    let v = concat_lanes(i, bytes)?;
    notify(obs, Intrinsic::Loadu, bytes.len() as u32, 8);
    Ok(v)
}

/// Unaligned vector store: the inverse of [`loadu`], splitting a
/// vector-width value back into its constituent bytes, low address first.
pub fn storeu(i: &mut Interner, vector: ExprRef, obs: &mut impl LoweringObserver) -> SimpleResult<Vec<ExprRef>> {
    let total = i.width_of(vector);
    if total % 8 != 0 {
        return Err(PanicReason::UnsupportedWidth(total));
    }
    let bytes = split_lanes(i, vector, 8, total / 8)?;
    notify(obs, Intrinsic::Storeu, bytes.len() as u32, 8);
    Ok(bytes)
}

/// Applies a per-lane binary closure to two equal-shaped vectors and
/// reassembles the result, notifying `obs` once for the whole site.
fn lower_binary_lanewise(
    i: &mut Interner,
    a: ExprRef,
    b: ExprRef,
    lane_width: Width,
    site: Intrinsic,
    obs: &mut impl LoweringObserver,
    mut op: impl FnMut(&mut Interner, ExprRef, ExprRef) -> SimpleResult<ExprRef>,
) -> SimpleResult<ExprRef> {
    let total = i.width_of(a);
    if i.width_of(b) != total {
        return Err(PanicReason::WidthMismatch { expected: total, got: i.width_of(b) });
    }
    if total % lane_width != 0 {
        return Err(PanicReason::UnsupportedWidth(total));
    }
    let lanes = total / lane_width;
    let la = split_lanes(i, a, lane_width, lanes)?;
    let lb = split_lanes(i, b, lane_width, lanes)?;
    let mut out = Vec::with_capacity(lanes as usize);
    for (x, y) in la.into_iter().zip(lb) {
        out.push(op(i, x, y)?);
    }
    notify(obs, site, lanes, lane_width);
    concat_lanes(i, &out)
}

fn lane_unsigned_max(i: &mut Interner, width: Width) -> ExprRef {
    i.const_u128(u128::MAX >> (128 - width), width)
}

fn lane_signed_max(i: &mut Interner, width: Width) -> ExprRef {
    i.const_u128((1u128 << (width - 1)) - 1, width)
}

fn lane_signed_min(i: &mut Interner, width: Width) -> ExprRef {
    // two's complement minimum: `1` followed by `width-1` zero bits.
    i.const_u128(1u128 << (width - 1), width)
}

/// Clamps `value` (already computed at `wide_width = 2 * narrow_width`) to
/// the representable signed range of `narrow_width` bits, then truncates.
/// Used by [`pack_signed_saturate`] and the saturating-arithmetic lowerings.
fn clamp_signed(i: &mut Interner, value: ExprRef, narrow_width: Width) -> SimpleResult<ExprRef> {
    let wide_width = i.width_of(value);
    let max = i.const_u128(lane_signed_max_u128(narrow_width), wide_width);
    let min = sign_extend_const(i, lane_signed_min_u128(narrow_width), narrow_width, wide_width);
    let too_high = i.create(Builder::Slt(max, value))?;
    let too_low = i.create(Builder::Slt(value, min))?;
    let clamped_high = i.create(Builder::Select(too_high, max, value))?;
    let clamped = i.create(Builder::Select(too_low, min, clamped_high))?;
    i.create(Builder::Extract(clamped, 0, narrow_width))
}

/// Clamps `value` to the representable unsigned range of `narrow_width`
/// bits (i.e. `value > 2^narrow_width - 1 ? max : value`), then truncates.
fn clamp_unsigned(i: &mut Interner, value: ExprRef, narrow_width: Width) -> SimpleResult<ExprRef> {
    let wide_width = i.width_of(value);
    let max = i.const_u128((1u128 << narrow_width) - 1, wide_width);
    let too_high = i.create(Builder::Ult(max, value))?;
    let clamped = i.create(Builder::Select(too_high, max, value))?;
    i.create(Builder::Extract(clamped, 0, narrow_width))
}

fn lane_signed_max_u128(width: Width) -> u128 {
    (1u128 << (width - 1)) - 1
}

fn lane_signed_min_u128(width: Width) -> u128 {
    1u128 << (width - 1)
}

fn sign_extend_const(i: &mut Interner, value: u128, from_width: Width, to_width: Width) -> ExprRef {
    let narrow = i.const_u128(value, from_width);
    // `SExt` only ever widens a non-constant-folded expression away from a
    // constant when `from_width == to_width`; guard the common case where
    // no extension is needed.
    if from_width == to_width {
        return narrow;
    }
    // build via the public constructor so the extension participates in
    // the same constant-folding path every other signed constant does.
    i.create(Builder::SExt(narrow, to_width)).expect("constant sign-extension never fails")
}

/// `packsswb`/`packssdw`-style lowering: every `src_width`-bit lane of
/// `a` then `b` (in that order, `a`'s lanes first) is signed-saturated
/// down to `src_width / 2` bits.
pub fn pack_signed_saturate(
    i: &mut Interner,
    a: ExprRef,
    b: ExprRef,
    src_width: Width,
    obs: &mut impl LoweringObserver,
) -> SimpleResult<ExprRef> {
    let dst_width = src_width / 2;
    let total = i.width_of(a);
    if i.width_of(b) != total || total % src_width != 0 {
        return Err(PanicReason::WidthMismatch { expected: total, got: i.width_of(b) });
    }
    let lanes_per_operand = total / src_width;
    let mut out = Vec::with_capacity(lanes_per_operand as usize * 2);
    for vector in [a, b] {
        for lane in split_lanes(i, vector, src_width, lanes_per_operand)? {
            out.push(clamp_signed(i, lane, dst_width)?);
        }
    }
    notify(obs, Intrinsic::PackSignedSaturate, out.len() as u32, dst_width);
    concat_lanes(i, &out)
}

/// `packuswb`/`packusdw`-style lowering: signed source lanes of `a` then
/// `b` are clamped into the unsigned range of half their width.
pub fn pack_unsigned_saturate(
    i: &mut Interner,
    a: ExprRef,
    b: ExprRef,
    src_width: Width,
    obs: &mut impl LoweringObserver,
) -> SimpleResult<ExprRef> {
    let dst_width = src_width / 2;
    let total = i.width_of(a);
    if i.width_of(b) != total || total % src_width != 0 {
        return Err(PanicReason::WidthMismatch { expected: total, got: i.width_of(b) });
    }
    let lanes_per_operand = total / src_width;
    let mut out = Vec::with_capacity(lanes_per_operand as usize * 2);
    for vector in [a, b] {
        for lane in split_lanes(i, vector, src_width, lanes_per_operand)? {
            // negative sources saturate to zero before the unsigned clamp.
            let zero = i.const_u128(0, src_width);
            let is_negative = i.create(Builder::Slt(lane, zero))?;
            let non_negative = i.create(Builder::Select(is_negative, zero, lane))?;
            out.push(clamp_unsigned(i, non_negative, dst_width)?);
        }
    }
    notify(obs, Intrinsic::PackUnsignedSaturate, out.len() as u32, dst_width);
    concat_lanes(i, &out)
}

/// Packed unsigned minimum (`pminub`/`pminuw`/...).
pub fn min_unsigned(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::MinUnsigned, obs, |i, x, y| {
        let c = i.create(Builder::Ule(x, y))?;
        i.create(Builder::Select(c, x, y))
    })
}

/// Packed unsigned maximum (`pmaxub`/`pmaxuw`/...).
pub fn max_unsigned(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::MaxUnsigned, obs, |i, x, y| {
        let c = i.create(Builder::Uge(x, y))?;
        i.create(Builder::Select(c, x, y))
    })
}

/// Packed signed minimum (`pminsb`/`pminsw`/...).
pub fn min_signed(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::MinSigned, obs, |i, x, y| {
        let c = i.create(Builder::Sle(x, y))?;
        i.create(Builder::Select(c, x, y))
    })
}

/// Packed signed maximum (`pmaxsb`/`pmaxsw`/...).
pub fn max_signed(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::MaxSigned, obs, |i, x, y| {
        let c = i.create(Builder::Sge(x, y))?;
        i.create(Builder::Select(c, x, y))
    })
}

/// Packed unsigned-saturating subtract (`psubusb`/`psubusw`): clamps at
/// zero rather than wrapping.
pub fn sub_unsigned_saturate(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::SubUnsignedSaturate, obs, |i, x, y| {
        let underflows = i.create(Builder::Ult(x, y))?;
        let zero = i.const_u128(0, lane_width);
        let diff = i.create(Builder::Sub(x, y))?;
        i.create(Builder::Select(underflows, zero, diff))
    })
}

/// Packed unsigned-saturating add (`paddusb`/`paddusw`).
pub fn add_unsigned_saturate(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::AddUnsignedSaturate, obs, |i, x, y| {
        let sum = i.create(Builder::Add(x, y))?;
        // unsigned addition overflowed iff the wrapped sum is smaller than
        // either operand.
        let overflowed = i.create(Builder::Ult(sum, x))?;
        let max = lane_unsigned_max(i, lane_width);
        i.create(Builder::Select(overflowed, max, sum))
    })
}

/// Packed signed-saturating add (`paddsb`/`paddsw`).
pub fn add_signed_saturate(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::AddSignedSaturate, obs, |i, x, y| {
        let sum = i.create(Builder::Add(x, y))?;
        // signed overflow iff both operands share a sign that differs from
        // the result's sign.
        let zero = i.const_u128(0, lane_width);
        let x_neg = i.create(Builder::Slt(x, zero))?;
        let y_neg = i.create(Builder::Slt(y, zero))?;
        let sum_neg = i.create(Builder::Slt(sum, zero))?;
        let same_sign = i.create(Builder::Eq(x_neg, y_neg))?;
        let sign_flip = i.create(Builder::Ne(x_neg, sum_neg))?;
        let overflowed = i.create(Builder::And(same_sign, sign_flip))?;
        let max = lane_signed_max(i, lane_width);
        let min = lane_signed_min(i, lane_width);
        let saturated = i.create(Builder::Select(x_neg, min, max))?;
        i.create(Builder::Select(overflowed, saturated, sum))
    })
}

/// Packed signed greater-than compare (`pcmpgtb`/`pcmpgtw`/...): each lane
/// of the result is all-ones when `a`'s lane is strictly greater, all-zero
/// otherwise.
pub fn compare_greater_than(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::CompareGreaterThan, obs, |i, x, y| {
        let c = i.create(Builder::Sgt(x, y))?;
        let ones = i.const_u128(u128::MAX >> (128 - lane_width), lane_width);
        let zero = i.const_u128(0, lane_width);
        i.create(Builder::Select(c, ones, zero))
    })
}

/// Packed arithmetic shift right by an immediate (`psraiw`/`psraid`).
pub fn shift_right_arithmetic_imm(
    i: &mut Interner,
    vector: ExprRef,
    lane_width: Width,
    shift_amount: u32,
    obs: &mut impl LoweringObserver,
) -> SimpleResult<ExprRef> {
    let total = i.width_of(vector);
    if total % lane_width != 0 {
        return Err(PanicReason::UnsupportedWidth(total));
    }
    let lanes = total / lane_width;
    let lane_exprs = split_lanes(i, vector, lane_width, lanes)?;
    let amount = i.const_u128(shift_amount.min(lane_width - 1) as u128, lane_width);
    let mut out = Vec::with_capacity(lanes as usize);
    for lane in lane_exprs {
        out.push(i.create(Builder::AShr(lane, amount))?);
    }
    notify(obs, Intrinsic::ShiftRightArithmeticImm, lanes, lane_width);
    concat_lanes(i, &out)
}

/// Packed signed multiply, high half (`pmulhw`): each lane pair is
/// sign-extended to double width, multiplied, and the top half kept.
pub fn mul_high_signed(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    lower_binary_lanewise(i, a, b, lane_width, Intrinsic::MulHighSigned, obs, |i, x, y| {
        let wide_width = lane_width * 2;
        let wx = i.create(Builder::SExt(x, wide_width))?;
        let wy = i.create(Builder::SExt(y, wide_width))?;
        let product = i.create(Builder::Mul(wx, wy))?;
        i.create(Builder::Extract(product, lane_width, lane_width))
    })
}

/// Sum of absolute differences (`psadbw`): groups of 8 byte lanes are
/// absolute-differenced then summed into one 16-bit accumulator per group.
pub fn sum_of_absolute_differences(i: &mut Interner, a: ExprRef, b: ExprRef, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    const GROUP: u32 = 8;
    const LANE_WIDTH: Width = 8;
    const ACC_WIDTH: Width = 16;
    let total = i.width_of(a);
    if i.width_of(b) != total || total % (LANE_WIDTH * GROUP) != 0 {
        return Err(PanicReason::WidthMismatch { expected: total, got: i.width_of(b) });
    }
    let groups = total / (LANE_WIDTH * GROUP);
    let la = split_lanes(i, a, LANE_WIDTH, groups * GROUP)?;
    let lb = split_lanes(i, b, LANE_WIDTH, groups * GROUP)?;
    let mut accumulators = Vec::with_capacity(groups as usize);
    for g in 0..groups as usize {
        let mut acc = i.const_u128(0, ACC_WIDTH);
        for k in 0..GROUP as usize {
            let x = i.create(Builder::ZExt(la[g * GROUP as usize + k], ACC_WIDTH))?;
            let y = i.create(Builder::ZExt(lb[g * GROUP as usize + k], ACC_WIDTH))?;
            let ge = i.create(Builder::Uge(x, y))?;
            let fwd = i.create(Builder::Sub(x, y))?;
            let bwd = i.create(Builder::Sub(y, x))?;
            let abs_diff = i.create(Builder::Select(ge, fwd, bwd))?;
            acc = i.create(Builder::Add(acc, abs_diff))?;
        }
        accumulators.push(acc);
    }
    notify(obs, Intrinsic::SumOfAbsoluteDifferences, groups, ACC_WIDTH);
    concat_lanes(i, &accumulators)
}

/// Packed multiply-and-add pairs (`pmaddwd`): adjacent signed `lane_width`
/// lanes of `a` and `b` are multiplied pairwise into `2*lane_width`-bit
/// products, then the pair is summed into one output lane.
pub fn multiply_add_pairs(i: &mut Interner, a: ExprRef, b: ExprRef, lane_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    let total = i.width_of(a);
    if i.width_of(b) != total || total % (lane_width * 2) != 0 {
        return Err(PanicReason::WidthMismatch { expected: total, got: i.width_of(b) });
    }
    let pairs = total / (lane_width * 2);
    let la = split_lanes(i, a, lane_width, pairs * 2)?;
    let lb = split_lanes(i, b, lane_width, pairs * 2)?;
    let wide_width = lane_width * 2;
    let mut out = Vec::with_capacity(pairs as usize);
    for p in 0..pairs as usize {
        let mut sum = i.const_u128(0, wide_width);
        for k in 0..2 {
            let x = i.create(Builder::SExt(la[p * 2 + k], wide_width))?;
            let y = i.create(Builder::SExt(lb[p * 2 + k], wide_width))?;
            let product = i.create(Builder::Mul(x, y))?;
            sum = i.create(Builder::Add(sum, product))?;
        }
        out.push(sum);
    }
    notify(obs, Intrinsic::MultiplyAddPairs, pairs, wide_width);
    concat_lanes(i, &out)
}

/// Whole-vector byte shift left (`pslldq`): shifts the entire vector left
/// by `bytes * 8` bits, zero-filling from the low end.
pub fn shift_left_bytes(i: &mut Interner, vector: ExprRef, bytes: u32, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    let total = i.width_of(vector);
    let amount = i.const_u128((bytes as u128) * 8, total);
    let shifted = i.create(Builder::Shl(vector, amount))?;
    notify(obs, Intrinsic::ShiftLeftBytes, 1, total);
    Ok(shifted)
}

/// Whole-vector byte shift right (`psrldq`): shifts the entire vector
/// right by `bytes * 8` bits, zero-filling from the high end (logical,
/// not arithmetic — matches the hardware intrinsic's treatment of the
/// vector as an unsigned blob of bytes, not a signed scalar).
pub fn shift_right_bytes(i: &mut Interner, vector: ExprRef, bytes: u32, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    let total = i.width_of(vector);
    let amount = i.const_u128((bytes as u128) * 8, total);
    let shifted = i.create(Builder::LShr(vector, amount))?;
    notify(obs, Intrinsic::ShiftRightBytes, 1, total);
    Ok(shifted)
}

/// Packed `int32` → `float32` conversion (`cvtdq2ps`).
pub fn convert_int_to_float(i: &mut Interner, vector: ExprRef, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    const LANE_WIDTH: Width = 32;
    let total = i.width_of(vector);
    if total % LANE_WIDTH != 0 {
        return Err(PanicReason::UnsupportedWidth(total));
    }
    let lanes = total / LANE_WIDTH;
    let ints = split_lanes(i, vector, LANE_WIDTH, lanes)?;
    let mut out = Vec::with_capacity(lanes as usize);
    for lane in ints {
        let f = i.create(Builder::SIntToFp(lane, FpSemantics::Single))?;
        out.push(i.create(Builder::Extract(f, 0, LANE_WIDTH))?);
    }
    notify(obs, Intrinsic::ConvertIntToFloat, lanes, LANE_WIDTH);
    concat_lanes(i, &out)
}

/// Packed `float32` → `int32` conversion (`cvtps2dq`). The back-end's
/// rounding mode is whatever [`crate::expr::Builder::FpToSInt`] implements;
/// this lowering does not itself choose a rounding mode.
pub fn convert_float_to_int(i: &mut Interner, vector: ExprRef, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    const LANE_WIDTH: Width = 32;
    let total = i.width_of(vector);
    if total % LANE_WIDTH != 0 {
        return Err(PanicReason::UnsupportedWidth(total));
    }
    let lanes = total / LANE_WIDTH;
    let floats = split_lanes(i, vector, LANE_WIDTH, lanes)?;
    let mut out = Vec::with_capacity(lanes as usize);
    for lane in floats {
        out.push(i.create(Builder::FpToSInt(lane, LANE_WIDTH))?);
    }
    notify(obs, Intrinsic::ConvertFloatToInt, lanes, LANE_WIDTH);
    concat_lanes(i, &out)
}

/// Scalar `double` → signed integer conversion (`cvtsd2si`): only the low
/// 64 bits of `vector` (lane 0 of a packed-double register) participate.
pub fn convert_scalar_float_to_int(i: &mut Interner, vector: ExprRef, result_width: Width, obs: &mut impl LoweringObserver) -> SimpleResult<ExprRef> {
    let low = i.create(Builder::Extract(vector, 0, 64))?;
    let result = i.create(Builder::FpToSInt(low, result_width))?;
    notify(obs, Intrinsic::ConvertScalarFloatToInt, 1, result_width);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: u32,
        last_lanes: u32,
    }

    impl LoweringObserver for Counter {
        fn on_lowered(&mut self, _site: Intrinsic, lanes: u32, _lane_width: Width) {
            self.calls += 1;
            self.last_lanes = lanes;
        }
    }

    #[test]
    fn loadu_storeu_round_trip() {
        let mut i = Interner::new();
        let bytes: Vec<ExprRef> = (0..4u128).map(|b| i.const_u128(b, 8)).collect();
        let mut obs = Counter::default();
        let vector = loadu(&mut i, &bytes, &mut obs).unwrap();
        assert_eq!(i.width_of(vector), 32);
        let back = storeu(&mut i, vector, &mut obs).unwrap();
        assert_eq!(back, bytes);
        assert_eq!(obs.calls, 2);
    }

    #[test]
    fn min_max_unsigned_are_concrete_on_constants() {
        let mut i = Interner::new();
        let a = i.const_u128(0x01_02, 16);
        let b = i.const_u128(0x03_04, 16);
        // two 8-bit lanes: a = [0x02, 0x01], b = [0x04, 0x03] (low first)
        let mut obs = NullObserver;
        let min = min_unsigned(&mut i, a, b, 8, &mut obs).unwrap();
        let max = max_unsigned(&mut i, a, b, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(min).unwrap().to_u128(), 0x01_02);
        assert_eq!(i.int_constant(max).unwrap().to_u128(), 0x03_04);
    }

    #[test]
    fn add_unsigned_saturate_clamps_at_max() {
        let mut i = Interner::new();
        let a = i.const_u128(0xFF, 8);
        let b = i.const_u128(0x02, 8);
        let mut obs = NullObserver;
        let sum = add_unsigned_saturate(&mut i, a, b, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(sum).unwrap().to_u128(), 0xFF);
    }

    #[test]
    fn add_signed_saturate_clamps_at_min_and_max() {
        let mut i = Interner::new();
        let min_i8 = i.const_u128(0x80, 8); // -128
        let neg_one = i.const_u128(0xFF, 8); // -1
        let mut obs = NullObserver;
        let result = add_signed_saturate(&mut i, min_i8, neg_one, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(result).unwrap().to_u128(), 0x80); // saturates at -128

        let max_i8 = i.const_u128(0x7F, 8); // 127
        let one = i.const_u128(0x01, 8);
        let result = add_signed_saturate(&mut i, max_i8, one, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(result).unwrap().to_u128(), 0x7F);
    }

    #[test]
    fn sub_unsigned_saturate_clamps_at_zero() {
        let mut i = Interner::new();
        let a = i.const_u128(0x01, 8);
        let b = i.const_u128(0x02, 8);
        let mut obs = NullObserver;
        let diff = sub_unsigned_saturate(&mut i, a, b, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(diff).unwrap().to_u128(), 0);
    }

    #[test]
    fn pack_signed_saturate_clamps_out_of_range_16_bit_lanes() {
        let mut i = Interner::new();
        // one 16-bit lane each, values outside an i8's range.
        let a = i.const_u128(300u128 & 0xFFFF, 16);
        let b = i.const_u128((-300i32 as u32 as u128) & 0xFFFF, 16);
        let mut obs = NullObserver;
        let packed = pack_signed_saturate(&mut i, a, b, 16, &mut obs).unwrap();
        assert_eq!(i.width_of(packed), 16);
        let lanes = split_lanes(&mut i, packed, 8, 2).unwrap();
        assert_eq!(i.int_constant(lanes[0]).unwrap().to_u128(), 0x7F);
        assert_eq!(i.int_constant(lanes[1]).unwrap().to_u128(), 0x80);
    }

    #[test]
    fn compare_greater_than_produces_all_ones_or_zero() {
        let mut i = Interner::new();
        let a = i.const_u128(5, 8);
        let b = i.const_u128(2, 8);
        let mut obs = NullObserver;
        let mask = compare_greater_than(&mut i, a, b, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(mask).unwrap().to_u128(), 0xFF);
        let mask2 = compare_greater_than(&mut i, b, a, 8, &mut obs).unwrap();
        assert_eq!(i.int_constant(mask2).unwrap().to_u128(), 0x00);
    }

    #[test]
    fn shift_right_arithmetic_preserves_sign() {
        let mut i = Interner::new();
        let negative_one = i.const_u128(0xFFFF, 16);
        let mut obs = NullObserver;
        let shifted = shift_right_arithmetic_imm(&mut i, negative_one, 16, 4, &mut obs).unwrap();
        assert_eq!(i.int_constant(shifted).unwrap().to_u128(), 0xFFFF);
    }

    #[test]
    fn mul_high_signed_extracts_top_half() {
        let mut i = Interner::new();
        // 0x4000 * 0x4000 (both interpreted as i16) = 0x10000000, top 16
        // bits are 0x1000.
        let a = i.const_u128(0x4000, 16);
        let b = i.const_u128(0x4000, 16);
        let mut obs = NullObserver;
        let hi = mul_high_signed(&mut i, a, b, 16, &mut obs).unwrap();
        assert_eq!(i.int_constant(hi).unwrap().to_u128(), 0x1000);
    }

    #[test]
    fn sum_of_absolute_differences_sums_one_group() {
        let mut i = Interner::new();
        let a_bytes: Vec<ExprRef> = [10u128, 20, 30, 40, 50, 60, 70, 80].into_iter().map(|v| i.const_u128(v, 8)).collect();
        let b_bytes: Vec<ExprRef> = [0u128; 8].into_iter().map(|v| i.const_u128(v, 8)).collect();
        let a = concat_lanes(&mut i, &a_bytes).unwrap();
        let b = concat_lanes(&mut i, &b_bytes).unwrap();
        let mut obs = Counter::default();
        let sad = sum_of_absolute_differences(&mut i, a, b, &mut obs).unwrap();
        assert_eq!(i.width_of(sad), 16);
        assert_eq!(i.int_constant(sad).unwrap().to_u128(), 10 + 20 + 30 + 40 + 50 + 60 + 70 + 80);
        assert_eq!(obs.last_lanes, 1);
    }

    #[test]
    fn multiply_add_pairs_sums_adjacent_products() {
        let mut i = Interner::new();
        let a_lanes: Vec<ExprRef> = [2u128, 3].into_iter().map(|v| i.const_u128(v, 16)).collect();
        let b_lanes: Vec<ExprRef> = [5u128, 7].into_iter().map(|v| i.const_u128(v, 16)).collect();
        let a = concat_lanes(&mut i, &a_lanes).unwrap();
        let b = concat_lanes(&mut i, &b_lanes).unwrap();
        let mut obs = NullObserver;
        let result = multiply_add_pairs(&mut i, a, b, 16, &mut obs).unwrap();
        assert_eq!(i.width_of(result), 32);
        assert_eq!(i.int_constant(result).unwrap().to_u128(), 2 * 5 + 3 * 7);
    }

    #[test]
    fn byte_shifts_move_whole_lanes() {
        let mut i = Interner::new();
        let lanes: Vec<ExprRef> = [0x11u128, 0x22, 0x33, 0x44].into_iter().map(|v| i.const_u128(v, 8)).collect();
        let vector = concat_lanes(&mut i, &lanes).unwrap();
        let mut obs = NullObserver;
        let shifted = shift_left_bytes(&mut i, vector, 1, &mut obs).unwrap();
        let out = split_lanes(&mut i, shifted, 8, 4).unwrap();
        assert_eq!(i.int_constant(out[0]).unwrap().to_u128(), 0x00);
        assert_eq!(i.int_constant(out[1]).unwrap().to_u128(), 0x11);
        assert_eq!(i.int_constant(out[3]).unwrap().to_u128(), 0x33);
    }

    #[test]
    fn convert_int_to_float_is_lanewise() {
        let mut i = Interner::new();
        let lanes: Vec<ExprRef> = [1u128, 2].into_iter().map(|v| i.const_u128(v, 32)).collect();
        let vector = concat_lanes(&mut i, &lanes).unwrap();
        let mut obs = Counter::default();
        let floats = convert_int_to_float(&mut i, vector, &mut obs).unwrap();
        assert_eq!(i.width_of(floats), 64);
        assert_eq!(obs.last_lanes, 2);
    }

    #[test]
    fn lowering_never_touches_symbolic_inputs_without_select() {
        // symbolic operands must still produce a valid (non-folded) tree
        // rather than panicking or requiring constant operands.
        let mut i = Interner::new();
        let x = i.create(Builder::NotOptimized(i.const_u128(0, 8))).unwrap();
        let y = i.const_u128(3, 8);
        let mut obs = NullObserver;
        let result = add_unsigned_saturate(&mut i, x, y, 8, &mut obs).unwrap();
        assert_eq!(i.width_of(result), 8);
    }
}
