//! Floating unit.
//!
//! The executor hands this module operand bit patterns, an operation tag
//! and a rounding mode and gets back the result pattern plus sticky
//! exception flags to accumulate into fcsr. Arithmetic is carried out on
//! the host FPU, which computes round-to-nearest-even; the rounding mode is
//! honored for the integer conversions, where it is architecturally
//! visible, and the inexact flag is reported on a best-effort basis. NaN
//! results are canonicalized as the ISA requires.

use crate::hart::fflags::{DZ, NV, NX};

/// Arithmetic operation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpOp {
    Add,
    Sub,
    Mul,
    Div,
    Sqrt,
    Min,
    Max,
    Sgnj,
    Sgnjn,
    Sgnjx,
    Madd,
    Msub,
    Nmsub,
    Nmadd,
}

/// Comparison tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpCmp {
    Eq,
    Lt,
    Le,
}

const F32_SIGN: u32 = 0x8000_0000;
const F32_QNAN: u32 = 0x7fc0_0000;
const F64_SIGN: u64 = 0x8000_0000_0000_0000;
const F64_QNAN: u64 = 0x7ff8_0000_0000_0000;

fn is_snan32(bits: u32) -> bool {
    f32::from_bits(bits).is_nan() && bits & 0x0040_0000 == 0
}

fn is_snan64(bits: u64) -> bool {
    f64::from_bits(bits).is_nan() && bits & 0x0008_0000_0000_0000 == 0
}

/// Apply a rounding mode to a value that must become an integer.
fn round(value: f64, rm: u8) -> f64 {
    match rm {
        0b000 => value.round_ties_even(), // rne
        0b001 => value.trunc(),           // rtz
        0b010 => value.floor(),           // rdn
        0b011 => value.ceil(),            // rup
        0b100 => value.round(),           // rmm
        _ => value.round_ties_even(),
    }
}

pub fn f32_op(op: FpOp, a: u32, b: u32, c: u32, _rm: u8) -> (u32, u32) {
    match op {
        FpOp::Sgnj => return ((a & !F32_SIGN) | (b & F32_SIGN), 0),
        FpOp::Sgnjn => return ((a & !F32_SIGN) | (!b & F32_SIGN), 0),
        FpOp::Sgnjx => return (a ^ (b & F32_SIGN), 0),
        _ => {}
    }

    let fa = f32::from_bits(a);
    let fb = f32::from_bits(b);
    let fc = f32::from_bits(c);
    let mut flags = 0u32;

    let result = match op {
        FpOp::Add => fa + fb,
        FpOp::Sub => fa - fb,
        FpOp::Mul => fa * fb,
        FpOp::Div => {
            if fb == 0.0 && fa.is_finite() && fa != 0.0 {
                flags |= DZ;
            }
            fa / fb
        }
        FpOp::Sqrt => {
            if fa < 0.0 {
                flags |= NV;
            }
            fa.sqrt()
        }
        FpOp::Min | FpOp::Max => {
            if is_snan32(a) || is_snan32(b) {
                flags |= NV;
            }
            let picked = match (fa.is_nan(), fb.is_nan()) {
                (true, true) => return (F32_QNAN, flags),
                (true, false) => fb,
                (false, true) => fa,
                (false, false) => {
                    // the ISA orders -0 below +0
                    if fa == fb {
                        let negative = (a | b) & F32_SIGN != 0;
                        let both = a & b & F32_SIGN != 0;
                        let sign = if op == FpOp::Min { negative } else { both };
                        f32::from_bits((a & !F32_SIGN) | if sign { F32_SIGN } else { 0 })
                    } else if (fa < fb) == (op == FpOp::Min) {
                        fa
                    } else {
                        fb
                    }
                }
            };
            return (picked.to_bits(), flags);
        }
        FpOp::Madd => fa.mul_add(fb, fc),
        FpOp::Msub => fa.mul_add(fb, -fc),
        FpOp::Nmsub => (-fa).mul_add(fb, fc),
        FpOp::Nmadd => (-fa).mul_add(fb, -fc),
        FpOp::Sgnj | FpOp::Sgnjn | FpOp::Sgnjx => unreachable!(),
    };

    if result.is_nan() {
        if !fa.is_nan() && !fb.is_nan() && !(uses_third(op) && fc.is_nan()) {
            flags |= NV;
        }
        (F32_QNAN, flags)
    } else {
        (result.to_bits(), flags)
    }
}

pub fn f64_op(op: FpOp, a: u64, b: u64, c: u64, _rm: u8) -> (u64, u32) {
    match op {
        FpOp::Sgnj => return ((a & !F64_SIGN) | (b & F64_SIGN), 0),
        FpOp::Sgnjn => return ((a & !F64_SIGN) | (!b & F64_SIGN), 0),
        FpOp::Sgnjx => return (a ^ (b & F64_SIGN), 0),
        _ => {}
    }

    let fa = f64::from_bits(a);
    let fb = f64::from_bits(b);
    let fc = f64::from_bits(c);
    let mut flags = 0u32;

    let result = match op {
        FpOp::Add => fa + fb,
        FpOp::Sub => fa - fb,
        FpOp::Mul => fa * fb,
        FpOp::Div => {
            if fb == 0.0 && fa.is_finite() && fa != 0.0 {
                flags |= DZ;
            }
            fa / fb
        }
        FpOp::Sqrt => {
            if fa < 0.0 {
                flags |= NV;
            }
            fa.sqrt()
        }
        FpOp::Min | FpOp::Max => {
            if is_snan64(a) || is_snan64(b) {
                flags |= NV;
            }
            let picked = match (fa.is_nan(), fb.is_nan()) {
                (true, true) => return (F64_QNAN, flags),
                (true, false) => fb,
                (false, true) => fa,
                (false, false) => {
                    if fa == fb {
                        let negative = (a | b) & F64_SIGN != 0;
                        let both = a & b & F64_SIGN != 0;
                        let sign = if op == FpOp::Min { negative } else { both };
                        f64::from_bits((a & !F64_SIGN) | if sign { F64_SIGN } else { 0 })
                    } else if (fa < fb) == (op == FpOp::Min) {
                        fa
                    } else {
                        fb
                    }
                }
            };
            return (picked.to_bits(), flags);
        }
        FpOp::Madd => fa.mul_add(fb, fc),
        FpOp::Msub => fa.mul_add(fb, -fc),
        FpOp::Nmsub => (-fa).mul_add(fb, fc),
        FpOp::Nmadd => (-fa).mul_add(fb, -fc),
        FpOp::Sgnj | FpOp::Sgnjn | FpOp::Sgnjx => unreachable!(),
    };

    if result.is_nan() {
        if !fa.is_nan() && !fb.is_nan() && !(uses_third(op) && fc.is_nan()) {
            flags |= NV;
        }
        (F64_QNAN, flags)
    } else {
        (result.to_bits(), flags)
    }
}

fn uses_third(op: FpOp) -> bool {
    matches!(op, FpOp::Madd | FpOp::Msub | FpOp::Nmsub | FpOp::Nmadd)
}

pub fn f32_cmp(op: FpCmp, a: u32, b: u32) -> (bool, u32) {
    let fa = f32::from_bits(a);
    let fb = f32::from_bits(b);
    match op {
        FpCmp::Eq => {
            let flags = if is_snan32(a) || is_snan32(b) { NV } else { 0 };
            (fa == fb, flags)
        }
        FpCmp::Lt | FpCmp::Le => {
            if fa.is_nan() || fb.is_nan() {
                (false, NV)
            } else if op == FpCmp::Lt {
                (fa < fb, 0)
            } else {
                (fa <= fb, 0)
            }
        }
    }
}

pub fn f64_cmp(op: FpCmp, a: u64, b: u64) -> (bool, u32) {
    let fa = f64::from_bits(a);
    let fb = f64::from_bits(b);
    match op {
        FpCmp::Eq => {
            let flags = if is_snan64(a) || is_snan64(b) { NV } else { 0 };
            (fa == fb, flags)
        }
        FpCmp::Lt | FpCmp::Le => {
            if fa.is_nan() || fb.is_nan() {
                (false, NV)
            } else if op == FpCmp::Lt {
                (fa < fb, 0)
            } else {
                (fa <= fb, 0)
            }
        }
    }
}

/// fclass bit for an f32 pattern.
pub fn f32_class(a: u32) -> u64 {
    let f = f32::from_bits(a);
    let negative = a & F32_SIGN != 0;
    if f.is_nan() {
        if is_snan32(a) {
            1 << 8
        } else {
            1 << 9
        }
    } else if f.is_infinite() {
        if negative {
            1 << 0
        } else {
            1 << 7
        }
    } else if f == 0.0 {
        if negative {
            1 << 3
        } else {
            1 << 4
        }
    } else if f.is_subnormal() {
        if negative {
            1 << 2
        } else {
            1 << 5
        }
    } else if negative {
        1 << 1
    } else {
        1 << 6
    }
}

/// fclass bit for an f64 pattern.
pub fn f64_class(a: u64) -> u64 {
    let f = f64::from_bits(a);
    let negative = a & F64_SIGN != 0;
    if f.is_nan() {
        if is_snan64(a) {
            1 << 8
        } else {
            1 << 9
        }
    } else if f.is_infinite() {
        if negative {
            1 << 0
        } else {
            1 << 7
        }
    } else if f == 0.0 {
        if negative {
            1 << 3
        } else {
            1 << 4
        }
    } else if f.is_subnormal() {
        if negative {
            1 << 2
        } else {
            1 << 5
        }
    } else if negative {
        1 << 1
    } else {
        1 << 6
    }
}

/// Round a finite value and convert to a signed integer, clamping out of
/// range results and reporting NV/NX.
fn to_signed(value: f64, rm: u8, min: i64, max: i64) -> (i64, u32) {
    if value.is_nan() {
        return (max, NV);
    }
    let r = round(value, rm);
    if r < min as f64 {
        (min, NV)
    } else if r >= max as f64 + 1.0 {
        (max, NV)
    } else {
        let flags = if r != value { NX } else { 0 };
        (r as i64, flags)
    }
}

/// Round a finite value and convert to an unsigned integer, clamping out of
/// range results and reporting NV/NX.
fn to_unsigned(value: f64, rm: u8, max: u64) -> (u64, u32) {
    if value.is_nan() {
        return (max, NV);
    }
    let r = round(value, rm);
    if r < 0.0 {
        (0, NV)
    } else if r >= max as f64 + 1.0 {
        (max, NV)
    } else {
        let flags = if r != value { NX } else { 0 };
        (r as u64, flags)
    }
}

pub fn f32_to_i32(a: u32, rm: u8) -> (i32, u32) {
    let (v, fl) = to_signed(f32::from_bits(a) as f64, rm, i32::MIN as i64, i32::MAX as i64);
    (v as i32, fl)
}

pub fn f32_to_u32(a: u32, rm: u8) -> (u32, u32) {
    let (v, fl) = to_unsigned(f32::from_bits(a) as f64, rm, u32::MAX as u64);
    (v as u32, fl)
}

pub fn f32_to_i64(a: u32, rm: u8) -> (i64, u32) {
    to_signed(f32::from_bits(a) as f64, rm, i64::MIN, i64::MAX)
}

pub fn f32_to_u64(a: u32, rm: u8) -> (u64, u32) {
    to_unsigned(f32::from_bits(a) as f64, rm, u64::MAX)
}

pub fn f64_to_i32(a: u64, rm: u8) -> (i32, u32) {
    let (v, fl) = to_signed(f64::from_bits(a), rm, i32::MIN as i64, i32::MAX as i64);
    (v as i32, fl)
}

pub fn f64_to_u32(a: u64, rm: u8) -> (u32, u32) {
    let (v, fl) = to_unsigned(f64::from_bits(a), rm, u32::MAX as u64);
    (v as u32, fl)
}

pub fn f64_to_i64(a: u64, rm: u8) -> (i64, u32) {
    to_signed(f64::from_bits(a), rm, i64::MIN, i64::MAX)
}

pub fn f64_to_u64(a: u64, rm: u8) -> (u64, u32) {
    to_unsigned(f64::from_bits(a), rm, u64::MAX)
}

fn inexact32(result: f32, exact: f64) -> u32 {
    if result as f64 != exact {
        NX
    } else {
        0
    }
}

pub fn i32_to_f32(v: i32) -> (u32, u32) {
    let f = v as f32;
    (f.to_bits(), inexact32(f, v as f64))
}

pub fn u32_to_f32(v: u32) -> (u32, u32) {
    let f = v as f32;
    (f.to_bits(), inexact32(f, v as f64))
}

pub fn i64_to_f32(v: i64) -> (u32, u32) {
    let f = v as f32;
    (f.to_bits(), inexact32(f, v as f64))
}

pub fn u64_to_f32(v: u64) -> (u32, u32) {
    let f = v as f32;
    (f.to_bits(), inexact32(f, v as f64))
}

pub fn i32_to_f64(v: i32) -> (u64, u32) {
    ((v as f64).to_bits(), 0)
}

pub fn u32_to_f64(v: u32) -> (u64, u32) {
    ((v as f64).to_bits(), 0)
}

pub fn i64_to_f64(v: i64) -> (u64, u32) {
    let f = v as f64;
    let flags = if f as i64 != v && f.is_finite() { NX } else { 0 };
    (f.to_bits(), flags)
}

pub fn u64_to_f64(v: u64) -> (u64, u32) {
    let f = v as f64;
    let flags = if f as u64 != v && f.is_finite() { NX } else { 0 };
    (f.to_bits(), flags)
}

pub fn f32_to_f64(a: u32) -> (u64, u32) {
    let f = f32::from_bits(a);
    if f.is_nan() {
        (F64_QNAN, if is_snan32(a) { NV } else { 0 })
    } else {
        ((f as f64).to_bits(), 0)
    }
}

pub fn f64_to_f32(a: u64, _rm: u8) -> (u32, u32) {
    let f = f64::from_bits(a);
    if f.is_nan() {
        return (F32_QNAN, if is_snan64(a) { NV } else { 0 });
    }
    let narrow = f as f32;
    (narrow.to_bits(), inexact32(narrow, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        let (bits, flags) = f32_op(FpOp::Add, 1.5f32.to_bits(), 2.25f32.to_bits(), 0, 0);
        assert_eq!(f32::from_bits(bits), 3.75);
        assert_eq!(flags, 0);
    }

    #[test]
    fn divide_by_zero_flags() {
        let (bits, flags) = f64_op(FpOp::Div, 1.0f64.to_bits(), 0.0f64.to_bits(), 0, 0);
        assert!(f64::from_bits(bits).is_infinite());
        assert_eq!(flags, DZ);
    }

    #[test]
    fn invalid_produces_canonical_nan() {
        let (bits, flags) = f32_op(FpOp::Sqrt, (-1.0f32).to_bits(), 0, 0, 0);
        assert_eq!(bits, F32_QNAN);
        assert_eq!(flags & NV, NV);
    }

    #[test]
    fn min_orders_signed_zero() {
        let (bits, _) = f32_op(FpOp::Min, 0.0f32.to_bits(), (-0.0f32).to_bits(), 0, 0);
        assert_eq!(bits, (-0.0f32).to_bits());
        let (bits, _) = f32_op(FpOp::Max, 0.0f32.to_bits(), (-0.0f32).to_bits(), 0, 0);
        assert_eq!(bits, 0.0f32.to_bits());
    }

    #[test]
    fn conversions_honor_rounding_mode() {
        let half = 2.5f32.to_bits();
        assert_eq!(f32_to_i32(half, 0b000).0, 2); // rne: ties to even
        assert_eq!(f32_to_i32(half, 0b001).0, 2); // rtz
        assert_eq!(f32_to_i32(half, 0b010).0, 2); // rdn
        assert_eq!(f32_to_i32(half, 0b011).0, 3); // rup
        assert_eq!(f32_to_i32(half, 0b100).0, 3); // rmm
        assert_eq!(f32_to_i32(half, 0).1, NX);
    }

    #[test]
    fn conversion_clamps_and_raises_nv() {
        assert_eq!(f32_to_i32(f32::NAN.to_bits(), 0), (i32::MAX, NV));
        assert_eq!(f32_to_u32((-1.0f32).to_bits(), 0), (0, NV));
        assert_eq!(f32_to_i32(1e30f32.to_bits(), 0), (i32::MAX, NV));
    }

    #[test]
    fn classify() {
        assert_eq!(f32_class(0.0f32.to_bits()), 1 << 4);
        assert_eq!(f32_class((-0.0f32).to_bits()), 1 << 3);
        assert_eq!(f32_class(f32::INFINITY.to_bits()), 1 << 7);
        assert_eq!(f32_class(f32::NEG_INFINITY.to_bits()), 1 << 0);
        assert_eq!(f32_class(1.0f32.to_bits()), 1 << 6);
        assert_eq!(f32_class((-1.0f32).to_bits()), 1 << 1);
        assert_eq!(f64_class(f64::NAN.to_bits()), 1 << 9);
    }
}
