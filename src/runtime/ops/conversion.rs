//! Type conversion operations for WebAssembly
//!
//! This module implements specification section 4.4.1.6:
//! - Integer width conversions (wrap, extend) and sign extension
//! - Float width conversions (promote, demote)
//! - Integer to float conversions
//! - Float to integer truncations, trapping on NaN or out of range
//! - Saturating truncations, clamping instead of trapping
//! - Reinterpretations, which preserve bits exactly
//!
//! The trapping truncations use per-case range bounds chosen so that
//! every representable float strictly inside the bound truncates into
//! range; the bounds differ between f32 and f64 sources because 2^31-1
//! and friends are not representable in f32.

use super::{Stack, Trap, Value};

// ============================================================================
// Integer Width Conversions
// ============================================================================

/// i32.wrap_i64 - Truncate i64 to i32 (keep low 32 bits)
pub fn i32_wrap_i64(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i64.extend_i32_s - Sign-extend i32 to i64
pub fn i64_extend_i32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::I64(value as i32 as i64 as u64));
    Ok(())
}

/// i64.extend_i32_u - Zero-extend i32 to i64
pub fn i64_extend_i32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

// ============================================================================
// Sign Extension Operations
// ============================================================================

/// i32.extend8_s - Sign-extend the low 8 bits to i32
pub fn i32_extend8_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32(value as i8 as i32 as u32));
    Ok(())
}

/// i32.extend16_s - Sign-extend the low 16 bits to i32
pub fn i32_extend16_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32(value as i16 as i32 as u32));
    Ok(())
}

/// i64.extend8_s - Sign-extend the low 8 bits to i64
pub fn i64_extend8_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value as i8 as i64 as u64));
    Ok(())
}

/// i64.extend16_s - Sign-extend the low 16 bits to i64
pub fn i64_extend16_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value as i16 as i64 as u64));
    Ok(())
}

/// i64.extend32_s - Sign-extend the low 32 bits to i64
pub fn i64_extend32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value as i32 as i64 as u64));
    Ok(())
}

// ============================================================================
// Reinterpretation / Bit Casting
// ============================================================================

/// i32.reinterpret_f32 - the f32 bits, unchanged
pub fn i32_reinterpret_f32(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    stack.push_value(Value::I32(value.to_bits()));
    Ok(())
}

/// i64.reinterpret_f64 - the f64 bits, unchanged
pub fn i64_reinterpret_f64(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    stack.push_value(Value::I64(value.to_bits()));
    Ok(())
}

/// f32.reinterpret_i32 - the i32 bits, unchanged
pub fn f32_reinterpret_i32(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::F32(f32::from_bits(value)));
    Ok(())
}

/// f64.reinterpret_i64 - the i64 bits, unchanged
pub fn f64_reinterpret_i64(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::F64(f64::from_bits(value)));
    Ok(())
}

// ============================================================================
// Float Width Conversions
// ============================================================================

/// f32.demote_f64 - Round an f64 to the nearest f32
pub fn f32_demote_f64(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    stack.push_value(Value::F32(value as f32));
    Ok(())
}

/// f64.promote_f32 - Widen an f32 to f64 exactly
pub fn f64_promote_f32(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    stack.push_value(Value::F64(value as f64));
    Ok(())
}

// ============================================================================
// Integer to Float Conversions
// ============================================================================

/// f32.convert_i32_s
pub fn f32_convert_i32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::F32(value as i32 as f32));
    Ok(())
}

/// f32.convert_i32_u
pub fn f32_convert_i32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::F32(value as f32));
    Ok(())
}

/// f32.convert_i64_s
pub fn f32_convert_i64_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::F32(value as i64 as f32));
    Ok(())
}

/// f32.convert_i64_u
pub fn f32_convert_i64_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::F32(value as f32));
    Ok(())
}

/// f64.convert_i32_s
pub fn f64_convert_i32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::F64(value as i32 as f64));
    Ok(())
}

/// f64.convert_i32_u
pub fn f64_convert_i32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    stack.push_value(Value::F64(value as f64));
    Ok(())
}

/// f64.convert_i64_s
pub fn f64_convert_i64_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::F64(value as i64 as f64));
    Ok(())
}

/// f64.convert_i64_u
pub fn f64_convert_i64_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    stack.push_value(Value::F64(value as f64));
    Ok(())
}

// ============================================================================
// Trapping Truncations
// ============================================================================
//
// Each guard rejects NaN (both comparisons false) and everything whose
// truncation falls outside the target range, then the plain `as` cast is
// exact. Range bounds are per source type: e.g. -2^31 is representable
// in f32 but nothing between it and the next f32 below truncates into
// i32 range, so `>= -2147483648.0` is the right lower bound for f32 but
// `> -2147483649.0` for f64.

/// i32.trunc_f32_s - truncate toward zero; traps on NaN or out of range
pub fn i32_trunc_f32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value >= -2147483648.0f32 && value < 2147483648.0f32) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I32(value as i32 as u32));
    Ok(())
}

/// i32.trunc_f32_u - traps on NaN or out of range
pub fn i32_trunc_f32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value > -1.0f32 && value < 4294967296.0f32) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i32.trunc_f64_s - traps on NaN or out of range
pub fn i32_trunc_f64_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value > -2147483649.0f64 && value < 2147483648.0f64) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I32(value as i32 as u32));
    Ok(())
}

/// i32.trunc_f64_u - traps on NaN or out of range
pub fn i32_trunc_f64_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value > -1.0f64 && value < 4294967296.0f64) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i64.trunc_f32_s - traps on NaN or out of range
pub fn i64_trunc_f32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value >= -9223372036854775808.0f32 && value < 9223372036854775808.0f32) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.trunc_f32_u - traps on NaN or out of range
pub fn i64_trunc_f32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value > -1.0f32 && value < 18446744073709551616.0f32) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

/// i64.trunc_f64_s - traps on NaN or out of range
pub fn i64_trunc_f64_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value >= -9223372036854775808.0f64 && value < 9223372036854775808.0f64) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.trunc_f64_u - traps on NaN or out of range
pub fn i64_trunc_f64_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if !(value > -1.0f64 && value < 18446744073709551616.0f64) {
        return Err(Trap::IntegerOverflow);
    }
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

// ============================================================================
// Saturating Truncations
// ============================================================================
//
// `as` from float to int in Rust is exactly the saturating conversion
// (NaN to 0, out of range clamped), so these lower directly.

/// i32.trunc_sat_f32_s - clamp instead of trapping; NaN becomes 0
pub fn i32_trunc_sat_f32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    stack.push_value(Value::I32(value as i32 as u32));
    Ok(())
}

/// i32.trunc_sat_f32_u
pub fn i32_trunc_sat_f32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i32.trunc_sat_f64_s
pub fn i32_trunc_sat_f64_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    stack.push_value(Value::I32(value as i32 as u32));
    Ok(())
}

/// i32.trunc_sat_f64_u
pub fn i32_trunc_sat_f64_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i64.trunc_sat_f32_s
pub fn i64_trunc_sat_f32_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.trunc_sat_f32_u
pub fn i64_trunc_sat_f32_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

/// i64.trunc_sat_f64_s
pub fn i64_trunc_sat_f64_s(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.trunc_sat_f64_u
pub fn i64_trunc_sat_f64_u(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with(values: Vec<Value>) -> Stack {
        let mut stack = Stack::new();
        for value in values {
            stack.push_value(value);
        }
        stack
    }

    // ============================================================================
    // Width Conversions and Sign Extension
    // ============================================================================

    #[test]
    fn test_wrap_and_extend() {
        let mut stack = stack_with(vec![Value::I64(0x1_2345_6789)]);
        i32_wrap_i64(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x2345_6789);

        let mut stack = stack_with(vec![Value::from_i32(-1)]);
        i64_extend_i32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), u64::MAX);

        let mut stack = stack_with(vec![Value::from_i32(-1)]);
        i64_extend_i32_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_sign_extension_ops() {
        let mut stack = stack_with(vec![Value::I32(0x80)]);
        i32_extend8_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, -128);

        let mut stack = stack_with(vec![Value::I32(0x7F)]);
        i32_extend8_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x7F);

        let mut stack = stack_with(vec![Value::I32(0x8000)]);
        i32_extend16_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, -32768);

        let mut stack = stack_with(vec![Value::I64(0xFF)]);
        i64_extend8_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, -1);

        let mut stack = stack_with(vec![Value::I64(0x8000_0000)]);
        i64_extend32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, -2147483648);

        let mut stack = stack_with(vec![Value::I64(0x8000)]);
        i64_extend16_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, -32768);
    }

    // ============================================================================
    // Reinterpretation
    // ============================================================================

    #[test]
    fn reinterpret_round_trips_preserve_bits() {
        // f32 -> i32 -> f32, including a NaN with payload
        for bits in [0u32, 0x8000_0000, 0x3F80_0000, 0x7FC0_1234, 0xFF80_0000] {
            let mut stack = stack_with(vec![Value::F32(f32::from_bits(bits))]);
            i32_reinterpret_f32(&mut stack).unwrap();
            f32_reinterpret_i32(&mut stack).unwrap();
            assert_eq!(stack.pop_f32().unwrap().to_bits(), bits);
        }

        // i64 -> f64 -> i64
        for bits in [0u64, u64::MAX, 0x7FF8_0000_0000_0001, 0x0123_4567_89AB_CDEF] {
            let mut stack = stack_with(vec![Value::I64(bits)]);
            f64_reinterpret_i64(&mut stack).unwrap();
            i64_reinterpret_f64(&mut stack).unwrap();
            assert_eq!(stack.pop_i64().unwrap(), bits);
        }
    }

    #[test]
    fn test_promote_demote() {
        let mut stack = stack_with(vec![Value::F32(1.5)]);
        f64_promote_f32(&mut stack).unwrap();
        assert_eq!(stack.pop_f64().unwrap(), 1.5);

        // Demotion rounds to nearest f32
        let mut stack = stack_with(vec![Value::F64(1e300)]);
        f32_demote_f64(&mut stack).unwrap();
        assert_eq!(stack.pop_f32().unwrap(), f32::INFINITY);

        let mut stack = stack_with(vec![Value::F64(f64::NAN)]);
        f32_demote_f64(&mut stack).unwrap();
        assert!(stack.pop_f32().unwrap().is_nan());
    }

    // ============================================================================
    // Integer to Float
    // ============================================================================

    #[test]
    fn test_convert() {
        let mut stack = stack_with(vec![Value::from_i32(-1)]);
        f64_convert_i32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_f64().unwrap(), -1.0);

        // Same bits, unsigned view
        let mut stack = stack_with(vec![Value::from_i32(-1)]);
        f64_convert_i32_u(&mut stack).unwrap();
        assert_eq!(stack.pop_f64().unwrap(), 4294967295.0);

        let mut stack = stack_with(vec![Value::from_i64(-1)]);
        f32_convert_i64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_f32().unwrap(), 18446744073709551616.0);

        let mut stack = stack_with(vec![Value::from_i64(i64::MIN)]);
        f32_convert_i64_s(&mut stack).unwrap();
        assert_eq!(stack.pop_f32().unwrap(), -9223372036854775808.0);

        // Rounds to nearest even when inexact
        let mut stack = stack_with(vec![Value::I32(16777217)]);
        f32_convert_i32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_f32().unwrap(), 16777216.0);
    }

    // ============================================================================
    // Trapping Truncation
    // ============================================================================

    #[test]
    fn test_trunc_basic() {
        let mut stack = stack_with(vec![Value::F32(-2.9)]);
        i32_trunc_f32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, -2);

        let mut stack = stack_with(vec![Value::F64(3.99)]);
        i32_trunc_f64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 3);

        let mut stack = stack_with(vec![Value::F64(-0.99)]);
        i32_trunc_f64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);
    }

    #[test]
    fn test_trunc_nan_traps() {
        let mut stack = stack_with(vec![Value::F32(f32::NAN)]);
        assert_eq!(i32_trunc_f32_s(&mut stack).unwrap_err(), Trap::InvalidConversion);

        let mut stack = stack_with(vec![Value::F64(f64::NAN)]);
        assert_eq!(i64_trunc_f64_u(&mut stack).unwrap_err(), Trap::InvalidConversion);
    }

    #[test]
    fn test_trunc_range_boundaries() {
        // i32.trunc_f32_s: -2^31 is exactly representable and in range
        let mut stack = stack_with(vec![Value::F32(-2147483648.0)]);
        i32_trunc_f32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, i32::MIN);

        // 2^31 is out
        let mut stack = stack_with(vec![Value::F32(2147483648.0)]);
        assert_eq!(i32_trunc_f32_s(&mut stack).unwrap_err(), Trap::IntegerOverflow);

        // i32.trunc_f64_s: -2147483648.9 truncates into range
        let mut stack = stack_with(vec![Value::F64(-2147483648.9)]);
        i32_trunc_f64_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, i32::MIN);

        let mut stack = stack_with(vec![Value::F64(-2147483649.0)]);
        assert_eq!(i32_trunc_f64_s(&mut stack).unwrap_err(), Trap::IntegerOverflow);

        // Unsigned: -0.9 truncates to 0, -1.0 traps
        let mut stack = stack_with(vec![Value::F64(-0.9)]);
        i32_trunc_f64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);

        let mut stack = stack_with(vec![Value::F64(-1.0)]);
        assert_eq!(i32_trunc_f64_u(&mut stack).unwrap_err(), Trap::IntegerOverflow);

        let mut stack = stack_with(vec![Value::F64(4294967296.0)]);
        assert_eq!(i32_trunc_f64_u(&mut stack).unwrap_err(), Trap::IntegerOverflow);

        let mut stack = stack_with(vec![Value::F64(4294967295.9)]);
        i32_trunc_f64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), u32::MAX);

        // Infinities always trap
        let mut stack = stack_with(vec![Value::F32(f32::INFINITY)]);
        assert_eq!(i64_trunc_f32_u(&mut stack).unwrap_err(), Trap::IntegerOverflow);

        let mut stack = stack_with(vec![Value::F64(f64::NEG_INFINITY)]);
        assert_eq!(i64_trunc_f64_s(&mut stack).unwrap_err(), Trap::IntegerOverflow);
    }

    #[test]
    fn test_trunc_i64_boundaries() {
        // -2^63 is exactly representable in both float widths
        let mut stack = stack_with(vec![Value::F64(-9223372036854775808.0)]);
        i64_trunc_f64_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, i64::MIN);

        // 2^63 is out for signed
        let mut stack = stack_with(vec![Value::F64(9223372036854775808.0)]);
        assert_eq!(i64_trunc_f64_s(&mut stack).unwrap_err(), Trap::IntegerOverflow);

        // 2^64 is out for unsigned
        let mut stack = stack_with(vec![Value::F64(18446744073709551616.0)]);
        assert_eq!(i64_trunc_f64_u(&mut stack).unwrap_err(), Trap::IntegerOverflow);
    }

    // ============================================================================
    // Saturating Truncation
    // ============================================================================

    #[test]
    fn test_trunc_sat_clamps() {
        // NaN saturates to 0
        let mut stack = stack_with(vec![Value::F32(f32::NAN)]);
        i32_trunc_sat_f32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);

        // Out of range clamps to the extremes
        let mut stack = stack_with(vec![Value::F32(1e10)]);
        i32_trunc_sat_f32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, i32::MAX);

        let mut stack = stack_with(vec![Value::F32(-1e10)]);
        i32_trunc_sat_f32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, i32::MIN);

        let mut stack = stack_with(vec![Value::F64(-5.0)]);
        i32_trunc_sat_f64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);

        let mut stack = stack_with(vec![Value::F64(f64::INFINITY)]);
        i64_trunc_sat_f64_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), u64::MAX);

        let mut stack = stack_with(vec![Value::F64(f64::NEG_INFINITY)]);
        i64_trunc_sat_f64_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, i64::MIN);

        // In-range values truncate normally
        let mut stack = stack_with(vec![Value::F32(-7.9)]);
        i64_trunc_sat_f32_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, -7);

        let mut stack = stack_with(vec![Value::F32(7.9)]);
        i32_trunc_sat_f32_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 7);

        let mut stack = stack_with(vec![Value::F64(1e20)]);
        i32_trunc_sat_f64_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, i32::MAX);

        let mut stack = stack_with(vec![Value::F32(f32::NAN)]);
        i64_trunc_sat_f32_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0);
    }
}
