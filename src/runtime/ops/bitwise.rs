//! Bitwise operations for WebAssembly
//!
//! This module provides the bitwise and shift instructions from
//! specification section 4.4.1.3 (Binary Operations). Shift and rotate
//! counts use only the low log2(N) bits of the count operand; `shr_s`
//! reinterprets the pattern as signed to shift in copies of the sign
//! bit.

use super::{Stack, Trap, Value};

// ============================================================================
// i32 Bitwise Operations
// ============================================================================

/// i32.and
pub fn i32_and(stack: &mut Stack) -> Result<(), Trap> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_value(Value::I32(c1 & c2));
    Ok(())
}

/// i32.or
pub fn i32_or(stack: &mut Stack) -> Result<(), Trap> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_value(Value::I32(c1 | c2));
    Ok(())
}

/// i32.xor
pub fn i32_xor(stack: &mut Stack) -> Result<(), Trap> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_value(Value::I32(c1 ^ c2));
    Ok(())
}

/// i32.shl - shift left; count is taken modulo 32
pub fn i32_shl(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i32()?;
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32(value.wrapping_shl(count)));
    Ok(())
}

/// i32.shr_s - arithmetic shift right; count is taken modulo 32
pub fn i32_shr_s(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i32()?;
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32((value as i32).wrapping_shr(count) as u32));
    Ok(())
}

/// i32.shr_u - logical shift right; count is taken modulo 32
pub fn i32_shr_u(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i32()?;
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32(value.wrapping_shr(count)));
    Ok(())
}

/// i32.rotl - rotate left; count is taken modulo 32
pub fn i32_rotl(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i32()?;
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32(value.rotate_left(count % 32)));
    Ok(())
}

/// i32.rotr - rotate right; count is taken modulo 32
pub fn i32_rotr(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i32()?;
    let value = stack.pop_i32()?;
    stack.push_value(Value::I32(value.rotate_right(count % 32)));
    Ok(())
}

// ============================================================================
// i64 Bitwise Operations
// ============================================================================

/// i64.and
pub fn i64_and(stack: &mut Stack) -> Result<(), Trap> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push_value(Value::I64(c1 & c2));
    Ok(())
}

/// i64.or
pub fn i64_or(stack: &mut Stack) -> Result<(), Trap> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push_value(Value::I64(c1 | c2));
    Ok(())
}

/// i64.xor
pub fn i64_xor(stack: &mut Stack) -> Result<(), Trap> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push_value(Value::I64(c1 ^ c2));
    Ok(())
}

/// i64.shl - shift left; count is taken modulo 64
pub fn i64_shl(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i64()?;
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value.wrapping_shl(count as u32)));
    Ok(())
}

/// i64.shr_s - arithmetic shift right; count is taken modulo 64
pub fn i64_shr_s(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i64()?;
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64((value as i64).wrapping_shr(count as u32) as u64));
    Ok(())
}

/// i64.shr_u - logical shift right; count is taken modulo 64
pub fn i64_shr_u(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i64()?;
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value.wrapping_shr(count as u32)));
    Ok(())
}

/// i64.rotl - rotate left; count is taken modulo 64
pub fn i64_rotl(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i64()?;
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value.rotate_left((count % 64) as u32)));
    Ok(())
}

/// i64.rotr - rotate right; count is taken modulo 64
pub fn i64_rotr(stack: &mut Stack) -> Result<(), Trap> {
    let count = stack.pop_i64()?;
    let value = stack.pop_i64()?;
    stack.push_value(Value::I64(value.rotate_right((count % 64) as u32)));
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

    #[test]
    fn test_i32_logic() {
        let mut stack = stack_with(vec![Value::I32(0b1100), Value::I32(0b1010)]);
        i32_and(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0b1000);

        let mut stack = stack_with(vec![Value::I32(0b1100), Value::I32(0b1010)]);
        i32_or(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0b1110);

        let mut stack = stack_with(vec![Value::I32(0b1100), Value::I32(0b1010)]);
        i32_xor(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0b0110);
    }

    #[test]
    fn test_i32_shl_masks_count() {
        let mut stack = stack_with(vec![Value::I32(1), Value::I32(4)]);
        i32_shl(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 16);

        // Count 33 is taken modulo 32
        let mut stack = stack_with(vec![Value::I32(1), Value::I32(33)]);
        i32_shl(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 2);

        // Count 32 leaves the value unchanged
        let mut stack = stack_with(vec![Value::I32(7), Value::I32(32)]);
        i32_shl(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 7);
    }

    #[test]
    fn test_i32_shr_signedness() {
        // shr_u shifts in zeros
        let mut stack = stack_with(vec![Value::I32(0x8000_0000), Value::I32(1)]);
        i32_shr_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x4000_0000);

        // shr_s shifts in sign bits
        let mut stack = stack_with(vec![Value::I32(0x8000_0000), Value::I32(1)]);
        i32_shr_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0xC000_0000);

        // -1 >> anything (signed) stays -1
        let mut stack = stack_with(vec![Value::from_i32(-1), Value::I32(31)]);
        i32_shr_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), u32::MAX);
    }

    #[test]
    fn test_i32_rotates() {
        let mut stack = stack_with(vec![Value::I32(0x8000_0001), Value::I32(1)]);
        i32_rotl(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x0000_0003);

        let mut stack = stack_with(vec![Value::I32(0x8000_0001), Value::I32(1)]);
        i32_rotr(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0xC000_0000);

        // Rotation count masked to 32
        let mut stack = stack_with(vec![Value::I32(0x1234_5678), Value::I32(32)]);
        i32_rotl(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_i64_logic_and_shifts() {
        let mut stack = stack_with(vec![Value::I64(u64::MAX), Value::I64(0x0F0F)]);
        i64_and(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0x0F0F);

        // Count 65 is taken modulo 64
        let mut stack = stack_with(vec![Value::I64(1), Value::I64(65)]);
        i64_shl(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 2);

        let mut stack = stack_with(vec![Value::I64(0x8000_0000_0000_0000), Value::I64(63)]);
        i64_shr_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), u64::MAX);

        let mut stack = stack_with(vec![Value::I64(0x8000_0000_0000_0000), Value::I64(63)]);
        i64_shr_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 1);
    }

    #[test]
    fn test_i64_rotates() {
        let mut stack = stack_with(vec![Value::I64(0x8000_0000_0000_0001), Value::I64(1)]);
        i64_rotl(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0x0000_0000_0000_0003);

        let mut stack = stack_with(vec![Value::I64(1), Value::I64(1)]);
        i64_rotr(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0x8000_0000_0000_0000);
    }
}
