//! Memory operations for WebAssembly
//!
//! This module implements the load and store instructions from
//! specification section 4.4.7, plus `memory.size`/`memory.grow` and the
//! bulk memory operations (`memory.init`, `memory.copy`, `memory.fill`).
//!
//! The effective address is `base + memarg.offset` computed in 64-bit
//! arithmetic, so the sum cannot wrap; an access whose end passes the
//! memory length traps. Loads of narrow widths apply the sign or zero
//! extension their opcode names.

use super::{MemArg, Memory, Stack, Trap, Value};

#[inline]
fn effective_addr(stack: &mut Stack, memarg: MemArg) -> Result<u64, Trap> {
    let base = stack.pop_i32()?;
    Ok(base as u64 + memarg.offset as u64)
}

// ============================================================================
// Full-Width Loads
// ============================================================================

/// i32.load
pub fn i32_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u32(addr)?;
    stack.push_value(Value::I32(value));
    Ok(())
}

/// i64.load
pub fn i64_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u64(addr)?;
    stack.push_value(Value::I64(value));
    Ok(())
}

/// f32.load
pub fn f32_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_f32(addr)?;
    stack.push_value(Value::F32(value));
    Ok(())
}

/// f64.load
pub fn f64_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_f64(addr)?;
    stack.push_value(Value::F64(value));
    Ok(())
}

// ============================================================================
// Narrow Loads with Extension
// ============================================================================

/// i32.load8_s - sign-extend a byte
pub fn i32_load8_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u8(addr)? as i8;
    stack.push_value(Value::I32(value as i32 as u32));
    Ok(())
}

/// i32.load8_u - zero-extend a byte
pub fn i32_load8_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u8(addr)?;
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i32.load16_s - sign-extend a 16-bit word
pub fn i32_load16_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u16(addr)? as i16;
    stack.push_value(Value::I32(value as i32 as u32));
    Ok(())
}

/// i32.load16_u - zero-extend a 16-bit word
pub fn i32_load16_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u16(addr)?;
    stack.push_value(Value::I32(value as u32));
    Ok(())
}

/// i64.load8_s
pub fn i64_load8_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u8(addr)? as i8;
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.load8_u
pub fn i64_load8_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u8(addr)?;
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

/// i64.load16_s
pub fn i64_load16_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u16(addr)? as i16;
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.load16_u
pub fn i64_load16_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u16(addr)?;
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

/// i64.load32_s
pub fn i64_load32_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u32(addr)? as i32;
    stack.push_value(Value::I64(value as i64 as u64));
    Ok(())
}

/// i64.load32_u
pub fn i64_load32_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), Trap> {
    let addr = effective_addr(stack, memarg)?;
    let value = memory.read_u32(addr)?;
    stack.push_value(Value::I64(value as u64));
    Ok(())
}

// ============================================================================
// Stores
// ============================================================================

/// i32.store
pub fn i32_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u32(addr, value)
}

/// i64.store
pub fn i64_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u64(addr, value)
}

/// f32.store
pub fn f32_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_f32()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_f32(addr, value)
}

/// f64.store
pub fn f64_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_f64()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_f64(addr, value)
}

/// i32.store8 - store the low byte
pub fn i32_store8(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u8(addr, value as u8)
}

/// i32.store16 - store the low 16 bits
pub fn i32_store16(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i32()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u16(addr, value as u16)
}

/// i64.store8
pub fn i64_store8(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u8(addr, value as u8)
}

/// i64.store16
pub fn i64_store16(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u16(addr, value as u16)
}

/// i64.store32
pub fn i64_store32(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), Trap> {
    let value = stack.pop_i64()?;
    let addr = effective_addr(stack, memarg)?;
    memory.write_u32(addr, value as u32)
}

// ============================================================================
// Size and Grow
// ============================================================================

/// memory.size - current page count
pub fn memory_size(stack: &mut Stack, memory: &Memory) -> Result<(), Trap> {
    stack.push_value(Value::I32(memory.size()));
    Ok(())
}

/// memory.grow - extend by n pages; pushes the old page count, or -1 on
/// failure with no side effects
pub fn memory_grow(stack: &mut Stack, memory: &mut Memory) -> Result<(), Trap> {
    let delta = stack.pop_i32()?;
    let result = memory.grow(delta);
    stack.push_value(Value::I32(result as u32));
    Ok(())
}

// ============================================================================
// Bulk Memory Operations
// ============================================================================

/// memory.fill - set n bytes at d to the low byte of val
pub fn memory_fill(stack: &mut Stack, memory: &mut Memory) -> Result<(), Trap> {
    let n = stack.pop_i32()?;
    let val = stack.pop_i32()?;
    let d = stack.pop_i32()?;
    memory.fill(d as u64, val as u8, n as usize)
}

/// memory.copy - copy n bytes from s to d, overlap-safe
pub fn memory_copy(stack: &mut Stack, memory: &mut Memory) -> Result<(), Trap> {
    let n = stack.pop_i32()?;
    let s = stack.pop_i32()?;
    let d = stack.pop_i32()?;
    memory.copy_within(d as u64, s as u64, n as usize)
}

/// memory.init - copy n bytes of a passive data segment from offset s
/// into memory at d. A dropped segment has length zero, so any non-zero
/// read from it traps.
pub fn memory_init(stack: &mut Stack, memory: &mut Memory, bytes: &[u8]) -> Result<(), Trap> {
    let n = stack.pop_i32()? as usize;
    let s = stack.pop_i32()? as usize;
    let d = stack.pop_i32()?;
    let end = s.checked_add(n).ok_or(Trap::MemoryOutOfBounds)?;
    if end > bytes.len() {
        return Err(Trap::MemoryOutOfBounds);
    }
    memory.write_bytes(d as u64, &bytes[s..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::{MAX_PAGES, PAGE_SIZE};

    fn memarg(offset: u32) -> MemArg {
        MemArg { align: 0, offset }
    }

    fn one_page() -> Memory {
        Memory::new(1, None, MAX_PAGES).unwrap()
    }

    fn stack_with(values: Vec<Value>) -> Stack {
        let mut stack = Stack::new();
        for value in values {
            stack.push_value(value);
        }
        stack
    }

    #[test]
    fn test_i32_load_store_round_trip() {
        let mut memory = one_page();
        let mut stack = stack_with(vec![Value::I32(8), Value::I32(0xDEAD_BEEF)]);
        i32_store(&mut stack, &mut memory, memarg(0)).unwrap();

        let mut stack = stack_with(vec![Value::I32(8)]);
        i32_load(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_store_uses_offset() {
        let mut memory = one_page();
        let mut stack = stack_with(vec![Value::I32(8), Value::I32(7)]);
        i32_store(&mut stack, &mut memory, memarg(100)).unwrap();
        assert_eq!(memory.read_u32(108).unwrap(), 7);
    }

    #[test]
    fn test_load_bounds_trap() {
        let memory = one_page();

        // Last full word is fine
        let mut stack = stack_with(vec![Value::I32(PAGE_SIZE as u32 - 4)]);
        i32_load(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);

        // One byte past the end traps
        let mut stack = stack_with(vec![Value::I32(PAGE_SIZE as u32 - 3)]);
        assert_eq!(
            i32_load(&mut stack, &memory, memarg(0)).unwrap_err(),
            Trap::MemoryOutOfBounds
        );

        // Offset + base cannot wrap around 32 bits
        let mut stack = stack_with(vec![Value::I32(u32::MAX)]);
        assert_eq!(
            i32_load(&mut stack, &memory, memarg(u32::MAX)).unwrap_err(),
            Trap::MemoryOutOfBounds
        );
    }

    #[test]
    fn test_narrow_loads_extend() {
        let mut memory = one_page();
        memory.write_u8(0, 0x80).unwrap();
        memory.write_u16(2, 0x8000).unwrap();
        memory.write_u32(4, 0xFFFF_FFFF).unwrap();

        let mut stack = stack_with(vec![Value::I32(0)]);
        i32_load8_s(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, -128);

        let mut stack = stack_with(vec![Value::I32(0)]);
        i32_load8_u(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x80);

        let mut stack = stack_with(vec![Value::I32(2)]);
        i32_load16_s(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, -32768);

        let mut stack = stack_with(vec![Value::I32(2)]);
        i64_load16_u(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0x8000);

        let mut stack = stack_with(vec![Value::I32(4)]);
        i64_load32_s(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i64().unwrap() as i64, -1);

        let mut stack = stack_with(vec![Value::I32(4)]);
        i64_load32_u(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_narrow_stores_truncate() {
        let mut memory = one_page();

        let mut stack = stack_with(vec![Value::I32(0), Value::I32(0x1234_5678)]);
        i32_store8(&mut stack, &mut memory, memarg(0)).unwrap();
        assert_eq!(memory.read_u8(0).unwrap(), 0x78);

        let mut stack = stack_with(vec![Value::I32(4), Value::I64(0xAABB_CCDD_EEFF_1122)]);
        i64_store32(&mut stack, &mut memory, memarg(0)).unwrap();
        assert_eq!(memory.read_u32(4).unwrap(), 0xEEFF_1122);

        let mut stack = stack_with(vec![Value::I32(8), Value::I64(0xABCD)]);
        i64_store16(&mut stack, &mut memory, memarg(0)).unwrap();
        assert_eq!(memory.read_u16(8).unwrap(), 0xABCD);
    }

    #[test]
    fn test_float_round_trip() {
        let mut memory = one_page();

        let mut stack = stack_with(vec![Value::I32(16), Value::F64(std::f64::consts::PI)]);
        f64_store(&mut stack, &mut memory, memarg(0)).unwrap();

        let mut stack = stack_with(vec![Value::I32(16)]);
        f64_load(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_f64().unwrap(), std::f64::consts::PI);

        // NaN payload bits survive
        let mut stack = stack_with(vec![Value::I32(24), Value::F32(f32::from_bits(0x7FC0_1234))]);
        f32_store(&mut stack, &mut memory, memarg(0)).unwrap();
        let mut stack = stack_with(vec![Value::I32(24)]);
        f32_load(&mut stack, &memory, memarg(0)).unwrap();
        assert_eq!(stack.pop_f32().unwrap().to_bits(), 0x7FC0_1234);
    }

    #[test]
    fn test_size_and_grow() {
        let mut memory = Memory::new(1, Some(3), MAX_PAGES).unwrap();

        let mut stack = Stack::new();
        memory_size(&mut stack, &memory).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 1);

        let mut stack = stack_with(vec![Value::I32(2)]);
        memory_grow(&mut stack, &mut memory).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 1); // old size

        let mut stack = stack_with(vec![Value::I32(1)]);
        memory_grow(&mut stack, &mut memory).unwrap();
        assert_eq!(stack.pop_i32().unwrap() as i32, -1); // over max

        let mut stack = Stack::new();
        memory_size(&mut stack, &memory).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 3);
    }

    #[test]
    fn test_fill_copy() {
        let mut memory = one_page();

        // fill(d=5, val=0xAB, n=3)
        let mut stack = stack_with(vec![Value::I32(5), Value::I32(0xAB), Value::I32(3)]);
        memory_fill(&mut stack, &mut memory).unwrap();
        assert_eq!(memory.read_bytes(5, 3).unwrap(), vec![0xAB; 3]);
        assert_eq!(memory.read_u8(4).unwrap(), 0);
        assert_eq!(memory.read_u8(8).unwrap(), 0);

        // copy(d=100, s=5, n=3)
        let mut stack = stack_with(vec![Value::I32(100), Value::I32(5), Value::I32(3)]);
        memory_copy(&mut stack, &mut memory).unwrap();
        assert_eq!(memory.read_bytes(100, 3).unwrap(), vec![0xAB; 3]);

        // Out-of-bounds fill traps
        let mut stack = stack_with(vec![Value::I32(PAGE_SIZE as u32 - 1), Value::I32(0), Value::I32(2)]);
        assert_eq!(memory_fill(&mut stack, &mut memory).unwrap_err(), Trap::MemoryOutOfBounds);
    }

    #[test]
    fn test_init_from_segment() {
        let mut memory = one_page();
        let segment = vec![10, 20, 30, 40];

        // init(d=50, s=1, n=2)
        let mut stack = stack_with(vec![Value::I32(50), Value::I32(1), Value::I32(2)]);
        memory_init(&mut stack, &mut memory, &segment).unwrap();
        assert_eq!(memory.read_bytes(50, 2).unwrap(), vec![20, 30]);

        // Reading past the segment traps
        let mut stack = stack_with(vec![Value::I32(0), Value::I32(3), Value::I32(2)]);
        assert_eq!(
            memory_init(&mut stack, &mut memory, &segment).unwrap_err(),
            Trap::MemoryOutOfBounds
        );

        // A dropped segment is empty; zero-length init still succeeds
        let mut stack = stack_with(vec![Value::I32(0), Value::I32(0), Value::I32(0)]);
        memory_init(&mut stack, &mut memory, &[]).unwrap();

        let mut stack = stack_with(vec![Value::I32(0), Value::I32(0), Value::I32(1)]);
        assert_eq!(
            memory_init(&mut stack, &mut memory, &[]).unwrap_err(),
            Trap::MemoryOutOfBounds
        );
    }
}
