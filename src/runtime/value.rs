//! WebAssembly value representation
//!
//! Scalars are held as raw bit-patterns: `I32`/`I64` carry unsigned
//! integers, and signed interpretation happens inside the operator that
//! an opcode selects (`i32.lt_s` casts, `i32.lt_u` does not). Validation
//! guarantees that every instruction sees operands of its static type, so
//! no per-entry runtime tag checks are needed beyond the enum itself.

use super::store::{ExternAddr, FuncAddr};
use crate::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// Runtime representation of a WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 32-bit integer, stored as its unsigned bit-pattern.
    I32(u32),
    /// 64-bit integer, stored as its unsigned bit-pattern.
    I64(u64),
    F32(f32),
    F64(f64),
    /// 128-bit vector payload. The value representation is carried for
    /// completeness; no SIMD instructions are dispatched.
    V128(u128),
    /// Function reference: null or a store function address.
    FuncRef(Option<FuncAddr>),
    /// External reference: null or a handle into the store's extern table.
    ExternRef(Option<ExternAddr>),
}

impl Value {
    /// Get the WebAssembly type of this value
    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::V128(_) => ValueType::V128,
            Value::FuncRef(_) => ValueType::FuncRef,
            Value::ExternRef(_) => ValueType::ExternRef,
        }
    }

    /// The zero/null value of a type, used for uninitialised locals,
    /// globals, and table slots.
    pub fn default_for(typ: ValueType) -> Value {
        match typ {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
            ValueType::V128 => Value::V128(0),
            ValueType::FuncRef => Value::FuncRef(None),
            ValueType::ExternRef => Value::ExternRef(None),
        }
    }

    /// Construct an i32 value from its signed view.
    pub fn from_i32(v: i32) -> Value {
        Value::I32(v as u32)
    }

    /// Construct an i64 value from its signed view.
    pub fn from_i64(v: i64) -> Value {
        Value::I64(v as u64)
    }

    /// The signed view of an i32 value, or None if wrong type.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// The signed view of an i64 value, or None if wrong type.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// The i32 bit-pattern, or None if wrong type.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// The i64 bit-pattern, or None if wrong type.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f32, returning None if wrong type
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f64, returning None if wrong type
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is a null reference. Non-reference values are never null.
    pub fn is_null_ref(&self) -> bool {
        matches!(self, Value::FuncRef(None) | Value::ExternRef(None))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
            Value::V128(v) => write!(f, "v128:{v:#034x}"),
            Value::FuncRef(None) => write!(f, "funcref:null"),
            Value::FuncRef(Some(addr)) => write!(f, "funcref:{}", addr.0),
            Value::ExternRef(None) => write!(f, "externref:null"),
            Value::ExternRef(Some(addr)) => write!(f, "externref:{}", addr.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type() {
        assert_eq!(Value::I32(42).typ(), ValueType::I32);
        assert_eq!(Value::I64(42).typ(), ValueType::I64);
        assert_eq!(Value::F32(42.0).typ(), ValueType::F32);
        assert_eq!(Value::F64(42.0).typ(), ValueType::F64);
        assert_eq!(Value::FuncRef(None).typ(), ValueType::FuncRef);
        assert_eq!(Value::ExternRef(None).typ(), ValueType::ExternRef);
    }

    #[test]
    fn signed_views_are_reinterpretations() {
        // -1 and u32::MAX are the same bit-pattern
        assert_eq!(Value::from_i32(-1), Value::I32(u32::MAX));
        assert_eq!(Value::I32(u32::MAX).as_i32(), Some(-1));
        assert_eq!(Value::from_i64(-1), Value::I64(u64::MAX));
        assert_eq!(Value::I64(u64::MAX).as_i64(), Some(-1));

        // Positive values round-trip unchanged
        assert_eq!(Value::from_i32(42).as_i32(), Some(42));
        assert_eq!(Value::from_i32(42).as_u32(), Some(42));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::I32(42).as_u32(), Some(42));
        assert_eq!(Value::I32(42).as_i64(), None);
        assert_eq!(Value::I64(42).as_u64(), Some(42));
        assert_eq!(Value::F32(42.0).as_f32(), Some(42.0));
        assert_eq!(Value::F64(42.0).as_f64(), Some(42.0));
    }

    #[test]
    fn default_values() {
        assert_eq!(Value::default_for(ValueType::I32), Value::I32(0));
        assert_eq!(Value::default_for(ValueType::F64), Value::F64(0.0));
        assert_eq!(Value::default_for(ValueType::FuncRef), Value::FuncRef(None));
        assert_eq!(Value::default_for(ValueType::ExternRef), Value::ExternRef(None));
    }

    #[test]
    fn null_refs() {
        assert!(Value::FuncRef(None).is_null_ref());
        assert!(Value::ExternRef(None).is_null_ref());
        assert!(!Value::FuncRef(Some(FuncAddr(0))).is_null_ref());
        assert!(!Value::I32(0).is_null_ref());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::I32(42)), "i32:42");
        assert_eq!(format!("{}", Value::I64(42)), "i64:42");
        assert_eq!(format!("{}", Value::FuncRef(None)), "funcref:null");
        // fhex formats floats as hex float literals; just check the prefix
        let f32_str = format!("{}", Value::F32(42.0));
        assert!(f32_str.starts_with("f32:"));
        let f64_str = format!("{}", Value::F64(42.0));
        assert!(f64_str.starts_with("f64:"));
    }
}
