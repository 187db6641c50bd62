//! Parametric and reference operations for WebAssembly
//!
//! Specification sections 4.4.2 (Reference Instructions, the
//! stack-only part) and 4.4.4 (Parametric Instructions). `ref.null` and
//! `ref.func` need the module instance's index space and live in the
//! dispatch loop.

use super::{Stack, Trap, Value};
use crate::module::ValueType;

/// drop - Pop and discard the top value
/// spec: 4.4.4
pub fn drop(stack: &mut Stack) -> Result<(), Trap> {
    stack.pop_value()?;
    Ok(())
}

/// select - Pop a condition and two values; push the first if the
/// condition is non-zero, else the second
/// spec: 4.4.4
pub fn select(stack: &mut Stack) -> Result<(), Trap> {
    let condition = stack.pop_i32()?;
    let val2 = stack.pop_value()?;
    let val1 = stack.pop_value()?;
    stack.push_value(if condition != 0 { val1 } else { val2 });
    Ok(())
}

/// select (result t) - Typed select; same dynamics as `select`, the
/// annotation only matters to the validator
/// spec: 4.4.4
pub fn select_typed(stack: &mut Stack, _val_types: &[ValueType]) -> Result<(), Trap> {
    select(stack)
}

/// ref.is_null - Test whether the top reference is null
/// spec: 4.4.2
pub fn ref_is_null(stack: &mut Stack) -> Result<(), Trap> {
    let value = stack.pop_value()?;
    match value {
        Value::FuncRef(_) | Value::ExternRef(_) => {
            stack.push_value(Value::I32(value.is_null_ref() as u32));
            Ok(())
        }
        other => Err(Trap::TypeMismatch {
            expected: "reference".to_string(),
            actual: format!("{:?}", other.typ()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::store::FuncAddr;

    fn stack_with(values: Vec<Value>) -> Stack {
        let mut stack = Stack::new();
        for value in values {
            stack.push_value(value);
        }
        stack
    }

    #[test]
    fn test_drop() {
        let mut stack = stack_with(vec![Value::I32(1), Value::I32(2)]);
        drop(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 1);

        let mut stack = Stack::new();
        assert!(drop(&mut stack).is_err());
    }

    #[test]
    fn test_select_picks_by_condition() {
        // Non-zero condition picks the first value
        let mut stack = stack_with(vec![Value::I32(10), Value::I32(20), Value::I32(1)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 10);

        // Zero picks the second
        let mut stack = stack_with(vec![Value::I32(10), Value::I32(20), Value::I32(0)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 20);

        // Any non-zero condition counts
        let mut stack = stack_with(vec![Value::I32(10), Value::I32(20), Value::from_i32(-1)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 10);
    }

    #[test]
    fn test_select_other_types() {
        let mut stack = stack_with(vec![Value::F64(1.5), Value::F64(2.5), Value::I32(0)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.pop_f64().unwrap(), 2.5);

        let mut stack = stack_with(vec![
            Value::FuncRef(Some(FuncAddr(1))),
            Value::FuncRef(None),
            Value::I32(1),
        ]);
        select_typed(&mut stack, &[ValueType::FuncRef]).unwrap();
        assert_eq!(stack.pop_value().unwrap(), Value::FuncRef(Some(FuncAddr(1))));
    }

    #[test]
    fn test_ref_is_null() {
        let mut stack = stack_with(vec![Value::FuncRef(None)]);
        ref_is_null(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 1);

        let mut stack = stack_with(vec![Value::FuncRef(Some(FuncAddr(3)))]);
        ref_is_null(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);

        let mut stack = stack_with(vec![Value::ExternRef(None)]);
        ref_is_null(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 1);

        // Non-reference operand is a type error
        let mut stack = stack_with(vec![Value::I32(0)]);
        assert!(ref_is_null(&mut stack).is_err());
    }
}
