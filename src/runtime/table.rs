//! WebAssembly table implementation
//!
//! Tables are typed vectors of references (funcref or externref). They
//! back indirect calls, so out-of-range and null accesses must trap
//! rather than be papered over; `call_indirect` builds its trap taxonomy
//! on the errors raised here.

use super::{Trap, Value};
use crate::module::{RefType, TableType};

/// A WebAssembly table: a dense, growable vector of references.
#[derive(Debug)]
pub struct Table {
    ref_type: RefType,
    elements: Vec<Value>,
    max: Option<u32>,
}

impl Table {
    /// Create a table of `ty.limits.min` null references.
    pub fn new(ty: TableType) -> Table {
        let null = Value::default_for(ty.ref_type.into());
        Table {
            ref_type: ty.ref_type,
            elements: vec![null; ty.limits.min as usize],
            max: ty.limits.max,
        }
    }

    /// The element type of this table.
    pub fn ref_type(&self) -> RefType {
        self.ref_type
    }

    /// Current element count.
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// Declared maximum element count, if any.
    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Get the element at `index`.
    ///
    /// # Errors
    /// - `TableOutOfBounds` if `index` is past the end
    pub fn get(&self, index: u32) -> Result<Value, Trap> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(Trap::TableOutOfBounds)
    }

    /// Set the element at `index`.
    ///
    /// # Errors
    /// - `TableOutOfBounds` if `index` is past the end
    pub fn set(&mut self, index: u32, value: Value) -> Result<(), Trap> {
        match self.elements.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Trap::TableOutOfBounds),
        }
    }

    /// Grow the table by `delta` elements initialised to `init`.
    ///
    /// Returns the old size, or -1 without side effects if the new size
    /// would exceed the declared maximum.
    pub fn grow(&mut self, delta: u32, init: Value) -> i32 {
        let old_size = self.elements.len() as u32;
        let Some(new_size) = old_size.checked_add(delta) else {
            return -1;
        };
        if let Some(max) = self.max {
            if new_size > max {
                return -1;
            }
        }
        self.elements.resize(new_size as usize, init);
        old_size as i32
    }

    /// `table.fill`: set `len` elements starting at `start` to `value`.
    pub fn fill(&mut self, start: u32, value: Value, len: u32) -> Result<(), Trap> {
        let range = self.check_range(start, len)?;
        self.elements[range].fill(value);
        Ok(())
    }

    /// Copy `len` elements from `src` in `other` to `dst` in this table.
    /// For same-table copies use [`Table::copy_within`].
    pub fn copy_from(&mut self, other: &Table, dst: u32, src: u32, len: u32) -> Result<(), Trap> {
        let src_range = other.check_range(src, len)?;
        let dst_range = self.check_range(dst, len)?;
        self.elements[dst_range].copy_from_slice(&other.elements[src_range]);
        Ok(())
    }

    /// `table.copy` within one table; overlapping ranges behave as if
    /// through an intermediate buffer.
    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> Result<(), Trap> {
        let src_range = self.check_range(src, len)?;
        self.check_range(dst, len)?;
        self.elements.copy_within(src_range, dst as usize);
        Ok(())
    }

    /// Copy `len` references from a slice (an element segment) starting
    /// at `src` into this table at `dst`.
    pub fn init_from(&mut self, refs: &[Value], dst: u32, src: u32, len: u32) -> Result<(), Trap> {
        let src_end = (src as usize).checked_add(len as usize).ok_or(Trap::TableOutOfBounds)?;
        if src_end > refs.len() {
            return Err(Trap::TableOutOfBounds);
        }
        let dst_range = self.check_range(dst, len)?;
        self.elements[dst_range].copy_from_slice(&refs[src as usize..src_end]);
        Ok(())
    }

    fn check_range(&self, start: u32, len: u32) -> Result<std::ops::Range<usize>, Trap> {
        let end = (start as usize)
            .checked_add(len as usize)
            .ok_or(Trap::TableOutOfBounds)?;
        if end > self.elements.len() {
            return Err(Trap::TableOutOfBounds);
        }
        Ok(start as usize..end)
    }
}
