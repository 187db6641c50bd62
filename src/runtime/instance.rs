//! WebAssembly module instance
//!
//! A module instance is a per-instantiation index space: vectors of
//! store addresses for each kind, resolved once at instantiation time,
//! plus the type vector and a name-keyed export map. Instructions use
//! module-local indices; a single indirection through these vectors
//! yields the store address.

use super::store::{DataAddr, ElemAddr, FuncAddr, GlobalAddr, MemAddr, TableAddr};
use super::Trap;
use crate::module::FunctionType;
use std::collections::HashMap;

/// A store address of any external kind, as produced by an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternVal {
    Func(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}

/// A WebAssembly module instance.
#[derive(Debug, Default)]
pub struct ModuleInstance {
    pub types: Vec<FunctionType>,
    pub funcs: Vec<FuncAddr>,
    pub tables: Vec<TableAddr>,
    pub memories: Vec<MemAddr>,
    pub globals: Vec<GlobalAddr>,
    pub elems: Vec<ElemAddr>,
    pub datas: Vec<DataAddr>,
    pub exports: HashMap<String, ExternVal>,
}

impl ModuleInstance {
    /// Resolve a module-local function index to its store address.
    pub fn func_addr(&self, idx: u32) -> Result<FuncAddr, Trap> {
        self.funcs.get(idx as usize).copied().ok_or(Trap::UndefinedElement)
    }

    /// Resolve a module-local table index to its store address.
    pub fn table_addr(&self, idx: u32) -> Result<TableAddr, Trap> {
        self.tables.get(idx as usize).copied().ok_or(Trap::TableOutOfBounds)
    }

    /// Resolve a module-local global index to its store address.
    pub fn global_addr(&self, idx: u32) -> Result<GlobalAddr, Trap> {
        self.globals
            .get(idx as usize)
            .copied()
            .ok_or_else(|| Trap::TypeMismatch {
                expected: format!("global {idx}"),
                actual: "missing".to_string(),
            })
    }

    /// Resolve a module-local element segment index to its store address.
    pub fn elem_addr(&self, idx: u32) -> Result<ElemAddr, Trap> {
        self.elems.get(idx as usize).copied().ok_or(Trap::UndefinedElement)
    }

    /// Resolve a module-local data segment index to its store address.
    pub fn data_addr(&self, idx: u32) -> Result<DataAddr, Trap> {
        self.datas.get(idx as usize).copied().ok_or(Trap::MemoryOutOfBounds)
    }

    /// The instance's default (index 0) memory, if it has one.
    pub fn default_memory(&self) -> Option<MemAddr> {
        self.memories.first().copied()
    }

    /// Look up an export by name.
    pub fn export(&self, name: &str) -> Option<ExternVal> {
        self.exports.get(name).copied()
    }

    /// Look up an exported function by name.
    pub fn exported_func(&self, name: &str) -> Option<FuncAddr> {
        match self.exports.get(name) {
            Some(ExternVal::Func(addr)) => Some(*addr),
            _ => None,
        }
    }

    /// Look up an exported global by name.
    pub fn exported_global(&self, name: &str) -> Option<GlobalAddr> {
        match self.exports.get(name) {
            Some(ExternVal::Global(addr)) => Some(*addr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_space_resolution() {
        let mut instance = ModuleInstance::default();
        instance.funcs.push(FuncAddr(4));
        instance.tables.push(TableAddr(2));
        instance.globals.push(GlobalAddr(9));
        instance.memories.push(MemAddr(1));

        assert_eq!(instance.func_addr(0).unwrap(), FuncAddr(4));
        assert_eq!(instance.table_addr(0).unwrap(), TableAddr(2));
        assert_eq!(instance.global_addr(0).unwrap(), GlobalAddr(9));
        assert_eq!(instance.default_memory(), Some(MemAddr(1)));

        assert!(instance.func_addr(1).is_err());
        assert!(instance.table_addr(1).is_err());
    }

    #[test]
    fn export_lookup() {
        let mut instance = ModuleInstance::default();
        instance.exports.insert("f".to_string(), ExternVal::Func(FuncAddr(3)));
        instance
            .exports
            .insert("g".to_string(), ExternVal::Global(GlobalAddr(0)));

        assert_eq!(instance.exported_func("f"), Some(FuncAddr(3)));
        assert_eq!(instance.exported_func("g"), None);
        assert_eq!(instance.exported_global("g"), Some(GlobalAddr(0)));
        assert_eq!(instance.export("missing"), None);
    }
}
