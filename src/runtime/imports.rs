//! Host-module registration
//!
//! The embedder supplies host functions, tables, memories, and globals
//! under a module name; a subsequent instantiation imports them like any
//! other module's exports. Registration allocates everything into the
//! store and produces a synthetic [`ModuleInstance`] that carries only
//! an export map.
//!
//! Host functions run on the guest's thread and must not re-enter the
//! VM; the context they receive deliberately exposes only the caller's
//! memory and the store's extern-handle table, so re-entry is not
//! representable.

use super::instance::{ExternVal, ModuleInstance};
use super::memory::Memory;
use super::store::{GlobalInstance, Store};
use super::table::Table;
use super::{FunctionInstance, Trap, Value};
use crate::module::{FunctionType, GlobalType, MemoryType, TableType};
use std::any::Any;
use std::rc::Rc;

/// What a host function may touch while it runs: the calling instance's
/// default memory (when it has one) and the store's extern-handle table.
pub struct HostContext<'a> {
    /// The caller's default linear memory, if any.
    pub memory: Option<&'a mut Memory>,
    externs: &'a mut Vec<Rc<dyn Any>>,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(memory: Option<&'a mut Memory>, externs: &'a mut Vec<Rc<dyn Any>>) -> HostContext<'a> {
        HostContext { memory, externs }
    }

    /// Intern a host handle, yielding the index an externref value
    /// carries. The handle lives until the owning store is dropped.
    pub fn alloc_extern(&mut self, handle: Rc<dyn Any>) -> super::store::ExternAddr {
        let addr = super::store::ExternAddr(self.externs.len());
        self.externs.push(handle);
        addr
    }

    /// Look up a previously interned host handle.
    pub fn get_extern(&self, addr: super::store::ExternAddr) -> Option<&Rc<dyn Any>> {
        self.externs.get(addr.0)
    }
}

/// A host function: invoked with the marshalled arguments, returns the
/// result values or a trap. A host-raised trap propagates to the
/// invocation boundary exactly like a guest trap.
pub type HostFn = Rc<dyn Fn(&mut HostContext<'_>, &[Value]) -> Result<Vec<Value>, Trap>>;

/// A host module under construction: named definitions to be registered
/// as an importable instance.
pub struct HostModule {
    name: String,
    funcs: Vec<(String, FunctionType, HostFn)>,
    tables: Vec<(String, TableType)>,
    memories: Vec<(String, MemoryType)>,
    globals: Vec<(String, GlobalType, Value)>,
}

impl HostModule {
    /// Start a host module named `name`.
    pub fn new(name: impl Into<String>) -> HostModule {
        HostModule {
            name: name.into(),
            funcs: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// The module name imports will refer to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a host function export.
    pub fn func(
        mut self,
        name: impl Into<String>,
        func_type: FunctionType,
        func: impl Fn(&mut HostContext<'_>, &[Value]) -> Result<Vec<Value>, Trap> + 'static,
    ) -> Self {
        self.funcs.push((name.into(), func_type, Rc::new(func)));
        self
    }

    /// Add a table export.
    pub fn table(mut self, name: impl Into<String>, table_type: TableType) -> Self {
        self.tables.push((name.into(), table_type));
        self
    }

    /// Add a memory export.
    pub fn memory(mut self, name: impl Into<String>, memory_type: MemoryType) -> Self {
        self.memories.push((name.into(), memory_type));
        self
    }

    /// Add a global export with its initial value.
    pub fn global(mut self, name: impl Into<String>, global_type: GlobalType, value: Value) -> Self {
        self.globals.push((name.into(), global_type, value));
        self
    }

    /// Allocate every definition into `store` and build the synthetic
    /// instance exposing them as exports. Returns the instance id.
    pub(crate) fn register(self, store: &mut Store, max_memory_pages: u32) -> Result<usize, Trap> {
        let mut instance = ModuleInstance::default();

        for (name, func_type, func) in self.funcs {
            let addr = store.alloc_func(FunctionInstance::Host { func_type, func });
            instance.funcs.push(addr);
            instance.exports.insert(name, ExternVal::Func(addr));
        }
        for (name, table_type) in self.tables {
            let addr = store.alloc_table(Table::new(table_type));
            instance.tables.push(addr);
            instance.exports.insert(name, ExternVal::Table(addr));
        }
        for (name, memory_type) in self.memories {
            let memory = Memory::new(memory_type.limits.min, memory_type.limits.max, max_memory_pages)?;
            let addr = store.alloc_memory(memory);
            instance.memories.push(addr);
            instance.exports.insert(name, ExternVal::Memory(addr));
        }
        for (name, global_type, value) in self.globals {
            let addr = store.alloc_global(GlobalInstance::new(global_type, value));
            instance.globals.push(addr);
            instance.exports.insert(name, ExternVal::Global(addr));
        }

        Ok(store.add_instance(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Limits, RefType, ValueType};

    #[test]
    fn register_builds_export_map() {
        let mut store = Store::new();
        let module = HostModule::new("env")
            .func(
                "answer",
                FunctionType {
                    params: vec![],
                    results: vec![ValueType::I32],
                },
                |_, _| Ok(vec![Value::I32(42)]),
            )
            .global(
                "g",
                GlobalType {
                    value_type: ValueType::I64,
                    mutable: false,
                },
                Value::I64(7),
            )
            .memory("mem", MemoryType {
                limits: Limits { min: 1, max: Some(2) },
            })
            .table("tab", TableType {
                ref_type: RefType::FuncRef,
                limits: Limits { min: 4, max: None },
            });

        assert_eq!(module.name(), "env");
        let id = module.register(&mut store, 65536).unwrap();
        let instance = store.instance(id).unwrap();

        assert!(instance.exported_func("answer").is_some());
        assert!(instance.exported_global("g").is_some());
        assert!(matches!(instance.export("mem"), Some(ExternVal::Memory(_))));
        assert!(matches!(instance.export("tab"), Some(ExternVal::Table(_))));
        assert_eq!(instance.export("missing"), None);
    }

    #[test]
    fn host_context_extern_handles() {
        let mut externs: Vec<Rc<dyn Any>> = Vec::new();
        let mut ctx = HostContext::new(None, &mut externs);

        let addr = ctx.alloc_extern(Rc::new(123_u64));
        let handle = ctx.get_extern(addr).unwrap();
        assert_eq!(handle.downcast_ref::<u64>(), Some(&123));
    }
}
