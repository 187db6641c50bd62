//! WebAssembly store
//!
//! The store owns every runtime instance -- functions, tables, memories,
//! globals, element and data segments, and module instances -- and
//! addresses them through dense per-kind index spaces. Addresses are
//! stable for the lifetime of the store and work across module
//! boundaries, which is what makes funcref values and cross-module
//! imports sound.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Store                            │
//! │  funcs:     [Host{print}, Wasm{inst 0, "add"}, ...]      │
//! │  tables:    [Table, ...]          memories: [Memory, ...]│
//! │  globals:   [GlobalInstance, ...] elems/datas: [...]     │
//! │  instances: [ModuleInstance 0, ModuleInstance 1, ...]    │
//! │  externs:   [host handle, ...]                           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Instantiation resolves a decoded module's imports against registered
//! instances, allocates its definitions, evaluates constant initialisers,
//! and applies active element and data segments. The start function is
//! *not* run here; the caller runs it through the executor so that traps
//! surface uniformly.

use super::imports::{HostContext, HostFn};
use super::instance::{ExternVal, ModuleInstance};
use super::memory::Memory;
use super::table::Table;
use super::value::Value;
use super::{Trap, VmError};
use crate::instruction::{ControlFlowError, Instruction, JumpTable};
use crate::module::{
    ConstExpr, FunctionBody, FunctionType, GlobalType, ImportDesc, Module, RefType, TableType, ValueType,
};
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

/// Store function address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncAddr(pub usize);

/// Store table address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableAddr(pub usize);

/// Store memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemAddr(pub usize);

/// Store global address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalAddr(pub usize);

/// Store element segment address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElemAddr(pub usize);

/// Store data segment address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataAddr(pub usize);

/// Handle into the store's extern table, the payload of a non-null
/// externref. Opaque to the guest and non-forgeable by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternAddr(pub usize);

/// Executable form of a locally-defined function: expanded locals, the
/// validated body, and its pre-resolved jump targets.
#[derive(Debug)]
pub struct FunctionCode {
    pub func_type: FunctionType,
    /// Declared locals, expanded from the run-length encoding. Does not
    /// include parameters.
    pub locals: Vec<ValueType>,
    pub body: Vec<Instruction>,
    pub jumps: JumpTable,
}

impl FunctionCode {
    /// Build the executable form of a function body, resolving its jump
    /// targets.
    pub fn compile(func_type: FunctionType, body: &FunctionBody) -> Result<FunctionCode, ControlFlowError> {
        let jumps = JumpTable::build(&body.body)?;
        let mut locals = Vec::new();
        for &(count, ty) in &body.locals {
            locals.extend(std::iter::repeat(ty).take(count as usize));
        }
        Ok(FunctionCode {
            func_type,
            locals,
            body: body.body.clone(),
            jumps,
        })
    }
}

/// A function instance in the store: a wasm function belonging to some
/// instance, or a host function provided by the embedder.
pub enum FunctionInstance {
    Wasm {
        /// Owning instance, for index-space resolution during execution.
        instance: usize,
        code: Rc<FunctionCode>,
    },
    Host {
        func_type: FunctionType,
        func: HostFn,
    },
}

impl FunctionInstance {
    /// The function's signature.
    pub fn func_type(&self) -> &FunctionType {
        match self {
            FunctionInstance::Wasm { code, .. } => &code.func_type,
            FunctionInstance::Host { func_type, .. } => func_type,
        }
    }
}

/// A global instance: type, mutability, current value.
#[derive(Debug)]
pub struct GlobalInstance {
    pub global_type: GlobalType,
    value: Value,
}

impl GlobalInstance {
    pub fn new(global_type: GlobalType, value: Value) -> GlobalInstance {
        GlobalInstance { global_type, value }
    }

    pub fn get(&self) -> Value {
        self.value
    }

    /// Write the global.
    ///
    /// Traps on an immutable global; validation normally rules this out.
    pub fn set(&mut self, value: Value) -> Result<(), Trap> {
        if !self.global_type.mutable {
            return Err(Trap::TypeMismatch {
                expected: "mutable global".to_string(),
                actual: "immutable global".to_string(),
            });
        }
        self.value = value;
        Ok(())
    }
}

/// A run-time element segment: references available to `table.init`
/// until dropped.
#[derive(Debug)]
pub struct ElementInstance {
    pub ref_type: RefType,
    pub refs: Vec<Value>,
}

/// A run-time data segment: bytes available to `memory.init` until
/// dropped.
#[derive(Debug, Default)]
pub struct DataInstance {
    pub bytes: Vec<u8>,
}

/// The store: owner of all runtime instances.
#[derive(Default)]
pub struct Store {
    funcs: Vec<FunctionInstance>,
    tables: Vec<Table>,
    memories: Vec<Memory>,
    globals: Vec<GlobalInstance>,
    elems: Vec<ElementInstance>,
    datas: Vec<DataInstance>,
    instances: Vec<ModuleInstance>,
    externs: Vec<Rc<dyn Any>>,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Store {
        Store::default()
    }

    /// Register a function instance, returning its address.
    pub fn alloc_func(&mut self, func: FunctionInstance) -> FuncAddr {
        let addr = FuncAddr(self.funcs.len());
        self.funcs.push(func);
        addr
    }

    /// Register a table, returning its address.
    pub fn alloc_table(&mut self, table: Table) -> TableAddr {
        let addr = TableAddr(self.tables.len());
        self.tables.push(table);
        addr
    }

    /// Register a memory, returning its address.
    pub fn alloc_memory(&mut self, memory: Memory) -> MemAddr {
        let addr = MemAddr(self.memories.len());
        self.memories.push(memory);
        addr
    }

    /// Register a global, returning its address.
    pub fn alloc_global(&mut self, global: GlobalInstance) -> GlobalAddr {
        let addr = GlobalAddr(self.globals.len());
        self.globals.push(global);
        addr
    }

    /// Intern a host handle, returning the externref address for it.
    /// The handle stays alive until the store is dropped.
    pub fn alloc_extern(&mut self, handle: Rc<dyn Any>) -> ExternAddr {
        let addr = ExternAddr(self.externs.len());
        self.externs.push(handle);
        addr
    }

    /// Look up an interned host handle.
    pub fn get_extern(&self, addr: ExternAddr) -> Option<&Rc<dyn Any>> {
        self.externs.get(addr.0)
    }

    /// Build the context a host function runs with: the given memory
    /// (the caller's default) and the extern-handle table.
    pub(crate) fn host_context(&mut self, memory: Option<MemAddr>) -> HostContext<'_> {
        let Store { memories, externs, .. } = self;
        let memory = memory.and_then(|addr| memories.get_mut(addr.0));
        HostContext::new(memory, externs)
    }

    pub fn func(&self, addr: FuncAddr) -> Result<&FunctionInstance, Trap> {
        self.funcs.get(addr.0).ok_or(Trap::UndefinedElement)
    }

    pub fn table(&self, addr: TableAddr) -> Result<&Table, Trap> {
        self.tables.get(addr.0).ok_or(Trap::TableOutOfBounds)
    }

    pub fn table_mut(&mut self, addr: TableAddr) -> Result<&mut Table, Trap> {
        self.tables.get_mut(addr.0).ok_or(Trap::TableOutOfBounds)
    }

    /// Split borrow for `table.copy` between two distinct tables.
    pub fn two_tables_mut(&mut self, dst: TableAddr, src: TableAddr) -> Result<(&mut Table, &Table), Trap> {
        if dst.0 >= self.tables.len() || src.0 >= self.tables.len() {
            return Err(Trap::TableOutOfBounds);
        }
        if dst.0 == src.0 {
            return Err(Trap::TableOutOfBounds);
        }
        if dst.0 < src.0 {
            let (left, right) = self.tables.split_at_mut(src.0);
            Ok((&mut left[dst.0], &right[0]))
        } else {
            let (left, right) = self.tables.split_at_mut(dst.0);
            Ok((&mut right[0], &left[src.0]))
        }
    }

    /// Split borrow for `table.init`: the destination table and the
    /// source element segment live in different kinds.
    pub fn table_and_elem_mut(&mut self, table: TableAddr, elem: ElemAddr) -> Result<(&mut Table, &ElementInstance), Trap> {
        let elem = self.elems.get(elem.0).ok_or(Trap::UndefinedElement)?;
        let table = self.tables.get_mut(table.0).ok_or(Trap::TableOutOfBounds)?;
        Ok((table, elem))
    }

    /// Split borrow for `memory.init`: the destination memory and the
    /// source data segment live in different kinds.
    pub fn memory_and_data_mut(&mut self, memory: MemAddr, data: DataAddr) -> Result<(&mut Memory, &DataInstance), Trap> {
        let data = self.datas.get(data.0).ok_or(Trap::MemoryOutOfBounds)?;
        let memory = self.memories.get_mut(memory.0).ok_or(Trap::MemoryOutOfBounds)?;
        Ok((memory, data))
    }

    pub fn memory(&self, addr: MemAddr) -> Result<&Memory, Trap> {
        self.memories.get(addr.0).ok_or(Trap::MemoryOutOfBounds)
    }

    pub fn memory_mut(&mut self, addr: MemAddr) -> Result<&mut Memory, Trap> {
        self.memories.get_mut(addr.0).ok_or(Trap::MemoryOutOfBounds)
    }

    pub fn global(&self, addr: GlobalAddr) -> Result<&GlobalInstance, Trap> {
        self.globals.get(addr.0).ok_or_else(|| Trap::TypeMismatch {
            expected: "global".to_string(),
            actual: "dangling address".to_string(),
        })
    }

    pub fn global_mut(&mut self, addr: GlobalAddr) -> Result<&mut GlobalInstance, Trap> {
        self.globals.get_mut(addr.0).ok_or_else(|| Trap::TypeMismatch {
            expected: "global".to_string(),
            actual: "dangling address".to_string(),
        })
    }

    pub fn elem(&self, addr: ElemAddr) -> Result<&ElementInstance, Trap> {
        self.elems.get(addr.0).ok_or(Trap::UndefinedElement)
    }

    /// `elem.drop`: release a segment's references.
    pub fn drop_elem(&mut self, addr: ElemAddr) -> Result<(), Trap> {
        match self.elems.get_mut(addr.0) {
            Some(elem) => {
                elem.refs = Vec::new();
                Ok(())
            }
            None => Err(Trap::UndefinedElement),
        }
    }

    pub fn data(&self, addr: DataAddr) -> Result<&DataInstance, Trap> {
        self.datas.get(addr.0).ok_or(Trap::MemoryOutOfBounds)
    }

    /// `data.drop`: release a segment's bytes.
    pub fn drop_data(&mut self, addr: DataAddr) -> Result<(), Trap> {
        match self.datas.get_mut(addr.0) {
            Some(data) => {
                data.bytes = Vec::new();
                Ok(())
            }
            None => Err(Trap::MemoryOutOfBounds),
        }
    }

    pub fn instance(&self, id: usize) -> Result<&ModuleInstance, Trap> {
        self.instances.get(id).ok_or_else(|| Trap::TypeMismatch {
            expected: "module instance".to_string(),
            actual: "dangling address".to_string(),
        })
    }

    /// Add a pre-built instance (used for host modules), returning its id.
    pub fn add_instance(&mut self, instance: ModuleInstance) -> usize {
        self.instances.push(instance);
        self.instances.len() - 1
    }

    /// Instantiate a decoded module.
    ///
    /// `codes[i]` is the compiled body of local function `i`. Imports are
    /// resolved against `registry` (name to instance id). Active element
    /// and data segments are applied; out-of-bounds application surfaces
    /// as the corresponding trap. Returns the new instance id and the
    /// start function's address, which the caller must invoke before
    /// using the instance.
    pub fn instantiate(
        &mut self,
        module: &Module,
        codes: &[Rc<FunctionCode>],
        registry: &HashMap<String, usize>,
        max_memory_pages: u32,
    ) -> Result<(usize, Option<FuncAddr>), VmError> {
        let instance_id = self.instances.len();
        let mut instance = ModuleInstance {
            types: module.types.clone(),
            ..ModuleInstance::default()
        };

        self.resolve_imports(module, registry, &mut instance)?;

        // Locally-defined functions
        for code in codes {
            let addr = self.alloc_func(FunctionInstance::Wasm {
                instance: instance_id,
                code: code.clone(),
            });
            instance.funcs.push(addr);
        }

        // Tables and memories
        for table_type in &module.tables {
            let addr = self.alloc_table(Table::new(*table_type));
            instance.tables.push(addr);
        }
        for memory_type in &module.memories {
            let memory = Memory::new(memory_type.limits.min, memory_type.limits.max, max_memory_pages)
                .map_err(VmError::Trap)?;
            instance.memories.push(self.alloc_memory(memory));
        }

        // Globals: initialisers may read imported globals and take
        // function references, both already resolved above.
        for global in &module.globals {
            let value = self.eval_const(&global.init, &instance)?;
            let addr = self.alloc_global(GlobalInstance::new(global.global_type, value));
            instance.globals.push(addr);
        }

        // Element segments
        for segment in &module.elements {
            let refs = segment
                .init
                .iter()
                .map(|expr| self.eval_const(expr, &instance))
                .collect::<Result<Vec<_>, _>>()?;
            let addr = ElemAddr(self.elems.len());
            match &segment.mode {
                crate::module::ElementMode::Active { table_idx, offset } => {
                    let offset = self
                        .eval_const(offset, &instance)?
                        .as_u32()
                        .ok_or_else(Trap::stack_underflow)
                        .map_err(VmError::Trap)?;
                    let table_addr = instance.table_addr(*table_idx).map_err(VmError::Trap)?;
                    let table = self.table_mut(table_addr).map_err(VmError::Trap)?;
                    table
                        .init_from(&refs, offset, 0, refs.len() as u32)
                        .map_err(VmError::Trap)?;
                    // Applied segments are spent
                    self.elems.push(ElementInstance {
                        ref_type: segment.ref_type,
                        refs: Vec::new(),
                    });
                }
                crate::module::ElementMode::Passive => {
                    self.elems.push(ElementInstance {
                        ref_type: segment.ref_type,
                        refs,
                    });
                }
                crate::module::ElementMode::Declarative => {
                    self.elems.push(ElementInstance {
                        ref_type: segment.ref_type,
                        refs: Vec::new(),
                    });
                }
            }
            instance.elems.push(addr);
        }

        // Data segments
        for segment in &module.datas {
            let addr = DataAddr(self.datas.len());
            match &segment.mode {
                crate::module::DataMode::Active { memory_idx, offset } => {
                    let offset = self
                        .eval_const(offset, &instance)?
                        .as_u32()
                        .ok_or_else(Trap::stack_underflow)
                        .map_err(VmError::Trap)?;
                    let mem_addr = instance
                        .memories
                        .get(*memory_idx as usize)
                        .copied()
                        .ok_or(VmError::Trap(Trap::MemoryOutOfBounds))?;
                    let memory = self.memory_mut(mem_addr).map_err(VmError::Trap)?;
                    memory.write_bytes(offset as u64, &segment.bytes).map_err(VmError::Trap)?;
                    self.datas.push(DataInstance { bytes: Vec::new() });
                }
                crate::module::DataMode::Passive => {
                    self.datas.push(DataInstance {
                        bytes: segment.bytes.clone(),
                    });
                }
            }
            instance.datas.push(addr);
        }

        // Exports
        for export in &module.exports {
            let val = match export.desc {
                crate::module::ExportDesc::Function(idx) => {
                    ExternVal::Func(instance.func_addr(idx).map_err(VmError::Trap)?)
                }
                crate::module::ExportDesc::Table(idx) => {
                    ExternVal::Table(instance.table_addr(idx).map_err(VmError::Trap)?)
                }
                crate::module::ExportDesc::Memory(idx) => ExternVal::Memory(
                    instance
                        .memories
                        .get(idx as usize)
                        .copied()
                        .ok_or(VmError::Trap(Trap::MemoryOutOfBounds))?,
                ),
                crate::module::ExportDesc::Global(idx) => {
                    ExternVal::Global(instance.global_addr(idx).map_err(VmError::Trap)?)
                }
            };
            instance.exports.insert(export.name.clone(), val);
        }

        let start = match module.start {
            Some(idx) => Some(instance.func_addr(idx).map_err(VmError::Trap)?),
            None => None,
        };

        self.instances.push(instance);
        Ok((instance_id, start))
    }

    fn resolve_imports(
        &mut self,
        module: &Module,
        registry: &HashMap<String, usize>,
        instance: &mut ModuleInstance,
    ) -> Result<(), VmError> {
        for import in &module.imports {
            let provider = registry
                .get(&import.module)
                .and_then(|&id| self.instances.get(id))
                .ok_or_else(|| VmError::UnknownImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                })?;
            let val = provider.export(&import.name).ok_or_else(|| VmError::UnknownImport {
                module: import.module.clone(),
                name: import.name.clone(),
            })?;

            let mismatch = |expected: String, actual: String| VmError::IncompatibleImportType {
                module: import.module.clone(),
                name: import.name.clone(),
                expected,
                actual,
            };

            match (&import.desc, val) {
                (ImportDesc::Function(type_idx), ExternVal::Func(addr)) => {
                    let expected = module
                        .types
                        .get(*type_idx as usize)
                        .ok_or(VmError::Trap(Trap::IndirectCallTypeMismatch))?;
                    let actual = self.func(addr).map_err(VmError::Trap)?.func_type();
                    if expected != actual {
                        return Err(mismatch(format!("{expected:?}"), format!("{actual:?}")));
                    }
                    instance.funcs.push(addr);
                }
                (ImportDesc::Table(declared), ExternVal::Table(addr)) => {
                    let table = self.table(addr).map_err(VmError::Trap)?;
                    if !table_matches(declared, table) {
                        return Err(mismatch(
                            format!("{declared:?}"),
                            format!("table size {}", table.size()),
                        ));
                    }
                    instance.tables.push(addr);
                }
                (ImportDesc::Memory(declared), ExternVal::Memory(addr)) => {
                    let memory = self.memory(addr).map_err(VmError::Trap)?;
                    if memory.size() < declared.limits.min
                        || declared.limits.max.is_some_and(|max| memory.max_pages() > max)
                    {
                        return Err(mismatch(
                            format!("{declared:?}"),
                            format!("memory of {} pages", memory.size()),
                        ));
                    }
                    instance.memories.push(addr);
                }
                (ImportDesc::Global(declared), ExternVal::Global(addr)) => {
                    let global = self.global(addr).map_err(VmError::Trap)?;
                    if global.global_type != *declared {
                        return Err(mismatch(format!("{declared:?}"), format!("{:?}", global.global_type)));
                    }
                    instance.globals.push(addr);
                }
                (declared, provided) => {
                    return Err(mismatch(format!("{declared:?}"), format!("{provided:?}")));
                }
            }
        }
        Ok(())
    }

    /// Evaluate a constant initialiser expression.
    pub fn eval_const(&self, expr: &ConstExpr, instance: &ModuleInstance) -> Result<Value, VmError> {
        Ok(match expr {
            ConstExpr::I32Const(v) => Value::I32(*v),
            ConstExpr::I64Const(v) => Value::I64(*v),
            ConstExpr::F32Const(v) => Value::F32(*v),
            ConstExpr::F64Const(v) => Value::F64(*v),
            ConstExpr::GlobalGet(idx) => {
                let addr = instance.global_addr(*idx).map_err(VmError::Trap)?;
                self.global(addr).map_err(VmError::Trap)?.get()
            }
            ConstExpr::RefNull(ref_type) => Value::default_for((*ref_type).into()),
            ConstExpr::RefFunc(idx) => Value::FuncRef(Some(instance.func_addr(*idx).map_err(VmError::Trap)?)),
        })
    }
}

fn table_matches(declared: &TableType, table: &Table) -> bool {
    table.ref_type() == declared.ref_type
        && table.size() >= declared.limits.min
        && match declared.limits.max {
            None => true,
            Some(declared_max) => table.max().is_some_and(|max| max <= declared_max),
        }
}
