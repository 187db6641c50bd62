//! WebAssembly instruction executor
//!
//! A single-threaded, non-reentrant, flat dispatch loop. Each function
//! activation is an ip-indexed walk over its instruction stream;
//! structured control pushes labels whose continuations were resolved
//! at validation time, and every branch funnels through the stack's
//! `branch_to_label`. Entering a function pushes a frame plus an
//! implicit body label whose continuation is one past the body, so
//! `br` to the outermost depth and `return` converge on the same path.
//!
//! The executor owns its stack; a trap abandons the whole structure,
//! which is exactly the "unwind to the invocation boundary" the
//! embedder observes. Nothing in the store is rolled back.
//!
//! Cancellation is by gas: when a budget is configured, every
//! instruction decrements it and exhaustion traps at the next
//! instruction boundary.

use super::imports::HostFn;
use super::stack::{Frame, Label, Stack};
use super::store::{FuncAddr, FunctionCode, FunctionInstance, Store};
use super::{ops, Trap, Value};
use crate::instruction::{BlockType, Instruction};
use crate::module::FunctionType;
use std::rc::Rc;

/// Maximum live activations; exceeding it is the call-stack-exhausted
/// trap.
const MAX_CALL_DEPTH: usize = 1000;

/// One live wasm function activation: its code, owning instance, and
/// the ip to resume at when a callee completes.
#[derive(Clone)]
struct Activation {
    code: Rc<FunctionCode>,
    instance: usize,
    ip: usize,
}

enum Called {
    /// A wasm activation was pushed; the dispatch loop must re-enter.
    Wasm,
    /// A host function ran to completion; results are on the stack.
    Host,
}

/// Executes WebAssembly functions against a store.
pub struct Executor<'a> {
    store: &'a mut Store,
    stack: Stack,
    activations: Vec<Activation>,
    gas: Option<u64>,
    count_instructions: bool,
    instructions_retired: u64,
}

impl<'a> Executor<'a> {
    /// Create an executor.
    ///
    /// `gas` caps the number of instructions this executor may retire
    /// (None = unlimited); `count_instructions` enables the statistics
    /// counter.
    pub fn new(store: &'a mut Store, gas: Option<u64>, count_instructions: bool) -> Executor<'a> {
        Executor {
            store,
            stack: Stack::new(),
            activations: Vec::new(),
            gas,
            count_instructions,
            instructions_retired: 0,
        }
    }

    /// Gas remaining after execution, if a budget was set.
    pub fn gas_left(&self) -> Option<u64> {
        self.gas
    }

    /// Instructions retired, when counting is enabled.
    pub fn instructions_retired(&self) -> u64 {
        self.instructions_retired
    }

    /// Invoke a function by store address.
    ///
    /// Arguments must already match the function type; the embedder API
    /// checks them before execution starts. On success the results are
    /// returned in declaration order; on trap the stack above the
    /// invocation boundary is discarded.
    pub fn invoke(&mut self, addr: FuncAddr, args: Vec<Value>) -> Result<Vec<Value>, Trap> {
        self.stack.push_values(args);
        self.call_function(addr)?;
        self.run()?;
        self.stack.drain_values()
    }

    /// Charge one instruction against the gas budget and statistics.
    #[inline]
    fn charge(&mut self) -> Result<(), Trap> {
        if let Some(gas) = &mut self.gas {
            if *gas == 0 {
                return Err(Trap::OutOfGas);
            }
            *gas -= 1;
        }
        if self.count_instructions {
            self.instructions_retired += 1;
        }
        Ok(())
    }

    /// Begin a call to `addr`, popping arguments from the stack.
    ///
    /// Wasm targets get a frame, the implicit body label, and an
    /// activation; host targets run to completion immediately.
    fn call_function(&mut self, addr: FuncAddr) -> Result<Called, Trap> {
        enum Target {
            Wasm { instance: usize, code: Rc<FunctionCode> },
            Host { func_type: FunctionType, func: HostFn },
        }
        let target = match self.store.func(addr)? {
            FunctionInstance::Wasm { instance, code } => Target::Wasm {
                instance: *instance,
                code: code.clone(),
            },
            FunctionInstance::Host { func_type, func } => Target::Host {
                func_type: func_type.clone(),
                func: func.clone(),
            },
        };

        match target {
            Target::Wasm { instance, code } => {
                if self.activations.len() >= MAX_CALL_DEPTH {
                    return Err(Trap::CallStackExhausted);
                }

                let num_params = code.func_type.params.len();
                let mut locals = Vec::with_capacity(num_params + code.locals.len());
                for _ in 0..num_params {
                    locals.push(self.stack.pop_value()?);
                }
                locals.reverse();
                for &ty in &code.locals {
                    locals.push(Value::default_for(ty));
                }

                let return_arity = code.func_type.results.len();
                self.stack.push_frame(Frame {
                    instance,
                    locals,
                    return_arity,
                });
                self.stack.push_label(
                    Label {
                        arity: return_arity,
                        continuation: code.body.len(),
                    },
                    0,
                )?;
                self.activations.push(Activation { code, instance, ip: 0 });
                Ok(Called::Wasm)
            }
            Target::Host { func_type, func } => {
                let mut args = Vec::with_capacity(func_type.params.len());
                for _ in 0..func_type.params.len() {
                    args.push(self.stack.pop_value()?);
                }
                args.reverse();

                // The host sees the calling instance's default memory.
                let memory = self
                    .activations
                    .last()
                    .and_then(|activation| self.store.instance(activation.instance).ok())
                    .and_then(|instance| instance.default_memory());
                let results = {
                    let mut context = self.store.host_context(memory);
                    func(&mut context, &args)?
                };

                if results.len() != func_type.results.len() {
                    return Err(Trap::Host(format!(
                        "host function returned {} values, expected {}",
                        results.len(),
                        func_type.results.len()
                    )));
                }
                self.stack.push_values(results);
                Ok(Called::Host)
            }
        }
    }

    /// Parameter and result arity of a block type.
    fn block_arity(&self, instance: usize, block_type: &BlockType) -> Result<(usize, usize), Trap> {
        Ok(match block_type {
            BlockType::Empty => (0, 0),
            BlockType::Value(_) => (0, 1),
            BlockType::Func(type_idx) => {
                let ty = self
                    .store
                    .instance(instance)?
                    .types
                    .get(*type_idx as usize)
                    .ok_or_else(Trap::stack_underflow)?;
                (ty.params.len(), ty.results.len())
            }
        })
    }

    /// The dispatch loop: run until the last activation returns.
    fn run(&mut self) -> Result<(), Trap> {
        'activation: while let Some(activation) = self.activations.last() {
            let code = activation.code.clone();
            let instance = activation.instance;
            let mut ip = activation.ip;

            'instr: loop {
                if ip >= code.body.len() {
                    // Past the body: the implicit body label is already
                    // gone (final end, or a branch targeting it).
                    self.stack.return_from_frame()?;
                    self.activations.pop();
                    continue 'activation;
                }

                self.charge()?;

                match &code.body[ip] {
                    // ------------------------------------------------
                    // Control (4.4.8)
                    Instruction::Unreachable => return Err(Trap::Unreachable),
                    Instruction::Nop => {}

                    Instruction::Block { block_type } => {
                        let (params, results) = self.block_arity(instance, block_type)?;
                        let end = jump_target(&code, ip)?;
                        self.stack.push_label(
                            Label {
                                arity: results,
                                continuation: end + 1,
                            },
                            params,
                        )?;
                    }

                    Instruction::Loop { block_type } => {
                        // A loop label's continuation is the loop header
                        // itself; branching re-executes it, which pushes
                        // a fresh label.
                        let (params, _results) = self.block_arity(instance, block_type)?;
                        self.stack.push_label(
                            Label {
                                arity: params,
                                continuation: ip,
                            },
                            params,
                        )?;
                    }

                    Instruction::If { block_type } => {
                        let condition = self.stack.pop_i32()?;
                        let (params, results) = self.block_arity(instance, block_type)?;
                        let end = jump_target(&code, ip)?;
                        if condition != 0 {
                            self.stack.push_label(
                                Label {
                                    arity: results,
                                    continuation: end + 1,
                                },
                                params,
                            )?;
                        } else if let Some(else_ip) = code.jumps.else_of(ip) {
                            self.stack.push_label(
                                Label {
                                    arity: results,
                                    continuation: end + 1,
                                },
                                params,
                            )?;
                            ip = else_ip + 1;
                            continue 'instr;
                        } else {
                            // No else: skip the block entirely.
                            ip = end + 1;
                            continue 'instr;
                        }
                    }

                    Instruction::Else => {
                        // Fallthrough from the then-branch: jump to the
                        // matching end, which pops the label.
                        ip = jump_target(&code, ip)?;
                        continue 'instr;
                    }

                    Instruction::End => {
                        self.stack.exit_label()?;
                    }

                    Instruction::Br { label_idx } => {
                        ip = self.stack.branch_to_label(*label_idx)?;
                        continue 'instr;
                    }

                    Instruction::BrIf { label_idx } => {
                        let condition = self.stack.pop_i32()?;
                        if condition != 0 {
                            ip = self.stack.branch_to_label(*label_idx)?;
                            continue 'instr;
                        }
                    }

                    Instruction::BrTable { labels, default } => {
                        let index = self.stack.pop_i32()?;
                        let target = labels.get(index as usize).copied().unwrap_or(*default);
                        ip = self.stack.branch_to_label(target)?;
                        continue 'instr;
                    }

                    Instruction::Return => {
                        self.stack.return_from_frame()?;
                        self.activations.pop();
                        continue 'activation;
                    }

                    Instruction::Call { func_idx } => {
                        let addr = self.store.instance(instance)?.func_addr(*func_idx)?;
                        let caller = self.activations.len() - 1;
                        self.activations[caller].ip = ip + 1;
                        match self.call_function(addr)? {
                            Called::Wasm => continue 'activation,
                            Called::Host => {}
                        }
                    }

                    Instruction::CallIndirect { type_idx, table_idx } => {
                        let element = self.stack.pop_i32()?;
                        let (table_addr, expected) = {
                            let inst = self.store.instance(instance)?;
                            let table_addr = inst.table_addr(*table_idx)?;
                            let expected = inst
                                .types
                                .get(*type_idx as usize)
                                .cloned()
                                .ok_or(Trap::IndirectCallTypeMismatch)?;
                            (table_addr, expected)
                        };
                        let table = self.store.table(table_addr)?;
                        if element >= table.size() {
                            return Err(Trap::UndefinedElement);
                        }
                        let addr = match table.get(element)? {
                            Value::FuncRef(Some(addr)) => addr,
                            Value::FuncRef(None) => return Err(Trap::UninitializedElement(element)),
                            _ => return Err(Trap::IndirectCallTypeMismatch),
                        };
                        if self.store.func(addr)?.func_type() != &expected {
                            return Err(Trap::IndirectCallTypeMismatch);
                        }
                        let caller = self.activations.len() - 1;
                        self.activations[caller].ip = ip + 1;
                        match self.call_function(addr)? {
                            Called::Wasm => continue 'activation,
                            Called::Host => {}
                        }
                    }

                    // ------------------------------------------------
                    // Reference (4.4.2)
                    Instruction::RefNull { ref_type } => {
                        self.stack.push_value(Value::default_for((*ref_type).into()));
                    }
                    Instruction::RefIsNull => ops::parametric::ref_is_null(&mut self.stack)?,
                    Instruction::RefFunc { func_idx } => {
                        let addr = self.store.instance(instance)?.func_addr(*func_idx)?;
                        self.stack.push_value(Value::FuncRef(Some(addr)));
                    }

                    // ------------------------------------------------
                    // Parametric (4.4.4)
                    Instruction::Drop => ops::parametric::drop(&mut self.stack)?,
                    Instruction::Select => ops::parametric::select(&mut self.stack)?,
                    Instruction::SelectTyped { val_types } => {
                        ops::parametric::select_typed(&mut self.stack, val_types)?
                    }

                    // ------------------------------------------------
                    // Variable (4.4.5)
                    Instruction::LocalGet { local_idx } => {
                        let value = self.stack.local(*local_idx)?;
                        self.stack.push_value(value);
                    }
                    Instruction::LocalSet { local_idx } => {
                        let value = self.stack.pop_value()?;
                        self.stack.set_local(*local_idx, value)?;
                    }
                    Instruction::LocalTee { local_idx } => {
                        let value = *self.stack.peek_value(0)?;
                        self.stack.set_local(*local_idx, value)?;
                    }
                    Instruction::GlobalGet { global_idx } => {
                        let addr = self.store.instance(instance)?.global_addr(*global_idx)?;
                        let value = self.store.global(addr)?.get();
                        self.stack.push_value(value);
                    }
                    Instruction::GlobalSet { global_idx } => {
                        let value = self.stack.pop_value()?;
                        let addr = self.store.instance(instance)?.global_addr(*global_idx)?;
                        self.store.global_mut(addr)?.set(value)?;
                    }

                    // ------------------------------------------------
                    // Table (4.4.6)
                    Instruction::TableGet { table_idx } => {
                        let index = self.stack.pop_i32()?;
                        let addr = self.store.instance(instance)?.table_addr(*table_idx)?;
                        let value = self.store.table(addr)?.get(index)?;
                        self.stack.push_value(value);
                    }
                    Instruction::TableSet { table_idx } => {
                        let value = self.stack.pop_value()?;
                        let index = self.stack.pop_i32()?;
                        let addr = self.store.instance(instance)?.table_addr(*table_idx)?;
                        self.store.table_mut(addr)?.set(index, value)?;
                    }
                    Instruction::TableSize { table_idx } => {
                        let addr = self.store.instance(instance)?.table_addr(*table_idx)?;
                        let size = self.store.table(addr)?.size();
                        self.stack.push_value(Value::I32(size));
                    }
                    Instruction::TableGrow { table_idx } => {
                        let delta = self.stack.pop_i32()?;
                        let init = self.stack.pop_value()?;
                        let addr = self.store.instance(instance)?.table_addr(*table_idx)?;
                        let result = self.store.table_mut(addr)?.grow(delta, init);
                        self.stack.push_value(Value::I32(result as u32));
                    }
                    Instruction::TableFill { table_idx } => {
                        let len = self.stack.pop_i32()?;
                        let value = self.stack.pop_value()?;
                        let start = self.stack.pop_i32()?;
                        let addr = self.store.instance(instance)?.table_addr(*table_idx)?;
                        self.store.table_mut(addr)?.fill(start, value, len)?;
                    }
                    Instruction::TableCopy { dst_table, src_table } => {
                        let len = self.stack.pop_i32()?;
                        let src = self.stack.pop_i32()?;
                        let dst = self.stack.pop_i32()?;
                        let (dst_addr, src_addr) = {
                            let inst = self.store.instance(instance)?;
                            (inst.table_addr(*dst_table)?, inst.table_addr(*src_table)?)
                        };
                        if dst_addr == src_addr {
                            self.store.table_mut(dst_addr)?.copy_within(dst, src, len)?;
                        } else {
                            let (dst_table, src_table) = self.store.two_tables_mut(dst_addr, src_addr)?;
                            dst_table.copy_from(src_table, dst, src, len)?;
                        }
                    }
                    Instruction::TableInit { elem_idx, table_idx } => {
                        let len = self.stack.pop_i32()?;
                        let src = self.stack.pop_i32()?;
                        let dst = self.stack.pop_i32()?;
                        let (table_addr, elem_addr) = {
                            let inst = self.store.instance(instance)?;
                            (inst.table_addr(*table_idx)?, inst.elem_addr(*elem_idx)?)
                        };
                        let (table, elem) = self.store.table_and_elem_mut(table_addr, elem_addr)?;
                        table.init_from(&elem.refs, dst, src, len)?;
                    }
                    Instruction::ElemDrop { elem_idx } => {
                        let addr = self.store.instance(instance)?.elem_addr(*elem_idx)?;
                        self.store.drop_elem(addr)?;
                    }

                    // ------------------------------------------------
                    // Memory (4.4.7)
                    Instruction::I32Load { memarg } => {
                        ops::memory::i32_load(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load { memarg } => {
                        ops::memory::i64_load(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::F32Load { memarg } => {
                        ops::memory::f32_load(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::F64Load { memarg } => {
                        ops::memory::f64_load(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Load8S { memarg } => {
                        ops::memory::i32_load8_s(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Load8U { memarg } => {
                        ops::memory::i32_load8_u(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Load16S { memarg } => {
                        ops::memory::i32_load16_s(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Load16U { memarg } => {
                        ops::memory::i32_load16_u(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load8S { memarg } => {
                        ops::memory::i64_load8_s(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load8U { memarg } => {
                        ops::memory::i64_load8_u(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load16S { memarg } => {
                        ops::memory::i64_load16_s(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load16U { memarg } => {
                        ops::memory::i64_load16_u(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load32S { memarg } => {
                        ops::memory::i64_load32_s(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Load32U { memarg } => {
                        ops::memory::i64_load32_u(&mut self.stack, default_memory(&*self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Store { memarg } => {
                        ops::memory::i32_store(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Store { memarg } => {
                        ops::memory::i64_store(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::F32Store { memarg } => {
                        ops::memory::f32_store(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::F64Store { memarg } => {
                        ops::memory::f64_store(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Store8 { memarg } => {
                        ops::memory::i32_store8(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::I32Store16 { memarg } => {
                        ops::memory::i32_store16(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Store8 { memarg } => {
                        ops::memory::i64_store8(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Store16 { memarg } => {
                        ops::memory::i64_store16(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::I64Store32 { memarg } => {
                        ops::memory::i64_store32(&mut self.stack, default_memory_mut(self.store, instance)?, *memarg)?
                    }
                    Instruction::MemorySize => {
                        ops::memory::memory_size(&mut self.stack, default_memory(&*self.store, instance)?)?
                    }
                    Instruction::MemoryGrow => {
                        ops::memory::memory_grow(&mut self.stack, default_memory_mut(self.store, instance)?)?
                    }
                    Instruction::MemoryFill => {
                        ops::memory::memory_fill(&mut self.stack, default_memory_mut(self.store, instance)?)?
                    }
                    Instruction::MemoryCopy => {
                        ops::memory::memory_copy(&mut self.stack, default_memory_mut(self.store, instance)?)?
                    }
                    Instruction::MemoryInit { data_idx } => {
                        let (mem_addr, data_addr) = {
                            let inst = self.store.instance(instance)?;
                            let mem_addr = inst.default_memory().ok_or(Trap::MemoryOutOfBounds)?;
                            (mem_addr, inst.data_addr(*data_idx)?)
                        };
                        let (memory, data) = self.store.memory_and_data_mut(mem_addr, data_addr)?;
                        ops::memory::memory_init(&mut self.stack, memory, &data.bytes)?;
                    }
                    Instruction::DataDrop { data_idx } => {
                        let addr = self.store.instance(instance)?.data_addr(*data_idx)?;
                        self.store.drop_data(addr)?;
                    }

                    // ------------------------------------------------
                    // Numeric (4.4.1)
                    Instruction::I32Const { value } => ops::numeric::i32_const(&mut self.stack, *value)?,
                    Instruction::I64Const { value } => ops::numeric::i64_const(&mut self.stack, *value)?,
                    Instruction::F32Const { value } => ops::numeric::f32_const(&mut self.stack, *value)?,
                    Instruction::F64Const { value } => ops::numeric::f64_const(&mut self.stack, *value)?,

                    Instruction::I32Eqz => ops::comparison::i32_eqz(&mut self.stack)?,
                    Instruction::I32Eq => ops::comparison::i32_eq(&mut self.stack)?,
                    Instruction::I32Ne => ops::comparison::i32_ne(&mut self.stack)?,
                    Instruction::I32LtS => ops::comparison::i32_lt_s(&mut self.stack)?,
                    Instruction::I32LtU => ops::comparison::i32_lt_u(&mut self.stack)?,
                    Instruction::I32GtS => ops::comparison::i32_gt_s(&mut self.stack)?,
                    Instruction::I32GtU => ops::comparison::i32_gt_u(&mut self.stack)?,
                    Instruction::I32LeS => ops::comparison::i32_le_s(&mut self.stack)?,
                    Instruction::I32LeU => ops::comparison::i32_le_u(&mut self.stack)?,
                    Instruction::I32GeS => ops::comparison::i32_ge_s(&mut self.stack)?,
                    Instruction::I32GeU => ops::comparison::i32_ge_u(&mut self.stack)?,

                    Instruction::I64Eqz => ops::comparison::i64_eqz(&mut self.stack)?,
                    Instruction::I64Eq => ops::comparison::i64_eq(&mut self.stack)?,
                    Instruction::I64Ne => ops::comparison::i64_ne(&mut self.stack)?,
                    Instruction::I64LtS => ops::comparison::i64_lt_s(&mut self.stack)?,
                    Instruction::I64LtU => ops::comparison::i64_lt_u(&mut self.stack)?,
                    Instruction::I64GtS => ops::comparison::i64_gt_s(&mut self.stack)?,
                    Instruction::I64GtU => ops::comparison::i64_gt_u(&mut self.stack)?,
                    Instruction::I64LeS => ops::comparison::i64_le_s(&mut self.stack)?,
                    Instruction::I64LeU => ops::comparison::i64_le_u(&mut self.stack)?,
                    Instruction::I64GeS => ops::comparison::i64_ge_s(&mut self.stack)?,
                    Instruction::I64GeU => ops::comparison::i64_ge_u(&mut self.stack)?,

                    Instruction::F32Eq => ops::comparison::f32_eq(&mut self.stack)?,
                    Instruction::F32Ne => ops::comparison::f32_ne(&mut self.stack)?,
                    Instruction::F32Lt => ops::comparison::f32_lt(&mut self.stack)?,
                    Instruction::F32Gt => ops::comparison::f32_gt(&mut self.stack)?,
                    Instruction::F32Le => ops::comparison::f32_le(&mut self.stack)?,
                    Instruction::F32Ge => ops::comparison::f32_ge(&mut self.stack)?,

                    Instruction::F64Eq => ops::comparison::f64_eq(&mut self.stack)?,
                    Instruction::F64Ne => ops::comparison::f64_ne(&mut self.stack)?,
                    Instruction::F64Lt => ops::comparison::f64_lt(&mut self.stack)?,
                    Instruction::F64Gt => ops::comparison::f64_gt(&mut self.stack)?,
                    Instruction::F64Le => ops::comparison::f64_le(&mut self.stack)?,
                    Instruction::F64Ge => ops::comparison::f64_ge(&mut self.stack)?,

                    Instruction::I32Clz => ops::numeric::i32_clz(&mut self.stack)?,
                    Instruction::I32Ctz => ops::numeric::i32_ctz(&mut self.stack)?,
                    Instruction::I32Popcnt => ops::numeric::i32_popcnt(&mut self.stack)?,
                    Instruction::I32Add => ops::numeric::i32_add(&mut self.stack)?,
                    Instruction::I32Sub => ops::numeric::i32_sub(&mut self.stack)?,
                    Instruction::I32Mul => ops::numeric::i32_mul(&mut self.stack)?,
                    Instruction::I32DivS => ops::numeric::i32_div_s(&mut self.stack)?,
                    Instruction::I32DivU => ops::numeric::i32_div_u(&mut self.stack)?,
                    Instruction::I32RemS => ops::numeric::i32_rem_s(&mut self.stack)?,
                    Instruction::I32RemU => ops::numeric::i32_rem_u(&mut self.stack)?,
                    Instruction::I32And => ops::bitwise::i32_and(&mut self.stack)?,
                    Instruction::I32Or => ops::bitwise::i32_or(&mut self.stack)?,
                    Instruction::I32Xor => ops::bitwise::i32_xor(&mut self.stack)?,
                    Instruction::I32Shl => ops::bitwise::i32_shl(&mut self.stack)?,
                    Instruction::I32ShrS => ops::bitwise::i32_shr_s(&mut self.stack)?,
                    Instruction::I32ShrU => ops::bitwise::i32_shr_u(&mut self.stack)?,
                    Instruction::I32Rotl => ops::bitwise::i32_rotl(&mut self.stack)?,
                    Instruction::I32Rotr => ops::bitwise::i32_rotr(&mut self.stack)?,

                    Instruction::I64Clz => ops::numeric::i64_clz(&mut self.stack)?,
                    Instruction::I64Ctz => ops::numeric::i64_ctz(&mut self.stack)?,
                    Instruction::I64Popcnt => ops::numeric::i64_popcnt(&mut self.stack)?,
                    Instruction::I64Add => ops::numeric::i64_add(&mut self.stack)?,
                    Instruction::I64Sub => ops::numeric::i64_sub(&mut self.stack)?,
                    Instruction::I64Mul => ops::numeric::i64_mul(&mut self.stack)?,
                    Instruction::I64DivS => ops::numeric::i64_div_s(&mut self.stack)?,
                    Instruction::I64DivU => ops::numeric::i64_div_u(&mut self.stack)?,
                    Instruction::I64RemS => ops::numeric::i64_rem_s(&mut self.stack)?,
                    Instruction::I64RemU => ops::numeric::i64_rem_u(&mut self.stack)?,
                    Instruction::I64And => ops::bitwise::i64_and(&mut self.stack)?,
                    Instruction::I64Or => ops::bitwise::i64_or(&mut self.stack)?,
                    Instruction::I64Xor => ops::bitwise::i64_xor(&mut self.stack)?,
                    Instruction::I64Shl => ops::bitwise::i64_shl(&mut self.stack)?,
                    Instruction::I64ShrS => ops::bitwise::i64_shr_s(&mut self.stack)?,
                    Instruction::I64ShrU => ops::bitwise::i64_shr_u(&mut self.stack)?,
                    Instruction::I64Rotl => ops::bitwise::i64_rotl(&mut self.stack)?,
                    Instruction::I64Rotr => ops::bitwise::i64_rotr(&mut self.stack)?,

                    Instruction::F32Abs => ops::numeric::f32_abs(&mut self.stack)?,
                    Instruction::F32Neg => ops::numeric::f32_neg(&mut self.stack)?,
                    Instruction::F32Ceil => ops::numeric::f32_ceil(&mut self.stack)?,
                    Instruction::F32Floor => ops::numeric::f32_floor(&mut self.stack)?,
                    Instruction::F32Trunc => ops::numeric::f32_trunc(&mut self.stack)?,
                    Instruction::F32Nearest => ops::numeric::f32_nearest(&mut self.stack)?,
                    Instruction::F32Sqrt => ops::numeric::f32_sqrt(&mut self.stack)?,
                    Instruction::F32Add => ops::numeric::f32_add(&mut self.stack)?,
                    Instruction::F32Sub => ops::numeric::f32_sub(&mut self.stack)?,
                    Instruction::F32Mul => ops::numeric::f32_mul(&mut self.stack)?,
                    Instruction::F32Div => ops::numeric::f32_div(&mut self.stack)?,
                    Instruction::F32Min => ops::numeric::f32_min(&mut self.stack)?,
                    Instruction::F32Max => ops::numeric::f32_max(&mut self.stack)?,
                    Instruction::F32Copysign => ops::numeric::f32_copysign(&mut self.stack)?,

                    Instruction::F64Abs => ops::numeric::f64_abs(&mut self.stack)?,
                    Instruction::F64Neg => ops::numeric::f64_neg(&mut self.stack)?,
                    Instruction::F64Ceil => ops::numeric::f64_ceil(&mut self.stack)?,
                    Instruction::F64Floor => ops::numeric::f64_floor(&mut self.stack)?,
                    Instruction::F64Trunc => ops::numeric::f64_trunc(&mut self.stack)?,
                    Instruction::F64Nearest => ops::numeric::f64_nearest(&mut self.stack)?,
                    Instruction::F64Sqrt => ops::numeric::f64_sqrt(&mut self.stack)?,
                    Instruction::F64Add => ops::numeric::f64_add(&mut self.stack)?,
                    Instruction::F64Sub => ops::numeric::f64_sub(&mut self.stack)?,
                    Instruction::F64Mul => ops::numeric::f64_mul(&mut self.stack)?,
                    Instruction::F64Div => ops::numeric::f64_div(&mut self.stack)?,
                    Instruction::F64Min => ops::numeric::f64_min(&mut self.stack)?,
                    Instruction::F64Max => ops::numeric::f64_max(&mut self.stack)?,
                    Instruction::F64Copysign => ops::numeric::f64_copysign(&mut self.stack)?,

                    // ------------------------------------------------
                    // Conversions (4.4.1.6)
                    Instruction::I32WrapI64 => ops::conversion::i32_wrap_i64(&mut self.stack)?,
                    Instruction::I32TruncF32S => ops::conversion::i32_trunc_f32_s(&mut self.stack)?,
                    Instruction::I32TruncF32U => ops::conversion::i32_trunc_f32_u(&mut self.stack)?,
                    Instruction::I32TruncF64S => ops::conversion::i32_trunc_f64_s(&mut self.stack)?,
                    Instruction::I32TruncF64U => ops::conversion::i32_trunc_f64_u(&mut self.stack)?,
                    Instruction::I64ExtendI32S => ops::conversion::i64_extend_i32_s(&mut self.stack)?,
                    Instruction::I64ExtendI32U => ops::conversion::i64_extend_i32_u(&mut self.stack)?,
                    Instruction::I64TruncF32S => ops::conversion::i64_trunc_f32_s(&mut self.stack)?,
                    Instruction::I64TruncF32U => ops::conversion::i64_trunc_f32_u(&mut self.stack)?,
                    Instruction::I64TruncF64S => ops::conversion::i64_trunc_f64_s(&mut self.stack)?,
                    Instruction::I64TruncF64U => ops::conversion::i64_trunc_f64_u(&mut self.stack)?,
                    Instruction::F32ConvertI32S => ops::conversion::f32_convert_i32_s(&mut self.stack)?,
                    Instruction::F32ConvertI32U => ops::conversion::f32_convert_i32_u(&mut self.stack)?,
                    Instruction::F32ConvertI64S => ops::conversion::f32_convert_i64_s(&mut self.stack)?,
                    Instruction::F32ConvertI64U => ops::conversion::f32_convert_i64_u(&mut self.stack)?,
                    Instruction::F32DemoteF64 => ops::conversion::f32_demote_f64(&mut self.stack)?,
                    Instruction::F64ConvertI32S => ops::conversion::f64_convert_i32_s(&mut self.stack)?,
                    Instruction::F64ConvertI32U => ops::conversion::f64_convert_i32_u(&mut self.stack)?,
                    Instruction::F64ConvertI64S => ops::conversion::f64_convert_i64_s(&mut self.stack)?,
                    Instruction::F64ConvertI64U => ops::conversion::f64_convert_i64_u(&mut self.stack)?,
                    Instruction::F64PromoteF32 => ops::conversion::f64_promote_f32(&mut self.stack)?,
                    Instruction::I32ReinterpretF32 => ops::conversion::i32_reinterpret_f32(&mut self.stack)?,
                    Instruction::I64ReinterpretF64 => ops::conversion::i64_reinterpret_f64(&mut self.stack)?,
                    Instruction::F32ReinterpretI32 => ops::conversion::f32_reinterpret_i32(&mut self.stack)?,
                    Instruction::F64ReinterpretI64 => ops::conversion::f64_reinterpret_i64(&mut self.stack)?,

                    Instruction::I32Extend8S => ops::conversion::i32_extend8_s(&mut self.stack)?,
                    Instruction::I32Extend16S => ops::conversion::i32_extend16_s(&mut self.stack)?,
                    Instruction::I64Extend8S => ops::conversion::i64_extend8_s(&mut self.stack)?,
                    Instruction::I64Extend16S => ops::conversion::i64_extend16_s(&mut self.stack)?,
                    Instruction::I64Extend32S => ops::conversion::i64_extend32_s(&mut self.stack)?,

                    Instruction::I32TruncSatF32S => ops::conversion::i32_trunc_sat_f32_s(&mut self.stack)?,
                    Instruction::I32TruncSatF32U => ops::conversion::i32_trunc_sat_f32_u(&mut self.stack)?,
                    Instruction::I32TruncSatF64S => ops::conversion::i32_trunc_sat_f64_s(&mut self.stack)?,
                    Instruction::I32TruncSatF64U => ops::conversion::i32_trunc_sat_f64_u(&mut self.stack)?,
                    Instruction::I64TruncSatF32S => ops::conversion::i64_trunc_sat_f32_s(&mut self.stack)?,
                    Instruction::I64TruncSatF32U => ops::conversion::i64_trunc_sat_f32_u(&mut self.stack)?,
                    Instruction::I64TruncSatF64S => ops::conversion::i64_trunc_sat_f64_s(&mut self.stack)?,
                    Instruction::I64TruncSatF64U => ops::conversion::i64_trunc_sat_f64_u(&mut self.stack)?,
                }

                ip += 1;
            }
        }
        Ok(())
    }

}

// Free functions rather than methods so a memory borrow can coexist
// with the mutable stack borrow at the op call sites.

fn default_memory(store: &Store, instance: usize) -> Result<&super::Memory, Trap> {
    let addr = store
        .instance(instance)?
        .default_memory()
        .ok_or(Trap::MemoryOutOfBounds)?;
    store.memory(addr)
}

fn default_memory_mut(store: &mut Store, instance: usize) -> Result<&mut super::Memory, Trap> {
    let addr = store
        .instance(instance)?
        .default_memory()
        .ok_or(Trap::MemoryOutOfBounds)?;
    store.memory_mut(addr)
}

fn jump_target(code: &FunctionCode, ip: usize) -> Result<usize, Trap> {
    code.jumps.end_of(ip).ok_or_else(|| Trap::TypeMismatch {
        expected: "resolved jump target".to_string(),
        actual: format!("instruction {ip}"),
    })
}
