//! A WebAssembly execution engine written in Rust.
//!
//! stave is the execution core of a WebAssembly virtual machine: a
//! stack-machine interpreter that evaluates validated modules against a
//! runtime store, with bit-exact numeric semantics (NaN propagation,
//! signed/unsigned reinterpretation, signed-zero handling) per the
//! [WebAssembly specification](https://webassembly.github.io/spec/core/).
//!
//! Binary decoding and static type-checking are the job of an external
//! loader and validator; stave consumes their output -- a decoded
//! [`module::Module`] carrying a validated instruction stream -- and
//! provides everything from there: the typed value stack, activation
//! frames, the store (functions, tables, memories, globals), host-function
//! registration, and the instruction dispatch loop.
//!
//! # Modules
//!
//! - [`module`] -- Decoded-module data model, the interface the loader produces.
//! - [`instruction`] -- Instruction stream types and jump-target resolution.
//! - [`runtime`] -- Value model, stack, store, instances, and the interpreter.
//! - [`vm`] -- Embedder API: configuration, lifecycle state machine, invocation.
//!
//! # Example
//!
//! Build a one-function module by hand (a loader would normally do this),
//! run it through the VM lifecycle, and call its export:
//!
//! ```
//! use stave::module::{Export, ExportDesc, FunctionBody, FunctionType, Module, ValueType};
//! use stave::instruction::Instruction;
//! use stave::runtime::Value;
//! use stave::vm::{Config, Vm};
//!
//! let mut module = Module::default();
//! module.types.push(FunctionType {
//!     params: vec![ValueType::I32, ValueType::I32],
//!     results: vec![ValueType::I32],
//! });
//! module.functions.push(0);
//! module.code.push(FunctionBody {
//!     locals: vec![],
//!     body: vec![
//!         Instruction::LocalGet { local_idx: 0 },
//!         Instruction::LocalGet { local_idx: 1 },
//!         Instruction::I32Add,
//!         Instruction::End,
//!     ],
//! });
//! module.exports.push(Export {
//!     name: "add".to_string(),
//!     desc: ExportDesc::Function(0),
//! });
//!
//! let mut vm = Vm::new(Config::default());
//! vm.load(module).unwrap();
//! vm.validate().unwrap();
//! vm.instantiate().unwrap();
//! let results = vm.invoke(None, "add", &[Value::from_i32(2), Value::from_i32(3)]).unwrap();
//! assert_eq!(results, vec![Value::from_i32(5)]);
//! ```

pub mod instruction;
pub mod module;
pub mod runtime;
pub mod vm;

/// Crate version, fixed at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
