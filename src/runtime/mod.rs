//! WebAssembly runtime implementation
//!
//! This module provides the execution engine: the value model, the
//! unified value/label/frame stack, the store, module instances, and the
//! instruction interpreter, together with the two-tier error taxonomy of
//! guest traps and embedder errors.

pub mod executor;
pub mod imports;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod table;
pub mod test_utils;
pub mod value;

pub use imports::{HostContext, HostFn, HostModule};
pub use instance::{ExternVal, ModuleInstance};
pub use memory::Memory;
pub use store::{
    DataAddr, ElemAddr, ExternAddr, FuncAddr, FunctionInstance, GlobalAddr, GlobalInstance, MemAddr, Store, TableAddr,
};
pub use table::Table;
pub use value::Value;

/// A guest-caused abort.
///
/// Traps unwind to the invocation boundary and are reported to the
/// embedder as a failure result; the interpreter never catches one
/// internally, and every enclosing instruction forwards it unchanged.
/// Each variant carries a stable numeric code ([`Trap::code`]) that is
/// part of the embedding ABI.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("out of bounds table access")]
    TableOutOfBounds,
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("undefined element")]
    UndefinedElement,
    #[error("uninitialized element {0}")]
    UninitializedElement(u32),
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("all gas consumed")]
    OutOfGas,
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    /// Clean exit requested by a host function. Distinguished from every
    /// real trap by variant, not by numeric coincidence; see
    /// [`Trap::is_termination`].
    #[error("terminated")]
    Terminated,
    #[error("host function error: {0}")]
    Host(String),
}

impl Trap {
    /// Stable result code for the embedding ABI.
    ///
    /// `0x00` is reserved for success. `0x01` is the clean-exit sentinel;
    /// everything else is a failure.
    pub fn code(&self) -> u32 {
        match self {
            Trap::Terminated => 0x01,
            Trap::Unreachable => 0x02,
            Trap::MemoryOutOfBounds => 0x03,
            Trap::TableOutOfBounds => 0x04,
            Trap::DivideByZero => 0x05,
            Trap::IntegerOverflow => 0x06,
            Trap::InvalidConversion => 0x07,
            Trap::UndefinedElement => 0x08,
            Trap::UninitializedElement(_) => 0x09,
            Trap::IndirectCallTypeMismatch => 0x0A,
            Trap::CallStackExhausted => 0x0B,
            Trap::OutOfGas => 0x0C,
            Trap::TypeMismatch { .. } => 0x0D,
            Trap::Host(_) => 0x12,
        }
    }

    /// Whether this "trap" is the clean-exit sentinel rather than a
    /// failure. Embedders should branch on this, never on `code() == 1`.
    pub fn is_termination(&self) -> bool {
        matches!(self, Trap::Terminated)
    }

    /// Underflow or mis-typed pop on the value stack. Validation makes
    /// this unreachable for conforming streams; it surfaces only when an
    /// unvalidated stream is executed directly.
    pub(crate) fn stack_underflow() -> Trap {
        Trap::TypeMismatch {
            expected: "value".to_string(),
            actual: "empty stack".to_string(),
        }
    }
}

/// Invalid embedder usage, caught at the API boundary before any guest
/// code runs. These never unwind through guest frames.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    /// A trap surfaced through the API (guest failure during invoke,
    /// instantiation, or a start function).
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error("function not found: {0}")]
    FuncNotFound(String),
    #[error("wrong instance address: {0}")]
    WrongInstanceAddress(String),
    #[error("argument type mismatch: expected {expected}, got {actual}")]
    ArgumentTypeMismatch { expected: String, actual: String },
    #[error("incompatible import type for {module}.{name}: expected {expected}, got {actual}")]
    IncompatibleImportType {
        module: String,
        name: String,
        expected: String,
        actual: String,
    },
    #[error("unknown import: {module}.{name}")]
    UnknownImport { module: String, name: String },
    #[error("invalid VM stage: {op} requires {requires}")]
    InvalidStage { op: &'static str, requires: &'static str },
    #[error("module name already registered: {0}")]
    DuplicateModuleName(String),
    #[error("validation failed: {0}")]
    Validation(#[from] crate::instruction::ControlFlowError),
}

impl VmError {
    /// Stable result code for the embedding ABI. Trap codes pass through;
    /// API errors occupy their own range.
    pub fn code(&self) -> u32 {
        match self {
            VmError::Trap(trap) => trap.code(),
            VmError::ArgumentTypeMismatch { .. } => 0x0D,
            VmError::FuncNotFound(_) => 0x0E,
            VmError::WrongInstanceAddress(_) => 0x0F,
            VmError::IncompatibleImportType { .. } => 0x10,
            VmError::UnknownImport { .. } => 0x10,
            VmError::InvalidStage { .. } => 0x11,
            VmError::DuplicateModuleName(_) => 0x11,
            VmError::Validation(_) => 0x13,
        }
    }
}
