//! Embedder API
//!
//! The [`Vm`] drives a module through the lifecycle state machine
//!
//! ```text
//! Idle -> Loaded -> Validated -> Instantiated -> (invoke) -> Instantiated
//! ```
//!
//! `invoke` is legal only once the active module is instantiated; it
//! transitions to running for the duration of the call and back on
//! return or trap. A trap leaves the instance intact -- only the stack
//! above the invocation frame is discarded -- but surfaces as an error
//! the caller must observe before the next invoke. Calls in the wrong
//! order are [`VmError`]s caught here, before any guest code runs.
//!
//! A `Vm` is single-threaded and non-reentrant: invocation takes `&mut
//! self`, so a second invocation (from a host function, say) cannot be
//! expressed while one is running. Concurrency across VMs is the
//! embedder's business; each VM exclusively owns its store, instances,
//! and stack.
//!
//! All tunables arrive through [`Config`] at creation time; there is no
//! process-wide state.

use crate::instruction::ControlFlowError;
use crate::module::Module;
use crate::runtime::executor::Executor;
use crate::runtime::imports::HostModule;
use crate::runtime::store::{FuncAddr, FunctionCode, Store};
use crate::runtime::{Trap, Value, VmError};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A WebAssembly proposal the embedder may enable.
///
/// The set is threaded through to the external loader and validator;
/// the execution core itself only varies on
/// [`Proposal::BulkMemoryOperations`] and [`Proposal::ReferenceTypes`]
/// instruction dispatch, which are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proposal {
    Annotations,
    BulkMemoryOperations,
    ExceptionHandling,
    FunctionReferences,
    Memory64,
    ReferenceTypes,
    Simd,
    TailCall,
    Threads,
}

/// A built-in host environment the embedder may request at creation.
///
/// The implementations live outside the execution core (WASI does file
/// and clock I/O); the embedding shell inspects the configured set and
/// registers the matching host module before instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostRegistration {
    Wasi,
}

/// VM configuration, fixed at creation.
#[derive(Debug, Clone)]
pub struct Config {
    proposals: HashSet<Proposal>,
    host_registrations: HashSet<HostRegistration>,
    /// Cap on any memory's page count, clamping declared maxima.
    pub max_memory_pages: u32,
    /// Instruction budget shared by all invocations of this VM;
    /// exhaustion traps with out-of-gas. None = unlimited.
    pub gas_limit: Option<u64>,
    /// Enable the retired-instruction counter.
    pub statistics: bool,
}

impl Default for Config {
    fn default() -> Config {
        let mut proposals = HashSet::new();
        proposals.insert(Proposal::BulkMemoryOperations);
        proposals.insert(Proposal::ReferenceTypes);
        Config {
            proposals,
            host_registrations: HashSet::new(),
            max_memory_pages: crate::runtime::memory::MAX_PAGES,
            gas_limit: None,
            statistics: false,
        }
    }
}

impl Config {
    pub fn add_proposal(&mut self, proposal: Proposal) -> &mut Config {
        self.proposals.insert(proposal);
        self
    }

    pub fn remove_proposal(&mut self, proposal: Proposal) -> &mut Config {
        self.proposals.remove(&proposal);
        self
    }

    pub fn has_proposal(&self, proposal: Proposal) -> bool {
        self.proposals.contains(&proposal)
    }

    pub fn add_host_registration(&mut self, registration: HostRegistration) -> &mut Config {
        self.host_registrations.insert(registration);
        self
    }

    pub fn has_host_registration(&self, registration: HostRegistration) -> bool {
        self.host_registrations.contains(&registration)
    }
}

/// Lifecycle stage of the active (anonymous) module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loaded,
    Validated,
    Instantiated,
}

/// Execution statistics, populated when `Config::statistics` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Instructions retired across all invocations.
    pub instructions: u64,
}

/// A WebAssembly virtual machine: one store, one active module, any
/// number of registered (named) modules.
pub struct Vm {
    config: Config,
    stage: Stage,
    store: Store,
    module: Option<Module>,
    codes: Vec<Rc<FunctionCode>>,
    active_instance: Option<usize>,
    registry: HashMap<String, usize>,
    gas_left: Option<u64>,
    stats: Statistics,
}

impl Vm {
    /// Create a VM with the given configuration.
    pub fn new(config: Config) -> Vm {
        Vm {
            gas_left: config.gas_limit,
            config,
            stage: Stage::Idle,
            store: Store::new(),
            module: None,
            codes: Vec::new(),
            active_instance: None,
            registry: HashMap::new(),
            stats: Statistics::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The store owned by this VM.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Execution statistics so far.
    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Gas remaining, if a limit was configured.
    pub fn gas_left(&self) -> Option<u64> {
        self.gas_left
    }

    /// Accept a decoded module from the loader as the active module.
    ///
    /// Legal from any stage; the previous active module pipeline is
    /// discarded (registered modules are untouched).
    pub fn load(&mut self, module: Module) -> Result<(), VmError> {
        self.module = Some(module);
        self.codes.clear();
        self.active_instance = None;
        self.stage = Stage::Loaded;
        Ok(())
    }

    /// Validate the active module.
    ///
    /// Static type-checking belongs to the external validator; this
    /// step performs the structural pass the interpreter depends on,
    /// resolving every control instruction's jump targets.
    pub fn validate(&mut self) -> Result<(), VmError> {
        if self.stage != Stage::Loaded {
            return Err(VmError::InvalidStage {
                op: "validate",
                requires: "loaded module",
            });
        }
        let module = match &self.module {
            Some(module) => module,
            None => {
                return Err(VmError::InvalidStage {
                    op: "validate",
                    requires: "loaded module",
                })
            }
        };
        self.codes = compile_functions(module)?;
        self.stage = Stage::Validated;
        Ok(())
    }

    /// Instantiate the active module in the store.
    ///
    /// Resolves imports against registered modules, applies active
    /// segments, and runs the start function. On failure (including a
    /// start-function trap) the VM stays validated and no instance is
    /// active.
    pub fn instantiate(&mut self) -> Result<(), VmError> {
        if self.stage != Stage::Validated {
            return Err(VmError::InvalidStage {
                op: "instantiate",
                requires: "validated module",
            });
        }
        let module = match &self.module {
            Some(module) => module,
            None => {
                return Err(VmError::InvalidStage {
                    op: "instantiate",
                    requires: "validated module",
                })
            }
        };
        let (instance_id, start) =
            self.store
                .instantiate(module, &self.codes, &self.registry, self.config.max_memory_pages)?;
        if let Some(start_addr) = start {
            self.run(start_addr, Vec::new())?;
        }
        self.active_instance = Some(instance_id);
        self.stage = Stage::Instantiated;
        Ok(())
    }

    /// Register a module's exports under a namespace, making them
    /// importable by later instantiations. The module is loaded,
    /// validated, and instantiated as one step.
    pub fn register_module(&mut self, name: impl Into<String>, module: Module) -> Result<(), VmError> {
        let name = name.into();
        if self.registry.contains_key(&name) {
            return Err(VmError::DuplicateModuleName(name));
        }
        let codes = compile_functions(&module)?;
        let (instance_id, start) =
            self.store
                .instantiate(&module, &codes, &self.registry, self.config.max_memory_pages)?;
        if let Some(start_addr) = start {
            self.run(start_addr, Vec::new())?;
        }
        self.registry.insert(name, instance_id);
        Ok(())
    }

    /// Register host functions, tables, memories, and globals under the
    /// host module's name.
    pub fn register_host_module(&mut self, host_module: HostModule) -> Result<(), VmError> {
        let name = host_module.name().to_string();
        if self.registry.contains_key(&name) {
            return Err(VmError::DuplicateModuleName(name));
        }
        let instance_id = host_module
            .register(&mut self.store, self.config.max_memory_pages)
            .map_err(VmError::Trap)?;
        self.registry.insert(name, instance_id);
        Ok(())
    }

    /// Invoke an exported function.
    ///
    /// With `module_name` the export is looked up in that registered
    /// module; without, in the active module, which must be
    /// instantiated. Arguments are type-checked here, before any guest
    /// code runs.
    pub fn invoke(&mut self, module_name: Option<&str>, field: &str, args: &[Value]) -> Result<Vec<Value>, VmError> {
        let instance_id = self.resolve_instance(module_name, "invoke")?;
        let addr = self
            .store
            .instance(instance_id)
            .map_err(VmError::Trap)?
            .exported_func(field)
            .ok_or_else(|| VmError::FuncNotFound(field.to_string()))?;

        let func_type = self.store.func(addr).map_err(VmError::Trap)?.func_type();
        if args.len() != func_type.params.len() {
            return Err(VmError::ArgumentTypeMismatch {
                expected: format!("{} arguments", func_type.params.len()),
                actual: format!("{} arguments", args.len()),
            });
        }
        for (arg, param) in args.iter().zip(&func_type.params) {
            if arg.typ() != *param {
                return Err(VmError::ArgumentTypeMismatch {
                    expected: format!("{param:?}"),
                    actual: format!("{:?}", arg.typ()),
                });
            }
        }

        self.run(addr, args.to_vec())
    }

    /// Read an exported global's current value.
    pub fn get_global(&self, module_name: Option<&str>, field: &str) -> Result<Value, VmError> {
        let instance_id = self.resolve_instance(module_name, "get_global")?;
        let addr = self
            .store
            .instance(instance_id)
            .map_err(VmError::Trap)?
            .exported_global(field)
            .ok_or_else(|| VmError::WrongInstanceAddress(field.to_string()))?;
        Ok(self.store.global(addr).map_err(VmError::Trap)?.get())
    }

    fn resolve_instance(&self, module_name: Option<&str>, op: &'static str) -> Result<usize, VmError> {
        match module_name {
            Some(name) => self
                .registry
                .get(name)
                .copied()
                .ok_or_else(|| VmError::WrongInstanceAddress(name.to_string())),
            None => match (self.stage, self.active_instance) {
                (Stage::Instantiated, Some(id)) => Ok(id),
                _ => Err(VmError::InvalidStage {
                    op,
                    requires: "instantiated module",
                }),
            },
        }
    }

    /// Run a function through a fresh executor, carrying the VM's gas
    /// and statistics across the call.
    fn run(&mut self, addr: FuncAddr, args: Vec<Value>) -> Result<Vec<Value>, VmError> {
        let mut executor = Executor::new(&mut self.store, self.gas_left, self.config.statistics);
        let result = executor.invoke(addr, args);
        self.gas_left = executor.gas_left();
        self.stats.instructions += executor.instructions_retired();
        result.map_err(VmError::Trap)
    }
}

/// Compile every local function body: pair it with its type and resolve
/// its jump targets.
fn compile_functions(module: &Module) -> Result<Vec<Rc<FunctionCode>>, VmError> {
    module
        .functions
        .iter()
        .zip(&module.code)
        .enumerate()
        .map(|(index, (&type_idx, body))| {
            let func_type = module
                .types
                .get(type_idx as usize)
                .cloned()
                .ok_or(VmError::Validation(ControlFlowError {
                    at: index,
                    reason: "function type index out of range",
                }))?;
            Ok(Rc::new(FunctionCode::compile(func_type, body)?))
        })
        .collect()
}
