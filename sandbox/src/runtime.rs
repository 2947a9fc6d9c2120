//! Contract runtime — Wasmtime engine, module loading, and entry-point calls.
//!
//! `HostRuntime` loads a WASM contract, validates its ABI, links the `env`
//! imports and keeps one instance alive for its whole lifetime. Each
//! entry-point call:
//!
//! 1. Resets gas, fuel and the read-only flag
//! 2. Serializes `Env`, `MessageInfo` and the message to JSON
//! 3. Copies them into guest regions obtained from `allocate`
//! 4. Invokes the export and returns the result region
//! 5. Closes any iterators the call left open

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use wasmtime::{Config, Engine, Instance, Linker, Memory, Module, Store, Trap};

use cwvm_hostapi::{Backend, CryptoVerifier, Env, MessageInfo, NativeVerifier};

use crate::config::VmConfig;
use crate::context::WasmEnv;
use crate::error::VmError;
use crate::host_impl::HostState;
use crate::linker::register_host_functions;
use crate::memory::{GuestMemory, Region};
use crate::validation::validate_module;

/// A loaded contract instance and the host state its imports act on.
///
/// Storage, logs and guest memory persist across entry-point calls; gas,
/// fuel and iterators are per call.
pub struct HostRuntime {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
    config: VmConfig,
}

impl HostRuntime {
    /// Create a runtime from WASM (or WAT) bytecode.
    ///
    /// Validates the module's exports and imports before instantiating.
    pub fn new(
        wasm_bytes: &[u8],
        backend: Backend,
        crypto: Arc<dyn CryptoVerifier>,
        config: VmConfig,
    ) -> Result<Self, VmError> {
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, wasm_bytes)?;
        Self::from_module(&engine, &module, backend, crypto, config)
    }

    /// Load from a `.wasm` file path.
    pub fn from_file(
        path: &Path,
        backend: Backend,
        crypto: Arc<dyn CryptoVerifier>,
        config: VmConfig,
    ) -> Result<Self, VmError> {
        let engine = create_engine(&config)?;
        let module = Module::from_file(&engine, path)?;
        Self::from_module(&engine, &module, backend, crypto, config)
    }

    /// A runtime over `MemoryStorage`, the bech32 codec of `config.host`,
    /// a bank-only querier and `NativeVerifier`.
    pub fn in_memory(wasm_bytes: &[u8], config: VmConfig) -> Result<Self, VmError> {
        let backend = Backend::in_memory(&config.host)?;
        Self::new(wasm_bytes, backend, Arc::new(NativeVerifier), config)
    }

    fn from_module(
        engine: &Engine,
        module: &Module,
        backend: Backend,
        crypto: Arc<dyn CryptoVerifier>,
        config: VmConfig,
    ) -> Result<Self, VmError> {
        validate_module(module)?;

        let host_state = HostState::new(
            backend,
            crypto,
            config.host.clone(),
            config.max_memory_bytes(),
        );
        let mut store = Store::new(engine, host_state);
        store.limiter(|state| &mut state.limits);
        // start functions and data initialisation run under the call budget
        store.set_fuel(config.fuel_limit)?;

        let mut linker = Linker::new(engine);
        register_host_functions(&mut linker)?;
        let instance = handle_trap(linker.instantiate(&mut store, module))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| VmError::MissingExport("memory".into()))?;

        Ok(Self {
            store,
            instance,
            memory,
            config,
        })
    }

    // ── Entry points ──

    /// Call `instantiate(env, info, msg)`.
    pub fn instantiate<M: Serialize + ?Sized>(
        &mut self,
        env: &Env,
        info: &MessageInfo,
        msg: &M,
    ) -> Result<Region, VmError> {
        let args = [to_json(env)?, to_json(info)?, to_json(msg)?];
        self.call_entry("instantiate", &args, false)
    }

    /// Call `execute(env, info, msg)`.
    pub fn execute<M: Serialize + ?Sized>(
        &mut self,
        env: &Env,
        info: &MessageInfo,
        msg: &M,
    ) -> Result<Region, VmError> {
        let args = [to_json(env)?, to_json(info)?, to_json(msg)?];
        self.call_entry("execute", &args, false)
    }

    /// Call `query(env, msg)`. Storage is read-only for the duration.
    pub fn query<M: Serialize + ?Sized>(&mut self, env: &Env, msg: &M) -> Result<Region, VmError> {
        let args = [to_json(env)?, to_json(msg)?];
        self.call_entry("query", &args, true)
    }

    /// Call `migrate`. A two-parameter export receives `(env, msg)` and
    /// `info` is not passed.
    pub fn migrate<M: Serialize + ?Sized>(
        &mut self,
        env: &Env,
        info: &MessageInfo,
        msg: &M,
    ) -> Result<Region, VmError> {
        let func = self
            .instance
            .get_func(&mut self.store, "migrate")
            .ok_or_else(|| VmError::MissingExport("migrate".into()))?;
        let arity = func.ty(&self.store).params().len();

        let args = if arity == 2 {
            vec![to_json(env)?, to_json(msg)?]
        } else {
            vec![to_json(env)?, to_json(info)?, to_json(msg)?]
        };
        self.call_entry("migrate", &args, false)
    }

    fn call_entry(
        &mut self,
        name: &str,
        args: &[Vec<u8>],
        read_only: bool,
    ) -> Result<Region, VmError> {
        let gas_limit = self.config.gas_limit;
        self.store.data_mut().begin_call(gas_limit, read_only);

        let result = self.invoke(name, args);

        self.store.data_mut().end_call();
        let gas_used = self.store.data().gas.used();
        match &result {
            Ok(region) => info!(entry = name, gas_used, result = region.ptr(), "entry point returned"),
            Err(e) => warn!(entry = name, gas_used, error = %e, "entry point failed"),
        }
        result
    }

    fn invoke(&mut self, name: &str, args: &[Vec<u8>]) -> Result<Region, VmError> {
        self.store.set_fuel(self.config.fuel_limit)?;

        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| VmError::MissingExport(name.into()))?;

        let mut ptrs = Vec::with_capacity(args.len());
        {
            let mut env = WasmEnv::from_instance(&mut self.store, &self.instance)?;
            for arg in args {
                ptrs.push(Region::allocate_with(&mut env, arg)?.ptr());
            }
        }

        let result_ptr = match *ptrs.as_slice() {
            [a, b] => {
                let typed = func.typed::<(u32, u32), u32>(&self.store)?;
                handle_trap(typed.call(&mut self.store, (a, b)))?
            }
            [a, b, c] => {
                let typed = func.typed::<(u32, u32, u32), u32>(&self.store)?;
                handle_trap(typed.call(&mut self.store, (a, b, c)))?
            }
            _ => {
                return Err(VmError::Validation(format!(
                    "entry point '{}' called with {} arguments",
                    name,
                    ptrs.len()
                )));
            }
        };
        Region::new(result_ptr)
    }

    // ── Result access ──

    /// Copy the contents of a region out of guest memory.
    pub fn read_region(&self, region: Region) -> Result<Vec<u8>, VmError> {
        region.read(self.memory.data(&self.store))
    }

    /// Deserialize the JSON contents of a region.
    pub fn read_json<T: DeserializeOwned>(&self, region: Region) -> Result<T, VmError> {
        region.read_json(self.memory.data(&self.store))
    }

    /// Hand a region back to the guest's `deallocate`.
    pub fn deallocate(&mut self, region: Region) -> Result<(), VmError> {
        let mut env = WasmEnv::from_instance(&mut self.store, &self.instance)?;
        env.deallocate(region.ptr())
    }

    /// Read a result region as JSON, then release it.
    pub fn take_json<T: DeserializeOwned>(&mut self, region: Region) -> Result<T, VmError> {
        let value = self.read_json(region)?;
        self.deallocate(region)?;
        Ok(value)
    }

    // ── State access ──

    /// Guest `debug` output collected so far.
    pub fn logs(&self) -> &[String] {
        &self.store.data().logs
    }

    /// Drain the collected guest `debug` output.
    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.store.data_mut().logs)
    }

    /// Gas charged by imports during the last entry-point call.
    pub fn gas_used(&self) -> u64 {
        self.store.data().gas.used()
    }

    /// Fuel left over from the last entry-point call.
    pub fn fuel_remaining(&self) -> Result<u64, VmError> {
        Ok(self.store.get_fuel()?)
    }

    pub fn backend(&self) -> &Backend {
        &self.store.data().backend
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        &mut self.store.data_mut().backend
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, VmError> {
    Ok(serde_json::to_vec(value)?)
}

/// Create a Wasmtime engine with deterministic configuration.
fn create_engine(config: &VmConfig) -> Result<Engine, VmError> {
    let mut wasm_config = Config::new();

    // Fuel metering — prevents infinite loops
    wasm_config.consume_fuel(true);

    // Determinism enforcement
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    // Memory limits
    let max_bytes = config.max_memory_bytes() as u64;
    wasm_config.memory_guaranteed_dense_image_size(max_bytes.min(16 * 1024 * 1024));

    Ok(Engine::new(&wasm_config)?)
}

/// Convert the result of a guest call into a `VmError`.
///
/// A `VmError` raised by an import comes back unchanged.
/// Fuel exhaustion → `VmError::FuelExhausted`
/// Other traps → `VmError::GuestTrapped`
pub(crate) fn handle_trap<R>(result: anyhow::Result<R>) -> Result<R, VmError> {
    result.map_err(|err| match err.downcast::<VmError>() {
        Ok(vm_error) => vm_error,
        Err(err) => {
            if matches!(err.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
                VmError::FuelExhausted
            } else {
                VmError::GuestTrapped(format!("{:#}", err))
            }
        }
    })
}
