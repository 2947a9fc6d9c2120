//! The environment an import function runs in.
//!
//! `GuestEnv` extends [`GuestMemory`] with access to the [`HostState`]. The
//! import logic in `imports.rs` is written against this trait, so the same
//! code runs inside a wasmtime host function (`WasmEnv`) and in unit tests
//! (`testing::MockEnv`).

use wasmtime::{AsContextMut, Caller, Extern, Instance, Memory, Store, StoreContextMut, TypedFunc};

use crate::error::VmError;
use crate::host_impl::HostState;
use crate::memory::GuestMemory;
use crate::runtime::handle_trap;

/// Guest memory plus host state.
pub trait GuestEnv: GuestMemory {
    fn state(&self) -> &HostState;

    fn state_mut(&mut self) -> &mut HostState;
}

/// A wasmtime store borrowed together with the guest's memory and allocator
/// exports.
pub struct WasmEnv<'a> {
    store: StoreContextMut<'a, HostState>,
    memory: Memory,
    allocate: TypedFunc<u32, u32>,
    deallocate: TypedFunc<u32, ()>,
}

impl<'a> WasmEnv<'a> {
    /// Build the environment of a host function call.
    pub fn from_caller(caller: &'a mut Caller<'_, HostState>) -> Result<Self, VmError> {
        let memory = caller
            .get_export("memory")
            .and_then(Extern::into_memory)
            .ok_or_else(|| VmError::MissingExport("memory".into()))?;
        let allocate = caller
            .get_export("allocate")
            .and_then(Extern::into_func)
            .ok_or_else(|| VmError::MissingExport("allocate".into()))?
            .typed::<u32, u32>(&*caller)?;
        let deallocate = caller
            .get_export("deallocate")
            .and_then(Extern::into_func)
            .ok_or_else(|| VmError::MissingExport("deallocate".into()))?
            .typed::<u32, ()>(&*caller)?;
        Ok(Self {
            store: caller.as_context_mut(),
            memory,
            allocate,
            deallocate,
        })
    }

    /// Build an environment over a store and instance owned by the runtime.
    pub fn from_instance(
        store: &'a mut Store<HostState>,
        instance: &Instance,
    ) -> Result<Self, VmError> {
        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| VmError::MissingExport("memory".into()))?;
        let allocate = instance.get_typed_func::<u32, u32>(&mut *store, "allocate")?;
        let deallocate = instance.get_typed_func::<u32, ()>(&mut *store, "deallocate")?;
        Ok(Self {
            store: store.as_context_mut(),
            memory,
            allocate,
            deallocate,
        })
    }
}

impl GuestMemory for WasmEnv<'_> {
    fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }

    fn allocate(&mut self, size: u32) -> Result<u32, VmError> {
        handle_trap(self.allocate.call(&mut self.store, size))
    }

    fn deallocate(&mut self, ptr: u32) -> Result<(), VmError> {
        handle_trap(self.deallocate.call(&mut self.store, ptr))
    }
}

impl GuestEnv for WasmEnv<'_> {
    fn state(&self) -> &HostState {
        self.store.data()
    }

    fn state_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }
}
