//! Test helpers: an in-process guest environment.
//!
//! `MockEnv` implements [`GuestEnv`] over a plain `Vec<u8>` with a bump
//! allocator that writes region headers the way a contract's `allocate`
//! export does. Import logic can be driven directly without compiling wasm.

use std::sync::Arc;

use cwvm_hostapi::{
    Backend, BasicQuerier, Bech32Codec, CryptoVerifier, HostConfig, MemoryStorage, NativeVerifier,
};

use crate::context::GuestEnv;
use crate::error::VmError;
use crate::host_impl::HostState;
use crate::memory::{write_bytes, GuestMemory, Region, RegionHeader, REGION_HEADER_LEN};

/// Gas limit a fresh `MockEnv` starts with.
pub const MOCK_GAS_LIMIT: u64 = 1_000_000_000_000;

/// Upper bound on mock memory (64 MiB).
const MOCK_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

fn align8(size: usize) -> usize {
    (size + 7) & !7
}

/// In-process guest memory plus host state.
pub struct MockEnv {
    memory: Vec<u8>,
    heap: usize,
    state: HostState,
}

impl Default for MockEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnv {
    /// Default config, `MemoryStorage`, bech32 `terra` codec, bank querier and
    /// `NativeVerifier`.
    pub fn new() -> Self {
        let config = HostConfig::default();
        let backend = Backend::new(Bech32Codec::default(), MemoryStorage::new(), BasicQuerier::new());
        Self::with_state(HostState::new(backend, Arc::new(NativeVerifier), config, MOCK_MEMORY_LIMIT))
    }

    /// An in-memory backend built from `config`.
    pub fn with_config(config: HostConfig) -> Result<Self, VmError> {
        let backend = Backend::in_memory(&config)?;
        Ok(Self::with_state(HostState::new(
            backend,
            Arc::new(NativeVerifier),
            config,
            MOCK_MEMORY_LIMIT,
        )))
    }

    /// A custom backend and verifier.
    pub fn with_backend(backend: Backend, crypto: Arc<dyn CryptoVerifier>, config: HostConfig) -> Self {
        Self::with_state(HostState::new(backend, crypto, config, MOCK_MEMORY_LIMIT))
    }

    fn with_state(mut state: HostState) -> Self {
        state.begin_call(MOCK_GAS_LIMIT, false);
        Self {
            // the first 8 bytes stay unused so no region sits at pointer 0
            memory: vec![0u8; 8],
            heap: 8,
            state,
        }
    }

    /// Allocate a region of `capacity` bytes and return its header pointer.
    pub fn allocate_region(&mut self, capacity: usize) -> Result<u32, VmError> {
        Ok(Region::allocate(self, capacity)?.ptr())
    }

    /// Allocate a region holding `data` and return its header pointer.
    pub fn write_region(&mut self, data: &[u8]) -> Result<u32, VmError> {
        Ok(Region::allocate_with(self, data)?.ptr())
    }

    /// Read the contents of the region at `ptr`.
    pub fn read_region(&self, ptr: u32) -> Result<Vec<u8>, VmError> {
        Region::new(ptr)?.read(&self.memory)
    }

    pub fn into_state(self) -> HostState {
        self.state
    }
}

impl GuestMemory for MockEnv {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn allocate(&mut self, size: u32) -> Result<u32, VmError> {
        let header_ptr = align8(self.heap);
        let data_ptr = align8(header_ptr + REGION_HEADER_LEN);
        let end = data_ptr + size as usize;
        if end > MOCK_MEMORY_LIMIT {
            return Err(VmError::RegionOutOfBounds(format!(
                "mock allocation of {size} bytes exceeds {MOCK_MEMORY_LIMIT}"
            )));
        }
        if end > self.memory.len() {
            self.memory.resize(end, 0);
        }
        let header = RegionHeader {
            offset: data_ptr as u32,
            capacity: size,
            length: 0,
        };
        write_bytes(&mut self.memory, header_ptr as u32, &header.to_bytes())?;
        self.heap = end;
        Ok(header_ptr as u32)
    }

    fn deallocate(&mut self, _ptr: u32) -> Result<(), VmError> {
        Ok(())
    }
}

impl GuestEnv for MockEnv {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HostState {
        &mut self.state
    }
}
