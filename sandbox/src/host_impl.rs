//! Per-runtime mutable state held in the Wasmtime Store.
//!
//! `HostState` combines the backend (storage, address codec, querier), the
//! injected crypto verifier, the gas state of the current call, the
//! read-only flag, the guest debug log and the store limits into a single
//! struct that lives inside `Store<HostState>` for the runtime's lifetime.

use std::sync::Arc;

use tracing::warn;
use wasmtime::{StoreLimits, StoreLimitsBuilder};

use cwvm_hostapi::{Backend, CryptoVerifier, GasState, HostConfig, HostError};

/// Mutable host state held in the Wasmtime `Store`.
///
/// Lives as long as the runtime. Gas, the read-only flag and open
/// iterators are reset around every entry-point call.
pub struct HostState {
    /// Storage, address codec and querier.
    pub backend: Backend,
    /// Signature verification capability.
    pub crypto: Arc<dyn CryptoVerifier>,
    /// ABI limits and import costs.
    pub config: HostConfig,
    /// Gas of the entry-point call in progress.
    pub gas: GasState,
    /// Set while `query` runs; storage writes are rejected.
    pub read_only: bool,
    /// Guest `debug` output, oldest first.
    pub logs: Vec<String>,
    /// Linear memory cap enforced through `Store::limiter`.
    pub limits: StoreLimits,
}

impl HostState {
    /// Create the host state for a runtime.
    pub fn new(
        backend: Backend,
        crypto: Arc<dyn CryptoVerifier>,
        config: HostConfig,
        max_memory_bytes: usize,
    ) -> Self {
        Self {
            backend,
            crypto,
            config,
            gas: GasState::new(0),
            read_only: false,
            logs: Vec::new(),
            limits: StoreLimitsBuilder::new()
                .memory_size(max_memory_bytes)
                .instances(1)
                .build(),
        }
    }

    /// Reset per-call state before an entry point runs.
    pub fn begin_call(&mut self, gas_limit: u64, read_only: bool) {
        self.gas = GasState::new(gas_limit);
        self.read_only = read_only;
    }

    /// Clear per-call state after an entry point returns or traps.
    pub fn end_call(&mut self) {
        self.read_only = false;
        if let Some(scanner) = self.backend.storage.as_range_scan() {
            scanner.close_iterators();
        }
    }

    /// Charge `base` plus the per-byte cost of `bytes`.
    pub fn charge(&mut self, base: u64, bytes: usize) -> Result<(), HostError> {
        let per_byte = self.config.gas_costs.per_byte;
        self.gas.charge_with_bytes(base, per_byte, bytes)
    }

    fn ensure_writable(&self) -> Result<(), HostError> {
        if self.read_only {
            return Err(HostError::ReadOnlyContext);
        }
        Ok(())
    }

    /// Read a value from storage.
    pub fn storage_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        self.backend.storage.get(key)
    }

    /// Write to storage. Enforces the read-only flag and key/value limits.
    pub fn storage_set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HostError> {
        self.ensure_writable()?;
        if key.len() > self.config.max_key_len {
            return Err(HostError::KeyTooLong {
                length: key.len(),
                max: self.config.max_key_len,
            });
        }
        if value.len() > self.config.max_value_len {
            return Err(HostError::ValueTooLong {
                length: value.len(),
                max: self.config.max_value_len,
            });
        }
        self.backend.storage.set(key, value)
    }

    /// Delete a key from storage. Deleting an absent key succeeds.
    pub fn storage_remove(&mut self, key: &[u8]) -> Result<(), HostError> {
        self.ensure_writable()?;
        if key.len() > self.config.max_key_len {
            return Err(HostError::KeyTooLong {
                length: key.len(),
                max: self.config.max_key_len,
            });
        }
        self.backend.storage.remove(key)
    }

    /// Record a guest debug line. Oversized lines are truncated; once the
    /// buffer is full further lines are dropped.
    pub fn add_log(&mut self, mut message: String) {
        if self.logs.len() >= self.config.max_debug_lines {
            warn!(limit = self.config.max_debug_lines, "debug log full, dropping line");
            return;
        }
        let max = self.config.max_debug_line_len;
        if message.len() > max {
            let mut end = max;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        self.logs.push(message);
    }
}
