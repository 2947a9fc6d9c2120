//! Host-side gas state for the cwvm contract host.
//!
//! `GasState` is threaded through every import call. It only tracks a limit
//! and the amount used; the per-import costs live in [`GasCosts`] so an
//! embedder can swap in its own schedule.

use crate::error::HostError;

/// Gas charged per byte moved across the host/guest boundary.
pub const G_PER_BYTE: u64 = 1;

/// Flat per-import costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasCosts {
    pub db_read: u64,
    pub db_write: u64,
    pub db_remove: u64,
    pub db_scan: u64,
    pub db_next: u64,
    pub addr_canonicalize: u64,
    pub addr_humanize: u64,
    pub addr_validate: u64,
    pub secp256k1_verify: u64,
    pub secp256k1_recover_pubkey: u64,
    pub ed25519_verify: u64,
    /// Charged once per triple in a batch.
    pub ed25519_batch_verify: u64,
    pub debug: u64,
    pub query_chain: u64,
    /// Added for every byte read from or written to guest memory.
    pub per_byte: u64,
}

impl Default for GasCosts {
    fn default() -> Self {
        Self {
            db_read: 1_000,
            db_write: 2_000,
            db_remove: 1_000,
            db_scan: 1_000,
            db_next: 500,
            addr_canonicalize: 400,
            addr_humanize: 400,
            addr_validate: 500,
            secp256k1_verify: 15_000,
            secp256k1_recover_pubkey: 18_000,
            ed25519_verify: 10_000,
            ed25519_batch_verify: 8_000,
            debug: 100,
            query_chain: 2_000,
            per_byte: G_PER_BYTE,
        }
    }
}

impl GasCosts {
    /// A schedule where every operation is free.
    pub fn free() -> Self {
        Self {
            db_read: 0,
            db_write: 0,
            db_remove: 0,
            db_scan: 0,
            db_next: 0,
            addr_canonicalize: 0,
            addr_humanize: 0,
            addr_validate: 0,
            secp256k1_verify: 0,
            secp256k1_recover_pubkey: 0,
            ed25519_verify: 0,
            ed25519_batch_verify: 0,
            debug: 0,
            query_chain: 0,
            per_byte: 0,
        }
    }
}

/// Gas limit and consumption for one entry-point invocation.
///
/// Consumption is checked before applying, so on error the used count
/// remains unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasState {
    limit: u64,
    used: u64,
}

impl GasState {
    /// Create a new gas state with the given limit.
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Charge gas. Returns `Err(OutOfGas)` if the limit would be exceeded.
    pub fn charge(&mut self, amount: u64) -> Result<(), HostError> {
        let new_used = match self.used.checked_add(amount) {
            Some(v) if v <= self.limit => v,
            _ => {
                return Err(HostError::OutOfGas {
                    limit: self.limit,
                    used: self.used,
                    requested: amount,
                })
            }
        };
        self.used = new_used;
        Ok(())
    }

    /// Charge `base + byte_count * per_byte`.
    pub fn charge_with_bytes(
        &mut self,
        base: u64,
        per_byte: u64,
        byte_count: usize,
    ) -> Result<(), HostError> {
        let byte_cost = (byte_count as u64).saturating_mul(per_byte);
        self.charge(base.saturating_add(byte_cost))
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}
