//! Host-side configuration for the cwvm contract host.
//!
//! `HostConfig` bundles the ABI limits and address-codec parameters that the
//! import layer enforces. Defaults match the CosmWasm 1.x host limits.

use crate::gas_meter::GasCosts;

/// Maximum length of a storage key in bytes (64 KiB).
pub const MAX_LENGTH_DB_KEY: usize = 64 * 1024;

/// Maximum length of a storage value in bytes (128 KiB).
pub const MAX_LENGTH_DB_VALUE: usize = 128 * 1024;

/// Maximum length of a human-readable address in bytes.
pub const MAX_LENGTH_HUMAN_ADDRESS: usize = 256;

/// Maximum length of a raw chain query request in bytes.
pub const MAX_LENGTH_QUERY_CHAIN_REQUEST: usize = 64 * 1024;

/// Maximum length of a message passed to `ed25519_verify`.
pub const MAX_LENGTH_ED25519_MESSAGE: usize = 128 * 1024;

/// Maximum length of one argument region of `ed25519_batch_verify`.
pub const MAX_LENGTH_ED25519_BATCH: usize = 512 * 1024;

/// Maximum length of an `abort`/`debug` message.
pub const MAX_LENGTH_DEBUG: usize = 2 * 1024;

/// Default bech32 human-readable prefix.
pub const DEFAULT_BECH32_PREFIX: &str = "terra";

/// Default canonical address length (20-byte account addresses).
pub const DEFAULT_CANONICAL_LENGTH: usize = 20;

/// Configuration of the host side of the contract ABI.
///
/// The sandbox enforces these limits; the guest cannot exceed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Bech32 human-readable prefix used by the address codec.
    pub bech32_prefix: String,
    /// Fixed length of canonical addresses.
    pub canonical_address_len: usize,
    /// Maximum length of a storage key.
    pub max_key_len: usize,
    /// Maximum length of a storage value.
    pub max_value_len: usize,
    /// Maximum length of a human-readable address.
    pub max_human_address_len: usize,
    /// Maximum length of a chain query request.
    pub max_query_len: usize,
    /// Maximum number of debug lines kept per runtime.
    pub max_debug_lines: usize,
    /// Maximum length of a single debug line; longer lines are truncated.
    pub max_debug_line_len: usize,
    /// Gas costs charged by import functions.
    pub gas_costs: GasCosts,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bech32_prefix: DEFAULT_BECH32_PREFIX.to_string(),
            canonical_address_len: DEFAULT_CANONICAL_LENGTH,
            max_key_len: MAX_LENGTH_DB_KEY,
            max_value_len: MAX_LENGTH_DB_VALUE,
            max_human_address_len: MAX_LENGTH_HUMAN_ADDRESS,
            max_query_len: MAX_LENGTH_QUERY_CHAIN_REQUEST,
            max_debug_lines: 256,
            max_debug_line_len: MAX_LENGTH_DEBUG,
            gas_costs: GasCosts::default(),
        }
    }
}

impl HostConfig {
    /// Create a config with a custom bech32 prefix and default limits.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            bech32_prefix: prefix.into(),
            ..Self::default()
        }
    }
}
