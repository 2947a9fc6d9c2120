//! Runtime configuration.

use cwvm_hostapi::HostConfig;

/// Configuration for a contract runtime.
///
/// Controls memory limits, instruction fuel, gas, and the host ABI limits.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel limit per entry-point call (instruction metering).
    /// Prevents infinite loops in pure guest compute.
    pub fuel_limit: u64,

    /// Host gas limit per entry-point call, charged by import functions.
    pub gas_limit: u64,

    /// ABI limits, address codec parameters and import costs.
    pub host: HostConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256,       // 16 MiB
            fuel_limit: 100_000_000,
            gas_limit: 10_000_000,
            host: HostConfig::default(),
        }
    }
}

impl VmConfig {
    /// Maximum linear memory in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * 65536
    }
}
