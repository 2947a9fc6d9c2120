//! `cwvm-sandbox` — Wasmtime-based host runtime for CosmWasm-style contracts.
//!
//! This crate loads, validates, and runs a contract module inside a
//! Wasmtime sandbox, serving its `env` imports from a
//! [`cwvm_hostapi::Backend`]. It enforces:
//!
//! - **Determinism:** No SIMD, no threads, NaN canonicalization
//! - **Fuel metering:** Instruction-level metering to prevent infinite loops
//! - **Gas metering:** Import costs charged via `GasState`
//! - **Memory limits:** Bounded linear memory growth
//! - **Import whitelisting:** Only known `env` functions allowed, no WASI
//! - **ABI validation:** Required exports checked before instantiation
//! - **Region checks:** Every pointer the guest passes is bounds-checked
//!
//! The primary entry point is [`HostRuntime`].

pub mod error;
pub mod config;
pub mod memory;
pub mod host_impl;
pub mod context;
pub mod imports;
pub mod validation;
pub mod linker;
pub mod runtime;
pub mod testing;

pub use error::VmError;
pub use config::VmConfig;
pub use context::{GuestEnv, WasmEnv};
pub use host_impl::HostState;
pub use memory::{GuestMemory, Region};
pub use runtime::HostRuntime;
