//! `cwvm-hostapi` — backend capabilities and host-side types for the cwvm
//! contract host.
//!
//! This crate has no wasm dependency. It provides what the sandbox delegates
//! to when a guest calls an import:
//!
//! - `Storage` / `RangeScan` traits and the in-memory `MemoryStorage`
//! - `AddressCodec` and the bech32 `Bech32Codec`
//! - `Querier` and the handler-table `BasicQuerier`
//! - `CryptoVerifier` and the `k256`/`ed25519-dalek` backed `NativeVerifier`
//! - `GasState` / `GasCosts` — per-call gas accounting
//! - `HostConfig` — ABI limits and codec parameters
//! - JSON types passed to entry points (`Env`, `MessageInfo`, ...)
//! - `HostError` / `CryptoError`

pub mod error;
pub mod types;
pub mod gas_meter;
pub mod storage;
pub mod mem_store;
pub mod address;
pub mod querier;
pub mod crypto;
pub mod env;
pub mod backend;

// Re-export commonly used types at the crate root.
pub use error::{CryptoError, ErrorClass, HostError, HostResult};
pub use types::HostConfig;
pub use gas_meter::{GasCosts, GasState};
pub use storage::{Order, RangeScan, Record, Storage};
pub use mem_store::MemoryStorage;
pub use address::{AddressCodec, Bech32Codec};
pub use querier::{BankQuerier, BasicQuerier, Querier, QueryHandler, QueryKind, QueryRequest};
pub use crypto::{CryptoVerifier, NativeVerifier};
pub use env::{
    Binary, BlockInfo, Coin, ContractInfo, ContractResult, Env, MessageInfo, QueryResponse,
    SystemResult, TransactionInfo, Uint128, Uint64,
};
pub use backend::Backend;
