//! Sandbox error types.

use cwvm_hostapi::{CryptoError, ErrorClass, HostError};

/// Top-level error type for the sandbox crate.
///
/// Any error raised inside an import traps the guest and surfaces here,
/// aborting the whole entry-point call.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// A backend capability or argument check rejected the call.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// The guest called `abort`.
    #[error("aborted: {message} at {file}:{line}:{column}")]
    Aborted {
        message: String,
        file: String,
        line: u32,
        column: u32,
    },

    /// A region pointer argument was zero where a region is required.
    #[error("null region pointer")]
    NullRegion,

    /// A region header or its data lies outside guest memory.
    #[error("region out of bounds: {0}")]
    RegionOutOfBounds(String),

    /// A region header violates `length <= capacity`.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Module validation failed (missing exports, bad imports, etc.).
    #[error("validation error: {0}")]
    Validation(String),

    /// The instance lacks an export the call needs.
    #[error("missing export: {0}")]
    MissingExport(String),

    /// JSON or UTF-8 conversion of an argument or result failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Fuel exhausted during execution.
    #[error("fuel exhausted (instruction limit)")]
    FuelExhausted,

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),

    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),
}

impl From<CryptoError> for VmError {
    fn from(err: CryptoError) -> Self {
        Self::Host(HostError::Crypto(err))
    }
}

impl From<serde_json::Error> for VmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl VmError {
    /// Classify this error. Everything that is not a rejected host argument
    /// or a malformed crypto input is fatal.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Host(e) => e.class(),
            Self::Validation(_) => ErrorClass::Validation,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    /// The host error behind this error, if any.
    pub fn host_error(&self) -> Option<&HostError> {
        match self {
            Self::Host(e) => Some(e),
            _ => None,
        }
    }
}
