//! Host-side error types for the cwvm contract host.
//!
//! `HostError` is the error type returned by every backend capability and by
//! the import-function layer before it is lifted into the sandbox's `VmError`.
//! Every variant maps onto one [`ErrorClass`] so callers can tell a rejected
//! argument from a malformed crypto input from a fatal condition.

use thiserror::Error;

/// Coarse classification of host errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The guest passed an argument the ABI does not accept.
    Validation,
    /// A crypto input had the wrong shape (length, batch arity).
    Crypto,
    /// The invocation cannot continue (gas exhausted).
    Fatal,
}

/// Errors for malformed crypto inputs.
///
/// A signature that parses but does not verify is *not* an error; the
/// verifier reports it as `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid hash format: expected 32 bytes, got {0}")]
    InvalidHashFormat(usize),

    #[error("invalid signature format: expected 64 bytes, got {0}")]
    InvalidSignatureFormat(usize),

    #[error("invalid public key format: unexpected length {0}")]
    InvalidPubkeyFormat(usize),

    #[error("invalid recovery parameter {0}")]
    InvalidRecoveryParam(u32),

    #[error("batch length mismatch: {messages} messages, {signatures} signatures, {public_keys} public keys")]
    BatchLengthMismatch {
        messages: usize,
        signatures: usize,
        public_keys: usize,
    },

    #[error("public key recovery failed: {0}")]
    RecoveryFailed(String),
}

/// Host-side error type returned by backend capabilities and import handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("empty address")]
    EmptyAddress,

    #[error("address too short: {0}")]
    AddressTooShort(String),

    #[error("address too long: {length} bytes exceeds maximum of {max}")]
    AddressTooLong { length: usize, max: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid canonical address length: expected {expected}, got {got}")]
    InvalidCanonicalLength { expected: usize, got: usize },

    #[error("empty storage key")]
    EmptyKey,

    #[error("key too long: {length} bytes exceeds maximum of {max}")]
    KeyTooLong { length: usize, max: usize },

    #[error("value too long: {length} bytes exceeds maximum of {max}")]
    ValueTooLong { length: usize, max: usize },

    #[error("region too small: need {needed} bytes, capacity is {capacity}")]
    RegionTooSmall { needed: usize, capacity: usize },

    #[error("invalid iteration order {0}")]
    InvalidOrder(u32),

    #[error("iterator {0} not found")]
    IteratorNotFound(u32),

    #[error("iterator ids exhausted")]
    IteratorsExhausted,

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("write access denied in read-only context")]
    ReadOnlyContext,

    #[error("storage backend does not support range scans")]
    ScanUnsupported,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("out of gas: limit {limit}, requested {requested} with {used} used")]
    OutOfGas { limit: u64, used: u64, requested: u64 },
}

impl HostError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Crypto(_) => ErrorClass::Crypto,
            Self::OutOfGas { .. } => ErrorClass::Fatal,
            _ => ErrorClass::Validation,
        }
    }

    /// Returns true if the error can never be recovered inside the runtime.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Convenience result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;
