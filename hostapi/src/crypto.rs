//! Signature verification capability.
//!
//! The import layer runs the shape checks in this module before calling a
//! [`CryptoVerifier`]; a verifier only ever sees correctly sized inputs.
//! Inputs that have the right size but do not decode (a point off the curve,
//! an out-of-range scalar) are reported as a failed verification.

use crate::error::CryptoError;

/// Length of a message hash for secp256k1 operations.
pub const MESSAGE_HASH_LEN: usize = 32;

/// Length of a compact `r ‖ s` signature (both curves).
pub const SIGNATURE_LEN: usize = 64;

/// Length of a compressed secp256k1 public key.
pub const SECP256K1_COMPRESSED_PUBKEY_LEN: usize = 33;

/// Length of an uncompressed secp256k1 public key.
pub const SECP256K1_UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// Length of an ed25519 public key.
pub const ED25519_PUBKEY_LEN: usize = 32;

pub fn check_message_hash(hash: &[u8]) -> Result<(), CryptoError> {
    if hash.len() != MESSAGE_HASH_LEN {
        return Err(CryptoError::InvalidHashFormat(hash.len()));
    }
    Ok(())
}

pub fn check_signature(signature: &[u8]) -> Result<(), CryptoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignatureFormat(signature.len()));
    }
    Ok(())
}

pub fn check_secp256k1_pubkey(pubkey: &[u8]) -> Result<(), CryptoError> {
    match pubkey.len() {
        SECP256K1_COMPRESSED_PUBKEY_LEN | SECP256K1_UNCOMPRESSED_PUBKEY_LEN => Ok(()),
        other => Err(CryptoError::InvalidPubkeyFormat(other)),
    }
}

pub fn check_ed25519_pubkey(pubkey: &[u8]) -> Result<(), CryptoError> {
    if pubkey.len() != ED25519_PUBKEY_LEN {
        return Err(CryptoError::InvalidPubkeyFormat(pubkey.len()));
    }
    Ok(())
}

/// Recovery ids 0..=3 are valid.
pub fn check_recovery_param(param: u32) -> Result<u8, CryptoError> {
    match u8::try_from(param) {
        Ok(p) if p <= 3 => Ok(p),
        _ => Err(CryptoError::InvalidRecoveryParam(param)),
    }
}

/// Batch arguments must have equal lengths; no broadcasting.
pub fn check_batch_lengths(
    messages: &[Vec<u8>],
    signatures: &[Vec<u8>],
    public_keys: &[Vec<u8>],
) -> Result<(), CryptoError> {
    if messages.len() != signatures.len() || signatures.len() != public_keys.len() {
        return Err(CryptoError::BatchLengthMismatch {
            messages: messages.len(),
            signatures: signatures.len(),
            public_keys: public_keys.len(),
        });
    }
    Ok(())
}

/// Signature math used by the crypto imports.
pub trait CryptoVerifier: Send + Sync {
    /// Verify a secp256k1 ECDSA signature over a 32-byte prehash.
    fn secp256k1_verify(&self, hash: &[u8], signature: &[u8], pubkey: &[u8]) -> Result<bool, CryptoError>;

    /// Recover the 65-byte uncompressed public key that produced `signature`.
    fn secp256k1_recover_pubkey(
        &self,
        hash: &[u8],
        signature: &[u8],
        recovery_param: u8,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Verify an ed25519 signature.
    fn ed25519_verify(&self, message: &[u8], signature: &[u8], pubkey: &[u8]) -> Result<bool, CryptoError>;

    /// Verify a batch of ed25519 triples. Returns `Ok(false)` at the first
    /// triple that fails.
    ///
    /// Every signature and public key is shape-checked before any triple is
    /// verified, so a malformed entry is an error wherever it sits.
    fn ed25519_batch_verify(
        &self,
        messages: &[Vec<u8>],
        signatures: &[Vec<u8>],
        public_keys: &[Vec<u8>],
    ) -> Result<bool, CryptoError> {
        check_batch_lengths(messages, signatures, public_keys)?;
        for (signature, pubkey) in signatures.iter().zip(public_keys) {
            check_signature(signature)?;
            check_ed25519_pubkey(pubkey)?;
        }
        for ((message, signature), pubkey) in messages.iter().zip(signatures).zip(public_keys) {
            if !self.ed25519_verify(message, signature, pubkey)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Verifier backed by `k256` and `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeVerifier;

impl CryptoVerifier for NativeVerifier {
    fn secp256k1_verify(&self, hash: &[u8], signature: &[u8], pubkey: &[u8]) -> Result<bool, CryptoError> {
        use k256::ecdsa::signature::hazmat::PrehashVerifier;
        use k256::ecdsa::{Signature, VerifyingKey};

        check_message_hash(hash)?;
        check_signature(signature)?;
        check_secp256k1_pubkey(pubkey)?;

        let Ok(sig) = Signature::from_slice(signature) else {
            return Ok(false);
        };
        // High-S signatures are accepted in their low-S form.
        let sig = sig.normalize_s().unwrap_or(sig);
        let Ok(key) = VerifyingKey::from_sec1_bytes(pubkey) else {
            return Ok(false);
        };
        Ok(key.verify_prehash(hash, &sig).is_ok())
    }

    fn secp256k1_recover_pubkey(
        &self,
        hash: &[u8],
        signature: &[u8],
        recovery_param: u8,
    ) -> Result<Vec<u8>, CryptoError> {
        use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

        check_message_hash(hash)?;
        check_signature(signature)?;
        let recid = RecoveryId::from_byte(recovery_param)
            .ok_or(CryptoError::InvalidRecoveryParam(u32::from(recovery_param)))?;

        let sig = Signature::from_slice(signature)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        let key = VerifyingKey::recover_from_prehash(hash, &sig, recid)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        Ok(key.to_encoded_point(false).as_bytes().to_vec())
    }

    fn ed25519_verify(&self, message: &[u8], signature: &[u8], pubkey: &[u8]) -> Result<bool, CryptoError> {
        use ed25519_dalek::{Signature, Verifier, VerifyingKey};

        check_signature(signature)?;
        check_ed25519_pubkey(pubkey)?;

        let pk: [u8; ED25519_PUBKEY_LEN] = pubkey
            .try_into()
            .map_err(|_| CryptoError::InvalidPubkeyFormat(pubkey.len()))?;
        let sig: [u8; SIGNATURE_LEN] = signature
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat(signature.len()))?;

        let Ok(key) = VerifyingKey::from_bytes(&pk) else {
            return Ok(false);
        };
        Ok(key.verify(message, &Signature::from_bytes(&sig)).is_ok())
    }
}
