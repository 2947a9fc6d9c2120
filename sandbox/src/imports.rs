//! Import function logic.
//!
//! Each `do_*` function implements one `env` import against a [`GuestEnv`]:
//! 1. Wraps pointer arguments as `Region`s and reads them (bounded)
//! 2. Charges gas via the `GasState` of the current call
//! 3. Delegates to the backend capability or crypto verifier
//! 4. Writes the result into a fresh region, returning its pointer
//!
//! Zero is the "absent" pointer (`db_read` miss, exhausted iterator) and the
//! success status. Any `Err` traps the guest.

use tracing::{debug, warn};

use cwvm_hostapi::crypto::{
    check_batch_lengths, check_ed25519_pubkey, check_message_hash, check_recovery_param,
    check_secp256k1_pubkey, check_signature, MESSAGE_HASH_LEN, SECP256K1_UNCOMPRESSED_PUBKEY_LEN,
    SIGNATURE_LEN, ED25519_PUBKEY_LEN,
};
use cwvm_hostapi::types::{MAX_LENGTH_DEBUG, MAX_LENGTH_ED25519_BATCH, MAX_LENGTH_ED25519_MESSAGE};
use cwvm_hostapi::{CryptoError, HostError, Order, Record};

use crate::context::GuestEnv;
use crate::error::VmError;
use crate::memory::Region;

/// Encode one iterator record as `value ‖ len(value) ‖ key ‖ len(key)`,
/// lengths as big-endian `u32`.
pub fn encode_record(record: &Record) -> Vec<u8> {
    let mut out = Vec::with_capacity(record.key.len() + record.value.len() + 8);
    out.extend_from_slice(&record.value);
    out.extend_from_slice(&(record.value.len() as u32).to_be_bytes());
    out.extend_from_slice(&record.key);
    out.extend_from_slice(&(record.key.len() as u32).to_be_bytes());
    out
}

/// Inverse of [`encode_record`]. Sections are read from the end.
pub fn decode_record(data: &[u8]) -> Option<Record> {
    let (rest, key) = split_section(data)?;
    let (rest, value) = split_section(rest)?;
    if !rest.is_empty() {
        return None;
    }
    Some(Record::new(key, value))
}

fn split_section(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let len_start = data.len().checked_sub(4)?;
    let len = u32::from_be_bytes(data[len_start..].try_into().ok()?) as usize;
    let start = len_start.checked_sub(len)?;
    Some((&data[..start], &data[start..len_start]))
}

fn charge<E: GuestEnv + ?Sized>(env: &mut E, base: u64, bytes: usize) -> Result<(), VmError> {
    env.state_mut().charge(base, bytes)?;
    Ok(())
}

fn read_key<E: GuestEnv + ?Sized>(env: &E, ptr: u32) -> Result<Vec<u8>, VmError> {
    let max = env.state().config.max_key_len;
    Region::new(ptr)?.read_limited(env.memory(), max, |length| HostError::KeyTooLong { length, max })
}

fn read_optional_key<E: GuestEnv + ?Sized>(env: &E, ptr: u32) -> Result<Option<Vec<u8>>, VmError> {
    match Region::optional(ptr) {
        Some(region) => Ok(Some(read_key(env, region.ptr())?)),
        None => Ok(None),
    }
}

fn read_human_address<E: GuestEnv + ?Sized>(env: &E, ptr: u32) -> Result<String, VmError> {
    let max = env.state().config.max_human_address_len;
    let bytes = Region::new(ptr)?
        .read_limited(env.memory(), max, |length| HostError::AddressTooLong { length, max })?;
    if bytes.is_empty() {
        return Err(HostError::EmptyAddress.into());
    }
    String::from_utf8(bytes)
        .map_err(|_| HostError::InvalidAddress("address is not valid UTF-8".into()).into())
}

fn read_crypto_arg<E: GuestEnv + ?Sized>(
    env: &E,
    ptr: u32,
    max: usize,
    on_exceed: impl FnOnce(usize) -> CryptoError,
) -> Result<Vec<u8>, VmError> {
    Region::new(ptr)?.read_limited(env.memory(), max, |len| on_exceed(len).into())
}

fn read_lossy<E: GuestEnv + ?Sized>(env: &E, ptr: u32) -> String {
    let Some(region) = Region::optional(ptr) else {
        return String::new();
    };
    match region.read_limited(env.memory(), MAX_LENGTH_DEBUG, |length| {
        HostError::ValueTooLong { length, max: MAX_LENGTH_DEBUG }
    }) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("<unreadable: {e}>"),
    }
}

// ── Storage ──

pub fn do_db_read<E: GuestEnv + ?Sized>(env: &mut E, key_ptr: u32) -> Result<u32, VmError> {
    let key = read_key(env, key_ptr)?;
    let cost = env.state().config.gas_costs.db_read;
    charge(env, cost, key.len())?;

    let value = env.state().storage_get(&key)?;
    debug!(key_len = key.len(), found = value.is_some(), "db_read");
    match value {
        None => Ok(0),
        Some(value) => {
            charge(env, 0, value.len())?;
            Ok(Region::allocate_with(env, &value)?.ptr())
        }
    }
}

pub fn do_db_write<E: GuestEnv + ?Sized>(env: &mut E, key_ptr: u32, value_ptr: u32) -> Result<(), VmError> {
    if env.state().read_only {
        return Err(HostError::ReadOnlyContext.into());
    }
    let key = read_key(env, key_ptr)?;
    // A zero-length key is the end-of-iteration marker in `encode_record`.
    if key.is_empty() {
        return Err(HostError::EmptyKey.into());
    }
    let max = env.state().config.max_value_len;
    let value = Region::new(value_ptr)?
        .read_limited(env.memory(), max, |length| HostError::ValueTooLong { length, max })?;
    let cost = env.state().config.gas_costs.db_write;
    charge(env, cost, key.len() + value.len())?;

    debug!(key_len = key.len(), value_len = value.len(), "db_write");
    env.state_mut().storage_set(&key, &value)?;
    Ok(())
}

pub fn do_db_remove<E: GuestEnv + ?Sized>(env: &mut E, key_ptr: u32) -> Result<(), VmError> {
    if env.state().read_only {
        return Err(HostError::ReadOnlyContext.into());
    }
    let key = read_key(env, key_ptr)?;
    let cost = env.state().config.gas_costs.db_remove;
    charge(env, cost, key.len())?;

    debug!(key_len = key.len(), "db_remove");
    env.state_mut().storage_remove(&key)?;
    Ok(())
}

pub fn do_db_scan<E: GuestEnv + ?Sized>(
    env: &mut E,
    start_ptr: u32,
    end_ptr: u32,
    order: u32,
) -> Result<u32, VmError> {
    let order = Order::try_from(order)?;
    let start = read_optional_key(env, start_ptr)?;
    let end = read_optional_key(env, end_ptr)?;
    let bytes = start.as_ref().map_or(0, Vec::len) + end.as_ref().map_or(0, Vec::len);
    let cost = env.state().config.gas_costs.db_scan;
    charge(env, cost, bytes)?;

    let scanner = env
        .state_mut()
        .backend
        .storage
        .as_range_scan()
        .ok_or(HostError::ScanUnsupported)?;
    let id = scanner.scan(start.as_deref(), end.as_deref(), order)?;
    debug!(iterator_id = id, ?order, "db_scan");
    Ok(id)
}

pub fn do_db_next<E: GuestEnv + ?Sized>(env: &mut E, iterator_id: u32) -> Result<u32, VmError> {
    let cost = env.state().config.gas_costs.db_next;
    charge(env, cost, 0)?;

    let scanner = env
        .state_mut()
        .backend
        .storage
        .as_range_scan()
        .ok_or(HostError::ScanUnsupported)?;
    let Some(record) = scanner.next(iterator_id)? else {
        debug!(iterator_id, "db_next: exhausted");
        return Ok(0);
    };
    let encoded = encode_record(&record);
    charge(env, 0, encoded.len())?;
    Ok(Region::allocate_with(env, &encoded)?.ptr())
}

// ── Address codec ──

pub fn do_addr_canonicalize<E: GuestEnv + ?Sized>(
    env: &mut E,
    source_ptr: u32,
    destination_ptr: u32,
) -> Result<u32, VmError> {
    let human = read_human_address(env, source_ptr)?;
    let cost = env.state().config.gas_costs.addr_canonicalize;
    charge(env, cost, human.len())?;

    let canonical = env.state().backend.api.canonicalize(&human)?;
    Region::new(destination_ptr)?.write(env.memory_mut(), &canonical)?;
    Ok(0)
}

pub fn do_addr_humanize<E: GuestEnv + ?Sized>(
    env: &mut E,
    source_ptr: u32,
    destination_ptr: u32,
) -> Result<u32, VmError> {
    let expected = env.state().config.canonical_address_len;
    let canonical = Region::new(source_ptr)?.read_limited(env.memory(), expected, |got| {
        HostError::InvalidCanonicalLength { expected, got }
    })?;
    if canonical.is_empty() {
        return Err(HostError::EmptyAddress.into());
    }
    if canonical.len() != expected {
        return Err(HostError::InvalidCanonicalLength {
            expected,
            got: canonical.len(),
        }
        .into());
    }
    let cost = env.state().config.gas_costs.addr_humanize;
    charge(env, cost, canonical.len())?;

    let human = env.state().backend.api.humanize(&canonical)?;
    Region::new(destination_ptr)?.write_str(env.memory_mut(), &human)?;
    Ok(0)
}

pub fn do_addr_validate<E: GuestEnv + ?Sized>(env: &mut E, source_ptr: u32) -> Result<u32, VmError> {
    let human = read_human_address(env, source_ptr)?;
    let cost = env.state().config.gas_costs.addr_validate;
    charge(env, cost, human.len())?;

    env.state().backend.api.validate(&human)?;
    Ok(0)
}

// ── Crypto ──

pub fn do_secp256k1_verify<E: GuestEnv + ?Sized>(
    env: &mut E,
    hash_ptr: u32,
    signature_ptr: u32,
    pubkey_ptr: u32,
) -> Result<u32, VmError> {
    let hash = read_crypto_arg(env, hash_ptr, MESSAGE_HASH_LEN, CryptoError::InvalidHashFormat)?;
    let signature = read_crypto_arg(env, signature_ptr, SIGNATURE_LEN, CryptoError::InvalidSignatureFormat)?;
    let pubkey = read_crypto_arg(
        env,
        pubkey_ptr,
        SECP256K1_UNCOMPRESSED_PUBKEY_LEN,
        CryptoError::InvalidPubkeyFormat,
    )?;
    check_message_hash(&hash)?;
    check_signature(&signature)?;
    check_secp256k1_pubkey(&pubkey)?;
    let cost = env.state().config.gas_costs.secp256k1_verify;
    charge(env, cost, 0)?;

    let valid = env.state().crypto.secp256k1_verify(&hash, &signature, &pubkey)?;
    debug!(valid, "secp256k1_verify");
    Ok(if valid { 0 } else { 1 })
}

pub fn do_secp256k1_recover_pubkey<E: GuestEnv + ?Sized>(
    env: &mut E,
    hash_ptr: u32,
    signature_ptr: u32,
    recovery_param: u32,
) -> Result<u32, VmError> {
    let hash = read_crypto_arg(env, hash_ptr, MESSAGE_HASH_LEN, CryptoError::InvalidHashFormat)?;
    let signature = read_crypto_arg(env, signature_ptr, SIGNATURE_LEN, CryptoError::InvalidSignatureFormat)?;
    check_message_hash(&hash)?;
    check_signature(&signature)?;
    let recovery_param = check_recovery_param(recovery_param)?;
    let cost = env.state().config.gas_costs.secp256k1_recover_pubkey;
    charge(env, cost, 0)?;

    let pubkey = env
        .state()
        .crypto
        .secp256k1_recover_pubkey(&hash, &signature, recovery_param)?;
    Ok(Region::allocate_with(env, &pubkey)?.ptr())
}

pub fn do_ed25519_verify<E: GuestEnv + ?Sized>(
    env: &mut E,
    message_ptr: u32,
    signature_ptr: u32,
    pubkey_ptr: u32,
) -> Result<u32, VmError> {
    let message = Region::new(message_ptr)?.read_limited(env.memory(), MAX_LENGTH_ED25519_MESSAGE, |length| {
        HostError::ValueTooLong { length, max: MAX_LENGTH_ED25519_MESSAGE }
    })?;
    let signature = read_crypto_arg(env, signature_ptr, SIGNATURE_LEN, CryptoError::InvalidSignatureFormat)?;
    let pubkey = read_crypto_arg(env, pubkey_ptr, ED25519_PUBKEY_LEN, CryptoError::InvalidPubkeyFormat)?;
    check_signature(&signature)?;
    check_ed25519_pubkey(&pubkey)?;
    let cost = env.state().config.gas_costs.ed25519_verify;
    charge(env, cost, message.len())?;

    let valid = env.state().crypto.ed25519_verify(&message, &signature, &pubkey)?;
    debug!(valid, message_len = message.len(), "ed25519_verify");
    Ok(if valid { 0 } else { 1 })
}

fn read_byte_arrays<E: GuestEnv + ?Sized>(env: &E, ptr: u32) -> Result<Vec<Vec<u8>>, VmError> {
    let raw = Region::new(ptr)?.read_limited(env.memory(), MAX_LENGTH_ED25519_BATCH, |length| {
        HostError::ValueTooLong { length, max: MAX_LENGTH_ED25519_BATCH }
    })?;
    serde_json::from_slice(&raw)
        .map_err(|e| HostError::InvalidEncoding(format!("batch argument: {e}")).into())
}

pub fn do_ed25519_batch_verify<E: GuestEnv + ?Sized>(
    env: &mut E,
    messages_ptr: u32,
    signatures_ptr: u32,
    pubkeys_ptr: u32,
) -> Result<u32, VmError> {
    let messages = read_byte_arrays(env, messages_ptr)?;
    let signatures = read_byte_arrays(env, signatures_ptr)?;
    let pubkeys = read_byte_arrays(env, pubkeys_ptr)?;
    check_batch_lengths(&messages, &signatures, &pubkeys)?;

    let per_item = env.state().config.gas_costs.ed25519_batch_verify;
    let count = messages.len() as u64;
    let bytes: usize = messages.iter().map(Vec::len).sum();
    charge(env, per_item.saturating_mul(count), bytes)?;

    let valid = env
        .state()
        .crypto
        .ed25519_batch_verify(&messages, &signatures, &pubkeys)?;
    debug!(valid, count, "ed25519_batch_verify");
    Ok(if valid { 0 } else { 1 })
}

// ── Misc ──

/// Forward a guest debug message to `tracing` and the runtime's log buffer.
///
/// Never fails: when the gas left cannot cover the charge, the charge is
/// skipped and the line is still recorded.
pub fn do_debug<E: GuestEnv + ?Sized>(env: &mut E, message_ptr: u32) -> Result<(), VmError> {
    let cost = env.state().config.gas_costs.debug;
    if let Err(e) = charge(env, cost, 0) {
        warn!(error = %e, "debug: gas charge skipped");
    }

    let message = match Region::new(message_ptr).and_then(|r| r.read(env.memory())) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(error = %e, "debug: unreadable message region");
            return Ok(());
        }
    };
    tracing::debug!(target: "cwvm::guest", "{message}");
    env.state_mut().add_log(message);
    Ok(())
}

pub fn do_query_chain<E: GuestEnv + ?Sized>(env: &mut E, request_ptr: u32) -> Result<u32, VmError> {
    let max = env.state().config.max_query_len;
    let request = Region::new(request_ptr)?
        .read_limited(env.memory(), max, |length| HostError::ValueTooLong { length, max })?;
    let cost = env.state().config.gas_costs.query_chain;
    charge(env, cost, request.len())?;

    let gas_limit = env.state().gas.remaining();
    let response = env.state().backend.querier.query_raw(&request, gas_limit)?;
    charge(env, 0, response.len())?;
    Ok(Region::allocate_with(env, &response)?.ptr())
}

/// Build the error for a guest `abort`. Unreadable arguments are rendered
/// in place; the call always fails.
pub fn do_abort<E: GuestEnv + ?Sized>(
    env: &E,
    message_ptr: u32,
    file_ptr: u32,
    line: u32,
    column: u32,
) -> VmError {
    let message = read_lossy(env, message_ptr);
    let file = read_lossy(env, file_ptr);
    warn!(%message, %file, line, column, "guest aborted");
    VmError::Aborted {
        message,
        file,
        line,
        column,
    }
}
