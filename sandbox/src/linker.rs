//! Host function registration via Wasmtime linker.
//!
//! Registers the `env` imports with the Wasmtime `Linker`. Each function:
//! 1. Builds a `WasmEnv` from the Caller (memory + allocator exports)
//! 2. Runs the matching `imports::do_*` function
//! 3. Returns its integer result, or traps with the `VmError`
//!
//! Traps carry the `VmError` inside the `anyhow::Error`, so the runtime can
//! downcast it back after the entry-point call fails.

use wasmtime::{Caller, Linker};

use crate::context::WasmEnv;
use crate::error::VmError;
use crate::host_impl::HostState;
use crate::imports;

/// Module name of every host import.
pub const IMPORT_MODULE: &str = "env";

/// All import names this host provides.
pub const IMPORT_NAMES: &[&str] = &[
    "db_read",
    "db_write",
    "db_remove",
    "db_scan",
    "db_next",
    "addr_canonicalize",
    "addr_humanize",
    "addr_validate",
    "secp256k1_verify",
    "secp256k1_recover_pubkey",
    "ed25519_verify",
    "ed25519_batch_verify",
    "debug",
    "query_chain",
    "abort",
];

/// Register all `env` functions with the linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    register_db_read(linker)?;
    register_db_write(linker)?;
    register_db_remove(linker)?;
    register_db_scan(linker)?;
    register_db_next(linker)?;
    register_addr_canonicalize(linker)?;
    register_addr_humanize(linker)?;
    register_addr_validate(linker)?;
    register_secp256k1_verify(linker)?;
    register_secp256k1_recover_pubkey(linker)?;
    register_ed25519_verify(linker)?;
    register_ed25519_batch_verify(linker)?;
    register_debug(linker)?;
    register_query_chain(linker)?;
    register_abort(linker)?;
    Ok(())
}

// ── Storage ──

fn register_db_read(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_read",
        |mut caller: Caller<'_, HostState>, key_ptr: u32| -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_db_read(&mut env, key_ptr)?)
        },
    )?;
    Ok(())
}

fn register_db_write(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_write",
        |mut caller: Caller<'_, HostState>, key_ptr: u32, value_ptr: u32| -> anyhow::Result<()> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_db_write(&mut env, key_ptr, value_ptr)?)
        },
    )?;
    Ok(())
}

fn register_db_remove(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_remove",
        |mut caller: Caller<'_, HostState>, key_ptr: u32| -> anyhow::Result<()> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_db_remove(&mut env, key_ptr)?)
        },
    )?;
    Ok(())
}

fn register_db_scan(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_scan",
        |mut caller: Caller<'_, HostState>,
         start_ptr: u32,
         end_ptr: u32,
         order: u32|
         -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_db_scan(&mut env, start_ptr, end_ptr, order)?)
        },
    )?;
    Ok(())
}

fn register_db_next(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_next",
        |mut caller: Caller<'_, HostState>, iterator_id: u32| -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_db_next(&mut env, iterator_id)?)
        },
    )?;
    Ok(())
}

// ── Address codec ──

fn register_addr_canonicalize(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "addr_canonicalize",
        |mut caller: Caller<'_, HostState>, source_ptr: u32, destination_ptr: u32| -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_addr_canonicalize(&mut env, source_ptr, destination_ptr)?)
        },
    )?;
    Ok(())
}

fn register_addr_humanize(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "addr_humanize",
        |mut caller: Caller<'_, HostState>, source_ptr: u32, destination_ptr: u32| -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_addr_humanize(&mut env, source_ptr, destination_ptr)?)
        },
    )?;
    Ok(())
}

fn register_addr_validate(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "addr_validate",
        |mut caller: Caller<'_, HostState>, source_ptr: u32| -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_addr_validate(&mut env, source_ptr)?)
        },
    )?;
    Ok(())
}

// ── Crypto ──

fn register_secp256k1_verify(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "secp256k1_verify",
        |mut caller: Caller<'_, HostState>,
         hash_ptr: u32,
         signature_ptr: u32,
         pubkey_ptr: u32|
         -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_secp256k1_verify(&mut env, hash_ptr, signature_ptr, pubkey_ptr)?)
        },
    )?;
    Ok(())
}

fn register_secp256k1_recover_pubkey(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "secp256k1_recover_pubkey",
        |mut caller: Caller<'_, HostState>,
         hash_ptr: u32,
         signature_ptr: u32,
         recovery_param: u32|
         -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_secp256k1_recover_pubkey(
                &mut env,
                hash_ptr,
                signature_ptr,
                recovery_param,
            )?)
        },
    )?;
    Ok(())
}

fn register_ed25519_verify(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "ed25519_verify",
        |mut caller: Caller<'_, HostState>,
         message_ptr: u32,
         signature_ptr: u32,
         pubkey_ptr: u32|
         -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_ed25519_verify(&mut env, message_ptr, signature_ptr, pubkey_ptr)?)
        },
    )?;
    Ok(())
}

fn register_ed25519_batch_verify(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "ed25519_batch_verify",
        |mut caller: Caller<'_, HostState>,
         messages_ptr: u32,
         signatures_ptr: u32,
         pubkeys_ptr: u32|
         -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_ed25519_batch_verify(
                &mut env,
                messages_ptr,
                signatures_ptr,
                pubkeys_ptr,
            )?)
        },
    )?;
    Ok(())
}

// ── Misc ──

fn register_debug(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "debug",
        |mut caller: Caller<'_, HostState>, message_ptr: u32| -> anyhow::Result<()> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_debug(&mut env, message_ptr)?)
        },
    )?;
    Ok(())
}

fn register_query_chain(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "query_chain",
        |mut caller: Caller<'_, HostState>, request_ptr: u32| -> anyhow::Result<u32> {
            let mut env = WasmEnv::from_caller(&mut caller)?;
            Ok(imports::do_query_chain(&mut env, request_ptr)?)
        },
    )?;
    Ok(())
}

fn register_abort(linker: &mut Linker<HostState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "abort",
        |mut caller: Caller<'_, HostState>,
         message_ptr: u32,
         file_ptr: u32,
         line: u32,
         column: u32|
         -> anyhow::Result<()> {
            let env = WasmEnv::from_caller(&mut caller)?;
            Err(imports::do_abort(&env, message_ptr, file_ptr, line, column).into())
        },
    )?;
    Ok(())
}
