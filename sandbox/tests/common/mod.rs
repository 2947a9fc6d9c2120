//! Shared test helpers for integration tests.
//!
//! Provides the inline WAT guest contracts, entry-point argument builders,
//! and runtime factory functions used across all integration test files.

#![allow(dead_code)]

use cwvm_hostapi::{BlockInfo, Coin, ContractInfo, Env, MessageInfo, TransactionInfo, Uint64};
use cwvm_sandbox::{HostRuntime, VmConfig};

/// First byte the guest allocator hands out. Data segments live below it.
pub const HEAP_BASE: u32 = 32 * 1024;

/// Storage key the verifier contract keeps its state under.
pub const CONFIG_KEY: &str = "config";

/// Response every state-changing entry point of the verifier contract returns.
pub const OK_RESPONSE: &str = r#"{"ok":{"messages":[],"attributes":[],"events":[],"data":null}}"#;

/// Query response once the config has been removed.
pub const NOT_FOUND_RESPONSE: &str = r#"{"error":"not found"}"#;

pub const CONTRACT_ADDR: &str = "terra1contract";

// ── Tracing ──

/// Route `tracing` output to the test harness. `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Guest Module Builders ──

/// Escape `s` for use inside a WAT string literal.
pub fn wat_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A data segment placing `s` at `offset`.
pub fn data_segment(offset: u32, s: &str) -> String {
    format!("(data (i32.const {}) \"{}\")", offset, wat_string(s))
}

/// A data segment placing raw `bytes` at `offset`.
pub fn data_bytes(offset: u32, bytes: &[u8]) -> String {
    let escaped: String = bytes.iter().map(|b| format!("\\{:02x}", b)).collect();
    format!("(data (i32.const {}) \"{}\")", offset, escaped)
}

/// Bump allocator with region headers, a no-op `deallocate`, and
/// `$static(ptr, len)` which copies static bytes into a fresh region.
///
/// Each region is a 16-byte slot holding the 12-byte header, followed by
/// the data, rounded up to 8 bytes. Memory grows on demand; a refused grow
/// traps.
const ALLOCATOR: &str = r#"
    (func $allocate (export "allocate") (param $size i32) (result i32)
        (local $ptr i32)
        (local $end i32)
        (local.set $ptr (global.get $heap))
        (local.set $end
            (i32.and
                (i32.add (i32.add (local.get $ptr) (i32.const 23)) (local.get $size))
                (i32.const -8)))
        (if (i32.gt_u (local.get $end) (i32.mul (memory.size) (i32.const 65536)))
            (then
                (if (i32.eq
                        (memory.grow
                            (i32.shr_u
                                (i32.add
                                    (i32.sub (local.get $end) (i32.mul (memory.size) (i32.const 65536)))
                                    (i32.const 65535))
                                (i32.const 16)))
                        (i32.const -1))
                    (then unreachable))))
        (i32.store (local.get $ptr) (i32.add (local.get $ptr) (i32.const 16)))
        (i32.store offset=4 (local.get $ptr) (local.get $size))
        (i32.store offset=8 (local.get $ptr) (i32.const 0))
        (global.set $heap (local.get $end))
        (local.get $ptr))

    (func (export "deallocate") (param i32))

    (func $static (param $src i32) (param $len i32) (result i32)
        (local $region i32)
        (local.set $region (call $allocate (local.get $len)))
        (memory.copy (i32.load (local.get $region)) (local.get $src) (local.get $len))
        (i32.store offset=8 (local.get $region) (local.get $len))
        (local.get $region))
"#;

/// A guest module: `imports`, one page of exported memory, the allocator,
/// then `body` (data segments and entry points).
pub fn guest_module(imports: &str, body: &str) -> String {
    format!(
        r#"
(module
    {imports}
    (memory (export "memory") 1)
    (global $heap (mut i32) (i32.const {heap}))
    {allocator}
    {body}
)
"#,
        imports = imports,
        heap = HEAP_BASE,
        allocator = ALLOCATOR,
        body = body,
    )
}

/// The verifier contract.
///
/// - `instantiate` / `migrate` store `msg` under `config` and emit a debug line
/// - `execute` removes `config`
/// - `query` returns `{"ok":<config>}`, or `{"error":"not found"}`
pub fn verifier_contract_wat() -> String {
    const KEY_AT: u32 = 16;
    const OK_OPEN_AT: u32 = 32;
    const CLOSE_AT: u32 = 48;
    const OK_RESPONSE_AT: u32 = 64;
    const NOT_FOUND_AT: u32 = 160;
    const INSTANTIATED_AT: u32 = 192;
    const MIGRATED_AT: u32 = 208;
    const OK_OPEN: &str = r#"{"ok":"#;

    let imports = r#"
    (import "env" "db_read" (func $db_read (param i32) (result i32)))
    (import "env" "db_write" (func $db_write (param i32 i32)))
    (import "env" "db_remove" (func $db_remove (param i32)))
    (import "env" "debug" (func $debug (param i32)))
    "#;

    let body = format!(
        r#"
    {key_data}
    {ok_open_data}
    {close_data}
    {ok_data}
    {not_found_data}
    {instantiated_data}
    {migrated_data}

    (func $config_key (result i32)
        (call $static (i32.const {key_at}) (i32.const {key_len})))

    (func $ok (result i32)
        (call $static (i32.const {ok_at}) (i32.const {ok_len})))

    ;; {{"ok": ++ value ++ }}
    (func $wrap_ok (param $value i32) (result i32)
        (local $len i32)
        (local $out i32)
        (local $data i32)
        (local.set $len (i32.load offset=8 (local.get $value)))
        (local.set $out (call $allocate (i32.add (local.get $len) (i32.const {wrap_extra}))))
        (local.set $data (i32.load (local.get $out)))
        (memory.copy (local.get $data) (i32.const {ok_open_at}) (i32.const {ok_open_len}))
        (memory.copy
            (i32.add (local.get $data) (i32.const {ok_open_len}))
            (i32.load (local.get $value))
            (local.get $len))
        (memory.copy
            (i32.add (i32.add (local.get $data) (i32.const {ok_open_len})) (local.get $len))
            (i32.const {close_at})
            (i32.const 1))
        (i32.store offset=8 (local.get $out) (i32.add (local.get $len) (i32.const {wrap_extra})))
        (local.get $out))

    (func (export "instantiate") (param $env i32) (param $info i32) (param $msg i32) (result i32)
        (call $db_write (call $config_key) (local.get $msg))
        (call $debug (call $static (i32.const {instantiated_at}) (i32.const {instantiated_len})))
        (call $ok))

    (func (export "migrate") (param $env i32) (param $info i32) (param $msg i32) (result i32)
        (call $db_write (call $config_key) (local.get $msg))
        (call $debug (call $static (i32.const {migrated_at}) (i32.const {migrated_len})))
        (call $ok))

    (func (export "execute") (param $env i32) (param $info i32) (param $msg i32) (result i32)
        (call $db_remove (call $config_key))
        (call $ok))

    (func (export "query") (param $env i32) (param $msg i32) (result i32)
        (local $value i32)
        (local.set $value (call $db_read (call $config_key)))
        (if (result i32) (i32.eqz (local.get $value))
            (then (call $static (i32.const {not_found_at}) (i32.const {not_found_len})))
            (else (call $wrap_ok (local.get $value)))))
    "#,
        key_data = data_segment(KEY_AT, CONFIG_KEY),
        ok_open_data = data_segment(OK_OPEN_AT, OK_OPEN),
        close_data = data_segment(CLOSE_AT, "}"),
        ok_data = data_segment(OK_RESPONSE_AT, OK_RESPONSE),
        not_found_data = data_segment(NOT_FOUND_AT, NOT_FOUND_RESPONSE),
        instantiated_data = data_segment(INSTANTIATED_AT, "instantiated"),
        migrated_data = data_segment(MIGRATED_AT, "migrated"),
        key_at = KEY_AT,
        key_len = CONFIG_KEY.len(),
        ok_at = OK_RESPONSE_AT,
        ok_len = OK_RESPONSE.len(),
        ok_open_at = OK_OPEN_AT,
        ok_open_len = OK_OPEN.len(),
        close_at = CLOSE_AT,
        wrap_extra = OK_OPEN.len() + 1,
        not_found_at = NOT_FOUND_AT,
        not_found_len = NOT_FOUND_RESPONSE.len(),
        instantiated_at = INSTANTIATED_AT,
        instantiated_len = "instantiated".len(),
        migrated_at = MIGRATED_AT,
        migrated_len = "migrated".len(),
    );

    guest_module(imports, &body)
}

// ── Runtime Loaders ──

/// Load the verifier contract with default config.
pub fn load_verifier() -> HostRuntime {
    load_verifier_with_config(VmConfig::default())
}

/// Load the verifier contract with a custom config.
pub fn load_verifier_with_config(config: VmConfig) -> HostRuntime {
    init_tracing();
    HostRuntime::in_memory(verifier_contract_wat().as_bytes(), config)
        .expect("failed to load verifier contract")
}

/// Load an arbitrary guest module with default config.
pub fn load_module(wat: &str) -> HostRuntime {
    init_tracing();
    HostRuntime::in_memory(wat.as_bytes(), VmConfig::default()).expect("failed to load module")
}

// ── Argument Builders ──

pub fn mock_env() -> Env {
    Env {
        block: BlockInfo {
            height: 12_345,
            time: Uint64::new(1_571_797_419_879_305_533),
            chain_id: "cosmos-testnet-14002".into(),
        },
        transaction: Some(TransactionInfo { index: 3 }),
        contract: ContractInfo {
            address: CONTRACT_ADDR.into(),
        },
    }
}

pub fn mock_info(sender: &str, funds: &[Coin]) -> MessageInfo {
    MessageInfo {
        sender: sender.into(),
        funds: funds.to_vec(),
    }
}
