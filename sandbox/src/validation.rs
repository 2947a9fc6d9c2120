//! WASM module validation — contract ABI checks.
//!
//! Validates that a compiled WASM module can be driven as a contract
//! before the runtime instantiates it. Checks:
//!
//! 1. Memory export present
//! 2. Required exports present with correct signatures
//! 3. Optional entry points, if exported, have correct signatures
//! 4. All imports are functions this host provides in the `env` module
//! 5. No WASI imports

use wasmtime::{ExternType, Module, ValType};

use crate::error::VmError;
use crate::linker::{IMPORT_MODULE, IMPORT_NAMES};

/// Check if a ValType is i32.
fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

/// Expected export: (name, accepted i32 param counts, i32 result count).
/// All params and results are i32 in the contract ABI.
const REQUIRED_EXPORTS: &[(&str, &[usize], usize)] = &[
    ("allocate", &[1], 1),
    ("deallocate", &[1], 0),
    ("instantiate", &[3], 1),
    ("query", &[2], 1),
];

/// Entry points a contract may leave out. `migrate` takes `info` only in
/// the three-argument form.
const OPTIONAL_EXPORTS: &[(&str, &[usize], usize)] = &[
    ("execute", &[3], 1),
    ("migrate", &[2, 3], 1),
];

/// Validate that a WASM module meets the contract ABI requirements.
pub fn validate_module(module: &Module) -> Result<(), VmError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn check_signature(
    name: &str,
    ty: ExternType,
    param_counts: &[usize],
    result_count: usize,
) -> Result<(), VmError> {
    let func_ty = match ty {
        ExternType::Func(ft) => ft,
        _ => {
            return Err(VmError::Validation(format!(
                "export '{}' must be a function",
                name
            )));
        }
    };

    let params: Vec<ValType> = func_ty.params().collect();
    let results: Vec<ValType> = func_ty.results().collect();

    if !param_counts.contains(&params.len()) || !params.iter().all(is_i32) {
        return Err(VmError::Validation(format!(
            "export '{}' has wrong param signature: expected {:?} i32 params, got {} params",
            name, param_counts, params.len()
        )));
    }

    if results.len() != result_count || !results.iter().all(is_i32) {
        return Err(VmError::Validation(format!(
            "export '{}' has wrong result signature: expected {} i32 results, got {} results",
            name, result_count, results.len()
        )));
    }
    Ok(())
}

/// Check that all required exports are present with correct signatures.
fn validate_exports(module: &Module) -> Result<(), VmError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == "memory" && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(VmError::Validation("module must export 'memory'".into()));
    }

    for &(name, param_counts, result_count) in REQUIRED_EXPORTS {
        let export = module
            .exports()
            .find(|e| e.name() == name)
            .ok_or_else(|| VmError::Validation(format!("missing required export: {}", name)))?;
        check_signature(name, export.ty(), param_counts, result_count)?;
    }

    for &(name, param_counts, result_count) in OPTIONAL_EXPORTS {
        if let Some(export) = module.exports().find(|e| e.name() == name) {
            check_signature(name, export.ty(), param_counts, result_count)?;
        }
    }

    Ok(())
}

/// Check that all imports are known `env` functions and none are WASI.
fn validate_imports(module: &Module) -> Result<(), VmError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(VmError::Validation(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != IMPORT_MODULE {
            return Err(VmError::Validation(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                IMPORT_MODULE,
                import.name()
            )));
        }

        if !matches!(import.ty(), ExternType::Func(_)) {
            return Err(VmError::Validation(format!(
                "non-function import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if !IMPORT_NAMES.contains(&import.name()) {
            return Err(VmError::Validation(format!(
                "unknown host function: {}::{}",
                module_name,
                import.name()
            )));
        }
    }

    Ok(())
}
