//! The `tml_codegen_x86` plugin.
//!
//! Exports the three ABI entry points plus the codegen C surface: compile
//! IR text to an object, link objects, probe backend/linker availability,
//! and free error strings. Error strings returned through `error_out` are
//! heap-allocated here and must be released through `codegen_free_error`,
//! never the caller's allocator.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};

use tml_backend::{linker, llvm};
use tml_plugin::abi::{PluginInfo, PLUGIN_ABI_VERSION};
use tml_plugin::c_string_array;

struct Static<T>(T);
unsafe impl<T> Sync for Static<T> {}

static CAPABILITIES: Static<[*const c_char; 5]> =
    Static(c_string_array!["target_x86_64", "emit_obj", "emit_asm", "link"]);
static DEPENDENCIES: Static<[*const c_char; 1]> = Static(c_string_array![]);

static INFO: Static<PluginInfo> = Static(PluginInfo {
    abi_version: PLUGIN_ABI_VERSION,
    name: c"tml_codegen_x86".as_ptr(),
    version: c"0.1.0".as_ptr(),
    capabilities: CAPABILITIES.0.as_ptr(),
    dependencies: DEPENDENCIES.0.as_ptr(),
});

#[no_mangle]
pub extern "C" fn plugin_query() -> *const PluginInfo {
    &INFO.0
}

#[no_mangle]
pub extern "C" fn plugin_init(_host_ctx: *mut c_void) -> c_int {
    0
}

#[no_mangle]
pub extern "C" fn plugin_shutdown() {}

/// Hand an error string to the caller through `error_out`.
fn set_error(error_out: *mut *mut c_char, message: String) {
    if error_out.is_null() {
        return;
    }
    let c = CString::new(message.replace('\0', " "))
        .unwrap_or_else(|_| CString::new("codegen error").expect("static string"));
    unsafe { *error_out = c.into_raw() };
}

unsafe fn read_path(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        return None;
    }
    Some(PathBuf::from(
        CStr::from_ptr(ptr).to_string_lossy().into_owned(),
    ))
}

/// Compile IR text to a native object. Returns 0 on success.
///
/// # Safety
/// `ir` and `output_path` must be valid NUL-terminated strings; `error_out`
/// NULL or a valid out-pointer.
#[no_mangle]
pub unsafe extern "C" fn codegen_compile_ir_to_object(
    ir: *const c_char,
    output_path: *const c_char,
    opt_level: c_int,
    debug_info: c_int,
    error_out: *mut *mut c_char,
) -> c_int {
    if ir.is_null() {
        set_error(error_out, "IR pointer is NULL".to_string());
        return 1;
    }
    let Some(output) = read_path(output_path) else {
        set_error(error_out, "output path is NULL".to_string());
        return 1;
    };
    let ir = CStr::from_ptr(ir).to_string_lossy();
    let options = llvm::CompileOptions {
        opt_level: opt_level.clamp(0, 3) as u8,
        debug_info: debug_info != 0,
        ..llvm::CompileOptions::default()
    };
    match llvm::compile_ir_to_object(&ir, &output, &options) {
        Ok(()) => 0,
        Err(err) => {
            set_error(error_out, err);
            1
        }
    }
}

/// Link objects into an executable (0), shared library (1), or static
/// library (2). Returns 0 on success.
///
/// # Safety
/// `object_paths` must point at `num_objects` valid NUL-terminated strings;
/// `output_path` must be valid; `error_out` NULL or a valid out-pointer.
#[no_mangle]
pub unsafe extern "C" fn codegen_link_objects(
    object_paths: *const *const c_char,
    num_objects: c_int,
    output_path: *const c_char,
    output_type: c_int,
    error_out: *mut *mut c_char,
) -> c_int {
    let Some(output) = read_path(output_path) else {
        set_error(error_out, "output path is NULL".to_string());
        return 1;
    };
    let Some(kind) = linker::OutputType::from_code(output_type) else {
        set_error(error_out, format!("invalid output_type {output_type}"));
        return 1;
    };
    let mut objects = Vec::with_capacity(num_objects.max(0) as usize);
    for i in 0..num_objects.max(0) {
        match read_path(*object_paths.add(i as usize)) {
            Some(path) => objects.push(path),
            None => {
                set_error(error_out, format!("object path {i} is NULL"));
                return 1;
            }
        }
    }
    let options = linker::LinkOptions {
        output_type: Some(kind),
        ..linker::LinkOptions::default()
    };
    match linker::link(&objects, Path::new(&output), &options) {
        Ok(()) => 0,
        Err(err) => {
            set_error(error_out, err);
            1
        }
    }
}

/// Whether an IR backend (in-process or subprocess) can run here.
#[no_mangle]
pub extern "C" fn codegen_is_available() -> c_int {
    if llvm::in_process_available() {
        return 1;
    }
    // The subprocess path counts; probing clang is cheap relative to a
    // compile.
    let clang = std::process::Command::new("clang")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    clang as c_int
}

/// Whether a linker is available.
#[no_mangle]
pub extern "C" fn codegen_lld_is_available() -> c_int {
    linker::linker_available() as c_int
}

/// Release an error string produced by this plugin.
///
/// # Safety
/// `error` must be NULL or a pointer produced by this plugin's error-out
/// parameters, freed at most once.
#[no_mangle]
pub unsafe extern "C" fn codegen_free_error(error: *mut c_char) {
    if !error.is_null() {
        drop(CString::from_raw(error));
    }
}
