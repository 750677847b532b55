//! The stable plugin ABI.
//!
//! Every plugin exports exactly three functions with C linkage:
//!
//! - `plugin_query() -> *const PluginInfo` -- static metadata, owned by the
//!   plugin for its whole lifetime; the loader never frees it
//! - `plugin_init(host_ctx) -> c_int` -- one-time initialization, non-zero
//!   means failure
//! - `plugin_shutdown()` -- called once before unload, even when init failed
//!
//! Only C types cross the boundary. A version bump in
//! [`PLUGIN_ABI_VERSION`] invalidates every existing plugin.

use std::ffi::{c_char, c_int, c_void, CStr};

/// The current ABI version. Mismatch aborts loading.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Plugin metadata returned by `plugin_query`.
///
/// The strings and string arrays are owned by the plugin and must stay
/// valid until `plugin_shutdown` returns. Both arrays are NULL-terminated.
#[repr(C)]
pub struct PluginInfo {
    pub abi_version: u32,
    pub name: *const c_char,
    pub version: *const c_char,
    pub capabilities: *const *const c_char,
    pub dependencies: *const *const c_char,
}

pub type PluginQueryFn = unsafe extern "C" fn() -> *const PluginInfo;
pub type PluginInitFn = unsafe extern "C" fn(host_ctx: *mut c_void) -> c_int;
pub type PluginShutdownFn = unsafe extern "C" fn();

/// Capability strings a plugin may advertise.
pub mod caps {
    pub const PARSE: &str = "parse";
    pub const TYPECHECK: &str = "typecheck";
    pub const MIR: &str = "mir";
    pub const CODEGEN_IR: &str = "codegen_ir";
    pub const TARGET_X86_64: &str = "target_x86_64";
    pub const TARGET_AARCH64: &str = "target_aarch64";
    pub const TARGET_CUDA: &str = "target_cuda";
    pub const EMIT_OBJ: &str = "emit_obj";
    pub const EMIT_ASM: &str = "emit_asm";
    pub const LINK: &str = "link";
    pub const FORMAT: &str = "format";
    pub const LINT: &str = "lint";
    pub const DOC: &str = "doc";
    pub const SEARCH: &str = "search";
    pub const TEST_RUN: &str = "test_run";
    pub const COVERAGE: &str = "coverage";
    pub const BENCHMARK: &str = "benchmark";
    pub const FUZZ: &str = "fuzz";
    pub const MCP_SERVER: &str = "mcp_server";
}

/// Read a plugin-owned C string; empty on NULL.
///
/// # Safety
///
/// `ptr` must be NULL or point at a NUL-terminated string that outlives the
/// returned copy's construction.
pub unsafe fn read_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Read a NULL-terminated array of C strings.
///
/// # Safety
///
/// `array` must be NULL or point at a NULL-terminated array of valid C
/// string pointers.
pub unsafe fn read_string_array(array: *const *const c_char) -> Vec<String> {
    let mut out = Vec::new();
    if array.is_null() {
        return out;
    }
    let mut cursor = array;
    while !(*cursor).is_null() {
        out.push(read_string(*cursor));
        cursor = cursor.add(1);
    }
    out
}

/// Helper for plugins written in Rust: a static NULL-terminated string
/// array built from byte literals.
#[macro_export]
macro_rules! c_string_array {
    ($($s:expr),* $(,)?) => {
        [
            $(concat!($s, "\0").as_ptr() as *const ::std::ffi::c_char,)*
            ::std::ptr::null(),
        ]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_version_is_one() {
        assert_eq!(PLUGIN_ABI_VERSION, 1);
    }

    #[test]
    fn string_array_reads_until_null() {
        let storage = c_string_array!["parse", "typecheck"];
        let values = unsafe { read_string_array(storage.as_ptr()) };
        assert_eq!(values, vec!["parse".to_string(), "typecheck".to_string()]);
    }

    #[test]
    fn null_pointers_read_as_empty() {
        assert_eq!(unsafe { read_string(std::ptr::null()) }, "");
        assert!(unsafe { read_string_array(std::ptr::null()) }.is_empty());
    }
}
