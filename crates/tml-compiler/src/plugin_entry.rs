//! Plugin ABI exports for the compiler module.
//!
//! The thin launcher loads this cdylib, verifies the ABI, and calls the
//! exported `compiler_main(argc, argv)`. The metadata statics live for the
//! whole process; the loader borrows them and never frees.

use std::ffi::{c_char, c_int, c_void};

use tml_plugin::abi::{PluginInfo, PLUGIN_ABI_VERSION};
use tml_plugin::c_string_array;

/// Raw-pointer statics are immutable for the process lifetime.
struct Static<T>(T);
unsafe impl<T> Sync for Static<T> {}

static CAPABILITIES: Static<[*const c_char; 4]> =
    Static(c_string_array!["typecheck", "mir", "codegen_ir"]);
static DEPENDENCIES: Static<[*const c_char; 1]> = Static(c_string_array![]);

static INFO: Static<PluginInfo> = Static(PluginInfo {
    abi_version: PLUGIN_ABI_VERSION,
    name: c"tml_compiler".as_ptr(),
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

/// The launcher's delegation target: dispatch `argv` through the CLI.
///
/// # Safety
///
/// `argv` must point at `argc` valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn compiler_main(argc: c_int, argv: *const *const c_char) -> c_int {
    let mut args = Vec::with_capacity(argc.max(0) as usize);
    for i in 0..argc.max(0) {
        let ptr = *argv.add(i as usize);
        args.push(tml_plugin::abi::read_string(ptr));
    }
    crate::cli::run(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_reports_current_abi() {
        let info = plugin_query();
        assert!(!info.is_null());
        unsafe {
            assert_eq!((*info).abi_version, PLUGIN_ABI_VERSION);
            assert_eq!(tml_plugin::abi::read_string((*info).name), "tml_compiler");
            let caps = tml_plugin::abi::read_string_array((*info).capabilities);
            assert!(caps.contains(&"typecheck".to_string()));
        }
    }

    #[test]
    fn init_succeeds_and_is_cheap() {
        assert_eq!(plugin_init(std::ptr::null_mut()), 0);
        plugin_shutdown();
    }
}
