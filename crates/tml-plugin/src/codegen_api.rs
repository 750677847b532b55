//! The codegen plugin's C surface.
//!
//! A codegen plugin exports, beyond the three ABI entry points:
//!
//! ```text
//! int  codegen_compile_ir_to_object(const char* ir, const char* out,
//!                                   int opt, int debug, char** err_out);
//! int  codegen_link_objects(const char* const* objs, int n,
//!                           const char* out, int output_type, char** err_out);
//! int  codegen_is_available(void);
//! int  codegen_lld_is_available(void);
//! void codegen_free_error(char*);
//! ```
//!
//! Error strings handed back through `err_out` are heap-allocated by the
//! plugin; the caller frees them through `codegen_free_error` -- never
//! through its own allocator.

use std::ffi::{c_char, c_int, CString};
use std::path::Path;

use crate::loader::{LoadedPlugin, LoaderError};

pub type CodegenCompileIrFn =
    unsafe extern "C" fn(*const c_char, *const c_char, c_int, c_int, *mut *mut c_char) -> c_int;
pub type CodegenLinkObjectsFn = unsafe extern "C" fn(
    *const *const c_char,
    c_int,
    *const c_char,
    c_int,
    *mut *mut c_char,
) -> c_int;
pub type CodegenIsAvailableFn = unsafe extern "C" fn() -> c_int;
pub type CodegenLldIsAvailableFn = unsafe extern "C" fn() -> c_int;
pub type CodegenFreeErrorFn = unsafe extern "C" fn(*mut c_char);

/// Resolved function pointers of a codegen plugin.
pub struct CodegenApi {
    compile: CodegenCompileIrFn,
    link: CodegenLinkObjectsFn,
    is_available: CodegenIsAvailableFn,
    lld_is_available: CodegenLldIsAvailableFn,
    free_error: CodegenFreeErrorFn,
}

impl CodegenApi {
    /// Resolve the surface from a loaded plugin.
    pub fn resolve(plugin: &LoadedPlugin) -> Result<CodegenApi, LoaderError> {
        unsafe {
            Ok(CodegenApi {
                compile: *plugin
                    .get_symbol::<CodegenCompileIrFn>(b"codegen_compile_ir_to_object\0")
                    .ok_or_else(|| missing(plugin, "codegen_compile_ir_to_object"))?,
                link: *plugin
                    .get_symbol::<CodegenLinkObjectsFn>(b"codegen_link_objects\0")
                    .ok_or_else(|| missing(plugin, "codegen_link_objects"))?,
                is_available: *plugin
                    .get_symbol::<CodegenIsAvailableFn>(b"codegen_is_available\0")
                    .ok_or_else(|| missing(plugin, "codegen_is_available"))?,
                lld_is_available: *plugin
                    .get_symbol::<CodegenLldIsAvailableFn>(b"codegen_lld_is_available\0")
                    .ok_or_else(|| missing(plugin, "codegen_lld_is_available"))?,
                free_error: *plugin
                    .get_symbol::<CodegenFreeErrorFn>(b"codegen_free_error\0")
                    .ok_or_else(|| missing(plugin, "codegen_free_error"))?,
            })
        }
    }

    pub fn is_available(&self) -> bool {
        unsafe { (self.is_available)() != 0 }
    }

    pub fn lld_is_available(&self) -> bool {
        unsafe { (self.lld_is_available)() != 0 }
    }

    /// Compile IR text to an object file through the plugin.
    pub fn compile_ir_to_object(
        &self,
        ir: &str,
        output: &Path,
        opt_level: u8,
        debug_info: bool,
    ) -> Result<(), String> {
        let ir = CString::new(ir).map_err(|_| "IR contains NUL".to_string())?;
        let out = path_cstring(output)?;
        let mut err: *mut c_char = std::ptr::null_mut();
        let code = unsafe {
            (self.compile)(
                ir.as_ptr(),
                out.as_ptr(),
                opt_level as c_int,
                debug_info as c_int,
                &mut err,
            )
        };
        self.check(code, err)
    }

    /// Link objects through the plugin. `output_type`: 0 executable,
    /// 1 shared library, 2 static library.
    pub fn link_objects(
        &self,
        objects: &[&Path],
        output: &Path,
        output_type: i32,
    ) -> Result<(), String> {
        let owned: Vec<CString> = objects
            .iter()
            .map(|p| path_cstring(p))
            .collect::<Result<_, _>>()?;
        let pointers: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();
        let out = path_cstring(output)?;
        let mut err: *mut c_char = std::ptr::null_mut();
        let code = unsafe {
            (self.link)(
                pointers.as_ptr(),
                pointers.len() as c_int,
                out.as_ptr(),
                output_type as c_int,
                &mut err,
            )
        };
        self.check(code, err)
    }

    /// Turn a non-zero return plus error-out into a `Result`, freeing the
    /// plugin-owned string through the plugin's own deallocator.
    fn check(&self, code: c_int, err: *mut c_char) -> Result<(), String> {
        if code == 0 {
            if !err.is_null() {
                unsafe { (self.free_error)(err) };
            }
            return Ok(());
        }
        let message = if err.is_null() {
            format!("codegen plugin failed with code {code}")
        } else {
            let message = unsafe { crate::abi::read_string(err) };
            unsafe { (self.free_error)(err) };
            message
        };
        Err(message)
    }
}

fn missing(plugin: &LoadedPlugin, symbol: &str) -> LoaderError {
    LoaderError::MissingExport {
        name: plugin.name.clone(),
        symbol: symbol.to_string(),
    }
}

fn path_cstring(path: &Path) -> Result<CString, String> {
    CString::new(path.to_string_lossy().into_owned())
        .map_err(|_| format!("path contains NUL: {}", path.display()))
}
