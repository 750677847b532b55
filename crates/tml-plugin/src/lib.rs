//! Plugin ABI and loader for the TML toolchain.
//!
//! The toolchain's capabilities (parse, typecheck, codegen_ir, emit_obj,
//! link, test_run, ...) ship as separately compressed, dynamically loaded
//! modules behind a stable C ABI:
//!
//! - [`abi`]: the `#[repr(C)]` contract every plugin implements
//! - [`loader`]: discovery, zstd decompression with a CRC32-validated cache,
//!   idempotent loading, reverse-order unload
//! - [`codegen_api`]: the extended C surface of codegen plugins

pub mod abi;
pub mod codegen_api;
pub mod loader;

pub use abi::{PluginInfo, PLUGIN_ABI_VERSION};
pub use codegen_api::CodegenApi;
pub use loader::{dylib_extension, LoadedPlugin, Loader, LoaderError};
