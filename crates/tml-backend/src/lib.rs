//! Native toolchain integration.
//!
//! Turns IR text into object bytes and objects into binaries:
//!
//! - [`llvm`]: IR -> object, in-process when the `llvm` feature is enabled
//!   (the backend parses the IR and drives a target machine), otherwise via
//!   a `clang` subprocess.
//! - [`linker`]: objects -> executable / shared / static. The in-process or
//!   `ld.lld`/`lld-link` path is serialized behind a process-wide mutex --
//!   the linker is not re-entrant -- with a one-shot poison flag that
//!   permanently falls back to subprocess linking.
//! - [`cache`]: a thread-safe on-disk object cache keyed by
//!   `(source path, flag-hash prefix)`.
//! - [`cgu`]: bounded-parallel compilation of compilation groups, one
//!   backend context per worker.
//! - [`msvc`]: Visual Studio and Windows SDK discovery for Windows links.

pub mod cache;
pub mod cgu;
pub mod linker;
pub mod llvm;
pub mod msvc;

pub use cache::ObjectCache;
pub use cgu::{compile_groups, CompilationGroup};
pub use linker::{link, LinkOptions, OutputType};
pub use llvm::{compile_ir_to_object, CompileOptions};
