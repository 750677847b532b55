//! Loader integration tests against a real plugin.
//!
//! The workspace's own compiler cdylib doubles as the test plugin: the
//! dev-dependency forces it to build, and the test stages its artifact into
//! a temp `plugins/` directory under the canonical `tml_compiler.<ext>`
//! name. Skips quietly when the cdylib artifact cannot be located (e.g. a
//! doc build).

use std::path::PathBuf;

use tml_plugin::{dylib_extension, Loader, PLUGIN_ABI_VERSION};

// Keep the dev-dependency alive: linking the rlib guarantees the cdylib
// target was built alongside it.
#[allow(unused_imports)]
use tml_compiler as _;

/// Locate the built `tml_compiler` cdylib in the target directory.
fn find_compiler_cdylib() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let deps_dir = exe.parent()?.to_path_buf();
    let profile_dir = if deps_dir.file_name().is_some_and(|n| n == "deps") {
        deps_dir.parent()?.to_path_buf()
    } else {
        deps_dir.clone()
    };

    let prefix = if cfg!(windows) { "tml_compiler" } else { "libtml_compiler" };
    let ext = dylib_extension();

    // Prefer the unhashed copy, then fall back to hashed artifacts in deps/.
    let unhashed = profile_dir.join(format!("{prefix}.{ext}"));
    if unhashed.exists() {
        return Some(unhashed);
    }
    for dir in [profile_dir.join("deps"), deps_dir] {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) && name.ends_with(&format!(".{ext}")) {
                return Some(entry.path());
            }
        }
    }
    None
}

/// Stage the cdylib into a plugins dir under its canonical name and return
/// a loader over it.
fn staged_loader(temp: &tempfile::TempDir) -> Option<Loader> {
    let artifact = find_compiler_cdylib()?;
    let plugins = temp.path().join("plugins");
    std::fs::create_dir_all(&plugins).ok()?;
    let staged = plugins.join(format!("tml_compiler.{}", dylib_extension()));
    std::fs::copy(&artifact, &staged).ok()?;
    Some(Loader::with_dirs(
        vec![plugins],
        temp.path().join("cache"),
    ))
}

#[test]
fn load_verifies_abi_and_reads_metadata() {
    let temp = tempfile::tempdir().expect("temp");
    let Some(mut loader) = staged_loader(&temp) else {
        eprintln!("skipping: tml_compiler cdylib not found");
        return;
    };

    let plugin = loader.load("tml_compiler").expect("load succeeds");
    assert!(plugin.initialized);
    assert_eq!(unsafe { (*plugin.info).abi_version }, PLUGIN_ABI_VERSION);
    assert!(plugin.has_capability("typecheck"));
    assert!(plugin.has_capability("codegen_ir"));
    assert!(!plugin.has_capability("format"));
}

/// Loading is idempotent: the second call returns the same handle and does
/// not re-open the library.
#[test]
fn load_is_idempotent() {
    let temp = tempfile::tempdir().expect("temp");
    let Some(mut loader) = staged_loader(&temp) else {
        eprintln!("skipping: tml_compiler cdylib not found");
        return;
    };

    let first_info = {
        let plugin = loader.load("tml_compiler").expect("first load");
        plugin.info
    };
    let second_info = {
        let plugin = loader.load("tml_compiler").expect("second load");
        plugin.info
    };
    // The same static PluginInfo means the same mapped library.
    assert_eq!(first_info, second_info);
    assert!(loader.is_loaded("tml_compiler"));

    loader.unload_all();
    assert!(!loader.is_loaded("tml_compiler"));
}

/// Extension symbols resolve from a loaded plugin.
#[test]
fn extension_symbol_lookup_finds_compiler_main() {
    let temp = tempfile::tempdir().expect("temp");
    let Some(mut loader) = staged_loader(&temp) else {
        eprintln!("skipping: tml_compiler cdylib not found");
        return;
    };
    let plugin = loader.load("tml_compiler").expect("load");
    let symbol = unsafe {
        plugin.get_symbol::<unsafe extern "C" fn(
            std::ffi::c_int,
            *const *const std::ffi::c_char,
        ) -> std::ffi::c_int>(b"compiler_main\0")
    };
    assert!(symbol.is_some(), "compiler_main must be exported");
}
