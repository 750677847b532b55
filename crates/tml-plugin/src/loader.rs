//! Plugin discovery, decompression, caching, and dynamic loading.
//!
//! Loading flow:
//!
//! 1. search `<exe_dir>/plugins/`, `TML_PLUGIN_DIR`, then
//!    `<exe_dir>/../lib/tml/plugins/` for `name.<ext>` or `name.<ext>.zst`
//! 2. compressed artifacts decompress into the cache; a cached copy whose
//!    recorded CRC32 matches the compressed artifact is reused
//! 3. open the shared library, resolve `plugin_query` / `plugin_init` /
//!    `plugin_shutdown`, verify the ABI version
//! 4. run `plugin_init`; record the handle
//!
//! A second `load` of the same name returns the existing handle unchanged.
//! `unload_all` shuts plugins down in reverse load order. The cache never
//! shrinks automatically.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::abi::{
    self, PluginInfo, PluginInitFn, PluginQueryFn, PluginShutdownFn, PLUGIN_ABI_VERSION,
};

/// Loader failures, each with its stable diagnostic code.
#[derive(Debug)]
pub enum LoaderError {
    /// No artifact found for the name. (`L010`)
    NotFound { name: String, searched: Vec<PathBuf> },
    /// The plugin was built against a different ABI. (`L001`)
    AbiMismatch { name: String, found: u32 },
    /// A required export is missing. (`L002`)
    MissingExport { name: String, symbol: String },
    /// Decompression or cache validation failed. (`L003`)
    Decompress { name: String, detail: String },
    /// `plugin_init` returned non-zero. (`L004`)
    InitFailed { name: String, code: i32 },
    /// Platform loader failure. (`L005`)
    Open { name: String, detail: String },
    /// Filesystem failure. (`L006`)
    Io { detail: String },
}

impl LoaderError {
    pub fn code(&self) -> &'static str {
        match self {
            LoaderError::AbiMismatch { .. } => "L001",
            LoaderError::MissingExport { .. } => "L002",
            LoaderError::Decompress { .. } => "L003",
            LoaderError::InitFailed { .. } => "L004",
            LoaderError::Open { .. } => "L005",
            LoaderError::Io { .. } => "L006",
            LoaderError::NotFound { .. } => "L010",
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::NotFound { name, searched } => {
                write!(f, "plugin '{name}' not found; searched ")?;
                for (i, dir) in searched.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dir.display())?;
                }
                Ok(())
            }
            LoaderError::AbiMismatch { name, found } => write!(
                f,
                "plugin '{name}' has ABI version {found}, expected {PLUGIN_ABI_VERSION}"
            ),
            LoaderError::MissingExport { name, symbol } => {
                write!(f, "plugin '{name}' does not export '{symbol}'")
            }
            LoaderError::Decompress { name, detail } => {
                write!(f, "failed to decompress plugin '{name}': {detail}")
            }
            LoaderError::InitFailed { name, code } => {
                write!(f, "plugin '{name}' init failed with code {code}")
            }
            LoaderError::Open { name, detail } => {
                write!(f, "cannot open plugin '{name}': {detail}")
            }
            LoaderError::Io { detail } => write!(f, "plugin I/O error: {detail}"),
        }
    }
}

impl std::error::Error for LoaderError {}

/// A loaded plugin: OS handle, parsed metadata, and entry points.
pub struct LoadedPlugin {
    /// Keeps the shared library mapped. Dropped last.
    library: Library,
    /// Borrowed metadata; the plugin owns the pointed-to storage.
    pub info: *const PluginInfo,
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub dependencies: Vec<String>,
    shutdown: PluginShutdownFn,
    pub dll_path: PathBuf,
    pub initialized: bool,
}

impl LoadedPlugin {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Resolve an additional exported symbol (e.g. `compiler_main`).
    ///
    /// # Safety
    ///
    /// The caller must name the correct function type for the symbol.
    pub unsafe fn get_symbol<T>(&self, symbol: &[u8]) -> Option<libloading::Symbol<'_, T>> {
        self.library.get(symbol).ok()
    }
}

/// The plugin loader. Owns every handle; callers borrow.
pub struct Loader {
    search_dirs: Vec<PathBuf>,
    cache_dir: PathBuf,
    /// Load order is preserved for reverse-order shutdown.
    loaded: Vec<LoadedPlugin>,
}

impl Loader {
    /// Create a loader with the standard search path and cache location.
    pub fn new() -> Self {
        let mut search_dirs = Vec::new();
        if let Some(exe_dir) = exe_dir() {
            search_dirs.push(exe_dir.join("plugins"));
            if let Some(parent) = exe_dir.parent() {
                search_dirs.push(parent.join("lib").join("tml").join("plugins"));
            }
        }
        // The env override slots between the exe-relative entries.
        if let Ok(dir) = std::env::var("TML_PLUGIN_DIR") {
            search_dirs.insert(search_dirs.len().min(1), PathBuf::from(dir));
        }
        Loader {
            search_dirs,
            cache_dir: default_cache_dir(),
            loaded: Vec::new(),
        }
    }

    /// A loader with explicit directories (tests, embedding).
    pub fn with_dirs(search_dirs: Vec<PathBuf>, cache_dir: PathBuf) -> Self {
        Loader {
            search_dirs,
            cache_dir,
            loaded: Vec::new(),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&LoadedPlugin> {
        self.loaded.iter().find(|p| p.name == name)
    }

    /// Load a plugin by name. Idempotent: a second call returns the
    /// already-loaded handle.
    pub fn load(&mut self, name: &str) -> Result<&LoadedPlugin, LoaderError> {
        if let Some(index) = self.loaded.iter().position(|p| p.name == name) {
            return Ok(&self.loaded[index]);
        }

        let artifact = self.find_artifact(name)?;
        let dll_path = match artifact {
            Artifact::Ready(path) => path,
            Artifact::Compressed(path) => self.ensure_decompressed(name, &path)?,
        };

        let plugin = self.open_and_init(name, &dll_path)?;
        self.loaded.push(plugin);
        Ok(self.loaded.last().expect("just pushed"))
    }

    /// Shut every plugin down in reverse load order and release the handles.
    pub fn unload_all(&mut self) {
        while let Some(plugin) = self.loaded.pop() {
            log::debug!("shutting down plugin '{}'", plugin.name);
            unsafe { (plugin.shutdown)() };
            // `plugin.library` drops here, releasing the OS handle.
        }
    }

    // ── discovery ────────────────────────────────────────────────────

    fn find_artifact(&self, name: &str) -> Result<Artifact, LoaderError> {
        let ext = dylib_extension();
        for dir in &self.search_dirs {
            let ready = dir.join(format!("{name}.{ext}"));
            if ready.exists() {
                return Ok(Artifact::Ready(ready));
            }
            let compressed = dir.join(format!("{name}.{ext}.zst"));
            if compressed.exists() {
                return Ok(Artifact::Compressed(compressed));
            }
        }
        Err(LoaderError::NotFound {
            name: name.to_string(),
            searched: self.search_dirs.clone(),
        })
    }

    // ── decompression cache ──────────────────────────────────────────

    /// Decompress into the cache unless a valid copy already exists.
    /// Validity = the recorded CRC32 of the *compressed* artifact matches.
    pub fn ensure_decompressed(
        &self,
        name: &str,
        compressed: &Path,
    ) -> Result<PathBuf, LoaderError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| LoaderError::Io {
            detail: format!("cannot create cache dir: {e}"),
        })?;

        let ext = dylib_extension();
        let cached = self.cache_dir.join(format!("{name}.{ext}"));
        let crc_sidecar = self.cache_dir.join(format!("{name}.{ext}.crc32"));

        let current_crc = file_crc32(compressed).map_err(|e| LoaderError::Io { detail: e })?;

        if cached.exists() {
            if let Ok(recorded) = std::fs::read_to_string(&crc_sidecar) {
                if recorded.trim() == format!("{current_crc:08x}") {
                    log::debug!("plugin cache hit for '{name}'");
                    return Ok(cached);
                }
            }
        }

        log::debug!("decompressing plugin '{name}'");
        let input = std::fs::File::open(compressed).map_err(|e| LoaderError::Io {
            detail: format!("open {}: {e}", compressed.display()),
        })?;
        let temp = cached.with_extension(format!("{ext}.tmp"));
        let output = std::fs::File::create(&temp).map_err(|e| LoaderError::Io {
            detail: format!("create {}: {e}", temp.display()),
        })?;
        zstd::stream::copy_decode(input, output).map_err(|e| LoaderError::Decompress {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        std::fs::rename(&temp, &cached).map_err(|e| LoaderError::Io {
            detail: format!("publish {}: {e}", cached.display()),
        })?;
        std::fs::write(&crc_sidecar, format!("{current_crc:08x}\n")).map_err(|e| {
            LoaderError::Io {
                detail: format!("write crc sidecar: {e}"),
            }
        })?;
        Ok(cached)
    }

    // ── dynamic loading ──────────────────────────────────────────────

    fn open_and_init(&self, name: &str, dll_path: &Path) -> Result<LoadedPlugin, LoaderError> {
        let library = unsafe { Library::new(dll_path) }.map_err(|e| LoaderError::Open {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

        let query: PluginQueryFn = resolve(&library, name, "plugin_query")?;
        let init: PluginInitFn = resolve(&library, name, "plugin_init")?;
        let shutdown: PluginShutdownFn = resolve(&library, name, "plugin_shutdown")?;

        let info = unsafe { query() };
        if info.is_null() {
            return Err(LoaderError::MissingExport {
                name: name.to_string(),
                symbol: "plugin_query (returned NULL)".to_string(),
            });
        }
        let abi_version = unsafe { (*info).abi_version };
        if abi_version != PLUGIN_ABI_VERSION {
            return Err(LoaderError::AbiMismatch {
                name: name.to_string(),
                found: abi_version,
            });
        }

        let (plugin_name, version, capabilities, dependencies) = unsafe {
            (
                abi::read_string((*info).name),
                abi::read_string((*info).version),
                abi::read_string_array((*info).capabilities),
                abi::read_string_array((*info).dependencies),
            )
        };

        let code = unsafe { init(std::ptr::null_mut()) };
        if code != 0 {
            // Shutdown is owed even after failed init.
            unsafe { shutdown() };
            return Err(LoaderError::InitFailed {
                name: name.to_string(),
                code,
            });
        }

        log::info!("loaded plugin '{plugin_name}' v{version}");
        Ok(LoadedPlugin {
            library,
            info,
            // Bookkeeping is keyed by the requested artifact name; the
            // query name is informational.
            name: name.to_string(),
            version,
            capabilities,
            dependencies,
            shutdown,
            dll_path: dll_path.to_path_buf(),
            initialized: true,
        })
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.unload_all();
    }
}

enum Artifact {
    Ready(PathBuf),
    Compressed(PathBuf),
}

fn resolve<T: Copy>(library: &Library, name: &str, symbol: &str) -> Result<T, LoaderError> {
    let mut owned = symbol.as_bytes().to_vec();
    owned.push(0);
    unsafe {
        library
            .get::<T>(&owned)
            .map(|s| *s)
            .map_err(|_| LoaderError::MissingExport {
                name: name.to_string(),
                symbol: symbol.to_string(),
            })
    }
}

/// CRC32 of a file's bytes.
fn file_crc32(path: &Path) -> Result<u32, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("open {}: {e}", path.display()))?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| format!("read {}: {e}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize())
}

/// The platform's shared-library extension.
pub fn dylib_extension() -> &'static str {
    if cfg!(windows) {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
}

fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TML_CACHE_DIR") {
        return PathBuf::from(dir).join("plugins");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cache").join("tml").join("plugins");
    }
    if let Ok(appdata) = std::env::var("LOCALAPPDATA") {
        return PathBuf::from(appdata).join("tml").join("cache").join("plugins");
    }
    std::env::temp_dir().join("tml-cache").join("plugins")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_plugin_reports_search_path() {
        let temp = tempfile::tempdir().expect("temp");
        let mut loader = Loader::with_dirs(
            vec![temp.path().join("plugins")],
            temp.path().join("cache"),
        );
        let err = loader.load("tml_missing").expect_err("must not exist");
        assert_eq!(err.code(), "L010");
        assert!(err.to_string().contains("tml_missing"));
    }

    #[test]
    fn decompression_cache_round_trips_and_revalidates() {
        let temp = tempfile::tempdir().expect("temp");
        let plugins = temp.path().join("plugins");
        std::fs::create_dir_all(&plugins).expect("mkdir");
        let loader = Loader::with_dirs(vec![plugins.clone()], temp.path().join("cache"));

        // A compressed "plugin" (payload content is irrelevant to caching).
        let payload = b"not really a shared library, but bytes all the same";
        let compressed_bytes = zstd::stream::encode_all(&payload[..], 3).expect("compress");
        let ext = dylib_extension();
        let compressed_path = plugins.join(format!("tml_demo.{ext}.zst"));
        std::fs::write(&compressed_path, &compressed_bytes).expect("write");

        let cached = loader
            .ensure_decompressed("tml_demo", &compressed_path)
            .expect("decompress");
        assert_eq!(std::fs::read(&cached).expect("read"), payload);

        // Second call must reuse the cache file (same mtime).
        let before = std::fs::metadata(&cached).expect("meta").modified().ok();
        let again = loader
            .ensure_decompressed("tml_demo", &compressed_path)
            .expect("revalidate");
        assert_eq!(cached, again);
        let after = std::fs::metadata(&cached).expect("meta").modified().ok();
        assert_eq!(before, after, "cache hit must not rewrite the artifact");

        // A changed artifact invalidates the cache.
        let other = zstd::stream::encode_all(&b"different payload"[..], 3).expect("compress");
        std::fs::write(&compressed_path, &other).expect("write");
        let refreshed = loader
            .ensure_decompressed("tml_demo", &compressed_path)
            .expect("refresh");
        assert_eq!(
            std::fs::read(&refreshed).expect("read"),
            b"different payload"
        );
    }

    #[test]
    fn corrupt_artifact_is_l003() {
        let temp = tempfile::tempdir().expect("temp");
        let plugins = temp.path().join("plugins");
        std::fs::create_dir_all(&plugins).expect("mkdir");
        let loader = Loader::with_dirs(vec![plugins.clone()], temp.path().join("cache"));

        let ext = dylib_extension();
        let compressed_path = plugins.join(format!("tml_bad.{ext}.zst"));
        std::fs::write(&compressed_path, b"this is not zstd data").expect("write");

        let err = loader
            .ensure_decompressed("tml_bad", &compressed_path)
            .expect_err("must fail");
        assert_eq!(err.code(), "L003");
    }
}
