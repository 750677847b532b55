//! Thread-safe on-disk object cache.
//!
//! Artifacts are keyed by `(source file path, flag-hash prefix)`: the cached
//! name is `<base>_<flag-hash>.o`, so a flag change compiles fresh while the
//! old artifact stays for builds still using it. Writes are atomic
//! (temp-then-rename); a crashed writer leaves no partial artifact behind.
//!
//! Concurrent compilations of the same key coordinate through an in-progress
//! map: the second thread waits (bounded polling on file existence) for the
//! first to publish.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// The cache root plus the in-progress set.
pub struct ObjectCache {
    root: PathBuf,
    in_progress: Mutex<HashSet<PathBuf>>,
}

impl ObjectCache {
    /// Open (and create) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| format!("cannot create cache dir {}: {e}", root.display()))?;
        Ok(ObjectCache {
            root,
            in_progress: Mutex::new(HashSet::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The artifact path for a source file compiled under a flag set.
    pub fn artifact_path(&self, source: &Path, flags: &str) -> PathBuf {
        let base = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("object");
        let hash = flag_hash(source, flags);
        self.root.join(format!("{base}_{hash:08x}.o"))
    }

    /// Look up a cached artifact; `None` means the caller must compile.
    pub fn lookup(&self, source: &Path, flags: &str) -> Option<PathBuf> {
        let path = self.artifact_path(source, flags);
        path.exists().then_some(path)
    }

    /// Get-or-compute: returns the cached artifact, or runs `compile` and
    /// publishes its output atomically.
    ///
    /// If another thread is already compiling the same key, this waits with
    /// bounded polling for the artifact to appear.
    pub fn get_or_compile<F>(
        &self,
        source: &Path,
        flags: &str,
        compile: F,
    ) -> Result<PathBuf, String>
    where
        F: FnOnce(&Path) -> Result<(), String>,
    {
        let artifact = self.artifact_path(source, flags);
        if artifact.exists() {
            return Ok(artifact);
        }

        // Claim the key, or wait for the thread that holds it.
        let claimed = {
            let mut in_progress = self
                .in_progress
                .lock()
                .map_err(|_| "cache mutex poisoned".to_string())?;
            in_progress.insert(artifact.clone())
        };
        if !claimed {
            return self.wait_for(&artifact);
        }

        let result = self.compile_and_publish(&artifact, compile);
        let mut in_progress = self
            .in_progress
            .lock()
            .map_err(|_| "cache mutex poisoned".to_string())?;
        in_progress.remove(&artifact);
        result?;
        Ok(artifact)
    }

    fn compile_and_publish<F>(&self, artifact: &Path, compile: F) -> Result<(), String>
    where
        F: FnOnce(&Path) -> Result<(), String>,
    {
        let temp = artifact.with_extension("o.tmp");
        compile(&temp)?;
        std::fs::rename(&temp, artifact)
            .map_err(|e| format!("cache publish failed for {}: {e}", artifact.display()))
    }

    /// Bounded polling for another thread's artifact.
    fn wait_for(&self, artifact: &Path) -> Result<PathBuf, String> {
        for _ in 0..600 {
            if artifact.exists() {
                return Ok(artifact.to_path_buf());
            }
            // Cheap check: the other thread may have failed and released.
            let gone = {
                let in_progress = self
                    .in_progress
                    .lock()
                    .map_err(|_| "cache mutex poisoned".to_string())?;
                !in_progress.contains(artifact)
            };
            if gone && !artifact.exists() {
                return Err(format!(
                    "concurrent compilation of {} failed",
                    artifact.display()
                ));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(format!("timed out waiting for {}", artifact.display()))
    }
}

/// FNV-1a over the source path and flag string; the artifact key.
fn flag_hash(source: &Path, flags: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    let mut eat = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= b as u32;
            hash = hash.wrapping_mul(0x01000193);
        }
    };
    eat(source.to_string_lossy().as_bytes());
    eat(b"\0");
    eat(flags.as_bytes());
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_key_varies_with_flags() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = ObjectCache::new(dir.path()).expect("cache");
        let source = Path::new("/src/runtime.c");
        let a = cache.artifact_path(source, "-O0");
        let b = cache.artifact_path(source, "-O2");
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("runtime_"));
    }

    #[test]
    fn get_or_compile_publishes_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = ObjectCache::new(dir.path()).expect("cache");
        let source = Path::new("/src/runtime.c");

        let first = cache
            .get_or_compile(source, "-O0", |out| {
                std::fs::write(out, b"object-bytes").map_err(|e| e.to_string())
            })
            .expect("first compile");
        assert!(first.exists());

        // The second call must not re-run the compile closure.
        let second = cache
            .get_or_compile(source, "-O0", |_| {
                panic!("cache hit must not recompile");
            })
            .expect("cache hit");
        assert_eq!(first, second);
    }

    #[test]
    fn failed_compile_leaves_no_artifact() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = ObjectCache::new(dir.path()).expect("cache");
        let source = Path::new("/src/broken.c");

        let err = cache
            .get_or_compile(source, "-O0", |_| Err("boom".to_string()))
            .expect_err("compile failure propagates");
        assert!(err.contains("boom"));
        assert!(cache.lookup(source, "-O0").is_none());
    }

    #[test]
    fn concurrent_compiles_share_one_artifact() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let dir = tempfile::tempdir().expect("temp dir");
        let cache = Arc::new(ObjectCache::new(dir.path()).expect("cache"));
        let compiles = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let compiles = Arc::clone(&compiles);
            handles.push(std::thread::spawn(move || {
                cache
                    .get_or_compile(Path::new("/src/shared.c"), "-O1", |out| {
                        compiles.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        std::fs::write(out, b"shared").map_err(|e| e.to_string())
                    })
                    .expect("compile or wait")
            }));
        }
        let paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(compiles.load(Ordering::SeqCst), 1);
    }
}
