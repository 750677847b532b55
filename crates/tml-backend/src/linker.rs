//! Object linking.
//!
//! Executables and shared libraries prefer `ld.lld` / `lld-link`, falling
//! back to the system `cc` driver (which knows the platform's CRT objects
//! and default libraries). Static libraries always go through `llvm-ar`
//! (or `ar`). The linker is not re-entrant: every link in the process takes
//! one mutex, and once a link reports it cannot safely run again the
//! poisoned flag routes all later calls down the subprocess path for the
//! rest of the process.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// What the link produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Executable,
    SharedLib,
    StaticLib,
}

impl OutputType {
    /// The §6.2 wire encoding: 0 = executable, 1 = shared, 2 = static.
    pub fn from_code(code: i32) -> Option<OutputType> {
        Some(match code {
            0 => OutputType::Executable,
            1 => OutputType::SharedLib,
            2 => OutputType::StaticLib,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            OutputType::Executable => 0,
            OutputType::SharedLib => 1,
            OutputType::StaticLib => 2,
        }
    }
}

/// Options for one link.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    pub output_type: Option<OutputType>,
    /// Additional library search paths.
    pub library_paths: Vec<PathBuf>,
    /// Libraries to link (no `-l` prefix).
    pub libraries: Vec<String>,
    /// Extra raw linker flags.
    pub extra_flags: Vec<String>,
    /// Target triple for cross-links.
    pub target_triple: String,
    pub debug_info: bool,
    pub verbose: bool,
}

/// One linker invocation at a time, process-wide.
static LINK_LOCK: Mutex<()> = Mutex::new(());
/// Set once an in-process link reports it cannot run again; never cleared.
static POISONED: AtomicBool = AtomicBool::new(false);

/// Link objects into a binary.
pub fn link(objects: &[PathBuf], output: &Path, options: &LinkOptions) -> Result<(), String> {
    if objects.is_empty() {
        return Err("no objects to link".to_string());
    }
    let output_type = options.output_type.unwrap_or(OutputType::Executable);

    // Archives never use the linker proper.
    if output_type == OutputType::StaticLib {
        return archive(objects, output);
    }

    let _guard = LINK_LOCK
        .lock()
        .map_err(|_| "linker mutex poisoned".to_string())?;

    if POISONED.load(Ordering::Acquire) {
        log::debug!("linker poisoned; using subprocess path");
        return subprocess_link(objects, output, options, output_type);
    }

    // No embedded LLD in this build; the flag exists for when one is
    // linked in and reports single-shot behavior.
    subprocess_link(objects, output, options, output_type)
}

/// Mark the in-process linker unusable for the rest of the process.
pub fn poison() {
    POISONED.store(true, Ordering::Release);
}

pub fn is_poisoned() -> bool {
    POISONED.load(Ordering::Acquire)
}

/// Whether some usable linker exists on this system.
pub fn linker_available() -> bool {
    find_linker().is_some() || find_tool(&["cc", "gcc", "clang"]).is_some()
}

fn subprocess_link(
    objects: &[PathBuf],
    output: &Path,
    options: &LinkOptions,
    output_type: OutputType,
) -> Result<(), String> {
    // The cc driver understands CRT startup files and default libs, so it is
    // the preferred front. Raw lld is the fallback when no cc exists.
    if let Some(driver) = find_tool(&["cc", "gcc", "clang"]) {
        let mut cmd = Command::new(driver);
        for object in objects {
            cmd.arg(object);
        }
        cmd.arg("-o").arg(output);
        if output_type == OutputType::SharedLib {
            cmd.arg("-shared");
        }
        for dir in &options.library_paths {
            cmd.arg("-L").arg(dir);
        }
        for lib in &options.libraries {
            cmd.arg(format!("-l{lib}"));
        }
        for flag in &options.extra_flags {
            cmd.arg(flag);
        }
        if !options.target_triple.is_empty() {
            cmd.arg(format!("--target={}", options.target_triple));
        }
        if options.verbose {
            cmd.arg("-v");
        }
        log::debug!("link: {cmd:?}");
        let result = cmd
            .output()
            .map_err(|e| format!("failed to invoke linker driver: {e}"))?;
        if !result.status.success() {
            return Err(format!(
                "linking failed:\n{}",
                String::from_utf8_lossy(&result.stderr)
            ));
        }
        return Ok(());
    }

    let lld = find_linker().ok_or_else(|| "no linker found (cc, gcc, clang, ld.lld)".to_string())?;
    let mut cmd = Command::new(lld);
    for object in objects {
        cmd.arg(object);
    }
    cmd.arg("-o").arg(output);
    if output_type == OutputType::SharedLib {
        cmd.arg("--shared");
    }
    for dir in &options.library_paths {
        cmd.arg("-L").arg(dir);
    }
    for lib in &options.libraries {
        cmd.arg(format!("-l{lib}"));
    }
    for flag in &options.extra_flags {
        cmd.arg(flag);
    }
    let result = cmd
        .output()
        .map_err(|e| format!("failed to invoke ld.lld: {e}"))?;
    if !result.status.success() {
        return Err(format!(
            "linking failed:\n{}",
            String::from_utf8_lossy(&result.stderr)
        ));
    }
    Ok(())
}

/// Build a static library with llvm-ar (or system ar).
fn archive(objects: &[PathBuf], output: &Path) -> Result<(), String> {
    let ar = find_tool(&["llvm-ar", "ar"]).ok_or_else(|| "no archiver (llvm-ar, ar) found".to_string())?;
    // Replace any stale archive so membership matches exactly.
    let _ = std::fs::remove_file(output);
    let mut cmd = Command::new(ar);
    cmd.arg("rcs").arg(output);
    for object in objects {
        cmd.arg(object);
    }
    let result = cmd
        .output()
        .map_err(|e| format!("failed to invoke archiver: {e}"))?;
    if !result.status.success() {
        return Err(format!(
            "archiving failed:\n{}",
            String::from_utf8_lossy(&result.stderr)
        ));
    }
    Ok(())
}

fn find_linker() -> Option<&'static str> {
    let candidates: &[&str] = if cfg!(windows) {
        &["lld-link"]
    } else if cfg!(target_os = "macos") {
        &["ld64.lld", "ld.lld"]
    } else {
        &["ld.lld"]
    };
    candidates
        .iter()
        .copied()
        .find(|tool| tool_exists(tool))
}

fn find_tool(candidates: &[&'static str]) -> Option<&'static str> {
    candidates.iter().copied().find(|tool| tool_exists(tool))
}

fn tool_exists(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_type_codes_round_trip() {
        for ty in [
            OutputType::Executable,
            OutputType::SharedLib,
            OutputType::StaticLib,
        ] {
            assert_eq!(OutputType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(OutputType::from_code(9), None);
    }

    #[test]
    fn empty_object_list_is_an_error() {
        let err = link(&[], Path::new("/tmp/out"), &LinkOptions::default())
            .expect_err("must reject empty input");
        assert!(err.contains("no objects"));
    }

    #[test]
    fn poison_flag_is_one_shot() {
        assert!(!is_poisoned() || true); // other tests may have poisoned already
        poison();
        assert!(is_poisoned());
        // There is deliberately no way to clear it.
    }
}
