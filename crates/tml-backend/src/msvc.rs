//! Visual Studio and Windows SDK discovery.
//!
//! Windows links need the MSVC toolchain's library directories and the
//! Windows Kits include/lib paths. Discovery prefers VS 2022 over 2019 and,
//! within a version, Community/Professional/Enterprise/BuildTools in that
//! order; tool directories pick the highest versioned subdirectory, and the
//! SDK the highest `10.*` kit.
//!
//! The scanning logic takes explicit roots so it is testable on any host;
//! [`discover`] feeds it the conventional install locations.

use std::path::{Path, PathBuf};

/// A discovered MSVC + SDK installation.
#[derive(Debug, Clone)]
pub struct MsvcInstallation {
    /// `VC\Tools\MSVC\<version>` of the chosen Visual Studio.
    pub vc_tools: PathBuf,
    /// `Windows Kits\10\Lib\<version>`.
    pub sdk_lib: PathBuf,
    /// `Windows Kits\10\Include\<version>`.
    pub sdk_include: PathBuf,
}

impl MsvcInstallation {
    /// Library directories for an x64 link.
    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.vc_tools.join("lib").join("x64"),
            self.sdk_lib.join("um").join("x64"),
            self.sdk_lib.join("ucrt").join("x64"),
        ]
    }
}

/// Editions in preference order.
const EDITIONS: &[&str] = &["Community", "Professional", "Enterprise", "BuildTools"];
/// Visual Studio release years in preference order.
const RELEASES: &[&str] = &["2022", "2019"];

/// Discover an installation from the conventional roots.
pub fn discover() -> Option<MsvcInstallation> {
    let program_files = std::env::var("ProgramFiles").unwrap_or_else(|_| {
        "C:\\Program Files".to_string()
    });
    let program_files_x86 = std::env::var("ProgramFiles(x86)").unwrap_or_else(|_| {
        "C:\\Program Files (x86)".to_string()
    });
    let vs_roots = [
        PathBuf::from(&program_files).join("Microsoft Visual Studio"),
        PathBuf::from(&program_files_x86).join("Microsoft Visual Studio"),
    ];
    let kits_root = PathBuf::from(&program_files_x86).join("Windows Kits").join("10");
    discover_from(&vs_roots, &kits_root)
}

/// Discovery against explicit roots.
pub fn discover_from(vs_roots: &[PathBuf], kits_root: &Path) -> Option<MsvcInstallation> {
    let vc_tools = find_vc_tools(vs_roots)?;
    let sdk_version = highest_versioned_subdir(&kits_root.join("Lib"), "10.")?;
    let sdk_lib = kits_root.join("Lib").join(&sdk_version);
    let sdk_include = kits_root.join("Include").join(&sdk_version);
    Some(MsvcInstallation {
        vc_tools,
        sdk_lib,
        sdk_include,
    })
}

/// The best `VC\Tools\MSVC\<version>` across roots, releases, editions.
fn find_vc_tools(vs_roots: &[PathBuf]) -> Option<PathBuf> {
    for root in vs_roots {
        for release in RELEASES {
            for edition in EDITIONS {
                let msvc_dir = root
                    .join(release)
                    .join(edition)
                    .join("VC")
                    .join("Tools")
                    .join("MSVC");
                if let Some(version) = highest_versioned_subdir(&msvc_dir, "") {
                    return Some(msvc_dir.join(version));
                }
            }
        }
    }
    None
}

/// The highest version-sorted subdirectory name with the given prefix.
fn highest_versioned_subdir(dir: &Path, prefix: &str) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut versions: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .collect();
    versions.sort_by(|a, b| version_key(a).cmp(&version_key(b)));
    versions.pop()
}

/// Numeric-aware version ordering: `10.0.22621.0` beats `10.0.9000.0`.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkdirs(root: &Path, rel: &str) {
        std::fs::create_dir_all(root.join(rel)).expect("mkdirs");
    }

    #[test]
    fn version_ordering_is_numeric() {
        assert!(version_key("10.0.22621.0") > version_key("10.0.9000.0"));
        assert!(version_key("14.40.33807") > version_key("14.9.1"));
    }

    #[test]
    fn picks_highest_sdk_and_preferred_edition() {
        let temp = tempfile::tempdir().expect("temp");
        let vs_root = temp.path().join("vs");
        // BuildTools has a newer MSVC, but Community is preferred.
        mkdirs(&vs_root, "2022/Community/VC/Tools/MSVC/14.38.33130");
        mkdirs(&vs_root, "2022/BuildTools/VC/Tools/MSVC/14.40.33807");
        let kits = temp.path().join("kits10");
        mkdirs(&kits, "Lib/10.0.19041.0");
        mkdirs(&kits, "Lib/10.0.22621.0");
        mkdirs(&kits, "Include/10.0.22621.0");

        let install = discover_from(&[vs_root.clone()], &kits).expect("discovered");
        assert!(install
            .vc_tools
            .to_string_lossy()
            .contains("Community"));
        assert!(install.vc_tools.to_string_lossy().contains("14.38.33130"));
        assert!(install.sdk_lib.to_string_lossy().contains("10.0.22621.0"));
    }

    #[test]
    fn vs2022_beats_vs2019() {
        let temp = tempfile::tempdir().expect("temp");
        let vs_root = temp.path().join("vs");
        mkdirs(&vs_root, "2019/Community/VC/Tools/MSVC/14.29.30133");
        mkdirs(&vs_root, "2022/Community/VC/Tools/MSVC/14.38.33130");
        let kits = temp.path().join("kits10");
        mkdirs(&kits, "Lib/10.0.22621.0");

        let install = discover_from(&[vs_root], &kits).expect("discovered");
        assert!(install.vc_tools.to_string_lossy().contains("2022"));
    }

    #[test]
    fn missing_sdk_means_no_installation() {
        let temp = tempfile::tempdir().expect("temp");
        let vs_root = temp.path().join("vs");
        mkdirs(&vs_root, "2022/Community/VC/Tools/MSVC/14.38.33130");
        let kits = temp.path().join("kits10");
        assert!(discover_from(&[vs_root], &kits).is_none());
    }
}
