//! The `tml.toml` project manifest.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A parsed `tml.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: Package,
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Default optimization level for `tml build`.
    #[serde(default)]
    pub opt_level: Option<u8>,
    /// Default target triple.
    #[serde(default)]
    pub target: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| format!("invalid {}: {e}", path.display()))
    }

    /// Find `tml.toml` from a file or directory path upward.
    pub fn discover(start: &Path) -> Option<std::path::PathBuf> {
        let mut dir = if start.is_dir() {
            Some(start.to_path_buf())
        } else {
            start.parent().map(Path::to_path_buf)
        };
        while let Some(current) = dir {
            let candidate = current.join("tml.toml");
            if candidate.exists() {
                return Some(candidate);
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        None
    }

    /// The scaffold written by `tml init`.
    pub fn scaffold(name: &str) -> String {
        format!(
            "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\n\n[build]\nopt_level = 0\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_round_trips() {
        let text = Manifest::scaffold("demo");
        let manifest: Manifest = toml::from_str(&text).expect("valid scaffold");
        assert_eq!(manifest.package.name, "demo");
        assert_eq!(manifest.build.opt_level, Some(0));
    }

    #[test]
    fn discover_walks_upward() {
        let temp = tempfile::tempdir().expect("temp");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(temp.path().join("tml.toml"), Manifest::scaffold("x")).expect("write");
        let found = Manifest::discover(&nested).expect("found");
        assert_eq!(found, temp.path().join("tml.toml"));
    }
}
