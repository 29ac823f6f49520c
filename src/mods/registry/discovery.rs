//! Mod discovery
//!
//! Scans the mods directory and discovers installed mods.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::mods::registry::manifest::{load_information, ModManifest};
use crate::mods::traits::ModError;

/// Discovered mod information
#[derive(Debug, Clone)]
pub struct DiscoveredMod {
    /// Mod directory path
    pub directory: PathBuf,
    /// Parsed manifest
    pub manifest: ModManifest,
    /// Raw information table, `None` when missing or unparsable
    pub information: Option<toml::Table>,
}

/// Mod discovery scanner
pub struct ModDiscovery {
    mods_dir: PathBuf,
    manifest_file: String,
    information_file: String,
}

impl ModDiscovery {
    /// Create a new discovery scanner
    pub fn new<P: AsRef<Path>>(mods_dir: P, manifest_file: &str, information_file: &str) -> Self {
        Self {
            mods_dir: mods_dir.as_ref().to_path_buf(),
            manifest_file: manifest_file.to_string(),
            information_file: information_file.to_string(),
        }
    }

    /// Discover all mods, sorted by directory name
    ///
    /// Directories without a manifest are skipped; unparsable manifests are
    /// logged and skipped. A missing mods directory yields no mods.
    pub fn discover_mods(&self) -> Result<Vec<DiscoveredMod>, ModError> {
        info!("Discovering mods in {:?}", self.mods_dir);

        if !self.mods_dir.exists() {
            debug!("Mods directory {:?} does not exist", self.mods_dir);
            return Ok(Vec::new());
        }

        let mut directories = Vec::new();
        for entry in fs::read_dir(&self.mods_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                directories.push(path);
            }
        }
        directories.sort();

        let mut mods = Vec::new();
        for directory in directories {
            let manifest_path = directory.join(&self.manifest_file);
            if !manifest_path.exists() {
                debug!("No {} found in {:?}, skipping", self.manifest_file, directory);
                continue;
            }

            match self.discover_in(&directory) {
                Ok(discovered) => mods.push(discovered),
                Err(e) => {
                    warn!("Failed to read mod in {:?}: {}", directory, e);
                }
            }
        }

        info!("Discovered {} mods", mods.len());
        Ok(mods)
    }

    /// Discover the mod stored in one directory
    pub fn discover_in(&self, directory: &Path) -> Result<DiscoveredMod, ModError> {
        let manifest = ModManifest::from_file(directory.join(&self.manifest_file))?;

        let information = match load_information(directory.join(&self.information_file)) {
            Ok(information) => information,
            Err(e) => {
                warn!(
                    "Information file of mod {} is unreadable: {}",
                    manifest.namespace, e
                );
                None
            }
        };

        Ok(DiscoveredMod {
            directory: directory.to_path_buf(),
            manifest,
            information,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_mod(root: &Path, dir: &str, namespace: &str, information: Option<&str>) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("mod.toml"),
            format!(
                "Namespace = \"{}\"\nName = \"{} Mod\"\nLoadController = \"Main\"\n",
                namespace, namespace
            ),
        )
        .unwrap();
        if let Some(information) = information {
            fs::write(dir.join("information.toml"), information).unwrap();
        }
    }

    #[test]
    fn test_discover_sorted_and_skips_non_mods() {
        let root = tempfile::tempdir().unwrap();
        write_mod(root.path(), "b_second", "Second", Some("Author = \"x\""));
        write_mod(root.path(), "a_first", "First", None);
        fs::create_dir_all(root.path().join("not_a_mod")).unwrap();
        fs::write(root.path().join("stray.txt"), "hi").unwrap();

        let discovery = ModDiscovery::new(root.path(), "mod.toml", "information.toml");
        let mods = discovery.discover_mods().unwrap();

        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].manifest.namespace, "First");
        assert!(mods[0].information.is_none());
        assert_eq!(mods[1].manifest.namespace, "Second");
        assert!(mods[1].information.is_some());
    }

    #[test]
    fn test_broken_information_file_is_none() {
        let root = tempfile::tempdir().unwrap();
        write_mod(root.path(), "broken", "Broken", Some("this is = = not toml"));

        let discovery = ModDiscovery::new(root.path(), "mod.toml", "information.toml");
        let mods = discovery.discover_mods().unwrap();
        assert_eq!(mods.len(), 1);
        assert!(mods[0].information.is_none());
    }

    #[test]
    fn test_missing_mods_dir() {
        let root = tempfile::tempdir().unwrap();
        let discovery = ModDiscovery::new(root.path().join("nope"), "mod.toml", "information.toml");
        assert!(discovery.discover_mods().unwrap().is_empty());
    }
}
