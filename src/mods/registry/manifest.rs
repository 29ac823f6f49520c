//! Mod manifest parsing
//!
//! A mod ships two files: the manifest (`mod.toml`: Namespace, Name,
//! LoadController) parsed strictly here, and the information file
//! (`information.toml`) kept as a raw TOML table so the manifest validator
//! can check every field on its own.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mods::traits::ModError;
use crate::utils::is_valid_namespace;

/// Mod manifest (mod.toml structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModManifest {
    /// Unique mod namespace
    pub namespace: String,
    /// Display name
    pub name: String,
    /// Namespace of the loader allowed to load and unload this mod
    pub load_controller: String,
}

impl ModManifest {
    /// Parse a manifest from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ModError> {
        let manifest: ModManifest = toml::from_str(contents).map_err(|e| {
            ModError::InvalidManifest(format!("Failed to parse manifest TOML: {}", e))
        })?;
        manifest.check()?;
        Ok(manifest)
    }

    /// Load manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModError::InvalidManifest(format!("Failed to read manifest file: {}", e))
        })?;
        Self::from_toml_str(&contents)
    }

    fn check(&self) -> Result<(), ModError> {
        if !is_valid_namespace(&self.namespace) {
            return Err(ModError::InvalidManifest(format!(
                "Invalid mod namespace: '{}'",
                self.namespace
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ModError::InvalidManifest(format!(
                "Mod {} has an empty name",
                self.namespace
            )));
        }
        if !is_valid_namespace(&self.load_controller) {
            return Err(ModError::InvalidManifest(format!(
                "Mod {} has an invalid load controller: '{}'",
                self.namespace, self.load_controller
            )));
        }
        Ok(())
    }
}

/// Load a mod's information file as a raw table
///
/// A missing file yields `Ok(None)`; the validator reports it.
pub fn load_information<P: AsRef<Path>>(path: P) -> Result<Option<toml::Table>, ModError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&contents)?;
    Ok(Some(table))
}
