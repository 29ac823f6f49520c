//! Configuration management for the mod loader
//!
//! Handles configuration loading (TOML or JSON) and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::is_valid_namespace;

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "mod_loader::mods=debug"); RUST_LOG overrides it
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Namespace of the orchestrating mod; only mods naming it as their
    /// load controller are loaded, unloaded or disabled by this loader
    #[serde(default = "default_controller_namespace")]
    pub controller_namespace: String,

    /// Directory containing one sub-directory per mod
    #[serde(default = "default_mods_dir")]
    pub mods_dir: PathBuf,

    /// Per-mod manifest file name (Namespace, Name, LoadController)
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Per-mod information file name (Author, Version, dependencies, ...)
    #[serde(default = "default_information_file")]
    pub information_file: String,

    /// Re-schedule pending mods automatically after every successful load
    #[serde(default = "default_true")]
    pub auto_load: bool,

    /// Mods excluded from automatic loading (on-demand loads still work)
    #[serde(default)]
    pub disabled_auto_load: Vec<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_true() -> bool {
    true
}

fn default_controller_namespace() -> String {
    "Main".to_string()
}

fn default_mods_dir() -> PathBuf {
    PathBuf::from("Mods")
}

fn default_manifest_file() -> String {
    "mod.toml".to_string()
}

fn default_information_file() -> String {
    "information.toml".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            controller_namespace: default_controller_namespace(),
            mods_dir: default_mods_dir(),
            manifest_file: default_manifest_file(),
            information_file: default_information_file(),
            auto_load: true,
            disabled_auto_load: Vec::new(),
            logging: None,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_namespace(&self.controller_namespace) {
            return Err(anyhow::anyhow!(
                "controller_namespace '{}' is not a valid mod namespace",
                self.controller_namespace
            ));
        }

        if self.manifest_file.trim().is_empty() || self.information_file.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "manifest_file and information_file must not be empty"
            ));
        }

        if self.manifest_file == self.information_file {
            return Err(anyhow::anyhow!(
                "manifest_file and information_file must be different files (both are '{}')",
                self.manifest_file
            ));
        }

        for namespace in &self.disabled_auto_load {
            if !is_valid_namespace(namespace) {
                return Err(anyhow::anyhow!(
                    "disabled_auto_load entry '{}' is not a valid mod namespace",
                    namespace
                ));
            }
        }

        Ok(())
    }
}
