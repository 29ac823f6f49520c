//! Manifest validation
//!
//! Turns a mod's raw information table into validated descriptor fields.
//! Every field has its own extraction step; a missing or mistyped value
//! fails that step only, but the manifest as a whole is valid only when all
//! steps pass. An invalid manifest leaves the descriptor reset to empty
//! defaults.

use semver::Version;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, warn};

use crate::mods::descriptor::{CompatibilityRange, Distribution, ModDescriptor, Rating};
use crate::utils::{ensure_fmt, ensure_some, is_valid_namespace};

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with one message per failed step
    Invalid(Vec<String>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Manifest validator
pub struct ManifestValidator {
    /// Upper bound on entries in any dependency list
    max_list_entries: usize,
}

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self {
            max_list_entries: 256,
        }
    }

    /// Validate `information` and populate `descriptor` from it
    ///
    /// On failure every information, dependency and loadability field of the
    /// descriptor is reset. Lifecycle flags are left to the caller.
    pub fn validate(
        &self,
        descriptor: &mut ModDescriptor,
        information: Option<&Table>,
    ) -> ValidationResult {
        let Some(information) = information else {
            descriptor.reset_information();
            let message = "information file is missing or unreadable".to_string();
            warn!(
                "Manifest validation failed for mod {}: {}",
                descriptor.namespace(),
                message
            );
            return ValidationResult::Invalid(vec![message]);
        };

        let own = descriptor.namespace().to_string();
        let mut errors = Vec::new();

        match required_str(information, "Author") {
            Ok(author) => descriptor.author = author,
            Err(e) => errors.push(e),
        }

        match self.version_step(information) {
            Ok((version, display)) => {
                descriptor.version = version;
                descriptor.version_display = display;
            }
            Err(e) => errors.push(e),
        }

        match distribution_step(information) {
            Ok(distribution) => descriptor.distribution = distribution,
            Err(e) => errors.push(e),
        }

        match rating_step(information) {
            Ok(rating) => descriptor.rating = rating,
            Err(e) => errors.push(e),
        }

        match script_paths_step(information, &descriptor.directory) {
            Ok(paths) => match modules_step(&descriptor.directory, &paths) {
                Ok(modules) => {
                    descriptor.script_paths = paths;
                    descriptor.modules = modules;
                }
                Err(e) => errors.push(e),
            },
            Err(e) => errors.push(e),
        }

        let lists = [
            "RequiredMods",
            "IncompatibleMods",
            "LoadAfter",
            "LoadBefore",
        ];
        for key in lists {
            match self.namespace_set(information, key, &own) {
                Ok(set) => match key {
                    "RequiredMods" => descriptor.required_mods = set,
                    "IncompatibleMods" => descriptor.incompatible_mods = set,
                    "LoadAfter" => descriptor.load_after = set,
                    _ => descriptor.load_before = set,
                },
                Err(e) => errors.push(e),
            }
        }

        let both: Vec<&String> = descriptor
            .load_after
            .intersection(&descriptor.load_before)
            .collect();
        if let Err(e) = ensure_fmt(both.is_empty(), || {
            format!(
                "LoadAfter and LoadBefore both name: {}",
                both.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            )
        }) {
            errors.push(e);
        }

        match self.compatibility_step(information, &own) {
            Ok(compatibility) => descriptor.compatibility = compatibility,
            Err(e) => errors.push(e),
        }

        match optional_str(information, "BuildDate") {
            Ok(date) => descriptor.build_date = date,
            Err(e) => errors.push(e),
        }

        match optional_str(information, "BuildGameVersion") {
            Ok(version) => descriptor.build_game_version = version,
            Err(e) => errors.push(e),
        }

        if errors.is_empty() {
            debug!("Manifest validation passed for mod: {}", own);
            ValidationResult::Valid
        } else {
            warn!("Manifest validation failed for mod {}: {:?}", own, errors);
            descriptor.reset_information();
            ValidationResult::Invalid(errors)
        }
    }

    fn version_step(&self, information: &Table) -> Result<(Version, String), String> {
        let raw = required_str(information, "Version")?;
        let version = parse_version(&raw).map_err(|e| format!("Version: {}", e))?;
        let display = optional_str(information, "VersionDisplay")?.unwrap_or(raw);
        Ok((version, display))
    }

    fn namespace_set(&self, information: &Table, key: &str, own: &str) -> Result<BTreeSet<String>, String> {
        let Some(value) = information.get(key) else {
            return Ok(BTreeSet::new());
        };
        let entries = value
            .as_array()
            .ok_or_else(|| format!("{} must be an array of namespaces", key))?;
        ensure_fmt(entries.len() <= self.max_list_entries, || {
            format!("{} has more than {} entries", key, self.max_list_entries)
        })?;

        let mut set = BTreeSet::new();
        for entry in entries {
            let namespace = entry
                .as_str()
                .ok_or_else(|| format!("{} entries must be strings", key))?;
            ensure_fmt(is_valid_namespace(namespace), || {
                format!("{} contains an invalid namespace: '{}'", key, namespace)
            })?;
            ensure_fmt(namespace != own, || format!("{} must not name the mod itself", key))?;
            set.insert(namespace.to_string());
        }
        Ok(set)
    }

    fn compatibility_step(&self, information: &Table, own: &str) -> Result<Vec<CompatibilityRange>, String> {
        let Some(value) = information.get("Compatibility") else {
            return Ok(Vec::new());
        };
        let entries = value
            .as_array()
            .ok_or_else(|| "Compatibility must be an array of tables".to_string())?;
        ensure_fmt(entries.len() <= self.max_list_entries, || {
            format!("Compatibility has more than {} entries", self.max_list_entries)
        })?;

        let mut ranges = Vec::with_capacity(entries.len());
        for entry in entries {
            let table = entry
                .as_table()
                .ok_or_else(|| "Compatibility entries must be tables".to_string())?;
            let namespace = required_str(table, "Namespace")
                .map_err(|e| format!("Compatibility: {}", e))?;
            ensure_fmt(is_valid_namespace(&namespace), || {
                format!("Compatibility names an invalid namespace: '{}'", namespace)
            })?;
            ensure_fmt(namespace != own, || {
                "Compatibility must not name the mod itself".to_string()
            })?;

            let lowest = optional_version(table, "LowestVersion")?;
            let highest = optional_version(table, "HighestVersion")?;
            if let (Some(low), Some(high)) = (&lowest, &highest) {
                ensure_fmt(low <= high, || {
                    format!(
                        "Compatibility for {}: LowestVersion {} is above HighestVersion {}",
                        namespace, low, high
                    )
                })?;
            }

            ranges.push(CompatibilityRange {
                namespace,
                lowest_version: lowest,
                highest_version: highest,
            });
        }
        Ok(ranges)
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn optional_str(table: &Table, key: &str) -> Result<Option<String>, String> {
    match table.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{} must be a string", key)),
    }
}

fn required_str(table: &Table, key: &str) -> Result<String, String> {
    let value = ensure_some(optional_str(table, key)?, key)?;
    ensure_fmt(!value.trim().is_empty(), || format!("{} must not be empty", key))?;
    Ok(value)
}

fn optional_version(table: &Table, key: &str) -> Result<Option<Version>, String> {
    match optional_str(table, key)? {
        None => Ok(None),
        Some(raw) => parse_version(&raw)
            .map(Some)
            .map_err(|e| format!("{}: {}", key, e)),
    }
}

/// Parse a semantic version, accepting `major.minor` as `major.minor.0`
pub fn parse_version(raw: &str) -> Result<Version, String> {
    let raw = raw.trim();
    if let Ok(version) = Version::parse(raw) {
        return Ok(version);
    }

    let core_end = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, rest) = raw.split_at(core_end);
    if core.split('.').count() == 2 {
        if let Ok(version) = Version::parse(&format!("{}.0{}", core, rest)) {
            return Ok(version);
        }
    }

    Err(format!("'{}' is not a semantic version", raw))
}

fn distribution_step(information: &Table) -> Result<Distribution, String> {
    match information.get("Distribution") {
        None => Ok(Distribution::default()),
        Some(Value::Table(table)) => Ok(Distribution {
            platform: optional_str(table, "Platform").map_err(|e| format!("Distribution: {}", e))?,
            url: optional_str(table, "Url").map_err(|e| format!("Distribution: {}", e))?,
        }),
        Some(_) => Err("Distribution must be a table".to_string()),
    }
}

fn rating_step(information: &Table) -> Result<Rating, String> {
    match optional_str(information, "Rating")? {
        None => Ok(Rating::Normal),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "normal" => Ok(Rating::Normal),
            "nsfw" => Ok(Rating::Nsfw),
            _ => Err(format!("Rating '{}' is not one of Normal, NSFW", raw)),
        },
    }
}

fn script_paths_step(information: &Table, directory: &Path) -> Result<Vec<PathBuf>, String> {
    let Some(value) = information.get("ScriptPaths") else {
        return Ok(Vec::new());
    };
    let entries = value
        .as_array()
        .ok_or_else(|| "ScriptPaths must be an array of paths".to_string())?;

    let mut paths = Vec::with_capacity(entries.len());
    for entry in entries {
        let raw = entry
            .as_str()
            .ok_or_else(|| "ScriptPaths entries must be strings".to_string())?;
        let path = PathBuf::from(raw);
        ensure_fmt(path.is_relative(), || {
            format!("ScriptPaths entry '{}' must be relative to the mod directory", raw)
        })?;
        ensure_fmt(directory.join(&path).exists(), || {
            format!("ScriptPaths entry '{}' does not exist", raw)
        })?;
        paths.push(path);
    }
    Ok(paths)
}

/// Resolve module identifiers from script paths, in declaration order
///
/// A file yields its stem; a directory yields every non-hidden file below
/// it, sorted, as a dotted path relative to that directory.
fn modules_step(directory: &Path, script_paths: &[PathBuf]) -> Result<Vec<String>, String> {
    let mut modules = Vec::new();
    for script_path in script_paths {
        let full = directory.join(script_path);
        if full.is_dir() {
            collect_modules(&full, &mut Vec::new(), &mut modules)
                .map_err(|e| format!("ScriptPaths entry {:?}: {}", script_path, e))?;
        } else if let Some(stem) = full.file_stem() {
            modules.push(stem.to_string_lossy().into_owned());
        }
    }
    Ok(modules)
}

fn collect_modules(dir: &Path, prefix: &mut Vec<String>, out: &mut Vec<String>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .map_or(false, |n| !n.to_string_lossy().starts_with('.'))
        })
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Some(name) = path.file_name() {
                prefix.push(name.to_string_lossy().into_owned());
                collect_modules(&path, prefix, out)?;
                prefix.pop();
            }
        } else if let Some(stem) = path.file_stem() {
            let mut parts = prefix.clone();
            parts.push(stem.to_string_lossy().into_owned());
            out.push(parts.join("."));
        }
    }
    Ok(())
}
