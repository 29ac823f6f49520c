//! Mod manifest validation

pub mod manifest_validator;

pub use manifest_validator::{parse_version, ManifestValidator, ValidationResult};
