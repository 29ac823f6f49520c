#![no_main]
//! Fuzz target for information file validation
//!
//! Any TOML table must validate without panicking, and a rejected table
//! must leave the descriptor reset.

use libfuzzer_sys::fuzz_target;
use mod_loader::mods::{ManifestValidator, ModDescriptor, ValidationResult};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(table) = toml::from_str::<toml::Table>(text) else {
        return;
    };

    let mut descriptor = ModDescriptor::new("Fuzzed", "Fuzzed", "Main", "/nonexistent/fuzzed");
    let validator = ManifestValidator::new();
    if let ValidationResult::Invalid(errors) = validator.validate(&mut descriptor, Some(&table)) {
        assert!(!errors.is_empty());
        assert!(descriptor.required_mods.is_empty());
        assert!(descriptor.modules.is_empty());
        assert!(descriptor.author.is_empty());
    }
});
