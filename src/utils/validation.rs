//! Validation utilities
//!
//! Small helpers shared by the manifest validator and config validation.

/// Ensure a condition is true, or return an error
pub fn ensure(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

/// Ensure a condition is true with a lazily formatted error message
pub fn ensure_fmt<F>(condition: bool, message: F) -> Result<(), String>
where
    F: FnOnce() -> String,
{
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

/// Validate a value is not None
pub fn ensure_some<T>(value: Option<T>, name: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("{} must be set", name))
}

/// Check a mod namespace
///
/// 1..=64 characters, starting alphanumeric, then alphanumerics, `-`, `_` or `.`.
#[inline]
pub fn is_valid_namespace(namespace: &str) -> bool {
    if namespace.is_empty() || namespace.len() > 64 {
        return false;
    }

    if !namespace
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric())
    {
        return false;
    }

    namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
