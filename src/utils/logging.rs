//! Logging initialisation for the loader and for individual mods
//!
//! - Respects the RUST_LOG environment variable (it always wins)
//! - Falls back to a filter from [`LoggingConfig`](crate::config::LoggingConfig)
//! - Defaults to "info"
//!
//! # Usage
//!
//! ```rust,no_run
//! use mod_loader::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the effective filter: RUST_LOG, then the configured filter, then `default`.
fn resolve_filter(filter: Option<&str>, default: &str) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::new(default),
    }
}

/// Initialize logging for the loader process
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "debug", "mod_loader::mods=trace").
///              Ignored when RUST_LOG is set.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = resolve_filter(filter, "info");

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .try_init();
}

/// Initialize logging for a tool or test harness that acts on behalf of one mod
///
/// Without RUST_LOG or an explicit filter the mod's own target is logged at
/// `info` and the loader's mod subsystem at `debug`.
pub fn init_mod_logging(namespace: &str, filter: Option<&str>) {
    let target = namespace.replace(['-', '.'], "_");
    let default_filter = format!("{}=info,mod_loader::mods=debug", target);
    let env_filter = resolve_filter(filter, &default_filter);

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .try_init();
}

/// Initialize logging with JSON output, for log aggregation
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let env_filter = resolve_filter(filter, "info");

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(env_filter)
        .try_init();
}

/// Initialize logging from [`LoaderConfig`](crate::config::LoaderConfig)'s logging section
pub fn init_logging_from_config(config: Option<&crate::config::LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
