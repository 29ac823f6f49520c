//! Utility modules shared across the loader

pub mod error;
pub mod logging;
pub mod validation;

pub use error::{guard_call, log_error, panic_message};
pub use logging::{init_logging, init_logging_from_config, init_mod_logging};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use validation::{ensure, ensure_fmt, ensure_some, is_valid_namespace};
