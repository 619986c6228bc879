//! Logging initialisation for loadline
//!
//! Installs a global `tracing` subscriber configured from
//! [`LoggingConfig`](loadline_config::LoggingConfig): an `EnvFilter` built from
//! the configured level (or `RUST_LOG` when set) and one of the text, compact,
//! pretty or JSON formatters.

pub mod init;

pub use init::{filter_directives, init_logging_from_config, init_simple_tracing};
