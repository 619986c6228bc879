use anyhow::{Context, Result};
use loadline_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Dependencies that log every connection at debug level
const QUIET_CRATES: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

/// Filter directives for a level, keeping the HTTP stack at `warn`
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_CRATES.iter().map(|name| format!("{name}=warn")));
    directives.join(",")
}

/// `RUST_LOG` wins when it parses, otherwise the configured level applies
fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(filter_directives(level)).with_context(|| format!("Invalid log level: {level}"))
}

/// Initialize logging from configuration.
///
/// Logs go to stderr so the run summary on stdout stays machine-readable.
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(&config.level.to_string())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize plain console tracing at a level, falling back to `info`
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = build_filter(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
