use loadline_config::{LogFormat, LogLevel, LoggingConfig};
use loadline_logging::{filter_directives, init_logging_from_config, init_simple_tracing};

#[test]
fn test_filter_directives_quiet_the_http_stack() {
    let directives = filter_directives("debug");
    assert!(directives.starts_with("debug,"));
    assert!(directives.contains("hyper=warn"));
    assert!(directives.contains("reqwest=warn"));
}

#[test]
fn test_repeated_initialisation_is_harmless() {
    for format in [LogFormat::Json, LogFormat::Text, LogFormat::Compact, LogFormat::Pretty] {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format,
            include_location: true,
        };
        init_logging_from_config(&config).unwrap();
    }

    init_simple_tracing("warn").unwrap();
    tracing::info!(run_id = "test", "still logging");
}

#[test]
fn test_unknown_level_falls_back() {
    init_simple_tracing("not-a-level[").unwrap();
}

#[test]
fn test_logging_config_from_yaml() {
    let yaml = r#"
level: trace
format: compact
include_location: true
"#;
    let config: LoggingConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.level, LogLevel::Trace);
    assert_eq!(config.format, LogFormat::Compact);
    init_logging_from_config(&config).unwrap();
}
