//! Integration tests for loadline-config

use loadline_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = LoadlineConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("LOADLINE_BASE_URL", Some("http://shop.internal:9000/")),
        ("LOADLINE_TIMEOUT_READ", Some("30s")),
        ("LOADLINE_RATE", Some("25")),
        ("LOADLINE_DURATION", Some("10m")),
        ("LOADLINE_MAX_VUS", Some("250")),
        ("LOADLINE_STRESS_MAX_RATE", Some("400")),
        ("LOADLINE_SEED", Some("42")),
        ("LOADLINE_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::new();
        let config = loader.from_env().unwrap();

        assert_eq!(config.target.base_url, "http://shop.internal:9000");
        assert_eq!(config.target.request_timeout, Duration::from_secs(30));
        assert_eq!(config.profiles.load.rate, 25.0);
        assert_eq!(config.profiles.load.duration, Duration::from_secs(600));
        assert_eq!(config.profiles.load.max_concurrency, 250);
        assert_eq!(config.profiles.soak.max_concurrency, 250);
        assert_eq!(config.profiles.stress.peak_rate, 400.0);
        assert_eq!(config.run.seed, Some(42));
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_think_time_env_switch() {
    with_vars(
        vec![
            ("LOADLINE_THINK_TIME", Some("0")),
            ("LOADLINE_THINK_TIME_MIN", Some("0.25")),
            ("LOADLINE_THINK_TIME_MAX", Some("1.5")),
        ],
        || {
            let config = ConfigLoader::new().from_env().unwrap();
            assert!(!config.think_time.enabled);
            assert_eq!(config.think_time.min, Duration::from_millis(250));
            assert_eq!(config.think_time.max, Duration::from_millis(1500));
        },
    );

    with_vars(vec![("LOADLINE_THINK_TIME", Some("1"))], || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert!(config.think_time.enabled);
    });
}

#[test]
fn test_invalid_env_values_are_rejected() {
    with_vars(vec![("LOADLINE_RATE", Some("fast"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    });

    // Parses, but fails domain validation
    with_vars(vec![("LOADLINE_PRE_ALLOC", Some("1000"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::DomainError { .. }));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("SHOPLOAD_SOAK_RATE", Some("2.5"))], || {
        let config = ConfigLoader::with_prefix("SHOPLOAD").from_env().unwrap();
        assert_eq!(config.profiles.soak.rate, 2.5);
    });
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = LoadlineConfig::generate_sample();
    assert!(yaml.contains("base_url"));

    let parsed: LoadlineConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.profiles.stress.stages.len(), 8);
    assert_eq!(parsed.think_time.max, Duration::from_secs(2));
}

#[test]
fn test_comprehensive_config_file() {
    let yaml = r#"
target:
  base_url: "https://staging.shop.example"
  request_timeout: 15
  headers:
    Accept: "text/html"

think_time:
  enabled: true
  min: 200ms
  max: 1s

profiles:
  smoke:
    rate: 2
    duration: 30s
  stress:
    peak_rate: 50
    stages:
      - fraction: 0.5
        duration: 1m
      - fraction: 0.0
        duration: 30s

data:
  fallback_ids: ["ID-0001", "ID-0002"]

run:
  seed: 7
  overflow: delay
  graceful_stop: 5s

logging:
  level: warn
  format: json
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.target.base_url, "https://staging.shop.example");
        assert_eq!(config.target.request_timeout, Duration::from_secs(15));
        assert_eq!(config.target.host(), "staging.shop.example");
        assert_eq!(config.think_time.min, Duration::from_millis(200));
        assert_eq!(config.profiles.smoke.rate, 2.0);
        assert_eq!(config.profiles.smoke.duration, Duration::from_secs(30));
        // Untouched sections keep their defaults
        assert_eq!(config.profiles.load.rate, 10.0);
        assert_eq!(config.profiles.stress.total_duration(), Duration::from_secs(90));
        assert_eq!(config.data.fallback_ids, vec!["ID-0001", "ID-0002"]);
        assert_eq!(config.data.currencies.len(), 6);
        assert_eq!(config.run.seed, Some(7));
        assert_eq!(config.run.overflow, OverflowPolicy::Delay);
        assert_eq!(config.run.graceful_stop, Duration::from_secs(5));
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"profiles:\n  soak:\n    rate: 3\n").unwrap();

    with_vars(vec![("LOADLINE_SOAK_RATE", Some("8"))], || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();
        assert_eq!(config.profiles.soak.rate, 8.0);
    });
}

#[test]
fn test_missing_file_is_read_error() {
    let err = ConfigLoader::new()
        .from_file("/nonexistent/loadline.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileReadError(_)));
}
