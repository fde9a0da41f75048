use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn defaults_pass_validation() {
    let config = DroverConfig::default();
    config.validate().expect("defaults should validate");

    assert_eq!(config.pool.threads, 0);
    assert_eq!(config.pool.max_retries, 3);
    assert_eq!(config.pool.max_failures, 1);
    assert_eq!(config.report.prefix, "drover");
}

#[test]
fn partial_yaml_keeps_the_other_defaults() {
    let config: DroverConfig = serde_yaml::from_str("pool:\n  max_retries: 5\n").unwrap();

    assert_eq!(config.pool.max_retries, 5);
    assert_eq!(config.pool.max_failures, 1);
    assert_eq!(config.pool.backoff.delay_secs, 1);
    assert_eq!(config.report.dir, PathBuf::from("."));
}

#[test]
fn backoff_settings_map_to_pool_policy() {
    let fixed = BackoffSettings {
        policy: BackoffPolicy::Fixed,
        delay_secs: 2,
        cap_secs: 60,
    };
    assert_eq!(
        fixed.to_backoff(),
        Backoff::Fixed {
            delay: Duration::from_secs(2)
        }
    );

    let exponential = BackoffSettings {
        policy: BackoffPolicy::Exponential,
        delay_secs: 2,
        cap_secs: 30,
    };
    assert_eq!(
        exponential.to_backoff(),
        Backoff::Exponential {
            initial: Duration::from_secs(2),
            cap: Duration::from_secs(30),
        }
    );
}

#[test]
fn exponential_cap_below_initial_delay_is_rejected() {
    let mut config = DroverConfig::default();
    config.pool.backoff.policy = BackoffPolicy::Exponential;
    config.pool.backoff.delay_secs = 10;
    config.pool.backoff.cap_secs = 5;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("cap"));
}

#[test]
fn prefix_with_path_separator_is_rejected() {
    let mut config = DroverConfig::default();
    config.report.prefix = "logs/drover".to_string();
    assert!(config.validate().is_err());

    config.report.prefix = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn yaml_round_trip_preserves_values() {
    let mut config = DroverConfig::default();
    config.pool.threads = 8;
    config.pool.backoff.policy = BackoffPolicy::Exponential;
    config.report.prefix = "sweep".to_string();

    let yaml = config.to_yaml().unwrap();
    let parsed: DroverConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn explicit_config_path_is_loaded_and_validated() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "pool:\n  max_failures: 9").unwrap();

    let config = DroverConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.pool.max_failures, 9);
}

#[test]
fn explicit_config_path_that_does_not_parse_errors_out() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "pool: [not, a, mapping]").unwrap();

    assert!(DroverConfig::load_or_default(Some(file.path())).is_err());
}
