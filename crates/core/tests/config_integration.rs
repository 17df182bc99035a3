//! warden.toml 통합 설정 테스트
//!
//! - warden.toml.example 파싱 테스트
//! - 파일 로딩 + 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use std::io::Write;

use serial_test::serial;
use warden_core::config::WardenConfig;
use warden_core::error::{ConfigError, WardenError};

const EXAMPLE: &str = include_str!("../../../warden.toml.example");

#[test]
fn example_config_parses_successfully() {
    let config = WardenConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.feed.endpoint, "tcp://eddn.edcd.io:9500");
    assert_eq!(config.filter.faction_state, "Incursion");
    assert_eq!(config.registry.sqlite_path, "/var/lib/warden/warden.db");
}

#[test]
fn example_config_passes_validation() {
    let config = WardenConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let example = WardenConfig::parse(EXAMPLE).expect("should parse");
    let defaults = WardenConfig::default();
    assert_eq!(example.feed.max_frame_bytes, defaults.feed.max_frame_bytes);
    assert_eq!(
        example.feed.reconnect_max_backoff_ms,
        defaults.feed.reconnect_max_backoff_ms
    );
    assert_eq!(example.filter.schema_ref, defaults.filter.schema_ref);
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

#[test]
fn unknown_field_type_is_parse_error() {
    let err = WardenConfig::parse("[feed]\nreceive_timeout_secs = \"soon\"").unwrap_err();
    assert!(matches!(
        err,
        WardenError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
#[serial]
async fn load_applies_env_over_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[filter]\nfaction_state = \"Boom\"").expect("write");

    // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
    unsafe { std::env::set_var("WARDEN_FILTER_FACTION_STATE", "Lockdown") };
    let result = WardenConfig::load(file.path()).await;
    unsafe { std::env::remove_var("WARDEN_FILTER_FACTION_STATE") };

    let config = result.expect("load should succeed");
    assert_eq!(config.filter.faction_state, "Lockdown");
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_env_override() {
    let file = tempfile::NamedTempFile::new().expect("temp file");

    // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
    unsafe { std::env::set_var("WARDEN_FEED_ENDPOINT", "udp://nowhere:1") };
    let result = WardenConfig::load(file.path()).await;
    unsafe { std::env::remove_var("WARDEN_FEED_ENDPOINT") };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("feed.endpoint"));
}
