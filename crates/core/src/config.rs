//! 설정 관리 -- warden.toml 파싱 및 런타임 설정
//!
//! [`WardenConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//! 피드 엔드포인트, 필터 대상, 저장소 주소는 모두 여기서 주입되며
//! 코드에 상수로 박혀 있지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`WARDEN_FILTER_FACTION_STATE=Boom` 형식)
//! 3. 설정 파일 (`warden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), warden_core::error::WardenError> {
//! use warden_core::config::WardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WardenConfig::load("warden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WardenConfig::parse("[filter]\nfaction_state = \"Boom\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WardenError};

/// Warden 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 피드 구독 설정
    #[serde(default)]
    pub feed: FeedConfig,
    /// 이벤트 필터 설정
    #[serde(default)]
    pub filter: FilterConfig,
    /// 성계 레지스트리 설정
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    ///
    /// 검증은 오버라이드 적용 후 [`load`](Self::load)에서 수행합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WardenError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WardenError> {
        toml::from_str(toml_str).map_err(|e| {
            WardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `WARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WARDEN_GENERAL_LOG_FORMAT");

        // Feed
        override_string(&mut self.feed.endpoint, "WARDEN_FEED_ENDPOINT");
        override_u64(
            &mut self.feed.receive_timeout_secs,
            "WARDEN_FEED_RECEIVE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.feed.reconnect_initial_backoff_ms,
            "WARDEN_FEED_RECONNECT_INITIAL_BACKOFF_MS",
        );
        override_u64(
            &mut self.feed.reconnect_max_backoff_ms,
            "WARDEN_FEED_RECONNECT_MAX_BACKOFF_MS",
        );
        override_u32(
            &mut self.feed.max_reconnect_attempts,
            "WARDEN_FEED_MAX_RECONNECT_ATTEMPTS",
        );
        override_usize(&mut self.feed.max_frame_bytes, "WARDEN_FEED_MAX_FRAME_BYTES");
        override_u32(
            &mut self.feed.max_consecutive_registry_errors,
            "WARDEN_FEED_MAX_CONSECUTIVE_REGISTRY_ERRORS",
        );

        // Filter
        override_string(&mut self.filter.schema_ref, "WARDEN_FILTER_SCHEMA_REF");
        override_string(
            &mut self.filter.faction_state,
            "WARDEN_FILTER_FACTION_STATE",
        );

        // Registry
        override_string(&mut self.registry.backend, "WARDEN_REGISTRY_BACKEND");
        override_string(&mut self.registry.sqlite_path, "WARDEN_REGISTRY_SQLITE_PATH");
        override_string(
            &mut self.registry.postgres_url,
            "WARDEN_REGISTRY_POSTGRES_URL",
        );
        override_usize(&mut self.registry.pool_size, "WARDEN_REGISTRY_POOL_SIZE");
        override_u64(
            &mut self.registry.busy_timeout_ms,
            "WARDEN_REGISTRY_BUSY_TIMEOUT_MS",
        );
        override_u64(
            &mut self.registry.query_timeout_ms,
            "WARDEN_REGISTRY_QUERY_TIMEOUT_MS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "WARDEN_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "WARDEN_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "WARDEN_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "WARDEN_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.feed.validate()?;
        self.filter.validate()?;
        self.registry.validate()?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be non-zero".to_owned()));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> WardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 압축 해제 후 프레임 크기 상한 (64MB)
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// 피드 구독 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// pub/sub 엔드포인트 (`tcp://` 또는 `ipc://`)
    pub endpoint: String,
    /// 수신 타임아웃 (초, 0이면 비활성화)
    pub receive_timeout_secs: u64,
    /// 재연결 초기 대기 시간 (밀리초)
    pub reconnect_initial_backoff_ms: u64,
    /// 재연결 최대 대기 시간 (밀리초)
    pub reconnect_max_backoff_ms: u64,
    /// 연속 재연결 시도 상한 (0이면 무제한)
    pub max_reconnect_attempts: u32,
    /// 압축 해제 후 프레임 최대 크기 (바이트)
    pub max_frame_bytes: usize,
    /// 연속 레지스트리 장애 허용 횟수
    pub max_consecutive_registry_errors: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://eddn.edcd.io:9500".to_owned(),
            receive_timeout_secs: 300,
            reconnect_initial_backoff_ms: 1_000,
            reconnect_max_backoff_ms: 60_000,
            max_reconnect_attempts: 10,
            max_frame_bytes: 1024 * 1024, // 1MB
            max_consecutive_registry_errors: 10,
        }
    }
}

impl FeedConfig {
    fn validate(&self) -> Result<(), WardenError> {
        if !(self.endpoint.starts_with("tcp://") || self.endpoint.starts_with("ipc://")) {
            return Err(invalid(
                "feed.endpoint",
                "must start with tcp:// or ipc://".to_owned(),
            ));
        }
        if self.reconnect_initial_backoff_ms == 0 {
            return Err(invalid(
                "feed.reconnect_initial_backoff_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.reconnect_max_backoff_ms < self.reconnect_initial_backoff_ms {
            return Err(invalid(
                "feed.reconnect_max_backoff_ms",
                "must be >= reconnect_initial_backoff_ms".to_owned(),
            ));
        }
        if self.max_frame_bytes == 0 || self.max_frame_bytes > MAX_FRAME_BYTES {
            return Err(invalid(
                "feed.max_frame_bytes",
                format!("must be 1-{MAX_FRAME_BYTES}"),
            ));
        }
        if self.max_consecutive_registry_errors == 0 {
            return Err(invalid(
                "feed.max_consecutive_registry_errors",
                "must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 이벤트 필터 설정
///
/// 두 값 모두 대소문자를 구분하는 정확한 일치로 비교합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 대상 스키마 식별자
    pub schema_ref: String,
    /// 대상 세력 상태
    pub faction_state: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            schema_ref: "https://eddn.edcd.io/schemas/journal/1".to_owned(),
            faction_state: "Incursion".to_owned(),
        }
    }
}

impl FilterConfig {
    fn validate(&self) -> Result<(), WardenError> {
        if self.schema_ref.is_empty() {
            return Err(invalid("filter.schema_ref", "must not be empty".to_owned()));
        }
        if self.faction_state.is_empty() {
            return Err(invalid(
                "filter.faction_state",
                "must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 성계 레지스트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 백엔드 (sqlite, postgres)
    pub backend: String,
    /// SQLite 파일 경로 (`:memory:` 허용)
    pub sqlite_path: String,
    /// PostgreSQL 연결 문자열
    pub postgres_url: String,
    /// 커넥션 풀 크기 (postgres)
    pub pool_size: usize,
    /// 잠금 대기 시간 (밀리초, sqlite)
    pub busy_timeout_ms: u64,
    /// 레지스트리 호출 하나의 제한 시간 (밀리초, 연결 대기 포함)
    pub query_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_owned(),
            sqlite_path: "warden.db".to_owned(),
            postgres_url: "postgresql://localhost:5432/warden".to_owned(),
            pool_size: 4,
            busy_timeout_ms: 5_000,
            query_timeout_ms: 10_000,
        }
    }
}

impl RegistryConfig {
    fn validate(&self) -> Result<(), WardenError> {
        match self.backend.as_str() {
            "sqlite" => {
                if self.sqlite_path.is_empty() {
                    return Err(invalid(
                        "registry.sqlite_path",
                        "must not be empty when backend is sqlite".to_owned(),
                    ));
                }
            }
            "postgres" => {
                if !(self.postgres_url.starts_with("postgres://")
                    || self.postgres_url.starts_with("postgresql://"))
                {
                    return Err(invalid(
                        "registry.postgres_url",
                        "must start with postgres:// or postgresql://".to_owned(),
                    ));
                }
            }
            _ => {
                return Err(invalid(
                    "registry.backend",
                    "must be one of: sqlite, postgres".to_owned(),
                ));
            }
        }
        if self.query_timeout_ms == 0 {
            return Err(invalid(
                "registry.query_timeout_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.pool_size == 0 || self.pool_size > 64 {
            return Err(invalid(
                "registry.pool_size",
                "must be between 1 and 64".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}
