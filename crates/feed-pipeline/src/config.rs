//! 피드 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 `[feed]`, `[filter]` 섹션을 합쳐
//! 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use warden_core::config::WardenConfig;
//! use warden_feed::config::PipelineConfig;
//!
//! let core_config = WardenConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_core::config::{MAX_FRAME_BYTES, WardenConfig};

use crate::error::FeedPipelineError;

/// 피드 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// pub/sub 엔드포인트
    pub endpoint: String,
    /// 대상 스키마 식별자
    pub schema_ref: String,
    /// 대상 세력 상태
    pub faction_state: String,
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
    /// 레지스트리 호출 제한 시간 (밀리초)
    pub registry_timeout_ms: u64,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 탐지 이벤트 채널 용량
    pub detection_channel_capacity: usize,
    /// 정지 시 소비 루프 종료 대기 시간 (초)
    pub stop_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&WardenConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &WardenConfig) -> Self {
        Self {
            endpoint: core.feed.endpoint.clone(),
            schema_ref: core.filter.schema_ref.clone(),
            faction_state: core.filter.faction_state.clone(),
            receive_timeout_secs: core.feed.receive_timeout_secs,
            reconnect_initial_backoff_ms: core.feed.reconnect_initial_backoff_ms,
            reconnect_max_backoff_ms: core.feed.reconnect_max_backoff_ms,
            max_reconnect_attempts: core.feed.max_reconnect_attempts,
            max_frame_bytes: core.feed.max_frame_bytes,
            max_consecutive_registry_errors: core.feed.max_consecutive_registry_errors,
            registry_timeout_ms: core.registry.query_timeout_ms,
            detection_channel_capacity: 256,
            stop_timeout_secs: 10,
        }
    }

    /// 수신 타임아웃. 0이면 `None`.
    pub fn receive_timeout(&self) -> Option<Duration> {
        (self.receive_timeout_secs > 0).then(|| Duration::from_secs(self.receive_timeout_secs))
    }

    /// 레지스트리 호출 제한 시간
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FeedPipelineError> {
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        if self.schema_ref.is_empty() {
            return Err(config_err("schema_ref", "must not be empty"));
        }
        if self.faction_state.is_empty() {
            return Err(config_err("faction_state", "must not be empty"));
        }
        if self.max_frame_bytes == 0 || self.max_frame_bytes > MAX_FRAME_BYTES {
            return Err(FeedPipelineError::Config {
                field: "max_frame_bytes".to_owned(),
                reason: format!("must be 1-{}", MAX_FRAME_BYTES),
            });
        }
        if self.reconnect_initial_backoff_ms == 0 {
            return Err(config_err(
                "reconnect_initial_backoff_ms",
                "must be greater than 0",
            ));
        }
        if self.reconnect_max_backoff_ms < self.reconnect_initial_backoff_ms {
            return Err(config_err(
                "reconnect_max_backoff_ms",
                "must be >= reconnect_initial_backoff_ms",
            ));
        }
        if self.max_consecutive_registry_errors == 0 {
            return Err(config_err(
                "max_consecutive_registry_errors",
                "must be greater than 0",
            ));
        }
        if self.registry_timeout_ms == 0 {
            return Err(config_err("registry_timeout_ms", "must be greater than 0"));
        }
        if self.detection_channel_capacity == 0
            || self.detection_channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(FeedPipelineError::Config {
                field: "detection_channel_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_CHANNEL_CAPACITY),
            });
        }
        Ok(())
    }
}

fn config_err(field: &str, reason: &str) -> FeedPipelineError {
    FeedPipelineError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 엔드포인트를 설정합니다.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// 대상 스키마를 설정합니다.
    pub fn schema_ref(mut self, schema_ref: impl Into<String>) -> Self {
        self.config.schema_ref = schema_ref.into();
        self
    }

    /// 대상 세력 상태를 설정합니다.
    pub fn faction_state(mut self, state: impl Into<String>) -> Self {
        self.config.faction_state = state.into();
        self
    }

    /// 수신 타임아웃(초)을 설정합니다.
    pub fn receive_timeout_secs(mut self, secs: u64) -> Self {
        self.config.receive_timeout_secs = secs;
        self
    }

    /// 재연결 대기 시간 범위(밀리초)를 설정합니다.
    pub fn reconnect_backoff_ms(mut self, initial: u64, max: u64) -> Self {
        self.config.reconnect_initial_backoff_ms = initial;
        self.config.reconnect_max_backoff_ms = max;
        self
    }

    /// 연속 재연결 시도 상한을 설정합니다.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// 프레임 최대 크기를 설정합니다.
    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.config.max_frame_bytes = bytes;
        self
    }

    /// 연속 레지스트리 장애 허용 횟수를 설정합니다.
    pub fn max_consecutive_registry_errors(mut self, count: u32) -> Self {
        self.config.max_consecutive_registry_errors = count;
        self
    }

    /// 레지스트리 호출 제한 시간(밀리초)을 설정합니다.
    pub fn registry_timeout_ms(mut self, ms: u64) -> Self {
        self.config.registry_timeout_ms = ms;
        self
    }

    /// 탐지 이벤트 채널 용량을 설정합니다.
    pub fn detection_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.detection_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, FeedPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
