//! 이벤트 시스템 -- 모듈 간 통신의 기본 단위
//!
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터입니다.
//! [`DetectionEvent`]는 처음 관측된 성계가 필터 조건을 만족했을 때
//! 정확히 한 번 생성되어 알림 수신자에게 전달됩니다.

use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SystemId;

// --- 모듈명 상수 ---

/// 피드 파이프라인 모듈명
pub const MODULE_FEED_PIPELINE: &str = "feed-pipeline";

// --- 이벤트 타입 상수 ---

/// 탐지 이벤트 타입
pub const EVENT_TYPE_DETECTION: &str = "detection";

/// 이벤트 메타데이터 -- 모든 이벤트에 공통으로 포함되는 추적 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID
    pub trace_id: String,
}

impl EventMetadata {
    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts: DateTime<Utc> = self.timestamp.into();
        write!(
            f,
            "[{}] source={} trace={}",
            ts.to_rfc3339(),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명
    fn event_type(&self) -> &str;
}

/// 신규 성계 탐지 이벤트
///
/// 알림 인터페이스 `notify(systemName, timestamp, stateName)`의 세 인자를
/// `system_name`, `observed_at`, `state_name`으로 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 레지스트리가 부여한 ID
    pub system_id: SystemId,
    /// 성계 이름
    pub system_name: String,
    /// 필터에 매칭된 세력 상태
    pub state_name: String,
    /// 프레임의 `message.timestamp`
    pub observed_at: DateTime<Utc>,
}

impl DetectionEvent {
    /// 새로운 trace를 시작하는 탐지 이벤트를 생성합니다.
    pub fn new(
        system_id: SystemId,
        system_name: impl Into<String>,
        state_name: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_FEED_PIPELINE),
            system_id,
            system_name: system_name.into(),
            state_name: state_name.into(),
            observed_at,
        }
    }
}

impl Event for DetectionEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_DETECTION
    }
}

impl fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectionEvent[{}] system={} (#{}) state={} at {}",
            self.id,
            self.system_name,
            self.system_id,
            self.state_name,
            self.observed_at.to_rfc3339(),
        )
    }
}
