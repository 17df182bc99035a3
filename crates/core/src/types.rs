//! 도메인 타입 -- 피드 수신과 시스템 레지스트리가 공유하는 데이터 구조
//!
//! [`StreamEnvelope`]는 프레임 하나를 디코딩한 결과이며 저장되지 않습니다.
//! [`SystemRecord`]는 레지스트리가 소유하는 영속 레코드입니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 디코딩된 피드 프레임
///
/// 프레임 하나당 하나씩 생성되며 처리 후 폐기됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    /// 페이로드 스키마 식별자 (URL 형태)
    pub schema_ref: String,
    /// 메시지 타임스탬프 (`message.timestamp`)
    pub timestamp: DateTime<Utc>,
    /// 성계 이름 (`message.StarSystem`)
    pub star_system_name: String,
    /// 정거장 세력 상태 (`message.StationFaction.FactionState`)
    ///
    /// 페이로드에 정거장 세력 정보가 없으면 `None`입니다.
    pub faction_state: Option<String>,
}

impl fmt::Display for StreamEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} system={} state={} at {}",
            self.schema_ref,
            self.star_system_name,
            self.faction_state.as_deref().unwrap_or("-"),
            self.timestamp.to_rfc3339(),
        )
    }
}

/// 저장소가 부여한 성계 대리 키
///
/// 값 `0`을 "없음"의 표식으로 쓰지 않습니다. 조회 실패는 항상 `Option::None`입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(pub i64);

impl SystemId {
    /// 내부 정수 값
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SystemId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// `systems` 테이블의 한 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub system_id: SystemId,
    pub name: String,
}

impl fmt::Display for SystemRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.system_id, self.name)
    }
}

/// `register_if_absent`의 결과
///
/// `created`는 이 호출이 행을 새로 만들었을 때만 `true`입니다.
/// 동시에 같은 이름을 등록한 호출 중 정확히 하나만 `true`를 받습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub system_id: SystemId,
    pub created: bool,
}

impl Registration {
    /// 새로 생성된 행
    pub fn created(system_id: SystemId) -> Self {
        Self {
            system_id,
            created: true,
        }
    }

    /// 이미 존재하던 행
    pub fn existing(system_id: SystemId) -> Self {
        Self {
            system_id,
            created: false,
        }
    }
}
