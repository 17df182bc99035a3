//! 이벤트 필터 -- 스키마와 세력 상태에 대한 순수 술어
//!
//! 두 조건 모두 대소문자를 구분하는 정확한 일치입니다.
//! 세력 상태가 없는 envelope는 항상 거부됩니다.

use warden_core::types::StreamEnvelope;

/// 설정된 대상 스키마/상태로 envelope를 걸러냅니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    target_schema: String,
    target_state: String,
}

impl EventFilter {
    pub fn new(target_schema: impl Into<String>, target_state: impl Into<String>) -> Self {
        Self {
            target_schema: target_schema.into(),
            target_state: target_state.into(),
        }
    }

    pub fn target_schema(&self) -> &str {
        &self.target_schema
    }

    pub fn target_state(&self) -> &str {
        &self.target_state
    }

    /// envelope가 대상 스키마와 상태를 모두 만족하는지 확인합니다.
    pub fn accept(&self, envelope: &StreamEnvelope) -> bool {
        accept(envelope, &self.target_schema, &self.target_state)
    }
}

/// `envelope.schema_ref == target_schema && envelope.faction_state == Some(target_state)`
pub fn accept(envelope: &StreamEnvelope, target_schema: &str, target_state: &str) -> bool {
    envelope.schema_ref == target_schema
        && envelope.faction_state.as_deref() == Some(target_state)
}
