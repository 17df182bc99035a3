//! 파이프라인 처리 통계
//!
//! 소비 태스크와 `health_check`가 공유하므로 원자 카운터로 구성합니다.
//! Prometheus 메트릭과 별개로, 레코더가 설치되지 않은 환경(테스트, 임베딩)에서도
//! 값을 확인할 수 있습니다.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

/// 공유 처리 카운터
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    decode_failed: AtomicU64,
    filtered: AtomicU64,
    matched: AtomicU64,
    detected: AtomicU64,
    notify_failed: AtomicU64,
    registry_errors: AtomicU64,
    reconnects: AtomicU64,
    consecutive_registry_errors: AtomicU32,
    reconnecting: AtomicBool,
}

/// 특정 시점의 카운터 사본
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub decode_failed: u64,
    pub filtered: u64,
    pub matched: u64,
    pub detected: u64,
    pub notify_failed: u64,
    pub registry_errors: u64,
    pub reconnects: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failed(&self) {
        self.decode_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_matched(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detected(&self) {
        self.detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notify_failed(&self) {
        self.notify_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// 레지스트리 장애를 기록하고 연속 장애 횟수를 반환합니다.
    pub fn record_registry_error(&self) -> u32 {
        self.registry_errors.fetch_add(1, Ordering::Relaxed);
        self.consecutive_registry_errors
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1)
    }

    /// 레지스트리 왕복이 성공하면 연속 장애 횟수를 초기화합니다.
    pub fn record_registry_ok(&self) {
        self.consecutive_registry_errors.store(0, Ordering::Relaxed);
    }

    pub fn consecutive_registry_errors(&self) -> u32 {
        self.consecutive_registry_errors.load(Ordering::Relaxed)
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_reconnecting(&self, value: bool) {
        self.reconnecting.store(value, Ordering::Relaxed);
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            detected: self.detected.load(Ordering::Relaxed),
            notify_failed: self.notify_failed.load(Ordering::Relaxed),
            registry_errors: self.registry_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
