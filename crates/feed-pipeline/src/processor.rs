//! 단일 프레임 처리기
//!
//! ```text
//! RawFrame -> FrameDecoder -> EventFilter -> SystemRegistry -> DetectionNotifier
//! ```
//!
//! 한 프레임을 끝까지 처리한 뒤 반환합니다. 에러 분류:
//! - 디코딩 실패: `Err(Decode)`, 호출 측이 로그를 남기고 다음 프레임으로 진행
//! - 레지스트리 장애: `Err(Storage)`, "미등록"으로 취급하지 않음.
//!   제한 시간 초과도 `StorageError::Connection`으로 보고됩니다.
//! - 알림 실패: 로그와 카운터만 남기고 `Ok(Detected)`를 반환

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use warden_core::error::{DecodeError, StorageError};
use warden_core::event::DetectionEvent;
use warden_core::metrics as m;
use warden_core::pipeline::{DetectionNotifier, FrameDecoder, SystemRegistry};
use warden_core::types::{StreamEnvelope, SystemId, SystemRecord};

use crate::error::FeedPipelineError;
use crate::filter::EventFilter;
use crate::stats::PipelineStats;
use crate::subscriber::RawFrame;

/// 프레임 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 스키마 또는 상태 불일치
    Filtered,
    /// 이미 등록된 성계 (알림 없음)
    AlreadyKnown(SystemId),
    /// 새로 등록된 성계 (알림 1회)
    Detected(SystemRecord),
}

/// 디코딩, 필터링, 등록, 알림을 순서대로 수행합니다.
///
/// 모든 구성 요소가 `Arc`이므로 복제 비용이 낮고, 여러 태스크에서
/// 동시에 호출해도 중복 등록이 생기지 않습니다 (레지스트리의 원자적 등록에 의존).
#[derive(Clone)]
pub struct FrameProcessor {
    decoder: Arc<dyn FrameDecoder>,
    filter: EventFilter,
    registry: Arc<dyn SystemRegistry>,
    notifier: Arc<dyn DetectionNotifier>,
    stats: Arc<PipelineStats>,
    registry_timeout: Duration,
}

/// 레지스트리 호출 기본 제한 시간
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

impl FrameProcessor {
    pub fn new(
        decoder: Arc<dyn FrameDecoder>,
        filter: EventFilter,
        registry: Arc<dyn SystemRegistry>,
        notifier: Arc<dyn DetectionNotifier>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            decoder,
            filter,
            registry,
            notifier,
            stats,
            registry_timeout: DEFAULT_REGISTRY_TIMEOUT,
        }
    }

    /// 레지스트리 호출 하나의 제한 시간을 설정합니다.
    pub fn with_registry_timeout(mut self, timeout: Duration) -> Self {
        self.registry_timeout = timeout;
        self
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// 원시 프레임 하나를 처리합니다.
    pub async fn process_frame(&self, frame: &RawFrame) -> Result<FrameOutcome, FeedPipelineError> {
        let started = Instant::now();
        self.stats.record_received();
        metrics::counter!(m::FRAMES_RECEIVED_TOTAL).increment(1);

        let envelope = match self.decoder.decode(&frame.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.stats.record_decode_failed();
                metrics::counter!(m::FRAMES_DECODE_FAILED_TOTAL, m::LABEL_REASON => decode_reason(&e))
                    .increment(1);
                return Err(e.into());
            }
        };

        let result = self.process_envelope(&envelope).await;
        metrics::histogram!(m::FRAME_PROCESSING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// 디코딩된 envelope를 처리합니다.
    pub async fn process_envelope(
        &self,
        envelope: &StreamEnvelope,
    ) -> Result<FrameOutcome, FeedPipelineError> {
        if !self.filter.accept(envelope) {
            self.stats.record_filtered();
            metrics::counter!(m::FRAMES_FILTERED_TOTAL).increment(1);
            return Ok(FrameOutcome::Filtered);
        }
        self.stats.record_matched();
        metrics::counter!(m::FRAMES_MATCHED_TOTAL).increment(1);

        let name = envelope.star_system_name.as_str();

        // 이미 등록된 성계는 읽기만 수행
        let known = self
            .bounded("lookup", self.registry.lookup(name))
            .await
            .map_err(|e| self.registry_fault(e))?;
        if let Some(system_id) = known {
            self.stats.record_registry_ok();
            debug!(system = %name, %system_id, "system already registered");
            return Ok(FrameOutcome::AlreadyKnown(system_id));
        }

        let registration = self
            .bounded("register", self.registry.register_if_absent(name))
            .await
            .map_err(|e| self.registry_fault(e))?;
        self.stats.record_registry_ok();

        if !registration.created {
            // 조회와 등록 사이에 다른 호출이 먼저 등록함
            debug!(system = %name, system_id = %registration.system_id, "lost registration race");
            return Ok(FrameOutcome::AlreadyKnown(registration.system_id));
        }

        self.stats.record_detected();
        metrics::counter!(m::SYSTEMS_REGISTERED_TOTAL, m::LABEL_BACKEND => self.registry.backend().to_owned())
            .increment(1);

        let state = envelope
            .faction_state
            .clone()
            .unwrap_or_else(|| self.filter.target_state().to_owned());
        let event = DetectionEvent::new(
            registration.system_id,
            name,
            state,
            envelope.timestamp,
        );

        if let Err(e) = self.notifier.notify(&event).await {
            self.stats.record_notify_failed();
            metrics::counter!(m::NOTIFY_FAILED_TOTAL).increment(1);
            warn!(
                error = %e,
                system = %name,
                system_id = %registration.system_id,
                "failed to deliver detection notification"
            );
        }

        Ok(FrameOutcome::Detected(SystemRecord {
            system_id: registration.system_id,
            name: name.to_owned(),
        }))
    }

    /// 레지스트리 호출에 제한 시간을 적용합니다.
    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.registry_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Connection(format!(
                "registry {op} timed out after {} ms",
                self.registry_timeout.as_millis()
            ))),
        }
    }

    fn registry_fault(&self, err: StorageError) -> FeedPipelineError {
        self.stats.record_registry_error();
        metrics::counter!(m::REGISTRY_ERRORS_TOTAL, m::LABEL_BACKEND => self.registry.backend().to_owned())
            .increment(1);
        err.into()
    }
}

fn decode_reason(err: &DecodeError) -> &'static str {
    match err {
        DecodeError::Decompress(_) => "decompress",
        DecodeError::InvalidDocument { .. } => "invalid_document",
        DecodeError::MissingField(_) => "missing_field",
        DecodeError::InvalidTimestamp { .. } => "invalid_timestamp",
        DecodeError::TooLarge { .. } => "too_large",
    }
}
