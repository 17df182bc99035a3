//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! - [`Pipeline`] / [`DynPipeline`]: 시작, 정지, 상태 확인 생명주기
//! - [`FrameDecoder`]: 원시 프레임 → [`StreamEnvelope`]
//! - [`SystemRegistry`]: 성계 이름 → 대리 키 저장소 (원자적 등록)
//! - [`DetectionNotifier`]: 신규 탐지 알림 수신자
//!
//! 저장소와 알림 수신자는 I/O를 수행하므로 `dyn` 호환을 위해
//! [`BoxFuture`]를 반환합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, NotifyError, StorageError, WardenError};
use crate::event::DetectionEvent;
use crate::types::{Registration, StreamEnvelope, SystemId, SystemRecord};

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이지만 성능 저하 또는 일시 장애
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 장기 실행 모듈의 생명주기 trait
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다. 백그라운드 태스크를 생성하고 즉시 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), WardenError>> + Send;

    /// 모듈을 정지합니다. 진행 중인 프레임 처리를 마친 뒤 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), WardenError>> + Send;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `Pipeline`은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
pub trait DynPipeline: Send + Sync {
    fn start(&mut self) -> BoxFuture<'_, Result<(), WardenError>>;
    fn stop(&mut self) -> BoxFuture<'_, Result<(), WardenError>>;
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), WardenError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), WardenError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 프레임 디코더 trait
///
/// 실패는 항상 해당 프레임에 국한됩니다.
pub trait FrameDecoder: Send + Sync {
    /// 디코더 이름 (로깅용)
    fn name(&self) -> &str;

    /// 원시 프레임을 envelope로 디코딩합니다.
    fn decode(&self, raw: &[u8]) -> Result<StreamEnvelope, DecodeError>;
}

/// 성계 레지스트리 trait
///
/// # 불변 조건
/// - 같은 `name`에 대해 행은 최대 하나만 존재합니다.
/// - `register_if_absent`는 단일 원자적 연산이어야 합니다. 동시에 같은 이름으로
///   호출해도 하나의 행과 하나의 ID로 수렴하고, `created == true`는 한 번만 반환됩니다.
/// - 저장소 장애는 `Err`이며 절대 `Ok(None)`으로 바뀌지 않습니다.
pub trait SystemRegistry: Send + Sync {
    /// 백엔드 이름 (로깅용)
    fn backend(&self) -> &str;

    /// 이름으로 정확히 일치하는 행을 조회합니다.
    fn lookup<'a>(&'a self, name: &'a str)
    -> BoxFuture<'a, Result<Option<SystemId>, StorageError>>;

    /// 행이 없으면 생성하고, 있으면 기존 ID를 반환합니다.
    fn register_if_absent<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Registration, StorageError>>;

    /// ID로 행을 조회합니다.
    fn get(&self, id: SystemId) -> BoxFuture<'_, Result<Option<SystemRecord>, StorageError>>;

    /// 저장된 행 수
    fn count(&self) -> BoxFuture<'_, Result<u64, StorageError>>;
}

/// 탐지 알림 수신자 trait
///
/// 신규 등록된 성계마다 정확히 한 번 호출됩니다.
/// 실패해도 레지스트리 상태는 되돌리지 않습니다.
pub trait DetectionNotifier: Send + Sync {
    fn notify<'a>(&'a self, event: &'a DetectionEvent) -> BoxFuture<'a, Result<(), NotifyError>>;
}
