//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `warden_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 레지스트리 백엔드 레이블 키 (sqlite, postgres)
pub const LABEL_BACKEND: &str = "backend";

/// 디코딩 실패 사유 레이블 키 (decompress, document, field, timestamp, size)
pub const LABEL_REASON: &str = "reason";

// ─── Feed Pipeline 메트릭 ───────────────────────────────────────────

/// 수신한 전체 프레임 수 (counter)
pub const FRAMES_RECEIVED_TOTAL: &str = "warden_frames_received_total";

/// 디코딩에 실패한 프레임 수 (counter, label: reason)
pub const FRAMES_DECODE_FAILED_TOTAL: &str = "warden_frames_decode_failed_total";

/// 필터에서 걸러진 프레임 수 (counter)
pub const FRAMES_FILTERED_TOTAL: &str = "warden_frames_filtered_total";

/// 필터를 통과한 프레임 수 (counter)
pub const FRAMES_MATCHED_TOTAL: &str = "warden_frames_matched_total";

/// 신규 등록된 성계 수 (counter)
pub const SYSTEMS_REGISTERED_TOTAL: &str = "warden_systems_registered_total";

/// 알림 전달 실패 수 (counter)
pub const NOTIFY_FAILED_TOTAL: &str = "warden_notify_failed_total";

/// 레지스트리 장애 수 (counter, label: backend)
pub const REGISTRY_ERRORS_TOTAL: &str = "warden_registry_errors_total";

/// 피드 재연결 시도 수 (counter)
pub const FEED_RECONNECTS_TOTAL: &str = "warden_feed_reconnects_total";

/// 프레임 하나의 처리 시간 (histogram, 초)
pub const FRAME_PROCESSING_DURATION_SECONDS: &str = "warden_frame_processing_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "warden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "warden_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 프레임 처리 시간 히스토그램 버킷 (초)
///
/// 레지스트리 왕복을 포함하므로 100us ~ 10s 범위
pub const PROCESSING_DURATION_BUCKETS: [f64; 10] = [
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 10.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        FRAMES_RECEIVED_TOTAL,
        "Total number of raw frames received from the feed"
    );
    describe_counter!(
        FRAMES_DECODE_FAILED_TOTAL,
        "Total number of frames skipped because they could not be decoded"
    );
    describe_counter!(
        FRAMES_FILTERED_TOTAL,
        "Total number of decoded frames rejected by the schema/state filter"
    );
    describe_counter!(
        FRAMES_MATCHED_TOTAL,
        "Total number of decoded frames accepted by the schema/state filter"
    );
    describe_counter!(
        SYSTEMS_REGISTERED_TOTAL,
        "Total number of star systems registered for the first time"
    );
    describe_counter!(
        NOTIFY_FAILED_TOTAL,
        "Total number of detection notifications that failed to deliver"
    );
    describe_counter!(
        REGISTRY_ERRORS_TOTAL,
        "Total number of registry faults (store unreachable or query failure)"
    );
    describe_counter!(
        FEED_RECONNECTS_TOTAL,
        "Total number of feed reconnect attempts"
    );
    describe_histogram!(
        FRAME_PROCESSING_DURATION_SECONDS,
        "Time to decode, filter and register a single frame in seconds"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Warden daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
