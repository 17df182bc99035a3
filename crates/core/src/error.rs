//! 에러 타입 -- 도메인별 에러 정의
//!
//! "행이 없음"과 "저장소에 도달할 수 없음"은 서로 다른 결과입니다.
//! 전자는 `Ok(None)`, 후자는 [`StorageError::Connection`]으로 표현합니다.

/// Warden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 피드 전송 계층 에러
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// 프레임 디코딩 에러
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 알림 전달 에러
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 수명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 채널 송수신 실패
    #[error("channel error: {0}")]
    Channel(String),
}

/// 피드 전송 계층 에러
///
/// 재연결 정책이 있으므로 대부분 복구 가능한 조건입니다.
/// [`FeedError::ReconnectExhausted`]만 소비 루프를 종료시킵니다.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// 엔드포인트 연결 실패
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// 토픽 구독 실패
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// 프레임 수신 실패 (연결 리셋 등)
    #[error("receive failed: {0}")]
    Receive(String),

    /// 수신 타임아웃
    #[error("no frame received within {secs}s")]
    Timeout { secs: u64 },

    /// 소스가 닫힘 (더 이상 프레임 없음)
    #[error("frame source closed")]
    Closed,

    /// 재연결 시도 횟수 초과
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },
}

/// 프레임 디코딩 에러
///
/// 항상 단일 프레임에 국한되며, 소비 루프는 해당 프레임만 건너뜁니다.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// zlib 스트림이 손상됨
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// JSON 문서가 유효하지 않음
    #[error("invalid document at line {line}, column {column}: {reason}")]
    InvalidDocument {
        line: usize,
        column: usize,
        reason: String,
    },

    /// 필수 필드 누락
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// 타임스탬프 형식 오류
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// 압축 해제 크기 초과
    #[error("frame too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 저장소에 도달할 수 없음
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 스키마 생성 실패
    #[error("migration failed: {0}")]
    Migration(String),

    /// 이름 중복 이외의 제약 조건 위반
    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// 알림 전달 에러
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// 전달 실패
    #[error("delivery failed: {0}")]
    Delivery(String),
}
