//! 피드 파이프라인 에러 타입
//!
//! [`FeedPipelineError`]는 파이프라인 내부의 모든 에러를 표현합니다.
//! `From<FeedPipelineError> for WardenError` 변환으로 상위 레이어에서
//! `?` 연산자로 전파할 수 있습니다.

use warden_core::error::{DecodeError, FeedError, PipelineError, StorageError, WardenError};

/// 피드 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum FeedPipelineError {
    /// 전송 계층 에러
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// 프레임 디코딩 에러 (해당 프레임만 건너뜀)
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// 레지스트리 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl FeedPipelineError {
    /// 단일 프레임에 국한된 에러인지 확인합니다.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<FeedPipelineError> for WardenError {
    fn from(err: FeedPipelineError) -> Self {
        match err {
            FeedPipelineError::Feed(e) => WardenError::Feed(e),
            FeedPipelineError::Decode(e) => WardenError::Decode(e),
            FeedPipelineError::Storage(e) => WardenError::Storage(e),
            FeedPipelineError::Config { .. } => {
                WardenError::Pipeline(PipelineError::InitFailed(err.to_string()))
            }
            FeedPipelineError::Channel(reason) => {
                WardenError::Pipeline(PipelineError::Channel(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = FeedPipelineError::Config {
            field: "max_frame_bytes".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        assert!(err.to_string().contains("max_frame_bytes"));
    }

    #[test]
    fn storage_error_keeps_its_kind_in_warden_error() {
        let err = FeedPipelineError::Storage(StorageError::Connection("refused".to_owned()));
        let warden: WardenError = err.into();
        assert!(matches!(
            warden,
            WardenError::Storage(StorageError::Connection(_))
        ));
    }

    #[test]
    fn config_error_becomes_init_failed() {
        let err = FeedPipelineError::Config {
            field: "registry".to_owned(),
            reason: "required".to_owned(),
        };
        let warden: WardenError = err.into();
        assert!(matches!(
            warden,
            WardenError::Pipeline(PipelineError::InitFailed(_))
        ));
    }

    #[test]
    fn only_decode_errors_are_frame_local() {
        assert!(FeedPipelineError::Decode(DecodeError::MissingField("schemaRef")).is_frame_local());
        assert!(!FeedPipelineError::Feed(FeedError::Closed).is_frame_local());
        assert!(
            !FeedPipelineError::Storage(StorageError::Query("x".to_owned())).is_frame_local()
        );
    }
}
