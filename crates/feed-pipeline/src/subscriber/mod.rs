//! 피드 구독 모듈 -- pub/sub 엔드포인트에서 원시 프레임을 수신합니다.
//!
//! # 프레임 소스
//! - [`ZmqSubscriber`]: ZeroMQ SUB 소켓 (빈 토픽 필터 = 전체 수신)
//! - [`ChannelSource`]: `tokio::mpsc` 채널 (테스트 및 임베딩용)
//!
//! # 재시작
//! 프레임 시퀀스는 재시작할 수 없습니다. [`FrameSource::open`]은 항상 새 연결을
//! 만들고 구독을 다시 등록합니다. 재연결 간격은 [`Backoff`]가 결정합니다.

pub mod backoff;
pub mod channel;
pub mod zmq;

pub use backoff::Backoff;
pub use channel::ChannelSource;
pub use zmq::ZmqSubscriber;

use bytes::Bytes;
use warden_core::error::FeedError;
use warden_core::pipeline::BoxFuture;

/// 수신된 원시 프레임
///
/// 구독자가 생성하고 디코더가 소비하는 중간 데이터 형식입니다.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// 압축된 프레임 바이트
    pub data: Bytes,
    /// 수신 소스 식별자 (예: "zmq:tcp://eddn.edcd.io:9500")
    pub source: String,
    /// 수신 시각
    pub received_at: std::time::SystemTime,
}

impl RawFrame {
    /// 새 RawFrame을 생성합니다.
    pub fn new(data: Bytes, source: impl Into<String>) -> Self {
        Self {
            data,
            source: source.into(),
            received_at: std::time::SystemTime::now(),
        }
    }
}

/// 원시 프레임 공급자
///
/// 소비 루프가 단독으로 소유하므로 `&mut self`를 받습니다.
/// `Box<dyn FrameSource>`로 태스크 간 이동이 가능하도록 `Send`를 요구합니다.
pub trait FrameSource: Send {
    /// 로깅용 소스 설명
    fn describe(&self) -> String;

    /// 새 연결을 맺고 전체 토픽을 구독합니다. 기존 연결은 닫습니다.
    fn open(&mut self) -> BoxFuture<'_, Result<(), FeedError>>;

    /// 다음 프레임을 기다립니다.
    ///
    /// 더 이상 프레임이 없으면 [`FeedError::Closed`]를 반환합니다.
    fn receive(&mut self) -> BoxFuture<'_, Result<RawFrame, FeedError>>;
}
