//! 채널 기반 프레임 소스
//!
//! 호출자가 `tokio::mpsc::Sender<Bytes>`로 압축 프레임을 밀어 넣습니다.
//! 송신 측이 모두 닫히면 [`FeedError::Closed`]를 반환하여 소비 루프가 종료됩니다.

use bytes::Bytes;
use tokio::sync::mpsc;
use warden_core::error::FeedError;
use warden_core::pipeline::BoxFuture;

use super::{FrameSource, RawFrame};

/// mpsc 채널 기반 프레임 소스
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
    label: String,
    opened: bool,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            label: "channel".to_owned(),
            opened: false,
        }
    }

    /// 송신 측과 함께 소스를 생성합니다.
    pub fn pair(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl FrameSource for ChannelSource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn open(&mut self) -> BoxFuture<'_, Result<(), FeedError>> {
        Box::pin(async move {
            self.opened = true;
            Ok(())
        })
    }

    fn receive(&mut self) -> BoxFuture<'_, Result<RawFrame, FeedError>> {
        Box::pin(async move {
            if !self.opened {
                return Err(FeedError::Receive("source not opened".to_owned()));
            }
            match self.rx.recv().await {
                Some(data) => Ok(RawFrame::new(data, self.label.clone())),
                None => Err(FeedError::Closed),
            }
        })
    }
}
