//! ZeroMQ SUB 구독자
//!
//! 원격 PUB 엔드포인트에 연결하고 빈 토픽 필터로 전체 메시지를 구독합니다.
//! 애플리케이션 수준의 흐름 제어는 없으며, 소비가 늦어지면 전송 계층에 쌓입니다.

use bytes::Bytes;
use tracing::{debug, info, warn};
use warden_core::error::FeedError;
use warden_core::pipeline::BoxFuture;
use zeromq::{Socket, SocketRecv, SubSocket};

use super::{FrameSource, RawFrame};

/// ZeroMQ SUB 소켓 기반 프레임 소스
pub struct ZmqSubscriber {
    endpoint: String,
    source_label: String,
    socket: Option<SubSocket>,
    received_count: u64,
}

impl ZmqSubscriber {
    /// 엔드포인트를 지정하여 구독자를 생성합니다. 연결은 [`connect`](Self::connect)에서 맺습니다.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            source_label: format!("zmq:{endpoint}"),
            endpoint,
            socket: None,
            received_count: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn received_count(&self) -> u64 {
        self.received_count
    }

    /// 새 SUB 소켓을 만들어 엔드포인트에 연결합니다. 기존 소켓은 닫습니다.
    pub async fn connect(&mut self) -> Result<(), FeedError> {
        self.close().await;

        let mut socket = SubSocket::new();
        socket
            .connect(&self.endpoint)
            .await
            .map_err(|e| FeedError::Connect {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        info!(endpoint = %self.endpoint, "connected to feed");
        self.socket = Some(socket);
        Ok(())
    }

    /// 빈 토픽 필터로 전체 메시지를 구독합니다.
    pub async fn subscribe_all(&mut self) -> Result<(), FeedError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| FeedError::Subscribe("not connected".to_owned()))?;
        socket
            .subscribe("")
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))?;
        debug!(endpoint = %self.endpoint, "subscribed to all topics");
        Ok(())
    }

    /// 다음 메시지를 기다립니다.
    ///
    /// 다중 파트 메시지는 마지막 파트를 페이로드로 사용합니다.
    pub async fn receive_frame(&mut self) -> Result<RawFrame, FeedError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| FeedError::Receive("not connected".to_owned()))?;

        let message = socket
            .recv()
            .await
            .map_err(|e| FeedError::Receive(e.to_string()))?;

        let mut parts = message.into_vec();
        if parts.len() > 1 {
            debug!(parts = parts.len(), "multipart message, using last part");
        }
        let data: Bytes = parts
            .pop()
            .ok_or_else(|| FeedError::Receive("empty message".to_owned()))?;

        self.received_count += 1;
        Ok(RawFrame::new(data, self.source_label.clone()))
    }

    async fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            let errors = socket.close().await;
            if !errors.is_empty() {
                warn!(
                    endpoint = %self.endpoint,
                    errors = errors.len(),
                    "errors while closing previous feed socket"
                );
            }
        }
    }
}

impl FrameSource for ZmqSubscriber {
    fn describe(&self) -> String {
        self.source_label.clone()
    }

    fn open(&mut self) -> BoxFuture<'_, Result<(), FeedError>> {
        Box::pin(async move {
            self.connect().await?;
            self.subscribe_all().await
        })
    }

    fn receive(&mut self) -> BoxFuture<'_, Result<RawFrame, FeedError>> {
        Box::pin(self.receive_frame())
    }
}
