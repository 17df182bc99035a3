//! 탐지 알림 수신자 구현
//!
//! - [`LogNotifier`]: 구조화 로그 한 줄로 기록
//! - [`ChannelNotifier`]: bounded mpsc 채널로 하위 소비자에게 전달
//!
//! 두 구현 모두 레지스트리 상태에 관여하지 않습니다. 전달 실패는
//! [`NotifyError::Delivery`]로 보고되고, 호출 측은 로그만 남깁니다.

use tokio::sync::mpsc;
use tracing::info;
use warden_core::error::NotifyError;
use warden_core::event::{DetectionEvent, Event};
use warden_core::pipeline::{BoxFuture, DetectionNotifier};

/// 탐지 이벤트를 `tracing::info!`로 기록합니다.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl DetectionNotifier for LogNotifier {
    fn notify<'a>(&'a self, event: &'a DetectionEvent) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            info!(
                event_id = %event.event_id(),
                trace_id = %event.metadata.trace_id,
                system_id = event.system_id.get(),
                system = %event.system_name,
                state = %event.state_name,
                observed_at = %event.observed_at.to_rfc3339(),
                "new system detected"
            );
            Ok(())
        })
    }
}

/// 탐지 이벤트를 채널로 전달합니다.
///
/// 소비 루프를 막지 않도록 `try_send`를 사용합니다. 채널이 가득 차거나
/// 수신 측이 닫히면 전달 실패입니다.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<DetectionEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::Sender<DetectionEvent>) -> Self {
        Self { tx }
    }

    /// 채널과 함께 생성합니다.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DetectionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl DetectionNotifier for ChannelNotifier {
    fn notify<'a>(&'a self, event: &'a DetectionEvent) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.tx.try_send(event.clone()).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    NotifyError::Delivery("detection channel full".to_owned())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    NotifyError::Delivery("detection channel closed".to_owned())
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use warden_core::types::SystemId;

    fn sample_event(name: &str) -> DetectionEvent {
        DetectionEvent::new(
            SystemId(1),
            name,
            "Boom",
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier::new();
        assert!(notifier.notify(&sample_event("Sol")).await.is_ok());
    }

    #[tokio::test]
    async fn channel_notifier_delivers_event() {
        let (notifier, mut rx) = ChannelNotifier::channel(4);
        let event = sample_event("Sol");
        notifier.notify(&event).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
        assert_eq!(received.system_name, "Sol");
        assert_eq!(received.state_name, "Boom");
    }

    #[tokio::test]
    async fn channel_notifier_reports_full_channel() {
        let (notifier, _rx) = ChannelNotifier::channel(1);
        notifier.notify(&sample_event("Sol")).await.unwrap();

        let err = notifier.notify(&sample_event("Achenar")).await.unwrap_err();
        assert!(err.to_string().contains("full"));
    }

    #[tokio::test]
    async fn channel_notifier_reports_closed_channel() {
        let (notifier, rx) = ChannelNotifier::channel(1);
        drop(rx);

        let err = notifier.notify(&sample_event("Sol")).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
