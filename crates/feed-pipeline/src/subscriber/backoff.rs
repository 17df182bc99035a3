//! 재연결 지수 백오프
//!
//! 대기 시간은 `initial`에서 시작해 매 시도마다 두 배가 되며 `max`를 넘지 않습니다.
//! 프레임을 정상 수신하면 [`Backoff::reset`]으로 시도 횟수를 초기화합니다.

use std::time::Duration;

use crate::config::PipelineConfig;

/// 재연결 대기 시간 계산기
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
    /// 0이면 무제한
    max_attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max,
            current: initial,
            attempts: 0,
            max_attempts,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_initial_backoff_ms),
            Duration::from_millis(config.reconnect_max_backoff_ms),
            config.max_reconnect_attempts,
        )
    }

    /// 다음 대기 시간을 반환합니다. 시도 횟수를 모두 쓰면 `None`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts > 0 && self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }

    /// 연속 실패 횟수
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = self.initial;
    }
}
