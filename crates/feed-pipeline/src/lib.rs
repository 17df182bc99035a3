#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`subscriber`]: 피드 연결, 전체 토픽 구독, 재연결 백오프
//! - [`decoder`]: zlib 압축 해제 및 JSON envelope 추출
//! - [`filter`]: 스키마/세력 상태 술어
//! - [`registry`]: 성계 이름 → ID 저장소 (SQLite, PostgreSQL)
//! - [`notifier`]: 탐지 알림 수신자 (로그, 채널)
//! - [`processor`]: 단일 프레임 처리
//! - [`pipeline`]: 소비 루프 및 생명주기 (Pipeline trait 구현)
//! - [`stats`]: 처리 카운터
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod notifier;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod stats;
pub mod subscriber;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{FeedPipeline, FeedPipelineBuilder};
pub use processor::{FrameOutcome, FrameProcessor};
pub use stats::{PipelineStats, StatsSnapshot};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::FeedPipelineError;

// 구성 요소
pub use decoder::ZlibJsonDecoder;
pub use filter::EventFilter;
pub use notifier::{ChannelNotifier, LogNotifier};
pub use registry::{PostgresRegistry, SqliteRegistry};
pub use subscriber::{ChannelSource, FrameSource, RawFrame, ZmqSubscriber};
