//! 파이프라인 오케스트레이션 -- 구독/디코딩/필터/등록/알림의 전체 흐름을 관리합니다.
//!
//! [`FeedPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `warden-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FrameSource -> FrameProcessor(decode -> filter -> registry -> notifier) -> mpsc -> downstream
//! ```
//!
//! 소비 루프는 프레임 하나를 끝까지 처리한 뒤 다음 프레임을 요청합니다.
//! 취소 토큰은 프레임 사이와 수신 대기 중에 확인합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use warden_core::error::{FeedError, PipelineError, WardenError};
use warden_core::event::DetectionEvent;
use warden_core::metrics as m;
use warden_core::pipeline::{DetectionNotifier, FrameDecoder, HealthStatus, Pipeline, SystemRegistry};

use crate::config::PipelineConfig;
use crate::decoder::ZlibJsonDecoder;
use crate::error::FeedPipelineError;
use crate::filter::EventFilter;
use crate::notifier::ChannelNotifier;
use crate::processor::{FrameOutcome, FrameProcessor};
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::subscriber::{Backoff, FrameSource, RawFrame, ZmqSubscriber};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 소비 태스크 종료 결과. 프레임 소스를 돌려주어 재시작할 수 있게 합니다.
struct ConsumerExit {
    source: Box<dyn FrameSource>,
    result: Result<(), FeedPipelineError>,
}

/// 피드 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use warden_feed::{FeedPipelineBuilder, registry};
///
/// let registry = registry::connect(&core_config.registry).await?;
/// let (mut pipeline, detection_rx) = FeedPipelineBuilder::new()
///     .config(PipelineConfig::from_core(&core_config))
///     .registry(registry)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct FeedPipeline {
    config: PipelineConfig,
    state: PipelineState,
    processor: FrameProcessor,
    stats: Arc<PipelineStats>,
    /// 실행 중에는 소비 태스크가 소유합니다.
    source: Mutex<Option<Box<dyn FrameSource>>>,
    cancel: Option<CancellationToken>,
    terminated: CancellationToken,
    task: Option<JoinHandle<ConsumerExit>>,
}

impl FeedPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 처리 카운터 사본을 반환합니다.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 소비 루프가 종료되면(정상, 에러, 정지 모두) 취소되는 토큰.
    ///
    /// `start` 이후에 호출해야 해당 실행의 토큰을 받습니다.
    pub fn terminated(&self) -> CancellationToken {
        self.terminated.clone()
    }

    /// 소비 루프가 스스로 끝날 때까지 기다립니다 (소스가 닫히거나 치명적 에러).
    pub async fn join(&mut self) -> Result<(), WardenError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        let Some(task) = self.task.take() else {
            return Err(PipelineError::NotRunning.into());
        };

        let result = match task.await {
            Ok(exit) => {
                *self.source.get_mut() = Some(exit.source);
                exit.result.map_err(WardenError::from)
            }
            Err(e) => Err(PipelineError::Channel(format!("consumer task failed: {e}")).into()),
        };
        self.cancel = None;
        self.state = PipelineState::Stopped;
        result
    }
}

impl Pipeline for FeedPipeline {
    async fn start(&mut self) -> Result<(), WardenError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let Some(source) = self.source.get_mut().take() else {
            return Err(PipelineError::InitFailed("frame source unavailable".to_owned()).into());
        };

        info!(
            source = %source.describe(),
            schema = %self.config.schema_ref,
            state = %self.config.faction_state,
            "starting feed pipeline"
        );

        let cancel = CancellationToken::new();
        let terminated = CancellationToken::new();
        let task = tokio::spawn(run_consumer(
            source,
            self.processor.clone(),
            self.config.clone(),
            cancel.clone(),
            terminated.clone(),
        ));

        self.cancel = Some(cancel);
        self.terminated = terminated;
        self.task = Some(task);
        self.state = PipelineState::Running;
        info!("feed pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WardenError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping feed pipeline");
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(mut task) = self.task.take() {
            let timeout = Duration::from_secs(self.config.stop_timeout_secs);
            match tokio::time::timeout(timeout, &mut task).await {
                Ok(Ok(exit)) => {
                    if let Err(e) = &exit.result {
                        warn!(error = %e, "consumer loop had terminated with an error");
                    }
                    *self.source.get_mut() = Some(exit.source);
                }
                Ok(Err(e)) => {
                    error!(error = %e, "consumer task failed, frame source lost");
                }
                Err(_) => {
                    task.abort();
                    warn!(
                        timeout_secs = self.config.stop_timeout_secs,
                        "consumer task did not stop in time, aborted"
                    );
                }
            }
        }

        self.state = PipelineState::Stopped;
        info!(stats = ?self.stats.snapshot(), "feed pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PipelineState::Running => {
                if self.task.as_ref().is_none_or(|t| t.is_finished()) {
                    return HealthStatus::Unhealthy("consumer loop terminated".to_owned());
                }
                if self.stats.is_reconnecting() {
                    return HealthStatus::Degraded("reconnecting to feed".to_owned());
                }
                let faults = self.stats.consecutive_registry_errors();
                if faults > 0 {
                    return HealthStatus::Degraded(format!(
                        "{faults} consecutive registry errors"
                    ));
                }
                HealthStatus::Healthy
            }
        }
    }
}

async fn run_consumer(
    mut source: Box<dyn FrameSource>,
    processor: FrameProcessor,
    config: PipelineConfig,
    cancel: CancellationToken,
    terminated: CancellationToken,
) -> ConsumerExit {
    let _done = terminated.drop_guard();
    let result = consume(source.as_mut(), &processor, &config, &cancel).await;
    match &result {
        Ok(()) => info!("consumer loop finished"),
        Err(e) => error!(error = %e, "consumer loop terminated"),
    }
    processor.stats().set_reconnecting(false);
    ConsumerExit { source, result }
}

async fn consume(
    source: &mut dyn FrameSource,
    processor: &FrameProcessor,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<(), FeedPipelineError> {
    let mut backoff = Backoff::from_config(config);
    let stats = Arc::clone(processor.stats());

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        r = source.open() => r,
    };
    if let Err(e) = opened {
        warn!(source = %source.describe(), error = %e, "initial feed connection failed");
        if !reconnect(source, &mut backoff, &stats, cancel).await? {
            return Ok(());
        }
    }

    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("cancellation requested");
                return Ok(());
            }
            r = receive_with_timeout(source, config.receive_timeout()) => r,
        };

        match received {
            Ok(frame) => {
                backoff.reset();
                handle_frame(processor, config, &frame).await?;
            }
            Err(FeedError::Closed) => {
                info!(source = %source.describe(), "frame source closed");
                return Ok(());
            }
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "feed receive failed");
                if !reconnect(source, &mut backoff, &stats, cancel).await? {
                    return Ok(());
                }
            }
        }
    }
}

/// 프레임 하나를 처리합니다. 치명적 에러만 `Err`로 반환합니다.
async fn handle_frame(
    processor: &FrameProcessor,
    config: &PipelineConfig,
    frame: &RawFrame,
) -> Result<(), FeedPipelineError> {
    match processor.process_frame(frame).await {
        Ok(FrameOutcome::Detected(record)) => {
            info!(system = %record.name, system_id = %record.system_id, "registered new system");
        }
        Ok(FrameOutcome::AlreadyKnown(system_id)) => {
            debug!(%system_id, "matching frame for known system");
        }
        Ok(FrameOutcome::Filtered) => {
            trace!(source = %frame.source, "frame filtered");
        }
        Err(FeedPipelineError::Decode(e)) => {
            warn!(source = %frame.source, error = %e, "skipping undecodable frame");
        }
        Err(FeedPipelineError::Storage(e)) => {
            let consecutive = processor.stats().consecutive_registry_errors();
            error!(error = %e, consecutive, "registry fault while processing frame");
            if consecutive >= config.max_consecutive_registry_errors {
                return Err(e.into());
            }
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn receive_with_timeout(
    source: &mut dyn FrameSource,
    timeout: Option<Duration>,
) -> Result<RawFrame, FeedError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, source.receive())
            .await
            .map_err(|_| FeedError::Timeout {
                secs: limit.as_secs(),
            })?,
        None => source.receive().await,
    }
}

/// 백오프 간격으로 재연결을 시도합니다.
///
/// 연결되면 `Ok(true)`, 취소되면 `Ok(false)`, 시도 횟수를 모두 쓰면
/// [`FeedError::ReconnectExhausted`]를 반환합니다.
async fn reconnect(
    source: &mut dyn FrameSource,
    backoff: &mut Backoff,
    stats: &PipelineStats,
    cancel: &CancellationToken,
) -> Result<bool, FeedPipelineError> {
    stats.set_reconnecting(true);
    loop {
        let Some(delay) = backoff.next_delay() else {
            return Err(FeedError::ReconnectExhausted {
                attempts: backoff.attempts(),
            }
            .into());
        };
        stats.record_reconnect();
        metrics::counter!(m::FEED_RECONNECTS_TOTAL).increment(1);
        warn!(
            source = %source.describe(),
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "reconnecting to feed"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            _ = tokio::time::sleep(delay) => {}
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            r = source.open() => r,
        };
        match opened {
            Ok(()) => {
                stats.set_reconnecting(false);
                info!(source = %source.describe(), "feed reconnected");
                return Ok(true);
            }
            Err(e) => warn!(source = %source.describe(), error = %e, "reconnect attempt failed"),
        }
    }
}

/// 피드 파이프라인 빌더
///
/// 알림 수신자를 지정하지 않으면 [`ChannelNotifier`]를 만들고 수신 채널을 반환합니다.
pub struct FeedPipelineBuilder {
    config: PipelineConfig,
    registry: Option<Arc<dyn SystemRegistry>>,
    source: Option<Box<dyn FrameSource>>,
    decoder: Option<Arc<dyn FrameDecoder>>,
    notifier: Option<Arc<dyn DetectionNotifier>>,
    detection_tx: Option<mpsc::Sender<DetectionEvent>>,
    detection_channel_capacity: Option<usize>,
}

impl FeedPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            registry: None,
            source: None,
            decoder: None,
            notifier: None,
            detection_tx: None,
            detection_channel_capacity: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 성계 레지스트리 (필수)
    pub fn registry(mut self, registry: Arc<dyn SystemRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 프레임 소스. 지정하지 않으면 설정의 엔드포인트로 [`ZmqSubscriber`]를 만듭니다.
    pub fn source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// 프레임 디코더. 기본값은 [`ZlibJsonDecoder`].
    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// 알림 수신자를 직접 지정합니다. 이 경우 수신 채널은 반환되지 않습니다.
    pub fn notifier(mut self, notifier: Arc<dyn DetectionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 외부 탐지 이벤트 채널을 설정합니다.
    pub fn detection_sender(mut self, tx: mpsc::Sender<DetectionEvent>) -> Self {
        self.detection_tx = Some(tx);
        self
    }

    /// 내부 탐지 채널 용량 (설정값을 덮어씀)
    pub fn detection_channel_capacity(mut self, capacity: usize) -> Self {
        self.detection_channel_capacity = Some(capacity);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `FeedPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<DetectionEvent>>`: 탐지 이벤트 수신 채널
    ///   (notifier 또는 detection_sender를 설정한 경우 None)
    pub fn build(
        mut self,
    ) -> Result<(FeedPipeline, Option<mpsc::Receiver<DetectionEvent>>), FeedPipelineError> {
        if let Some(capacity) = self.detection_channel_capacity {
            self.config.detection_channel_capacity = capacity;
        }
        self.config.validate()?;

        let registry = self.registry.ok_or_else(|| FeedPipelineError::Config {
            field: "registry".to_owned(),
            reason: "a system registry is required".to_owned(),
        })?;

        let (notifier, detection_rx): (Arc<dyn DetectionNotifier>, _) =
            match (self.notifier, self.detection_tx) {
                (Some(notifier), _) => (notifier, None),
                (None, Some(tx)) => (Arc::new(ChannelNotifier::new(tx)), None),
                (None, None) => {
                    let (notifier, rx) =
                        ChannelNotifier::channel(self.config.detection_channel_capacity);
                    (Arc::new(notifier), Some(rx))
                }
            };

        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(ZlibJsonDecoder::new(self.config.max_frame_bytes)));
        let source = self
            .source
            .unwrap_or_else(|| Box::new(ZmqSubscriber::new(self.config.endpoint.clone())));

        let stats = Arc::new(PipelineStats::new());
        let filter = EventFilter::new(&self.config.schema_ref, &self.config.faction_state);
        let processor = FrameProcessor::new(decoder, filter, registry, notifier, Arc::clone(&stats))
            .with_registry_timeout(self.config.registry_timeout());

        let pipeline = FeedPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            processor,
            stats,
            source: Mutex::new(Some(source)),
            cancel: None,
            terminated: CancellationToken::new(),
            task: None,
        };

        Ok((pipeline, detection_rx))
    }
}

impl Default for FeedPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;

    use bytes::Bytes;
    use warden_core::error::StorageError;
    use warden_core::pipeline::BoxFuture;
    use warden_core::types::{Registration, SystemId, SystemRecord};

    use crate::decoder::compress;
    use crate::registry::SqliteRegistry;
    use crate::subscriber::ChannelSource;

    const SCHEMA: &str = "journal/1";

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            schema_ref: SCHEMA.to_owned(),
            faction_state: "Boom".to_owned(),
            reconnect_initial_backoff_ms: 10,
            reconnect_max_backoff_ms: 20,
            max_reconnect_attempts: 2,
            stop_timeout_secs: 2,
            ..Default::default()
        }
    }

    fn registry() -> Arc<dyn SystemRegistry> {
        Arc::new(SqliteRegistry::open_in_memory().unwrap())
    }

    fn matching_frame(system: &str) -> Bytes {
        frame_in_state(system, "Boom")
    }

    fn frame_in_state(system: &str, state: &str) -> Bytes {
        let json = format!(
            r#"{{"$schemaRef":"{SCHEMA}","message":{{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"{system}","StationFaction":{{"FactionState":"{state}"}}}}}}"#
        );
        Bytes::from(compress(json.as_bytes()).unwrap())
    }

    /// 지정한 성계 이름에서만 연결 에러를 내는 인메모리 레지스트리
    #[derive(Default)]
    struct FlakyRegistry {
        rows: StdMutex<HashMap<String, i64>>,
        failing: HashSet<&'static str>,
        /// true면 어떤 호출에도 응답하지 않음
        stalled: bool,
    }

    impl FlakyRegistry {
        fn failing_on(names: &[&'static str]) -> Self {
            Self {
                failing: names.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn stalled() -> Self {
            Self {
                stalled: true,
                ..Default::default()
            }
        }

        async fn check(&self, name: &str) -> Result<(), StorageError> {
            if self.stalled {
                std::future::pending::<()>().await;
            }
            if self.failing.contains(name) {
                return Err(StorageError::Connection("connection reset".to_owned()));
            }
            Ok(())
        }
    }

    impl SystemRegistry for FlakyRegistry {
        fn backend(&self) -> &str {
            "flaky"
        }

        fn lookup<'a>(
            &'a self,
            name: &'a str,
        ) -> BoxFuture<'a, Result<Option<SystemId>, StorageError>> {
            Box::pin(async move {
                self.check(name).await?;
                Ok(self.rows.lock().unwrap().get(name).copied().map(SystemId))
            })
        }

        fn register_if_absent<'a>(
            &'a self,
            name: &'a str,
        ) -> BoxFuture<'a, Result<Registration, StorageError>> {
            Box::pin(async move {
                self.check(name).await?;
                let mut rows = self.rows.lock().unwrap();
                if let Some(id) = rows.get(name) {
                    return Ok(Registration::existing(SystemId(*id)));
                }
                let id = rows.len() as i64 + 1;
                rows.insert(name.to_owned(), id);
                Ok(Registration::created(SystemId(id)))
            })
        }

        fn get(&self, _id: SystemId) -> BoxFuture<'_, Result<Option<SystemRecord>, StorageError>> {
            Box::pin(async { Ok(None) })
        }

        fn count(&self) -> BoxFuture<'_, Result<u64, StorageError>> {
            Box::pin(async move { Ok(self.rows.lock().unwrap().len() as u64) })
        }
    }

    /// 조건이 만족될 때까지 짧게 대기합니다.
    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    /// 매번 연결에 실패하는 소스
    struct UnreachableSource;

    impl FrameSource for UnreachableSource {
        fn describe(&self) -> String {
            "unreachable".to_owned()
        }

        fn open(&mut self) -> warden_core::pipeline::BoxFuture<'_, Result<(), FeedError>> {
            Box::pin(async {
                Err(FeedError::Connect {
                    endpoint: "tcp://nowhere:1".to_owned(),
                    reason: "refused".to_owned(),
                })
            })
        }

        fn receive(&mut self) -> warden_core::pipeline::BoxFuture<'_, Result<RawFrame, FeedError>> {
            Box::pin(async { Err(FeedError::Receive("not connected".to_owned())) })
        }
    }

    #[test]
    fn builder_creates_pipeline_with_receiver() {
        let (_tx, source) = ChannelSource::pair(1);
        let (pipeline, rx) = FeedPipelineBuilder::new()
            .config(test_config())
            .registry(registry())
            .source(Box::new(source))
            .build()
            .unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert!(rx.is_some());
    }

    #[test]
    fn builder_with_external_sender_returns_no_receiver() {
        let (tx, _rx) = mpsc::channel(4);
        let (_pipeline, rx) = FeedPipelineBuilder::new()
            .config(test_config())
            .registry(registry())
            .detection_sender(tx)
            .build()
            .unwrap();
        assert!(rx.is_none());
    }

    #[test]
    fn builder_without_registry_fails() {
        let result = FeedPipelineBuilder::new().config(test_config()).build();
        assert!(matches!(
            result,
            Err(FeedPipelineError::Config { ref field, .. }) if field == "registry"
        ));
    }

    #[test]
    fn builder_rejects_zero_channel_capacity() {
        let result = FeedPipelineBuilder::new()
            .config(test_config())
            .registry(registry())
            .detection_channel_capacity(0)
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn lifecycle_start_stop_restart() {
        let (tx, source) = ChannelSource::pair(8);
        let (mut pipeline, _rx) = FeedPipelineBuilder::new()
            .config(test_config())
            .registry(registry())
            .source(Box::new(source))
            .build()
            .unwrap();

        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(Pipeline::stop(&mut pipeline).await.is_err());

        Pipeline::start(&mut pipeline).await.unwrap();
        assert!(Pipeline::start(&mut pipeline).await.is_err());
        assert!(pipeline.health_check().await.is_healthy());

        Pipeline::stop(&mut pipeline).await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.terminated().is_cancelled());

        // 소스가 반환되었으므로 재시작 가능
        Pipeline::start(&mut pipeline).await.unwrap();
        tx.send(matching_frame("Sol")).await.unwrap();
        drop(tx);
        pipeline.join().await.unwrap();
        assert_eq!(pipeline.stats().detected, 1);
    }

    #[tokio::test]
    async fn closed_source_finishes_loop() {
        let (tx, source) = ChannelSource::pair(8);
        let (mut pipeline, rx) = FeedPipelineBuilder::new()
            .config(test_config())
            .registry(registry())
            .source(Box::new(source))
            .build()
            .unwrap();
        let mut rx = rx.unwrap();

        tx.send(matching_frame("Sol")).await.unwrap();
        tx.send(Bytes::from_static(b"corrupt")).await.unwrap();
        tx.send(matching_frame("Achenar")).await.unwrap();
        drop(tx);

        Pipeline::start(&mut pipeline).await.unwrap();
        pipeline.join().await.unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.decode_failed, 1);
        assert_eq!(stats.detected, 2);
        assert_eq!(rx.recv().await.unwrap().system_name, "Sol");
        assert_eq!(rx.recv().await.unwrap().system_name, "Achenar");
    }

    #[tokio::test]
    async fn exhausted_reconnects_terminate_with_error() {
        let (mut pipeline, _rx) = FeedPipelineBuilder::new()
            .config(test_config())
            .registry(registry())
            .source(Box::new(UnreachableSource))
            .build()
            .unwrap();

        Pipeline::start(&mut pipeline).await.unwrap();
        let err = pipeline.join().await.unwrap_err();
        assert!(matches!(
            err,
            WardenError::Feed(FeedError::ReconnectExhausted { attempts: 2 })
        ));
        assert_eq!(pipeline.stats().reconnects, 2);
    }

    #[tokio::test]
    async fn stop_interrupts_reconnect_backoff() {
        let config = PipelineConfig {
            reconnect_initial_backoff_ms: 60_000,
            reconnect_max_backoff_ms: 60_000,
            max_reconnect_attempts: 0,
            ..test_config()
        };
        let (mut pipeline, _rx) = FeedPipelineBuilder::new()
            .config(config)
            .registry(registry())
            .source(Box::new(UnreachableSource))
            .build()
            .unwrap();

        Pipeline::start(&mut pipeline).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            pipeline.health_check().await,
            HealthStatus::Degraded(_)
        ));

        Pipeline::stop(&mut pipeline).await.unwrap();
        assert!(pipeline.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn registry_fault_skips_frame_and_loop_continues() {
        let config = PipelineConfig {
            max_consecutive_registry_errors: 2,
            ..test_config()
        };
        let (tx, source) = ChannelSource::pair(8);
        let (mut pipeline, rx) = FeedPipelineBuilder::new()
            .config(config)
            .registry(Arc::new(FlakyRegistry::failing_on(&["Maia", "Merope"])))
            .source(Box::new(source))
            .build()
            .unwrap();
        let mut rx = rx.unwrap();

        tx.send(matching_frame("Maia")).await.unwrap();
        tx.send(matching_frame("Sol")).await.unwrap();
        tx.send(matching_frame("Merope")).await.unwrap();
        tx.send(frame_in_state("Lave", "Bust")).await.unwrap();
        tx.send(matching_frame("Achenar")).await.unwrap();
        drop(tx);

        Pipeline::start(&mut pipeline).await.unwrap();
        pipeline.join().await.unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.received, 5);
        assert_eq!(stats.registry_errors, 2);
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.detected, 2);
        assert_eq!(rx.recv().await.unwrap().system_name, "Sol");
        assert_eq!(rx.recv().await.unwrap().system_name, "Achenar");
    }

    #[tokio::test]
    async fn consecutive_registry_faults_terminate_loop() {
        let config = PipelineConfig {
            max_consecutive_registry_errors: 3,
            ..test_config()
        };
        let (tx, source) = ChannelSource::pair(8);
        let (mut pipeline, _rx) = FeedPipelineBuilder::new()
            .config(config)
            .registry(Arc::new(FlakyRegistry::failing_on(&["Maia", "Merope", "Taygeta"])))
            .source(Box::new(source))
            .build()
            .unwrap();

        for system in ["Maia", "Merope", "Taygeta", "Sol"] {
            tx.send(matching_frame(system)).await.unwrap();
        }

        Pipeline::start(&mut pipeline).await.unwrap();
        let err = pipeline.join().await.unwrap_err();
        assert!(matches!(
            err,
            WardenError::Storage(StorageError::Connection(_))
        ));

        // 세 번째 연속 장애에서 종료되어 마지막 프레임은 읽지 않음
        let stats = pipeline.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.registry_errors, 3);
        assert_eq!(stats.detected, 0);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_registry_times_out_and_next_frame_is_consumed() {
        let config = PipelineConfig {
            registry_timeout_ms: 50,
            max_consecutive_registry_errors: 5,
            ..test_config()
        };
        let (tx, source) = ChannelSource::pair(8);
        let (mut pipeline, _rx) = FeedPipelineBuilder::new()
            .config(config)
            .registry(Arc::new(FlakyRegistry::stalled()))
            .source(Box::new(source))
            .build()
            .unwrap();

        tx.send(matching_frame("Sol")).await.unwrap();
        tx.send(matching_frame("Achenar")).await.unwrap();

        Pipeline::start(&mut pipeline).await.unwrap();
        wait_until(|| pipeline.stats().registry_errors == 2).await;

        assert_eq!(pipeline.stats().received, 2);
        assert!(matches!(
            pipeline.health_check().await,
            HealthStatus::Degraded(_)
        ));

        Pipeline::stop(&mut pipeline).await.unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn receive_timeout_triggers_reconnect() {
        let config = PipelineConfig {
            receive_timeout_secs: 1,
            max_reconnect_attempts: 0,
            ..test_config()
        };
        let (tx, source) = ChannelSource::pair(8);
        let (mut pipeline, rx) = FeedPipelineBuilder::new()
            .config(config)
            .registry(registry())
            .source(Box::new(source))
            .build()
            .unwrap();
        let mut rx = rx.unwrap();

        Pipeline::start(&mut pipeline).await.unwrap();
        assert_eq!(pipeline.stats().reconnects, 0);

        // 송신 측을 열어둔 채 프레임을 보내지 않음
        wait_until(|| pipeline.stats().reconnects >= 1).await;

        // 재연결 후에도 같은 소스에서 계속 수신
        tx.send(matching_frame("Sol")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().system_name, "Sol");
        assert!(pipeline.health_check().await.is_healthy());

        Pipeline::stop(&mut pipeline).await.unwrap();
    }
}
