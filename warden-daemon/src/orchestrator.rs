//! Daemon orchestration -- assembly, lifecycle and shutdown.
//!
//! The [`Orchestrator`] loads configuration, connects the system registry,
//! builds the feed pipeline and runs until a shutdown signal arrives or the
//! consumer loop ends on its own.
//!
//! # Shutdown Order
//!
//! 1. Feed pipeline (stop consuming frames, no new detections)
//! 2. Detection logger (drain already queued detections)
//! 3. Uptime updater

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use warden_core::config::WardenConfig;
use warden_core::event::{DetectionEvent, MODULE_FEED_PIPELINE};
use warden_core::pipeline::{DetectionNotifier, Pipeline, SystemRegistry};
use warden_feed::{FeedPipeline, FeedPipelineBuilder, FrameSource, LogNotifier, PipelineConfig};

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status, registry_health};
use crate::metrics_server;

/// Interval between periodic health log lines.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: WardenConfig,
    pipeline: FeedPipeline,
    registry: Arc<dyn SystemRegistry>,
    /// Taken by the detection logger when `run` starts.
    detection_rx: Option<mpsc::Receiver<DetectionEvent>>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read, parsed or validated
    /// - The registry backend cannot be reached or migrated
    /// - The metrics endpoint cannot be bound
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = WardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// The frame source is a ZeroMQ subscriber on `feed.endpoint`.
    pub async fn build_from_config(config: WardenConfig) -> Result<Self> {
        Self::assemble(config, None).await
    }

    /// Build with a caller-supplied frame source instead of the ZeroMQ
    /// subscriber. Metrics settings are honored as usual.
    pub async fn build_with_source(
        config: WardenConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<Self> {
        Self::assemble(config, Some(source)).await
    }

    async fn assemble(config: WardenConfig, source: Option<Box<dyn FrameSource>>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before any component records a metric
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        tracing::info!(backend = %config.registry.backend, "connecting system registry");
        let registry = warden_feed::registry::connect(&config.registry)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect registry: {}", e))?;

        let mut builder = FeedPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .registry(Arc::clone(&registry));
        if let Some(source) = source {
            builder = builder.source(source);
        }
        let (pipeline, detection_rx) = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build feed pipeline: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(16);

        if config.metrics.enabled {
            record_daemon_metrics();
        }

        tracing::info!(
            endpoint = %config.feed.endpoint,
            faction_state = %config.filter.faction_state,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            registry,
            detection_rx,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and block until SIGTERM or SIGINT.
    ///
    /// Also returns when the consumer loop terminates on its own; in that
    /// case a fatal pipeline error is returned as the daemon's error.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and run until `shutdown` resolves or the consumer
    /// loop ends.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start feed pipeline: {}", e))?;

        let detection_logger = self.detection_rx.take().map(|rx| {
            let shutdown_rx = self.shutdown_tx.subscribe();
            spawn_detection_logger(rx, shutdown_rx)
        });

        let uptime_updater = if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            Some(spawn_uptime_updater(self.start_time, shutdown_rx))
        } else {
            None
        };

        let terminated = self.pipeline.terminated();
        let mut health_tick = tokio::time::interval(HEALTH_LOG_INTERVAL);
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!("entering main event loop");
        let outcome = loop {
            tokio::select! {
                signal = &mut shutdown => {
                    match &signal {
                        Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
                        Err(e) => tracing::error!(error = %e, "shutdown signal handler failed"),
                    }
                    let stopped = self
                        .pipeline
                        .stop()
                        .await
                        .map_err(|e| anyhow::anyhow!("failed to stop feed pipeline: {}", e));
                    break signal.and(stopped);
                }
                _ = terminated.cancelled() => {
                    tracing::warn!("feed pipeline ended without a shutdown signal");
                    break self
                        .pipeline
                        .join()
                        .await
                        .map_err(|e| anyhow::anyhow!("feed pipeline failed: {}", e));
                }
                _ = health_tick.tick() => {
                    let health = self.health().await;
                    tracing::info!(
                        status = %health.status,
                        uptime_secs = health.uptime_secs,
                        stats = ?self.pipeline.stats(),
                        "health"
                    );
                }
            }
        };

        tracing::info!("broadcasting shutdown signal to background tasks");
        let _ = self.shutdown_tx.send(());

        if let Some(task) = detection_logger {
            match task.await {
                Ok(logged) => tracing::debug!(logged, "detection logger finished"),
                Err(e) => tracing::warn!(error = %e, "detection logger task failed"),
            }
        }
        if let Some(task) = uptime_updater {
            let _ = task.await;
        }

        tracing::info!(stats = ?self.pipeline.stats(), "warden stopped");
        outcome
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules = vec![
            ModuleHealth {
                name: MODULE_FEED_PIPELINE.to_owned(),
                enabled: true,
                status: self.pipeline.health_check().await,
            },
            registry_health(self.registry.as_ref()).await,
        ];

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Processing counters of the feed pipeline.
    pub fn stats(&self) -> warden_feed::StatsSnapshot {
        self.pipeline.stats()
    }

    pub fn registry(&self) -> &Arc<dyn SystemRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Log every detection until shutdown, then drain what is still queued.
///
/// Returns the number of detections logged.
fn spawn_detection_logger(
    mut rx: mpsc::Receiver<DetectionEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let notifier = LogNotifier::new();
        let mut logged = 0u64;
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    log_detection(&notifier, &event).await;
                    logged += 1;
                }
                _ = shutdown_rx.recv() => {
                    while let Ok(event) = rx.try_recv() {
                        log_detection(&notifier, &event).await;
                        logged += 1;
                    }
                    break;
                }
            }
        }
        logged
    })
}

async fn log_detection(notifier: &LogNotifier, event: &DetectionEvent) {
    if let Err(e) = notifier.notify(event).await {
        tracing::warn!(error = %e, system = %event.system_name, "failed to log detection");
    }
}

/// Spawn a task that periodically updates the uptime gauge.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        use warden_core::metrics as m;

        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}

fn record_daemon_metrics() {
    use warden_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}
