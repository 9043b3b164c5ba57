//! Lifecycle controller - wires trigger engine and dispatcher together
//!
//! `start` spawns both halves of the pipeline on one cancellation token;
//! `run_until` waits for the external stop signal, shuts everything down and
//! hands back the final statistics.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::CheckError;
use crate::notifier::Notifier;
use crate::probe::Checker;
use crate::stats::{StatisticsLine, StatisticsRegistry};
use crate::trigger::{ScheduleRegistry, TriggerEngine};

/// A running pipeline.
pub struct Lifecycle {
    stats: Arc<StatisticsRegistry>,
    cancel: CancellationToken,
    engine_handle: JoinHandle<()>,
    dispatcher_handle: JoinHandle<()>,
}

impl Lifecycle {
    /// Start scheduling every check of `registry`. Must be called inside a tokio runtime.
    pub fn start(
        registry: &ScheduleRegistry,
        checker: Arc<dyn Checker>,
        stats: Arc<StatisticsRegistry>,
        notifier: Arc<Notifier>,
        config: DispatcherConfig,
    ) -> Result<Self, CheckError> {
        if config.workers == 0 {
            return Err(CheckError::EngineStartup("worker pool size must be at least 1".into()));
        }

        let cancel = CancellationToken::new();
        let (due_tx, due_rx) = mpsc::unbounded_channel();

        let engine = TriggerEngine::new(registry, Utc::now());
        let dispatcher = Dispatcher::new(checker, Arc::clone(&stats), notifier, config);

        let engine_handle = tokio::spawn(engine.run(due_tx, cancel.clone()));
        let dispatcher_handle = tokio::spawn(dispatcher.run(due_rx, cancel.clone()));

        info!(
            checks = registry.len(),
            rejected = registry.rejected().len(),
            workers = config.workers,
            "Scheduler [OK]"
        );

        Ok(Self { stats, cancel, engine_handle, dispatcher_handle })
    }

    /// Run until `shutdown` resolves, then stop and return the final snapshot.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Vec<StatisticsLine> {
        tokio::select! {
            _ = shutdown => info!("Stop signal received, shutting down"),
            _ = self.cancel.cancelled() => {}
        }
        self.shutdown().await
    }

    /// Stop emitting due events, drain in-flight probes, return the final snapshot.
    pub async fn shutdown(self) -> Vec<StatisticsLine> {
        self.cancel.cancel();

        if let Err(e) = self.engine_handle.await {
            error!("Trigger engine task failed: {e}");
        }
        if let Err(e) = self.dispatcher_handle.await {
            error!("Dispatcher task failed: {e}");
        }

        self.stats.snapshot()
    }
}
