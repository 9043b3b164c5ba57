//! Dispatcher - runs probes for due events on a bounded pool of tasks.
//!
//! Probes of the same check may overlap: a new due event does not wait for
//! the previous probe of that check to finish.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::definition::CheckDefinition;
use crate::notifier::Notifier;
use crate::probe::{Checker, ProbeOutcome};
use crate::stats::StatisticsRegistry;

/// Default number of probes running at once
pub const DEFAULT_WORKERS: usize = 8;

/// Default wait for in-flight probes at shutdown
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// A check whose schedule was reached.
#[derive(Debug, Clone)]
pub struct DueEvent {
    pub definition: Arc<CheckDefinition>,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Probes allowed to run concurrently
    pub workers: usize,
    /// How long shutdown waits for in-flight probes
    pub grace_period: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, grace_period: DEFAULT_GRACE_PERIOD }
    }
}

/// Executes probes and feeds their outcomes to statistics and notifier.
#[derive(Clone)]
pub struct Dispatcher {
    checker: Arc<dyn Checker>,
    stats: Arc<StatisticsRegistry>,
    notifier: Arc<Notifier>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    grace_period: Duration,
}

impl Dispatcher {
    pub fn new(
        checker: Arc<dyn Checker>,
        stats: Arc<StatisticsRegistry>,
        notifier: Arc<Notifier>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            checker,
            stats,
            notifier,
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
            tracker: TaskTracker::new(),
            grace_period: config.grace_period,
        }
    }

    /// Spawn the probe for `event` without waiting for it.
    pub fn dispatch(&self, event: DueEvent) {
        let this = self.clone();
        self.tracker.spawn(async move {
            // Closed only when the dispatcher is gone
            let Ok(_permit) = this.permits.clone().acquire_owned().await else {
                return;
            };
            this.execute(&event.definition).await;
        });
    }

    /// Probe once, record the outcome, alert on failure.
    pub async fn execute(&self, definition: &CheckDefinition) -> ProbeOutcome {
        let report = self.checker.probe(definition).await;

        match &report.outcome {
            ProbeOutcome::Success => info!("{}", report.summary),
            ProbeOutcome::Failure(_) => error!("{}", report.summary),
            ProbeOutcome::TransportError(_) => warn!("{}", report.summary),
        }

        self.stats.record_outcome(&definition.name, &report.outcome);

        if matches!(report.outcome, ProbeOutcome::Failure(_)) && definition.recipient.is_some() {
            let status = self.notifier.notify(definition, &report).await;
            debug!(check = %definition.name, ?status, "Notification handled");
        }

        report.outcome
    }

    /// Consume due events until `cancel` fires or the channel closes, then
    /// wait up to the grace period for in-flight probes.
    pub async fn run(self, mut due_rx: mpsc::UnboundedReceiver<DueEvent>, cancel: CancellationToken) {
        info!(workers = self.permits.available_permits(), "Dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = due_rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }

        due_rx.close();
        self.drain().await;
    }

    /// Stop accepting probes and wait for the running ones.
    pub async fn drain(&self) {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, grace_period = ?self.grace_period, "Waiting for in-flight probes");
        }

        if tokio::time::timeout(self.grace_period, self.tracker.wait()).await.is_err() {
            warn!(abandoned = self.tracker.len(), "Grace period elapsed, abandoning running probes");
        }

        info!("Dispatcher stopped");
    }
}
