//! Schedule registry and trigger engine.
//!
//! The registry validates every definition's schedule once at load time; the
//! engine then keeps one [`ScheduleState`] per accepted definition in a
//! min-heap and emits a [`DueEvent`] whenever the earliest state is reached.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::definition::CheckDefinition;
use crate::dispatcher::DueEvent;
use crate::schedule::{Schedule, parse_schedule};

/// A definition whose schedule parsed.
#[derive(Debug, Clone)]
pub struct ScheduledCheck {
    pub definition: Arc<CheckDefinition>,
    pub schedule: Arc<dyn Schedule>,
}

/// The validated set of check definitions.
#[derive(Debug, Default)]
pub struct ScheduleRegistry {
    checks: Vec<ScheduledCheck>,
    rejected: Vec<String>,
}

impl ScheduleRegistry {
    /// Parse every definition's schedule. Invalid or duplicate definitions are
    /// logged and left out; they never prevent the others from loading.
    pub fn load(definitions: impl IntoIterator<Item = CheckDefinition>) -> Self {
        let mut registry = Self::default();
        let mut names = HashSet::new();

        for definition in definitions {
            if !names.insert(definition.name.clone()) {
                error!(check = %definition.name, "Duplicate check name, definition ignored");
                registry.rejected.push(definition.name);
                continue;
            }

            match parse_schedule(&definition.schedule) {
                Ok(schedule) => {
                    debug!(check = %definition.name, schedule = %schedule.describe(), "Check registered");
                    registry
                        .checks
                        .push(ScheduledCheck { definition: Arc::new(definition), schedule });
                }
                Err(e) => {
                    error!(check = %definition.name, "Cron Expression Error: {e}");
                    registry.rejected.push(definition.name);
                }
            }
        }

        registry
    }

    pub fn checks(&self) -> &[ScheduledCheck] {
        &self.checks
    }

    /// Names of the definitions excluded at load time
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Next-fire cursor of one registered check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub next_fire: DateTime<Utc>,
    /// Index into the registry's checks
    pub check: usize,
}

impl Ord for ScheduleState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.next_fire.cmp(&other.next_fire).then(self.check.cmp(&other.check))
    }
}

impl PartialOrd for ScheduleState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Turns schedules into due events.
pub struct TriggerEngine {
    checks: Vec<ScheduledCheck>,
    queue: BinaryHeap<Reverse<ScheduleState>>,
}

impl TriggerEngine {
    /// Compute the first fire instant of every check after `now`.
    pub fn new(registry: &ScheduleRegistry, now: DateTime<Utc>) -> Self {
        let checks = registry.checks().to_vec();
        let mut queue = BinaryHeap::with_capacity(checks.len());

        for (index, check) in checks.iter().enumerate() {
            match check.schedule.next_after(now) {
                Some(next_fire) => {
                    info!(
                        check = %check.definition.name,
                        schedule = %check.schedule.describe(),
                        next_fire = %next_fire,
                        "Check scheduled"
                    );
                    queue.push(Reverse(ScheduleState { next_fire, check: index }));
                }
                None => {
                    warn!(check = %check.definition.name, "Schedule never fires, check not scheduled")
                }
            }
        }

        Self { checks, queue }
    }

    /// Earliest pending fire instant
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|Reverse(state)| state.next_fire)
    }

    /// Pop every state due at `now`, advance it, and return the due events.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<DueEvent> {
        let mut due = Vec::new();

        while let Some(Reverse(state)) = self.queue.peek().copied() {
            if state.next_fire > now {
                break;
            }
            self.queue.pop();

            let check = &self.checks[state.check];
            due.push(DueEvent {
                definition: Arc::clone(&check.definition),
                scheduled_at: state.next_fire,
            });

            // A late loop resumes from now instead of replaying missed instants.
            let base = state.next_fire.max(now);
            match check.schedule.next_after(base) {
                Some(next_fire) => {
                    self.queue.push(Reverse(ScheduleState { next_fire, check: state.check }))
                }
                None => warn!(check = %check.definition.name, "Schedule exhausted, check retired"),
            }
        }

        due
    }

    /// Run the timing loop until `cancel` fires or the receiver is dropped.
    pub async fn run(mut self, due_tx: mpsc::UnboundedSender<DueEvent>, cancel: CancellationToken) {
        info!(checks = self.checks.len(), "Trigger engine started");

        loop {
            let Some(deadline) = self.next_deadline() else {
                info!("No schedule left to trigger");
                cancel.cancelled().await;
                break;
            };

            let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            for event in self.fire_due(Utc::now()) {
                debug!(check = %event.definition.name, scheduled_at = %event.scheduled_at, "Check due");
                if due_tx.send(event).is_err() {
                    warn!("Dispatcher is gone, stopping trigger engine");
                    return;
                }
            }
        }

        info!("Trigger engine stopped");
    }
}
