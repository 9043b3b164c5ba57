//! Per-check request/success counters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::probe::ProbeOutcome;

/// Counter pair of one check. `success_counter <= request_counter` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub request_counter: u64,
    pub success_counter: u64,
}

impl Statistics {
    /// Percentage of successful requests, 0 when nothing was counted.
    pub fn success_ratio(&self) -> f64 {
        if self.request_counter == 0 {
            return 0.0;
        }
        self.success_counter as f64 / self.request_counter as f64 * 100.0
    }

    fn record(&mut self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success => {
                self.request_counter += 1;
                self.success_counter += 1;
            }
            ProbeOutcome::Failure(_) => self.request_counter += 1,
            // The probe itself failed, the target was never observed
            ProbeOutcome::TransportError(_) => {}
        }
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsLine {
    pub name: String,
    pub request_counter: u64,
    pub success_counter: u64,
    pub success_ratio: f64,
}

impl fmt::Display for StatisticsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {}/{} {:.2}%",
            self.name, self.success_counter, self.request_counter, self.success_ratio
        )
    }
}

/// Process-wide registry of [`Statistics`], one lock per check name.
#[derive(Debug, Default)]
pub struct StatisticsRegistry {
    entries: RwLock<BTreeMap<String, Arc<Mutex<Statistics>>>>,
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one probe outcome for `name`, creating the entry on first use.
    pub fn record_outcome(&self, name: &str, outcome: &ProbeOutcome) {
        let entry = self.entry(name);
        let mut statistics = entry.lock().unwrap_or_else(PoisonError::into_inner);
        statistics.record(outcome);
    }

    /// Current counters of one check
    pub fn get(&self, name: &str) -> Option<Statistics> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).map(|entry| *entry.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// All counters ordered by check name.
    pub fn snapshot(&self) -> Vec<StatisticsLine> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(name, entry)| {
                let statistics = *entry.lock().unwrap_or_else(PoisonError::into_inner);
                StatisticsLine {
                    name: name.clone(),
                    request_counter: statistics.request_counter,
                    success_counter: statistics.success_counter,
                    success_ratio: statistics.success_ratio(),
                }
            })
            .collect()
    }

    fn entry(&self, name: &str) -> Arc<Mutex<Statistics>> {
        if let Some(entry) = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(name) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(name.to_string()).or_default())
    }
}
