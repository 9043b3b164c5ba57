//! Schedule expressions and next-fire computation.
//!
//! Two variants are supported:
//! - cron: `sec min hour day-of-month month day-of-week [year]`, evaluated in
//!   the local time zone (a classic five-field expression fires at second 0)
//! - fixed interval: `@every 30s`, any humantime duration

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::error::CheckError;

const INTERVAL_PREFIX: &str = "@every";

/// A parsed schedule able to compute its fire instants.
pub trait Schedule: Send + Sync + fmt::Debug {
    /// First fire instant strictly after `after`, `None` when the schedule is exhausted.
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Short human readable description for logs
    fn describe(&self) -> String;
}

/// Parse a schedule expression into the matching [`Schedule`] variant.
pub fn parse_schedule(expression: &str) -> Result<Arc<dyn Schedule>, CheckError> {
    let expression = expression.trim();
    if let Some(rest) = expression.strip_prefix(INTERVAL_PREFIX) {
        return Ok(Arc::new(IntervalSchedule::parse(rest.trim(), expression)?));
    }
    Ok(Arc::new(CronSchedule::parse(expression)?))
}

/// Cron schedule with seconds precision.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    description: String,
    inner: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CheckError> {
        let normalized = normalize_cron(expression);
        let inner = cron::Schedule::from_str(&normalized).map_err(|e| {
            CheckError::InvalidSchedule { expression: expression.to_string(), reason: e.to_string() }
        })?;

        Ok(Self {
            expression: expression.to_string(),
            description: describe_cron(&normalized),
            inner,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Plain English reading of the expression, field by field
    pub fn description(&self) -> &str {
        &self.description
    }
}

const CRON_FIELDS: [(&str, &str); 7] = [
    ("second", "seconds"),
    ("minute", "minutes"),
    ("hour", "hours"),
    ("day of month", "days"),
    ("month", "months"),
    ("day of week", "days"),
    ("year", "years"),
];

fn describe_cron(normalized: &str) -> String {
    let parts: Vec<String> = normalized
        .split_whitespace()
        .zip(CRON_FIELDS)
        .filter_map(|(field, (unit, units))| describe_field(field, unit, units))
        .collect();

    if parts.is_empty() { "every second".to_string() } else { parts.join(", ") }
}

fn describe_field(field: &str, unit: &str, units: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return None;
    }
    if let Some((start, step)) = field.split_once('/') {
        return Some(match start {
            "*" | "0" => format!("every {step} {units}"),
            _ => format!("every {step} {units} from {unit} {start}"),
        });
    }
    Some(format!("at {unit} {field}"))
}

/// The cron crate wants at least six fields, seconds first.
fn normalize_cron(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == 5 { format!("0 {}", fields.join(" ")) } else { fields.join(" ") }
}

impl Schedule for CronSchedule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner
            .after(&after.with_timezone(&Local))
            .next()
            .map(|instant| instant.with_timezone(&Utc))
    }

    fn describe(&self) -> String {
        format!("cron `{}` ({})", self.expression, self.description)
    }
}

/// Fires every `every`, counted from the previous instant.
#[derive(Debug, Clone, Copy)]
pub struct IntervalSchedule {
    every: Duration,
}

impl IntervalSchedule {
    /// `None` for a zero interval.
    pub fn new(every: Duration) -> Option<Self> {
        (!every.is_zero()).then_some(Self { every })
    }

    fn parse(duration: &str, expression: &str) -> Result<Self, CheckError> {
        let invalid = |reason: String| CheckError::InvalidSchedule {
            expression: expression.to_string(),
            reason,
        };
        let every = humantime::parse_duration(duration).map_err(|e| invalid(e.to_string()))?;
        Self::new(every).ok_or_else(|| invalid("interval must be greater than zero".to_string()))
    }
}

impl Schedule for IntervalSchedule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let step = chrono::Duration::from_std(self.every).ok()?;
        after.checked_add_signed(step)
    }

    fn describe(&self) -> String {
        format!("every {}", humantime::format_duration(self.every))
    }
}
