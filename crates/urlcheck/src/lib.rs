//! urlcheck - cron-driven HTTP endpoint checks
//!
//! This library turns a set of named check definitions into periodically
//! executed HTTP(S) probes. Each probe outcome feeds per-check statistics and,
//! when the observed status differs from the expected one, an email alert.

pub mod config;
pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod notifier;
pub mod probe;
pub mod schedule;
pub mod stats;
pub mod trigger;

// Re-export main types
pub use config::{LoadedChecks, load_checks_file};
pub use definition::{BasicAuth, CheckDefinition, Password, ScopedCredentials};
pub use dispatcher::{Dispatcher, DispatcherConfig, DueEvent};
pub use error::{CheckError, NotifyError};
pub use lifecycle::Lifecycle;
pub use notifier::{Alert, Mailer, NotificationStatus, Notifier, SmtpMailer, SmtpSecurity, SmtpSettings};
pub use probe::{Checker, HttpChecker, ProbeOutcome, ProbeReport, TlsTrustPolicy};
pub use schedule::{CronSchedule, IntervalSchedule, Schedule, parse_schedule};
pub use stats::{Statistics, StatisticsLine, StatisticsRegistry};
pub use trigger::{ScheduleRegistry, TriggerEngine};

/// urlcheck result type
pub type Result<T> = std::result::Result<T, CheckError>;

/// User agent sent with every probe
pub const USER_AGENT: &str = concat!("urlcheck/", env!("CARGO_PKG_VERSION"));
