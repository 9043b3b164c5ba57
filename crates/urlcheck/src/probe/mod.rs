//! Probe execution - one HTTP(S) request per fire event
//!
//! A probe takes an immutable [`CheckDefinition`] and returns a
//! [`ProbeReport`]; it keeps no state between executions, so overlapping
//! probes of the same check never interfere.

pub mod http;
pub mod tls;

pub use http::HttpChecker;
pub use tls::TlsTrustPolicy;

use std::fmt;

use crate::definition::CheckDefinition;

/// Classified result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Observed status equals the expected one
    Success,
    /// Target answered with another status
    Failure(u16),
    /// The request could not be completed; the target's health is unknown
    TransportError(String),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure(code) => write!(f, "failure ({code})"),
            Self::TransportError(cause) => write!(f, "transport error ({cause})"),
        }
    }
}

/// Outcome plus the summary line logged and mailed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    pub summary: String,
}

impl ProbeReport {
    /// Report for a response carrying `status`.
    pub fn from_status(definition: &CheckDefinition, status: u16) -> Self {
        let outcome = if status == definition.expected_status {
            ProbeOutcome::Success
        } else {
            ProbeOutcome::Failure(status)
        };
        let summary =
            format!("{} {} : {} {}", status, definition.name, definition.method, definition.url);
        Self { outcome, summary }
    }

    /// Report for a request that never produced a response.
    pub fn transport_error(definition: &CheckDefinition, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        let summary = format!(
            "ERR {} : {} {} ({})",
            definition.name, definition.method, definition.url, cause
        );
        Self { outcome: ProbeOutcome::TransportError(cause), summary }
    }
}

/// Checker trait for probing a check definition
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform one probe and classify its result
    async fn probe(&self, definition: &CheckDefinition) -> ProbeReport;
}
