//! Email alerts for failed checks.
//!
//! The [`Notifier`] wraps a [`Mailer`] whose connectivity is checked once at
//! startup. When that check fails the notifier stays unavailable for the
//! whole run: probes keep running and alerts are dropped. Send errors are
//! logged here and never reach the dispatcher.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::definition::{CheckDefinition, Password};
use crate::error::NotifyError;
use crate::probe::{ProbeOutcome, ProbeReport};

/// An alert ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Alert {
    /// Compose the alert for a failed probe of `definition`.
    pub fn for_failure(
        definition: &CheckDefinition,
        report: &ProbeReport,
        recipient: &str,
        observed: u16,
    ) -> Self {
        let subject = format!("URL checker: an error has occurred ({})", definition.name);
        let body = format!(
            "{summary}\n\nCheck:    {name}\nExpected: {expected}\nObserved: {observed}\nRequest:  {method} {url}\n",
            summary = report.summary,
            name = definition.name,
            expected = definition.expected_status,
            method = definition.method,
            url = definition.url,
        );
        Self { to: recipient.to_string(), subject, body }
    }
}

/// Outbound mail transport.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Check that the transport can reach its server
    async fn test_connection(&self) -> Result<(), NotifyError>;

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// What happened to a notification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Sent,
    /// Not a failure, no recipient, or no available transport
    Skipped,
    /// Send attempted and failed (already logged)
    Failed,
}

/// Sends alert emails for failed probes.
#[derive(Clone, Default)]
pub struct Notifier {
    mailer: Option<Arc<dyn Mailer>>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("available", &self.is_available()).finish()
    }
}

impl Notifier {
    /// A notifier that never sends anything
    pub fn disabled() -> Self {
        Self { mailer: None }
    }

    /// Check `mailer` connectivity once; on failure alerts stay disabled.
    pub async fn connect(mailer: Arc<dyn Mailer>) -> Self {
        match mailer.test_connection().await {
            Ok(()) => {
                info!("Mail transport [OK]");
                Self { mailer: Some(mailer) }
            }
            Err(e) => {
                warn!("Mail transport unavailable, alerts are disabled for this run: {e}");
                Self::disabled()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.mailer.is_some()
    }

    /// Send the alert for `report` when it is a failure and the check has a recipient.
    pub async fn notify(
        &self,
        definition: &CheckDefinition,
        report: &ProbeReport,
    ) -> NotificationStatus {
        let ProbeOutcome::Failure(observed) = report.outcome else {
            return NotificationStatus::Skipped;
        };
        let Some(recipient) = definition.recipient.as_deref().filter(|r| !r.trim().is_empty())
        else {
            return NotificationStatus::Skipped;
        };
        let Some(mailer) = &self.mailer else {
            debug!(check = %definition.name, "Mail transport unavailable, alert skipped");
            return NotificationStatus::Skipped;
        };

        info!(check = %definition.name, "Sending notification to {recipient}");
        let alert = Alert::for_failure(definition, report, recipient, observed);

        match mailer.send(&alert).await {
            Ok(()) => NotificationStatus::Sent,
            Err(e) => {
                warn!(check = %definition.name, "Failed to send notification to {recipient}: {e}");
                NotificationStatus::Failed
            }
        }
    }
}

/// Transport security of the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection
    #[default]
    None,
    StartTls,
    /// Implicit TLS from the first byte
    Tls,
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" => Ok(Self::Tls),
            other => Err(format!("unknown SMTP security mode: {other}")),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::StartTls => write!(f, "starttls"),
            Self::Tls => write!(f, "tls"),
        }
    }
}

/// SMTP connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub login: Option<String>,
    /// Literal password or `$NAME` of an environment variable
    pub password: Option<String>,
    /// Sender address of alerts
    pub from: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            security: SmtpSecurity::None,
            login: None,
            password: None,
            from: "urlcheck@localhost".to_string(),
        }
    }
}

/// [`Mailer`] backed by an async lettre SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    #[tracing::instrument(
        name = "smtp_mailer_new",
        skip(settings),
        fields(host = %settings.host, port = %settings.port, security = %settings.security)
    )]
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from: Mailbox =
            settings.from.parse().map_err(|e| NotifyError::Address(format!("{}: {e}", settings.from)))?;

        let builder = match settings.security {
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| NotifyError::Connection(e.to_string()))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| NotifyError::Connection(e.to_string()))?,
        };

        let mut builder = builder.port(settings.port);

        if let (Some(login), Some(password)) = (&settings.login, &settings.password) {
            match Password::parse(password).resolve() {
                Some(password) => {
                    builder = builder.credentials(Credentials::new(login.clone(), password));
                }
                None => warn!("SMTP password variable is not set, connecting without credentials"),
            }
        }

        debug!("SMTP transport initialized");

        Ok(Self { transport: builder.build(), from })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn test_connection(&self) -> Result<(), NotifyError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(NotifyError::Connection("server did not accept the connection".into())),
            Err(e) => Err(NotifyError::Connection(e.to_string())),
        }
    }

    #[tracing::instrument(name = "smtp_send", skip(self, alert), fields(to = %alert.to))]
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let to: Mailbox =
            alert.to.parse().map_err(|e| NotifyError::Address(format!("{}: {e}", alert.to)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(alert.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body.clone())
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| NotifyError::Send(e.to_string()))?;

        debug!("Notification sent");
        Ok(())
    }
}

/// Whether `address` parses as a mailbox.
pub fn is_valid_address(address: &str) -> bool {
    address.parse::<Mailbox>().is_ok()
}
