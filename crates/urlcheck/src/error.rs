use thiserror::Error;

/// Errors raised while loading checks or starting the engine.
///
/// Only [`CheckError::EngineStartup`] and [`CheckError::ChecksFile`] are fatal;
/// the others reject a single definition.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid schedule expression `{expression}`: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("invalid check definition `{name}`: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("cannot load checks file: {0}")]
    ChecksFile(String),

    #[error("engine startup failed: {0}")]
    EngineStartup(String),
}

impl CheckError {
    pub(crate) fn definition(name: &str, reason: impl ToString) -> Self {
        Self::InvalidDefinition { name: name.to_string(), reason: reason.to_string() }
    }
}

/// Errors on the mail path. Never escalated past the notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid email address: {0}")]
    Address(String),

    #[error("cannot build message: {0}")]
    Message(String),

    #[error("send failed: {0}")]
    Send(String),
}
