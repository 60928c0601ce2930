//! Error types for the forwarding pipeline.
//!
//! Every stage reports failures as a [`ForwardError`]. The kinds are only
//! visible in logs: the invocation boundary collapses them into
//! [`InvocationFailed`].

use crate::config::ConfigError;
use crate::ports::{StoreError, TransportError};
use thiserror::Error;
use uuid::Uuid;

/// The main error type raised by pipeline stages.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The inbound notification was malformed or came from an unexpected source.
    #[error("Invalid inbound event: {reason}")]
    InvalidEvent {
        /// Why the notification was rejected.
        reason: String,
    },

    /// The forwarder configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The raw message could not be read from object storage.
    #[error("Failed to fetch message from {location}: {source}")]
    Fetch {
        /// `bucket/key` that was requested.
        location: String,
        /// The storage failure.
        #[source]
        source: StoreError,
    },

    /// The rewritten message could not be handed to the transmission API.
    #[error("Failed to send message: {source}")]
    Send {
        /// The transmission failure.
        #[source]
        source: TransportError,
    },

    /// A stage ran before the stage that produces its input.
    #[error("Stage '{stage}' requires '{field}' which no earlier stage produced")]
    MissingState {
        /// The stage that found its input missing.
        stage: String,
        /// The missing context field.
        field: &'static str,
    },
}

impl ForwardError {
    /// Creates an invalid event error.
    #[must_use]
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// Creates a missing state error.
    #[must_use]
    pub fn missing_state(stage: impl Into<String>, field: &'static str) -> Self {
        Self::MissingState {
            stage: stage.into(),
            field,
        }
    }

    /// Returns a short, stable name for the error kind, used in log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidEvent { .. } => "invalid_event",
            Self::Configuration(_) => "configuration",
            Self::Fetch { .. } => "fetch",
            Self::Send { .. } => "send",
            Self::MissingState { .. } => "missing_state",
        }
    }
}

/// The single failure signal returned to whoever triggered an invocation.
///
/// The cause has already been logged; only the invocation id survives so the
/// caller can correlate with the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Mail forwarding invocation {invocation_id} failed")]
pub struct InvocationFailed {
    /// The id of the failed invocation.
    pub invocation_id: Uuid,
}

/// Error raised when a pipeline cannot be built.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ForwardError::invalid_event("x").kind(), "invalid_event");
        assert_eq!(
            ForwardError::from(ConfigError::missing("MAILFORWARD_EMAIL_BUCKET")).kind(),
            "configuration"
        );
        assert_eq!(ForwardError::missing_state("send_message", "raw_message").kind(), "missing_state");
    }

    #[test]
    fn test_fetch_error_display_names_location() {
        let err = ForwardError::Fetch {
            location: "mail-bucket/inbound/abc".to_string(),
            source: StoreError::not_found("mail-bucket", "inbound/abc"),
        };

        let message = err.to_string();
        assert!(message.contains("mail-bucket/inbound/abc"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invocation_failed_is_opaque() {
        let id = Uuid::new_v4();
        let failed = InvocationFailed { invocation_id: id };

        assert_eq!(
            failed.to_string(),
            format!("Mail forwarding invocation {id} failed")
        );
    }

    #[test]
    fn test_pipeline_validation_error_stages() {
        let err = PipelineValidationError::new("Duplicate stage")
            .with_stages(vec!["fetch_message".to_string()]);

        assert_eq!(err.to_string(), "Duplicate stage");
        assert_eq!(err.stages, vec!["fetch_message".to_string()]);
    }
}
