//! Error types for remote background removal
//!
//! Every failure a dispatch can produce is normalized into a [`ClassifiedError`]:
//! a stable [`ErrorKind`] tag plus a display-ready message. Only the message is
//! meant for end users; the kind drives automated handling.

use crate::types::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, ClassifiedError>;

/// Stable classification tags for dispatch failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No credential was supplied for the selected provider
    MissingCredential,
    /// The provider identifier is unknown or not registered
    UnsupportedProvider,
    /// The request never produced an HTTP response (DNS, connect, timeout, ...)
    NetworkFailure,
    /// The provider answered with an error status
    RemoteRejected,
    /// An asynchronous job reached the `failed` state
    RemoteProcessingFailed,
    /// An asynchronous job did not finish within the polling budget
    PollingTimeout,
    /// The response body could not be interpreted
    DecodeFailure,
}

impl ErrorKind {
    /// Stable machine-readable tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::UnsupportedProvider => "unsupported_provider",
            Self::NetworkFailure => "network_failure",
            Self::RemoteRejected => "remote_rejected",
            Self::RemoteProcessingFailed => "remote_processing_failed",
            Self::PollingTimeout => "polling_timeout",
            Self::DecodeFailure => "decode_failure",
        }
    }

    /// Whether the failure was detected before any network traffic
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::UnsupportedProvider)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure normalized to a kind tag and a user-facing message
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
}

impl ClassifiedError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a missing credential error for a provider
    pub fn missing_credential(provider: &str) -> Self {
        Self::new(
            ErrorKind::MissingCredential,
            format!("No API key configured for provider '{}'", provider),
        )
    }

    /// Create an unsupported provider error
    pub fn unsupported_provider(provider: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedProvider,
            format!("Unsupported provider: {}", provider),
        )
    }

    /// Create a network failure error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::NetworkFailure, msg)
    }

    /// Create a remote rejection error
    pub fn remote_rejected<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::RemoteRejected, msg)
    }

    /// Create a remote job failure error
    pub fn remote_processing_failed<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::RemoteProcessingFailed, msg)
    }

    /// Create a polling timeout error with the exhausted budget
    pub fn polling_timeout(attempts: u32, interval_ms: u64) -> Self {
        Self::new(
            ErrorKind::PollingTimeout,
            format!(
                "Processing did not finish after {} status checks ({}ms apart)",
                attempts, interval_ms
            ),
        )
    }

    /// Create a decode failure error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::DecodeFailure, msg)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Display-ready message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.kind.is_local()
    }
}

/// Errors raised while building client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ConfigError {
    /// Create a new invalid configuration error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::Invalid(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }
}

/// Errors raised by the image lifecycle controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The job id is not tracked (never created or already discarded)
    #[error("Unknown image job: {0}")]
    UnknownJob(JobId),

    /// The requested operation is not valid in the job's current state
    #[error("Cannot {operation} image job {job} while it is {status}")]
    InvalidTransition {
        job: JobId,
        status: JobStatus,
        operation: &'static str,
    },

    /// The job was discarded while its dispatch was in flight
    #[error("Image job {0} was discarded before processing finished")]
    JobDiscarded(JobId),

    /// The image source was rejected before tracking
    #[error("Invalid image source: {0}")]
    InvalidSource(String),
}
