//! Job polling for asynchronous providers
//!
//! A job-based provider answers the submission with a job descriptor carrying a
//! status and a status-check location. The coordinator walks an explicit state
//! machine, `Queued → Checking → Succeeded | Failed | TimedOut`, checking the
//! status at a fixed interval until the job is terminal or the attempt budget is
//! spent, then fetches the artifact exactly once.
//!
//! Time and I/O are injected through [`Sleeper`] and [`JobTransport`], so the loop
//! can be driven in tests without timers or a network.

use crate::{
    classifier::classify_job_failure,
    config::ClientConfig,
    error::{ClassifiedError, Result},
};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Status reported by a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteJobStatus {
    #[serde(alias = "queued")]
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl RemoteJobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Locations exposed by a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobUrls {
    /// Status-check location
    pub get: Option<String>,
    pub cancel: Option<String>,
}

/// Job descriptor returned on submission and on every status check
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    pub status: RemoteJobStatus,
    #[serde(default)]
    pub urls: JobUrls,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl JobDescriptor {
    /// Location of the produced artifact (a string, or the first entry of a list)
    #[must_use]
    pub fn output_location(&self) -> Option<&str> {
        match self.output.as_ref()? {
            Value::String(location) => Some(location.as_str()),
            Value::Array(items) => items.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    /// Diagnostic text exposed by a failed job
    #[must_use]
    pub fn error_detail(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(detail) => Some(detail.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Polling state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Submitted, not yet checked
    Queued,
    /// Checked `attempt` times without reaching a terminal status
    Checking { attempt: u32 },
    Succeeded { output: String },
    Failed { detail: Option<String> },
    TimedOut { attempts: u32 },
}

impl PollState {
    /// State reached after observing `descriptor` on the given attempt (0 = submission)
    ///
    /// # Errors
    /// - `DecodeFailure` when a succeeded job exposes no output location
    pub fn after(descriptor: &JobDescriptor, attempt: u32) -> Result<Self> {
        Ok(match descriptor.status {
            RemoteJobStatus::Succeeded => {
                let output = descriptor.output_location().ok_or_else(|| {
                    ClassifiedError::decode("Job finished without an output location")
                })?;
                Self::Succeeded {
                    output: output.to_string(),
                }
            },
            RemoteJobStatus::Failed | RemoteJobStatus::Canceled => Self::Failed {
                detail: descriptor.error_detail(),
            },
            RemoteJobStatus::Starting | RemoteJobStatus::Processing | RemoteJobStatus::Unknown
                if attempt == 0 =>
            {
                Self::Queued
            },
            RemoteJobStatus::Starting | RemoteJobStatus::Processing | RemoteJobStatus::Unknown => {
                Self::Checking { attempt }
            },
        })
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::TimedOut { .. }
        )
    }
}

/// Source of delays between status checks
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Job I/O used by the coordinator
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Fetch the current descriptor from a status-check location
    async fn fetch_status(&self, location: &str) -> Result<JobDescriptor>;

    /// Fetch the finished artifact
    async fn fetch_artifact(&self, location: &str) -> Result<Bytes>;
}

/// Interval and budget for status checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl From<&ClientConfig> for PollSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// Drives a submitted job to completion
#[derive(Clone)]
pub struct PollingCoordinator {
    sleeper: Arc<dyn Sleeper>,
    settings: PollSettings,
}

impl PollingCoordinator {
    #[must_use]
    pub fn new(sleeper: Arc<dyn Sleeper>, settings: PollSettings) -> Self {
        Self { sleeper, settings }
    }

    #[must_use]
    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Poll `submitted` until terminal and return the artifact bytes
    ///
    /// # Errors
    /// - `RemoteProcessingFailed` when the job fails or is canceled
    /// - `PollingTimeout` when the attempt budget runs out
    /// - `DecodeFailure` when the job exposes no status or output location
    /// - Any transport error from status checks or the artifact fetch
    #[tracing::instrument(skip_all, fields(job = submitted.id.as_deref().unwrap_or("-")))]
    pub async fn run(&self, transport: &dyn JobTransport, submitted: JobDescriptor) -> Result<Bytes> {
        let mut location = submitted.urls.get.clone();
        let mut attempts = 0;
        let mut state = PollState::after(&submitted, attempts)?;
        tracing::debug!(?state, "job submitted");

        loop {
            state = match state {
                PollState::Queued | PollState::Checking { .. } => {
                    if attempts >= self.settings.max_attempts {
                        PollState::TimedOut { attempts }
                    } else {
                        let status_location = location.clone().ok_or_else(|| {
                            ClassifiedError::decode("Job did not expose a status location")
                        })?;
                        self.sleeper.sleep(self.settings.interval).await;
                        attempts += 1;
                        let descriptor = transport.fetch_status(&status_location).await?;
                        if let Some(next) = descriptor.urls.get.clone() {
                            location = Some(next);
                        }
                        let next = PollState::after(&descriptor, attempts)?;
                        tracing::trace!(attempt = attempts, ?next, "job status checked");
                        next
                    }
                },
                PollState::Succeeded { output } => {
                    tracing::debug!(attempts, "job succeeded, fetching artifact");
                    return transport.fetch_artifact(&output).await;
                },
                PollState::Failed { detail } => {
                    tracing::warn!(attempts, detail = detail.as_deref().unwrap_or("-"), "job failed");
                    return Err(classify_job_failure(detail.as_deref()));
                },
                PollState::TimedOut { attempts } => {
                    tracing::warn!(attempts, "job polling budget exhausted");
                    return Err(ClassifiedError::polling_timeout(
                        attempts,
                        self.settings.interval.as_millis() as u64,
                    ));
                },
            };
        }
    }
}
