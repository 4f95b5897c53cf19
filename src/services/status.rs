//! Status reporting service
//!
//! Lifecycle transitions are pushed to a [`StatusSink`], the only channel through
//! which frontends learn about progress. Sinks are called synchronously from the
//! controller and must not call back into it.

use crate::{
    config::ProviderId,
    error::ErrorKind,
    types::{JobId, JobStatus},
};
use instant::Instant;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A single lifecycle transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Provider of the current attempt, once one has started
    pub provider: Option<ProviderId>,
    /// Error kind when `status` is `Error`
    pub error_kind: Option<ErrorKind>,
    /// Human-readable description of the transition
    pub message: String,
    /// Elapsed time since the current attempt started (milliseconds)
    pub elapsed_ms: u64,
}

impl StatusUpdate {
    #[must_use]
    pub fn new(job_id: JobId, status: JobStatus, started: Option<Instant>) -> Self {
        let message = match status {
            JobStatus::Idle => "Image ready for processing",
            JobStatus::Processing => "Removing background",
            JobStatus::Success => "Background removed",
            JobStatus::Error => "Processing failed",
        };
        Self {
            job_id,
            status,
            provider: None,
            error_kind: None,
            message: message.to_string(),
            elapsed_ms: started.map_or(0, |start| start.elapsed().as_millis() as u64),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Option<ProviderId>) -> Self {
        self.provider = provider;
        self
    }

    #[must_use]
    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_error_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }
}

/// Receiver of lifecycle notifications
pub trait StatusSink: Send + Sync {
    /// Report a status transition
    fn status_changed(&self, update: StatusUpdate);

    /// Report that a job stopped being tracked; no update for it follows
    fn job_discarded(&self, _job_id: JobId) {}
}

/// Sink that discards all notifications
pub struct NoOpStatusSink;

impl StatusSink for NoOpStatusSink {
    fn status_changed(&self, _update: StatusUpdate) {
        // Intentionally empty - discards status updates
    }
}

/// Sink that logs transitions through `tracing`
pub struct TracingStatusSink {
    verbose: bool,
}

impl TracingStatusSink {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StatusSink for TracingStatusSink {
    fn status_changed(&self, update: StatusUpdate) {
        let provider = update.provider.map_or("-", |p| p.as_str());
        match update.status {
            JobStatus::Error => tracing::error!(
                job_id = %update.job_id,
                provider,
                kind = update.error_kind.map_or("unknown", |k| k.as_str()),
                "❌ {}",
                update.message
            ),
            JobStatus::Success => tracing::info!(
                job_id = %update.job_id,
                provider,
                elapsed_ms = update.elapsed_ms,
                "✅ {} in {}ms",
                update.message,
                update.elapsed_ms
            ),
            _ if self.verbose => tracing::info!(
                job_id = %update.job_id,
                provider,
                status = %update.status,
                "{}",
                update.message
            ),
            _ => tracing::debug!(job_id = %update.job_id, status = %update.status, "{}", update.message),
        }
    }

    fn job_discarded(&self, job_id: JobId) {
        tracing::debug!(job_id = %job_id, "image job discarded");
    }
}

/// Events forwarded by [`ChannelStatusSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Changed(StatusUpdate),
    Discarded(JobId),
}

/// Sink that forwards notifications to an async consumer
pub struct ChannelStatusSink {
    sender: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelStatusSink {
    /// Create a sink together with the receiving end
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusSink for ChannelStatusSink {
    fn status_changed(&self, update: StatusUpdate) {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.sender.send(StatusEvent::Changed(update));
    }

    fn job_discarded(&self, job_id: JobId) {
        let _ = self.sender.send(StatusEvent::Discarded(job_id));
    }
}

/// Sink that keeps every notification in memory
#[derive(Default)]
pub struct RecordingStatusSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingStatusSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Statuses reported for one job, in order
    #[must_use]
    pub fn statuses_for(&self, job_id: JobId) -> Vec<JobStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StatusEvent::Changed(update) if update.job_id == job_id => Some(update.status),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

impl StatusSink for RecordingStatusSink {
    fn status_changed(&self, update: StatusUpdate) {
        self.push(StatusEvent::Changed(update));
    }

    fn job_discarded(&self, job_id: JobId) {
        self.push(StatusEvent::Discarded(job_id));
    }
}
