//! Image lifecycle controller
//!
//! Tracks each submitted image through `idle → processing → success | error`,
//! dispatching through the [`ProviderRegistry`] and reporting every transition to
//! a [`StatusSink`]. Access locations for sources and results are released
//! exactly once, on discard, source replacement or reprocess.
//!
//! The job map is guarded by a synchronous mutex that is never held across an
//! `.await`. Status notifications are emitted while it is held, which totally
//! orders a discard against the completion of an in-flight dispatch.

use crate::{
    config::{ProviderId, ProviderInfo, ACCEPTED_FORMATS},
    error::LifecycleError,
    registry::ProviderRegistry,
    services::{ArtifactStore, StatusSink, StatusUpdate},
    tracing_config::spans,
    types::{ImageJob, ImageSource, JobId, JobStatus, OutputFormat, ProcessingRequest, SizeHint},
};
use instant::Instant;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Instrument;

type LifecycleResult<T> = Result<T, LifecycleError>;

struct TrackedJob {
    job: ImageJob,
    /// Creation order
    sequence: u64,
    /// Start of the current attempt
    started: Option<Instant>,
}

/// Owns every tracked [`ImageJob`] and drives its state machine
pub struct ImageLifecycleController {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn StatusSink>,
    jobs: Mutex<HashMap<JobId, TrackedJob>>,
    next_sequence: AtomicU64,
    size: SizeHint,
    format: OutputFormat,
}

impl ImageLifecycleController {
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            registry,
            sink,
            jobs: Mutex::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
            size: SizeHint::default(),
            format: OutputFormat::default(),
        }
    }

    /// Size and format requested from providers for every dispatch
    #[must_use]
    pub fn with_request_options(mut self, size: SizeHint, format: OutputFormat) -> Self {
        self.size = size;
        self.format = format;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Store resolving the source and result locations of tracked jobs
    #[must_use]
    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        self.registry.artifacts()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, TrackedJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject sources that no provider could process
    fn validate_source(&self, source: &ImageSource) -> LifecycleResult<()> {
        match source {
            ImageSource::Bytes(data) => {
                if data.is_empty() {
                    return Err(LifecycleError::InvalidSource("Image data is empty".into()));
                }
                let limit = self.registry.client_config().max_upload_bytes;
                if data.len() > limit {
                    return Err(LifecycleError::InvalidSource(format!(
                        "Image is {} bytes, larger than the {} byte limit",
                        data.len(),
                        limit
                    )));
                }
                match image::guess_format(data) {
                    Ok(format) if ACCEPTED_FORMATS.contains(&format) => Ok(()),
                    _ => Err(LifecycleError::InvalidSource(
                        "Unsupported image format, expected JPEG, PNG or WebP".into(),
                    )),
                }
            },
            ImageSource::Url(url) => {
                let parsed = reqwest::Url::parse(url).map_err(|e| {
                    LifecycleError::InvalidSource(format!("Invalid image URL {}: {}", url, e))
                })?;
                if matches!(parsed.scheme(), "http" | "https") {
                    Ok(())
                } else {
                    Err(LifecycleError::InvalidSource(format!(
                        "Unsupported URL scheme '{}', expected http or https",
                        parsed.scheme()
                    )))
                }
            },
        }
    }

    /// Start tracking a new image in `idle`
    ///
    /// # Errors
    /// - `InvalidSource` for empty, oversized or non-image payloads and non-http(s) URLs
    pub fn create_job(&self, source: ImageSource) -> LifecycleResult<JobId> {
        self.validate_source(&source)?;

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut jobs = self.lock();
        Ok(self.track(&mut jobs, source, sequence, None))
    }

    /// Insert a fresh `idle` job; the caller holds the job-map lock
    fn track(
        &self,
        jobs: &mut HashMap<JobId, TrackedJob>,
        source: ImageSource,
        sequence: u64,
        message: Option<&str>,
    ) -> JobId {
        let location = source.as_bytes().map(|data| self.artifacts().register(data.clone()));
        let job = ImageJob::new(source, location);
        let id = job.id();
        tracing::debug!(job_id = %id, source = %job.source().describe(), "image job created");

        jobs.insert(
            id,
            TrackedJob {
                job,
                sequence,
                started: None,
            },
        );
        let mut update = StatusUpdate::new(id, JobStatus::Idle, None);
        if let Some(message) = message {
            update = update.with_message(message);
        }
        self.sink.status_changed(update);
        id
    }

    /// Create a job and process it immediately
    ///
    /// # Errors
    /// - Any error from [`create_job`](Self::create_job) or [`process`](Self::process)
    pub async fn submit(
        &self,
        source: ImageSource,
        provider: &str,
        credential: &str,
    ) -> LifecycleResult<ImageJob> {
        let id = self.create_job(source)?;
        self.process(id, provider, credential).await
    }

    /// Dispatch an `idle` job and return its terminal snapshot
    ///
    /// Dispatch failures are not errors here: they land in the job's `error`
    /// state and the returned snapshot carries them.
    ///
    /// # Errors
    /// - `UnknownJob` if the job is not tracked
    /// - `InvalidTransition` unless the job is `idle`
    /// - `JobDiscarded` if the job was discarded before the dispatch finished
    pub async fn process(
        &self,
        id: JobId,
        provider: &str,
        credential: &str,
    ) -> LifecycleResult<ImageJob> {
        self.run_attempt(id, provider, credential, "process", |status| {
            status == JobStatus::Idle
        })
        .await
    }

    /// Dispatch a finished job again with the same source
    ///
    /// # Errors
    /// - `UnknownJob` if the job is not tracked
    /// - `InvalidTransition` unless the job is `success` or `error`
    /// - `JobDiscarded` if the job was discarded before the dispatch finished
    pub async fn reprocess(
        &self,
        id: JobId,
        provider: &str,
        credential: &str,
    ) -> LifecycleResult<ImageJob> {
        self.run_attempt(id, provider, credential, "reprocess", |status| {
            status.is_terminal()
        })
        .await
    }

    async fn run_attempt(
        &self,
        id: JobId,
        provider: &str,
        credential: &str,
        operation: &'static str,
        allowed: fn(JobStatus) -> bool,
    ) -> LifecycleResult<ImageJob> {
        let provider_id = provider.parse::<ProviderId>().ok();

        let (request, attempt) = {
            let mut jobs = self.lock();
            let tracked = jobs.get_mut(&id).ok_or(LifecycleError::UnknownJob(id))?;
            let status = tracked.job.status();
            if !allowed(status) {
                return Err(LifecycleError::InvalidTransition {
                    job: id,
                    status,
                    operation,
                });
            }

            if let Some(previous) = tracked.job.begin_attempt(provider_id) {
                self.artifacts().revoke(previous.location());
            }
            tracked.started = Some(Instant::now());

            let message = match provider_id {
                Some(p) => format!("Removing background with {}", ProviderInfo::for_provider(p).name),
                None => "Removing background".to_string(),
            };
            self.sink.status_changed(
                StatusUpdate::new(id, JobStatus::Processing, tracked.started)
                    .with_provider(provider_id)
                    .with_message(message),
            );

            let request = ProcessingRequest::new(tracked.job.source().clone())
                .with_size(self.size)
                .with_format(self.format);
            (request, tracked.job.attempts())
        };

        let outcome = self
            .registry
            .dispatch(provider, credential, &request)
            .instrument(spans::job_attempt(&id.to_string(), attempt))
            .await;

        let mut jobs = self.lock();
        let Some(tracked) = jobs.get_mut(&id) else {
            if let Ok(result) = &outcome {
                self.artifacts().revoke(result.location());
            }
            tracing::debug!(job_id = %id, "job discarded during dispatch, dropping outcome");
            return Err(LifecycleError::JobDiscarded(id));
        };

        let update = match outcome {
            Ok(result) => {
                let update = StatusUpdate::new(id, JobStatus::Success, tracked.started)
                    .with_provider(provider_id);
                tracked.job.complete(result);
                update
            },
            Err(err) => {
                let update = StatusUpdate::new(id, JobStatus::Error, tracked.started)
                    .with_provider(provider_id)
                    .with_error_kind(err.kind())
                    .with_message(err.message());
                tracked.job.fail(err);
                update
            },
        };
        self.sink.status_changed(update);
        Ok(tracked.job.clone())
    }

    /// Stop tracking a job and release its access locations
    ///
    /// Returns `false` if the job was not tracked. An in-flight dispatch keeps
    /// running; its outcome is dropped when it arrives.
    pub fn discard(&self, id: JobId) -> bool {
        let mut jobs = self.lock();
        let Some(mut tracked) = jobs.remove(&id) else {
            return false;
        };
        for location in tracked.job.take_locations() {
            self.artifacts().revoke(&location);
        }
        self.sink.job_discarded(id);
        tracing::debug!(job_id = %id, "image job discarded");
        true
    }

    /// Replace a job that is not processing with a new job for `source`
    ///
    /// The old job is discarded (its locations released, `job_discarded`
    /// emitted) and the new job takes its place in [`jobs`](Self::jobs) order.
    /// A job's source never changes, so the replacement gets a fresh id.
    ///
    /// # Errors
    /// - `InvalidSource` if the new source is rejected
    /// - `UnknownJob` if the job is not tracked
    /// - `InvalidTransition` while the job is `processing`
    pub fn replace_source(&self, id: JobId, source: ImageSource) -> LifecycleResult<JobId> {
        self.validate_source(&source)?;

        let mut jobs = self.lock();
        let tracked = jobs.get(&id).ok_or(LifecycleError::UnknownJob(id))?;
        let status = tracked.job.status();
        if status == JobStatus::Processing {
            return Err(LifecycleError::InvalidTransition {
                job: id,
                status,
                operation: "replace the source of",
            });
        }

        let Some(mut old) = jobs.remove(&id) else {
            return Err(LifecycleError::UnknownJob(id));
        };
        for location in old.job.take_locations() {
            self.artifacts().revoke(&location);
        }
        self.sink.job_discarded(id);

        let replacement = self.track(&mut jobs, source, old.sequence, Some("Image replaced"));
        tracing::debug!(job_id = %id, replacement = %replacement, "image job replaced");
        Ok(replacement)
    }

    /// Snapshot of a tracked job
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<ImageJob> {
        self.lock().get(&id).map(|tracked| tracked.job.clone())
    }

    /// Tracked job ids, oldest first
    #[must_use]
    pub fn jobs(&self) -> Vec<JobId> {
        let jobs = self.lock();
        let mut entries: Vec<_> = jobs
            .values()
            .map(|tracked| (tracked.sequence, tracked.job.id()))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }
}
