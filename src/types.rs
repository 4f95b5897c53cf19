//! Core data types: image sources, requests, results and tracked image jobs

use crate::{
    config::ProviderId,
    error::ClassifiedError,
    services::artifacts::{ArtifactStore, ArtifactUrl},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Where the image to process comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Encoded image bytes owned by the caller
    Bytes(Bytes),
    /// Remote location of the image (http/https URL)
    Url(String),
}

impl ImageSource {
    pub fn from_bytes<B: Into<Bytes>>(bytes: B) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn from_url<S: Into<String>>(url: S) -> Self {
        Self::Url(url.into())
    }

    #[must_use]
    pub fn is_location(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Url(_) => None,
        }
    }

    #[must_use]
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Bytes(_) => None,
            Self::Url(url) => Some(url),
        }
    }

    /// Short description for logs (never the payload itself)
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes(bytes) => format!("{} bytes ({})", bytes.len(), mime_type_for(bytes)),
            Self::Url(url) => url.clone(),
        }
    }
}

/// Sniff the MIME type of encoded image bytes from their magic number
#[must_use]
pub fn mime_type_for(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Requested output resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeHint {
    /// Highest resolution available for the account
    #[default]
    Auto,
    /// Reduced resolution (cheaper on metered providers)
    Preview,
    /// Original resolution
    Full,
}

impl SizeHint {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Preview => "preview",
            Self::Full => "full",
        }
    }
}

/// Requested output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency)
    Jpg,
    /// WebP with alpha channel transparency
    Webp,
}

impl OutputFormat {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// Output format matching an encoded image format, if it is one we write
    #[must_use]
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpg),
            ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }
}

/// A normalized request handed to a provider adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub source: ImageSource,
    pub size: SizeHint,
    pub format: OutputFormat,
}

impl ProcessingRequest {
    #[must_use]
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            size: SizeHint::default(),
            format: OutputFormat::default(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: SizeHint) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Provider-reported details about a successful dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetadata {
    pub provider: ProviderId,
    /// MIME type sniffed from the artifact bytes
    pub content_type: String,
    /// Wall-clock time spent in the provider call (milliseconds)
    pub duration_ms: u64,
    /// Credits charged for this call, when the provider reports it
    pub credits_charged: Option<f64>,
    /// Credits left on the account, when the provider reports it
    pub remaining_credits: Option<f64>,
}

impl ResultMetadata {
    #[must_use]
    pub fn new(provider: ProviderId, duration_ms: u64) -> Self {
        Self {
            provider,
            content_type: "application/octet-stream".to_string(),
            duration_ms,
            credits_charged: None,
            remaining_credits: None,
        }
    }
}

/// A successful dispatch: the artifact plus a location it can be resolved from
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    data: Bytes,
    location: ArtifactUrl,
    metadata: ResultMetadata,
}

impl ProcessingResult {
    /// Wrap artifact bytes, registering an access location in `store`
    pub fn new(data: Bytes, store: &ArtifactStore, mut metadata: ResultMetadata) -> Self {
        metadata.content_type = mime_type_for(&data).to_string();
        let location = store.register(data.clone());
        Self {
            data,
            location,
            metadata,
        }
    }

    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[must_use]
    pub fn location(&self) -> &ArtifactUrl {
        &self.location
    }

    #[must_use]
    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    /// Image format detected from the artifact bytes
    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.data).ok()
    }

    /// Write the artifact to disk
    ///
    /// # Errors
    /// - File system errors while writing
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        tokio::fs::write(path, &self.data).await
    }
}

/// Opaque identifier of a tracked image job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an image job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Processing,
    Success,
    Error,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// State of a job; the result and error only exist in their terminal states
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Processing,
    Success(ProcessingResult),
    Error(ClassifiedError),
}

/// One user image tracked across processing attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    id: JobId,
    source: ImageSource,
    source_location: Option<ArtifactUrl>,
    state: JobState,
    provider: Option<ProviderId>,
    attempts: u32,
    created_at: DateTime<Utc>,
}

impl ImageJob {
    pub(crate) fn new(source: ImageSource, source_location: Option<ArtifactUrl>) -> Self {
        Self {
            id: JobId::new(),
            source,
            source_location,
            state: JobState::Idle,
            provider: None,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Access location for the source image (binary sources only)
    #[must_use]
    pub fn source_location(&self) -> Option<&ArtifactUrl> {
        self.source_location.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        match self.state {
            JobState::Idle => JobStatus::Idle,
            JobState::Processing => JobStatus::Processing,
            JobState::Success(_) => JobStatus::Success,
            JobState::Error(_) => JobStatus::Error,
        }
    }

    #[must_use]
    pub fn state(&self) -> &JobState {
        &self.state
    }

    #[must_use]
    pub fn result(&self) -> Option<&ProcessingResult> {
        match &self.state {
            JobState::Success(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ClassifiedError> {
        match &self.state {
            JobState::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Provider used by the most recent attempt
    #[must_use]
    pub fn provider(&self) -> Option<ProviderId> {
        self.provider
    }

    /// Number of dispatches started for this job
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move to `processing`, handing back the previous result so its location can be released
    pub(crate) fn begin_attempt(&mut self, provider: Option<ProviderId>) -> Option<ProcessingResult> {
        self.attempts += 1;
        self.provider = provider;
        match std::mem::replace(&mut self.state, JobState::Processing) {
            JobState::Success(previous) => Some(previous),
            _ => None,
        }
    }

    pub(crate) fn complete(&mut self, result: ProcessingResult) {
        self.state = JobState::Success(result);
    }

    pub(crate) fn fail(&mut self, error: ClassifiedError) {
        self.state = JobState::Error(error);
    }

    /// Hand back every owned access location, leaving none behind
    pub(crate) fn take_locations(&mut self) -> Vec<ArtifactUrl> {
        let mut locations: Vec<ArtifactUrl> = self.source_location.take().into_iter().collect();
        if let JobState::Success(result) = std::mem::replace(&mut self.state, JobState::Idle) {
            locations.push(result.location().clone());
        }
        locations
    }
}
