#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Remote Background Removal Client
//!
//! Removes image backgrounds through third-party HTTP services behind one
//! provider-neutral API. Four providers are built in:
//!
//! - **remove.bg**: multipart upload, binary response
//! - **Clipdrop**: multipart upload, binary response
//! - **Replicate** (RMBG-1.4): asynchronous prediction, polled until finished
//! - **Hugging Face** inference API: raw binary upload, binary response
//!
//! Every failure is normalized into a [`ClassifiedError`] carrying a stable
//! [`ErrorKind`] and a display-ready message.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_remote::{ClientConfig, ImageSource, ProcessingRequest, ProviderRegistry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = ProviderRegistry::new(ClientConfig::default())?;
//! let request = ProcessingRequest::new(ImageSource::from_bytes(std::fs::read("cat.jpg")?));
//! let result = registry.dispatch("removebg", "my-api-key", &request).await?;
//! result.save("cat_nobg.png").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Tracking images
//!
//! [`ImageLifecycleController`] keeps a state machine per image
//! (`idle → processing → success | error`), supports reprocessing and discarding,
//! and reports every transition to a [`StatusSink`]:
//!
//! ```rust,no_run
//! use bgremove_remote::{
//!     ClientConfig, ImageLifecycleController, ImageSource, ProviderRegistry, TracingStatusSink,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(ProviderRegistry::new(ClientConfig::default())?);
//! let controller = ImageLifecycleController::new(registry, Arc::new(TracingStatusSink::new(true)));
//!
//! let job = controller
//!     .submit(ImageSource::from_url("https://example.com/cat.jpg"), "clipdrop", "my-api-key")
//!     .await?;
//! if let Some(error) = job.error() {
//!     eprintln!("{} ({})", error, error.kind());
//!     controller.reprocess(job.id(), "replicate", "r8_...").await?;
//! }
//! controller.discard(job.id());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress spinner and subscriber setup
//! - `tracing-json`: JSON log output for the CLI

pub mod classifier;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod polling;
pub mod providers;
pub mod registry;
pub mod services;
pub mod tracing_config;
pub mod types;

pub use config::{
    ClientConfig, ClientConfigBuilder, CompletionModel, ProviderConfig, ProviderId, ProviderInfo,
};
pub use error::{ClassifiedError, ConfigError, ErrorKind, LifecycleError, Result};
pub use lifecycle::ImageLifecycleController;
pub use polling::{JobTransport, PollSettings, PollState, PollingCoordinator, Sleeper, TokioSleeper};
pub use providers::{AdapterOutput, DispatchContext, ProviderAdapter};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use services::{
    ArtifactStore, ArtifactUrl, ChannelStatusSink, NoOpStatusSink, RecordingStatusSink,
    StatusEvent, StatusSink, StatusUpdate, TracingStatusSink,
};
pub use tracing_config::{TracingConfig, TracingFormat};
pub use types::{
    ImageJob, ImageSource, JobId, JobState, JobStatus, OutputFormat, ProcessingRequest,
    ProcessingResult, ResultMetadata, SizeHint,
};

/// Remove the background of one image with default settings
///
/// Builds a one-off registry; reuse a [`ProviderRegistry`] when dispatching
/// more than once. The returned result owns its bytes; its location is
/// already released and no longer resolves.
///
/// # Examples
///
/// ```rust,no_run
/// use bgremove_remote::{remove_background, ImageSource, ProviderId};
///
/// # async fn example() -> anyhow::Result<()> {
/// let source = ImageSource::from_url("https://example.com/cat.jpg");
/// let result = remove_background(ProviderId::RemoveBg, "my-api-key", source).await?;
/// println!("{} bytes of {}", result.data().len(), result.metadata().content_type);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - `NetworkFailure` if the HTTP client cannot be constructed
/// - Any error classified by [`ProviderRegistry::dispatch_to`]
pub async fn remove_background(
    provider: ProviderId,
    credential: &str,
    source: ImageSource,
) -> Result<ProcessingResult> {
    let registry = ProviderRegistry::builder()
        .providers([provider])
        .build()
        .map_err(|e| ClassifiedError::network(e.to_string()))?;
    let result = registry
        .dispatch_to(provider, credential, &ProcessingRequest::new(source))
        .await?;
    registry.artifacts().revoke(result.location());
    Ok(result)
}
