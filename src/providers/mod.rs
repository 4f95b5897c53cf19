//! Provider adapters
//!
//! Each remote service gets one adapter that knows its authentication scheme,
//! payload encoding and completion model. Adapters are stateless beyond their
//! [`ProviderConfig`]; everything shared between calls (HTTP client, artifact
//! store, polling settings) travels in the [`DispatchContext`].

pub mod clipdrop;
pub mod encoding;
pub(crate) mod http;
pub mod hugging_face;
pub mod remove_bg;
pub mod replicate;

use crate::{
    config::{ProviderConfig, ProviderId},
    error::Result,
    polling::PollingCoordinator,
    services::ArtifactStore,
    types::ProcessingRequest,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub use clipdrop::ClipdropAdapter;
pub use encoding::{MultipartPayload, MultipartValue};
pub use hugging_face::HuggingFaceAdapter;
pub use remove_bg::RemoveBgAdapter;
pub use replicate::{HttpJobTransport, ReplicateAdapter};

/// Resources shared by every adapter call
#[derive(Clone)]
pub struct DispatchContext {
    pub client: reqwest::Client,
    pub artifacts: Arc<ArtifactStore>,
    pub polling: PollingCoordinator,
    /// Largest source image accepted, including downloaded location sources
    pub max_upload_bytes: usize,
}

/// Raw artifact returned by an adapter, before it is registered
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterOutput {
    pub data: Bytes,
    pub credits_charged: Option<f64>,
    pub remaining_credits: Option<f64>,
}

impl AdapterOutput {
    #[must_use]
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            credits_charged: None,
            remaining_credits: None,
        }
    }

    #[must_use]
    pub fn with_credits(mut self, charged: Option<f64>, remaining: Option<f64>) -> Self {
        self.credits_charged = charged;
        self.remaining_credits = remaining;
        self
    }
}

/// A remote background removal service
///
/// Implementations translate a [`ProcessingRequest`] into the provider's wire
/// format and return the artifact bytes. Credential validation happens before an
/// adapter is called, so `credential` is always non-empty.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider served by this adapter
    fn id(&self) -> ProviderId;

    /// Perform the removal and return the artifact
    ///
    /// # Errors
    /// - Any [`ClassifiedError`](crate::error::ClassifiedError) produced by the exchange
    async fn call(
        &self,
        ctx: &DispatchContext,
        credential: &str,
        request: &ProcessingRequest,
    ) -> Result<AdapterOutput>;
}

/// Build the built-in adapter for a provider descriptor
#[must_use]
pub fn adapter_for(config: ProviderConfig) -> Box<dyn ProviderAdapter> {
    match config.id {
        ProviderId::RemoveBg => Box::new(RemoveBgAdapter::new(config)),
        ProviderId::Clipdrop => Box::new(ClipdropAdapter::new(config)),
        ProviderId::Replicate => Box::new(ReplicateAdapter::new(config)),
        ProviderId::HuggingFace => Box::new(HuggingFaceAdapter::new(config)),
    }
}
