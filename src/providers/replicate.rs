//! Replicate adapter
//!
//! Creates a prediction with the image embedded as a base64 data URI, then hands
//! the job to the [`PollingCoordinator`](crate::polling::PollingCoordinator).
//! Status checks are authenticated; the output artifact is fetched without the
//! credential.

use super::{encoding, http, AdapterOutput, DispatchContext, ProviderAdapter};
use crate::{
    classifier::ensure_image,
    config::{AuthScheme, PayloadEncoding, ProviderConfig, ProviderId},
    error::{ClassifiedError, Result},
    polling::{JobDescriptor, JobTransport},
    types::ProcessingRequest,
};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

pub struct ReplicateAdapter {
    config: ProviderConfig,
}

impl ReplicateAdapter {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Prediction creation body for already-resolved image bytes
    #[must_use]
    pub fn prediction_body(&self, data: &[u8]) -> Value {
        let version = match self.config.encoding {
            PayloadEncoding::JsonDataUri { model_version } => model_version,
            _ => crate::config::REPLICATE_MODEL_VERSION,
        };
        json!({
            "version": version,
            "input": { "image": encoding::data_uri(data) },
        })
    }
}

/// Parse a job descriptor body
fn parse_descriptor(body: &[u8]) -> Result<JobDescriptor> {
    serde_json::from_slice(body)
        .map_err(|e| ClassifiedError::decode(format!("Invalid Replicate job response: {}", e)))
}

/// Job I/O over HTTP for one prediction
pub struct HttpJobTransport<'a> {
    client: &'a reqwest::Client,
    provider: ProviderId,
    auth: AuthScheme,
    credential: &'a str,
}

impl<'a> HttpJobTransport<'a> {
    #[must_use]
    pub fn new(
        client: &'a reqwest::Client,
        provider: ProviderId,
        auth: AuthScheme,
        credential: &'a str,
    ) -> Self {
        Self {
            client,
            provider,
            auth,
            credential,
        }
    }
}

#[async_trait]
impl<'a> JobTransport for HttpJobTransport<'a> {
    async fn fetch_status(&self, location: &str) -> Result<JobDescriptor> {
        let builder = self.auth.apply(self.client.get(location), self.credential);
        let response = http::send(self.provider, builder).await?;
        let (_, body) = http::read_success(self.provider, response).await?;
        parse_descriptor(&body)
    }

    async fn fetch_artifact(&self, location: &str) -> Result<Bytes> {
        let response = http::send(self.provider, self.client.get(location)).await?;
        let (_, body) = http::read_success(self.provider, response).await?;
        ensure_image(self.provider, &body)?;
        Ok(body)
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn id(&self) -> ProviderId {
        self.config.id
    }

    async fn call(
        &self,
        ctx: &DispatchContext,
        credential: &str,
        request: &ProcessingRequest,
    ) -> Result<AdapterOutput> {
        let data = http::source_bytes(&ctx.client, &request.source, ctx.max_upload_bytes).await?;

        tracing::debug!(endpoint = %self.config.endpoint, bytes = data.len(), "creating Replicate prediction");
        let builder = self
            .config
            .auth
            .apply(ctx.client.post(&self.config.endpoint), credential)
            .json(&self.prediction_body(&data));

        let response = http::send(self.config.id, builder).await?;
        let (_, body) = http::read_success(self.config.id, response).await?;
        let job = parse_descriptor(&body)?;

        let transport = HttpJobTransport::new(&ctx.client, self.config.id, self.config.auth, credential);
        let artifact = ctx.polling.run(&transport, job).await?;
        Ok(AdapterOutput::new(artifact))
    }
}
