//! Hugging Face inference adapter
//!
//! The image bytes are the whole request body, authenticated with a bearer
//! token. Location sources are downloaded first.

use super::{http, AdapterOutput, DispatchContext, ProviderAdapter};
use crate::{
    classifier::ensure_image,
    config::{ProviderConfig, ProviderId},
    error::Result,
    types::{mime_type_for, ProcessingRequest},
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

pub struct HuggingFaceAdapter {
    config: ProviderConfig,
}

impl HuggingFaceAdapter {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for HuggingFaceAdapter {
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

        tracing::debug!(endpoint = %self.config.endpoint, bytes = data.len(), "uploading to Hugging Face");
        let builder = self
            .config
            .auth
            .apply(ctx.client.post(&self.config.endpoint), credential)
            .header(CONTENT_TYPE, mime_type_for(&data))
            .body(data);

        let response = http::send(self.config.id, builder).await?;
        let (_, body) = http::read_success(self.config.id, response).await?;
        ensure_image(self.config.id, &body)?;

        Ok(AdapterOutput::new(body))
    }
}
