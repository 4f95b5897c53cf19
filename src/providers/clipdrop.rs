//! Clipdrop adapter
//!
//! Multipart upload with a single `image_file` field, authenticated with
//! `x-api-key`. Clipdrop only accepts binary uploads, so location sources are
//! downloaded first.

use super::{encoding, http, AdapterOutput, DispatchContext, ProviderAdapter};
use crate::{
    classifier::ensure_image,
    config::{ProviderConfig, ProviderId, ProviderInfo},
    error::{ClassifiedError, ErrorKind, Result},
    types::{ImageSource, ProcessingRequest},
};
use async_trait::async_trait;

const CREDITS_CONSUMED_HEADER: &str = "x-credits-consumed";
const REMAINING_CREDITS_HEADER: &str = "x-remaining-credits";

pub struct ClipdropAdapter {
    config: ProviderConfig,
}

impl ClipdropAdapter {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for ClipdropAdapter {
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
        let source = ImageSource::Bytes(data);
        let payload = encoding::multipart_payload(&self.config.encoding, &source, request.size)
            .ok_or_else(|| {
                ClassifiedError::new(
                    ErrorKind::UnsupportedProvider,
                    format!(
                        "{} is not configured for multipart uploads",
                        ProviderInfo::for_provider(self.config.id).name
                    ),
                )
            })?;

        tracing::debug!(endpoint = %self.config.endpoint, source = %source.describe(), "uploading to Clipdrop");
        let builder = self
            .config
            .auth
            .apply(ctx.client.post(&self.config.endpoint), credential)
            .multipart(payload.into_form()?);

        let response = http::send(self.config.id, builder).await?;
        let (headers, body) = http::read_success(self.config.id, response).await?;
        ensure_image(self.config.id, &body)?;

        Ok(AdapterOutput::new(body).with_credits(
            http::header_number(&headers, CREDITS_CONSUMED_HEADER),
            http::header_number(&headers, REMAINING_CREDITS_HEADER),
        ))
    }
}
