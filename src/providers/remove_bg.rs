//! remove.bg adapter
//!
//! Multipart upload authenticated with `X-Api-Key`. Location sources are passed
//! through as `image_url` and fetched by remove.bg itself. The response body is
//! the finished image.

use super::{encoding, http, AdapterOutput, DispatchContext, ProviderAdapter};
use crate::{
    classifier::ensure_image,
    config::{ProviderConfig, ProviderId, ProviderInfo},
    error::{ClassifiedError, ErrorKind, Result},
    types::ProcessingRequest,
};
use async_trait::async_trait;

/// Credits charged for the call
const CREDITS_CHARGED_HEADER: &str = "X-Credits-Charged";

pub struct RemoveBgAdapter {
    config: ProviderConfig,
}

impl RemoveBgAdapter {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for RemoveBgAdapter {
    fn id(&self) -> ProviderId {
        self.config.id
    }

    async fn call(
        &self,
        ctx: &DispatchContext,
        credential: &str,
        request: &ProcessingRequest,
    ) -> Result<AdapterOutput> {
        let payload = encoding::multipart_payload(&self.config.encoding, &request.source, request.size)
            .ok_or_else(|| {
                ClassifiedError::new(
                    ErrorKind::UnsupportedProvider,
                    format!(
                        "{} is not configured for multipart uploads",
                        ProviderInfo::for_provider(self.config.id).name
                    ),
                )
            })?;

        tracing::debug!(
            endpoint = %self.config.endpoint,
            size = request.size.as_str(),
            source = %request.source.describe(),
            "uploading to remove.bg"
        );
        let builder = self
            .config
            .auth
            .apply(ctx.client.post(&self.config.endpoint), credential)
            .multipart(payload.into_form()?);

        let response = http::send(self.config.id, builder).await?;
        let (headers, body) = http::read_success(self.config.id, response).await?;
        ensure_image(self.config.id, &body)?;

        Ok(AdapterOutput::new(body)
            .with_credits(http::header_number(&headers, CREDITS_CHARGED_HEADER), None))
    }
}
