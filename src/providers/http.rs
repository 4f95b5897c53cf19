//! HTTP helpers shared by the adapters

use crate::{
    classifier::{classify_status, classify_transport},
    config::{ProviderId, ACCEPTED_FORMATS},
    error::{ClassifiedError, Result},
    types::ImageSource,
};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response};

/// Send a request, classifying transport failures
pub(crate) async fn send(provider: ProviderId, request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| classify_transport(provider, &e))
}

/// Read a response body, classifying non-success statuses
pub(crate) async fn read_success(
    provider: ProviderId,
    response: Response,
) -> Result<(HeaderMap, Bytes)> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| classify_transport(provider, &e))?;

    if !status.is_success() {
        return Err(classify_status(provider, status, &body));
    }
    tracing::trace!(%provider, status = status.as_u16(), bytes = body.len(), "response received");
    Ok((headers, body))
}

/// Resolve a source to bytes, downloading location sources without credentials
///
/// Downloaded images must fit in `max_bytes` and be JPEG, PNG or WebP, the same
/// limits applied to binary sources when a job is created.
pub(crate) async fn source_bytes(
    client: &reqwest::Client,
    source: &ImageSource,
    max_bytes: usize,
) -> Result<Bytes> {
    let url = match source {
        ImageSource::Bytes(data) => return Ok(data.clone()),
        ImageSource::Url(url) => url,
    };

    tracing::debug!(url = %url, "downloading source image");
    let response = client.get(url).send().await.map_err(|e| {
        ClassifiedError::network(format!("Could not download source image {}: {}", url, e))
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClassifiedError::network(format!(
            "Could not download source image {} (HTTP {})",
            url,
            status.as_u16()
        )));
    }
    if let Some(length) = response.content_length() {
        check_source_size(url, length as usize, max_bytes)?;
    }

    let data = response.bytes().await.map_err(|e| {
        ClassifiedError::network(format!("Could not download source image {}: {}", url, e))
    })?;
    check_source_size(url, data.len(), max_bytes)?;
    match image::guess_format(&data) {
        Ok(format) if ACCEPTED_FORMATS.contains(&format) => Ok(data),
        _ => Err(ClassifiedError::decode(format!(
            "Source image {} is not a JPEG, PNG or WebP image",
            url
        ))),
    }
}

fn check_source_size(url: &str, len: usize, max_bytes: usize) -> Result<()> {
    if len > max_bytes {
        return Err(ClassifiedError::decode(format!(
            "Source image {} is {} bytes, larger than the {} byte limit",
            url, len, max_bytes
        )));
    }
    Ok(())
}

/// Parse a numeric header such as a credit counter
pub(crate) fn header_number(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}
