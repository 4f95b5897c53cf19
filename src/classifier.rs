//! Failure classification
//!
//! Maps transport errors, remote error bodies and job failures to a
//! [`ClassifiedError`]. The mapping is total: every input yields a kind and a
//! message, falling back to a generic message when nothing usable is found.

use crate::{
    config::{ProviderId, ProviderInfo},
    error::ClassifiedError,
};
use image::ImageFormat;
use reqwest::StatusCode;
use serde_json::Value;

/// JSON locations probed for a human-readable message, in priority order
///
/// remove.bg answers `{"errors": [{"title": ..}]}`, Clipdrop and Hugging Face
/// `{"error": ..}`, Replicate `{"detail": ..}`.
pub const MESSAGE_POINTERS: &[&str] = &[
    "/errors/0/title",
    "/errors/0/detail",
    "/error/message",
    "/error",
    "/detail",
    "/message",
];

/// Plain-text bodies longer than this are not shown to users
const MAX_PLAIN_TEXT_LEN: usize = 200;

/// Extract the first human-readable message from an error body
#[must_use]
pub fn extract_message(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return MESSAGE_POINTERS.iter().find_map(|pointer| {
            value
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(ToString::to_string)
        });
    }

    let text = std::str::from_utf8(body).ok()?.trim();
    let looks_like_markup = text.starts_with('<');
    if text.is_empty() || looks_like_markup || text.len() > MAX_PLAIN_TEXT_LEN {
        return None;
    }
    Some(text.to_string())
}

/// Classify a non-success HTTP response
#[must_use]
pub fn classify_status(provider: ProviderId, status: StatusCode, body: &[u8]) -> ClassifiedError {
    let message = extract_message(body).unwrap_or_else(|| generic_status_message(provider, status));
    tracing::debug!(%provider, status = status.as_u16(), %message, "remote rejected request");
    ClassifiedError::remote_rejected(message)
}

fn generic_status_message(provider: ProviderId, status: StatusCode) -> String {
    let name = ProviderInfo::for_provider(provider).name;
    let code = status.as_u16();
    match code {
        401 | 403 => format!(
            "{} rejected the API key (HTTP {}). Check the key in your settings",
            name, code
        ),
        402 => format!("{} account has insufficient credits (HTTP 402)", name),
        429 => format!("{} rate limit reached (HTTP 429), try again later", name),
        500..=599 => format!("{} is temporarily unavailable (HTTP {})", name, code),
        _ => format!("{} rejected the request (HTTP {})", name, code),
    }
}

/// Classify a request that never produced a usable response
#[must_use]
pub fn classify_transport(provider: ProviderId, error: &reqwest::Error) -> ClassifiedError {
    let name = ProviderInfo::for_provider(provider).name;
    let message = if error.is_timeout() {
        format!("Request to {} timed out", name)
    } else if error.is_connect() {
        format!("Could not connect to {}", name)
    } else {
        format!("Network error while contacting {}: {}", name, error)
    };
    tracing::debug!(%provider, error = %error, "transport failure");
    ClassifiedError::network(message)
}

/// Check that a success body is an encoded image
///
/// # Errors
/// - `DecodeFailure` for empty bodies or unrecognised formats
pub fn ensure_image(provider: ProviderId, body: &[u8]) -> Result<ImageFormat, ClassifiedError> {
    let name = ProviderInfo::for_provider(provider).name;
    if body.is_empty() {
        return Err(ClassifiedError::decode(format!(
            "{} returned an empty response",
            name
        )));
    }
    image::guess_format(body).map_err(|_| {
        let hint = extract_message(body)
            .map(|message| format!(": {}", message))
            .unwrap_or_default();
        ClassifiedError::decode(format!("{} returned data that is not an image{}", name, hint))
    })
}

/// Classify a remote job that ended in `failed` or `canceled`
#[must_use]
pub fn classify_job_failure(detail: Option<&str>) -> ClassifiedError {
    match detail.map(str::trim).filter(|d| !d.is_empty()) {
        Some(detail) => ClassifiedError::remote_processing_failed(detail),
        None => ClassifiedError::remote_processing_failed("Processing failed"),
    }
}
