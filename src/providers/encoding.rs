//! Request payload encodings
//!
//! Multipart payloads are first assembled as a plain list of fields so the exact
//! field contract can be inspected, then converted into a `reqwest` form.

use crate::{
    config::PayloadEncoding,
    error::{ClassifiedError, Result},
    types::{mime_type_for, ImageSource, SizeHint},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

/// Value of a single multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartValue {
    File {
        data: Bytes,
        file_name: String,
        mime: &'static str,
    },
    Text(String),
}

/// Ordered multipart fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    fields: Vec<(String, MultipartValue)>,
}

impl MultipartPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binary file field; name and MIME type are sniffed from the bytes
    #[must_use]
    pub fn file(mut self, name: &str, data: Bytes) -> Self {
        let mime = mime_type_for(&data);
        let file_name = image::guess_format(&data)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .map_or_else(|| "image".to_string(), |ext| format!("image.{}", ext));
        self.fields.push((
            name.to_string(),
            MultipartValue::File {
                data,
                file_name,
                mime,
            },
        ));
        self
    }

    #[must_use]
    pub fn text<S: Into<String>>(mut self, name: &str, value: S) -> Self {
        self.fields
            .push((name.to_string(), MultipartValue::Text(value.into())));
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, MultipartValue)] {
        &self.fields
    }

    /// First field with the given name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&MultipartValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Convert into a `multipart/form-data` body
    ///
    /// # Errors
    /// - `DecodeFailure` if a part carries an unparseable MIME type
    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = match value {
                MultipartValue::File {
                    data,
                    file_name,
                    mime,
                } => {
                    let part = Part::bytes(data.to_vec())
                        .file_name(file_name)
                        .mime_str(mime)
                        .map_err(|e| {
                            ClassifiedError::decode(format!("Invalid upload content type: {}", e))
                        })?;
                    form.part(name, part)
                },
                MultipartValue::Text(text) => form.text(name, text),
            };
        }
        Ok(form)
    }
}

/// Build the multipart payload described by `encoding`
///
/// Location sources are sent through the encoding's URL field when it has one;
/// otherwise the caller must resolve the source to bytes first. Returns `None`
/// when the encoding is not multipart or cannot carry the source.
#[must_use]
pub fn multipart_payload(
    encoding: &PayloadEncoding,
    source: &ImageSource,
    size: SizeHint,
) -> Option<MultipartPayload> {
    let PayloadEncoding::Multipart {
        file_field,
        url_field,
        size_field,
    } = encoding
    else {
        return None;
    };

    let payload = match source {
        ImageSource::Bytes(data) => MultipartPayload::new().file(file_field, data.clone()),
        ImageSource::Url(url) => MultipartPayload::new().text((*url_field)?, url.clone()),
    };
    Some(match size_field {
        Some(field) => payload.text(field, size.as_str()),
        None => payload,
    })
}

/// Encode image bytes as a `data:` URI with a sniffed MIME type
#[must_use]
pub fn data_uri(data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type_for(data), STANDARD.encode(data))
}
