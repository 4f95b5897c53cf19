//! Configuration types for remote background removal
//!
//! Provider descriptors are static: endpoints and the Replicate model version are
//! named constants so they can be updated without touching dispatch logic.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// remove.bg endpoint (multipart upload, binary response)
pub const REMOVE_BG_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Clipdrop endpoint (multipart upload, binary response)
pub const CLIPDROP_ENDPOINT: &str = "https://clipdrop-api.co/remove-background/v1";

/// Replicate prediction creation endpoint
pub const REPLICATE_ENDPOINT: &str = "https://api.replicate.com/v1/predictions";

/// Hugging Face inference endpoint for RMBG-1.4 (raw binary upload)
pub const HUGGING_FACE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/briaai/RMBG-1.4";

/// Replicate model version running RMBG-1.4
pub const REPLICATE_MODEL_VERSION: &str =
    "fb8af171cfa1616ddcf1242c093f9c46bcada5ad4cf6f2fbe8b81b330ec5c003";

/// Image formats accepted for binary uploads
pub const ACCEPTED_FORMATS: &[image::ImageFormat] = &[
    image::ImageFormat::Jpeg,
    image::ImageFormat::Png,
    image::ImageFormat::WebP,
];

/// Supported background removal providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// remove.bg (quota-metered, multipart upload)
    RemoveBg,
    /// Clipdrop by Stability AI (usage-billed, multipart upload)
    Clipdrop,
    /// Replicate running RMBG-1.4 (asynchronous predictions)
    Replicate,
    /// Hugging Face inference API (raw binary upload)
    HuggingFace,
}

impl ProviderId {
    /// All built-in providers in display order
    pub const ALL: [ProviderId; 4] = [
        ProviderId::RemoveBg,
        ProviderId::Clipdrop,
        ProviderId::Replicate,
        ProviderId::HuggingFace,
    ];

    /// Stable identifier used on the command line and in configuration
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoveBg => "removebg",
            Self::Clipdrop => "clipdrop",
            Self::Replicate => "replicate",
            Self::HuggingFace => "huggingface",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "removebg" | "remove.bg" | "remove-bg" => Ok(Self::RemoveBg),
            "clipdrop" => Ok(Self::Clipdrop),
            "replicate" => Ok(Self::Replicate),
            "huggingface" | "hugging-face" | "hf" => Ok(Self::HuggingFace),
            other => Err(other.to_string()),
        }
    }
}

/// How the credential is attached to each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Credential sent verbatim in a named header
    ApiKeyHeader { header: &'static str },
    /// `Authorization: <scheme> <credential>`
    Authorization { scheme: &'static str },
}

impl AuthScheme {
    #[must_use]
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::ApiKeyHeader { header } => *header,
            Self::Authorization { .. } => "Authorization",
        }
    }

    #[must_use]
    pub fn header_value(&self, credential: &str) -> String {
        match self {
            Self::ApiKeyHeader { .. } => credential.to_string(),
            Self::Authorization { scheme } => format!("{} {}", scheme, credential),
        }
    }

    pub(crate) fn apply(
        &self,
        request: reqwest::RequestBuilder,
        credential: &str,
    ) -> reqwest::RequestBuilder {
        request.header(self.header_name(), self.header_value(credential))
    }
}

/// How a processing request is encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// `multipart/form-data` with a binary file field
    Multipart {
        file_field: &'static str,
        /// Text field used instead of the file when the source is a location
        url_field: Option<&'static str>,
        /// Text field carrying the size hint
        size_field: Option<&'static str>,
    },
    /// JSON body with the image embedded as a base64 data URI
    JsonDataUri { model_version: &'static str },
    /// Raw image bytes as the request body
    RawBinary,
}

/// How the final artifact is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionModel {
    /// The response body is the artifact
    Direct,
    /// A job is created and polled until terminal
    JobPolling,
}

/// Static per-provider wire descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub endpoint: String,
    pub auth: AuthScheme,
    pub encoding: PayloadEncoding,
    pub completion: CompletionModel,
}

impl ProviderConfig {
    /// Built-in descriptor for a provider
    #[must_use]
    pub fn for_provider(id: ProviderId) -> Self {
        match id {
            ProviderId::RemoveBg => Self {
                id,
                endpoint: REMOVE_BG_ENDPOINT.to_string(),
                auth: AuthScheme::ApiKeyHeader {
                    header: "X-Api-Key",
                },
                encoding: PayloadEncoding::Multipart {
                    file_field: "image_file",
                    url_field: Some("image_url"),
                    size_field: Some("size"),
                },
                completion: CompletionModel::Direct,
            },
            ProviderId::Clipdrop => Self {
                id,
                endpoint: CLIPDROP_ENDPOINT.to_string(),
                auth: AuthScheme::ApiKeyHeader {
                    header: "x-api-key",
                },
                encoding: PayloadEncoding::Multipart {
                    file_field: "image_file",
                    url_field: None,
                    size_field: None,
                },
                completion: CompletionModel::Direct,
            },
            ProviderId::Replicate => Self {
                id,
                endpoint: REPLICATE_ENDPOINT.to_string(),
                auth: AuthScheme::Authorization { scheme: "Token" },
                encoding: PayloadEncoding::JsonDataUri {
                    model_version: REPLICATE_MODEL_VERSION,
                },
                completion: CompletionModel::JobPolling,
            },
            ProviderId::HuggingFace => Self {
                id,
                endpoint: HUGGING_FACE_ENDPOINT.to_string(),
                auth: AuthScheme::Authorization { scheme: "Bearer" },
                encoding: PayloadEncoding::RawBinary,
                completion: CompletionModel::Direct,
            },
        }
    }

    /// Point the provider at a different endpoint (proxies, test servers)
    #[must_use]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Human-facing catalog entry for a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub name: &'static str,
    pub description: &'static str,
    pub free_quota: &'static str,
    pub pricing: &'static str,
    pub doc_url: &'static str,
    pub signup_url: &'static str,
    pub requires_api_key: bool,
}

impl ProviderInfo {
    #[must_use]
    pub fn for_provider(id: ProviderId) -> Self {
        match id {
            ProviderId::RemoveBg => Self {
                id,
                name: "Remove.bg",
                description: "Dedicated background removal service, high quality and fast",
                free_quota: "50 free preview-quality images per month",
                pricing: "HD images: $0.09-0.20 each",
                doc_url: "https://www.remove.bg/api",
                signup_url: "https://www.remove.bg/users/sign_up",
                requires_api_key: true,
            },
            ProviderId::Clipdrop => Self {
                id,
                name: "Clipdrop API",
                description: "Provided by Stability AI, excellent results",
                free_quota: "Limited free credits (check the current policy)",
                pricing: "Billed per use",
                doc_url: "https://clipdrop.co/apis/docs/remove-background",
                signup_url: "https://clipdrop.co/apis",
                requires_api_key: true,
            },
            ProviderId::Replicate => Self {
                id,
                name: "Replicate (RMBG-1.4)",
                description: "Runs the open-source RMBG-1.4 model",
                free_quota: "Free credits for new users",
                pricing: "Billed by run time, about $0.0001/s",
                doc_url: "https://replicate.com/docs",
                signup_url: "https://replicate.com/signin",
                requires_api_key: true,
            },
            ProviderId::HuggingFace => Self {
                id,
                name: "Hugging Face",
                description: "Free inference API running open-source models",
                free_quota: "Free (rate limited)",
                pricing: "Free",
                doc_url: "https://huggingface.co/docs/api-inference",
                signup_url: "https://huggingface.co/join",
                requires_api_key: true,
            },
        }
    }

    /// Catalog entries for every built-in provider
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        ProviderId::ALL.iter().map(|id| Self::for_provider(*id)).collect()
    }
}

/// Client-wide settings shared by all providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP request timeout for every individual call (milliseconds)
    pub request_timeout_ms: u64,

    /// Fixed delay between job status checks (milliseconds)
    pub poll_interval_ms: u64,

    /// Maximum number of job status checks before giving up
    pub max_poll_attempts: u32,

    /// Largest binary source accepted for upload (bytes)
    pub max_upload_bytes: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 60_000,
            poll_interval_ms: 1_000,
            max_poll_attempts: 120,
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
            user_agent: concat!("bgremove-remote/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero request timeout
    /// - Poll attempts outside 1-10000
    /// - Zero upload limit
    /// - Empty user agent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::value_error(
                "request timeout (ms)",
                self.request_timeout_ms,
                "1 or more",
                Some(60_000),
            ));
        }
        if self.max_poll_attempts == 0 || self.max_poll_attempts > 10_000 {
            return Err(ConfigError::value_error(
                "max poll attempts",
                self.max_poll_attempts,
                "1-10000",
                Some(120),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::invalid("Upload limit must be greater than zero"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("User agent cannot be empty"));
        }
        Ok(())
    }
}

/// Builder for `ClientConfig`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the client configuration
    ///
    /// # Errors
    /// - Any validation failure from [`ClientConfig::validate`]
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
