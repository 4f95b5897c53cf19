//! Provider registry and dispatch
//!
//! The registry owns one adapter per enabled provider and the resources shared
//! between calls. Dispatch checks the provider and credential locally before any
//! network traffic, so unknown providers and missing credentials never leave the
//! process.

use crate::{
    config::{ClientConfig, ProviderConfig, ProviderId},
    error::{ClassifiedError, ConfigError, Result},
    polling::{PollSettings, PollingCoordinator, Sleeper, TokioSleeper},
    providers::{adapter_for, DispatchContext, ProviderAdapter},
    services::ArtifactStore,
    tracing_config::spans,
    types::{ProcessingRequest, ProcessingResult, ResultMetadata},
};
use instant::Instant;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::Instrument;

/// Registered adapters plus the shared dispatch context
pub struct ProviderRegistry {
    adapters: BTreeMap<ProviderId, Box<dyn ProviderAdapter>>,
    configs: BTreeMap<ProviderId, ProviderConfig>,
    context: DispatchContext,
    config: ClientConfig,
}

impl ProviderRegistry {
    /// Registry with every built-in provider
    ///
    /// # Errors
    /// - Invalid client configuration
    /// - HTTP client construction failure
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    #[must_use]
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Enabled providers in display order
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderId> {
        self.adapters.keys().copied().collect()
    }

    #[must_use]
    pub fn is_registered(&self, provider: ProviderId) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Descriptor of a built-in provider; `None` for custom adapters
    #[must_use]
    pub fn config(&self, provider: ProviderId) -> Option<&ProviderConfig> {
        self.configs.get(&provider)
    }

    #[must_use]
    pub fn client_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Store holding result locations issued by this registry
    #[must_use]
    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.context.artifacts
    }

    /// Dispatch by provider identifier string
    ///
    /// # Errors
    /// - `UnsupportedProvider` if the identifier is unknown or not registered
    /// - `MissingCredential` if the credential is empty or whitespace
    /// - Any error classified during the provider exchange
    pub async fn dispatch(
        &self,
        provider: &str,
        credential: &str,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult> {
        let id = provider
            .parse::<ProviderId>()
            .map_err(|_| ClassifiedError::unsupported_provider(provider))?;
        self.dispatch_to(id, credential, request).await
    }

    /// Dispatch to a known provider
    ///
    /// # Errors
    /// See [`ProviderRegistry::dispatch`]
    pub async fn dispatch_to(
        &self,
        provider: ProviderId,
        credential: &str,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult> {
        let adapter = self
            .adapters
            .get(&provider)
            .ok_or_else(|| ClassifiedError::unsupported_provider(provider.as_str()))?;

        let credential = credential.trim();
        if credential.is_empty() {
            return Err(ClassifiedError::missing_credential(provider.as_str()));
        }

        let span = spans::dispatch(provider.as_str(), &request.source.describe());
        async move {
            let started = Instant::now();
            match adapter.call(&self.context, credential, request).await {
                Ok(output) => {
                    let mut metadata =
                        ResultMetadata::new(provider, started.elapsed().as_millis() as u64);
                    metadata.credits_charged = output.credits_charged;
                    metadata.remaining_credits = output.remaining_credits;

                    let result =
                        ProcessingResult::new(output.data, &self.context.artifacts, metadata);
                    tracing::info!(
                        bytes = result.data().len(),
                        duration_ms = result.metadata().duration_ms,
                        "background removed"
                    );
                    Ok(result)
                },
                Err(err) => {
                    tracing::warn!(kind = %err.kind(), message = err.message(), "dispatch failed");
                    Err(err)
                },
            }
        }
        .instrument(span)
        .await
    }
}

/// Builder for [`ProviderRegistry`]
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    config: ClientConfig,
    providers: Option<Vec<ProviderId>>,
    endpoints: HashMap<ProviderId, String>,
    adapters: Vec<Box<dyn ProviderAdapter>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    artifacts: Option<Arc<ArtifactStore>>,
    client: Option<reqwest::Client>,
}

impl ProviderRegistryBuilder {
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Restrict the built-in providers that get registered
    #[must_use]
    pub fn providers<I: IntoIterator<Item = ProviderId>>(mut self, providers: I) -> Self {
        self.providers = Some(providers.into_iter().collect());
        self
    }

    /// Override a built-in provider's endpoint
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, provider: ProviderId, endpoint: S) -> Self {
        self.endpoints.insert(provider, endpoint.into());
        self
    }

    /// Register a custom adapter, replacing the built-in one for its provider
    #[must_use]
    pub fn adapter(mut self, adapter: Box<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Delay source used between job status checks
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Share an artifact store with other components
    #[must_use]
    pub fn artifacts(mut self, artifacts: Arc<ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the registry
    ///
    /// # Errors
    /// - Invalid client configuration
    /// - HTTP client construction failure
    pub fn build(self) -> std::result::Result<ProviderRegistry, ConfigError> {
        self.config.validate()?;

        let client = match self.client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.config.request_timeout())
                .user_agent(self.config.user_agent.clone())
                .build()?,
        };

        let mut adapters = BTreeMap::new();
        let mut configs = BTreeMap::new();
        let enabled = self
            .providers
            .unwrap_or_else(|| ProviderId::ALL.to_vec());
        for id in enabled {
            let mut provider_config = ProviderConfig::for_provider(id);
            if let Some(endpoint) = self.endpoints.get(&id) {
                provider_config = provider_config.with_endpoint(endpoint.clone());
            }
            adapters.insert(id, adapter_for(provider_config.clone()));
            configs.insert(id, provider_config);
        }
        for adapter in self.adapters {
            configs.remove(&adapter.id());
            adapters.insert(adapter.id(), adapter);
        }

        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let context = DispatchContext {
            client,
            artifacts: self.artifacts.unwrap_or_default(),
            polling: PollingCoordinator::new(sleeper, PollSettings::from(&self.config)),
            max_upload_bytes: self.config.max_upload_bytes,
        };

        tracing::debug!(
            providers = ?adapters.keys().collect::<Vec<_>>(),
            "provider registry ready"
        );
        Ok(ProviderRegistry {
            adapters,
            configs,
            context,
            config: self.config,
        })
    }
}
