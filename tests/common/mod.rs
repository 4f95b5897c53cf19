//! Shared helpers for integration tests

#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use bgremove_remote::{
    AdapterOutput, ClassifiedError, ClientConfig, DispatchContext, ProcessingRequest,
    ProviderAdapter, ProviderId, ProviderRegistry, Sleeper,
};
use bytes::Bytes;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::{Match, MockServer, Request};

pub const REMOVE_BG_PATH: &str = "/v1.0/removebg";
pub const CLIPDROP_PATH: &str = "/remove-background/v1";
pub const REPLICATE_PATH: &str = "/v1/predictions";
pub const HUGGING_FACE_PATH: &str = "/models/briaai/RMBG-1.4";

/// A real 2x2 PNG
pub fn png_bytes() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 128]));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("encode fixture png");
    buffer.into_inner()
}

/// Client settings with a small polling budget
pub fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .request_timeout(Duration::from_secs(5))
        .poll_interval(Duration::from_millis(10))
        .max_poll_attempts(5)
        .build()
        .expect("valid test config")
}

/// Sleeper that returns immediately and counts calls
#[derive(Default)]
pub struct CountingSleeper {
    sleeps: AtomicU32,
}

impl CountingSleeper {
    pub fn count(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry with every built-in provider pointed at a mock server
pub fn mock_registry(server: &MockServer, sleeper: Arc<CountingSleeper>) -> ProviderRegistry {
    mock_registry_with(server, sleeper, test_config())
}

pub fn mock_registry_with(
    server: &MockServer,
    sleeper: Arc<CountingSleeper>,
    config: ClientConfig,
) -> ProviderRegistry {
    let uri = server.uri();
    ProviderRegistry::builder()
        .config(config)
        .endpoint(ProviderId::RemoveBg, format!("{}{}", uri, REMOVE_BG_PATH))
        .endpoint(ProviderId::Clipdrop, format!("{}{}", uri, CLIPDROP_PATH))
        .endpoint(ProviderId::Replicate, format!("{}{}", uri, REPLICATE_PATH))
        .endpoint(ProviderId::HuggingFace, format!("{}{}", uri, HUGGING_FACE_PATH))
        .sleeper(sleeper)
        .build()
        .expect("registry builds")
}

/// Matches requests that carry no credential headers
pub struct NoCredentials;

impl Match for NoCredentials {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
            && !request.headers.contains_key("x-api-key")
    }
}

/// Adapter replaying scripted outcomes, optionally held until released
pub struct ScriptedAdapter {
    id: ProviderId,
    outcomes: Mutex<VecDeque<bgremove_remote::Result<AdapterOutput>>>,
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
    calls: Arc<AtomicU32>,
}

impl ScriptedAdapter {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            outcomes: Mutex::new(VecDeque::new()),
            gate: None,
            entered: Arc::new(Notify::new()),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn then_ok(self, data: Vec<u8>) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(AdapterOutput::new(Bytes::from(data))));
        self
    }

    pub fn then_err(self, error: ClassifiedError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    /// Hold every call until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified each time a call starts
    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn call(
        &self,
        _ctx: &DispatchContext,
        _credential: &str,
        _request: &ProcessingRequest,
    ) -> bgremove_remote::Result<AdapterOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(AdapterOutput::new(Bytes::from(png_bytes()))))
    }
}

/// Registry serving only the given scripted adapter
pub fn scripted_registry(adapter: ScriptedAdapter) -> ProviderRegistry {
    ProviderRegistry::builder()
        .config(test_config())
        .providers(std::iter::empty())
        .adapter(Box::new(adapter))
        .build()
        .expect("registry builds")
}
