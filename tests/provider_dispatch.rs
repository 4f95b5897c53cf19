//! Wire-level dispatch tests against mock provider servers

mod common;

use bgremove_remote::{
    config::REPLICATE_MODEL_VERSION, ErrorKind, ImageSource, ProcessingRequest, ProviderId,
    ProviderRegistry, SizeHint,
};
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{any, body_bytes, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn binary_request() -> ProcessingRequest {
    ProcessingRequest::new(ImageSource::from_bytes(png_bytes()))
}

/// Value of a text part in a received multipart body
fn multipart_text(body: &[u8], name: &str) -> Option<String> {
    let body = String::from_utf8_lossy(body);
    let marker = format!("name=\"{}\"", name);
    let after_name = &body[body.find(&marker)? + marker.len()..];
    let value = &after_name[after_name.find("\r\n\r\n")? + 4..];
    Some(value[..value.find("\r\n")?].to_string())
}

fn png_response() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_bytes(png_bytes())
        .insert_header("content-type", "image/png")
}

#[tokio::test]
async fn test_remove_bg_binary_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REMOVE_BG_PATH))
        .and(header("X-Api-Key", "rb-key"))
        .respond_with(png_response().insert_header("X-Credits-Charged", "1"))
        .expect(1)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let result = registry
        .dispatch("removebg", "rb-key", &binary_request())
        .await
        .unwrap();

    assert_eq!(result.data().as_ref(), png_bytes().as_slice());
    assert_eq!(result.metadata().provider, ProviderId::RemoveBg);
    assert_eq!(result.metadata().credits_charged, Some(1.0));

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="image_file""#));
    assert!(body.contains(r#"filename="image.png""#));
    assert_eq!(multipart_text(&requests[0].body, "size").as_deref(), Some("auto"));
    let image = png_bytes();
    assert!(requests[0]
        .body
        .windows(image.len())
        .any(|window| window == image.as_slice()));
    assert!(!body.contains(r#"name="image_url""#));
    assert_eq!(body.matches("Content-Disposition").count(), 2);
}

#[tokio::test]
async fn test_remove_bg_sends_requested_size_and_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REMOVE_BG_PATH))
        .respond_with(png_response())
        .expect(1)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let request = ProcessingRequest::new(ImageSource::from_url("https://example.com/cat.jpg"))
        .with_size(SizeHint::Preview);
    registry.dispatch("removebg", "rb-key", &request).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="image_url""#));
    assert_eq!(
        multipart_text(&requests[0].body, "image_url").as_deref(),
        Some("https://example.com/cat.jpg")
    );
    assert_eq!(multipart_text(&requests[0].body, "size").as_deref(), Some("preview"));
    assert!(!body.contains(r#"name="image_file""#));
}

#[tokio::test]
async fn test_clipdrop_upload_with_credit_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CLIPDROP_PATH))
        .and(header("x-api-key", "cd-key"))
        .respond_with(
            png_response()
                .insert_header("x-credits-consumed", "1")
                .insert_header("x-remaining-credits", "99"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let result = registry
        .dispatch("clipdrop", "cd-key", &binary_request())
        .await
        .unwrap();

    assert_eq!(result.metadata().credits_charged, Some(1.0));
    assert_eq!(result.metadata().remaining_credits, Some(99.0));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="image_file""#));
    assert_eq!(body.matches("Content-Disposition").count(), 1);
}

#[tokio::test]
async fn test_clipdrop_downloads_location_source_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos/cat.png"))
        .and(NoCredentials)
        .respond_with(png_response())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CLIPDROP_PATH))
        .respond_with(png_response())
        .expect(1)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let request =
        ProcessingRequest::new(ImageSource::from_url(format!("{}/photos/cat.png", server.uri())));
    registry.dispatch("clipdrop", "cd-key", &request).await.unwrap();
}

#[tokio::test]
async fn test_source_download_failure_is_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(png_response())
        .expect(0)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let request =
        ProcessingRequest::new(ImageSource::from_url(format!("{}/missing.png", server.uri())));
    let err = registry
        .dispatch("huggingface", "hf-key", &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn test_downloaded_source_over_limit_is_not_uploaded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos/large.png"))
        .respond_with(png_response())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(png_response())
        .expect(0)
        .mount(&server)
        .await;

    let config = bgremove_remote::ClientConfig::builder()
        .poll_interval(std::time::Duration::from_millis(10))
        .max_poll_attempts(5)
        .max_upload_bytes(16)
        .build()
        .unwrap();
    let registry = mock_registry_with(&server, Arc::default(), config);
    let request =
        ProcessingRequest::new(ImageSource::from_url(format!("{}/photos/large.png", server.uri())));

    for provider in ["clipdrop", "replicate", "huggingface"] {
        let err = registry.dispatch(provider, "key", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert!(err.message().contains("16 byte limit"));
    }
}

#[tokio::test]
async fn test_downloaded_source_must_be_an_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos/page.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(png_response())
        .expect(0)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let request =
        ProcessingRequest::new(ImageSource::from_url(format!("{}/photos/page.html", server.uri())));
    let err = registry
        .dispatch("huggingface", "hf_abc", &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[tokio::test]
async fn test_hugging_face_raw_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HUGGING_FACE_PATH))
        .and(header("authorization", "Bearer hf_abc"))
        .and(header("content-type", "image/png"))
        .and(body_bytes(png_bytes()))
        .respond_with(png_response())
        .expect(1)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let result = registry
        .dispatch("huggingface", "hf_abc", &binary_request())
        .await
        .unwrap();
    assert!(!result.data().is_empty());
    assert_eq!(result.metadata().content_type, "image/png");
}

#[tokio::test]
async fn test_hugging_face_non_image_body_is_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HUGGING_FACE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "unexpected output"})))
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let err = registry
        .dispatch("huggingface", "hf_abc", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert!(registry.artifacts().is_empty());
}

async fn mount_prediction(server: &MockServer, status: &str) {
    Mock::given(method("POST"))
        .and(path(REPLICATE_PATH))
        .and(header("authorization", "Token r8_key"))
        .and(body_partial_json(json!({"version": REPLICATE_MODEL_VERSION})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1",
            "status": status,
            "urls": {"get": format!("{}/v1/predictions/p1", server.uri())},
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn job_status(server: &MockServer, status: &str) -> ResponseTemplate {
    let mut body = json!({
        "id": "p1",
        "status": status,
        "urls": {"get": format!("{}/v1/predictions/p1", server.uri())},
    });
    if status == "succeeded" {
        body["output"] = json!(format!("{}/output/p1.png", server.uri()));
    }
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn test_replicate_polls_until_succeeded() {
    let server = MockServer::start().await;
    mount_prediction(&server, "starting").await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .and(header("authorization", "Token r8_key"))
        .respond_with(job_status(&server, "processing"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(job_status(&server, "succeeded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/output/p1.png"))
        .and(NoCredentials)
        .respond_with(png_response())
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(CountingSleeper::default());
    let registry = mock_registry(&server, sleeper.clone());
    let result = registry
        .dispatch("replicate", "r8_key", &binary_request())
        .await
        .unwrap();

    assert_eq!(result.data().as_ref(), png_bytes().as_slice());
    assert_eq!(sleeper.count(), 2);

    let requests = server.received_requests().await.unwrap();
    let creation: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let image = creation["input"]["image"].as_str().unwrap();
    assert!(image.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_replicate_terminal_creation_skips_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLICATE_PATH))
        .respond_with(job_status(&server, "succeeded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(job_status(&server, "succeeded"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/output/p1.png"))
        .respond_with(png_response())
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(CountingSleeper::default());
    let registry = mock_registry(&server, sleeper.clone());
    registry
        .dispatch("replicate", "r8_key", &binary_request())
        .await
        .unwrap();
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_replicate_never_terminal_times_out() {
    let server = MockServer::start().await;
    mount_prediction(&server, "starting").await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(job_status(&server, "processing"))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/output/p1.png"))
        .respond_with(png_response())
        .expect(0)
        .mount(&server)
        .await;

    let sleeper = Arc::new(CountingSleeper::default());
    let registry = mock_registry(&server, sleeper.clone());
    let err = registry
        .dispatch("replicate", "r8_key", &binary_request())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PollingTimeout);
    assert_eq!(sleeper.count(), 5);
}

#[tokio::test]
async fn test_replicate_failed_job() {
    let server = MockServer::start().await;
    mount_prediction(&server, "starting").await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(job_status(&server, "processing"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "status": "failed",
            "error": "Input image is corrupted",
        })))
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let err = registry
        .dispatch("replicate", "r8_key", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteProcessingFailed);
    assert_eq!(err.message(), "Input image is corrupted");
}

#[tokio::test]
async fn test_missing_credential_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(png_response())
        .expect(0)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    for provider in ProviderId::ALL {
        for credential in ["", "  "] {
            let err = registry
                .dispatch(provider.as_str(), credential, &binary_request())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingCredential);
            assert!(err.is_local());
        }
    }
}

#[tokio::test]
async fn test_unsupported_provider() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(png_response())
        .expect(0)
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let err = registry
        .dispatch("photoroom", "key", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);

    let only_remove_bg = ProviderRegistry::builder()
        .config(test_config())
        .providers([ProviderId::RemoveBg])
        .build()
        .unwrap();
    let err = only_remove_bg
        .dispatch("replicate", "key", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
}

#[tokio::test]
async fn test_remote_rejection_uses_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REMOVE_BG_PATH))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "errors": [{"title": "Insufficient credits", "code": "insufficient_credits"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CLIPDROP_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let registry = mock_registry(&server, Arc::default());
    let err = registry
        .dispatch("removebg", "key", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert_eq!(err.message(), "Insufficient credits");

    let err = registry
        .dispatch("clipdrop", "key", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert!(err.message().contains("API key"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_failure() {
    let registry = ProviderRegistry::builder()
        .config(test_config())
        .endpoint(ProviderId::HuggingFace, "http://127.0.0.1:1/models/x")
        .build()
        .unwrap();
    let err = registry
        .dispatch("huggingface", "hf_abc", &binary_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}
