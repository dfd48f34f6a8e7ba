//! Relay endpoint tests: the router is driven in-process, the AI vendor is a
//! local axum server on an ephemeral port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use ebook_kilat::config::{GenerationConfig, VendorConfig};
use ebook_kilat::context::{AppContext, Settings};
use ebook_kilat::error::GenerationError;
use ebook_kilat::models::{Chapter, ChapterStatus, LanguageCode, Project, SectionType};
use ebook_kilat::services::authoring::AuthoringService;
use ebook_kilat::services::backend::{GenerationBackend, RelayClient};
use ebook_kilat::services::llm::LLMClient;
use ebook_kilat::services::retry::RetryPolicy;
use ebook_kilat::{AppState, build_router};

/// What the fake vendor saw.
#[derive(Default)]
struct VendorLog {
    calls: AtomicUsize,
    last_body: Mutex<Option<Value>>,
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Serve `app` and count the requests that reach it.
async fn spawn_counted(app: Router) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = app.layer(axum::middleware::from_fn(
        move |request: axum::extract::Request, next: axum::middleware::Next| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                next.run(request).await
            }
        },
    ));
    (spawn(app).await, hits)
}

async fn spawn_vendor(status: StatusCode, reply: Value) -> (String, Arc<VendorLog>) {
    let log = Arc::new(VendorLog::default());
    let seen = log.clone();
    let app = Router::new().fallback(move |Json(body): Json<Value>| {
        let seen = seen.clone();
        let reply = reply.clone();
        async move {
            seen.calls.fetch_add(1, Ordering::SeqCst);
            *seen.last_body.lock().unwrap() = Some(body);
            (status, Json(reply))
        }
    });
    (spawn(app).await, log)
}

fn text_reply(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

fn vendor_config(api_url: &str, api_key: Option<&str>) -> VendorConfig {
    VendorConfig {
        api_key: api_key.map(str::to_string),
        api_url: api_url.to_string(),
        model: "test-model".to_string(),
        image_model: "test-image-model".to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn relay_app(api_url: &str, api_key: Option<&str>) -> Router {
    let client = LLMClient::new(&vendor_config(api_url, api_key)).unwrap();
    build_router(AppState::new(client))
}

async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = relay_app("http://127.0.0.1:9", None);
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_missing_server_key_is_500() {
    let app = relay_app("http://127.0.0.1:9", None);
    let (status, body) = post_json(
        app,
        "/api/generate-chapter",
        json!({ "prompt": "write" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
    assert_eq!(body["code"], "MISSING_SERVER_KEY");
}

#[tokio::test]
async fn test_missing_prompt_is_400() {
    let app = relay_app("http://127.0.0.1:9", Some("server-key"));
    let (status, body) = post_json(
        app,
        "/api/generate-outline",
        json!({ "systemInstruction": "persona" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing required field: prompt");
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let app = relay_app("http://127.0.0.1:9", Some("server-key"));
    let (status, body) = post_json(app, "/api/generate-chapter", "{oops".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_outline_is_forwarded_as_json_request() {
    let (vendor_url, log) = spawn_vendor(StatusCode::OK, text_reply("{\"title\":\"T\"}")).await;
    let app = relay_app(&vendor_url, Some("server-key"));

    let (status, body) = post_json(
        app,
        "/api/generate-outline",
        json!({
            "prompt": "outline please",
            "systemInstruction": "persona",
            "responseSchema": { "type": "OBJECT" }
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "text": "{\"title\":\"T\"}" }));

    let sent = log.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["contents"][0]["parts"][0]["text"], "outline please");
    assert_eq!(sent["systemInstruction"]["parts"][0]["text"], "persona");
    assert_eq!(sent["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(sent["generationConfig"]["responseSchema"]["type"], "OBJECT");
}

#[tokio::test]
async fn test_vendor_quota_maps_to_429() {
    let (vendor_url, _log) = spawn_vendor(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" } }),
    )
    .await;
    let app = relay_app(&vendor_url, Some("server-key"));

    let (status, body) = post_json(
        app,
        "/api/generate-chapter",
        json!({ "prompt": "write" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "RATE_LIMITED");
}

fn authoring_ctx() -> AppContext {
    let mut ctx = AppContext::new(Settings {
        language: LanguageCode::EnglishUk,
        api_key: Some("user-key".into()),
    });
    ctx.sign_in("user-1", "writer@example.com", Some("Writer"));
    ctx
}

fn fast_config() -> GenerationConfig {
    GenerationConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
        toc_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_chapter_generation_through_relay() {
    let (vendor_url, log) = spawn_vendor(
        StatusCode::OK,
        text_reply("# Soil\nHealthy soil.\n\n> **[IMAGE PROMPT]:** Soil layers."),
    )
    .await;
    let relay_url = spawn(relay_app(&vendor_url, Some("server-key"))).await;

    let client = RelayClient::new(relay_url, Duration::from_secs(5)).unwrap();
    assert!(client.is_reachable().await);

    let service = AuthoringService::new(client, fast_config());
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec!["pH".into()])];

    service
        .generate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap();

    let chapter = project.chapter("a").unwrap();
    assert_eq!(chapter.status, ChapterStatus::Completed);
    assert!(chapter.content.as_deref().unwrap().starts_with("# Soil"));
    assert_eq!(log.calls.load(Ordering::SeqCst), 1);

    // The relay has no image endpoint
    let err = service
        .backend()
        .generate_illustration("Soil layers.")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::ImageUnavailable(_)));
}

#[tokio::test]
async fn test_quota_through_relay_is_retried_then_normalized() {
    let (vendor_url, log) = spawn_vendor(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" } }),
    )
    .await;
    let relay_url = spawn(relay_app(&vendor_url, Some("server-key"))).await;

    let client = RelayClient::new(relay_url, Duration::from_secs(5)).unwrap();
    let service = AuthoringService::new(client, fast_config());
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec![])];
    project.outline[0].content = Some("earlier draft".into());
    project.outline[0].status = ChapterStatus::Error;

    let err = service
        .generate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::QuotaExhausted));
    assert_eq!(log.calls.load(Ordering::SeqCst), 3);
    let chapter = project.chapter("a").unwrap();
    assert_eq!(chapter.status, ChapterStatus::Error);
    assert_eq!(chapter.content.as_deref(), Some("earlier draft"));
}

#[tokio::test]
async fn test_direct_client_generates_illustration() {
    let (vendor_url, log) = spawn_vendor(
        StatusCode::OK,
        json!({ "candidates": [{ "content": { "parts": [
            { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
        ] } }] }),
    )
    .await;
    let client = LLMClient::new(&vendor_config(&vendor_url, Some("key"))).unwrap();
    let service = AuthoringService::new(client, fast_config());

    let prompt = "> **[IMAGE PROMPT]:** Soil layers.";
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec![])];
    project.outline[0].content = Some(format!("Text\n{prompt}\n"));

    let generated = service
        .illustrate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap();
    assert_eq!(generated, 1);
    assert_eq!(project.images[prompt], "data:image/png;base64,iVBORw0KGgo=");

    let sent = log.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["contents"][0]["parts"][0]["text"], "Soil layers.");
}

#[tokio::test]
async fn test_vendor_rejection_through_relay_is_not_retried() {
    let (vendor_url, log) = spawn_vendor(
        StatusCode::BAD_REQUEST,
        json!({ "error": { "code": 400, "message": "Invalid prompt", "status": "INVALID_ARGUMENT" } }),
    )
    .await;
    let relay_url = spawn(relay_app(&vendor_url, Some("server-key"))).await;

    let client = RelayClient::new(relay_url, Duration::from_secs(5)).unwrap();
    let service = AuthoringService::new(client, fast_config());
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec![])];

    let err = service
        .generate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Rejected { status: 400, .. }));
    assert_eq!(log.calls.load(Ordering::SeqCst), 1);
    assert_eq!(project.chapter("a").unwrap().status, ChapterStatus::Error);
}

#[tokio::test]
async fn test_empty_vendor_reply_through_relay_is_not_retried() {
    let (vendor_url, log) = spawn_vendor(StatusCode::OK, json!({ "candidates": [] })).await;
    let relay_url = spawn(relay_app(&vendor_url, Some("server-key"))).await;

    let client = RelayClient::new(relay_url, Duration::from_secs(5)).unwrap();
    let service = AuthoringService::new(client, fast_config());
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec![])];

    let err = service
        .generate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::MalformedResponse(_)));
    assert_eq!(log.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_relay_without_key_is_asked_once() {
    let (relay_url, hits) = spawn_counted(relay_app("http://127.0.0.1:9", None)).await;

    let client = RelayClient::new(relay_url, Duration::from_secs(5)).unwrap();
    let service = AuthoringService::new(client, fast_config());
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec![])];

    let err = service
        .generate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Rejected { status: 500, .. }));
    assert!(err.to_string().contains("GEMINI_API_KEY"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_vendor_outage_through_relay_is_retried() {
    let (vendor_url, log) = spawn_vendor(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "code": 503, "message": "The model is overloaded", "status": "UNAVAILABLE" } }),
    )
    .await;
    let relay_url = spawn(relay_app(&vendor_url, Some("server-key"))).await;

    let client = RelayClient::new(relay_url, Duration::from_secs(5)).unwrap();
    let service = AuthoringService::new(client, fast_config());
    let mut project = Project::new("Gardening", "");
    project.outline = vec![Chapter::new("a", "Soil", SectionType::Body, vec![])];

    let err = service
        .generate_chapter(&authoring_ctx(), &mut project, "a")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Server { status: 502, .. }));
    assert_eq!(log.calls.load(Ordering::SeqCst), 3);
}
