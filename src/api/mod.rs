//! Relay HTTP surface.

mod relay;

use std::sync::Arc;

use axum::{
    Router,
    response::Html,
    routing::{get, post},
};
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::services::llm::LLMClient;

pub use relay::{generate_chapter, generate_outline, health_check};

#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<LLMClient>,
}

impl AppState {
    pub fn new(llm_client: LLMClient) -> Self {
        AppState {
            llm_client: Arc::new(llm_client),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health_check))
        .route("/api/generate-outline", post(generate_outline))
        .route("/api/generate-chapter", post(generate_chapter))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(AllowMethods::any())
                .allow_headers(AllowHeaders::any()),
        )
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Ebook Kilat Relay</title>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
    </style>
</head>
<body>
    <h1>Ebook Kilat Relay</h1>
    <p>Forwards outline and chapter generation requests to the AI vendor using the server-held key.</p>
    <h2>Available Endpoints:</h2>
    <div class="endpoint">GET /api/health - Health check</div>
    <div class="endpoint">POST /api/generate-outline - {prompt, systemInstruction, responseSchema}</div>
    <div class="endpoint">POST /api/generate-chapter - {prompt, systemInstruction}</div>
</body>
</html>
"#,
    )
}
