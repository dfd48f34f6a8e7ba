use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use super::AppState;
use crate::error::ApiError;
use crate::models::{GenerateRequest, RelayResponse};
use crate::services::llm::TextRequest;

pub async fn health_check() -> Json<Value> {
    Json(json!({ "success": true, "message": "Backend API is running" }))
}

/// Validate the body: key first, then a non-empty prompt.
fn accept(
    state: &AppState,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<GenerateRequest, ApiError> {
    if !state.llm_client.has_credential() {
        return Err(ApiError::MissingServerKey);
    }
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    match request.prompt.as_deref() {
        Some(prompt) if !prompt.trim().is_empty() => Ok(request),
        _ => Err(ApiError::BadRequest(
            "Missing required field: prompt".to_string(),
        )),
    }
}

async fn forward(
    state: &AppState,
    kind: &'static str,
    request: TextRequest,
) -> Result<Json<RelayResponse>, ApiError> {
    match state.llm_client.generate_text(&request).await {
        Ok(text) => Ok(Json(RelayResponse {
            success: true,
            text: Some(text),
            error: None,
            code: None,
        })),
        Err(e) => {
            tracing::error!(kind, model = state.llm_client.model(), error = %e, "Generation relay failed");
            Err(e.into())
        }
    }
}

pub async fn generate_outline(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<RelayResponse>, ApiError> {
    let request = accept(&state, body)?;
    forward(
        &state,
        "outline",
        TextRequest {
            prompt: request.prompt.unwrap_or_default(),
            system_instruction: request.system_instruction,
            json_output: true,
            response_schema: request.response_schema,
        },
    )
    .await
}

pub async fn generate_chapter(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<RelayResponse>, ApiError> {
    let request = accept(&state, body)?;
    forward(
        &state,
        "chapter",
        TextRequest {
            prompt: request.prompt.unwrap_or_default(),
            system_instruction: request.system_instruction,
            json_output: false,
            response_schema: None,
        },
    )
    .await
}
