//! The seam between the authoring workflow and whatever produces text.
//!
//! Implementations make exactly one attempt per call; backoff is applied by
//! the caller through [`crate::services::retry::with_retry`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::GenerationError;
use crate::models::RelayResponse;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Raw outline text, expected to contain a JSON object.
    async fn generate_outline(
        &self,
        prompt: &str,
        system_instruction: &str,
        response_schema: &Value,
    ) -> Result<String, GenerationError>;

    /// Markdown for one chapter.
    async fn generate_chapter(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, GenerationError>;

    /// Image payload for inline display (a `data:` URL).
    async fn generate_illustration(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Client for the relay endpoints; the vendor credential stays on the server.
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RelayClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// True when the relay answers its health endpoint.
    pub async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::error!(error = %e, "Relay connectivity check failed");
                false
            }
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(GenerationError::from_transport)?;

        let parsed: Option<RelayResponse> = serde_json::from_str(&response_text).ok();

        if !status.is_success() {
            let (code, message) = match parsed {
                Some(reply) => (reply.code, reply.error),
                None => (None, None),
            };
            let message = message.unwrap_or_else(|| format!("relay request to {path} failed"));
            return Err(GenerationError::from_relay(
                status.as_u16(),
                code.as_deref(),
                message,
            ));
        }

        match parsed {
            Some(RelayResponse {
                success: true,
                text: Some(text),
                ..
            }) => Ok(text),
            _ => Err(GenerationError::MalformedResponse(
                "No response from backend".to_string(),
            )),
        }
    }
}

#[async_trait]
impl GenerationBackend for RelayClient {
    async fn generate_outline(
        &self,
        prompt: &str,
        system_instruction: &str,
        response_schema: &Value,
    ) -> Result<String, GenerationError> {
        self.post(
            "/api/generate-outline",
            &json!({
                "prompt": prompt,
                "systemInstruction": system_instruction,
                "responseSchema": response_schema,
            }),
        )
        .await
    }

    async fn generate_chapter(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, GenerationError> {
        self.post(
            "/api/generate-chapter",
            &json!({
                "prompt": prompt,
                "systemInstruction": system_instruction,
            }),
        )
        .await
    }

    async fn generate_illustration(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::ImageUnavailable(
            "the relay exposes no image endpoint".to_string(),
        ))
    }
}
