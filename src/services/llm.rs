use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::VendorConfig;
use crate::error::GenerationError;
use crate::services::backend::GenerationBackend;

/// Direct client for the vendor `generateContent` REST API.
pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    image_model: String,
}

/// One text generation call.
#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Ask the vendor for `application/json` output
    pub json_output: bool,
    pub response_schema: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct VendorErrorEnvelope {
    error: VendorError,
}

#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl LLMClient {
    pub fn new(config: &VendorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(LLMClient {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_text(&self, request: &TextRequest) -> Result<String, GenerationError> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        });
        if let Some(instruction) = &request.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        if request.json_output {
            let mut generation_config = json!({ "responseMimeType": "application/json" });
            if let Some(schema) = &request.response_schema {
                generation_config["responseSchema"] = schema.clone();
            }
            body["generationConfig"] = generation_config;
        }

        let response = self.post_generate(&self.model, &body).await?;
        let text = response_text(&response);
        if text.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "vendor response carried no text".to_string(),
            ));
        }
        Ok(text)
    }

    /// Returns the first inline image as a `data:` URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });

        let response = self.post_generate(&self.image_model, &body).await?;
        response_image(&response).ok_or_else(|| {
            GenerationError::MalformedResponse("vendor response carried no image".to_string())
        })
    }

    async fn post_generate(
        &self,
        model: &str,
        body: &Value,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)?;
        let url = format!("{}/models/{}:generateContent", self.api_url, model);

        tracing::debug!(model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(GenerationError::from_transport)?;

        if !status.is_success() {
            return Err(vendor_error(status.as_u16(), &response_text));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::MalformedResponse(format!("invalid vendor JSON: {e}")))
    }
}

fn vendor_error(status: u16, body: &str) -> GenerationError {
    let message = match serde_json::from_str::<VendorErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    };
    GenerationError::from_status(status, message)
}

fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn response_image(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .find_map(|p| p.inline_data.as_ref())
        .map(|img| format!("data:{};base64,{}", img.mime_type, img.data))
}

#[async_trait]
impl GenerationBackend for LLMClient {
    async fn generate_outline(
        &self,
        prompt: &str,
        system_instruction: &str,
        response_schema: &Value,
    ) -> Result<String, GenerationError> {
        self.generate_text(&TextRequest {
            prompt: prompt.to_string(),
            system_instruction: Some(system_instruction.to_string()),
            json_output: true,
            response_schema: Some(response_schema.clone()),
        })
        .await
    }

    async fn generate_chapter(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, GenerationError> {
        self.generate_text(&TextRequest {
            prompt: prompt.to_string(),
            system_instruction: Some(system_instruction.to_string()),
            json_output: false,
            response_schema: None,
        })
        .await
    }

    async fn generate_illustration(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_image(prompt).await
    }
}
