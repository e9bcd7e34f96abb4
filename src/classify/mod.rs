//! Classification adapter: vision-model client and field normalizer
//!
//! The external adapter is an OpenAI-compatible vision chat-completions
//! endpoint. It returns a raw category guess, a confidence score, free-text
//! descriptions, and a best-effort structured-field guess; the normalizer
//! validates all of it against the classification schema.

pub mod normalize;
pub mod prompt;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::model::Coordinates;

pub use normalize::{
    match_enum_value, normalize, NormalizedClassification, RejectionReason,
};

const ENV_API_KEY: &str = "GROQ_API_KEY";
const ENV_VISION_MODEL: &str = "VISION_MODEL";
const ENV_VISION_BASE_URL: &str = "VISION_BASE_URL";

const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Lower temperature for more consistent structured output
const TEMPERATURE: f64 = 0.3;
const MAX_COMPLETION_TOKENS: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Vision endpoint returned HTTP {0}")]
    BadStatus(u16),

    #[error("Malformed classification response: {0}")]
    MalformedResponse(String),

    #[error("Vision API key not configured (set {ENV_API_KEY})")]
    MissingApiKey,
}

/// Raw classifier output, prior to normalization
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, alias = "Text_Description")]
    pub description: String,
    #[serde(default, alias = "locationDescription")]
    pub location_description: String,
    #[serde(default, alias = "formFields")]
    pub form_fields: serde_json::Map<String, serde_json::Value>,
}

/// Collaborator seam for the external classification adapter
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(
        &self,
        image: &[u8],
        coordinates: Coordinates,
    ) -> Result<RawClassification, ClassifyError>;
}

/// Vision-model client against an OpenAI-compatible chat-completions API
pub struct VisionClassifier {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl VisionClassifier {
    /// Build the classifier from the environment. Fails fast when no API key
    /// is configured so misconfiguration surfaces at startup, not per request.
    pub fn from_env() -> Result<Self, ClassifyError> {
        let api_key = std::env::var(ENV_API_KEY).map_err(|_| ClassifyError::MissingApiKey)?;
        let model = std::env::var(ENV_VISION_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var(ENV_VISION_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        tracing::info!(model = %model, "Vision classifier initialized");

        Ok(Self {
            client: Client::builder()
                .user_agent("civicsight-agent/1.0")
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            base_url,
            model,
        })
    }

    /// Parse the model's JSON-mode content into a raw classification
    fn parse_content(content: &str) -> Result<RawClassification, ClassifyError> {
        let mut raw: RawClassification = serde_json::from_str(content)
            .map_err(|e| ClassifyError::MalformedResponse(e.to_string()))?;

        // Clamp confidence into [0, 1]
        raw.confidence = raw.confidence.clamp(0.0, 1.0);

        Ok(raw)
    }
}

#[async_trait]
impl ImageClassifier for VisionClassifier {
    async fn classify(
        &self,
        image: &[u8],
        coordinates: Coordinates,
    ) -> Result<RawClassification, ClassifyError> {
        let start_time = std::time::Instant::now();

        let prompt = prompt::build_classification_prompt(coordinates);
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:image/jpeg;base64,{}", image_b64),
                        },
                    },
                ],
            }],
            "temperature": TEMPERATURE,
            "max_completion_tokens": MAX_COMPLETION_TOKENS,
            "response_format": { "type": "json_object" },
        });

        tracing::debug!(
            model = %self.model,
            image_bytes = image.len(),
            coordinates = %coordinates,
            "Initiating vision API call for image classification"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(status = status, "Vision endpoint returned non-success status");
            return Err(ClassifyError::BadStatus(status));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| {
                ClassifyError::MalformedResponse("completion has no choices".to_string())
            })?;

        let raw = Self::parse_content(content)?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = start_time.elapsed().as_millis(),
            category = %raw.category,
            confidence = raw.confidence,
            "Vision API call completed"
        );

        Ok(raw)
    }
}
