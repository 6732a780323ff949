//! Client for the hosted vision model (OpenAI chat completions with image input).

use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::models::SkinProfile;

const SYSTEM_PROMPT: &str = "You are an expert dermatologist with years of experience in skin analysis and skincare recommendations.";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.7;

#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("API communication failure: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Unable to parse text from JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid API key header: {0}")]
    Header(#[from] header::InvalidHeaderValue),

    #[error("Refused to complete request: {0}")]
    Refusal(String),

    #[error("Unknown response from OpenAI API")]
    Unknown,
}

/// A hosted model that can look at an image and answer a text prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Identifier reported back to clients alongside the diagnosis.
    fn model_name(&self) -> String;

    /// Send `image` and `prompt`, returning the model's free-text answer.
    async fn describe(&self, image: &[u8], prompt: &str) -> Result<String, OpenAiError>;
}

/// Extracts the answer (or the error message) from a raw completion response.
pub struct OpenAiRequest {
    valid: fn(&Value) -> &Value,
    error: fn(&Value) -> &Value,
}

impl OpenAiRequest {
    pub fn new(valid: fn(&Value) -> &Value, error: fn(&Value) -> &Value) -> Self {
        Self { valid, error }
    }

    /// Chat completions put the text at `choices[0].message.content`.
    pub fn chat_completion() -> Self {
        Self::new(
            |v| &v["choices"][0]["message"]["content"],
            |v| &v["error"]["message"],
        )
    }

    fn build_api_auth_header(api_key: &str) -> Result<HeaderMap, OpenAiError> {
        let api_auth = ["Bearer ", api_key].concat();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&api_auth)?);

        Ok(headers)
    }

    pub async fn send_request(
        &self,
        client: &Client,
        endpoint: &str,
        api_key: &str,
        body: Value,
    ) -> Result<String, OpenAiError> {
        let request_builder = client
            .post(endpoint)
            .headers(Self::build_api_auth_header(api_key)?)
            .json(&body);

        let response = request_builder.send().await.map_err(OpenAiError::Api)?;
        let text = response.text().await.map_err(OpenAiError::Api)?;
        let result: Value = serde_json::from_str(&text).map_err(OpenAiError::Json)?;

        self.extract(&result)
    }

    fn extract(&self, result: &Value) -> Result<String, OpenAiError> {
        match (self.valid)(result) {
            Value::String(str_val) => Ok(str_val.to_owned()),
            _ => match (self.error)(result) {
                Value::String(err_val) => Err(OpenAiError::Refusal(err_val.to_owned())),
                _ => Err(OpenAiError::Unknown),
            },
        }
    }
}

/// OpenAI-backed [`VisionModel`].
pub struct OpenAiVision {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiVision {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, image: &[u8], prompt: &str) -> Value {
        let data_url = format!(
            "data:{};base64,{}",
            image_mime_type(image),
            BASE64_STANDARD.encode(image)
        );

        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]
                }
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        })
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn describe(&self, image: &[u8], prompt: &str) -> Result<String, OpenAiError> {
        info!(
            "Sending {} byte image to vision model {}",
            image.len(),
            self.model
        );

        match OpenAiRequest::chat_completion()
            .send_request(
                &self.client,
                &self.endpoint(),
                &self.api_key,
                self.request_body(image, prompt),
            )
            .await
        {
            Ok(text) => {
                debug!("Vision model returned {} characters", text.len());
                Ok(text)
            }
            Err(e) => {
                error!("Vision model request failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Sniff the image format from its magic bytes; defaults to JPEG.
pub fn image_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

/// Build the assessment prompt, adding whatever the user told us about their skin.
pub fn build_analysis_prompt(skin_profile: Option<&SkinProfile>) -> String {
    let mut parts: Vec<String> = [
        "Please analyze this facial skin image comprehensively. Provide a detailed professional assessment including:",
        "",
        "1. **SKIN CONDITIONS DETECTED**",
        "   - List all visible skin conditions (acne, hyperpigmentation, wrinkles, redness, etc.)",
        "   - Rate severity for each condition (mild, moderate, severe)",
        "   - Identify specific areas affected",
        "",
        "2. **SKIN TYPE ASSESSMENT**",
        "   - Determine skin type (oily, dry, combination, normal)",
        "   - Assess hydration levels",
        "   - Note texture and pore visibility",
        "",
        "3. **ROOT CAUSES & FACTORS**",
        "   - Identify potential causes of detected issues",
        "   - Environmental factors to consider",
        "   - Lifestyle factors that may contribute",
        "",
        "4. **PERSONALIZED RECOMMENDATIONS**",
        "   - Specific ingredients to look for (e.g., niacinamide, retinol, hyaluronic acid)",
        "   - Product types needed (cleanser, serum, moisturizer, sunscreen)",
        "   - Treatment priorities (what to address first)",
        "   - Morning and evening routine suggestions",
        "",
        "5. **IMPROVEMENT TIMELINE**",
        "   - Expected timeline for visible improvements",
        "   - Milestones to track progress",
        "",
        "6. **PRECAUTIONS & WARNINGS**",
        "   - Ingredients or products to avoid",
        "   - Potential sensitivities to watch for",
        "   - When to seek professional help",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect();

    if let Some(profile) = skin_profile {
        let data = &profile.data;
        parts.push(String::new());
        parts.push("**USER PROFILE CONTEXT:**".to_string());

        if let Some(skin_type) = data.skin_type {
            parts.push(format!(
                "- User reports skin type as: {}",
                skin_type.as_str()
            ));
        }

        if !data.primary_concerns.is_empty() {
            parts.push(format!(
                "- Main concerns: {}",
                data.primary_concerns.join(", ")
            ));
        }

        if !data.allergies.is_empty() {
            parts.push(format!(
                "- **IMPORTANT - User is allergic to: {}** (DO NOT recommend products with these ingredients)",
                data.allergies.join(", ")
            ));
        }

        if !data.pre_existing_conditions.is_empty() {
            parts.push(format!(
                "- Pre-existing conditions: {}",
                data.pre_existing_conditions.join(", ")
            ));
        }

        if let Some(level) = data.sensitivity_level {
            parts.push(format!("- Sensitivity level: {}", level.as_str()));
            if profile.has_high_sensitivity() {
                parts.push("  **Prioritize gentle, fragrance-free products**".to_string());
            }
        }

        if !data.skin_goals.is_empty() {
            parts.push(format!("- Goals: {}", data.skin_goals.join(", ")));
        }
    }

    parts.push(String::new());
    parts.push(
        "Format your response in clear sections with markdown headings (##) for each category."
            .to_string(),
    );
    parts.push(
        "Be specific, actionable, and personalized based on the image and user context provided."
            .to_string(),
    );

    parts.join("\n")
}
