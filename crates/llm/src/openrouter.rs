use std::env;
use std::time::Duration;

use datewise_core::{narration_brief, DatePlan, RawDateRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ExtractionError, LlmError, NarrationError};
use crate::{IntentExtractor, Narrator};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "stepfun/step-3.5-flash:free";

const EXTRACTION_PROMPT: &str = r#"You extract structured fields from date planning requests written by people in India.

Read the request and return ONLY a JSON object with these keys:
{
  "city": "string or null",
  "budget": "number in INR or null",
  "date_type": "string or null (romantic, casual, cozy, budget-friendly, formal, fun, or the user's own words)",
  "timing": "string or null (copy the user's timing words, e.g. \"tomorrow evening\", \"Feb 14\")",
  "special_requirements": "string or null (e.g. \"indoor only\", \"outdoor preferred\")"
}

Use null for anything the user did not mention. Do not invent defaults.

Examples:
User: "Plan a romantic dinner date in Mumbai under ₹2500"
Response: {"city": "Mumbai", "budget": 2500, "date_type": "romantic", "timing": null, "special_requirements": null}

User: "Suggest a cozy café date in Delhi this weekend"
Response: {"city": "Delhi", "budget": null, "date_type": "cozy", "timing": "this weekend", "special_requirements": "cafe preferred"}

User: "Plan an indoor date in Bangalore tomorrow if it rains"
Response: {"city": "Bangalore", "budget": null, "date_type": null, "timing": "tomorrow", "special_requirements": "indoor only"}"#;

const NARRATION_PROMPT: &str = "You are a date planning assistant. Write a short, practical date plan from the facts provided.

Cover, in order: a one-line acknowledgement of the request, what the weather means for the date, the top two or three venues with their key details, a suggested time, and any tips that follow from the notes.

Only mention venues that appear in the facts. Keep it friendly and under 250 words.";

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("valid json object regex")
});

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl LlmSettings {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `None` when no API key is set.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let api_key = non_empty("OPENAI_API_KEY").or_else(|| non_empty("OPENROUTER_API_KEY"))?;

        Some(Self {
            api_key,
            base_url: non_empty("DATEWISE_LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: non_empty("DATEWISE_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client (OpenRouter by default).
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    settings: LlmSettings,
}

impl OpenRouterClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let mut payload = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_text }
            ],
            "temperature": temperature
        });
        if let Some(max_tokens) = max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.settings.base_url))
            .bearer_auth(self.settings.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model = %self.settings.model, "chat completion failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in completion".to_string()))
    }
}

impl IntentExtractor for OpenRouterClient {
    async fn extract(&self, text: &str) -> Result<RawDateRequest, ExtractionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let content = self.complete(EXTRACTION_PROMPT, text, 0.3, None).await?;
        debug!(chars = content.len(), "extraction completion received");
        parse_request_json(&content)
    }
}

impl Narrator for OpenRouterClient {
    async fn narrate(&self, plan: &DatePlan) -> Result<String, NarrationError> {
        let user_text = format!(
            "Create a date plan based on this information:\n\n{}",
            narration_brief(plan)
        );
        let content = self
            .complete(NARRATION_PROMPT, &user_text, 0.7, Some(500))
            .await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(NarrationError::EmptyOutput);
        }
        Ok(content.to_string())
    }
}

/// Parses model output as a request: the whole text first, then the first
/// `{...}` block inside it.
pub fn parse_request_json(content: &str) -> Result<RawDateRequest, ExtractionError> {
    let trimmed = content.trim();
    let parsed = serde_json::from_str::<RawDateRequest>(trimmed).or_else(|_| {
        let block = JSON_OBJECT
            .find(trimmed)
            .ok_or_else(|| ExtractionError::Unparseable(preview(trimmed)))?;
        serde_json::from_str::<RawDateRequest>(block.as_str())
            .map_err(|error| ExtractionError::Unparseable(error.to_string()))
    })?;

    Ok(RawDateRequest {
        special_requirements: parsed
            .special_requirements
            .filter(|value| !value.trim().is_empty() && !value.trim().eq_ignore_ascii_case("none")),
        ..parsed
    })
}

fn preview(content: &str) -> String {
    content.chars().take(120).collect()
}
