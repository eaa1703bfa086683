use super::{send_json, BackendResult, TranslationBackend, DEFAULT_BACKEND_QUALITY};
use crate::error::BackendError;
use crate::i18n::Language;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Build the system prompt for UI string translation
fn build_system_prompt(target_language: &str, preserve_placeholders: bool) -> String {
    let placeholder_rule = if preserve_placeholders {
        "- Interpolation placeholders such as {{name}}, {count}, %s, %1$d and ${value} must appear unchanged\n"
    } else {
        ""
    };

    format!(
        r#"You are a professional software localizer. Translate user interface strings from English to {}.

## Rules
{}- Keep HTML tags, URLs and keyboard shortcuts exactly as written
- Keep product names, brand names and code identifiers in English
- Match the length and tone of the original; UI space is limited
- Return ONLY a JSON object with exactly the same keys as the input and the translated strings as values"#,
        target_language, placeholder_rule
    )
}

/// Build the user prompt carrying the strings as a JSON object
fn build_user_prompt(payload: &Value, target_language: &str) -> String {
    format!(
        "Translate the values of this JSON object to {}:\n\n{}",
        target_language, payload
    )
}

/// Models sometimes wrap JSON in a markdown code fence
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Translation backend on an OpenAI-compatible chat completions endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(api_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for OpenAI")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    /// Send one chat completion and parse the reply as JSON.
    async fn complete_json(&self, system: String, user: String) -> Result<Value, BackendError> {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system,
                },
                Message {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            max_completion_tokens: if is_reasoning { 16000 } else { 4000 },
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let body = send_json(
            self.client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request),
            self.timeout,
        )
        .await?;

        let chat: ChatResponse = serde_json::from_value(body)
            .map_err(|e| BackendError::Malformed(format!("unexpected chat response: {}", e)))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Malformed("response contained no choices".to_string()))?;

        serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| BackendError::Malformed(format!("model reply is not JSON: {}", e)))
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn request_batch(
        &self,
        texts: &[String],
        target: Language,
        preserve_placeholders: bool,
    ) -> Result<Vec<BackendResult>, BackendError> {
        // Positions as keys keep duplicates apart and make gaps detectable
        let payload = Value::Object(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| (i.to_string(), Value::String(text.clone())))
                .collect::<Map<String, Value>>(),
        );

        let reply = self
            .complete_json(
                build_system_prompt(target.name(), preserve_placeholders),
                build_user_prompt(&payload, target.name()),
            )
            .await?;

        let Value::Object(fields) = reply else {
            return Err(BackendError::Malformed("model reply is not a JSON object".to_string()));
        };
        if fields.len() != texts.len() {
            return Err(BackendError::Validation(format!(
                "expected {} keys, got {}",
                texts.len(),
                fields.len()
            )));
        }

        (0..texts.len())
            .map(|i| {
                fields
                    .get(&i.to_string())
                    .and_then(Value::as_str)
                    .map(|text| BackendResult::completed(text, DEFAULT_BACKEND_QUALITY))
                    .ok_or_else(|| BackendError::Validation(format!("missing translation for key {}", i)))
            })
            .collect()
    }

    async fn request_json(&self, json: &Value, target: Language) -> Result<Value, BackendError> {
        self.complete_json(
            build_system_prompt(target.name(), true),
            build_user_prompt(json, target.name()),
        )
        .await
    }
}
