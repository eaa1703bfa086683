use super::{error_message, parse_batch_response, send_json, BackendResult, ConsolidatedRequest, TranslationBackend};
use crate::error::BackendError;
use crate::i18n::Language;
use crate::source::StringTable;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    texts: &'a [String],
    target_language: &'a str,
    preserve_placeholders: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRequest<'a> {
    json: &'a Value,
    target_language: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsolidatedBody<'a> {
    english_json: &'a StringTable,
    target_languages: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_batches: Option<usize>,
}

/// Client for the JSON translation service.
///
/// Endpoints, relative to the base URL:
/// - `POST /translate`: `{texts, targetLanguage, preservePlaceholders}`
/// - `POST /translate/json`: `{json, targetLanguage}`
/// - `POST /translate/consolidated`: `{englishJson, targetLanguages, batchIndex?, totalBatches?}`
pub struct ServiceBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ServiceBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for translation service")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    async fn post<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> Result<Value, BackendError> {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        send_json(request, self.timeout).await
    }
}

#[async_trait]
impl TranslationBackend for ServiceBackend {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn request_batch(
        &self,
        texts: &[String],
        target: Language,
        preserve_placeholders: bool,
    ) -> Result<Vec<BackendResult>, BackendError> {
        let body = BatchRequest {
            texts,
            target_language: target.code(),
            preserve_placeholders,
        };
        let response = self.post("/translate", &body).await?;
        parse_batch_response(response, texts.len())
    }

    async fn request_json(&self, json: &Value, target: Language) -> Result<Value, BackendError> {
        let body = JsonRequest {
            json,
            target_language: target.code(),
        };
        let response = self.post("/translate/json", &body).await?;
        if let Some(error) = response.get("error") {
            return Err(BackendError::Service(error_message(error)));
        }
        Ok(response)
    }

    async fn request_consolidated(
        &self,
        request: &ConsolidatedRequest,
    ) -> Result<Map<String, Value>, BackendError> {
        let body = ConsolidatedBody {
            english_json: &request.english,
            target_languages: request.target_languages.iter().map(|l| l.code()).collect(),
            batch_index: request.batch_index,
            total_batches: request.total_batches,
        };
        let response = self.post("/translate/consolidated", &body).await?;

        if let Some(error) = response.get("error") {
            return Err(BackendError::Service(error_message(error)));
        }
        match response.get("translations") {
            Some(Value::Object(translations)) => Ok(translations.clone()),
            Some(_) => Err(BackendError::Malformed(
                "translations field is not an object".to_string(),
            )),
            None => Err(BackendError::Malformed(
                "response has no translations field".to_string(),
            )),
        }
    }
}
