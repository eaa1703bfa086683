//! Translation backends and the adapter that calls them.
//!
//! A [`TranslationBackend`] performs exactly one request per call. The
//! [`BackendAdapter`] wraps it with the per-attempt timeout, retry with
//! jittered exponential backoff, and response validation. Batch translation
//! through the adapter never returns an error: when every attempt fails,
//! each text gets a `failed` result carrying the last error message.

mod openai;
mod service;

pub use openai::OpenAiBackend;
pub use service::ServiceBackend;

use crate::error::BackendError;
use crate::i18n::Language;
use crate::retry::{with_retry_if, RetryConfig};
use crate::source::StringTable;
use crate::store::UnitStatus;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Quality assumed when a backend does not report one.
pub const DEFAULT_BACKEND_QUALITY: f64 = 0.9;

/// Default hard limit for a single request attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome for one text of a batch, aligned with the request position.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    pub translated_text: String,
    pub quality_score: f64,
    pub status: UnitStatus,
    pub error: Option<String>,
}

impl BackendResult {
    pub fn completed(translated_text: impl Into<String>, quality_score: f64) -> Self {
        Self {
            translated_text: translated_text.into(),
            quality_score: quality_score.clamp(0.0, 1.0),
            status: UnitStatus::Completed,
            error: None,
        }
    }

    /// Failed result: the source text stands in for the translation.
    pub fn failed(source_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            translated_text: source_text.into(),
            quality_score: 0.0,
            status: UnitStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == UnitStatus::Completed
    }
}

/// One multi-language request: English strings in, every target out.
#[derive(Debug, Clone)]
pub struct ConsolidatedRequest {
    pub english: StringTable,
    pub target_languages: Vec<Language>,
    pub batch_index: Option<usize>,
    pub total_batches: Option<usize>,
}

/// Consolidated translations after gap filling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedOutcome {
    /// translation key → language code → text
    pub translations: IndexMap<String, IndexMap<String, String>>,
    /// `(translation_key, language_code)` pairs the backend left out; their
    /// text is the English source
    pub missing: Vec<(String, String)>,
}

impl ConsolidatedOutcome {
    pub fn is_missing(&self, key: &str, language: &str) -> bool {
        self.missing.iter().any(|(k, l)| k == key && l == language)
    }
}

/// A remote translation service. Each method is a single attempt.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Translate `texts` into `target`, one result per text in order.
    async fn request_batch(
        &self,
        texts: &[String],
        target: Language,
        preserve_placeholders: bool,
    ) -> Result<Vec<BackendResult>, BackendError>;

    /// Translate every string leaf of a JSON object, keeping its shape.
    async fn request_json(&self, json: &Value, target: Language) -> Result<Value, BackendError>;

    /// Translate into several languages at once.
    ///
    /// Returns the `translations` object: key → { language code → text }.
    /// The default issues one structural request per language.
    async fn request_consolidated(
        &self,
        request: &ConsolidatedRequest,
    ) -> Result<Map<String, Value>, BackendError> {
        let english = Value::Object(
            request
                .english
                .iter()
                .map(|(key, text)| (key.clone(), Value::String(text.clone())))
                .collect(),
        );

        let mut translations = Map::new();
        for language in &request.target_languages {
            let Value::Object(fields) = self.request_json(&english, *language).await? else {
                return Err(BackendError::Malformed(format!(
                    "{} translation is not a JSON object",
                    language.name()
                )));
            };

            for (key, text) in fields {
                let entry = translations
                    .entry(key)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(per_language) = entry {
                    per_language.insert(language.code().to_string(), text);
                }
            }
        }

        Ok(translations)
    }
}

/// Interpret a batch response body.
///
/// Accepts an array aligned with the request, a single result object (only
/// for a batch of one), or `{ "error": ... }`.
pub fn parse_batch_response(body: Value, expected: usize) -> Result<Vec<BackendResult>, BackendError> {
    match &body {
        Value::Array(items) => {
            if items.len() != expected {
                return Err(BackendError::Malformed(format!(
                    "expected {} results, got {}",
                    expected,
                    items.len()
                )));
            }
            items.iter().map(parse_result_item).collect()
        }
        Value::Object(fields) if fields.contains_key("error") => {
            Err(BackendError::Service(error_message(&fields["error"])))
        }
        Value::Object(_) if expected == 1 => Ok(vec![parse_result_item(&body)?]),
        Value::Object(_) => Err(BackendError::Malformed(format!(
            "single result returned for a batch of {}",
            expected
        ))),
        other => Err(BackendError::Malformed(format!(
            "unexpected response type: {}",
            json_type(other)
        ))),
    }
}

fn parse_result_item(item: &Value) -> Result<BackendResult, BackendError> {
    match item {
        Value::String(text) => Ok(BackendResult::completed(text.clone(), DEFAULT_BACKEND_QUALITY)),
        Value::Object(fields) => {
            let text = fields
                .get("translatedText")
                .and_then(Value::as_str)
                .ok_or_else(|| BackendError::Malformed("result without translatedText".to_string()))?;
            let quality = fields
                .get("qualityScore")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_BACKEND_QUALITY);
            Ok(BackendResult::completed(text, quality))
        }
        other => Err(BackendError::Malformed(format!(
            "unexpected result item: {}",
            json_type(other)
        ))),
    }
}

pub(crate) fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Send a prepared request and decode its JSON body.
///
/// Non-success statuses become [`BackendError::Http`] with the response body.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Value, BackendError> {
    let response = request
        .send()
        .await
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
        return Err(BackendError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let text = response
        .text()
        .await
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;
    serde_json::from_str(&text).map_err(|e| BackendError::Malformed(format!("invalid JSON: {}", e)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether `translated` has exactly the keys of `original`, recursively,
/// with a string wherever the original has a string.
pub fn same_shape(original: &Value, translated: &Value) -> bool {
    match (original, translated) {
        (Value::Object(expected), Value::Object(actual)) => {
            expected.len() == actual.len()
                && expected
                    .iter()
                    .all(|(key, value)| actual.get(key).is_some_and(|other| same_shape(value, other)))
        }
        (Value::String(_), Value::String(_)) => true,
        (expected, actual) => expected == actual,
    }
}

/// Timeout, retry and validation around a [`TranslationBackend`].
#[derive(Clone)]
pub struct BackendAdapter {
    backend: Arc<dyn TranslationBackend>,
    retry: RetryConfig,
    timeout: Duration,
}

impl std::fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendAdapter {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::translation_batch(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn attempt<T>(
        &self,
        request: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }

    /// Translate one batch. Always returns one result per text.
    pub async fn translate_batch(
        &self,
        texts: &[String],
        target: Language,
        preserve_placeholders: bool,
    ) -> Vec<BackendResult> {
        if texts.is_empty() {
            return Vec::new();
        }

        let operation = format!(
            "{} batch of {} to {}",
            self.backend.name(),
            texts.len(),
            target.name()
        );
        let outcome = with_retry_if(
            &self.retry,
            &operation,
            || async {
                let results = self
                    .attempt(self.backend.request_batch(texts, target, preserve_placeholders))
                    .await?;
                if results.len() != texts.len() {
                    return Err(BackendError::Malformed(format!(
                        "expected {} results, got {}",
                        texts.len(),
                        results.len()
                    )));
                }
                Ok(results)
            },
            BackendError::is_retryable,
        )
        .await;

        match outcome {
            Ok(results) => {
                debug!("{}: {} results", operation, results.len());
                results
            }
            Err(e) => {
                error!("{} failed: {}", operation, e);
                let message = e.to_string();
                texts
                    .iter()
                    .map(|text| BackendResult::failed(text.clone(), message.clone()))
                    .collect()
            }
        }
    }

    /// Translate a JSON object, requiring a same-shaped response.
    pub async fn translate_json(&self, json: &Value, target: Language) -> Result<Value, BackendError> {
        let operation = format!("{} JSON translation to {}", self.backend.name(), target.name());
        with_retry_if(
            &self.retry,
            &operation,
            || async {
                let translated = self.attempt(self.backend.request_json(json, target)).await?;
                if !same_shape(json, &translated) {
                    return Err(BackendError::Validation(
                        "translated JSON does not match the source structure".to_string(),
                    ));
                }
                Ok(translated)
            },
            BackendError::is_retryable,
        )
        .await
    }

    /// Translate `english` into every target in one request.
    ///
    /// Gaps in the response are filled with the English text and listed in
    /// [`ConsolidatedOutcome::missing`].
    pub async fn translate_consolidated(
        &self,
        english: &StringTable,
        target_languages: &[Language],
        batch_index: Option<usize>,
        total_batches: Option<usize>,
    ) -> Result<ConsolidatedOutcome, BackendError> {
        let request = ConsolidatedRequest {
            english: english.clone(),
            target_languages: target_languages.to_vec(),
            batch_index,
            total_batches,
        };
        let operation = format!(
            "{} consolidated batch of {} into {} languages",
            self.backend.name(),
            english.len(),
            target_languages.len()
        );

        let raw = with_retry_if(
            &self.retry,
            &operation,
            || async { self.attempt(self.backend.request_consolidated(&request)).await },
            BackendError::is_retryable,
        )
        .await?;

        let outcome = fill_consolidated(english, target_languages, &raw);
        if outcome.missing.is_empty() {
            info!("{}: complete", operation);
        } else {
            warn!(
                "{}: {} translations missing, using English text: {:?}",
                operation,
                outcome.missing.len(),
                outcome.missing
            );
        }
        Ok(outcome)
    }
}

fn fill_consolidated(
    english: &StringTable,
    target_languages: &[Language],
    raw: &Map<String, Value>,
) -> ConsolidatedOutcome {
    let mut outcome = ConsolidatedOutcome::default();

    for (key, source_text) in english {
        let per_language = outcome.translations.entry(key.clone()).or_default();
        for language in target_languages {
            let translated = raw
                .get(key)
                .and_then(|entry| entry.get(language.code()))
                .and_then(Value::as_str);

            match translated {
                Some(text) => {
                    per_language.insert(language.code().to_string(), text.to_string());
                }
                None => {
                    per_language.insert(language.code().to_string(), source_text.clone());
                    outcome.missing.push((key.clone(), language.code().to_string()));
                }
            }
        }
    }

    outcome
}
