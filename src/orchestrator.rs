//! Batch orchestration for one analysis.
//!
//! For every `(analysis_id, target_language)` run the orchestrator
//! partitions the string table, then for each batch in order: serves what it
//! can from the translation cache, keeps code strings untranslated, sends the
//! rest to the backend in a single request, caches new translations and
//! upserts every unit into the result store. A batch that fails for any
//! reason is recorded as failed and the run moves on to the next batch.

use crate::backend::{BackendAdapter, BackendResult, DEFAULT_BACKEND_QUALITY};
use crate::cache::SessionCache;
use crate::classifier::is_code_string;
use crate::i18n::{Language, TranslationMetrics, TranslationValidator};
use crate::partition::{Batch, BatchPartitioner};
use crate::rate_limit::RequestPacer;
use crate::source::StringTable;
use crate::store::{ResultStore, TranslationUnit, UnitStatus};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Score of a consolidated entry the backend left out (English text kept).
pub const MISSING_TRANSLATION_SCORE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub batch_size: usize,
    /// Translations scoring below this are logged as low quality
    pub quality_threshold: f64,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
    /// Minimum spacing between backend requests
    pub min_request_interval: Duration,
    pub preserve_placeholders: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            quality_threshold: 0.8,
            batch_delay: Duration::from_secs(1),
            min_request_interval: Duration::ZERO,
            preserve_placeholders: true,
        }
    }
}

/// Emitted after every batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub analysis_id: String,
    /// Language code, or comma-separated codes for consolidated runs
    pub language: String,
    pub batch_index: usize,
    pub total_batches: usize,
    pub message: String,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Counts for one `(analysis, language)` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub analysis_id: String,
    pub language: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cached: usize,
    pub code_bypassed: usize,
    pub low_quality: usize,
    /// Consolidated entries that fell back to English
    pub fallback: usize,
    pub batches: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub units: Vec<TranslationUnit>,
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchTally {
    cached: usize,
    code_bypassed: usize,
    low_quality: usize,
    fallback: usize,
}

impl BatchTally {
    fn add_to(&self, summary: &mut RunSummary) {
        summary.cached += self.cached;
        summary.code_bypassed += self.code_bypassed;
        summary.low_quality += self.low_quality;
        summary.fallback += self.fallback;
    }
}

pub struct BatchOrchestrator {
    adapter: BackendAdapter,
    cache: Arc<SessionCache>,
    store: Arc<dyn ResultStore>,
    metrics: Arc<TranslationMetrics>,
    settings: OrchestratorSettings,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(adapter: BackendAdapter, cache: Arc<SessionCache>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            adapter,
            cache,
            store,
            metrics: Arc::new(TranslationMetrics::new()),
            settings: OrchestratorSettings::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<TranslationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn metrics(&self) -> &Arc<TranslationMetrics> {
        &self.metrics
    }

    /// Translate `strings` into `language` for `analysis_id`.
    ///
    /// Never fails: batch errors become failed units and are counted in the
    /// summary.
    pub async fn run(&self, analysis_id: &str, strings: &StringTable, language: Language) -> RunOutcome {
        let mut partitioner = BatchPartitioner::new(self.settings.batch_size);
        let batches = partitioner.partition(strings);
        let mut pacer = RequestPacer::new(self.settings.min_request_interval);

        let mut summary = RunSummary {
            analysis_id: analysis_id.to_string(),
            language: language.code().to_string(),
            total: strings.len(),
            batches: batches.len(),
            ..Default::default()
        };
        let mut units = Vec::with_capacity(strings.len());

        info!(
            "Translating {} strings into {} in {} batches (analysis {})",
            strings.len(),
            language.name(),
            batches.len(),
            analysis_id
        );

        for batch in &batches {
            if self.cancel.is_cancelled() {
                warn!(
                    "Run for {} cancelled before batch {}/{}",
                    language.code(),
                    batch.index + 1,
                    batch.total
                );
                summary.cancelled = true;
                break;
            }

            let batch_units = match self.process_batch(analysis_id, batch, language, &mut pacer).await {
                Ok((batch_units, tally)) => {
                    tally.add_to(&mut summary);
                    batch_units
                }
                Err(e) => {
                    error!(
                        "Batch {}/{} for {} failed: {:#}",
                        batch.index + 1,
                        batch.total,
                        language.code(),
                        e
                    );
                    let message = format!("Batch processing failed: {:#}", e);
                    let fallback: Vec<TranslationUnit> = batch
                        .entries
                        .iter()
                        .map(|(key, text)| TranslationUnit::failed(key, text, language.code(), Some(message.clone())))
                        .collect();
                    self.persist_fallback(analysis_id, &fallback).await;
                    fallback
                }
            };

            let done = batch_units.iter().filter(|u| u.is_completed()).count();
            info!(
                "Batch {}/{} ({}) for {}: {}/{} completed",
                batch.index + 1,
                batch.total,
                batch.kind.as_str(),
                language.code(),
                done,
                batch_units.len()
            );
            units.extend(batch_units);

            self.emit(ProgressEvent {
                analysis_id: analysis_id.to_string(),
                language: language.code().to_string(),
                batch_index: batch.index,
                total_batches: batch.total,
                message: format!(
                    "Translated batch {}/{} into {}",
                    batch.index + 1,
                    batch.total,
                    language.name()
                ),
            });

            if batch.index + 1 < batch.total {
                self.pause_between_batches().await;
            }
        }

        finish_summary(&mut summary, &units);
        info!(
            "Finished {} for analysis {}: {} completed, {} failed, {} cached, {} code",
            language.code(),
            analysis_id,
            summary.completed,
            summary.failed,
            summary.cached,
            summary.code_bypassed
        );

        RunOutcome { summary, units }
    }

    async fn process_batch(
        &self,
        analysis_id: &str,
        batch: &Batch,
        language: Language,
        pacer: &mut RequestPacer,
    ) -> Result<(Vec<TranslationUnit>, BatchTally)> {
        let mut tally = BatchTally::default();
        let mut slots: Vec<Option<TranslationUnit>> = vec![None; batch.len()];
        let mut pending = Vec::new();

        for (i, (key, text)) in batch.entries.iter().enumerate() {
            if let Some(unit) = self.resolve_locally(key, text, language, &mut tally).await {
                slots[i] = Some(unit);
            } else {
                pending.push(i);
            }
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|&i| batch.entries[i].1.clone()).collect();

            pacer.wait().await;
            self.metrics.record_api_call();
            let results = self
                .adapter
                .translate_batch(&texts, language, self.settings.preserve_placeholders)
                .await;
            if results.iter().any(|r| !r.is_completed()) {
                self.metrics.record_api_failure();
            }

            for (&i, result) in pending.iter().zip(results) {
                let (key, text) = &batch.entries[i];
                slots[i] = Some(self.accept_result(key, text, language, result, &mut tally).await);
            }
        }

        let units: Vec<TranslationUnit> = slots.into_iter().flatten().collect();
        self.store
            .upsert_units(analysis_id, &units)
            .await
            .context("Failed to store batch results")?;

        Ok((units, tally))
    }

    /// Cache hit or code string: a unit that needs no backend call.
    async fn resolve_locally(
        &self,
        key: &str,
        text: &str,
        language: Language,
        tally: &mut BatchTally,
    ) -> Option<TranslationUnit> {
        if let Some(entry) = self.cache.lookup(text, language.code()).await {
            self.metrics.record_cache_hit();
            tally.cached += 1;
            return Some(TranslationUnit::completed(
                key,
                text,
                language.code(),
                entry.translated_text,
                entry.quality_score,
            ));
        }
        self.metrics.record_cache_miss();

        if is_code_string(text) {
            debug!("Keeping code string '{}' ({}) untranslated", text, key);
            self.metrics.record_code_bypass();
            tally.code_bypassed += 1;
            return Some(TranslationUnit::untranslated_code(key, text, language.code()));
        }

        None
    }

    /// Turn a backend result into a unit, validating and caching real translations.
    async fn accept_result(
        &self,
        key: &str,
        text: &str,
        language: Language,
        result: BackendResult,
        tally: &mut BatchTally,
    ) -> TranslationUnit {
        if !result.is_completed() {
            return TranslationUnit::failed(key, text, language.code(), result.error);
        }

        if result.translated_text == text {
            debug!("'{}' came back unchanged for {}, not caching", key, language.code());
            return TranslationUnit::completed(key, text, language.code(), text, result.quality_score);
        }

        let report = TranslationValidator::validate(text, &result.translated_text);
        let score = report.adjusted_score(result.quality_score);
        if !report.is_clean() {
            debug!(
                "Validation findings for '{}' ({}): errors {:?}, warnings {:?}",
                key,
                language.code(),
                report.errors,
                report.warnings
            );
        }
        if score < self.settings.quality_threshold {
            warn!(
                "Low quality translation for '{}' ({}): score {:.2} below {:.2}",
                key,
                language.code(),
                score,
                self.settings.quality_threshold
            );
            self.metrics.record_low_quality();
            tally.low_quality += 1;
        }

        self.cache
            .store(text, language.code(), &result.translated_text, score)
            .await;
        TranslationUnit::completed(key, text, language.code(), result.translated_text, score)
    }

    /// Translate into every language with one backend request per batch.
    ///
    /// Returns one outcome per language, in the order given.
    pub async fn run_consolidated(
        &self,
        analysis_id: &str,
        strings: &StringTable,
        languages: &[Language],
    ) -> Vec<RunOutcome> {
        let mut partitioner = BatchPartitioner::new(self.settings.batch_size);
        let batches = partitioner.partition(strings);
        let mut pacer = RequestPacer::new(self.settings.min_request_interval);
        let codes: Vec<&str> = languages.iter().map(|l| l.code()).collect();

        let mut outcomes: Vec<RunOutcome> = languages
            .iter()
            .map(|language| RunOutcome {
                summary: RunSummary {
                    analysis_id: analysis_id.to_string(),
                    language: language.code().to_string(),
                    total: strings.len(),
                    batches: batches.len(),
                    ..Default::default()
                },
                units: Vec::with_capacity(strings.len()),
            })
            .collect();

        info!(
            "Translating {} strings into {} in {} consolidated batches (analysis {})",
            strings.len(),
            codes.join(","),
            batches.len(),
            analysis_id
        );

        for batch in &batches {
            if self.cancel.is_cancelled() {
                warn!("Consolidated run cancelled before batch {}/{}", batch.index + 1, batch.total);
                for outcome in &mut outcomes {
                    outcome.summary.cancelled = true;
                }
                break;
            }

            match self
                .process_consolidated_batch(analysis_id, batch, languages, &mut pacer)
                .await
            {
                Ok(per_language) => {
                    for (outcome, (units, tally)) in outcomes.iter_mut().zip(per_language) {
                        tally.add_to(&mut outcome.summary);
                        outcome.units.extend(units);
                    }
                }
                Err(e) => {
                    error!(
                        "Consolidated batch {}/{} failed: {:#}",
                        batch.index + 1,
                        batch.total,
                        e
                    );
                    let message = format!("Batch processing failed: {:#}", e);
                    let mut fallback = Vec::new();
                    for (outcome, language) in outcomes.iter_mut().zip(languages) {
                        let units: Vec<TranslationUnit> = batch
                            .entries
                            .iter()
                            .map(|(key, text)| {
                                TranslationUnit::failed(key, text, language.code(), Some(message.clone()))
                            })
                            .collect();
                        fallback.extend(units.iter().cloned());
                        outcome.units.extend(units);
                    }
                    self.persist_fallback(analysis_id, &fallback).await;
                }
            }

            self.emit(ProgressEvent {
                analysis_id: analysis_id.to_string(),
                language: codes.join(","),
                batch_index: batch.index,
                total_batches: batch.total,
                message: format!(
                    "Translated consolidated batch {}/{} into {} languages",
                    batch.index + 1,
                    batch.total,
                    languages.len()
                ),
            });

            if batch.index + 1 < batch.total {
                self.pause_between_batches().await;
            }
        }

        for outcome in &mut outcomes {
            finish_summary(&mut outcome.summary, &outcome.units);
        }
        outcomes
    }

    async fn process_consolidated_batch(
        &self,
        analysis_id: &str,
        batch: &Batch,
        languages: &[Language],
        pacer: &mut RequestPacer,
    ) -> Result<Vec<(Vec<TranslationUnit>, BatchTally)>> {
        let mut tallies = vec![BatchTally::default(); languages.len()];
        // slots[language][entry]
        let mut slots: Vec<Vec<Option<TranslationUnit>>> = vec![vec![None; batch.len()]; languages.len()];

        let mut needed = StringTable::new();
        let mut needed_languages = Vec::new();
        for (l, language) in languages.iter().enumerate() {
            for (i, (key, text)) in batch.entries.iter().enumerate() {
                match self.resolve_locally(key, text, *language, &mut tallies[l]).await {
                    Some(unit) => slots[l][i] = Some(unit),
                    None => {
                        needed.insert(key.clone(), text.clone());
                        if !needed_languages.contains(language) {
                            needed_languages.push(*language);
                        }
                    }
                }
            }
        }

        if !needed.is_empty() {
            pacer.wait().await;
            self.metrics.record_api_call();
            let response = self
                .adapter
                .translate_consolidated(&needed, &needed_languages, Some(batch.index), Some(batch.total))
                .await;

            match response {
                Ok(outcome) => {
                    for (l, language) in languages.iter().enumerate() {
                        for (i, (key, text)) in batch.entries.iter().enumerate() {
                            if slots[l][i].is_some() {
                                continue;
                            }
                            if outcome.is_missing(key, language.code()) {
                                tallies[l].fallback += 1;
                                slots[l][i] = Some(TranslationUnit::completed(
                                    key,
                                    text,
                                    language.code(),
                                    text,
                                    MISSING_TRANSLATION_SCORE,
                                ));
                                continue;
                            }
                            let translated = outcome
                                .translations
                                .get(key)
                                .and_then(|per_language| per_language.get(language.code()))
                                .cloned()
                                .unwrap_or_else(|| text.clone());
                            let result = BackendResult::completed(translated, DEFAULT_BACKEND_QUALITY);
                            slots[l][i] =
                                Some(self.accept_result(key, text, *language, result, &mut tallies[l]).await);
                        }
                    }
                }
                Err(e) => {
                    error!("Consolidated batch {}/{} request failed: {}", batch.index + 1, batch.total, e);
                    self.metrics.record_api_failure();
                    let message = e.to_string();
                    for (l, language) in languages.iter().enumerate() {
                        for (i, (key, text)) in batch.entries.iter().enumerate() {
                            if slots[l][i].is_none() {
                                slots[l][i] = Some(TranslationUnit::failed(
                                    key,
                                    text,
                                    language.code(),
                                    Some(message.clone()),
                                ));
                            }
                        }
                    }
                }
            }
        }

        let per_language: Vec<(Vec<TranslationUnit>, BatchTally)> = slots
            .into_iter()
            .zip(tallies)
            .map(|(language_slots, tally)| (language_slots.into_iter().flatten().collect(), tally))
            .collect();

        let all: Vec<TranslationUnit> = per_language
            .iter()
            .flat_map(|(units, _)| units.iter().cloned())
            .collect();
        self.store
            .upsert_units(analysis_id, &all)
            .await
            .context("Failed to store consolidated batch results")?;

        Ok(per_language)
    }

    async fn persist_fallback(&self, analysis_id: &str, units: &[TranslationUnit]) {
        if let Err(e) = self.store.upsert_units(analysis_id, units).await {
            error!(
                "Could not persist {} fallback results for analysis {}: {:#}",
                units.len(),
                analysis_id,
                e
            );
        }
    }

    async fn pause_between_batches(&self) {
        let delay = self.settings.batch_delay;
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    fn emit(&self, event: ProgressEvent) {
        debug!("Progress: {}", event.message);
        if let Some(progress) = &self.progress {
            progress(&event);
        }
    }
}

fn finish_summary(summary: &mut RunSummary, units: &[TranslationUnit]) {
    summary.completed = units.iter().filter(|u| u.status == UnitStatus::Completed).count();
    summary.failed = units.iter().filter(|u| u.status == UnitStatus::Failed).count();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TranslationBackend;
    use crate::cache::TranslationCache;
    use crate::db::Database;
    use crate::error::BackendError;
    use crate::retry::RetryConfig;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Prefixes every text with `[code]`; fails any batch containing a poisoned text.
    #[derive(Default)]
    struct FakeBackend {
        requests: Mutex<Vec<Vec<String>>>,
        poisoned: HashSet<String>,
        unchanged: HashSet<String>,
        score: Option<f64>,
        drop_language: Option<&'static str>,
    }

    impl FakeBackend {
        fn translate(&self, text: &str, target: Language) -> String {
            if self.unchanged.contains(text) {
                text.to_string()
            } else {
                format!("[{}] {}", target.code(), text)
            }
        }

        fn sent_texts(&self) -> Vec<String> {
            self.requests.lock().expect("lock").iter().flatten().cloned().collect()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl TranslationBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn request_batch(
            &self,
            texts: &[String],
            target: Language,
            _preserve_placeholders: bool,
        ) -> Result<Vec<BackendResult>, BackendError> {
            self.requests.lock().expect("lock").push(texts.to_vec());
            if texts.iter().any(|t| self.poisoned.contains(t)) {
                return Err(BackendError::Http {
                    status: 500,
                    body: "poisoned batch".to_string(),
                });
            }
            Ok(texts
                .iter()
                .map(|t| BackendResult::completed(self.translate(t, target), self.score.unwrap_or(0.95)))
                .collect())
        }

        async fn request_json(&self, json: &Value, target: Language) -> Result<Value, BackendError> {
            let Value::Object(fields) = json else {
                return Err(BackendError::Malformed("not an object".to_string()));
            };
            self.requests
                .lock()
                .expect("lock")
                .push(fields.values().filter_map(Value::as_str).map(str::to_string).collect());
            if self.drop_language == Some(target.code()) {
                return Ok(Value::Object(Map::new()));
            }
            Ok(Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(self.translate(v.as_str().unwrap_or(""), target))))
                    .collect(),
            ))
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl ResultStore for BrokenStore {
        async fn upsert_units(&self, _analysis_id: &str, _units: &[TranslationUnit]) -> Result<()> {
            anyhow::bail!("disk full")
        }

        async fn units(
            &self,
            _analysis_id: &str,
            _language: Option<&str>,
            _status: Option<UnitStatus>,
        ) -> Result<Vec<TranslationUnit>> {
            Ok(Vec::new())
        }

        async fn languages(&self, _analysis_id: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn update_status(
            &self,
            _analysis_id: &str,
            _language: &str,
            _translation_key: &str,
            _status: UnitStatus,
            _quality_score: f64,
        ) -> Result<bool> {
            Ok(false)
        }
    }

    // ==================== Helper Functions ====================

    fn settings(batch_size: usize) -> OrchestratorSettings {
        OrchestratorSettings {
            batch_size,
            batch_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn table(entries: &[(&str, &str)]) -> StringTable {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn setup(backend: Arc<FakeBackend>, batch_size: usize) -> (BatchOrchestrator, Database) {
        let db = Database::connect_in_memory().await.expect("Should open database");
        let adapter = BackendAdapter::new(backend)
            .with_retry(RetryConfig::new(2, Duration::from_millis(1)));
        let cache = Arc::new(SessionCache::new(Arc::new(db.clone())));
        let orchestrator = BatchOrchestrator::new(adapter, cache, Arc::new(db.clone()))
            .with_settings(settings(batch_size));
        (orchestrator, db)
    }

    fn unit<'a>(units: &'a [TranslationUnit], key: &str) -> &'a TranslationUnit {
        units
            .iter()
            .find(|u| u.translation_key == key)
            .expect("Unit should exist")
    }

    // ==================== Single Language Tests ====================

    #[tokio::test]
    async fn test_code_strings_bypass_backend() {
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, db) = setup(backend.clone(), 50).await;
        let strings = table(&[("button.save", "Save"), ("css.btn-primary", "btn-primary")]);

        let outcome = orchestrator.run("a1", &strings, Language::SPANISH).await;

        assert_eq!(backend.sent_texts(), vec!["Save".to_string()]);
        let code = unit(&outcome.units, "css.btn-primary");
        assert_eq!(code.status, UnitStatus::Completed);
        assert_eq!(code.translated_text, "btn-primary");
        assert_eq!(code.quality_score, 1.0);
        assert_eq!(unit(&outcome.units, "button.save").translated_text, "[es] Save");

        assert_eq!(outcome.summary.completed, 2);
        assert_eq!(outcome.summary.code_bypassed, 1);
        assert_eq!(db.units("a1", Some("es"), None).await.expect("Should load").len(), 2);
    }

    #[tokio::test]
    async fn test_units_keep_input_order() {
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, _db) = setup(backend, 2).await;
        let strings = table(&[("z", "Zebra"), ("a", "Apple"), ("m", "Mango")]);

        let outcome = orchestrator.run("a1", &strings, Language::FRENCH).await;
        let keys: Vec<_> = outcome.units.iter().map(|u| u.translation_key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_failing_batches_do_not_stop_the_run() {
        let backend = Arc::new(FakeBackend {
            poisoned: HashSet::from(["Cancel".to_string(), "Delete".to_string()]),
            ..Default::default()
        });
        let (orchestrator, db) = setup(backend, 2).await;
        // Batches: [Save, Cancel] [Open, Close] [Delete, Rename]
        let strings = table(&[
            ("k1", "Save"),
            ("k2", "Cancel"),
            ("k3", "Open"),
            ("k4", "Close"),
            ("k5", "Delete"),
            ("k6", "Rename"),
        ]);

        let outcome = orchestrator.run("a1", &strings, Language::SPANISH).await;

        assert_eq!(outcome.summary.batches, 3);
        assert_eq!(outcome.summary.completed, 2);
        assert_eq!(outcome.summary.failed, 4);
        assert_eq!(unit(&outcome.units, "k3").translated_text, "[es] Open");
        let failed = unit(&outcome.units, "k1");
        assert_eq!(failed.status, UnitStatus::Failed);
        assert_eq!(failed.translated_text, "Save");
        assert!(failed.error_message.as_deref().is_some_and(|e| e.contains("poisoned")));

        let stored_failures = db
            .units("a1", Some("es"), Some(UnitStatus::Failed))
            .await
            .expect("Should load");
        assert_eq!(stored_failures.len(), 4);
        assert_eq!(orchestrator.metrics().api_failures(), 2);
    }

    #[tokio::test]
    async fn test_cached_strings_skip_backend() {
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, db) = setup(backend.clone(), 50).await;
        db.put("Save", "es", "Guardar", 0.97).await.expect("Should seed cache");

        let outcome = orchestrator
            .run("a1", &table(&[("k1", "Save"), ("k2", "Cancel")]), Language::SPANISH)
            .await;

        assert_eq!(backend.sent_texts(), vec!["Cancel".to_string()]);
        assert_eq!(unit(&outcome.units, "k1").translated_text, "Guardar");
        assert_eq!(unit(&outcome.units, "k1").quality_score, 0.97);
        assert_eq!(outcome.summary.cached, 1);
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, db) = setup(backend.clone(), 50).await;
        let strings = table(&[("k1", "Save"), ("k2", "Cancel")]);

        orchestrator.run("a1", &strings, Language::SPANISH).await;
        let second = orchestrator.run("a1", &strings, Language::SPANISH).await;

        assert_eq!(backend.request_count(), 1);
        assert_eq!(second.summary.cached, 2);
        assert_eq!(db.units("a1", None, None).await.expect("Should load").len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_translation_is_not_cached() {
        let backend = Arc::new(FakeBackend {
            unchanged: HashSet::from(["Email".to_string()]),
            ..Default::default()
        });
        let (orchestrator, db) = setup(backend, 50).await;

        let outcome = orchestrator
            .run("a1", &table(&[("form.email", "Email")]), Language::GERMAN)
            .await;

        assert_eq!(outcome.units[0].status, UnitStatus::Completed);
        assert_eq!(outcome.units[0].translated_text, "Email");
        assert!(db.get("Email", "de").await.expect("Should read").is_none());
    }

    #[tokio::test]
    async fn test_low_quality_is_counted_but_kept() {
        let backend = Arc::new(FakeBackend {
            score: Some(0.5),
            ..Default::default()
        });
        let (orchestrator, db) = setup(backend, 50).await;

        let outcome = orchestrator
            .run("a1", &table(&[("k", "Save")]), Language::SPANISH)
            .await;

        assert_eq!(outcome.summary.low_quality, 1);
        assert_eq!(outcome.units[0].status, UnitStatus::Completed);
        assert!(db.get("Save", "es").await.expect("Should read").is_some());
    }

    #[tokio::test]
    async fn test_store_failure_marks_batch_failed_and_continues() {
        let backend = Arc::new(FakeBackend::default());
        let db = Database::connect_in_memory().await.expect("Should open database");
        let orchestrator = BatchOrchestrator::new(
            BackendAdapter::new(backend.clone()),
            Arc::new(SessionCache::new(Arc::new(db))),
            Arc::new(BrokenStore),
        )
        .with_settings(settings(1));

        let outcome = orchestrator
            .run("a1", &table(&[("k1", "Save"), ("k2", "Cancel")]), Language::SPANISH)
            .await;

        assert_eq!(backend.request_count(), 2);
        assert_eq!(outcome.summary.failed, 2);
        assert!(outcome.units.iter().all(|u| u
            .error_message
            .as_deref()
            .is_some_and(|e| e.contains("disk full"))));
    }

    #[tokio::test]
    async fn test_progress_event_per_batch() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, _db) = setup(backend, 1).await;
        let orchestrator = orchestrator.with_progress(Arc::new(move |event: &ProgressEvent| {
            sink.lock().expect("lock").push(event.clone());
        }));

        orchestrator
            .run("a1", &table(&[("k1", "Save"), ("k2", "Cancel"), ("k3", "Open")]), Language::SPANISH)
            .await;

        let events = events.lock().expect("lock");
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].batch_index, 2);
        assert!(events.iter().all(|e| e.total_batches == 3 && e.language == "es"));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_between_batches() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let trigger = cancel.clone();
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, _db) = setup(backend.clone(), 1).await;
        let orchestrator = orchestrator
            .with_cancellation(cancel)
            .with_progress(Arc::new(move |_event: &ProgressEvent| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    trigger.cancel();
                }
            }));

        let outcome = orchestrator
            .run("a1", &table(&[("k1", "Save"), ("k2", "Cancel"), ("k3", "Open")]), Language::SPANISH)
            .await;

        assert!(outcome.summary.cancelled);
        assert_eq!(outcome.units.len(), 1);
        assert_eq!(backend.request_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ==================== Consolidated Tests ====================

    #[tokio::test]
    async fn test_consolidated_run_covers_every_language() {
        let backend = Arc::new(FakeBackend::default());
        let (orchestrator, db) = setup(backend, 50).await;
        let strings = table(&[("button.save", "Save"), ("css.flex", "flex-col")]);

        let outcomes = orchestrator
            .run_consolidated("a1", &strings, &[Language::SPANISH, Language::GERMAN])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].summary.language, "de");
        assert_eq!(unit(&outcomes[1].units, "button.save").translated_text, "[de] Save");
        assert_eq!(unit(&outcomes[0].units, "css.flex").translated_text, "flex-col");
        assert_eq!(outcomes[0].summary.code_bypassed, 1);
        assert_eq!(db.languages("a1").await.expect("Should list"), vec!["de", "es"]);
    }

    #[tokio::test]
    async fn test_consolidated_missing_language_falls_back_to_english() {
        let backend = Arc::new(FakeBackend {
            drop_language: Some("fr"),
            ..Default::default()
        });
        let (orchestrator, db) = setup(backend, 50).await;

        let outcomes = orchestrator
            .run_consolidated("a1", &table(&[("k", "Save")]), &[Language::SPANISH, Language::FRENCH])
            .await;

        let french = &outcomes[1];
        assert_eq!(french.summary.fallback, 1);
        assert_eq!(french.units[0].translated_text, "Save");
        assert_eq!(french.units[0].quality_score, MISSING_TRANSLATION_SCORE);
        assert!(db.get("Save", "fr").await.expect("Should read").is_none());
        assert_eq!(outcomes[0].summary.fallback, 0);
    }
}
