//! Top-level translation job: translate, reconcile, assemble, write.

use crate::assemble::{write_files, FileAssembler, TranslationFile};
use crate::i18n::{Language, MetricsReport};
use crate::orchestrator::{BatchOrchestrator, RunOutcome, RunSummary};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::source::StringTable;
use crate::store::{ResultStore, UnitStatus};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Languages translated at the same time (1 = sequential)
    pub max_parallel_languages: usize,
    /// One multi-language request per batch instead of one per language
    pub consolidated: bool,
    /// Write assembled files here when set
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_parallel_languages: 1,
            consolidated: false,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub analysis_id: String,
    pub runs: Vec<RunSummary>,
    pub reconcile: ReconcileReport,
    pub metrics: MetricsReport,
    /// Final outcome per (key, language) after reconciliation, read back from the store
    pub completed: usize,
    pub failed: usize,
    pub files: Vec<String>,
}

pub struct Pipeline {
    orchestrator: Arc<BatchOrchestrator>,
    store: Arc<dyn ResultStore>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(orchestrator: Arc<BatchOrchestrator>, store: Arc<dyn ResultStore>, options: PipelineOptions) -> Self {
        Self {
            orchestrator,
            store,
            options,
        }
    }

    pub async fn run(
        &self,
        analysis_id: &str,
        strings: &StringTable,
        languages: &[Language],
    ) -> Result<(PipelineReport, Vec<TranslationFile>)> {
        info!(
            "Starting analysis {}: {} strings, languages [{}]",
            analysis_id,
            strings.len(),
            languages.iter().map(|l| l.code()).collect::<Vec<_>>().join(", ")
        );

        let outcomes = if self.options.consolidated {
            self.orchestrator
                .run_consolidated(analysis_id, strings, languages)
                .await
        } else {
            self.run_languages(analysis_id, strings, languages).await
        };
        let runs: Vec<RunSummary> = outcomes.into_iter().map(|o| o.summary).collect();

        let reconcile = Reconciler::new(self.store.clone())
            .reconcile(analysis_id)
            .await
            .context("Reconciliation failed")?;

        let (completed, failed) = self.final_counts(analysis_id, strings, languages).await?;

        let assembler = FileAssembler::new(self.store.clone());
        let mut files = vec![FileAssembler::source_file(strings)];
        files.extend(assembler.assemble(analysis_id, languages).await);
        if self.options.consolidated {
            files.push(assembler.assemble_consolidated(analysis_id, strings, languages).await);
        }

        let mut written = Vec::new();
        if let Some(dir) = &self.options.output_dir {
            written = write_files(dir, &files)?
                .into_iter()
                .map(|p| p.display().to_string())
                .collect();
        }

        let report = PipelineReport {
            analysis_id: analysis_id.to_string(),
            runs,
            reconcile,
            metrics: self.orchestrator.metrics().report(),
            completed,
            failed,
            files: written,
        };
        info!(
            "Analysis {} finished: {} completed, {} failed",
            analysis_id, report.completed, report.failed
        );
        Ok((report, files))
    }

    /// Completed and failed `(key, language)` pairs of this input. A key with no
    /// stored unit (a cancelled run) counts as failed.
    async fn final_counts(
        &self,
        analysis_id: &str,
        strings: &StringTable,
        languages: &[Language],
    ) -> Result<(usize, usize)> {
        let mut completed = 0;
        for language in languages {
            let units = self
                .store
                .units(analysis_id, Some(language.code()), Some(UnitStatus::Completed))
                .await
                .with_context(|| format!("Failed to count results for {}", language.code()))?;
            completed += units
                .iter()
                .filter(|u| strings.contains_key(&u.translation_key))
                .count();
        }
        let total = strings.len() * languages.len();
        Ok((completed, total - completed))
    }

    async fn run_languages(&self, analysis_id: &str, strings: &StringTable, languages: &[Language]) -> Vec<RunOutcome> {
        let parallel = self.options.max_parallel_languages.max(1);
        if parallel == 1 {
            let mut outcomes = Vec::with_capacity(languages.len());
            for language in languages {
                outcomes.push(self.orchestrator.run(analysis_id, strings, *language).await);
            }
            return outcomes;
        }

        let mut outcomes: Vec<(usize, RunOutcome)> = stream::iter(languages.iter().enumerate())
            .map(|(position, language)| async move {
                (position, self.orchestrator.run(analysis_id, strings, *language).await)
            })
            .buffer_unordered(parallel)
            .collect()
            .await;
        outcomes.sort_by_key(|(position, _)| *position);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}
