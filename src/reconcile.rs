//! Post-run repair of failed units that were in fact correct.
//!
//! A unit whose stored text equals its source can be marked failed by an
//! earlier run (a backend hiccup on a code string, a store fallback). Those
//! units already hold the right output and are flipped to completed here.

use crate::classifier::is_code_string;
use crate::store::{ResultStore, UnitStatus, UNTRANSLATED_CODE_SCORE};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Score for natural-language text accepted unchanged by reconciliation.
pub const RECONCILED_TEXT_SCORE: f64 = 0.8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Units flipped from failed to completed
    pub fixed: usize,
    /// Units left failed
    pub actual_failures: usize,
    /// Failed units examined
    pub total: usize,
}

pub struct Reconciler {
    store: Arc<dyn ResultStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, analysis_id: &str) -> Result<ReconcileReport> {
        let failed = self
            .store
            .units(analysis_id, None, Some(UnitStatus::Failed))
            .await
            .with_context(|| format!("Failed to load failed units of analysis {}", analysis_id))?;

        let mut report = ReconcileReport {
            total: failed.len(),
            ..Default::default()
        };

        for unit in &failed {
            if !unit.is_untranslated() {
                report.actual_failures += 1;
                continue;
            }

            let score = if is_code_string(&unit.source_text) {
                UNTRANSLATED_CODE_SCORE
            } else {
                RECONCILED_TEXT_SCORE
            };
            let updated = self
                .store
                .update_status(
                    analysis_id,
                    &unit.target_language,
                    &unit.translation_key,
                    UnitStatus::Completed,
                    score,
                )
                .await
                .with_context(|| {
                    format!(
                        "Failed to reconcile '{}' ({})",
                        unit.translation_key, unit.target_language
                    )
                })?;

            if updated {
                debug!(
                    "Reconciled '{}' ({}) with score {:.1}",
                    unit.translation_key, unit.target_language, score
                );
                report.fixed += 1;
            } else {
                report.actual_failures += 1;
            }
        }

        info!(
            "Reconciled analysis {}: {} fixed, {} still failed of {} failed units",
            analysis_id, report.fixed, report.actual_failures, report.total
        );
        Ok(report)
    }
}
