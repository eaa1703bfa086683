//! Translation units and the result store they are persisted to.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Score of a string intentionally left untranslated (code).
pub const UNTRANSLATED_CODE_SCORE: f64 = 1.0;

/// Score of a failed translation.
pub const FAILED_SCORE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Completed,
    Failed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Completed => "completed",
            UnitStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(UnitStatus::Pending),
            "completed" => Ok(UnitStatus::Completed),
            "failed" => Ok(UnitStatus::Failed),
            other => bail!("Unknown translation status: '{}'", other),
        }
    }
}

/// One string in one target language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub translation_key: String,
    pub source_text: String,
    pub target_language: String,
    /// Equals `source_text` for code strings and failures
    pub translated_text: String,
    pub quality_score: f64,
    pub status: UnitStatus,
    pub error_message: Option<String>,
}

impl TranslationUnit {
    pub fn completed(
        key: impl Into<String>,
        source_text: impl Into<String>,
        target_language: impl Into<String>,
        translated_text: impl Into<String>,
        quality_score: f64,
    ) -> Self {
        Self {
            translation_key: key.into(),
            source_text: source_text.into(),
            target_language: target_language.into(),
            translated_text: translated_text.into(),
            quality_score,
            status: UnitStatus::Completed,
            error_message: None,
        }
    }

    /// A string kept as-is because it is code.
    pub fn untranslated_code(
        key: impl Into<String>,
        source_text: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        let source_text = source_text.into();
        Self::completed(
            key,
            source_text.clone(),
            target_language,
            source_text,
            UNTRANSLATED_CODE_SCORE,
        )
    }

    /// A failed string: source text as fallback, score zero.
    pub fn failed(
        key: impl Into<String>,
        source_text: impl Into<String>,
        target_language: impl Into<String>,
        error_message: Option<String>,
    ) -> Self {
        let source_text = source_text.into();
        Self {
            translation_key: key.into(),
            translated_text: source_text.clone(),
            source_text,
            target_language: target_language.into(),
            quality_score: FAILED_SCORE,
            status: UnitStatus::Failed,
            error_message,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == UnitStatus::Completed
    }

    pub fn is_untranslated(&self) -> bool {
        self.translated_text == self.source_text
    }
}

/// Persistent store of translation units, keyed by
/// `(analysis_id, target_language, translation_key)`.
///
/// Writes are upserts: storing a unit twice for the same key replaces the
/// first, so re-runs never duplicate rows.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert_units(&self, analysis_id: &str, units: &[TranslationUnit]) -> Result<()>;

    /// Units of an analysis, ordered by language then key.
    async fn units(
        &self,
        analysis_id: &str,
        language: Option<&str>,
        status: Option<UnitStatus>,
    ) -> Result<Vec<TranslationUnit>>;

    /// Distinct target languages stored for an analysis, sorted.
    async fn languages(&self, analysis_id: &str) -> Result<Vec<String>>;

    /// Change the status and score of one unit. Returns whether a unit matched.
    async fn update_status(
        &self,
        analysis_id: &str,
        language: &str,
        translation_key: &str,
        status: UnitStatus,
        quality_score: f64,
    ) -> Result<bool>;
}
