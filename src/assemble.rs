//! Builds localization files from the result store.

use crate::i18n::Language;
use crate::source::StringTable;
use crate::store::{ResultStore, UnitStatus};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const CONSOLIDATED_FILE_NAME: &str = "translations.json";

/// One output document.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationFile {
    pub file_name: String,
    pub content: Value,
}

impl TranslationFile {
    pub fn entry_count(&self) -> usize {
        self.content.as_object().map_or(0, Map::len)
    }
}

pub struct FileAssembler {
    store: Arc<dyn ResultStore>,
}

impl FileAssembler {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// One flat `<lang>.json` per language, keys sorted.
    ///
    /// A language whose results cannot be read yields an empty document; the
    /// others are unaffected.
    pub async fn assemble(&self, analysis_id: &str, languages: &[Language]) -> Vec<TranslationFile> {
        let mut files = Vec::with_capacity(languages.len());

        for language in languages {
            let entries = match self.completed_texts(analysis_id, language.code()).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!(
                        "Could not assemble {} for analysis {}: {:#}",
                        language.code(),
                        analysis_id,
                        e
                    );
                    BTreeMap::new()
                }
            };
            if entries.is_empty() {
                warn!("No completed translations for {}, writing empty file", language.code());
            }

            let content = Value::Object(
                entries
                    .into_iter()
                    .map(|(key, text)| (key, Value::String(text)))
                    .collect(),
            );
            files.push(TranslationFile {
                file_name: format!("{}.json", language.code()),
                content,
            });
        }

        files
    }

    /// The canonical-language file (`en.json`), taken verbatim from the source table.
    pub fn source_file(source: &StringTable) -> TranslationFile {
        let entries: BTreeMap<&String, &String> = source.iter().collect();
        TranslationFile {
            file_name: format!("{}.json", Language::canonical().code()),
            content: Value::Object(
                entries
                    .into_iter()
                    .map(|(key, text)| (key.clone(), Value::String(text.clone())))
                    .collect(),
            ),
        }
    }

    /// `translations.json` as `{key: {lang: text}}`, with `en` from the source table.
    pub async fn assemble_consolidated(
        &self,
        analysis_id: &str,
        source: &StringTable,
        languages: &[Language],
    ) -> TranslationFile {
        let canonical = Language::canonical();
        let mut merged: BTreeMap<String, Map<String, Value>> = source
            .iter()
            .map(|(key, text)| {
                let mut per_language = Map::new();
                per_language.insert(canonical.code().to_string(), Value::String(text.clone()));
                (key.clone(), per_language)
            })
            .collect();

        for language in languages {
            match self.completed_texts(analysis_id, language.code()).await {
                Ok(entries) => {
                    for (key, text) in entries {
                        merged
                            .entry(key)
                            .or_default()
                            .insert(language.code().to_string(), Value::String(text));
                    }
                }
                Err(e) => error!(
                    "Could not add {} to consolidated file for analysis {}: {:#}",
                    language.code(),
                    analysis_id,
                    e
                ),
            }
        }

        TranslationFile {
            file_name: CONSOLIDATED_FILE_NAME.to_string(),
            content: Value::Object(
                merged
                    .into_iter()
                    .map(|(key, per_language)| (key, Value::Object(per_language)))
                    .collect(),
            ),
        }
    }

    async fn completed_texts(&self, analysis_id: &str, language: &str) -> Result<BTreeMap<String, String>> {
        let units = self
            .store
            .units(analysis_id, Some(language), Some(UnitStatus::Completed))
            .await?;
        Ok(units
            .into_iter()
            .map(|u| (u.translation_key, u.translated_text))
            .collect())
    }
}

/// Write `files` into `dir` as pretty-printed JSON, creating it if needed.
pub fn write_files(dir: &Path, files: &[TranslationFile]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.file_name);
        let mut body = serde_json::to_string_pretty(&file.content)
            .with_context(|| format!("Failed to serialize {}", file.file_name))?;
        body.push('\n');
        std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} ({} keys)", path.display(), file.entry_count());
        written.push(path);
    }
    Ok(written)
}
