//! Translation quality validation module.
//!
//! This module checks that a translated string preserves the pieces of the
//! source that must survive translation untouched: interpolation
//! placeholders, inline HTML tags and URLs. Findings are advisory; the
//! pipeline logs them and lowers the quality score but never rejects a
//! translation because of them.

use regex::Regex;
use std::sync::OnceLock;

/// Score deducted for every warning.
const WARNING_PENALTY: f64 = 0.2;

/// Score deducted for every error.
const ERROR_PENALTY: f64 = 0.5;

/// Translations shorter than this fraction of the source look truncated.
const MIN_LENGTH_RATIO: f64 = 0.3;

/// Translations longer than this multiple of the source look padded.
const MAX_LENGTH_RATIO: f64 = 3.5;

/// Sources shorter than this are too small for a meaningful length check.
const LENGTH_CHECK_MIN_CHARS: usize = 12;

/// Validation report containing errors and warnings about a translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Critical errors that indicate translation issues
    pub errors: Vec<String>,

    /// Non-critical warnings about potential issues
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the report has any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check if the report is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }

    /// Lower a backend-reported score by the findings of this report.
    ///
    /// The result is clamped to `[0, 1]`.
    pub fn adjusted_score(&self, base: f64) -> f64 {
        let penalty = self.warnings.len() as f64 * WARNING_PENALTY
            + self.errors.len() as f64 * ERROR_PENALTY;
        (base - penalty).clamp(0.0, 1.0)
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validator for translation quality.
pub struct TranslationValidator;

// Regex patterns for extraction (cached for performance)
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
static HTML_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();

impl TranslationValidator {
    /// Validate that a translation preserves important elements from the source.
    ///
    /// This function checks that:
    /// - the translation is not empty
    /// - interpolation placeholders (`{{name}}`, `{name}`, `%s`, `%1$d`, `${x}`) survive
    /// - inline HTML tags survive
    /// - URLs survive
    /// - the translation length is plausible relative to the source
    ///
    /// Placeholders, tags and URLs are compared as multisets: translations
    /// are free to reorder them.
    pub fn validate(original: &str, translated: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        if translated.trim().is_empty() {
            report.errors.push("Translation is empty".to_string());
            return report;
        }

        let orig_placeholders = Self::extract_placeholders(original);
        let trans_placeholders = Self::extract_placeholders(translated);
        if orig_placeholders != trans_placeholders {
            report.errors.push(format!(
                "Placeholder mismatch: original has {:?}, translation has {:?}",
                orig_placeholders, trans_placeholders
            ));
        }

        let orig_tags = Self::extract_html_tags(original);
        let trans_tags = Self::extract_html_tags(translated);
        if orig_tags != trans_tags {
            report.warnings.push(format!(
                "HTML tag mismatch: original has {:?}, translation has {:?}",
                orig_tags, trans_tags
            ));
        }

        let orig_urls = Self::extract_urls(original);
        let trans_urls = Self::extract_urls(translated);
        if orig_urls != trans_urls {
            report.warnings.push(format!(
                "URL mismatch: original has {} URLs, translation has {} URLs",
                orig_urls.len(),
                trans_urls.len()
            ));
        }

        let orig_len = original.chars().count();
        if orig_len >= LENGTH_CHECK_MIN_CHARS {
            let ratio = translated.chars().count() as f64 / orig_len as f64;
            if !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&ratio) {
                report.warnings.push(format!(
                    "Suspicious length ratio {:.2} (original {} chars)",
                    ratio, orig_len
                ));
            }
        }

        report
    }

    /// Extract interpolation placeholders, sorted
    fn extract_placeholders(text: &str) -> Vec<String> {
        let regex = PLACEHOLDER_REGEX.get_or_init(|| {
            Regex::new(r"\{\{\s*[\w.]+\s*\}\}|\$\{[^}]+\}|\{[\w.]+\}|%(?:\d+\$)?[sdfi@]")
                .expect("placeholder pattern is valid")
        });

        sorted(regex.find_iter(text).map(|m| m.as_str().to_string()))
    }

    /// Extract HTML tags (opening, closing and self-closing), sorted
    fn extract_html_tags(text: &str) -> Vec<String> {
        let regex = HTML_TAG_REGEX.get_or_init(|| {
            Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("tag pattern is valid")
        });

        sorted(regex.find_iter(text).map(|m| m.as_str().to_string()))
    }

    /// Extract all URLs from text, sorted
    fn extract_urls(text: &str) -> Vec<String> {
        let regex = URL_REGEX.get_or_init(|| {
            Regex::new(r#"https?://[^\s)\]"'<>]+"#).expect("url pattern is valid")
        });

        sorted(regex.find_iter(text).map(|m| m.as_str().to_string()))
    }
}

fn sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items
}
