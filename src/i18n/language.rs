//! Language type: Flexible, validated language representation.

use crate::i18n::{LanguageConfig, LanguageRegistry};
use anyhow::{bail, Result};
use std::fmt;

/// A validated language.
///
/// Only languages present in the registry can be constructed, so every
/// `Language` handed to the pipeline has a known name for prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "en", "es")
    code: &'static str,
}

impl Language {
    pub const ENGLISH: Language = Language { code: "en" };
    pub const SPANISH: Language = Language { code: "es" };
    pub const FRENCH: Language = Language { code: "fr" };
    pub const GERMAN: Language = Language { code: "de" };

    /// Create a Language from a language code string.
    ///
    /// Surrounding whitespace and case are ignored (`" ES "` is Spanish).
    ///
    /// # Example
    /// ```ignore
    /// let spanish = Language::from_code("es")?;
    /// ```
    pub fn from_code(code: &str) -> Result<Language> {
        let normalized = code.trim().to_ascii_lowercase();

        match LanguageRegistry::get().get_by_code(&normalized) {
            Some(config) => Ok(Language { code: config.code }),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// Parse a list of target language codes, rejecting the canonical language
    /// and dropping duplicates while keeping the first-seen order.
    pub fn parse_targets<S: AsRef<str>>(codes: &[S]) -> Result<Vec<Language>> {
        let mut targets = Vec::with_capacity(codes.len());
        for code in codes {
            let language = Language::from_code(code.as_ref())?;
            if language.is_canonical() {
                bail!(
                    "'{}' is the source language and cannot be a translation target",
                    language.code()
                );
            }
            if !targets.contains(&language) {
                targets.push(language);
            }
        }
        Ok(targets)
    }

    /// Get the canonical (source) language.
    pub fn canonical() -> Language {
        let config = LanguageRegistry::get().canonical();
        Language { code: config.code }
    }

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the full language configuration from the registry.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .unwrap_or_else(|| LanguageRegistry::get().canonical())
    }

    /// Get the English name of the language.
    pub fn name(&self) -> &'static str {
        self.config().name
    }

    /// Get the native name of the language.
    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    /// Check if this is the canonical language.
    pub fn is_canonical(&self) -> bool {
        self.config().is_canonical
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Constant Tests ====================

    #[test]
    fn test_english_constant() {
        let english = Language::ENGLISH;
        assert_eq!(english.code(), "en");
        assert_eq!(english.name(), "English");
        assert!(english.is_canonical());
    }

    #[test]
    fn test_spanish_constant() {
        let spanish = Language::SPANISH;
        assert_eq!(spanish.code(), "es");
        assert_eq!(spanish.name(), "Spanish");
        assert!(!spanish.is_canonical());
    }

    #[test]
    fn test_constants_exist_in_registry() {
        for language in [
            Language::ENGLISH,
            Language::SPANISH,
            Language::FRENCH,
            Language::GERMAN,
        ] {
            assert!(LanguageRegistry::get().is_supported(language.code()));
        }
    }

    // ==================== from_code Tests ====================

    #[test]
    fn test_from_code_spanish() {
        let language = Language::from_code("es").expect("Should succeed");
        assert_eq!(language, Language::SPANISH);
    }

    #[test]
    fn test_from_code_normalizes_case_and_whitespace() {
        assert_eq!(Language::from_code(" FR ").ok(), Some(Language::FRENCH));
    }

    #[test]
    fn test_from_code_invalid() {
        let result = Language::from_code("xx");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown"));
    }

    #[test]
    fn test_from_code_empty() {
        assert!(Language::from_code("").is_err());
    }

    // ==================== parse_targets Tests ====================

    #[test]
    fn test_parse_targets_dedupes_in_order() {
        let targets = Language::parse_targets(&["fr", "es", "fr", "de"]).expect("valid codes");
        assert_eq!(
            targets,
            vec![Language::FRENCH, Language::SPANISH, Language::GERMAN]
        );
    }

    #[test]
    fn test_parse_targets_rejects_canonical() {
        let result = Language::parse_targets(&["es", "en"]);
        assert!(result.unwrap_err().to_string().contains("source language"));
    }

    #[test]
    fn test_parse_targets_rejects_unknown() {
        assert!(Language::parse_targets(&["es", "zz"]).is_err());
    }

    // ==================== Trait Tests ====================

    #[test]
    fn test_canonical_returns_english() {
        assert_eq!(Language::canonical(), Language::ENGLISH);
    }

    #[test]
    fn test_display_writes_code() {
        assert_eq!(Language::GERMAN.to_string(), "de");
    }

    #[test]
    fn test_native_name() {
        assert_eq!(Language::SPANISH.native_name(), "Español");
        assert_eq!(Language::GERMAN.native_name(), "Deutsch");
    }
}
