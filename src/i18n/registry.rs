//! Language registry: Single source of truth for all supported languages.
//!
//! This module provides a centralized registry of all languages the pipeline
//! can translate into. It uses a singleton pattern with `OnceLock` to ensure
//! thread-safe initialization and access.

use std::sync::OnceLock;

/// Configuration for a supported language.
///
/// Contains the metadata the pipeline needs for a specific language: its
/// code, names (the English name is used in LLM prompts) and whether it is
/// the canonical source language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "es", "fr")
    pub code: &'static str,

    /// English name of the language (e.g., "English", "Spanish", "French")
    pub name: &'static str,

    /// Native name of the language (e.g., "English", "Español", "Français")
    pub native_name: &'static str,

    /// Whether this is the canonical/source language (only one should be true)
    pub is_canonical: bool,
}

/// The language every extracted string is written in.
const CANONICAL: LanguageConfig = LanguageConfig {
    code: "en",
    name: "English",
    native_name: "English",
    is_canonical: true,
};

/// Global language registry singleton.
///
/// Initialized once on first access and immutable thereafter.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    ///
    /// # Returns
    /// * `Some(&LanguageConfig)` if the language exists
    /// * `None` if the language is not found
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get the canonical language configuration (the translation source).
    pub fn canonical(&self) -> &LanguageConfig {
        self.languages
            .iter()
            .find(|lang| lang.is_canonical)
            .unwrap_or(&CANONICAL)
    }

    /// Check if a language code is supported.
    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }
}

fn target(code: &'static str, name: &'static str, native_name: &'static str) -> LanguageConfig {
    LanguageConfig {
        code,
        name,
        native_name,
        is_canonical: false,
    }
}

/// Default language configurations.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        CANONICAL,
        target("es", "Spanish", "Español"),
        target("fr", "French", "Français"),
        target("de", "German", "Deutsch"),
        target("it", "Italian", "Italiano"),
        target("pt", "Portuguese", "Português"),
        target("nl", "Dutch", "Nederlands"),
        target("pl", "Polish", "Polski"),
        target("sv", "Swedish", "Svenska"),
        target("da", "Danish", "Dansk"),
        target("fi", "Finnish", "Suomi"),
        target("no", "Norwegian", "Norsk"),
        target("cs", "Czech", "Čeština"),
        target("tr", "Turkish", "Türkçe"),
        target("ru", "Russian", "Русский"),
        target("uk", "Ukrainian", "Українська"),
        target("el", "Greek", "Ελληνικά"),
        target("ar", "Arabic", "العربية"),
        target("he", "Hebrew", "עברית"),
        target("hi", "Hindi", "हिन्दी"),
        target("th", "Thai", "ไทย"),
        target("vi", "Vietnamese", "Tiếng Việt"),
        target("id", "Indonesian", "Bahasa Indonesia"),
        target("ja", "Japanese", "日本語"),
        target("ko", "Korean", "한국어"),
        target("zh", "Chinese", "中文"),
    ]
}
