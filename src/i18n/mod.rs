//! Target languages and translation quality bookkeeping.
//!
//! [`LanguageRegistry`] lists every language the pipeline can produce files
//! for, with English as the canonical source. [`Language`] is a validated
//! handle into it; CLI input goes through [`Language::parse_targets`].
//! [`TranslationValidator`] scores backend output against its source and
//! [`TranslationMetrics`] counts cache, backend and code-bypass events for one
//! run.
//!
//! ```rust,ignore
//! use locale_forge::i18n::Language;
//!
//! let targets = Language::parse_targets(&["es", "de"])?;
//! assert_eq!(targets[0].name(), "Spanish");
//! ```

mod language;
mod metrics;
mod registry;
mod validator;

pub use language::Language;
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageConfig, LanguageRegistry};
pub use validator::{TranslationValidator, ValidationReport};
