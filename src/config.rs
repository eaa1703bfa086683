use crate::backend::{BackendAdapter, OpenAiBackend, ServiceBackend, TranslationBackend};
use crate::orchestrator::OrchestratorSettings;
use crate::retry::RetryConfig;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which translation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// JSON translation service
    Service,
    /// OpenAI chat completions
    OpenAi,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "service" => Ok(Provider::Service),
            "openai" => Ok(Provider::OpenAi),
            other => bail!("Unknown TRANSLATION_PROVIDER '{}' (expected 'service' or 'openai')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Backend
    pub provider: Provider,
    pub translation_api_url: Option<String>,
    pub translation_api_key: Option<String>,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // Storage
    pub database_url: String,

    // Batching
    pub batch_size: usize,
    pub quality_threshold: f64,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub min_request_interval_ms: u64,
    pub max_parallel_languages: usize,

    // Output
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var("TRANSLATION_PROVIDER")
            .unwrap_or_else(|_| "service".to_string())
            .parse()?;

        let config = Self {
            provider,
            translation_api_url: optional_var("TRANSLATION_API_URL"),
            translation_api_key: optional_var("TRANSLATION_API_KEY"),

            openai_api_key: optional_var("OPENAI_API_KEY"),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),

            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://locale-forge.db".to_string()),

            batch_size: parsed_var("BATCH_SIZE", 50)?,
            quality_threshold: parsed_var("QUALITY_THRESHOLD", 0.8)?,
            batch_delay_ms: parsed_var("BATCH_DELAY_MS", 1000)?,
            request_timeout_secs: parsed_var("REQUEST_TIMEOUT_SECS", 60)?,
            max_retries: parsed_var("MAX_RETRIES", 3)?,
            min_request_interval_ms: parsed_var("MIN_REQUEST_INTERVAL_MS", 0)?,
            max_parallel_languages: parsed_var("MAX_PARALLEL_LANGUAGES", 1)?,

            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("locales")),
        };

        if !(0.0..=1.0).contains(&config.quality_threshold) {
            bail!(
                "QUALITY_THRESHOLD must be between 0 and 1, got {}",
                config.quality_threshold
            );
        }
        if config.batch_size == 0 {
            bail!("BATCH_SIZE must be at least 1");
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        let default = RetryConfig::translation_batch();
        RetryConfig {
            max_attempts: self.max_retries.max(1),
            ..default
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            batch_size: self.batch_size,
            quality_threshold: self.quality_threshold,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            min_request_interval: Duration::from_millis(self.min_request_interval_ms),
            ..Default::default()
        }
    }

    /// Construct the configured backend wrapped in the retrying adapter.
    pub fn build_backend(&self) -> Result<BackendAdapter> {
        let backend: Arc<dyn TranslationBackend> = match self.provider {
            Provider::Service => {
                let url = self
                    .translation_api_url
                    .as_deref()
                    .context("TRANSLATION_API_URL not set")?;
                Arc::new(ServiceBackend::new(
                    url,
                    self.translation_api_key.clone(),
                    self.request_timeout(),
                )?)
            }
            Provider::OpenAi => {
                let key = self
                    .openai_api_key
                    .as_deref()
                    .context("OPENAI_API_KEY not set")?;
                Arc::new(OpenAiBackend::new(
                    &self.openai_api_url,
                    key,
                    &self.openai_model,
                    self.request_timeout(),
                )?)
            }
        };

        Ok(BackendAdapter::new(backend)
            .with_retry(self.retry_config())
            .with_timeout(self.request_timeout()))
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "TRANSLATION_PROVIDER",
        "TRANSLATION_API_URL",
        "TRANSLATION_API_KEY",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_API_URL",
        "DATABASE_URL",
        "BATCH_SIZE",
        "QUALITY_THRESHOLD",
        "BATCH_DELAY_MS",
        "REQUEST_TIMEOUT_SECS",
        "MAX_RETRIES",
        "MIN_REQUEST_INTERVAL_MS",
        "MAX_PARALLEL_LANGUAGES",
        "OUTPUT_DIR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    // ==================== Defaults Tests ====================

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().expect("Should load defaults");

        assert_eq!(config.provider, Provider::Service);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.database_url, "sqlite://locale-forge.db");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.quality_threshold, 0.8);
        assert_eq!(config.batch_delay_ms, 1000);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_config().max_attempts, 3);
        assert_eq!(config.max_parallel_languages, 1);
        assert_eq!(config.output_dir, PathBuf::from("locales"));
        assert!(config.translation_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("TRANSLATION_PROVIDER", "OpenAI");
        std::env::set_var("BATCH_SIZE", "20");
        std::env::set_var("BATCH_DELAY_MS", "250");
        std::env::set_var("MAX_RETRIES", "5");

        let config = Config::from_env().expect("Should load");
        clear_env();

        assert_eq!(config.provider, Provider::OpenAi);
        let settings = config.orchestrator_settings();
        assert_eq!(settings.batch_size, 20);
        assert_eq!(settings.batch_delay, Duration::from_millis(250));
        assert_eq!(config.retry_config().max_attempts, 5);
    }

    // ==================== Validation Tests ====================

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        clear_env();
        std::env::set_var("BATCH_SIZE", "lots");
        let result = Config::from_env();
        clear_env();

        let message = result.expect_err("Should reject").to_string();
        assert!(message.contains("BATCH_SIZE"));
    }

    #[test]
    #[serial]
    fn test_threshold_out_of_range_is_rejected() {
        clear_env();
        std::env::set_var("QUALITY_THRESHOLD", "1.5");
        let result = Config::from_env();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_unknown_provider_is_rejected() {
        clear_env();
        std::env::set_var("TRANSLATION_PROVIDER", "babelfish");
        let result = Config::from_env();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_build_backend_requires_service_url() {
        clear_env();
        let config = Config::from_env().expect("Should load");
        let error = config.build_backend().expect_err("Should require URL");
        assert!(error.to_string().contains("TRANSLATION_API_URL"));
    }

    #[test]
    #[serial]
    fn test_build_backend_openai() {
        clear_env();
        std::env::set_var("TRANSLATION_PROVIDER", "openai");
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let config = Config::from_env().expect("Should load");
        clear_env();

        let adapter = config.build_backend().expect("Should build");
        assert_eq!(adapter.backend_name(), "openai");
    }
}
