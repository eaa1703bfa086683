use anyhow::{Context, Result};
use clap::Parser;
use locale_forge::cache::SessionCache;
use locale_forge::config::Config;
use locale_forge::db::Database;
use locale_forge::i18n::Language;
use locale_forge::orchestrator::{BatchOrchestrator, ProgressEvent};
use locale_forge::pipeline::{Pipeline, PipelineOptions};
use locale_forge::source::load_source_strings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Translate extracted UI strings into localization files
#[derive(Debug, Parser)]
#[command(name = "locale-forge", version)]
struct Args {
    /// JSON file of translation keys to English text (flat or nested)
    input: PathBuf,

    /// Comma-separated target language codes
    #[arg(short, long, value_delimiter = ',', required = true)]
    languages: Vec<String>,

    /// Analysis identifier; re-using one resumes from cached results
    #[arg(long)]
    analysis_id: Option<String>,

    /// Output directory (overrides OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Request all languages per batch and also write translations.json
    #[arg(long)]
    consolidated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_forge=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let languages = Language::parse_targets(&args.languages)?;
    let strings = load_source_strings(&args.input)?;
    if strings.is_empty() {
        info!("No strings found in {}, nothing to translate", args.input.display());
        return Ok(());
    }
    let analysis_id = args
        .analysis_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    let adapter = config.build_backend()?;
    info!("Using {} backend", adapter.backend_name());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current batch");
            on_signal.cancel();
        }
    });

    let orchestrator = BatchOrchestrator::new(
        adapter,
        Arc::new(SessionCache::new(Arc::new(db.clone()))),
        Arc::new(db.clone()),
    )
    .with_settings(config.orchestrator_settings())
    .with_cancellation(cancel)
    .with_progress(Arc::new(|event: &ProgressEvent| {
        info!(
            "[{}] {}/{} {}",
            event.language,
            event.batch_index + 1,
            event.total_batches,
            event.message
        );
    }));

    let options = PipelineOptions {
        max_parallel_languages: config.max_parallel_languages,
        consolidated: args.consolidated,
        output_dir: Some(args.output_dir.unwrap_or_else(|| config.output_dir.clone())),
    };
    let pipeline = Pipeline::new(Arc::new(orchestrator), Arc::new(db), options);

    let (report, _files) = pipeline.run(&analysis_id, &strings, &languages).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
