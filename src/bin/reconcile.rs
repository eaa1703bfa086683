//! Reconcile a finished analysis and rewrite its localization files.
//!
//! Usage:
//!   cargo run --bin reconcile -- <analysis-id> [output-dir]
//!
//! Reads DATABASE_URL and OUTPUT_DIR like the main binary.

use anyhow::{bail, Context, Result};
use locale_forge::assemble::{write_files, FileAssembler};
use locale_forge::config::Config;
use locale_forge::db::Database;
use locale_forge::i18n::Language;
use locale_forge::reconcile::Reconciler;
use locale_forge::store::ResultStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_forge=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(analysis_id) = args.next() else {
        bail!("Usage: reconcile <analysis-id> [output-dir]");
    };

    let config = Config::from_env()?;
    let output_dir = args.next().map(PathBuf::from).unwrap_or(config.output_dir.clone());

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_url))?,
    );

    let mut languages = Vec::new();
    for code in db.languages(&analysis_id).await? {
        match Language::from_code(&code) {
            Ok(language) => languages.push(language),
            Err(e) => warn!("Skipping stored language '{}': {}", code, e),
        }
    }
    if languages.is_empty() {
        info!("Analysis {} has no stored results", analysis_id);
        return Ok(());
    }

    let report = Reconciler::new(db.clone()).reconcile(&analysis_id).await?;
    let files = FileAssembler::new(db).assemble(&analysis_id, &languages).await;
    write_files(&output_dir, &files)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
