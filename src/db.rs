use crate::cache::{CacheEntry, TranslationCache};
use crate::store::{ResultStore, TranslationUnit, UnitStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite-backed translation cache and result store.
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

type UnitRow = (String, String, String, String, f64, String, Option<String>);

impl Database {
    /// Open (creating if needed) the database at `url` and create tables.
    ///
    /// Accepts `sqlite://path/to/file.db` or `sqlite::memory:` URLs.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {}", url))?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready at {}", url);
        Ok(db)
    }

    /// A private in-memory database, mostly for tests and dry runs.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_text TEXT NOT NULL,
                target_language TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                quality_score REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (source_text, target_language)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create translation_cache table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                analysis_id TEXT NOT NULL,
                language_code TEXT NOT NULL,
                translation_key TEXT NOT NULL,
                source_text TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                quality_score REAL NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE (analysis_id, language_code, translation_key)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create translation_results table")?;

        Ok(())
    }
}

fn unit_from_row(row: UnitRow) -> Result<TranslationUnit> {
    let (translation_key, source_text, target_language, translated_text, quality_score, status, error_message) =
        row;

    Ok(TranslationUnit {
        translation_key,
        source_text,
        target_language,
        translated_text,
        quality_score,
        status: status.parse()?,
        error_message,
    })
}

#[async_trait]
impl TranslationCache for Database {
    async fn get(&self, source_text: &str, target_language: &str) -> Result<Option<CacheEntry>> {
        let row: Option<(String, f64)> = sqlx::query_as(
            "SELECT translated_text, quality_score FROM translation_cache
             WHERE source_text = ? AND target_language = ?",
        )
        .bind(source_text)
        .bind(target_language)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read translation cache")?;

        Ok(row.map(|(translated_text, quality_score)| CacheEntry {
            translated_text,
            quality_score,
        }))
    }

    async fn put(
        &self,
        source_text: &str,
        target_language: &str,
        translated_text: &str,
        quality_score: f64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO translation_cache
                (source_text, target_language, translated_text, quality_score, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (source_text, target_language) DO UPDATE SET
                translated_text = excluded.translated_text,
                quality_score = excluded.quality_score,
                updated_at = excluded.updated_at",
        )
        .bind(source_text)
        .bind(target_language)
        .bind(translated_text)
        .bind(quality_score)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to write translation cache")?;

        Ok(())
    }
}

#[async_trait]
impl ResultStore for Database {
    async fn upsert_units(&self, analysis_id: &str, units: &[TranslationUnit]) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start result transaction")?;

        for unit in units {
            sqlx::query(
                "INSERT INTO translation_results
                    (analysis_id, language_code, translation_key, source_text, translated_text,
                     quality_score, status, error_message, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (analysis_id, language_code, translation_key) DO UPDATE SET
                    source_text = excluded.source_text,
                    translated_text = excluded.translated_text,
                    quality_score = excluded.quality_score,
                    status = excluded.status,
                    error_message = excluded.error_message,
                    updated_at = excluded.updated_at",
            )
            .bind(analysis_id)
            .bind(&unit.target_language)
            .bind(&unit.translation_key)
            .bind(&unit.source_text)
            .bind(&unit.translated_text)
            .bind(unit.quality_score)
            .bind(unit.status.as_str())
            .bind(unit.error_message.as_deref())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store result for '{}'", unit.translation_key))?;
        }

        tx.commit().await.context("Failed to commit results")?;
        debug!("Stored {} results for analysis {}", units.len(), analysis_id);
        Ok(())
    }

    async fn units(
        &self,
        analysis_id: &str,
        language: Option<&str>,
        status: Option<UnitStatus>,
    ) -> Result<Vec<TranslationUnit>> {
        let status = status.map(|s| s.as_str());
        let rows: Vec<UnitRow> = sqlx::query_as(
            "SELECT translation_key, source_text, language_code, translated_text,
                    quality_score, status, error_message
             FROM translation_results
             WHERE analysis_id = ?
               AND (? IS NULL OR language_code = ?)
               AND (? IS NULL OR status = ?)
             ORDER BY language_code, translation_key",
        )
        .bind(analysis_id)
        .bind(language)
        .bind(language)
        .bind(status)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load results for analysis {}", analysis_id))?;

        rows.into_iter().map(unit_from_row).collect()
    }

    async fn languages(&self, analysis_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT language_code FROM translation_results
             WHERE analysis_id = ? ORDER BY language_code",
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list languages for analysis {}", analysis_id))?;

        Ok(rows.into_iter().map(|(code,)| code).collect())
    }

    async fn update_status(
        &self,
        analysis_id: &str,
        language: &str,
        translation_key: &str,
        status: UnitStatus,
        quality_score: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE translation_results
             SET status = ?, quality_score = ?, updated_at = ?,
                 error_message = CASE WHEN ? = 'completed' THEN NULL ELSE error_message END
             WHERE analysis_id = ? AND language_code = ? AND translation_key = ?",
        )
        .bind(status.as_str())
        .bind(quality_score)
        .bind(Utc::now().to_rfc3339())
        .bind(status.as_str())
        .bind(analysis_id)
        .bind(language)
        .bind(translation_key)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update status of '{}'", translation_key))?;

        Ok(result.rows_affected() > 0)
    }
}
