//! Batched machine translation of extracted UI strings.
//!
//! The pipeline partitions a key → English text table into token-bounded
//! batches, leaves code-like strings untouched, sends the rest to a
//! translation backend with retry and backoff, caches what it learns and
//! writes per-language localization files from the result store.

pub mod assemble;
pub mod backend;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod orchestrator;
pub mod partition;
pub mod pipeline;
pub mod rate_limit;
pub mod reconcile;
pub mod retry;
pub mod source;
pub mod store;
