//! Loading the string extractor's output.
//!
//! The extractor writes a JSON object of translation key to English text.
//! Nested objects are accepted too and flattened into dotted keys, so
//! `{"button": {"save": "Save"}}` becomes `button.save`.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Ordered translation key → source text mapping.
///
/// Insertion order is the extractor's order and is preserved all the way to
/// batching.
pub type StringTable = IndexMap<String, String>;

/// Read and flatten a source strings file.
pub fn load_source_strings(path: &Path) -> Result<StringTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source strings from {}", path.display()))?;

    let table = parse_source_strings(&raw)
        .with_context(|| format!("Failed to parse source strings in {}", path.display()))?;

    info!("Loaded {} source strings from {}", table.len(), path.display());
    Ok(table)
}

/// Parse a JSON document into a flat, ordered string table.
///
/// Non-string leaves (numbers, booleans, nulls, arrays) are skipped.
pub fn parse_source_strings(raw: &str) -> Result<StringTable> {
    let value: Value = serde_json::from_str(raw).context("Source strings are not valid JSON")?;

    let Value::Object(root) = value else {
        bail!("Source strings must be a JSON object of key to text");
    };

    let mut table = StringTable::new();
    flatten_into(&mut table, None, &root);
    Ok(table)
}

fn flatten_into(table: &mut StringTable, prefix: Option<&str>, object: &serde_json::Map<String, Value>) {
    for (key, value) in object {
        let full_key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::String(text) => {
                table.insert(full_key, text.clone());
            }
            Value::Object(nested) => flatten_into(table, Some(&full_key), nested),
            other => debug!("Skipping non-string value at '{}': {}", full_key, other),
        }
    }
}
