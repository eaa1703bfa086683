//! Batch partitioning of a string table into LLM-sized requests.
//!
//! Large tables are split into ordered batches bounded by an adaptive size.
//! Entries with very long keys cost more prompt tokens per entry, so they are
//! grouped separately with a smaller budget and dispatched first.

use crate::source::StringTable;
use tracing::debug;

/// Keys longer than this many characters go into long-key batches.
pub const LONG_KEY_THRESHOLD: usize = 50;

/// Fraction of long keys above which the batch size is reduced.
const LONG_KEY_FRACTION_LIMIT: f64 = 0.3;

/// Average estimated tokens per entry above which the batch size is reduced.
const AVERAGE_TOKEN_LIMIT: f64 = 50.0;

/// Multiplier applied to the base size when reducing.
const REDUCTION_FACTOR: f64 = 0.6;

/// Floor of a reduced batch size.
const MIN_REDUCED_BATCH_SIZE: usize = 25;

/// Share of the batch size given to each long-key batch.
const LONG_KEY_BUDGET_FACTOR: f64 = 0.3;

/// Floor of the long-key sub-budget.
const MIN_LONG_KEY_BATCH_SIZE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Normal,
    LongKeys,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Normal => "normal",
            BatchKind::LongKeys => "long-keys",
        }
    }
}

/// One ordered group of `(translation_key, source_text)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Zero-based position among all batches of the run
    pub index: usize,
    pub total: usize,
    pub kind: BatchKind,
    pub entries: Vec<(String, String)>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|(_, text)| text.clone()).collect()
    }
}

/// Sizing decisions made for the most recent partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionPlan {
    pub entry_count: usize,
    pub base_batch_size: usize,
    pub batch_size: usize,
    pub long_key_batch_size: usize,
    pub long_key_count: usize,
    pub average_tokens: f64,
    pub reduced: bool,
    pub long_key_batches: usize,
    pub normal_batches: usize,
}

/// Rough prompt-token estimate of one entry: a quarter of its characters.
pub fn estimate_tokens(key: &str, text: &str) -> usize {
    (key.chars().count() + text.chars().count()).div_ceil(4)
}

/// Stateful partitioner owned by a single run.
///
/// Keeps the plan of its last partition for progress logging and summaries.
#[derive(Debug, Clone)]
pub struct BatchPartitioner {
    base_batch_size: usize,
    last_plan: Option<PartitionPlan>,
}

impl BatchPartitioner {
    pub fn new(base_batch_size: usize) -> Self {
        Self {
            base_batch_size: base_batch_size.max(1),
            last_plan: None,
        }
    }

    pub fn last_plan(&self) -> Option<&PartitionPlan> {
        self.last_plan.as_ref()
    }

    /// Split the table into batches, long-key batches first.
    pub fn partition(&mut self, entries: &StringTable) -> Vec<Batch> {
        let mut plan = self.plan(entries);

        let (long, normal): (Vec<_>, Vec<_>) = entries
            .iter()
            .map(|(key, text)| (key.clone(), text.clone()))
            .partition(|(key, _)| key.chars().count() > LONG_KEY_THRESHOLD);

        let mut groups: Vec<(BatchKind, Vec<(String, String)>)> = Vec::new();
        for chunk in long.chunks(plan.long_key_batch_size) {
            groups.push((BatchKind::LongKeys, chunk.to_vec()));
        }
        plan.long_key_batches = groups.len();
        for chunk in normal.chunks(plan.batch_size) {
            groups.push((BatchKind::Normal, chunk.to_vec()));
        }
        plan.normal_batches = groups.len() - plan.long_key_batches;

        let total = groups.len();
        let batches: Vec<Batch> = groups
            .into_iter()
            .enumerate()
            .map(|(index, (kind, entries))| Batch {
                index,
                total,
                kind,
                entries,
            })
            .collect();

        debug!(
            "Partitioned {} entries into {} batches (size {}, long-key size {}, {} long keys, avg {:.1} tokens)",
            plan.entry_count,
            total,
            plan.batch_size,
            plan.long_key_batch_size,
            plan.long_key_count,
            plan.average_tokens
        );

        self.last_plan = Some(plan);
        batches
    }

    fn plan(&self, entries: &StringTable) -> PartitionPlan {
        let entry_count = entries.len();
        let long_key_count = entries
            .keys()
            .filter(|key| key.chars().count() > LONG_KEY_THRESHOLD)
            .count();

        let (average_tokens, long_key_fraction) = if entry_count == 0 {
            (0.0, 0.0)
        } else {
            let total_tokens: usize = entries
                .iter()
                .map(|(key, text)| estimate_tokens(key, text))
                .sum();
            (
                total_tokens as f64 / entry_count as f64,
                long_key_count as f64 / entry_count as f64,
            )
        };

        let base = self.base_batch_size;
        let reduced =
            long_key_fraction > LONG_KEY_FRACTION_LIMIT || average_tokens > AVERAGE_TOKEN_LIMIT;
        let batch_size = if reduced {
            scaled(base, REDUCTION_FACTOR, MIN_REDUCED_BATCH_SIZE)
        } else {
            base
        };
        let long_key_batch_size = scaled(batch_size, LONG_KEY_BUDGET_FACTOR, MIN_LONG_KEY_BATCH_SIZE);

        PartitionPlan {
            entry_count,
            base_batch_size: base,
            batch_size,
            long_key_batch_size,
            long_key_count,
            average_tokens,
            reduced,
            long_key_batches: 0,
            normal_batches: 0,
        }
    }
}

/// `max(floor, floor(size * factor))`, never larger than `size` itself.
fn scaled(size: usize, factor: f64, floor: usize) -> usize {
    let scaled = (size as f64 * factor).floor() as usize;
    scaled.max(floor).min(size).max(1)
}

/// Partition with a throwaway partitioner.
pub fn partition(entries: &StringTable, base_batch_size: usize) -> Vec<Batch> {
    BatchPartitioner::new(base_batch_size).partition(entries)
}
