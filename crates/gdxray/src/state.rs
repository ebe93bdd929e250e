//! Per-symbol load state and the sparse record cache.

use ahash::{AHashMap, AHashSet};
use gdxray_source::RecordSource;
use serde::{Deserialize, Serialize};

use crate::catalog::Symbol;
use crate::error::{DatasetError, Result, UnsupportedReason};

/// Index into the dataset's array arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArrayId(pub(crate) usize);

impl ArrayId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Sparse records of one symbol, keyed by label tuple.
///
/// Keys keep insertion order; a repeated key overwrites the earlier value in
/// place. Per dimension, the distinct labels are kept in order of first
/// occurrence.
#[derive(Debug, Clone, Default)]
pub struct SparseRecordCache {
    keys: Vec<Vec<String>>,
    values: Vec<f64>,
    positions: AHashMap<Vec<String>, usize>,
    elements: Vec<Vec<String>>,
    seen: Vec<AHashSet<String>>,
    streamed: usize,
}

impl SparseRecordCache {
    pub fn new(dim: usize) -> Self {
        Self {
            elements: vec![Vec::new(); dim],
            seen: vec![AHashSet::new(); dim],
            ..Default::default()
        }
    }

    pub fn insert(&mut self, labels: Vec<String>, value: f64) {
        self.streamed += 1;
        for (k, label) in labels.iter().enumerate() {
            if self.seen[k].insert(label.clone()) {
                self.elements[k].push(label.clone());
            }
        }
        match self.positions.get(&labels) {
            Some(&pos) => self.values[pos] = value,
            None => {
                self.positions.insert(labels.clone(), self.keys.len());
                self.keys.push(labels);
                self.values.push(value);
            }
        }
    }

    pub fn dim(&self) -> usize {
        self.elements.len()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of records read, duplicates included.
    pub fn streamed(&self) -> usize {
        self.streamed
    }

    /// Distinct labels observed in dimension `k`, in first-occurrence order.
    pub fn elements(&self, k: usize) -> &[String] {
        &self.elements[k]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[String], f64)> {
        self.keys
            .iter()
            .map(Vec::as_slice)
            .zip(self.values.iter().copied())
    }

    /// Value of the last distinct key; the scalar case.
    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Declared,
    DataCached(SparseRecordCache),
    Materialized(ArrayId),
    Skipped,
    Unsupported(UnsupportedReason),
}

impl LoadState {
    pub fn label(&self) -> StateLabel {
        match self {
            LoadState::Declared => StateLabel::Declared,
            LoadState::DataCached(_) => StateLabel::DataCached,
            LoadState::Materialized(_) => StateLabel::Materialized,
            LoadState::Skipped => StateLabel::Skipped,
            LoadState::Unsupported(_) => StateLabel::Unsupported,
        }
    }
}

/// Load state without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateLabel {
    Declared,
    DataCached,
    Materialized,
    Skipped,
    Unsupported,
}

impl StateLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StateLabel::Declared => "declared",
            StateLabel::DataCached => "data_cached",
            StateLabel::Materialized => "materialized",
            StateLabel::Skipped => "skipped",
            StateLabel::Unsupported => "unsupported",
        }
    }
}

/// Stream every record of `symbol` into a fresh cache.
///
/// The catalogue's record count, the count the stream declares and the number
/// of records actually read must all agree.
pub fn stream_into_cache<S: RecordSource>(
    source: &mut S,
    symbol: &Symbol,
) -> Result<SparseRecordCache> {
    let declared = source.start_record_stream(symbol.ordinal)?;
    if declared != symbol.records {
        return Err(DatasetError::integrity(
            &symbol.name,
            format!(
                "catalogue lists {} records but the stream declares {declared}",
                symbol.records
            ),
        ));
    }

    let mut cache = SparseRecordCache::new(symbol.dim);
    loop {
        match source.next_record() {
            Ok(Some(record)) => {
                if record.labels.len() != symbol.dim {
                    return Err(DatasetError::integrity(
                        &symbol.name,
                        format!(
                            "record has {} labels, expected {}",
                            record.labels.len(),
                            symbol.dim
                        ),
                    ));
                }
                let level = record.level();
                cache.insert(record.labels, level);
            }
            Ok(None) => break,
            // The source ran dry exactly where it said it would.
            Err(_) if cache.streamed() == declared => break,
            Err(err) => return Err(err.into()),
        }
    }

    if cache.streamed() != declared {
        return Err(DatasetError::integrity(
            &symbol.name,
            format!(
                "expected {declared} records, streamed {}",
                cache.streamed()
            ),
        ));
    }

    tracing::debug!(
        ordinal = symbol.ordinal,
        name = %symbol.name,
        records = cache.streamed(),
        keys = cache.len(),
        "cached sparse records"
    );
    Ok(cache)
}
