//! Record sources for gdxray
//!
//! A record source is the opaque collaborator that knows how a symbol
//! container is laid out on disk. The core only ever talks to it through the
//! [`RecordSource`] trait:
//!
//! - container-level metadata (`file_info`, `container_info`),
//! - per-symbol metadata (`symbol_info`, `symbol_info_extended`,
//!   `symbol_domain`),
//! - a single-cursor sparse record stream (`start_record_stream`,
//!   `next_record`).
//!
//! Ordinal `0` is always the universal set `*`. Ordinals `1..=symbol_count`
//! are the declared symbols, in declaration order.
//!
//! This crate ships one concrete source: [`DumpSource`], backed by the
//! line-oriented GDX text dump format parsed in [`dump`].

pub mod digest;
pub mod dump;
mod dump_source;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use dump::{parse_dump, ContainerDump, DeclKind, DumpParseError, SymbolDecl};
pub use dump_source::DumpSource;

/// GAMS-style numeric codes shared by every record source.
pub mod codes {
    pub const DT_SET: i32 = 0;
    pub const DT_PAR: i32 = 1;
    pub const DT_VAR: i32 = 2;
    pub const DT_EQU: i32 = 3;
    pub const DT_ALIAS: i32 = 4;

    pub const VT_UNKNOWN: i32 = 0;
    pub const VT_BINARY: i32 = 1;
    pub const VT_INTEGER: i32 = 2;
    pub const VT_POSITIVE: i32 = 3;
    pub const VT_NEGATIVE: i32 = 4;
    pub const VT_FREE: i32 = 5;
    pub const VT_SOS1: i32 = 6;
    pub const VT_SOS2: i32 = 7;
    pub const VT_SEMICONT: i32 = 8;
    pub const VT_SEMIINT: i32 = 9;

    /// Slots of a record's value bundle.
    pub const VAL_LEVEL: usize = 0;
    pub const VAL_MARGINAL: usize = 1;
    pub const VAL_LOWER: usize = 2;
    pub const VAL_UPPER: usize = 3;
    pub const VAL_SCALE: usize = 4;
    pub const VAL_SLOTS: usize = 5;

    /// Special values as the GDX API reports them. They are finite so that a
    /// record holding one never reads as a missing cell.
    pub const SV_UNDF: f64 = 1.0e300;
    pub const SV_NA: f64 = 2.0e300;
}

/// Name of the implicit universal set at ordinal 0.
pub const UNIVERSE_NAME: &str = "*";

/// Description reported for the universal set.
pub const UNIVERSE_DESCRIPTION: &str = "Universe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub format_version: String,
    pub producer: String,
    /// Content digest of the container, when the source has the raw bytes.
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Number of declared symbols, not counting the universal set.
    pub symbol_count: usize,
    /// Number of unique element labels (the size of the universal set).
    pub element_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub dim: usize,
    pub kind_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfoExt {
    pub record_count: usize,
    pub subtype_code: i32,
    pub description: String,
}

/// One sparse observation: a label tuple and its value bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub labels: Vec<String>,
    pub values: [f64; codes::VAL_SLOTS],
}

impl Record {
    pub fn new(labels: Vec<String>, level: f64) -> Self {
        let mut values = [0.0; codes::VAL_SLOTS];
        values[codes::VAL_LEVEL] = level;
        Self { labels, values }
    }

    /// The level value, the only slot the core reads.
    pub fn level(&self) -> f64 {
        self.values[codes::VAL_LEVEL]
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("container is not valid UTF-8 text")]
    Encoding(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Parse(#[from] DumpParseError),

    #[error("symbol #{ordinal} has no declared domain")]
    NoDomain { ordinal: usize },

    #[error("ordinal {ordinal} out of range (container has {symbol_count} symbols)")]
    OrdinalOutOfRange { ordinal: usize, symbol_count: usize },

    #[error("no record stream is active")]
    NoActiveStream,
}

/// Access to a symbol container.
///
/// Implementations expose one read cursor at a time: starting a new record
/// stream abandons whatever stream was active before. Callers must drain one
/// symbol's stream before starting another.
pub trait RecordSource {
    fn file_info(&self) -> FileInfo;

    fn container_info(&self) -> ContainerInfo;

    fn symbol_info(&self, ordinal: usize) -> Result<SymbolInfo, SourceError>;

    fn symbol_info_extended(&self, ordinal: usize) -> Result<SymbolInfoExt, SourceError>;

    /// Declared domain of a symbol, one dimension name per entry.
    ///
    /// Fails for the universal set, which is declared over nothing.
    fn symbol_domain(&self, ordinal: usize) -> Result<Vec<String>, SourceError>;

    /// Position the cursor at the first record of `ordinal` and return the
    /// record count the container declares for it.
    fn start_record_stream(&mut self, ordinal: usize) -> Result<usize, SourceError>;

    /// Next record of the active stream, or `None` once it is exhausted.
    fn next_record(&mut self) -> Result<Option<Record>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_level_is_first_slot() {
        let r = Record::new(vec!["a".to_string()], 4.5);
        assert_eq!(r.level(), 4.5);
        assert_eq!(r.values[codes::VAL_MARGINAL], 0.0);
    }
}
