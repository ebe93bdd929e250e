//! `RecordSource` over a parsed GDX text dump.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::digest::container_digest;
use crate::dump::{parse_dump, ContainerDump};
use crate::{
    codes, ContainerInfo, FileInfo, Record, RecordSource, SourceError, SymbolInfo, SymbolInfoExt,
    UNIVERSE_DESCRIPTION, UNIVERSE_NAME,
};

#[derive(Debug, Clone, Copy)]
struct Cursor {
    ordinal: usize,
    next: usize,
}

/// A [`RecordSource`] backed by an in-memory [`ContainerDump`].
///
/// The universal set is synthesised at ordinal 0 from the unique element
/// labels: `universe` lines first, then every record label in order of first
/// appearance.
#[derive(Debug)]
pub struct DumpSource {
    dump: ContainerDump,
    elements: Vec<String>,
    digest: Option<String>,
    cursor: Option<Cursor>,
    streams_started: Vec<usize>,
}

impl DumpSource {
    /// Memory-map and parse the dump at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before this function
        // returns; the parsed dump owns copies of everything it keeps.
        let mmap = unsafe { Mmap::map(&file) }?;
        let text = std::str::from_utf8(&mmap)?;
        let dump = parse_dump(text)?;
        tracing::debug!(
            path = %path.display(),
            symbols = dump.symbols.len(),
            "parsed GDX text dump"
        );
        Ok(Self::with_digest(dump, Some(container_digest(&mmap))))
    }

    /// Parse a dump held in memory.
    pub fn from_text(text: &str) -> Result<Self, SourceError> {
        let dump = parse_dump(text)?;
        Ok(Self::with_digest(dump, Some(container_digest(text.as_bytes()))))
    }

    pub fn from_dump(dump: ContainerDump) -> Self {
        Self::with_digest(dump, None)
    }

    fn with_digest(dump: ContainerDump, digest: Option<String>) -> Self {
        let elements = unique_elements(&dump);

        let streams_started = vec![0; dump.symbols.len() + 1];
        Self {
            dump,
            elements,
            digest,
            cursor: None,
            streams_started,
        }
    }

    pub fn dump(&self) -> &ContainerDump {
        &self.dump
    }

    /// How many times a record stream was started for `ordinal`.
    pub fn streams_started(&self, ordinal: usize) -> usize {
        self.streams_started.get(ordinal).copied().unwrap_or(0)
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<(), SourceError> {
        if ordinal > self.dump.symbols.len() {
            return Err(SourceError::OrdinalOutOfRange {
                ordinal,
                symbol_count: self.dump.symbols.len(),
            });
        }
        Ok(())
    }
}

fn unique_elements(dump: &ContainerDump) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut elements = Vec::new();
    let labels = dump.universe.iter().chain(
        dump.symbols
            .iter()
            .flat_map(|s| s.records.iter())
            .flat_map(|r| r.labels.iter()),
    );
    for label in labels {
        if seen.insert(label.as_str()) {
            elements.push(label.clone());
        }
    }
    elements
}

impl RecordSource for DumpSource {
    fn file_info(&self) -> FileInfo {
        FileInfo {
            format_version: self.dump.version.clone(),
            producer: self.dump.producer.clone(),
            digest: self.digest.clone(),
        }
    }

    fn container_info(&self) -> ContainerInfo {
        ContainerInfo {
            symbol_count: self.dump.symbols.len(),
            element_count: self.elements.len(),
        }
    }

    fn symbol_info(&self, ordinal: usize) -> Result<SymbolInfo, SourceError> {
        self.check_ordinal(ordinal)?;
        if ordinal == 0 {
            return Ok(SymbolInfo {
                name: UNIVERSE_NAME.to_string(),
                dim: 1,
                kind_code: codes::DT_SET,
            });
        }
        let decl = &self.dump.symbols[ordinal - 1];
        Ok(SymbolInfo {
            name: decl.name.clone(),
            dim: decl.domain.len(),
            kind_code: decl.kind.code(),
        })
    }

    fn symbol_info_extended(&self, ordinal: usize) -> Result<SymbolInfoExt, SourceError> {
        self.check_ordinal(ordinal)?;
        if ordinal == 0 {
            return Ok(SymbolInfoExt {
                record_count: self.elements.len(),
                subtype_code: codes::VT_UNKNOWN,
                description: UNIVERSE_DESCRIPTION.to_string(),
            });
        }
        let decl = &self.dump.symbols[ordinal - 1];
        Ok(SymbolInfoExt {
            record_count: decl.record_count,
            subtype_code: decl.subtype_code,
            description: decl.description.clone(),
        })
    }

    fn symbol_domain(&self, ordinal: usize) -> Result<Vec<String>, SourceError> {
        self.check_ordinal(ordinal)?;
        if ordinal == 0 {
            return Err(SourceError::NoDomain { ordinal });
        }
        Ok(self.dump.symbols[ordinal - 1].domain.clone())
    }

    fn start_record_stream(&mut self, ordinal: usize) -> Result<usize, SourceError> {
        self.check_ordinal(ordinal)?;
        self.cursor = Some(Cursor { ordinal, next: 0 });
        self.streams_started[ordinal] += 1;
        if ordinal == 0 {
            Ok(self.elements.len())
        } else {
            Ok(self.dump.symbols[ordinal - 1].record_count)
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        let cursor = self.cursor.as_mut().ok_or(SourceError::NoActiveStream)?;
        let record = if cursor.ordinal == 0 {
            self.elements
                .get(cursor.next)
                .map(|label| Record::new(vec![label.clone()], 0.0))
        } else {
            self.dump.symbols[cursor.ordinal - 1]
                .records
                .get(cursor.next)
                .cloned()
        };
        match record {
            Some(record) => {
                cursor.next += 1;
                Ok(Some(record))
            }
            None => {
                self.cursor = None;
                Ok(None)
            }
        }
    }
}
