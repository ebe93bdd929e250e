//! Symbol catalogue: declared metadata for every symbol, read once at open.

use ahash::AHashMap;
use gdxray_source::{codes, RecordSource, SourceError};
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Name of the universal set.
pub const UNIVERSE: &str = "*";

/// Alias descriptions have exactly this prefix, followed by the parent name.
pub const ALIAS_PREFIX: &str = "Aliased with ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Set,
    Parameter,
    Variable,
    Equation,
    Alias,
}

impl SymbolKind {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            codes::DT_SET => SymbolKind::Set,
            codes::DT_PAR => SymbolKind::Parameter,
            codes::DT_VAR => SymbolKind::Variable,
            codes::DT_EQU => SymbolKind::Equation,
            codes::DT_ALIAS => SymbolKind::Alias,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Set => "set",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Variable => "variable",
            SymbolKind::Equation => "equation",
            SymbolKind::Alias => "alias",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarSubtype {
    Binary,
    Integer,
    Positive,
    Negative,
    Free,
    Sos1,
    Sos2,
    SemiCont,
    SemiInt,
}

impl VarSubtype {
    /// `None` for the "unknown" code and for anything unrecognised.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            codes::VT_BINARY => VarSubtype::Binary,
            codes::VT_INTEGER => VarSubtype::Integer,
            codes::VT_POSITIVE => VarSubtype::Positive,
            codes::VT_NEGATIVE => VarSubtype::Negative,
            codes::VT_FREE => VarSubtype::Free,
            codes::VT_SOS1 => VarSubtype::Sos1,
            codes::VT_SOS2 => VarSubtype::Sos2,
            codes::VT_SEMICONT => VarSubtype::SemiCont,
            codes::VT_SEMIINT => VarSubtype::SemiInt,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VarSubtype::Binary => "binary",
            VarSubtype::Integer => "integer",
            VarSubtype::Positive => "positive",
            VarSubtype::Negative => "negative",
            VarSubtype::Free => "free",
            VarSubtype::Sos1 => "sos1",
            VarSubtype::Sos2 => "sos2",
            VarSubtype::SemiCont => "semicont",
            VarSubtype::SemiInt => "semiint",
        }
    }
}

/// Declared metadata of one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub ordinal: usize,
    pub name: String,
    pub dim: usize,
    pub kind: SymbolKind,
    /// Declared dimension names; empty for aliases and the universal set.
    pub domain: Vec<String>,
    pub records: usize,
    pub description: String,
    /// Only set for variables.
    pub subtype: Option<VarSubtype>,
    /// Parent name, for aliases.
    pub alias_of: Option<String>,
}

impl Symbol {
    pub fn is_universe(&self) -> bool {
        self.ordinal == 0
    }

    /// Human-readable type, e.g. `positive variable` or `scalar`.
    pub fn type_str(&self) -> String {
        let kind = match self.kind {
            SymbolKind::Parameter if self.dim == 0 => "scalar",
            kind => kind.as_str(),
        };
        match self.subtype {
            Some(subtype) => format!("{} {kind}", subtype.as_str()),
            None => kind.to_string(),
        }
    }
}

/// Every symbol of a container, indexed by ordinal and by name.
#[derive(Debug, Clone, Default)]
pub struct SymbolCatalog {
    symbols: Vec<Symbol>,
    by_name: AHashMap<String, usize>,
}

impl SymbolCatalog {
    /// Read metadata for ordinals `0..=symbol_count`.
    pub fn load<S: RecordSource>(source: &S) -> Result<Self> {
        let symbol_count = source.container_info().symbol_count;
        let mut catalog = SymbolCatalog::default();

        for ordinal in 0..=symbol_count {
            let symbol = load_symbol(source, ordinal)?;
            tracing::debug!(
                ordinal,
                name = %symbol.name,
                dim = symbol.dim,
                records = symbol.records,
                description = %symbol.description,
                "loaded symbol metadata"
            );
            if catalog.by_name.contains_key(&symbol.name) {
                return Err(DatasetError::integrity(
                    &symbol.name,
                    format!("duplicate symbol name at ordinal {ordinal}"),
                ));
            }
            catalog.by_name.insert(symbol.name.clone(), ordinal);
            catalog.symbols.push(symbol);
        }

        // Alias parents must exist; their kind is checked when binding.
        for symbol in &catalog.symbols {
            if let Some(parent) = &symbol.alias_of {
                if !catalog.by_name.contains_key(parent) {
                    return Err(DatasetError::integrity(
                        &symbol.name,
                        format!("alias refers to unknown symbol `{parent}`"),
                    ));
                }
            }
        }

        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&i| &self.symbols[i])
    }

    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn by_ordinal(&self, ordinal: usize) -> Option<&Symbol> {
        self.symbols.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn load_symbol<S: RecordSource>(source: &S, ordinal: usize) -> Result<Symbol> {
    let info = source.symbol_info(ordinal)?;
    let ext = source.symbol_info_extended(ordinal)?;

    let kind = SymbolKind::from_code(info.kind_code).ok_or_else(|| {
        DatasetError::integrity(
            &info.name,
            format!("unknown symbol type code {}", info.kind_code),
        )
    })?;

    let mut symbol = Symbol {
        ordinal,
        name: info.name,
        dim: info.dim,
        kind,
        domain: Vec::new(),
        records: ext.record_count,
        description: ext.description,
        subtype: match kind {
            SymbolKind::Variable => VarSubtype::from_code(ext.subtype_code),
            _ => None,
        },
        alias_of: None,
    };

    if kind == SymbolKind::Alias {
        symbol.alias_of = Some(parse_alias_target(&symbol.name, &symbol.description)?);
        return Ok(symbol);
    }

    symbol.domain = match source.symbol_domain(ordinal) {
        Ok(domain) => domain,
        // Only the universal set is declared over nothing.
        Err(SourceError::NoDomain { .. }) if ordinal == 0 => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    if ordinal != 0 && symbol.domain.len() != symbol.dim {
        return Err(DatasetError::integrity(
            &symbol.name,
            format!(
                "declared dimension {} but domain has {} entries",
                symbol.dim,
                symbol.domain.len()
            ),
        ));
    }

    Ok(symbol)
}

/// Parent name from an alias description (`"Aliased with <parent>"`).
pub fn parse_alias_target(alias: &str, description: &str) -> Result<String> {
    description
        .strip_prefix(ALIAS_PREFIX)
        .map(str::trim)
        .filter(|parent| !parent.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DatasetError::integrity(
                alias,
                format!("alias description must read `{ALIAS_PREFIX}<parent>`, got `{description}`"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use gdxray_source::DumpSource;

    fn catalog(text: &str) -> Result<SymbolCatalog> {
        let source = DumpSource::from_text(text).expect("parse dump");
        SymbolCatalog::load(&source)
    }

    #[test]
    fn universe_has_empty_domain() {
        let c = catalog("set i(*) 1\n  a\n").unwrap();
        let universe = c.by_ordinal(0).unwrap();
        assert_eq!(universe.name, UNIVERSE);
        assert!(universe.domain.is_empty());
        assert_eq!(universe.kind, SymbolKind::Set);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn alias_parent_is_parsed_from_description() {
        let c = catalog("set i(*) 1\n  a\nalias ii 0 \"Aliased with i\"\n").unwrap();
        let ii = c.get("ii").unwrap();
        assert_eq!(ii.kind, SymbolKind::Alias);
        assert_eq!(ii.alias_of.as_deref(), Some("i"));
        assert!(ii.domain.is_empty());
    }

    #[test]
    fn malformed_alias_description_is_an_integrity_error() {
        let err = catalog("set i(*) 1\n  a\nalias ii 0 \"copy of i\"\n").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Integrity);
    }

    #[test]
    fn alias_of_unknown_symbol_is_an_integrity_error() {
        let err = catalog("alias ii 0 \"Aliased with nope\"\n").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Integrity);
    }

    #[test]
    fn equations_keep_metadata() {
        let c = catalog("set i(*) 1\n  a\nequation e(i) 1 \"balance\"\n  a 0\n").unwrap();
        let e = c.get("e").unwrap();
        assert_eq!(e.kind, SymbolKind::Equation);
        assert_eq!(e.domain, vec!["i"]);
        assert_eq!(e.description, "balance");
    }

    #[test]
    fn type_str_renders_scalars_and_subtypes() {
        let c = catalog(
            "parameter f 1\n  90\nvariable x(*) 0 positive\nvariable z 0\nset i(*) 0\n",
        )
        .unwrap();
        assert_eq!(c.get("f").unwrap().type_str(), "scalar");
        assert_eq!(c.get("x").unwrap().type_str(), "positive variable");
        assert_eq!(c.get("z").unwrap().type_str(), "variable");
        assert_eq!(c.get("i").unwrap().type_str(), "set");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = catalog("set i(*) 0\nset i(*) 0\n").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Integrity);
    }
}
