//! Dataset errors.
//!
//! Callers get one typed error that separates their own mistakes (unknown
//! names) from data problems (integrity) and from known limitations
//! (unsupported symbols). Domain inference misses are not errors at all.

use std::fmt;

use gdxray_source::SourceError;

use crate::catalog::SymbolKind;

pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("symbol `{0}` not found")]
    NotFound(String),

    #[error("no symbol at ordinal {0}")]
    OrdinalNotFound(usize),

    #[error("integrity error in `{symbol}`: {reason}")]
    Integrity { symbol: String, reason: String },

    #[error("`{symbol}` not loaded: {reason}")]
    Unsupported {
        symbol: String,
        reason: UnsupportedReason,
    },

    #[error("`{0}` is excluded from loading")]
    Skipped(String),

    #[error("`{symbol}` is a {actual}, expected a {expected}")]
    WrongKind {
        symbol: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl DatasetError {
    pub(crate) fn integrity(symbol: &str, reason: impl Into<String>) -> Self {
        DatasetError::Integrity {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(symbol: &str, reason: UnsupportedReason) -> Self {
        DatasetError::Unsupported {
            symbol: symbol.to_string(),
            reason,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DatasetError::NotFound(_)
            | DatasetError::OrdinalNotFound(_)
            | DatasetError::WrongKind { .. } => ErrorClass::NotFound,
            DatasetError::Integrity { .. } => ErrorClass::Integrity,
            DatasetError::Unsupported { .. } | DatasetError::Skipped(_) => ErrorClass::Unsupported,
            DatasetError::Source(_) => ErrorClass::Source,
        }
    }
}

/// Coarse error category, for callers deciding whether to retry, skip or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The caller asked for something that does not exist, or for the wrong
    /// kind of symbol.
    NotFound,
    /// The container contradicts itself.
    Integrity,
    /// A known limitation, or a symbol excluded by configuration.
    Unsupported,
    /// The record source failed (I/O, decoding).
    Source,
}

/// Why a symbol never materialises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedReason {
    Equation,
    AliasOfNonSet {
        target: String,
        target_kind: SymbolKind,
    },
    AliasTargetNotLoaded {
        target: String,
    },
    MultiDimensionalDomain {
        dimension: String,
    },
    DomainNotLoaded {
        dimension: String,
    },
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedReason::Equation => write!(f, "loading of equations is not implemented"),
            UnsupportedReason::AliasOfNonSet {
                target,
                target_kind,
            } => write!(
                f,
                "aliases of {} symbols are not implemented (alias of `{target}`)",
                target_kind.as_str()
            ),
            UnsupportedReason::AliasTargetNotLoaded { target } => {
                write!(f, "alias target `{target}` was not loaded")
            }
            UnsupportedReason::MultiDimensionalDomain { dimension } => write!(
                f,
                "domain `{dimension}` is a multi-dimensional set; only one-dimensional sets can index a dimension"
            ),
            UnsupportedReason::DomainNotLoaded { dimension } => {
                write!(f, "domain `{dimension}` is not a loaded one-dimensional set")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_separate_caller_data_and_limitation_errors() {
        assert_eq!(
            DatasetError::NotFound("x".into()).class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            DatasetError::integrity("x", "bad").class(),
            ErrorClass::Integrity
        );
        assert_eq!(
            DatasetError::unsupported("e", UnsupportedReason::Equation).class(),
            ErrorClass::Unsupported
        );
    }

    #[test]
    fn alias_of_non_set_names_alias_and_target() {
        let err = DatasetError::unsupported(
            "pp",
            UnsupportedReason::AliasOfNonSet {
                target: "p".into(),
                target_kind: SymbolKind::Parameter,
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("`pp`"), "{msg}");
        assert!(msg.contains("`p`"), "{msg}");
        assert!(msg.contains("not implemented"), "{msg}");
    }
}
