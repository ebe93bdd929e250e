//! Domain inference.
//!
//! A dimension declared over the universal set `*` is narrowed to the smallest
//! registered coordinate that contains every label observed in that
//! dimension. Candidates are scanned in registration order and a candidate
//! only replaces the current best when it is strictly smaller, so among equal
//! sizes the first registered wins. If the best candidate is `*` itself, or
//! nothing contains the labels, the dimension stays `*`: an inference miss,
//! which is not an error.
//!
//! Dimensions declared over a named set are checked instead: every observed
//! label must be a member of that set.

use serde::{Deserialize, Serialize};

use crate::catalog::{Symbol, SymbolCatalog, SymbolKind, UNIVERSE};
use crate::coords::{CoordId, CoordinateArena};
use crate::error::{DatasetError, Result, UnsupportedReason};
use crate::state::SparseRecordCache;

/// What inference did for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimOutcome {
    /// Declared over a named set, or no labels were observed.
    Kept,
    /// `*` replaced by a smaller coordinate.
    Narrowed,
    /// `*` kept because no smaller coordinate contains the labels.
    Miss,
}

/// Resolved domain of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredDomain {
    pub domain: Vec<String>,
    pub outcomes: Vec<DimOutcome>,
}

impl InferredDomain {
    pub fn is_narrowed(&self) -> bool {
        self.outcomes.contains(&DimOutcome::Narrowed)
    }

    pub fn misses(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == DimOutcome::Miss)
            .count()
    }
}

/// Resolve every dimension of `symbol` against the coordinates registered so
/// far.
pub fn infer_domain(
    symbol: &Symbol,
    cache: &SparseRecordCache,
    coords: &CoordinateArena,
    catalog: &SymbolCatalog,
) -> Result<InferredDomain> {
    let mut domain = Vec::with_capacity(symbol.domain.len());
    let mut outcomes = Vec::with_capacity(symbol.domain.len());

    for (k, dim) in symbol.domain.iter().enumerate() {
        let elements = cache.elements(k);

        if dim == UNIVERSE {
            if elements.is_empty() {
                domain.push(dim.clone());
                outcomes.push(DimOutcome::Kept);
                continue;
            }
            match smallest_superset(elements, coords) {
                Some(name) if name != UNIVERSE => {
                    tracing::debug!(
                        symbol = %symbol.name,
                        dimension = k,
                        inferred = name,
                        "narrowed universal dimension"
                    );
                    domain.push(name.to_string());
                    outcomes.push(DimOutcome::Narrowed);
                }
                _ => {
                    tracing::debug!(
                        symbol = %symbol.name,
                        dimension = k,
                        labels = elements.len(),
                        "domain inference found no coordinate smaller than `*`"
                    );
                    domain.push(dim.clone());
                    outcomes.push(DimOutcome::Miss);
                }
            }
            continue;
        }

        // A set declared over itself seeds its own coordinate.
        if *dim != symbol.name {
            let id = declared_coordinate(dim, coords, catalog, symbol)?;
            check_membership(symbol, dim, elements, id, coords)?;
        }
        domain.push(dim.clone());
        outcomes.push(DimOutcome::Kept);
    }

    Ok(InferredDomain { domain, outcomes })
}

/// Name of the smallest registered coordinate containing all of `elements`.
pub fn smallest_superset<'a>(elements: &[String], coords: &'a CoordinateArena) -> Option<&'a str> {
    let wanted = coords.label_set(elements)?;
    let mut best: Option<(&str, usize)> = None;
    for (name, id) in coords.iter() {
        let size = coords.get(id).len();
        if best.is_some_and(|(_, best_size)| size >= best_size) {
            continue;
        }
        if coords.contains_all(id, &wanted) {
            best = Some((name, size));
        }
    }
    best.map(|(name, _)| name)
}

fn declared_coordinate(
    dim: &str,
    coords: &CoordinateArena,
    catalog: &SymbolCatalog,
    symbol: &Symbol,
) -> Result<CoordId> {
    if let Some(id) = coords.id(dim) {
        return Ok(id);
    }
    let reason = match catalog.get(dim) {
        Some(parent) if parent.kind == SymbolKind::Set && parent.dim > 1 => {
            UnsupportedReason::MultiDimensionalDomain {
                dimension: dim.to_string(),
            }
        }
        _ => UnsupportedReason::DomainNotLoaded {
            dimension: dim.to_string(),
        },
    };
    Err(DatasetError::unsupported(&symbol.name, reason))
}

fn check_membership(
    symbol: &Symbol,
    dim: &str,
    elements: &[String],
    id: CoordId,
    coords: &CoordinateArena,
) -> Result<()> {
    let outside = match coords.label_set(elements) {
        Some(set) if coords.contains_all(id, &set) => return Ok(()),
        _ => {
            let own = coords.get(id).labels();
            elements.iter().find(|label| !own.contains(label))
        }
    };
    Err(DatasetError::integrity(
        &symbol.name,
        format!(
            "label `{}` is not a member of its declared domain `{dim}`",
            outside.map(String::as_str).unwrap_or_default()
        ),
    ))
}
