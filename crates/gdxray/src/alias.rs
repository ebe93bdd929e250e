//! Alias bindings.
//!
//! An alias names another symbol. Aliases of sets share the parent's array
//! and coordinate; aliases of anything else are recorded as unsupported.
//! Resolution is one level deep.

use ahash::AHashMap;

use crate::catalog::{SymbolCatalog, SymbolKind};
use crate::coords::{CoordId, CoordinateArena};
use crate::error::UnsupportedReason;
use crate::state::{ArrayId, LoadState};

/// Outcome of binding one alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasBinding {
    /// Points at the parent's array; `coord` is set when the parent is a
    /// one-dimensional set.
    Shared {
        array: ArrayId,
        coord: Option<CoordId>,
    },
    Unsupported(UnsupportedReason),
}

#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    bindings: AHashMap<String, String>,
}

impl AliasResolver {
    pub fn new(catalog: &SymbolCatalog) -> Self {
        let bindings = catalog
            .iter()
            .filter_map(|s| Some((s.name.clone(), s.alias_of.clone()?)))
            .collect();
        Self { bindings }
    }

    /// Parent of `alias`, or `None` if `alias` is not an alias.
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.bindings.get(alias).map(String::as_str)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bind `alias` given its parent's current load state.
    ///
    /// The parent must already have been driven as far as it will go.
    pub fn bind(
        &self,
        alias: &str,
        catalog: &SymbolCatalog,
        parent_state: &LoadState,
        coords: &CoordinateArena,
    ) -> AliasBinding {
        let Some(target) = self.resolve(alias) else {
            return AliasBinding::Unsupported(UnsupportedReason::AliasTargetNotLoaded {
                target: alias.to_string(),
            });
        };
        let Some(parent) = catalog.get(target) else {
            return AliasBinding::Unsupported(UnsupportedReason::AliasTargetNotLoaded {
                target: target.to_string(),
            });
        };
        if parent.kind != SymbolKind::Set {
            return AliasBinding::Unsupported(UnsupportedReason::AliasOfNonSet {
                target: target.to_string(),
                target_kind: parent.kind,
            });
        }
        match parent_state {
            LoadState::Materialized(array) => AliasBinding::Shared {
                array: *array,
                coord: coords.id(target),
            },
            _ => AliasBinding::Unsupported(UnsupportedReason::AliasTargetNotLoaded {
                target: target.to_string(),
            }),
        }
    }
}
