//! Dense materialisation of cached sparse records.
//!
//! Arrays are laid out over the *root* coordinate of every dimension. The
//! element type and fill value depend on the symbol kind:
//!
//! | kind                                   | result                          |
//! |----------------------------------------|---------------------------------|
//! | parameter / variable, dim 0            | 0-d float, NaN without records  |
//! | set, dim 1, over `*`, nothing or itself| a root coordinate               |
//! | set, dim 1, over a named set           | string array, `""` fill         |
//! | set, dim ≥ 2                           | boolean membership matrix       |
//! | parameter / variable, dim ≥ 1          | float array, NaN fill           |

use crate::array::{ArrayData, ArrayError, AuxCoord, Axis, LabeledArray, Value};
use crate::catalog::{Symbol, SymbolKind, UNIVERSE};
use crate::coords::{CoordId, CoordinateArena};
use crate::error::{DatasetError, Result, UnsupportedReason};
use crate::state::SparseRecordCache;

/// Result of materialising one symbol.
#[derive(Debug, Clone)]
pub enum Materialized {
    Scalar(LabeledArray),
    /// A set that becomes its own axis.
    RootCoordinate(LabeledArray),
    /// A one-dimensional set laid out along its parent's root.
    SubsetCoordinate {
        array: LabeledArray,
        parent: CoordId,
        labels: Vec<String>,
    },
    Array(LabeledArray),
}

impl Materialized {
    pub fn array(&self) -> &LabeledArray {
        match self {
            Materialized::Scalar(array)
            | Materialized::RootCoordinate(array)
            | Materialized::SubsetCoordinate { array, .. }
            | Materialized::Array(array) => array,
        }
    }
}

/// Build the dense array for `symbol` over its resolved `domain`.
///
/// `arrays` is the dataset's array arena; sub-set coordinates are read from it
/// to attach their membership as auxiliary coordinates.
pub fn materialize(
    symbol: &Symbol,
    domain: &[String],
    cache: &SparseRecordCache,
    coords: &CoordinateArena,
    arrays: &[LabeledArray],
) -> Result<Materialized> {
    let name = symbol.name.as_str();
    match symbol.kind {
        SymbolKind::Set if symbol.dim == 1 && seeds_coordinate(symbol, domain) => {
            Ok(Materialized::RootCoordinate(LabeledArray::coordinate(
                name,
                cache.elements(0).to_vec(),
            )))
        }
        SymbolKind::Set if symbol.dim == 1 => {
            let parent = domain_coordinate(symbol, &domain[0], coords)?;
            let axes = root_axes(symbol, domain, coords)?;
            let mut array = LabeledArray::full(name, axes, Value::Str(String::new()));
            for (key, _) in cache.iter() {
                let label = &key[0];
                array
                    .set(&[label.as_str()], Value::Str(label.clone()))
                    .map_err(|e| array_error(symbol, e))?;
            }
            attach_aux(&mut array, domain, coords, arrays);
            Ok(Materialized::SubsetCoordinate {
                array,
                parent,
                labels: cache.elements(0).to_vec(),
            })
        }
        SymbolKind::Set => {
            let axes = root_axes(symbol, domain, coords)?;
            let mut array = LabeledArray::full(name, axes, Value::Bool(false));
            if symbol.dim == 0 {
                array
                    .set(&[], Value::Bool(!cache.is_empty()))
                    .map_err(|e| array_error(symbol, e))?;
            } else {
                for (key, _) in cache.iter() {
                    let labels: Vec<&str> = key.iter().map(String::as_str).collect();
                    array
                        .set(&labels, Value::Bool(true))
                        .map_err(|e| array_error(symbol, e))?;
                }
            }
            attach_aux(&mut array, domain, coords, arrays);
            Ok(Materialized::Array(array))
        }
        SymbolKind::Parameter | SymbolKind::Variable if symbol.dim == 0 => {
            let value = cache.last_value().unwrap_or(f64::NAN);
            Ok(Materialized::Scalar(LabeledArray::scalar(name, value)))
        }
        SymbolKind::Parameter | SymbolKind::Variable => {
            let axes = root_axes(symbol, domain, coords)?;
            let mut array = aligned_values(symbol, cache, axes)?;
            attach_aux(&mut array, domain, coords, arrays);
            Ok(Materialized::Array(array))
        }
        SymbolKind::Equation => Err(DatasetError::unsupported(name, UnsupportedReason::Equation)),
        SymbolKind::Alias => Err(DatasetError::integrity(
            name,
            "aliases are bound to their parent, never materialised",
        )),
    }
}

fn seeds_coordinate(symbol: &Symbol, domain: &[String]) -> bool {
    match domain.first() {
        None => true,
        Some(dim) => dim == UNIVERSE || *dim == symbol.name,
    }
}

/// Float values over the root axes.
///
/// The sparse map is padded with NaN entries for keys pairing each position of
/// the longest axis with the wrapped-around positions of the others, so every
/// root label shows up in the series. The series is then reindexed onto the
/// root axes.
fn aligned_values(
    symbol: &Symbol,
    cache: &SparseRecordCache,
    axes: Vec<Axis>,
) -> Result<LabeledArray> {
    let mut entries: Vec<(Vec<String>, f64)> = cache
        .iter()
        .map(|(key, value)| (key.to_vec(), value))
        .collect();

    let longest = axes.iter().map(Axis::len).max().unwrap_or(0);
    if axes.iter().all(|axis| !axis.is_empty()) {
        let present: ahash::AHashSet<&[String]> = cache.iter().map(|(key, _)| key).collect();
        for t in 0..longest {
            let key: Vec<String> = axes
                .iter()
                .map(|axis| axis.labels()[t % axis.len()].clone())
                .collect();
            if !present.contains(key.as_slice()) {
                entries.push((key, f64::NAN));
            }
        }
    }

    let dims: Vec<String> = axes.iter().map(|axis| axis.name().to_string()).collect();
    LabeledArray::from_series(symbol.name.as_str(), &dims, entries)
        .and_then(|series| series.reindex(axes))
        .map_err(|e| array_error(symbol, e))
}

fn domain_coordinate(symbol: &Symbol, dim: &str, coords: &CoordinateArena) -> Result<CoordId> {
    coords.id(dim).ok_or_else(|| {
        DatasetError::unsupported(
            &symbol.name,
            UnsupportedReason::DomainNotLoaded {
                dimension: dim.to_string(),
            },
        )
    })
}

/// One axis per dimension, named and labelled after its root coordinate.
fn root_axes(symbol: &Symbol, domain: &[String], coords: &CoordinateArena) -> Result<Vec<Axis>> {
    domain
        .iter()
        .map(|dim| {
            let id = domain_coordinate(symbol, dim, coords)?;
            let root = coords.get(coords.root(id)?);
            Ok(Axis::new(root.name(), root.labels().iter().cloned()))
        })
        .collect()
}

/// Carry each narrower dimension's sub-set along its root axis.
fn attach_aux(
    array: &mut LabeledArray,
    domain: &[String],
    coords: &CoordinateArena,
    arrays: &[LabeledArray],
) {
    for (k, dim) in domain.iter().enumerate() {
        let Some(id) = coords.id(dim) else { continue };
        let coord = coords.get(id);
        if coord.is_root() {
            continue;
        }
        let values = match arrays[coord.array().index()].data() {
            ArrayData::Str(values) => values.clone(),
            _ => continue,
        };
        array.push_aux(AuxCoord {
            name: dim.clone(),
            axis: k,
            values,
        });
    }
}

fn array_error(symbol: &Symbol, err: ArrayError) -> DatasetError {
    DatasetError::integrity(&symbol.name, err.to_string())
}
