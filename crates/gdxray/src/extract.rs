//! Self-contained projections of materialised arrays.

use crate::array::LabeledArray;
use crate::catalog::{Symbol, UNIVERSE};
use crate::coords::CoordinateArena;
use crate::error::{DatasetError, Result};

/// Copy `array` restricted to `symbol`'s own dimensions.
///
/// `domain` is the symbol's resolved domain. Per dimension `k`:
///
/// - `*`: labels whose whole slice is fill are dropped;
/// - the root coordinate itself: kept as is;
/// - a narrower set: root labels outside that set are dropped and the axis
///   takes the set's name.
///
/// Auxiliary coordinates are not carried over.
pub fn extract(
    symbol: &Symbol,
    domain: &[String],
    array: &LabeledArray,
    coords: &CoordinateArena,
) -> Result<LabeledArray> {
    let mut out = array.clone();
    out.clear_aux();

    for (k, dim) in domain.iter().enumerate() {
        if k >= out.ndim() {
            break;
        }
        if dim == UNIVERSE {
            out = out
                .drop_fill_slices(k)
                .map_err(|e| DatasetError::integrity(&symbol.name, e.to_string()))?;
            continue;
        }
        let axis_name = out.axes()[k].name().to_string();
        if *dim == axis_name {
            continue;
        }
        let Some(coord) = coords.by_name(dim) else {
            continue;
        };
        let own: ahash::AHashSet<&str> = coord.labels().iter().map(String::as_str).collect();
        out = out
            .select(k, |label| own.contains(label))
            .map_err(|e| DatasetError::integrity(&symbol.name, e.to_string()))?;
        out.rename_axis(k, dim.clone())
            .map_err(|e| DatasetError::integrity(&symbol.name, e.to_string()))?;
    }

    Ok(out)
}
