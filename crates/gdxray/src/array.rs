//! Labeled dense arrays.
//!
//! A [`LabeledArray`] is an N-dimensional, row-major array whose every axis
//! carries an ordered list of unique string labels. It offers only what the
//! loader needs: coordinate lookup, slot assignment, construction from a
//! sparse series, reindexing and label selection.
//!
//! Absent cells hold the dtype's fill value: `""` for strings, `false` for
//! booleans, NaN for floats. Equality treats two NaNs as equal, so two arrays
//! with the same missing cells compare equal.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArrayError {
    #[error("expected {expected} labels, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("label `{label}` not on axis `{axis}`")]
    UnknownLabel { axis: String, label: String },

    #[error("cannot store a {value} value in a {dtype} array")]
    TypeMismatch {
        dtype: &'static str,
        value: &'static str,
    },

    #[error("axis {0} out of range")]
    AxisOutOfRange(usize),
}

// ============================================================================
// Axes
// ============================================================================

/// A named axis with unique labels.
#[derive(Debug, Clone)]
pub struct Axis {
    name: String,
    labels: Vec<String>,
    index: AHashMap<String, usize>,
}

impl Axis {
    /// Build an axis; repeated labels keep their first position.
    pub fn new(name: impl Into<String>, labels: impl IntoIterator<Item = String>) -> Self {
        let mut index = AHashMap::new();
        let mut unique = Vec::new();
        for label in labels {
            if !index.contains_key(&label) {
                index.insert(label.clone(), unique.len());
                unique.push(label);
            }
        }
        Self {
            name: name.into(),
            labels: unique,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }
}

impl PartialEq for Axis {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.labels == other.labels
    }
}

impl Serialize for Axis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Axis", 2)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("labels", &self.labels)?;
        s.end()
    }
}

// ============================================================================
// Values and storage
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Str,
    Bool,
    Float,
}

impl DType {
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Str => "str",
            DType::Bool => "bool",
            DType::Float => "float",
        }
    }

    pub fn fill(self) -> Value {
        match self {
            DType::Str => Value::Str(String::new()),
            DType::Bool => Value::Bool(false),
            DType::Float => Value::Float(f64::NAN),
        }
    }
}

/// One cell value.
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Bool(bool),
    Float(f64),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Str(_) => DType::Str,
            Value::Bool(_) => DType::Bool,
            Value::Float(_) => DType::Float,
        }
    }

    pub fn is_fill(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::Bool(b) => !b,
            Value::Float(x) => x.is_nan(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => floats_match(*a, *b),
            _ => false,
        }
    }
}

fn floats_match(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum ArrayData {
    Str(Vec<String>),
    Bool(Vec<bool>),
    Float(Vec<f64>),
}

impl ArrayData {
    fn full(fill: &Value, len: usize) -> Self {
        match fill {
            Value::Str(s) => ArrayData::Str(vec![s.clone(); len]),
            Value::Bool(b) => ArrayData::Bool(vec![*b; len]),
            Value::Float(x) => ArrayData::Float(vec![*x; len]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Str(_) => DType::Str,
            ArrayData::Bool(_) => DType::Bool,
            ArrayData::Float(_) => DType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Str(v) => v.len(),
            ArrayData::Bool(v) => v.len(),
            ArrayData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value(&self, offset: usize) -> Value {
        match self {
            ArrayData::Str(v) => Value::Str(v[offset].clone()),
            ArrayData::Bool(v) => Value::Bool(v[offset]),
            ArrayData::Float(v) => Value::Float(v[offset]),
        }
    }

    fn store(&mut self, offset: usize, value: Value) -> Result<(), ArrayError> {
        match (self, value) {
            (ArrayData::Str(v), Value::Str(s)) => v[offset] = s,
            (ArrayData::Bool(v), Value::Bool(b)) => v[offset] = b,
            (ArrayData::Float(v), Value::Float(x)) => v[offset] = x,
            (data, value) => {
                return Err(ArrayError::TypeMismatch {
                    dtype: data.dtype().as_str(),
                    value: value.dtype().as_str(),
                })
            }
        }
        Ok(())
    }

    fn is_fill_at(&self, offset: usize) -> bool {
        match self {
            ArrayData::Str(v) => v[offset].is_empty(),
            ArrayData::Bool(v) => !v[offset],
            ArrayData::Float(v) => v[offset].is_nan(),
        }
    }
}

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArrayData::Str(a), ArrayData::Str(b)) => a == b,
            (ArrayData::Bool(a), ArrayData::Bool(b)) => a == b,
            (ArrayData::Float(a), ArrayData::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| floats_match(*x, *y))
            }
            _ => false,
        }
    }
}

/// A non-dimension coordinate carried along one axis (e.g. a sub-set whose
/// labels index the same root).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuxCoord {
    pub name: String,
    pub axis: usize,
    pub values: Vec<String>,
}

// ============================================================================
// LabeledArray
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledArray {
    name: String,
    axes: Vec<Axis>,
    data: ArrayData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    aux: Vec<AuxCoord>,
    pub attrs: BTreeMap<String, String>,
}

impl LabeledArray {
    /// An array over `axes` with every cell set to `fill`.
    pub fn full(name: impl Into<String>, axes: Vec<Axis>, fill: Value) -> Self {
        let size = axes.iter().map(Axis::len).product();
        Self {
            name: name.into(),
            data: ArrayData::full(&fill, size),
            axes,
            aux: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// A 0-dimensional float array.
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self::full(name, Vec::new(), Value::Float(value))
    }

    /// A 1-D string array indexed by its own labels.
    pub fn coordinate(name: impl Into<String>, labels: Vec<String>) -> Self {
        let name = name.into();
        let axis = Axis::new(name.clone(), labels);
        let data = ArrayData::Str(axis.labels().to_vec());
        Self {
            name,
            axes: vec![axis],
            data,
            aux: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Build a float array from sparse `(labels, value)` entries.
    ///
    /// Axis labels appear in order of first occurrence; cells without an
    /// entry are NaN. Later entries overwrite earlier ones with the same key.
    pub fn from_series<I>(name: impl Into<String>, dims: &[String], entries: I) -> Result<Self, ArrayError>
    where
        I: IntoIterator<Item = (Vec<String>, f64)>,
    {
        let entries: Vec<(Vec<String>, f64)> = entries.into_iter().collect();
        for (labels, _) in &entries {
            if labels.len() != dims.len() {
                return Err(ArrayError::RankMismatch {
                    expected: dims.len(),
                    actual: labels.len(),
                });
            }
        }

        let axes = dims
            .iter()
            .enumerate()
            .map(|(k, dim)| Axis::new(dim.clone(), entries.iter().map(|(l, _)| l[k].clone())))
            .collect();
        let mut array = Self::full(name, axes, Value::Float(f64::NAN));
        for (labels, value) in entries {
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            array.set(&labels, Value::Float(value))?;
        }
        Ok(array)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, index: usize) -> Option<&Axis> {
        self.axes.get(index)
    }

    pub fn dims(&self) -> Vec<&str> {
        self.axes.iter().map(Axis::name).collect()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn aux(&self) -> &[AuxCoord] {
        &self.aux
    }

    pub fn push_aux(&mut self, aux: AuxCoord) {
        self.aux.push(aux);
    }

    pub fn clear_aux(&mut self) {
        self.aux.clear();
    }

    pub fn rename_axis(&mut self, index: usize, name: impl Into<String>) -> Result<(), ArrayError> {
        let axis = self
            .axes
            .get_mut(index)
            .ok_or(ArrayError::AxisOutOfRange(index))?;
        axis.name = name.into();
        Ok(())
    }

    /// Row-major offset of the cell at `labels`.
    pub fn offset(&self, labels: &[&str]) -> Result<usize, ArrayError> {
        if labels.len() != self.axes.len() {
            return Err(ArrayError::RankMismatch {
                expected: self.axes.len(),
                actual: labels.len(),
            });
        }
        let mut offset = 0;
        for (axis, label) in self.axes.iter().zip(labels) {
            let pos = axis.position(label).ok_or_else(|| ArrayError::UnknownLabel {
                axis: axis.name.clone(),
                label: label.to_string(),
            })?;
            offset = offset * axis.len() + pos;
        }
        Ok(offset)
    }

    pub fn get(&self, labels: &[&str]) -> Result<Value, ArrayError> {
        let offset = self.offset(labels)?;
        Ok(self.data.value(offset))
    }

    pub fn set(&mut self, labels: &[&str], value: Value) -> Result<(), ArrayError> {
        let offset = self.offset(labels)?;
        self.data.store(offset, value)
    }

    /// The single value of a 0-dimensional float array.
    pub fn scalar_value(&self) -> Option<f64> {
        match (&self.data, self.axes.is_empty()) {
            (ArrayData::Float(v), true) => v.first().copied(),
            _ => None,
        }
    }

    /// Every cell holding something other than the fill value, in row-major
    /// order.
    pub fn cells(&self) -> Vec<(Vec<&str>, Value)> {
        CellIter::new(&self.shape())
            .enumerate()
            .filter(|(offset, _)| !self.data.is_fill_at(*offset))
            .map(|(offset, index)| {
                let labels = index
                    .iter()
                    .zip(&self.axes)
                    .map(|(&i, axis)| axis.labels[i].as_str())
                    .collect();
                (labels, self.data.value(offset))
            })
            .collect()
    }

    /// Conform to `targets`, positionally: values move with their labels,
    /// labels missing from `self` get the fill value, labels missing from the
    /// targets are dropped.
    pub fn reindex(&self, targets: Vec<Axis>) -> Result<Self, ArrayError> {
        if targets.len() != self.axes.len() {
            return Err(ArrayError::RankMismatch {
                expected: self.axes.len(),
                actual: targets.len(),
            });
        }

        let source_pos: Vec<Vec<Option<usize>>> = targets
            .iter()
            .zip(&self.axes)
            .map(|(target, axis)| target.labels.iter().map(|l| axis.position(l)).collect())
            .collect();
        let strides = strides(&self.shape());

        let mut out = Self::full(self.name.clone(), targets, self.dtype().fill());
        out.attrs = self.attrs.clone();
        out.aux = self
            .aux
            .iter()
            .map(|aux| reindex_aux(aux, &source_pos))
            .collect();

        for (offset, index) in CellIter::new(&out.shape()).enumerate() {
            let mut source = 0;
            let mut present = true;
            for (k, &i) in index.iter().enumerate() {
                match source_pos[k][i] {
                    Some(p) => source += p * strides[k],
                    None => {
                        present = false;
                        break;
                    }
                }
            }
            if present {
                out.data.store(offset, self.data.value(source))?;
            }
        }
        Ok(out)
    }

    /// Keep only the labels of axis `index` for which `keep` holds.
    pub fn select<F>(&self, index: usize, keep: F) -> Result<Self, ArrayError>
    where
        F: Fn(&str) -> bool,
    {
        let axis = self.axes.get(index).ok_or(ArrayError::AxisOutOfRange(index))?;
        let kept = Axis::new(
            axis.name.clone(),
            axis.labels.iter().filter(|l| keep(l)).cloned(),
        );
        let mut targets = self.axes.clone();
        targets[index] = kept;
        self.reindex(targets)
    }

    /// Drop labels of axis `index` whose whole slice is the fill value.
    pub fn drop_fill_slices(&self, index: usize) -> Result<Self, ArrayError> {
        let axis = self.axes.get(index).ok_or(ArrayError::AxisOutOfRange(index))?;
        let mut occupied = vec![false; axis.len()];
        for (offset, cell) in CellIter::new(&self.shape()).enumerate() {
            if !self.data.is_fill_at(offset) {
                occupied[cell[index]] = true;
            }
        }
        let keep: ahash::AHashSet<&str> = axis
            .labels
            .iter()
            .zip(&occupied)
            .filter(|(_, occupied)| **occupied)
            .map(|(l, _)| l.as_str())
            .collect();
        self.select(index, |l| keep.contains(l))
    }
}

fn reindex_aux(aux: &AuxCoord, source_pos: &[Vec<Option<usize>>]) -> AuxCoord {
    let values = source_pos[aux.axis]
        .iter()
        .map(|p| p.map(|p| aux.values[p].clone()).unwrap_or_default())
        .collect();
    AuxCoord {
        name: aux.name.clone(),
        axis: aux.axis,
        values,
    }
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * shape[k + 1];
    }
    strides
}

/// Row-major iterator over every index tuple of a shape.
pub(crate) struct CellIter {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl CellIter {
    pub(crate) fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            current: vec![0; shape.len()],
            done: shape.contains(&0),
        }
    }
}

impl Iterator for CellIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.shape.is_empty() {
            self.done = true;
            return Some(Vec::new());
        }

        let result = self.current.clone();

        // Advance (odometer style)
        for k in (0..self.shape.len()).rev() {
            self.current[k] += 1;
            if self.current[k] < self.shape[k] {
                return Some(result);
            }
            self.current[k] = 0;
        }
        self.done = true;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn grid() -> LabeledArray {
        let axes = vec![
            Axis::new("i", labels(&["a", "b"])),
            Axis::new("j", labels(&["x", "y", "z"])),
        ];
        let mut arr = LabeledArray::full("g", axes, Value::Float(f64::NAN));
        arr.set(&["a", "y"], Value::Float(1.0)).unwrap();
        arr.set(&["b", "z"], Value::Float(2.0)).unwrap();
        arr
    }

    #[test]
    fn cell_iter_is_row_major() {
        let cells: Vec<Vec<usize>> = CellIter::new(&[2, 2]).collect();
        assert_eq!(cells, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        assert_eq!(CellIter::new(&[]).count(), 1);
        assert_eq!(CellIter::new(&[3, 0]).count(), 0);
    }

    #[test]
    fn set_and_get_by_labels() {
        let arr = grid();
        assert_eq!(arr.shape(), vec![2, 3]);
        assert_eq!(arr.get(&["a", "y"]).unwrap(), Value::Float(1.0));
        assert!(arr.get(&["a", "x"]).unwrap().is_fill());
        assert!(matches!(
            arr.get(&["c", "x"]),
            Err(ArrayError::UnknownLabel { .. })
        ));
        assert!(matches!(
            arr.get(&["a"]),
            Err(ArrayError::RankMismatch { .. })
        ));
    }

    #[test]
    fn storing_the_wrong_type_fails() {
        let mut arr = grid();
        assert!(matches!(
            arr.set(&["a", "x"], Value::Bool(true)),
            Err(ArrayError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn cells_lists_non_fill_values() {
        let arr = grid();
        let cells = arr.cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].0, vec!["a", "y"]);
        assert_eq!(cells[1].1, Value::Float(2.0));
    }

    #[test]
    fn reindex_moves_values_with_labels() {
        let arr = grid();
        let targets = vec![
            Axis::new("i", labels(&["b", "a", "c"])),
            Axis::new("j", labels(&["z", "y"])),
        ];
        let out = arr.reindex(targets).unwrap();
        assert_eq!(out.shape(), vec![3, 2]);
        assert_eq!(out.get(&["b", "z"]).unwrap(), Value::Float(2.0));
        assert_eq!(out.get(&["a", "y"]).unwrap(), Value::Float(1.0));
        assert!(out.get(&["c", "y"]).unwrap().is_fill());
        assert_eq!(out.cells().len(), 2);
    }

    #[test]
    fn from_series_orders_labels_by_first_occurrence() {
        let arr = LabeledArray::from_series(
            "p",
            &labels(&["i"]),
            vec![(labels(&["b"]), 2.0), (labels(&["a"]), 1.0)],
        )
        .unwrap();
        assert_eq!(arr.axes()[0].labels(), &labels(&["b", "a"])[..]);
        assert_eq!(arr.get(&["a"]).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn drop_fill_slices_removes_empty_labels() {
        let arr = grid().drop_fill_slices(1).unwrap();
        assert_eq!(arr.axes()[1].labels(), &labels(&["y", "z"])[..]);
        assert_eq!(arr.cells().len(), 2);
    }

    #[test]
    fn select_keeps_matching_labels() {
        let arr = grid().select(0, |l| l == "b").unwrap();
        assert_eq!(arr.shape(), vec![1, 3]);
        assert_eq!(arr.get(&["b", "z"]).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn nan_cells_compare_equal() {
        assert_eq!(grid(), grid());
    }

    #[test]
    fn coordinate_holds_its_own_labels() {
        let c = LabeledArray::coordinate("i", labels(&["a", "b"]));
        assert_eq!(c.dims(), vec!["i"]);
        assert_eq!(c.get(&["b"]).unwrap(), Value::Str("b".into()));
        assert_eq!(c.dtype(), DType::Str);
    }

    #[test]
    fn serializes_nan_as_null() {
        let json = serde_json::to_value(grid()).unwrap();
        assert_eq!(json["data"]["dtype"], "float");
        assert!(json["data"]["values"][0].is_null());
        assert_eq!(json["axes"][1]["labels"][2], "z");
    }
}
