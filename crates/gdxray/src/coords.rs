//! Coordinate arena.
//!
//! Every materialised one-dimensional set is registered here as a
//! [`Coordinate`]. A coordinate is either a root (it is its own axis) or a
//! sub-set of a parent coordinate, in which case arrays indexed by it are laid
//! out along the parent's root. Labels are interned once and each coordinate
//! keeps its members as a roaring bitmap, so superset tests during domain
//! inference are bitmap containment checks.

use ahash::{AHashMap, AHashSet};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::state::ArrayId;

/// Interned label id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub u32);

/// Single-owner string interner for element labels.
#[derive(Debug, Default, Clone)]
pub struct LabelInterner {
    ids: AHashMap<String, LabelId>,
}

impl LabelInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a label, returning its id.
    pub fn intern(&mut self, label: &str) -> LabelId {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }
        let id = LabelId(self.ids.len() as u32);
        self.ids.insert(label.to_string(), id);
        id
    }

    /// Look up an existing id without inserting.
    pub fn id_of(&self, label: &str) -> Option<LabelId> {
        self.ids.get(label).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordId(pub(crate) usize);

/// A materialised one-dimensional set.
#[derive(Debug, Clone)]
pub struct Coordinate {
    name: String,
    parent: Option<CoordId>,
    array: ArrayId,
    labels: Vec<String>,
    members: RoaringBitmap,
}

impl Coordinate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for a root coordinate.
    pub fn parent(&self) -> Option<CoordId> {
        self.parent
    }

    pub fn array(&self) -> ArrayId {
        self.array
    }

    /// Own labels, in order of first occurrence.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of own labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Debug, Default, Clone)]
pub struct CoordinateArena {
    interner: LabelInterner,
    coords: Vec<Coordinate>,
    by_name: AHashMap<String, CoordId>,
    /// Names in registration order; aliases appear when bound.
    order: Vec<(String, CoordId)>,
}

impl CoordinateArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinate for the set `name`.
    pub fn register(
        &mut self,
        name: &str,
        parent: Option<CoordId>,
        array: ArrayId,
        labels: Vec<String>,
    ) -> CoordId {
        let mut members = RoaringBitmap::new();
        for label in &labels {
            members.insert(self.interner.intern(label).0);
        }
        let id = CoordId(self.coords.len());
        self.coords.push(Coordinate {
            name: name.to_string(),
            parent,
            array,
            labels,
            members,
        });
        self.by_name.insert(name.to_string(), id);
        self.order.push((name.to_string(), id));
        tracing::debug!(
            name,
            coord = id.0,
            parent = ?parent.map(|p| p.0),
            "registered coordinate"
        );
        id
    }

    /// Make `alias` another name for an existing coordinate.
    pub fn bind_alias(&mut self, alias: &str, target: CoordId) {
        self.by_name.insert(alias.to_string(), target);
        self.order.push((alias.to_string(), target));
    }

    pub fn id(&self, name: &str) -> Option<CoordId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: CoordId) -> &Coordinate {
        &self.coords[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<&Coordinate> {
        self.id(name).map(|id| self.get(id))
    }

    /// Follow parent links up to the root coordinate.
    pub fn root(&self, id: CoordId) -> Result<CoordId> {
        let mut visited = AHashSet::new();
        let mut current = id;
        while let Some(parent) = self.coords[current.0].parent {
            if !visited.insert(current) {
                return Err(DatasetError::integrity(
                    &self.coords[id.0].name,
                    format!(
                        "coordinate chain through `{}` is cyclic",
                        self.coords[current.0].name
                    ),
                ));
            }
            current = parent;
        }
        Ok(current)
    }

    /// Registered names with their coordinates, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CoordId)> {
        self.order.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Bitmap of `labels`, or `None` if some label was never registered by
    /// any coordinate.
    pub fn label_set<'a, I>(&self, labels: I) -> Option<RoaringBitmap>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut set = RoaringBitmap::new();
        for label in labels {
            set.insert(self.interner.id_of(label)?.0);
        }
        Some(set)
    }

    /// Does coordinate `id` contain every label in `set`?
    pub fn contains_all(&self, id: CoordId, set: &RoaringBitmap) -> bool {
        set.is_subset(&self.coords[id.0].members)
    }

    pub fn interner(&self) -> &LabelInterner {
        &self.interner
    }
}
