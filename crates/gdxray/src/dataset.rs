//! The dataset facade.
//!
//! [`Dataset`] owns the record source, the symbol catalogue, every symbol's
//! load state, the array arena and the coordinate arena. Sets are loaded at
//! open because every other symbol is laid out over them; parameters and
//! variables wait for first access unless loading is eager.

use std::collections::BTreeMap;
use std::path::Path;

use gdxray_source::{DumpSource, RecordSource};
use serde::Serialize;

use crate::alias::{AliasBinding, AliasResolver};
use crate::array::{ArrayData, LabeledArray};
use crate::catalog::{Symbol, SymbolCatalog, SymbolKind, VarSubtype, UNIVERSE};
use crate::coords::CoordinateArena;
use crate::error::{DatasetError, Result, UnsupportedReason};
use crate::extract;
use crate::infer::{infer_domain, InferredDomain};
use crate::materialize::{materialize, Materialized};
use crate::options::OpenOptions;
use crate::state::{stream_into_cache, ArrayId, LoadState, StateLabel};

/// Empty set-of-pairs some modelling tools leave behind; never loaded.
pub const SAME_AS: &str = "SameAs";

/// Container-level attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttrs {
    pub version: String,
    pub producer: String,
    pub symbol_count: usize,
    pub element_count: usize,
    pub digest: Option<String>,
}

/// Symbol metadata attached to its materialised array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayAttrs {
    pub ordinal: usize,
    pub name: String,
    pub dim: usize,
    pub kind: SymbolKind,
    pub type_str: String,
    pub records: usize,
    pub subtype: Option<VarSubtype>,
    pub description: String,
    pub domain: Vec<String>,
    /// Only when inference narrowed at least one dimension.
    pub inferred_domain: Option<Vec<String>>,
}

impl ArrayAttrs {
    fn new(symbol: &Symbol, inferred: &InferredDomain) -> Self {
        Self {
            ordinal: symbol.ordinal,
            name: symbol.name.clone(),
            dim: symbol.dim,
            kind: symbol.kind,
            type_str: symbol.type_str(),
            records: symbol.records,
            subtype: symbol.subtype,
            description: symbol.description.clone(),
            domain: symbol.domain.clone(),
            inferred_domain: inferred
                .is_narrowed()
                .then(|| inferred.domain.clone()),
        }
    }

    fn write_into(&self, attrs: &mut BTreeMap<String, String>) {
        attrs.insert("ordinal".into(), self.ordinal.to_string());
        attrs.insert("name".into(), self.name.clone());
        attrs.insert("dim".into(), self.dim.to_string());
        attrs.insert("kind".into(), self.kind.as_str().into());
        attrs.insert("type".into(), self.type_str.clone());
        attrs.insert("records".into(), self.records.to_string());
        attrs.insert("description".into(), self.description.clone());
        attrs.insert("domain".into(), self.domain.join(","));
        if let Some(subtype) = self.subtype {
            attrs.insert("subtype".into(), subtype.as_str().into());
        }
        if let Some(inferred) = &self.inferred_domain {
            attrs.insert("inferred_domain".into(), inferred.join(","));
        }
    }
}

/// One row of [`Dataset::symbols`].
#[derive(Debug, Clone, Serialize)]
pub struct SymbolListing<'a> {
    #[serde(flatten)]
    pub symbol: &'a Symbol,
    pub type_str: String,
    pub state: StateLabel,
}

pub struct Dataset<S: RecordSource = DumpSource> {
    source: S,
    options: OpenOptions,
    attrs: FileAttrs,
    catalog: SymbolCatalog,
    states: Vec<LoadState>,
    domains: Vec<Option<InferredDomain>>,
    arrays: Vec<LabeledArray>,
    coords: CoordinateArena,
    aliases: AliasResolver,
}

impl Dataset<DumpSource> {
    /// Open a GDX text dump.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let source = DumpSource::open(path.as_ref())?;
        Self::from_source(source, options)
    }
}

impl<S: RecordSource> Dataset<S> {
    /// Build a dataset over any record source.
    ///
    /// Fails if reading metadata or loading any set fails with an integrity
    /// or source error. Unsupported and skipped sets are recorded and do not
    /// fail the open.
    pub fn from_source(source: S, options: OpenOptions) -> Result<Self> {
        let file = source.file_info();
        let container = source.container_info();
        let catalog = SymbolCatalog::load(&source)?;

        let states = catalog
            .iter()
            .map(|symbol| initial_state(symbol, &options))
            .collect();

        let mut dataset = Self {
            attrs: FileAttrs {
                version: file.format_version,
                producer: file.producer,
                symbol_count: container.symbol_count,
                element_count: container.element_count,
                digest: file.digest,
            },
            aliases: AliasResolver::new(&catalog),
            domains: vec![None; catalog.len()],
            states,
            catalog,
            options,
            source,
            arrays: Vec::new(),
            coords: CoordinateArena::new(),
        };
        dataset.load_eager()?;

        tracing::debug!(
            symbols = dataset.catalog.len(),
            arrays = dataset.arrays.len(),
            coordinates = dataset.coords.len(),
            lazy = dataset.options.lazy,
            "opened dataset"
        );
        Ok(dataset)
    }

    fn load_eager(&mut self) -> Result<()> {
        for ordinal in 0..self.catalog.len() {
            match self.kind_of(ordinal) {
                Some(SymbolKind::Set) => recorded(self.drive(ordinal))?,
                Some(SymbolKind::Alias) => self.bind_alias(ordinal)?,
                _ => {}
            }
        }

        if !self.options.lazy {
            for ordinal in 0..self.catalog.len() {
                if matches!(
                    self.kind_of(ordinal),
                    Some(SymbolKind::Parameter | SymbolKind::Variable)
                ) {
                    recorded(self.drive(ordinal))?;
                }
            }
        }
        Ok(())
    }

    fn kind_of(&self, ordinal: usize) -> Option<SymbolKind> {
        self.catalog.by_ordinal(ordinal).map(|s| s.kind)
    }

    fn ordinal(&self, name: &str) -> Result<usize> {
        self.catalog
            .ordinal_of(name)
            .ok_or_else(|| DatasetError::NotFound(name.to_string()))
    }

    /// Drive a symbol as far through its load states as it will go.
    fn drive(&mut self, ordinal: usize) -> Result<ArrayId> {
        let symbol = self
            .catalog
            .by_ordinal(ordinal)
            .ok_or(DatasetError::OrdinalNotFound(ordinal))?
            .clone();

        if symbol.kind == SymbolKind::Alias && matches!(self.states[ordinal], LoadState::Declared) {
            self.bind_alias(ordinal)?;
        }

        match &self.states[ordinal] {
            LoadState::Materialized(id) => return Ok(*id),
            LoadState::Skipped => return Err(DatasetError::Skipped(symbol.name)),
            LoadState::Unsupported(reason) => {
                return Err(DatasetError::unsupported(&symbol.name, reason.clone()))
            }
            LoadState::Declared | LoadState::DataCached(_) => {}
        }

        if matches!(self.states[ordinal], LoadState::Declared) {
            let cache = stream_into_cache(&mut self.source, &symbol)?;
            self.states[ordinal] = LoadState::DataCached(cache);
        }

        if is_same_as_artifact(&symbol) {
            tracing::info!(ordinal, name = %symbol.name, "dropping empty `SameAs` artifact");
            self.states[ordinal] = LoadState::Skipped;
            return Err(DatasetError::Skipped(symbol.name));
        }

        let cache = match std::mem::replace(&mut self.states[ordinal], LoadState::Declared) {
            LoadState::DataCached(cache) => cache,
            other => {
                self.states[ordinal] = other;
                return Err(DatasetError::integrity(&symbol.name, "record cache missing"));
            }
        };

        let built = infer_domain(&symbol, &cache, &self.coords, &self.catalog).and_then(|inferred| {
            let materialized =
                materialize(&symbol, &inferred.domain, &cache, &self.coords, &self.arrays)?;
            Ok((inferred, materialized))
        });

        let (inferred, materialized) = match built {
            Ok(built) => built,
            Err(DatasetError::Unsupported { symbol: name, reason }) => {
                tracing::debug!(ordinal, name = %name, %reason, "symbol not loaded");
                self.states[ordinal] = LoadState::Unsupported(reason.clone());
                return Err(DatasetError::Unsupported { symbol: name, reason });
            }
            Err(err) => {
                self.states[ordinal] = LoadState::DataCached(cache);
                return Err(err);
            }
        };

        let id = self.store(&symbol, &inferred, materialized);
        self.states[ordinal] = LoadState::Materialized(id);
        self.domains[ordinal] = Some(inferred);
        Ok(id)
    }

    fn store(&mut self, symbol: &Symbol, inferred: &InferredDomain, built: Materialized) -> ArrayId {
        let id = ArrayId(self.arrays.len());
        let (mut array, coordinate) = match built {
            Materialized::Scalar(array) | Materialized::Array(array) => (array, None),
            Materialized::RootCoordinate(array) => {
                let labels = array
                    .axis(0)
                    .map(|axis| axis.labels().to_vec())
                    .unwrap_or_default();
                (array, Some((None, labels)))
            }
            Materialized::SubsetCoordinate {
                array,
                parent,
                labels,
            } => (array, Some((Some(parent), labels))),
        };

        ArrayAttrs::new(symbol, inferred).write_into(&mut array.attrs);
        tracing::debug!(
            ordinal = symbol.ordinal,
            name = %symbol.name,
            shape = ?array.shape(),
            dims = ?array.dims(),
            "materialized"
        );
        self.arrays.push(array);

        if let Some((parent, labels)) = coordinate {
            self.coords.register(&symbol.name, parent, id, labels);
        }
        id
    }

    fn bind_alias(&mut self, ordinal: usize) -> Result<()> {
        if !matches!(self.states[ordinal], LoadState::Declared) {
            return Ok(());
        }
        let Some(alias) = self.catalog.by_ordinal(ordinal) else {
            return Err(DatasetError::OrdinalNotFound(ordinal));
        };
        let alias_name = alias.name.clone();
        let target = self
            .aliases
            .resolve(&alias_name)
            .ok_or_else(|| DatasetError::integrity(&alias_name, "alias has no parent"))?
            .to_string();
        let parent_ordinal = self.ordinal(&target)?;

        if self.kind_of(parent_ordinal) == Some(SymbolKind::Set) {
            recorded(self.drive(parent_ordinal))?;
        }

        let binding = self.aliases.bind(
            &alias_name,
            &self.catalog,
            &self.states[parent_ordinal],
            &self.coords,
        );
        match binding {
            AliasBinding::Shared { array, coord } => {
                if let Some(coord) = coord {
                    self.coords.bind_alias(&alias_name, coord);
                }
                tracing::debug!(alias = %alias_name, target = %target, "bound alias");
                self.states[ordinal] = LoadState::Materialized(array);
            }
            AliasBinding::Unsupported(reason) => {
                tracing::info!(alias = %alias_name, %reason, "alias not loaded");
                self.states[ordinal] = LoadState::Unsupported(reason);
            }
        }
        Ok(())
    }

    /// Make sure `name` is materialised and return its array id.
    pub fn ensure_materialized(&mut self, name: &str) -> Result<ArrayId> {
        let ordinal = self.ordinal(name)?;
        self.drive(ordinal)
    }

    /// The array of `name`, loading it on first access.
    pub fn get(&mut self, name: &str) -> Result<&LabeledArray> {
        let id = self.ensure_materialized(name)?;
        Ok(&self.arrays[id.0])
    }

    pub fn get_by_ordinal(&mut self, ordinal: usize) -> Result<&LabeledArray> {
        if self.catalog.by_ordinal(ordinal).is_none() {
            return Err(DatasetError::OrdinalNotFound(ordinal));
        }
        let id = self.drive(ordinal)?;
        Ok(&self.arrays[id.0])
    }

    pub fn array(&self, id: ArrayId) -> Option<&LabeledArray> {
        self.arrays.get(id.0)
    }

    /// Array id of `name` if it is already materialised; never loads.
    pub fn array_id(&self, name: &str) -> Option<ArrayId> {
        match self.states.get(self.catalog.ordinal_of(name)?)? {
            LoadState::Materialized(id) => Some(*id),
            _ => None,
        }
    }

    /// Names of loadable sets, aliases of sets included, in ordinal order.
    pub fn sets(&self) -> Vec<&str> {
        self.loadable()
            .filter(|symbol| match symbol.kind {
                SymbolKind::Set => true,
                SymbolKind::Alias => symbol
                    .alias_of
                    .as_deref()
                    .and_then(|parent| self.catalog.get(parent))
                    .is_some_and(|parent| parent.kind == SymbolKind::Set),
                _ => false,
            })
            .map(|symbol| symbol.name.as_str())
            .collect()
    }

    /// Names of loadable parameters, in ordinal order.
    pub fn parameters(&self) -> Vec<&str> {
        self.loadable()
            .filter(|symbol| symbol.kind == SymbolKind::Parameter)
            .map(|symbol| symbol.name.as_str())
            .collect()
    }

    fn loadable(&self) -> impl Iterator<Item = &Symbol> {
        self.catalog.iter().filter(|symbol| {
            !matches!(
                self.states[symbol.ordinal],
                LoadState::Skipped | LoadState::Unsupported(_)
            )
        })
    }

    /// The parent of an alias, or `name` itself for any other name, known to
    /// the container or not.
    pub fn dealias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.resolve(name).unwrap_or(name)
    }

    /// A copy of `name` restricted to its own dimensions.
    pub fn extract(&mut self, name: &str) -> Result<LabeledArray> {
        let id = self.ensure_materialized(name)?;
        let target = self.dealias(name).to_string();
        let ordinal = self.ordinal(&target)?;
        let symbol = self
            .catalog
            .by_ordinal(ordinal)
            .ok_or(DatasetError::OrdinalNotFound(ordinal))?;
        let domain = self.domains[ordinal]
            .as_ref()
            .map_or(symbol.domain.as_slice(), |d| d.domain.as_slice());

        let mut out = extract::extract(symbol, domain, &self.arrays[id.0], &self.coords)?;
        out.set_name(name);
        Ok(out)
    }

    /// One-line summary: type, name, declared domain, record count and
    /// description.
    pub fn describe(&self, name: &str) -> Result<String> {
        let symbol = self
            .catalog
            .get(name)
            .ok_or_else(|| DatasetError::NotFound(name.to_string()))?;
        let domain = if symbol.domain.is_empty() {
            String::new()
        } else {
            format!("({})", symbol.domain.join(","))
        };
        Ok(format!(
            "{} {}{}, {} records: {}",
            symbol.type_str(),
            symbol.name,
            domain,
            symbol.records,
            symbol.description
        ))
    }

    /// Elements of a set, without the empty placeholders of sub-set arrays.
    ///
    /// Multi-dimensional sets list their member tuples joined with `.`.
    pub fn set_elements(&mut self, name: &str) -> Result<Vec<String>> {
        self.ordinal(name)?;
        let target = self.dealias(name).to_string();
        let kind = self.catalog.get(&target).map(|s| s.kind);
        if kind != Some(SymbolKind::Set) {
            return Err(DatasetError::WrongKind {
                symbol: name.to_string(),
                expected: SymbolKind::Set.as_str(),
                actual: kind.unwrap_or(SymbolKind::Alias).as_str(),
            });
        }

        let array = self.get(name)?;
        Ok(match array.data() {
            ArrayData::Str(values) => values.iter().filter(|v| !v.is_empty()).cloned().collect(),
            _ => array
                .cells()
                .into_iter()
                .map(|(labels, _)| labels.join("."))
                .collect(),
        })
    }

    /// Every symbol in ordinal order with its current load state.
    pub fn symbols(&self) -> Vec<SymbolListing<'_>> {
        self.catalog
            .iter()
            .map(|symbol| SymbolListing {
                symbol,
                type_str: symbol.type_str(),
                state: self.states[symbol.ordinal].label(),
            })
            .collect()
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.catalog.get(name)
    }

    pub fn state(&self, name: &str) -> Result<StateLabel> {
        let ordinal = self.ordinal(name)?;
        Ok(self.states[ordinal].label())
    }

    /// The resolved domain of a materialised symbol.
    pub fn inferred_domain(&self, name: &str) -> Option<&InferredDomain> {
        self.domains.get(self.catalog.ordinal_of(name)?)?.as_ref()
    }

    pub fn attrs(&self) -> &FileAttrs {
        &self.attrs
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    pub fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    pub fn coords(&self) -> &CoordinateArena {
        &self.coords
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

fn initial_state(symbol: &Symbol, options: &OpenOptions) -> LoadState {
    if options.is_skipped(&symbol.name) {
        tracing::debug!(name = %symbol.name, "skipped by configuration");
        return LoadState::Skipped;
    }
    match symbol.kind {
        SymbolKind::Equation => {
            tracing::info!(
                ordinal = symbol.ordinal,
                name = %symbol.name,
                "loading of equations is not implemented; not loaded"
            );
            LoadState::Unsupported(UnsupportedReason::Equation)
        }
        _ => LoadState::Declared,
    }
}

fn is_same_as_artifact(symbol: &Symbol) -> bool {
    symbol.name == SAME_AS
        && symbol.records == 0
        && symbol.domain.len() == 2
        && symbol.domain.iter().all(|d| d == UNIVERSE)
}

/// Unsupported and skipped outcomes are already recorded in the load state.
fn recorded(result: Result<ArrayId>) -> Result<()> {
    match result {
        Ok(_) | Err(DatasetError::Unsupported { .. }) | Err(DatasetError::Skipped(_)) => Ok(()),
        Err(err) => Err(err),
    }
}
