//! gdxray: labeled dense arrays over GDX-style symbol containers
//!
//! A container holds named symbols (sets, parameters, variables, equations
//! and aliases) stored as sparse records. [`Dataset`] turns them into dense
//! [`LabeledArray`]s that share coordinates:
//!
//! 1. **Catalogue**: metadata for every symbol is read once at open.
//! 2. **Sets first**: every set is materialised at open; one-dimensional sets
//!    become coordinates other symbols are laid out over.
//! 3. **Domain inference**: a dimension declared over the universal set `*`
//!    is narrowed to the smallest coordinate holding all of its labels.
//! 4. **Lazy loading**: parameters and variables are streamed and
//!    materialised on first access unless [`OpenOptions::lazy`] is off.
//! 5. **Extraction**: [`Dataset::extract`] returns a self-contained copy over
//!    the symbol's own dimensions only.
//!
//! ```no_run
//! use gdxray::{Dataset, OpenOptions};
//!
//! let mut ds = Dataset::open("transport.gdt", OpenOptions::default())?;
//! println!("{}", ds.describe("d")?);
//! let d = ds.extract("d")?;
//! assert_eq!(d.dims(), vec!["i", "j"]);
//! # Ok::<(), gdxray::DatasetError>(())
//! ```

pub mod alias;
pub mod array;
pub mod catalog;
pub mod coords;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod infer;
pub mod materialize;
pub mod options;
pub mod state;

pub use array::{ArrayData, ArrayError, AuxCoord, Axis, DType, LabeledArray, Value};
pub use catalog::{Symbol, SymbolCatalog, SymbolKind, VarSubtype, UNIVERSE};
pub use dataset::{ArrayAttrs, Dataset, FileAttrs, SymbolListing, SAME_AS};
pub use error::{DatasetError, ErrorClass, Result, UnsupportedReason};
pub use infer::{DimOutcome, InferredDomain};
pub use options::OpenOptions;
pub use state::{ArrayId, LoadState, StateLabel};

pub use gdxray_source::{DumpSource, RecordSource};
