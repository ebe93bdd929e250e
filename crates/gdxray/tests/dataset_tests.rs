use approx::assert_relative_eq;
use gdxray::{Dataset, DatasetError, ErrorClass, OpenOptions, StateLabel, UnsupportedReason, Value};
use gdxray_source::{
    codes, ContainerInfo, DumpSource, FileInfo, Record, RecordSource, SourceError, SymbolInfo,
    SymbolInfoExt,
};

fn open_with(text: &str, options: OpenOptions) -> Dataset {
    Dataset::from_source(DumpSource::from_text(text).expect("parse dump"), options)
        .expect("open dataset")
}

fn open(text: &str) -> Dataset {
    open_with(text, OpenOptions::default())
}

fn try_open(text: &str) -> Result<Dataset, DatasetError> {
    Dataset::from_source(DumpSource::from_text(text).expect("parse dump"), OpenOptions::default())
}

fn f(value: Value) -> f64 {
    value.as_f64().expect("float cell")
}

fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

const TRANSPORT: &str = r#"
version "GDX text dump 1"
producer "transport.gms"
set i(*) 2 "canning plants"
  seattle
  san-diego
set j(*) 3 "markets"
  new-york
  chicago
  topeka
parameter d(i,j) 2 "distance in thousands of miles"
  seattle.new-york 2.5
  san-diego.chicago 1.8
parameter f 1 "freight in dollars per case per thousand miles"
  90
variable x(i,j) 1 positive "shipment quantities in cases"
  seattle.new-york 50 0 0 inf 1
equation cost 1 "define objective function"
alias jj 0 "Aliased with j"
"#;

const SUBSETS: &str = r#"
universe a b c d
set i(*) 4 "all"
  a
  b
  c
  d
set s(i) 2 "subset of i"
  c
  a
parameter v(s) 2
  a 1
  c 3
parameter u(*) 1
  c 7
parameter w(*) 2
  a 5
  b 6
"#;

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[test]
fn scenario_a_universal_dimension_narrows_to_smallest_set() {
    let mut ds = open(
        "universe a b c d\nset i(*) 2\n  a\n  b\nparameter p(*) 2\n  b 2.0\n  a 1.0\n",
    );
    let p = ds.get("p").unwrap();
    assert_eq!(p.dims(), vec!["i"]);
    assert_eq!(p.shape(), vec![2]);
    assert_eq!(p.axes()[0].labels(), &strings(&["a", "b"])[..]);
    assert_relative_eq!(f(p.get(&["a"]).unwrap()), 1.0);
    assert_relative_eq!(f(p.get(&["b"]).unwrap()), 2.0);
    assert_eq!(p.attrs.get("inferred_domain").map(String::as_str), Some("i"));
    assert!(ds.inferred_domain("p").unwrap().is_narrowed());
}

#[test]
fn scenario_b_record_count_mismatch_fails_open_for_sets() {
    let err = try_open("set k(*) 3\n  a\n  b\n").err().expect("open must fail");
    assert_eq!(err.class(), ErrorClass::Integrity);
}

#[test]
fn scenario_b_record_count_mismatch_is_scoped_to_lazy_parameter() {
    let mut ds = open("set i(*) 1\n  a\nparameter q(*) 3\n  a 1\n  a 2\n");
    let err = ds.get("q").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Integrity);
    assert!(ds.get("i").is_ok());
}

#[test]
fn scenario_c_two_dimensional_set_is_boolean_matrix() {
    let mut ds = open(
        "set i(*) 2\n  a\n  b\nset j(*) 3\n  x\n  y\n  z\nset m(i,j) 1\n  a.x\n",
    );
    let m = ds.get("m").unwrap();
    assert_eq!(m.shape(), vec![2, 3]);
    assert_eq!(m.cells().len(), 1);
    assert_eq!(m.get(&["a", "x"]).unwrap(), Value::Bool(true));
    assert_eq!(m.get(&["b", "z"]).unwrap(), Value::Bool(false));
}

#[test]
fn scenario_d_alias_of_set_shares_parent_array() {
    let mut ds = open(TRANSPORT);
    let j = ds.get("j").unwrap().clone();
    let jj = ds.get("jj").unwrap().clone();
    assert_eq!(j, jj);
    assert_eq!(ds.array_id("j"), ds.array_id("jj"));
    assert_eq!(ds.dealias("jj"), "j");
    assert_eq!(ds.dealias("j"), "j");
    assert_eq!(ds.coords().id("jj"), ds.coords().id("j"));
}

// ----------------------------------------------------------------------------
// Lazy loading
// ----------------------------------------------------------------------------

#[test]
fn lazy_parameter_streams_once() {
    let mut ds = open(TRANSPORT);
    let ordinal = ds.catalog().ordinal_of("d").unwrap();
    assert_eq!(ds.state("d").unwrap(), StateLabel::Declared);
    assert_eq!(ds.source().streams_started(ordinal), 0);

    let first = ds.get("d").unwrap().clone();
    let second = ds.get("d").unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(ds.source().streams_started(ordinal), 1);
    assert_eq!(ds.state("d").unwrap(), StateLabel::Materialized);
}

#[test]
fn sets_are_loaded_at_open() {
    let ds = open(TRANSPORT);
    assert_eq!(ds.state("i").unwrap(), StateLabel::Materialized);
    assert_eq!(ds.state("*").unwrap(), StateLabel::Materialized);
    assert_eq!(ds.state("jj").unwrap(), StateLabel::Materialized);
}

#[test]
fn eager_loading_materialises_parameters_and_variables() {
    let ds = open_with(TRANSPORT, OpenOptions::new().lazy(false));
    for name in ["d", "f", "x"] {
        assert_eq!(ds.state(name).unwrap(), StateLabel::Materialized, "{name}");
    }
    assert_eq!(ds.state("cost").unwrap(), StateLabel::Unsupported);
}

#[test]
fn get_by_ordinal_matches_get_by_name() {
    let mut ds = open(TRANSPORT);
    let by_name = ds.get("d").unwrap().clone();
    let ordinal = ds.catalog().ordinal_of("d").unwrap();
    assert_eq!(ds.get_by_ordinal(ordinal).unwrap(), &by_name);
    assert!(matches!(
        ds.get_by_ordinal(99),
        Err(DatasetError::OrdinalNotFound(99))
    ));
}

// ----------------------------------------------------------------------------
// Values
// ----------------------------------------------------------------------------

#[test]
fn transport_parameters_and_scalars() {
    let mut ds = open(TRANSPORT);
    let d = ds.get("d").unwrap();
    assert_eq!(d.dims(), vec!["i", "j"]);
    assert_eq!(d.shape(), vec![2, 3]);
    assert_relative_eq!(f(d.get(&["san-diego", "chicago"]).unwrap()), 1.8);
    assert!(f(d.get(&["seattle", "topeka"]).unwrap()).is_nan());

    let freight = ds.get("f").unwrap();
    assert_eq!(freight.ndim(), 0);
    assert_relative_eq!(freight.scalar_value().unwrap(), 90.0);

    let x = ds.get("x").unwrap();
    assert_relative_eq!(f(x.get(&["seattle", "new-york"]).unwrap()), 50.0);
    assert_eq!(x.attrs.get("type").map(String::as_str), Some("positive variable"));
}

#[test]
fn universal_set_is_a_root_coordinate() {
    let mut ds = open(TRANSPORT);
    let star = ds.get("*").unwrap();
    assert_eq!(star.dims(), vec!["*"]);
    assert_eq!(star.size(), 5);
    assert_eq!(ds.attrs().element_count, 5);
}

#[test]
fn special_values_are_kept_as_present_cells() {
    let mut ds = open(
        "set i(*) 4\n  a\n  b\n  c\n  d\nparameter p(i) 3\n  a na\n  b 1\n  c undf\nparameter q(*) 2\n  b eps\n  d -inf\n",
    );
    let p = ds.get("p").unwrap();
    let cells = p.cells();
    assert_eq!(cells.len(), 3);
    assert_eq!(cells[0], (vec!["a"], Value::Float(codes::SV_NA)));
    assert_eq!(cells[2], (vec!["c"], Value::Float(codes::SV_UNDF)));
    assert!(f(p.get(&["d"]).unwrap()).is_nan());

    let q = ds.extract("q").unwrap();
    assert_eq!(q.cells().len(), 2);
    assert_eq!(f(q.get(&["d"]).unwrap()), f64::NEG_INFINITY);
    assert!(f(q.get(&["b"]).unwrap()).is_sign_negative());
}

// ----------------------------------------------------------------------------
// Sub-sets and extraction
// ----------------------------------------------------------------------------

#[test]
fn subset_is_laid_out_over_its_root() {
    let mut ds = open(SUBSETS);
    let s = ds.get("s").unwrap();
    assert_eq!(s.dims(), vec!["i"]);
    assert_eq!(s.get(&["c"]).unwrap(), Value::Str("c".into()));
    assert_eq!(s.get(&["b"]).unwrap(), Value::Str(String::new()));
    assert_eq!(ds.set_elements("s").unwrap(), strings(&["a", "c"]));
}

#[test]
fn parameter_over_subset_carries_subset_as_auxiliary() {
    let mut ds = open(SUBSETS);
    let v = ds.get("v").unwrap();
    assert_eq!(v.dims(), vec!["i"]);
    assert_eq!(v.shape(), vec![4]);
    assert_eq!(v.aux().len(), 1);
    assert_eq!(v.aux()[0].name, "s");
}

#[test]
fn extract_trims_to_subset_and_renames() {
    let mut ds = open(SUBSETS);
    let v = ds.extract("v").unwrap();
    assert_eq!(v.dims(), vec!["s"]);
    assert_eq!(v.axes()[0].labels(), &strings(&["a", "c"])[..]);
    assert!(v.aux().is_empty());
    assert_relative_eq!(f(v.get(&["c"]).unwrap()), 3.0);
}

#[test]
fn inference_can_choose_a_subset() {
    let mut ds = open(SUBSETS);
    assert_eq!(ds.get("u").unwrap().dims(), vec!["i"]);
    assert_eq!(ds.inferred_domain("u").unwrap().domain, strings(&["s"]));

    let u = ds.extract("u").unwrap();
    assert_eq!(u.dims(), vec!["s"]);
    assert_eq!(u.shape(), vec![2]);
}

#[test]
fn extract_drops_empty_slices_on_universal_dimensions() {
    let mut ds = open(SUBSETS);
    // {a, b} fits in `*` and `i` alike; `*` was registered first.
    assert_eq!(ds.inferred_domain("w"), None);
    assert_eq!(ds.get("w").unwrap().dims(), vec!["*"]);
    assert_eq!(ds.inferred_domain("w").unwrap().misses(), 1);

    let w = ds.extract("w").unwrap();
    assert_eq!(w.dims(), vec!["*"]);
    assert_eq!(w.axes()[0].labels(), &strings(&["a", "b"])[..]);
}

#[test]
fn extract_keeps_declared_dimensions() {
    let mut ds = open(TRANSPORT);
    let d = ds.extract("d").unwrap();
    assert_eq!(d.dims(), vec!["i", "j"]);
    assert_eq!(d.shape(), vec![2, 3]);
    assert_eq!(d.cells().len(), 2);
}

#[test]
fn set_over_universe_inside_earlier_set_becomes_subset() {
    let mut ds = open("universe a b c d\nset i(*) 3\n  a\n  b\n  c\nset t(*) 1\n  b\n");
    let t = ds.get("t").unwrap();
    assert_eq!(t.dims(), vec!["i"]);
    assert_eq!(ds.set_elements("t").unwrap(), strings(&["b"]));
    assert_eq!(ds.coords().by_name("t").unwrap().parent(), ds.coords().id("i"));
}

// ----------------------------------------------------------------------------
// Unsupported, skipped and missing symbols
// ----------------------------------------------------------------------------

#[test]
fn equations_are_listed_but_not_loadable() {
    let mut ds = open(TRANSPORT);
    assert_eq!(ds.state("cost").unwrap(), StateLabel::Unsupported);
    let err = ds.get("cost").unwrap_err();
    assert!(matches!(
        err,
        DatasetError::Unsupported {
            reason: UnsupportedReason::Equation,
            ..
        }
    ));
    assert!(ds.describe("cost").unwrap().starts_with("equation cost"));
}

#[test]
fn alias_of_parameter_is_unsupported_on_access() {
    let mut ds = open("parameter p(*) 1\n  a 1\nalias pp 0 \"Aliased with p\"\n");
    assert_eq!(ds.state("pp").unwrap(), StateLabel::Unsupported);
    assert_eq!(ds.dealias("pp"), "p");
    let err = ds.get("pp").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Unsupported);
    let msg = err.to_string();
    assert!(msg.contains("`pp`") && msg.contains("`p`"), "{msg}");
    assert!(ds.extract("pp").is_err());
}

#[test]
fn skipped_symbols_stay_listed_but_never_load() {
    let mut ds = open_with(TRANSPORT, OpenOptions::new().skip("d"));
    let ordinal = ds.catalog().ordinal_of("d").unwrap();
    assert!(matches!(ds.get("d"), Err(DatasetError::Skipped(_))));
    assert_eq!(ds.source().streams_started(ordinal), 0);
    assert!(!ds.parameters().contains(&"d"));
    assert!(ds
        .symbols()
        .iter()
        .any(|row| row.symbol.name == "d" && row.state == StateLabel::Skipped));
}

#[test]
fn skipped_set_is_not_an_inference_candidate() {
    let text = "set i(*) 2\n  a\n  b\nparameter p(*) 2\n  a 1\n  b 2\n";
    let mut ds = open_with(text, OpenOptions::new().skip("i"));
    assert_eq!(ds.get("p").unwrap().dims(), vec!["*"]);
}

#[test]
fn domain_over_skipped_set_is_unsupported() {
    let text = "set i(*) 1\n  a\nparameter p(i) 1\n  a 1\n";
    let mut ds = open_with(text, OpenOptions::new().skip("i"));
    let err = ds.get("p").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Unsupported);
    assert_eq!(ds.state("p").unwrap(), StateLabel::Unsupported);
}

#[test]
fn same_as_artifact_is_dropped() {
    let mut ds = open("set i(*) 1\n  a\nset SameAs(*,*) 0\n");
    assert_eq!(ds.state("SameAs").unwrap(), StateLabel::Skipped);
    assert!(!ds.sets().contains(&"SameAs"));
    assert!(matches!(ds.get("SameAs"), Err(DatasetError::Skipped(_))));
}

#[test]
fn domain_over_multi_dimensional_set_is_unsupported() {
    let mut ds = open("set m(*,*) 1\n  a.b\nparameter p(m) 0\n");
    let err = ds.get("p").unwrap_err();
    assert!(matches!(
        err,
        DatasetError::Unsupported {
            reason: UnsupportedReason::MultiDimensionalDomain { .. },
            ..
        }
    ));
}

#[test]
fn unknown_names_are_not_found() {
    let mut ds = open(TRANSPORT);
    assert_eq!(ds.get("nope").unwrap_err().class(), ErrorClass::NotFound);
    assert_eq!(ds.describe("nope").unwrap_err().class(), ErrorClass::NotFound);
    assert_eq!(ds.state("nope").unwrap_err().class(), ErrorClass::NotFound);
    assert_eq!(
        ds.set_elements("d").unwrap_err().class(),
        ErrorClass::NotFound
    );
    assert!(matches!(
        ds.set_elements("nope"),
        Err(DatasetError::NotFound(name)) if name == "nope"
    ));
    assert_eq!(ds.extract("nope").unwrap_err().class(), ErrorClass::NotFound);
}

#[test]
fn dealias_passes_other_names_through() {
    let ds = open(TRANSPORT);
    assert_eq!(ds.dealias("d"), "d");
    assert_eq!(ds.dealias("nope"), "nope");
}

#[test]
fn label_outside_declared_domain_fails_only_that_symbol() {
    let mut ds = open("set i(*) 1\n  a\nparameter p(i) 1\n  b 1\nparameter q(i) 1\n  a 2\n");
    assert_eq!(ds.get("p").unwrap_err().class(), ErrorClass::Integrity);
    assert_eq!(ds.state("p").unwrap(), StateLabel::DataCached);
    assert!(ds.get("q").is_ok());
}

// ----------------------------------------------------------------------------
// Listings and metadata
// ----------------------------------------------------------------------------

#[test]
fn sets_and_parameters_listings() {
    let ds = open(TRANSPORT);
    assert_eq!(ds.sets(), vec!["*", "i", "j", "jj"]);
    assert_eq!(ds.parameters(), vec!["d", "f"]);
}

#[test]
fn describe_renders_type_domain_and_description() {
    let ds = open(TRANSPORT);
    assert_eq!(
        ds.describe("d").unwrap(),
        "parameter d(i,j), 2 records: distance in thousands of miles"
    );
    assert_eq!(
        ds.describe("f").unwrap(),
        "scalar f, 1 records: freight in dollars per case per thousand miles"
    );
}

#[test]
fn file_attributes() {
    let ds = open(TRANSPORT);
    let attrs = ds.attrs();
    assert_eq!(attrs.version, "GDX text dump 1");
    assert_eq!(attrs.producer, "transport.gms");
    assert_eq!(attrs.symbol_count, 7);
    assert!(attrs.digest.as_deref().is_some_and(|d| d.starts_with("sha256:")));
}

#[test]
fn symbols_lists_every_ordinal_with_state() {
    let ds = open(TRANSPORT);
    let rows = ds.symbols();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0].symbol.name, "*");
    assert_eq!(rows[7].type_str, "alias");
    let json = serde_json::to_value(&rows[3]).unwrap();
    assert_eq!(json["name"], "d");
    assert_eq!(json["state"], "declared");
}

// ----------------------------------------------------------------------------
// Record sources
// ----------------------------------------------------------------------------

/// Reports end of data as an error instead of `None`.
struct ErrorAtEnd(DumpSource);

impl RecordSource for ErrorAtEnd {
    fn file_info(&self) -> FileInfo {
        self.0.file_info()
    }

    fn container_info(&self) -> ContainerInfo {
        self.0.container_info()
    }

    fn symbol_info(&self, ordinal: usize) -> Result<SymbolInfo, SourceError> {
        self.0.symbol_info(ordinal)
    }

    fn symbol_info_extended(&self, ordinal: usize) -> Result<SymbolInfoExt, SourceError> {
        self.0.symbol_info_extended(ordinal)
    }

    fn symbol_domain(&self, ordinal: usize) -> Result<Vec<String>, SourceError> {
        self.0.symbol_domain(ordinal)
    }

    fn start_record_stream(&mut self, ordinal: usize) -> Result<usize, SourceError> {
        self.0.start_record_stream(ordinal)
    }

    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        match self.0.next_record()? {
            Some(record) => Ok(Some(record)),
            None => Err(SourceError::NoActiveStream),
        }
    }
}

#[test]
fn end_of_data_error_at_expected_count_is_not_a_failure() {
    let source = ErrorAtEnd(DumpSource::from_text(TRANSPORT).unwrap());
    let mut ds = Dataset::from_source(source, OpenOptions::new().lazy(false)).unwrap();
    assert_eq!(ds.get("d").unwrap().cells().len(), 2);
}

#[test]
fn end_of_data_error_before_expected_count_is_a_source_error() {
    let source = ErrorAtEnd(DumpSource::from_text("set i(*) 2\n  a\n").unwrap());
    let err = Dataset::from_source(source, OpenOptions::default())
        .err()
        .expect("open must fail");
    assert_eq!(err.class(), ErrorClass::Source);
}
