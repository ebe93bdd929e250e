//! gdxray CLI
//!
//! Inspect GDX text dumps (`.gdt`) from the command line:
//! - container attributes and the symbol listing
//! - one-line symbol descriptions
//! - materialised and extracted arrays, as text or JSON

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gdxray::{Dataset, LabeledArray, OpenOptions, StateLabel, Value};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "gdxray")]
#[command(author, version, about = "gdxray: labeled arrays from GDX symbol containers")]
struct Cli {
    #[command(flatten)]
    load: LoadArgs,
    /// Log loading steps at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoadArgs {
    /// Load parameters and variables at open instead of on first access
    #[arg(long, global = true)]
    eager: bool,
    /// Comma-separated symbols never to load
    #[arg(long, global = true, value_delimiter = ',')]
    skip: Vec<String>,
}

impl LoadArgs {
    fn options(&self) -> OpenOptions {
        OpenOptions::new()
            .lazy(!self.eager)
            .skip_all(self.skip.iter().cloned())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Container attributes: version, producer, counts and digest
    Info {
        /// Input dump
        input: PathBuf,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// One line per symbol: ordinal, kind, name, domain, records, load state
    List {
        /// Input dump
        input: PathBuf,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe one symbol
    Describe {
        /// Input dump
        input: PathBuf,
        /// Symbol name
        name: String,
    },

    /// Print a symbol's materialised array
    Show {
        /// Input dump
        input: PathBuf,
        /// Symbol name
        name: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a symbol restricted to its own dimensions
    Extract {
        /// Input dump
        input: PathBuf,
        /// Symbol name
        name: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let options = cli.load.options();

    match cli.command {
        Commands::Info { input, json } => cmd_info(&input, options, json),
        Commands::List { input, json } => cmd_list(&input, options, json),
        Commands::Describe { input, name } => {
            let ds = open(&input, options)?;
            println!("{}", ds.describe(&name)?);
            Ok(())
        }
        Commands::Show { input, name, json } => {
            let mut ds = open(&input, options)?;
            let array = ds
                .get(&name)
                .with_context(|| format!("loading `{name}`"))?;
            print_array(array, json)
        }
        Commands::Extract { input, name, json } => {
            let mut ds = open(&input, options)?;
            let array = ds
                .extract(&name)
                .with_context(|| format!("extracting `{name}`"))?;
            print_array(&array, json)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = if verbose == 0 { "warn" } else { "debug" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open(input: &Path, options: OpenOptions) -> Result<Dataset> {
    tracing::debug!(path = %input.display(), lazy = options.lazy, "opening");
    Dataset::open(input, options).with_context(|| format!("opening {}", input.display()))
}

fn cmd_info(input: &Path, options: OpenOptions, json: bool) -> Result<()> {
    let ds = open(input, options)?;
    let attrs = ds.attrs();
    if json {
        println!("{}", serde_json::to_string_pretty(attrs)?);
        return Ok(());
    }
    println!("{} {}", "Container".green().bold(), input.display());
    println!("  version:   {}", attrs.version);
    println!("  producer:  {}", attrs.producer);
    println!("  symbols:   {}", attrs.symbol_count);
    println!("  elements:  {}", attrs.element_count);
    if let Some(digest) = &attrs.digest {
        println!("  digest:    {digest}");
    }
    Ok(())
}

fn cmd_list(input: &Path, options: OpenOptions, json: bool) -> Result<()> {
    let ds = open(input, options)?;
    let rows = ds.symbols();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in rows {
        let domain = if row.symbol.domain.is_empty() {
            String::new()
        } else {
            format!("({})", row.symbol.domain.join(","))
        };
        let state = match row.state {
            StateLabel::Materialized => row.state.as_str().green(),
            StateLabel::Declared | StateLabel::DataCached => row.state.as_str().normal(),
            StateLabel::Skipped => row.state.as_str().yellow(),
            StateLabel::Unsupported => row.state.as_str().red(),
        };
        println!(
            "{:>4}  {:<20} {}{}  {} records  {}",
            row.symbol.ordinal,
            row.type_str,
            row.symbol.name.bold(),
            domain,
            row.symbol.records,
            state
        );
    }
    Ok(())
}

fn print_array(array: &LabeledArray, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(array)?);
        return Ok(());
    }

    let dims = array.dims();
    println!(
        "{} {}({}) {} {:?}",
        array.dtype().as_str().cyan(),
        array.name().bold(),
        dims.join(","),
        "shape".dimmed(),
        array.shape()
    );
    if let Some(value) = array.scalar_value() {
        println!("  {value}");
        return Ok(());
    }
    for (labels, value) in array.cells() {
        let value = match value {
            Value::Str(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Float(x) => x.to_string(),
        };
        println!("  {}  {}", labels.join("."), value);
    }
    for aux in array.aux() {
        println!("  {} {} along axis {}", "aux".dimmed(), aux.name, aux.axis);
    }
    Ok(())
}
