//! GDX text dump (`.gdt`)
//!
//! A line-oriented, human-readable rendition of a symbol container. It carries
//! exactly what a [`RecordSource`](crate::RecordSource) exposes and nothing
//! more:
//!
//! ```text
//! version "GDX text dump 1"
//! producer "transport.gms"
//! universe seattle san-diego new-york
//!
//! set i(*) 2 "canning plants"
//!   seattle
//!   san-diego
//! parameter a(i) 2 "capacity of plant i in cases"
//!   seattle   350
//!   san-diego 600
//! variable x(i,j) 1 positive "shipment quantities in cases"
//!   seattle.new-york 50 0 0 inf 1
//! alias ii 0 "Aliased with i"
//! ```
//!
//! Notes:
//! - Declarations start in column 0; record lines are indented and belong to
//!   the most recent declaration.
//! - A record line holds exactly `dim` labels joined by `.`, followed by up to
//!   five values (level, marginal, lower, upper, scale).
//! - The declared record count is kept verbatim. It is not checked against the
//!   record lines here; that is the loader's job.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, digit1, multispace0, multispace1},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::{count, many1, separated_list1},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codes;
use crate::Record;

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Set,
    Parameter,
    Variable,
    Equation,
    Alias,
}

impl DeclKind {
    pub fn code(self) -> i32 {
        match self {
            DeclKind::Set => codes::DT_SET,
            DeclKind::Parameter => codes::DT_PAR,
            DeclKind::Variable => codes::DT_VAR,
            DeclKind::Equation => codes::DT_EQU,
            DeclKind::Alias => codes::DT_ALIAS,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DeclKind::Set => "set",
            DeclKind::Parameter => "parameter",
            DeclKind::Variable => "variable",
            DeclKind::Equation => "equation",
            DeclKind::Alias => "alias",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "set" => DeclKind::Set,
            "parameter" => DeclKind::Parameter,
            "variable" => DeclKind::Variable,
            "equation" => DeclKind::Equation,
            "alias" => DeclKind::Alias,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDecl {
    pub kind: DeclKind,
    pub name: String,
    pub domain: Vec<String>,
    pub record_count: usize,
    pub subtype_code: i32,
    pub description: String,
    pub records: Vec<Record>,
    /// 1-based line of the declaration.
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDump {
    pub version: String,
    pub producer: String,
    /// Labels registered up front by `universe` lines, in order.
    pub universe: Vec<String>,
    pub symbols: Vec<SymbolDecl>,
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Error)]
pub enum DumpParseError {
    #[error("parse error on line {line}: {message}")]
    Line { line: usize, message: String },
}

pub fn parse_dump(text: &str) -> Result<ContainerDump, DumpParseError> {
    let mut dump = ContainerDump::default();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let stripped = strip_comment(raw);
        if stripped.trim().is_empty() {
            continue;
        }
        let at_line = |message: String| DumpParseError::Line {
            line: line_no,
            message,
        };

        // Indented lines are records of the last declaration.
        if stripped.starts_with(char::is_whitespace) {
            let Some(symbol) = dump.symbols.last_mut() else {
                return Err(at_line(
                    "record line before any symbol declaration".to_string(),
                ));
            };
            let record = parse_record_line(stripped.trim(), symbol.domain.len()).map_err(at_line)?;
            symbol.records.push(record);
            continue;
        }

        let line = stripped.trim();

        if let Some(rest) = strip_keyword(line, "version") {
            dump.version = parse_text(rest).map_err(at_line)?;
            continue;
        }

        if let Some(rest) = strip_keyword(line, "producer") {
            dump.producer = parse_text(rest).map_err(at_line)?;
            continue;
        }

        if let Some(rest) = strip_keyword(line, "universe") {
            let labels = parse_label_list(rest).map_err(at_line)?;
            dump.universe.extend(labels);
            continue;
        }

        let decl = parse_symbol_decl(line, line_no).map_err(at_line)?;
        dump.symbols.push(decl);
    }

    Ok(dump)
}

/// Parse one value token, including the GAMS special values.
pub fn parse_value(token: &str) -> Result<f64, String> {
    match token.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        "na" | "nan" => Ok(codes::SV_NA),
        "undf" => Ok(codes::SV_UNDF),
        "eps" => Ok(-0.0),
        other => other
            .parse::<f64>()
            .map_err(|_| format!("invalid numeric value `{token}`")),
    }
}

/// Map a variable subtype keyword to its code.
pub fn subtype_code(word: &str) -> Option<i32> {
    Some(match word {
        "unknown" => codes::VT_UNKNOWN,
        "binary" => codes::VT_BINARY,
        "integer" => codes::VT_INTEGER,
        "positive" => codes::VT_POSITIVE,
        "negative" => codes::VT_NEGATIVE,
        "free" => codes::VT_FREE,
        "sos1" => codes::VT_SOS1,
        "sos2" => codes::VT_SOS2,
        "semicont" => codes::VT_SEMICONT,
        "semiint" => codes::VT_SEMIINT,
        _ => return None,
    })
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '#' => return &line[..i],
            None => {}
        }
    }
    line
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    )))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(pchar('\''), take_while(|c| c != '\''), pchar('\'')),
        delimited(pchar('"'), take_while(|c| c != '"'), pchar('"')),
    ))(input)
}

fn label(input: &str) -> IResult<&str, &str> {
    alt((quoted, take_while1(is_label_char)))(input)
}

fn dimension(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, alt((tag("*"), parse_ident)))(input)
}

fn parse_text(rest: &str) -> Result<String, String> {
    if rest.starts_with('\'') || rest.starts_with('"') {
        all_consuming(quoted)(rest)
            .map(|(_, text)| text.to_string())
            .map_err(|_| format!("unterminated quoted text: {rest}"))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_label_list(rest: &str) -> Result<Vec<String>, String> {
    all_consuming(delimited(
        multispace0,
        many1(preceded(multispace0, label)),
        multispace0,
    ))(rest)
    .map(|(_, labels)| labels.into_iter().map(str::to_string).collect())
    .map_err(|_| "universe expects one or more labels".to_string())
}

type DeclParts<'a> = (
    &'a str,
    &'a str,
    Option<Vec<&'a str>>,
    usize,
    Option<&'a str>,
    Option<&'a str>,
);

fn parse_symbol_decl(line: &str, line_no: usize) -> Result<SymbolDecl, String> {
    fn parser(input: &str) -> IResult<&str, DeclParts<'_>> {
        let (input, kind) = parse_ident(input)?;
        let (input, _) = multispace1(input)?;
        let (input, name) = parse_ident(input)?;
        let (input, domain) = opt(delimited(
            preceded(multispace0, pchar('(')),
            separated_list1(preceded(multispace0, pchar(',')), dimension),
            preceded(multispace0, pchar(')')),
        ))(input)?;
        let (input, _) = multispace1(input)?;
        let (input, records) = map_res(digit1, |s: &str| s.parse::<usize>())(input)?;
        let (input, subtype) = opt(preceded(multispace1, parse_ident))(input)?;
        let (input, description) = opt(preceded(multispace0, quoted))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, (kind, name, domain, records, subtype, description)))
    }

    let (_, (kind, name, domain, record_count, subtype, description)) = all_consuming(parser)(line)
        .map_err(|_| {
            format!(
                "declaration expects: `<kind> name[(dim, ...)] <records> [subtype] [\"description\"]`, got: {line}"
            )
        })?;

    let kind = DeclKind::from_keyword(kind)
        .ok_or_else(|| format!("unknown declaration kind `{kind}`"))?;

    let subtype_code = match subtype {
        None => codes::VT_UNKNOWN,
        Some(word) if kind == DeclKind::Variable => {
            subtype_code(word).ok_or_else(|| format!("unknown variable subtype `{word}`"))?
        }
        Some(word) => {
            return Err(format!(
                "subtype `{word}` given for {} `{name}`; only variables have subtypes",
                kind.keyword()
            ))
        }
    };

    Ok(SymbolDecl {
        kind,
        name: name.to_string(),
        domain: domain
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect(),
        record_count,
        subtype_code,
        description: description.unwrap_or_default().to_string(),
        records: Vec::new(),
        line: line_no,
    })
}

fn parse_record_line(line: &str, dim: usize) -> Result<Record, String> {
    fn labels(input: &str, dim: usize) -> IResult<&str, Vec<&str>> {
        if dim == 0 {
            return Ok((input, Vec::new()));
        }
        let (input, first) = label(input)?;
        let (input, mut rest) = count(preceded(pchar('.'), label), dim - 1)(input)?;
        rest.insert(0, first);
        Ok((input, rest))
    }

    let (rest, labels) =
        labels(line, dim).map_err(|_| format!("expected {dim} dot-separated labels: {line}"))?;
    if dim > 0 && !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(format!("unexpected `{rest}` after {dim} labels"));
    }

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() > codes::VAL_SLOTS {
        return Err(format!(
            "at most {} values per record, got {}",
            codes::VAL_SLOTS,
            tokens.len()
        ));
    }

    let mut values = [0.0; codes::VAL_SLOTS];
    for (slot, token) in tokens.iter().enumerate() {
        values[slot] = parse_value(token)?;
    }

    Ok(Record {
        labels: labels.into_iter().map(str::to_string).collect(),
        values,
    })
}
