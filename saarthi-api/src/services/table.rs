//! CSV parsing into an explicitly typed table
//!
//! Each column is classified exactly once, at parse time:
//! - **Numeric** when every non-missing cell parses as a float (a column with
//!   no observations at all is numeric too)
//! - **Categorical** otherwise
//!
//! Missing cells are the empty string plus the usual NA spellings. Header
//! names are de-duplicated (`a`, `a.1`) and blank headers become
//! `Unnamed: <index>`.

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::models::ColumnTable;

/// Cell spellings treated as missing
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Table parsing errors
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV at line {line}: {message}")]
    Malformed { line: u64, message: String },
}

/// Column family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    fn tag(self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl NumericColumn {
    /// Observed values in row order
    pub fn present(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// Observed values without `inf`/`-inf`, which parse as numbers but
    /// cannot be placed on a chart axis
    pub fn finite(&self) -> Vec<f64> {
        self.values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// A classified column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(NumericColumn),
    Categorical(CategoricalColumn),
}

impl Column {
    pub fn name(&self) -> &str {
        match self {
            Column::Numeric(c) => &c.name,
            Column::Categorical(c) => &c.name,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Numeric(_) => ColumnKind::Numeric,
            Column::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(c) => c.values.iter().filter(|v| v.is_none()).count(),
            Column::Categorical(c) => c.values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// JSON value of the cell at `row`; missing cells are null
    fn cell_json(&self, row: usize) -> Value {
        match self {
            Column::Numeric(c) => c
                .values
                .get(row)
                .copied()
                .flatten()
                .and_then(number_json)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Column::Categorical(c) => c
                .values
                .get(row)
                .cloned()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null),
        }
    }
}

/// Whole numbers serialize as integers (`25`, not `25.0`)
fn number_json(value: f64) -> Option<Number> {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

/// Largest magnitude below which every integer is exactly representable
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Parsed, classified table
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Parse a CSV file from disk
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path)?;
        Self::parse_csv(file)
    }

    /// Parse CSV from any reader; the first record is the header
    pub fn parse_csv<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header = reader
            .byte_headers()
            .map_err(|e| malformed(&e))?
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect::<Vec<_>>();
        let names = normalize_headers(header);

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        let mut row_count = 0usize;
        let mut record = csv::ByteRecord::new();

        while reader.read_byte_record(&mut record).map_err(|e| malformed(&e))? {
            if record.len() == 1 && record[0].is_empty() {
                continue; // blank line
            }
            if record.len() > names.len() {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(TableError::Malformed {
                    line,
                    message: format!(
                        "expected {} fields, saw {}",
                        names.len(),
                        record.len()
                    ),
                });
            }
            for (idx, cells) in raw.iter_mut().enumerate() {
                let cell = record
                    .get(idx)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
                cells.push(cell.filter(|c| !is_missing(c)));
            }
            row_count += 1;
        }

        let columns = names
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| classify(name, cells))
            .collect();

        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &NumericColumn> {
        self.columns.iter().filter_map(|c| match c {
            Column::Numeric(n) => Some(n),
            Column::Categorical(_) => None,
        })
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &CategoricalColumn> {
        self.columns.iter().filter_map(|c| match c {
            Column::Categorical(n) => Some(n),
            Column::Numeric(_) => None,
        })
    }

    pub fn has_numeric(&self) -> bool {
        self.numeric_columns().next().is_some()
    }

    pub fn has_categorical(&self) -> bool {
        self.categorical_columns().next().is_some()
    }

    /// SHA-256 over the ordered (name, kind) list
    ///
    /// Identifies the column composition charts were rendered for.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(column.name().as_bytes());
            hasher.update([0x1f]);
            hasher.update(column.kind().tag().as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn missing_counts(&self) -> ColumnTable<usize> {
        self.columns
            .iter()
            .map(|c| (c.name().to_string(), c.missing_count()))
            .collect()
    }

    /// First `limit` rows as column → value records
    pub fn head_records(&self, limit: usize) -> Vec<Map<String, Value>> {
        (0..self.row_count.min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name().to_string(), c.cell_json(row)))
                    .collect()
            })
            .collect()
    }
}

pub fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

fn malformed(err: &csv::Error) -> TableError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    TableError::Malformed {
        line,
        message: err.to_string(),
    }
}

fn normalize_headers(header: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn classify(name: String, cells: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(text) => text.trim().parse::<f64>().ok().map(Some),
        })
        .collect();

    match parsed {
        Some(values) => Column::Numeric(NumericColumn { name, values }),
        None => Column::Categorical(CategoricalColumn {
            name,
            values: cells,
        }),
    }
}
