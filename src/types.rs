use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A single text fragment pulled out of a document, tagged with the column it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub column: usize,
    pub text: String,
}

/// A coerced cell value. Dates are always held as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedCell {
    Number(f64),
    Date(String),
    Text(String),
}

impl TypedCell {
    /// Projection used at the storage boundary; the store keeps every value as text.
    pub fn to_storage_text(&self) -> String {
        match self {
            TypedCell::Number(n) => n.to_string(),
            TypedCell::Date(d) => d.clone(),
            TypedCell::Text(t) => t.clone(),
        }
    }
}

impl fmt::Display for TypedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_text())
    }
}

/// One named column of extracted cells, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<TypedCell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<TypedCell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

pub type Row = Vec<Option<TypedCell>>;

/// Rectangular row-major table; every row is exactly `width` cells wide.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Matrix {
    width: usize,
    rows: Vec<Row>,
}

impl Matrix {
    pub fn empty(width: usize) -> Self {
        Self {
            width,
            rows: Vec::new(),
        }
    }

    /// Builds a matrix from rows, rejecting any row whose length differs from `width`.
    pub fn from_rows(width: usize, rows: Vec<Row>) -> Option<Self> {
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Some(Self { width, rows })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TypedCell> {
        self.rows.get(row)?.get(col)?.as_ref()
    }
}

/// Output of processing one configured source, handed to the store as a unit.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub source_url: String,
    pub label: String,
    pub columns: Vec<String>,
    pub matrix: Matrix,
    pub timestamp: DateTime<Utc>,
}

impl SourceRecord {
    /// Timestamp in the same layout SQLite's `CURRENT_TIMESTAMP` produces.
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
