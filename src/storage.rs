use crate::app::ports::Reporter;
use crate::error::{Result, ScraperError};
use crate::types::{Row, SourceRecord};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Storage trait for persisting source records.
///
/// A record is written as one unit: either every row lands or none do.
pub trait RecordStore {
    /// Writes `record` into `table`, returning the number of rows inserted.
    fn persist(
        &mut self,
        table: &str,
        record: &SourceRecord,
        overwrite: bool,
        reporter: &dyn Reporter,
    ) -> Result<usize>;
}

/// Serialization boundary: every cell becomes text, absent cells become NULL.
pub fn project_row(row: &Row) -> Vec<Option<String>> {
    row.iter()
        .map(|cell| cell.as_ref().map(|c| c.to_storage_text()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub source: String,
    pub label: String,
    pub values: Vec<Option<String>>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct StoredTable {
    pub columns: Vec<String>,
    pub rows: Vec<StoredRow>,
}

/// In-memory storage implementation for development/testing
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: HashMap<String, StoredTable>,
    reset_tables: HashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&StoredTable> {
        self.tables.get(name)
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.tables.get(name).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Forget which tables were reset, as if a new run started.
    pub fn begin_run(&mut self) {
        self.reset_tables.clear();
    }
}

impl RecordStore for InMemoryStore {
    fn persist(
        &mut self,
        table: &str,
        record: &SourceRecord,
        overwrite: bool,
        reporter: &dyn Reporter,
    ) -> Result<usize> {
        if let Some(existing) = self.tables.get(table) {
            let reset = overwrite && !self.reset_tables.contains(table);
            if !reset && existing.columns != record.columns {
                return Err(ScraperError::Schema {
                    table: table.to_string(),
                    message: format!("existing columns {:?}", existing.columns),
                });
            }
        }

        // build the full batch first so a failure leaves the table untouched
        let timestamp = record.timestamp_text();
        let rows: Vec<StoredRow> = record
            .matrix
            .rows()
            .iter()
            .map(|row| StoredRow {
                source: record.source_url.clone(),
                label: record.label.clone(),
                values: project_row(row),
                timestamp: timestamp.clone(),
            })
            .collect();

        if overwrite && self.reset_tables.insert(table.to_string()) {
            debug!(table, "dropping table before insert");
            self.tables.remove(table);
        }
        let entry = self
            .tables
            .entry(table.to_string())
            .or_insert_with(|| StoredTable {
                columns: record.columns.clone(),
                rows: Vec::new(),
            });

        let inserted = rows.len();
        for row in rows {
            reporter.row_inserted(table, entry.rows.len(), &row.values);
            entry.rows.push(row);
        }
        Ok(inserted)
    }
}
