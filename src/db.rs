use crate::app::ports::Reporter;
use crate::constants::{LABEL_COLUMN, SOURCE_COLUMN, TIMESTAMP_COLUMN};
use crate::error::Result;
use crate::storage::{project_row, RecordStore};
use crate::types::SourceRecord;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Double-quotes an SQL identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &str, columns: &[String]) -> String {
    let value_columns: Vec<String> = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} TEXT, {} TEXT, {}, {} DATETIME DEFAULT CURRENT_TIMESTAMP)",
        quote_ident(table),
        SOURCE_COLUMN,
        LABEL_COLUMN,
        value_columns.join(", "),
        TIMESTAMP_COLUMN
    )
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len() + 3).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}, {}, {}, {}) VALUES ({})",
        quote_ident(table),
        SOURCE_COLUMN,
        LABEL_COLUMN,
        names.join(", "),
        TIMESTAMP_COLUMN,
        placeholders.join(", ")
    )
}

/// SQLite-backed store. One connection for the whole run, one transaction per source.
pub struct SqliteStore {
    conn: Connection,
    reset_tables: HashSet<String>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened store at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            reset_tables: HashSet::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn persist(
        &mut self,
        table: &str,
        record: &SourceRecord,
        overwrite: bool,
        reporter: &dyn Reporter,
    ) -> Result<usize> {
        let reset = overwrite && !self.reset_tables.contains(table);
        let timestamp = record.timestamp_text();
        let projected: Vec<Vec<Option<String>>> =
            record.matrix.rows().iter().map(project_row).collect();

        // dropped on error, which rolls the whole source back
        let tx = self.conn.transaction()?;
        if reset {
            debug!(table, "dropping table before insert");
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
        }
        tx.execute(&create_table_sql(table, &record.columns), [])?;
        {
            let mut stmt = tx.prepare(&insert_sql(table, &record.columns))?;
            for values in &projected {
                let params = std::iter::once(Some(record.source_url.clone()))
                    .chain(std::iter::once(Some(record.label.clone())))
                    .chain(values.iter().cloned())
                    .chain(std::iter::once(Some(timestamp.clone())));
                stmt.execute(params_from_iter(params))?;
            }
        }
        tx.commit()?;

        if reset {
            self.reset_tables.insert(table.to_string());
        }
        for (i, values) in projected.iter().enumerate() {
            reporter.row_inserted(table, i, values);
        }
        Ok(projected.len())
    }
}

/// Opens an existing database for reading. A missing file is an error, never created.
pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path.as_ref(),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(t) => Some(t),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Stored tables with their row counts, sorted by name.
pub fn list_tables(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
            [],
            |row| row.get(0),
        )?;
        out.push((name, count));
    }
    Ok(out)
}

/// Two-column read for charting. `filter` is a raw SQL `WHERE` clause.
pub fn fetch_xy(
    conn: &Connection,
    table: &str,
    x: &str,
    y: &str,
    filter: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<(Option<String>, Option<String>)>> {
    let mut sql = format!(
        "SELECT {}, {} FROM {}",
        quote_ident(x),
        quote_ident(y),
        quote_ident(table)
    );
    if let Some(f) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(f);
    }
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }
    debug!(%sql, "fetching chart data");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                value_to_string(row.get::<_, Value>(0)?),
                value_to_string(row.get::<_, Value>(1)?),
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::NullReporter;
    use crate::types::{Matrix, TypedCell};
    use chrono::Utc;

    fn record(values: &[Option<TypedCell>]) -> SourceRecord {
        let rows = values.iter().map(|v| vec![v.clone(), None]).collect();
        SourceRecord {
            source_url: "https://example.com/q".into(),
            label: "Quotes".into(),
            columns: vec!["price".into(), "note".into()],
            matrix: Matrix::from_rows(2, rows).unwrap(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_persist_writes_text_and_nulls() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let rec = record(&[Some(TypedCell::Number(1234.5)), Some(TypedCell::Text("n/a".into()))]);
        let n = store.persist("quotes", &rec, false, &NullReporter).unwrap();
        assert_eq!(n, 2);

        let rows = fetch_xy(store.connection(), "quotes", "price", "note", None, None).unwrap();
        assert_eq!(
            rows,
            vec![(Some("1234.5".to_string()), None), (Some("n/a".to_string()), None)]
        );

        let (source, label, ts): (String, String, String) = store
            .connection()
            .query_row("SELECT source, label, timestamp FROM quotes LIMIT 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(source, "https://example.com/q");
        assert_eq!(label, "Quotes");
        assert_eq!(ts, rec.timestamp_text());
    }

    #[test]
    fn test_overwrite_replaces_previous_run() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let rec = record(&vec![Some(TypedCell::Number(1.0)); 3]);
        store.persist("t", &rec, false, &NullReporter).unwrap();
        store.persist("t", &rec, false, &NullReporter).unwrap();
        assert_eq!(list_tables(store.connection()).unwrap(), vec![("t".to_string(), 6)]);

        // a new run: fresh store over the same connection
        let mut next = SqliteStore::from_connection(store.conn);
        let rec = record(&vec![Some(TypedCell::Number(2.0)); 2]);
        next.persist("t", &rec, true, &NullReporter).unwrap();
        assert_eq!(list_tables(next.connection()).unwrap(), vec![("t".to_string(), 2)]);
    }

    #[test]
    fn test_failed_insert_rolls_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("CREATE TABLE t (source TEXT, label TEXT, price TEXT, timestamp DATETIME)")
            .unwrap();
        store
            .connection()
            .execute("INSERT INTO t (source, label, price) VALUES ('s', 'l', '1')", [])
            .unwrap();

        // "note" does not exist in the pre-made table
        let rec = record(&[Some(TypedCell::Number(5.0))]);
        let err = store.persist("t", &rec, false, &NullReporter).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
        assert_eq!(list_tables(store.connection()).unwrap(), vec![("t".to_string(), 1)]);
    }

    #[test]
    fn test_fetch_xy_with_filter_and_limit() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let rec = record(&[
            Some(TypedCell::Number(1.0)),
            Some(TypedCell::Number(2.0)),
            Some(TypedCell::Number(3.0)),
        ]);
        store.persist("t", &rec, false, &NullReporter).unwrap();
        let rows = fetch_xy(
            store.connection(),
            "t",
            "label",
            "price",
            Some("price != '2'"),
            Some(1),
        )
        .unwrap();
        assert_eq!(rows, vec![(Some("Quotes".to_string()), Some("1".to_string()))]);
    }

    #[test]
    fn test_read_only_open_never_creates_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nested").join("absent.db");
        assert!(open_read_only(&missing).is_err());
        assert!(!missing.exists());
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn test_read_only_open_reads_but_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut store = SqliteStore::open(&path).unwrap();
        store
            .persist("t", &record(&[Some(TypedCell::Number(1.0))]), false, &NullReporter)
            .unwrap();
        drop(store);

        let conn = open_read_only(&path).unwrap();
        assert_eq!(list_tables(&conn).unwrap(), vec![("t".to_string(), 1)]);
        assert!(conn.execute("DELETE FROM t", []).is_err());
    }
}
