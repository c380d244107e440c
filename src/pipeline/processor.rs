use crate::app::ports::{DocumentParser, FetchRequest, HttpClientPort, Reporter};
use crate::config::{SourceConfig, SourceEntry};
use crate::error::{ErrorKind, Result, ScraperError};
use crate::pipeline::assemble::{AlignmentPolicy, PadByIndex};
use crate::pipeline::extract::extract;
use crate::storage::RecordStore;
use crate::types::{Column, SourceRecord};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Fetch, parse, extract and assemble for a single source.
pub struct SourceProcessor {
    http: Arc<dyn HttpClientPort>,
    parser: Arc<dyn DocumentParser>,
    alignment: Arc<dyn AlignmentPolicy>,
}

impl SourceProcessor {
    pub fn new(http: Arc<dyn HttpClientPort>, parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            http,
            parser,
            alignment: Arc::new(PadByIndex),
        }
    }

    pub fn with_alignment(mut self, alignment: Arc<dyn AlignmentPolicy>) -> Self {
        self.alignment = alignment;
        self
    }

    /// Any fetch, parse or selector failure aborts the source; no partial record is produced.
    #[instrument(skip(self, source), fields(source = %source.name, url = %source.url))]
    pub async fn process(&self, source: &SourceConfig) -> Result<SourceRecord> {
        let request = FetchRequest {
            url: source.url.clone(),
            method: source.method.clone(),
            headers: source.request_headers(),
        };

        info!("📡 Fetching {}", source.url);
        let response = self
            .http
            .fetch(&request)
            .await?
            .error_for_status(&source.url)?;
        debug!(status = response.status, bytes = response.body.len(), "fetched");

        let document = self.parser.parse(&response.body)?;

        let mut columns = Vec::with_capacity(source.selectors.len());
        for (index, (name, selector)) in source.selectors.iter().enumerate() {
            let cells = extract(document.as_ref(), index, selector)?;
            columns.push(Column::new(name, cells));
        }

        let matrix = self.alignment.align(&columns);
        info!(
            rows = matrix.len(),
            columns = matrix.width(),
            policy = self.alignment.name(),
            "assembled matrix"
        );

        Ok(SourceRecord {
            source_url: source.url.clone(),
            label: source.effective_label(),
            columns: source.selectors.column_names(),
            matrix,
            timestamp: Utc::now(),
        })
    }
}

/// What a successfully stored source produced.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub table: String,
    pub url: String,
    pub label: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ScraperError> for SourceFailure {
    fn from(err: &ScraperError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub name: String,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeResult {
    Stored(SourceSummary),
    Failed(SourceFailure),
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, OutcomeResult::Stored(_))
    }
}

/// Per-source results of one run, in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &SourceSummary> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            OutcomeResult::Stored(s) => Some(s),
            OutcomeResult::Failed(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &SourceFailure)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            OutcomeResult::Failed(f) => Some((o.name.as_str(), f)),
            OutcomeResult::Stored(_) => None,
        })
    }

    pub fn total_rows(&self) -> usize {
        self.succeeded().map(|s| s.rows).sum()
    }
}

/// Runs sources strictly one after another; a failing source never stops the batch.
pub struct BatchRunner<S: RecordStore> {
    processor: SourceProcessor,
    store: S,
    reporter: Arc<dyn Reporter>,
}

impl<S: RecordStore> BatchRunner<S> {
    pub fn new(processor: SourceProcessor, store: S, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            processor,
            store,
            reporter,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub async fn run(&mut self, sources: Vec<SourceEntry>, overwrite: bool) -> BatchReport {
        let mut report = BatchReport::default();
        info!("🚀 Starting batch of {} sources", sources.len());

        for entry in sources {
            let name = entry.name.clone();
            let result = match self.run_source(entry, overwrite).await {
                Ok(summary) => {
                    self.reporter.source_completed(&summary);
                    OutcomeResult::Stored(summary)
                }
                Err(e) => {
                    error!(source = %name, kind = ?e.kind(), "source failed: {}", e);
                    self.reporter.source_failed(&name, &e);
                    OutcomeResult::Failed(SourceFailure::from(&e))
                }
            };
            report.outcomes.push(SourceOutcome { name, result });
        }

        info!(
            "✅ Batch finished: {} stored, {} failed, {} rows",
            report.succeeded().count(),
            report.failed().count(),
            report.total_rows()
        );
        report
    }

    async fn run_source(&mut self, entry: SourceEntry, overwrite: bool) -> Result<SourceSummary> {
        let config = entry.config?;
        let record = self.processor.process(&config).await?;
        let table = config.table_name().to_string();
        let rows = self
            .store
            .persist(&table, &record, overwrite, self.reporter.as_ref())?;

        Ok(SourceSummary {
            name: config.name.clone(),
            table,
            url: record.source_url,
            label: record.label,
            rows,
            columns: record.columns,
        })
    }
}
