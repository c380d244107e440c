use crate::app::ports::Reporter;
use crate::error::ScraperError;
use crate::pipeline::SourceSummary;
use metrics::counter;
use tracing::{debug, info, warn};

/// Logs completion notices and bumps counters on the global `metrics` recorder.
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn row_inserted(&self, table: &str, row_index: usize, values: &[Option<String>]) {
        debug!(table, row = row_index, ?values, "inserted row");
        counter!("tabscrape_rows_inserted_total", "table" => table.to_string()).increment(1);
    }

    fn source_completed(&self, summary: &SourceSummary) {
        info!(
            source = %summary.name,
            table = %summary.table,
            rows = summary.rows,
            "💾 Stored source"
        );
        counter!("tabscrape_sources_stored_total").increment(1);
    }

    fn source_failed(&self, source: &str, error: &ScraperError) {
        warn!(source, kind = ?error.kind(), "⚠️  Source skipped: {}", error);
        counter!("tabscrape_sources_failed_total").increment(1);
    }
}
