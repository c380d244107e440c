use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use indexmap::IndexMap;

// Fetch-side ports
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: IndexMap<String, String>,
}

/// Response with the body already decoded to text using the declared charset.
#[derive(Clone, Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    /// Fails with `HttpStatus` unless the status is 2xx.
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(ScraperError::HttpStatus {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

// Parse-side ports
pub trait Document {
    /// Text of every node matching `selector`, in document order.
    fn select_texts(&self, selector: &str) -> Result<Vec<String>>;
}

pub trait DocumentParser: Send + Sync {
    fn parse(&self, body: &str) -> Result<Box<dyn Document>>;
}

/// Completion notices; purely for observability.
pub trait Reporter: Send + Sync {
    fn row_inserted(&self, table: &str, row_index: usize, values: &[Option<String>]);
    fn source_completed(&self, summary: &crate::pipeline::SourceSummary);
    fn source_failed(&self, source: &str, error: &ScraperError);
}

/// Reporter that drops every notice.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn row_inserted(&self, _table: &str, _row_index: usize, _values: &[Option<String>]) {}
    fn source_completed(&self, _summary: &crate::pipeline::SourceSummary) {}
    fn source_failed(&self, _source: &str, _error: &ScraperError) {}
}
