use crate::app::ports::{Document, DocumentParser};
use crate::error::{Result, ScraperError};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// CSS-selector documents backed by the `scraper` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    /// html5ever recovers from any markup, so this adapter never reports `Parse`.
    fn parse(&self, body: &str) -> Result<Box<dyn Document>> {
        let document = Html::parse_document(body);
        if !document.errors.is_empty() {
            debug!(errors = document.errors.len(), "html5ever recovered from markup errors");
        }
        Ok(Box::new(HtmlDocument { document }))
    }
}

pub struct HtmlDocument {
    document: Html,
}

impl Document for HtmlDocument {
    fn select_texts(&self, selector: &str) -> Result<Vec<String>> {
        let parsed = Selector::parse(selector).map_err(|e| ScraperError::Selector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })?;
        Ok(self.document.select(&parsed).map(element_text).collect())
    }
}

/// Text nodes trimmed one by one, blanks dropped, joined with no separator.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}
