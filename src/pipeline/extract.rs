use crate::app::ports::Document;
use crate::error::Result;
use crate::pipeline::coerce::coerce;
use crate::types::{RawMatch, TypedCell};
use tracing::debug;

/// Raw text matches for one column, in document order.
pub fn raw_matches(document: &dyn Document, column: usize, selector: &str) -> Result<Vec<RawMatch>> {
    let texts = document.select_texts(selector)?;
    Ok(texts
        .into_iter()
        .map(|text| RawMatch { column, text })
        .collect())
}

/// Applies one selector and coerces every match. Zero matches is an empty column, not an error.
pub fn extract(document: &dyn Document, column: usize, selector: &str) -> Result<Vec<TypedCell>> {
    let matches = raw_matches(document, column, selector)?;
    debug!(column, selector, matches = matches.len(), "extracted column");
    Ok(matches.iter().map(|m| coerce(&m.text)).collect())
}
