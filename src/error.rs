use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("HTTP request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Document parse failed: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Table '{table}' schema mismatch: {message}")]
    Schema { table: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization failed: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure classes a single source can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Fetch,
    Parse,
    Storage,
}

impl ScraperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::Config(_)
            | ScraperError::MissingField(_)
            | ScraperError::Selector { .. }
            | ScraperError::Toml(_)
            | ScraperError::TomlWrite(_)
            | ScraperError::Yaml(_)
            | ScraperError::Csv(_) => ErrorKind::Configuration,
            ScraperError::Fetch { .. } | ScraperError::HttpStatus { .. } => ErrorKind::Fetch,
            ScraperError::Parse(_) => ErrorKind::Parse,
            ScraperError::Storage(_)
            | ScraperError::Schema { .. }
            | ScraperError::Io(_)
            | ScraperError::Json(_)
            | ScraperError::Chart(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ScraperError::Config("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(
            ScraperError::Selector { selector: "[".into(), message: "bad".into() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ScraperError::HttpStatus { url: "u".into(), status: 404 }.kind(),
            ErrorKind::Fetch
        );
        assert_eq!(ScraperError::Parse("p".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            ScraperError::Storage(rusqlite::Error::InvalidQuery).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_status_message_names_url() {
        let err = ScraperError::HttpStatus { url: "https://x.test".into(), status: 503 };
        assert_eq!(err.to_string(), "HTTP request to https://x.test returned status 503");
    }
}
