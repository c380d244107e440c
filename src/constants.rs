/// Defaults shared by the CLI, the config loader and the stores.

// Runtime settings
pub const DEFAULT_DB_PATH: &str = "scraper_data.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DB_PATH_ENV: &str = "TABSCRAPE_DB";
pub const LOG_DIR_ENV: &str = "TABSCRAPE_LOG_DIR";

// Request defaults
pub const DEFAULT_METHOD: &str = "GET";

/// Some sites (Yahoo Finance among them) refuse requests without a desktop browser agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

// Fixed columns written ahead of and after the selector columns
pub const SOURCE_COLUMN: &str = "source";
pub const LABEL_COLUMN: &str = "label";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Column names a selector may not use because the store already writes them.
pub fn reserved_columns() -> [&'static str; 3] {
    [SOURCE_COLUMN, LABEL_COLUMN, TIMESTAMP_COLUMN]
}
