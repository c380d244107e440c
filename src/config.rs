use crate::constants::{
    reserved_columns, DB_PATH_ENV, DEFAULT_DB_PATH, DEFAULT_LOG_DIR, DEFAULT_METHOD,
    DEFAULT_USER_AGENT, LOG_DIR_ENV,
};
use crate::error::{Result, ScraperError};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ordered column name -> selector mapping. Insertion order is output column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, String>")]
pub struct SelectorSet(IndexMap<String, String>);

impl SelectorSet {
    pub fn new(entries: IndexMap<String, String>) -> Result<Self> {
        Self::validated(entries).map_err(ScraperError::Config)
    }

    fn validated(entries: IndexMap<String, String>) -> std::result::Result<Self, String> {
        if entries.is_empty() {
            return Err("selector set must contain at least one column".to_string());
        }

        let mut seen = HashSet::new();
        let mut cleaned = IndexMap::with_capacity(entries.len());
        for (name, query) in entries {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err("selector column name is empty".to_string());
            }
            let lowered = name.to_lowercase();
            if reserved_columns().contains(&lowered.as_str()) {
                return Err(format!("selector column '{}' clashes with a reserved column", name));
            }
            // SQLite column names compare case-insensitively
            if !seen.insert(lowered) {
                return Err(format!("duplicate selector column '{}'", name));
            }
            let query = query.trim().to_string();
            if query.is_empty() {
                return Err(format!("selector for column '{}' is empty", name));
            }
            cleaned.insert(name, query);
        }
        Ok(Self(cleaned))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl TryFrom<IndexMap<String, String>> for SelectorSet {
    type Error = String;

    fn try_from(entries: IndexMap<String, String>) -> std::result::Result<Self, String> {
        SelectorSet::validated(entries)
    }
}

/// Splits `key:value;key:value` into an ordered map. Only the first `:` of an item splits,
/// so values such as `td:nth-child(2)` survive. Blank items are skipped.
pub fn parse_pairs(text: &str) -> std::result::Result<IndexMap<String, String>, String> {
    let mut pairs = IndexMap::new();
    for item in text.split(';').map(str::trim).filter(|i| !i.is_empty()) {
        let (key, value) = item
            .split_once(':')
            .ok_or_else(|| format!("'{}' is not a key:value pair", item))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("'{}' has an empty key", item));
        }
        pairs.insert(key.to_string(), value.trim().to_string());
    }
    Ok(pairs)
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderSpec {
    Map(IndexMap<String, String>),
    Line(String),
}

/// Headers as a table, or as a `Name: value;Name: value` string in older generated configs.
fn deserialize_headers<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    match HeaderSpec::deserialize(deserializer)? {
        HeaderSpec::Map(map) => Ok(map),
        HeaderSpec::Line(line) => parse_pairs(&line).map_err(serde::de::Error::custom),
    }
}

/// One `sources` entry of the scrape configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_headers",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub headers: IndexMap<String, String>,
    pub selectors: SelectorSet,
}

impl SourceConfig {
    pub fn validate(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(ScraperError::MissingField("name".to_string()));
        }
        self.url = self.url.trim().to_string();
        if self.url.is_empty() {
            return Err(ScraperError::MissingField(format!("url (source '{}')", self.name)));
        }
        let method = self.method.trim().to_ascii_uppercase();
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ScraperError::Config(format!(
                "source '{}' has invalid method '{}'",
                self.name, self.method
            )));
        }
        self.method = method;
        Ok(self)
    }

    /// Label used for provenance; falls back to the URL when unset or blank.
    pub fn effective_label(&self) -> String {
        match &self.label {
            Some(l) if !l.trim().is_empty() => l.clone(),
            _ => self.url.clone(),
        }
    }

    /// Default browser agent merged with the source's own headers (source wins).
    pub fn request_headers(&self) -> IndexMap<String, String> {
        let mut headers = IndexMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        for (k, v) in &self.headers {
            if let Some(existing) = headers.keys().find(|h| h.eq_ignore_ascii_case(k)).cloned() {
                headers.shift_remove(&existing);
            }
            headers.insert(k.clone(), v.clone());
        }
        headers
    }

    /// Table that receives this source's rows.
    pub fn table_name(&self) -> &str {
        &self.name
    }
}

/// A configured source that may have failed to decode or validate.
#[derive(Debug)]
pub struct SourceEntry {
    pub name: String,
    pub config: Result<SourceConfig>,
}

/// On-disk configuration syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` and `.yml` are YAML; anything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig<V> {
    #[serde(default = "Vec::new")]
    sources: Vec<V>,
}

fn entry(index: usize, name: Option<&str>, config: Result<SourceConfig>) -> SourceEntry {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("sources[{}]", index));
    let config = config.and_then(SourceConfig::validate);
    debug!(source = %name, ok = config.is_ok(), "decoded source entry");
    SourceEntry { name, config }
}

#[derive(Debug)]
pub struct ScrapeConfig {
    pub sources: Vec<SourceEntry>,
}

impl ScrapeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => Self::from_toml_str(&content),
            ConfigFormat::Yaml => Self::from_yaml_str(&content),
        }
    }

    /// Decodes each source on its own so one bad entry does not sink the whole file.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig<toml::Value> = toml::from_str(content)?;
        let sources = raw
            .sources
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let name = value.get("name").and_then(|n| n.as_str()).map(str::to_string);
                let config = value
                    .try_into::<SourceConfig>()
                    .map_err(|e| ScraperError::Config(e.message().to_string()));
                entry(i, name.as_deref(), config)
            })
            .collect();
        Ok(Self { sources })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawConfig<serde_yaml::Value> = serde_yaml::from_str(content)?;
        let sources = raw
            .sources
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let name = value.get("name").and_then(|n| n.as_str()).map(str::to_string);
                let config = serde_yaml::from_value::<SourceConfig>(value)
                    .map_err(|e| ScraperError::Config(e.to_string()));
                entry(i, name.as_deref(), config)
            })
            .collect();
        Ok(Self { sources })
    }
}

/// Runtime settings resolved from CLI flags and the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Settings {
    pub fn resolve(db_override: Option<PathBuf>) -> Self {
        let db_path = db_override
            .or_else(|| std::env::var(DB_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let log_dir = std::env::var(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));
        Self { db_path, log_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[sources]]
name = "quotes"
url = "https://example.com/quotes"
label = "Daily quotes"

[sources.headers]
Accept-Language = "en"
user-agent = "custom-agent"

[sources.selectors]
when = "td.date"
price = ".value"
note = "td.note"

[[sources]]
name = "broken"
url = "https://example.com/broken"

[[sources]]
url = "https://example.com/nameless"
selectors = { a = "b" }
"#;

    #[test]
    fn test_selector_order_is_preserved() {
        let cfg = ScrapeConfig::from_toml_str(SAMPLE).unwrap();
        let quotes = cfg.sources[0].config.as_ref().unwrap();
        assert_eq!(quotes.selectors.column_names(), vec!["when", "price", "note"]);
        assert_eq!(quotes.method, "GET");
        assert_eq!(quotes.effective_label(), "Daily quotes");
    }

    #[test]
    fn test_bad_entries_are_isolated() {
        let cfg = ScrapeConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.sources.len(), 3);
        assert!(cfg.sources[0].config.is_ok());
        assert_eq!(cfg.sources[1].name, "broken");
        assert!(cfg.sources[1].config.is_err());
        assert_eq!(cfg.sources[2].name, "sources[2]");
        assert!(cfg.sources[2].config.is_err());
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        assert!(ScrapeConfig::from_toml_str("[[sources]\nname=").is_err());
    }

    #[test]
    fn test_headers_merge_over_default_agent() {
        let cfg = ScrapeConfig::from_toml_str(SAMPLE).unwrap();
        let quotes = cfg.sources[0].config.as_ref().unwrap();
        let headers = quotes.request_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("user-agent").map(String::as_str), Some("custom-agent"));
        assert!(headers.get("User-Agent").is_none());
    }

    #[test]
    fn test_selector_set_validation() {
        let empty = IndexMap::new();
        assert!(SelectorSet::new(empty).is_err());

        let mut blank_query = IndexMap::new();
        blank_query.insert("a".to_string(), "   ".to_string());
        assert!(SelectorSet::new(blank_query).is_err());

        let mut dup = IndexMap::new();
        dup.insert("Price".to_string(), ".a".to_string());
        dup.insert("price".to_string(), ".b".to_string());
        assert!(SelectorSet::new(dup).is_err());

        let mut reserved = IndexMap::new();
        reserved.insert("Label".to_string(), ".a".to_string());
        assert!(SelectorSet::new(reserved).is_err());
    }

    #[test]
    fn test_label_falls_back_to_url() {
        let toml = r#"
[[sources]]
name = "t"
url = "https://example.com/"
method = "post"
selectors = { v = ".v" }
"#;
        let cfg = ScrapeConfig::from_toml_str(toml).unwrap();
        let src = cfg.sources[0].config.as_ref().unwrap();
        assert_eq!(src.effective_label(), "https://example.com/");
        assert_eq!(src.method, "POST");
    }

    #[test]
    fn test_invalid_method_rejected() {
        let toml = r#"
[[sources]]
name = "t"
url = "https://example.com/"
method = "GE T"
selectors = { v = ".v" }
"#;
        let cfg = ScrapeConfig::from_toml_str(toml).unwrap();
        assert!(cfg.sources[0].config.is_err());
    }

    const YAML_SAMPLE: &str = r#"
sources:
  - name: stocks
    url: https://example.com/stocks
    method: GET
    headers: ''
    selectors:
      symbol: td.symbol
      price: td.price
      date: td.date
  - name: rates
    url: https://example.com/rates
    headers: "Accept: text/html; X-Token: a:b"
    selectors:
      rate: .rate
  - name: broken
    url: https://example.com/broken
"#;

    #[test]
    fn test_yaml_config_keeps_selector_order() {
        let cfg = ScrapeConfig::from_yaml_str(YAML_SAMPLE).unwrap();
        let stocks = cfg.sources[0].config.as_ref().unwrap();
        assert_eq!(stocks.selectors.column_names(), vec!["symbol", "price", "date"]);
        assert!(stocks.headers.is_empty());
        assert_eq!(cfg.sources[2].name, "broken");
        assert!(cfg.sources[2].config.is_err());
    }

    #[test]
    fn test_header_string_is_split_into_pairs() {
        let cfg = ScrapeConfig::from_yaml_str(YAML_SAMPLE).unwrap();
        let rates = cfg.sources[1].config.as_ref().unwrap();
        assert_eq!(rates.headers.get("Accept").map(String::as_str), Some("text/html"));
        assert_eq!(rates.headers.get("X-Token").map(String::as_str), Some("a:b"));
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("sources")), ConfigFormat::Toml);
    }

    #[test]
    fn test_parse_pairs_rejects_missing_colon() {
        assert!(parse_pairs("a:b; c").is_err());
        assert!(parse_pairs(" ; ").unwrap().is_empty());
    }
}
