use crate::config::{parse_pairs, ConfigFormat, SelectorSet, SourceConfig};
use crate::constants::DEFAULT_METHOD;
use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::info;

/// One spreadsheet row: `name,url,method,headers,selectors[,label]`.
/// `selectors` and `headers` use the `key:value;key:value` form.
#[derive(Debug, Deserialize)]
struct SourceRow {
    name: String,
    url: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    headers: String,
    selectors: String,
    #[serde(default)]
    label: Option<String>,
}

impl SourceRow {
    fn into_config(self) -> Result<SourceConfig> {
        let selectors = SelectorSet::new(parse_pairs(&self.selectors).map_err(ScraperError::Config)?)?;
        let headers = parse_pairs(&self.headers).map_err(ScraperError::Config)?;
        let method = if self.method.trim().is_empty() {
            DEFAULT_METHOD.to_string()
        } else {
            self.method
        };
        SourceConfig {
            name: self.name,
            url: self.url,
            method,
            headers,
            selectors,
            label: self.label.filter(|l| !l.trim().is_empty()),
        }
        .validate()
    }
}

/// Reads source rows from CSV with a header line. Any bad row fails the whole read.
pub fn sources_from_csv<R: Read>(reader: R) -> Result<Vec<SourceConfig>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut sources = Vec::new();
    for (i, row) in rdr.deserialize::<SourceRow>().enumerate() {
        // line 1 is the header
        let line = i + 2;
        let source = row?.into_config().map_err(|e| {
            let message = match e {
                ScraperError::Config(m) => m,
                other => other.to_string(),
            };
            ScraperError::Config(format!("line {}: {}", line, message))
        })?;
        sources.push(source);
    }
    info!("Read {} sources from CSV", sources.len());
    Ok(sources)
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    sources: &'a [SourceConfig],
}

/// Writes sources in the syntax `ScrapeConfig::load` reads back.
pub fn render_config(sources: &[SourceConfig], format: ConfigFormat) -> Result<String> {
    let file = ConfigFile { sources };
    Ok(match format {
        ConfigFormat::Toml => toml::to_string_pretty(&file)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&file)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScrapeConfig;

    const SHEET: &str = "\
name,url,method,headers,selectors,label
quotes,https://q.test/,,Accept-Language: en,price:td:nth-child(2); when:td.date,Daily quotes
rates,https://r.test/,post,,rate:.rate,
";

    #[test]
    fn test_rows_become_sources() {
        let sources = sources_from_csv(SHEET.as_bytes()).unwrap();
        assert_eq!(sources.len(), 2);

        let quotes = &sources[0];
        assert_eq!(quotes.method, "GET");
        assert_eq!(quotes.selectors.column_names(), vec!["price", "when"]);
        let selectors: Vec<_> = quotes.selectors.iter().collect();
        assert_eq!(selectors[0], ("price", "td:nth-child(2)"));
        assert_eq!(quotes.headers.get("Accept-Language").map(String::as_str), Some("en"));
        assert_eq!(quotes.label.as_deref(), Some("Daily quotes"));

        let rates = &sources[1];
        assert_eq!(rates.method, "POST");
        assert!(rates.headers.is_empty());
        assert!(rates.label.is_none());
    }

    #[test]
    fn test_bad_row_names_its_line() {
        let sheet = "name,url,method,headers,selectors\nok,https://a.test/,,,v:.v\nbad,https://b.test/,,,no-colon\n";
        let err = sources_from_csv(sheet.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn test_generated_yaml_loads_back_in_order() {
        let sources = sources_from_csv(SHEET.as_bytes()).unwrap();
        let yaml = render_config(&sources, ConfigFormat::Yaml).unwrap();
        let loaded = ScrapeConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(loaded.sources.len(), 2);
        let quotes = loaded.sources[0].config.as_ref().unwrap();
        assert_eq!(quotes.selectors, sources[0].selectors);
        assert_eq!(quotes.headers, sources[0].headers);
        assert_eq!(quotes.effective_label(), "Daily quotes");
    }

    #[test]
    fn test_generated_toml_loads_back() {
        let sources = sources_from_csv(SHEET.as_bytes()).unwrap();
        let toml = render_config(&sources, ConfigFormat::Toml).unwrap();
        let loaded = ScrapeConfig::from_toml_str(&toml).unwrap();
        let names: Vec<_> = loaded.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["quotes", "rates"]);
        let rates = loaded.sources[1].config.as_ref().unwrap();
        assert_eq!(rates.method, "POST");
        assert_eq!(rates.selectors.column_names(), vec!["rate"]);
    }
}
