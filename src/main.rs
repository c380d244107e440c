use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use tabscrape::chart::{self, ChartKind, ChartSeries};
use tabscrape::config::{ConfigFormat, ScrapeConfig, Settings};
use tabscrape::db::{self, SqliteStore};
use tabscrape::infra::{HtmlParser, ReqwestHttp, TracingReporter};
use tabscrape::generate;
use tabscrape::logging;
use tabscrape::pipeline::{BatchReport, BatchRunner, SourceProcessor};

#[derive(Parser)]
#[command(name = "tabscrape")]
#[command(about = "Scrape selector-defined tables from web pages into SQLite")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every configured source and store the rows
    Scrape {
        /// Path to the source configuration (.toml, or .yaml/.yml)
        #[arg(long)]
        config: PathBuf,
        /// Drop and recreate each source table before inserting
        #[arg(long)]
        overwrite: bool,
        /// SQLite database path (default: $TABSCRAPE_DB or scraper_data.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read two columns of a stored table, e.g. for charting
    Query {
        #[arg(long)]
        table: String,
        /// Column for the X axis (categories for pie charts)
        #[arg(long)]
        x: String,
        /// Column for the Y axis
        #[arg(long)]
        y: String,
        /// Raw SQL WHERE clause, e.g. "timestamp > '2025-02-01'"
        #[arg(long)]
        filter: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List stored tables with row counts
    Tables {
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Plot two columns of a stored table as a line, bar or pie chart
    Chart {
        #[arg(long)]
        table: String,
        /// line, bar or pie
        #[arg(long)]
        chart: ChartKind,
        /// Column for the X axis (categories for pie charts)
        #[arg(long)]
        x: String,
        /// Column for the Y axis (values for pie charts)
        #[arg(long)]
        y: String,
        /// Raw SQL WHERE clause, e.g. "timestamp > '2025-02-01'"
        #[arg(long)]
        filter: Option<String>,
        /// Output image; .svg writes SVG, anything else PNG
        #[arg(long, default_value = "chart.svg")]
        output: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Build a source configuration from a CSV sheet
    GenConfig {
        /// CSV with columns name,url,method,headers,selectors[,label]
        csv: PathBuf,
        /// Output file; .toml writes TOML, anything else YAML
        #[arg(long, default_value = "scraper_config.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::resolve(match &cli.command {
        Commands::Scrape { db, .. }
        | Commands::Query { db, .. }
        | Commands::Tables { db }
        | Commands::Chart { db, .. } => db.clone(),
        Commands::GenConfig { .. } => None,
    });
    let _guard = logging::init_logging(&settings.log_dir);

    match cli.command {
        Commands::Scrape {
            config,
            overwrite,
            json,
            ..
        } => {
            let scrape_config = ScrapeConfig::load(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            let store = SqliteStore::open(&settings.db_path)
                .with_context(|| format!("opening store {}", settings.db_path.display()))?;

            let processor = SourceProcessor::new(Arc::new(ReqwestHttp::new()), Arc::new(HtmlParser));
            let mut runner = BatchRunner::new(processor, store, Arc::new(TracingReporter));
            let report = runner.run(scrape_config.sources, overwrite).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report, &settings.db_path);
            }
        }
        Commands::Query {
            table,
            x,
            y,
            filter,
            limit,
            ..
        } => {
            let conn = db::open_read_only(&settings.db_path)
                .with_context(|| format!("opening store {}", settings.db_path.display()))?;
            let rows = db::fetch_xy(
                &conn,
                &table,
                &x,
                &y,
                filter.as_deref(),
                limit,
            )
            .map_err(|e| {
                error!("Query failed: {}", e);
                e
            })?;
            print_columns(&x, &y, &rows);
        }
        Commands::Tables { .. } => {
            let conn = db::open_read_only(&settings.db_path)
                .with_context(|| format!("opening store {}", settings.db_path.display()))?;
            let tables = db::list_tables(&conn)?;
            if tables.is_empty() {
                println!("No tables in {}.", settings.db_path.display());
            }
            for (name, count) in tables {
                println!("{:<32} {:>8}", name, count);
            }
        }
        Commands::Chart {
            table,
            chart: kind,
            x,
            y,
            filter,
            output,
            ..
        } => {
            let conn = db::open_read_only(&settings.db_path)
                .with_context(|| format!("opening store {}", settings.db_path.display()))?;
            let rows = db::fetch_xy(&conn, &table, &x, &y, filter.as_deref(), None)?;
            let series = ChartSeries::from_rows(&x, &y, &rows);
            chart::render(kind, &series, &output)
                .with_context(|| format!("rendering {} chart", kind))?;
            println!("📈 Chart saved to {}", output.display());
        }
        Commands::GenConfig { csv, output } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("opening {}", csv.display()))?;
            let sources = generate::sources_from_csv(file)?;
            // only an explicit .toml gets TOML; the default is YAML
            let format = match output.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
                _ => ConfigFormat::Yaml,
            };
            std::fs::write(&output, generate::render_config(&sources, format)?)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("✅ Configuration generated: {} ({} sources)", output.display(), sources.len());
        }
    }
    Ok(())
}

fn print_report(report: &BatchReport, db_path: &std::path::Path) {
    println!("\n📊 Scrape results:");
    for summary in report.succeeded() {
        println!(
            "   ✅ {} -> table \"{}\": {} rows ({} columns)",
            summary.name,
            summary.table,
            summary.rows,
            summary.columns.len()
        );
    }
    for (name, failure) in report.failed() {
        println!("   ❌ {} ({:?}): {}", name, failure.kind, failure.message);
    }
    println!(
        "\n💾 {} rows saved to {}.",
        report.total_rows(),
        db_path.display()
    );
    info!(
        stored = report.succeeded().count(),
        failed = report.failed().count(),
        "run complete"
    );
}

fn print_columns(x: &str, y: &str, rows: &[(Option<String>, Option<String>)]) {
    let cell = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let wx = rows
        .iter()
        .map(|(a, _)| cell(a).chars().count())
        .chain(std::iter::once(x.chars().count()))
        .max()
        .unwrap_or(0);

    println!("{:<wx$} | {}", x, y, wx = wx);
    println!("{}", "-".repeat(wx + 3 + y.chars().count().max(8)));
    for (a, b) in rows {
        println!("{:<wx$} | {}", cell(a), cell(b), wx = wx);
    }
    println!("\n{} rows", rows.len());
}
