pub mod chart;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod generate;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;

// Layered boundaries for application ports and infrastructure adapters
pub mod app;
pub mod infra;

pub use error::{Result, ScraperError};
pub use types::{Column, Matrix, RawMatch, SourceRecord, TypedCell};
