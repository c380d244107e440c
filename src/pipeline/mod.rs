// Extraction pipeline: coerce, extract, assemble, process

pub mod assemble;
pub mod coerce;
pub mod extract;
pub mod processor;

pub use assemble::{assemble, AlignmentPolicy, PadByIndex};
pub use coerce::{coerce, parse_number};
pub use extract::extract;
pub use processor::{
    BatchReport, BatchRunner, OutcomeResult, SourceFailure, SourceOutcome, SourceProcessor,
    SourceSummary,
};
