pub mod csv;
pub mod jsonl;

use std::path::Path;

use thiserror::Error;

use crate::export::Visit;

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub sources: u64,
    pub visits_decoded: u64,
    pub visits_written: u64,
    pub duplicates_dropped: u64,
}

#[derive(Debug, Clone, Copy)]
pub enum SinkBackendKind {
    Jsonl,
    Csv,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sink writer lock poisoned")]
    Poisoned,
}

/// Output sink for decoded visits.
///
/// # Example
/// ```rust
/// use historytrends::sink::{self, RunSummary, SinkBackendKind};
///
/// let run_output_dir = std::env::temp_dir().join("historytrends_sink_example");
/// std::fs::create_dir_all(&run_output_dir).unwrap();
///
/// let sink = sink::build_sink(SinkBackendKind::Jsonl, "0.1.0", "hash", &run_output_dir).unwrap();
/// let summary = RunSummary {
///     run_id: "example_run".to_string(),
///     sources: 0,
///     visits_decoded: 0,
///     visits_written: 0,
///     duplicates_dropped: 0,
/// };
/// sink.record_run_summary(&summary).unwrap();
/// sink.flush().unwrap();
/// ```
pub trait VisitSink: Send + Sync {
    fn record_visit(&self, source: &str, visit: &Visit) -> Result<(), SinkError>;
    fn record_run_summary(&self, summary: &RunSummary) -> Result<(), SinkError>;
    fn flush(&self) -> Result<(), SinkError>;
}

pub fn build_sink(
    backend: SinkBackendKind,
    tool_version: &str,
    config_hash: &str,
    run_output_dir: &Path,
) -> Result<Box<dyn VisitSink>, SinkError> {
    match backend {
        SinkBackendKind::Jsonl => Ok(Box::new(jsonl::JsonlSink::new(
            tool_version,
            config_hash,
            run_output_dir,
        )?)),
        SinkBackendKind::Csv => Ok(Box::new(csv::CsvSink::new(
            tool_version,
            config_hash,
            run_output_dir,
        )?)),
    }
}
