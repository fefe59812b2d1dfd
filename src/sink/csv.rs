use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::export::Visit;
use crate::export::time::format_epoch_millis;
use crate::sink::{RunSummary, SinkError, VisitSink};

pub struct CsvSink {
    tool_version: String,
    config_hash: String,
    visits_writer: Mutex<csv::Writer<File>>,
    run_writer: Mutex<csv::Writer<File>>,
}

#[derive(Serialize)]
struct VisitCsv<'a> {
    source: &'a str,
    url: &'a str,
    visit_time: String,
    visit_time_ms: String,
    transition: &'a str,
    page_title: &'a str,
}

#[derive(Serialize)]
struct RunSummaryCsv<'a> {
    run_id: &'a str,
    sources: u64,
    visits_decoded: u64,
    visits_written: u64,
    duplicates_dropped: u64,
    tool_version: &'a str,
    config_hash: &'a str,
}

impl CsvSink {
    pub fn new(
        tool_version: &str,
        config_hash: &str,
        run_output_dir: &Path,
    ) -> Result<Self, SinkError> {
        let visits_dir = run_output_dir.join("visits");
        std::fs::create_dir_all(&visits_dir)?;

        let visits_file = File::create(visits_dir.join("visits.csv"))?;
        let run_file = File::create(visits_dir.join("run_summary.csv"))?;

        let mut visits_writer =
            csv::WriterBuilder::new().has_headers(false).from_writer(visits_file);
        let mut run_writer = csv::WriterBuilder::new().has_headers(false).from_writer(run_file);

        visits_writer.write_record([
            "source",
            "url",
            "visit_time",
            "visit_time_ms",
            "transition",
            "page_title",
        ])?;

        run_writer.write_record([
            "run_id",
            "sources",
            "visits_decoded",
            "visits_written",
            "duplicates_dropped",
            "tool_version",
            "config_hash",
        ])?;

        Ok(Self {
            tool_version: tool_version.to_string(),
            config_hash: config_hash.to_string(),
            visits_writer: Mutex::new(visits_writer),
            run_writer: Mutex::new(run_writer),
        })
    }
}

impl VisitSink for CsvSink {
    fn record_visit(&self, source: &str, visit: &Visit) -> Result<(), SinkError> {
        let record = VisitCsv {
            source,
            url: &visit.url,
            visit_time: visit.visit_time.to_rfc3339(),
            visit_time_ms: format_epoch_millis(&visit.visit_time),
            transition: visit.transition.as_str(),
            page_title: &visit.page_title,
        };
        let mut guard = self.visits_writer.lock().map_err(|_| SinkError::Poisoned)?;
        guard.serialize(record)?;
        Ok(())
    }

    fn record_run_summary(&self, summary: &RunSummary) -> Result<(), SinkError> {
        let record = RunSummaryCsv {
            run_id: &summary.run_id,
            sources: summary.sources,
            visits_decoded: summary.visits_decoded,
            visits_written: summary.visits_written,
            duplicates_dropped: summary.duplicates_dropped,
            tool_version: &self.tool_version,
            config_hash: &self.config_hash,
        };
        let mut guard = self.run_writer.lock().map_err(|_| SinkError::Poisoned)?;
        guard.serialize(record)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut visits = self.visits_writer.lock().map_err(|_| SinkError::Poisoned)?;
        let mut run = self.run_writer.lock().map_err(|_| SinkError::Poisoned)?;
        visits.flush()?;
        run.flush()?;
        Ok(())
    }
}
