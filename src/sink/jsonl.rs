use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::export::Visit;
use crate::sink::{RunSummary, SinkError, VisitSink};

pub struct JsonlSink {
    tool_version: String,
    config_hash: String,
    summary_path: std::path::PathBuf,
    writer: Mutex<BufWriter<File>>,
}

#[derive(Serialize)]
struct VisitRecord<'a> {
    #[serde(flatten)]
    visit: &'a Visit,
    source: &'a str,
}

#[derive(Serialize)]
struct RunSummaryRecord<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    tool_version: &'a str,
    config_hash: &'a str,
}

impl JsonlSink {
    pub fn new(
        tool_version: &str,
        config_hash: &str,
        run_output_dir: &Path,
    ) -> Result<Self, SinkError> {
        let visits_dir = run_output_dir.join("visits");
        std::fs::create_dir_all(&visits_dir)?;
        let file = File::create(visits_dir.join("visits.jsonl"))?;
        Ok(Self {
            tool_version: tool_version.to_string(),
            config_hash: config_hash.to_string(),
            summary_path: visits_dir.join("run_summary.json"),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl VisitSink for JsonlSink {
    fn record_visit(&self, source: &str, visit: &Visit) -> Result<(), SinkError> {
        let record = VisitRecord { visit, source };
        let mut guard = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        serde_json::to_writer(&mut *guard, &record)?;
        guard.write_all(b"\n")?;
        Ok(())
    }

    fn record_run_summary(&self, summary: &RunSummary) -> Result<(), SinkError> {
        let record = RunSummaryRecord {
            summary,
            tool_version: &self.tool_version,
            config_hash: &self.config_hash,
        };
        let file = File::create(&self.summary_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &record)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut guard = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        guard.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::transition::PageTransition;

    #[test]
    fn writes_one_json_object_per_visit() {
        let dir = tempdir().expect("tempdir");
        let sink = JsonlSink::new("0.1.0", "hash", dir.path()).expect("sink");
        let visit = Visit {
            url: "https://example.com/".to_string(),
            visit_time: Utc.with_ymd_and_hms(2021, 6, 7, 8, 0, 0).single().expect("time"),
            transition: PageTransition::Link,
            page_title: "Example".to_string(),
        };
        sink.record_visit("export.tsv", &visit).expect("record");
        sink.flush().expect("flush");

        let visits_path = dir.path().join("visits").join("visits.jsonl");
        let content = std::fs::read_to_string(visits_path).expect("read");
        let value: serde_json::Value = serde_json::from_str(content.trim()).expect("json");
        assert_eq!(value["url"], "https://example.com/");
        assert_eq!(value["transition"], "link");
        assert_eq!(value["source"], "export.tsv");
        assert_eq!(value["visit_time"], "2021-06-07T08:00:00Z");

        let parsed: Visit = serde_json::from_str(content.trim()).expect("visit");
        assert_eq!(parsed, visit);
    }
}
