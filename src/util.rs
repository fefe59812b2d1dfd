//! # Utility Module
//!
//! Run helpers behind the CLI subcommands: decoding exports, writing visits
//! to a sink, and loading visit records for encoding.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{info, warn};

use crate::capabilities::Capabilities;
use crate::cli::OutputFormat;
use crate::export::{self, AnalysisWriter, Export, Visit};
use crate::sink::{RunSummary, SinkBackendKind, VisitSink};

/// Convert CLI output format to internal enum
pub fn backend_from_cli(format: OutputFormat) -> SinkBackendKind {
    match format {
        OutputFormat::Jsonl => SinkBackendKind::Jsonl,
        OutputFormat::Csv => SinkBackendKind::Csv,
    }
}

/// Create the run output directory if needed. Sinks create their own
/// subdirectories inside it.
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("creating output directory {}", path.display()))?;
    if !path.is_dir() {
        bail!("output path is not a directory: {}", path.display());
    }
    Ok(())
}

/// Decode each export in its own session. Without an explicit export time,
/// one is taken from a Takeout-style file name when present.
pub fn decode_exports(
    inputs: &[PathBuf],
    export_time: Option<DateTime<Utc>>,
    caps: &Capabilities,
) -> Result<Vec<Export>> {
    let mut exports = Vec::with_capacity(inputs.len());
    for path in inputs {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let container_time = export_time.or_else(|| export::export_time_from_filename(&name));
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let decoded = export::read_export(&name, BufReader::new(file), caps.clone(), container_time)
            .with_context(|| format!("decoding {}", path.display()))?;
        if let Some(t) = decoded.export_time {
            info!("export time of {name}: {}", t.to_rfc3339());
        }
        exports.push(decoded);
    }
    Ok(exports)
}

/// Parse an RFC 3339 export time given on the command line.
pub fn parse_export_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::<FixedOffset>::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("invalid export time: {value}"))
}

struct SourcedVisit<'a> {
    source: &'a str,
    visit: &'a Visit,
}

impl AsRef<Visit> for SourcedVisit<'_> {
    fn as_ref(&self) -> &Visit {
        self.visit
    }
}

/// Write every export's visits to the sink, followed by a run summary.
pub fn write_visits(
    sink: &dyn VisitSink,
    run_id: &str,
    exports: &[Export],
    dedup: bool,
) -> Result<RunSummary> {
    let all: Vec<SourcedVisit<'_>> = exports
        .iter()
        .flat_map(|e| e.visits.iter().map(move |visit| SourcedVisit { source: &e.source, visit }))
        .collect();
    let decoded = all.len() as u64;
    let kept = if dedup { export::merge_visits(all) } else { all };

    for item in &kept {
        sink.record_visit(item.source, item.visit)?;
    }
    let summary = RunSummary {
        run_id: run_id.to_string(),
        sources: exports.len() as u64,
        visits_decoded: decoded,
        visits_written: kept.len() as u64,
        duplicates_dropped: decoded - kept.len() as u64,
    };
    if summary.duplicates_dropped > 0 {
        warn!("dropped {} duplicate visits", summary.duplicates_dropped);
    }
    sink.record_run_summary(&summary)?;
    sink.flush()?;
    Ok(summary)
}

/// Load visit records written by the JSONL sink (or any JSON object per
/// line with the visit fields). Blank lines are ignored.
pub fn read_visits_jsonl(path: &Path) -> Result<Vec<Visit>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut visits = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let visit: Visit = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid visit record", path.display(), idx + 1))?;
        visits.push(visit);
    }
    Ok(visits)
}

/// Write visits as an analysis export with local times in `zone`.
pub fn encode_visits(
    path: &Path,
    visits: &[Visit],
    caps: &Capabilities,
    zone: FixedOffset,
) -> Result<u64> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = AnalysisWriter::new(BufWriter::new(file), caps.clone(), zone)?;
    for visit in visits {
        writer.write_visit(visit)?;
    }
    writer.flush()?;
    Ok(writer.written())
}
