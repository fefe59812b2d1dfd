use std::io::Read;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::capabilities::Capabilities;
use crate::export::analysis::{COLUMNS, DecodeSession};
use crate::export::error::{Field, RecordError};
use crate::export::{Export, Visit};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("record {record}: expected 8 columns, found {found}")]
    ColumnCount { record: u64, found: usize },
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Streams visits out of a tab-delimited analysis export.
///
/// Yields every visit decoded before a failure, then the failure, then
/// nothing. A leading header row is skipped.
pub struct AnalysisReader<R: Read> {
    rows: csv::StringRecordsIntoIter<R>,
    session: DecodeSession,
    first_row: bool,
    finished: bool,
}

impl<R: Read> AnalysisReader<R> {
    pub fn new(reader: R, session: DecodeSession) -> Self {
        let rows = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();
        Self {
            rows,
            session,
            first_row: true,
            finished: false,
        }
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    fn next_visit(&mut self) -> Option<Result<Visit, ExportError>> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(err.into())),
            };
            let is_header = self.first_row && row.get(0) == Some(Field::Url.header());
            self.first_row = false;
            if is_header {
                continue;
            }

            if row.len() != COLUMNS {
                return Some(Err(ExportError::ColumnCount {
                    record: self.session.record_index() + 1,
                    found: row.len(),
                }));
            }
            let fields: [&str; COLUMNS] = std::array::from_fn(|i| row.get(i).unwrap_or(""));
            return Some(self.session.decode_record(&fields).map_err(ExportError::from));
        }
    }
}

impl<R: Read> Iterator for AnalysisReader<R> {
    type Item = Result<Visit, ExportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.next_visit();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

/// Decode a whole export. Any failure discards every visit read so far.
pub fn read_export<R: Read>(
    source: &str,
    reader: R,
    caps: Capabilities,
    export_time: Option<DateTime<Utc>>,
) -> Result<Export, ExportError> {
    let mut session = DecodeSession::new(caps);
    if let Some(t) = export_time {
        session = session.with_export_time(t);
    }

    let mut rows = AnalysisReader::new(reader, session);
    let mut visits = Vec::new();
    for visit in rows.by_ref() {
        match visit {
            Ok(visit) => visits.push(visit),
            Err(err) => {
                warn!("discarding {} visits from {source}: {err}", visits.len());
                return Err(err);
            }
        }
    }

    let session = rows.session();
    info!(
        "decoded {} visits from {source} (offset={:?})",
        visits.len(),
        session.zone()
    );
    Ok(Export {
        source: source.to_string(),
        export_time: session.export_time(),
        visits,
    })
}
