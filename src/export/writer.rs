use std::io::Write;

use chrono::TimeZone;

use crate::capabilities::Capabilities;
use crate::export::Visit;
use crate::export::analysis::EncodeSession;
use crate::export::error::Field;
use crate::export::reader::ExportError;

/// Writes visits as a tab-delimited analysis export, header row first.
pub struct AnalysisWriter<W: Write, Tz: TimeZone> {
    writer: csv::Writer<W>,
    session: EncodeSession<Tz>,
}

impl<W: Write, Tz: TimeZone> AnalysisWriter<W, Tz>
where
    Tz::Offset: std::fmt::Display,
{
    pub fn new(writer: W, caps: Capabilities, zone: Tz) -> Result<Self, ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(Field::ALL.iter().map(|f| f.header()))?;
        Ok(Self {
            writer,
            session: EncodeSession::new(caps, zone),
        })
    }

    pub fn write_visit(&mut self, visit: &Visit) -> Result<(), ExportError> {
        let fields = self.session.encode_record(visit)?;
        self.writer.write_record(&fields)?;
        Ok(())
    }

    /// Visits written so far.
    pub fn written(&self) -> u64 {
        self.session.record_index()
    }

    pub fn flush(&mut self) -> Result<(), ExportError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, ExportError> {
        self.writer
            .into_inner()
            .map_err(|err| ExportError::Io(err.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;
    use crate::export::reader::read_export;
    use crate::transition::PageTransition;

    #[test]
    fn writes_header_and_records_readable_by_reader() {
        let zone = FixedOffset::east_opt(9 * 3600).expect("zone");
        let mut writer =
            AnalysisWriter::new(Vec::new(), Capabilities::default(), zone).expect("writer");
        let visit = Visit {
            url: "https://www.example.org/path?q=1".to_string(),
            visit_time: Utc.timestamp_millis_opt(1_600_000_000_500).single().expect("time"),
            transition: PageTransition::FormSubmit,
            page_title: "Say \"hi\"".to_string(),
        };
        writer.write_visit(&visit).expect("write");
        assert_eq!(writer.written(), 1);
        let bytes = writer.into_inner().expect("bytes");
        let text = String::from_utf8(bytes.clone()).expect("utf8");

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(concat!(
                "URL\tHost\tDomain\tVisit Time (ms)\tVisit Time (string)\t",
                "Day of Week\tTransition Type\tPage Title"
            ))
        );
        assert_eq!(
            lines.next(),
            Some(concat!(
                "https://www.example.org/path?q=1\twww.example.org\texample.org\t",
                "1600000000500\t2020-09-13 21:26:40.500\t0\tform_submit\tSay \"hi\""
            ))
        );

        let export = read_export("written.tsv", bytes.as_slice(), Capabilities::default(), None)
            .expect("read");
        assert_eq!(export.visits, vec![visit]);
    }
}
