//! # Analysis Export Codec
//!
//! An analysis export ("Export These Results" on the Trends or Search pages
//! of History Trends Unlimited) is a tab-delimited file with one visit per
//! row:
//!
//! | # | column              | example                    |
//! |---|---------------------|----------------------------|
//! | 0 | URL                 | `https://example.com/`     |
//! | 1 | Host (may be blank) | `example.com`              |
//! | 2 | Domain (may be blank)| `example.com`             |
//! | 3 | Visit Time (ms)     | `1384634958041.754`        |
//! | 4 | Visit Time (string) | `2013-11-16 14:49:18.041`  |
//! | 5 | Day of Week         | `6` (0 is Sunday)          |
//! | 6 | Transition Type     | `link`                     |
//! | 7 | Page Title (may be blank) | `Example Domain`     |
//!
//! Host, domain, the local time string and the weekday are redundant. They
//! are validated on decode and regenerated on encode. The local time string
//! is written in the exporting machine's zone, so the first record fixes the
//! UTC offset of the whole export and every later record must agree.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use tracing::debug;

use crate::capabilities::Capabilities;
use crate::export::Visit;
use crate::export::error::{Field, RecordError, VisitError};
use crate::export::time;
use crate::export::url_check::{self, check_url};

/// Number of columns in an analysis export record.
pub const COLUMNS: usize = 8;

/// State for decoding the records of one export, in file order.
///
/// The first failure aborts the session: every later call returns
/// [`VisitError::SessionAborted`].
#[derive(Debug)]
pub struct DecodeSession {
    caps: Capabilities,
    record_index: u64,
    zone: Option<FixedOffset>,
    export_time: Option<DateTime<FixedOffset>>,
    failed_at: Option<u64>,
}

impl DecodeSession {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            record_index: 0,
            zone: None,
            export_time: None,
            failed_at: None,
        }
    }

    /// Attach a container-level export time whose zone is unknown and was
    /// recorded as UTC. Its wall clock is moved into the learned zone once
    /// the first record is decoded.
    pub fn with_export_time(mut self, export_time: DateTime<Utc>) -> Self {
        self.export_time = Some(export_time.fixed_offset());
        self
    }

    /// Records decoded successfully so far.
    pub fn record_index(&self) -> u64 {
        self.record_index
    }

    /// Learned offset in seconds, `local = utc - offset`.
    pub fn learned_offset(&self) -> Option<i32> {
        self.zone.map(|zone| -zone.local_minus_utc())
    }

    pub fn zone(&self) -> Option<FixedOffset> {
        self.zone
    }

    pub fn export_time(&self) -> Option<DateTime<FixedOffset>> {
        self.export_time
    }

    /// Record number of the failure that aborted the session, if any.
    pub fn failed_at(&self) -> Option<u64> {
        self.failed_at
    }

    pub fn decode_record(&mut self, fields: &[&str; COLUMNS]) -> Result<Visit, RecordError> {
        let record = self.record_index + 1;
        if let Some(failed) = self.failed_at {
            return Err(RecordError {
                record,
                source: VisitError::SessionAborted { record: failed },
            });
        }
        match self.decode_fields(fields) {
            Ok(visit) => {
                self.record_index += 1;
                Ok(visit)
            }
            Err(source) => {
                self.failed_at = Some(record);
                Err(RecordError { record, source })
            }
        }
    }

    fn decode_fields(&mut self, fields: &[&str; COLUMNS]) -> Result<Visit, VisitError> {
        let [raw_url, host, domain, time_msec, time_local, weekday, transition, title] = *fields;

        check_url(raw_url, host, domain, self.caps.domains.as_ref())?;
        let resolved = time::resolve(time_msec, time_local, weekday)?;

        match self.zone {
            None => self.learn_zone(resolved.zone),
            Some(zone) if zone != resolved.zone => {
                return Err(VisitError::TimezoneDrift {
                    expected: -zone.local_minus_utc(),
                    actual: resolved.offset_seconds(),
                });
            }
            Some(_) => {}
        }

        // Only the core type is exported, qualifiers are lost.
        let transition = self
            .caps
            .transitions
            .decode(transition)
            .ok_or_else(|| VisitError::UnknownTransition(transition.to_string()))?;

        Ok(Visit {
            url: raw_url.to_string(),
            visit_time: resolved.instant,
            transition,
            page_title: self.caps.titles.normalize(title),
        })
    }

    fn learn_zone(&mut self, zone: FixedOffset) {
        debug!(offset = %zone, "learned export timezone from first record");
        self.zone = Some(zone);
        // Keeps the container's wall clock and attaches the learned zone, so
        // 12:30Z in a +02:00 export becomes 12:30+02:00 (10:30Z). Shifting
        // the instant by the offset instead would land on 14:30Z.
        if let Some(export_time) = self.export_time {
            if let Some(local) = export_time.naive_local().and_local_timezone(zone).single() {
                self.export_time = Some(local);
            }
        }
    }
}

/// State for encoding visits with the local columns written in `zone`.
#[derive(Debug)]
pub struct EncodeSession<Tz: TimeZone> {
    caps: Capabilities,
    zone: Tz,
    record_index: u64,
}

impl<Tz: TimeZone> EncodeSession<Tz>
where
    Tz::Offset: std::fmt::Display,
{
    pub fn new(caps: Capabilities, zone: Tz) -> Self {
        Self {
            caps,
            zone,
            record_index: 0,
        }
    }

    pub fn record_index(&self) -> u64 {
        self.record_index
    }

    /// Encode one visit. The page title is written through the session's
    /// `TitleNormalizer` rather than verbatim, so control characters that
    /// would split the record never reach the output.
    pub fn encode_record(&mut self, visit: &Visit) -> Result<[String; COLUMNS], RecordError> {
        self.record_index += 1;
        self.encode_fields(visit).map_err(|source| RecordError {
            record: self.record_index,
            source,
        })
    }

    fn encode_fields(&self, visit: &Visit) -> Result<[String; COLUMNS], VisitError> {
        if visit.url.contains(['\t', '\r', '\n']) {
            return Err(VisitError::malformed(
                Field::Url,
                &visit.url,
                "contains a record separator",
            ));
        }
        let url = url_check::parse_url(&visit.url)?;
        let host = url_check::hostname(&url).to_string();
        // Dotless hosts such as localhost are exported without a domain.
        let domain = if host.contains('.') {
            self.caps
                .domains
                .registrable_domain(&host)
                .ok_or_else(|| VisitError::malformed(Field::Host, &host, "no registrable domain"))?
        } else {
            String::new()
        };

        let local = visit.visit_time.with_timezone(&self.zone);
        Ok([
            visit.url.clone(),
            host,
            domain,
            time::format_epoch_millis(&visit.visit_time),
            time::format_local_time(&local),
            time::weekday_index(&local).to_string(),
            self.caps.transitions.encode(visit.transition),
            self.caps.titles.normalize(&visit.page_title),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::capabilities::{DomainResolver, TitleNormalizer};
    use crate::transition::PageTransition;

    // 2021-06-07 08:00:00 UTC, a Monday.
    const MONDAY_MS: &str = "1623052800000";

    fn session() -> DecodeSession {
        DecodeSession::new(Capabilities::default())
    }

    fn record<'a>(
        url: &'a str,
        msec: &'a str,
        local: &'a str,
        day: &'a str,
    ) -> [&'a str; COLUMNS] {
        [url, "", "", msec, local, day, "link", "Title"]
    }

    fn visit(url: &str, millis: i64, title: &str) -> Visit {
        Visit {
            url: url.to_string(),
            visit_time: Utc.timestamp_millis_opt(millis).single().expect("time"),
            transition: PageTransition::Typed,
            page_title: title.to_string(),
        }
    }

    #[test]
    fn decodes_record_into_visit() {
        let mut session = session();
        let fields = [
            "https://sub.example.com/page",
            "sub.example.com",
            "example.com",
            "1623052800000.25",
            "2021-06-07 10:00:00.000",
            "1",
            "typed",
            " Example\tPage ",
        ];
        let visit = session.decode_record(&fields).expect("decode");
        assert_eq!(visit.url, "https://sub.example.com/page");
        assert_eq!(visit.visit_time.timestamp_millis(), 1_623_052_800_000);
        assert_eq!(visit.visit_time.timestamp_subsec_nanos(), 250_000);
        assert_eq!(visit.transition, PageTransition::Typed);
        assert_eq!(visit.page_title, "Example Page");
        assert_eq!(session.record_index(), 1);
        assert_eq!(session.learned_offset(), Some(-7200));
    }

    #[test]
    fn later_records_reuse_learned_offset() {
        let mut session = session();
        session
            .decode_record(&record("https://a.example/", MONDAY_MS, "2021-06-07 10:00:00.000", "1"))
            .expect("first");
        let second = session
            .decode_record(&record(
                "https://b.example/",
                "1623067200123",
                "2021-06-07 14:00:00.123",
                "1",
            ))
            .expect("second");
        assert_eq!(second.visit_time.timestamp_millis(), 1_623_067_200_123);
        assert_eq!(session.record_index(), 2);
        assert_eq!(session.learned_offset(), Some(-7200));
    }

    #[test]
    fn drift_fails_at_second_record_and_aborts_session() {
        let mut session = session();
        let first = session
            .decode_record(&record("https://a.example/", MONDAY_MS, "2021-06-07 10:00:00.000", "1"))
            .expect("first");
        assert_eq!(first.url, "https://a.example/");

        let err = session
            .decode_record(&record("https://b.example/", MONDAY_MS, "2021-06-07 09:00:00.000", "1"))
            .expect_err("drift");
        assert_eq!(err.record, 2);
        assert_eq!(err.source, VisitError::TimezoneDrift { expected: -7200, actual: -3600 });

        let err = session
            .decode_record(&record("https://c.example/", MONDAY_MS, "2021-06-07 10:00:00.000", "1"))
            .expect_err("aborted");
        assert_eq!(err.source, VisitError::SessionAborted { record: 2 });
        assert_eq!(session.failed_at(), Some(2));
        assert_eq!(session.record_index(), 1);
    }

    #[test]
    fn any_failure_poisons_session() {
        let mut session = session();
        let mut fields = record("https://a.example/", MONDAY_MS, "2021-06-07 08:00:00.000", "1");
        fields[6] = "teleport";
        let err = session.decode_record(&fields).expect_err("transition");
        assert_eq!(err.source, VisitError::UnknownTransition("teleport".to_string()));

        let err = session
            .decode_record(&record("https://a.example/", MONDAY_MS, "2021-06-07 08:00:00.000", "1"))
            .expect_err("aborted");
        assert_eq!(err.source, VisitError::SessionAborted { record: 1 });
    }

    #[test]
    fn weekday_mismatch_is_inconsistent() {
        let mut session = session();
        let err = session
            .decode_record(&record("https://a.example/", MONDAY_MS, "2021-06-07 10:00:00.000", "0"))
            .expect_err("weekday");
        assert!(matches!(
            err.source,
            VisitError::InconsistentRedundancy { field: Field::Weekday, .. }
        ));
    }

    #[test]
    fn first_record_moves_export_time_into_learned_zone() {
        let export_time = Utc.with_ymd_and_hms(2021, 6, 8, 12, 30, 0).single().expect("time");
        let mut session = session().with_export_time(export_time);
        session
            .decode_record(&record("https://a.example/", MONDAY_MS, "2021-06-07 10:00:00.000", "1"))
            .expect("first");

        let local = session.export_time().expect("export time");
        assert_eq!(local.offset().local_minus_utc(), 7200);
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2021-06-08 12:30:00");
        assert_eq!(local.with_timezone(&Utc).format("%H:%M").to_string(), "10:30");
    }

    #[test]
    fn encodes_visit_fields() {
        let zone = FixedOffset::east_opt(2 * 3600).expect("zone");
        let mut encoder = EncodeSession::new(Capabilities::default(), zone);
        let mut v = visit("https://sub.example.com/a", 1_623_052_800_123, "Title");
        v.visit_time += chrono::TimeDelta::nanoseconds(456_000);
        let fields = encoder.encode_record(&v).expect("encode");
        assert_eq!(
            fields,
            [
                "https://sub.example.com/a",
                "sub.example.com",
                "example.com",
                "1623052800123.456",
                "2021-06-07 10:00:00.123",
                "1",
                "typed",
                "Title",
            ]
        );
        assert_eq!(encoder.record_index(), 1);
    }

    #[test]
    fn dotless_host_gets_no_domain() {
        let mut encoder = EncodeSession::new(Capabilities::default(), Utc);
        let fields = encoder
            .encode_record(&visit("http://localhost:8080/admin", 0, ""))
            .expect("encode");
        assert_eq!(fields[1], "localhost");
        assert_eq!(fields[2], "");
    }

    #[test]
    fn encode_rejects_malformed_url() {
        let mut encoder = EncodeSession::new(Capabilities::default(), Utc);
        let err = encoder.encode_record(&visit("no scheme", 0, "")).expect_err("url");
        assert_eq!(err.record, 1);
        assert!(matches!(err.source, VisitError::MalformedField { field: Field::Url, .. }));

        let err = encoder
            .encode_record(&visit("https://example.com/\tx", 0, ""))
            .expect_err("tab");
        assert!(matches!(err.source, VisitError::MalformedField { field: Field::Url, .. }));
    }

    #[test]
    fn encode_replaces_control_characters_in_title() {
        let mut encoder = EncodeSession::new(Capabilities::default(), Utc);
        let fields = encoder
            .encode_record(&visit("https://example.com/", 0, "a\tb\r\nc\n"))
            .expect("encode");
        assert_eq!(fields[Field::Title.index()], "a b  c");
    }

    #[test]
    fn round_trips_through_encode_and_decode() {
        let zone = FixedOffset::west_opt(5 * 3600).expect("zone");
        let mut encoder = EncodeSession::new(Capabilities::default(), zone);
        let mut decoder = session();

        let mut visits = vec![
            visit("https://news.example.co.uk/story?id=7", 1_384_634_958_041, "Story"),
            visit("http://localhost/", 1_384_634_960_000, ""),
            visit("https://[2001:db8::1]/x", 1_384_700_000_999, "v6"),
        ];
        visits[0].visit_time += chrono::TimeDelta::nanoseconds(754_000);

        for v in &visits {
            let fields = encoder.encode_record(v).expect("encode");
            let refs: [&str; COLUMNS] = std::array::from_fn(|i| fields[i].as_str());
            let decoded = decoder.decode_record(&refs).expect("decode");
            assert_eq!(&decoded, v);
        }
        assert_eq!(decoder.learned_offset(), Some(5 * 3600));
    }

    struct FixtureDomains;

    impl DomainResolver for FixtureDomains {
        fn registrable_domain(&self, host: &str) -> Option<String> {
            host.rsplit_once('.').map(|_| "fixture.test".to_string())
        }
    }

    struct UpperTitles;

    impl TitleNormalizer for UpperTitles {
        fn normalize(&self, title: &str) -> String {
            title.to_uppercase()
        }
    }

    #[test]
    fn uses_injected_capabilities() {
        let caps = Capabilities {
            domains: Arc::new(FixtureDomains),
            titles: Arc::new(UpperTitles),
            ..Capabilities::default()
        };
        let mut session = DecodeSession::new(caps);
        let fields = [
            "https://a.b.c/",
            "a.b.c",
            "fixture.test",
            MONDAY_MS,
            "2021-06-07 08:00:00.000",
            "1",
            "reload",
            "quiet",
        ];
        let visit = session.decode_record(&fields).expect("decode");
        assert_eq!(visit.page_title, "QUIET");
        assert_eq!(visit.transition, PageTransition::Reload);
    }
}
