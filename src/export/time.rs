//! # Visit Time Resolution
//!
//! An analysis record describes one visit time three ways: Unix epoch
//! milliseconds in UTC (with sub-millisecond digits), a local wall-clock
//! string truncated to milliseconds, and the local day of the week. The
//! wall clock is the export machine's local time, so differencing it
//! against the epoch value recovers the timezone offset of the export.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Utc, Weekday};

use crate::export::error::{Field, VisitError};

/// Layout of the "Visit Time (string)" column, e.g. `2013-11-16 14:49:18.041`.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const LOCAL_TIME_LEN: usize = 23;
const MAX_FRACTION_DIGITS: usize = 6;
const SECONDS_PER_DAY: i64 = 86_400;

/// Visit instant together with the fixed zone its wall clock was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub instant: DateTime<Utc>,
    pub zone: FixedOffset,
}

impl ResolvedTime {
    /// Seconds to add to the local wall clock to reach UTC
    /// (`local = instant - offset`), e.g. `-3600` for UTC+01:00.
    pub fn offset_seconds(&self) -> i32 {
        -self.zone.local_minus_utc()
    }
}

/// Reconcile the three time columns of a record.
pub fn resolve(
    time_msec: &str,
    time_local: &str,
    weekday: &str,
) -> Result<ResolvedTime, VisitError> {
    let instant = parse_epoch_millis(time_msec)?;
    let local = parse_local_time(time_local)?;

    let diff_ms = (truncate_millis(instant).naive_utc() - local).num_milliseconds();
    if diff_ms % 1000 != 0 {
        return Err(VisitError::inconsistent(
            Field::TimeLocal,
            "whole-second offset from visit time (ms)",
            format!("{diff_ms}ms"),
        ));
    }
    let offset = diff_ms / 1000;
    let zone = i32::try_from(offset)
        .ok()
        .filter(|_| offset.abs() < SECONDS_PER_DAY)
        .and_then(FixedOffset::west_opt)
        .ok_or_else(|| {
            VisitError::inconsistent(
                Field::TimeLocal,
                "offset within one day of UTC",
                format!("{offset}s"),
            )
        })?;

    let day = parse_weekday(weekday)?;
    let computed = local.weekday().num_days_from_sunday();
    if day != computed {
        return Err(VisitError::inconsistent(
            Field::Weekday,
            format!("{computed} ({})", local.weekday()),
            format!("{day} ({})", weekday_name(day)),
        ));
    }

    Ok(ResolvedTime { instant, zone })
}

/// Parse decimal Unix-epoch milliseconds such as `1384634958041.754`.
pub fn parse_epoch_millis(value: &str) -> Result<DateTime<Utc>, VisitError> {
    let malformed = |reason: &str| VisitError::malformed(Field::TimeMsec, value, reason);

    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() => (whole, fraction),
        Some(_) => return Err(malformed("empty fraction")),
        None => (digits, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("expected decimal milliseconds"));
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("expected decimal milliseconds"));
    }
    if fraction.len() > MAX_FRACTION_DIGITS {
        return Err(malformed("precision finer than a nanosecond"));
    }

    let millis: i128 = whole.parse().map_err(|_| malformed("out of range"))?;
    let sub_nanos: i128 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<MAX_FRACTION_DIGITS$}")
            .parse()
            .map_err(|_| malformed("out of range"))?
    };
    let mut nanos = millis
        .checked_mul(1_000_000)
        .and_then(|n| n.checked_add(sub_nanos))
        .ok_or_else(|| malformed("out of range"))?;
    if negative {
        nanos = -nanos;
    }

    let secs =
        i64::try_from(nanos.div_euclid(1_000_000_000)).map_err(|_| malformed("out of range"))?;
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, subsec).ok_or_else(|| malformed("out of range"))
}

/// Format an instant as Unix-epoch milliseconds, keeping sub-millisecond
/// digits only when present.
pub fn format_epoch_millis(instant: &DateTime<Utc>) -> String {
    let nanos = i128::from(instant.timestamp()) * 1_000_000_000
        + i128::from(instant.timestamp_subsec_nanos());
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.unsigned_abs();
    let millis = abs / 1_000_000;
    let sub = abs % 1_000_000;
    if sub == 0 {
        format!("{sign}{millis}")
    } else {
        let fraction = format!("{sub:06}");
        format!("{sign}{millis}.{}", fraction.trim_end_matches('0'))
    }
}

/// Parse the local wall-clock column; exactly millisecond precision, no zone.
pub fn parse_local_time(value: &str) -> Result<NaiveDateTime, VisitError> {
    if value.len() != LOCAL_TIME_LEN || value.as_bytes()[19] != b'.' {
        return Err(VisitError::malformed(
            Field::TimeLocal,
            value,
            "expected YYYY-MM-DD HH:MM:SS.mmm",
        ));
    }
    NaiveDateTime::parse_from_str(value, LOCAL_TIME_FORMAT)
        .map_err(|err| VisitError::malformed(Field::TimeLocal, value, err))
}

pub fn format_local_time<Tz: TimeZone>(local: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    local.format(LOCAL_TIME_FORMAT).to_string()
}

/// Day of the week with 0 for Sunday.
pub fn weekday_index<Tz: TimeZone>(local: &DateTime<Tz>) -> u32 {
    local.weekday().num_days_from_sunday()
}

fn parse_weekday(value: &str) -> Result<u32, VisitError> {
    let day: u32 = value
        .parse()
        .map_err(|_| VisitError::malformed(Field::Weekday, value, "expected integer 0-6"))?;
    if day > 6 {
        return Err(VisitError::malformed(Field::Weekday, value, "day of week out of range 0-6"));
    }
    Ok(day)
}

fn weekday_name(day: u32) -> Weekday {
    match day {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

fn truncate_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}
