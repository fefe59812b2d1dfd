use std::fmt;

use thiserror::Error;

/// Column of an analysis export record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Url,
    Host,
    Domain,
    TimeMsec,
    TimeLocal,
    Weekday,
    Transition,
    Title,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Url,
        Field::Host,
        Field::Domain,
        Field::TimeMsec,
        Field::TimeLocal,
        Field::Weekday,
        Field::Transition,
        Field::Title,
    ];

    /// Column position within a record.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column title as written in the export header row.
    pub fn header(self) -> &'static str {
        match self {
            Field::Url => "URL",
            Field::Host => "Host",
            Field::Domain => "Domain",
            Field::TimeMsec => "Visit Time (ms)",
            Field::TimeLocal => "Visit Time (string)",
            Field::Weekday => "Day of Week",
            Field::Transition => "Transition Type",
            Field::Title => "Page Title",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisitError {
    #[error("malformed {field} {value:?}: {reason}")]
    MalformedField {
        field: Field,
        value: String,
        reason: String,
    },
    #[error("{field} {actual:?} differs from computed {expected:?}")]
    InconsistentRedundancy {
        field: Field,
        expected: String,
        actual: String,
    },
    #[error("timezone offset {actual}s differs from learned offset {expected}s")]
    TimezoneDrift { expected: i32, actual: i32 },
    #[error("unknown transition type {0:?}")]
    UnknownTransition(String),
    #[error("session aborted after failure at record {record}")]
    SessionAborted { record: u64 },
}

impl VisitError {
    pub(crate) fn malformed(field: Field, value: &str, reason: impl fmt::Display) -> Self {
        VisitError::MalformedField {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn inconsistent(
        field: Field,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        VisitError::InconsistentRedundancy {
            field,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// A failure tied to the 1-based record number it occurred at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {record}: {source}")]
pub struct RecordError {
    pub record: u64,
    #[source]
    pub source: VisitError,
}
