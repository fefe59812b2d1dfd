//! # History Trends Unlimited Exports
//!
//! Decoding and encoding of browsing history exported by the History Trends
//! Unlimited extension. Visit times are kept in UTC; the zone the export was
//! written in is learned while decoding.

pub mod analysis;
pub mod error;
pub mod reader;
pub mod time;
pub mod url_check;
pub mod writer;

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::transition::PageTransition;

pub use analysis::{COLUMNS, DecodeSession, EncodeSession};
pub use error::{Field, RecordError, VisitError};
pub use reader::{AnalysisReader, ExportError, read_export};
pub use writer::AnalysisWriter;

/// A page visit. URL and visit time together identify a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub url: String,
    pub visit_time: DateTime<Utc>,
    pub transition: PageTransition,
    pub page_title: String,
}

/// A decoded export. The export time carries the export's zone once it has
/// been learned from the records; before that it is UTC.
#[derive(Debug, Clone)]
pub struct Export {
    pub source: String,
    pub export_time: Option<DateTime<FixedOffset>>,
    pub visits: Vec<Visit>,
}

static TAKEOUT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^takeout-(\d{8}T\d{6}Z)-\d{3}\.(?:tgz|zip)$").expect("valid takeout pattern")
});

/// Export time encoded in a Takeout archive name such as
/// `takeout-20210306T220632Z-001.zip`. The stamp says `Z` but is the
/// archive creator's wall clock, so it is only trustworthy once the
/// export's zone is known.
pub fn export_time_from_filename(name: &str) -> Option<DateTime<Utc>> {
    let caps = TAKEOUT_NAME.captures(name)?;
    NaiveDateTime::parse_from_str(&caps[1], "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

impl AsRef<Visit> for Visit {
    fn as_ref(&self) -> &Visit {
        self
    }
}

/// Keep the first item for each `(url, visit_time)` pair, in order.
pub fn merge_visits<T, I>(items: I) -> Vec<T>
where
    T: AsRef<Visit>,
    I: IntoIterator<Item = T>,
{
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let visit = item.as_ref();
            seen.insert((visit.url.clone(), visit.visit_time))
        })
        .collect()
}
