//! Visits from a Chrome `History` SQLite database, a sibling source to
//! analysis exports when deduplicating a profile's browsing history.

use std::path::Path;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use crate::capabilities::Capabilities;
use crate::export::Visit;
use crate::transition::PageTransition;

/// Microseconds between 1601-01-01 and 1970-01-01.
const WEBKIT_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

pub fn extract_chrome_visits(path: &Path, caps: &Capabilities) -> Result<Vec<Visit>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    if !has_table(&conn, "urls")? || !has_table(&conn, "visits")? {
        bail!("not a Chrome history database: {}", path.display());
    }

    let mut stmt = conn.prepare(
        "SELECT urls.url, urls.title, visits.visit_time, visits.transition \
         FROM visits JOIN urls ON visits.url = urls.id ORDER BY visits.visit_time",
    )?;
    let rows = stmt.query_map([], |row| {
        let url: String = row.get(0)?;
        let title: Option<String> = row.get(1)?;
        let visit_time: i64 = row.get(2)?;
        let transition: i64 = row.get(3)?;
        Ok((url, title, visit_time, transition))
    })?;

    let mut out = Vec::new();
    let mut skipped = 0u64;
    for row in rows {
        let (url, title, visit_time, transition) = row?;
        let (Some(visit_time), Some(transition)) = (
            webkit_timestamp_to_datetime(visit_time),
            PageTransition::from_raw(transition),
        ) else {
            skipped += 1;
            continue;
        };
        out.push(Visit {
            url,
            visit_time,
            transition,
            page_title: caps.titles.normalize(title.as_deref().unwrap_or("")),
        });
    }
    if skipped > 0 {
        warn!("skipped {skipped} visits with invalid time or transition in {}", path.display());
    }
    Ok(out)
}

fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
    let mut rows = stmt.query([name])?;
    Ok(rows.next()?.is_some())
}

fn webkit_timestamp_to_datetime(microseconds: i64) -> Option<DateTime<Utc>> {
    if microseconds <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_micros(microseconds - WEBKIT_EPOCH_OFFSET_MICROS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn history_db(path: &Path) -> Connection {
        let conn = Connection::open(path).expect("conn");
        conn.execute("CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT)", [])
            .expect("create urls");
        conn.execute(
            "CREATE TABLE visits \
             (id INTEGER PRIMARY KEY, url INTEGER, visit_time INTEGER, transition INTEGER)",
            [],
        )
        .expect("create visits");
        conn
    }

    #[test]
    fn extracts_visits_with_core_transition() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("History");
        let conn = history_db(&path);
        conn.execute(
            "INSERT INTO urls (id, url, title) VALUES (1, ?1, ?2)",
            ("https://example.com", "Example\n"),
        )
        .expect("insert url");
        // 2021-06-07 08:00:00 UTC, TYPED | CHAIN_START | CHAIN_END
        conn.execute(
            "INSERT INTO visits (url, visit_time, transition) VALUES (1, ?1, ?2)",
            (13_267_526_400_000_000i64, 0x3000_0001i64),
        )
        .expect("insert visit");
        drop(conn);

        let visits = extract_chrome_visits(&path, &Capabilities::default()).expect("visits");
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].url, "https://example.com");
        assert_eq!(visits[0].transition, PageTransition::Typed);
        assert_eq!(visits[0].page_title, "Example");
        assert_eq!(visits[0].visit_time.timestamp(), 1_623_052_800);
    }

    #[test]
    fn skips_invalid_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("History");
        let conn = history_db(&path);
        conn.execute("INSERT INTO urls (id, url, title) VALUES (1, 'https://a.example', NULL)", [])
            .expect("insert url");
        conn.execute("INSERT INTO visits (url, visit_time, transition) VALUES (1, 0, 0)", [])
            .expect("zero time");
        conn.execute(
            "INSERT INTO visits (url, visit_time, transition) VALUES (1, 13267526400000000, 42)",
            [],
        )
        .expect("bad transition");
        drop(conn);

        let visits = extract_chrome_visits(&path, &Capabilities::default()).expect("visits");
        assert!(visits.is_empty());
    }

    #[test]
    fn rejects_other_databases() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("places.sqlite");
        let conn = Connection::open(&path).expect("conn");
        conn.execute("CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT)", [])
            .expect("create");
        drop(conn);

        assert!(extract_chrome_visits(&path, &Capabilities::default()).is_err());
    }
}
