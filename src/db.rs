use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use tracing::debug;

use crate::error::{GuideError, Result};
use crate::event::{RawEventRow, RawTimestamp};

const SELECT_EVENTS: &str =
    "SELECT rowid, id, title, sport, league, start_utc, stop_utc, status FROM events ORDER BY rowid";

/// Read-only access to the schedule table populated by the acquisition process.
pub struct EventStore {
    conn: Connection,
    location: PathBuf,
}

impl EventStore {
    /// Open an existing schedule database. The file is never created or written.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| {
            GuideError::configuration(format!(
                "cannot open schedule database {}: {err}",
                path.display()
            ))
        })?;

        Ok(Self {
            conn,
            location: path.to_path_buf(),
        })
    }

    /// Wrap an already-open connection, e.g. an in-memory database.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            location: PathBuf::from(":memory:"),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Read every row of the `events` table, unvalidated.
    pub fn read_rows(&self) -> Result<Vec<RawEventRow>> {
        let source_error = |err: rusqlite::Error| {
            GuideError::configuration(format!(
                "cannot read events from {}: {err}",
                self.location.display()
            ))
        };

        let mut stmt = self.conn.prepare(SELECT_EVENTS).map_err(source_error)?;
        let rows = stmt
            .query_map([], raw_row)
            .map_err(source_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(source_error)?;

        debug!(rows = rows.len(), source = %self.location.display(), "read schedule rows");
        Ok(rows)
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawEventRow> {
    Ok(RawEventRow {
        row: row.get(0)?,
        play_id: text(row, 1)?,
        title: text(row, 2)?,
        sport: text(row, 3)?,
        league: text(row, 4)?,
        start: timestamp(row, 5)?,
        stop: timestamp(row, 6)?,
        status: text(row, 7)?,
    })
}

/// Loosely typed text cell: numbers are rendered, blobs count as missing.
fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

/// Timestamp cell. TEXT affinity stores integers as their decimal text, so an
/// all-digit text cell is read back as epoch seconds.
fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<RawTimestamp>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(secs) => Some(RawTimestamp::Unix(secs)),
        ValueRef::Real(value) => Some(RawTimestamp::Real(value)),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match text.trim().parse::<i64>() {
                Ok(secs) => Some(RawTimestamp::Unix(secs)),
                Err(_) => Some(RawTimestamp::Text(text)),
            }
        }
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

#[cfg(test)]
pub(crate) mod test {
    use std::str::FromStr;

    use chrono::{DateTime, Utc};
    use rusqlite::Connection;

    use super::EventStore;
    use crate::error::GuideError;
    use crate::event::{validate_rows, RawTimestamp};

    pub(crate) const SCHEMA: &str = r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT,
            title TEXT,
            sport TEXT,
            league TEXT,
            start_utc TEXT,
            stop_utc TEXT,
            status TEXT
        )
        "#;

    pub(crate) fn memory_store(rows: &[(&str, &str, &str, &str)]) -> EventStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        for (id, title, start, stop) in rows {
            conn.execute(
                "INSERT INTO events (id, title, start_utc, stop_utc) VALUES (?1, ?2, ?3, ?4)",
                (id, title, start, stop),
            )
            .unwrap();
        }
        EventStore::from_connection(conn)
    }

    #[test]
    pub fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let err = EventStore::open(&path).err().unwrap();
        assert!(matches!(err, GuideError::Configuration(_)));
        // Opening read-only must not have created the file.
        assert!(!path.exists());
    }

    #[test]
    pub fn test_missing_table_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x INTEGER)")
            .unwrap();

        let store = EventStore::open(&path).unwrap();
        assert!(matches!(
            store.read_rows(),
            Err(GuideError::Configuration(_))
        ));
    }

    #[test]
    pub fn test_read_rows_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            conn.execute(
                "INSERT INTO events VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    "a1",
                    "Rangers vs. Bruins",
                    "Hockey",
                    "NHL",
                    "2025-03-01T18:00:00Z",
                    "2025-03-01T20:30:00Z",
                    "live",
                ),
            )
            .unwrap();

            // Stored through rusqlite's own chrono encoding.
            let start = DateTime::<Utc>::from_str("2025-03-01 21:00:00Z").unwrap();
            let stop = DateTime::<Utc>::from_str("2025-03-01 23:00:00Z").unwrap();
            conn.execute(
                "INSERT INTO events (id, title, start_utc, stop_utc) VALUES (?1, ?2, ?3, ?4)",
                ("b2", "Late Game", start, stop),
            )
            .unwrap();

            conn.execute(
                "INSERT INTO events (id, title, start_utc, stop_utc) VALUES (?1, ?2, ?3, ?4)",
                ("c3", "Epoch Game", start.timestamp(), stop.timestamp()),
            )
            .unwrap();
        }

        let store = EventStore::open(&path).unwrap();
        let rows = store.read_rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].play_id.as_deref(), Some("a1"));
        assert_eq!(rows[0].status.as_deref(), Some("live"));
        assert_eq!(
            rows[2].start,
            Some(RawTimestamp::Unix(
                DateTime::<Utc>::from_str("2025-03-01 21:00:00Z")
                    .unwrap()
                    .timestamp()
            ))
        );

        let validated = validate_rows(rows);
        assert!(validated.rejected.is_empty());
        assert_eq!(validated.events.len(), 3);
        let late = &validated.events[1];
        assert_eq!(late.play_id, "b2");
        assert_eq!(late.start, DateTime::<Utc>::from_str("2025-03-01 21:00:00Z").unwrap());
        assert_eq!(validated.events[0].is_live, Some(true));
        assert_eq!(validated.events[2].stop, late.stop);
    }

    #[test]
    pub fn test_null_cells_surface_as_missing() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO events (id, title) VALUES ('x', 'No Times')",
            [],
        )
        .unwrap();
        let store = EventStore::from_connection(conn);

        let rows = store.read_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start, None);
        assert_eq!(validate_rows(rows).rejected.len(), 1);
    }

    #[test]
    pub fn test_real_timestamps_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        // Untyped columns keep REAL values as REAL.
        conn.execute_batch(
            "CREATE TABLE events (id TEXT, title TEXT, sport TEXT, league TEXT, start_utc, stop_utc, status TEXT)",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO events (id, title, start_utc, stop_utc) VALUES ('jd', 'Julian', julianday('2025-03-01 18:00:00'), 1740855600.5)",
            [],
        )
        .unwrap();
        // The same value in the TEXT schema arrives as text and fails to parse.
        let text_conn = Connection::open_in_memory().unwrap();
        text_conn.execute_batch(SCHEMA).unwrap();
        text_conn
            .execute(
                "INSERT INTO events (id, title, start_utc, stop_utc) VALUES ('jd', 'Julian', 2460736.25, '2025-03-01T19:00:00Z')",
                [],
            )
            .unwrap();

        let rows = EventStore::from_connection(conn).read_rows().unwrap();
        assert_eq!(rows[0].start, Some(RawTimestamp::Real(2460736.25)));
        assert_eq!(rows[0].stop, Some(RawTimestamp::Real(1740855600.5)));
        let validated = validate_rows(rows);
        assert!(validated.events.is_empty());
        assert_eq!(validated.rejected.len(), 1);

        let rows = EventStore::from_connection(text_conn).read_rows().unwrap();
        assert_eq!(rows[0].start, Some(RawTimestamp::Text("2460736.25".to_string())));
        assert_eq!(validate_rows(rows).rejected.len(), 1);
    }

    #[test]
    pub fn test_memory_store_helper() {
        let store = memory_store(&[("a", "A", "2025-03-01T18:00:00Z", "2025-03-01T19:00:00Z")]);
        assert_eq!(store.read_rows().unwrap().len(), 1);
    }
}
