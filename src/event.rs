use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::error::{DataIntegrityError, IntegrityViolation};

pub const UNKNOWN_TITLE: &str = "Unknown Event";

/// A validated schedule row. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub play_id: String,
    pub title: String,
    pub sport: Option<String>,
    pub league: Option<String>,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    /// Explicit liveness from the source. `None` means derive it from `start`/`stop`.
    pub is_live: Option<bool>,
}

/// A timestamp cell as it was stored.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Text(String),
    Unix(i64),
    /// Floating point cell. Never accepted: it could be fractional epoch
    /// seconds or a julian day number.
    Real(f64),
}

/// A row exactly as it came out of the store, before any validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEventRow {
    pub row: i64,
    pub play_id: Option<String>,
    pub title: Option<String>,
    pub sport: Option<String>,
    pub league: Option<String>,
    pub start: Option<RawTimestamp>,
    pub stop: Option<RawTimestamp>,
    pub status: Option<String>,
}

impl TryFrom<RawEventRow> for Event {
    type Error = DataIntegrityError;

    fn try_from(raw: RawEventRow) -> Result<Self, Self::Error> {
        let play_id = non_blank(raw.play_id);
        let fail = |violation| DataIntegrityError {
            play_id: play_id.clone(),
            row: raw.row,
            violation,
        };

        let Some(id) = play_id.as_deref() else {
            return Err(fail(IntegrityViolation::MissingField("id")));
        };
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(fail(IntegrityViolation::InvalidPlayId));
        }

        let start = timestamp_field("start_utc", raw.start).map_err(fail)?;
        let stop = timestamp_field("stop_utc", raw.stop).map_err(fail)?;
        if start > stop {
            return Err(fail(IntegrityViolation::StartAfterStop));
        }

        Ok(Event {
            play_id: id.to_string(),
            title: non_blank(raw.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            sport: non_blank(raw.sport),
            league: non_blank(raw.league),
            start,
            stop,
            is_live: is_live_from_status(raw.status.as_deref()),
        })
    }
}

fn timestamp_field(
    field: &'static str,
    value: Option<RawTimestamp>,
) -> Result<DateTime<Utc>, IntegrityViolation> {
    match value {
        None => Err(IntegrityViolation::MissingField(field)),
        Some(RawTimestamp::Text(text)) if text.trim().is_empty() => {
            Err(IntegrityViolation::MissingField(field))
        }
        Some(RawTimestamp::Text(text)) => {
            parse_utc(&text).ok_or(IntegrityViolation::InvalidTimestamp { field, value: text })
        }
        Some(RawTimestamp::Unix(secs)) => DateTime::<Utc>::from_timestamp(secs, 0).ok_or(
            IntegrityViolation::InvalidTimestamp {
                field,
                value: secs.to_string(),
            },
        ),
        Some(RawTimestamp::Real(value)) => Err(IntegrityViolation::InvalidTimestamp {
            field,
            value: value.to_string(),
        }),
    }
}

/// Parse the timestamp spellings found in the schedule table into UTC.
///
/// Accepts RFC 3339 (`2025-03-01T18:00:00Z`) and SQLite datetime text
/// (`2025-03-01 18:00:00`, with optional fraction and offset). Values without
/// an offset are taken to be UTC already.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let spaced = value.replacen('T', " ", 1);
    let spaced = spaced.strip_suffix('Z').unwrap_or(&spaced);
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(spaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(spaced, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// `status` column → live override.
pub fn is_live_from_status(status: Option<&str>) -> Option<bool> {
    let status = status.map(str::trim).filter(|s| !s.is_empty())?;
    let live = ["live", "in", "in_progress"]
        .iter()
        .any(|s| status.eq_ignore_ascii_case(s));
    Some(live)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The outcome of validating every row read in a run.
#[derive(Debug, Default)]
pub struct ValidatedEvents {
    /// At most one event per play id, ordered by play id.
    pub events: Vec<Event>,
    pub rejected: Vec<DataIntegrityError>,
    /// Rows dropped because an identical row with the same play id was kept.
    pub merged: usize,
}

/// Turn raw rows into events. Invalid rows are logged and collected, never fatal.
///
/// Rows that share a play id but are otherwise identical are the same event and
/// collapse into one, with a warning and a count in [`ValidatedEvents::merged`].
/// When their content differs the row with the smallest `(start, stop, title)`
/// wins and the rest are rejected, so the outcome does not depend on the order
/// the store returned them in.
pub fn validate_rows<I>(rows: I) -> ValidatedEvents
where
    I: IntoIterator<Item = RawEventRow>,
{
    let mut rejected = Vec::new();
    let mut merged = 0;
    let mut by_id: BTreeMap<String, Vec<(i64, Event)>> = BTreeMap::new();

    for raw in rows {
        let row = raw.row;
        match Event::try_from(raw) {
            Ok(event) => by_id
                .entry(event.play_id.clone())
                .or_default()
                .push((row, event)),
            Err(err) => rejected.push(err),
        }
    }

    let mut events = Vec::with_capacity(by_id.len());
    for (play_id, mut group) in by_id {
        group.sort_by(|(row_a, a), (row_b, b)| {
            (a.start, a.stop, &a.title, row_a).cmp(&(b.start, b.stop, &b.title, row_b))
        });
        let mut group = group.into_iter();
        let Some((_, kept)) = group.next() else {
            continue;
        };

        for (row, other) in group {
            if other == kept {
                warn!(play_id = %play_id, row, "merged duplicate schedule row");
                merged += 1;
            } else {
                rejected.push(DataIntegrityError {
                    play_id: Some(play_id.clone()),
                    row,
                    violation: IntegrityViolation::DuplicatePlayId,
                });
            }
        }
        events.push(kept);
    }

    rejected.sort_by_key(|err| err.row);
    for err in &rejected {
        warn!(
            play_id = err.play_id.as_deref().unwrap_or(""),
            row = err.row,
            reason = %err.violation,
            "skipping schedule row"
        );
    }

    ValidatedEvents {
        events,
        rejected,
        merged,
    }
}
