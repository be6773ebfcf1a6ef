use chrono::{DateTime, TimeDelta, Utc};

use crate::Record;

/// Reads the timestamp a record is ordered by.
pub type Extractor = fn(&Record) -> Option<DateTime<Utc>>;

/// Moves the watermark just past the latest record of `batch`. Records without a timestamp are
/// ignored, and the watermark never moves back.
pub fn advance<F>(current: DateTime<Utc>, batch: &[Record], extract: F) -> DateTime<Utc>
where
    F: Fn(&Record) -> Option<DateTime<Utc>>,
{
    match batch.iter().filter_map(extract).max() {
        Some(latest) if latest > current => latest + TimeDelta::microseconds(1),
        _ => current,
    }
}

/// RFC 3339 timestamp found at the JSON `pointer` of `record`.
pub fn rfc3339_at(record: &Record, pointer: &str) -> Option<DateTime<Utc>> {
    let raw = record.pointer(pointer)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
