use chrono::{DateTime, TimeDelta, Utc};

/// Limits on how far back a collector may resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkBounds {
    /// Lookback of an instance without stored watermark.
    pub start_at: TimeDelta,
    /// Stored watermarks older than this are clamped, records in between are skipped.
    pub ignore_older_than: TimeDelta,
}

impl WatermarkBounds {
    /// The point the next fetch starts from, given the stored watermark. Lookbacks reaching
    /// past the representable range saturate at [DateTime::<Utc>::MIN_UTC].
    pub fn effective(&self, stored: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
        let back = |delta: TimeDelta| {
            now.checked_sub_signed(delta)
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        };
        match stored {
            None => back(self.start_at),
            Some(stored) => stored.max(back(self.ignore_older_than)),
        }
    }
}
