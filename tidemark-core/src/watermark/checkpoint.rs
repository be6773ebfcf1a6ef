use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Day granularity watermark of one company, with the position reached within that day's
/// listing. The offset only makes sense for the stored date and is dropped when the date rolls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCheckpoint {
    pub company_uuid: String,
    /// `YYYY-MM-DD`
    pub last_seen: Option<String>,
    pub offset: Option<u64>,
}

impl CompanyCheckpoint {
    pub fn new(company_uuid: impl Into<String>) -> Self {
        Self {
            company_uuid: company_uuid.into(),
            last_seen: None,
            offset: None,
        }
    }

    /// See [Self::with_updated_last_seen_at], against the wall clock.
    pub fn with_updated_last_seen(self, time_delta_days: u32) -> Self {
        self.with_updated_last_seen_at(Utc::now(), time_delta_days)
    }

    /// Rolls the date forward to `now - time_delta_days` once the stored date falls outside that
    /// window, resetting the offset. A checkpoint still inside the window is returned as is. A
    /// window reaching past the representable range starts at the earliest representable day.
    pub fn with_updated_last_seen_at(self, now: DateTime<Utc>, time_delta_days: u32) -> Self {
        let candidate = TimeDelta::try_days(i64::from(time_delta_days))
            .and_then(|delta| now.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .date_naive();

        match self.last_seen_date() {
            Some(stored) if stored >= candidate => self,
            _ => Self {
                company_uuid: self.company_uuid,
                last_seen: Some(candidate.format(DATE_FORMAT).to_string()),
                offset: None,
            },
        }
    }

    /// Unparsable dates read as absent.
    pub fn last_seen_date(&self) -> Option<NaiveDate> {
        self.last_seen
            .as_deref()
            .and_then(|date| NaiveDate::parse_from_str(date, DATE_FORMAT).ok())
    }

    /// Start of the stored day, in UTC.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.last_seen_date()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
    }
}
