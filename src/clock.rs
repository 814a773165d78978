//! Civil date and build time for the site's timezone.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Supplies "today" in the site's calendar and the current instant.
pub trait TimeProvider {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time viewed through a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SiteClock {
    offset: FixedOffset,
}

impl SiteClock {
    /// Offsets outside +/-24h fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl TimeProvider for SiteClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant. Used for pinned edition dates and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

impl TimeProvider for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// The civil day before `date`, saturating at the calendar minimum.
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}
