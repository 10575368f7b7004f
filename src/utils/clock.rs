use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
#[cfg(test)]
use chrono::{FixedOffset, Offset, TimeZone};

/// Source of "now" and of the local calendar used to turn instants into days.
///
/// Everything that asks what day it is goes through this, so tests can pin
/// both the instant and the time zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day of `instant` in this clock's local time zone
    fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate;

    /// The UTC instant at which the local `day` starts
    fn start_of_local_day(&self, day: NaiveDate) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.local_day(self.now())
    }
}

/// Wall clock in the process's local time zone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&Local).date_naive()
    }

    fn start_of_local_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        // A DST gap can swallow midnight; fall back to reading it as UTC
        midnight
            .and_local_timezone(Local)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc())
    }
}

/// A clock frozen at one instant, observed from a fixed UTC offset
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    /// Noon UTC on the given day; handy for day-granular tests
    pub fn at_noon(day: NaiveDate) -> Self {
        Self::utc(day.and_hms_opt(12, 0, 0).unwrap().and_utc())
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    fn start_of_local_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc())
    }
}
