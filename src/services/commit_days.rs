//! Calendar-day keys for commit activity.
//!
//! Commit timestamps arrive from GitHub as UTC instants. A commit counts
//! toward the calendar day it was made on in the server's local time zone,
//! so a commit at 23:30 UTC may land on the next day east of Greenwich.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::utils::clock::Clock;

/// A day on which the user made at least one commit
pub type CommitDay = NaiveDate;

/// Convert a commit instant into the local calendar day it belongs to
pub fn normalize(timestamp: DateTime<Utc>, clock: &dyn Clock) -> CommitDay {
    clock.local_day(timestamp)
}

/// Distinct days with commit activity, kept in chronological order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveDaySet {
    days: BTreeSet<CommitDay>,
}

impl ActiveDaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit instant; returns false when its day was already present
    pub fn record(&mut self, timestamp: DateTime<Utc>, clock: &dyn Clock) -> bool {
        self.days.insert(normalize(timestamp, clock))
    }

    pub fn insert(&mut self, day: CommitDay) -> bool {
        self.days.insert(day)
    }

    pub fn contains(&self, day: &CommitDay) -> bool {
        self.days.contains(day)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Most recent active day
    pub fn last(&self) -> Option<CommitDay> {
        self.days.iter().next_back().copied()
    }

    /// Days oldest first
    pub fn iter(&self) -> impl Iterator<Item = &CommitDay> + '_ {
        self.days.iter()
    }

    pub fn extend(&mut self, other: ActiveDaySet) {
        self.days.extend(other.days);
    }
}

impl FromIterator<CommitDay> for ActiveDaySet {
    fn from_iter<I: IntoIterator<Item = CommitDay>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().collect(),
        }
    }
}
