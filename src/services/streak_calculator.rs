use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::commit_days::{ActiveDaySet, CommitDay};

/// Upper bound on the walk back from today
pub const MAX_CURRENT_STREAK: u32 = 365;

/// Streak metrics derived from a set of active days
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_commit_date: Option<CommitDay>,
    /// The current streak's days, oldest first
    pub streak_dates: Vec<CommitDay>,
}

/// Compute current and longest streaks as seen on `today`
pub fn compute(active_days: &ActiveDaySet, today: NaiveDate) -> StreakSummary {
    if active_days.is_empty() {
        return StreakSummary::default();
    }

    let streak_dates = current_run(active_days, today);

    StreakSummary {
        current_streak: streak_dates.len() as u32,
        longest_streak: longest_run(active_days),
        last_commit_date: active_days.last(),
        streak_dates,
    }
}

/// Walk back from today while every day is active
fn current_run(active_days: &ActiveDaySet, today: NaiveDate) -> Vec<CommitDay> {
    let mut dates = Vec::new();
    let mut day = today;

    while active_days.contains(&day) && (dates.len() as u32) < MAX_CURRENT_STREAK {
        dates.push(day);
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    dates.reverse();
    dates
}

/// Length of the longest run of consecutive days
fn longest_run(active_days: &ActiveDaySet) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<CommitDay> = None;

    for &day in active_days.iter() {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}
