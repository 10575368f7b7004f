pub mod commit_aggregation;
pub mod commit_check;
pub mod commit_days;
pub mod error;
pub mod git_platforms;
pub mod language_stats;
pub mod streak_cache;
pub mod streak_calculator;
pub mod streak_store;
