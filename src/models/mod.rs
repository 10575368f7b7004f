pub mod streak_record;
