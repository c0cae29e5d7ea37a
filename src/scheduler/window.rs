use chrono::{NaiveDateTime, Timelike};

pub const OVERRIDE_HOUR: u32 = 11;
pub const OVERRIDE_LAST_MINUTE: u32 = 20;

pub const COMPARISON_FIRST_HOUR: u32 = 11;
pub const COMPARISON_MINUTE: u32 = 30;

/// Missing-rate alerts go out at most once per block of this many minutes.
pub const ALERT_BLOCK_MINUTES: u32 = 5;

/// 11:00 through 11:20 inclusive, until today's override has been stored.
pub fn is_override_window(now: NaiveDateTime, updated_today: bool) -> bool {
    !updated_today && now.hour() == OVERRIDE_HOUR && now.minute() <= OVERRIDE_LAST_MINUTE
}

/// Half past every hour from 11:30 on.
pub fn is_comparison_time(now: NaiveDateTime) -> bool {
    now.hour() >= COMPARISON_FIRST_HOUR && now.minute() == COMPARISON_MINUTE
}

pub fn is_alert_minute(now: NaiveDateTime) -> bool {
    now.minute() % ALERT_BLOCK_MINUTES == 0
}
