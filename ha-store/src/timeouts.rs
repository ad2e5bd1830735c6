use chrono::{DateTime, Duration, Utc};

/// Mirrors `Action._is_check_heart_beat_overtime`: a node is heartbeat-timed-out
/// once `now` is strictly past `heartbeat + timeout_secs`.
pub fn heartbeat_overtime(heartbeat: DateTime<Utc>, now: DateTime<Utc>, timeout_secs: u64) -> bool {
    now > heartbeat + Duration::seconds(timeout_secs as i64)
}

/// Mirrors `Action._is_alarmed_timeout`: an un-set `alarmed_at` (the debounce
/// flag was never raised) is never timed out.
pub fn alarmed_timeout(alarmed_at: Option<DateTime<Utc>>, now: DateTime<Utc>, timeout_hours: u64) -> bool {
    match alarmed_at {
        None => false,
        Some(at) => now > at + Duration::hours(timeout_hours as i64),
    }
}
