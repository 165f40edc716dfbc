//! Regular US equity market-hours predicate (§4.8): 9:30-16:00
//! America/New_York, Monday-Friday. Deliberately ignorant of holidays (the
//! spec only names the daily window and weekday rule); the exchange's own
//! timezone is used throughout, never the host's local time, so this gives
//! the same answer regardless of where the process is deployed.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

/// Whether `now` falls inside 9:30-16:00 America/New_York on a weekday.
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&New_York);
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minutes_since_midnight = local.hour() * 60 + local.minute();
    let open = 9 * 60 + 30;
    let close = 16 * 60;
    minutes_since_midnight >= open && minutes_since_midnight < close
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weekday_during_session_is_open() {
        // 2024-01-02 is a Tuesday; 14:30 UTC is 9:30 America/New_York (EST).
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        assert!(is_market_open(ts));
    }

    #[test]
    fn weekday_before_open_is_closed() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 13, 0, 0).unwrap();
        assert!(!is_market_open(ts));
    }

    #[test]
    fn weekend_is_always_closed() {
        // 2024-01-06 is a Saturday.
        let ts = Utc.with_ymd_and_hms(2024, 1, 6, 15, 0, 0).unwrap();
        assert!(!is_market_open(ts));
    }

    #[test]
    fn exactly_at_close_is_closed() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        assert!(!is_market_open(ts));
    }
}
