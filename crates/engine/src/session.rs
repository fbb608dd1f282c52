//! Time-of-day session filter

use crate::types::Session;

/// Whether a candle stamped `time` may produce a signal under `session`.
///
/// Candles without a time-of-day component (daily bars) are always eligible.
/// A bound or candle time that cannot be read as `HH:MM` makes the candle
/// ineligible.
pub fn in_session(time: &str, session: Option<&Session>) -> bool {
    let Some(session) = session else {
        return true;
    };
    let Some(time_part) = time_of_day(time) else {
        return true;
    };

    match (
        minutes_since_midnight(time_part),
        minutes_since_midnight(&session.start),
        minutes_since_midnight(&session.end),
    ) {
        (Some(minutes), Some(start), Some(end)) => start <= minutes && minutes <= end,
        _ => false,
    }
}

/// The part of a timestamp after the date, if any.
///
/// Accepts ISO-8601 (`2024-01-01T09:00`) and the space-separated form market
/// data providers return (`2024-01-01 09:00:00`).
fn time_of_day(time: &str) -> Option<&str> {
    if let Some((_, rest)) = time.split_once('T') {
        return Some(rest);
    }
    let (_, rest) = time.trim().split_once(' ')?;
    let rest = rest.trim_start();
    let starts_with_digit = rest.chars().next().is_some_and(|c| c.is_ascii_digit());
    (starts_with_digit && rest.contains(':')).then_some(rest)
}

/// Parse the leading `H:MM` of a string into minutes since midnight.
///
/// Hours above 23 or minutes above 59 are not a time of day.
pub fn minutes_since_midnight(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes = leading_digits(parts.next()?)?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

fn leading_digits(value: &str) -> Option<u32> {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(start: &str, end: &str) -> Session {
        Session {
            start: start.to_string(),
            end: end.to_string(),
            timezone: Some("UTC".to_string()),
        }
    }

    #[test]
    fn test_no_session_accepts_everything() {
        assert!(in_session("2024-01-01T03:00", None));
    }

    #[test]
    fn test_iso_time_inside_and_outside_window() {
        let s = session("08:00", "12:00");
        assert!(in_session("2024-01-01T09:00", Some(&s)));
        assert!(!in_session("2024-01-01T13:00", Some(&s)));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let s = session("08:00", "12:00");
        assert!(in_session("2024-01-01T08:00:00", Some(&s)));
        assert!(in_session("2024-01-01T12:00:00Z", Some(&s)));
        assert!(!in_session("2024-01-01T12:01", Some(&s)));
    }

    #[test]
    fn test_date_only_candles_ignore_the_filter() {
        let s = session("08:00", "12:00");
        assert!(in_session("2024-01-01", Some(&s)));
        assert!(in_session("t0", Some(&s)));
    }

    #[test]
    fn test_space_separated_datetime_is_filtered() {
        let s = session("08:00", "12:00");
        assert!(in_session("2024-01-01 10:15:00", Some(&s)));
        assert!(!in_session("2024-01-01 19:45:00", Some(&s)));
    }

    #[test]
    fn test_unreadable_bounds_exclude_timed_candles() {
        let s = session("morning", "12:00");
        assert!(!in_session("2024-01-01T09:00", Some(&s)));
        assert!(in_session("2024-01-01", Some(&s)));
    }

    #[test]
    fn test_minutes_since_midnight() {
        assert_eq!(minutes_since_midnight("00:00"), Some(0));
        assert_eq!(minutes_since_midnight("9:30"), Some(570));
        assert_eq!(minutes_since_midnight("23:59:59.000Z"), Some(1439));
        assert_eq!(minutes_since_midnight("09"), None);
        assert_eq!(minutes_since_midnight(""), None);
    }

    #[test]
    fn test_out_of_range_clock_values_are_unreadable() {
        assert_eq!(minutes_since_midnight("24:00"), None);
        assert_eq!(minutes_since_midnight("12:60"), None);
        assert_eq!(minutes_since_midnight("24:61"), None);
        assert_eq!(minutes_since_midnight("99999999:00"), None);
        assert_eq!(minutes_since_midnight("99999999999999999999:00"), None);
    }

    #[test]
    fn test_oversized_bounds_exclude_timed_candles() {
        let s = session("99999999:00", "12:00");
        assert!(!in_session("2024-01-01T09:00", Some(&s)));
        assert!(in_session("2024-01-01", Some(&s)));

        let s = session("08:00", "24:61");
        assert!(!in_session("2024-01-01 10:00:00", Some(&s)));
    }

    #[test]
    fn test_oversized_candle_time_is_ineligible() {
        let s = session("00:00", "23:59");
        assert!(!in_session("2024-01-01T4294967295:00", Some(&s)));
    }
}
