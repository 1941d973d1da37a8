//! Date helpers shared by the renderers.
//!
//! Upstream dates arrive as `YYYY-MM-DD`, as SQL-ish datetimes or as RFC 3339
//! timestamps. Everything is reduced to a calendar day.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Placeholder the invoicing API uses for "no date".
pub const ZERO_DATE: &str = "0000-00-00";

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw == ZERO_DATE {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

/// `DD.MM.YYYY`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Format a raw upstream date, `None` when it does not parse.
pub fn display_date(raw: Option<&str>) -> Option<String> {
    raw.and_then(parse_date).map(format_date)
}

/// `MM/YYYY` bucket key; the day of month is irrelevant.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%m/%Y").to_string()
}

/// A validity date lapses the day after it.
pub fn is_expired(valid_until: NaiveDate, today: NaiveDate) -> bool {
    valid_until < today
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parses_upstream_shapes() {
        assert_eq!(parse_date("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T10:15:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T10:15:00.123"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T10:15:00Z"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 10:15:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date(ZERO_DATE), None);
        assert_eq!(parse_date("zítra"), None);
    }

    #[test]
    fn test_czech_display_format() {
        assert_eq!(format_date(day(2024, 3, 5)), "05.03.2024");
        assert_eq!(display_date(Some("2024-12-31")), Some("31.12.2024".into()));
        assert_eq!(display_date(None), None);
    }

    #[test]
    fn test_expiry_is_strictly_before_today() {
        let today = day(2024, 6, 15);
        assert!(is_expired(day(2024, 6, 14), today));
        assert!(!is_expired(day(2024, 6, 15), today));
        assert!(!is_expired(day(2024, 6, 16), today));
    }

    #[test]
    fn test_month_key_ignores_day() {
        assert_eq!(month_key(day(2024, 2, 1)), month_key(day(2024, 2, 29)));
        assert_eq!(month_key(day(2024, 2, 1)), "02/2024");
    }
}
