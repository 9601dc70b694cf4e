//! Due date parsing and display helpers.

use chrono::{Datelike, Duration, NaiveDate};

/// Parse a due date typed by the user, relative to `today`.
///
/// Accepts:
/// - `YYYY-MM-DD`
/// - "today", "tomorrow", "yesterday"
/// - weekday names ("fri", "next monday", "this friday")
/// - "end of week" / "eow", "end of month" / "eom"
/// - "in 3d", "in 2w", "in 1m"
pub fn parse_due(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => return Some(week_bounds(today).1),
        "end of month" | "eom" => {
            let (y, m) = if today.month() == 12 { (today.year() + 1, 1) } else { (today.year(), today.month() + 1) };
            return NaiveDate::from_ymd_opt(y, m, 1).map(|d| d - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        if let Some((idx, _)) = rest.char_indices().last() {
            let (num, unit) = rest.split_at(idx);
            if let Ok(n) = num.trim().parse::<i64>() {
                let offset = match unit {
                    "d" => Some(Duration::try_days(n)),
                    "w" => Some(Duration::try_weeks(n)),
                    // Months are approximated as 30 days.
                    "m" => Some(n.checked_mul(30).and_then(Duration::try_days)),
                    _ => None,
                };
                if let Some(offset) = offset {
                    return offset.and_then(|d| today.checked_add_signed(d));
                }
            }
        }
    }

    let (next, name) = match s.strip_prefix("next ") {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix("this ").unwrap_or(&s)),
    };
    if let Some(target) = weekday_index(name) {
        let current = today.weekday().num_days_from_monday() as i64;
        let ahead = (target + 7 - current) % 7;
        let days = if next { ahead + 7 } else { ahead };
        return Some(today + Duration::days(days));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

fn weekday_index(name: &str) -> Option<i64> {
    let idx = match name {
        "monday" | "mon" => 0,
        "tuesday" | "tue" => 1,
        "wednesday" | "wed" => 2,
        "thursday" | "thu" => 3,
        "friday" | "fri" => 4,
        "saturday" | "sat" => 5,
        "sunday" | "sun" => 6,
        _ => return None,
    };
    Some(idx)
}

/// Monday and Sunday of the ISO week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

/// Format a due date the way task rows show it: "Today" for the current
/// day, otherwise `DD Mon, YYYY`.
pub fn format_due(due: NaiveDate, today: NaiveDate) -> String {
    if due == today {
        "Today".into()
    } else {
        due.format("%d %b, %Y").to_string()
    }
}

/// Truncate a string to a maximum width, adding an ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn parses_iso_and_keywords() {
        let today = wednesday();
        assert_eq!(parse_due("2025-02-01", today), NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(parse_due("Tomorrow", today), NaiveDate::from_ymd_opt(2025, 1, 16));
        assert_eq!(parse_due("in 2w", today), NaiveDate::from_ymd_opt(2025, 1, 29));
        assert_eq!(parse_due("eom", today), NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(parse_due("", today), None);
        assert_eq!(parse_due("someday", today), None);
    }

    #[test]
    fn relative_offsets_past_calendar_range_are_rejected() {
        let today = wednesday();
        assert_eq!(parse_due("in 99999999d", today), None);
        assert_eq!(parse_due("in 9999999999999999w", today), None);
        assert_eq!(parse_due("in 400000000000000000m", today), None);
        assert_eq!(parse_due("in -3d", today), NaiveDate::from_ymd_opt(2025, 1, 12));
    }

    #[test]
    fn parses_weekdays() {
        let today = wednesday();
        assert_eq!(parse_due("fri", today), NaiveDate::from_ymd_opt(2025, 1, 17));
        assert_eq!(parse_due("wednesday", today), Some(today));
        assert_eq!(parse_due("next monday", today), NaiveDate::from_ymd_opt(2025, 1, 27));
    }

    #[test]
    fn formats_today_specially() {
        let today = wednesday();
        assert_eq!(format_due(today, today), "Today");
        assert_eq!(format_due(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(), today), "09 Mar, 2025");
    }

    #[test]
    fn truncates_with_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }
}
