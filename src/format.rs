//! Display formatting for timestamps and message previews.
//!
//! Everything here is pure. Dates render day-first (`dd/mm/yyyy`) and clock
//! times as 24-hour `HH:MM`, whatever the user's locale.

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};

/// Wire format of `createdAt`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_FORMAT: &str = "%d/%m/%Y";
const CLOCK_FORMAT: &str = "%H:%M";

pub const ELLIPSIS: &str = "...";

/// Parse a server timestamp as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()?;
    naive.and_local_timezone(Local).earliest()
}

/// `dd/mm/yyyy`, or the input unchanged when it does not parse.
pub fn format_date(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format(DATE_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

/// `HH:MM`, or the input unchanged when it does not parse.
pub fn format_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => format_clock(&ts),
        None => raw.to_string(),
    }
}

pub fn format_clock(ts: &DateTime<Local>) -> String {
    ts.format(CLOCK_FORMAT).to_string()
}

/// Relative label for a server timestamp, measured against the current time.
pub fn time_ago(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => relative_time(&ts, &Local::now()),
        None => raw.to_string(),
    }
}

/// Bucket the distance between `then` and `now`.
///
/// Buckets floor the elapsed time: 59m59s is still minutes, 47h59m is still
/// yesterday. A `then` in the future counts as now.
pub fn relative_time(then: &DateTime<Local>, now: &DateTime<Local>) -> String {
    let elapsed = now.signed_duration_since(*then);
    if elapsed < TimeDelta::zero() {
        return "now".to_string();
    }

    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} h ago", hours)
    } else if days == 1 {
        "yesterday".to_string()
    } else if days < 7 {
        format!("{} days ago", days)
    } else {
        then.format(DATE_FORMAT).to_string()
    }
}

/// Cut `text` to `budget` characters, marking the cut with an ellipsis.
pub fn preview(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// [`preview`] of the whole text on one row: line breaks become spaces.
pub fn preview_line(text: &str, budget: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    preview(&flat, budget)
}
