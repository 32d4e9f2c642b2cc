//! Relative timestamp labels ("3 minutes ago") for feed rendering.

#[cfg(test)]
#[path = "time_ago_test.rs"]
mod tests;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Render `iso` relative to `now`, using the largest non-zero unit.
///
/// Returns `None` when `iso` is not RFC 3339. Timestamps in the future
/// render as "0 seconds ago".
#[must_use]
pub fn time_ago(iso: &str, now: OffsetDateTime) -> Option<String> {
    let then = OffsetDateTime::parse(iso, &Rfc3339).ok()?;
    let seconds = (now - then).whole_seconds().max(0);
    Some(label_for_seconds(seconds))
}

/// [`time_ago`] against the current UTC time.
#[must_use]
pub fn time_ago_now(iso: &str) -> Option<String> {
    time_ago(iso, OffsetDateTime::now_utc())
}

fn label_for_seconds(seconds: i64) -> String {
    let units = [(YEAR, "year"), (MONTH, "month"), (WEEK, "week"), (DAY, "day"), (HOUR, "hour"), (MINUTE, "minute")];
    for (size, unit) in units {
        let count = seconds / size;
        if count > 0 {
            return plural(count, unit);
        }
    }
    plural(seconds, "second")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 { format!("1 {unit} ago") } else { format!("{count} {unit}s ago") }
}

/// Comment count label shown under each post.
#[must_use]
pub fn comment_count_label(count: usize) -> String {
    match count {
        0 => "No comments yet".to_owned(),
        1 => "1 comment".to_owned(),
        n => format!("{n} comments"),
    }
}
