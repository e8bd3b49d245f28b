//! Best-effort publication date parsing.
//!
//! Dates on listing pages and in feeds are wildly inconsistent, so parsing is
//! an ordered list of attempts. The first one that succeeds wins; if none
//! does the date is simply unknown. Nothing here ever fails loudly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

type Attempt = fn(&str) -> Option<DateTime<Utc>>;

/// Attempts for free-form dates: ISO-8601 first, then long-form calendar dates.
const DATE_ATTEMPTS: &[Attempt] = &[rfc3339, iso_naive_datetime, iso_date, long_form];

/// Feed timestamps are usually RFC 2822 (RSS) or RFC 3339 (Atom).
const FEED_DATE_ATTEMPTS: &[Attempt] = &[rfc2822, rfc3339, iso_naive_datetime, iso_date, long_form];

/// "March 3, 2025", "Mar 3 2025", "Sept. 14th, 2024"
static LONG_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("long-form date pattern is valid")
});

/// Parse a date found on an HTML page.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    run_attempts(DATE_ATTEMPTS, raw)
}

/// Parse a timestamp taken from an RSS or Atom entry.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    run_attempts(FEED_DATE_ATTEMPTS, raw)
}

fn run_attempts(attempts: &[Attempt], raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    attempts.iter().find_map(|attempt| attempt(raw))
}

fn rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn rfc2822(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn iso_naive_datetime(raw: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn iso_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Month number for a full month name, its three-letter abbreviation, or
/// "sept".
fn month_number(word: &str) -> Option<u32> {
    let word = word.to_ascii_lowercase();
    if word == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| *m == word || m[..3] == word)
        .map(|i| i as u32 + 1)
}

/// Finds the first "Month Day, Year" in the text, which may carry extra
/// words such as "Published" or "5 min read".
fn long_form(raw: &str) -> Option<DateTime<Utc>> {
    LONG_FORM.captures_iter(raw).find_map(|caps| {
        let month = month_number(caps.get(1)?.as_str())?;
        let day = caps.get(2)?.as_str().parse().ok()?;
        let year = caps.get(3)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}
