//! Best-effort publication date parsing.
//!
//! Blog dates show up as machine timestamps (`2023-05-14T10:00:00-03:00`),
//! numeric dates, or prose in Spanish or English. Numeric dates are read
//! day-first (`05/04/2023` is the 5th of April), matching the regional
//! locale of the blogs this tool targets.
//!
//! Anything that cannot be parsed is kept verbatim by
//! [`publish_date_value`]; a record with an unparsed date is still worth
//! keeping.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static NUMERIC_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b").unwrap());

/// `14 de mayo de 2023`, `14 mayo, 2023`, `1º de sept. del 2023`, `14 May 2023`.
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:º|°|st|nd|rd|th)?\s+(?:de\s+)?(\p{L}+)\.?,?\s+(?:de\s+|del\s+)?(\d{4})\b")
        .unwrap()
});

/// `May 14, 2023`, `mayo 14 de 2023`.
static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\p{L}+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(?:de\s+)?(\d{4})\b").unwrap()
});

const MONTHS: [(&[&str], u32); 12] = [
    (&["enero", "january"], 1),
    (&["febrero", "february"], 2),
    (&["marzo", "march"], 3),
    (&["abril", "april"], 4),
    (&["mayo", "may"], 5),
    (&["junio", "june"], 6),
    (&["julio", "july"], 7),
    (&["agosto", "august"], 8),
    (&["septiembre", "setiembre", "september"], 9),
    (&["octubre", "october"], 10),
    (&["noviembre", "november"], 11),
    (&["diciembre", "december"], 12),
];

/// Month number for a full or abbreviated (3–4 letter) month name.
fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let len = name.chars().count();
    MONTHS.iter().find_map(|(names, number)| {
        names
            .iter()
            .any(|full| *full == name || ((3..=4).contains(&len) && full.starts_with(&name)))
            .then_some(*number)
    })
}

fn expand_year(year: &str) -> Option<i32> {
    let y: i32 = year.parse().ok()?;
    Some(if year.len() == 2 { 2000 + y } else { y })
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse `raw` into a calendar date, day-first for ambiguous numeric forms.
pub fn parse_publish_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    if let Some(c) = ISO_DATE.captures(raw) {
        return ymd(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
    }

    if let Some(c) = NUMERIC_DMY.captures(raw) {
        return ymd(expand_year(&c[3])?, c[2].parse().ok()?, c[1].parse().ok()?);
    }

    for c in DAY_MONTH_YEAR.captures_iter(raw) {
        if let Some(month) = month_from_name(&c[2]) {
            return ymd(c[3].parse().ok()?, month, c[1].parse().ok()?);
        }
    }

    for c in MONTH_DAY_YEAR.captures_iter(raw) {
        if let Some(month) = month_from_name(&c[1]) {
            return ymd(c[3].parse().ok()?, month, c[2].parse().ok()?);
        }
    }

    None
}

/// Stored form of a resolved date: ISO `YYYY-MM-DD` when parseable, the raw
/// text otherwise, `None` when the page had no date.
pub fn publish_date_value(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    match parse_publish_date(&raw) {
        Some(date) => Some(date.format("%Y-%m-%d").to_string()),
        None => Some(raw),
    }
}
