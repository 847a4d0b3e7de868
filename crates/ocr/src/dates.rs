use std::fmt::Write;
use std::sync::OnceLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, Local, NaiveDate};
use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("no date found in \"{0}\"")]
    NoDate(String),
    #[error("date pattern \"{0}\" cannot be rendered")]
    BadPattern(String),
}

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

macro_rules! month {
    () => {
        r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?"
    };
}

re!(re_iso,
    r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b");
re!(re_month_day_year,
    concat!(r"(?i)\b", month!(), r"\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4}|\d{2})\b"));
re!(re_day_month_year,
    concat!(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?[\s\-/.]*", month!(), r",?[\s\-/.]*(\d{4}|\d{2})\b"));
re!(re_numeric,
    r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b");
re!(re_month_day,
    concat!(r"(?i)\b", month!(), r"\s+(\d{1,2})(?:st|nd|rd|th)?\b"));
re!(re_day_month,
    concat!(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?", month!(), r"(?:\b|$)"));

/// Re-renders whatever date can be found in a field value.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    format: String,
    day_first: bool,
    reference_year: i32,
}

impl DateNormalizer {
    /// `format` is a strftime-style pattern, e.g. `%d-%b-%y`.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            day_first: false,
            reference_year: Local::now().year(),
        }
    }

    /// Read ambiguous numeric dates as day/month instead of month/day.
    pub fn day_first(mut self, day_first: bool) -> Self {
        self.day_first = day_first;
        self
    }

    /// Year assumed for dates written without one.
    pub fn reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn normalize(&self, text: &str) -> Result<String, DateFormatError> {
        let date = parse_fuzzy(text, self.day_first, self.reference_year)
            .ok_or_else(|| DateFormatError::NoDate(text.to_string()))?;
        render(date, &self.format)
    }
}

/// Locate a date anywhere in `text`, ignoring surrounding words.
///
/// The leftmost match wins; at equal positions the more complete pattern wins.
pub fn parse_fuzzy(text: &str, day_first: bool, reference_year: i32) -> Option<NaiveDate> {
    type Reader = fn(&Captures, bool, i32) -> Option<NaiveDate>;
    let readers: [(&Regex, Reader); 6] = [
        (re_iso(), read_iso as Reader),
        (re_month_day_year(), read_month_day_year as Reader),
        (re_day_month_year(), read_day_month_year as Reader),
        (re_numeric(), read_numeric as Reader),
        (re_month_day(), read_month_day as Reader),
        (re_day_month(), read_day_month as Reader),
    ];

    let mut best: Option<(usize, NaiveDate)> = None;
    for (re, read) in readers {
        for caps in re.captures_iter(text) {
            let start = caps.get(0)?.start();
            if best.is_some_and(|(pos, _)| pos <= start) {
                break;
            }
            if let Some(date) = read(&caps, day_first, reference_year) {
                best = Some((start, date));
                break;
            }
        }
    }
    best.map(|(_, date)| date)
}

fn render(date: NaiveDate, format: &str) -> Result<String, DateFormatError> {
    let items = StrftimeItems::new(format);
    if items.clone().any(|item| matches!(item, Item::Error)) {
        return Err(DateFormatError::BadPattern(format.to_string()));
    }
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DateFormatError::BadPattern(format.to_string()))?;
    let mut out = String::new();
    write!(out, "{}", midnight.format_with_items(items))
        .map_err(|_| DateFormatError::BadPattern(format.to_string()))?;
    Ok(out)
}

// ── Pattern readers ──────────────────────────────────────────────────────────

fn num<T: std::str::FromStr>(caps: &Captures, i: usize) -> Option<T> {
    caps.get(i)?.as_str().parse().ok()
}

fn read_iso(caps: &Captures, _: bool, _: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(num(caps, 1)?, num(caps, 2)?, num(caps, 3)?)
}

fn read_month_day_year(caps: &Captures, _: bool, _: i32) -> Option<NaiveDate> {
    let month = month_to_num(caps.get(1)?.as_str())?;
    NaiveDate::from_ymd_opt(expand_year(num(caps, 3)?), month, num(caps, 2)?)
}

fn read_day_month_year(caps: &Captures, _: bool, _: i32) -> Option<NaiveDate> {
    let month = month_to_num(caps.get(2)?.as_str())?;
    NaiveDate::from_ymd_opt(expand_year(num(caps, 3)?), month, num(caps, 1)?)
}

fn read_numeric(caps: &Captures, day_first: bool, _: i32) -> Option<NaiveDate> {
    let a: u32 = num(caps, 1)?;
    let b: u32 = num(caps, 2)?;
    let year = expand_year(num(caps, 3)?);
    let (month, day) = if day_first { (b, a) } else { (a, b) };
    // A value above 12 can only be the day, whatever the preference says.
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

fn read_month_day(caps: &Captures, _: bool, reference_year: i32) -> Option<NaiveDate> {
    let month = month_to_num(caps.get(1)?.as_str())?;
    NaiveDate::from_ymd_opt(reference_year, month, num(caps, 2)?)
}

fn read_day_month(caps: &Captures, _: bool, reference_year: i32) -> Option<NaiveDate> {
    let month = month_to_num(caps.get(2)?.as_str())?;
    NaiveDate::from_ymd_opt(reference_year, month, num(caps, 1)?)
}

fn expand_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

fn month_to_num(name: &str) -> Option<u32> {
    let name = name.trim_end_matches('.').to_lowercase();
    let month = match name.get(..3)? {
        "jan" => 1, "feb" => 2, "mar" => 3, "apr" => 4,
        "may" => 5, "jun" => 6, "jul" => 7, "aug" => 8,
        "sep" => 9, "oct" => 10, "nov" => 11, "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parse(text: &str) -> Option<NaiveDate> {
        parse_fuzzy(text, false, 2030)
    }

    #[test]
    fn normalizes_date_inside_prose() {
        let n = DateNormalizer::new("%d-%b-%y");
        assert_eq!(n.normalize("Delivered on Jan 5, 2024 please confirm").unwrap(), "05-Jan-24");
    }

    #[test]
    fn no_date_is_an_error() {
        let n = DateNormalizer::new("%d-%b-%y");
        assert_eq!(
            n.normalize("no date here"),
            Err(DateFormatError::NoDate("no date here".into()))
        );
        assert!(n.normalize("").is_err());
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let n = DateNormalizer::new("%Q");
        assert_eq!(n.normalize("2024-01-05"), Err(DateFormatError::BadPattern("%Q".into())));
        // Needs an offset a naive date does not have.
        let n = DateNormalizer::new("%z");
        assert!(matches!(n.normalize("2024-01-05"), Err(DateFormatError::BadPattern(_))));
    }

    #[test]
    fn time_fields_render_as_midnight() {
        let n = DateNormalizer::new("%Y-%m-%d %H:%M");
        assert_eq!(n.normalize("2024-03-15").unwrap(), "2024-03-15 00:00");
    }

    #[test]
    fn month_name_forms() {
        assert_eq!(parse("January 5 2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse("Sept. 21st, 2023"), Some(date(2023, 9, 21)));
        assert_eq!(parse("Date of delivery 28-Jul-2024"), Some(date(2024, 7, 28)));
        assert_eq!(parse("05-Jan-24"), Some(date(2024, 1, 5)));
        assert_eq!(parse("15 March 2024"), Some(date(2024, 3, 15)));
    }

    #[test]
    fn numeric_forms() {
        assert_eq!(parse("2024-03-15"), Some(date(2024, 3, 15)));
        assert_eq!(parse("2024/3/5"), Some(date(2024, 3, 5)));
        assert_eq!(parse("due 03/04/2024"), Some(date(2024, 3, 4)));
        assert_eq!(parse_fuzzy("due 03/04/2024", true, 2030), Some(date(2024, 4, 3)));
        // 28 cannot be a month.
        assert_eq!(parse("28.07.24"), Some(date(2024, 7, 28)));
    }

    #[test]
    fn missing_year_uses_reference_year() {
        assert_eq!(parse("ship by Feb 3"), Some(date(2030, 2, 3)));
        assert_eq!(parse("3rd of February"), Some(date(2030, 2, 3)));
    }

    #[test]
    fn leftmost_date_wins() {
        assert_eq!(parse("from 2024-01-02 to Jan 9, 2024"), Some(date(2024, 1, 2)));
        assert_eq!(parse("from Jan 9, 2024 to 2024-01-02"), Some(date(2024, 1, 9)));
    }

    #[test]
    fn impossible_dates_are_skipped() {
        assert_eq!(parse("Feb 30, 2024"), None);
        assert_eq!(parse("Order 12345"), None);
        assert_eq!(parse("Janet 5"), None);
    }
}
