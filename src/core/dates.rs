//! Ordered multi-format parsing of free-form birthdates.
//!
//! Formats are tried in a fixed order and the first one that yields a real
//! calendar date wins, so `03/04/2000` reads as 3 April (day-first comes
//! before month-first). Callers that cannot accept that guess use
//! [`parse_date_strict`].

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$").expect("valid ISO date regex"));
static SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})$").expect("valid slash date regex"));
static DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})-([0-9]{1,2})-([0-9]{4})$").expect("valid dash date regex"));

/// Earliest accepted birth year; older years are treated as data-entry errors.
pub const MIN_BIRTH_YEAR: i32 = 1900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    IsoYmd,
    DayMonthSlash,
    MonthDaySlash,
    DayMonthDash,
    MonthDayDash,
}

/// Attempt order. Changing it changes how ambiguous inputs are read.
pub const DATE_FORMATS: [DateFormat; 5] = [
    DateFormat::IsoYmd,
    DateFormat::DayMonthSlash,
    DateFormat::MonthDaySlash,
    DateFormat::DayMonthDash,
    DateFormat::MonthDayDash,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParseError {
    /// No format matched the shape of the input.
    Unparseable,
    /// Some format matched the shape, but the numbers are not a real date.
    InvalidCalendarDate,
    /// Day-first and month-first readings both produce different valid dates.
    Ambiguous,
}

enum Attempt {
    NoMatch,
    Invalid,
    Valid(NaiveDate),
}

impl DateFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::IsoYmd => "YYYY-MM-DD",
            DateFormat::DayMonthSlash => "DD/MM/YYYY",
            DateFormat::MonthDaySlash => "MM/DD/YYYY",
            DateFormat::DayMonthDash => "DD-MM-YYYY",
            DateFormat::MonthDayDash => "MM-DD-YYYY",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            DateFormat::IsoYmd => &ISO_RE,
            DateFormat::DayMonthSlash | DateFormat::MonthDaySlash => &SLASH_RE,
            DateFormat::DayMonthDash | DateFormat::MonthDayDash => &DASH_RE,
        }
    }

    /// (year, month, day) from the captured groups
    fn fields(&self, caps: &Captures) -> Option<(i32, u32, u32)> {
        let group = |i: usize| caps.get(i).map(|m| m.as_str());
        let (year, month, day) = match self {
            DateFormat::IsoYmd => (group(1)?, group(2)?, group(3)?),
            DateFormat::DayMonthSlash | DateFormat::DayMonthDash => {
                (group(3)?, group(2)?, group(1)?)
            }
            DateFormat::MonthDaySlash | DateFormat::MonthDayDash => {
                (group(3)?, group(1)?, group(2)?)
            }
        };
        Some((year.parse().ok()?, month.parse().ok()?, day.parse().ok()?))
    }

    fn attempt(&self, input: &str) -> Attempt {
        let Some(caps) = self.regex().captures(input) else {
            return Attempt::NoMatch;
        };
        match self
            .fields(&caps)
            .filter(|(y, _, _)| *y >= MIN_BIRTH_YEAR)
            .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        {
            Some(date) => Attempt::Valid(date),
            None => Attempt::Invalid,
        }
    }
}

/// Parses with the first format that yields a valid date.
pub fn parse_date(input: &str) -> Result<(NaiveDate, DateFormat), DateParseError> {
    let input = input.trim();
    let mut shape_matched = false;

    for format in DATE_FORMATS {
        match format.attempt(input) {
            Attempt::Valid(date) => return Ok((date, format)),
            Attempt::Invalid => shape_matched = true,
            Attempt::NoMatch => {}
        }
    }

    if shape_matched {
        Err(DateParseError::InvalidCalendarDate)
    } else {
        Err(DateParseError::Unparseable)
    }
}

/// Like [`parse_date`], but refuses inputs that more than one format reads
/// as different valid dates.
pub fn parse_date_strict(input: &str) -> Result<(NaiveDate, DateFormat), DateParseError> {
    let (date, format) = parse_date(input)?;
    let trimmed = input.trim();

    let conflicting = DATE_FORMATS
        .iter()
        .filter(|other| **other != format)
        .any(|other| matches!(other.attempt(trimmed), Attempt::Valid(d) if d != date));

    if conflicting {
        Err(DateParseError::Ambiguous)
    } else {
        Ok((date, format))
    }
}
