//! Date detection against a fixed, ordered list of `strftime` patterns.

use std::{fmt, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::number::parse_number;

/// Candidate patterns, in detection order. Ambiguous inputs match several of
/// them; the sampler settles the column's format by frequency.
pub const DATE_FORMATS: &[&str] = &[
    "%m-%d-%Y",
    "%m/%d/%Y",
    "%m.%d.%Y",
    "%m %d %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y %m %d",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d/%b/%Y",
    "%d.%b.%Y",
    "%Y %b %d",
    "%Y-%b-%d",
    "%Y/%b/%d",
    "%Y %B %d",
    "%Y-%B-%d",
    "%d %B %Y",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d %m %Y",
];

/// One of [`DATE_FORMATS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateFormat(&'static str);

impl DateFormat {
    /// Looks `pattern` up among the supported candidates.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        DATE_FORMATS
            .iter()
            .find(|candidate| **candidate == pattern)
            .map(|candidate| DateFormat(*candidate))
    }

    pub fn pattern(&self) -> &'static str {
        self.0
    }

    pub fn all() -> impl Iterator<Item = DateFormat> {
        DATE_FORMATS.iter().map(|pattern| DateFormat(*pattern))
    }

    fn shape(&self) -> &'static Regex {
        let idx = DATE_FORMATS
            .iter()
            .position(|pattern| *pattern == self.0)
            .unwrap_or_default();
        &shapes()[idx]
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl TryFrom<String> for DateFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DateFormat::from_pattern(&value).ok_or_else(|| format!("unsupported date format '{value}'"))
    }
}

impl From<DateFormat> for String {
    fn from(value: DateFormat) -> Self {
        value.0.to_string()
    }
}

/// Parses `raw` with an already decided format.
///
/// The value must have the exact shape of the format before chrono sees it:
/// four-digit years, one or two digit months and days, English month names
/// and at least one whitespace character wherever the format has a space.
pub fn parse_date(raw: &str, format: DateFormat) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !format.shape().is_match(trimmed) {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, format.pattern()).ok()
}

const SHORT_MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";
const FULL_MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";

fn shape_regex(pattern: &str) -> Regex {
    let mut shape = String::from("(?i)^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => match chars.next() {
                Some('Y') => shape.push_str(r"\d{4}"),
                Some('m' | 'd') => shape.push_str(r"\d{1,2}"),
                Some('b') => shape.push_str(&format!("(?:{SHORT_MONTHS})")),
                Some('B') => shape.push_str(&format!("(?:{FULL_MONTHS})")),
                Some(other) => shape.push_str(&regex::escape(&format!("%{other}"))),
                None => shape.push('%'),
            },
            ' ' => shape.push_str(r"\s+"),
            other => shape.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    shape.push('$');
    Regex::new(&shape).expect("valid date shape pattern")
}

fn shapes() -> &'static [Regex] {
    static SHAPES: OnceLock<Vec<Regex>> = OnceLock::new();
    SHAPES.get_or_init(|| DATE_FORMATS.iter().map(|pattern| shape_regex(pattern)).collect())
}

/// Returns every candidate format that parses `raw`, in candidate order.
///
/// Anything [`parse_number`] accepts is never a date, so numeric-looking
/// input yields an empty list without trying any pattern.
pub fn auto_detect_datetime(raw: &str) -> Vec<(NaiveDate, DateFormat)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || parse_number(trimmed, None).is_some() {
        return Vec::new();
    }
    DateFormat::all()
        .filter_map(|format| parse_date(trimmed, format).map(|date| (date, format)))
        .collect()
}
