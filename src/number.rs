//! Number parsing across four thousands/decimal separator conventions.

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Thousands/decimal separator convention of a numeric cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    /// Plain float literal, no grouping.
    None,
    /// `1,234.5`
    Comma,
    /// `1.234,5`
    Dot,
    /// `1 234.5`
    Space,
}

impl Separator {
    /// Priority order used when no separator has been decided yet.
    pub const DETECTION_ORDER: [Separator; 4] = [
        Separator::None,
        Separator::Comma,
        Separator::Dot,
        Separator::Space,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Separator::None => "none",
            Separator::Comma => "comma",
            Separator::Dot => "dot",
            Separator::Space => "space",
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Separator {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Separator::None),
            "comma" => Ok(Separator::Comma),
            "dot" => Ok(Separator::Dot),
            "space" => Ok(Separator::Space),
            other => Err(format!("unknown separator '{other}'")),
        }
    }
}

fn plain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("valid plain number pattern")
    })
}

fn comma_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,3})(,\d{3})*(\.\d+)?$").expect("valid comma number pattern")
    })
}

fn dot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,3})(\.\d{3})*(,\d+)?$").expect("valid dot number pattern")
    })
}

fn space_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,3})( \d{3})*(\.\d+)?$").expect("valid space number pattern")
    })
}

/// Parses `raw` as a number.
///
/// With `separator == None` every grammar is tried in
/// [`Separator::DETECTION_ORDER`] and the first one that matches wins, so an
/// ambiguous token such as `1.234` is read as a plain float. With an explicit
/// separator only that grammar is tried. Empty or malformed input yields
/// `None`.
pub fn parse_number(raw: &str, separator: Option<Separator>) -> Option<(f64, Separator)> {
    match separator {
        Some(sep) => parse_with(raw, sep).map(|value| (value, sep)),
        None => Separator::DETECTION_ORDER
            .iter()
            .find_map(|sep| parse_with(raw, *sep).map(|value| (value, *sep))),
    }
}

/// Like [`parse_number`] for a cell that may be missing.
pub fn parse_optional_number(
    raw: Option<&str>,
    separator: Option<Separator>,
) -> Option<(f64, Separator)> {
    raw.and_then(|value| parse_number(value, separator))
}

fn parse_with(raw: &str, separator: Separator) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = match separator {
        Separator::None => {
            if !plain_pattern().is_match(trimmed) {
                return None;
            }
            trimmed.to_string()
        }
        Separator::Comma => {
            if !comma_pattern().is_match(trimmed) {
                return None;
            }
            trimmed.replace(',', "")
        }
        Separator::Dot => {
            if !dot_pattern().is_match(trimmed) {
                return None;
            }
            trimmed.replace('.', "").replace(',', ".")
        }
        Separator::Space => {
            if !space_pattern().is_match(trimmed) {
                return None;
            }
            trimmed.replace(' ', "")
        }
    };
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}
