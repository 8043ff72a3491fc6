//! Column type decisions and their per-type options.
//!
//! A [`TypeDecision`] is recomputed on every processing pass and is the only
//! input the caster needs besides the raw values. Persisted decisions are
//! read back through [`RawDecision`], so missing or malformed options are
//! rejected when the decision is built rather than while casting.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{date::DateFormat, error::DecisionError, geo::GeoType, number::Separator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Datetime,
    Geo,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Datetime => "datetime",
            FieldType::Geo => "geo",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberOptions {
    pub separator: Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOptions {
    pub date_format: DateFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoOptions {
    pub geo_type: GeoType,
    pub admin_level: u32,
    pub region: u64,
}

/// Inferred type of a column together with the sub-format it is cast under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawDecision", into = "RawDecision")]
pub enum TypeDecision {
    #[default]
    String,
    Number(NumberOptions),
    Datetime(DateOptions),
    Geo(GeoOptions),
}

impl TypeDecision {
    pub fn field_type(&self) -> FieldType {
        match self {
            TypeDecision::String => FieldType::String,
            TypeDecision::Number(_) => FieldType::Number,
            TypeDecision::Datetime(_) => FieldType::Datetime,
            TypeDecision::Geo(_) => FieldType::Geo,
        }
    }

    /// Short human-readable rendering of the options, e.g. `separator=comma`.
    pub fn describe_options(&self) -> String {
        match self {
            TypeDecision::String => String::new(),
            TypeDecision::Number(options) => format!("separator={}", options.separator),
            TypeDecision::Datetime(options) => format!("date_format={}", options.date_format),
            TypeDecision::Geo(options) => format!(
                "geo_type={},admin_level={},region={}",
                options.geo_type, options.admin_level, options.region
            ),
        }
    }
}

impl fmt::Display for TypeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDecision::String => write!(f, "string"),
            other => write!(f, "{}({})", other.field_type(), other.describe_options()),
        }
    }
}

/// Loosely typed `{type, options}` form used for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDecision {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl From<TypeDecision> for RawDecision {
    fn from(decision: TypeDecision) -> Self {
        let mut options = Map::new();
        match decision {
            TypeDecision::String => {}
            TypeDecision::Number(number) => {
                options.insert("separator".into(), Value::from(number.separator.as_str()));
            }
            TypeDecision::Datetime(date) => {
                options.insert("date_format".into(), Value::from(date.date_format.pattern()));
            }
            TypeDecision::Geo(geo) => {
                options.insert("geo_type".into(), Value::from(geo.geo_type.as_str()));
                options.insert("admin_level".into(), Value::from(geo.admin_level));
                options.insert("region".into(), Value::from(geo.region));
            }
        }
        RawDecision {
            field_type: decision.field_type().as_str().to_string(),
            options,
        }
    }
}

impl TryFrom<RawDecision> for TypeDecision {
    type Error = DecisionError;

    fn try_from(raw: RawDecision) -> Result<Self, Self::Error> {
        match raw.field_type.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(TypeDecision::String),
            "number" => {
                let separator = string_option(&raw.options, "number", "separator")?
                    .parse::<Separator>()
                    .map_err(|_| invalid("number", "separator", &raw.options["separator"]))?;
                Ok(TypeDecision::Number(NumberOptions { separator }))
            }
            "datetime" => {
                let pattern = string_option(&raw.options, "datetime", "date_format")?;
                let date_format = DateFormat::from_pattern(pattern)
                    .ok_or_else(|| invalid("datetime", "date_format", &raw.options["date_format"]))?;
                Ok(TypeDecision::Datetime(DateOptions { date_format }))
            }
            "geo" => {
                let geo_type = string_option(&raw.options, "geo", "geo_type")?
                    .parse::<GeoType>()
                    .map_err(|_| invalid("geo", "geo_type", &raw.options["geo_type"]))?;
                let admin_level = integer_option(&raw.options, "geo", "admin_level")?;
                let admin_level = u32::try_from(admin_level)
                    .map_err(|_| invalid("geo", "admin_level", &raw.options["admin_level"]))?;
                let region = integer_option(&raw.options, "geo", "region")?;
                Ok(TypeDecision::Geo(GeoOptions {
                    geo_type,
                    admin_level,
                    region,
                }))
            }
            _ => Err(DecisionError::UnknownType(raw.field_type)),
        }
    }
}

fn invalid(field_type: &'static str, option: &'static str, value: &Value) -> DecisionError {
    DecisionError::InvalidOption {
        field_type,
        option,
        value: value.to_string(),
    }
}

fn required<'a>(
    options: &'a Map<String, Value>,
    field_type: &'static str,
    option: &'static str,
) -> Result<&'a Value, DecisionError> {
    match options.get(option) {
        Some(Value::Null) | None => Err(DecisionError::MissingOption { field_type, option }),
        Some(value) => Ok(value),
    }
}

fn string_option<'a>(
    options: &'a Map<String, Value>,
    field_type: &'static str,
    option: &'static str,
) -> Result<&'a str, DecisionError> {
    let value = required(options, field_type, option)?;
    value
        .as_str()
        .ok_or_else(|| invalid(field_type, option, value))
}

fn integer_option(
    options: &Map<String, Value>,
    field_type: &'static str,
    option: &'static str,
) -> Result<u64, DecisionError> {
    let value = required(options, field_type, option)?;
    value
        .as_u64()
        .ok_or_else(|| invalid(field_type, option, value))
}
