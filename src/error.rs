//! Typed errors for decision construction and processing configuration.
//!
//! Unparseable cell values are never errors; they are recorded as failed
//! [`CastResult`](crate::cast::CastResult)s. The variants here cover faults
//! that abort a whole column or reject a configuration up front.

use thiserror::Error;

/// A type decision could not be built from its loose representation.
#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("unknown field type '{0}' (expected string, number, datetime or geo)")]
    UnknownType(String),

    #[error("field type '{field_type}' requires option '{option}'")]
    MissingOption {
        field_type: &'static str,
        option: &'static str,
    },

    #[error("invalid value {value} for option '{option}' of field type '{field_type}'")]
    InvalidOption {
        field_type: &'static str,
        option: &'static str,
        value: String,
    },
}

/// Sampling parameters outside the supported range.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unsupported confidence level {0}% (supported: 80, 85, 90, 95, 99)")]
    UnsupportedConfidence(u32),

    #[error("expected proportion must be within (0, 1), got {0}")]
    ProportionOutOfRange(f64),

    #[error("margin of error must be within (0, 1), got {0}")]
    MarginOutOfRange(f64),
}
