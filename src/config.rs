//! Sampling configuration.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIDENCE_LEVEL: u32 = 95;
const DEFAULT_EXPECTED_PROPORTION: f64 = 0.8;
const DEFAULT_MARGIN_OF_ERROR: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Confidence level in percent used for the sample size.
    pub confidence_level: u32,
    /// Expected share of values agreeing on the column type.
    pub expected_proportion: f64,
    pub margin_of_error: f64,
    /// Fixed sampling seed; `None` draws from entropy on every pass.
    pub seed: Option<u64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            expected_proportion: DEFAULT_EXPECTED_PROPORTION,
            margin_of_error: DEFAULT_MARGIN_OF_ERROR,
            seed: None,
        }
    }
}

impl ProcessingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: ProcessingConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config file {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.z_score()?;
        if !(self.expected_proportion > 0.0 && self.expected_proportion < 1.0) {
            return Err(ConfigError::ProportionOutOfRange(self.expected_proportion));
        }
        if !(self.margin_of_error > 0.0 && self.margin_of_error < 1.0) {
            return Err(ConfigError::MarginOutOfRange(self.margin_of_error));
        }
        Ok(())
    }

    pub fn z_score(&self) -> Result<f64, ConfigError> {
        match self.confidence_level {
            80 => Ok(1.28),
            85 => Ok(1.44),
            90 => Ok(1.645),
            95 => Ok(1.96),
            99 => Ok(2.576),
            other => Err(ConfigError::UnsupportedConfidence(other)),
        }
    }

    /// Seed for one field, so that parallel fields stay independent of
    /// scheduling order.
    pub fn field_seed(&self, field_id: u64) -> Option<u64> {
        self.seed
            .map(|seed| seed ^ field_id.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}
