//! In-memory model of an uploaded workbook: books hold sheets, sheets hold
//! fields (columns), fields hold raw cell values and the committed result of
//! their last successful processing run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    cast::{CastResult, HealthStats},
    decision::TypeDecision,
};

pub type BookId = u64;
pub type SheetId = u64;
pub type FieldId = u64;

/// A cell as extracted from the source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValue {
    pub value: Option<String>,
}

impl RawValue {
    pub fn empty() -> Self {
        Self { value: None }
    }

    /// The trimmed cell text, or `None` for a missing or blank cell.
    pub fn as_non_empty(&self) -> Option<&str> {
        self.value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.as_non_empty().is_none()
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self { value: Some(value) }
    }
}

impl From<Option<String>> for RawValue {
    fn from(value: Option<String>) -> Self {
        Self { value }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Success => "success",
            ProcessStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// State of a field's derived visualization data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCache {
    pub status: CacheStatus,
    pub image_status: CacheStatus,
    pub time: DateTime<Utc>,
}

impl FieldCache {
    pub fn pending(time: DateTime<Utc>) -> Self {
        Self {
            status: CacheStatus::Pending,
            image_status: CacheStatus::Pending,
            time,
        }
    }
}

/// Decision, cast values and health stats of one processing run; replaced
/// as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub decision: TypeDecision,
    pub values: Vec<CastResult>,
    pub health_stats: HealthStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub title: String,
    pub ordering: usize,
    pub data: Vec<RawValue>,
    #[serde(default)]
    pub status: ProcessStatus,
    #[serde(default)]
    pub result: Option<FieldResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cache: Option<FieldCache>,
}

impl Field {
    pub fn new(id: FieldId, title: impl Into<String>, ordering: usize, data: Vec<RawValue>) -> Self {
        Self {
            id,
            title: title.into(),
            ordering,
            data,
            status: ProcessStatus::Pending,
            result: None,
            error: None,
            cache: None,
        }
    }

    /// Rows from `data_row_index` on; header rows above it are left out.
    pub fn data_values(&self, data_row_index: usize) -> &[RawValue] {
        let start = data_row_index.min(self.data.len());
        &self.data[start..]
    }

    pub fn decision(&self) -> Option<&TypeDecision> {
        self.result.as_ref().map(|result| &result.decision)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub id: SheetId,
    pub title: String,
    /// Index of the first data row; rows above are headers.
    #[serde(default)]
    pub data_row_index: usize,
    pub fields: Vec<Field>,
}

impl Sheet {
    pub fn field(&self, title: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.title == title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Xlsx,
    Xls,
    Ods,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub file_type: FileType,
    #[serde(default)]
    pub status: ProcessStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub sheets: Vec<Sheet>,
}

impl Book {
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sheets.iter().flat_map(|sheet| sheet.fields.iter())
    }

    /// Finds a field by title along with its sheet.
    pub fn find_field(&self, title: &str) -> Option<(&Sheet, &Field)> {
        self.sheets
            .iter()
            .find_map(|sheet| sheet.field(title).map(|field| (sheet, field)))
    }
}
