//! Casting a whole column under one type decision.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    book::RawValue,
    date::parse_date,
    decision::TypeDecision,
    geo::{GeoCatalog, GeoMatch, GeoType, parse_geo},
    number::parse_number,
};

/// Area a geo cell resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoReference {
    pub id: u64,
    pub title: String,
    pub code: String,
    pub admin_level: u32,
    pub region: u64,
    pub geo_type: GeoType,
}

impl From<GeoMatch<'_>> for GeoReference {
    fn from(found: GeoMatch<'_>) -> Self {
        Self {
            id: found.area.id,
            title: found.area.title.clone(),
            code: found.area.code.clone(),
            admin_level: found.area.admin_level,
            region: found.area.region,
            geo_type: found.geo_type,
        }
    }
}

/// Normalized representation of a successfully cast cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CastValue {
    String(String),
    Number(f64),
    Datetime(NaiveDate),
    Geo(GeoReference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastResult {
    pub success: bool,
    pub value: Option<CastValue>,
    pub original: Option<String>,
}

impl CastResult {
    fn empty(original: Option<String>) -> Self {
        Self {
            success: true,
            value: None,
            original,
        }
    }

    fn invalid(original: Option<String>) -> Self {
        Self {
            success: false,
            value: None,
            original,
        }
    }

    fn cast(original: Option<String>, value: CastValue) -> Self {
        Self {
            success: true,
            value: Some(value),
            original,
        }
    }

    pub fn is_null(&self) -> bool {
        self.success && self.value.is_none()
    }
}

/// Column quality counts, always recomputed from a full result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStats {
    pub total: usize,
    pub invalid: usize,
    pub null: usize,
}

impl HealthStats {
    pub fn from_results(results: &[CastResult]) -> Self {
        results.iter().fold(
            HealthStats {
                total: results.len(),
                ..HealthStats::default()
            },
            |mut stats, result| {
                if !result.success {
                    stats.invalid += 1;
                } else if result.value.is_none() {
                    stats.null += 1;
                }
                stats
            },
        )
    }
}

/// Casts one cell. Empty cells are a successful null; a cell the decided
/// type cannot parse is an invalid result, never an error.
pub fn cast_value(raw: &RawValue, decision: &TypeDecision, catalog: &GeoCatalog) -> CastResult {
    let Some(value) = raw.as_non_empty() else {
        return CastResult::empty(raw.value.clone());
    };
    let cast = match decision {
        TypeDecision::String => Some(CastValue::String(
            raw.value.as_deref().unwrap_or(value).to_string(),
        )),
        TypeDecision::Number(options) => {
            parse_number(value, Some(options.separator)).map(|(number, _)| CastValue::Number(number))
        }
        TypeDecision::Datetime(options) => {
            parse_date(value, options.date_format).map(CastValue::Datetime)
        }
        TypeDecision::Geo(options) => parse_geo(value, catalog, Some(options.admin_level))
            .map(|found| CastValue::Geo(found.into())),
    };
    match cast {
        Some(cast) => CastResult::cast(raw.value.clone(), cast),
        None => CastResult::invalid(raw.value.clone()),
    }
}

/// Casts every value of a column, preserving row alignment.
pub fn cast_column(
    values: &[RawValue],
    decision: &TypeDecision,
    catalog: &GeoCatalog,
) -> (Vec<CastResult>, HealthStats) {
    let results: Vec<CastResult> = values
        .iter()
        .map(|raw| cast_value(raw, decision, catalog))
        .collect();
    let health = HealthStats::from_results(&results);
    (results, health)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        date::DateFormat,
        decision::{DateOptions, GeoOptions, NumberOptions},
        geo::GeoArea,
        number::Separator,
    };

    fn raw(values: &[&str]) -> Vec<RawValue> {
        values.iter().map(|value| RawValue::from(*value)).collect()
    }

    fn catalog() -> GeoCatalog {
        GeoCatalog::from_areas(vec![
            GeoArea {
                id: 3,
                title: "Kathmandu".to_string(),
                code: "NP-KTM".to_string(),
                admin_level: 2,
                admin_level_id: 12,
                region: 1,
                region_title: "Nepal".to_string(),
            },
            GeoArea {
                id: 2,
                title: "Bagmati".to_string(),
                code: "NP-BA".to_string(),
                admin_level: 1,
                admin_level_id: 11,
                region: 1,
                region_title: "Nepal".to_string(),
            },
        ])
    }

    #[test]
    fn numbers_cast_under_the_decided_separator() {
        let decision = TypeDecision::Number(NumberOptions {
            separator: Separator::Comma,
        });
        let (results, health) = cast_column(
            &raw(&["10,000", "20,000", "30,000"]),
            &decision,
            &GeoCatalog::default(),
        );
        let values: Vec<_> = results.iter().map(|r| r.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                Some(CastValue::Number(10000.0)),
                Some(CastValue::Number(20000.0)),
                Some(CastValue::Number(30000.0)),
            ]
        );
        assert_eq!(
            health,
            HealthStats {
                total: 3,
                invalid: 0,
                null: 0
            }
        );
    }

    #[test]
    fn values_outside_the_decided_grammar_are_invalid() {
        let decision = TypeDecision::Number(NumberOptions {
            separator: Separator::None,
        });
        let (results, health) =
            cast_column(&raw(&["12.5", "1,000", "", "abc"]), &decision, &GeoCatalog::default());
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].original.as_deref(), Some("1,000"));
        assert!(results[2].is_null());
        assert!(!results[3].success);
        assert_eq!(
            health,
            HealthStats {
                total: 4,
                invalid: 2,
                null: 1
            }
        );
    }

    #[test]
    fn dates_cast_with_the_fixed_format() {
        let decision = TypeDecision::Datetime(DateOptions {
            date_format: DateFormat::from_pattern("%d %b %Y").unwrap(),
        });
        let (results, health) = cast_column(
            &raw(&["12 Jan 2019", "15 Jan 2019", "not-a-date"]),
            &decision,
            &GeoCatalog::default(),
        );
        assert_eq!(
            results[0].value,
            Some(CastValue::Datetime(NaiveDate::from_ymd_opt(2019, 1, 12).unwrap()))
        );
        assert!(!results[2].success);
        assert_eq!(results[2].value, None);
        assert_eq!(health.invalid, 1);
        assert_eq!(health.total, 3);
    }

    #[test]
    fn geo_cast_is_pinned_to_the_decided_admin_level() {
        let decision = TypeDecision::Geo(GeoOptions {
            geo_type: GeoType::Name,
            admin_level: 2,
            region: 1,
        });
        let (results, health) = cast_column(
            &raw(&["Kathmandu", "Bagmati", "np-ktm"]),
            &decision,
            &catalog(),
        );
        match &results[0].value {
            Some(CastValue::Geo(reference)) => {
                assert_eq!(reference.id, 3);
                assert_eq!(reference.geo_type, GeoType::Name);
            }
            other => panic!("expected geo value, got {other:?}"),
        }
        assert!(!results[1].success);
        match &results[2].value {
            Some(CastValue::Geo(reference)) => assert_eq!(reference.geo_type, GeoType::Code),
            other => panic!("expected geo value, got {other:?}"),
        }
        assert_eq!(health.invalid, 1);
    }

    #[test]
    fn empty_catalog_degrades_geo_cells_to_invalid() {
        let decision = TypeDecision::Geo(GeoOptions {
            geo_type: GeoType::Name,
            admin_level: 2,
            region: 1,
        });
        let (results, health) =
            cast_column(&raw(&["Kathmandu", ""]), &decision, &GeoCatalog::default());
        assert!(!results[0].success);
        assert_eq!(
            health,
            HealthStats {
                total: 2,
                invalid: 1,
                null: 1
            }
        );
    }

    #[test]
    fn string_columns_keep_every_value() {
        let (results, health) = cast_column(
            &[RawValue::from("a"), RawValue::empty(), RawValue::from(" b ")],
            &TypeDecision::String,
            &GeoCatalog::default(),
        );
        assert_eq!(results[0].value, Some(CastValue::String("a".to_string())));
        assert_eq!(results[1].original, None);
        assert_eq!(results[2].value, Some(CastValue::String(" b ".to_string())));
        assert_eq!(results[2].original.as_deref(), Some(" b "));
        assert_eq!(health.null, 1);
    }

    #[test]
    fn empty_columns_have_zero_health_stats() {
        let (results, health) = cast_column(&[], &TypeDecision::String, &GeoCatalog::default());
        assert!(results.is_empty());
        assert_eq!(health, HealthStats::default());
    }

    #[test]
    fn cast_values_serialize_with_a_type_tag() {
        let encoded = serde_json::to_value(CastValue::Number(1.5)).unwrap();
        assert_eq!(encoded, serde_json::json!({"type": "number", "value": 1.5}));
    }
}
