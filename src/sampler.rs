//! Statistical type detection over a random sample of a column.
//!
//! Every sampled value is classified in priority order (number, date, geo,
//! string) and the column type is the plurality vote. Sub-options are voted
//! the same way over the samples that agreed with the winning type. All votes
//! break ties in favour of the candidate seen first, and sampled values are
//! visited in row order, so a fully sampled column always yields the same
//! decision.

use log::debug;
use rand::{SeedableRng, rngs::StdRng, seq::index};

use crate::{
    book::RawValue,
    config::ProcessingConfig,
    date::{DateFormat, auto_detect_datetime},
    decision::{DateOptions, FieldType, GeoOptions, NumberOptions, TypeDecision},
    error::ConfigError,
    geo::{GeoCatalog, GeoType, parse_geo},
    number::{Separator, parse_number},
};

/// Classification of one sampled value.
#[derive(Debug, Clone, PartialEq)]
enum Observation {
    Number(Separator),
    Datetime(Vec<DateFormat>),
    Geo {
        geo_type: GeoType,
        admin_level: u32,
        region: u64,
    },
    String,
}

impl Observation {
    fn field_type(&self) -> FieldType {
        match self {
            Observation::Number(_) => FieldType::Number,
            Observation::Datetime(_) => FieldType::Datetime,
            Observation::Geo { .. } => FieldType::Geo,
            Observation::String => FieldType::String,
        }
    }
}

fn classify(value: &str, catalog: &GeoCatalog) -> Observation {
    if let Some((_, separator)) = parse_number(value, None) {
        return Observation::Number(separator);
    }
    let formats = auto_detect_datetime(value);
    if !formats.is_empty() {
        return Observation::Datetime(formats.into_iter().map(|(_, format)| format).collect());
    }
    if let Some(found) = parse_geo(value, catalog, None) {
        return Observation::Geo {
            geo_type: found.geo_type,
            admin_level: found.area.admin_level,
            region: found.area.region,
        };
    }
    Observation::String
}

/// Most frequent item with its count. On equal counts the item seen first
/// wins. Returns `None` for an empty input.
pub fn plurality<T, I>(items: I) -> Option<(T, usize)>
where
    T: PartialEq,
    I: IntoIterator<Item = T>,
{
    let mut tallies: Vec<(T, usize)> = Vec::new();
    for item in items {
        if let Some((_, count)) = tallies.iter_mut().find(|(existing, _)| *existing == item) {
            *count += 1;
        } else {
            tallies.push((item, 1));
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (item, count) in tallies {
        if best.as_ref().is_none_or(|(_, top)| count > *top) {
            best = Some((item, count));
        }
    }
    best
}

/// Sample-size policy plus the detection pass.
#[derive(Debug, Clone, Copy)]
pub struct TypeSampler {
    z: f64,
    proportion: f64,
    margin: f64,
}

impl TypeSampler {
    pub fn new(config: &ProcessingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            z: config.z_score()?,
            proportion: config.expected_proportion,
            margin: config.margin_of_error,
        })
    }

    /// Cochran's sample size with finite population correction, rounded
    /// and clamped to `1..=population`.
    pub fn sample_size(&self, population: usize) -> usize {
        if population == 0 {
            return 0;
        }
        let infinite =
            self.z * self.z * self.proportion * (1.0 - self.proportion) / (self.margin * self.margin);
        let corrected = infinite / (1.0 + (infinite - 1.0) / population as f64);
        (corrected.round() as usize).clamp(1, population)
    }

    /// Decides the type of a column. Empty values never vote; a column with
    /// no non-empty value is a string column.
    pub fn detect(
        &self,
        values: &[RawValue],
        catalog: &GeoCatalog,
        seed: Option<u64>,
    ) -> TypeDecision {
        let population: Vec<&str> = values.iter().filter_map(RawValue::as_non_empty).collect();
        if population.is_empty() {
            return TypeDecision::String;
        }

        let size = self.sample_size(population.len());
        let picked = pick_indices(population.len(), size, seed);
        let observations: Vec<Observation> = picked
            .into_iter()
            .map(|idx| classify(population[idx], catalog))
            .collect();

        let decision = decide(&observations);
        debug!(
            "Sampled {} of {} non-empty value(s); decided {}",
            observations.len(),
            population.len(),
            decision
        );
        decision
    }
}

/// Distinct indices below `population`, in ascending order.
fn pick_indices(population: usize, size: usize, seed: Option<u64>) -> Vec<usize> {
    if size >= population {
        return (0..population).collect();
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut picked = index::sample(&mut rng, population, size).into_vec();
    picked.sort_unstable();
    picked
}

fn decide(observations: &[Observation]) -> TypeDecision {
    let Some((field_type, _)) = plurality(observations.iter().map(Observation::field_type))
    else {
        return TypeDecision::String;
    };

    match field_type {
        FieldType::String => TypeDecision::String,
        FieldType::Number => {
            let separators = observations.iter().filter_map(|observation| match observation {
                Observation::Number(separator) => Some(*separator),
                _ => None,
            });
            plurality(separators)
                .map(|(separator, _)| TypeDecision::Number(NumberOptions { separator }))
                .unwrap_or_default()
        }
        FieldType::Datetime => {
            // Ambiguous samples vote for every format they matched.
            let formats = observations
                .iter()
                .filter_map(|observation| match observation {
                    Observation::Datetime(formats) => Some(formats.iter().copied()),
                    _ => None,
                })
                .flatten();
            plurality(formats)
                .map(|(date_format, _)| TypeDecision::Datetime(DateOptions { date_format }))
                .unwrap_or_default()
        }
        FieldType::Geo => {
            let geos: Vec<(GeoType, u32, u64)> = observations
                .iter()
                .filter_map(|observation| match observation {
                    Observation::Geo {
                        geo_type,
                        admin_level,
                        region,
                    } => Some((*geo_type, *admin_level, *region)),
                    _ => None,
                })
                .collect();
            let geo_type = plurality(geos.iter().map(|geo| geo.0));
            let admin_level = plurality(geos.iter().map(|geo| geo.1));
            let region = plurality(geos.iter().map(|geo| geo.2));
            match (geo_type, admin_level, region) {
                (Some((geo_type, _)), Some((admin_level, _)), Some((region, _))) => {
                    TypeDecision::Geo(GeoOptions {
                        geo_type,
                        admin_level,
                        region,
                    })
                }
                _ => TypeDecision::String,
            }
        }
    }
}

/// Detects a column's type with the default sampling configuration and an
/// entropy-seeded sample.
pub fn sample_and_detect_type_and_options(
    values: &[RawValue],
    catalog: &GeoCatalog,
) -> TypeDecision {
    match TypeSampler::new(&ProcessingConfig::default()) {
        Ok(sampler) => sampler.detect(values, catalog, None),
        Err(_) => TypeDecision::String,
    }
}
