//! Geographic-area catalog and exact name/code matching.
//!
//! The catalog is built once per project from a flat list of areas and is
//! read-only afterwards, so it can be shared across threads behind an `Arc`
//! without locking.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    fs,
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// One geographic area of a project's regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoArea {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub code: String,
    pub admin_level: u32,
    #[serde(default)]
    pub admin_level_id: u64,
    pub region: u64,
    #[serde(default)]
    pub region_title: String,
}

/// Which key of an area a cell matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoType {
    Name,
    Code,
}

impl GeoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoType::Name => "name",
            GeoType::Code => "code",
        }
    }
}

impl fmt::Display for GeoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(GeoType::Name),
            "code" => Ok(GeoType::Code),
            other => Err(format!("unknown geo type '{other}'")),
        }
    }
}

/// A successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoMatch<'a> {
    pub area: &'a GeoArea,
    pub geo_type: GeoType,
}

#[derive(Debug, Clone, Default)]
pub struct GeoCatalog {
    areas: Vec<GeoArea>,
    names: BTreeMap<u32, HashMap<String, usize>>,
    codes: BTreeMap<u32, HashMap<String, usize>>,
}

impl GeoCatalog {
    /// Indexes `areas` by lower-cased title and code per admin level. A later
    /// area with the same key on the same level replaces the earlier one;
    /// blank codes are not indexed.
    pub fn from_areas<I>(areas: I) -> Self
    where
        I: IntoIterator<Item = GeoArea>,
    {
        let areas: Vec<GeoArea> = areas.into_iter().collect();
        let mut names: BTreeMap<u32, HashMap<String, usize>> = BTreeMap::new();
        let mut codes: BTreeMap<u32, HashMap<String, usize>> = BTreeMap::new();
        for (idx, area) in areas.iter().enumerate() {
            names
                .entry(area.admin_level)
                .or_default()
                .insert(area.title.trim().to_lowercase(), idx);
            let code = area.code.trim();
            if !code.is_empty() {
                codes
                    .entry(area.admin_level)
                    .or_default()
                    .insert(code.to_lowercase(), idx);
            }
        }
        Self {
            areas,
            names,
            codes,
        }
    }

    /// Reads a YAML (or JSON) list of areas.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening geo catalog {path:?}"))?;
        let areas: Vec<GeoArea> = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing geo catalog {path:?}"))?;
        let catalog = Self::from_areas(areas);
        debug!(
            "Loaded {} geo area(s) across {} admin level(s) from {:?}",
            catalog.len(),
            catalog.names.len(),
            path
        );
        Ok(catalog)
    }

    pub fn areas(&self) -> &[GeoArea] {
        &self.areas
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn admin_levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.names.keys().copied()
    }

    fn lookup(
        &self,
        table: &BTreeMap<u32, HashMap<String, usize>>,
        key: &str,
        admin_level: Option<u32>,
    ) -> Option<&GeoArea> {
        table
            .iter()
            .filter(|(level, _)| admin_level.is_none_or(|pinned| pinned == **level))
            .find_map(|(_, entries)| entries.get(key))
            .map(|idx| &self.areas[*idx])
    }
}

/// Resolves `raw` to an area by name first, then by code, scanning admin
/// levels in ascending order. `admin_level` pins the lookup to one level.
pub fn parse_geo<'a>(
    raw: &str,
    catalog: &'a GeoCatalog,
    admin_level: Option<u32>,
) -> Option<GeoMatch<'a>> {
    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    if let Some(area) = catalog.lookup(&catalog.names, &key, admin_level) {
        return Some(GeoMatch {
            area,
            geo_type: GeoType::Name,
        });
    }
    catalog
        .lookup(&catalog.codes, &key, admin_level)
        .map(|area| GeoMatch {
            area,
            geo_type: GeoType::Code,
        })
}
