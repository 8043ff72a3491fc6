#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tabular_cast::{book::RawValue, geo::GeoArea, geo::GeoCatalog};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Writes the Nepal catalog used across the integration tests.
    pub fn write_catalog(&self) -> PathBuf {
        self.write("areas.yml", CATALOG_YAML)
    }
}

pub const CATALOG_YAML: &str = "\
- id: 1
  title: Nepal
  code: NP
  admin_level: 0
  region: 1
- id: 2
  title: Bagmati
  code: NP-BA
  admin_level: 1
  region: 1
- id: 3
  title: Kathmandu
  code: NP-KTM
  admin_level: 2
  region: 1
- id: 4
  title: Lalitpur
  code: NP-LTP
  admin_level: 2
  region: 1
- id: 5
  title: Bhaktapur
  code: NP-BKT
  admin_level: 2
  region: 1
";

pub fn catalog() -> GeoCatalog {
    let areas: Vec<GeoArea> = serde_yaml::from_str(CATALOG_YAML).expect("catalog yaml");
    GeoCatalog::from_areas(areas)
}

pub fn raw(values: &[&str]) -> Vec<RawValue> {
    values.iter().map(|value| RawValue::from(*value)).collect()
}
