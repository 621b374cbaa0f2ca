//! Static region tables: provinces, districts and UI region groups
//!
//! Loaded from a versioned JSON resource. The copy under `data/` is embedded
//! at compile time; `REGIONS_PATH` points at a replacement without a rebuild.

use crate::error::CatalogError;
use crate::ingestion::types::RegionCode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

const EMBEDDED_REGIONS: &str = include_str!("../data/regions.json");

/// First-level administrative division
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub code: String,
    /// Full legal name, e.g. `서울특별시`
    pub name: String,
    /// Short form, e.g. `서울`
    pub short: String,
    /// City-level top unit (special/metropolitan city)
    #[serde(default)]
    pub metro: bool,
}

/// UI-level aggregation of regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionGroup {
    pub key: String,
    pub transaction_codes: Vec<RegionCode>,
    pub subscription_areas: Vec<RegionCode>,
    /// Address prefixes used to filter subscription listings
    pub keywords: Vec<String>,
    /// Region parameter for the statistics endpoint
    pub population_region: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: String,
    default_group: String,
    provinces: Vec<Province>,
    districts: HashMap<String, String>,
    groups: Vec<RegionGroup>,
}

#[derive(Debug, Clone)]
pub struct RegionCatalog {
    version: String,
    default_index: usize,
    provinces: HashMap<String, Province>,
    districts: HashMap<String, String>,
    groups: Vec<RegionGroup>,
}

impl RegionCatalog {
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_REGIONS)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        info!("Loaded region catalog {} from {:?}", catalog.version, path);
        Ok(catalog)
    }

    /// Load from `path` when given, otherwise the embedded copy
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;

        let mut seen = HashSet::new();
        for group in &file.groups {
            if !seen.insert(group.key.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate region group {}",
                    group.key
                )));
            }
            if group.transaction_codes.is_empty() || group.keywords.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "region group {} has no codes or keywords",
                    group.key
                )));
            }
        }
        let default_index = file
            .groups
            .iter()
            .position(|g| g.key == file.default_group)
            .ok_or_else(|| {
                CatalogError::Invalid(format!(
                    "default group {} is not defined",
                    file.default_group
                ))
            })?;

        let provinces = file
            .provinces
            .into_iter()
            .map(|p| (p.code.clone(), p))
            .collect();

        Ok(RegionCatalog {
            version: file.version,
            default_index,
            provinces,
            districts: file.districts,
            groups: file.groups,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn group_keys(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.key.as_str()).collect()
    }

    pub fn group(&self, key: &str) -> Option<&RegionGroup> {
        self.groups.iter().find(|g| g.key == key.trim())
    }

    pub fn default_group(&self) -> &RegionGroup {
        &self.groups[self.default_index]
    }

    pub fn province(&self, province_code: &str) -> Option<&Province> {
        self.provinces.get(province_code)
    }

    pub fn provinces(&self) -> impl Iterator<Item = &Province> {
        self.provinces.values()
    }

    /// Province whose full or short name equals `name`
    pub fn province_by_name(&self, name: &str) -> Option<&Province> {
        let name = name.trim();
        self.provinces
            .values()
            .find(|p| p.name == name || p.short == name)
    }

    pub fn district(&self, code: &RegionCode) -> Option<&str> {
        self.districts.get(code.as_str()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = RegionCatalog::embedded().unwrap();
        assert_eq!(catalog.default_group().key, "서울/수도권");
        assert!(catalog.group_keys().contains(&"대구/경북"));
        assert_eq!(catalog.district(&RegionCode::new("11680")), Some("강남구"));
    }

    #[test]
    fn test_embedded_catalog_covers_first_level_divisions() {
        let catalog = RegionCatalog::embedded().unwrap();
        for code in [
            "11", "26", "27", "28", "29", "30", "31", "36", "41", "43", "44", "46", "47", "48",
            "50", "51", "52",
        ] {
            assert!(catalog.province(code).is_some(), "missing province {code}");
        }
        assert!(catalog.province("11").unwrap().metro);
        assert!(!catalog.province("41").unwrap().metro);
    }

    #[test]
    fn test_every_group_district_code_has_a_province() {
        let catalog = RegionCatalog::embedded().unwrap();
        for key in catalog.group_keys() {
            for code in &catalog.group(key).unwrap().transaction_codes {
                assert!(
                    catalog.province(code.province_code()).is_some(),
                    "{code} in {key}"
                );
            }
        }
    }

    #[test]
    fn test_province_by_name_accepts_short_form() {
        let catalog = RegionCatalog::embedded().unwrap();
        assert_eq!(catalog.province_by_name("경상북도").unwrap().code, "47");
        assert_eq!(catalog.province_by_name("경북").unwrap().code, "47");
        assert!(catalog.province_by_name("화성").is_none());
    }

    #[test]
    fn test_missing_default_group_is_rejected() {
        let json = r#"{
            "version": "t", "default_group": "없음", "provinces": [], "districts": {},
            "groups": [{ "key": "a", "transaction_codes": ["11110"], "subscription_areas": [],
                         "keywords": ["서울"], "population_region": "11" }]
        }"#;
        assert!(matches!(
            RegionCatalog::from_json(json),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EMBEDDED_REGIONS.as_bytes()).unwrap();

        let catalog = RegionCatalog::load_or_embedded(Some(file.path())).unwrap();
        assert_eq!(catalog.version(), RegionCatalog::embedded().unwrap().version());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = RegionCatalog::load(Path::new("/nonexistent/regions.json"));
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
