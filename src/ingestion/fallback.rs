//! Fallback supplier - static, pre-normalized records per region group
//!
//! The catalog is a versioned JSON resource validated at load time, so
//! lookups never fail and never touch the network.

use crate::error::CatalogError;
use crate::ingestion::types::{PopulationRecord, SubscriptionRecord, TransactionRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const EMBEDDED_FALLBACK: &str = include_str!("../../data/fallback.json");

/// Static lists for one region group; all three must be non-empty
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupFallback {
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
    #[serde(default)]
    pub population: Vec<PopulationRecord>,
}

#[derive(Debug, Deserialize)]
struct FallbackFile {
    version: String,
    default_group: String,
    groups: HashMap<String, GroupFallback>,
}

#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    version: String,
    default: GroupFallback,
    groups: HashMap<String, GroupFallback>,
}

impl FallbackCatalog {
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_FALLBACK)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        info!("Loaded fallback catalog {} from {:?}", catalog.version, path);
        Ok(catalog)
    }

    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: FallbackFile = serde_json::from_str(json)?;

        for (key, group) in &file.groups {
            if group.transactions.is_empty()
                || group.subscriptions.is_empty()
                || group.population.is_empty()
            {
                return Err(CatalogError::Invalid(format!(
                    "fallback group {} must have transactions, subscriptions and population",
                    key
                )));
            }
        }

        let default = file.groups.get(&file.default_group).cloned().ok_or_else(|| {
            CatalogError::Invalid(format!(
                "default fallback group {} is not defined",
                file.default_group
            ))
        })?;

        Ok(FallbackCatalog {
            version: file.version,
            default,
            groups: file.groups,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group.trim())
    }

    /// Lists for `group`; unknown keys get the default group
    fn pick<'a, T>(&'a self, group: &str, select: fn(&GroupFallback) -> &Vec<T>) -> &'a [T] {
        select(self.groups.get(group.trim()).unwrap_or(&self.default))
    }

    pub fn transactions_for(&self, group: &str) -> &[TransactionRecord] {
        self.pick(group, |g| &g.transactions)
    }

    pub fn subscriptions_for(&self, group: &str) -> &[SubscriptionRecord] {
        self.pick(group, |g| &g.subscriptions)
    }

    pub fn population_for(&self, group: &str) -> &[PopulationRecord] {
        self.pick(group, |g| &g.population)
    }
}
