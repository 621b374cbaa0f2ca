//! Configuration loaded from environment variables

use crate::ingestion::pipeline::BatchPolicy;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TRANSACTIONS_URL: &str =
    "https://apis.data.go.kr/1613000/RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade";
pub const DEFAULT_SUBSCRIPTIONS_URL: &str =
    "https://api.odcloud.kr/api/ApplyhomeInfoDetailSvc/v1/getAPTLttotPblancDetail";
pub const DEFAULT_POPULATION_URL: &str =
    "https://kosis.kr/openapi/Param/statisticsParameterData.do";
/// Statistics Korea, monthly migration by district, net migration item
pub const DEFAULT_POPULATION_ORG_ID: &str = "101";
pub const DEFAULT_POPULATION_TABLE_ID: &str = "DT_1B26001_A01";
pub const DEFAULT_POPULATION_ITEM_ID: &str = "T25";

/// Upstream endpoints and credentials
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub service_key: String,
    pub population_key: String,
    pub transactions_url: String,
    pub subscriptions_url: String,
    pub population_url: String,
    /// Statistics table selectors (`orgId`, `tblId`, `itmId`)
    pub population_org_id: String,
    pub population_table_id: String,
    pub population_item_id: String,
    /// `None` keeps the HTTP client's default
    pub timeout: Option<Duration>,
    pub rows_per_page: u32,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        UpstreamSettings {
            service_key: String::new(),
            population_key: String::new(),
            transactions_url: DEFAULT_TRANSACTIONS_URL.to_string(),
            subscriptions_url: DEFAULT_SUBSCRIPTIONS_URL.to_string(),
            population_url: DEFAULT_POPULATION_URL.to_string(),
            population_org_id: DEFAULT_POPULATION_ORG_ID.to_string(),
            population_table_id: DEFAULT_POPULATION_TABLE_ID.to_string(),
            population_item_id: DEFAULT_POPULATION_ITEM_ID.to_string(),
            timeout: None,
            rows_per_page: 100,
        }
    }
}

/// Pipeline behavior switches
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub batch_policy: BatchPolicy,
    /// Fill missing competition ratios with tagged simulated values
    pub simulate_competition: bool,
    /// Fixed `YYYYMM` deal month; `None` = previous calendar month
    pub deal_ymd: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub upstream: UpstreamSettings,
    pub pipeline: PipelineSettings,
    pub regions_path: Option<PathBuf>,
    pub fallback_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = UpstreamSettings::default();

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3001".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        let timeout_secs: u64 = match var("HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            None => 0,
        };

        let rows_per_page = match var("ROWS_PER_PAGE") {
            Some(v) => v.parse().context("ROWS_PER_PAGE must be a valid number")?,
            None => defaults.rows_per_page,
        };

        let batch_policy = match var("BATCH_POLICY") {
            Some(v) => v.parse()?,
            None => BatchPolicy::default(),
        };

        let simulate_competition = match var("SIMULATE_COMPETITION") {
            Some(v) => parse_flag(&v).context("SIMULATE_COMPETITION must be true or false")?,
            None => false,
        };

        let deal_ymd = var("DEAL_YMD").filter(|v| !v.trim().is_empty());
        if let Some(ymd) = &deal_ymd {
            if ymd.len() != 6 || !ymd.bytes().all(|b| b.is_ascii_digit()) {
                anyhow::bail!("DEAL_YMD must be YYYYMM, got {}", ymd);
            }
        }

        let service_key = var("SERVICE_KEY").unwrap_or_default();

        Ok(Config {
            bind_addr,
            upstream: UpstreamSettings {
                population_key: var("POPULATION_STATS_KEY").unwrap_or_else(|| service_key.clone()),
                service_key,
                transactions_url: var("TRANSACTIONS_URL").unwrap_or(defaults.transactions_url),
                subscriptions_url: var("SUBSCRIPTIONS_URL").unwrap_or(defaults.subscriptions_url),
                population_url: var("POPULATION_URL").unwrap_or(defaults.population_url),
                population_org_id: var("POPULATION_ORG_ID").unwrap_or(defaults.population_org_id),
                population_table_id: var("POPULATION_TABLE_ID")
                    .unwrap_or(defaults.population_table_id),
                population_item_id: var("POPULATION_ITEM_ID").unwrap_or(defaults.population_item_id),
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                rows_per_page,
            },
            pipeline: PipelineSettings {
                batch_policy,
                simulate_competition,
                deal_ymd,
            },
            regions_path: var("REGIONS_PATH").map(PathBuf::from),
            fallback_path: var("FALLBACK_PATH").map(PathBuf::from),
        })
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("not a boolean: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.upstream.transactions_url, DEFAULT_TRANSACTIONS_URL);
        assert_eq!(config.upstream.timeout, None);
        assert_eq!(config.upstream.population_table_id, DEFAULT_POPULATION_TABLE_ID);
        assert_eq!(config.pipeline.batch_policy, BatchPolicy::Isolated);
        assert!(!config.pipeline.simulate_competition);
        assert!(config.regions_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SERVICE_KEY", "abc"),
            ("HTTP_TIMEOUT_SECS", "15"),
            ("BATCH_POLICY", "all_or_nothing"),
            ("SIMULATE_COMPETITION", "yes"),
            ("DEAL_YMD", "202609"),
            ("FALLBACK_PATH", "/etc/realty/fallback.json"),
            ("POPULATION_ITEM_ID", "T20"),
        ])
        .unwrap();

        assert_eq!(config.upstream.service_key, "abc");
        assert_eq!(config.upstream.population_key, "abc");
        assert_eq!(config.upstream.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.pipeline.batch_policy, BatchPolicy::AllOrNothing);
        assert!(config.pipeline.simulate_competition);
        assert_eq!(config.pipeline.deal_ymd.as_deref(), Some("202609"));
        assert_eq!(config.upstream.population_item_id, "T20");
        assert_eq!(config.upstream.population_org_id, DEFAULT_POPULATION_ORG_ID);
        assert_eq!(
            config.fallback_path,
            Some(PathBuf::from("/etc/realty/fallback.json"))
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("DEAL_YMD", "2026-09")]).is_err());
        assert!(config_from(&[("BATCH_POLICY", "sometimes")]).is_err());
        assert!(config_from(&[("HTTP_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("SIMULATE_COMPETITION", "maybe")]).is_err());
    }
}
