//! Feed orchestration - fetch, parse, normalize and rank per data kind,
//! degrading to static fallback data on any failure
//!
//! Every public feed method returns a `Feed`; nothing here returns an error
//! to the caller.

use crate::config::{Config, PipelineSettings};
use crate::error::{FetchError, ParseError};
use crate::ingestion::address::to_listing;
use crate::ingestion::fallback::FallbackCatalog;
use crate::ingestion::fetch::UpstreamClient;
use crate::ingestion::parse::{parse_population_json, parse_subscriptions_json, parse_transactions_xml};
use crate::ingestion::rank::{
    expand_keywords, order_subscriptions, rank_subscriptions, rank_transactions, DisplayMode,
    SubscriptionView, TransactionSort,
};
use crate::ingestion::types::{
    CompetitionRatio, FallbackReason, Feed, PopulationRecord, RawData, RegionCode,
    SubscriptionRecord, TransactionListing, TransactionRecord,
};
use crate::regions::RegionCatalog;
use anyhow::Context;
use chrono::{Datelike, Local, NaiveDate};
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// What to do when some regions of a fan-out fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Keep the regions that succeeded and report the rest
    #[default]
    Isolated,
    /// Any failed region discards the whole batch
    AllOrNothing,
}

impl FromStr for BatchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolated" => Ok(BatchPolicy::Isolated),
            "all_or_nothing" | "all-or-nothing" => Ok(BatchPolicy::AllOrNothing),
            other => Err(anyhow::anyhow!("unknown batch policy: {}", other)),
        }
    }
}

fn fetch_reason(_: &FetchError) -> FallbackReason {
    FallbackReason::Transport
}

/// Parse every region's body and merge the records under `policy`.
/// `Ok` carries the merged records and the regions that failed.
pub fn collect_batch<T, F>(
    codes: &[RegionCode],
    bodies: Vec<Result<RawData, FetchError>>,
    policy: BatchPolicy,
    parse: F,
) -> Result<(Vec<T>, Vec<RegionCode>), FallbackReason>
where
    F: Fn(&RawData, &RegionCode) -> Result<Vec<T>, ParseError>,
{
    let mut records = Vec::new();
    let mut failed = Vec::new();
    let mut last_reason = FallbackReason::Transport;

    for (code, body) in codes.iter().zip(bodies) {
        let parsed = match body {
            Ok(raw) => parse(&raw, code).map_err(|e| {
                warn!("Region {} response unusable: {}", code, e);
                e.fallback_reason()
            }),
            Err(e) => Err(fetch_reason(&e)),
        };

        match parsed {
            Ok(mut batch) => records.append(&mut batch),
            Err(reason) => {
                if policy == BatchPolicy::AllOrNothing {
                    return Err(reason);
                }
                last_reason = reason;
                failed.push(code.clone());
            }
        }
    }

    if !codes.is_empty() && failed.len() == codes.len() {
        return Err(last_reason);
    }
    Ok((records, failed))
}

/// Deal month requested when none is configured: the previous calendar month
pub fn default_deal_ymd(today: NaiveDate) -> String {
    let (year, month) = match today.month() {
        1 => (today.year() - 1, 12),
        m => (today.year(), m - 1),
    };
    format!("{:04}{:02}", year, month)
}

fn simulate_ratios(records: &mut [SubscriptionRecord]) {
    let mut rng = rand::thread_rng();
    for record in records.iter_mut() {
        if record.competition == CompetitionRatio::Unavailable {
            let value: f64 = rng.gen_range(1.0..80.0);
            record.competition = CompetitionRatio::Simulated((value * 10.0).round() / 10.0);
        }
    }
}

/// Entry point for the UI layer: one method per data kind
#[derive(Debug, Clone)]
pub struct FeedService {
    catalog: Arc<RegionCatalog>,
    fallback: Arc<FallbackCatalog>,
    upstream: UpstreamClient,
    settings: PipelineSettings,
}

impl FeedService {
    pub fn new(
        catalog: Arc<RegionCatalog>,
        fallback: Arc<FallbackCatalog>,
        upstream: UpstreamClient,
        settings: PipelineSettings,
    ) -> Self {
        FeedService {
            catalog,
            fallback,
            upstream,
            settings,
        }
    }

    /// Load both catalogs (file overrides or embedded) and build the client
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let catalog = RegionCatalog::load_or_embedded(config.regions_path.as_deref())
            .context("Failed to load region catalog")?;
        let fallback = FallbackCatalog::load_or_embedded(config.fallback_path.as_deref())
            .context("Failed to load fallback catalog")?;
        let upstream = UpstreamClient::new(config.upstream.clone())
            .context("Failed to build HTTP client")?;

        for key in catalog.group_keys() {
            if !fallback.has_group(key) {
                warn!("Region group {} has no fallback entry; the default group is used", key);
            }
        }

        info!(
            "Catalogs loaded: regions {}, fallback {}",
            catalog.version(),
            fallback.version()
        );
        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(fallback),
            upstream,
            config.pipeline.clone(),
        ))
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn fallback_catalog(&self) -> &FallbackCatalog {
        &self.fallback
    }

    fn listings(&self, records: &[TransactionRecord]) -> Vec<TransactionListing> {
        records.iter().map(|r| to_listing(&self.catalog, r)).collect()
    }

    fn transaction_fallback(
        &self,
        group: &str,
        sort: TransactionSort,
        mode: DisplayMode,
        reason: FallbackReason,
    ) -> Feed<TransactionListing> {
        warn!("Transactions for {} falling back to static data: {}", group, reason);
        let ranked = rank_transactions(self.fallback.transactions_for(group).to_vec(), sort, mode);
        Feed::fallback(self.listings(&ranked), reason)
    }

    /// Recent apartment trades across a region group
    pub async fn transactions(
        &self,
        group_key: &str,
        mode: DisplayMode,
        sort: Option<TransactionSort>,
    ) -> Feed<TransactionListing> {
        let sort = sort.unwrap_or(mode.default_sort());
        let Some(group) = self.catalog.group(group_key) else {
            return self.transaction_fallback(group_key, sort, mode, FallbackReason::UnknownGroup);
        };

        let deal_ymd = self
            .settings
            .deal_ymd
            .clone()
            .unwrap_or_else(|| default_deal_ymd(Local::now().date_naive()));

        let codes = &group.transaction_codes;
        let bodies = self.upstream.fetch_transactions(codes, &deal_ymd).await;

        match collect_batch(codes, bodies, self.settings.batch_policy, parse_transactions_xml) {
            Ok((records, failed)) if !records.is_empty() => {
                info!(
                    "Transactions for {}: {} records ({} regions failed)",
                    group.key,
                    records.len(),
                    failed.len()
                );
                let ranked = rank_transactions(records, sort, mode);
                Feed::live(self.listings(&ranked), failed)
            }
            Ok(_) => self.transaction_fallback(&group.key, sort, mode, FallbackReason::Empty),
            Err(reason) => self.transaction_fallback(&group.key, sort, mode, reason),
        }
    }

    fn subscription_fallback(
        &self,
        group: &str,
        view: SubscriptionView,
        mode: DisplayMode,
        reason: FallbackReason,
    ) -> Feed<SubscriptionRecord> {
        warn!("Subscriptions for {} falling back to static data: {}", group, reason);
        // Static lists are already group-specific; only order and truncate
        let mut records = self.fallback.subscriptions_for(group).to_vec();
        order_subscriptions(&mut records, view);
        records.truncate(mode.limit());
        Feed::fallback(records, reason)
    }

    pub async fn subscriptions(
        &self,
        group_key: &str,
        view: SubscriptionView,
        mode: DisplayMode,
    ) -> Feed<SubscriptionRecord> {
        self.subscriptions_on(group_key, view, mode, Local::now().date_naive())
            .await
    }

    /// Subscription listings as of `today` (calendar staleness cut-off)
    pub async fn subscriptions_on(
        &self,
        group_key: &str,
        view: SubscriptionView,
        mode: DisplayMode,
        today: NaiveDate,
    ) -> Feed<SubscriptionRecord> {
        let Some(group) = self.catalog.group(group_key) else {
            return self.subscription_fallback(group_key, view, mode, FallbackReason::UnknownGroup);
        };

        let codes = &group.subscription_areas;
        let bodies = self.upstream.fetch_subscriptions(codes).await;
        let parse = |raw: &RawData, _: &RegionCode| parse_subscriptions_json(raw);

        match collect_batch(codes, bodies, self.settings.batch_policy, parse) {
            Ok((mut records, failed)) => {
                if self.settings.simulate_competition {
                    simulate_ratios(&mut records);
                }
                let variants = expand_keywords(&self.catalog, &group.keywords);
                let ranked = rank_subscriptions(records, &variants, view, mode, today);
                if ranked.is_empty() {
                    return self.subscription_fallback(&group.key, view, mode, FallbackReason::Empty);
                }
                info!("Subscriptions for {}: {} listings", group.key, ranked.len());
                Feed::live(ranked, failed)
            }
            Err(reason) => self.subscription_fallback(&group.key, view, mode, reason),
        }
    }

    fn population_fallback(
        &self,
        group: &str,
        mode: DisplayMode,
        reason: FallbackReason,
    ) -> Feed<PopulationRecord> {
        warn!("Population for {} falling back to static data: {}", group, reason);
        let mut records = self.fallback.population_for(group).to_vec();
        records.truncate(mode.limit());
        Feed::fallback(records, reason)
    }

    /// Net migration by district; upstream order is kept
    pub async fn population(&self, group_key: &str, mode: DisplayMode) -> Feed<PopulationRecord> {
        let Some(group) = self.catalog.group(group_key) else {
            return self.population_fallback(group_key, mode, FallbackReason::UnknownGroup);
        };

        let parsed = match self.upstream.fetch_population(&group.population_region).await {
            Ok(raw) => parse_population_json(&raw).map_err(|e| {
                warn!("Population response for {} unusable: {}", group.key, e);
                e.fallback_reason()
            }),
            Err(e) => Err(fetch_reason(&e)),
        };

        match parsed {
            Ok(mut records) if !records.is_empty() => {
                records.truncate(mode.limit());
                Feed::live(records, Vec::new())
            }
            Ok(_) => self.population_fallback(&group.key, mode, FallbackReason::Empty),
            Err(reason) => self.population_fallback(&group.key, mode, reason),
        }
    }
}
