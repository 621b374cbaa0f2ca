//! Ranking and filtering - merge, order and truncate parsed records per feed

use crate::ingestion::types::{SubscriptionRecord, TransactionRecord};
use crate::regions::RegionCatalog;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

/// How many records a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Dashboard card
    #[default]
    Compact,
    /// "View all" page
    All,
}

impl DisplayMode {
    pub fn limit(self) -> usize {
        match self {
            DisplayMode::Compact => 6,
            DisplayMode::All => 50,
        }
    }

    /// The dashboard card shows the biggest deals, the full page the latest
    pub fn default_sort(self) -> TransactionSort {
        match self {
            DisplayMode::Compact => TransactionSort::Price,
            DisplayMode::All => TransactionSort::Date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSort {
    Price,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionView {
    #[default]
    Competition,
    Calendar,
}

/// Sort descending by price or formatted date, then truncate
pub fn rank_transactions(
    mut records: Vec<TransactionRecord>,
    sort: TransactionSort,
    mode: DisplayMode,
) -> Vec<TransactionRecord> {
    match sort {
        TransactionSort::Price => records.sort_by_key(|r| Reverse(r.price_manwon)),
        // Zero-padded `YYYY.MM.DD` orders lexically; `-` sorts last
        TransactionSort::Date => records.sort_by_cached_key(|r| Reverse(r.formatted_date())),
    }
    records.truncate(mode.limit());
    records
}

/// A keyword plus every full/short province name it stands for
/// (`경북` -> `경북`, `경상북도`)
pub fn keyword_variants(catalog: &RegionCatalog, keyword: &str) -> Vec<String> {
    let keyword = keyword.trim();
    let mut variants = vec![keyword.to_string()];

    for province in catalog
        .provinces()
        .filter(|p| p.short == keyword || p.name == keyword)
    {
        for name in [&province.name, &province.short] {
            if !variants.contains(name) {
                variants.push(name.clone());
            }
        }
    }
    variants
}

/// Variants for all of a group's keywords
pub fn expand_keywords(catalog: &RegionCatalog, keywords: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        for variant in keyword_variants(catalog, keyword) {
            if !out.contains(&variant) {
                out.push(variant);
            }
        }
    }
    out
}

pub fn matches_region(address: &str, variants: &[String]) -> bool {
    let address = address.trim_start();
    variants
        .iter()
        .any(|v| !v.is_empty() && address.starts_with(v.as_str()))
}

fn by_ratio_desc(a: &SubscriptionRecord, b: &SubscriptionRecord) -> Ordering {
    match (a.competition.value(), b.competition.value()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order without filtering: ratio descending, or start date ascending with
/// undated listings last
pub fn order_subscriptions(records: &mut [SubscriptionRecord], view: SubscriptionView) {
    match view {
        SubscriptionView::Competition => records.sort_by(by_ratio_desc),
        SubscriptionView::Calendar => records.sort_by_cached_key(|r| {
            let start = r.subscription_start_date();
            (start.is_none(), start)
        }),
    }
}

/// Keyword filter, calendar staleness filter, ordering and truncation
pub fn rank_subscriptions(
    records: Vec<SubscriptionRecord>,
    variants: &[String],
    view: SubscriptionView,
    mode: DisplayMode,
    today: NaiveDate,
) -> Vec<SubscriptionRecord> {
    let mut records: Vec<SubscriptionRecord> = records
        .into_iter()
        .filter(|r| matches_region(&r.address, variants))
        .filter(|r| match view {
            SubscriptionView::Calendar => r
                .subscription_start_date()
                .map_or(true, |start| start >= today),
            SubscriptionView::Competition => true,
        })
        .collect();

    order_subscriptions(&mut records, view);
    records.truncate(mode.limit());
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::{CompetitionRatio, RegionCode};

    fn trade(name: &str, price: i64, year: &str, month: &str, day: &str) -> TransactionRecord {
        TransactionRecord {
            apartment: name.to_string(),
            price_manwon: price,
            deal_year: year.to_string(),
            deal_month: month.to_string(),
            deal_day: day.to_string(),
            exclusive_area: None,
            floor: "1".to_string(),
            build_year: "2000".to_string(),
            region_code: RegionCode::new("11680"),
            district_raw: String::new(),
            subdistrict: String::new(),
        }
    }

    fn listing(name: &str, address: &str, start: &str, ratio: CompetitionRatio) -> SubscriptionRecord {
        SubscriptionRecord {
            name: name.to_string(),
            address: address.to_string(),
            announcement_date: "-".to_string(),
            subscription_start: start.to_string(),
            winner_date: "-".to_string(),
            total_units: 100,
            phone: "-".to_string(),
            competition: ratio,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_rank_transactions_by_price_truncates_to_compact() {
        let records: Vec<_> = (1..=10)
            .map(|i| trade(&format!("apt{i}"), i * 1_000, "2026", "9", "1"))
            .collect();

        let ranked = rank_transactions(records, TransactionSort::Price, DisplayMode::Compact);
        assert_eq!(ranked.len(), 6);
        assert_eq!(ranked[0].apartment, "apt10");
        assert_eq!(ranked[5].apartment, "apt5");
    }

    #[test]
    fn test_rank_transactions_by_date_puts_undated_last() {
        let records = vec![
            trade("old", 1, "2026", "1", "9"),
            trade("undated", 1, "-", "-", "-"),
            trade("new", 1, "2026", "10", "2"),
            trade("mid", 1, "2026", "9", "30"),
        ];
        let ranked = rank_transactions(records, TransactionSort::Date, DisplayMode::All);
        let names: Vec<_> = ranked.iter().map(|r| r.apartment.as_str()).collect();
        assert_eq!(names, ["new", "mid", "old", "undated"]);
    }

    #[test]
    fn test_default_sort_per_mode() {
        assert_eq!(DisplayMode::Compact.default_sort(), TransactionSort::Price);
        assert_eq!(DisplayMode::All.default_sort(), TransactionSort::Date);
        assert_eq!(DisplayMode::All.limit(), 50);
    }

    #[test]
    fn test_keyword_abbreviation_matches_full_form() {
        let catalog = RegionCatalog::embedded().unwrap();
        let variants = keyword_variants(&catalog, "경북");
        assert!(variants.contains(&"경상북도".to_string()));

        assert!(matches_region("경상북도 포항시", &variants));
        assert!(matches_region("경북 포항시", &variants));
        assert!(!matches_region("경기도 용인시", &variants));
    }

    #[test]
    fn test_keyword_with_old_and_new_legal_names() {
        let catalog = RegionCatalog::embedded().unwrap();
        let variants = keyword_variants(&catalog, "강원");
        assert!(matches_region("강원도 춘천시", &variants));
        assert!(matches_region("강원특별자치도 원주시", &variants));

        let variants = keyword_variants(&catalog, "전북");
        assert!(matches_region("전라북도 전주시", &variants));
        assert!(matches_region("전북특별자치도 전주시", &variants));
        assert!(!matches_region("전라남도 목포시", &variants));
    }

    #[test]
    fn test_calendar_excludes_stale_and_keeps_undated() {
        let catalog = RegionCatalog::embedded().unwrap();
        let variants = expand_keywords(&catalog, &["서울".to_string()]);
        let records = vec![
            listing("past", "서울특별시 강남구", "2026.10.18", CompetitionRatio::Unavailable),
            listing("today", "서울특별시 서초구", "2026.10.19", CompetitionRatio::Unavailable),
            listing("tbd", "서울특별시 송파구", "TBD", CompetitionRatio::Unavailable),
            listing("later", "서울특별시 마포구", "2026-11-02", CompetitionRatio::Unavailable),
            listing("elsewhere", "부산광역시 해운대구", "2026.12.01", CompetitionRatio::Unavailable),
        ];

        let ranked = rank_subscriptions(
            records,
            &variants,
            SubscriptionView::Calendar,
            DisplayMode::All,
            today(),
        );
        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["today", "later", "tbd"]);
    }

    #[test]
    fn test_competition_orders_by_ratio_with_unavailable_last() {
        let variants = vec!["서울".to_string()];
        let records = vec![
            listing("none", "서울 A", "-", CompetitionRatio::Unavailable),
            listing("low", "서울 B", "-", CompetitionRatio::Reported(1.2)),
            listing("high", "서울 C", "-", CompetitionRatio::Simulated(48.0)),
        ];
        let ranked = rank_subscriptions(
            records,
            &variants,
            SubscriptionView::Competition,
            DisplayMode::Compact,
            today(),
        );
        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["high", "low", "none"]);
    }
}
