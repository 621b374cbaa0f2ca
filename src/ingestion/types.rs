//! Core data types for the feed pipeline
//! Pure data structures; derived display values are computed, never stored

use crate::error::ParseError;
use crate::ingestion::utils::{format_price_manwon, parse_display_date, PLACEHOLDER};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw upstream body tagged with its declared shape
#[derive(Debug, Clone)]
pub enum RawData {
    Xml(String),
    Json(String),
}

impl RawData {
    fn shape(&self) -> &'static str {
        match self {
            RawData::Xml(_) => "xml",
            RawData::Json(_) => "json",
        }
    }

    pub fn as_xml(&self) -> Result<&str, ParseError> {
        match self {
            RawData::Xml(body) => Ok(body),
            _ => Err(ParseError::ShapeMismatch {
                expected: "xml",
                actual: self.shape(),
            }),
        }
    }

    pub fn as_json(&self) -> Result<&str, ParseError> {
        match self {
            RawData::Json(body) => Ok(body),
            _ => Err(ParseError::ShapeMismatch {
                expected: "json",
                actual: self.shape(),
            }),
        }
    }
}

/// Data-kind selector shared by fetch, parse and the dashboard panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Transactions,
    Subscriptions,
    Population,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Transactions => write!(f, "transactions"),
            DataKind::Subscriptions => write!(f, "subscriptions"),
            DataKind::Population => write!(f, "population"),
        }
    }
}

/// Administrative region code (5-digit legal district code, or a
/// subscription area code for the subscription feed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    pub fn new(code: impl Into<String>) -> Self {
        RegionCode(code.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First-level division prefix (first two digits)
    pub fn province_code(&self) -> &str {
        self.0.get(..2).unwrap_or(&self.0)
    }
}

impl From<&str> for RegionCode {
    fn from(value: &str) -> Self {
        RegionCode::new(value)
    }
}

impl std::fmt::Display for RegionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One apartment sale from the transaction provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub apartment: String,
    /// Price in 10,000-won steps, as reported
    pub price_manwon: i64,
    pub deal_year: String,
    pub deal_month: String,
    pub deal_day: String,
    #[serde(default)]
    pub exclusive_area: Option<Decimal>,
    pub floor: String,
    pub build_year: String,
    pub region_code: RegionCode,
    /// Sibling "district" field as received; may be empty
    #[serde(default)]
    pub district_raw: String,
    #[serde(default)]
    pub subdistrict: String,
}

impl TransactionRecord {
    pub fn formatted_price(&self) -> String {
        format_price_manwon(self.price_manwon)
    }

    /// `YYYY.MM.DD`, zero-padded; `-` when any component is missing
    pub fn formatted_date(&self) -> String {
        match self.deal_date() {
            Some(date) => date.format("%Y.%m.%d").to_string(),
            None => PLACEHOLDER.to_string(),
        }
    }

    pub fn deal_date(&self) -> Option<NaiveDate> {
        let year = self.deal_year.trim().parse::<i32>().ok()?;
        let month = self.deal_month.trim().parse::<u32>().ok()?;
        let day = self.deal_day.trim().parse::<u32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Applicant-to-unit ratio of a subscription listing
///
/// Upstream listings rarely carry a ratio. A simulated value is only
/// produced when explicitly enabled and stays tagged as such in output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CompetitionRatio {
    Reported(f64),
    Simulated(f64),
    #[default]
    Unavailable,
}

impl CompetitionRatio {
    pub fn value(&self) -> Option<f64> {
        match self {
            CompetitionRatio::Reported(v) | CompetitionRatio::Simulated(v) => Some(*v),
            CompetitionRatio::Unavailable => None,
        }
    }
}

/// One new-housing subscription listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub name: String,
    pub address: String,
    pub announcement_date: String,
    pub subscription_start: String,
    pub winner_date: String,
    pub total_units: i64,
    pub phone: String,
    #[serde(default)]
    pub competition: CompetitionRatio,
}

impl SubscriptionRecord {
    /// `None` for undated ("TBD", "-") listings
    pub fn subscription_start_date(&self) -> Option<NaiveDate> {
        parse_display_date(&self.subscription_start)
    }
}

/// Net migration for one district
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub district: String,
    pub province: String,
    pub net_migration: i64,
    pub label: String,
}

/// UI-facing projection of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionListing {
    pub title: String,
    pub price: i64,
    pub price_label: String,
    pub address: String,
    pub date: String,
    pub area: Option<Decimal>,
    pub floor: String,
    pub build_year: String,
    pub region_code: RegionCode,
}

impl TransactionListing {
    pub fn new(record: &TransactionRecord, address: String) -> Self {
        let title = if record.apartment.trim().is_empty() {
            PLACEHOLDER.to_string()
        } else {
            record.apartment.clone()
        };
        let address = if address.trim().is_empty() {
            PLACEHOLDER.to_string()
        } else {
            address
        };

        TransactionListing {
            title,
            price: record.price_manwon,
            price_label: record.formatted_price(),
            address,
            date: record.formatted_date(),
            area: record.exclusive_area,
            floor: record.floor.clone(),
            build_year: record.build_year.clone(),
            region_code: record.region_code.clone(),
        }
    }
}

/// Where a feed's records came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Live,
    Fallback,
}

/// Why the live path was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Transport,
    UpstreamRejected,
    Malformed,
    Empty,
    UnknownGroup,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Transport => write!(f, "transport failure"),
            FallbackReason::UpstreamRejected => write!(f, "upstream rejected request"),
            FallbackReason::Malformed => write!(f, "malformed response"),
            FallbackReason::Empty => write!(f, "no usable records"),
            FallbackReason::UnknownGroup => write!(f, "unknown region group"),
        }
    }
}

/// Result envelope handed to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed<T> {
    pub source: FeedSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    /// Regions whose request failed while others succeeded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_regions: Vec<RegionCode>,
    pub records: Vec<T>,
}

impl<T> Feed<T> {
    pub fn live(records: Vec<T>, failed_regions: Vec<RegionCode>) -> Self {
        Feed {
            source: FeedSource::Live,
            fallback_reason: None,
            failed_regions,
            records,
        }
    }

    pub fn fallback(records: Vec<T>, reason: FallbackReason) -> Self {
        Feed {
            source: FeedSource::Fallback,
            fallback_reason: Some(reason),
            failed_regions: Vec::new(),
            records,
        }
    }

    pub fn is_live(&self) -> bool {
        self.source == FeedSource::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_transaction() -> TransactionRecord {
        TransactionRecord {
            apartment: "은마".to_string(),
            price_manwon: 123_456,
            deal_year: "2026".to_string(),
            deal_month: "1".to_string(),
            deal_day: "5".to_string(),
            exclusive_area: Some(Decimal::new(8497, 2)),
            floor: "7".to_string(),
            build_year: "1979".to_string(),
            region_code: RegionCode::new("11680"),
            district_raw: String::new(),
            subdistrict: "대치동".to_string(),
        }
    }

    #[test]
    fn test_region_code_province_prefix() {
        assert_eq!(RegionCode::new("11680").province_code(), "11");
        assert_eq!(RegionCode::new(" 50110 ").as_str(), "50110");
        assert_eq!(RegionCode::new("1").province_code(), "1");
    }

    #[test]
    fn test_transaction_derived_fields() {
        let record = mock_transaction();
        assert_eq!(record.formatted_date(), "2026.01.05");
        assert_eq!(record.formatted_price(), "12억 3,456만원");
    }

    #[test]
    fn test_transaction_missing_date_is_placeholder() {
        let mut record = mock_transaction();
        record.deal_day = "-".to_string();
        assert_eq!(record.formatted_date(), "-");
        assert!(record.deal_date().is_none());
    }

    #[test]
    fn test_listing_never_has_empty_title_or_address() {
        let mut record = mock_transaction();
        record.apartment = "  ".to_string();
        let listing = TransactionListing::new(&record, String::new());
        assert_eq!(listing.title, "-");
        assert_eq!(listing.address, "-");
    }

    #[test]
    fn test_competition_ratio_serialization_is_tagged() {
        let simulated = serde_json::to_value(CompetitionRatio::Simulated(12.5)).unwrap();
        assert_eq!(simulated["kind"], "simulated");
        assert_eq!(simulated["value"], 12.5);

        let none = serde_json::to_value(CompetitionRatio::Unavailable).unwrap();
        assert_eq!(none["kind"], "unavailable");
    }

    #[test]
    fn test_raw_data_shape_mismatch() {
        let raw = RawData::Json("[]".to_string());
        assert!(raw.as_json().is_ok());
        assert!(matches!(
            raw.as_xml(),
            Err(ParseError::ShapeMismatch { expected: "xml", .. })
        ));
    }
}
