//! Parse functions - transform raw upstream bodies into records
//!
//! Providers renamed fields across API versions, so every logical field is
//! looked up through an ordered alias list; the first non-empty value wins
//! and a missing field becomes a placeholder rather than an error.

use crate::error::ParseError;
use crate::ingestion::types::{
    CompetitionRatio, PopulationRecord, RawData, RegionCode, SubscriptionRecord,
    TransactionRecord,
};
use crate::ingestion::utils::{format_date, or_placeholder, parse_amount};
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ordered field-name aliases for one logical field
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub names: &'static [&'static str],
}

impl FieldAliases {
    /// First alias with a non-empty value
    pub fn first_match<'a>(&self, row: &'a Row) -> Option<&'a str> {
        first_match(self.names, |name| row.get(name).map(String::as_str))
    }
}

/// Generic "first match wins" lookup over an alias list
pub fn first_match<'a, F>(names: &[&str], lookup: F) -> Option<&'a str>
where
    F: Fn(&str) -> Option<&'a str>,
{
    names
        .iter()
        .filter_map(|name| lookup(*name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// One flattened element group (XML `<item>` or JSON object)
pub type Row = HashMap<String, String>;

/// Apartment trade provider: current English tag first, legacy Korean tag second
pub mod transaction_fields {
    use super::FieldAliases;

    pub const APARTMENT: FieldAliases = FieldAliases { names: &["aptNm", "아파트"] };
    pub const PRICE: FieldAliases = FieldAliases { names: &["dealAmount", "거래금액"] };
    pub const YEAR: FieldAliases = FieldAliases { names: &["dealYear", "년"] };
    pub const MONTH: FieldAliases = FieldAliases { names: &["dealMonth", "월"] };
    pub const DAY: FieldAliases = FieldAliases { names: &["dealDay", "일"] };
    pub const AREA: FieldAliases = FieldAliases { names: &["excluUseAr", "전용면적"] };
    pub const FLOOR: FieldAliases = FieldAliases { names: &["floor", "층"] };
    pub const BUILD_YEAR: FieldAliases = FieldAliases { names: &["buildYear", "건축년도"] };
    pub const DISTRICT: FieldAliases = FieldAliases { names: &["sggNm", "estateAgentSggNm", "시군구"] };
    pub const SUBDISTRICT: FieldAliases = FieldAliases { names: &["umdNm", "법정동"] };
    pub const REGION: FieldAliases = FieldAliases { names: &["sggCd", "지역코드"] };
}

/// Subscription listing provider: upper-snake first, camelCase second
pub mod subscription_fields {
    use super::FieldAliases;

    pub const NAME: FieldAliases = FieldAliases { names: &["HOUSE_NM", "houseNm", "name"] };
    pub const ADDRESS: FieldAliases = FieldAliases { names: &["HSSPLY_ADRES", "hssplyAdres", "address"] };
    pub const ANNOUNCEMENT: FieldAliases = FieldAliases { names: &["RCRIT_PBLANC_DE", "rcritPblancDe", "announcementDate"] };
    pub const START: FieldAliases = FieldAliases { names: &["RCEPT_BGNDE", "rceptBgnde", "SUBSCRPT_RCEPT_BGNDE", "subscriptionStart"] };
    pub const WINNER: FieldAliases = FieldAliases { names: &["PRZWNER_PRESNATN_DE", "przwnerPresnatnDe", "winnerDate"] };
    pub const UNITS: FieldAliases = FieldAliases { names: &["TOT_SUPLY_HSHLDCO", "totSuplyHshldco", "totalUnits"] };
    pub const PHONE: FieldAliases = FieldAliases { names: &["MDHS_TELNO", "mdhsTelno", "phone"] };
    pub const RATIO: FieldAliases = FieldAliases { names: &["CMPET_RATE", "cmpetRate", "competitionRate"] };
}

/// Statistics portal migration table
pub mod population_fields {
    use super::FieldAliases;

    pub const DISTRICT: FieldAliases = FieldAliases { names: &["C1_NM", "district", "regionName"] };
    pub const PROVINCE: FieldAliases = FieldAliases { names: &["UP_C1_NM", "province"] };
    pub const VALUE: FieldAliases = FieldAliases { names: &["DT", "netMigration", "value"] };
    pub const LABEL: FieldAliases = FieldAliases { names: &["label"] };
}

const XML_SUCCESS_CODES: [&str; 3] = ["00", "000", "0"];
const JSON_ERROR_KEYS: [&str; 4] = ["errMsg", "err", "errorMessage", "error"];
const JSON_DATA_KEYS: [&str; 3] = ["data", "items", "list"];

#[derive(Debug, Default)]
struct XmlDocument {
    result_code: Option<String>,
    result_msg: Option<String>,
    items: Vec<Row>,
}

/// Collect `<item>` groups plus the header result code/message
fn read_xml(body: &str) -> Result<XmlDocument, ParseError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut doc = XmlDocument::default();
    let mut current: Option<Row> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    current = Some(Row::new());
                    field = None;
                } else {
                    field = Some(name);
                    text.clear();
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    if let Some(item) = current.take() {
                        doc.items.push(item);
                    }
                } else if field.as_deref() == Some(name.as_str()) {
                    let value = text.trim().to_string();
                    match current.as_mut() {
                        Some(item) => {
                            item.insert(name, value);
                        }
                        None => match name.as_str() {
                            "resultCode" | "returnReasonCode" => doc.result_code = Some(value),
                            "resultMsg" | "returnAuthMsg" | "errMsg" => {
                                doc.result_msg.get_or_insert(value);
                            }
                            _ => {}
                        },
                    }
                    field = None;
                    text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(doc)
}

/// Parse one transaction provider body. Items missing fields still become
/// records; an upstream error code is a soft `UpstreamRejected` failure.
pub fn parse_transactions_xml(
    raw: &RawData,
    region: &RegionCode,
) -> Result<Vec<TransactionRecord>, ParseError> {
    use transaction_fields::*;

    let doc = read_xml(raw.as_xml()?)?;

    if let Some(code) = doc.result_code.as_deref() {
        if !XML_SUCCESS_CODES.contains(&code) {
            let message = doc.result_msg.unwrap_or_default();
            warn!("Region {} rejected upstream: {} {}", region, code, message);
            return Err(ParseError::UpstreamRejected(format!("{} {}", code, message)));
        }
    }

    let records: Vec<TransactionRecord> = doc
        .items
        .iter()
        .map(|row| TransactionRecord {
            apartment: or_placeholder(APARTMENT.first_match(row)),
            price_manwon: parse_amount(PRICE.first_match(row).unwrap_or("")),
            deal_year: or_placeholder(YEAR.first_match(row)),
            deal_month: or_placeholder(MONTH.first_match(row)),
            deal_day: or_placeholder(DAY.first_match(row)),
            exclusive_area: AREA
                .first_match(row)
                .and_then(|v| v.replace(',', "").parse::<Decimal>().ok()),
            floor: or_placeholder(FLOOR.first_match(row)),
            build_year: or_placeholder(BUILD_YEAR.first_match(row)),
            region_code: REGION
                .first_match(row)
                .map(RegionCode::new)
                .unwrap_or_else(|| region.clone()),
            district_raw: DISTRICT.first_match(row).unwrap_or("").to_string(),
            subdistrict: SUBDISTRICT.first_match(row).unwrap_or("").to_string(),
        })
        .collect();

    debug!("Parsed {} transactions for region {}", records.len(), region);
    Ok(records)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn object_to_row(map: &Map<String, Value>) -> Row {
    map.iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
        .collect()
}

/// Error message when the object carries an error field
fn json_error(map: &Map<String, Value>) -> Option<String> {
    let message = JSON_ERROR_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(|v| match v {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::Bool(false) => None,
            other => Some(scalar_to_string(other).unwrap_or_else(|| other.to_string())),
        })
        .next();
    if message.is_some() {
        return message;
    }

    // `{"code": -4, "msg": "..."}` style rejections
    match map.get("code").and_then(Value::as_i64) {
        Some(code) if code < 0 => {
            let msg = map.get("msg").and_then(Value::as_str).unwrap_or("");
            Some(format!("{} {}", code, msg))
        }
        _ => None,
    }
}

fn rows_from_array(items: &[Value]) -> Result<Vec<Row>, ParseError> {
    if let Some(Value::Object(first)) = items.first() {
        if let Some(message) = json_error(first) {
            return Err(ParseError::UpstreamRejected(message));
        }
    }
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(object_to_row)
        .collect())
}

/// Accept a bare array or an object wrapping one; an error field on the top
/// level or on the first element is an `UpstreamRejected` soft failure
pub fn parse_json_rows(raw: &RawData) -> Result<Vec<Row>, ParseError> {
    let value: Value = serde_json::from_str(raw.as_json()?)?;

    match &value {
        Value::Array(items) => rows_from_array(items),
        Value::Object(map) => {
            if let Some(message) = json_error(map) {
                return Err(ParseError::UpstreamRejected(message));
            }
            JSON_DATA_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .map(|items| rows_from_array(items))
                .unwrap_or_else(|| {
                    Err(ParseError::Malformed(
                        "object without a data array".to_string(),
                    ))
                })
        }
        _ => Err(ParseError::Malformed(format!(
            "unexpected top-level JSON: {}",
            value
        ))),
    }
}

fn parse_ratio(raw: &str) -> CompetitionRatio {
    // "12.5" or "12.5:1"
    let head = raw.split(':').next().unwrap_or("").replace(',', "");
    match head.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => CompetitionRatio::Reported(v),
        _ => CompetitionRatio::Unavailable,
    }
}

pub fn parse_subscriptions_json(raw: &RawData) -> Result<Vec<SubscriptionRecord>, ParseError> {
    use subscription_fields::*;

    let rows = parse_json_rows(raw)?;
    let records: Vec<SubscriptionRecord> = rows
        .iter()
        .map(|row| SubscriptionRecord {
            name: or_placeholder(NAME.first_match(row)),
            address: or_placeholder(ADDRESS.first_match(row)),
            announcement_date: format_date(ANNOUNCEMENT.first_match(row).unwrap_or("")),
            subscription_start: format_date(START.first_match(row).unwrap_or("")),
            winner_date: format_date(WINNER.first_match(row).unwrap_or("")),
            total_units: parse_amount(UNITS.first_match(row).unwrap_or("")),
            phone: or_placeholder(PHONE.first_match(row)),
            competition: RATIO
                .first_match(row)
                .map(parse_ratio)
                .unwrap_or_default(),
        })
        .collect();

    debug!("Parsed {} subscription listings", records.len());
    Ok(records)
}

pub fn migration_label(net_migration: i64) -> &'static str {
    match net_migration {
        n if n > 0 => "순유입",
        n if n < 0 => "순유출",
        _ => "변동 없음",
    }
}

pub fn parse_population_json(raw: &RawData) -> Result<Vec<PopulationRecord>, ParseError> {
    use population_fields::*;

    let rows = parse_json_rows(raw)?;
    let records: Vec<PopulationRecord> = rows
        .iter()
        .map(|row| {
            let name = DISTRICT.first_match(row).unwrap_or("");
            let (province, district) = match PROVINCE.first_match(row) {
                Some(province) => (province.to_string(), name.to_string()),
                // "경기도 화성시" carries its province as the first token
                None => match name.split_once(' ') {
                    Some((province, district)) => (province.to_string(), district.to_string()),
                    None => (String::new(), name.to_string()),
                },
            };
            let net_migration = parse_amount(VALUE.first_match(row).unwrap_or(""));
            let label = LABEL
                .first_match(row)
                .unwrap_or(migration_label(net_migration))
                .to_string();

            PopulationRecord {
                district: or_placeholder(Some(district.as_str())),
                province: or_placeholder(Some(province.as_str())),
                net_migration,
                label,
            }
        })
        .collect();

    debug!("Parsed {} population rows", records.len());
    Ok(records)
}
