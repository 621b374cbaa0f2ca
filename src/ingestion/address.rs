//! Address normalization - reconcile region codes, raw district strings and
//! the static district table into one display address

use crate::ingestion::types::{RegionCode, TransactionListing, TransactionRecord};
use crate::ingestion::utils::{collapse_whitespace, PLACEHOLDER};
use crate::regions::{Province, RegionCatalog};

/// Province codes whose own name collides with their sole major city
const SEJONG: &str = "36";
const JEJU: &str = "50";

const LEGAL_SUFFIXES: [&str; 2] = ["특별자치도", "특별자치시"];

/// Drop leading tokens that only restate the province, including the
/// legacy full name of a renamed province
/// (`"강원특별자치도 춘천시"`, `"강원도 춘천시"` -> `"춘천시"`)
pub fn strip_legal_suffix(catalog: &RegionCatalog, raw: &str, province: &Province) -> String {
    let restates_province = |token: &str| {
        token == province.name
            || LEGAL_SUFFIXES.iter().any(|suffix| token.ends_with(suffix))
            || catalog
                .province_by_name(token)
                .is_some_and(|p| p.name == token && p.short == province.short)
    };

    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let skip = tokens.iter().take_while(|t| restates_province(*t)).count();
    tokens[skip..].join(" ")
}

/// Remove a duplicated `"<short> "` prefix. Only a prefix followed by a
/// space is removed, so `"제주시"` stays intact under `"제주"`.
pub fn dedupe_province_prefix(district: &str, short: &str) -> String {
    let district = district.trim();
    if short.is_empty() {
        return district.to_string();
    }
    match district.strip_prefix(short) {
        Some(rest) if rest.starts_with(' ') => rest.trim().to_string(),
        _ => district.to_string(),
    }
}

/// District name for a record: the cleaned raw field when present,
/// otherwise the static per-code table
pub fn resolve_district(catalog: &RegionCatalog, code: &RegionCode, raw: &str) -> String {
    // Agent-office fields can list several districts; the first is the record's own
    let first = raw.split(',').next().unwrap_or("").trim();

    let cleaned = match catalog.province(code.province_code()) {
        Some(province) => {
            let stripped = strip_legal_suffix(catalog, first, province);
            dedupe_province_prefix(&stripped, &province.short)
        }
        None => first.to_string(),
    };

    if !cleaned.is_empty() {
        return cleaned;
    }
    catalog.district(code).unwrap_or("").to_string()
}

/// Build one human-readable address from a region code, the raw district
/// field and the legal dong
pub fn normalize_address(
    catalog: &RegionCatalog,
    code: &RegionCode,
    raw_district: &str,
    subdistrict: &str,
) -> String {
    let subdistrict = subdistrict.trim();

    let address = match catalog.province(code.province_code()) {
        Some(province) if province.code == SEJONG => {
            format!("{} {}", province.name, subdistrict)
        }
        Some(province) if province.code == JEJU => {
            let district = resolve_district(catalog, code, raw_district);
            format!("{} {} {}", province.name, district, subdistrict)
        }
        Some(province) => {
            let district = resolve_district(catalog, code, raw_district);
            let prefix = if province.metro {
                &province.name
            } else {
                &province.short
            };
            format!("{} {} {}", prefix, district, subdistrict)
        }
        None => {
            let district = resolve_district(catalog, code, raw_district);
            format!("{} {}", district, subdistrict)
        }
    };

    let address = collapse_whitespace(&address);
    if address.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        address
    }
}

/// Project a record into its display form
pub fn to_listing(catalog: &RegionCatalog, record: &TransactionRecord) -> TransactionListing {
    let address = normalize_address(
        catalog,
        &record.region_code,
        &record.district_raw,
        &record.subdistrict,
    );
    TransactionListing::new(record, address)
}
