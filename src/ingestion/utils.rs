//! Utility functions for common operations

use crate::error::FetchError;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::debug;

/// Display value for any missing upstream field
pub const PLACEHOLDER: &str = "-";

/// GET a text body, treating any non-2xx status as a failure
pub async fn http_get_text(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, FetchError> {
    debug!("GET {}", url);

    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body = response.text().await?;
    debug!("Received {} bytes from {}", body.len(), url);
    Ok(body)
}

/// Parse a comma-grouped amount such as `"123,456"` or `" -1,204 "`.
/// Anything unparseable is 0.
pub fn parse_amount(raw: &str) -> i64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse::<i64>().unwrap_or(0)
}

/// Insert `.` separators into an undelimited `YYYYMMDD` string.
/// Already-punctuated values pass through trimmed; empty becomes `-`.
pub fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER.to_string();
    }
    if trimmed.len() == 8 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return format!("{}.{}.{}", &trimmed[..4], &trimmed[4..6], &trimmed[6..]);
    }
    trimmed.to_string()
}

/// Parse a display date in any of the provider forms; `None` when undated
pub fn parse_display_date(raw: &str) -> Option<NaiveDate> {
    let formatted = format_date(raw);
    ["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&formatted, fmt).ok())
}

/// `1234567` -> `"1,234,567"`
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

/// Format a price given in 10,000-won steps, e.g. `12억 3,456만원`
pub fn format_price_manwon(manwon: i64) -> String {
    if manwon <= 0 {
        return PLACEHOLDER.to_string();
    }

    let eok = manwon / 10_000;
    let rest = manwon % 10_000;

    match (eok, rest) {
        (0, rest) => format!("{}만원", group_thousands(rest)),
        (eok, 0) => format!("{}억원", eok),
        (eok, rest) => format!("{}억 {}만원", eok, group_thousands(rest)),
    }
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed value, or the placeholder when empty
pub fn or_placeholder(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_ignores_separators() {
        assert_eq!(parse_amount("123,456"), 123_456);
        assert_eq!(parse_amount("123456"), 123_456);
        assert_eq!(parse_amount("   98,500"), 98_500);
        assert_eq!(parse_amount("-1,204"), -1_204);
    }

    #[test]
    fn test_parse_amount_defaults_to_zero() {
        assert_eq!(parse_amount(""), 0);
        assert_eq!(parse_amount("-"), 0);
        assert_eq!(parse_amount("12억"), 0);
    }

    #[test]
    fn test_format_date_inserts_separators() {
        assert_eq!(format_date("20260115"), "2026.01.15");
        assert_eq!(format_date(" 20261231 "), "2026.12.31");
    }

    #[test]
    fn test_format_date_passes_through_punctuated() {
        assert_eq!(format_date("2026-01-15"), "2026-01-15");
        assert_eq!(format_date("2026.01.15"), "2026.01.15");
        assert_eq!(format_date("TBD"), "TBD");
        assert_eq!(format_date(""), "-");
    }

    #[test]
    fn test_format_date_is_idempotent() {
        for raw in ["20260115", "2026-01-15", "TBD", "", "2026011"] {
            let once = format_date(raw);
            assert_eq!(format_date(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_parse_display_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 15);
        assert_eq!(parse_display_date("20260115"), expected);
        assert_eq!(parse_display_date("2026-01-15"), expected);
        assert_eq!(parse_display_date("2026.01.15"), expected);
        assert_eq!(parse_display_date("TBD"), None);
        assert_eq!(parse_display_date("-"), None);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(3456), "3,456");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-5311), "-5,311");
    }

    #[test]
    fn test_format_price_manwon() {
        assert_eq!(format_price_manwon(9_500), "9,500만원");
        assert_eq!(format_price_manwon(120_000), "12억원");
        assert_eq!(format_price_manwon(123_456), "12억 3,456만원");
        assert_eq!(format_price_manwon(0), "-");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  서울특별시   강남구\t대치동 "), "서울특별시 강남구 대치동");
    }
}
