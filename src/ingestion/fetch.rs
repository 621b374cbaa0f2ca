//! Fetch functions - concurrent requests to the government open-data APIs

use crate::config::UpstreamSettings;
use crate::error::FetchError;
use crate::ingestion::types::{RawData, RegionCode};
use crate::ingestion::utils::http_get_text;
use futures::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

/// The transaction gateway rejects clients that do not look like a desktop browser
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Query layout of one upstream endpoint
#[derive(Debug, Clone)]
pub struct Endpoint<'a> {
    pub url: &'a str,
    pub key_param: &'static str,
    pub key: &'a str,
    pub region_param: &'static str,
    pub page_params: (&'static str, &'static str),
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    settings: UpstreamSettings,
}

impl UpstreamClient {
    pub fn new(settings: UpstreamSettings) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(BROWSER_USER_AGENT);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(UpstreamClient {
            client: builder.build()?,
            settings,
        })
    }

    fn transactions_endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            url: &self.settings.transactions_url,
            key_param: "serviceKey",
            key: &self.settings.service_key,
            region_param: "LAWD_CD",
            page_params: ("pageNo", "numOfRows"),
        }
    }

    fn subscriptions_endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            url: &self.settings.subscriptions_url,
            key_param: "serviceKey",
            key: &self.settings.service_key,
            region_param: "cond[SUBSCRPT_AREA_CODE::EQ]",
            page_params: ("page", "perPage"),
        }
    }

    fn population_endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            url: &self.settings.population_url,
            key_param: "apiKey",
            key: &self.settings.population_key,
            region_param: "objL1",
            page_params: ("pageNo", "numOfRows"),
        }
    }

    fn query<'q>(
        &self,
        endpoint: &Endpoint<'_>,
        region: &str,
        extra: &'q [(&'q str, String)],
    ) -> Vec<(&'q str, String)> {
        let (page, rows) = endpoint.page_params;
        let mut query = vec![
            (endpoint.key_param, endpoint.key.to_string()),
            (endpoint.region_param, region.to_string()),
            (page, "1".to_string()),
            (rows, self.settings.rows_per_page.to_string()),
        ];
        query.extend(extra.iter().cloned());
        query
    }

    /// One GET per region code, all in flight together. The output is
    /// index-aligned with `codes`; a failed region only fails its own slot.
    pub async fn fan_out(
        &self,
        endpoint: &Endpoint<'_>,
        codes: &[RegionCode],
        extra: &[(&str, String)],
    ) -> Vec<Result<String, FetchError>> {
        let requests = codes.iter().map(|code| {
            let query = self.query(endpoint, code.as_str(), extra);
            async move {
                let result = http_get_text(&self.client, endpoint.url, &query).await;
                if let Err(e) = &result {
                    warn!("Request for region {} failed: {}", code, e);
                }
                result
            }
        });

        join_all(requests).await
    }

    /// Apartment trades for each legal-district code in one deal month (`YYYYMM`)
    pub async fn fetch_transactions(
        &self,
        codes: &[RegionCode],
        deal_ymd: &str,
    ) -> Vec<Result<RawData, FetchError>> {
        info!("Fetching transactions for {} regions ({})", codes.len(), deal_ymd);
        let endpoint = self.transactions_endpoint();
        self.fan_out(&endpoint, codes, &[("DEAL_YMD", deal_ymd.to_string())])
            .await
            .into_iter()
            .map(|r| r.map(RawData::Xml))
            .collect()
    }

    /// Subscription listings for each subscription area code
    pub async fn fetch_subscriptions(&self, codes: &[RegionCode]) -> Vec<Result<RawData, FetchError>> {
        info!("Fetching subscriptions for {} areas", codes.len());
        let endpoint = self.subscriptions_endpoint();
        self.fan_out(&endpoint, codes, &[])
            .await
            .into_iter()
            .map(|r| r.map(RawData::Json))
            .collect()
    }

    /// Net migration table; a single request with the region as a parameter
    pub async fn fetch_population(&self, region: &str) -> Result<RawData, FetchError> {
        info!("Fetching population statistics for {}", region);
        let endpoint = self.population_endpoint();
        let extra = [
            ("orgId", self.settings.population_org_id.clone()),
            ("tblId", self.settings.population_table_id.clone()),
            ("itmId", self.settings.population_item_id.clone()),
            ("method", "getList".to_string()),
            ("format", "json".to_string()),
            ("jsonVD", "Y".to_string()),
            ("prdSe", "M".to_string()),
            ("newEstPrdCnt", "1".to_string()),
        ];
        let query = self.query(&endpoint, region, &extra);
        http_get_text(&self.client, endpoint.url, &query)
            .await
            .map(RawData::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_upstream;
    use axum::extract::Query;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    async fn echo_region(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !agent.starts_with("Mozilla/5.0") {
            return (StatusCode::FORBIDDEN, "not a browser".to_string());
        }
        if params.get("serviceKey").map(String::as_str) != Some("test-key") {
            return (StatusCode::UNAUTHORIZED, "no key".to_string());
        }
        let region = params.get("LAWD_CD").cloned().unwrap_or_default();
        if region == "99999" {
            return (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string());
        }
        let ymd = params.get("DEAL_YMD").cloned().unwrap_or_default();
        (StatusCode::OK, format!("{region}:{ymd}"))
    }

    fn client_for(base: &str) -> UpstreamClient {
        UpstreamClient::new(UpstreamSettings {
            service_key: "test-key".to_string(),
            transactions_url: format!("{base}/trade"),
            ..UpstreamSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_is_index_aligned() {
        let base = spawn_upstream(Router::new().route("/trade", get(echo_region))).await;
        let client = client_for(&base);

        let codes: Vec<RegionCode> = ["11680", "99999", "26350"].into_iter().map(RegionCode::from).collect();
        let results = client.fetch_transactions(&codes, "202609").await;

        assert_eq!(results.len(), codes.len());
        assert_eq!(results[0].as_ref().unwrap().as_xml().unwrap(), "11680:202609");
        assert!(matches!(results[1], Err(FetchError::Status(s)) if s.as_u16() == 500));
        assert_eq!(results[2].as_ref().unwrap().as_xml().unwrap(), "26350:202609");
    }

    #[tokio::test]
    async fn test_fan_out_empty_input() {
        let client = client_for("http://127.0.0.1:9");
        assert!(client.fetch_transactions(&[], "202609").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let client = client_for("http://127.0.0.1:9");
        let results = client.fetch_transactions(&[RegionCode::new("11680")], "202609").await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_population_sends_region_and_table_selectors() {
        async fn stats(Query(params): Query<HashMap<String, String>>) -> String {
            let table = ["orgId", "tblId", "itmId"]
                .map(|key| params.get(key).cloned().unwrap_or_default())
                .join("/");
            if table != "101/DT_1B26001_A01/T25" {
                return format!("{{\"err\": \"20\", \"errMsg\": \"missing table {}\"}}", table);
            }
            format!(
                "[{{\"C1_NM\": \"{}\", \"DT\": \"1\"}}]",
                params.get("objL1").cloned().unwrap_or_default()
            )
        }
        let base = spawn_upstream(Router::new().route("/stats", get(stats))).await;
        let client = UpstreamClient::new(UpstreamSettings {
            population_url: format!("{base}/stats"),
            ..UpstreamSettings::default()
        })
        .unwrap();

        let raw = client.fetch_population("11+41").await.unwrap();
        let body = raw.as_json().unwrap();
        assert!(body.contains("11+41"), "{body}");
    }
}
