//! Adsterra publisher API client.
//!
//! Every failure is returned as [`Error::Network`] carrying the text shown to
//! the user, so callers never have to reformat transport errors.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::daterange::{DateRange, GroupBy};
use crate::{Error, Result};

pub const ADSTERRA_API_URL: &str = "https://api3.adsterratools.com/publisher";

/// Default timeout for every Adsterra request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const DOMAINS_ERROR: &str = "Adsterra Error: \nFailed to retrieve Websites or Direct Links";
const DIRECT_LINKS_ERROR: &str = "Adsterra Error:\nFailed to retrieve Direct Links";
const STATS_ERROR: &str = "Failed to retrieve data";

/// Title marker Adsterra uses for the pseudo-domain that owns direct links.
const DIRECT_LINK_MARKER: &str = "direct-link";

/// A registered website (or the direct-link pseudo-domain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: u64,
    pub title: String,
}

impl Domain {
    pub fn is_direct_link(&self) -> bool {
        self.title.to_lowercase().contains(DIRECT_LINK_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectLink {
    pub alias: String,
    #[serde(rename = "direct_url")]
    pub url: String,
}

/// One bucket of a statistics report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRow {
    #[serde(default)]
    pub impression: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub cpm: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl StatRow {
    /// Bucket label for whichever dimension the report was grouped by.
    pub fn label(&self) -> Option<&str> {
        self.date
            .as_deref()
            .or(self.domain.as_deref())
            .or(self.country.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Adsterra publisher API client.
#[derive(Debug, Clone)]
pub struct AdsterraClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl AdsterraClient {
    /// Create a client against the public Adsterra endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(ADSTERRA_API_URL, DEFAULT_TIMEOUT)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url<S: Into<String>>(base_url: S, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("adsterra_bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str, api_key: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("X-API-Key", api_key)
    }

    /// All domains on the account, including the direct-link pseudo-domain.
    pub async fn list_domains(&self, api_key: &str) -> Result<Vec<Domain>> {
        let response = self
            .get("/domains.json", api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Error fetching domains from Adsterra");
                Error::Network(DOMAINS_ERROR.to_string())
            })?;

        let domains: Vec<Domain> = read_items(response, DOMAINS_ERROR).await?;
        debug!(count = domains.len(), "Fetched domains");
        Ok(domains)
    }

    /// Websites only: domains that are not the direct-link pseudo-domain.
    pub async fn list_websites(&self, api_key: &str) -> Result<Vec<Domain>> {
        let domains = self.list_domains(api_key).await?;
        Ok(domains.into_iter().filter(|d| !d.is_direct_link()).collect())
    }

    /// Placements of the first direct-link domain. No such domain ⇒ empty.
    pub async fn list_direct_links(&self, api_key: &str) -> Result<Vec<DirectLink>> {
        let domains = self.list_domains(api_key).await?;
        let Some(domain) = domains.iter().find(|d| d.is_direct_link()) else {
            return Ok(Vec::new());
        };

        let path = format!("/domain/{}/placements.json", domain.id);
        let response = self
            .get(&path, api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, domain_id = domain.id, "Error fetching direct links");
                Error::Network(DIRECT_LINKS_ERROR.to_string())
            })?;

        let links: Vec<DirectLink> = read_items(response, DIRECT_LINKS_ERROR).await?;
        debug!(count = links.len(), domain_id = domain.id, "Fetched direct links");
        Ok(links)
    }

    /// Statistics for `range`, bucketed by `group_by`.
    pub async fn get_statistics(
        &self,
        range: &DateRange,
        group_by: GroupBy,
        api_key: &str,
    ) -> Result<Vec<StatRow>> {
        let start = range.start_param();
        let finish = range.end_param();
        info!(start = %start, finish = %finish, group_by = %group_by, "Requesting statistics");

        let response = self
            .get("/stats.json", api_key)
            .query(&[
                ("start_date", start.as_str()),
                ("finish_date", finish.as_str()),
                ("group_by", group_by.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Error fetching statistics from Adsterra");
                Error::Network(STATS_ERROR.to_string())
            })?;

        read_items(response, STATS_ERROR).await
    }

    /// Lightweight request whose only purpose is to check that `api_key`
    /// authenticates. Returns the HTTP status code.
    pub async fn probe_status(&self, api_key: &str) -> Result<u16> {
        let response = self
            .get("/domains.json", api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "API key probe failed");
                Error::Network(e.to_string())
            })?;

        let status = response.status().as_u16();
        info!(status, "Probed API key");
        Ok(status)
    }
}

async fn read_items<T: DeserializeOwned>(response: Response, user_message: &str) -> Result<Vec<T>> {
    let status = response.status();
    let text = response.text().await.map_err(|e| {
        error!(error = %e, "Failed to read Adsterra response");
        Error::Network(user_message.to_string())
    })?;

    if !status.is_success() {
        error!(status = %status, body = %text, "Adsterra returned an error status");
        return Err(Error::Network(user_message.to_string()));
    }

    let parsed: ItemsResponse<T> = serde_json::from_str(&text).map_err(|e| {
        error!(error = %e, "Invalid Adsterra response");
        Error::Network(user_message.to_string())
    })?;

    Ok(parsed.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use serde_json::json;

    const KEY: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";

    fn client(server: &MockServer) -> AdsterraClient {
        AdsterraClient::with_base_url(server.base_url(), Duration::from_secs(2)).expect("client")
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 10, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 10).unwrap(),
        )
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client =
            AdsterraClient::with_base_url("http://localhost:1/publisher/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1/publisher");
    }

    #[tokio::test]
    async fn list_domains_sends_api_key_header() {
        let server = MockServer::start_async().await;

        let domains_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/domains.json")
                .header("X-API-Key", KEY)
                .header("Accept", "application/json");
            then.status(200).json_body(json!({
                "items": [
                    { "id": 1, "title": "example.com" },
                    { "id": 2, "title": "Direct-Link" }
                ]
            }));
        });

        let domains = client(&server).list_domains(KEY).await.unwrap();
        assert_eq!(domains.len(), 2);
        assert!(domains[1].is_direct_link());
        domains_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn list_websites_filters_direct_link_domain() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json");
            then.status(200).json_body(json!({
                "items": [
                    { "id": 1, "title": "example.com" },
                    { "id": 2, "title": "my direct-link" }
                ]
            }));
        });

        let websites = client(&server).list_websites(KEY).await.unwrap();
        assert_eq!(
            websites,
            vec![Domain {
                id: 1,
                title: "example.com".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn list_direct_links_fetches_placements_of_direct_link_domain() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json");
            then.status(200).json_body(json!({
                "items": [
                    { "id": 1, "title": "example.com" },
                    { "id": 77, "title": "Direct-Link" }
                ]
            }));
        });
        let placements_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/domain/77/placements.json")
                .header("X-API-Key", KEY);
            then.status(200).json_body(json!({
                "items": [
                    { "id": 5, "alias": "Main", "direct_url": "https://example.org/go" }
                ]
            }));
        });

        let links = client(&server).list_direct_links(KEY).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].alias, "Main");
        assert_eq!(links[0].url, "https://example.org/go");
        placements_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn list_direct_links_without_direct_link_domain_is_empty() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json");
            then.status(200)
                .json_body(json!({ "items": [ { "id": 1, "title": "example.com" } ] }));
        });

        let links = client(&server).list_direct_links(KEY).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn list_domains_maps_error_status_to_display_message() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json");
            then.status(401).body("unauthorized");
        });

        let err = client(&server).list_domains(KEY).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.to_string().contains("Failed to retrieve Websites or Direct Links"));
    }

    #[tokio::test]
    async fn get_statistics_sends_range_and_group_by() {
        let server = MockServer::start_async().await;

        let stats_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/stats.json")
                .query_param("start_date", "2024-10-03")
                .query_param("finish_date", "2024-10-10")
                .query_param("group_by", "country")
                .header("X-API-Key", KEY);
            then.status(200).json_body(json!({
                "items": [
                    { "country": "US", "impression": 100, "clicks": 10, "cpm": 1.5, "revenue": 12.345 }
                ]
            }));
        });

        let rows = client(&server)
            .get_statistics(&range(), GroupBy::Country, KEY)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].impression, 100);
        assert_eq!(rows[0].label(), Some("US"));
        stats_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn get_statistics_missing_items_is_empty() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/stats.json");
            then.status(200).json_body(json!({}));
        });

        let rows = client(&server)
            .get_statistics(&range(), GroupBy::Date, KEY)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn get_statistics_invalid_json_is_network_error() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/stats.json");
            then.status(200).body("not json");
        });

        let err = client(&server)
            .get_statistics(&range(), GroupBy::Date, KEY)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to retrieve data");
    }

    #[tokio::test]
    async fn get_statistics_times_out() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/stats.json");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({ "items": [] }));
        });

        let client =
            AdsterraClient::with_base_url(server.base_url(), Duration::from_millis(50)).unwrap();
        let err = client
            .get_statistics(&range(), GroupBy::Date, KEY)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to retrieve data");
    }

    #[tokio::test]
    async fn probe_status_reports_status_code() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json").header("X-API-Key", KEY);
            then.status(200).json_body(json!({ "items": [] }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/domains.json")
                .header("X-API-Key", "00000000000000000000000000000000");
            then.status(401);
        });

        let client = client(&server);
        assert_eq!(client.probe_status(KEY).await.unwrap(), 200);
        assert_eq!(
            client
                .probe_status("00000000000000000000000000000000")
                .await
                .unwrap(),
            401
        );
    }

    #[tokio::test]
    async fn probe_status_connection_refused_is_network_error() {
        let client =
            AdsterraClient::with_base_url("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = client.probe_status(KEY).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn stat_row_label_prefers_present_dimension() {
        let row = StatRow {
            domain: Some("example.com".into()),
            ..Default::default()
        };
        assert_eq!(row.label(), Some("example.com"));
        assert_eq!(StatRow::default().label(), None);
    }

    #[tokio::test]
    async fn slow_domains_response_times_out() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({ "items": [] }));
        });

        let client =
            AdsterraClient::with_base_url(server.base_url(), Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        let err = client.list_websites(KEY).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(1200));
        assert!(err.to_string().contains("Failed to retrieve Websites or Direct Links"));
    }

    #[tokio::test]
    async fn slow_placements_response_times_out() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(GET).path("/domains.json");
            then.status(200)
                .json_body(json!({ "items": [ { "id": 9, "title": "Direct-Link" } ] }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/domain/9/placements.json");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({ "items": [] }));
        });

        let client =
            AdsterraClient::with_base_url(server.base_url(), Duration::from_millis(200)).unwrap();
        let err = client.list_direct_links(KEY).await.unwrap_err();
        assert!(err.to_string().contains("Failed to retrieve Direct Links"));
    }
}
