use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

const AGENT_ENDPOINT: &str = "/api/data/endpoint/Agent";
const DEVICE_ORDERING_FIELD: &str = "firstseen";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct HarfanglabConfig {
    /// Console URL, the scheme defaults to https when omitted.
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl HarfanglabConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Filter and page position of a single agent listing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentQuery {
    /// Agents first seen at or after this instant.
    pub firstseen: DateTime<Utc>,
    pub limit: usize,
    pub offset: u64,
}

/// One page of the agent listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HarfanglabClient {
    http: Client,
    base_url: Url,
    agents_url: Url,
    api_token: String,
}

impl HarfanglabClient {
    pub fn new(config: HarfanglabConfig) -> Result<Self> {
        if config.api_token.is_empty() {
            return Err(Error::Config("Harfanglab API token is empty".to_string()));
        }

        let base_url = normalize_base_url(&config.base_url)?;
        let agents_url = base_url
            .join(AGENT_ENDPOINT)
            .map_err(|e| Error::Config(format!("Invalid agent endpoint: {e}")))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            agents_url,
            api_token: config.api_token,
        })
    }

    /// Lists one page of agents. When `next` is given it is followed instead of the agent
    /// endpoint, with the filter and page parameters of `query` overriding its own.
    pub async fn list_agents(&self, query: &AgentQuery, next: Option<&str>) -> Result<AgentPage> {
        let mut url = match next {
            Some(next) => self.resolve_next(next)?,
            None => self.agents_url.clone(),
        };
        set_query(&mut url, query);

        debug!(%url, "Listing Harfanglab agents");
        let response = self
            .http
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_token),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// The `next` link must stay on the console host, the API token is sent along with it.
    fn resolve_next(&self, next: &str) -> Result<Url> {
        let url = self
            .base_url
            .join(next)
            .map_err(|e| Error::Decode(format!("Invalid next link {next}: {e}")))?;

        if url.origin() != self.base_url.origin() {
            return Err(Error::Decode(format!(
                "Next link {next} leaves the console host"
            )));
        }
        Ok(url)
    }
}

fn set_query(url: &mut Url, query: &AgentQuery) {
    const OWNED: [&str; 4] = ["ordering", "firstseen", "limit", "offset"];

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !OWNED.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("ordering", DEVICE_ORDERING_FIELD)
        .append_pair(
            "firstseen",
            &query
                .firstseen
                .to_rfc3339_opts(SecondsFormat::Micros, false),
        )
        .append_pair("limit", &query.limit.to_string())
        .append_pair("offset", &query.offset.to_string());
}

/// Accepts console addresses with or without scheme and trailing slash.
fn normalize_base_url(raw: &str) -> Result<Url> {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        return Err(Error::Config("Harfanglab base URL is empty".to_string()));
    }

    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    Url::parse(&format!("{with_scheme}/"))
        .map_err(|e| Error::Config(format!("Invalid Harfanglab base URL {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use serde_json::json;

    fn query(offset: u64) -> AgentQuery {
        AgentQuery {
            firstseen: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            limit: 2,
            offset,
        }
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("console.example.com").unwrap().as_str(),
            "https://console.example.com/"
        );
        assert_eq!(
            normalize_base_url("http://127.0.0.1:8080/").unwrap().as_str(),
            "http://127.0.0.1:8080/"
        );
        assert!(normalize_base_url("  ").is_err());
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = HarfanglabClient::new(HarfanglabConfig::new("console.example.com", ""));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_list_agents_first_page() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(AGENT_ENDPOINT)
                    .header("authorization", "Token secret")
                    .query_param("ordering", "firstseen")
                    .query_param("firstseen", "2025-03-01T12:00:00.000000+00:00")
                    .query_param("limit", "2")
                    .query_param("offset", "0");
                then.status(200).json_body(json!({
                    "count": 3,
                    "next": "/api/data/endpoint/Agent?limit=2&offset=2",
                    "results": [
                        {"id": "a1", "hostname": "host-1", "firstseen": "2025-03-01T12:00:01Z"},
                        {"id": "a2", "hostname": "host-2", "firstseen": "2025-03-01T12:00:02Z"}
                    ]
                }));
            })
            .await;

        let client =
            HarfanglabClient::new(HarfanglabConfig::new(server.base_url(), "secret")).unwrap();
        let page = client.list_agents(&query(0), None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.count, 3);
        assert_eq!(page.results.len(), 2);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/data/endpoint/Agent?limit=2&offset=2")
        );
    }

    #[tokio::test]
    async fn test_next_link_followed_with_current_offset() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(AGENT_ENDPOINT)
                    .query_param("offset", "2")
                    .query_param("limit", "2")
                    .query_param("cursor", "abc");
                then.status(200).json_body(json!({
                    "count": 3,
                    "next": null,
                    "results": [{"id": "a3", "firstseen": "2025-03-01T12:00:03Z"}]
                }));
            })
            .await;

        let client =
            HarfanglabClient::new(HarfanglabConfig::new(server.base_url(), "secret")).unwrap();
        let next = server.url("/api/data/endpoint/Agent?cursor=abc&offset=999");
        let page = client.list_agents(&query(2), Some(&next)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.results.len(), 1);
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_foreign_next_link_rejected() {
        let server = MockServer::start_async().await;
        let client =
            HarfanglabClient::new(HarfanglabConfig::new(server.base_url(), "secret")).unwrap();

        let result = client
            .list_agents(&query(2), Some("https://elsewhere.example.com/steal"))
            .await;
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_error_status_and_bad_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(AGENT_ENDPOINT).query_param("offset", "0");
                then.status(503).body("maintenance");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(AGENT_ENDPOINT).query_param("offset", "2");
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let client =
            HarfanglabClient::new(HarfanglabConfig::new(server.base_url(), "secret")).unwrap();

        match client.list_agents(&query(0), None).await {
            Err(Error::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected status error, got {other:?}"),
        }

        assert!(matches!(
            client.list_agents(&query(2), None).await,
            Err(Error::Decode(_))
        ));
    }
}
