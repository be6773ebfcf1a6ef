use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.bitsighttech.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct BitsightConfig {
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl BitsightConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FindingsQuery {
    /// Findings last seen on or after this day.
    pub last_seen_gte: NaiveDate,
    pub limit: usize,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FindingsPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    links: Links,
}

impl FindingsPage {
    pub fn next(&self) -> Option<&str> {
        self.links.next.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct BitsightClient {
    http: Client,
    base_url: Url,
    api_token: String,
}

impl BitsightClient {
    pub fn new(config: BitsightConfig) -> Result<Self> {
        if config.api_token.is_empty() {
            return Err(Error::Config("Bitsight API token is empty".to_string()));
        }

        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| Error::Config(format!("Invalid base URL {}: {e}", config.base_url)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_token: config.api_token,
        })
    }

    /// Lists one page of the findings of `company_uuid`, oldest `last_seen` first.
    pub async fn list_findings(
        &self,
        company_uuid: &str,
        query: &FindingsQuery,
    ) -> Result<FindingsPage> {
        let url = self
            .base_url
            .join(&format!("ratings/v1/companies/{company_uuid}/findings"))
            .map_err(|e| Error::Config(format!("Invalid company {company_uuid}: {e}")))?;

        debug!(
            company_uuid,
            last_seen_gte = %query.last_seen_gte,
            offset = query.offset,
            "Listing Bitsight findings"
        );
        let response = self
            .http
            .get(url)
            .basic_auth(&self.api_token, Some(""))
            .query(&[
                ("last_seen_gte", query.last_seen_gte.format("%Y-%m-%d").to_string()),
                ("sort", "last_seen".to_string()),
                ("limit", query.limit.to_string()),
                ("offset", query.offset.to_string()),
            ])
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
}
