use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://admin.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Declares [ApplicationName] from its variants and their names in the API path.
macro_rules! applications {
    ($($variant:ident => $name:literal,)+) => {
        /// Applications exposing activity reports.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum ApplicationName {
            $($variant,)+
        }

        impl ApplicationName {
            pub const ALL: &'static [ApplicationName] = &[$(ApplicationName::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ApplicationName::$variant => $name,)+
                }
            }
        }
    };
}

applications! {
    AccessTransparency => "access_transparency",
    Admin => "admin",
    Calendar => "calendar",
    Chat => "chat",
    Drive => "drive",
    Gcp => "gcp",
    Gplus => "gplus",
    Groups => "groups",
    GroupsEnterprise => "groups_enterprise",
    Jamboard => "jamboard",
    Login => "login",
    Meet => "meet",
    Mobile => "mobile",
    Rules => "rules",
    Saml => "saml",
    Token => "token",
    UserAccounts => "user_accounts",
    ContextAwareAccess => "context_aware_access",
    Chrome => "chrome",
    DataStudio => "data_studio",
    Keep => "keep",
}

impl fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|app| app.as_str() == wanted)
            .ok_or_else(|| Error::Config(format!("Unknown reports application {s}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportsConfig {
    pub base_url: String,
    pub access_token: String,
    pub application: ApplicationName,
    pub timeout: Duration,
}

impl ReportsConfig {
    pub fn new(access_token: impl Into<String>, application: ApplicationName) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            application,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityQuery {
    pub start_time: DateTime<Utc>,
    pub max_results: usize,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesPage {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportsClient {
    http: Client,
    activities_url: Url,
    access_token: String,
    application: ApplicationName,
}

impl ReportsClient {
    pub fn new(config: ReportsConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(Error::Config("Reports access token is empty".to_string()));
        }

        let base = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| Error::Config(format!("Invalid base URL {}: {e}", config.base_url)))?;
        let activities_url = base
            .join(&format!(
                "admin/reports/v1/activity/users/all/applications/{}",
                config.application
            ))
            .map_err(|e| Error::Config(format!("Invalid activities URL: {e}")))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            activities_url,
            access_token: config.access_token,
            application: config.application,
        })
    }

    pub fn application(&self) -> ApplicationName {
        self.application
    }

    /// Lists one page of activities of all users for the configured application.
    pub async fn list_activities(&self, query: &ActivityQuery) -> Result<ActivitiesPage> {
        let mut request = self
            .http
            .get(self.activities_url.clone())
            .bearer_auth(&self.access_token)
            .query(&[
                ("maxResults", query.max_results.to_string()),
                (
                    "startTime",
                    query
                        .start_time
                        .to_rfc3339_opts(SecondsFormat::Micros, true),
                ),
            ]);
        if let Some(token) = &query.page_token {
            request = request.query(&[("pageToken", token)]);
        }

        debug!(
            application = %self.application,
            page_token = ?query.page_token,
            "Listing reports activities"
        );
        let response = request.send().await?;

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
