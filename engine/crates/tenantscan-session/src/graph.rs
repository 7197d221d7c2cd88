//! Directory-graph client used for the tenant secure score
//!
//! API endpoint used:
//! - GET {endpoint}/security/secureScores?$top=1

use crate::cli::CliSession;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenantscan_common::GraphConfig;
use tenantscan_core::{Error, Result};
use tracing::{debug, info};

const BACKEND: &str = "graph";

/// Latest secure score snapshot of the tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureScore {
    pub current_score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub created_date_time: Option<String>,
}

impl SecureScore {
    /// Human-readable summary used as the scan comment
    pub fn summary(&self) -> String {
        format!("Secure score: {} / {}", self.current_score, self.max_score)
    }
}

#[derive(Debug, Deserialize)]
struct SecureScoreList {
    value: Vec<SecureScore>,
}

/// Source of secure score snapshots. Implementations must be safe to call
/// concurrently; graph scans are not serialized.
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn secure_score(&self) -> Result<SecureScore>;
}

/// Graph client over HTTPS with a bearer token
pub struct HttpGraphClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl HttpGraphClient {
    pub fn new(config: &GraphConfig, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(format!("TenantScan/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Graph(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token: token.into(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl GraphClient for HttpGraphClient {
    async fn secure_score(&self) -> Result<SecureScore> {
        let res = self
            .http
            .get(self.api_url("/security/secureScores?$top=1"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Graph(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Graph(format!("API error ({}): {}", status, text)));
        }

        let body: SecureScoreList = res.json().await.map_err(|e| Error::Graph(e.to_string()))?;
        body.value
            .into_iter()
            .next()
            .ok_or_else(|| Error::Graph(String::from("no secure score available")))
    }
}

/// Handle on the graph backend
pub struct GraphSession {
    client: Option<Box<dyn GraphClient>>,
}

impl GraphSession {
    pub fn new(client: impl GraphClient + 'static) -> Self {
        Self {
            client: Some(Box::new(client)),
        }
    }

    /// A session whose client was never built
    pub fn disconnected() -> Self {
        Self { client: None }
    }

    /// Build the HTTP client with a token obtained through the CLI login
    pub async fn create_session(cli: &CliSession, config: &GraphConfig) -> Result<Self> {
        let token = cli
            .access_token(&config.resource)
            .await
            .map_err(|e| Error::SessionCreationFailed {
                backend: BACKEND,
                reason: format!("cannot obtain an access token: {}", e),
            })?;
        debug!("Obtained graph access token for {}", config.resource);

        let client = HttpGraphClient::new(config, token).map_err(|e| Error::SessionCreationFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        Ok(Self::new(client))
    }

    pub fn check_session(&self) -> Result<()> {
        match self.client {
            Some(_) => Ok(()),
            None => Err(Error::SessionCheckFailed {
                backend: BACKEND,
                reason: String::from("graph client not initialised"),
            }),
        }
    }

    pub async fn secure_score(&self) -> Result<SecureScore> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::Graph(String::from("graph client not initialised")))?;
        let score = client.secure_score().await?;
        info!("Secure score: {}/{}", score.current_score, score.max_score);
        Ok(score)
    }
}
