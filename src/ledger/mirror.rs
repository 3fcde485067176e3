/// Mirror node client - paginated topic reads over the Hedera REST API
use crate::ledger::{Envelope, LedgerError, LogIndexer, LogPage};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Mirror node client configuration
#[derive(Debug, Clone)]
pub struct MirrorNodeConfig {
    /// Base URL including the API version, e.g. `https://testnet.mirrornode.hedera.com/api/v1`
    pub base_url: String,
    /// User-Agent header for HTTP requests
    pub user_agent: String,
    /// Transport-level timeout; the scanner applies its own per-page bound
    pub request_timeout: Duration,
}

impl Default for MirrorNodeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://testnet.mirrornode.hedera.com/api/v1".to_string(),
            user_agent: concat!("trustmesh-binding/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// `GET /topics/{id}/messages` response body
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<MirrorMessage>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct MirrorMessage {
    consensus_timestamp: String,
    #[serde(default)]
    topic_id: Option<String>,
    sequence_number: u64,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

/// Mirror node REST client
#[derive(Clone)]
pub struct MirrorNodeClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl MirrorNodeClient {
    /// Create a new mirror node client
    pub fn new(config: MirrorNodeConfig) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        // A trailing slash keeps the version segment when joining relative paths
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| LedgerError::Decode(format!("Invalid mirror node URL {}: {}", base, e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn page_url(&self, topic_id: &str, limit: u32, continuation: Option<&str>) -> Result<Url, LedgerError> {
        let joined = match continuation {
            // `links.next` is a server-relative path with its own query string
            Some(next) => self.base_url.join(next),
            None => self
                .base_url
                .join(&format!("topics/{}/messages?limit={}&order=desc", topic_id, limit)),
        };

        joined.map_err(|e| LedgerError::Decode(format!("Invalid page URL: {}", e)))
    }
}

#[async_trait]
impl LogIndexer for MirrorNodeClient {
    async fn fetch_page(
        &self,
        topic_id: &str,
        limit: u32,
        continuation: Option<&str>,
    ) -> Result<LogPage, LedgerError> {
        let url = self.page_url(topic_id, limit, continuation)?;
        debug!(%url, "Fetching mirror node page");

        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("Invalid mirror node page: {}", e)))?;

        let messages = body
            .messages
            .into_iter()
            .map(|m| Envelope {
                topic_id: m.topic_id.unwrap_or_else(|| topic_id.to_string()),
                sequence_number: m.sequence_number,
                consensus_timestamp: m.consensus_timestamp,
                message: m.message,
            })
            .collect();

        Ok(LogPage {
            messages,
            next: body.links.next.filter(|n| !n.is_empty()),
        })
    }
}
