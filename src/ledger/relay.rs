/// Submit relay client
///
/// Hedera transaction construction and signing live in an external relay;
/// this client hands it the serialized event and reads back the sequence
/// number assigned by consensus.
use crate::ledger::{EventSubmitter, LedgerError, SubmitReceipt};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Relay client configuration
#[derive(Debug, Clone)]
pub struct RelaySubmitterConfig {
    pub submit_url: String,
    pub operator_id: String,
    pub operator_key: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SubmitBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    topic_sequence_number: SequenceNumber,
    #[serde(default)]
    transaction_id: Option<String>,
}

/// Receipts report the sequence number either as a number or a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SequenceNumber {
    Number(u64),
    Text(String),
}

impl SequenceNumber {
    fn value(&self) -> Result<u64, LedgerError> {
        match self {
            SequenceNumber::Number(n) => Ok(*n),
            SequenceNumber::Text(s) => s
                .parse()
                .map_err(|_| LedgerError::Decode(format!("Invalid sequence number: {}", s))),
        }
    }
}

/// HTTP client for the submit relay
#[derive(Clone)]
pub struct RelaySubmitter {
    http_client: reqwest::Client,
    config: RelaySubmitterConfig,
}

impl RelaySubmitter {
    pub fn new(config: RelaySubmitterConfig) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl EventSubmitter for RelaySubmitter {
    async fn submit(&self, topic_id: &str, message: &str) -> Result<SubmitReceipt, LedgerError> {
        let url = format!(
            "{}/topics/{}/messages",
            self.config.submit_url.trim_end_matches('/'),
            topic_id
        );

        let response = self
            .http_client
            .post(&url)
            .header("X-Operator-Id", &self.config.operator_id)
            .bearer_auth(&self.config.operator_key)
            .json(&SubmitBody {
                message: STANDARD.encode(message),
            })
            .send()
            .await
            .map_err(|e| {
                error!(topic_id, error = %e, "Failed to submit to topic");
                LedgerError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(topic_id, status = status.as_u16(), "Submit relay rejected message");
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let receipt: SubmitResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("Invalid submit receipt: {}", e)))?;
        let sequence_number = receipt.topic_sequence_number.value()?;

        info!(topic_id, sequence_number, tx = ?receipt.transaction_id, "Message reached consensus");

        Ok(SubmitReceipt {
            topic_id: topic_id.to_string(),
            sequence_number,
            transaction_id: receipt.transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submitter(server: &MockServer) -> RelaySubmitter {
        RelaySubmitter::new(RelaySubmitterConfig {
            submit_url: server.uri(),
            operator_id: "0.0.2".to_string(),
            operator_key: "operator-key".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_sequence_number() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/topics/0.0.999/messages"))
            .and(header("X-Operator-Id", "0.0.2"))
            .and(header("Authorization", "Bearer operator-key"))
            .and(body_json(serde_json::json!({ "message": STANDARD.encode("{}") })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "topicSequenceNumber": "17",
                "transactionId": "0.0.2@1700000000.000000000"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = submitter(&server).submit("0.0.999", "{}").await.unwrap();
        assert_eq!(receipt.topic_id, "0.0.999");
        assert_eq!(receipt.sequence_number, 17);
        assert_eq!(receipt.transaction_id.as_deref(), Some("0.0.2@1700000000.000000000"));
    }

    #[tokio::test]
    async fn test_numeric_sequence_number() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "topicSequenceNumber": 3
            })))
            .mount(&server)
            .await;

        let receipt = submitter(&server).submit("0.0.999", "{}").await.unwrap();
        assert_eq!(receipt.sequence_number, 3);
        assert!(receipt.transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_relay_failure_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("INSUFFICIENT_PAYER_BALANCE"))
            .mount(&server)
            .await;

        let err = submitter(&server).submit("0.0.999", "{}").await.unwrap_err();
        assert!(matches!(err, LedgerError::Status { status: 500, .. }));
    }
}
