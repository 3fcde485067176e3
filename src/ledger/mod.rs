/// Ledger collaborators
///
/// The binding core talks to the consensus topic through two narrow
/// interfaces: an `EventSubmitter` for appends and a `LogIndexer` for
/// newest-first paginated reads.

pub mod local;
pub mod mirror;
pub mod relay;

#[cfg(test)]
pub(crate) mod testing;

pub use local::LocalTopicLog;
pub use mirror::{MirrorNodeClient, MirrorNodeConfig};
pub use relay::{RelaySubmitter, RelaySubmitterConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger transport errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ledger service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid ledger response: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Position assigned to an appended message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub topic_id: String,
    pub sequence_number: u64,
    pub transaction_id: Option<String>,
}

/// One message as served by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic_id: String,
    pub sequence_number: u64,
    /// `<seconds>.<nanoseconds>` since the epoch
    pub consensus_timestamp: String,
    /// Base64-encoded payload
    pub message: String,
}

impl Envelope {
    /// Consensus time in epoch milliseconds
    pub fn consensus_millis(&self) -> Option<i64> {
        parse_consensus_timestamp(&self.consensus_timestamp)
    }
}

/// One page of messages, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    pub messages: Vec<Envelope>,
    /// Continuation token for the next (older) page
    pub next: Option<String>,
}

/// Appends serialized events to a topic
#[async_trait]
pub trait EventSubmitter: Send + Sync {
    async fn submit(&self, topic_id: &str, message: &str) -> Result<SubmitReceipt, LedgerError>;
}

/// Serves newest-first pages of a topic
#[async_trait]
pub trait LogIndexer: Send + Sync {
    async fn fetch_page(
        &self,
        topic_id: &str,
        limit: u32,
        continuation: Option<&str>,
    ) -> Result<LogPage, LedgerError>;
}

/// Parse a `<seconds>.<nanoseconds>` consensus timestamp into epoch millis
pub fn parse_consensus_timestamp(value: &str) -> Option<i64> {
    let (secs, nanos) = match value.split_once('.') {
        Some((secs, nanos)) => (secs, nanos),
        None => (value, "0"),
    };
    let secs: i64 = secs.parse().ok()?;
    if nanos.is_empty() || !nanos.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // Right-pad to nanoseconds, keep millisecond precision
    let millis: i64 = format!("{:0<9}", nanos).get(..3)?.parse().ok()?;
    secs.checked_mul(1000)?.checked_add(millis)
}

/// Format epoch millis as a consensus timestamp
pub fn format_consensus_timestamp(millis: i64) -> String {
    format!(
        "{}.{:09}",
        millis.div_euclid(1000),
        millis.rem_euclid(1000) * 1_000_000
    )
}
