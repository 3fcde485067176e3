/// Local topic log - sqlite-backed append-only log for development
///
/// Implements both ledger interfaces so the service can run end to end
/// without network access. Sequence numbers start at 1 per topic; pages are
/// served newest first with `lt:<sequence>` continuation tokens.
use crate::{
    clock::Clock,
    ledger::{format_consensus_timestamp, Envelope, EventSubmitter, LedgerError, LogIndexer, LogPage, SubmitReceipt},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::debug;

const CONTINUATION_PREFIX: &str = "lt:";

/// sqlite-backed topic log
#[derive(Clone)]
pub struct LocalTopicLog {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl LocalTopicLog {
    /// Open (or create) the log database at `path` and run migrations
    pub async fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5)),
        )
        .await?;

        Self::with_pool(db, clock).await
    }

    /// In-memory log for tests; a single connection keeps one shared database
    pub async fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(db, clock).await
    }

    async fn with_pool(db: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .map_err(|e| LedgerError::Database(e.into()))?;

        Ok(Self { db, clock })
    }
}

fn parse_continuation(token: &str) -> Result<i64, LedgerError> {
    token
        .strip_prefix(CONTINUATION_PREFIX)
        .and_then(|seq| seq.parse().ok())
        .ok_or_else(|| LedgerError::Decode(format!("Invalid continuation token: {}", token)))
}

#[async_trait]
impl EventSubmitter for LocalTopicLog {
    async fn submit(&self, topic_id: &str, message: &str) -> Result<SubmitReceipt, LedgerError> {
        let consensus_timestamp = format_consensus_timestamp(self.clock.now_millis());

        let row = sqlx::query(
            r#"
            INSERT INTO topic_messages (topic_id, sequence_number, consensus_timestamp, message)
            SELECT ?1, COALESCE(MAX(sequence_number), 0) + 1, ?2, ?3
            FROM topic_messages
            WHERE topic_id = ?1
            RETURNING sequence_number
            "#,
        )
        .bind(topic_id)
        .bind(&consensus_timestamp)
        .bind(STANDARD.encode(message))
        .fetch_one(&self.db)
        .await?;

        let sequence_number: i64 = row.try_get("sequence_number")?;
        debug!(topic_id, sequence_number, "Appended message to local topic log");

        Ok(SubmitReceipt {
            topic_id: topic_id.to_string(),
            sequence_number: sequence_number as u64,
            transaction_id: None,
        })
    }
}

#[async_trait]
impl LogIndexer for LocalTopicLog {
    async fn fetch_page(
        &self,
        topic_id: &str,
        limit: u32,
        continuation: Option<&str>,
    ) -> Result<LogPage, LedgerError> {
        let before = match continuation {
            Some(token) => parse_continuation(token)?,
            None => i64::MAX,
        };

        // One extra row tells us whether an older page exists
        let rows = sqlx::query(
            r#"
            SELECT topic_id, sequence_number, consensus_timestamp, message
            FROM topic_messages
            WHERE topic_id = ?1 AND sequence_number < ?2
            ORDER BY sequence_number DESC
            LIMIT ?3
            "#,
        )
        .bind(topic_id)
        .bind(before)
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.db)
        .await?;

        let has_more = rows.len() > limit as usize;
        let mut messages = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.into_iter().take(limit as usize) {
            let sequence_number: i64 = row.try_get("sequence_number")?;
            messages.push(Envelope {
                topic_id: row.try_get("topic_id")?,
                sequence_number: sequence_number as u64,
                consensus_timestamp: row.try_get("consensus_timestamp")?,
                message: row.try_get("message")?,
            });
        }

        let next = match messages.last() {
            Some(last) if has_more => Some(format!("{}{}", CONTINUATION_PREFIX, last.sequence_number)),
            _ => None,
        };

        Ok(LogPage { messages, next })
    }
}
