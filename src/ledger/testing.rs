/// Scripted ledger fakes shared by the unit tests
use crate::ledger::{Envelope, EventSubmitter, LedgerError, LogIndexer, LogPage, SubmitReceipt};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

/// Envelope carrying a binding event, shaped like the mirror node serves it
pub fn binding_envelope(topic_id: &str, world_id: &str, evm: &str, seq: u64) -> Envelope {
    let event = serde_json::json!({
        "type": "IDENTITY_BINDING",
        "worldId": world_id,
        "evmAddress": evm,
        "hederaAccountId": format!("0.0.{}", seq),
        "createdAt": 1000 + seq,
        "proofType": "sig"
    });
    raw_envelope(topic_id, seq, &event.to_string())
}

/// Envelope with an arbitrary payload
pub fn raw_envelope(topic_id: &str, seq: u64, payload: &str) -> Envelope {
    Envelope {
        topic_id: topic_id.to_string(),
        sequence_number: seq,
        consensus_timestamp: format!("{}.000", 1000 + seq),
        message: STANDARD.encode(payload),
    }
}

/// One scripted response
#[derive(Debug, Clone)]
pub enum Scripted {
    Page(LogPage),
    Fail,
    Hang,
}

impl Scripted {
    pub fn page(messages: Vec<Envelope>, next: Option<&str>) -> Self {
        Scripted::Page(LogPage {
            messages,
            next: next.map(str::to_string),
        })
    }
}

/// Indexer that replays a script; the last entry repeats once the script runs out
pub struct ScriptedIndexer {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    tokens: Mutex<Vec<Option<String>>>,
}

impl ScriptedIndexer {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    fn next_step(&self) -> Scripted {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Scripted::page(Vec::new(), None))
        }
    }
}

#[async_trait]
impl LogIndexer for ScriptedIndexer {
    async fn fetch_page(
        &self,
        _topic_id: &str,
        _limit: u32,
        continuation: Option<&str>,
    ) -> Result<LogPage, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(continuation.map(str::to_string));

        match self.next_step() {
            Scripted::Page(page) => Ok(page),
            Scripted::Fail => Err(LedgerError::Status {
                status: 503,
                body: "unavailable".to_string(),
            }),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(LogPage::default())
            }
        }
    }
}

/// Submitter that records messages and hands out increasing sequence numbers
pub struct RecordingSubmitter {
    pub messages: Mutex<Vec<(String, String)>>,
    next_seq: AtomicU64,
    fail: bool,
}

impl RecordingSubmitter {
    pub fn starting_at(seq: u64) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(seq),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::starting_at(1)
        }
    }

    pub fn submitted(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSubmitter for RecordingSubmitter {
    async fn submit(&self, topic_id: &str, message: &str) -> Result<SubmitReceipt, LedgerError> {
        if self.fail {
            return Err(LedgerError::Status {
                status: 500,
                body: "INSUFFICIENT_PAYER_BALANCE".to_string(),
            });
        }

        self.messages
            .lock()
            .unwrap()
            .push((topic_id.to_string(), message.to_string()));

        Ok(SubmitReceipt {
            topic_id: topic_id.to_string(),
            sequence_number: self.next_seq.fetch_add(1, Ordering::SeqCst),
            transaction_id: None,
        })
    }
}
