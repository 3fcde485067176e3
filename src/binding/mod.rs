/// Identity binding core
///
/// Binds a world id to an EVM address and a Hedera account by appending an
/// immutable event to the identity topic, and resolves the current binding
/// by scanning that topic newest-first.

pub mod cache;
pub mod coordinator;
pub mod event;
pub mod proof;
pub mod resolver;
pub mod scanner;

pub use cache::{CacheEntry, CacheError, InMemoryResolutionCache, RedisResolutionStore, ResolutionStore};
pub use coordinator::BindingCoordinator;
pub use event::{CanonicalEvent, BINDING_EVENT_TYPE};
pub use proof::{JwtAssertionConfig, ProofVerifier, VerificationOutcome};
pub use resolver::ResolveCoordinator;
pub use scanner::{LogScanner, PageStatus, ScanOutcome};

use crate::{
    ledger::LedgerError,
    validation::{validate_evm_address, validate_hedera_account_id},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;
use validator::Validate;

/// Proof scheme used to demonstrate control of the claimed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    #[serde(alias = "magic_jwt")]
    JwtAssertion,
    #[serde(alias = "sig")]
    Signature,
    #[serde(alias = "otp_attestation")]
    SharedSecret,
}

impl ProofKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofKind::JwtAssertion => "jwt_assertion",
            ProofKind::Signature => "signature",
            ProofKind::SharedSecret => "shared_secret",
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied proof of control
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Proof {
    #[serde(rename = "type")]
    pub kind: ProofKind,
    #[validate(length(min = 1))]
    pub value: String,
}

/// Bind request body
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BindRequest {
    #[validate(length(min = 1))]
    pub world_id: String,
    #[validate(custom(function = "validate_evm_address"))]
    pub evm_address: String,
    #[validate(custom(function = "validate_hedera_account_id"))]
    pub hedera_account_id: String,
    #[validate(nested)]
    pub proof: Proof,
}

/// Position of a binding event in the topic log: `<topicId>:<sequenceNumber>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingId {
    pub topic_id: String,
    pub sequence_number: u64,
}

impl BindingId {
    pub fn new(topic_id: impl Into<String>, sequence_number: u64) -> Self {
        Self {
            topic_id: topic_id.into(),
            sequence_number,
        }
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic_id, self.sequence_number)
    }
}

impl FromStr for BindingId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (topic_id, seq) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("Invalid binding id: {}", s))?;
        if topic_id.is_empty() {
            return Err(format!("Invalid binding id: {}", s));
        }
        let sequence_number = seq
            .parse()
            .map_err(|_| format!("Invalid sequence number in binding id: {}", s))?;
        Ok(Self::new(topic_id, sequence_number))
    }
}

impl Serialize for BindingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BindingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Successful bind response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindReceipt {
    pub ok: bool,
    pub binding_event_id: BindingId,
    pub world_id: String,
    pub evm_address: String,
    pub hedera_account_id: String,
}

/// Current binding for a (world id, address) pair
///
/// `hedera_account_id == None` means no binding was found, which is a
/// regular outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResult {
    pub world_id: String,
    pub evm: String,
    pub hedera_account_id: Option<String>,
    pub binding_event_id: Option<BindingId>,
    /// Consensus time of the matched event, epoch millis
    pub updated_at: Option<i64>,
}

impl ResolveResult {
    pub fn not_found(world_id: &str, evm: &str) -> Self {
        Self {
            world_id: world_id.to_string(),
            evm: evm.to_string(),
            hedera_account_id: None,
            binding_event_id: None,
            updated_at: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.hedera_account_id.is_some()
    }
}

/// Boolean view over a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingStatus {
    pub world_id: String,
    pub a: String,
    pub is_bound: bool,
    pub binding_event_id: Option<BindingId>,
}

impl BindingStatus {
    pub fn from_resolution(result: ResolveResult) -> Self {
        Self {
            is_bound: result.is_bound(),
            world_id: result.world_id,
            a: result.evm,
            binding_event_id: result.binding_event_id,
        }
    }
}

/// Bind failures, each a distinct kind the HTTP layer maps to its own status
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Invalid proof")]
    Unauthorized,

    #[error("{0} proof type is disabled")]
    CapabilityDisabled(ProofKind),

    #[error("Topic submission failed: {0}")]
    Submission(#[from] LedgerError),

    #[error("Failed to encode binding event: {0}")]
    Encoding(#[from] serde_json::Error),
}
