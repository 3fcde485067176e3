/// Canonical binding event and its payload hash
///
/// Hash rule (version 1): `0x` + lowercase hex of SHA-256 over the compact
/// JSON encoding of the fields below, in this order, excluding `payloadHash`:
///
/// `type`, `worldId`, `evmAddress`, `hederaAccountId`, `createdAt`, `proofType`
///
/// `payloadHash` is appended last when the event is written to the topic.
use crate::binding::{BindRequest, ProofKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Discriminator carried by every binding event
pub const BINDING_EVENT_TYPE: &str = "IDENTITY_BINDING";

/// Version of the canonical hash encoding
pub const CANONICAL_HASH_VERSION: u32 = 1;

/// Immutable binding record appended to the identity topic
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    #[serde(rename = "type")]
    event_type: &'static str,
    world_id: String,
    evm_address: String,
    hedera_account_id: String,
    created_at: i64,
    proof_type: ProofKind,
    payload_hash: String,
}

/// Hashed portion of the event; field order is the canonical order
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    #[serde(rename = "type")]
    event_type: &'a str,
    world_id: &'a str,
    evm_address: &'a str,
    hedera_account_id: &'a str,
    created_at: i64,
    proof_type: ProofKind,
}

impl CanonicalEvent {
    /// Build the event for a verified request and seal it with its hash
    pub fn new(request: &BindRequest, created_at: i64) -> Result<Self, serde_json::Error> {
        let payload_hash = payload_hash(&HashedFields {
            event_type: BINDING_EVENT_TYPE,
            world_id: &request.world_id,
            evm_address: &request.evm_address,
            hedera_account_id: &request.hedera_account_id,
            created_at,
            proof_type: request.proof.kind,
        })?;

        Ok(Self {
            event_type: BINDING_EVENT_TYPE,
            world_id: request.world_id.clone(),
            evm_address: request.evm_address.clone(),
            hedera_account_id: request.hedera_account_id.clone(),
            created_at,
            proof_type: request.proof.kind,
            payload_hash,
        })
    }

    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    pub fn evm_address(&self) -> &str {
        &self.evm_address
    }

    pub fn hedera_account_id(&self) -> &str {
        &self.hedera_account_id
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn proof_type(&self) -> ProofKind {
        self.proof_type
    }

    pub fn payload_hash(&self) -> &str {
        &self.payload_hash
    }

    /// Wire form written to the topic
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn payload_hash(fields: &HashedFields<'_>) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(fields)?;
    Ok(format!("0x{}", hex::encode(Sha256::digest(&bytes))))
}

/// Binding event as read back from the topic
///
/// Lenient on the optional fields so that records written by other
/// producers still resolve.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    pub world_id: String,
    pub evm_address: String,
    pub hedera_account_id: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub proof_type: Option<String>,
    #[serde(default)]
    pub payload_hash: Option<String>,
}

impl BindingRecord {
    /// Decode a base64 topic payload into a binding record
    ///
    /// Returns `None` for anything that is not a well-formed binding event.
    pub fn decode(message_b64: &str) -> Option<Self> {
        let bytes = STANDARD.decode(message_b64.trim()).ok()?;
        let record: BindingRecord = serde_json::from_slice(&bytes).ok()?;
        (record.event_type == BINDING_EVENT_TYPE).then_some(record)
    }

    pub fn matches(&self, world_id: &str, evm_address: &str) -> bool {
        self.world_id == world_id && self.evm_address.eq_ignore_ascii_case(evm_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Proof;

    fn request() -> BindRequest {
        BindRequest {
            world_id: "world-1".to_string(),
            evm_address: "0x52908400098527886E0F7030069857D2E4169EE7".to_string(),
            hedera_account_id: "0.0.1234".to_string(),
            proof: Proof {
                kind: ProofKind::Signature,
                value: "0xdead".to_string(),
            },
        }
    }

    #[test]
    fn test_canonical_field_order() {
        let event = CanonicalEvent::new(&request(), 1_700_000_000_000).unwrap();
        let message = event.to_message().unwrap();
        let expected_prefix = concat!(
            r#"{"type":"IDENTITY_BINDING","worldId":"world-1","#,
            r#""evmAddress":"0x52908400098527886E0F7030069857D2E4169EE7","#,
            r#""hederaAccountId":"0.0.1234","createdAt":1700000000000,"#,
            r#""proofType":"signature","payloadHash":"0x"#
        );
        assert!(message.starts_with(expected_prefix), "{}", message);
    }

    #[test]
    fn test_hash_covers_everything_but_itself() {
        let event = CanonicalEvent::new(&request(), 1_700_000_000_000).unwrap();
        let hashed = concat!(
            r#"{"type":"IDENTITY_BINDING","worldId":"world-1","#,
            r#""evmAddress":"0x52908400098527886E0F7030069857D2E4169EE7","#,
            r#""hederaAccountId":"0.0.1234","createdAt":1700000000000,"#,
            r#""proofType":"signature"}"#
        );
        let expected = format!("0x{}", hex::encode(Sha256::digest(hashed.as_bytes())));
        assert_eq!(event.payload_hash(), expected);
        assert_eq!(event.payload_hash().len(), 66);
    }

    #[test]
    fn test_hash_is_deterministic_and_field_sensitive() {
        let a = CanonicalEvent::new(&request(), 42).unwrap();
        let b = CanonicalEvent::new(&request(), 42).unwrap();
        assert_eq!(a.payload_hash(), b.payload_hash());

        let later = CanonicalEvent::new(&request(), 43).unwrap();
        assert_ne!(a.payload_hash(), later.payload_hash());

        let mut other_world = request();
        other_world.world_id = "world-2".to_string();
        let c = CanonicalEvent::new(&other_world, 42).unwrap();
        assert_ne!(a.payload_hash(), c.payload_hash());
    }

    #[test]
    fn test_written_event_decodes_as_record() {
        let event = CanonicalEvent::new(&request(), 42).unwrap();
        let encoded = STANDARD.encode(event.to_message().unwrap());
        let record = BindingRecord::decode(&encoded).unwrap();
        assert_eq!(record.hedera_account_id, "0.0.1234");
        assert_eq!(record.proof_type.as_deref(), Some("signature"));
        assert_eq!(record.payload_hash.as_deref(), Some(event.payload_hash()));
        assert!(record.matches("world-1", "0x52908400098527886e0f7030069857d2e4169ee7"));
        assert!(!record.matches("World-1", "0x52908400098527886E0F7030069857D2E4169EE7"));
    }

    #[test]
    fn test_decode_skips_foreign_and_malformed_payloads() {
        assert!(BindingRecord::decode("not base64!!").is_none());
        assert!(BindingRecord::decode(&STANDARD.encode("{not json")).is_none());

        let other = serde_json::json!({
            "type": "PROFILE_UPDATE",
            "worldId": "world-1",
            "evmAddress": "0x1",
            "hederaAccountId": "0.0.1"
        });
        assert!(BindingRecord::decode(&STANDARD.encode(other.to_string())).is_none());

        let missing_fields = serde_json::json!({ "type": "IDENTITY_BINDING" });
        assert!(BindingRecord::decode(&STANDARD.encode(missing_fields.to_string())).is_none());
    }
}
