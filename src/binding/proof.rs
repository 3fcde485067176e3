/// Proof-of-control verification
///
/// Three schemes are supported:
/// - `signature`: EIP-191 `personal_sign` over the canonical binding message,
///   checked by recovering the signer address (secp256k1).
/// - `shared_secret`: exact match against a provisioned secret.
/// - `jwt_assertion`: a signed JWT naming the claimed address, behind a
///   capability flag.
use crate::binding::{BindRequest, ProofKind};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

/// Result of checking a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Rejected,
    /// The proof kind needs a capability that is switched off
    Disabled(ProofKind),
}

/// JWT assertion settings
#[derive(Debug, Clone)]
pub struct JwtAssertionConfig {
    pub enabled: bool,
    /// PEM public key for RS*/ES*/EdDSA, or the shared secret for HS*
    pub verification_key: Option<String>,
    pub algorithm: Algorithm,
    pub issuer: Option<String>,
}

impl Default for JwtAssertionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verification_key: None,
            algorithm: Algorithm::RS256,
            issuer: None,
        }
    }
}

#[derive(Error, Debug)]
enum ProofError {
    #[error("signature is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("signature must be 65 bytes, got {0}")]
    Length(usize),

    #[error("invalid recovery byte {0}")]
    RecoveryByte(u8),

    #[error("signature recovery failed: {0}")]
    Recovery(#[from] k256::ecdsa::Error),

    #[error("jwt rejected: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("no jwt verification key configured")]
    MissingKey,
}

/// Verifies proofs of control for bind requests
#[derive(Debug, Clone)]
pub struct ProofVerifier {
    shared_secret: Option<String>,
    jwt: JwtAssertionConfig,
}

impl ProofVerifier {
    pub fn new(shared_secret: Option<String>, jwt: JwtAssertionConfig) -> Self {
        Self {
            shared_secret: shared_secret.filter(|s| !s.is_empty()),
            jwt,
        }
    }

    /// Check the request's proof; never fails, errors count as rejection
    pub fn verify(&self, request: &BindRequest) -> VerificationOutcome {
        let kind = request.proof.kind;
        let result = match kind {
            ProofKind::Signature => self.verify_signature(request),
            ProofKind::SharedSecret => Ok(self.verify_shared_secret(&request.proof.value)),
            ProofKind::JwtAssertion => {
                if !self.jwt.enabled {
                    return VerificationOutcome::Disabled(kind);
                }
                self.verify_jwt(request)
            }
        };

        match result {
            Ok(true) => VerificationOutcome::Verified,
            Ok(false) => {
                debug!(proof = %kind, world_id = %request.world_id, "Proof did not match claim");
                VerificationOutcome::Rejected
            }
            Err(e) => {
                warn!(proof = %kind, world_id = %request.world_id, error = %e, "Proof verification failed");
                VerificationOutcome::Rejected
            }
        }
    }

    fn verify_shared_secret(&self, value: &str) -> bool {
        match &self.shared_secret {
            Some(secret) => bool::from(value.as_bytes().ct_eq(secret.as_bytes())),
            None => {
                warn!("Binding shared secret not configured");
                false
            }
        }
    }

    fn verify_signature(&self, request: &BindRequest) -> Result<bool, ProofError> {
        let message = binding_message(
            &request.evm_address,
            &request.hedera_account_id,
            &request.world_id,
        );
        let recovered = recover_signer(&message, &request.proof.value)?;
        Ok(recovered.eq_ignore_ascii_case(&request.evm_address))
    }

    fn verify_jwt(&self, request: &BindRequest) -> Result<bool, ProofError> {
        let key = self
            .jwt
            .verification_key
            .as_deref()
            .ok_or(ProofError::MissingKey)?;

        let decoding_key = match self.jwt.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(key.as_bytes())
            }
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key.as_bytes())?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(key.as_bytes())?,
            _ => DecodingKey::from_rsa_pem(key.as_bytes())?,
        };

        let mut validation = Validation::new(self.jwt.algorithm);
        // Allow some clock skew
        validation.leeway = 60;
        if let Some(issuer) = &self.jwt.issuer {
            validation.set_issuer(&[issuer]);
        }

        let token = decode::<serde_json::Value>(&request.proof.value, &decoding_key, &validation)?;
        let claims = &token.claims;

        let subject = claims
            .get("publicAddress")
            .or_else(|| claims.get("sub"))
            .and_then(|v| v.as_str())
            .map(|s| s.strip_prefix("did:ethr:").unwrap_or(s));

        Ok(subject.is_some_and(|s| s.eq_ignore_ascii_case(&request.evm_address)))
    }
}

/// Message a wallet signs to prove control: `Bind <address> to <accountId> on <worldId>`
pub fn binding_message(evm_address: &str, hedera_account_id: &str, world_id: &str) -> String {
    format!("Bind {} to {} on {}", evm_address, hedera_account_id, world_id)
}

/// EIP-191 digest of a `personal_sign` message
pub fn eip191_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Lowercase `0x` address of a secp256k1 public key
pub fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the address that produced a 65-byte `r || s || v` signature
fn recover_signer(message: &str, signature_hex: &str) -> Result<String, ProofError> {
    let trimmed = signature_hex.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))?;
    if bytes.len() != 65 {
        return Err(ProofError::Length(bytes.len()));
    }

    let signature = Signature::from_slice(&bytes[..64])?;
    let v = bytes[64];
    let recovery_byte = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => return Err(ProofError::RecoveryByte(other)),
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or(ProofError::RecoveryByte(v))?;

    let digest = eip191_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)?;
    Ok(address_from_key(&key))
}
