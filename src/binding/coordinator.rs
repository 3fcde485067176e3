/// Binding coordinator - verify, seal, submit
use crate::{
    binding::{
        BindError, BindReceipt, BindRequest, BindingId, CanonicalEvent, ProofVerifier,
        VerificationOutcome,
    },
    clock::Clock,
    ledger::EventSubmitter,
    metrics,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Turns verified bind requests into binding events on the identity topic
///
/// Concurrent binds for the same pair are not deduplicated; each appends its
/// own event and the newest one wins at resolution time.
pub struct BindingCoordinator {
    verifier: ProofVerifier,
    submitter: Arc<dyn EventSubmitter>,
    clock: Arc<dyn Clock>,
    topic_id: String,
}

impl BindingCoordinator {
    pub fn new(
        verifier: ProofVerifier,
        submitter: Arc<dyn EventSubmitter>,
        clock: Arc<dyn Clock>,
        topic_id: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            submitter,
            clock,
            topic_id: topic_id.into(),
        }
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    /// Bind the request's world id, address and account
    ///
    /// Submission failures are returned as-is; retries belong to the
    /// transport.
    pub async fn bind(&self, request: &BindRequest) -> Result<BindReceipt, BindError> {
        let proof_type = request.proof.kind.as_str();

        match self.verifier.verify(request) {
            VerificationOutcome::Verified => {}
            VerificationOutcome::Rejected => {
                warn!(world_id = %request.world_id, proof_type, "Bind rejected: invalid proof");
                metrics::record_bind(proof_type, "unauthorized");
                return Err(BindError::Unauthorized);
            }
            VerificationOutcome::Disabled(kind) => {
                metrics::record_bind(proof_type, "disabled");
                return Err(BindError::CapabilityDisabled(kind));
            }
        }

        let event = CanonicalEvent::new(request, self.clock.now_millis())?;
        let message = event.to_message()?;

        let receipt = match self.submitter.submit(&self.topic_id, &message).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(world_id = %request.world_id, topic_id = %self.topic_id, error = %e, "Binding submission failed");
                metrics::record_bind(proof_type, "submission_failed");
                return Err(BindError::Submission(e));
            }
        };

        let binding_event_id = BindingId::new(receipt.topic_id, receipt.sequence_number);

        info!(
            world_id = %request.world_id,
            evm = %request.evm_address,
            binding_event_id = %binding_event_id,
            payload_hash = %event.payload_hash(),
            tx = ?receipt.transaction_id,
            "Binding submitted"
        );
        metrics::record_bind(proof_type, "accepted");

        Ok(BindReceipt {
            ok: true,
            binding_event_id,
            world_id: request.world_id.clone(),
            evm_address: request.evm_address.clone(),
            hedera_account_id: request.hedera_account_id.clone(),
        })
    }
}
