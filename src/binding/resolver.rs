/// Resolve coordinator - cached, bounded resolution of current bindings
use crate::{
    binding::{
        BindingId, BindingStatus, LogScanner, ResolutionStore, ResolveResult, ScanOutcome,
    },
    metrics,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_PAGES: usize = 3;

/// Answers "which account is bound to this world id and address"
///
/// Never fails: cache problems degrade to a scan, and an unreachable
/// indexer degrades to a not-found result.
pub struct ResolveCoordinator {
    store: Arc<dyn ResolutionStore>,
    scanner: LogScanner,
    max_pages: usize,
}

impl ResolveCoordinator {
    pub fn new(store: Arc<dyn ResolutionStore>, scanner: LogScanner, max_pages: usize) -> Self {
        Self {
            store,
            scanner,
            max_pages,
        }
    }

    pub async fn resolve(&self, world_id: &str, address: &str) -> ResolveResult {
        match self.store.get(world_id, address).await {
            Ok(Some(entry)) => {
                metrics::record_cache_access(true);
                debug!(world_id, address, "Resolution cache hit");
                // Entries are shared across address casings; echo the caller's
                let mut result = entry.result;
                result.evm = address.to_string();
                return result;
            }
            Ok(None) => metrics::record_cache_access(false),
            Err(e) => {
                metrics::record_cache_access(false);
                warn!(world_id, address, error = %e, "Resolution cache read failed");
            }
        }

        let result = match self.scanner.scan_for_match(world_id, address, self.max_pages).await {
            ScanOutcome::Found(found) => {
                let binding_event_id =
                    BindingId::new(found.envelope.topic_id.clone(), found.envelope.sequence_number);
                info!(
                    world_id,
                    address,
                    binding_event_id = %binding_event_id,
                    pages = found.pages.len(),
                    "Resolved binding"
                );
                ResolveResult {
                    world_id: world_id.to_string(),
                    evm: address.to_string(),
                    hedera_account_id: Some(found.record.hedera_account_id),
                    binding_event_id: Some(binding_event_id),
                    updated_at: found.envelope.consensus_millis(),
                }
            }
            ScanOutcome::NotFound(summary) => {
                info!(
                    world_id,
                    address,
                    pages = summary.pages_fetched,
                    degraded = summary.degraded_pages(),
                    exhausted = summary.exhausted,
                    "No binding found"
                );
                ResolveResult::not_found(world_id, address)
            }
        };

        metrics::record_resolution(result.is_bound());

        if let Err(e) = self.store.put(world_id, address, &result).await {
            warn!(world_id, address, error = %e, "Resolution cache write failed");
        }

        result
    }

    pub async fn status(&self, world_id: &str, address: &str) -> BindingStatus {
        BindingStatus::from_resolution(self.resolve(world_id, address).await)
    }
}
