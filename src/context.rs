/// Application context and dependency injection
use crate::{
    binding::{
        BindingCoordinator, InMemoryResolutionCache, LogScanner, ProofVerifier,
        RedisResolutionStore, ResolutionStore, ResolveCoordinator,
    },
    clock::{Clock, SystemClock},
    config::{CacheBackend, LedgerBackend, ServiceConfig},
    error::{ServiceError, ServiceResult},
    ledger::{
        EventSubmitter, LocalTopicLog, LogIndexer, MirrorNodeClient, MirrorNodeConfig,
        RelaySubmitter, RelaySubmitterConfig,
    },
    rate_limit::RateLimiter,
};
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServiceConfig>,
    pub binding: Arc<BindingCoordinator>,
    pub resolver: Arc<ResolveCoordinator>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServiceConfig) -> ServiceResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (submitter, indexer): (Arc<dyn EventSubmitter>, Arc<dyn LogIndexer>) =
            match config.ledger.backend {
                LedgerBackend::Hedera => {
                    info!(
                        network = config.ledger.network.as_str(),
                        mirror = %config.ledger.mirror_node_url,
                        "Using Hedera ledger backend"
                    );
                    let relay = RelaySubmitter::new(RelaySubmitterConfig {
                        submit_url: required(&config.ledger.submit_url, "LEDGER_SUBMIT_URL")?,
                        operator_id: required(&config.ledger.operator_id, "HEDERA_OPERATOR_ID")?,
                        operator_key: required(&config.ledger.operator_key, "HEDERA_OPERATOR_KEY")?,
                        request_timeout: config.ledger.request_timeout,
                    })
                    .map_err(|e| ServiceError::Config(format!("Relay client: {}", e)))?;

                    let mirror = MirrorNodeClient::new(MirrorNodeConfig {
                        base_url: config.ledger.mirror_node_url.clone(),
                        request_timeout: config.ledger.request_timeout,
                        ..MirrorNodeConfig::default()
                    })
                    .map_err(|e| ServiceError::Config(format!("Mirror node client: {}", e)))?;

                    let submitter: Arc<dyn EventSubmitter> = Arc::new(relay);
                    let indexer: Arc<dyn LogIndexer> = Arc::new(mirror);
                    (submitter, indexer)
                }
                LedgerBackend::Local => {
                    info!(path = %config.ledger.local_path.display(), "Using local topic log");
                    let log = Arc::new(
                        LocalTopicLog::open(&config.ledger.local_path, clock.clone())
                            .await
                            .map_err(|e| ServiceError::Internal(format!("Local topic log: {}", e)))?,
                    );
                    let submitter: Arc<dyn EventSubmitter> = log.clone();
                    let indexer: Arc<dyn LogIndexer> = log;
                    (submitter, indexer)
                }
            };

        let store: Arc<dyn ResolutionStore> = match config.resolve.cache_backend {
            CacheBackend::Memory => Arc::new(InMemoryResolutionCache::new(
                config.resolve.cache_ttl,
                config.resolve.cache_capacity,
                clock.clone(),
            )),
            CacheBackend::Redis => Arc::new(
                RedisResolutionStore::connect(&config.resolve.redis_url, config.resolve.cache_ttl, clock.clone())
                    .await
                    .map_err(|e| ServiceError::Internal(format!("Redis connection failed: {}", e)))?,
            ),
        };

        Ok(Self::from_parts(config, submitter, indexer, store, clock))
    }

    /// Assemble the context from already-built collaborators
    pub fn from_parts(
        config: ServiceConfig,
        submitter: Arc<dyn EventSubmitter>,
        indexer: Arc<dyn LogIndexer>,
        store: Arc<dyn ResolutionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let topic_id = config.ledger.topic_id.clone();

        let verifier = ProofVerifier::new(config.proofs.shared_secret.clone(), config.proofs.jwt.clone());
        let binding = BindingCoordinator::new(verifier, submitter, clock, topic_id.clone());

        let scanner = LogScanner::new(indexer, topic_id)
            .with_page_size(config.resolve.page_size)
            .with_page_timeout(config.resolve.page_timeout);
        let resolver = ResolveCoordinator::new(store, scanner, config.resolve.max_pages);

        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Self {
            config: Arc::new(config),
            binding: Arc::new(binding),
            resolver: Arc::new(resolver),
            rate_limiter: Arc::new(rate_limiter),
        }
    }
}

fn required(value: &Option<String>, name: &str) -> ServiceResult<String> {
    value
        .clone()
        .ok_or_else(|| ServiceError::Config(format!("{} is required", name)))
}
