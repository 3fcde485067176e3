/// Configuration management for the TrustMesh binding service
use crate::{
    binding::JwtAssertionConfig,
    error::{ServiceError, ServiceResult},
    validation::is_hedera_account_id,
};
use jsonwebtoken::Algorithm;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Main service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub ledger: LedgerConfig,
    pub resolve: ResolveConfig,
    pub proofs: ProofConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub version: String,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    pub body_limit: usize,
}

/// Where binding events are written and read back from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    /// Relay submission + mirror-node reads
    Hedera,
    /// Local sqlite topic log (development)
    Local,
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hedera" => Ok(LedgerBackend::Hedera),
            "local" => Ok(LedgerBackend::Local),
            other => Err(format!("Unknown LEDGER_BACKEND: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HederaNetwork {
    Mainnet,
    Testnet,
    Previewnet,
}

impl HederaNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            HederaNetwork::Mainnet => "mainnet",
            HederaNetwork::Testnet => "testnet",
            HederaNetwork::Previewnet => "previewnet",
        }
    }

    /// Public mirror node for the network
    pub fn default_mirror_url(&self) -> &'static str {
        match self {
            HederaNetwork::Mainnet => "https://mainnet-public.mirrornode.hedera.com/api/v1",
            HederaNetwork::Testnet => "https://testnet.mirrornode.hedera.com/api/v1",
            HederaNetwork::Previewnet => "https://previewnet.mirrornode.hedera.com/api/v1",
        }
    }
}

impl FromStr for HederaNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(HederaNetwork::Mainnet),
            "testnet" => Ok(HederaNetwork::Testnet),
            "previewnet" => Ok(HederaNetwork::Previewnet),
            other => Err(format!("Unknown HEDERA_NETWORK: {}", other)),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub network: HederaNetwork,
    pub topic_id: String,
    pub operator_id: Option<String>,
    pub operator_key: Option<String>,
    pub mirror_node_url: String,
    pub submit_url: Option<String>,
    pub local_path: PathBuf,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(format!("Unknown CACHE_BACKEND: {}", other)),
        }
    }
}

/// Resolution scan and cache settings
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    pub max_pages: usize,
    pub page_size: u32,
    pub page_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub cache_backend: CacheBackend,
    pub redis_url: String,
}

/// Proof verification settings
#[derive(Debug, Clone, Default)]
pub struct ProofConfig {
    pub shared_secret: Option<String>,
    pub jwt: JwtAssertionConfig,
}

/// Per-minute request quotas
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub read_per_minute: u32,
    pub write_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_per_minute: 60,
            write_per_minute: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl ServiceConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> ServiceResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server = ServerSettings {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&var, "PORT", 3002)?,
            version: env!("CARGO_PKG_VERSION").to_string(),
            cors_origins: var("CORS_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            body_limit: 50 * 1024,
        };

        let network: HederaNetwork = parse_var(&var, "HEDERA_NETWORK", HederaNetwork::Testnet)?;
        let ledger = LedgerConfig {
            backend: parse_var(&var, "LEDGER_BACKEND", LedgerBackend::Hedera)?,
            network,
            topic_id: var("IDENTITY_TOPIC_ID")
                .ok_or_else(|| ServiceError::Config("IDENTITY_TOPIC_ID is required".to_string()))?,
            operator_id: var("HEDERA_OPERATOR_ID"),
            operator_key: var("HEDERA_OPERATOR_KEY"),
            mirror_node_url: var("MIRROR_NODE_URL")
                .unwrap_or_else(|| network.default_mirror_url().to_string()),
            submit_url: var("LEDGER_SUBMIT_URL"),
            local_path: var("LOCAL_LEDGER_PATH")
                .unwrap_or_else(|| "./data/topic_log.sqlite".to_string())
                .into(),
            request_timeout: Duration::from_millis(parse_var(&var, "LEDGER_REQUEST_TIMEOUT_MS", 10_000)?),
        };

        let resolve = ResolveConfig {
            max_pages: parse_var(&var, "RESOLVE_MAX_PAGES", 3)?,
            page_size: parse_var(&var, "RESOLVE_PAGE_SIZE", 100)?,
            page_timeout: Duration::from_millis(parse_var(&var, "RESOLVE_PAGE_TIMEOUT_MS", 2_500)?),
            cache_ttl: Duration::from_millis(parse_var(&var, "RESOLVE_CACHE_TTL_MS", 60_000)?),
            cache_capacity: parse_var(&var, "RESOLVE_CACHE_CAPACITY", 10_000)?,
            cache_backend: parse_var(&var, "CACHE_BACKEND", CacheBackend::Memory)?,
            redis_url: var("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
        };

        let algorithm = match var("MAGIC_JWT_ALGORITHM").as_deref() {
            None | Some("RS256") => Algorithm::RS256,
            Some("ES256") => Algorithm::ES256,
            Some("HS256") => Algorithm::HS256,
            Some(other) => {
                return Err(ServiceError::Config(format!(
                    "Unsupported MAGIC_JWT_ALGORITHM: {}",
                    other
                )))
            }
        };

        let proofs = ProofConfig {
            shared_secret: var("BINDING_SHARED_SECRET"),
            jwt: JwtAssertionConfig {
                enabled: parse_var(&var, "MAGIC_JWT_ENABLED", false)?,
                verification_key: var("MAGIC_PUBLIC_KEY"),
                algorithm,
                issuer: var("MAGIC_JWT_ISSUER"),
            },
        };

        let rate_limit = RateLimitConfig {
            read_per_minute: parse_var(&var, "RATE_LIMIT_READ_PER_MINUTE", 60)?,
            write_per_minute: parse_var(&var, "RATE_LIMIT_WRITE_PER_MINUTE", 10)?,
        };

        let logging = LoggingConfig {
            filter: var("RUST_LOG")
                .unwrap_or_else(|| "trustmesh_binding=info,tower_http=info".to_string()),
            format: match var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let config = Self {
            server,
            ledger,
            resolve,
            proofs,
            rate_limit,
            logging,
        };
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ServiceResult<()> {
        if !is_hedera_account_id(&self.ledger.topic_id) {
            return Err(ServiceError::Config(format!(
                "IDENTITY_TOPIC_ID must look like 0.0.N, got {}",
                self.ledger.topic_id
            )));
        }

        if self.ledger.backend == LedgerBackend::Hedera {
            for (name, value) in [
                ("HEDERA_OPERATOR_ID", &self.ledger.operator_id),
                ("HEDERA_OPERATOR_KEY", &self.ledger.operator_key),
                ("LEDGER_SUBMIT_URL", &self.ledger.submit_url),
            ] {
                if value.is_none() {
                    return Err(ServiceError::Config(format!(
                        "{} is required for the hedera ledger backend",
                        name
                    )));
                }
            }
        }

        if self.resolve.max_pages == 0 {
            return Err(ServiceError::Config("RESOLVE_MAX_PAGES must be at least 1".to_string()));
        }

        if self.resolve.page_size == 0 {
            return Err(ServiceError::Config("RESOLVE_PAGE_SIZE must be at least 1".to_string()));
        }

        if self.rate_limit.read_per_minute == 0 || self.rate_limit.write_per_minute == 0 {
            return Err(ServiceError::Config("Rate limits must be at least 1 per minute".to_string()));
        }

        Ok(())
    }
}

fn parse_var<T, V>(var: &V, key: &str, default: T) -> ServiceResult<T>
where
    T: FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ServiceError::Config(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}
