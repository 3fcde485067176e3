/// TrustMesh binding service
///
/// Binds a world id to an EVM address and a Hedera account by appending
/// hashed events to a consensus topic, and resolves current bindings by
/// scanning that topic through a mirror node.

pub mod api;
pub mod binding;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod validation;

pub use context::AppContext;
pub use error::{ServiceError, ServiceResult};
