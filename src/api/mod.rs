/// API routes and handlers
pub mod binding;
pub mod health;
pub mod resolve;

use crate::{
    context::AppContext,
    rate_limit::{read_rate_limit, write_rate_limit},
};
use axum::{middleware, Router};

/// Build the versioned API routes with their rate limits
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let reads = resolve::routes().route_layer(middleware::from_fn_with_state(
        ctx.clone(),
        read_rate_limit,
    ));
    let writes = binding::routes().route_layer(middleware::from_fn_with_state(
        ctx.clone(),
        write_rate_limit,
    ));

    Router::new()
        .merge(health::routes())
        .merge(reads)
        .merge(writes)
}
