/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{ServiceError, ServiceResult},
    metrics::track_http_metrics,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::Json,
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, time::Duration};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// How often idle rate-limit buckets are dropped
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the main application router
///
/// Every route is served at the root and again under `/api`.
pub fn build_router(ctx: AppContext) -> Router {
    let api = crate::api::routes(&ctx);

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn(track_http_metrics))
        .layer(DefaultBodyLimit::max(ctx.config.server.body_limit))
        .layer(cors_layer(&ctx.config.server.cors_origins))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> ServiceResult<()> {
    let addr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);

    info!("TrustMesh binding service listening on {}", addr);
    info!("   Identity topic: {}", ctx.config.ledger.topic_id);

    let rate_limiter = ctx.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter.retain_recent();
        }
    });

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // Peer addresses key the per-client rate limits
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| ServiceError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
