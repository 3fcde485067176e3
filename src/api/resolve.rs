/// Resolve and status endpoints
use crate::{
    binding::{BindingStatus, ResolveResult},
    context::AppContext,
    error::{ServiceError, ServiceResult},
    validation::required_param,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/v1/resolve", get(resolve))
        .route("/v1/status", get(status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveParams {
    pub world_id: Option<String>,
    pub evm: Option<String>,
}

/// GET /v1/resolve?worldId=&evm=
pub async fn resolve(
    State(ctx): State<AppContext>,
    Query(params): Query<ResolveParams>,
) -> ServiceResult<Json<ResolveResult>> {
    let (Some(world_id), Some(evm)) = (required_param(&params.world_id), required_param(&params.evm)) else {
        return Err(ServiceError::validation("Missing worldId or evm"));
    };

    Ok(Json(ctx.resolver.resolve(world_id, evm).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub world_id: Option<String>,
    pub a: Option<String>,
}

/// GET /v1/status?worldId=&a=
pub async fn status(
    State(ctx): State<AppContext>,
    Query(params): Query<StatusParams>,
) -> ServiceResult<Json<BindingStatus>> {
    let (Some(world_id), Some(a)) = (required_param(&params.world_id), required_param(&params.a)) else {
        return Err(ServiceError::validation("Missing parameters"));
    };

    Ok(Json(ctx.resolver.status(world_id, a).await))
}
