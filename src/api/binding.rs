/// Bind endpoint
use crate::{
    binding::{BindReceipt, BindRequest},
    context::AppContext,
    error::{ServiceError, ServiceResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/v1/bind", post(bind))
}

/// POST /v1/bind
///
/// Verify the proof of control and append a binding event to the identity topic.
pub async fn bind(
    State(ctx): State<AppContext>,
    payload: Result<Json<BindRequest>, JsonRejection>,
) -> ServiceResult<Json<BindReceipt>> {
    let Json(request) = payload.map_err(|rejection| ServiceError::Validation {
        message: "Invalid input".to_string(),
        details: Some(serde_json::Value::String(rejection.body_text())),
    })?;

    request.validate()?;

    let receipt = ctx.binding.bind(&request).await?;

    Ok(Json(receipt))
}
