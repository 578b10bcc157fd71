use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use fnlab_core::TransformResult;

use crate::error::AppError;
use crate::models::{AnalyzeRequest, ErrorResponse};
use crate::server::AppState;

/// Transform a function
///
/// Rewrites one function of a session into a callable form and describes its
/// parameters. Falls back to the original function when the transformation
/// cannot be used.
#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Function transformed", body = TransformResult),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 404, description = "Unknown session or function", body = ErrorResponse)
    )
)]
pub async fn analyze_function(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<TransformResult>, AppError> {
    let Json(payload) = payload?;
    let result = state
        .workbench
        .analyze(&payload.uid, &payload.function_name)
        .await?;
    Ok(Json(result))
}
