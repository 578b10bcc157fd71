use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};

use crate::error::AppError;
use crate::models::{ErrorResponse, SubmitCodeRequest, SubmitCodeResponse};
use crate::server::AppState;

/// Submit source code
///
/// Splits the code into top-level elements and opens a session for it.
#[utoipa::path(
    post,
    path = "/code",
    request_body = SubmitCodeRequest,
    responses(
        (status = 200, description = "Code decomposed", body = SubmitCodeResponse),
        (status = 400, description = "Syntax error or malformed body", body = ErrorResponse)
    )
)]
pub async fn submit_code(
    State(state): State<AppState>,
    payload: Result<Json<SubmitCodeRequest>, JsonRejection>,
) -> Result<Json<SubmitCodeResponse>, AppError> {
    let Json(payload) = payload?;
    let session = state.workbench.submit(&payload.code)?;
    Ok(Json(SubmitCodeResponse {
        uid: session.id.clone(),
        function_names: session.elements.function_names(),
    }))
}
