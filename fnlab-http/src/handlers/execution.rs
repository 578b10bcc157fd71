use axum::{
    Form,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
};
use fnlab_core::{ExecutionOutcome, scratch::RequestDir};
use tracing::debug;

use crate::error::AppError;
use crate::models::{ErrorResponse, TestForm, TestSubmission};
use crate::server::AppState;

/// Run transformed code
///
/// Accepts `multipart/form-data` or `application/x-www-form-urlencoded`.
/// Uploaded files are stored for the duration of the request and passed to
/// the function as their path.
#[utoipa::path(
    post,
    path = "/test",
    request_body(content = TestForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Function executed", body = ExecutionOutcome),
        (status = 400, description = "Invalid form or parameter value", body = ErrorResponse),
        (status = 500, description = "Execution failed", body = ErrorResponse)
    )
)]
pub async fn run_test(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ExecutionOutcome>, AppError> {
    let request_dir = state
        .scratch
        .request_dir()
        .map_err(|e| AppError::Internal(format!("Failed to create scratch directory: {e}")))?;
    let submission = read_submission(request, &request_dir).await?;
    debug!(fields = submission.values().len(), "received test submission");

    let outcome = state
        .workbench
        .run(submission.into_execution_request()?)
        .await?;
    // アップロードは実行完了後に削除される
    drop(request_dir);
    Ok(Json(outcome))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

async fn read_submission(
    request: Request,
    request_dir: &RequestDir,
) -> Result<TestSubmission, AppError> {
    let mut submission = TestSubmission::default();
    if !is_multipart(&request) {
        let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        for (name, value) in fields {
            submission.push(&name, value);
        }
        return Ok(submission);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let contents = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // ファイル未選択のフィールドは無視
                if file_name.is_empty() && contents.is_empty() {
                    continue;
                }
                let path = request_dir
                    .persist(&file_name, &contents)
                    .map_err(|e| AppError::Internal(format!("Failed to store upload: {e}")))?;
                debug!(field = %name, path = %path.display(), "stored upload");
                submission.push(&name, path.display().to_string());
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                submission.push(&name, text);
            }
        }
    }
    Ok(submission)
}
