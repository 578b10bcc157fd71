pub mod swagger;

use axum::{
    Router,
    routing::{get, post},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{analyze, code, execution, system};
use crate::server::AppState;
use swagger::ApiDoc;

/// Create the main API router with state
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(system::health_check))
        .route("/code", post(code::submit_code))
        .route("/analyze", post(analyze::analyze_function))
        .route("/test", post(execution::run_test))
}
