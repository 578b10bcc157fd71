use fnlab_core::{ExecutionOutcome, FrontendType, InputSpec, TransformResult, ValueType};
use utoipa::OpenApi;

use crate::handlers::{analyze, code, execution, system};
use crate::models::{AnalyzeRequest, ErrorResponse, SubmitCodeRequest, SubmitCodeResponse, TestForm};

#[derive(OpenApi)]
#[openapi(
    info(title = "fnlab", description = "Isolate, rewrite and run Python functions"),
    paths(
        code::submit_code,
        analyze::analyze_function,
        execution::run_test,
        system::health_check
    ),
    components(schemas(
        SubmitCodeRequest,
        SubmitCodeResponse,
        AnalyzeRequest,
        TransformResult,
        InputSpec,
        ValueType,
        FrontendType,
        TestForm,
        ExecutionOutcome,
        ErrorResponse
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/code", "/analyze", "/test", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
