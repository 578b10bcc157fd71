use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmitCodeRequest {
    /// Python source text
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmitCodeResponse {
    /// Session identifier to use with `/analyze`
    pub uid: String,

    /// Top-level function names in declaration order
    #[serde(rename = "functionNames")]
    pub function_names: Vec<String>,
}
