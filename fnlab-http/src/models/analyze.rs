use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Session identifier returned by `/code`
    pub uid: String,

    /// Function to transform
    #[serde(rename = "functionName")]
    pub function_name: String,
}
