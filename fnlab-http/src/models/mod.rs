pub mod analyze;
pub mod code;
pub mod execution;

pub use analyze::*;
pub use code::*;
pub use execution::*;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
