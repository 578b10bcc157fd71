use fnlab_core::{ExecutionRequest, InputSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

pub const FULL_CODE_FIELD: &str = "full_code";
pub const INPUTS_METADATA_FIELD: &str = "inputs_metadata";
pub const ENTRY_POINT_FIELD: &str = "entry_point";

/// Form accepted by `/test`; every other field is a parameter value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TestForm {
    /// Code returned by `/analyze`
    pub full_code: String,

    /// JSON list of input specifications; untyped coercion when absent
    pub inputs_metadata: Option<String>,

    /// Function to call; the first function defined when absent
    pub entry_point: Option<String>,
}

/// Fields of a `/test` submission in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSubmission {
    full_code: Option<String>,
    inputs_metadata: Option<String>,
    entry_point: Option<String>,
    values: IndexMap<String, String>,
}

impl TestSubmission {
    pub fn push(&mut self, name: &str, value: String) {
        match name {
            FULL_CODE_FIELD => self.full_code = Some(value),
            INPUTS_METADATA_FIELD => self.inputs_metadata = Some(value),
            ENTRY_POINT_FIELD => self.entry_point = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }

    pub fn into_execution_request(self) -> Result<ExecutionRequest, AppError> {
        let code = self
            .full_code
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("Missing form field: {FULL_CODE_FIELD}")))?;
        let inputs = match self.inputs_metadata.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(metadata) => Some(serde_json::from_str::<Vec<InputSpec>>(metadata).map_err(
                |e| AppError::BadRequest(format!("Invalid {INPUTS_METADATA_FIELD}: {e}")),
            )?),
        };
        let entry_point = self
            .entry_point
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Ok(ExecutionRequest {
            code,
            inputs,
            values: self.values,
            entry_point,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnlab_core::ValueType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_submission_fields() {
        let mut submission = TestSubmission::default();
        submission.push("full_code", "def f(a): return a".to_string());
        submission.push(
            "inputs_metadata",
            r#"[{"name": "a", "type": "number", "description": "A", "python_type": "int"}]"#
                .to_string(),
        );
        submission.push("entry_point", " f ".to_string());
        submission.push("a", "1".to_string());

        let request = submission.into_execution_request().unwrap();
        assert_eq!(request.entry_point.as_deref(), Some("f"));
        assert_eq!(request.inputs, Some(vec![InputSpec::new("a", ValueType::Int, "A")]));
        assert_eq!(request.values.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_bad_submissions() {
        assert!(matches!(
            TestSubmission::default().into_execution_request(),
            Err(AppError::BadRequest(_))
        ));
        let mut submission = TestSubmission::default();
        submission.push("full_code", "def f(): pass".to_string());
        submission.push("inputs_metadata", "{not json".to_string());
        assert!(matches!(
            submission.into_execution_request(),
            Err(AppError::BadRequest(message)) if message.starts_with("Invalid inputs_metadata")
        ));
    }

    #[test]
    fn test_blank_metadata_is_untyped() {
        let mut submission = TestSubmission::default();
        submission.push("full_code", "def f(): pass".to_string());
        submission.push("inputs_metadata", "  ".to_string());
        submission.push("entry_point", "".to_string());
        let request = submission.into_execution_request().unwrap();
        assert_eq!(request.inputs, None);
        assert_eq!(request.entry_point, None);
    }
}
