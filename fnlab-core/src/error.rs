use thiserror::Error;

use crate::analyzer::SyntaxError;
use crate::eval::EvalError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

// エラー作成用のヘルパー関数
impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}

/// Failures surfaced to callers of the workbench.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid value for '{field}': expected {expected}, got '{value}'")]
    Validation {
        field: String,
        expected: String,
        value: String,
    },
    #[error("{0}")]
    Execution(String),
    #[error("Missing required parameter: {name}")]
    MissingParameter { name: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<SyntaxError> for PipelineError {
    fn from(error: SyntaxError) -> Self {
        PipelineError::Syntax(error.to_string())
    }
}

impl From<EvalError> for PipelineError {
    fn from(error: EvalError) -> Self {
        PipelineError::Execution(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let error = PipelineError::Validation {
            field: "age".to_string(),
            expected: "int".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid value for 'age': expected int, got 'abc'"
        );
        assert_eq!(
            PipelineError::MissingParameter {
                name: "b".to_string()
            }
            .to_string(),
            "Missing required parameter: b"
        );
    }

    #[test]
    fn test_from_syntax_error() {
        let error: PipelineError = SyntaxError {
            message: "invalid syntax".to_string(),
            line: 2,
            column: 5,
        }
        .into();
        assert_eq!(
            error,
            PipelineError::Syntax("invalid syntax (line 2, column 5)".to_string())
        );
    }
}
