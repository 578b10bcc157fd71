//! Function Transformer
//!
//! Asks a language model to rewrite one interactive function into a callable
//! one: `input()` calls become parameters, `print` becomes `return`, and the
//! parameters come back as a typed [`crate::schema::InputSpec`] list.
//!
//! - [`CodeTransformer`]: the seam; one prompt in, raw model text out
//! - [`openai_chat::OpenAIChatTransformer`]: OpenAI-compatible endpoint (Groq by default)
//! - [`canned::CannedTransformer`]: fixed pattern/reply table for offline use
//! - [`normalizer`]: turns whatever came back into a valid
//!   [`crate::schema::TransformResult`], falling back deterministically
//!
//! Transformer failures never reach the caller; they are logged and replaced
//! by the fallback result.

pub mod canned;
pub mod normalizer;
pub mod openai_chat;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{SecretConfig, TransformerConfig, TransformerKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Empty response")]
    EmptyResponse,
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("No canned response matches the prompt")]
    NoMatch,
}

pub type TransformResponse = Result<String, TransformError>;

/// What the model is asked to rewrite.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformRequest {
    pub function_name: String,
    pub function_source: String,
    /// The other elements of the submission.
    pub context: String,
}

#[mockall::automock]
#[async_trait]
pub trait CodeTransformer: Send + Sync {
    /// Returns the model's raw answer.
    async fn transform(&self, request: &TransformRequest) -> TransformResponse;

    fn name(&self) -> &str;
}

pub fn build_transformer(
    config: &TransformerConfig,
    secret: &SecretConfig,
) -> Arc<dyn CodeTransformer> {
    match config.kind {
        TransformerKind::OpenaiChat => {
            Arc::new(openai_chat::OpenAIChatTransformer::new(config.clone(), secret))
        }
        TransformerKind::Canned => Arc::new(canned::CannedTransformer::new(
            config.canned_responses.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_by_kind() {
        let mut config = TransformerConfig::default();
        assert_eq!(
            build_transformer(&config, &SecretConfig::default()).name(),
            "openai_chat"
        );
        config.kind = TransformerKind::Canned;
        assert_eq!(
            build_transformer(&config, &SecretConfig::default()).name(),
            "canned"
        );
    }

    #[tokio::test]
    async fn test_mock_transformer() {
        let mut mock = MockCodeTransformer::new();
        mock.expect_transform()
            .times(1)
            .returning(|request| Ok(format!("seen {}", request.function_name)));
        let request = TransformRequest {
            function_name: "f".to_string(),
            ..Default::default()
        };
        assert_eq!(mock.transform(&request).await, Ok("seen f".to_string()));
    }
}
