use async_trait::async_trait;
use tracing::debug;

use super::{
    CodeTransformer, TransformError, TransformRequest, TransformResponse,
    prompt::build_user_prompt,
};
use crate::config::CannedResponse;

/// Answers with the first configured reply whose pattern occurs in the prompt.
#[derive(Debug, Clone, Default)]
pub struct CannedTransformer {
    responses: Vec<CannedResponse>,
}

impl CannedTransformer {
    pub fn new(responses: Vec<CannedResponse>) -> Self {
        Self { responses }
    }

    pub fn get_answer(&self, prompt: &str) -> Option<&str> {
        self.responses
            .iter()
            .find(|response| prompt.contains(&response.pattern))
            .map(|response| response.reply.as_str())
    }
}

#[async_trait]
impl CodeTransformer for CannedTransformer {
    #[tracing::instrument(skip(self, request), level = "debug")]
    async fn transform(&self, request: &TransformRequest) -> TransformResponse {
        let prompt = build_user_prompt(request);
        let answer = self.get_answer(&prompt).ok_or(TransformError::NoMatch)?;
        debug!("canned answer: {}", answer);
        Ok(answer.to_string())
    }

    fn name(&self) -> &str {
        "canned"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses() -> Vec<CannedResponse> {
        vec![
            CannedResponse {
                pattern: "def add".to_string(),
                reply: "add reply".to_string(),
            },
            CannedResponse {
                pattern: "def".to_string(),
                reply: "generic reply".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_first_matching_pattern_wins() {
        let transformer = CannedTransformer::new(responses());
        let request = TransformRequest {
            function_name: "add".to_string(),
            function_source: "def add(a, b): return a + b".to_string(),
            context: String::new(),
        };
        assert_eq!(transformer.transform(&request).await, Ok("add reply".to_string()));
        let request = TransformRequest {
            function_source: "def sub(a, b): return a - b".to_string(),
            ..request
        };
        assert_eq!(transformer.transform(&request).await, Ok("generic reply".to_string()));
    }

    #[tokio::test]
    async fn test_no_match() {
        let transformer = CannedTransformer::default();
        assert_eq!(
            transformer.transform(&TransformRequest::default()).await,
            Err(TransformError::NoMatch)
        );
    }
}
