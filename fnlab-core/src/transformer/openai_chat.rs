use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use super::{
    CodeTransformer, TransformError, TransformRequest, TransformResponse,
    prompt::{SYSTEM_PROMPT, build_user_prompt},
};
use crate::config::{SecretConfig, TransformerConfig};

/// Chat completion against an OpenAI-compatible endpoint.
pub struct OpenAIChatTransformer {
    /// `None` without an API key; every call then fails authentication.
    client: Option<Client<OpenAIConfig>>,
    config: TransformerConfig,
}

impl OpenAIChatTransformer {
    pub fn new(config: TransformerConfig, secret: &SecretConfig) -> Self {
        let client = secret.api_key.as_ref().map(|api_key| {
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key.expose_secret())
                .with_api_base(config.endpoint.clone());
            Client::with_config(openai_config)
        });
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn build_request(&self, request: &TransformRequest) -> CreateChatCompletionRequest {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(SYSTEM_PROMPT.to_string()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(build_user_prompt(request)),
                name: None,
            }),
        ];
        CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_completion_tokens: Some(self.config.max_tokens),
            ..Default::default()
        }
    }

    #[tracing::instrument(skip(self, request), fields(function = %request.function_name))]
    async fn chat_completion(&self, request: &TransformRequest) -> TransformResponse {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| TransformError::Authentication("API key not configured".into()))?;

        let chat_request = self.build_request(request);
        let chat = client.chat();
        let call = chat.create(chat_request);
        let response = tokio::time::timeout(self.config.request_timeout, call)
            .await
            .map_err(|_| TransformError::Timeout(self.config.request_timeout))?
            .map_err(|e| TransformError::Api(e.to_string()))?;

        debug!(
            usage = ?response.usage.as_ref().map(|u| (u.prompt_tokens, u.completion_tokens)),
            "chat completion finished"
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(TransformError::EmptyResponse)
    }
}

#[async_trait]
impl CodeTransformer for OpenAIChatTransformer {
    async fn transform(&self, request: &TransformRequest) -> TransformResponse {
        self.chat_completion(request).await
    }

    fn name(&self) -> &str {
        "openai_chat"
    }
}
