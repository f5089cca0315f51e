//! [`LanguageModel`] and [`Embedder`] over an OpenAI-compatible endpoint.

use async_trait::async_trait;
use openai_client::{truncate_to_char_boundary, ChatRequest, Message, OpenAIClient, OpenAIError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::security::credentials::LlmCredentials;
use crate::traits::ai::{
    ChatRole, CompletionRequest, CompletionResponse, Embedder, LanguageModel,
};

/// Embedding input cap in bytes; longer text is cut at a char boundary.
const MAX_EMBED_INPUT_BYTES: usize = 8000;

/// Chat and embedding calls through one [`OpenAIClient`].
#[derive(Debug, Clone)]
pub struct OpenAiService {
    client: OpenAIClient,
    embedding_model: Option<String>,
}

impl OpenAiService {
    pub fn new(client: OpenAIClient) -> Self {
        Self {
            client,
            embedding_model: None,
        }
    }

    /// Build a client from credentials. DeepSeek models get the DeepSeek
    /// endpoint unless a base URL is set.
    pub fn from_credentials(credentials: &LlmCredentials) -> Self {
        let key = credentials.api_key.expose();
        let client = match &credentials.base_url {
            Some(url) => OpenAIClient::new(key).with_base_url(url),
            None if credentials.is_deepseek() => OpenAIClient::deepseek(key),
            None => OpenAIClient::new(key),
        };
        Self::new(client)
    }

    /// Enable [`Embedder`] calls with this model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }
}

fn to_chat_request(request: CompletionRequest) -> ChatRequest {
    request
        .messages
        .into_iter()
        .fold(ChatRequest::new(request.model), |chat, message| {
            chat.message(match message.role {
                ChatRole::System => Message::system(message.content),
                ChatRole::User => Message::user(message.content),
                ChatRole::Assistant => Message::assistant(message.content),
            })
        })
        .temperature(request.temperature)
        .max_tokens(request.max_tokens)
}

fn service_error(error: OpenAIError) -> ServiceError {
    match error {
        OpenAIError::Timeout => ServiceError::Timeout,
        OpenAIError::Api { status, .. } => ServiceError::Status(status),
        OpenAIError::Network(reason) => ServiceError::Network(reason),
        OpenAIError::Parse(reason) => ServiceError::Malformed(reason),
    }
}

#[async_trait]
impl LanguageModel for OpenAiService {
    async fn complete(&self, request: CompletionRequest) -> ServiceResult<CompletionResponse> {
        let model = request.model.clone();
        let response = self
            .client
            .chat_completion(to_chat_request(request))
            .await
            .map_err(|e| {
                warn!(model = %model, error = %e, "chat completion failed");
                service_error(e)
            })?;

        let total_tokens = response.usage.as_ref().map(|u| u.total_tokens);
        debug!(model = %model, tokens = ?total_tokens, "chat completion received");
        Ok(CompletionResponse {
            content: response.content,
            total_tokens,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiService {
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or_else(|| ServiceError::Unavailable("no embedding model configured".into()))?;

        let input = truncate_to_char_boundary(text, MAX_EMBED_INPUT_BYTES);
        self.client
            .create_embedding(input, model)
            .await
            .map_err(service_error)
    }
}
