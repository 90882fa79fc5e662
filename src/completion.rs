//! Chat-completion adapter for the hosted LLM provider.
//!
//! Groq exposes an OpenAI-compatible `chat/completions` endpoint. The client sends the
//! transcript verbatim and returns the text of the first generated choice.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Base URL of the hosted completion API.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Model identifier used for every completion.
pub const COMPLETION_MODEL: &str = "llama3-70b-8192";

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

/// One role-tagged message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced the message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Errors surfaced by completion providers.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No API key was configured, so the provider cannot be authenticated against.
    #[error("completion provider credential is not configured (set GROQ_API_KEY)")]
    MissingCredential,
    /// Transport failed before a response arrived (includes timeouts).
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("completion provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body, as text.
        body: String,
    },
    /// Provider body could not be decoded.
    #[error("malformed completion response: {0}")]
    InvalidResponse(String),
    /// Provider returned no choices or an empty message.
    #[error("completion provider returned no content")]
    EmptyResponse,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `messages` in order with the given sampling temperature and return the reply text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

/// Completion client backed by Groq's OpenAI-compatible API.
pub struct GroqCompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GroqCompletionClient {
    /// Build a client for the hosted endpoint with a bounded request timeout.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, CompletionError> {
        Self::with_base_url(GROQ_BASE_URL, api_key, timeout)
    }

    /// Build a client targeting an alternative OpenAI-compatible base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent("research-relay/completion")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for GroqCompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        let payload = CompletionRequest {
            model: COMPLETION_MODEL,
            messages,
            temperature,
        };
        tracing::debug!(
            model = COMPLETION_MODEL,
            messages = messages.len(),
            temperature,
            "Requesting completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::UnexpectedStatus { status, body });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|error| CompletionError::InvalidResponse(error.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}
