//! Pipelines behind the HTTP surface: summarize an upload, relay a chat, search the web.
//!
//! [`AssistantService`] owns the provider clients for the process lifetime. Every stage returns a
//! typed error; [`AssistantError::kind`] tells the HTTP layer how the failure must be reported.

use crate::{
    completion::{ChatMessage, CompletionClient, CompletionError, GroqCompletionClient},
    config::Config,
    extraction::{DocumentKind, ExtractionError, UploadedDocument, extract_text, truncate_snippet},
    metrics::{MetricsSnapshot, RelayMetrics},
    search::{DuckDuckGoClient, SearchClient, SearchClientError, SearchResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// System prompt framing every document summary.
pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are an expert research assistant. Summarize this text.";
/// Sampling temperature for document summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for chat relay.
pub const CHAT_TEMPERATURE: f32 = 0.5;

/// Broad classes of pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The uploaded document could not be turned into text.
    Extraction,
    /// A provider call failed or returned something unusable.
    ExternalCall,
    /// The caller sent a request that cannot be served.
    Validation,
}

/// Errors emitted by the assistant pipelines.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Text extraction failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Completion provider failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// Search provider failed.
    #[error(transparent)]
    Search(#[from] SearchClientError),
    /// Request was well-formed JSON but semantically unusable.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl AssistantError {
    /// Classify the failure for response mapping.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Extraction(_) => FailureKind::Extraction,
            Self::Completion(_) | Self::Search(_) => FailureKind::ExternalCall,
            Self::Validation(_) => FailureKind::Validation,
        }
    }
}

/// Abstraction over the pipelines used by the HTTP surface.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Extract, truncate, and summarize an uploaded document.
    async fn summarize_document(&self, document: UploadedDocument)
    -> Result<String, AssistantError>;

    /// Forward a chat transcript unchanged and return the model's reply.
    async fn answer(&self, transcript: Vec<ChatMessage>) -> Result<String, AssistantError>;

    /// Run a keyword search.
    async fn search_web(&self, query: &str) -> Result<Vec<SearchResult>, AssistantError>;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Build the two-message transcript used to summarize a snippet.
pub fn summarization_transcript(snippet: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
        ChatMessage::user(snippet),
    ]
}

/// Coordinates extraction and the provider clients.
///
/// Construct once near process start and share through an `Arc`; the service holds no
/// per-request state.
pub struct AssistantService {
    completion: Arc<dyn CompletionClient>,
    search: Arc<dyn SearchClient>,
    metrics: RelayMetrics,
}

impl AssistantService {
    /// Assemble a service from explicit client handles.
    pub fn new(completion: Arc<dyn CompletionClient>, search: Arc<dyn SearchClient>) -> Self {
        Self {
            completion,
            search,
            metrics: RelayMetrics::new(),
        }
    }

    /// Build the hosted provider clients described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, AssistantError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let completion = GroqCompletionClient::new(config.groq_api_key.clone(), timeout)?;
        let search = DuckDuckGoClient::new(timeout)?;
        tracing::info!(
            timeout_secs = config.request_timeout_secs,
            "Provider clients initialized"
        );
        Ok(Self::new(Arc::new(completion), Arc::new(search)))
    }

    async fn run_summary(&self, document: UploadedDocument) -> Result<String, AssistantError> {
        let request_id = Uuid::new_v4();
        let UploadedDocument { filename, bytes } = document;
        tracing::info!(
            %request_id,
            filename = %filename,
            kind = ?DocumentKind::from_filename(&filename),
            bytes = bytes.len(),
            "Summarizing upload"
        );

        let text = tokio::task::spawn_blocking(move || extract_text(&filename, &bytes))
            .await
            .map_err(|err| ExtractionError::Worker(err.to_string()))??;
        let snippet = truncate_snippet(&text);
        tracing::debug!(
            %request_id,
            extracted_chars = text.chars().count(),
            snippet_chars = snippet.chars().count(),
            "Prepared snippet"
        );

        let summary = self
            .completion
            .complete(&summarization_transcript(snippet), SUMMARY_TEMPERATURE)
            .await?;
        tracing::info!(%request_id, summary_chars = summary.chars().count(), "Summary ready");
        Ok(summary)
    }

    async fn run_answer(&self, transcript: Vec<ChatMessage>) -> Result<String, AssistantError> {
        if transcript.is_empty() {
            return Err(AssistantError::Validation(
                "messages must contain at least one entry".into(),
            ));
        }
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, messages = transcript.len(), "Relaying chat");
        let answer = self
            .completion
            .complete(&transcript, CHAT_TEMPERATURE)
            .await?;
        tracing::info!(%request_id, answer_chars = answer.chars().count(), "Chat answered");
        Ok(answer)
    }

    async fn run_search(&self, query: &str) -> Result<Vec<SearchResult>, AssistantError> {
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, query, "Searching");
        let results = self.search.search(query).await?;
        tracing::info!(%request_id, results = results.len(), "Search finished");
        Ok(results)
    }

    fn record<T>(&self, outcome: &Result<T, AssistantError>, on_success: fn(&RelayMetrics)) {
        match outcome {
            Ok(_) => on_success(&self.metrics),
            Err(err) if err.kind() == FailureKind::Validation => {}
            Err(err) => {
                self.metrics.record_failure();
                tracing::warn!(kind = ?err.kind(), error = %err, "Pipeline failed");
            }
        }
    }
}

#[async_trait]
impl AssistantApi for AssistantService {
    async fn summarize_document(
        &self,
        document: UploadedDocument,
    ) -> Result<String, AssistantError> {
        let outcome = self.run_summary(document).await;
        self.record(&outcome, RelayMetrics::record_summary);
        outcome
    }

    async fn answer(&self, transcript: Vec<ChatMessage>) -> Result<String, AssistantError> {
        let outcome = self.run_answer(transcript).await;
        self.record(&outcome, RelayMetrics::record_answer);
        outcome
    }

    async fn search_web(&self, query: &str) -> Result<Vec<SearchResult>, AssistantError> {
        let outcome = self.run_search(query).await;
        self.record(&outcome, RelayMetrics::record_search);
        outcome
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatRole;
    use crate::extraction::{SNIPPET_CHAR_LIMIT, test_support::pdf_with_pages};
    use tokio::sync::Mutex;

    #[derive(Clone, Debug)]
    struct CompletionCall {
        messages: Vec<ChatMessage>,
        temperature: f32,
    }

    /// Replies with the last message's content, or fails when configured to.
    #[derive(Default)]
    struct EchoCompletion {
        calls: Mutex<Vec<CompletionCall>>,
        fail: bool,
    }

    impl EchoCompletion {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        async fn recorded_calls(&self) -> Vec<CompletionCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl CompletionClient for EchoCompletion {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            temperature: f32,
        ) -> Result<String, CompletionError> {
            self.calls.lock().await.push(CompletionCall {
                messages: messages.to_vec(),
                temperature,
            });
            if self.fail {
                return Err(CompletionError::MissingCredential);
            }
            Ok(format!(
                "echo: {}",
                messages.last().map(|m| m.content.as_str()).unwrap_or("")
            ))
        }
    }

    struct StaticSearch(Result<Vec<SearchResult>, ()>);

    #[async_trait]
    impl SearchClient for StaticSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchClientError> {
            self.0
                .clone()
                .map_err(|()| SearchClientError::InvalidResponse("boom".into()))
        }
    }

    fn service_with(completion: Arc<EchoCompletion>) -> AssistantService {
        AssistantService::new(completion, Arc::new(StaticSearch(Ok(Vec::new()))))
    }

    fn upload(filename: &str, bytes: &[u8]) -> UploadedDocument {
        UploadedDocument {
            filename: filename.into(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn summary_sends_system_and_truncated_user_message() {
        let completion = Arc::new(EchoCompletion::default());
        let service = service_with(completion.clone());
        let long_text = "x".repeat(SNIPPET_CHAR_LIMIT + 500);

        let summary = service
            .summarize_document(upload("notes.txt", long_text.as_bytes()))
            .await
            .expect("summary");

        let calls = completion.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.temperature, SUMMARY_TEMPERATURE);
        assert_eq!(call.messages.len(), 2);
        assert_eq!(call.messages[0].role, ChatRole::System);
        assert_eq!(call.messages[0].content, SUMMARY_SYSTEM_PROMPT);
        assert_eq!(call.messages[1].role, ChatRole::User);
        assert_eq!(call.messages[1].content.chars().count(), SNIPPET_CHAR_LIMIT);
        assert_eq!(summary, format!("echo: {}", "x".repeat(SNIPPET_CHAR_LIMIT)));
        assert_eq!(service.metrics_snapshot().documents_summarized, 1);
    }

    #[tokio::test]
    async fn summary_of_pdf_uses_page_text() {
        let completion = Arc::new(EchoCompletion::default());
        let service = service_with(completion.clone());
        let pdf = pdf_with_pages(&[Some("Alpha"), Some("Beta")]);

        service
            .summarize_document(upload("paper.PDF", &pdf))
            .await
            .expect("summary");

        let calls = completion.recorded_calls().await;
        assert_eq!(calls[0].messages[1].content, "Alpha\nBeta\n");
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_extraction_failure_without_provider_call() {
        let completion = Arc::new(EchoCompletion::default());
        let service = service_with(completion.clone());

        let error = service
            .summarize_document(upload("broken.pdf", b"garbage"))
            .await
            .expect_err("corrupt pdf");

        assert_eq!(error.kind(), FailureKind::Extraction);
        assert!(completion.recorded_calls().await.is_empty());
        assert_eq!(service.metrics_snapshot().upstream_failures, 1);
    }

    #[tokio::test]
    async fn answer_forwards_transcript_unmodified() {
        let completion = Arc::new(EchoCompletion::default());
        let service = service_with(completion.clone());
        let transcript = vec![ChatMessage::user("hi")];

        let answer = service.answer(transcript.clone()).await.expect("answer");

        let calls = completion.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages, transcript);
        assert_eq!(calls[0].temperature, CHAT_TEMPERATURE);
        assert_eq!(answer, "echo: hi");
    }

    #[tokio::test]
    async fn empty_transcript_is_a_validation_failure() {
        let completion = Arc::new(EchoCompletion::default());
        let service = service_with(completion.clone());

        let error = service.answer(Vec::new()).await.expect_err("empty");

        assert_eq!(error.kind(), FailureKind::Validation);
        assert!(completion.recorded_calls().await.is_empty());
        assert_eq!(service.metrics_snapshot().upstream_failures, 0);
    }

    #[tokio::test]
    async fn provider_failure_is_an_external_call_failure() {
        let service = service_with(Arc::new(EchoCompletion::failing()));

        let error = service
            .answer(vec![ChatMessage::user("hi")])
            .await
            .expect_err("provider failure");

        assert_eq!(error.kind(), FailureKind::ExternalCall);
        assert!(error.to_string().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn search_failures_are_external_call_failures() {
        let service = AssistantService::new(
            Arc::new(EchoCompletion::default()),
            Arc::new(StaticSearch(Err(()))),
        );

        let error = service.search_web("paris").await.expect_err("search failure");
        assert_eq!(error.kind(), FailureKind::ExternalCall);
        assert_eq!(service.metrics_snapshot().searches_served, 0);
    }

    #[tokio::test]
    async fn concurrent_answers_do_not_interfere() {
        let completion = Arc::new(EchoCompletion::default());
        let service = Arc::new(service_with(completion.clone()));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    let answer = service
                        .answer(vec![ChatMessage::user(format!("question {i}"))])
                        .await
                        .expect("answer");
                    (i, answer)
                })
            })
            .collect();

        for handle in handles {
            let (i, answer) = handle.await.expect("task");
            assert_eq!(answer, format!("echo: question {i}"));
        }
        assert_eq!(completion.recorded_calls().await.len(), 16);
        assert_eq!(service.metrics_snapshot().questions_answered, 16);
    }
}
