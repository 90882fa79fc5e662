#![deny(missing_docs)]

//! Core library for the research relay: document summaries, chat relay, and web search.

/// HTTP routing and handlers.
pub mod api;
/// Chat-completion provider abstraction and the hosted adapter.
pub mod completion;
/// Environment-driven configuration.
pub mod config;
/// Text extraction and snippet truncation for uploads.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Web search provider abstraction and the DuckDuckGo adapter.
pub mod search;
/// Pipelines composing extraction and the provider clients.
pub mod service;
