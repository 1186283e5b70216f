#![deny(missing_docs)]

//! Core library for the FDA decision-summary pipeline: Extractor, Validator, Embedder, and
//! Summarizer composed into one per-document workflow.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction through external converters.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document pipeline orchestration and shared types.
pub mod processing;
/// One-time setup and environment checks.
pub mod setup;
/// Local and remote summarization strategies.
pub mod summarization;
/// Word, sentence, and normalization helpers.
pub mod text;
/// QA and template conformance checks.
pub mod validation;
