// ABOUTME: External service adapters: embedding, vector index, and LLM clients, plus shared retry
// ABOUTME: Every adapter wraps a narrow service trait so fakes can stand in for integration tests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![warn(missing_docs)]

//! Adapters to the three external services the engine depends on: an
//! embedding service, a vector index, and a language model. Each module
//! exposes a narrow `*Service` trait that production code implements against
//! a real HTTP client and tests implement against an in-memory fake.

/// Embedding adapter with an LRU query cache.
pub mod embedder;
/// Language model adapter.
pub mod llm_client;
/// Shared exponential backoff and cancellation primitives.
pub mod retry;
/// Vector index adapter with batched upsert and normalization.
pub mod vector_index;

pub use embedder::{Embedder, EmbeddingError, EmbeddingService, Vector};
pub use llm_client::{Completion, GenerationParams, LlmClient, LlmError, LlmService, TokenUsage};
pub use retry::{retry, CancellationToken, RetryOutcome, RetryPolicy, Retryable};
pub use vector_index::{IndexError, IndexStats, VectorIndex, VectorIndexService};
