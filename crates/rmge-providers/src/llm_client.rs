// ABOUTME: LLM adapter for query expansion and meal-plan generation calls
// ABOUTME: Retry-wrapped, with token usage accounting for the daily/weekly quota gate

use async_trait::async_trait;
use rmge_core::RetryClass;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::retry::{retry, CancellationToken, Retryable, RetryOutcome, RetryPolicy};

/// Token usage reported alongside a completion (spec.md §4.9, §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens consumed by the completion.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens billed for the call.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A raw completion from the language model.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text, expected to contain a JSON object per spec.md §4.9.
    pub text: String,
    /// Token accounting for this call.
    pub usage: TokenUsage,
}

/// Parameters controlling a single completion request (spec.md §4.9, §6).
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Hard cap on completion tokens.
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// Failures from the language model adapter (spec.md §4.9).
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    /// Upstream call failed.
    #[error("llm service error: {message}")]
    Upstream {
        /// Description of the failure.
        message: String,
        /// Whether this class of failure should be retried.
        retryable: bool,
    },
    /// The model's response exceeded `max_tokens` without completing
    /// (spec.md §4.9 edge case: "truncated output").
    #[error("llm response truncated")]
    Truncated,
}

impl Retryable for LlmError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Upstream { retryable, .. } => {
                if *retryable {
                    RetryClass::Retryable
                } else {
                    RetryClass::NonRetryable
                }
            }
            Self::Truncated => RetryClass::NonRetryable,
        }
    }
}

impl From<LlmError> for rmge_core::RmgeError {
    fn from(err: LlmError) -> Self {
        let retryable = err.retry_class() == RetryClass::Retryable;
        match err {
            LlmError::Upstream { message, .. } => Self::Llm { message, retryable },
            LlmError::Truncated => Self::Llm {
                message: "response truncated before completion".to_owned(),
                retryable: false,
            },
        }
    }
}

/// The narrow contract to the language model (spec.md §6):
/// `generate(prompt, params) -> (text, usage)`.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Generate a completion for `prompt` under `params`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion, LlmError>;
}

/// Adapter wrapping an [`LlmService`] with `Retry` (spec.md §4.9). The LLM
/// call is never cached: each prompt is unique to its request context
/// (spec.md §9).
pub struct LlmClient {
    service: Arc<dyn LlmService>,
    policy: RetryPolicy,
}

impl LlmClient {
    /// Wrap `service` with the default retry policy.
    #[must_use]
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
        }
    }

    /// Generate a completion for `prompt`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] once retries are exhausted, or
    /// [`LlmError::Truncated`] if the response hit `max_tokens` without a
    /// detectable stop (left to the caller/[`crate` validator] to classify).
    #[instrument(skip(self, prompt, cancel))]
    pub async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<Completion, LlmError> {
        let prompt = prompt.to_string();
        let params = params.clone();
        match retry(&self.policy, cancel, || {
            let service = Arc::clone(&self.service);
            let prompt = prompt.clone();
            let params = params.clone();
            async move { service.generate(&prompt, &params).await }
        })
        .await
        {
            Ok(completion) => Ok(completion),
            Err(RetryOutcome::Failed(err)) => Err(err),
            Err(RetryOutcome::Cancelled) => Err(LlmError::Upstream {
                message: "cancelled".to_owned(),
                retryable: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoService {
        calls: AtomicU32,
        fail_first: bool,
    }

    #[async_trait]
    impl LlmService for EchoService {
        async fn generate(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<Completion, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(LlmError::Upstream {
                    message: "503".to_owned(),
                    retryable: true,
                });
            }
            Ok(Completion {
                text: format!("{{\"echo\": \"{prompt}\"}}"),
                usage: TokenUsage {
                    prompt_tokens: prompt.len() as u32,
                    completion_tokens: 8,
                },
            })
        }
    }

    #[tokio::test]
    async fn generates_on_first_try() {
        let client = LlmClient::new(Arc::new(EchoService {
            calls: AtomicU32::new(0),
            fail_first: false,
        }));
        let cancel = CancellationToken::new();
        let result = client
            .generate("hello", &GenerationParams::default(), &cancel)
            .await
            .unwrap();
        assert!(result.text.contains("hello"));
        assert_eq!(result.usage.total(), result.usage.prompt_tokens + 8);
    }

    #[tokio::test]
    async fn retries_transient_failure() {
        let service = Arc::new(EchoService {
            calls: AtomicU32::new(0),
            fail_first: true,
        });
        let client = LlmClient::new(service.clone());
        let cancel = CancellationToken::new();
        let result = client
            .generate("hi", &GenerationParams::default(), &cancel)
            .await;
        assert!(result.is_ok());
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_truncation_stops_immediately() {
        struct AlwaysTruncates;
        #[async_trait]
        impl LlmService for AlwaysTruncates {
            async fn generate(
                &self,
                _prompt: &str,
                _params: &GenerationParams,
            ) -> Result<Completion, LlmError> {
                Err(LlmError::Truncated)
            }
        }
        let client = LlmClient::new(Arc::new(AlwaysTruncates));
        let cancel = CancellationToken::new();
        let result = client
            .generate("hi", &GenerationParams::default(), &cancel)
            .await;
        assert!(matches!(result, Err(LlmError::Truncated)));
    }
}
