//! Model provider access
//!
//! [`LlmClient`] wraps the rig OpenAI client and is the production
//! [`ModelProvider`]. [`LlmInvoker`] applies the per-attempt timeout, the
//! bounded retry policy and the shared concurrency gate from a
//! [`ProviderContext`].

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::model::LlmConfig;
use crate::service::analysis::AnalysisError;

/// A failed provider call, classified by whether retrying can help
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderFailure {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

/// Provider error codes, in the order they are checked
///
/// Quota exhaustion arrives as a 429 but cannot succeed on retry, so it is
/// listed ahead of the rate-limit code.
const ERROR_CODES: &[(&str, bool)] = &[
    ("insufficient_quota", false),
    ("invalid_api_key", false),
    ("context_length_exceeded", false),
    ("model_not_found", false),
    ("rate_limit_exceeded", true),
    ("server_error", true),
    ("overloaded_error", true),
    ("invalid_request_error", false),
    ("authentication_error", false),
    ("permission_error", false),
];

const TRANSIENT_PHRASES: &[&str] = &[
    "rate limit",
    "too many requests",
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "connection closed",
    "error sending request",
    "reset by peer",
    "overloaded",
    "bad gateway",
    "service unavailable",
    "internal server error",
];

/// Status codes only count in an explicit form: `HTTP 429`, `status: 503`,
/// `status code 500` or reqwest's `(429 Too Many Requests)`
static HTTP_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\b(?:http|status)(?:[ _]?code)?\s*[:=]?\s*([1-5]\d{2})\b)|\(([1-5]\d{2}) [A-Z][a-z]",
    )
    .unwrap()
});

impl ProviderFailure {
    /// Classify a provider error message
    ///
    /// Structured error codes from the provider body win, then an explicit
    /// HTTP status, then well-known transient phrases. Anything else,
    /// including quota exhaustion and auth failures, is permanent.
    pub fn from_error_message(msg: &str) -> Self {
        let msg_lower = msg.to_lowercase();

        if let Some((_, transient)) = ERROR_CODES
            .iter()
            .find(|(code, _)| msg_lower.contains(code))
        {
            return Self::classified(msg, *transient);
        }

        if let Some(status) = HTTP_STATUS
            .captures(msg)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .and_then(|m| m.as_str().parse::<u16>().ok())
        {
            return Self::classified(msg, matches!(status, 408 | 429 | 500..=599));
        }

        let transient = TRANSIENT_PHRASES
            .iter()
            .any(|phrase| msg_lower.contains(phrase));
        Self::classified(msg, transient)
    }

    fn classified(msg: &str, transient: bool) -> Self {
        if transient {
            ProviderFailure::Transient(msg.to_string())
        } else {
            ProviderFailure::Permanent(msg.to_string())
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderFailure::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderFailure::Transient(msg) | ProviderFailure::Permanent(msg) => msg,
        }
    }
}

/// A language model that turns a system preamble and a prompt into text
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Model identifier, for logging
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderFailure>;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
    model: String,
    temperature: f64,
    max_tokens: u64,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    pub fn new(api_key: &str, config: &LlmConfig) -> Result<Self, String> {
        let client = openai::Client::new(api_key)
            .map_err(|e| format!("Failed to create OpenAI client: {}", e))?;

        tracing::info!(model = %config.model, "LLM client initialized");

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ModelProvider for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderFailure> {
        // Fixed temperature and seed keep outputs reproducible
        let agent = self
            .client
            .agent(self.model.as_str())
            .preamble(system)
            .max_tokens(self.max_tokens)
            .additional_params(serde_json::json!({
                "temperature": self.temperature,
                "seed": 42
            }))
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| ProviderFailure::from_error_message(&e.to_string()))
    }
}

/// Bounds on provider attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Applied to each attempt independently
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: config.timeout(),
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// Process-wide provider state: the client, its retry policy and the gate
/// bounding simultaneous in-flight calls
#[derive(Clone)]
pub struct ProviderContext {
    provider: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
    gate: Arc<Semaphore>,
}

impl ProviderContext {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        policy: RetryPolicy,
        max_concurrent_requests: usize,
    ) -> Self {
        Self {
            provider,
            policy,
            gate: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }

    pub fn from_config(provider: Arc<dyn ModelProvider>, config: &LlmConfig) -> Self {
        Self::new(
            provider,
            RetryPolicy::from_config(config),
            config.max_concurrent_requests,
        )
    }
}

/// Sends prompts to the model provider under the context's policy
#[derive(Clone)]
pub struct LlmInvoker {
    context: ProviderContext,
}

impl LlmInvoker {
    pub fn new(context: ProviderContext) -> Self {
        Self { context }
    }

    pub fn model(&self) -> &str {
        self.context.provider.model()
    }

    /// Send a prompt and return the raw model output
    ///
    /// Transient failures and timeouts are retried with exponential backoff
    /// up to the attempt bound. Permanent failures return immediately.
    pub async fn invoke(&self, system: &str, prompt: &str) -> Result<String, AnalysisError> {
        let policy = &self.context.policy;
        let model = self.model();
        let prompt_length = prompt.len();
        let mut timed_out = false;
        let mut last_message = String::new();

        for attempt in 1..=policy.max_attempts {
            let outcome = {
                // Held for the attempt only, never across the backoff sleep
                let _permit = self.context.gate.acquire().await.map_err(|_| {
                    AnalysisError::Provider {
                        message: "provider gate closed".to_string(),
                        attempts: attempt - 1,
                    }
                })?;

                tracing::debug!(
                    model = %model,
                    attempt = attempt,
                    prompt_length = prompt_length,
                    "Initiating model provider call"
                );

                let start_time = Instant::now();
                let result = tokio::time::timeout(
                    policy.attempt_timeout,
                    self.context.provider.complete(system, prompt),
                )
                .await;
                (result, start_time.elapsed())
            };

            let (result, elapsed) = outcome;
            match result {
                Ok(Ok(output)) => {
                    tracing::info!(
                        model = %model,
                        attempt = attempt,
                        elapsed_ms = elapsed.as_millis(),
                        prompt_length = prompt_length,
                        output_length = output.len(),
                        "Model provider call completed successfully"
                    );
                    return Ok(output);
                }
                Ok(Err(failure)) if !failure.is_transient() => {
                    tracing::error!(
                        model = %model,
                        attempt = attempt,
                        elapsed_ms = elapsed.as_millis(),
                        error = %failure.message(),
                        "Model provider call failed permanently"
                    );
                    return Err(AnalysisError::Provider {
                        message: failure.message().to_string(),
                        attempts: attempt,
                    });
                }
                Ok(Err(failure)) => {
                    timed_out = false;
                    last_message = failure.message().to_string();
                }
                Err(_) => {
                    timed_out = true;
                    last_message = format!(
                        "no response within {}ms",
                        policy.attempt_timeout.as_millis()
                    );
                }
            }

            if attempt < policy.max_attempts {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    model = %model,
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    elapsed_ms = elapsed.as_millis(),
                    error = %last_message,
                    "Model provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(
            model = %model,
            attempts = policy.max_attempts,
            error = %last_message,
            "Model provider call failed after all attempts"
        );

        if timed_out {
            Err(AnalysisError::Timeout {
                attempts: policy.max_attempts,
                timeout: policy.attempt_timeout,
            })
        } else {
            Err(AnalysisError::Provider {
                message: last_message,
                attempts: policy.max_attempts,
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_classifies_provider_errors() {
        for msg in [
            "HTTP 429: Rate limit reached for gpt-4o-mini",
            "ProviderError: 503 Service Unavailable",
            "error sending request: connection reset by peer",
            "operation timed out",
        ] {
            assert!(ProviderFailure::from_error_message(msg).is_transient(), "{msg}");
        }
        for msg in [
            "HTTP 401: Incorrect API key provided",
            "You exceeded your current quota (insufficient_quota)",
            "HTTP 400: invalid request, unknown parameter",
            "something unexpected",
        ] {
            assert!(!ProviderFailure::from_error_message(msg).is_transient(), "{msg}");
        }
    }

    const RATE_LIMITED_BODY: &str = r#"ProviderError: {"error":{"message":"Rate limit reached for gpt-4o-mini in organization org-x on tokens per min (TPM): Limit 200000, Used 199401, Requested 1203. Please try again in 181ms.","type":"tokens","param":null,"code":"rate_limit_exceeded"}}"#;

    const CONTEXT_TOO_LONG_BODY: &str = r#"ProviderError: {"error":{"message":"This model's maximum context length is 128000 tokens. However, your messages resulted in 150032 tokens. Please reduce the length of the messages.","type":"invalid_request_error","param":"messages","code":"context_length_exceeded"}}"#;

    #[test]
    fn test_token_counts_do_not_look_like_status_codes() {
        assert!(ProviderFailure::from_error_message(RATE_LIMITED_BODY).is_transient());
        assert!(!ProviderFailure::from_error_message(CONTEXT_TOO_LONG_BODY).is_transient());
        assert!(!ProviderFailure::from_error_message("Request exceeds limit by 500 tokens").is_transient());
        assert!(!ProviderFailure::from_error_message("prompt has 4290 tokens (429 over budget)").is_transient());
    }

    #[test]
    fn test_classifies_provider_error_codes() {
        let server_error = r#"{"error":{"message":"The server had an error while processing your request.","type":"server_error","param":null,"code":null}}"#;
        let quota = r#"{"error":{"message":"You exceeded your current quota, please check your plan and billing details.","type":"insufficient_quota","param":null,"code":"insufficient_quota"}}"#;
        let bad_key = r#"{"error":{"message":"Incorrect API key provided: sk-abc.","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#;

        assert!(ProviderFailure::from_error_message(server_error).is_transient());
        assert!(!ProviderFailure::from_error_message(quota).is_transient());
        assert!(!ProviderFailure::from_error_message(bad_key).is_transient());
    }

    #[test]
    fn test_classifies_explicit_status_forms() {
        for msg in [
            "status: 503",
            "status code 500 from upstream",
            "HTTP status server error (502 Bad Gateway) for url (https://api.openai.com/v1/chat/completions)",
            "HTTP 408",
        ] {
            assert!(ProviderFailure::from_error_message(msg).is_transient(), "{msg}");
        }
        for msg in ["HTTP 403", "status=404", "(400 Bad Request)"] {
            assert!(!ProviderFailure::from_error_message(msg).is_transient(), "{msg}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_body_is_retried_and_oversized_prompt_is_not() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![
            Err(ProviderFailure::from_error_message(RATE_LIMITED_BODY)),
            Ok("{}".into()),
        ]));
        let retried = invoker(provider.clone(), fast_policy(3), 1);
        assert_eq!(retried.invoke("sys", "prompt").await.unwrap(), "{}");
        assert_eq!(provider.calls(), 2);

        let provider = Arc::new(ScriptedProvider::sequence(vec![Err(
            ProviderFailure::from_error_message(CONTEXT_TOO_LONG_BODY),
        )]));
        let rejected = invoker(provider.clone(), fast_policy(3), 1);
        let err = rejected.invoke("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Provider { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(3000),
            attempt_timeout: Duration::from_secs(60),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_millis(3000));
        assert_eq!(policy.backoff(40), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![
            Err(ProviderFailure::Transient("429 rate limit".into())),
            Err(ProviderFailure::Transient("503".into())),
            Ok("{}".into()),
        ]));
        let invoker = invoker(provider.clone(), fast_policy(3), 1);

        assert_eq!(invoker.invoke("sys", "prompt").await.unwrap(), "{}");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![Err(
            ProviderFailure::Permanent("401 unauthorized".into()),
        )]));
        let invoker = invoker(provider.clone(), fast_policy(3), 1);

        let err = invoker.invoke("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Provider { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_attempt_bound() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![Err(
            ProviderFailure::Transient("502 bad gateway".into()),
        )]));
        let invoker = invoker(provider.clone(), fast_policy(3), 1);

        let err = invoker.invoke("sys", "prompt").await.unwrap_err();
        assert_eq!(err.kind(), "provider_error");
        assert!(matches!(err, AnalysisError::Provider { attempts: 3, .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider =
            Arc::new(ScriptedProvider::always("{}").with_delay(Duration::from_secs(120)));
        let mut policy = fast_policy(2);
        policy.attempt_timeout = Duration::from_secs(1);
        let invoker = invoker(provider.clone(), policy, 1);

        let err = invoker.invoke("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout { attempts: 2, .. }));
        assert_eq!(err.kind(), "timeout");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_bounds_in_flight_calls() {
        let provider =
            Arc::new(ScriptedProvider::always("{}").with_delay(Duration::from_millis(50)));
        let invoker = invoker(provider.clone(), fast_policy(1), 2);

        let calls = (0..6).map(|_| invoker.invoke("sys", "prompt"));
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(provider.calls(), 6);
        assert!(provider.max_in_flight() <= 2);
        assert!(provider.max_in_flight() >= 1);
    }
}
