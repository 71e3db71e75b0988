use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use courier_core::config::LlmConfig;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("RATE_LIMIT_EXCEEDED: the language model provider is throttling requests")]
    RateLimitExceeded,
    #[error("the language model provider rejected the credentials")]
    InvalidCredentials,
    #[error("the language model provider failed with status {status}")]
    ServerError { status: u16 },
    #[error("could not reach the language model provider: {0}")]
    Transport(String),
    #[error("unusable response from the language model provider: {0}")]
    InvalidResponse(String),
}

/// One chat-completion exchange: a system prompt and the customer-facing
/// user turn.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat completions. Ollama is reached through its `/v1`
/// compatibility endpoint, so both providers share this client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", config.resolved_base_url()),
            api_key: config.api_key.clone(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.3
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &detail));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("no completion text returned".to_string()))
    }
}

fn classify_status(status: u16, detail: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::InvalidCredentials,
        429 => LlmError::RateLimitExceeded,
        500..=599 => LlmError::ServerError { status },
        other => {
            let snippet = detail.chars().take(200).collect::<String>();
            LlmError::InvalidResponse(format!("status {other}: {snippet}"))
        }
    }
}

/// How long to wait before the next attempt, or `None` to give up.
///
/// Rate limiting backs off exponentially from the base delay and gives up
/// after `rate_limit_attempts` calls in total. Server and transport
/// failures are retried `server_error_retries` times at the base delay.
/// Everything else fails on the first attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub rate_limit_attempts: u32,
    pub server_error_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { rate_limit_attempts: 3, server_error_retries: 2, backoff_base: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            rate_limit_attempts: config.rate_limit_attempts.max(1),
            server_error_retries: config.server_error_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    pub fn without_backoff() -> Self {
        Self { backoff_base: Duration::ZERO, ..Self::default() }
    }

    fn next_delay(&self, error: &LlmError, attempts: &AttemptCounts) -> Option<Duration> {
        match error {
            LlmError::RateLimitExceeded if attempts.rate_limited < self.rate_limit_attempts => {
                let exponent = attempts.rate_limited.saturating_sub(1).min(16);
                Some(self.backoff_base.saturating_mul(1u32 << exponent))
            }
            LlmError::ServerError { .. } | LlmError::Transport(_)
                if attempts.server_failures <= self.server_error_retries =>
            {
                Some(self.backoff_base)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct AttemptCounts {
    rate_limited: u32,
    server_failures: u32,
}

/// Wraps any client with [`RetryPolicy`].
pub struct RetryingLlmClient<C> {
    inner: C,
    policy: RetryPolicy,
    label: &'static str,
}

impl<C: LlmClient> RetryingLlmClient<C> {
    pub fn new(inner: C, policy: RetryPolicy, label: &'static str) -> Self {
        Self { inner, policy, label }
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RetryingLlmClient<C> {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let mut attempts = AttemptCounts::default();

        loop {
            let error = match self.inner.complete(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(error) => error,
            };

            match &error {
                LlmError::RateLimitExceeded => attempts.rate_limited += 1,
                LlmError::ServerError { .. } | LlmError::Transport(_) => {
                    attempts.server_failures += 1
                }
                _ => {}
            }

            let Some(delay) = self.policy.next_delay(&error, &attempts) else {
                return Err(error);
            };

            warn!(
                event_name = "assistant.llm.retry",
                client = self.label,
                rate_limited = attempts.rate_limited,
                server_failures = attempts.server_failures,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying language model call"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Replays canned results in order. Once the script runs out every call
/// fails with a transport error.
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlmClient {
    pub fn new(script: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), prompts: Mutex::default() }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or_default()
    }

    /// `(system, user)` pairs seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system_prompt.to_string(), user_prompt.to_string()));
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".to_string())))
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        (**self).complete(system_prompt, user_prompt).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{
        classify_status, LlmClient, LlmError, RetryPolicy, RetryingLlmClient, ScriptedLlmClient,
    };

    fn retrying(script: Vec<Result<String, LlmError>>) -> (Arc<ScriptedLlmClient>, RetryingLlmClient<Arc<ScriptedLlmClient>>) {
        let scripted = Arc::new(ScriptedLlmClient::new(script));
        let client =
            RetryingLlmClient::new(scripted.clone(), RetryPolicy::without_backoff(), "test");
        (scripted, client)
    }

    #[tokio::test]
    async fn rate_limit_gives_up_after_three_attempts() {
        let (scripted, client) = retrying(vec![
            Err(LlmError::RateLimitExceeded),
            Err(LlmError::RateLimitExceeded),
            Err(LlmError::RateLimitExceeded),
            Ok("never reached".to_string()),
        ]);

        let result = client.complete("system", "user").await;

        assert_eq!(result, Err(LlmError::RateLimitExceeded));
        assert_eq!(scripted.calls(), 3);
    }

    #[tokio::test]
    async fn server_errors_are_retried_twice_then_surface() {
        let (scripted, client) = retrying(vec![
            Err(LlmError::ServerError { status: 502 }),
            Err(LlmError::Transport("reset".to_string())),
            Err(LlmError::ServerError { status: 503 }),
        ]);

        let result = client.complete("system", "user").await;

        assert_eq!(result, Err(LlmError::ServerError { status: 503 }));
        assert_eq!(scripted.calls(), 3);
    }

    #[tokio::test]
    async fn invalid_credentials_fail_without_retry() {
        let (scripted, client) =
            retrying(vec![Err(LlmError::InvalidCredentials), Ok("unused".to_string())]);

        assert_eq!(client.complete("system", "user").await, Err(LlmError::InvalidCredentials));
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry() {
        let (scripted, client) =
            retrying(vec![Err(LlmError::RateLimitExceeded), Ok("hola".to_string())]);

        assert_eq!(client.complete("system", "user").await, Ok("hola".to_string()));
        assert_eq!(scripted.calls(), 2);
    }

    #[test]
    fn backoff_doubles_for_rate_limits_and_stays_flat_for_server_errors() {
        let policy = RetryPolicy::default();
        let mut counts = super::AttemptCounts { rate_limited: 1, server_failures: 0 };
        assert_eq!(
            policy.next_delay(&LlmError::RateLimitExceeded, &counts),
            Some(Duration::from_secs(1))
        );
        counts.rate_limited = 2;
        assert_eq!(
            policy.next_delay(&LlmError::RateLimitExceeded, &counts),
            Some(Duration::from_secs(2))
        );
        counts.rate_limited = 3;
        assert_eq!(policy.next_delay(&LlmError::RateLimitExceeded, &counts), None);

        counts.server_failures = 2;
        assert_eq!(
            policy.next_delay(&LlmError::ServerError { status: 500 }, &counts),
            Some(Duration::from_secs(1))
        );
        counts.server_failures = 3;
        assert_eq!(policy.next_delay(&LlmError::ServerError { status: 500 }, &counts), None);
    }

    #[test]
    fn status_codes_map_to_typed_errors() {
        assert_eq!(classify_status(401, ""), LlmError::InvalidCredentials);
        assert_eq!(classify_status(429, ""), LlmError::RateLimitExceeded);
        assert_eq!(classify_status(503, ""), LlmError::ServerError { status: 503 });
        assert!(matches!(classify_status(400, "bad"), LlmError::InvalidResponse(_)));
    }
}
