// Copyright 2025 Medicontent Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! LLM client abstraction for the judge and the patch generator

use async_trait::async_trait;
use medicontent_core::{LlmConfig, LlmProvider, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str =
    "You are an expert medical-advertising and SEO reviewer. Respond only with valid JSON.";

/// Trait for LLM clients used by the judge and the regeneration step
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a single composed prompt and return the raw completion text
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LLMError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimitExceeded | LLMError::Timeout(_) | LLMError::Http(_)
        )
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LLMError::RateLimitExceeded);
    }
    let error_text = response.text().await?;
    Err(LLMError::ApiError(format!("{status}: {error_text}")))
}

fn token_count(value: &serde_json::Value) -> u32 {
    value.as_u64().unwrap_or(0) as u32
}

/// OpenAI-compatible chat-completions client
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        let usage_data = &response_data["usage"];
        let usage = TokenUsage {
            prompt_tokens: token_count(&usage_data["prompt_tokens"]),
            completion_tokens: token_count(&usage_data["completion_tokens"]),
            total_tokens: token_count(&usage_data["total_tokens"]),
        };

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Google Gemini `generateContent` client
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.0,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": { "temperature": self.temperature }
        });

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let response_data: serde_json::Value = response.json().await?;

        // Candidates may split the answer across several parts
        let parts = response_data["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or(LLMError::InvalidResponse("Missing candidates".to_string()))?;
        let content: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect();

        let usage_data = &response_data["usageMetadata"];
        let usage = TokenUsage {
            prompt_tokens: token_count(&usage_data["promptTokenCount"]),
            completion_tokens: token_count(&usage_data["candidatesTokenCount"]),
            total_tokens: token_count(&usage_data["totalTokenCount"]),
        };

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Transport-boundary wrapper adding a per-call timeout and retry with backoff.
///
/// Scoring code never retries on its own.
pub struct RetryingClient {
    inner: Arc<dyn LLMClient>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LLMClient>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            timeout,
        }
    }
}

#[async_trait]
impl LLMClient for RetryingClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.inner.evaluate(prompt.clone()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LLMError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        model = self.inner.model_name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(model = self.inner.model_name(), attempt, "LLM call gave up");
                    return Err(err);
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the configured provider client wrapped in the retry layer
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LLMClient>, LLMError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| LLMError::ApiError("missing API key".to_string()))?;

    let base: Arc<dyn LLMClient> = match config.provider {
        LlmProvider::OpenAi => {
            let mut client = OpenAIClient::new(api_key, config.model.clone())
                .with_temperature(config.temperature);
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(client)
        }
        LlmProvider::Gemini => {
            let mut client = GeminiClient::new(api_key, config.model.clone())
                .with_temperature(config.temperature);
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(client)
        }
    };

    Ok(Arc::new(RetryingClient::new(
        base,
        RetryPolicy::with_retries(config.max_retries),
        Duration::from_secs(config.timeout_secs),
    )))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted client replaying canned results in order
    pub(crate) struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LLMError>>>,
        prompts: Mutex<Vec<String>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedClient {
        pub(crate) fn new(replies: Vec<Result<String, LLMError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        /// Prompts received so far, in call order
        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt);
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::ApiError("script exhausted".into())));
            next.map(|content| LLMResponse {
                content,
                usage: TokenUsage::default(),
                model: "scripted".into(),
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::with_retries(retries).with_initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retrying_client_recovers_from_rate_limit() {
        let inner = Arc::new(ScriptedClient::new(vec![
            Err(LLMError::RateLimitExceeded),
            Ok("{\"ok\": true}".into()),
        ]));
        let client = RetryingClient::new(inner.clone(), fast_policy(2), Duration::from_secs(5));

        let response = client.evaluate("prompt".into()).await.unwrap();
        assert_eq!(response.content, "{\"ok\": true}");
        assert_eq!(inner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retrying_client_does_not_retry_invalid_response() {
        let inner = Arc::new(ScriptedClient::new(vec![
            Err(LLMError::InvalidResponse("garbage".into())),
            Ok("never reached".into()),
        ]));
        let client = RetryingClient::new(inner.clone(), fast_policy(3), Duration::from_secs(5));

        let err = client.evaluate("prompt".into()).await.unwrap_err();
        assert!(matches!(err, LLMError::InvalidResponse(_)));
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retrying_client_stops_after_budget() {
        let inner = Arc::new(ScriptedClient::new(vec![
            Err(LLMError::RateLimitExceeded),
            Err(LLMError::RateLimitExceeded),
            Err(LLMError::RateLimitExceeded),
        ]));
        let client = RetryingClient::new(inner.clone(), fast_policy(1), Duration::from_secs(5));

        let err = client.evaluate("prompt".into()).await.unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded));
        assert_eq!(inner.call_count(), 2);
    }

    struct SlowClient;

    #[async_trait]
    impl LLMClient for SlowClient {
        async fn evaluate(&self, _prompt: String) -> Result<LLMResponse, LLMError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(LLMError::ApiError("unreachable".into()))
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_retrying_client_times_out() {
        let client = RetryingClient::new(
            Arc::new(SlowClient),
            RetryPolicy::none(),
            Duration::from_millis(20),
        );
        let err = client.evaluate("prompt".into()).await.unwrap_err();
        assert!(matches!(err, LLMError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_openai_client_parses_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"message": {"content": "{\"scores\": {\"1\": 2}}"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("test-key".into(), "gpt-4o-mini".into())
            .with_base_url(server.url());
        let response = client.evaluate("judge this".into()).await.unwrap();

        assert_eq!(response.content, "{\"scores\": {\"1\": 2}}");
        assert_eq!(response.usage.total_tokens, 15);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_client_maps_429_to_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client =
            OpenAIClient::new("k".into(), "gpt-4o-mini".into()).with_base_url(server.url());
        let err = client.evaluate("x".into()).await.unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_gemini_client_joins_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-1.5-pro:generateContent")
            .match_header("x-goog-api-key", "g-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{"content": {"parts": [{"text": "{\"tips\": "}, {"text": "[]}"}]}}],
                    "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3, "totalTokenCount": 10}
                }"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::new("g-key".into(), "gemini-1.5-pro".into())
            .with_base_url(server.url());
        let response = client.evaluate("judge".into()).await.unwrap();

        assert_eq!(response.content, "{\"tips\": []}");
        assert_eq!(response.usage.prompt_tokens, 7);
        mock.assert_async().await;
    }

    #[test]
    fn test_client_from_config_requires_key() {
        let config = LlmConfig::default();
        assert!(client_from_config(&config).is_err());

        let config = LlmConfig {
            api_key: Some("k".into()),
            ..LlmConfig::default()
        };
        let client = client_from_config(&config).unwrap();
        assert_eq!(client.model_name(), "gemini-1.5-pro");
    }
}
