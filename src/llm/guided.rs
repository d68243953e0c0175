/*
 * src/llm/guided.rs
 *
 * No-auth, guided-decoding LLM provider for self-hosted/open endpoints.
 *
 * Purpose:
 *   Same retry/backoff shape as `openai.rs`, but with no bearer token and a
 *   `guided_json` request field instead of `response_format` for providers
 *   (vLLM, TGI) that enforce schemas via guided decoding rather than strict
 *   JSON-schema mode.
 */

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{LlmClient, strip_code_fence};
use crate::error::LLMError;

pub struct GuidedLlmClient {
	client: Client,
	base_url: String,
	model: String,
	max_retries: u32,
	max_tokens: u32,
	temperature: f32,
	top_p: f32,
	timeout: std::time::Duration,
}

impl GuidedLlmClient {
	pub fn new(
		base_url: String,
		model: String,
		max_retries: u32,
		max_tokens: u32,
		temperature: f32,
		top_p: f32,
		timeout: std::time::Duration,
	) -> Self {
		Self {
			client: Client::new(),
			base_url: base_url.trim_end_matches('/').to_string(),
			model,
			max_retries,
			max_tokens,
			temperature,
			top_p,
			timeout,
		}
	}

	fn is_retryable_status(status: StatusCode) -> bool {
		matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
	}

	async fn send_once(&self, body: &CompletionRequest<'_>) -> Result<String, LLMError> {
		let url = format!("{}/chat/completions", self.base_url);
		let send = self.client.post(&url).json(body).send();

		let response = tokio::time::timeout(self.timeout, send)
			.await
			.map_err(|_| LLMError::Timeout)?
			.map_err(|_| LLMError::Upstream5xx(0))?;

		let status = response.status();
		let text = response.text().await.unwrap_or_default();

		if !status.is_success() {
			if status.as_u16() == 503 || Self::is_retryable_status(status) {
				return Err(LLMError::Upstream5xx(status.as_u16()));
			}
			return Err(LLMError::BadResponse(text));
		}

		let parsed: CompletionResponse =
			serde_json::from_str(&text).map_err(|e| LLMError::BadResponse(e.to_string()))?;
		parsed
			.choices
			.into_iter()
			.next()
			.and_then(|c| c.message.content)
			.ok_or_else(|| LLMError::BadResponse("no choices in response".to_string()))
	}

	async fn retrying<T, F, Fut>(&self, attempt_fn: F) -> Result<T, LLMError>
	where
		F: Fn(u32) -> Fut,
		Fut: std::future::Future<Output = Result<T, LLMError>>,
	{
		let mut last_err = LLMError::Timeout;
		for attempt in 0..=self.max_retries {
			if attempt > 0 {
				let backoff = std::time::Duration::from_secs(2u64.saturating_pow(attempt));
				let backoff = backoff.min(self.timeout);
				warn!(attempt, ?backoff, "retrying LLM request");
				tokio::time::sleep(backoff).await;
			}
			match attempt_fn(attempt).await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_retryable() && attempt < self.max_retries => {
					last_err = e;
					continue;
				}
				Err(e) => return Err(e),
			}
		}
		Err(last_err)
	}
}

#[async_trait]
impl LlmClient for GuidedLlmClient {
	async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
		let body = CompletionRequest {
			model: &self.model,
			messages: &[ChatMessage { role: "user", content: prompt }],
			max_tokens: self.max_tokens,
			temperature: self.temperature,
			top_p: self.top_p,
			guided_json: None,
		};
		self.retrying(|_attempt| self.send_once(&body)).await
	}

	async fn stream(
		&self,
		prompt: &str,
	) -> Result<Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>, LLMError> {
		let text = self.complete(prompt).await?;
		Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
	}

	async fn complete_structured(
		&self,
		prompt: &str,
		schema: Value,
	) -> Result<Value, LLMError> {
		// Guided decoding constrains tokens directly from the raw schema; no
		// `additionalProperties` rewrite is needed since the grammar is
		// derived from the schema at the sampler, not validated after the
		// fact.
		let body = CompletionRequest {
			model: &self.model,
			messages: &[ChatMessage { role: "user", content: prompt }],
			max_tokens: self.max_tokens,
			temperature: self.temperature,
			top_p: self.top_p,
			guided_json: Some(schema),
		};

		self.retrying(|_attempt| async {
			let text = self.send_once(&body).await?;
			let cleaned = strip_code_fence(&text);
			serde_json::from_str(cleaned).map_err(|e| LLMError::SchemaViolation(e.to_string()))
		})
		.await
	}
}

#[derive(Serialize)]
struct ChatMessage<'a> {
	role: &'a str,
	content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
	model: &'a str,
	messages: &'a [ChatMessage<'a>],
	max_tokens: u32,
	temperature: f32,
	top_p: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	guided_json: Option<Value>,
}

#[derive(Deserialize)]
struct CompletionResponse {
	choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
	message: MessageResponse,
}

#[derive(Deserialize)]
struct MessageResponse {
	content: Option<String>,
}
