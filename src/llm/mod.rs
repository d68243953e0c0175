/*
 * src/llm/mod.rs
 *
 * LLM Client (C1)
 *
 * Purpose:
 *   Trait contract for the engine's LLM collaborator, plus a deterministic
 *   mock used by tests and the two reqwest-backed providers.
 */

pub mod guided;
pub mod openai;
pub mod schema;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::LLMError;

/// Cancellable operations an LLM provider must support.
///
/// `stream` is finite and not restartable: it terminates on an end-of-stream
/// marker, and a consumer may stop polling early, which drops the underlying
/// request and cancels it via the provider's cancellation token.
#[async_trait]
pub trait LlmClient: Send + Sync {
	async fn complete(&self, prompt: &str) -> Result<String, LLMError>;

	async fn stream(
		&self,
		prompt: &str,
	) -> Result<Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>, LLMError>;

	/// Requests output conforming to `schema`. Implementations that support a
	/// strict JSON-schema mode recursively rewrite every object-typed schema
	/// node to `additionalProperties: false` (see [`schema::enforce_strict`])
	/// before sending, and strip ```json fences from the raw response before
	/// parsing.
	async fn complete_structured(
		&self,
		prompt: &str,
		schema: serde_json::Value,
	) -> Result<serde_json::Value, LLMError>;
}

/// Strips a single leading/trailing ```json (or bare ```) fence, if present.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
	let trimmed = raw.trim();
	let trimmed = trimmed
		.strip_prefix("```json")
		.or_else(|| trimmed.strip_prefix("```"))
		.unwrap_or(trimmed);
	trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Deterministic client for tests: always returns a fixed completion and
/// a fixed JSON value, never touches the network.
#[derive(Debug, Clone)]
pub struct MockLlmClient {
	pub completion: String,
	pub structured: serde_json::Value,
}

impl Default for MockLlmClient {
	fn default() -> Self {
		Self {
			completion: "This is a mock response for testing.".to_string(),
			structured: serde_json::json!({}),
		}
	}
}

#[async_trait]
impl LlmClient for MockLlmClient {
	async fn complete(&self, _prompt: &str) -> Result<String, LLMError> {
		Ok(self.completion.clone())
	}

	async fn stream(
		&self,
		_prompt: &str,
	) -> Result<Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>, LLMError> {
		let chunk = self.completion.clone();
		Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
	}

	async fn complete_structured(
		&self,
		_prompt: &str,
		_schema: serde_json::Value,
	) -> Result<serde_json::Value, LLMError> {
		Ok(self.structured.clone())
	}
}
