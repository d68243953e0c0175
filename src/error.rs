/*
 * src/error.rs
 *
 * Error taxonomy for the travel-plan generation engine.
 *
 * Purpose:
 *   Tagged error variants for each external collaborator (C1-C5), matching
 *   the degrade-locally policy: only LLM exhaustion during keyword
 *   extraction/planning ever fails a whole orchestrator run.
 */

use thiserror::Error;

/// Kinds of LLM failure after the retry budget (C1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LLMError {
	#[error("LLM request timed out")]
	Timeout,
	#[error("LLM returned an unparseable response: {0}")]
	BadResponse(String),
	#[error("LLM upstream returned a 5xx error: {0}")]
	Upstream5xx(u16),
	#[error("LLM structured output violated the requested schema: {0}")]
	SchemaViolation(String),
	#[error("LLM request was cancelled")]
	Cancelled,
}

impl LLMError {
	/// Whether this failure is worth retrying: 5xx, connection errors,
	/// malformed JSON in `complete_structured`; 503 is always retried.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			LLMError::Timeout | LLMError::Upstream5xx(_) | LLMError::SchemaViolation(_)
		)
	}
}

/// Raised inside per-hit POI processing (C4); always caught and logged at
/// the node boundary, the hit is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("places validation failed for '{query}': {reason}")]
pub struct PoiValidationError {
	pub query: String,
	pub reason: String,
}

/// Web search adapter failure (C3); the pipeline degrades to an empty list
/// and never propagates this as a hard failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("web search unavailable: {0}")]
pub struct WebSearchUnavailable(pub String);

/// Directions API failure (C5); the caller receives a sentinel zero-transfer
/// instead of this error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("directions unavailable: {0}")]
pub struct DirectionsUnavailable(pub String);

/// Vector index failure (C2). Reads degrade to empty results; writes are
/// best-effort and this error is logged, not propagated to the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorIndexError {
	#[error("vector index connection failed: {0}")]
	Connection(String),
	#[error("vector index query failed: {0}")]
	Query(String),
	#[error("failed to (de)serialize vector index metadata: {0}")]
	Metadata(String),
}

/// Raised only when the LLM is entirely unavailable during keyword
/// extraction or itinerary planning after retries are exhausted -- the one
/// case where an orchestrator fails as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("core engine unavailable: {0}")]
pub struct CoreUnavailable(pub String);
