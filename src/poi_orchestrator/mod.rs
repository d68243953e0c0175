/*
 * src/poi_orchestrator/mod.rs
 *
 * POI Orchestrator (C6) + Shared State & Reducers (C8) for `PoiState`.
 *
 * Purpose:
 *   Keyword extraction -> parallel web/vector search -> per-hit
 *   summarize+validate+persist -> rerank -> merge, with each branch
 *   bracketed by tool_trace events for observability.
 */

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::domain::poi::{PoiCandidate, PoiRecord, PoiSource};
use crate::domain::summary::PoiSummary;
use crate::llm::LlmClient;
use crate::places::PlacesValidator;
use crate::search::WebSearchAdapter;
use crate::tool_trace;
use crate::vector::VectorIndex;

const PROCESS_HIT_CONCURRENCY: usize = 5;

/// State record for one POI-discovery run (§4.8). `poi_data_map` is the only
/// field with a declared reducer (map union, incoming wins); every other
/// field is written by exactly one branch, enforced by the graph topology
/// below rather than a runtime check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoiState {
	pub persona: String,
	pub destination: String,
	pub keywords: Vec<String>,
	pub web_results: Vec<PoiCandidate>,
	pub vector_results: Vec<PoiCandidate>,
	pub reranked_web: Vec<PoiCandidate>,
	pub reranked_vector: Vec<PoiCandidate>,
	pub merged: Vec<PoiCandidate>,
	pub poi_data_map: HashMap<String, PoiRecord>,
	pub final_poi_data: Vec<PoiRecord>,
}

impl PoiState {
	/// Map-union reducer for `poi_data_map`: incoming entries win on key
	/// collision. Commutative over disjoint key sets, which is all that §8
	/// requires (colliding entries describe the same `poi_id`).
	pub fn merge_poi_data_map(
		existing: HashMap<String, PoiRecord>,
		incoming: HashMap<String, PoiRecord>,
	) -> HashMap<String, PoiRecord> {
		let mut merged = existing;
		merged.extend(incoming);
		merged
	}
}

pub struct PoiOrchestrator {
	llm: Arc<dyn LlmClient>,
	vector_index: Arc<dyn VectorIndex>,
	web_search: Arc<WebSearchAdapter>,
	places: Arc<PlacesValidator>,
	config: EngineConfig,
}

impl PoiOrchestrator {
	pub fn new(
		llm: Arc<dyn LlmClient>,
		vector_index: Arc<dyn VectorIndex>,
		web_search: Arc<WebSearchAdapter>,
		places: Arc<PlacesValidator>,
		config: EngineConfig,
	) -> Self {
		Self { llm, vector_index, web_search, places, config }
	}

	/// Runs the full discovery graph for `(persona, destination)` and
	/// returns the final, validated POI list. Every collaborator failure
	/// degrades locally; this call never fails as a whole.
	pub async fn run(&self, persona: &str, destination: &str) -> Vec<PoiRecord> {
		let mut state = PoiState { persona: persona.to_string(), destination: destination.to_string(), ..Default::default() };

		state.keywords = self.extract_keywords(persona, destination).await;
		if state.keywords.is_empty() {
			return Vec::new();
		}

		tool_trace!(agent: "poi", tool: "fan_out", status: "start");
		let (web_branch, vector_branch) = tokio::join!(
			self.run_web_branch(&state.keywords, persona, destination),
			self.run_vector_branch(&state.keywords, destination),
		);
		tool_trace!(agent: "poi", tool: "fan_out", status: "success");

		let (web_results, reranked_web, web_poi_map) = web_branch;
		let (vector_results, reranked_vector, vector_poi_map) = vector_branch;

		state.web_results = web_results;
		state.vector_results = vector_results;
		state.reranked_web = reranked_web;
		state.reranked_vector = reranked_vector;
		state.poi_data_map = PoiState::merge_poi_data_map(web_poi_map, vector_poi_map);

		self.merge_results(&mut state);

		state.final_poi_data
	}

	/// **extract_keywords(persona)** -> 5-10 short keywords. On LLM failure,
	/// returns the destination alone as a single keyword rather than failing
	/// the run.
	async fn extract_keywords(&self, persona: &str, destination: &str) -> Vec<String> {
		tool_trace!(agent: "poi", tool: "extract_keywords", status: "start");
		let prompt = format!(
			"Extract 5 to 10 short search keywords for finding points of interest, \
			 given this traveler persona and destination. Respond with a JSON array \
			 of strings only.\n\nPersona: {persona}\nDestination: {destination}"
		);

		let schema = json!({
			"type": "object",
			"properties": { "keywords": { "type": "array", "items": { "type": "string" } } },
			"required": ["keywords"]
		});

		match self.llm.complete_structured(&prompt, schema).await {
			Ok(value) => {
				let keywords: Vec<String> = value
					.get("keywords")
					.and_then(|v| v.as_array())
					.map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
					.unwrap_or_default();

				if keywords.is_empty() {
					tool_trace!(agent: "poi", tool: "extract_keywords", status: "error", details: "empty keyword list, falling back to destination");
					vec![destination.to_string()]
				} else {
					tool_trace!(agent: "poi", tool: "extract_keywords", status: "success");
					keywords
				}
			}
			Err(e) => {
				warn!(target: "poi_orchestrator", error = %e, "keyword extraction failed, falling back to destination");
				tool_trace!(agent: "poi", tool: "extract_keywords", status: "error", details: format!("{e}"));
				vec![destination.to_string()]
			}
		}
	}

	/// `web_search -> process_web_results -> rerank_web` branch.
	async fn run_web_branch(
		&self,
		keywords: &[String],
		persona: &str,
		destination: &str,
	) -> (Vec<PoiCandidate>, Vec<PoiCandidate>, HashMap<String, PoiRecord>) {
		tool_trace!(agent: "web", tool: "web_search", status: "start");
		let hits = self
			.web_search
			.search_multi(keywords, self.config.web_search_k)
			.await;
		tool_trace!(agent: "web", tool: "web_search", status: "success");

		tool_trace!(agent: "web", tool: "process_web_results", status: "start");
		let (candidates, poi_data_map) = self.process_web_results(hits, persona, destination).await;
		tool_trace!(agent: "web", tool: "process_web_results", status: "success");

		tool_trace!(agent: "web", tool: "rerank_web", status: "start");
		let reranked = self.rerank(candidates.clone(), persona).await;
		tool_trace!(agent: "web", tool: "rerank_web", status: "success");

		(candidates, reranked, poi_data_map)
	}

	/// **process_web_results**: per hit, concurrently (bounded by a
	/// semaphore of 5), summarize -> validate -> persist -> emit. A hit that
	/// fails summarization or validation is skipped, never aborts the batch.
	async fn process_web_results(
		&self,
		hits: Vec<PoiCandidate>,
		persona: &str,
		destination: &str,
	) -> (Vec<PoiCandidate>, HashMap<String, PoiRecord>) {
		let semaphore = Arc::new(Semaphore::new(PROCESS_HIT_CONCURRENCY));
		let tasks = hits.into_iter().map(|hit| {
			let semaphore = Arc::clone(&semaphore);
			async move {
				let _permit = semaphore.acquire().await.expect("semaphore not closed");
				self.process_single_hit(hit, persona, destination).await
			}
		});

		let results = futures::future::join_all(tasks).await;

		let mut candidates = Vec::new();
		let mut poi_data_map = HashMap::new();
		for result in results.into_iter().flatten() {
			let (candidate, record) = result;
			poi_data_map.insert(record.poi_id.clone(), record);
			candidates.push(candidate);
		}
		(candidates, poi_data_map)
	}

	async fn process_single_hit(
		&self,
		hit: PoiCandidate,
		persona: &str,
		destination: &str,
	) -> Option<(PoiCandidate, PoiRecord)> {
		let summary = self.summarize_single(&hit, persona).await?;

		let record = match self
			.places
			.map(&summary, destination, hit.source_url.as_deref(), true)
			.await
		{
			Ok(Some(record)) => record,
			Ok(None) => return None,
			Err(e) => {
				debug!(target: "poi_orchestrator", error = %e, "places validation failed, skipping hit");
				return None;
			}
		};

		if let Err(e) = self.vector_index.add(record.clone()).await {
			warn!(target: "poi_orchestrator", error = %e, "vector index add failed, continuing without persistence");
		}

		let mut emitted = hit;
		emitted.poi_id = Some(record.poi_id.clone());
		Some((emitted, record))
	}

	async fn summarize_single(&self, hit: &PoiCandidate, persona: &str) -> Option<PoiSummary> {
		let prompt = format!(
			"Summarize this point-of-interest candidate for a traveler with persona \
			 \"{persona}\". Title: {}\nSnippet: {}",
			hit.title, hit.snippet
		);
		let schema = json!({
			"type": "object",
			"properties": {
				"summary": { "type": "string" },
				"highlights": { "type": "array", "items": { "type": "string" } },
				"name": { "type": "string" },
				"category": { "type": "string" }
			},
			"required": ["summary", "name"]
		});

		match self.llm.complete_structured(&prompt, schema).await {
			Ok(value) => serde_json::from_value(json!({
				"summary": value.get("summary").and_then(|v| v.as_str()).unwrap_or_default(),
				"highlights": value.get("highlights").cloned().unwrap_or(json!([])),
				"poi_id": hit.poi_id,
				"name": value.get("name").and_then(|v| v.as_str()).unwrap_or(&hit.title),
				"category": value.get("category").and_then(|v| v.as_str()).unwrap_or("other"),
			}))
			.ok(),
			Err(e) => {
				debug!(target: "poi_orchestrator", error = %e, "summarization failed, skipping hit");
				None
			}
		}
	}

	/// `vector_search` branch: per-keyword `search_by_text`, deduplicate by
	/// `poi_id`, no rerank needed before this point since relevance already
	/// comes from the store; `rerank_vector` still applies the LLM score per
	/// the node contract.
	async fn run_vector_branch(
		&self,
		keywords: &[String],
		destination: &str,
	) -> (Vec<PoiCandidate>, Vec<PoiCandidate>, HashMap<String, PoiRecord>) {
		tool_trace!(agent: "vector", tool: "vector_search", status: "start");
		let mut seen_ids = std::collections::HashSet::new();
		let mut candidates = Vec::new();
		let mut poi_data_map = HashMap::new();

		for keyword in keywords {
			let hits = self
				.vector_index
				.search_by_text(keyword, self.config.embedding_k, Some(destination))
				.await
				.unwrap_or_else(|e| {
					warn!(target: "poi_orchestrator", error = %e, "vector search failed, degrading to empty");
					Vec::new()
				});

			for (candidate, record) in hits {
				if !seen_ids.insert(record.poi_id.clone()) {
					continue;
				}
				poi_data_map.insert(record.poi_id.clone(), record);
				candidates.push(candidate);
			}
		}
		tool_trace!(agent: "vector", tool: "vector_search", status: "success");

		tool_trace!(agent: "vector", tool: "rerank_vector", status: "start");
		let reranked = self.rerank(candidates.clone(), "").await;
		tool_trace!(agent: "vector", tool: "rerank_vector", status: "success");

		(candidates, reranked, poi_data_map)
	}

	/// LLM scores each candidate in `[0,1]`; sorts descending; keeps top
	/// `rerank_top_n`. On LLM failure, passes through the original top-n
	/// unscored.
	async fn rerank(&self, candidates: Vec<PoiCandidate>, persona: &str) -> Vec<PoiCandidate> {
		if candidates.is_empty() {
			return candidates;
		}

		let prompt = format!(
			"Score each of these {} candidates in [0,1] for relevance to persona \"{persona}\". \
			 Respond with a JSON array of numbers in the same order.",
			candidates.len()
		);
		let schema = json!({
			"type": "object",
			"properties": { "scores": { "type": "array", "items": { "type": "number" } } },
			"required": ["scores"]
		});

		let scores: Option<Vec<f64>> = match self.llm.complete_structured(&prompt, schema).await {
			Ok(value) => value
				.get("scores")
				.and_then(|v| v.as_array())
				.map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect())
				.filter(|scores: &Vec<f64>| scores.len() == candidates.len()),
			Err(_) => None,
		};

		let mut scored: Vec<PoiCandidate> = match scores {
			Some(scores) => candidates
				.into_iter()
				.zip(scores)
				.map(|(mut c, score)| {
					c.relevance = score.clamp(0.0, 1.0);
					c
				})
				.collect(),
			None => candidates,
		};

		scored.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
		scored.truncate(self.config.rerank_top_n);
		scored
	}

	/// **merge_results**: weighted combine of `reranked_web`/`reranked_vector`
	/// on shared `poi_id`s, dedup by `poi_id` then URL, sort, truncate,
	/// rehydrate `final_poi_data` from `poi_data_map`.
	fn merge_results(&self, state: &mut PoiState) {
		tool_trace!(agent: "poi", tool: "merge_results", status: "start");

		let mut by_key: HashMap<String, PoiCandidate> = HashMap::new();
		let mut scores: HashMap<String, f64> = HashMap::new();

		for candidate in &state.reranked_web {
			let key = merge_key(candidate);
			scores.insert(key.clone(), self.config.web_weight * candidate.relevance);
			by_key.insert(key, candidate.clone());
		}

		for candidate in &state.reranked_vector {
			let key = merge_key(candidate);
			let contribution = self.config.embedding_weight * candidate.relevance;
			scores
				.entry(key.clone())
				.and_modify(|s| *s += contribution)
				.or_insert(contribution);
			by_key.entry(key).or_insert_with(|| candidate.clone());
		}

		let mut merged: Vec<(String, PoiCandidate)> = by_key.into_iter().collect();
		merged.sort_by(|(ka, _), (kb, _)| {
			scores.get(kb).unwrap_or(&0.0).total_cmp(scores.get(ka).unwrap_or(&0.0)).then_with(|| ka.cmp(kb))
		});
		merged.truncate(self.config.final_poi_count);

		state.merged = merged.iter().map(|(_, c)| c.clone()).collect();
		state.final_poi_data = merged
			.into_iter()
			.filter_map(|(_, c)| c.poi_id.and_then(|id| state.poi_data_map.get(&id).cloned()))
			.collect();

		tool_trace!(agent: "poi", tool: "merge_results", status: "success");
	}
}

/// Dedup key: `poi_id` when present, else the source URL, else the title
/// (for candidates that somehow carry neither, which should not happen past
/// places validation but keeps the merge total).
fn merge_key(candidate: &PoiCandidate) -> String {
	candidate
		.poi_id
		.clone()
		.or_else(|| candidate.source_url.clone())
		.unwrap_or_else(|| candidate.title.clone())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn record(id: &str) -> PoiRecord {
		PoiRecord {
			poi_id: id.to_string(),
			name: id.to_string(),
			category: crate::domain::poi::PoiCategory::Other,
			description: String::new(),
			address: None,
			city: None,
			coordinates: None,
			google_place_id: None,
			rating: None,
			rating_count: None,
			price_level: None,
			opening_hours: None,
			raw_text: String::new(),
			types: None,
			source: PoiSource::Web,
			created_at: Utc::now(),
		}
	}

	#[test]
	fn merge_poi_data_map_prefers_incoming_on_collision() {
		let mut existing = HashMap::new();
		existing.insert("a".to_string(), record("a"));
		let mut incoming = HashMap::new();
		let mut replacement = record("a");
		replacement.name = "updated".to_string();
		incoming.insert("a".to_string(), replacement);

		let merged = PoiState::merge_poi_data_map(existing, incoming);
		assert_eq!(merged.get("a").unwrap().name, "updated");
	}

	#[test]
	fn merge_poi_data_map_is_commutative_over_disjoint_keys() {
		let mut a = HashMap::new();
		a.insert("a".to_string(), record("a"));
		let mut b = HashMap::new();
		b.insert("b".to_string(), record("b"));

		let ab = PoiState::merge_poi_data_map(a.clone(), b.clone());
		let ba = PoiState::merge_poi_data_map(b, a);
		assert_eq!(ab.len(), ba.len());
		assert_eq!(ab.get("a").unwrap().poi_id, ba.get("a").unwrap().poi_id);
		assert_eq!(ab.get("b").unwrap().poi_id, ba.get("b").unwrap().poi_id);
	}
}
