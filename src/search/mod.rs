/*
 * src/search/mod.rs
 *
 * Web Search Adapter (C3)
 *
 * Purpose:
 *   Thin client over a web search API. Missing credentials degrade to an
 *   empty result set rather than a hard failure -- this adapter never
 *   fails the pipeline.
 */

use std::collections::HashSet;

use futures::future;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::poi::{PoiCandidate, PoiSource};
use crate::error::WebSearchUnavailable;

pub struct WebSearchAdapter {
	client: Client,
	api_key: Option<String>,
	base_url: String,
}

impl WebSearchAdapter {
	pub fn new(api_key: Option<String>) -> Self {
		Self {
			client: Client::new(),
			api_key,
			base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
		}
	}

	pub async fn search(&self, query: &str, n: usize) -> Result<Vec<PoiCandidate>, WebSearchUnavailable> {
		let Some(api_key) = &self.api_key else {
			debug!(target: "web_search", query, "no API key configured, returning empty result");
			return Ok(Vec::new());
		};

		let response = self
			.client
			.get(&self.base_url)
			.header("X-Subscription-Token", api_key)
			.query(&[("q", query), ("count", &n.to_string())])
			.send()
			.await
			.map_err(|e| WebSearchUnavailable(e.to_string()))?;

		if !response.status().is_success() {
			return Err(WebSearchUnavailable(format!(
				"search API returned {}",
				response.status()
			)));
		}

		let body: SearchResponse = response
			.json()
			.await
			.map_err(|e| WebSearchUnavailable(e.to_string()))?;

		Ok(body
			.web
			.results
			.into_iter()
			.take(n)
			.enumerate()
			.map(|(idx, hit)| PoiCandidate {
				title: hit.title,
				snippet: hit.description.unwrap_or_default(),
				source_url: Some(hit.url),
				source: PoiSource::Web,
				relevance: 1.0 - (idx as f64 / n.max(1) as f64) * 0.5,
				poi_id: None,
			})
			.collect())
	}

	/// Concurrent fan-out over `queries` (grounded on `agent/tools/constraint.rs`'s
	/// `future::join_all` concurrent-evaluation pattern); failed/empty queries
	/// contribute nothing rather than aborting the whole fan-out. Results are
	/// deduplicated by `source_url` and sorted descending by `relevance`.
	pub async fn search_multi(&self, queries: &[String], per_query: usize) -> Vec<PoiCandidate> {
		let tasks = queries.iter().map(|q| async move {
			self.search(q, per_query).await.unwrap_or_default()
		});

		let mut seen_urls: HashSet<String> = HashSet::new();
		let mut merged: Vec<PoiCandidate> = Vec::new();

		for hits in future::join_all(tasks).await {
			for hit in hits {
				if let Some(url) = &hit.source_url {
					if !seen_urls.insert(url.clone()) {
						continue;
					}
				}
				merged.push(hit);
			}
		}

		merged.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
		merged
	}
}

#[derive(Deserialize)]
struct SearchResponse {
	web: WebResults,
}

#[derive(Deserialize)]
struct WebResults {
	#[serde(default)]
	results: Vec<WebHit>,
}

#[derive(Deserialize)]
struct WebHit {
	title: String,
	url: String,
	description: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn missing_api_key_returns_empty_result() {
		let adapter = WebSearchAdapter::new(None);
		let result = adapter.search("Euljiro snails", 5).await.unwrap();
		assert!(result.is_empty());
	}

	#[tokio::test]
	async fn search_multi_with_no_credentials_is_empty_not_failing() {
		let adapter = WebSearchAdapter::new(None);
		let result = adapter
			.search_multi(&["a".to_string(), "b".to_string()], 3)
			.await;
		assert!(result.is_empty());
	}
}
