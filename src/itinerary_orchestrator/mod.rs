/*
 * src/itinerary_orchestrator/mod.rs
 *
 * Itinerary Orchestrator (C7) + Shared State (C8) for `ItinState`.
 *
 * Purpose:
 *   Fixed-point refinement loop: a sufficiency gate tops up thin POI lists
 *   via the POI orchestrator, then a bounded loop alternates LLM
 *   plan/refine with a rule-based task queue (legs, validate, balance)
 *   until the queue drains or the iteration budget is spent, at which
 *   point the best-seen itinerary is returned.
 */

pub mod route;
pub mod tasks;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::config::EngineConfig;
use crate::directions::TravelLegCalculator;
use crate::domain::itinerary::DayItinerary;
use crate::domain::poi::PoiRecord;
use crate::error::CoreUnavailable;
use crate::llm::LlmClient;
use crate::poi_orchestrator::PoiOrchestrator;
use crate::tool_trace;

/// Tasks the TodoAgent can queue, executed in FIFO order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskName {
	Plan,
	Legs,
	Validate,
	Balance,
	BalanceApply,
}

/// State record for one itinerary-planning run (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItinState {
	pub pois: Vec<PoiRecord>,
	pub destination: String,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub budget: f64,
	pub persona: String,

	pub itineraries: Vec<DayItinerary>,
	pub validation_feedback: Option<String>,
	pub schedule_feedback: Option<String>,
	pub iteration_count: u32,
	pub previous_poi_hash: Option<u64>,
	pub poi_enrich_attempts: u32,
	pub is_poi_sufficient: bool,
	pub is_poi_changed: bool,

	pub task_queue: Vec<TaskName>,
	pub current_task: Option<TaskName>,

	pub best_itineraries: Option<Vec<DayItinerary>>,
	pub best_penalty: f64,
}

pub struct ItineraryOrchestrator {
	llm: Arc<dyn LlmClient>,
	legs: Arc<TravelLegCalculator>,
	poi_orchestrator: Arc<PoiOrchestrator>,
	config: EngineConfig,
}

impl ItineraryOrchestrator {
	pub fn new(
		llm: Arc<dyn LlmClient>,
		legs: Arc<TravelLegCalculator>,
		poi_orchestrator: Arc<PoiOrchestrator>,
		config: EngineConfig,
	) -> Self {
		Self { llm, legs, poi_orchestrator, config }
	}

	/// Plans an itinerary over `[start_date, end_date]` from `pois`, topping
	/// up the POI list first if it is thin. Fails as a whole only if the LLM
	/// is unavailable for planning after its retry budget is exhausted.
	pub async fn run(
		&self,
		pois: Vec<PoiRecord>,
		destination: &str,
		persona: &str,
		start_date: NaiveDate,
		end_date: NaiveDate,
		budget: f64,
	) -> Result<Vec<DayItinerary>, CoreUnavailable> {
		let mut state = ItinState {
			pois,
			destination: destination.to_string(),
			start_date,
			end_date,
			budget,
			persona: persona.to_string(),
			itineraries: Vec::new(),
			validation_feedback: None,
			schedule_feedback: None,
			iteration_count: 0,
			previous_poi_hash: None,
			poi_enrich_attempts: 0,
			is_poi_sufficient: false,
			is_poi_changed: true,
			task_queue: Vec::new(),
			current_task: None,
			best_itineraries: None,
			best_penalty: f64::INFINITY,
		};

		self.ensure_sufficient_pois(&mut state).await;

		let mut task_queue = vec![TaskName::Plan];
		for iteration in 1..=self.config.max_iterations {
			state.iteration_count = iteration;
			tool_trace!(agent: "itinerary", tool: "iteration", status: "start", details: format!("iteration {iteration}, queue {:?}", task_queue));

			let current_hash = hash_poi_ids(&state.pois);
			state.is_poi_changed = state.previous_poi_hash != Some(current_hash);
			state.previous_poi_hash = Some(current_hash);

			let mut legs_ran = false;
			for &task in &task_queue.clone() {
				state.current_task = Some(task);
				match task {
					TaskName::Plan => {
						self.run_plan(&mut state).await?;
					}
					TaskName::Legs => {
						tasks::run_legs(&mut state.itineraries, &self.legs).await;
						legs_ran = true;
					}
					TaskName::Validate => {
						let feedback = tasks::run_validate(
							&state.itineraries,
							state.budget,
							state.start_date,
							state.end_date,
							&self.config,
						);
						let demands_regeneration = feedback.is_some();
						state.validation_feedback = feedback;
						if demands_regeneration {
							break;
						}
					}
					TaskName::Balance => {
						let feedback = tasks::run_balance(&state.itineraries, &self.config);
						let demands_regeneration = feedback.is_some();
						state.schedule_feedback = feedback;
						if demands_regeneration {
							break;
						}
					}
					TaskName::BalanceApply => {
						tasks::apply_balance(&mut state.itineraries, &self.config);
					}
				}
			}
			state.current_task = None;

			if legs_ran {
				let penalty = tasks::compute_penalty(&state.itineraries, state.budget, &self.config);
				if penalty < state.best_penalty {
					state.best_penalty = penalty;
					state.best_itineraries = Some(state.itineraries.clone());
				}
			}

			task_queue = todo_agent(&state);
			tool_trace!(agent: "itinerary", tool: "iteration", status: "success");
			if task_queue.is_empty() {
				break;
			}
		}

		if state.best_itineraries.is_none() && !state.itineraries.is_empty() {
			let penalty = tasks::compute_penalty(&state.itineraries, state.budget, &self.config);
			state.best_penalty = penalty;
			state.best_itineraries = Some(state.itineraries.clone());
		}

		Ok(state.best_itineraries.unwrap_or(state.itineraries))
	}

	/// Pre-loop sufficiency gate: below `sufficiency_min_poi_count` input
	/// POIs, invokes the POI orchestrator up to `max_enrich_attempts` times,
	/// merging newly discovered POIs by `poi_id`. Proceeds with whatever is
	/// available once the attempt budget is spent.
	async fn ensure_sufficient_pois(&self, state: &mut ItinState) {
		while state.pois.len() < self.config.sufficiency_min_poi_count
			&& state.poi_enrich_attempts < self.config.max_enrich_attempts
		{
			state.poi_enrich_attempts += 1;
			tool_trace!(agent: "itinerary", tool: "enrich_pois", status: "start");
			let enriched = self.poi_orchestrator.run(&state.persona, &state.destination).await;

			let seen: HashSet<String> = state.pois.iter().map(|p| p.poi_id.clone()).collect();
			let new_pois: Vec<PoiRecord> = enriched.into_iter().filter(|p| !seen.contains(&p.poi_id)).collect();
			let added = new_pois.len();
			state.pois.extend(new_pois);
			tool_trace!(agent: "itinerary", tool: "enrich_pois", status: "success", details: format!("{added} new POIs"));
		}
		state.is_poi_sufficient = state.pois.len() >= self.config.sufficiency_min_poi_count;
	}

	/// **plan/refine**: first iteration generates a fresh day-by-day
	/// assignment; subsequent iterations refine with whichever feedback is
	/// pending. Only this LLM call can fail the run as a whole, matching the
	/// one case where `CoreUnavailable` propagates.
	async fn run_plan(&self, state: &mut ItinState) -> Result<(), CoreUnavailable> {
		tool_trace!(agent: "itinerary", tool: "plan", status: "start");

		let is_first = state.itineraries.is_empty();
		let feedback = state.validation_feedback.clone().or_else(|| state.schedule_feedback.clone());
		let prompt = build_plan_prompt(state, is_first, feedback.as_deref());

		let schema = json!({
			"type": "object",
			"properties": {
				"days": {
					"type": "array",
					"items": {
						"type": "object",
						"properties": {
							"date": { "type": "string" },
							"poi_ids": { "type": "array", "items": { "type": "string" } }
						},
						"required": ["date", "poi_ids"]
					}
				}
			},
			"required": ["days"]
		});

		match self.llm.complete_structured(&prompt, schema).await {
			Ok(value) => {
				state.itineraries = parse_plan_response(&value, &state.pois, state.start_date, state.end_date);
				state.validation_feedback = None;
				state.schedule_feedback = None;
				tool_trace!(agent: "itinerary", tool: "plan", status: "success");
				Ok(())
			}
			Err(e) => {
				tool_trace!(agent: "itinerary", tool: "plan", status: "error", details: format!("{e}"));
				Err(CoreUnavailable(format!("itinerary planning unavailable: {e}")))
			}
		}
	}
}

/// Rule-based queue population, no LLM involved. Runs FIFO; the first
/// matching rule wins.
fn todo_agent(state: &ItinState) -> Vec<TaskName> {
	if state.itineraries.is_empty() {
		return vec![TaskName::Plan];
	}

	let missing_transfers = state
		.itineraries
		.iter()
		.any(|d| d.pois.len() > 1 && d.transfers.is_empty());
	if missing_transfers || state.is_poi_changed {
		return vec![TaskName::Legs, TaskName::Validate, TaskName::Balance];
	}

	if state.validation_feedback.is_some() && state.schedule_feedback.is_none() {
		return vec![TaskName::Plan];
	}

	if state.schedule_feedback.is_some() {
		// BalanceApply moves POIs between days, so legs/duration must be
		// recomputed before validating; Balance runs again afterward so a
		// now-balanced plan clears `schedule_feedback` and the queue can
		// actually drain instead of re-dispatching this branch forever.
		return vec![TaskName::BalanceApply, TaskName::Legs, TaskName::Validate, TaskName::Balance];
	}

	Vec::new()
}

fn hash_poi_ids(pois: &[PoiRecord]) -> u64 {
	let mut ids: Vec<&str> = pois.iter().map(|p| p.poi_id.as_str()).collect();
	ids.sort_unstable();
	let mut hasher = DefaultHasher::new();
	for id in ids {
		id.hash(&mut hasher);
	}
	hasher.finish()
}

fn build_plan_prompt(state: &ItinState, is_first: bool, feedback: Option<&str>) -> String {
	let poi_list = state
		.pois
		.iter()
		.map(|p| format!("- {} ({}): {}", p.poi_id, p.name, p.description))
		.collect::<Vec<_>>()
		.join("\n");

	let mut prompt = if is_first {
		format!(
			"Assign these points of interest in {} to dates between {} and {} for a \
			 traveler with persona \"{}\" and budget {:.2}. Respond with a JSON object \
			 of the form {{\"days\": [{{\"date\": \"YYYY-MM-DD\", \"poi_ids\": [...] }}]}}.\n\n\
			 Points of interest:\n{poi_list}",
			state.destination, state.start_date, state.end_date, state.persona, state.budget
		)
	} else {
		format!(
			"Revise the itinerary for {} ({}..{}) for persona \"{}\" and budget {:.2}. \
			 Respond in the same JSON shape as before.\n\nPoints of interest:\n{poi_list}",
			state.destination, state.start_date, state.end_date, state.persona, state.budget
		)
	};

	if let Some(feedback) = feedback {
		prompt.push_str(&format!("\n\nFeedback from the previous attempt: {feedback}"));
	}

	prompt
}

/// Parses the LLM's day/poi_id assignment into `DayItinerary`s, dropping
/// unknown POI ids. Falls back to one POI per day, round-robin across the
/// requested date range, if the response names no days at all.
fn parse_plan_response(
	value: &serde_json::Value,
	pois: &[PoiRecord],
	start_date: NaiveDate,
	end_date: NaiveDate,
) -> Vec<DayItinerary> {
	let by_id: std::collections::HashMap<&str, &PoiRecord> =
		pois.iter().map(|p| (p.poi_id.as_str(), p)).collect();

	let days = value.get("days").and_then(|v| v.as_array());

	let parsed: Vec<DayItinerary> = days
		.map(|days| {
			days.iter()
				.filter_map(|day| {
					let date_str = day.get("date")?.as_str()?;
					let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
					let poi_ids = day.get("poi_ids")?.as_array()?;
					let pois: Vec<PoiRecord> = poi_ids
						.iter()
						.filter_map(|id| id.as_str())
						.filter_map(|id| by_id.get(id).map(|p| (*p).clone()))
						.collect();
					Some(DayItinerary { date, pois, transfers: Vec::new(), total_duration_minutes: 0 })
				})
				.collect()
		})
		.unwrap_or_default();

	if !parsed.is_empty() {
		return parsed;
	}

	warn!(target: "itinerary_orchestrator", "plan response named no usable days, falling back to round-robin assignment");
	round_robin_fallback(pois, start_date, end_date)
}

fn dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
	let mut dates = Vec::new();
	let mut current = start;
	while current <= end {
		dates.push(current);
		current = current + Duration::days(1);
	}
	dates
}

fn round_robin_fallback(pois: &[PoiRecord], start_date: NaiveDate, end_date: NaiveDate) -> Vec<DayItinerary> {
	let dates = dates_in_range(start_date, end_date);
	if dates.is_empty() {
		return Vec::new();
	}

	let mut buckets: Vec<Vec<PoiRecord>> = vec![Vec::new(); dates.len()];
	for (i, poi) in pois.iter().enumerate() {
		buckets[i % dates.len()].push(poi.clone());
	}

	dates
		.into_iter()
		.zip(buckets)
		.map(|(date, pois)| DayItinerary { date, pois, transfers: Vec::new(), total_duration_minutes: 0 })
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::poi::{PoiCandidate, PoiCategory, PoiSource};
	use crate::error::VectorIndexError;
	use crate::llm::MockLlmClient;
	use crate::places::PlacesValidator;
	use crate::search::WebSearchAdapter;
	use crate::vector::VectorIndex;
	use async_trait::async_trait;
	use std::sync::Mutex;

	/// In-memory stand-in for the Postgres-backed index, used so unit tests
	/// never need a live database.
	#[derive(Default)]
	struct InMemoryVectorIndex {
		records: Mutex<Vec<PoiRecord>>,
	}

	#[async_trait]
	impl VectorIndex for InMemoryVectorIndex {
		async fn add(&self, record: PoiRecord) -> Result<(), VectorIndexError> {
			self.records.lock().unwrap().push(record);
			Ok(())
		}

		async fn add_batch(&self, records: Vec<PoiRecord>) -> Result<usize, VectorIndexError> {
			let n = records.len();
			self.records.lock().unwrap().extend(records);
			Ok(n)
		}

		async fn search_by_text(
			&self,
			_query: &str,
			k: usize,
			_city_filter: Option<&str>,
		) -> Result<Vec<(PoiCandidate, PoiRecord)>, VectorIndexError> {
			let records = self.records.lock().unwrap();
			Ok(records
				.iter()
				.take(k)
				.map(|r| {
					let candidate = PoiCandidate {
						title: r.name.clone(),
						snippet: r.description.clone(),
						source_url: None,
						source: PoiSource::Vector,
						relevance: 0.5,
						poi_id: Some(r.poi_id.clone()),
					};
					(candidate, r.clone())
				})
				.collect())
		}

		async fn search_by_vector(
			&self,
			_embedding: &[f32],
			_k: usize,
			_city_filter: Option<&str>,
		) -> Result<Vec<(PoiCandidate, PoiRecord)>, VectorIndexError> {
			Ok(Vec::new())
		}

		async fn size(&self) -> Result<usize, VectorIndexError> {
			Ok(self.records.lock().unwrap().len())
		}
	}

	fn date(s: &str) -> NaiveDate {
		NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
	}

	fn poi(id: &str) -> PoiRecord {
		PoiRecord {
			poi_id: id.to_string(),
			name: id.to_string(),
			category: PoiCategory::Other,
			description: String::new(),
			address: None,
			city: None,
			coordinates: Some((0.0, 0.0)),
			google_place_id: None,
			rating: None,
			rating_count: None,
			price_level: None,
			opening_hours: None,
			raw_text: String::new(),
			types: None,
			source: PoiSource::Web,
			created_at: chrono::Utc::now(),
		}
	}

	#[test]
	fn todo_agent_starts_with_plan_when_empty() {
		let state = ItinState {
			pois: vec![],
			destination: "Lisbon".to_string(),
			start_date: date("2026-08-01"),
			end_date: date("2026-08-03"),
			budget: 500.0,
			persona: "foodie".to_string(),
			itineraries: Vec::new(),
			validation_feedback: None,
			schedule_feedback: None,
			iteration_count: 0,
			previous_poi_hash: None,
			poi_enrich_attempts: 0,
			is_poi_sufficient: false,
			is_poi_changed: true,
			task_queue: Vec::new(),
			current_task: None,
			best_itineraries: None,
			best_penalty: f64::INFINITY,
		};
		assert_eq!(todo_agent(&state), vec![TaskName::Plan]);
	}

	#[test]
	fn todo_agent_requeues_legs_and_balance_after_schedule_feedback() {
		use crate::domain::itinerary::{Transfer, TravelMode};

		let pois = vec![poi("a"), poi("b")];
		let state = ItinState {
			pois: pois.clone(),
			destination: "Lisbon".to_string(),
			start_date: date("2026-08-01"),
			end_date: date("2026-08-01"),
			budget: 500.0,
			persona: "foodie".to_string(),
			itineraries: vec![DayItinerary {
				date: date("2026-08-01"),
				pois: pois.clone(),
				transfers: vec![Transfer { mode: TravelMode::Driving, duration_minutes: 10, distance_km: 1.0 }],
				total_duration_minutes: 10,
			}],
			validation_feedback: None,
			schedule_feedback: Some("day 2026-08-01 has only 0 POIs while another day is overloaded".to_string()),
			iteration_count: 1,
			previous_poi_hash: Some(hash_poi_ids(&pois)),
			poi_enrich_attempts: 0,
			is_poi_sufficient: true,
			is_poi_changed: false,
			task_queue: Vec::new(),
			current_task: None,
			best_itineraries: None,
			best_penalty: f64::INFINITY,
		};

		assert_eq!(
			todo_agent(&state),
			vec![TaskName::BalanceApply, TaskName::Legs, TaskName::Validate, TaskName::Balance]
		);
	}

	#[test]
	fn round_robin_fallback_distributes_across_dates() {
		let pois = vec![poi("a"), poi("b"), poi("c"), poi("d")];
		let itineraries = round_robin_fallback(&pois, date("2026-08-01"), date("2026-08-02"));
		assert_eq!(itineraries.len(), 2);
		assert_eq!(itineraries[0].pois.len() + itineraries[1].pois.len(), 4);
	}

	#[test]
	fn hash_poi_ids_is_order_independent() {
		let a = vec![poi("x"), poi("y")];
		let b = vec![poi("y"), poi("x")];
		assert_eq!(hash_poi_ids(&a), hash_poi_ids(&b));
	}

	#[tokio::test]
	async fn run_produces_an_itinerary_covering_every_requested_day() {
		let llm = Arc::new(MockLlmClient {
			completion: "ok".to_string(),
			structured: json!({
				"days": [
					{ "date": "2026-08-01", "poi_ids": ["a", "b"] },
					{ "date": "2026-08-02", "poi_ids": ["c"] }
				]
			}),
		});
		let legs = Arc::new(TravelLegCalculator::new(None));
		let vector_index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::default());
		let web_search = Arc::new(WebSearchAdapter::new(None));
		let places = Arc::new(PlacesValidator::new("test-key".to_string()).unwrap());
		let config = EngineConfig::default();

		let poi_orchestrator = Arc::new(PoiOrchestrator::new(
			llm.clone(),
			vector_index,
			web_search,
			places,
			config.clone(),
		));
		let orchestrator = ItineraryOrchestrator::new(llm, legs, poi_orchestrator, config);

		// Five POIs clears the default sufficiency threshold so the run
		// never has to invoke the POI orchestrator's discovery graph.
		let pois = vec![poi("a"), poi("b"), poi("c"), poi("d"), poi("e")];
		let result = orchestrator
			.run(pois, "Lisbon", "foodie", date("2026-08-01"), date("2026-08-02"), 500.0)
			.await
			.unwrap();

		assert_eq!(result.len(), 2);
	}
}
