#![allow(unexpected_cfgs)]

use std::env;
use std::sync::Arc;

use chrono::NaiveDate;
use journey_planner::config::EngineConfig;
use journey_planner::directions::TravelLegCalculator;
use journey_planner::itinerary_orchestrator::ItineraryOrchestrator;
use journey_planner::llm::openai::OpenAiLlmClient;
use journey_planner::llm::LlmClient;
use journey_planner::log;
use journey_planner::places::PlacesValidator;
use journey_planner::poi_orchestrator::PoiOrchestrator;
use journey_planner::search::WebSearchAdapter;
use journey_planner::vector::pg::PgVectorIndex;

/// Runs one end-to-end POI discovery + itinerary planning pass from
/// environment-provided inputs. There is no HTTP surface here; a caller that
/// wants one wraps this library around its own request handling.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	log::init_panic_handler();
	log::init_logger();

	let config = EngineConfig::from_env();

	let destination = env::var("PLAN_DESTINATION").unwrap_or_else(|_| "Lisbon".to_string());
	let persona = env::var("PLAN_PERSONA").unwrap_or_else(|_| "a curious first-time visitor".to_string());
	let start_date = env::var("PLAN_START_DATE").unwrap_or_else(|_| "2026-09-01".to_string());
	let end_date = env::var("PLAN_END_DATE").unwrap_or_else(|_| "2026-09-03".to_string());
	let budget: f64 = env::var("PLAN_BUDGET").ok().and_then(|v| v.parse().ok()).unwrap_or(600.0);

	let start_date = NaiveDate::parse_from_str(&start_date, "%Y-%m-%d")?;
	let end_date = NaiveDate::parse_from_str(&end_date, "%Y-%m-%d")?;

	let llm: Arc<dyn LlmClient> = Arc::new(OpenAiLlmClient::new(
		config.llm_api_key.clone().unwrap_or_default(),
		config.llm_base_url.clone(),
		config.llm_model.clone(),
		config.llm_client_max_retries,
		config.llm_client_max_tokens,
		config.temperature,
		config.top_p,
		config.llm_client_timeout(),
	));

	let pool = match &config.database_url {
		Some(url) => sqlx::PgPool::connect(url).await?,
		None => {
			tracing::warn!("DATABASE_URL not set, vector index operations will fail at first use");
			sqlx::PgPool::connect_lazy("postgres://localhost/journey_planner")?
		}
	};
	let vector_index = Arc::new(PgVectorIndex::new(pool));

	let web_search = Arc::new(WebSearchAdapter::new(config.web_search_api_key.clone()));
	let places = Arc::new(PlacesValidator::new(
		config.places_api_key.clone().unwrap_or_default(),
	)?);
	let legs = Arc::new(TravelLegCalculator::new(config.directions_api_key.clone()));

	let poi_orchestrator = Arc::new(PoiOrchestrator::new(
		llm.clone(),
		vector_index.clone(),
		web_search,
		places,
		config.clone(),
	));

	let itinerary_orchestrator =
		ItineraryOrchestrator::new(llm.clone(), legs, poi_orchestrator.clone(), config.clone());

	let pois = poi_orchestrator.run(&persona, &destination).await;
	let itinerary = itinerary_orchestrator
		.run(pois, &destination, &persona, start_date, end_date, budget)
		.await?;

	println!("{}", serde_json::to_string_pretty(&itinerary)?);

	Ok(())
}
