use serde::Deserialize;

pub const LOG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/logs");
pub const CRASH_LOG: &str = "crash.log";
pub const LATEST_LOG: &str = "latest.log";

/// Explicit engine configuration. Constructed once per caller (no process-wide
/// singleton) and passed into the orchestrators and C1-C5 collaborators at
/// construction time.
///
/// Loaded via `dotenvy::dotenv()` followed by `std::env::var`, with typed
/// defaults for everything optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub llm_api_key: Option<String>,
	pub llm_base_url: String,
	pub llm_model: String,
	pub llm_client_timeout_secs: u64,
	pub llm_client_max_retries: u32,
	pub llm_client_max_tokens: u32,
	pub temperature: f32,
	pub top_p: f32,

	pub places_api_key: Option<String>,
	pub directions_api_key: Option<String>,
	pub web_search_api_key: Option<String>,

	pub database_url: Option<String>,

	pub web_weight: f64,
	pub embedding_weight: f64,
	pub rerank_top_n: usize,
	pub keyword_k: usize,
	pub embedding_k: usize,
	pub web_search_k: usize,
	pub final_poi_count: usize,

	pub max_iterations: u32,
	pub max_enrich_attempts: u32,
	/// Sufficiency-gate threshold: below this many input POIs, the
	/// itinerary orchestrator invokes the POI orchestrator to enrich.
	pub sufficiency_min_poi_count: usize,
	pub max_daily_minutes: i64,
	pub optimal_poi_count: usize,
	pub max_poi_count: usize,
	/// Balance-task threshold: a day below this many POIs while another day
	/// exceeds `optimal_poi_count` triggers rebalancing feedback.
	pub balance_min_poi_count: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			llm_api_key: None,
			llm_base_url: "https://api.openai.com/v1".to_string(),
			llm_model: "gpt-4o-mini".to_string(),
			llm_client_timeout_secs: 60,
			llm_client_max_retries: 3,
			llm_client_max_tokens: 1024,
			temperature: 0.7,
			top_p: 1.0,

			places_api_key: None,
			directions_api_key: None,
			web_search_api_key: None,

			database_url: None,

			web_weight: 0.6,
			embedding_weight: 0.4,
			rerank_top_n: 10,
			keyword_k: 5,
			embedding_k: 5,
			web_search_k: 5,
			final_poi_count: 15,

			max_iterations: 5,
			max_enrich_attempts: 2,
			sufficiency_min_poi_count: 5,
			max_daily_minutes: 720,
			optimal_poi_count: 4,
			max_poi_count: 6,
			balance_min_poi_count: 2,
		}
	}
}

impl EngineConfig {
	/// Loads configuration from the process environment, calling
	/// `dotenvy::dotenv()` first so a `.env` file in the working directory is
	/// picked up automatically.
	pub fn from_env() -> Self {
		dotenvy::dotenv().ok();
		let mut cfg = Self::default();

		if let Ok(v) = std::env::var("LLM_API_KEY") {
			cfg.llm_api_key = Some(v);
		}
		if let Ok(v) = std::env::var("LLM_BASE_URL") {
			cfg.llm_base_url = v;
		}
		if let Ok(v) = std::env::var("LLM_MODEL") {
			cfg.llm_model = v;
		}
		if let Ok(v) = std::env::var("PLACES_API_KEY") {
			cfg.places_api_key = Some(v);
		}
		if let Ok(v) = std::env::var("DIRECTIONS_API_KEY") {
			cfg.directions_api_key = Some(v);
		}
		if let Ok(v) = std::env::var("WEB_SEARCH_API_KEY") {
			cfg.web_search_api_key = Some(v);
		}
		if let Ok(v) = std::env::var("DATABASE_URL") {
			cfg.database_url = Some(v);
		}

		cfg
	}

	/// Per-attempt IO timeout as a `Duration`, used by `tokio::time::timeout`.
	pub fn llm_client_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.llm_client_timeout_secs)
	}
}
