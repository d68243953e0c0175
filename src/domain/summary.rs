/*
	src/domain/summary.rs
	File for POI Summary Models
	Purpose:
		Store the LLM-produced summary shape used inside the POI orchestrator

*/

use serde::{Deserialize, Serialize};

use crate::domain::poi::PoiCategory;

/// LLM-produced summary of a raw search hit, before places validation.
///
/// Internal-only: never returned across the POI orchestrator's public
/// boundary, only the [`crate::domain::poi::PoiRecord`] that `map()` produces
/// from it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiSummary {
	pub summary: String,
	pub highlights: Vec<String>,
	pub poi_id: Option<String>,
	pub name: String,
	pub category: PoiCategory,
}
