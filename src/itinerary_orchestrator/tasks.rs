/*
 * src/itinerary_orchestrator/tasks.rs
 *
 * Task bodies dispatched by the itinerary orchestrator's TodoAgent: legs,
 * validate, balance. Each returns either nothing (legs mutates state
 * directly) or an `Option<String>` feedback message consumed by the
 * orchestrator's regenerate-on-feedback loop.
 */

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::directions::TravelLegCalculator;
use crate::domain::itinerary::{DayItinerary, TravelMode};
use crate::domain::poi::PoiCategory;
use crate::itinerary_orchestrator::route;

/// Minutes a traveler is assumed to spend at a POI of this category, used by
/// `legs` to pad travel time into a day's total.
pub fn estimated_visit_time(category: PoiCategory) -> u32 {
	match category {
		PoiCategory::Restaurant => 60,
		PoiCategory::Attraction => 90,
		PoiCategory::Cafe => 45,
		PoiCategory::Accommodation => 0,
		PoiCategory::Shopping => 60,
		PoiCategory::Entertainment => 90,
		PoiCategory::Other => 60,
	}
}

/// Rough per-visit cost used by `validate`'s budget check, in the same unit
/// as `ItinState::budget`.
pub fn estimated_cost(category: PoiCategory) -> f64 {
	match category {
		PoiCategory::Restaurant => 35.0,
		PoiCategory::Attraction => 25.0,
		PoiCategory::Cafe => 12.0,
		PoiCategory::Accommodation => 0.0,
		PoiCategory::Shopping => 20.0,
		PoiCategory::Entertainment => 30.0,
		PoiCategory::Other => 15.0,
	}
}

/// **legs**: orders each day's POIs, fills `transfers` via the travel-leg
/// calculator, and sets `total_duration_minutes` to the sum of transfer
/// durations plus each POI's estimated visit time.
pub async fn run_legs(itineraries: &mut [DayItinerary], legs: &Arc<TravelLegCalculator>) {
	for day in itineraries.iter_mut() {
		if day.pois.len() < 2 {
			day.transfers = Vec::new();
		} else {
			day.pois = route::order_pois(&day.pois);
			day.transfers = legs.calc_sequence(&day.pois, TravelMode::Driving).await;
		}

		let transfer_minutes: u32 = day.transfers.iter().map(|t| t.duration_minutes).sum();
		let visit_minutes: u32 = day.pois.iter().map(|p| estimated_visit_time(p.category)).sum();
		day.total_duration_minutes = transfer_minutes + visit_minutes;
	}
}

/// **validate**: checks per-day duration against `max_daily_minutes`,
/// total estimated cost against `budget`, and that every day's date falls
/// within `[start_date, end_date]`. Returns the first failing condition as
/// a textual feedback string, or `None` if everything passes.
pub fn run_validate(
	itineraries: &[DayItinerary],
	budget: f64,
	start_date: NaiveDate,
	end_date: NaiveDate,
	config: &EngineConfig,
) -> Option<String> {
	for day in itineraries {
		if day.total_duration_minutes as i64 > config.max_daily_minutes {
			return Some(format!(
				"day {} totals {} minutes, over the {} minute daily limit -- remove or shorten a visit",
				day.date, day.total_duration_minutes, config.max_daily_minutes
			));
		}
		if day.date < start_date || day.date > end_date {
			return Some(format!(
				"day {} falls outside the requested range {}..={}",
				day.date, start_date, end_date
			));
		}
	}

	let total_cost: f64 = itineraries
		.iter()
		.flat_map(|d| d.pois.iter())
		.map(|p| estimated_cost(p.category))
		.sum();
	if total_cost > budget {
		return Some(format!(
			"estimated cost {total_cost:.2} exceeds budget {budget:.2} -- drop a costlier POI"
		));
	}

	None
}

/// **balance**: flags a day with more than `max_poi_count` POIs, or a day
/// below `balance_min_poi_count` while another day sits above
/// `optimal_poi_count`. Returns `None` when every day is within range.
pub fn run_balance(itineraries: &[DayItinerary], config: &EngineConfig) -> Option<String> {
	let counts: Vec<usize> = itineraries.iter().map(|d| d.pois.len()).collect();

	for (i, &count) in counts.iter().enumerate() {
		if count > config.max_poi_count {
			return Some(format!(
				"day {} has {} POIs, over the {}-POI cap -- move some to a lighter day",
				itineraries[i].date, count, config.max_poi_count
			));
		}
	}

	let has_overloaded_day = counts.iter().any(|&c| c > config.optimal_poi_count);
	for (i, &count) in counts.iter().enumerate() {
		if count < config.balance_min_poi_count && has_overloaded_day {
			return Some(format!(
				"day {} has only {} POIs while another day is overloaded -- move a POI here",
				itineraries[i].date, count
			));
		}
	}

	None
}

/// **balance_apply**: mechanically moves the last POI off any day over
/// `max_poi_count` onto the lightest day below `optimal_poi_count`. Does
/// not recompute transfers -- the queue always runs `validate` (and, via
/// change detection, `legs`) afterward.
pub fn apply_balance(itineraries: &mut [DayItinerary], config: &EngineConfig) {
	loop {
		let over_idx = itineraries
			.iter()
			.position(|d| d.pois.len() > config.max_poi_count);
		let Some(over_idx) = over_idx else { break };

		let under_idx = itineraries
			.iter()
			.enumerate()
			.filter(|(i, d)| *i != over_idx && d.pois.len() < config.optimal_poi_count)
			.min_by_key(|(_, d)| d.pois.len())
			.map(|(i, _)| i);
		let Some(under_idx) = under_idx else { break };

		let Some(poi) = itineraries[over_idx].pois.pop() else { break };
		itineraries[under_idx].pois.push(poi);
	}
}

/// Sum of positive overages across every day's duration plus the budget
/// overage, used for best-so-far tracking. Never negative.
pub fn compute_penalty(
	itineraries: &[DayItinerary],
	budget: f64,
	config: &EngineConfig,
) -> f64 {
	let duration_penalty: f64 = itineraries
		.iter()
		.map(|d| (d.total_duration_minutes as i64 - config.max_daily_minutes).max(0) as f64)
		.sum();

	let total_cost: f64 = itineraries
		.iter()
		.flat_map(|d| d.pois.iter())
		.map(|p| estimated_cost(p.category))
		.sum();
	let budget_penalty = (total_cost - budget).max(0.0);

	duration_penalty + budget_penalty
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::poi::{PoiRecord, PoiSource};
	use chrono::NaiveDate;

	fn poi(id: &str, category: PoiCategory) -> PoiRecord {
		PoiRecord {
			poi_id: id.to_string(),
			name: id.to_string(),
			category,
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

	fn day(date: &str, pois: Vec<PoiRecord>, total_duration_minutes: u32) -> DayItinerary {
		DayItinerary {
			date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
			pois,
			transfers: Vec::new(),
			total_duration_minutes,
		}
	}

	#[test]
	fn validate_flags_overpacked_day() {
		let config = EngineConfig::default();
		let itineraries = vec![day("2026-08-01", vec![poi("a", PoiCategory::Attraction)], 800)];
		let start = NaiveDate::parse_from_str("2026-08-01", "%Y-%m-%d").unwrap();
		let end = NaiveDate::parse_from_str("2026-08-05", "%Y-%m-%d").unwrap();
		let feedback = run_validate(&itineraries, 1000.0, start, end, &config);
		assert!(feedback.is_some());
	}

	#[test]
	fn validate_passes_within_limits() {
		let config = EngineConfig::default();
		let itineraries = vec![day("2026-08-01", vec![poi("a", PoiCategory::Cafe)], 200)];
		let start = NaiveDate::parse_from_str("2026-08-01", "%Y-%m-%d").unwrap();
		let end = NaiveDate::parse_from_str("2026-08-05", "%Y-%m-%d").unwrap();
		let feedback = run_validate(&itineraries, 1000.0, start, end, &config);
		assert!(feedback.is_none());
	}

	#[test]
	fn balance_flags_day_over_max_poi_count() {
		let config = EngineConfig::default();
		let pois = (0..7).map(|i| poi(&i.to_string(), PoiCategory::Attraction)).collect();
		let itineraries = vec![day("2026-08-01", pois, 100)];
		assert!(run_balance(&itineraries, &config).is_some());
	}

	#[test]
	fn apply_balance_moves_poi_to_lightest_day() {
		let config = EngineConfig::default();
		let heavy = (0..7).map(|i| poi(&i.to_string(), PoiCategory::Attraction)).collect();
		let mut itineraries = vec![day("2026-08-01", heavy, 0), day("2026-08-02", Vec::new(), 0)];
		apply_balance(&mut itineraries, &config);
		assert_eq!(itineraries[0].pois.len(), 6);
		assert_eq!(itineraries[1].pois.len(), 1);
	}

	#[test]
	fn compute_penalty_is_zero_when_within_limits() {
		let config = EngineConfig::default();
		let itineraries = vec![day("2026-08-01", vec![poi("a", PoiCategory::Cafe)], 100)];
		assert_eq!(compute_penalty(&itineraries, 1000.0, &config), 0.0);
	}

	#[test]
	fn compute_penalty_accumulates_overage() {
		let config = EngineConfig::default();
		let itineraries = vec![day("2026-08-01", vec![poi("a", PoiCategory::Cafe)], 800)];
		let penalty = compute_penalty(&itineraries, 0.0, &config);
		assert!(penalty > 0.0);
	}

	#[tokio::test]
	async fn legs_sets_empty_transfers_for_single_poi_day() {
		let mut itineraries = vec![day("2026-08-01", vec![poi("a", PoiCategory::Cafe)], 0)];
		let legs = Arc::new(TravelLegCalculator::new(None));
		run_legs(&mut itineraries, &legs).await;
		assert!(itineraries[0].transfers.is_empty());
		assert_eq!(itineraries[0].total_duration_minutes, estimated_visit_time(PoiCategory::Cafe));
	}
}
