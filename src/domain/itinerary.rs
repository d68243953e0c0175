/*
 * src/domain/itinerary.rs
 *
 * File for itinerary domain models
 *
 * Purpose:
 *   Models produced by the itinerary orchestrator (C7): a day's POI sequence
 *   plus the transfers linking them.
 *
 * Include:
 *   TravelMode     - mode used for a Transfer
 *   Transfer       - one leg between consecutive POIs
 *   DayItinerary   - one day's POIs, transfers, and total duration
 */

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::poi::PoiRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
	Driving,
	Walking,
	Transit,
	Bicycling,
}

/// One leg between two consecutive POIs in a [`DayItinerary`].
///
/// A travel-leg calculator that cannot reach the directions API returns the
/// sentinel `Transfer { duration_minutes: 0, distance_km: 0.0, mode }` rather
/// than failing the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
	pub mode: TravelMode,
	pub duration_minutes: u32,
	pub distance_km: f64,
}

/// A single day of a planned itinerary.
///
/// Invariant: `transfers.len() == pois.len().saturating_sub(1)`, and
/// `transfers[i]` is the leg from `pois[i]` to `pois[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayItinerary {
	pub date: NaiveDate,
	pub pois: Vec<PoiRecord>,
	pub transfers: Vec<Transfer>,
	pub total_duration_minutes: u32,
}
