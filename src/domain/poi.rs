/*
 * src/domain/poi.rs
 *
 * File for point-of-interest domain models
 *
 * Purpose:
 *   Value types shared by the web search adapter, places validator, vector
 *   index, and both orchestrators.
 *
 * Include:
 *   PoiCandidate   - unvalidated hit from web/vector search
 *   PoiRecord      - validated, persistable point of interest
 *   PoiSource      - where a candidate/record originated
 *   PoiCategory    - coarse category bucket
 *   OpeningHours   - weekly opening-hours table
 *   DayHours       - one day's slots within OpeningHours
 */

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a [`PoiCandidate`] or [`PoiRecord`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiSource {
	Web,
	Vector,
	Feedback,
}

/// Coarse category bucket derived from the Places API's `primaryType`/`types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
	Restaurant,
	Cafe,
	Attraction,
	Accommodation,
	Shopping,
	Entertainment,
	Other,
}

impl PoiCategory {
	/// Maps a Places API `primaryType` (or, failing that, the first entry of
	/// `types`) to a category bucket. Unrecognized values map to `Other`.
	pub fn from_place_type(primary_type: &str) -> Self {
		match primary_type {
			"restaurant" | "meal_takeaway" | "meal_delivery" | "food" => PoiCategory::Restaurant,
			"cafe" | "coffee_shop" | "bakery" => PoiCategory::Cafe,
			"tourist_attraction" | "museum" | "park" | "art_gallery" | "landmark" => {
				PoiCategory::Attraction
			}
			"lodging" | "hotel" => PoiCategory::Accommodation,
			"shopping_mall" | "store" | "clothing_store" | "market" => PoiCategory::Shopping,
			"night_club" | "bar" | "movie_theater" | "amusement_park" => {
				PoiCategory::Entertainment
			}
			_ => PoiCategory::Other,
		}
	}
}

/// One day's opening slots. Slots are half-open `[open, close)` and
/// non-overlapping within the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHours {
	pub is_closed: bool,
	pub slots: Vec<(NaiveTime, NaiveTime)>,
}

/// Weekly opening-hours table, indexed Monday(0)..Sunday(6) per ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
	pub days: [DayHours; 7],
}

/// An unvalidated search hit: a web result or a vector-index neighbor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiCandidate {
	pub title: String,
	pub snippet: String,
	pub source_url: Option<String>,
	pub source: PoiSource,
	pub relevance: f64,
	/// Present only for vector hits, where the candidate already names a
	/// known `PoiRecord`.
	pub poi_id: Option<String>,
}

/// A validated, persistable point of interest.
///
/// Invariant: `poi_id` is unique; re-validating the same `source_url` always
/// yields the same `poi_id` (it is `MD5(source_url)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
	pub poi_id: String,
	pub name: String,
	pub category: PoiCategory,
	pub description: String,
	pub address: Option<String>,
	pub city: Option<String>,
	pub coordinates: Option<(f64, f64)>,
	pub google_place_id: Option<String>,
	pub rating: Option<f64>,
	pub rating_count: Option<u32>,
	pub price_level: Option<i32>,
	pub opening_hours: Option<OpeningHours>,
	pub raw_text: String,
	pub types: Option<Vec<String>>,
	pub source: PoiSource,
	pub created_at: DateTime<Utc>,
}
