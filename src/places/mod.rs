/*
 * src/places/mod.rs
 *
 * Places Validator (C4)
 *
 * Purpose:
 *   Resolves a raw POI summary into a validated, persistable PoiRecord via
 *   the Google Places (New) text-search API.
 */

use chrono::NaiveTime;
use google_maps::places_new::{Field, FieldMask, RegularOpeningHours};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::poi::{DayHours, OpeningHours, PoiCategory, PoiRecord, PoiSource};
use crate::domain::summary::PoiSummary;
use crate::error::PoiValidationError;

const BATCH_CONCURRENCY: usize = 5;

const FIELD_MASK: &[Field] = &[
	Field::PlacesDisplayName,
	Field::PlacesId,
	Field::PlacesAdrFormatAddress,
	Field::PlacesLocation,
	Field::PlacesPriceLevel,
	Field::PlacesRating,
	Field::PlacesUserRatingCount,
	Field::PlacesRegularOpeningHours,
	Field::PlacesTypes,
	Field::PlacesPrimaryType,
	Field::PlacesEditorialSummary,
];

pub struct PlacesValidator {
	client: google_maps::Client,
}

impl PlacesValidator {
	pub fn new(api_key: String) -> Result<Self, PoiValidationError> {
		let client = google_maps::Client::try_new(api_key)
			.map_err(|e| PoiValidationError { query: String::new(), reason: e.to_string() })?;
		Ok(Self { client })
	}

	/// Text-search query `"{name} {city}"`; on zero results, retries with the
	/// bare name. Still empty: `Ok(None)` unless `raise_on_failure`, in which
	/// case `Err(PoiValidationError)`. On a hit, enriches the record with
	/// coordinates, rating, rating count, and opening hours alongside
	/// category/address/price level.
	pub async fn map(
		&self,
		summary: &PoiSummary,
		city: &str,
		source_url: Option<&str>,
		raise_on_failure: bool,
	) -> Result<Option<PoiRecord>, PoiValidationError> {
		let primary_query = format!("{} {}", summary.name, city);

		let mut hit = self.text_search_once(&primary_query).await?;
		if hit.is_none() {
			debug!(target: "places", query = %primary_query, "no results, retrying with bare name");
			hit = self.text_search_once(&summary.name).await?;
		}

		match hit {
			Some(place) => Ok(Some(self.to_record(summary, &place, city, source_url))),
			None if raise_on_failure => Err(PoiValidationError {
				query: primary_query,
				reason: "places text search returned no results".to_string(),
			}),
			None => Ok(None),
		}
	}

	/// Bounded-concurrency (`Semaphore`, permits = `BATCH_CONCURRENCY`) batch
	/// validation. Summaries that fail validation are dropped from the
	/// result; callers that need to surface individual failures should call
	/// `map` directly.
	pub async fn map_batch(&self, summaries: &[PoiSummary], city: &str) -> Vec<PoiRecord> {
		let semaphore = Semaphore::new(BATCH_CONCURRENCY);
		let tasks = summaries.iter().map(|summary| async {
			let _permit = semaphore.acquire().await.expect("semaphore not closed");
			self.map(summary, city, None, false).await.ok().flatten()
		});

		futures::future::join_all(tasks)
			.await
			.into_iter()
			.flatten()
			.collect()
	}

	async fn text_search_once(&self, query: &str) -> Result<Option<PlaceHit>, PoiValidationError> {
		let search_res = self
			.client
			.text_search(query)
			.map_err(|e| PoiValidationError { query: query.to_string(), reason: e.to_string() })?
			.field_mask(FieldMask::Specific(FIELD_MASK.to_vec()))
			.execute()
			.await
			.map_err(|e| PoiValidationError { query: query.to_string(), reason: e.to_string() })?;

		if let Some(err) = search_res.error() {
			return Err(PoiValidationError { query: query.to_string(), reason: err.to_string() });
		}

		Ok(search_res.places().into_iter().next().map(PlaceHit::from))
	}

	fn to_record(
		&self,
		summary: &PoiSummary,
		place: &PlaceHit,
		city: &str,
		source_url: Option<&str>,
	) -> PoiRecord {
		let source_url = source_url
			.map(str::to_string)
			.unwrap_or_else(|| synthesize_source_url(&summary.name, city));

		PoiRecord {
			poi_id: poi_id_from_source_url(&source_url),
			name: place.display_name.clone().unwrap_or_else(|| summary.name.clone()),
			category: place
				.primary_type
				.as_deref()
				.map(PoiCategory::from_place_type)
				.unwrap_or(PoiCategory::Other),
			description: summary.summary.clone(),
			address: place.formatted_address.clone(),
			city: Some(city.to_string()),
			coordinates: place.coordinates,
			google_place_id: place.place_id.clone(),
			rating: place.rating,
			rating_count: place.rating_count,
			price_level: place.price_level,
			opening_hours: place.opening_hours.clone(),
			raw_text: summary.summary.clone(),
			types: place.types.clone(),
			source: PoiSource::Web,
			created_at: chrono::Utc::now(),
		}
	}
}

/// `poi_id = MD5(source_url)`, as lowercase 32-hex.
pub fn poi_id_from_source_url(source_url: &str) -> String {
	format!("{:x}", md5::compute(source_url.as_bytes()))
}

/// Deterministic synthetic URL for POIs the Places API reaches without an
/// original `source_url` (e.g. vector-search hits).
fn synthesize_source_url(name: &str, city: &str) -> String {
	format!("synthetic://{}/{}", city.to_lowercase(), name.to_lowercase().replace(' ', "-"))
}

/// Thin view over the google_maps places-new response, decoupled from its
/// exact field types so `to_record` stays readable.
struct PlaceHit {
	display_name: Option<String>,
	place_id: Option<String>,
	formatted_address: Option<String>,
	coordinates: Option<(f64, f64)>,
	price_level: Option<i32>,
	rating: Option<f64>,
	rating_count: Option<u32>,
	primary_type: Option<String>,
	types: Option<Vec<String>>,
	opening_hours: Option<OpeningHours>,
}

impl From<&google_maps::places_new::Place> for PlaceHit {
	fn from(place: &google_maps::places_new::Place) -> Self {
		Self {
			display_name: place.display_name.as_ref().map(|n| n.text.clone()),
			place_id: place.id.clone(),
			formatted_address: place.adr_format_address.clone(),
			coordinates: place.location.as_ref().map(|loc| (loc.lat, loc.lng)),
			price_level: place.price_level.map(|p| p as i32),
			rating: place.rating,
			rating_count: place.user_rating_count.map(|n| n as u32),
			primary_type: place.primary_type.clone(),
			types: place.types.clone(),
			opening_hours: place.regular_opening_hours.as_ref().map(opening_hours_from_api),
		}
	}
}

/// Converts the Places (New) API's `regularOpeningHours.periods` -- Google
/// numbers days Sunday(0)..Saturday(6) -- into the Monday(0)..Sunday(6) ISO
/// table `OpeningHours` expects. A period with no `close` point is treated
/// as open through the end of its day.
fn opening_hours_from_api(hours: &RegularOpeningHours) -> OpeningHours {
	let mut days: [DayHours; 7] =
		std::array::from_fn(|_| DayHours { is_closed: true, slots: Vec::new() });

	for period in &hours.periods {
		let Some(open_time) = NaiveTime::from_hms_opt(period.open.hour as u32, period.open.minute as u32, 0)
		else {
			continue;
		};
		let close_time = period
			.close
			.as_ref()
			.and_then(|close| NaiveTime::from_hms_opt(close.hour as u32, close.minute as u32, 0))
			.unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 59).expect("valid constant time"));

		let iso_index = (period.open.day as usize + 6) % 7;
		days[iso_index].is_closed = false;
		days[iso_index].slots.push((open_time, close_time));
	}

	OpeningHours { days }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn poi_id_is_stable_for_same_url() {
		let a = poi_id_from_source_url("https://example.com/place/1");
		let b = poi_id_from_source_url("https://example.com/place/1");
		assert_eq!(a, b);
		assert_eq!(a.len(), 32);
	}

	#[test]
	fn poi_id_differs_across_urls() {
		let a = poi_id_from_source_url("https://example.com/place/1");
		let b = poi_id_from_source_url("https://example.com/place/2");
		assert_ne!(a, b);
	}

	#[test]
	fn category_mapping_falls_back_to_other() {
		assert!(matches!(
			PoiCategory::from_place_type("some_unknown_type"),
			PoiCategory::Other
		));
		assert!(matches!(
			PoiCategory::from_place_type("restaurant"),
			PoiCategory::Restaurant
		));
	}
}
