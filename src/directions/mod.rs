/*
 * src/directions/mod.rs
 *
 * Travel-leg Calculator (C5)
 *
 * Purpose:
 *   Wraps the Directions API with a process-lifetime memoization cache so
 *   repeated legs between the same pair of POIs are priced once.
 */

use std::collections::HashMap;
use std::sync::Mutex;

use google_maps::directions::request::Request as DirectionsRequest;
use google_maps::directions::travel_mode::TravelMode as GmTravelMode;
use google_maps::LatLng;
use tracing::warn;

use crate::domain::itinerary::{Transfer, TravelMode};
use crate::domain::poi::PoiRecord;

type CacheKey = (String, String, TravelMode);

pub struct TravelLegCalculator {
	client: Option<google_maps::Client>,
	cache: Mutex<HashMap<CacheKey, Transfer>>,
}

impl TravelLegCalculator {
	pub fn new(api_key: Option<String>) -> Self {
		let client = api_key.and_then(|key| google_maps::Client::try_new(key).ok());
		Self { client, cache: Mutex::new(HashMap::new()) }
	}

	/// Queries the Directions API for the leg `from -> to`. Missing API key
	/// or any upstream error yields the sentinel
	/// `Transfer { duration_minutes: 0, distance_km: 0.0, mode }` rather than
	/// failing the caller.
	pub async fn calc(&self, from: &PoiRecord, to: &PoiRecord, mode: TravelMode) -> Transfer {
		let key = (from.poi_id.clone(), to.poi_id.clone(), mode);
		if let Some(cached) = self.cache.lock().expect("cache lock poisoned").get(&key) {
			return *cached;
		}

		let transfer = self.query(from, to, mode).await.unwrap_or(Transfer {
			mode,
			duration_minutes: 0,
			distance_km: 0.0,
		});

		self.cache.lock().expect("cache lock poisoned").insert(key, transfer);
		transfer
	}

	/// `len(pois) - 1` transfers, one per consecutive pair.
	pub async fn calc_sequence(&self, pois: &[PoiRecord], mode: TravelMode) -> Vec<Transfer> {
		let mut transfers = Vec::with_capacity(pois.len().saturating_sub(1));
		for pair in pois.windows(2) {
			transfers.push(self.calc(&pair[0], &pair[1], mode).await);
		}
		transfers
	}

	async fn query(&self, from: &PoiRecord, to: &PoiRecord, mode: TravelMode) -> Option<Transfer> {
		let client = self.client.as_ref()?;
		let (from_lat, from_lng) = from.coordinates?;
		let (to_lat, to_lng) = to.coordinates?;

		let request = DirectionsRequest::new(
			client,
			LatLng::try_from_f64(from_lat, from_lng).ok()?.into(),
			LatLng::try_from_f64(to_lat, to_lng).ok()?.into(),
		)
		.with_travel_mode(to_gm_mode(mode));

		let response = match request.execute().await {
			Ok(r) => r,
			Err(e) => {
				warn!(target: "directions", error = %e, "directions query failed");
				return None;
			}
		};

		let leg = response.routes.first()?.legs.first()?;
		Some(Transfer {
			mode,
			duration_minutes: (leg.duration.value.num_seconds() / 60) as u32,
			distance_km: leg.distance.value as f64 / 1000.0,
		})
	}
}

fn to_gm_mode(mode: TravelMode) -> GmTravelMode {
	match mode {
		TravelMode::Driving => GmTravelMode::Driving,
		TravelMode::Walking => GmTravelMode::Walking,
		TravelMode::Transit => GmTravelMode::Transit,
		TravelMode::Bicycling => GmTravelMode::Bicycling,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::poi::{PoiCategory, PoiSource};
	use chrono::Utc;

	fn poi(id: &str) -> PoiRecord {
		PoiRecord {
			poi_id: id.to_string(),
			name: "Test".to_string(),
			category: PoiCategory::Other,
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

	#[tokio::test]
	async fn missing_api_key_returns_sentinel_zero_transfer() {
		let calc = TravelLegCalculator::new(None);
		let transfer = calc.calc(&poi("a"), &poi("b"), TravelMode::Walking).await;
		assert_eq!(transfer.duration_minutes, 0);
		assert_eq!(transfer.distance_km, 0.0);
	}

	#[tokio::test]
	async fn calc_sequence_returns_one_fewer_transfer_than_pois() {
		let calc = TravelLegCalculator::new(None);
		let pois = vec![poi("a"), poi("b"), poi("c")];
		let transfers = calc.calc_sequence(&pois, TravelMode::Driving).await;
		assert_eq!(transfers.len(), pois.len() - 1);
	}
}
