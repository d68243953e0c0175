/*
 * src/vector/mod.rs
 *
 * Vector Index (C2)
 *
 * Purpose:
 *   Trait contract for the POI vector store, plus the dedup-then-filter
 *   helper shared by every backing implementation.
 */

pub mod pg;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::poi::{PoiCandidate, PoiRecord};
use crate::error::VectorIndexError;

#[async_trait]
pub trait VectorIndex: Send + Sync {
	async fn add(&self, record: PoiRecord) -> Result<(), VectorIndexError>;

	/// Idempotent by `poi_id`: in-batch duplicates are filtered first
	/// (keep-first), then records whose `poi_id` already exists in the store
	/// are filtered out. Returns the number actually inserted.
	async fn add_batch(&self, records: Vec<PoiRecord>) -> Result<usize, VectorIndexError>;

	/// Up to `k` hits, descending similarity. An empty index returns
	/// `Ok(vec![])`, never an error.
	async fn search_by_text(
		&self,
		query: &str,
		k: usize,
		city_filter: Option<&str>,
	) -> Result<Vec<(PoiCandidate, PoiRecord)>, VectorIndexError>;

	async fn search_by_vector(
		&self,
		embedding: &[f32],
		k: usize,
		city_filter: Option<&str>,
	) -> Result<Vec<(PoiCandidate, PoiRecord)>, VectorIndexError>;

	async fn size(&self) -> Result<usize, VectorIndexError>;
}

/// Filters `records` down to the ones worth inserting: drops in-batch
/// duplicate `poi_id`s (keeping the first occurrence) then drops any
/// `poi_id` already present in `existing`.
pub(crate) fn dedup_for_insert(
	records: Vec<PoiRecord>,
	existing: &HashSet<String>,
) -> Vec<PoiRecord> {
	let mut seen = HashSet::new();
	records
		.into_iter()
		.filter(|r| seen.insert(r.poi_id.clone()))
		.filter(|r| !existing.contains(&r.poi_id))
		.collect()
}

/// `relevance = clamp(1 - cosine_distance, 0.0, 1.0)`.
pub(crate) fn relevance_from_distance(cosine_distance: f64) -> f64 {
	(1.0 - cosine_distance).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::poi::{PoiCategory, PoiSource};
	use chrono::Utc;

	fn record(poi_id: &str) -> PoiRecord {
		PoiRecord {
			poi_id: poi_id.to_string(),
			name: "Test POI".to_string(),
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

	#[test]
	fn dedup_keeps_first_occurrence_in_batch() {
		let records = vec![record("a"), record("a"), record("b")];
		let deduped = dedup_for_insert(records, &HashSet::new());
		assert_eq!(deduped.len(), 2);
		assert_eq!(deduped[0].poi_id, "a");
		assert_eq!(deduped[1].poi_id, "b");
	}

	#[test]
	fn dedup_filters_existing_ids() {
		let records = vec![record("a"), record("b")];
		let mut existing = HashSet::new();
		existing.insert("a".to_string());
		let deduped = dedup_for_insert(records, &existing);
		assert_eq!(deduped.len(), 1);
		assert_eq!(deduped[0].poi_id, "b");
	}

	#[test]
	fn relevance_clamps_into_unit_range() {
		assert_eq!(relevance_from_distance(-0.5), 1.0);
		assert_eq!(relevance_from_distance(1.5), 0.0);
		assert!((relevance_from_distance(0.2) - 0.8).abs() < 1e-9);
	}
}
