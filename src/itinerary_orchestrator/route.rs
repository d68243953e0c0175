/*
 * src/itinerary_orchestrator/route.rs
 *
 * Nearest-neighbor + 2-opt route ordering over `PoiRecord` coordinates.
 *
 * Used by the `legs` task to put a day's POIs into a sensible visiting
 * order before travel-leg calculation.
 */

use crate::domain::poi::PoiRecord;

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
	let dx = a.0 - b.0;
	let dy = a.1 - b.1;
	(dx * dx + dy * dy).sqrt()
}

fn coords_or_origin(poi: &PoiRecord) -> (f64, f64) {
	poi.coordinates.unwrap_or((0.0, 0.0))
}

fn nearest_neighbor_path(points: &[(f64, f64)], start: usize, end: usize) -> Vec<usize> {
	let n = points.len();
	let mut visited = vec![false; n];
	let mut route = Vec::with_capacity(n);

	visited[start] = true;
	visited[end] = false;

	let mut current = start;
	route.push(start);

	for _ in 0..n.saturating_sub(2) {
		let mut best = None;
		let mut best_dist = f64::INFINITY;

		for i in 0..n {
			if i == end || visited[i] {
				continue;
			}
			let d = dist(points[current], points[i]);
			if d < best_dist {
				best_dist = d;
				best = Some(i);
			}
		}

		let Some(next) = best else { break };
		visited[next] = true;
		route.push(next);
		current = next;
	}

	if !route.contains(&end) {
		route.push(end);
	}
	route
}

fn two_opt_path(points: &[(f64, f64)], route: &mut [usize]) {
	let n = route.len();
	if n < 4 {
		return;
	}
	let mut improved = true;
	while improved {
		improved = false;
		for i in 1..n - 3 {
			for j in i + 1..n - 2 {
				let a = route[i - 1];
				let b = route[i];
				let c = route[j];
				let d = route[j + 1];

				let before = dist(points[a], points[b]) + dist(points[c], points[d]);
				let after = dist(points[a], points[c]) + dist(points[b], points[d]);

				if after < before {
					route[i..=j].reverse();
					improved = true;
				}
			}
		}
	}
}

/// Reorders `pois` into a travel-efficient path starting at index 0 and
/// ending at the last index, via nearest-neighbor construction followed by
/// 2-opt local improvement. POIs are never re-ordered away from their start
/// and end anchors -- only the interior is optimized.
pub fn order_pois(pois: &[PoiRecord]) -> Vec<PoiRecord> {
	if pois.len() < 3 {
		return pois.to_vec();
	}

	let points: Vec<(f64, f64)> = pois.iter().map(coords_or_origin).collect();
	let mut route = nearest_neighbor_path(&points, 0, pois.len() - 1);
	two_opt_path(&points, &mut route);

	route.into_iter().map(|idx| pois[idx].clone()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::poi::{PoiCategory, PoiSource};
	use chrono::Utc;

	fn poi_at(id: &str, lat: f64, lon: f64) -> PoiRecord {
		PoiRecord {
			poi_id: id.to_string(),
			name: id.to_string(),
			category: PoiCategory::Other,
			description: String::new(),
			address: None,
			city: None,
			coordinates: Some((lat, lon)),
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
	fn orders_by_proximity_between_fixed_endpoints() {
		let pois = vec![
			poi_at("start", 0.0, 0.0),
			poi_at("far", 10.0, 10.0),
			poi_at("near", 1.0, 1.0),
			poi_at("end", 20.0, 20.0),
		];
		let ordered = order_pois(&pois);
		assert_eq!(ordered.first().unwrap().poi_id, "start");
		assert_eq!(ordered.last().unwrap().poi_id, "end");
		assert_eq!(ordered.len(), pois.len());
	}

	#[test]
	fn passes_through_small_inputs_unchanged() {
		let pois = vec![poi_at("a", 0.0, 0.0), poi_at("b", 1.0, 1.0)];
		let ordered = order_pois(&pois);
		assert_eq!(ordered.len(), 2);
	}
}
