pub mod itinerary;
pub mod poi;
pub mod summary;

pub use itinerary::{DayItinerary, Transfer, TravelMode};
pub use poi::{DayHours, OpeningHours, PoiCandidate, PoiCategory, PoiRecord, PoiSource};
pub use summary::PoiSummary;
