#![allow(unexpected_cfgs)]

pub mod config;
pub mod directions;
pub mod domain;
pub mod error;
pub mod itinerary_orchestrator;
pub mod llm;
pub mod log;
pub mod places;
pub mod poi_orchestrator;
pub mod search;
pub mod trace;
pub mod vector;

pub use config::EngineConfig;
pub use itinerary_orchestrator::ItineraryOrchestrator;
pub use poi_orchestrator::PoiOrchestrator;
