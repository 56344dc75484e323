//! Venue resolution: normalization, the two-tier cache and the enricher.

pub mod cache;
pub mod enricher;
pub mod normalize;

pub use cache::VenueCache;
pub use enricher::{EnricherStatsSnapshot, VenueEnricher};
pub use normalize::{contains_cyrillic, normalize_venue_name, transliterate};
