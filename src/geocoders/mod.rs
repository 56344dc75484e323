//! Geocoder implementations.

pub mod places;

pub use places::PlacesClient;
