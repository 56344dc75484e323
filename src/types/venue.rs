//! Venue records and cache lookup results.

use serde::{Deserialize, Serialize};

/// A venue resolved to geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRecord {
    /// Canonical venue name as known to the mapping service.
    pub name: String,

    /// Latitude.
    pub lat: f64,

    /// Longitude.
    pub lng: f64,

    /// Link to the venue on the mapping service, may be empty.
    #[serde(default)]
    pub map_url: String,

    /// Physical address, may be empty.
    #[serde(default)]
    pub address: String,
}

impl VenueRecord {
    /// Create a record from name and coordinates.
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            map_url: String::new(),
            address: String::new(),
        }
    }

    /// Set the map link.
    pub fn with_map_url(mut self, url: impl Into<String>) -> Self {
        self.map_url = url.into();
        self
    }

    /// Set the address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

/// Outcome of a venue cache lookup.
///
/// The cache is tri-state: a present entry is either a resolved venue or a
/// remembered miss; an absent entry means the name was never attempted.
/// Negative entries exist so an unresolvable name is paid for once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VenueLookup {
    /// Resolved to coordinates.
    Found(VenueRecord),

    /// Attempted before and known to be unresolvable.
    NotFound,
}

impl VenueLookup {
    /// The venue record, if this is a positive entry.
    pub fn record(&self) -> Option<&VenueRecord> {
        match self {
            VenueLookup::Found(record) => Some(record),
            VenueLookup::NotFound => None,
        }
    }

    /// Whether this is a positive entry.
    pub fn is_found(&self) -> bool {
        matches!(self, VenueLookup::Found(_))
    }

    /// Consume into the record, if positive.
    pub fn into_record(self) -> Option<VenueRecord> {
        match self {
            VenueLookup::Found(record) => Some(record),
            VenueLookup::NotFound => None,
        }
    }
}
