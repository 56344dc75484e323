//! Conventional geocoding collaborator trait.

use async_trait::async_trait;

use crate::error::GeocodeError;
use crate::types::venue::VenueRecord;

/// Last-resort geocoding service consulted when every AI attempt fails.
///
/// `Ok(None)` is the normal "no match" outcome, not an error.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best-effort free-text geocode.
    async fn geocode(&self, query: &str) -> Result<Option<VenueRecord>, GeocodeError>;
}
